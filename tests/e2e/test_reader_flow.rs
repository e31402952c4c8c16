use crate::e2e::helpers;

use helpers::provider_mocks::{self, AUDIO_BYTES, TEST_ACCESS_TOKEN, TEST_TASK_ID};
use helpers::TestContext;
use parking_lot::Mutex;
use readaloud::domain::reader::{
    AudioSink, CacheLimits, ClickOutcome, ControlState, ControlView, Credentials, LocalCache,
    MemoryStore, Orchestrator, OrchestratorConfig, PlaybackController, PlaybackError, PlainText,
    Reader, ReaderError, ReaderSettings, SessionId, SpeechEngine, SynthesisError, Utterance,
};
use readaloud::domain::tts::{AccessToken, Audio, Backend, VoiceParams};
use readaloud::infrastructure::relay_client::{HttpRelayClient, RelayClient, RelayClientError};
use std::sync::Arc;
use std::time::Duration;
use test_context::test_context;

/// Audio output that keeps what it was asked to play
#[derive(Default)]
struct CapturingSink {
    played: Mutex<Vec<Audio>>,
}

impl AudioSink for CapturingSink {
    fn play(&self, audio: &Audio, _session: SessionId) -> Result<(), PlaybackError> {
        self.played.lock().push(audio.clone());
        Ok(())
    }
    fn pause(&self) {}
    fn resume(&self) -> Result<(), PlaybackError> {
        Ok(())
    }
    fn reset(&self) {}
    fn release(&self) {}
}

struct SilentEngine;

impl SpeechEngine for SilentEngine {
    fn speak(&self, _utterance: &Utterance, _session: SessionId) -> Result<(), PlaybackError> {
        Ok(())
    }
    fn pause(&self) {}
    fn resume(&self) -> Result<(), PlaybackError> {
        Ok(())
    }
    fn cancel(&self) {}
}

#[derive(Default)]
struct LastStateView {
    state: Mutex<Option<ControlState>>,
}

impl ControlView for LastStateView {
    fn render(&self, state: &ControlState) {
        *self.state.lock() = Some(state.clone());
    }
}

impl LastStateView {
    fn last(&self) -> Option<ControlState> {
        self.state.lock().clone()
    }
}

fn remote_reader(ctx: &TestContext, sink: Arc<CapturingSink>) -> Reader {
    let settings = ReaderSettings {
        service: Backend::Remote,
        api_key: "test-api-key".to_string(),
        secret_key: "test-secret-key".to_string(),
        ..ReaderSettings::default()
    };

    let relay = Arc::new(HttpRelayClient::new(&ctx.base_url, &ctx.csrf_token));
    let cache = Arc::new(LocalCache::new(
        Arc::new(MemoryStore::new()),
        CacheLimits::default(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        relay,
        cache,
        Credentials {
            api_key: settings.api_key.clone(),
            secret_key: settings.secret_key.clone(),
        },
        OrchestratorConfig {
            poll_interval: Duration::from_millis(10),
            ..OrchestratorConfig::default()
        },
    ));

    Reader::new(
        settings,
        orchestrator,
        Arc::new(PlaybackController::new()),
        Arc::new(SilentEngine),
        sink,
    )
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_read_article_through_the_relay(ctx: &TestContext) {
    provider_mocks::mock_token_success(&ctx.provider).await;
    provider_mocks::mock_create_task(&ctx.provider, TEST_TASK_ID).await;
    provider_mocks::mock_query_success(&ctx.provider, TEST_TASK_ID, &ctx.audio_url("out.mp3"))
        .await;
    provider_mocks::mock_audio_file(&ctx.provider, "out.mp3").await;

    let sink = Arc::new(CapturingSink::default());
    let reader = remote_reader(ctx, sink.clone());
    let view = Arc::new(LastStateView::default());
    reader.register_playable(
        "article-1",
        Arc::new(PlainText::new("An article worth listening to.")),
        view.clone(),
    );

    let outcome = reader.click("article-1").await.unwrap();

    assert_eq!(outcome, ClickOutcome::Started);
    assert_eq!(view.last(), Some(ControlState::Playing));
    let played = sink.played.lock().clone();
    assert_eq!(played.len(), 1);
    assert_eq!(played[0].content_type, "audio/mpeg");
    assert_eq!(played[0].data.as_ref(), AUDIO_BYTES);

    // Second click on the playing control pauses it
    let outcome = reader.click("article-1").await.unwrap();
    assert_eq!(outcome, ClickOutcome::Paused);
    assert_eq!(view.last(), Some(ControlState::Paused));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_replay_cached_audio_without_provider_calls(ctx: &TestContext) {
    provider_mocks::mock_token_success(&ctx.provider).await;
    provider_mocks::mock_create_task(&ctx.provider, TEST_TASK_ID).await;
    provider_mocks::mock_query_success(&ctx.provider, TEST_TASK_ID, &ctx.audio_url("out.mp3"))
        .await;
    provider_mocks::mock_audio_file(&ctx.provider, "out.mp3").await;

    let sink = Arc::new(CapturingSink::default());
    let reader = remote_reader(ctx, sink.clone());
    let view = Arc::new(LastStateView::default());
    reader.register_playable("article-1", Arc::new(PlainText::new("Cached text.")), view.clone());

    reader.click("article-1").await.unwrap();
    let calls_after_first_read = ctx.provider_calls().await;
    reader.stop();
    assert_eq!(view.last(), Some(ControlState::Idle));

    let outcome = reader.click("article-1").await.unwrap();

    assert_eq!(outcome, ClickOutcome::Started);
    assert_eq!(ctx.provider_calls().await, calls_after_first_read);
    assert_eq!(sink.played.lock().len(), 2);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_show_provider_failure_on_the_control(ctx: &TestContext) {
    provider_mocks::mock_token_success(&ctx.provider).await;
    provider_mocks::mock_create_task(&ctx.provider, TEST_TASK_ID).await;
    provider_mocks::mock_query_failure(&ctx.provider, TEST_TASK_ID, "text too long").await;

    let sink = Arc::new(CapturingSink::default());
    let reader = remote_reader(ctx, sink.clone());
    let view = Arc::new(LastStateView::default());
    reader.register_playable("article-1", Arc::new(PlainText::new("Doomed text.")), view.clone());

    let err = reader.click("article-1").await.unwrap_err();

    assert!(matches!(
        err,
        ReaderError::Synthesis(SynthesisError::JobFailed(ref msg)) if msg == "text too long"
    ));
    assert_eq!(
        view.last(),
        Some(ControlState::Failed("Synthesis failed: text too long".to_string()))
    );
    assert!(sink.played.lock().is_empty());
    assert!(reader.controller().active_control().is_none());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_rejected_credentials(ctx: &TestContext) {
    provider_mocks::mock_token_rejected(&ctx.provider).await;

    let sink = Arc::new(CapturingSink::default());
    let reader = remote_reader(ctx, sink);
    let view = Arc::new(LastStateView::default());
    reader.register_playable("article-1", Arc::new(PlainText::new("Some text.")), view.clone());

    let err = reader.click("article-1").await.unwrap_err();

    assert!(matches!(err, ReaderError::Synthesis(SynthesisError::Relay(_))));
    assert!(matches!(view.last(), Some(ControlState::Failed(_))));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_synthesize_short_text_through_relay_client(ctx: &TestContext) {
    provider_mocks::mock_synthesize_audio(&ctx.provider, b"RIFF-short").await;
    let relay = HttpRelayClient::new(&ctx.base_url, &ctx.csrf_token);

    let audio = relay
        .synthesize_direct(
            "Short title",
            &AccessToken::new(TEST_ACCESS_TOKEN),
            &VoiceParams::default(),
        )
        .await
        .unwrap();

    assert_eq!(audio.content_type, "audio/wav");
    assert_eq!(audio.data.as_ref(), b"RIFF-short");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_carry_relay_error_message_to_the_client(ctx: &TestContext) {
    provider_mocks::mock_synthesize_error(&ctx.provider).await;
    let relay = HttpRelayClient::new(&ctx.base_url, &ctx.csrf_token);

    let err = relay
        .synthesize_direct(
            "Short title",
            &AccessToken::new("expired"),
            &VoiceParams::default(),
        )
        .await
        .unwrap_err();

    match err {
        RelayClientError::Status { status, message } => {
            assert_eq!(status, 502);
            assert!(message.contains("access token invalid"), "{}", message);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
