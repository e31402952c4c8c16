use crate::e2e::helpers;

use helpers::provider_mocks::{self, AUDIO_BYTES, CREATE_PATH, TEST_ACCESS_TOKEN, TEST_TASK_ID};
use helpers::TestContext;
use hyper::StatusCode;
use readaloud::domain::auth::CsrfManager;
use serde_json::Value;
use test_context::test_context;

fn credentials() -> [(&'static str, &'static str); 2] {
    [("api_key", "test-api-key"), ("secret_key", "test-secret-key")]
}

// ============================================================================
// Anti-forgery
// ============================================================================

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_relay_calls_without_csrf_token(ctx: &TestContext) {
    let response = ctx
        .client
        .post_form("/tts/token", &credentials(), None)
        .await
        .unwrap();

    response
        .assert_status(StatusCode::UNAUTHORIZED)
        .assert_error_message("Missing CSRF token");
    assert_eq!(ctx.provider_calls().await, 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_token_signed_with_another_secret(ctx: &TestContext) {
    let foreign = CsrfManager::new("some-other-secret".to_string(), 1)
        .issue("intruder")
        .unwrap();

    let response = ctx
        .client
        .post_form("/tts/token", &credentials(), Some(&foreign))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::UNAUTHORIZED)
        .assert_error_message("Invalid CSRF token");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_garbage_csrf_token(ctx: &TestContext) {
    let response = ctx
        .client
        .post_form("/tts/token", &credentials(), Some("not-a-token"))
        .await
        .unwrap();

    response.assert_status(StatusCode::UNAUTHORIZED);
}

// ============================================================================
// POST /tts/token
// ============================================================================

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_exchange_credentials_for_access_token(ctx: &TestContext) {
    provider_mocks::mock_token_success(&ctx.provider).await;

    let response = ctx
        .client
        .post_form("/tts/token", &credentials(), Some(&ctx.csrf_token))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["access_token"], TEST_ACCESS_TOKEN);
    assert_eq!(body["expires_in"], 2592000);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_empty_credentials_without_calling_provider(ctx: &TestContext) {
    provider_mocks::mock_token_success(&ctx.provider).await;

    let response = ctx
        .client
        .post_form(
            "/tts/token",
            &[("api_key", ""), ("secret_key", "test-secret-key")],
            Some(&ctx.csrf_token),
        )
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("API key and secret key are required");
    assert_eq!(ctx.provider_calls().await, 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_surface_provider_token_rejection_as_bad_gateway(ctx: &TestContext) {
    provider_mocks::mock_token_rejected(&ctx.provider).await;

    let response = ctx
        .client
        .post_form("/tts/token", &credentials(), Some(&ctx.csrf_token))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_GATEWAY)
        .assert_error_message("HTTP 401");
}

// ============================================================================
// POST /tts/synthesize
// ============================================================================

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_audio_for_short_text(ctx: &TestContext) {
    provider_mocks::mock_synthesize_audio(&ctx.provider, b"RIFF-fake-wav").await;

    let response = ctx
        .client
        .post_form(
            "/tts/synthesize",
            &[
                ("text", "Hello world"),
                ("token", TEST_ACCESS_TOKEN),
                ("lang", "en-US"),
                ("speed", "1.2"),
            ],
            Some(&ctx.csrf_token),
        )
        .await
        .unwrap();

    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "audio/wav");
    assert_eq!(response.body_bytes, b"RIFF-fake-wav");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_map_provider_json_error_to_bad_gateway(ctx: &TestContext) {
    provider_mocks::mock_synthesize_error(&ctx.provider).await;

    let response = ctx
        .client
        .post_form(
            "/tts/synthesize",
            &[("text", "Hello"), ("token", "expired")],
            Some(&ctx.csrf_token),
        )
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_GATEWAY)
        .assert_error_message("access token invalid");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_require_text_and_token_for_synthesis(ctx: &TestContext) {
    let response = ctx
        .client
        .post_form(
            "/tts/synthesize",
            &[("text", "   "), ("token", TEST_ACCESS_TOKEN)],
            Some(&ctx.csrf_token),
        )
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("Missing required parameters");
    assert_eq!(ctx.provider_calls().await, 0);
}

// ============================================================================
// POST /tts/createTask and /tts/queryTask
// ============================================================================

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_create_task_with_segmented_text(ctx: &TestContext) {
    provider_mocks::mock_create_task(&ctx.provider, TEST_TASK_ID).await;

    let response = ctx
        .client
        .post_form(
            "/tts/createTask",
            &[
                ("text", "First sentence.\n\nSecond paragraph."),
                ("token", TEST_ACCESS_TOKEN),
                ("voice", "4"),
            ],
            Some(&ctx.csrf_token),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(response.body.as_ref().unwrap()["task_id"], TEST_TASK_ID);

    let requests = ctx.provider.received_requests().await.unwrap();
    let create = requests
        .iter()
        .find(|r| r.url.path() == CREATE_PATH)
        .expect("create task request not sent");
    let payload: Value = serde_json::from_slice(&create.body).unwrap();

    assert_eq!(payload["text"], serde_json::json!(["First sentence. Second paragraph."]));
    assert_eq!(payload["format"], "mp3-16k");
    assert_eq!(payload["voice"], 4);
    assert_eq!(payload["lang"], "zh");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_empty_text_for_task(ctx: &TestContext) {
    let response = ctx
        .client
        .post_form(
            "/tts/createTask",
            &[("text", ""), ("token", TEST_ACCESS_TOKEN)],
            Some(&ctx.csrf_token),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(ctx.provider_calls().await, 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_task_status_from_provider(ctx: &TestContext) {
    let speech_url = ctx.audio_url("out.mp3");
    provider_mocks::mock_query_success(&ctx.provider, TEST_TASK_ID, &speech_url).await;

    let response = ctx
        .client
        .post_form(
            "/tts/queryTask",
            &[("task_ids", TEST_TASK_ID), ("token", TEST_ACCESS_TOKEN)],
            Some(&ctx.csrf_token),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let tasks = response.body.as_ref().unwrap()["tasks_info"]
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["task_status"], "Success");
    assert_eq!(tasks[0]["task_result"]["speech_url"], speech_url.as_str());
}

// ============================================================================
// /tts/playAudio
// ============================================================================

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_refuse_audio_from_foreign_origin(ctx: &TestContext) {
    let path = format!(
        "/tts/playAudio?url={}",
        urlencoding::encode("http://evil.example.com/steal.mp3")
    );

    let response = ctx.client.get_with_csrf(&path, &ctx.csrf_token).await.unwrap();

    response
        .assert_status(StatusCode::FORBIDDEN)
        .assert_error_message("Invalid audio URL");
    assert_eq!(ctx.provider_calls().await, 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_proxy_audio_from_allowed_origin(ctx: &TestContext) {
    provider_mocks::mock_audio_file(&ctx.provider, "out.mp3").await;
    let path = format!(
        "/tts/playAudio?url={}",
        urlencoding::encode(&ctx.audio_url("out.mp3"))
    );

    let response = ctx.client.get_with_csrf(&path, &ctx.csrf_token).await.unwrap();

    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "audio/mpeg")
        .assert_header("accept-ranges", "bytes")
        .assert_header_exists("cache-control");
    assert_eq!(response.body_bytes, AUDIO_BYTES);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_accept_csrf_token_in_query_for_audio(ctx: &TestContext) {
    provider_mocks::mock_audio_file(&ctx.provider, "out.mp3").await;
    let path = format!(
        "/tts/playAudio?url={}&_csrf={}",
        urlencoding::encode(&ctx.audio_url("out.mp3")),
        urlencoding::encode(&ctx.csrf_token)
    );

    let response = ctx.client.get(&path).await.unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(response.body_bytes, AUDIO_BYTES);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_proxy_audio_requested_by_form_post(ctx: &TestContext) {
    provider_mocks::mock_audio_file(&ctx.provider, "out.mp3").await;
    let url = ctx.audio_url("out.mp3");

    let response = ctx
        .client
        .post_form("/tts/playAudio", &[("url", url.as_str())], Some(&ctx.csrf_token))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let expected_length = AUDIO_BYTES.len().to_string();
    assert_eq!(response.header("content-length"), Some(&expected_length));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_require_url_for_audio_proxy(ctx: &TestContext) {
    let response = ctx
        .client
        .get_with_csrf("/tts/playAudio", &ctx.csrf_token)
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("Missing URL parameter");
}
