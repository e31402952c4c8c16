use super::cache::{CacheStore, LocalCache};
use super::error::{PlaybackError, ReaderError, SynthesisError};
use super::orchestrator::{Orchestrator, OrchestratorConfig, Synthesized};
use super::playback::{
    AudioSink, ControlView, PlaybackController, PlaybackHandle, SpeechEngine, ToggleOutcome,
};
use super::registry::{PlayableRegistry, TextProvider};
use super::settings::ReaderSettings;
use crate::domain::tts::{Backend, SynthesisRequest};
use crate::infrastructure::relay_client::RelayClient;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What a click ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Started,
    Paused,
    Resumed,
    /// Clicked while loading, or resuming failed: nothing is playing now
    Stopped,
    /// A later click took over while this one was loading
    Superseded,
}

/// Entry point for the host application's read-aloud controls
pub struct Reader {
    settings: ReaderSettings,
    registry: PlayableRegistry,
    orchestrator: Arc<Orchestrator>,
    controller: Arc<PlaybackController>,
    engine: Arc<dyn SpeechEngine>,
    sink: Arc<dyn AudioSink>,
    current_flow: Mutex<Option<Flow>>,
}

/// A synthesis flow still in progress
struct Flow {
    id: Uuid,
    cancel: CancellationToken,
}

impl Reader {
    pub fn new(
        settings: ReaderSettings,
        orchestrator: Arc<Orchestrator>,
        controller: Arc<PlaybackController>,
        engine: Arc<dyn SpeechEngine>,
        sink: Arc<dyn AudioSink>,
    ) -> Self {
        Self {
            settings,
            registry: PlayableRegistry::new(),
            orchestrator,
            controller,
            engine,
            sink,
            current_flow: Mutex::new(None),
        }
    }

    /// Wire a reader from its settings with default polling
    pub fn from_settings(
        settings: ReaderSettings,
        relay: Arc<dyn RelayClient>,
        store: Arc<dyn CacheStore>,
        engine: Arc<dyn SpeechEngine>,
        sink: Arc<dyn AudioSink>,
    ) -> Self {
        if settings.service == Backend::Remote && !settings.has_credentials() {
            tracing::warn!("Remote backend selected without API credentials");
        }

        let cache = Arc::new(LocalCache::new(store, settings.cache_limits()));
        let orchestrator = Arc::new(Orchestrator::new(
            relay,
            cache,
            settings.credentials(),
            OrchestratorConfig::default(),
        ));
        Self::new(
            settings,
            orchestrator,
            Arc::new(PlaybackController::new()),
            engine,
            sink,
        )
    }

    pub fn controller(&self) -> &Arc<PlaybackController> {
        &self.controller
    }

    pub fn register_playable(
        &self,
        id: &str,
        text: Arc<dyn TextProvider>,
        view: Arc<dyn ControlView>,
    ) -> bool {
        self.registry.register_playable(id, text, view)
    }

    /// Forget a playable, stopping it first if it is the one playing
    pub fn unregister_playable(&self, id: &str) -> bool {
        if self.controller.active_control().as_deref() == Some(id) {
            self.stop();
        }
        self.registry.unregister_playable(id)
    }

    /// Handle a click on the control of playable `id`
    pub async fn click(&self, id: &str) -> Result<ClickOutcome, ReaderError> {
        let playable = self
            .registry
            .get(id)
            .ok_or_else(|| ReaderError::UnknownPlayable(id.to_string()))?;

        match self.controller.toggle(id) {
            ToggleOutcome::Paused => return Ok(ClickOutcome::Paused),
            ToggleOutcome::Resumed => return Ok(ClickOutcome::Resumed),
            ToggleOutcome::Loading => {
                self.stop();
                return Ok(ClickOutcome::Stopped);
            }
            ToggleOutcome::ResumeFailed => return Ok(ClickOutcome::Stopped),
            ToggleOutcome::NotActive => {}
        }

        let (flow_id, cancel) = self.replace_flow();
        let ticket = self.controller.begin_loading(id, playable.view.clone());

        let text = match playable.text.text() {
            Ok(text) => text,
            Err(e) => {
                self.controller.fail(&ticket, &e.to_string());
                self.finish_flow(flow_id);
                return Err(e);
            }
        };

        tracing::info!(
            id = %id,
            backend = %self.settings.service,
            text_length = text.chars().count(),
            "Read aloud requested"
        );

        let request =
            SynthesisRequest::new(text, self.settings.voice_params(), self.settings.service);
        let result = self.orchestrator.synthesize(&request, &cancel).await;
        self.finish_flow(flow_id);

        let synthesized = match result {
            Ok(synthesized) => synthesized,
            Err(SynthesisError::Cancelled) => return Ok(ClickOutcome::Superseded),
            Err(e) => {
                self.controller.fail(&ticket, &e.to_string());
                return Err(e.into());
            }
        };

        if cancel.is_cancelled() {
            return Ok(ClickOutcome::Superseded);
        }

        let handle = match synthesized {
            Synthesized::Utterance(utterance) => {
                PlaybackHandle::local(self.engine.clone(), utterance)
            }
            Synthesized::Audio(audio) => PlaybackHandle::remote(self.sink.clone(), audio),
        };

        match self.controller.play(&ticket, handle) {
            Ok(()) => Ok(ClickOutcome::Started),
            Err(PlaybackError::Superseded) => Ok(ClickOutcome::Superseded),
            Err(e) => Err(e.into()),
        }
    }

    /// Abandon any pending flow and stop playback
    pub fn stop(&self) {
        if let Some(flow) = self.current_flow.lock().take() {
            flow.cancel.cancel();
        }
        self.controller.stop();
    }

    /// Cancel the previous flow and register a fresh one
    fn replace_flow(&self) -> (Uuid, CancellationToken) {
        let flow = Flow {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
        };
        let handle = (flow.id, flow.cancel.clone());
        if let Some(previous) = self.current_flow.lock().replace(flow) {
            previous.cancel.cancel();
        }
        handle
    }

    fn finish_flow(&self, id: Uuid) {
        let mut current = self.current_flow.lock();
        if current.as_ref().map(|f| f.id) == Some(id) {
            current.take();
        }
    }
}
