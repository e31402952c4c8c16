use super::error::PlaybackError;
use crate::domain::tts::{Audio, VoiceParams};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

pub type SessionId = Uuid;

/// Visual state of a read-aloud control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlState {
    Idle,
    Loading,
    Playing,
    Paused,
    /// Back to idle, with a message for the user
    Failed(String),
}

/// Receives visual state changes for one control
pub trait ControlView: Send + Sync {
    fn render(&self, state: &ControlState);
}

/// Text spoken by the on-device engine
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: VoiceParams,
}

/// On-device speech synthesis.
///
/// Implementations report completion through
/// [`PlaybackController::on_ended`] / [`PlaybackController::on_error`] with
/// the session id they were started with.
pub trait SpeechEngine: Send + Sync {
    fn speak(&self, utterance: &Utterance, session: SessionId) -> Result<(), PlaybackError>;
    fn pause(&self);
    fn resume(&self) -> Result<(), PlaybackError>;
    /// Stop and drop any queued speech
    fn cancel(&self);
}

/// Output for fetched audio, the same contract as [`SpeechEngine`]
pub trait AudioSink: Send + Sync {
    fn play(&self, audio: &Audio, session: SessionId) -> Result<(), PlaybackError>;
    fn pause(&self);
    fn resume(&self) -> Result<(), PlaybackError>;
    /// Rewind to the start
    fn reset(&self);
    /// Free the loaded audio and detach event handlers
    fn release(&self);
}

/// What the active session is playing
#[derive(Clone)]
pub enum PlaybackHandle {
    Local {
        engine: Arc<dyn SpeechEngine>,
        utterance: Utterance,
    },
    Remote {
        sink: Arc<dyn AudioSink>,
        audio: Audio,
    },
}

impl PlaybackHandle {
    pub fn local(engine: Arc<dyn SpeechEngine>, utterance: Utterance) -> Self {
        PlaybackHandle::Local { engine, utterance }
    }

    pub fn remote(sink: Arc<dyn AudioSink>, audio: Audio) -> Self {
        PlaybackHandle::Remote { sink, audio }
    }

    fn start(&self, session: SessionId) -> Result<(), PlaybackError> {
        match self {
            PlaybackHandle::Local { engine, utterance } => engine.speak(utterance, session),
            PlaybackHandle::Remote { sink, audio } => sink.play(audio, session),
        }
    }

    fn pause(&self) {
        match self {
            PlaybackHandle::Local { engine, .. } => engine.pause(),
            PlaybackHandle::Remote { sink, .. } => sink.pause(),
        }
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        match self {
            PlaybackHandle::Local { engine, .. } => engine.resume(),
            PlaybackHandle::Remote { sink, .. } => sink.resume(),
        }
    }

    fn stop(&self) {
        match self {
            PlaybackHandle::Local { engine, .. } => engine.cancel(),
            PlaybackHandle::Remote { sink, .. } => {
                sink.pause();
                sink.reset();
                sink.release();
            }
        }
    }
}

impl std::fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackHandle::Local { utterance, .. } => f
                .debug_struct("Local")
                .field("text_length", &utterance.text.chars().count())
                .finish(),
            PlaybackHandle::Remote { audio, .. } => f
                .debug_struct("Remote")
                .field("content_type", &audio.content_type)
                .field("size", &audio.len())
                .finish(),
        }
    }
}

/// Proof of a `begin_loading` call, used to notice supersession
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    pub session: SessionId,
    pub control: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Loading,
    Playing,
    Paused,
}

struct ActiveSession {
    id: SessionId,
    control: String,
    view: Arc<dyn ControlView>,
    handle: Option<PlaybackHandle>,
    phase: Phase,
}

impl ActiveSession {
    /// Release the audio and reset the control. Must run outside the lock.
    fn teardown(self, final_state: ControlState) {
        if let Some(handle) = &self.handle {
            handle.stop();
        }
        self.view.render(&final_state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Paused,
    Resumed,
    /// The control is still loading its audio
    Loading,
    /// The control was not active. Any other session has been stopped.
    NotActive,
    /// Resuming failed. The session was released and the control shows the error.
    ResumeFailed,
}

/// Owns the single playback session.
///
/// State lives behind a mutex that is released before any engine, sink or
/// view callback runs, so those may call back into the controller.
#[derive(Default)]
pub struct PlaybackController {
    active: Mutex<Option<ActiveSession>>,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tear down the active session and start a new one in `Loading`
    pub fn begin_loading(&self, control: &str, view: Arc<dyn ControlView>) -> SessionTicket {
        let ticket = SessionTicket {
            session: Uuid::new_v4(),
            control: control.to_string(),
        };

        let previous = self.active.lock().replace(ActiveSession {
            id: ticket.session,
            control: ticket.control.clone(),
            view: view.clone(),
            handle: None,
            phase: Phase::Loading,
        });

        if let Some(previous) = previous {
            tracing::debug!(control = %previous.control, "Stopping previous session");
            previous.teardown(ControlState::Idle);
        }
        view.render(&ControlState::Loading);

        tracing::debug!(control = %control, session = %ticket.session, "Session loading");
        ticket
    }

    /// Start `handle` for the session `ticket` was issued for
    pub fn play(&self, ticket: &SessionTicket, handle: PlaybackHandle) -> Result<(), PlaybackError> {
        let mut active = self.active.lock();
        let claimed = active
            .as_mut()
            .filter(|s| s.id == ticket.session)
            .map(|session| {
                session.phase = Phase::Playing;
                (session.handle.replace(handle.clone()), session.view.clone())
            });
        drop(active);

        let Some((previous_handle, view)) = claimed else {
            tracing::debug!(session = %ticket.session, "Dropping audio of superseded session");
            handle.stop();
            return Err(PlaybackError::Superseded);
        };

        if let Some(previous) = previous_handle {
            previous.stop();
        }

        if let Err(e) = handle.start(ticket.session) {
            tracing::warn!(error = %e, "Playback failed to start");
            self.on_error(ticket.session, &e.to_string());
            return Err(e);
        }

        // A click may have replaced us while the handle was starting
        if !self.is_current(ticket.session) {
            handle.stop();
            return Err(PlaybackError::Superseded);
        }

        view.render(&ControlState::Playing);
        tracing::info!(control = %ticket.control, handle = ?handle, "Playback started");
        Ok(())
    }

    /// Start playing right away, without a loading phase
    pub fn start(
        &self,
        control: &str,
        view: Arc<dyn ControlView>,
        handle: PlaybackHandle,
    ) -> Result<SessionTicket, PlaybackError> {
        let ticket = self.begin_loading(control, view);
        self.play(&ticket, handle)?;
        Ok(ticket)
    }

    /// Pause or resume `control` when it owns the session. Otherwise stop
    /// whatever is active so the caller can start a new session.
    pub fn toggle(&self, control: &str) -> ToggleOutcome {
        let mut active = self.active.lock();
        let owned = active
            .as_ref()
            .map(|s| s.control == control)
            .unwrap_or(false);
        if !owned {
            let previous = active.take();
            drop(active);
            if let Some(previous) = previous {
                previous.teardown(ControlState::Idle);
            }
            return ToggleOutcome::NotActive;
        }
        let Some(session) = active.as_mut() else {
            return ToggleOutcome::NotActive;
        };

        let (handle, view, id) = (session.handle.clone(), session.view.clone(), session.id);
        match (session.phase, handle) {
            (Phase::Playing, Some(handle)) => {
                session.phase = Phase::Paused;
                drop(active);
                handle.pause();
                view.render(&ControlState::Paused);
                ToggleOutcome::Paused
            }
            (Phase::Paused, Some(handle)) => {
                session.phase = Phase::Playing;
                drop(active);
                if let Err(e) = handle.resume() {
                    tracing::warn!(error = %e, "Resume failed");
                    self.on_error(id, &e.to_string());
                    return ToggleOutcome::ResumeFailed;
                }
                view.render(&ControlState::Playing);
                ToggleOutcome::Resumed
            }
            _ => ToggleOutcome::Loading,
        }
    }

    /// Release the active session, if any. Safe to call repeatedly.
    pub fn stop(&self) {
        let previous = self.active.lock().take();
        if let Some(previous) = previous {
            tracing::debug!(control = %previous.control, "Playback stopped");
            previous.teardown(ControlState::Idle);
        }
    }

    /// Natural end of playback. Events of stale sessions are ignored.
    pub fn on_ended(&self, session: SessionId) {
        if let Some(previous) = self.take_if_current(session) {
            tracing::debug!(control = %previous.control, "Playback finished");
            previous.teardown(ControlState::Idle);
        }
    }

    /// Playback error reported by an engine or sink
    pub fn on_error(&self, session: SessionId, message: &str) {
        if let Some(previous) = self.take_if_current(session) {
            tracing::warn!(control = %previous.control, error = %message, "Playback failed");
            previous.teardown(ControlState::Failed(message.to_string()));
        }
    }

    /// Loading failed before any audio existed
    pub fn fail(&self, ticket: &SessionTicket, message: &str) {
        self.on_error(ticket.session, message);
    }

    pub fn active_control(&self) -> Option<String> {
        self.active.lock().as_ref().map(|s| s.control.clone())
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.active.lock().as_ref().map(|s| s.id)
    }

    /// Visual state of the active control
    pub fn state(&self) -> Option<ControlState> {
        self.active.lock().as_ref().map(|s| match s.phase {
            Phase::Loading => ControlState::Loading,
            Phase::Playing => ControlState::Playing,
            Phase::Paused => ControlState::Paused,
        })
    }

    pub fn is_current(&self, session: SessionId) -> bool {
        self.active
            .lock()
            .as_ref()
            .map(|s| s.id == session)
            .unwrap_or(false)
    }

    fn take_if_current(&self, session: SessionId) -> Option<ActiveSession> {
        let mut active = self.active.lock();
        if active.as_ref().map(|s| s.id) == Some(session) {
            active.take()
        } else {
            None
        }
    }
}
