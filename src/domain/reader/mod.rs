//! Reader-side core: picks a backend, runs the remote synthesis flow,
//! caches the audio and owns the single playback session.

pub mod cache;
pub mod error;
pub mod orchestrator;
pub mod playback;
pub mod registry;
pub mod service;
pub mod settings;
pub mod text;

pub use cache::{CacheEntry, CacheLimits, CacheStore, CacheValue, DiskStore, LocalCache, MemoryStore};
pub use error::{CacheError, PlaybackError, ReaderError, SynthesisError};
pub use orchestrator::{
    Credentials, Orchestrator, OrchestratorConfig, SynthesisState, Synthesized,
};
pub use playback::{
    AudioSink, ControlState, ControlView, PlaybackController, PlaybackHandle, SessionId,
    SessionTicket, SpeechEngine, ToggleOutcome, Utterance,
};
pub use registry::{HtmlText, PlainText, PlayableRegistry, TextProvider};
pub use service::{ClickOutcome, Reader};
pub use settings::ReaderSettings;
pub use text::{cache_key, normalize, rolling_hash};
