use crate::infrastructure::relay_client::RelayClientError;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt cache index: {0}")]
    Index(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("Nothing to read")]
    EmptyText,

    #[error(transparent)]
    Relay(#[from] RelayClientError),

    #[error("Synthesis did not finish after {attempts} status checks")]
    SynthesisTimeout { attempts: u32 },

    #[error("Synthesis failed: {0}")]
    JobFailed(String),

    /// A newer request took over. Callers drop this silently.
    #[error("Synthesis cancelled")]
    Cancelled,

    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("speech engine error: {0}")]
    Engine(String),
    #[error("audio output error: {0}")]
    Sink(String),
    /// The session was replaced before its audio could start
    #[error("playback session superseded")]
    Superseded,
}

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("Unknown playable: {0}")]
    UnknownPlayable(String),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// Failure inside a host-provided text source
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
