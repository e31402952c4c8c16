use crate::domain::tts::{AccessToken, Audio, SynthesisJob, VoiceParams};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum RelayClientError {
    /// The relay answered with an error status and its `{"error": ..}` body
    #[error("relay returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("relay request timed out after {0}s")]
    Timeout(u64),
    #[error("relay transport error: {0}")]
    Transport(String),
    #[error("unexpected relay response: {0}")]
    Decode(String),
}

/// Reader-side view of the relay endpoints.
///
/// Every call carries the anti-forgery token the host page was issued.
#[async_trait]
pub trait RelayClient: Send + Sync {
    async fn fetch_token(
        &self,
        api_key: &str,
        secret_key: &str,
    ) -> Result<AccessToken, RelayClientError>;

    async fn synthesize_direct(
        &self,
        text: &str,
        token: &AccessToken,
        voice: &VoiceParams,
    ) -> Result<Audio, RelayClientError>;

    /// Submit a long text, returns the job id
    async fn create_job(
        &self,
        text: &str,
        token: &AccessToken,
        voice: &VoiceParams,
        format: &str,
    ) -> Result<String, RelayClientError>;

    async fn query_job(
        &self,
        job_id: &str,
        token: &AccessToken,
    ) -> Result<SynthesisJob, RelayClientError>;

    /// Download audio through the relay's storage proxy
    async fn proxy_audio(&self, url: &str) -> Result<Audio, RelayClientError>;
}
