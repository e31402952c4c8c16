use crate::domain::relay::dto::{TaskInfo, TokenGrant};
use crate::domain::tts::{AccessToken, Audio, VoiceParams};
use async_trait::async_trait;
use reqwest::Url;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Non-200 answer, or an error payload where a result was expected
    #[error("HTTP {status}, Response: {body}")]
    Upstream { status: u16, body: String },
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Remote text-to-speech provider.
///
/// Implementations own the wire format and the per-call deadlines. Nothing
/// returned here may contain the caller's API credentials.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    /// Client-credentials grant
    async fn fetch_token(&self, api_key: &str, secret_key: &str)
        -> Result<TokenGrant, ProviderError>;

    /// Single-shot synthesis of a short text
    async fn synthesize(
        &self,
        text: &str,
        token: &AccessToken,
        voice: &VoiceParams,
    ) -> Result<Audio, ProviderError>;

    /// Submit pre-segmented text to the long-text API, returns the task id
    async fn create_task(
        &self,
        segments: &[String],
        token: &AccessToken,
        voice: &VoiceParams,
        format: &str,
    ) -> Result<String, ProviderError>;

    async fn query_tasks(
        &self,
        task_ids: &[String],
        token: &AccessToken,
    ) -> Result<Vec<TaskInfo>, ProviderError>;

    /// Download synthesized audio. `url` has already passed the origin check.
    async fn fetch_audio(&self, url: &Url) -> Result<Audio, ProviderError>;
}
