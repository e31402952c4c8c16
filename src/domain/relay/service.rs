use super::dto::{TaskInfo, TokenGrant};
use super::error::RelayError;
use super::origin::AudioOriginPolicy;
use super::segmentation::split_into_segments;
use crate::domain::tts::{AccessToken, Audio, SynthesisJob, VoiceParams};
use crate::infrastructure::provider::TtsProvider;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for the proxied audio cache, in bytes
const AUDIO_CACHE_MAX_BYTES: u64 = 256 * 1024 * 1024;
const AUDIO_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub const DEFAULT_AUDIO_FORMAT: &str = "mp3-16k";

/// Server-side relay between the reader and the TTS provider. Holds no
/// per-user state; credentials and tokens are consumed here and never echoed.
pub struct RelayService {
    provider: Arc<dyn TtsProvider>,
    origin_policy: AudioOriginPolicy,
    audio_cache: Option<Cache<String, Audio>>,
}

impl RelayService {
    pub fn new(
        provider: Arc<dyn TtsProvider>,
        origin_policy: AudioOriginPolicy,
        audio_cache_enabled: bool,
    ) -> Self {
        let audio_cache = if audio_cache_enabled {
            Some(
                Cache::builder()
                    .weigher(|_url: &String, audio: &Audio| {
                        u32::try_from(audio.len()).unwrap_or(u32::MAX)
                    })
                    .max_capacity(AUDIO_CACHE_MAX_BYTES)
                    .time_to_live(AUDIO_CACHE_TTL)
                    .build(),
            )
        } else {
            None
        };

        Self {
            provider,
            origin_policy,
            audio_cache,
        }
    }
}

#[async_trait]
pub trait RelayServiceApi: Send + Sync {
    /// Exchange API credentials for a provider access token
    async fn fetch_token(&self, api_key: &str, secret_key: &str)
        -> Result<TokenGrant, RelayError>;

    /// Synthesize a short text in one call
    async fn synthesize_direct(
        &self,
        text: &str,
        token: &AccessToken,
        voice: &VoiceParams,
    ) -> Result<Audio, RelayError>;

    /// Segment `text` and submit it as an asynchronous job
    async fn create_job(
        &self,
        text: &str,
        token: &AccessToken,
        voice: &VoiceParams,
        format: &str,
    ) -> Result<String, RelayError>;

    /// Raw status of one or more jobs, in provider order
    async fn query_tasks(
        &self,
        task_ids: &[String],
        token: &AccessToken,
    ) -> Result<Vec<TaskInfo>, RelayError>;

    async fn query_job(&self, job_id: &str, token: &AccessToken)
        -> Result<SynthesisJob, RelayError>;

    /// Fetch audio from an allow-listed storage origin
    async fn proxy_audio(&self, url: &str) -> Result<Audio, RelayError>;
}

#[async_trait]
impl RelayServiceApi for RelayService {
    async fn fetch_token(
        &self,
        api_key: &str,
        secret_key: &str,
    ) -> Result<TokenGrant, RelayError> {
        if api_key.trim().is_empty() || secret_key.trim().is_empty() {
            return Err(RelayError::Credential);
        }

        let grant = self.provider.fetch_token(api_key, secret_key).await?;
        tracing::info!(expires_in = ?grant.expires_in, "Provider access token issued");
        Ok(grant)
    }

    async fn synthesize_direct(
        &self,
        text: &str,
        token: &AccessToken,
        voice: &VoiceParams,
    ) -> Result<Audio, RelayError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RelayError::BadRequest("Missing required parameters".to_string()));
        }
        Self::require_token(token)?;

        let audio = self.provider.synthesize(text, token, voice).await?;
        tracing::info!(
            text_length = text.chars().count(),
            audio_size = audio.len(),
            content_type = %audio.content_type,
            "Short-text synthesis completed"
        );
        Ok(audio)
    }

    async fn create_job(
        &self,
        text: &str,
        token: &AccessToken,
        voice: &VoiceParams,
        format: &str,
    ) -> Result<String, RelayError> {
        Self::require_token(token)?;

        let segments = split_into_segments(text);
        if segments.is_empty() {
            return Err(RelayError::BadRequest(
                "No valid text segments to synthesize".to_string(),
            ));
        }

        let task_id = self
            .provider
            .create_task(&segments, token, voice, format)
            .await?;

        tracing::info!(
            task_id = %task_id,
            segment_count = segments.len(),
            "Synthesis job created"
        );
        Ok(task_id)
    }

    async fn query_tasks(
        &self,
        task_ids: &[String],
        token: &AccessToken,
    ) -> Result<Vec<TaskInfo>, RelayError> {
        Self::require_token(token)?;
        if task_ids.is_empty() {
            return Err(RelayError::BadRequest("Missing required parameters".to_string()));
        }

        Ok(self.provider.query_tasks(task_ids, token).await?)
    }

    async fn query_job(
        &self,
        job_id: &str,
        token: &AccessToken,
    ) -> Result<SynthesisJob, RelayError> {
        let tasks = self.query_tasks(&[job_id.to_string()], token).await?;

        let job = tasks
            .into_iter()
            .find(|task| task.task_id == job_id)
            .map(TaskInfo::into_job)
            .unwrap_or_else(|| SynthesisJob::queued(job_id));

        tracing::debug!(job_id = %job_id, state = ?job.state, "Synthesis job polled");
        Ok(job)
    }

    async fn proxy_audio(&self, url: &str) -> Result<Audio, RelayError> {
        let Some(parsed) = self.origin_policy.check(url) else {
            tracing::warn!(url = %url, "Rejected audio proxy request for foreign origin");
            return Err(RelayError::Forbidden(url.to_string()));
        };

        if let Some(cache) = &self.audio_cache {
            if let Some(audio) = cache.get(parsed.as_str()).await {
                tracing::debug!(url = %parsed, audio_size = audio.len(), "Audio proxy cache hit");
                return Ok(audio);
            }
        }

        let audio = self.provider.fetch_audio(&parsed).await?;

        if let Some(cache) = &self.audio_cache {
            cache.insert(parsed.to_string(), audio.clone()).await;
        }

        tracing::info!(url = %parsed, audio_size = audio.len(), "Audio proxied");
        Ok(audio)
    }
}

impl RelayService {
    fn require_token(token: &AccessToken) -> Result<(), RelayError> {
        if token.as_str().trim().is_empty() {
            return Err(RelayError::BadRequest("Missing required parameters".to_string()));
        }
        Ok(())
    }
}
