use super::cache::{CacheValue, LocalCache};
use super::error::SynthesisError;
use super::playback::Utterance;
use super::text::{cache_key, normalize};
use crate::domain::relay::DEFAULT_AUDIO_FORMAT;
use crate::domain::tts::{Audio, Backend, JobState, SynthesisRequest};
use crate::infrastructure::relay_client::RelayClient;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 30;

/// Where a synthesis flow currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisState {
    Idle,
    ResolvingCache,
    AcquiringToken,
    SubmittingJob,
    Polling { attempt: u32 },
    FetchingAudio,
    Ready,
    Failed(String),
}

/// Result of a finished flow, ready to hand to the playback controller
#[derive(Debug, Clone, PartialEq)]
pub enum Synthesized {
    Utterance(Utterance),
    Audio(Audio),
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub audio_format: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            audio_format: DEFAULT_AUDIO_FORMAT.to_string(),
        }
    }
}

/// API credentials for the remote provider
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Runs one synthesis flow per request: cache lookup, then token, job,
/// polling and download through the relay.
pub struct Orchestrator {
    relay: Arc<dyn RelayClient>,
    cache: Arc<LocalCache>,
    credentials: Credentials,
    config: OrchestratorConfig,
    state: watch::Sender<SynthesisState>,
}

impl Orchestrator {
    pub fn new(
        relay: Arc<dyn RelayClient>,
        cache: Arc<LocalCache>,
        credentials: Credentials,
        config: OrchestratorConfig,
    ) -> Self {
        let (state, _) = watch::channel(SynthesisState::Idle);
        Self {
            relay,
            cache,
            credentials,
            config,
            state,
        }
    }

    /// Observe state transitions of the current flow
    pub fn subscribe(&self) -> watch::Receiver<SynthesisState> {
        self.state.subscribe()
    }

    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> Result<Synthesized, SynthesisError> {
        let result = self.run(request, cancel).await;
        match &result {
            Ok(_) => {}
            Err(SynthesisError::Cancelled) => {
                tracing::debug!("Synthesis flow cancelled");
            }
            Err(e) => {
                tracing::warn!(error = %e, backend = %request.backend, "Synthesis failed");
                self.state.send_replace(SynthesisState::Failed(e.to_string()));
            }
        }
        result
    }

    async fn run(
        &self,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> Result<Synthesized, SynthesisError> {
        self.transition(cancel, SynthesisState::ResolvingCache)?;

        let text = normalize(&request.text);
        if text.is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        if request.backend == Backend::Local {
            self.transition(cancel, SynthesisState::Ready)?;
            return Ok(Synthesized::Utterance(Utterance {
                text,
                voice: request.voice.clone(),
            }));
        }

        let key = cache_key(&text, &request.voice);
        if let Some(entry) = self.cache.get(&key).await? {
            tracing::info!(key = %key, "Serving synthesis from cache");
            let audio = match entry.value {
                CacheValue::Bytes { content_type, data } => Audio::new(content_type, data),
                CacheValue::Url(url) => {
                    self.transition(cancel, SynthesisState::FetchingAudio)?;
                    self.guarded(cancel, self.relay.proxy_audio(&url)).await?
                }
            };
            self.transition(cancel, SynthesisState::Ready)?;
            return Ok(Synthesized::Audio(audio));
        }

        self.transition(cancel, SynthesisState::AcquiringToken)?;
        let token = self
            .guarded(
                cancel,
                self.relay
                    .fetch_token(&self.credentials.api_key, &self.credentials.secret_key),
            )
            .await?;

        self.transition(cancel, SynthesisState::SubmittingJob)?;
        let job_id = self
            .guarded(
                cancel,
                self.relay
                    .create_job(&text, &token, &request.voice, &self.config.audio_format),
            )
            .await?;
        tracing::info!(job_id = %job_id, text_length = text.chars().count(), "Synthesis job submitted");

        let mut audio_url = None;
        for attempt in 1..=self.config.max_poll_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Err(SynthesisError::Cancelled),
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }

            self.transition(cancel, SynthesisState::Polling { attempt })?;
            let job = self
                .guarded(cancel, self.relay.query_job(&job_id, &token))
                .await?;

            match job.state {
                JobState::Succeeded => {
                    let url = job.audio_url.ok_or_else(|| {
                        SynthesisError::JobFailed("job finished without audio".to_string())
                    })?;
                    audio_url = Some(url);
                    break;
                }
                JobState::Failed => {
                    return Err(SynthesisError::JobFailed(
                        job.error.unwrap_or_else(|| "unknown provider error".to_string()),
                    ));
                }
                JobState::Queued | JobState::Running => {
                    tracing::debug!(job_id = %job_id, attempt, state = ?job.state, "Job not ready");
                }
            }
        }

        let Some(audio_url) = audio_url else {
            return Err(SynthesisError::SynthesisTimeout {
                attempts: self.config.max_poll_attempts,
            });
        };

        self.transition(cancel, SynthesisState::FetchingAudio)?;
        let audio = self
            .guarded(cancel, self.relay.proxy_audio(&audio_url))
            .await?;

        let value = CacheValue::Bytes {
            content_type: audio.content_type.clone(),
            data: audio.data.clone(),
        };
        if let Err(e) = self.cache.put(&key, value).await {
            // The audio is still good, only the next read pays again
            tracing::warn!(error = %e, key = %key, "Failed to cache synthesized audio");
        }

        self.transition(cancel, SynthesisState::Ready)?;
        Ok(Synthesized::Audio(audio))
    }

    fn transition(
        &self,
        cancel: &CancellationToken,
        next: SynthesisState,
    ) -> Result<(), SynthesisError> {
        if cancel.is_cancelled() {
            return Err(SynthesisError::Cancelled);
        }
        tracing::debug!(state = ?next, "Synthesis state");
        self.state.send_replace(next);
        Ok(())
    }

    /// Run a relay call unless the flow is cancelled first
    async fn guarded<T, E>(
        &self,
        cancel: &CancellationToken,
        call: impl Future<Output = Result<T, E>>,
    ) -> Result<T, SynthesisError>
    where
        SynthesisError: From<E>,
    {
        if cancel.is_cancelled() {
            return Err(SynthesisError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SynthesisError::Cancelled),
            result = call => result.map_err(SynthesisError::from),
        }
    }
}
