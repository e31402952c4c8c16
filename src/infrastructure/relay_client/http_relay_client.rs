use super::client::{RelayClient, RelayClientError};
use crate::domain::relay::dto::{CreateTaskResponse, TaskQueryResponse, TokenGrant};
use crate::domain::tts::{AccessToken, Audio, SynthesisJob, VoiceParams};
use crate::error::ErrorResponse;
use crate::infrastructure::auth::X_CSRF_TOKEN;
use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);
const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Talks to a running relay over HTTP
pub struct HttpRelayClient {
    base_url: String,
    csrf_token: String,
    http_client: reqwest::Client,
}

impl HttpRelayClient {
    pub fn new(base_url: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            csrf_token: csrf_token.into(),
            http_client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/tts/{}", self.base_url, name)
    }

    fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> RelayClientError {
        if err.is_timeout() {
            RelayClientError::Timeout(timeout.as_secs())
        } else {
            RelayClientError::Transport(err.to_string())
        }
    }

    /// Send with the anti-forgery header and turn error statuses into
    /// `RelayClientError::Status` carrying the relay's message
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> Result<reqwest::Response, RelayClientError> {
        let response = request
            .header(X_CSRF_TOKEN, &self.csrf_token)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::map_reqwest_error(e, timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .map_err(|e| Self::map_reqwest_error(e, timeout))?;
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or(body);

        tracing::warn!(status = status.as_u16(), error = %message, "Relay call failed");

        Err(RelayClientError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        name: &str,
        form: &[(&str, String)],
        timeout: Duration,
    ) -> Result<T, RelayClientError> {
        let request = self.http_client.post(self.endpoint(name)).form(form);
        let response = self.send(request, timeout).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RelayClientError::Decode(e.to_string()))
    }

    async fn read_audio(
        response: reqwest::Response,
        timeout: Duration,
    ) -> Result<Audio, RelayClientError> {
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_AUDIO_CONTENT_TYPE)
            .to_string();
        let data = response
            .bytes()
            .await
            .map_err(|e| Self::map_reqwest_error(e, timeout))?;
        Ok(Audio::new(content_type, data))
    }
}

fn voice_fields(voice: &VoiceParams) -> Vec<(&'static str, String)> {
    vec![
        ("voice", voice.voice.clone()),
        ("speed", voice.rate.to_string()),
        ("pitch", voice.pitch.to_string()),
        ("volume", voice.volume.to_string()),
    ]
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn fetch_token(
        &self,
        api_key: &str,
        secret_key: &str,
    ) -> Result<AccessToken, RelayClientError> {
        let form = [
            ("api_key", api_key.to_string()),
            ("secret_key", secret_key.to_string()),
        ];
        let grant: TokenGrant = self.post_form("token", &form, TOKEN_TIMEOUT).await?;

        if grant.access_token.is_empty() {
            return Err(RelayClientError::Decode(
                "token response has no access token".to_string(),
            ));
        }
        Ok(AccessToken::new(grant.access_token))
    }

    async fn synthesize_direct(
        &self,
        text: &str,
        token: &AccessToken,
        voice: &VoiceParams,
    ) -> Result<Audio, RelayClientError> {
        let mut form = vec![
            ("text", text.to_string()),
            ("token", token.as_str().to_string()),
            ("lang", voice.lang.clone()),
        ];
        form.extend(voice_fields(voice));

        let request = self
            .http_client
            .post(self.endpoint("synthesize"))
            .form(&form);
        let response = self.send(request, SYNTHESIS_TIMEOUT).await?;
        Self::read_audio(response, SYNTHESIS_TIMEOUT).await
    }

    async fn create_job(
        &self,
        text: &str,
        token: &AccessToken,
        voice: &VoiceParams,
        format: &str,
    ) -> Result<String, RelayClientError> {
        let mut form = vec![
            ("text", text.to_string()),
            ("token", token.as_str().to_string()),
            ("format", format.to_string()),
        ];
        form.extend(voice_fields(voice));

        let created: CreateTaskResponse = self
            .post_form("createTask", &form, SYNTHESIS_TIMEOUT)
            .await?;
        Ok(created.task_id)
    }

    async fn query_job(
        &self,
        job_id: &str,
        token: &AccessToken,
    ) -> Result<SynthesisJob, RelayClientError> {
        let form = [
            ("token", token.as_str().to_string()),
            ("task_ids", job_id.to_string()),
        ];
        let response: TaskQueryResponse = self
            .post_form("queryTask", &form, SYNTHESIS_TIMEOUT)
            .await?;

        Ok(response
            .tasks_info
            .into_iter()
            .find(|info| info.task_id == job_id)
            .map(|info| info.into_job())
            .unwrap_or_else(|| SynthesisJob::queued(job_id)))
    }

    async fn proxy_audio(&self, url: &str) -> Result<Audio, RelayClientError> {
        let request = self
            .http_client
            .get(self.endpoint("playAudio"))
            .query(&[("url", url)]);
        let response = self.send(request, SYNTHESIS_TIMEOUT).await?;

        if response.status() != StatusCode::OK {
            return Err(RelayClientError::Decode(format!(
                "unexpected status {} for proxied audio",
                response.status()
            )));
        }
        Self::read_audio(response, SYNTHESIS_TIMEOUT).await
    }
}
