use super::tts_provider::{ProviderError, TtsProvider};
use crate::domain::relay::dto::{TaskInfo, TaskQueryResponse, TokenGrant};
use crate::domain::relay::AudioOriginPolicy;
use crate::domain::tts::{AccessToken, Audio, VoiceParams};
use crate::infrastructure::config::ProviderConfig;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, redirect, StatusCode, Url};
use serde_json::{json, Value};
use std::time::Duration;

/// Client id reported to the provider for quota attribution
const CUID: &str = "readaloud";

/// `aue=6` asks the short-text endpoint for WAV output
const SHORT_TEXT_AUDIO_ENCODING: &str = "6";
const SHORT_TEXT_CONTENT_TYPE: &str = "audio/wav";

/// The long-text API only accepts Mandarin
const LONG_TEXT_LANG: &str = "zh";

const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/mpeg";
const MAX_AUDIO_REDIRECTS: usize = 5;

/// Baidu-style TTS provider: OAuth token endpoint, `text2audio` short-text
/// synthesis and the asynchronous long-text task API.
pub struct BaiduTtsProvider {
    config: ProviderConfig,
    http_client: reqwest::Client,
    audio_client: reqwest::Client,
}

impl BaiduTtsProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, reqwest::Error> {
        // Redirects from the storage host may only lead to other allowed origins
        let policy = AudioOriginPolicy::new(config.audio_allowed_origins.clone());
        let audio_client = reqwest::Client::builder()
            .redirect(redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() >= MAX_AUDIO_REDIRECTS || !policy.allows(attempt.url())
                {
                    attempt.stop()
                } else {
                    attempt.follow()
                }
            }))
            .build()?;

        Ok(Self {
            config,
            http_client: reqwest::Client::new(),
            audio_client,
        })
    }

    fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.config.token_timeout_secs)
    }

    fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.config.synthesis_timeout_secs)
    }

    fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(timeout.as_secs())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }

    /// Send a request and read the full body within the same deadline
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> Result<RawResponse, ProviderError> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::map_reqwest_error(e, timeout))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_reqwest_error(e, timeout))?;

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }

    /// Parse a JSON answer of the task API, rejecting non-200 and error payloads
    fn parse_task_api_json(raw: RawResponse) -> Result<Value, ProviderError> {
        let body_text = raw.body_text();
        if raw.status != StatusCode::OK {
            return Err(ProviderError::Upstream {
                status: raw.status.as_u16(),
                body: body_text,
            });
        }

        let value: Value =
            serde_json::from_str(&body_text).map_err(|_| ProviderError::Upstream {
                status: raw.status.as_u16(),
                body: body_text.clone(),
            })?;

        if let Some(message) = provider_error_message(&value) {
            tracing::warn!(error = %message, "Provider returned an error payload");
            return Err(ProviderError::Upstream {
                status: raw.status.as_u16(),
                body: body_text,
            });
        }

        Ok(value)
    }
}

struct RawResponse {
    status: StatusCode,
    content_type: Option<String>,
    body: Bytes,
}

impl RawResponse {
    fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false)
    }
}

/// Error description when `value` is one of the provider's error payloads
fn provider_error_message(value: &Value) -> Option<String> {
    if let Some(code) = value.get("error_code") {
        let message = value
            .get("error_msg")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error");
        return Some(format!("Baidu API error {}: {}", code, message));
    }
    match value.get("err_no").and_then(|n| n.as_i64()) {
        Some(0) | None => None,
        Some(code) => {
            let message = value
                .get("err_msg")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error");
            Some(format!("Baidu API error {}: {}", code, message))
        }
    }
}

/// Numeric voice ids go over the wire as numbers, anything else verbatim
fn voice_value(voice: &str) -> Value {
    voice
        .trim()
        .parse::<u32>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(voice))
}

#[async_trait]
impl TtsProvider for BaiduTtsProvider {
    async fn fetch_token(
        &self,
        api_key: &str,
        secret_key: &str,
    ) -> Result<TokenGrant, ProviderError> {
        tracing::debug!(
            api_key_prefix = %api_key.chars().take(4).collect::<String>(),
            "Requesting provider access token"
        );

        let request = self.http_client.post(&self.config.token_url).query(&[
            ("grant_type", "client_credentials"),
            ("client_id", api_key),
            ("client_secret", secret_key),
        ]);
        let raw = self.execute(request, self.token_timeout()).await?;

        tracing::debug!(status = raw.status.as_u16(), "Provider token response");

        let body = raw.body_text();
        if raw.status != StatusCode::OK {
            return Err(ProviderError::Upstream {
                status: raw.status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<TokenGrant>(&body)
            .ok()
            .filter(|grant| !grant.access_token.is_empty())
            .ok_or(ProviderError::Upstream {
                status: raw.status.as_u16(),
                body,
            })
    }

    async fn synthesize(
        &self,
        text: &str,
        token: &AccessToken,
        voice: &VoiceParams,
    ) -> Result<Audio, ProviderError> {
        tracing::info!(
            text_length = text.chars().count(),
            lang = %voice.provider_lang(),
            "Calling provider short-text synthesis"
        );

        // `tex` is encoded once here and once more by the form encoder
        let params = [
            ("tex", urlencoding::encode(text).into_owned()),
            ("tok", token.as_str().to_string()),
            ("cuid", CUID.to_string()),
            ("ctp", "1".to_string()),
            ("lan", voice.provider_lang()),
            ("spd", voice.provider_speed().to_string()),
            ("pit", voice.provider_pitch().to_string()),
            ("vol", voice.provider_volume().to_string()),
            ("per", voice.voice.clone()),
            ("aue", SHORT_TEXT_AUDIO_ENCODING.to_string()),
        ];
        let request = self
            .http_client
            .post(&self.config.synthesize_url)
            .form(&params);
        let raw = self.execute(request, self.synthesis_timeout()).await?;

        if raw.status != StatusCode::OK || raw.is_json() {
            let body = raw.body_text();
            tracing::warn!(
                status = raw.status.as_u16(),
                "Provider short-text synthesis returned no audio"
            );
            return Err(ProviderError::Upstream {
                status: raw.status.as_u16(),
                body,
            });
        }

        let content_type = raw
            .content_type
            .filter(|ct| ct.starts_with("audio/"))
            .unwrap_or_else(|| SHORT_TEXT_CONTENT_TYPE.to_string());

        tracing::debug!(audio_size = raw.body.len(), "Provider audio received");

        Ok(Audio::new(content_type, raw.body))
    }

    async fn create_task(
        &self,
        segments: &[String],
        token: &AccessToken,
        voice: &VoiceParams,
        format: &str,
    ) -> Result<String, ProviderError> {
        let payload = json!({
            "text": segments,
            "format": format,
            "voice": voice_value(&voice.voice),
            "lang": LONG_TEXT_LANG,
            "speed": voice.provider_speed(),
            "pitch": voice.provider_pitch(),
            "volume": voice.provider_volume(),
        });

        tracing::info!(
            segment_count = segments.len(),
            format = format,
            token = %token.preview(),
            "Creating provider synthesis task"
        );

        let request = self
            .http_client
            .post(&self.config.create_task_url)
            .query(&[("access_token", token.as_str())])
            .json(&payload);
        let raw = self.execute(request, self.synthesis_timeout()).await?;
        let status = raw.status.as_u16();
        let value = Self::parse_task_api_json(raw)?;

        value
            .get("task_id")
            .and_then(|id| id.as_str())
            .map(|id| id.to_string())
            .ok_or_else(|| ProviderError::Upstream {
                status,
                body: value.to_string(),
            })
    }

    async fn query_tasks(
        &self,
        task_ids: &[String],
        token: &AccessToken,
    ) -> Result<Vec<TaskInfo>, ProviderError> {
        tracing::debug!(task_ids = ?task_ids, "Querying provider synthesis tasks");

        let request = self
            .http_client
            .post(&self.config.query_task_url)
            .query(&[("access_token", token.as_str())])
            .json(&json!({ "task_ids": task_ids }));
        let raw = self.execute(request, self.synthesis_timeout()).await?;
        let status = raw.status.as_u16();
        let value = Self::parse_task_api_json(raw)?;

        serde_json::from_value::<TaskQueryResponse>(value.clone())
            .map(|response| response.tasks_info)
            .map_err(|_| ProviderError::Upstream {
                status,
                body: value.to_string(),
            })
    }

    async fn fetch_audio(&self, url: &Url) -> Result<Audio, ProviderError> {
        tracing::debug!(url = %url, "Fetching synthesized audio");

        let request = self.audio_client.get(url.clone());
        let raw = self.execute(request, self.synthesis_timeout()).await?;

        if raw.status != StatusCode::OK {
            return Err(ProviderError::Upstream {
                status: raw.status.as_u16(),
                body: "Failed to fetch audio".to_string(),
            });
        }

        let content_type = raw
            .content_type
            .filter(|ct| ct.starts_with("audio/"))
            .unwrap_or_else(|| DEFAULT_AUDIO_CONTENT_TYPE.to_string());

        Ok(Audio::new(content_type, raw.body))
    }
}
