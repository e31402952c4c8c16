use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Extension, Form, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    domain::{
        relay::{
            dto::{CreateTaskResponse, TaskQueryResponse, TokenGrant},
            RelayService, RelayServiceApi, DEFAULT_AUDIO_FORMAT,
        },
        tts::{AccessToken, Audio, VoiceParams},
    },
    error::{AppError, AppResult},
    infrastructure::auth::RelaySession,
};

const AUDIO_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Form for POST /tts/token
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
}

/// Voice fields of the synthesis forms, on the reader's scale
#[derive(Debug, Default)]
pub struct VoiceForm {
    pub lang: Option<String>,
    pub voice: Option<String>,
    pub speed: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
}

impl VoiceForm {
    fn into_params(self) -> VoiceParams {
        let defaults = VoiceParams::default();
        VoiceParams {
            rate: self.speed.unwrap_or(defaults.rate),
            pitch: self.pitch.unwrap_or(defaults.pitch),
            volume: self.volume.unwrap_or(defaults.volume),
            lang: self.lang.filter(|l| !l.is_empty()).unwrap_or(defaults.lang),
            voice: self.voice.filter(|v| !v.is_empty()).unwrap_or(defaults.voice),
        }
    }
}

/// Form for POST /tts/synthesize
#[derive(Debug, Deserialize)]
pub struct SynthesizeForm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub token: String,
    pub lang: Option<String>,
    pub voice: Option<String>,
    pub speed: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
}

/// Form for POST /tts/createTask
#[derive(Debug, Deserialize)]
pub struct CreateTaskForm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub token: String,
    pub format: Option<String>,
    pub voice: Option<String>,
    pub speed: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
}

/// Form for POST /tts/queryTask
#[derive(Debug, Deserialize)]
pub struct QueryTaskForm {
    #[serde(default)]
    pub token: String,
    /// One task id or a comma separated list
    #[serde(default)]
    pub task_ids: String,
}

/// Form or query for /tts/playAudio
#[derive(Debug, Deserialize)]
pub struct PlayAudioForm {
    #[serde(default)]
    pub url: String,
}

pub struct RelayController {
    relay_service: Arc<RelayService>,
}

impl RelayController {
    pub fn new(relay_service: Arc<RelayService>) -> Self {
        Self { relay_service }
    }

    /// POST /tts/token - Exchange API credentials for an access token
    pub async fn token(
        State(controller): State<Arc<RelayController>>,
        Extension(session): Extension<RelaySession>,
        Form(form): Form<TokenForm>,
    ) -> AppResult<Json<TokenGrant>> {
        tracing::debug!(session = %session.session, "Token requested");

        let grant = controller
            .relay_service
            .fetch_token(&form.api_key, &form.secret_key)
            .await?;

        Ok(Json(grant))
    }

    /// POST /tts/synthesize - Short-text synthesis, returns audio bytes
    pub async fn synthesize(
        State(controller): State<Arc<RelayController>>,
        Form(form): Form<SynthesizeForm>,
    ) -> AppResult<(StatusCode, HeaderMap, Body)> {
        if form.text.trim().is_empty() || form.token.trim().is_empty() {
            return Err(AppError::BadRequest("Missing required parameters".to_string()));
        }

        let voice = VoiceForm {
            lang: form.lang,
            voice: form.voice,
            speed: form.speed,
            pitch: form.pitch,
            volume: form.volume,
        }
        .into_params();

        let audio = controller
            .relay_service
            .synthesize_direct(&form.text, &AccessToken::new(form.token), &voice)
            .await?;

        let headers = audio_headers(&audio, false)?;
        Ok((StatusCode::OK, headers, Body::from(audio.data)))
    }

    /// POST /tts/createTask - Submit long text as an asynchronous job
    pub async fn create_task(
        State(controller): State<Arc<RelayController>>,
        Form(form): Form<CreateTaskForm>,
    ) -> AppResult<Json<CreateTaskResponse>> {
        if form.text.trim().is_empty() || form.token.trim().is_empty() {
            return Err(AppError::BadRequest("Missing required parameters".to_string()));
        }

        let format = form
            .format
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_AUDIO_FORMAT.to_string());

        // The long-text API is Mandarin only, so no `lang` here
        let voice = VoiceForm {
            lang: None,
            voice: form.voice,
            speed: form.speed,
            pitch: form.pitch,
            volume: form.volume,
        }
        .into_params();

        let task_id = controller
            .relay_service
            .create_job(&form.text, &AccessToken::new(form.token), &voice, &format)
            .await?;

        Ok(Json(CreateTaskResponse { task_id }))
    }

    /// POST /tts/queryTask - Poll job status
    pub async fn query_task(
        State(controller): State<Arc<RelayController>>,
        Form(form): Form<QueryTaskForm>,
    ) -> AppResult<Json<TaskQueryResponse>> {
        let task_ids: Vec<String> = form
            .task_ids
            .split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        if task_ids.is_empty() || form.token.trim().is_empty() {
            return Err(AppError::BadRequest("Missing required parameters".to_string()));
        }

        let tasks_info = controller
            .relay_service
            .query_tasks(&task_ids, &AccessToken::new(form.token))
            .await?;

        Ok(Json(TaskQueryResponse { tasks_info }))
    }

    /// GET/POST /tts/playAudio - Proxy audio from the provider's storage
    pub async fn play_audio(
        State(controller): State<Arc<RelayController>>,
        Form(form): Form<PlayAudioForm>,
    ) -> AppResult<(StatusCode, HeaderMap, Body)> {
        if form.url.trim().is_empty() {
            return Err(AppError::BadRequest("Missing URL parameter".to_string()));
        }

        let audio = controller.relay_service.proxy_audio(form.url.trim()).await?;

        let headers = audio_headers(&audio, true)?;
        Ok((StatusCode::OK, headers, Body::from(audio.data)))
    }
}

fn audio_headers(audio: &Audio, cacheable: bool) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&audio.content_type)
            .map_err(|e| AppError::Internal(format!("Invalid content type: {}", e)))?,
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(audio.len()));
    if cacheable {
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(AUDIO_CACHE_CONTROL),
        );
    }
    Ok(headers)
}
