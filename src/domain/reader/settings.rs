use super::cache::CacheLimits;
use super::orchestrator::Credentials;
use crate::domain::tts::{Backend, VoiceParams};
use serde::{Deserialize, Serialize};

/// User preferences the reader consumes read-only. Persisted by the host
/// application as camelCase JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReaderSettings {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub lang: String,
    pub service: Backend,
    pub api_key: String,
    pub secret_key: String,
    pub voice: String,
    pub cache_max_age_days: u64,
    #[serde(rename = "cacheMaxSizeMB")]
    pub cache_max_size_mb: u64,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        let voice = VoiceParams::default();
        Self {
            rate: voice.rate,
            pitch: voice.pitch,
            volume: voice.volume,
            lang: voice.lang,
            service: Backend::Local,
            api_key: String::new(),
            secret_key: String::new(),
            voice: voice.voice,
            cache_max_age_days: 7,
            cache_max_size_mb: 100,
        }
    }
}

impl ReaderSettings {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Voice parameters, clamped to the ranges the engines accept
    pub fn voice_params(&self) -> VoiceParams {
        VoiceParams {
            rate: clamp_or(self.rate, 0.1, 10.0, 1.0),
            pitch: clamp_or(self.pitch, 0.0, 2.0, 1.0),
            volume: clamp_or(self.volume, 0.0, 1.0, 1.0),
            lang: if self.lang.trim().is_empty() {
                VoiceParams::default().lang
            } else {
                self.lang.trim().to_string()
            },
            voice: if self.voice.trim().is_empty() {
                VoiceParams::default().voice
            } else {
                self.voice.trim().to_string()
            },
        }
    }

    pub fn cache_limits(&self) -> CacheLimits {
        CacheLimits::new(self.cache_max_age_days, self.cache_max_size_mb)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            api_key: self.api_key.trim().to_string(),
            secret_key: self.secret_key.trim().to_string(),
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.secret_key.trim().is_empty()
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}
