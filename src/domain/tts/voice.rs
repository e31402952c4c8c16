use serde::{Deserialize, Serialize};

/// Neutral value on the provider's 0..=15 scale
pub const PROVIDER_NEUTRAL: u8 = 5;
const PROVIDER_MAX: f32 = 15.0;

/// Which engine speaks a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    /// Speech engine on the reader's device
    #[serde(rename = "browser", alias = "local")]
    Local,
    /// Remote TTS provider reached through the relay
    #[serde(rename = "remote", alias = "baidu")]
    Remote,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Local => "browser",
            Backend::Remote => "remote",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Voice settings shared by both backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub lang: String,
    /// Opaque provider voice identifier
    pub voice: String,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            lang: "zh-CN".to_string(),
            voice: "0".to_string(),
        }
    }
}

impl VoiceParams {
    pub fn provider_speed(&self) -> u8 {
        to_provider_scale(self.rate)
    }

    pub fn provider_pitch(&self) -> u8 {
        to_provider_scale(self.pitch)
    }

    pub fn provider_volume(&self) -> u8 {
        to_provider_scale(self.volume)
    }

    /// Short language code the provider understands (`zh-CN` -> `zh`)
    pub fn provider_lang(&self) -> String {
        self.lang
            .split(['-', '_'])
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("zh")
            .to_lowercase()
    }

    /// Stable textual form used when deriving cache keys
    pub fn fingerprint(&self) -> String {
        format!(
            "{:.2}|{:.2}|{:.2}|{}|{}",
            self.rate, self.pitch, self.volume, self.lang, self.voice
        )
    }
}

fn to_provider_scale(value: f32) -> u8 {
    if !value.is_finite() {
        return PROVIDER_NEUTRAL;
    }
    (value * PROVIDER_NEUTRAL as f32).round().clamp(0.0, PROVIDER_MAX) as u8
}

/// A single read-aloud request. Built once and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: VoiceParams,
    pub backend: Backend,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, voice: VoiceParams, backend: Backend) -> Self {
        Self {
            text: text.into(),
            voice,
            backend,
        }
    }
}
