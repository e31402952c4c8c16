use serde::Deserialize;
use std::env;

pub const DEFAULT_TOKEN_URL: &str = "https://aip.baidubce.com/oauth/2.0/token";
pub const DEFAULT_SYNTHESIZE_URL: &str = "https://tsn.baidu.com/text2audio";
pub const DEFAULT_CREATE_TASK_URL: &str = "https://aip.baidubce.com/rpc/2.0/tts/v1/create";
pub const DEFAULT_QUERY_TASK_URL: &str = "https://aip.baidubce.com/rpc/2.0/tts/v1/query";
pub const DEFAULT_AUDIO_ALLOWED_ORIGINS: &str =
    "http://aipe-speech.bj.bcebos.com,https://aipe-speech.bj.bcebos.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub log_format: LogFormat,
    // Anti-forgery tokens
    pub csrf_secret: String,
    pub csrf_expiration_hours: i64,
    // TTS provider
    pub provider: ProviderConfig,
    // Proxy cache
    pub audio_proxy_cache_enabled: bool,
}

/// Endpoints and deadlines of the remote TTS provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub token_url: String,
    pub synthesize_url: String,
    pub create_task_url: String,
    pub query_task_url: String,
    /// Origins (`scheme://host[:port]`) the audio proxy may fetch from
    pub audio_allowed_origins: Vec<String>,
    pub token_timeout_secs: u64,
    pub synthesis_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            synthesize_url: DEFAULT_SYNTHESIZE_URL.to_string(),
            create_task_url: DEFAULT_CREATE_TASK_URL.to_string(),
            query_task_url: DEFAULT_QUERY_TASK_URL.to_string(),
            audio_allowed_origins: parse_origins(DEFAULT_AUDIO_ALLOWED_ORIGINS),
            token_timeout_secs: 10,
            synthesis_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let defaults = ProviderConfig::default();

        let config = Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            environment: match env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .as_str()
            {
                "production" => Environment::Production,
                _ => Environment::Development,
            },
            log_format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            csrf_secret: env::var("CSRF_SECRET")?,
            csrf_expiration_hours: env::var("CSRF_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()?,
            provider: ProviderConfig {
                token_url: env::var("TTS_TOKEN_URL").unwrap_or(defaults.token_url),
                synthesize_url: env::var("TTS_SYNTHESIZE_URL").unwrap_or(defaults.synthesize_url),
                create_task_url: env::var("TTS_CREATE_TASK_URL")
                    .unwrap_or(defaults.create_task_url),
                query_task_url: env::var("TTS_QUERY_TASK_URL").unwrap_or(defaults.query_task_url),
                audio_allowed_origins: env::var("TTS_AUDIO_ALLOWED_ORIGINS")
                    .map(|s| parse_origins(&s))
                    .unwrap_or(defaults.audio_allowed_origins),
                token_timeout_secs: env::var("TTS_TOKEN_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                synthesis_timeout_secs: env::var("TTS_SYNTHESIS_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
            },
            audio_proxy_cache_enabled: env::var("AUDIO_PROXY_CACHE_ENABLED")
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(false),
        };

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// Split a comma separated origin list, dropping blanks and trailing slashes
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
