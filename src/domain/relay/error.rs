use crate::error::AppError;
use crate::infrastructure::provider::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("API key and secret key are required")]
    Credential,
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("audio URL not allowed: {0}")]
    Forbidden(String),
    #[error("HTTP {status}, Response: {body}")]
    Upstream { status: u16, body: String },
    #[error("provider did not answer within {0}s")]
    UpstreamTimeout(u64),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ProviderError> for RelayError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Upstream { status, body } => RelayError::Upstream { status, body },
            ProviderError::Timeout(secs) => RelayError::UpstreamTimeout(secs),
            ProviderError::Transport(msg) => RelayError::Internal(msg),
        }
    }
}

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Credential => AppError::MissingCredentials(err.to_string()),
            RelayError::BadRequest(msg) => AppError::BadRequest(msg),
            RelayError::Forbidden(url) => AppError::Forbidden(format!("Invalid audio URL: {}", url)),
            RelayError::Upstream { status, body } => AppError::Upstream { status, body },
            RelayError::UpstreamTimeout(_) => AppError::UpstreamTimeout(err.to_string()),
            RelayError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
