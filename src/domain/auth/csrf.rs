use crate::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Audience-like marker so tokens minted for other purposes are refused
pub const CSRF_PURPOSE: &str = "tts-relay";

#[derive(Debug, Serialize, Deserialize)]
pub struct CsrfClaims {
    pub sub: String, // Reader session the token was issued to
    pub purpose: String,
    pub exp: i64,
    pub iat: i64,
}

/// Issues and checks the anti-forgery tokens the host application embeds in
/// its pages. The relay only ever validates; issuing lives here so the host
/// and the relay share one format.
pub struct CsrfManager {
    secret: String,
    expiration_hours: i64,
}

impl CsrfManager {
    pub fn new(secret: String, expiration_hours: i64) -> Self {
        Self {
            secret,
            expiration_hours,
        }
    }

    /// Issue a token bound to a reader session
    pub fn issue(&self, session: &str) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.expiration_hours);

        let claims = CsrfClaims {
            sub: session.to_string(),
            purpose: CSRF_PURPOSE.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to issue CSRF token: {}", e)))
    }

    pub fn validate(&self, token: &str) -> AppResult<CsrfClaims> {
        let claims = decode::<CsrfClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| AppError::Unauthorized(format!("Invalid CSRF token: {}", e)))?;

        if claims.purpose != CSRF_PURPOSE {
            return Err(AppError::Unauthorized("Invalid CSRF token".to_string()));
        }

        Ok(claims)
    }
}
