use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{domain::auth::CsrfManager, error::AppError};

pub const X_CSRF_TOKEN: &str = "x-csrf-token";

/// Reader session injected into request extensions after the anti-forgery check
#[derive(Debug, Clone)]
pub struct RelaySession {
    pub session: String,
}

#[derive(Debug, Deserialize)]
struct CsrfQuery {
    #[serde(rename = "_csrf")]
    csrf: Option<String>,
}

/// Anti-forgery middleware guarding every relay endpoint.
///
/// The token is read from the `X-CSRF-Token` header, or from the `_csrf`
/// query parameter for clients that cannot set headers (audio elements).
pub async fn csrf_middleware(
    State(csrf): State<Arc<CsrfManager>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let from_header = request
        .headers()
        .get(X_CSRF_TOKEN)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let token = match from_header {
        Some(token) => token,
        None => Query::<CsrfQuery>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(q)| q.csrf)
            .ok_or_else(|| AppError::Unauthorized("Missing CSRF token".to_string()))?,
    };

    let claims = csrf.validate(&token)?;

    request.extensions_mut().insert(RelaySession {
        session: claims.sub,
    });

    Ok(next.run(request).await)
}
