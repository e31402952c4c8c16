use axum::{http::StatusCode, response::IntoResponse};

/// GET /health - Liveness check, needs no anti-forgery token
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
