use axum::{
    http::{header, HeaderName, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::domain::auth::CsrfManager;
use crate::infrastructure::config::Config;
use crate::{
    controllers::{health, relay::RelayController},
    infrastructure::auth::{csrf_middleware, request_id_middleware, X_CSRF_TOKEN},
};

/// Build the application router with all routes and layers
pub fn build_router(relay_controller: Arc<RelayController>, csrf: Arc<CsrfManager>) -> Router {
    // Relay routes (need an anti-forgery token)
    let relay_routes = Router::new()
        .route("/tts/token", post(RelayController::token))
        .route("/tts/synthesize", post(RelayController::synthesize))
        .route("/tts/createTask", post(RelayController::create_task))
        .route("/tts/queryTask", post(RelayController::query_task))
        .route(
            "/tts/playAudio",
            get(RelayController::play_audio).post(RelayController::play_audio),
        )
        .with_state(relay_controller)
        .layer(middleware::from_fn_with_state(csrf, csrf_middleware));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(X_CSRF_TOKEN)]);

    Router::new()
        .route("/health", get(health::health))
        .merge(relay_routes)
        .layer(cors)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server with all routes configured
pub async fn start_http_server(
    config: Arc<Config>,
    relay_controller: Arc<RelayController>,
    csrf: Arc<CsrfManager>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(relay_controller, csrf);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Relay listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
