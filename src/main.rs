use readaloud::controllers::relay::RelayController;
use readaloud::domain::auth::CsrfManager;
use readaloud::domain::relay::{AudioOriginPolicy, RelayService};
use readaloud::infrastructure::config::{Config, LogFormat};
use readaloud::infrastructure::http::start_http_server;
use readaloud::infrastructure::provider::BaiduTtsProvider;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        "Starting readaloud relay on {}:{}",
        config.host,
        config.port
    );

    tracing::info!(
        token_url = %config.provider.token_url,
        create_task_url = %config.provider.create_task_url,
        allowed_origins = ?config.provider.audio_allowed_origins,
        proxy_cache_enabled = config.audio_proxy_cache_enabled,
        "TTS provider configuration loaded"
    );

    if config.is_development() && config.csrf_secret.len() < 32 {
        tracing::warn!("CSRF_SECRET is shorter than 32 bytes");
    }

    let config = Arc::new(config);

    // === DEPENDENCY INJECTION SETUP ===
    // 1. Instantiate the provider client
    tracing::info!("Instantiating TTS provider client...");
    let provider = Arc::new(BaiduTtsProvider::new(config.provider.clone())?);

    // 2. Instantiate services
    tracing::info!("Instantiating services...");
    let relay_service = Arc::new(RelayService::new(
        provider,
        AudioOriginPolicy::new(config.provider.audio_allowed_origins.clone()),
        config.audio_proxy_cache_enabled,
    ));
    let csrf = Arc::new(CsrfManager::new(
        config.csrf_secret.clone(),
        config.csrf_expiration_hours,
    ));

    // 3. Instantiate controllers
    tracing::info!("Instantiating controllers...");
    let relay_controller = Arc::new(RelayController::new(relay_service));

    // Start HTTP server with all routes
    start_http_server(config, relay_controller, csrf).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "readaloud=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "readaloud=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
