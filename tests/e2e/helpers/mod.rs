use readaloud::controllers::relay::RelayController;
use readaloud::domain::auth::CsrfManager;
use readaloud::domain::relay::{AudioOriginPolicy, RelayService};
use readaloud::infrastructure::config::{Config, Environment, LogFormat, ProviderConfig};
use readaloud::infrastructure::http::build_router;
use readaloud::infrastructure::provider::BaiduTtsProvider;
use std::sync::Arc;
use once_cell::sync::Lazy;
use test_context::AsyncTestContext;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use wiremock::MockServer;


use api_client::TestClient;

pub const TEST_CSRF_SECRET: &str = "test-csrf-secret-key-for-testing-only";

// Relay logs for all tests, silent unless RUST_LOG is set
static TRACING: Lazy<()> = Lazy::new(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
});

pub struct TestContext {
    pub client: TestClient,
    pub base_url: String,
    #[allow(dead_code)]
    pub config: Config,
    pub provider: MockServer,
    #[allow(dead_code)]
    pub csrf: Arc<CsrfManager>,
    pub csrf_token: String,
}

impl AsyncTestContext for TestContext {
    fn setup() -> impl std::future::Future<Output = Self> + Send {
        async {
            Lazy::force(&TRACING);

            // Provider double
            let provider = MockServer::start().await;
            let provider_uri = provider.uri();

            // Create test configuration pointing at the double
            let config = Config {
                host: "127.0.0.1".to_string(),
                port: 0, // Will be assigned by the OS
                environment: Environment::Development,
                log_format: LogFormat::Pretty,
                csrf_secret: TEST_CSRF_SECRET.to_string(),
                csrf_expiration_hours: 1,
                provider: ProviderConfig {
                    token_url: format!("{}{}", provider_uri, provider_mocks::TOKEN_PATH),
                    synthesize_url: format!("{}{}", provider_uri, provider_mocks::SYNTHESIZE_PATH),
                    create_task_url: format!("{}{}", provider_uri, provider_mocks::CREATE_PATH),
                    query_task_url: format!("{}{}", provider_uri, provider_mocks::QUERY_PATH),
                    audio_allowed_origins: vec![provider_uri.to_lowercase()],
                    token_timeout_secs: 10,
                    synthesis_timeout_secs: 30,
                },
                audio_proxy_cache_enabled: false, // Keep tests independent
            };

            let csrf = Arc::new(CsrfManager::new(
                config.csrf_secret.clone(),
                config.csrf_expiration_hours,
            ));
            let csrf_token = csrf
                .issue("test-session")
                .expect("Failed to issue CSRF token");

            let app = create_app(&config, csrf.clone()).expect("Failed to create app");

            // Start server
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("Failed to bind listener");
            let addr = listener.local_addr().expect("Failed to get local addr");
            let base_url = format!("http://{}", addr);

            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            // Wait for server to be ready
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

            Self {
                client: TestClient::new(&base_url),
                base_url,
                config,
                provider,
                csrf,
                csrf_token,
            }
        }
    }

    fn teardown(self) -> impl std::future::Future<Output = ()> + Send {
        async {
            // The mock server shuts down on drop
        }
    }
}

impl TestContext {
    /// Audio URL served by the provider double
    pub fn audio_url(&self, name: &str) -> String {
        format!("{}/audio/{}", self.provider.uri(), name)
    }

    /// Number of requests the provider double has seen
    pub async fn provider_calls(&self) -> usize {
        self.provider
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

fn create_app(config: &Config, csrf: Arc<CsrfManager>) -> anyhow::Result<axum::Router> {
    let provider = Arc::new(BaiduTtsProvider::new(config.provider.clone())?);
    let relay_service = Arc::new(RelayService::new(
        provider,
        AudioOriginPolicy::new(config.provider.audio_allowed_origins.clone()),
        config.audio_proxy_cache_enabled,
    ));
    let relay_controller = Arc::new(RelayController::new(relay_service));

    Ok(build_router(relay_controller, csrf))
}
