//! Test harness: a real time service on an ephemeral port, pointed at a
//! `MockAuthority`.

#![allow(dead_code)]

use anyhow::Result;
use auth_test_utils::{MockAuthority, TEST_AUDIENCE, TEST_ISSUER};
use common::clock::Clock;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use time_service::auth::jwks::{build_http_client, DEFAULT_FETCH_TIMEOUT};
use time_service::auth::{KeySetResolver, TokenValidator};
use time_service::config::Config;
use time_service::observability::metrics::init_metrics_recorder;
use time_service::routes::{self, AppState};
use tokio::task::JoinHandle;

/// Global metrics handle for test servers
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn get_test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Variables every test server starts with.
pub fn base_vars(authority: &MockAuthority) -> HashMap<String, String> {
    HashMap::from([
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("JWKS_URL".to_string(), authority.jwks_url()),
        ("TOKEN_ISSUER".to_string(), TEST_ISSUER.to_string()),
        ("TOKEN_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
    ])
}

/// Validator wired the same way `main` wires it.
pub fn build_validator(config: &Config, clock: Arc<dyn Clock>) -> Result<Arc<TokenValidator>> {
    let resolver = KeySetResolver::new(
        config.jwks_url.clone(),
        build_http_client(DEFAULT_FETCH_TIMEOUT)?,
        Arc::clone(&clock),
    )
    .with_cache_ttl(config.jwks_cache_ttl())
    .with_min_refresh_interval(config.jwks_min_refresh_interval());

    Ok(Arc::new(TokenValidator::new(
        Arc::new(resolver),
        config.validator_config(),
        clock,
    )))
}

/// Running time service.
pub struct TestTimeServer {
    addr: SocketAddr,
    _server_handle: JoinHandle<()>,
}

impl TestTimeServer {
    /// Spawn with default settings and the system clock.
    pub async fn spawn(authority: &MockAuthority) -> Result<Self> {
        Self::spawn_with(base_vars(authority), Arc::new(common::clock::SystemClock)).await
    }

    /// Spawn with explicit variables and clock.
    pub async fn spawn_with(vars: HashMap<String, String>, clock: Arc<dyn Clock>) -> Result<Self> {
        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;
        let token_validator = build_validator(&config, clock)?;

        let state = Arc::new(AppState {
            config,
            token_validator,
        });
        let app = routes::build_routes(state, get_test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;
        let addr = listener.local_addr()?;

        let server_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            _server_handle: server_handle,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestTimeServer {
    fn drop(&mut self) {
        self._server_handle.abort();
    }
}
