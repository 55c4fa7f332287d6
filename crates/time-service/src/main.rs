//! Time Service
//!
//! Serves the local time of day to callers holding a valid access token.

use common::clock::SystemClock;
use common::config::ObservabilityConfig;
use common::observability::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use time_service::auth::jwks::{build_http_client, DEFAULT_FETCH_TIMEOUT};
use time_service::auth::{KeySetResolver, TokenValidator};
use time_service::config::Config;
use time_service::observability::metrics::init_metrics_recorder;
use time_service::routes::{self, AppState};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(&ObservabilityConfig::from_env(
        "time_service=info,tower_http=info",
    ))?;

    info!("Starting time service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Application type is: {}", config.application_type);
    info!(
        bind_address = %config.bind_address,
        jwks_url = %config.jwks_url,
        issuer = %config.token_issuer,
        audience = %config.token_audience,
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to install metrics recorder: {}", e);
        e
    })?;

    let clock = Arc::new(SystemClock);
    let resolver = KeySetResolver::new(
        config.jwks_url.clone(),
        build_http_client(DEFAULT_FETCH_TIMEOUT)?,
        clock.clone(),
    )
    .with_cache_ttl(config.jwks_cache_ttl())
    .with_min_refresh_interval(config.jwks_min_refresh_interval());
    let token_validator = Arc::new(TokenValidator::new(
        Arc::new(resolver),
        config.validator_config(),
        clock,
    ));

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState {
        config,
        token_validator,
    });
    let app = routes::build_routes(state, metrics_handle);

    info!("Time service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Time service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
