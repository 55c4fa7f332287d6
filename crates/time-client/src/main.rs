//! Time Client
//!
//! Acquires an access token for the configured identity and scope, calls the
//! protected time resource with it, and prints the server time.

use common::clock::SystemClock;
use common::config::ObservabilityConfig;
use common::observability::init_tracing;
use std::sync::Arc;
use time_client::caller::AuthenticatedCaller;
use time_client::config::ClientConfig;
use time_client::token_acquirer::{build_http_client, TokenAcquirer};
use tracing::{error, info};

const BANNER: &str = "##########################################";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(&ObservabilityConfig::from_env("time_client=info"))?;

    let config = ClientConfig::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        authority = %config.authority_url,
        client_id = %config.client_id,
        scope = %config.default_scope,
        resource = %config.resource_api_url,
        "Configuration loaded successfully"
    );

    let request = config.token_request()?;
    let http_client = build_http_client(config.http_timeout)?;
    let acquirer = Arc::new(TokenAcquirer::new(
        http_client.clone(),
        Arc::new(SystemClock),
    ));
    let caller = AuthenticatedCaller::new(http_client, acquirer);

    match caller.call(&config.resource_api_url, &request).await {
        Ok(server_time) => {
            println!("{BANNER}");
            println!("The server time is: {server_time}");
            println!("{BANNER}");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Failed to get time from resource");
            Err(e.into())
        }
    }
}
