//! Time client configuration.
//!
//! Loaded from environment variables. The client secret is redacted in Debug
//! output.

use crate::token_acquirer::{Credential, TokenError, TokenRequest, DEFAULT_HTTP_TIMEOUT};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Time client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Authority URL (e.g. `https://login.microsoftonline.com/<tenant>`).
    pub authority_url: String,

    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: SecretString,

    /// Scope to request, always `<resource>/.default`.
    pub default_scope: String,

    /// Protected resource URL to call.
    pub resource_api_url: String,

    /// HTTP request timeout for authority and resource calls.
    pub http_timeout: Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("authority_url", &self.authority_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("default_scope", &self.default_scope)
            .field("resource_api_url", &self.resource_api_url)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid HTTP timeout configuration: {0}")]
    InvalidHttpTimeout(String),
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let authority_url = required(vars, "AUTHORITY_URL")?;
        let client_id = required(vars, "CLIENT_ID")?;
        let client_secret = SecretString::from(required(vars, "CLIENT_SECRET")?);
        let default_scope = required(vars, "DEFAULT_SCOPE")?;
        let resource_api_url = required(vars, "RESOURCE_API_URL")?;

        let http_timeout = if let Some(value_str) = vars.get("HTTP_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidHttpTimeout(format!(
                    "HTTP_TIMEOUT_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidHttpTimeout(
                    "HTTP_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_HTTP_TIMEOUT
        };

        Ok(ClientConfig {
            authority_url,
            client_id,
            client_secret,
            default_scope,
            resource_api_url,
            http_timeout,
        })
    }

    /// Build the token request described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Configuration` if the scope is not a `/.default` scope.
    pub fn token_request(&self) -> Result<TokenRequest, TokenError> {
        TokenRequest::new(
            self.authority_url.clone(),
            Credential::new(self.client_id.clone(), self.client_secret.clone()),
            self.default_scope.clone(),
        )
    }
}
