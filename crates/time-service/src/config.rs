//! Time service configuration.
//!
//! Configuration is loaded from environment variables. Invalid values fail
//! startup rather than falling back to a default.

use crate::auth::jwks::{DEFAULT_CACHE_TTL, DEFAULT_MIN_REFRESH_INTERVAL};
use crate::auth::jwt::{parse_allowed_algorithms, ValidatorConfig, DEFAULT_ALLOWED_ALGORITHMS};
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use jsonwebtoken::Algorithm;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default application type, logged at startup.
pub const DEFAULT_APPLICATION_TYPE: &str = "time-service";

/// Time service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Authority JWKS endpoint.
    pub jwks_url: String,

    /// Exact `iss` accepted on tokens.
    pub token_issuer: String,

    /// `aud` value identifying this service.
    pub token_audience: String,

    /// JWT clock skew tolerance in seconds.
    pub jwt_clock_skew_seconds: i64,

    /// Minimum interval between refresh-on-miss fetches.
    pub jwks_min_refresh_seconds: u64,

    /// How long a fetched key set is trusted.
    pub jwks_cache_ttl_seconds: u64,

    /// Signature algorithms accepted on tokens.
    pub allowed_algorithms: Vec<Algorithm>,

    /// Scopes or roles every caller must hold. Empty means none.
    pub required_scopes: Vec<String>,

    /// Free-form deployment label.
    pub application_type: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS cache configuration: {0}")]
    InvalidJwksCache(String),

    #[error("Invalid allowed algorithms: {0}")]
    InvalidAlgorithms(String),
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn positive_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: Duration,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default.as_secs());
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidJwksCache(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidJwksCache(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(value)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwks_url = required(vars, "JWKS_URL")?;
        let token_issuer = required(vars, "TOKEN_ISSUER")?;
        let token_audience = required(vars, "TOKEN_AUDIENCE")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let jwks_min_refresh_seconds =
            positive_seconds(vars, "JWKS_MIN_REFRESH_SECONDS", DEFAULT_MIN_REFRESH_INTERVAL)?;
        let jwks_cache_ttl_seconds =
            positive_seconds(vars, "JWKS_CACHE_TTL_SECONDS", DEFAULT_CACHE_TTL)?;

        let allowed_algorithms = match vars.get("JWT_ALLOWED_ALGORITHMS") {
            Some(list) => parse_allowed_algorithms(list)
                .map_err(|e| ConfigError::InvalidAlgorithms(e.to_string()))?,
            None => DEFAULT_ALLOWED_ALGORITHMS.to_vec(),
        };

        let required_scopes = vars
            .get("REQUIRED_SCOPES")
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let application_type = vars
            .get("APPLICATION_TYPE")
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_APPLICATION_TYPE.to_string());

        Ok(Config {
            bind_address,
            jwks_url,
            token_issuer,
            token_audience,
            jwt_clock_skew_seconds,
            jwks_min_refresh_seconds,
            jwks_cache_ttl_seconds,
            allowed_algorithms,
            required_scopes,
            application_type,
        })
    }

    /// Token acceptance rules derived from this configuration.
    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig::new(self.token_issuer.clone(), self.token_audience.clone())
            .with_allowed_algorithms(self.allowed_algorithms.clone())
            .with_clock_skew(Duration::from_secs(self.jwt_clock_skew_seconds.unsigned_abs()))
            .with_required_scopes(self.required_scopes.clone())
    }

    pub fn jwks_min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.jwks_min_refresh_seconds)
    }

    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_seconds)
    }
}
