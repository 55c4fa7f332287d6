//! Shared configuration types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Logging configuration.
///
/// Read from `RUST_LOG` (filter directives) and `LOG_FORMAT` (`json` or
/// anything else for human-readable output).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directives (e.g. `time_service=debug,tower_http=info`)
    pub log_filter: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl ObservabilityConfig {
    /// Load from environment variables, falling back to `default_filter`.
    #[must_use]
    pub fn from_env(default_filter: &str) -> Self {
        Self::from_vars(&std::env::vars().collect(), default_filter)
    }

    /// Load from a map of variables (for testing).
    #[must_use]
    pub fn from_vars(vars: &HashMap<String, String>, default_filter: &str) -> Self {
        let log_filter = vars
            .get("RUST_LOG")
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| default_filter.to_string());

        let json_logs = vars
            .get("LOG_FORMAT")
            .is_some_and(|v| v.eq_ignore_ascii_case("json"));

        Self {
            log_filter,
            json_logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let config = ObservabilityConfig::from_vars(&HashMap::new(), "time_client=info");
        assert_eq!(config.log_filter, "time_client=info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_reads_filter_and_format() {
        let vars = HashMap::from([
            ("RUST_LOG".to_string(), "debug".to_string()),
            ("LOG_FORMAT".to_string(), "JSON".to_string()),
        ]);
        let config = ObservabilityConfig::from_vars(&vars, "info");
        assert_eq!(config.log_filter, "debug");
        assert!(config.json_logs);
    }

    #[test]
    fn test_blank_filter_uses_default() {
        let vars = HashMap::from([("RUST_LOG".to_string(), "  ".to_string())]);
        let config = ObservabilityConfig::from_vars(&vars, "info");
        assert_eq!(config.log_filter, "info");
    }
}
