//! Middleware for the time service.
//!
//! # Components
//!
//! - `auth` - Bearer token validation for protected routes
//! - `http_metrics` - Request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, AuthState};
pub use http_metrics::http_metrics_middleware;
