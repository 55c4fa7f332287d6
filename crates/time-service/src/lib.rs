//! Time Service Library
//!
//! Resource server for the time-of-day API. Every request to `/gettime`
//! must carry an access token issued by the configured authority; the
//! token is verified locally against the authority's published signing
//! keys.
//!
//! # Modules
//!
//! - `auth` - Key-set resolution, token validation, claims
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Bearer authentication and HTTP metrics
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
