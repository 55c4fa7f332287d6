//! Common utilities shared by the time client and the time service.

#![warn(clippy::pedantic)]

/// Module for an injectable wall clock
pub mod clock;

/// Module for shared configuration (logging)
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (header parsing, size limits, clock skew)
pub mod jwt;

/// Module for tracing subscriber bootstrap
pub mod observability;
