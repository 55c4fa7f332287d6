//! Observability module for the time service.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
