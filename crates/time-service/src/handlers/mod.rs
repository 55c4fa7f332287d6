//! HTTP request handlers for the time service.

pub mod health;
pub mod metrics;
pub mod time;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use time::get_time;
