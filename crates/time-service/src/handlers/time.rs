//! Protected time-of-day resource.

use crate::auth::Claims;
use axum::Extension;
use chrono::{Local, NaiveTime};
use tracing::instrument;

/// Format a time of day as `HH:MM:SS.mmm`.
fn format_time_of_day(time: NaiveTime) -> String {
    time.format("%H:%M:%S%.3f").to_string()
}

/// Handler for GET/POST /gettime
///
/// Requires a valid bearer token (auth middleware). Returns the server's
/// local time of day as plain text, e.g. `14:03:27.512`.
#[instrument(skip_all, name = "ts.handlers.time")]
pub async fn get_time(Extension(claims): Extension<Claims>) -> String {
    tracing::debug!(
        target: "ts.handlers.time",
        client_id = claims.client_id().unwrap_or("unknown"),
        "Serving time"
    );

    format_time_of_day(Local::now().time())
}
