//! Bearer-authenticated calls to a protected resource.
//!
//! [`AuthenticatedCaller`] gets a token from the shared [`TokenAcquirer`] and
//! issues `GET <url>` with `Authorization: Bearer <token>` and
//! `Accept: application/json`.
//!
//! Failures are typed so callers can tell an authentication failure
//! (`Unauthorized`) from a transport failure (`Network`) from a resource-side
//! error (`Resource`). The only retry is a single one after a 401 on a token
//! that was served from the cache.

use crate::token_acquirer::{AccessToken, TokenAcquirer, TokenError, TokenRequest, TokenSource};
use common::secret::ExposeSecret;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Longest server message carried in an error.
const MAX_ERROR_MESSAGE_LEN: usize = 512;

/// Errors from a protected resource call.
#[derive(Error, Debug)]
pub enum CallError {
    /// Token acquisition failed before the resource was contacted.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The resource rejected the token (HTTP 401 or 403).
    #[error("Resource rejected the token: HTTP {status}: {message}")]
    Unauthorized { status: u16, message: String },

    /// The resource answered with another non-2xx status.
    #[error("Resource returned HTTP {status}: {message}")]
    Resource { status: u16, message: String },

    /// Transport failure talking to the resource.
    #[error("Network error: {0}")]
    Network(String),
}

/// Caller that attaches bearer tokens to resource requests.
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller {
    http_client: reqwest::Client,
    acquirer: Arc<TokenAcquirer>,
}

impl AuthenticatedCaller {
    /// Create a caller.
    ///
    /// # Arguments
    ///
    /// * `http_client` - Client with request/connect timeouts configured
    /// * `acquirer` - Shared token acquirer
    #[must_use]
    pub fn new(http_client: reqwest::Client, acquirer: Arc<TokenAcquirer>) -> Self {
        Self {
            http_client,
            acquirer,
        }
    }

    /// GET `url` with a bearer token for `request` and return the body.
    ///
    /// # Errors
    ///
    /// - `CallError::Token` - token acquisition failed
    /// - `CallError::Unauthorized` - resource answered 401/403
    /// - `CallError::Resource` - resource answered another non-2xx status
    /// - `CallError::Network` - transport failure
    #[instrument(skip_all, fields(url = %url))]
    pub async fn call(&self, url: &str, request: &TokenRequest) -> Result<String, CallError> {
        let (token, source) = self.acquirer.acquire_with_source(request).await?;

        match self.send(url, &token).await {
            Err(CallError::Unauthorized { status: 401, .. }) if source == TokenSource::Cache => {
                // The cached token may have been revoked or expired early on
                // the resource's clock; one retry with a fresh token
                warn!(
                    target: "tc.caller",
                    "Cached token rejected by resource, retrying once with a fresh token"
                );
                self.acquirer.evict(request, &token).await;
                let fresh = self.acquirer.acquire(request).await?;
                self.send(url, &fresh).await
            }
            other => other,
        }
    }

    async fn send(&self, url: &str, token: &AccessToken) -> Result<String, CallError> {
        let response = self
            .http_client
            .get(url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", token.secret().expose_secret()),
            )
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(target: "tc.caller", error = %e, "Resource request failed");
                CallError::Network(e.to_string())
            })?;

        let status = response.status();

        if status.is_success() {
            return response.text().await.map_err(|e| {
                warn!(target: "tc.caller", error = %e, "Failed to read resource response body");
                CallError::Network(e.to_string())
            });
        }

        let body = response.text().await.unwrap_or_default();
        let message = describe_failure(status, &body);
        debug!(target: "tc.caller", status = %status, "Resource returned error status");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(CallError::Unauthorized {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(CallError::Resource {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Server message for an error: the body if there is one, else the reason phrase.
fn describe_failure(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("Unknown status")
            .to_string();
    }

    match body.char_indices().nth(MAX_ERROR_MESSAGE_LEN) {
        Some((cut, _)) => format!("{}...", body.get(..cut).unwrap_or(body)),
        None => body.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_failure_uses_reason_for_empty_body() {
        assert_eq!(describe_failure(StatusCode::UNAUTHORIZED, ""), "Unauthorized");
        assert_eq!(
            describe_failure(StatusCode::INTERNAL_SERVER_ERROR, "  \n"),
            "Internal Server Error"
        );
    }

    #[test]
    fn test_describe_failure_truncates_long_body() {
        let body = "x".repeat(MAX_ERROR_MESSAGE_LEN + 100);
        let message = describe_failure(StatusCode::BAD_GATEWAY, &body);
        assert_eq!(message.len(), MAX_ERROR_MESSAGE_LEN + 3);
        assert!(message.ends_with("..."));
    }

    #[test]
    fn test_call_error_display_includes_status() {
        let err = CallError::Unauthorized {
            status: 401,
            message: "invalid_token".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Resource rejected the token: HTTP 401: invalid_token"
        );

        let err = CallError::Resource {
            status: 503,
            message: "down".to_string(),
        };
        assert_eq!(err.to_string(), "Resource returned HTTP 503: down");
    }

    #[test]
    fn test_token_errors_convert() {
        let err: CallError = TokenError::GrantDenied("Status 400: invalid_scope".into()).into();
        assert!(matches!(err, CallError::Token(TokenError::GrantDenied(_))));
    }
}
