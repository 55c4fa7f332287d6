//! OAuth 2.0 client-credentials token acquisition with caching.
//!
//! [`TokenAcquirer`] obtains access tokens from an authority's token endpoint
//! and caches them per `(authority, client_id, scope)`.
//!
//! # Features
//!
//! - Cache hit returns the stored token with no network call
//! - At most one in-flight acquisition per cache key; concurrent callers wait
//!   for it and share its outcome, failures included
//! - Tokens are treated as stale [`EXPIRY_SAFETY_MARGIN`] before their stated
//!   expiry so they do not expire on the way to the resource server. Tokens
//!   living less than twice the margin use half their lifetime instead.
//! - Time is read from an injected [`Clock`]
//!
//! # Example
//!
//! ```rust,ignore
//! use common::clock::SystemClock;
//! use common::secret::SecretString;
//! use std::sync::Arc;
//! use time_client::token_acquirer::{build_http_client, Credential, TokenAcquirer, TokenRequest};
//!
//! let acquirer = TokenAcquirer::new(
//!     build_http_client(DEFAULT_HTTP_TIMEOUT)?,
//!     Arc::new(SystemClock),
//! );
//! let request = TokenRequest::new(
//!     "https://login.example.com/tenant-id".to_string(),
//!     Credential::new("client-A".to_string(), SecretString::from("secret-X")),
//!     "https://api.example.com/.default".to_string(),
//! )?;
//!
//! let token = acquirer.acquire(&request).await?;
//! ```
//!
//! # Security
//!
//! - Client secret and access token are held as `SecretString` (never logged)
//! - Authority error bodies are logged at trace level only
//! - HTTP timeouts prevent a hung authority from pinning callers

use common::clock::Clock;
use common::secret::{ExposeSecret, SecretString};
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, trace, warn};

// =============================================================================
// Constants
// =============================================================================

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout for HTTP client.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Cached tokens are considered stale this long before their stated expiry.
///
/// Covers clock differences between this host and the authority plus the
/// time a request spends in flight to the resource server.
pub const EXPIRY_SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// Client-credentials scopes are always of the form `<resource>/.default`.
const DEFAULT_SCOPE_SUFFIX: &str = "/.default";

/// Token endpoint path relative to the authority URL.
const TOKEN_ENDPOINT_PATH: &str = "/oauth2/v2.0/token";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while acquiring a token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Network, DNS, TLS or timeout failure, or the authority answered 5xx.
    #[error("Authority unreachable: {0}")]
    AuthorityUnreachable(String),

    /// The authority rejected the client identity or secret.
    #[error("Invalid client credential: {0}")]
    InvalidCredential(String),

    /// The authority rejected the grant or the requested scope.
    #[error("Grant denied: {0}")]
    GrantDenied(String),

    /// Token response could not be parsed or is unusable.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// Invalid request or HTTP client configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

// =============================================================================
// Request / Token Types
// =============================================================================

/// Confidential-client identity.
#[derive(Clone)]
pub struct Credential {
    client_id: String,
    client_secret: SecretString,
}

impl Credential {
    /// Create a credential from a client ID and shared secret.
    #[must_use]
    pub fn new(client_id: String, client_secret: SecretString) -> Self {
        Self {
            client_id,
            client_secret,
        }
    }

    /// The client identifier.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Parameters for one client-credentials acquisition.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    authority: String,
    credential: Credential,
    scope: String,
}

impl TokenRequest {
    /// Build a token request.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Configuration` if the authority is empty or the
    /// scope is not of the form `<resource>/.default`.
    pub fn new(authority: String, credential: Credential, scope: String) -> Result<Self, TokenError> {
        if authority.trim().is_empty() {
            return Err(TokenError::Configuration(
                "Authority URL must not be empty".into(),
            ));
        }
        if scope.len() <= DEFAULT_SCOPE_SUFFIX.len() || !scope.ends_with(DEFAULT_SCOPE_SUFFIX) {
            return Err(TokenError::Configuration(format!(
                "Client credentials scope must be of the form '<resource>{DEFAULT_SCOPE_SUFFIX}', got '{scope}'"
            )));
        }
        Ok(Self {
            authority,
            credential,
            scope,
        })
    }

    /// The requested scope.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The client credential.
    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Full token endpoint URL for this request's authority.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        format!(
            "{}{TOKEN_ENDPOINT_PATH}",
            self.authority.trim_end_matches('/')
        )
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey {
            authority: self.authority.trim_end_matches('/').to_string(),
            client_id: self.credential.client_id.clone(),
            scope: self.scope.clone(),
        }
    }
}

/// A bearer token with its expiry.
#[derive(Clone)]
pub struct AccessToken {
    token: SecretString,
    issued_at: i64,
    expires_at: i64,
    scope: String,
}

impl AccessToken {
    /// Create a token received at `issued_at` and expiring at `expires_at`
    /// (both Unix seconds).
    #[must_use]
    pub fn new(token: SecretString, issued_at: i64, expires_at: i64, scope: String) -> Self {
        Self {
            token,
            issued_at,
            expires_at,
            scope,
        }
    }

    /// The bearer string. Expose only when writing the `Authorization` header.
    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.token
    }

    /// Expiry as a Unix timestamp.
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Scope the token was issued for.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Whether the token has passed its stated expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Whether the token is still usable once the margin is subtracted from
    /// its expiry.
    ///
    /// The margin is capped at half the token's lifetime, so a token issued
    /// with a lifetime shorter than `2 * margin` is still served from cache.
    #[must_use]
    pub fn is_fresh_at(&self, now: i64, margin: Duration) -> bool {
        let margin_secs = i64::try_from(margin.as_secs()).unwrap_or(i64::MAX);
        let half_lifetime = self.expires_at.saturating_sub(self.issued_at) / 2;
        now < self
            .expires_at
            .saturating_sub(margin_secs.min(half_lifetime.max(0)))
    }

    fn same_token(&self, other: &AccessToken) -> bool {
        self.token.expose_secret() == other.token.expose_secret()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Where an acquired token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Served from the local cache, no network call.
    Cache,
    /// Freshly issued by the authority.
    Authority,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    authority: String,
    client_id: String,
    scope: String,
}

/// Per-key cache slot. Holding the `state` lock is what makes an acquisition
/// the single in-flight one for its key.
#[derive(Default)]
struct Slot {
    /// Completed network attempts. Bumped under the `state` lock, read
    /// before it so a waiter can tell whether an attempt finished meanwhile.
    attempts: AtomicU64,
    state: tokio::sync::Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    token: Option<AccessToken>,
    /// Outcome of the most recent attempt if it failed.
    last_failure: Option<TokenError>,
}

// =============================================================================
// OAuth Response Types
// =============================================================================

/// OAuth 2.0 token response.
#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    token_type: String,
    #[serde(deserialize_with = "deserialize_expires_in")]
    expires_in: u64,
    #[serde(default)]
    scope: Option<String>,
}

impl fmt::Debug for OAuthTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// OAuth 2.0 error response (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
}

/// Some authorities send `expires_in` as a JSON string.
fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Map a non-success token endpoint response to a `TokenError`.
fn classify_rejection(status: StatusCode, body: &str) -> TokenError {
    if status.is_server_error() {
        return TokenError::AuthorityUnreachable(format!("Authority server error: {status}"));
    }

    let error_code = serde_json::from_str::<OAuthErrorResponse>(body)
        .map(|e| e.error)
        .ok();

    match error_code.as_deref() {
        Some("invalid_client") => TokenError::InvalidCredential(format!("Status {status}: invalid_client")),
        Some(code) => TokenError::GrantDenied(format!("Status {status}: {code}")),
        None if status == StatusCode::UNAUTHORIZED => {
            TokenError::InvalidCredential(format!("Status {status}"))
        }
        None => TokenError::GrantDenied(format!("Status {status}")),
    }
}

// =============================================================================
// Token Acquirer
// =============================================================================

/// Build the HTTP client used for token requests.
///
/// # Errors
///
/// Returns `TokenError::Configuration` if the client cannot be built.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, TokenError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .build()
        .map_err(|e| TokenError::Configuration(format!("Failed to build HTTP client: {e}")))
}

/// Caching client-credentials token acquirer.
///
/// Shared across tasks behind an `Arc`; all state is internally synchronized.
pub struct TokenAcquirer {
    http_client: reqwest::Client,
    clock: Arc<dyn Clock>,
    safety_margin: Duration,
    slots: Mutex<HashMap<CacheKey, Arc<Slot>>>,
}

impl fmt::Debug for TokenAcquirer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAcquirer")
            .field("clock", &self.clock)
            .field("safety_margin", &self.safety_margin)
            .finish_non_exhaustive()
    }
}

impl TokenAcquirer {
    /// Create an acquirer with an empty cache.
    ///
    /// The HTTP client should carry request and connect timeouts
    /// (see [`build_http_client`]).
    #[must_use]
    pub fn new(http_client: reqwest::Client, clock: Arc<dyn Clock>) -> Self {
        Self {
            http_client,
            clock,
            safety_margin: EXPIRY_SAFETY_MARGIN,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire a token for `request`, from cache when possible.
    ///
    /// # Errors
    ///
    /// - `TokenError::AuthorityUnreachable` - transport failure or 5xx
    /// - `TokenError::InvalidCredential` - client identity/secret rejected
    /// - `TokenError::GrantDenied` - grant or scope rejected
    /// - `TokenError::InvalidResponse` - unusable token response
    pub async fn acquire(&self, request: &TokenRequest) -> Result<AccessToken, TokenError> {
        self.acquire_with_source(request)
            .await
            .map(|(token, _)| token)
    }

    /// Like [`TokenAcquirer::acquire`], also reporting whether the token was
    /// served from the cache.
    ///
    /// # Errors
    ///
    /// Same as [`TokenAcquirer::acquire`].
    #[instrument(skip_all, fields(client_id = %request.credential.client_id, scope = %request.scope))]
    pub async fn acquire_with_source(
        &self,
        request: &TokenRequest,
    ) -> Result<(AccessToken, TokenSource), TokenError> {
        let slot = self.slot_for(request.cache_key());
        let attempts_seen = slot.attempts.load(Ordering::Acquire);

        // Waiters queue here while another task fetches for the same key
        let mut state = slot.state.lock().await;

        let now = self.clock.now_unix();
        if let Some(token) = state
            .token
            .as_ref()
            .filter(|token| token.is_fresh_at(now, self.safety_margin))
        {
            trace!(target: "tc.token_acquirer", expires_at = token.expires_at, "Token cache hit");
            return Ok((token.clone(), TokenSource::Cache));
        }

        // An attempt finished while we queued and it failed: share its error
        if slot.attempts.load(Ordering::Acquire) != attempts_seen {
            if let Some(err) = state.last_failure.clone() {
                debug!(target: "tc.token_acquirer", error = %err, "Sharing failure of concurrent acquisition");
                return Err(err);
            }
        }

        let result = self.request_token(request).await;
        slot.attempts.fetch_add(1, Ordering::Release);

        let token = match result {
            Ok(token) => {
                state.last_failure = None;
                state.token = Some(token.clone());
                token
            }
            Err(err) => {
                state.last_failure = Some(err.clone());
                return Err(err);
            }
        };

        info!(
            target: "tc.token_acquirer",
            client_id = %request.credential.client_id,
            expires_at = token.expires_at,
            "Access token acquired"
        );

        Ok((token, TokenSource::Authority))
    }

    /// Drop the cached token for `request` if it is still `rejected`.
    ///
    /// Returns `true` if an entry was removed. A token that another task has
    /// already replaced is left alone.
    pub async fn evict(&self, request: &TokenRequest, rejected: &AccessToken) -> bool {
        let slot = self.slot_for(request.cache_key());
        let mut state = slot.state.lock().await;

        if state.token.as_ref().is_some_and(|token| token.same_token(rejected)) {
            state.token = None;
            debug!(target: "tc.token_acquirer", "Evicted rejected token from cache");
            true
        } else {
            false
        }
    }

    fn slot_for(&self, key: CacheKey) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key).or_default())
    }

    /// Perform one client-credentials round trip.
    #[instrument(skip_all)]
    async fn request_token(&self, request: &TokenRequest) -> Result<AccessToken, TokenError> {
        let url = request.token_endpoint();

        debug!(
            target: "tc.token_acquirer",
            client_id = %request.credential.client_id,
            url = %url,
            "Requesting token from authority"
        );

        // Build form body for client credentials grant
        let form_body = [
            ("grant_type", "client_credentials"),
            ("client_id", request.credential.client_id.as_str()),
            ("client_secret", request.credential.client_secret.expose_secret()),
            ("scope", request.scope.as_str()),
        ];

        let response = self
            .http_client
            .post(&url)
            .form(&form_body)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "tc.token_acquirer", error = %e, "Token request failed");
                TokenError::AuthorityUnreachable(e.to_string())
            })?;

        let status = response.status();

        if !status.is_success() {
            // Read response body for classification, but only log it at trace
            // level to keep authority diagnostics out of production logs
            let body = response.text().await.unwrap_or_else(|e| {
                trace!(target: "tc.token_acquirer", error = %e, "Failed to read error response body");
                String::new()
            });
            trace!(target: "tc.token_acquirer", body = %body, "Token rejection response body");

            let err = classify_rejection(status, &body);
            warn!(
                target: "tc.token_acquirer",
                status = %status,
                error = %err,
                "Authority rejected token request"
            );
            return Err(err);
        }

        let token_response: OAuthTokenResponse = response.json().await.map_err(|e| {
            warn!(target: "tc.token_acquirer", error = %e, "Failed to parse token response");
            TokenError::InvalidResponse(e.to_string())
        })?;

        if !token_response.token_type.eq_ignore_ascii_case("bearer") {
            return Err(TokenError::InvalidResponse(format!(
                "Unsupported token type: {}",
                token_response.token_type
            )));
        }
        if token_response.expires_in == 0 {
            return Err(TokenError::InvalidResponse(
                "Token response has zero lifetime".into(),
            ));
        }
        if token_response.access_token.is_empty() {
            return Err(TokenError::InvalidResponse("Empty access token".into()));
        }

        let now = self.clock.now_unix();
        let expires_in = i64::try_from(token_response.expires_in).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(expires_in);

        debug!(
            target: "tc.token_acquirer",
            expires_in_secs = token_response.expires_in,
            "Token response accepted"
        );

        Ok(AccessToken::new(
            SecretString::from(token_response.access_token),
            now,
            expires_at,
            token_response.scope.unwrap_or_else(|| request.scope.clone()),
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential::new("client-A".to_string(), SecretString::from("secret-X"))
    }

    #[test]
    fn test_token_request_rejects_non_default_scope() {
        let result = TokenRequest::new(
            "https://login.example.com/tenant".to_string(),
            credential(),
            "https://api.example.com/read".to_string(),
        );
        assert!(matches!(result, Err(TokenError::Configuration(_))));

        let result = TokenRequest::new(
            "https://login.example.com/tenant".to_string(),
            credential(),
            "/.default".to_string(),
        );
        assert!(matches!(result, Err(TokenError::Configuration(_))));
    }

    #[test]
    fn test_token_request_rejects_empty_authority() {
        let result = TokenRequest::new(
            "  ".to_string(),
            credential(),
            "https://api.example.com/.default".to_string(),
        );
        assert!(matches!(result, Err(TokenError::Configuration(_))));
    }

    #[test]
    fn test_token_endpoint_trims_trailing_slash() {
        let request = TokenRequest::new(
            "https://login.example.com/tenant/".to_string(),
            credential(),
            "https://api.example.com/.default".to_string(),
        )
        .unwrap();

        assert_eq!(
            request.token_endpoint(),
            "https://login.example.com/tenant/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_cache_key_ignores_trailing_slash() {
        let scope = "https://api.example.com/.default".to_string();
        let a = TokenRequest::new("https://a/t".to_string(), credential(), scope.clone()).unwrap();
        let b = TokenRequest::new("https://a/t/".to_string(), credential(), scope).unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_credential_debug_redacts_secret() {
        let debug_str = format!("{:?}", credential());
        assert!(debug_str.contains("client-A"));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("secret-X"));
    }

    #[test]
    fn test_access_token_debug_redacts_token() {
        let token = AccessToken::new(SecretString::from("eyAAA"), 0, 100, "s/.default".into());
        let debug_str = format!("{token:?}");
        assert!(!debug_str.contains("eyAAA"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_access_token_freshness_applies_margin() {
        let token = AccessToken::new(SecretString::from("t"), 0, 1_000, "s/.default".into());

        assert!(token.is_fresh_at(939, EXPIRY_SAFETY_MARGIN));
        assert!(!token.is_fresh_at(940, EXPIRY_SAFETY_MARGIN));
        assert!(!token.is_expired_at(999));
        assert!(token.is_expired_at(1_000));
    }

    #[test]
    fn test_short_lived_token_margin_capped_at_half_lifetime() {
        // 45s lifetime: margin shrinks to 22s
        let token = AccessToken::new(SecretString::from("t"), 1_000, 1_045, "s/.default".into());

        assert!(token.is_fresh_at(1_000, EXPIRY_SAFETY_MARGIN));
        assert!(token.is_fresh_at(1_022, EXPIRY_SAFETY_MARGIN));
        assert!(!token.is_fresh_at(1_023, EXPIRY_SAFETY_MARGIN));
    }

    #[test]
    fn test_expires_in_accepts_string() {
        let json = r#"{"access_token":"a","token_type":"Bearer","expires_in":"3599"}"#;
        let response: OAuthTokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.expires_in, 3599);
    }

    #[test]
    fn test_token_response_debug_redacts_token() {
        let json = r#"{"access_token":"eyAAA","token_type":"Bearer","expires_in":3600}"#;
        let response: OAuthTokenResponse = serde_json::from_str(json).unwrap();
        assert!(!format!("{response:?}").contains("eyAAA"));
    }

    #[test]
    fn test_classify_rejection() {
        assert!(matches!(
            classify_rejection(StatusCode::BAD_REQUEST, r#"{"error":"invalid_client"}"#),
            TokenError::InvalidCredential(_)
        ));
        assert!(matches!(
            classify_rejection(StatusCode::UNAUTHORIZED, ""),
            TokenError::InvalidCredential(_)
        ));
        assert!(matches!(
            classify_rejection(StatusCode::BAD_REQUEST, r#"{"error":"invalid_scope"}"#),
            TokenError::GrantDenied(_)
        ));
        assert!(matches!(
            classify_rejection(StatusCode::FORBIDDEN, "not json"),
            TokenError::GrantDenied(_)
        ));
        assert!(matches!(
            classify_rejection(StatusCode::SERVICE_UNAVAILABLE, ""),
            TokenError::AuthorityUnreachable(_)
        ));
    }

    #[test]
    fn test_classify_rejection_does_not_echo_description() {
        let body = r#"{"error":"unauthorized_client","error_description":"client secret-X is not allowed"}"#;
        let err = classify_rejection(StatusCode::BAD_REQUEST, body);
        assert!(!err.to_string().contains("secret-X"));
    }
}
