//! JWT utilities shared by the time service and its test fixtures.
//!
//! This module provides:
//! - Size limits for DoS prevention
//! - Clock skew constants for time-based claim checks
//! - Unverified header parsing (`alg`, `kid`) for key lookup
//! - `exp` / `nbf` / `iat` window checks against an explicit `now`
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing returned by [`decode_header`] is trustworthy until the signature
//!   has been verified; it is only used to pick a key and an algorithm
//! - Error messages are intentionally generic to prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_header, check_expiry, DEFAULT_CLOCK_SKEW};
//!
//! let header = decode_header(token)?;
//! let key = resolver.resolve(&header.kid).await?;
//! // ... verify signature with `key` and `header.alg` ...
//! check_expiry(claims.exp, now, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this are rejected BEFORE any base64 decoding or
/// cryptographic work. Typical access tokens are 1-2KB (RS256 signature plus
/// identity-provider claims), so 8KB leaves room for large role lists.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (2 minutes).
///
/// Applied to `exp`, `nbf` and `iat` to absorb clock drift between the
/// authority that issued a token and the service validating it.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(120);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Prevents misconfiguration from silently extending token lifetimes.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during JWT structural and time checks.
///
/// Note: Display strings are intentionally generic. The variant itself is the
/// diagnostic and is logged at debug level.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token header is missing the `kid` or `alg` field.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// Token `exp` claim is in the past (beyond skew).
    #[error("The access token is invalid or expired")]
    Expired,

    /// Token `nbf` claim is in the future (beyond skew).
    #[error("The access token is invalid or expired")]
    NotYetValid,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Header
// =============================================================================

/// Unverified JOSE header fields needed to select a verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtHeader {
    /// Algorithm name exactly as declared by the token (e.g. `RS256`, `none`).
    pub alg: String,

    /// Key ID used for key-set lookup.
    pub kid: String,

    /// Optional token type (`JWT`, `at+jwt`).
    pub typ: Option<String>,
}

#[derive(Deserialize)]
struct RawHeader {
    alg: Option<serde_json::Value>,
    kid: Option<serde_json::Value>,
    typ: Option<serde_json::Value>,
}

/// Parse the header of a compact JWS without verifying anything.
///
/// The token must have exactly three dot-separated segments with non-empty
/// header and payload segments. The signature segment may be empty so that
/// unsigned (`alg: none`) tokens reach the algorithm allow-list and are
/// rejected there rather than slipping through as a parse quirk.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64, invalid JSON, missing `alg`
/// - `MissingKid` - Header has no string `kid`, or it is empty
pub fn decode_header(token: &str) -> Result<JwtHeader, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let (Some(header_part), Some(payload_part), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    };

    if header_part.is_empty() || payload_part.is_empty() {
        tracing::debug!(target: "common.jwt", "Token rejected: empty JWT segment");
        return Err(JwtValidationError::MalformedToken);
    }

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let raw: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let alg = raw
        .alg
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| {
            tracing::debug!(target: "common.jwt", "Token rejected: header missing alg");
            JwtValidationError::MalformedToken
        })?;

    // Reject empty kid values for defense-in-depth
    let kid = raw
        .kid
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    let typ = raw
        .typ
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string);

    Ok(JwtHeader { alg, kid, typ })
}

// =============================================================================
// Time-window checks
// =============================================================================

#[allow(clippy::cast_possible_wrap)]
fn skew_secs(clock_skew: Duration) -> i64 {
    // Bounded by MAX_CLOCK_SKEW at config load, well within i64 range
    clock_skew.as_secs() as i64
}

/// Reject tokens whose `exp` has passed, allowing `clock_skew` of slack.
///
/// A token is accepted while `now < exp + skew`.
///
/// # Errors
///
/// Returns `JwtValidationError::Expired`.
pub fn check_expiry(exp: i64, now: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let deadline = exp.saturating_add(skew_secs(clock_skew));
    if now >= deadline {
        tracing::debug!(
            target: "common.jwt",
            exp = exp,
            now = now,
            "Token rejected: expired"
        );
        return Err(JwtValidationError::Expired);
    }
    Ok(())
}

/// Reject tokens whose `nbf` is still in the future beyond `clock_skew`.
///
/// # Errors
///
/// Returns `JwtValidationError::NotYetValid`.
pub fn check_not_before(nbf: i64, now: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let earliest = now.saturating_add(skew_secs(clock_skew));
    if nbf > earliest {
        tracing::debug!(
            target: "common.jwt",
            nbf = nbf,
            now = now,
            "Token rejected: not yet valid"
        );
        return Err(JwtValidationError::NotYetValid);
    }
    Ok(())
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// Rejects tokens with `iat` more than `clock_skew` in the future, which
/// indicates pre-generated tokens or badly drifting clocks.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture`.
pub fn check_issued_at(iat: i64, now: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let max_iat = now.saturating_add(skew_secs(clock_skew));

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;

    fn token_with_header(header: &str) -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        format!("{header_b64}.payload.signature")
    }

    // -------------------------------------------------------------------------
    // Constants Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_default_clock_skew_is_2_minutes() {
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(120));
    }

    #[test]
    fn test_max_clock_skew_is_10_minutes() {
        assert_eq!(MAX_CLOCK_SKEW, Duration::from_secs(600));
    }

    // -------------------------------------------------------------------------
    // decode_header Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_header_valid_token() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"key-01"}"#);

        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, "RS256");
        assert_eq!(header.kid, "key-01");
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn test_decode_header_keeps_alg_none_verbatim() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","kid":"key-01"}"#);
        // Unsigned tokens carry an empty signature segment
        let token = format!("{header_b64}.eyJzdWIiOiJ4In0.");

        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, "none");
    }

    #[test]
    fn test_decode_header_missing_kid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT"}"#);
        assert_eq!(decode_header(&token), Err(JwtValidationError::MissingKid));
    }

    #[test]
    fn test_decode_header_missing_alg() {
        let token = token_with_header(r#"{"kid":"key-01"}"#);
        assert_eq!(decode_header(&token), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_decode_header_malformed_token() {
        assert_eq!(
            decode_header("not-a-jwt"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(
            decode_header("only.two"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(
            decode_header("too.many.jwt.parts"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(decode_header(""), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_decode_header_empty_segments() {
        assert_eq!(
            decode_header(".payload.signature"),
            Err(JwtValidationError::MalformedToken)
        );

        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","kid":"k"}"#);
        assert_eq!(
            decode_header(&format!("{header_b64}..signature")),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_decode_header_invalid_base64() {
        assert_eq!(
            decode_header("!!!invalid!!!.payload.signature"),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_decode_header_invalid_json() {
        let token = token_with_header("not-json");
        assert_eq!(decode_header(&token), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_decode_header_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            decode_header(&oversized),
            Err(JwtValidationError::TokenTooLarge)
        );
    }

    #[test]
    fn test_decode_header_at_size_limit() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"EdDSA","typ":"JWT","kid":"key"}"#);
        // Need 3 parts: header.payload.signature (2 dots)
        let remaining = MAX_JWT_SIZE_BYTES - header_b64.len() - 2;
        let payload_len = remaining / 2;
        let sig_len = remaining - payload_len;
        let token = format!(
            "{}.{}.{}",
            header_b64,
            "a".repeat(payload_len),
            "b".repeat(sig_len)
        );

        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);
        assert_eq!(decode_header(&token).unwrap().kid, "key");
    }

    #[test]
    fn test_decode_header_non_string_kid() {
        let token = token_with_header(r#"{"alg":"EdDSA","typ":"JWT","kid":12345}"#);
        assert_eq!(
            decode_header(&token).map(|h| h.kid),
            Err(JwtValidationError::MissingKid)
        );
    }

    #[test]
    fn test_decode_header_empty_string_kid() {
        let token = token_with_header(r#"{"alg":"EdDSA","kid":""}"#);
        assert_eq!(
            decode_header(&token).map(|h| h.kid),
            Err(JwtValidationError::MissingKid)
        );
    }

    // -------------------------------------------------------------------------
    // Time-window Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_check_expiry_boundaries() {
        let now = 1_700_000_000_i64;
        let skew = DEFAULT_CLOCK_SKEW;

        assert!(check_expiry(now + 3600, now, skew).is_ok());
        // Expired 119s ago, still inside the 120s skew
        assert!(check_expiry(now - 119, now, skew).is_ok());
        // exp + skew == now is the first rejected value
        assert_eq!(
            check_expiry(now - 120, now, skew),
            Err(JwtValidationError::Expired)
        );
        assert_eq!(
            check_expiry(now - 3600, now, skew),
            Err(JwtValidationError::Expired)
        );
    }

    #[test]
    fn test_check_expiry_without_skew() {
        let now = 1_700_000_000_i64;
        assert!(check_expiry(now + 1, now, Duration::ZERO).is_ok());
        assert_eq!(
            check_expiry(now, now, Duration::ZERO),
            Err(JwtValidationError::Expired)
        );
    }

    #[test]
    fn test_check_not_before_boundaries() {
        let now = 1_700_000_000_i64;

        assert!(check_not_before(now - 10, now, DEFAULT_CLOCK_SKEW).is_ok());
        assert!(check_not_before(now + 120, now, DEFAULT_CLOCK_SKEW).is_ok());
        assert_eq!(
            check_not_before(now + 121, now, DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::NotYetValid)
        );
    }

    #[test]
    fn test_check_issued_at_boundaries() {
        let now = 1_700_000_000_i64;

        // iat == now + skew is the last accepted value
        assert!(check_issued_at(now + 120, now, DEFAULT_CLOCK_SKEW).is_ok());
        assert!(check_issued_at(now - 3600, now, DEFAULT_CLOCK_SKEW).is_ok());

        // iat == now + skew + 1 is the first rejected value
        assert_eq!(
            check_issued_at(now + 121, now, DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }

    #[test]
    fn test_check_issued_at_far_future() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(
            check_issued_at(now + 86400, now, DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }

    #[test]
    fn test_error_messages_are_generic() {
        for err in [
            JwtValidationError::TokenTooLarge,
            JwtValidationError::MalformedToken,
            JwtValidationError::MissingKid,
            JwtValidationError::Expired,
            JwtValidationError::NotYetValid,
            JwtValidationError::IatTooFarInFuture,
        ] {
            assert_eq!(err.to_string(), "The access token is invalid or expired");
        }
    }
}
