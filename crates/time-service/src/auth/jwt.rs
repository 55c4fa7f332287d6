//! Access token validation.
//!
//! [`TokenValidator`] runs a fixed checklist and stops at the first failure:
//!
//! 1. Structure: size limit, three segments, decodable header with `alg` and
//!    `kid` ([`InvalidReason::Malformed`])
//! 2. Algorithm: the header `alg` must be on the allow-list
//!    ([`InvalidReason::BadSignature`]), checked before any key fetch
//! 3. Key lookup through the [`KeySetResolver`]
//!    ([`InvalidReason::UnknownSigner`], [`InvalidReason::KeySetUnavailable`])
//! 4. Signature: the header `alg` must agree with the key and the signature
//!    must verify ([`InvalidReason::BadSignature`])
//! 5. Claims: issuer, audience, expiry, not-before, issued-at and required
//!    scopes ([`InvalidReason::ClaimRejected`])
//!
//! Claims are never read before the signature has been verified.
//!
//! # Security
//!
//! - `none` and HMAC algorithms cannot be allowed
//! - Time checks use the injected clock with a bounded skew; jsonwebtoken's
//!   own time checks are disabled
//! - The token and the rejection detail never leave the service

use crate::auth::claims::Claims;
use crate::auth::jwks::{KeySetError, KeySetResolver, SigningKey};
use crate::observability::metrics::record_token_validation;
use common::clock::Clock;
use common::jwt::{
    check_expiry, check_issued_at, check_not_before, decode_header, DEFAULT_CLOCK_SKEW,
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Algorithms accepted when none are configured.
pub const DEFAULT_ALLOWED_ALGORITHMS: [Algorithm; 2] = [Algorithm::RS256, Algorithm::EdDSA];

/// Claim that failed the claim checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectedClaim {
    Issuer,
    Audience,
    Expiry,
    NotBefore,
    IssuedAt,
    Scope,
}

impl RejectedClaim {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectedClaim::Issuer => "issuer",
            RejectedClaim::Audience => "audience",
            RejectedClaim::Expiry => "expiry",
            RejectedClaim::NotBefore => "not_before",
            RejectedClaim::IssuedAt => "issued_at",
            RejectedClaim::Scope => "scope",
        }
    }
}

/// Why a token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Not a structurally valid JWT.
    Malformed,
    /// Signed with a key the authority does not publish.
    UnknownSigner,
    /// Algorithm not allowed or signature does not verify.
    BadSignature,
    /// Signature fine, claim unacceptable.
    ClaimRejected(RejectedClaim),
    /// The key set could not be fetched, so nothing can be verified.
    KeySetUnavailable,
}

impl InvalidReason {
    pub fn as_str(self) -> &'static str {
        match self {
            InvalidReason::Malformed => "malformed",
            InvalidReason::UnknownSigner => "unknown_signer",
            InvalidReason::BadSignature => "bad_signature",
            InvalidReason::ClaimRejected(_) => "claim_rejected",
            InvalidReason::KeySetUnavailable => "key_set_unavailable",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::ClaimRejected(claim) => write!(f, "claim_rejected:{}", claim.as_str()),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Outcome of [`TokenValidator::validate`].
#[derive(Debug, Clone)]
pub enum ValidationResult {
    Valid(Claims),
    Invalid(InvalidReason),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid(_))
    }

    /// The rejection reason, if invalid.
    pub fn reason(&self) -> Option<InvalidReason> {
        match self {
            ValidationResult::Valid(_) => None,
            ValidationResult::Invalid(reason) => Some(*reason),
        }
    }
}

/// Errors building a [`ValidatorConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlgorithmError {
    #[error("Unknown algorithm '{0}'")]
    Unknown(String),

    #[error("Algorithm '{0}' is not permitted for access tokens")]
    NotPermitted(String),

    #[error("At least one algorithm must be allowed")]
    Empty,
}

/// Parse an algorithm allow-list such as `RS256,EdDSA`.
///
/// `none` and the HMAC family are refused: a shared secret would let anyone
/// holding it mint tokens.
///
/// # Errors
///
/// Returns `AlgorithmError` for unknown or refused names, or an empty list.
pub fn parse_allowed_algorithms(list: &str) -> Result<Vec<Algorithm>, AlgorithmError> {
    let mut allowed = Vec::new();

    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let alg = Algorithm::from_str(name).map_err(|_| {
            if name.eq_ignore_ascii_case("none") {
                AlgorithmError::NotPermitted(name.to_string())
            } else {
                AlgorithmError::Unknown(name.to_string())
            }
        })?;

        if matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(AlgorithmError::NotPermitted(name.to_string()));
        }

        if !allowed.contains(&alg) {
            allowed.push(alg);
        }
    }

    if allowed.is_empty() {
        return Err(AlgorithmError::Empty);
    }

    Ok(allowed)
}

/// What a token must satisfy to be accepted.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Exact expected `iss`.
    pub issuer: String,

    /// Expected `aud` value (resource identifier).
    pub audience: String,

    /// Signature algorithms accepted.
    pub allowed_algorithms: Vec<Algorithm>,

    /// Tolerance for `exp`, `nbf` and `iat`.
    pub clock_skew: Duration,

    /// Every entry must be granted through `scp` or `roles`.
    pub required_scopes: Vec<String>,
}

impl ValidatorConfig {
    pub fn new(issuer: String, audience: String) -> Self {
        Self {
            issuer,
            audience,
            allowed_algorithms: DEFAULT_ALLOWED_ALGORITHMS.to_vec(),
            clock_skew: DEFAULT_CLOCK_SKEW,
            required_scopes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_allowed_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    #[must_use]
    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    #[must_use]
    pub fn with_required_scopes(mut self, scopes: Vec<String>) -> Self {
        self.required_scopes = scopes;
        self
    }
}

/// Validates bearer tokens against the authority's published keys.
#[derive(Debug)]
pub struct TokenValidator {
    resolver: Arc<KeySetResolver>,
    config: ValidatorConfig,
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    /// Create a validator.
    ///
    /// # Arguments
    ///
    /// * `resolver` - Shared key-set resolver
    /// * `config` - Expected issuer, audience, algorithms, skew, scopes
    /// * `clock` - Time source for the claim checks
    pub fn new(resolver: Arc<KeySetResolver>, config: ValidatorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            resolver,
            config,
            clock,
        }
    }

    /// Validate `token` and return its claims or the first failed check.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> ValidationResult {
        match self.run_checks(token).await {
            Ok(claims) => {
                tracing::debug!(target: "ts.auth.jwt", "Token validated successfully");
                record_token_validation("valid", None);
                ValidationResult::Valid(claims)
            }
            Err(reason) => {
                tracing::debug!(target: "ts.auth.jwt", reason = %reason, "Token rejected");
                let claim = match reason {
                    InvalidReason::ClaimRejected(claim) => Some(claim.as_str()),
                    _ => None,
                };
                record_token_validation(reason.as_str(), claim);
                ValidationResult::Invalid(reason)
            }
        }
    }

    async fn run_checks(&self, token: &str) -> Result<Claims, InvalidReason> {
        // 1. Structure (size check first, inside decode_header)
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(target: "ts.auth.jwt", error = ?e, "Token header rejected");
            InvalidReason::Malformed
        })?;

        // 2. Header algorithm against the allow-list, before any key fetch
        let algorithm = self.allowed_algorithm(&header.alg)?;

        // 3. Key lookup
        let key = self
            .resolver
            .resolve(&header.kid)
            .await
            .map_err(|e| match e {
                KeySetError::UnknownKey => InvalidReason::UnknownSigner,
                KeySetError::AuthorityUnreachable(_) => InvalidReason::KeySetUnavailable,
            })?;

        // 4. Algorithm against the key, then signature
        key_accepts(&key, algorithm)?;
        let claims = verify_signature(token, &key, algorithm)?;

        // 5. Claims
        self.check_claims(&claims)?;

        Ok(claims)
    }

    /// The header's algorithm, if it is recognized and on the allow-list.
    fn allowed_algorithm(&self, alg: &str) -> Result<Algorithm, InvalidReason> {
        let Ok(algorithm) = Algorithm::from_str(alg) else {
            tracing::debug!(target: "ts.auth.jwt", alg = %alg, "Unrecognized token algorithm");
            return Err(InvalidReason::BadSignature);
        };

        if !self.config.allowed_algorithms.contains(&algorithm) {
            tracing::debug!(target: "ts.auth.jwt", alg = %alg, "Token algorithm not allowed");
            return Err(InvalidReason::BadSignature);
        }

        Ok(algorithm)
    }

    fn check_claims(&self, claims: &Claims) -> Result<(), InvalidReason> {
        let now = self.clock.now_unix();
        let skew = self.config.clock_skew;
        let reject = InvalidReason::ClaimRejected;

        if claims.iss.as_deref() != Some(self.config.issuer.as_str()) {
            return Err(reject(RejectedClaim::Issuer));
        }

        if !claims.has_audience(&self.config.audience) {
            return Err(reject(RejectedClaim::Audience));
        }

        let exp = claims.exp.ok_or(reject(RejectedClaim::Expiry))?;
        check_expiry(exp, now, skew).map_err(|_| reject(RejectedClaim::Expiry))?;

        if let Some(nbf) = claims.nbf {
            check_not_before(nbf, now, skew).map_err(|_| reject(RejectedClaim::NotBefore))?;
        }

        if let Some(iat) = claims.iat {
            check_issued_at(iat, now, skew).map_err(|_| reject(RejectedClaim::IssuedAt))?;
        }

        if let Some(missing) = self
            .config
            .required_scopes
            .iter()
            .find(|scope| !claims.grants(scope))
        {
            tracing::debug!(target: "ts.auth.jwt", scope = %missing, "Token lacks required scope");
            return Err(reject(RejectedClaim::Scope));
        }

        Ok(())
    }
}

/// Whether `key` may verify a token signed with `algorithm`.
fn key_accepts(key: &SigningKey, algorithm: Algorithm) -> Result<(), InvalidReason> {
    if key.alg().is_some_and(|declared| declared != algorithm) {
        tracing::debug!(target: "ts.auth.jwt", alg = ?algorithm, "Token algorithm disagrees with JWK alg");
        return Err(InvalidReason::BadSignature);
    }

    if !key.family().supports(algorithm) {
        tracing::debug!(target: "ts.auth.jwt", alg = ?algorithm, "Token algorithm does not fit key type");
        return Err(InvalidReason::BadSignature);
    }

    Ok(())
}

/// Verify the signature with `key` under `algorithm` and parse the claims.
fn verify_signature(
    token: &str,
    key: &SigningKey,
    algorithm: Algorithm,
) -> Result<Claims, InvalidReason> {
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();
    validation.leeway = 0;

    decode::<Claims>(token, key.decoding_key(), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(target: "ts.auth.jwt", error = %e, "Token verification failed");
            match e.kind() {
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => InvalidReason::Malformed,
                _ => InvalidReason::BadSignature,
            }
        })
}
