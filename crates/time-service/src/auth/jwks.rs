//! Signing key resolution from the authority's JWKS document.
//!
//! [`KeySetResolver`] keeps the most recently fetched key set as an immutable
//! [`SigningKeySet`] snapshot behind an `Arc`. Lookups read the snapshot;
//! refreshes build a complete new set and swap it in, so readers never see
//! a half-updated set.
//!
//! # Refresh rules
//!
//! - No snapshot yet: fetch.
//! - Snapshot older than the cache TTL: fetch. If that fetch fails and the
//!   stale snapshot still holds the key, the stale key is served.
//! - Key missing from a current snapshot: fetch once, unless the previous
//!   fetch was less than the minimum refresh interval ago. This bounds the
//!   fetch rate an attacker can cause with made-up key ids.
//! - Previous fetch failed less than the minimum refresh interval ago: no
//!   fetch, the previous failure is returned (or the stale key served).
//!
//! Concurrent refreshes collapse behind a single async mutex. A task that
//! waited on the mutex first checks whether the snapshot it saw has already
//! been replaced and, if so, uses the new one without fetching. If instead a
//! fetch failed while it waited, it takes that failure without fetching.

use crate::observability::metrics::{record_jwks_refresh, record_jwks_refresh_throttled};
use common::clock::Clock;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default snapshot lifetime (24 hours).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default minimum interval between refresh-on-miss fetches.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Default timeout for a JWKS fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Key-set resolution errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeySetError {
    /// The key id is not in the key set, even after a refresh.
    #[error("Signing key not found")]
    UnknownKey,

    /// The JWKS endpoint could not be reached or returned garbage.
    #[error("Key set authority unreachable: {0}")]
    AuthorityUnreachable(String),
}

/// JSON Web Key as published by the authority.
///
/// Only the members needed to build a verification key are read.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type: `RSA`, `EC` or `OKP`.
    pub kty: String,

    /// Key ID.
    #[serde(default)]
    pub kid: Option<String>,

    /// Algorithm the key is meant for, if declared.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (`sig` or `enc`).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Curve for EC / OKP keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// EC x coordinate, or the OKP public key (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,
}

/// JWKS document. Entries are kept raw so one bad key can't sink the set.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<serde_json::Value>,
}

/// Key family, used to check the token's algorithm against the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    Ec,
    Okp,
}

impl KeyFamily {
    /// Whether `alg` is a signature algorithm for this family.
    pub fn supports(self, alg: Algorithm) -> bool {
        match self {
            KeyFamily::Rsa => matches!(
                alg,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            KeyFamily::Ec => matches!(alg, Algorithm::ES256 | Algorithm::ES384),
            KeyFamily::Okp => alg == Algorithm::EdDSA,
        }
    }
}

/// A verification key ready for `jsonwebtoken::decode`.
pub struct SigningKey {
    kid: String,
    family: KeyFamily,
    alg: Option<Algorithm>,
    decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("family", &self.family)
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn family(&self) -> KeyFamily {
        self.family
    }

    /// Algorithm declared by the JWK, if any.
    pub fn alg(&self) -> Option<Algorithm> {
        self.alg
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Build a key from a JWK.
    ///
    /// Returns `None` (with a warning) for keys that can't be used to verify
    /// signatures: no kid, `use` other than `sig`, unknown type or curve,
    /// undecodable material, or an unrecognized `alg`.
    pub fn from_jwk(jwk: &Jwk) -> Option<Self> {
        let Some(kid) = jwk.kid.as_deref().filter(|kid| !kid.is_empty()) else {
            tracing::warn!(target: "ts.auth.jwks", kty = %jwk.kty, "Skipping JWK without kid");
            return None;
        };

        if let Some(key_use) = jwk.key_use.as_deref() {
            if key_use != "sig" {
                tracing::debug!(target: "ts.auth.jwks", kid = %kid, key_use = %key_use, "Skipping non-signing JWK");
                return None;
            }
        }

        let alg = match jwk.alg.as_deref() {
            Some(name) => match Algorithm::from_str(name) {
                Ok(alg) => Some(alg),
                Err(_) => {
                    tracing::warn!(target: "ts.auth.jwks", kid = %kid, alg = %name, "Skipping JWK with unsupported alg");
                    return None;
                }
            },
            None => None,
        };

        let built = match jwk.kty.as_str() {
            "RSA" => match (jwk.n.as_deref(), jwk.e.as_deref()) {
                (Some(n), Some(e)) => {
                    DecodingKey::from_rsa_components(n, e).map(|key| (KeyFamily::Rsa, key))
                }
                _ => {
                    tracing::warn!(target: "ts.auth.jwks", kid = %kid, "Skipping RSA JWK missing n or e");
                    return None;
                }
            },
            "EC" => match (jwk.crv.as_deref(), jwk.x.as_deref(), jwk.y.as_deref()) {
                (Some("P-256" | "P-384"), Some(x), Some(y)) => {
                    DecodingKey::from_ec_components(x, y).map(|key| (KeyFamily::Ec, key))
                }
                _ => {
                    tracing::warn!(target: "ts.auth.jwks", kid = %kid, "Skipping EC JWK with unsupported curve or missing coordinates");
                    return None;
                }
            },
            "OKP" => match (jwk.crv.as_deref(), jwk.x.as_deref()) {
                (Some("Ed25519"), Some(x)) => {
                    DecodingKey::from_ed_components(x).map(|key| (KeyFamily::Okp, key))
                }
                _ => {
                    tracing::warn!(target: "ts.auth.jwks", kid = %kid, "Skipping OKP JWK with unsupported curve or missing x");
                    return None;
                }
            },
            other => {
                tracing::warn!(target: "ts.auth.jwks", kid = %kid, kty = %other, "Skipping JWK with unsupported key type");
                return None;
            }
        };

        let (family, decoding_key) = match built {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!(target: "ts.auth.jwks", kid = %kid, error = %e, "Skipping JWK with invalid key material");
                return None;
            }
        };

        if let Some(alg) = alg {
            if !family.supports(alg) {
                tracing::warn!(target: "ts.auth.jwks", kid = %kid, alg = ?alg, "Skipping JWK whose alg does not match its key type");
                return None;
            }
        }

        Some(Self {
            kid: kid.to_string(),
            family,
            alg,
            decoding_key,
        })
    }
}

/// Immutable snapshot of the authority's signing keys.
#[derive(Debug)]
pub struct SigningKeySet {
    keys: HashMap<String, Arc<SigningKey>>,
    fetched_at: i64,
}

impl SigningKeySet {
    /// Build a set from raw JWKS entries, skipping unusable keys.
    fn from_entries(entries: Vec<serde_json::Value>, fetched_at: i64) -> Self {
        let mut keys = HashMap::with_capacity(entries.len());

        for entry in entries {
            let jwk: Jwk = match serde_json::from_value(entry) {
                Ok(jwk) => jwk,
                Err(e) => {
                    tracing::warn!(target: "ts.auth.jwks", error = %e, "Skipping unparseable JWK");
                    continue;
                }
            };

            if let Some(key) = SigningKey::from_jwk(&jwk) {
                keys.insert(key.kid.clone(), Arc::new(key));
            }
        }

        Self { keys, fetched_at }
    }

    pub fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.get(kid).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// When this snapshot was fetched (Unix seconds).
    pub fn fetched_at(&self) -> i64 {
        self.fetched_at
    }

    fn is_expired_at(&self, now: i64, ttl: Duration) -> bool {
        now.saturating_sub(self.fetched_at) >= duration_secs(ttl)
    }
}

#[allow(clippy::cast_possible_wrap)]
fn duration_secs(duration: Duration) -> i64 {
    duration.as_secs().min(i64::MAX as u64) as i64
}

/// Why a fetch was started, for metrics and logs.
#[derive(Debug, Clone, Copy)]
enum RefreshTrigger {
    Initial,
    Expired,
    Miss,
}

impl RefreshTrigger {
    fn as_str(self) -> &'static str {
        match self {
            RefreshTrigger::Initial => "initial",
            RefreshTrigger::Expired => "expired",
            RefreshTrigger::Miss => "miss",
        }
    }
}

/// Build the HTTP client used for JWKS fetches.
///
/// # Errors
///
/// Returns `KeySetError::AuthorityUnreachable` if the client cannot be built.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, KeySetError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| KeySetError::AuthorityUnreachable(format!("Failed to build HTTP client: {e}")))
}

/// Resolves key ids to verification keys, fetching the JWKS as needed.
pub struct KeySetResolver {
    jwks_url: String,
    http_client: reqwest::Client,
    clock: Arc<dyn Clock>,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    snapshot: RwLock<Option<Arc<SigningKeySet>>>,
    /// Serializes fetches. Holds the error of the last fetch if it failed.
    refresh_guard: Mutex<Option<KeySetError>>,
    /// Completed fetch attempts. Read before taking `refresh_guard`.
    fetch_attempts: AtomicU64,
    /// Unix time of the last fetch attempt, `i64::MIN` before the first.
    last_fetch_at: AtomicI64,
}

impl fmt::Debug for KeySetResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySetResolver")
            .field("jwks_url", &self.jwks_url)
            .field("cache_ttl", &self.cache_ttl)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .finish_non_exhaustive()
    }
}

impl KeySetResolver {
    /// Create a resolver with an empty cache.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - The authority's JWKS endpoint
    /// * `http_client` - Client with request/connect timeouts configured
    /// * `clock` - Time source for TTL and refresh interval checks
    pub fn new(jwks_url: String, http_client: reqwest::Client, clock: Arc<dyn Clock>) -> Self {
        Self {
            jwks_url,
            http_client,
            clock,
            cache_ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            snapshot: RwLock::new(None),
            refresh_guard: Mutex::new(None),
            fetch_attempts: AtomicU64::new(0),
            last_fetch_at: AtomicI64::new(i64::MIN),
        }
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Current snapshot, if any key set has been fetched.
    pub async fn snapshot(&self) -> Option<Arc<SigningKeySet>> {
        self.snapshot.read().await.clone()
    }

    /// Resolve `kid` to a verification key.
    ///
    /// # Errors
    ///
    /// - `KeySetError::UnknownKey` - not in the key set, even after a refresh
    ///   (or a refresh was suppressed by the minimum interval)
    /// - `KeySetError::AuthorityUnreachable` - a needed fetch failed
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn resolve(&self, kid: &str) -> Result<Arc<SigningKey>, KeySetError> {
        let now = self.clock.now_unix();

        match self.snapshot().await {
            Some(current) if !current.is_expired_at(now, self.cache_ttl) => {
                if let Some(key) = current.get(kid) {
                    tracing::trace!(target: "ts.auth.jwks", "JWKS cache hit");
                    return Ok(key);
                }
                self.resolve_after_miss(kid, &current).await
            }
            Some(stale) => match self.refresh(Some(&stale), RefreshTrigger::Expired).await {
                Ok(set) => set.get(kid).ok_or(KeySetError::UnknownKey),
                Err(e) => match stale.get(kid) {
                    Some(key) => {
                        tracing::warn!(
                            target: "ts.auth.jwks",
                            error = %e,
                            "JWKS refresh failed, serving key from expired snapshot"
                        );
                        Ok(key)
                    }
                    None => Err(e),
                },
            },
            None => {
                let set = self.refresh(None, RefreshTrigger::Initial).await?;
                set.get(kid).ok_or(KeySetError::UnknownKey)
            }
        }
    }

    async fn resolve_after_miss(
        &self,
        kid: &str,
        seen: &Arc<SigningKeySet>,
    ) -> Result<Arc<SigningKey>, KeySetError> {
        let attempts_seen = self.fetch_attempts.load(Ordering::Acquire);
        let mut last_failure = self.refresh_guard.lock().await;

        if let Some(current) = self.snapshot().await {
            if !Arc::ptr_eq(&current, seen) {
                // Another task refreshed while we waited
                return current.get(kid).ok_or(KeySetError::UnknownKey);
            }
        }
        if let Some(err) = self.failure_since(attempts_seen, last_failure.as_ref()) {
            return Err(err);
        }

        let now = self.clock.now_unix();
        let last = self.last_fetch_at.load(Ordering::SeqCst);
        if now.saturating_sub(last) < duration_secs(self.min_refresh_interval) {
            tracing::debug!(
                target: "ts.auth.jwks",
                kid = %kid,
                "Key not found, refresh suppressed by minimum interval"
            );
            record_jwks_refresh_throttled();
            return Err(KeySetError::UnknownKey);
        }

        let set = self
            .fetch_and_swap(RefreshTrigger::Miss, &mut last_failure)
            .await?;
        set.get(kid).ok_or_else(|| {
            tracing::warn!(target: "ts.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
            KeySetError::UnknownKey
        })
    }

    async fn refresh(
        &self,
        seen: Option<&Arc<SigningKeySet>>,
        trigger: RefreshTrigger,
    ) -> Result<Arc<SigningKeySet>, KeySetError> {
        let attempts_seen = self.fetch_attempts.load(Ordering::Acquire);
        let mut last_failure = self.refresh_guard.lock().await;

        let now = self.clock.now_unix();
        if let Some(current) = self.snapshot().await {
            let replaced = seen.map_or(true, |seen| !Arc::ptr_eq(&current, seen));
            if replaced && !current.is_expired_at(now, self.cache_ttl) {
                return Ok(current);
            }
        }
        if let Some(err) = self.failure_since(attempts_seen, last_failure.as_ref()) {
            return Err(err);
        }

        if let Some(err) = last_failure.as_ref() {
            let last = self.last_fetch_at.load(Ordering::SeqCst);
            if now.saturating_sub(last) < duration_secs(self.min_refresh_interval) {
                tracing::debug!(
                    target: "ts.auth.jwks",
                    trigger = trigger.as_str(),
                    "Previous JWKS fetch failed, retry suppressed by minimum interval"
                );
                record_jwks_refresh_throttled();
                return Err(err.clone());
            }
        }

        self.fetch_and_swap(trigger, &mut last_failure).await
    }

    /// The failure of a fetch that completed after `attempts_seen` was read.
    fn failure_since(
        &self,
        attempts_seen: u64,
        last_failure: Option<&KeySetError>,
    ) -> Option<KeySetError> {
        if self.fetch_attempts.load(Ordering::Acquire) == attempts_seen {
            return None;
        }
        let err = last_failure.cloned()?;
        tracing::debug!(target: "ts.auth.jwks", error = %err, "Sharing failure of concurrent JWKS fetch");
        Some(err)
    }

    /// Fetch the JWKS and install it as the current snapshot.
    ///
    /// `last_failure` is the contents of the held `refresh_guard`.
    #[instrument(skip_all, fields(trigger = trigger.as_str()))]
    async fn fetch_and_swap(
        &self,
        trigger: RefreshTrigger,
        last_failure: &mut Option<KeySetError>,
    ) -> Result<Arc<SigningKeySet>, KeySetError> {
        let now = self.clock.now_unix();
        self.last_fetch_at.store(now, Ordering::SeqCst);

        let start = Instant::now();
        let result = self.fetch(now).await;
        let status = if result.is_ok() { "success" } else { "error" };
        record_jwks_refresh(status, trigger.as_str(), start.elapsed());

        *last_failure = result.as_ref().err().cloned();
        self.fetch_attempts.fetch_add(1, Ordering::Release);

        let set = Arc::new(result?);

        tracing::info!(
            target: "ts.auth.jwks",
            key_count = set.len(),
            trigger = trigger.as_str(),
            "JWKS cache refreshed"
        );
        if set.is_empty() {
            tracing::warn!(target: "ts.auth.jwks", "JWKS contains no usable signing keys");
        }

        *self.snapshot.write().await = Some(Arc::clone(&set));
        Ok(set)
    }

    async fn fetch(&self, now: i64) -> Result<SigningKeySet, KeySetError> {
        tracing::debug!(target: "ts.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "ts.auth.jwks", error = %e, "Failed to fetch JWKS");
                KeySetError::AuthorityUnreachable(format!("JWKS request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(target: "ts.auth.jwks", status = %status, "JWKS endpoint returned error");
            return Err(KeySetError::AuthorityUnreachable(format!(
                "JWKS endpoint returned {status}"
            )));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "ts.auth.jwks", error = %e, "Failed to parse JWKS response");
            KeySetError::AuthorityUnreachable(format!("Invalid JWKS document: {e}"))
        })?;

        Ok(SigningKeySet::from_entries(jwks.keys, now))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use auth_test_utils::{TestKeypair, TestRsaKey};
    use common::clock::ManualClock;

    #[test]
    fn test_jwk_deserialization_rsa() {
        let json = r#"{
            "kty": "RSA",
            "use": "sig",
            "kid": "nOo3ZDrODXEK1jKWhXslHR_KXEg",
            "x5t": "nOo3ZDrODXEK1jKWhXslHR_KXEg",
            "n": "oaLLT9hkcSj2tGf",
            "e": "AQAB",
            "x5c": ["MIIDBTCCAe2gAwIBAgIQN33ROaIJ6bJBWDCxtmJEbjANBgkqhkiG9w0BAQsFADAt"],
            "issuer": "https://login.microsoftonline.com/tenant/v2.0"
        }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid.as_deref(), Some("nOo3ZDrODXEK1jKWhXslHR_KXEg"));
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
        assert!(jwk.alg.is_none());
    }

    #[test]
    fn test_signing_key_from_okp_jwk() {
        let keypair = TestKeypair::new(1, "ed-1");
        let jwk: Jwk = serde_json::from_value(keypair.jwk_json()).unwrap();

        let key = SigningKey::from_jwk(&jwk).expect("key should build");
        assert_eq!(key.kid(), "ed-1");
        assert_eq!(key.family(), KeyFamily::Okp);
        assert_eq!(key.alg(), Some(Algorithm::EdDSA));
    }

    #[test]
    fn test_signing_key_from_rsa_jwk() {
        let rsa = TestRsaKey::new("rsa-1");
        let jwk: Jwk = serde_json::from_value(rsa.jwk_json()).unwrap();

        let key = SigningKey::from_jwk(&jwk).expect("key should build");
        assert_eq!(key.family(), KeyFamily::Rsa);
        assert_eq!(key.alg(), Some(Algorithm::RS256));
    }

    #[test]
    fn test_signing_key_skips_unusable_jwks() {
        let keypair = TestKeypair::new(1, "ed-1");
        let base = keypair.jwk_json();

        let mut no_kid = base.clone();
        no_kid.as_object_mut().unwrap().remove("kid");

        let mut enc_use = base.clone();
        enc_use["use"] = "enc".into();

        let mut bad_alg = base.clone();
        bad_alg["alg"] = "none".into();

        let mut mismatched_alg = base.clone();
        mismatched_alg["alg"] = "RS256".into();

        let mut bad_curve = base.clone();
        bad_curve["crv"] = "X25519".into();

        let mut bad_kty = base.clone();
        bad_kty["kty"] = "oct".into();

        let rsa_missing_e = serde_json::json!({"kty": "RSA", "kid": "r", "n": "AQAB"});

        for value in [
            no_kid,
            enc_use,
            bad_alg,
            mismatched_alg,
            bad_curve,
            bad_kty,
            rsa_missing_e,
        ] {
            let jwk: Jwk = serde_json::from_value(value.clone()).unwrap();
            assert!(
                SigningKey::from_jwk(&jwk).is_none(),
                "Expected {value} to be skipped"
            );
        }
    }

    #[test]
    fn test_signing_key_without_use_or_alg_is_kept() {
        let keypair = TestKeypair::new(1, "ed-1");
        let mut value = keypair.jwk_json();
        let object = value.as_object_mut().unwrap();
        object.remove("use");
        object.remove("alg");

        let jwk: Jwk = serde_json::from_value(value).unwrap();
        let key = SigningKey::from_jwk(&jwk).expect("key should build");
        assert!(key.alg().is_none());
    }

    #[test]
    fn test_key_set_skips_bad_entries() {
        let keypair = TestKeypair::new(1, "ed-1");
        let set = SigningKeySet::from_entries(
            vec![
                keypair.jwk_json(),
                serde_json::json!("not an object"),
                serde_json::json!({"kid": "no-kty"}),
            ],
            1_000,
        );

        assert_eq!(set.len(), 1);
        assert!(set.get("ed-1").is_some());
        assert_eq!(set.fetched_at(), 1_000);
    }

    #[test]
    fn test_key_set_expiry() {
        let set = SigningKeySet::from_entries(vec![], 1_000);
        let ttl = Duration::from_secs(100);

        assert!(!set.is_expired_at(1_099, ttl));
        assert!(set.is_expired_at(1_100, ttl));
    }

    #[test]
    fn test_key_family_supports() {
        assert!(KeyFamily::Rsa.supports(Algorithm::RS256));
        assert!(KeyFamily::Rsa.supports(Algorithm::PS512));
        assert!(!KeyFamily::Rsa.supports(Algorithm::EdDSA));
        assert!(!KeyFamily::Rsa.supports(Algorithm::HS256));
        assert!(KeyFamily::Ec.supports(Algorithm::ES256));
        assert!(!KeyFamily::Ec.supports(Algorithm::RS256));
        assert!(KeyFamily::Okp.supports(Algorithm::EdDSA));
        assert!(!KeyFamily::Okp.supports(Algorithm::ES256));
    }

    #[test]
    fn test_resolver_defaults() {
        let resolver = KeySetResolver::new(
            "http://localhost/keys".to_string(),
            reqwest::Client::new(),
            Arc::new(ManualClock::new(0)),
        );
        assert_eq!(resolver.cache_ttl, DEFAULT_CACHE_TTL);
        assert_eq!(resolver.min_refresh_interval, DEFAULT_MIN_REFRESH_INTERVAL);
        assert_eq!(resolver.jwks_url(), "http://localhost/keys");
    }

    #[test]
    fn test_resolver_debug_hides_internals() {
        let resolver = KeySetResolver::new(
            "http://localhost/keys".to_string(),
            reqwest::Client::new(),
            Arc::new(ManualClock::new(0)),
        )
        .with_cache_ttl(Duration::from_secs(60))
        .with_min_refresh_interval(Duration::from_secs(5));

        let debug_str = format!("{resolver:?}");
        assert!(debug_str.contains("http://localhost/keys"));
        assert!(debug_str.contains("60s"));
    }
}
