//! Builder patterns for test data construction
//!
//! Provides a fluent API for access token claim sets.

use chrono::Utc;
use serde_json::{json, Map, Value};

/// Issuer used by fixtures unless overridden.
pub const TEST_ISSUER: &str = "https://login.example.com/tenant-id/v2.0";

/// Audience used by fixtures unless overridden.
pub const TEST_AUDIENCE: &str = "api://time-service";

/// Client identity used by fixtures.
pub const TEST_CLIENT_ID: &str = "client-A";

/// Builder for access token claims
///
/// Times are relative to the `now` passed in, so claims line up with a
/// manual clock.
///
/// # Example
/// ```rust,ignore
/// let claims = TestClaimsBuilder::new(now)
///     .with_audience("api://other")
///     .expires_at(now - 10)
///     .build();
/// ```
pub struct TestClaimsBuilder {
    iss: String,
    aud: Value,
    sub: String,
    exp: Option<i64>,
    nbf: Option<i64>,
    iat: Option<i64>,
    scp: Option<String>,
    roles: Option<Vec<String>>,
}

impl TestClaimsBuilder {
    /// Valid claims for one hour from `now`.
    pub fn new(now: i64) -> Self {
        Self {
            iss: TEST_ISSUER.to_string(),
            aud: Value::String(TEST_AUDIENCE.to_string()),
            sub: TEST_CLIENT_ID.to_string(),
            exp: Some(now + 3600),
            nbf: Some(now),
            iat: Some(now),
            scp: None,
            roles: None,
        }
    }

    /// Valid claims relative to the wall clock.
    pub fn from_wall_clock() -> Self {
        Self::new(Utc::now().timestamp())
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    pub fn with_audience(mut self, audience: &str) -> Self {
        self.aud = Value::String(audience.to_string());
        self
    }

    /// Audience as a JSON array.
    pub fn with_audiences(mut self, audiences: &[&str]) -> Self {
        self.aud = json!(audiences);
        self
    }

    pub fn expires_at(mut self, exp: i64) -> Self {
        self.exp = Some(exp);
        self
    }

    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }

    pub fn not_before(mut self, nbf: i64) -> Self {
        self.nbf = Some(nbf);
        self
    }

    pub fn issued_at(mut self, iat: i64) -> Self {
        self.iat = Some(iat);
        self
    }

    /// Delegated scopes (space-separated `scp` claim).
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scp = Some(scope.to_string());
        self
    }

    /// Application roles (`roles` claim).
    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = Some(roles.iter().map(|r| (*r).to_string()).collect());
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = Map::new();
        claims.insert("iss".to_string(), Value::String(self.iss));
        claims.insert("aud".to_string(), self.aud);
        claims.insert("sub".to_string(), Value::String(self.sub.clone()));
        claims.insert("azp".to_string(), Value::String(self.sub));

        if let Some(exp) = self.exp {
            claims.insert("exp".to_string(), json!(exp));
        }
        if let Some(nbf) = self.nbf {
            claims.insert("nbf".to_string(), json!(nbf));
        }
        if let Some(iat) = self.iat {
            claims.insert("iat".to_string(), json!(iat));
        }
        if let Some(scp) = self.scp {
            claims.insert("scp".to_string(), Value::String(scp));
        }
        if let Some(roles) = self.roles {
            claims.insert("roles".to_string(), json!(roles));
        }

        Value::Object(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let claims = TestClaimsBuilder::new(1_000).build();

        assert_eq!(claims["iss"], TEST_ISSUER);
        assert_eq!(claims["aud"], TEST_AUDIENCE);
        assert_eq!(claims["sub"], TEST_CLIENT_ID);
        assert_eq!(claims["exp"], 4_600);
        assert_eq!(claims["nbf"], 1_000);
        assert!(claims.get("scp").is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let claims = TestClaimsBuilder::new(1_000)
            .with_audiences(&["a", "b"])
            .without_expiry()
            .with_scope("time.read")
            .with_roles(&["Time.Reader"])
            .build();

        assert_eq!(claims["aud"], json!(["a", "b"]));
        assert!(claims.get("exp").is_none());
        assert_eq!(claims["scp"], "time.read");
        assert_eq!(claims["roles"], json!(["Time.Reader"]));
    }
}
