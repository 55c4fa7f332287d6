//! Access token claims.
//!
//! Contains the claims extracted from validated JWTs. Every registered claim
//! is optional at the type level so that a missing claim surfaces as a
//! claim rejection rather than a parse failure. The `sub` field is redacted
//! in Debug output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `aud` claim: a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    /// Whether `audience` is one of the values.
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::One(value) => value == audience,
            Audience::Many(values) => values.iter().any(|v| v == audience),
        }
    }
}

/// Claims of a validated access token.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience (resource identifier).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Subject (client or user object id) - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Expiration timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Authorized party: the client the token was issued to (v2.0 tokens).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    /// Application id of the client (v1.0 tokens).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appid: Option<String>,

    /// Space-separated delegated scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scp: Option<String>,

    /// Application roles granted to the client.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("iat", &self.iat)
            .field("azp", &self.azp)
            .field("appid", &self.appid)
            .field("scp", &self.scp)
            .field("roles", &self.roles)
            .finish()
    }
}

impl Claims {
    /// Whether the token was issued for `audience`.
    pub fn has_audience(&self, audience: &str) -> bool {
        self.aud.as_ref().is_some_and(|aud| aud.contains(audience))
    }

    /// Delegated scopes from `scp`.
    pub fn scopes(&self) -> Vec<&str> {
        self.scp
            .as_deref()
            .map(|scp| scp.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Whether `permission` is granted as a scope or an application role.
    pub fn grants(&self, permission: &str) -> bool {
        self.scopes().contains(&permission) || self.roles.iter().any(|r| r == permission)
    }

    /// Client the token was issued to, if the authority says.
    pub fn client_id(&self) -> Option<&str> {
        self.azp.as_deref().or(self.appid.as_deref())
    }
}
