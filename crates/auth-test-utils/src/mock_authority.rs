//! Fake identity authority for integration tests
//!
//! `MockAuthority` wraps a wiremock server exposing the two endpoints the
//! time client and service talk to: the v2.0 token endpoint and the JWKS
//! document.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Tenant segment of every authority URL.
pub const TEST_TENANT: &str = "tenant-id";

/// Wiremock-backed authority.
///
/// # Example
/// ```rust,ignore
/// let authority = MockAuthority::start().await;
/// authority.mount_jwks(vec![keypair.jwk_json()]).await;
/// authority.mount_token(&keypair.sign(&claims), 3600).await;
/// ```
pub struct MockAuthority {
    server: MockServer,
}

impl MockAuthority {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Underlying wiremock server, for custom mocks.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Authority URL as configured on the client (`AUTHORITY_URL`).
    pub fn authority_url(&self) -> String {
        format!("{}/{TEST_TENANT}", self.server.uri())
    }

    pub fn token_path(&self) -> String {
        format!("/{TEST_TENANT}/oauth2/v2.0/token")
    }

    pub fn jwks_path(&self) -> String {
        format!("/{TEST_TENANT}/discovery/v2.0/keys")
    }

    /// JWKS URL as configured on the service (`JWKS_URL`).
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), self.jwks_path())
    }

    /// Serve `keys` as the JWKS document.
    pub async fn mount_jwks(&self, keys: Vec<serde_json::Value>) {
        Mock::given(method("GET"))
            .and(path(self.jwks_path()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "keys": keys })),
            )
            .mount(&self.server)
            .await;
    }

    /// Fail every JWKS fetch with `status`.
    pub async fn mount_jwks_failure(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(self.jwks_path()))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Issue `access_token` from the token endpoint on every request.
    pub async fn mount_token(&self, access_token: &str, expires_in: u64) {
        Mock::given(method("POST"))
            .and(path(self.token_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "expires_in": expires_in,
                "ext_expires_in": expires_in,
                "access_token": access_token
            })))
            .mount(&self.server)
            .await;
    }

    /// Number of JWKS requests received so far.
    pub async fn jwks_fetch_count(&self) -> usize {
        self.count_requests(&self.jwks_path()).await
    }

    /// Number of token requests received so far.
    pub async fn token_request_count(&self) -> usize {
        self.count_requests(&self.token_path()).await
    }

    /// Drop all mounted mocks and recorded requests.
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    async fn count_requests(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| {
                requests
                    .iter()
                    .filter(|r| r.url.path() == request_path)
                    .count()
            })
            .unwrap_or(0)
    }
}
