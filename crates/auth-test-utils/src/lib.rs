//! # Auth Test Utilities
//!
//! Shared test utilities for the time client and time service.
//!
//! This crate provides:
//! - Deterministic signing keys (seeded Ed25519, fixed RSA)
//! - Claim set builders (TestClaimsBuilder)
//! - A wiremock-backed fake authority (MockAuthority)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let keypair = TestKeypair::new(1, "test-key-01");
//!     let authority = MockAuthority::start().await;
//!     authority.mount_jwks(vec![keypair.jwk_json()]).await;
//!
//!     let token = keypair.sign(&TestClaimsBuilder::new(now).build());
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_authority;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_authority::*;
pub use token_builders::*;
