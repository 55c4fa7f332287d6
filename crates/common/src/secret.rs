//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for the OAuth client secret and for
//! bearer tokens. `SecretString` implements `Debug` with redaction, so any
//! struct deriving `Debug` around it is safe to hand to `tracing`.
//!
//! Secrets are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct Credential {
//!     client_id: String,
//!     client_secret: SecretString,
//! }
//!
//! let credential = Credential {
//!     client_id: "client-A".to_string(),
//!     client_secret: SecretString::from("secret-X"),
//! };
//!
//! // The secret is redacted
//! assert!(!format!("{credential:?}").contains("secret-X"));
//!
//! // Reading the value requires an explicit call
//! assert_eq!(credential.client_secret.expose_secret(), "secret-X");
//! ```
//!
//! Use `SecretString` for client secrets and access tokens. A bearer token is
//! only exposed at the moment it is written into an `Authorization` header.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
