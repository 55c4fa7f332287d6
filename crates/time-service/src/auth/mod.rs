//! Bearer token authentication.
//!
//! - `claims` - Claims carried by a validated token
//! - `jwks` - Signing key resolution from the authority's JWKS
//! - `jwt` - The validation checklist

pub mod claims;
pub mod jwks;
pub mod jwt;

pub use claims::Claims;
pub use jwks::{KeySetError, KeySetResolver, SigningKey, SigningKeySet};
pub use jwt::{InvalidReason, RejectedClaim, TokenValidator, ValidationResult, ValidatorConfig};
