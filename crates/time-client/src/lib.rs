//! Time Client Library
//!
//! Client side of the time service: acquires OAuth 2.0 access tokens through
//! the client-credentials grant and calls the protected `/gettime` resource
//! with them.
//!
//! # Modules
//!
//! - `config` - Client configuration from environment
//! - `token_acquirer` - Cached, de-duplicated token acquisition
//! - `caller` - Bearer-authenticated resource calls

pub mod caller;
pub mod config;
pub mod token_acquirer;
