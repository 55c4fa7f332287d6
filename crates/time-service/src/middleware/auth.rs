//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the Authorization header, validates it,
//! and injects the claims into request extensions.

use crate::auth::{InvalidReason, TokenValidator, ValidationResult};
use crate::errors::TsError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Validator with its key-set resolver.
    pub token_validator: Arc<TokenValidator>,
}

/// Split `Bearer <token>` (scheme is case-insensitive).
fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Authentication middleware that validates bearer tokens.
///
/// # Response
///
/// - 401 with `WWW-Authenticate` if the token is missing or invalid
/// - 503 if the signing keys can't be fetched
/// - Otherwise the next handler runs with the claims in extensions
#[instrument(skip_all, name = "ts.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, TsError> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "ts.middleware.auth", "Missing Authorization header");
            TsError::InvalidToken("Missing Authorization header".to_string())
        })?;

    let token = bearer_token(auth_header).ok_or_else(|| {
        tracing::debug!(target: "ts.middleware.auth", "Invalid Authorization header format");
        TsError::InvalidToken("Invalid Authorization header format".to_string())
    })?;

    let claims = match state.token_validator.validate(token).await {
        ValidationResult::Valid(claims) => claims,
        ValidationResult::Invalid(InvalidReason::KeySetUnavailable) => {
            return Err(TsError::ServiceUnavailable(
                "Signing keys unavailable".to_string(),
            ));
        }
        ValidationResult::Invalid(reason) => {
            return Err(TsError::InvalidToken(reason.to_string()));
        }
    };

    tracing::debug!(
        target: "ts.middleware.auth",
        client_id = claims.client_id().unwrap_or("unknown"),
        "Request authenticated"
    );

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
