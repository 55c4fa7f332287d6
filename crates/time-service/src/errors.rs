//! Time service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Messages returned to clients are generic; the detailed reason is logged
//! server-side only.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Challenge sent with every 401 response.
const BEARER_CHALLENGE: &str = "Bearer realm=\"time-service\", error=\"invalid_token\"";

/// Time service error type.
///
/// Maps to HTTP status codes:
/// - InvalidToken: 401 Unauthorized
/// - ServiceUnavailable: 503 Service Unavailable
#[derive(Debug, Error)]
pub enum TsError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl TsError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            TsError::InvalidToken(_) => 401,
            TsError::ServiceUnavailable(_) => 503,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for TsError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            TsError::InvalidToken(reason) => {
                // Reason stays server-side; the client only learns the token was refused
                tracing::debug!(target: "ts.auth", reason = %reason, "Rejecting request");
                (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_TOKEN",
                    "The access token is invalid or expired",
                )
            }
            TsError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "ts.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable",
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static(BEARER_CHALLENGE),
            );
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(TsError::InvalidToken("x".into()).status_code(), 401);
        assert_eq!(TsError::ServiceUnavailable("x".into()).status_code(), 503);
    }

    #[tokio::test]
    async fn test_invalid_token_response_is_generic() {
        let response = TsError::InvalidToken("UnknownSigner kid=abc".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            BEARER_CHALLENGE
        );

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "INVALID_TOKEN");
        assert_eq!(
            body["error"]["message"],
            "The access token is invalid or expired"
        );
        assert!(!body.to_string().contains("UnknownSigner"));
        assert!(!body.to_string().contains("abc"));
    }

    #[tokio::test]
    async fn test_service_unavailable_response() {
        let response =
            TsError::ServiceUnavailable("JWKS endpoint returned 502".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
        assert!(!body.to_string().contains("502"));
    }
}
