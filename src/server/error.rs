//! HTTP error responses
//!
//! Every failure the router can produce is converted here, at the endpoint
//! boundary, into a structured JSON body. This includes extractor
//! rejections and method mismatches. Upstream details stay in the logs.

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::FieldViolation;

/// Body sent for any upstream or unexpected failure
pub const CHAT_FAILED: &str = "Chat completion failed";

/// Error returned by HTTP handlers
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Malformed request body (400)
    Validation(Vec<FieldViolation>),
    /// Unknown route or resource (404)
    NotFound,
    /// Known route, wrong method (405)
    MethodNotAllowed,
    /// Body could not be read, e.g. over the size limit
    Rejected(StatusCode),
    /// Upstream or internal failure (500); the message is sent to the caller
    Internal(&'static str),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Rejected(status) => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        tracing::debug!(
            status = %rejection.status(),
            "Rejected request body: {}",
            rejection.body_text()
        );
        Self::Rejected(rejection.status())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Validation(details) => json!({
                "error": "Validation failed",
                "details": details,
            }),
            Self::NotFound => json!({ "error": "Not Found" }),
            Self::MethodNotAllowed => json!({ "error": "Method Not Allowed" }),
            Self::Rejected(status) => json!({
                "error": status.canonical_reason().unwrap_or("Bad Request"),
            }),
            Self::Internal(message) => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}

/// Fallback handler for unmatched routes
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Fallback handler for a matched route with an unsupported method
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Validation(vec![]).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Internal(CHAT_FAILED).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rejected_keeps_status() {
        let err = ApiError::Rejected(StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            ApiError::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[tokio::test]
    async fn test_rejected_renders_json() {
        let response = ApiError::Rejected(StatusCode::PAYLOAD_TOO_LARGE).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"error": "Payload Too Large"}));
    }
}
