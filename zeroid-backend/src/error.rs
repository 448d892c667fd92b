//! The request-boundary error type (§7): every handler returns
//! `Result<_, ApiError>`, and nothing downstream of a handler ever panics
//! its way past the HTTP boundary. Mirrors the shape the prior backend code
//! in this repo used (`ApiError { status, code, message }` implementing
//! `IntoResponse`), extended with the taxonomy §7 lays out.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub const CODE_VALIDATION: &str = "VALIDATION_ERROR";
pub const CODE_UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const CODE_FORBIDDEN: &str = "FORBIDDEN";
pub const CODE_SANCTIONED_COUNTRY: &str = "SANCTIONED_COUNTRY";
pub const CODE_KYC_FAILED: &str = "KYC_FAILED";
pub const CODE_RATE_LIMITED: &str = "RATE_LIMITED";
pub const CODE_NOT_FOUND: &str = "NOT_FOUND";
pub const CODE_ESCROW_NOT_FOUND: &str = "ESCROW_NOT_FOUND";
pub const CODE_ESCROW_INVALIDATED: &str = "ESCROW_INVALIDATED";
pub const CODE_ESCROW_EXPIRED: &str = "ESCROW_EXPIRED";
pub const CODE_INTEGRITY: &str = "INTEGRITY_FAILURE";
pub const CODE_NULLIFIER_REPLAY: &str = "NULLIFIER_REPLAY";
pub const CODE_NO_VERIFICATION_KEY: &str = "NO_VERIFICATION_KEY";
pub const CODE_SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
pub const CODE_REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT";
pub const CODE_INTERNAL: &str = "INTERNAL_SERVER_ERROR";

/// A single field-level validation failure, echoed back per §7's
/// "validation errors also include `details: [{path, message}]`".
#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub path: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Vec<ValidationDetail>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn validation(details: Vec<ValidationDetail>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: CODE_VALIDATION,
            message: "request failed validation".to_string(),
            details,
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, CODE_UNAUTHORIZED, message)
    }

    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, code, message)
    }

    pub fn rate_limited() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            CODE_RATE_LIMITED,
            "rate limit exceeded",
        )
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    pub fn unprocessable(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            CODE_SERVICE_UNAVAILABLE,
            message,
        )
    }

    /// Internal errors are logged with full context by the caller; only a
    /// generic message crosses the HTTP boundary (§7).
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            CODE_INTERNAL,
            "an internal error occurred",
        )
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<ValidationDetail>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}
