//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use runlet_core::TenantError;
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Tenant stack frames, only present for debug invocations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<String>>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("compile error: {0}")]
    Compile(String),

    #[error("{0}")]
    Tenant(TenantError),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<runlet_core::Error> for ApiError {
    fn from(err: runlet_core::Error) -> Self {
        use runlet_core::Error;
        match err {
            Error::NotFound(m) => Self::NotFound(m),
            Error::Forbidden(m) => Self::Forbidden(m),
            Error::NameConflict(m) => Self::Conflict(m),
            Error::InvalidContent(m) => Self::InvalidContent(m),
            Error::InvalidName(m) => Self::InvalidName(m),
            Error::CompileError(m) => Self::Compile(m),
            Error::TenantRuntime(e) => Self::Tenant(e),
            Error::StoreUnavailable(m) => Self::Unavailable(m),
        }
    }
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::InvalidContent(_) => "invalid_content",
            Self::InvalidName(_) => "invalid_name",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "name_conflict",
            Self::Compile(_) => "compile_error",
            Self::Tenant(_) => "tenant_error",
            Self::Unavailable(_) => "store_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::InvalidContent(_) | Self::InvalidName(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Compile(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Tenant(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code().to_string();
        let body = match self {
            Self::Tenant(err) => ErrorResponse {
                code,
                message: err.message,
                stack: err.stack,
            },
            other => {
                if matches!(other, Self::Unavailable(_) | Self::Internal(_)) {
                    tracing::error!(error = %other, "request failed");
                }
                ErrorResponse {
                    code,
                    message: other.to_string(),
                    stack: None,
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
