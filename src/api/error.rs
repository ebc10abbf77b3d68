//! API error responses and the global error fallback.

use std::any::Any;

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// `error` field of every 500 response.
pub const GENERIC_ERROR: &str = "Something went wrong!";
/// `message` field of a 500 response in production.
pub const REDACTED_MESSAGE: &str = "Server error";

/// Errors returned by request handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// `a` or `b` missing or not a finite number.
    #[error("Invalid numbers provided")]
    InvalidNumbers,

    /// Operation outside the supported set.
    #[error("Invalid operation")]
    InvalidOperation,

    /// Division requested while the division flag is off.
    #[error("Division operation not available")]
    DivisionUnavailable,

    /// Division with a zero divisor.
    #[error("Cannot divide by zero")]
    DivisionByZero,

    /// Request body could not be read as JSON.
    #[error("{0}")]
    BadRequest(String),

    /// Anything unexpected. The detail is logged, never sent in production.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Client-facing error description.
    pub error: String,
    /// Extra detail, present on 500 responses only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Detail of an internal error, carried on the response for
/// [`expose_error_detail`].
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Internal(detail) => {
                error!(error = %detail, "Unhandled error while serving request");
                let body = ErrorBody {
                    error: GENERIC_ERROR.to_string(),
                    message: Some(REDACTED_MESSAGE.to_string()),
                };
                let mut response = (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
                response.extensions_mut().insert(ErrorDetail(detail));
                response
            }
            other => {
                let body = ErrorBody {
                    error: other.to_string(),
                    message: None,
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
        }
    }
}

/// Convert a handler panic into a 500 response.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    ApiError::Internal(detail).into_response()
}

/// Middleware that puts the internal error detail into 500 bodies.
/// Installed only outside production.
pub async fn expose_error_detail(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    let body = ErrorBody {
        error: GENERIC_ERROR.to_string(),
        message: Some(detail),
    };
    (parts, Json(body)).into_response()
}
