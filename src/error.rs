//! Application error type and HTTP mapping.
//!
//! Every error kind is distinguishable programmatically via the `error`
//! field of the JSON body, not just the human-readable message. Validation
//! failures carry the full list of violated fields.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub type Result<T> = std::result::Result<T, AppError>;

/// A single violated field in a validation failure.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Missing or invalid credentials")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    /// One or more request fields failed validation.
    #[error("Validation failed")]
    Validation(Vec<FieldViolation>),

    #[error("{0}")]
    Conflict(String),

    /// Order-id reservation exhausted its bounded retries.
    #[error("{0}")]
    SequenceGeneration(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Build a validation error for a single field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldViolation::new(field, message)])
    }

    /// Stable machine-readable code for the JSON body.
    fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::Unauthorized => "unauthorized",
            AppError::BadRequest(_) => "bad_request",
            AppError::Validation(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::SequenceGeneration(_) => "sequence_generation",
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::SequenceGeneration(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a [FieldViolation]>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the log, not the response body. The
        // Display impls above never embed request bodies, so nothing
        // sensitive can leak through here.
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("{}", self);
        }

        let message = match &self {
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let fields = match &self {
            AppError::Validation(violations) => Some(violations.as_slice()),
            _ => None,
        };

        let body = Json(ErrorBody {
            error: self.code(),
            message,
            fields,
        });

        (status, body).into_response()
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::PathRejection> for AppError {
    fn from(rejection: axum::extract::rejection::PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_per_kind() {
        assert_eq!(AppError::NotFound("x".into()).code(), "not_found");
        assert_eq!(AppError::Forbidden("x".into()).code(), "forbidden");
        assert_eq!(
            AppError::Validation(vec![FieldViolation::new("amount", "must be >= 0")]).code(),
            "validation"
        );
        assert_eq!(AppError::Conflict("x".into()).code(), "conflict");
        assert_eq!(
            AppError::SequenceGeneration("x".into()).code(),
            "sequence_generation"
        );
    }

    #[test]
    fn internal_errors_do_not_echo_details() {
        let err = AppError::Internal("connection string leaked".into());
        let status = err.status();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
