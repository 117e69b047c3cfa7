//! Error types for the submission pipeline.
//!
//! [`Rejection`] covers everything the client can fix or that the business
//! logic refused (HTTP 400). [`AppError`] adds unexpected failures (HTTP 500).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Outcome of a validation, verification or delivery step.
pub type Outcome = Result<(), Rejection>;

/// A submission was refused. The display string is returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Unsupported content type")]
    UnsupportedContentType,

    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("Field '{0}' must be a string")]
    NestedField(String),

    #[error("File uploads are not accepted (field '{0}')")]
    FileUpload(String),

    #[error("Field '{field}' exceeds the maximum length of {limit} characters")]
    FieldTooLong { field: String, limit: usize },

    #[error("Submission exceeds the maximum total size of {limit} characters at field '{field}'")]
    TotalTooLarge { field: String, limit: usize },

    #[error("Submission exceeds the maximum of {limit} fields at field '{field}'")]
    TooManyFields { field: String, limit: usize },

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Missing CAPTCHA token")]
    TurnstileTokenMissing,

    #[error("CAPTCHA verification failed")]
    TurnstileFailed,

    #[error("No delivery mechanism available")]
    NoDeliveryMechanism,

    #[error("Failed to send email: {0}")]
    DeliveryFailed(String),
}

/// Top-level handler error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Rejected(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::Internal(e) = &self {
            error!(error = %e, "submission_internal_error");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
