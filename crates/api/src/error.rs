use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use cryoflow_core::error::CoreError;
use cryoflow_pipeline::{SubmissionError, SubmitterError};

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain errors of the core and pipeline crates and adds
/// HTTP-specific variants. Renders as `{ "error": ..., "code": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => classify_core_error(core),

            // --- Submission pipeline ---
            AppError::Submission(err) => match err {
                SubmissionError::UnknownJobKind(kind) => (
                    StatusCode::BAD_REQUEST,
                    "UNKNOWN_JOB_KIND",
                    format!("Unknown job kind: {kind}"),
                ),
                SubmissionError::Validation(msg) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "VALIDATION_ERROR",
                    msg.clone(),
                ),
                SubmissionError::Build(core) => classify_core_error(core),
                SubmissionError::Submitter(submitter) => classify_submitter_error(submitter),
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::Validation(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "VALIDATION_ERROR",
            msg.clone(),
        ),
        CoreError::UnknownJobKind(kind) => (
            StatusCode::BAD_REQUEST,
            "UNKNOWN_JOB_KIND",
            format!("Unknown job kind: {kind}"),
        ),
        // The caller chose the output directory, so this is their mistake.
        CoreError::OutputOutsideProject { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "VALIDATION_ERROR",
            err.to_string(),
        ),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

/// Every cluster-side failure is a 502: the request was fine, the batch
/// system was not.
fn classify_submitter_error(err: &SubmitterError) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %err, "Cluster submission failed");
    (StatusCode::BAD_GATEWAY, "SUBMISSION_FAILED", err.to_string())
}
