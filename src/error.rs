use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;

use crate::numbering::NumberingError;
use crate::workflow::WorkflowError;

pub type AppResult<T> = Result<T, AppError>;

/// HTTP-facing error. Domain errors carry a stable machine-readable `code`
/// so callers can distinguish "refetch and retry" (`conflict`) from
/// "never legal" (`invalid_transition`) without parsing messages.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", "resource not found")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_transition",
            message,
        )
    }

    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "not_configured", message)
    }

    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "storage_unavailable",
            message,
        )
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            error.to_string(),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            code: self.code,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => AppError::not_found(),
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::ClosedConnection,
                info,
            ) => AppError::storage_unavailable(info.message().to_string()),
            _ => AppError::internal(value),
        }
    }
}

impl From<NumberingError> for AppError {
    fn from(value: NumberingError) -> Self {
        match value {
            NumberingError::NotConfigured(_) => AppError::not_configured(value.to_string()),
            NumberingError::InvalidTemplate { .. } | NumberingError::UnknownResetPolicy(_) => {
                AppError::not_configured(value.to_string())
            }
            NumberingError::Database(err) => AppError::from(err),
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(value: WorkflowError) -> Self {
        match value {
            WorkflowError::NotFound => AppError::not_found(),
            WorkflowError::Conflict { .. } => AppError::conflict(value.to_string()),
            WorkflowError::InvalidTransition { .. } => {
                AppError::invalid_transition(value.to_string())
            }
            WorkflowError::CorruptStage { .. } => AppError::internal(value),
            WorkflowError::Numbering(err) => AppError::from(err),
            WorkflowError::Database(err) => AppError::from(err),
            WorkflowError::JobQueue(err) => AppError::internal(err),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::internal(value)
    }
}
