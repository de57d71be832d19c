use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::{
    dao::{documents::DocumentError, storage::StorageError},
    state::{lifecycle::GameInactive, progression::Rejection},
};

/// Failures of the service layer, independent of HTTP.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No storage backend is installed yet.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The backend failed; logged and reported as 500.
    #[error("storage failure")]
    Storage(#[source] StorageError),
    /// Missing or unknown session token.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Caller is known but lacks the required role.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Malformed or blank input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Well-formed input that does not match (wrong unlock code).
    #[error("rejected: {0}")]
    Rejected(String),
    /// Operation cannot be performed in the current state.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Unexpected failure that must not leak details.
    #[error("internal: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Storage(err)
    }
}

impl From<DocumentError> for ServiceError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::NotFound(_) => ServiceError::NotFound("game not found".into()),
            DocumentError::Corrupt { .. } => ServiceError::Internal(err.to_string()),
            DocumentError::Storage(source) => ServiceError::Storage(source),
        }
    }
}

impl From<GameInactive> for ServiceError {
    fn from(err: GameInactive) -> Self {
        ServiceError::Conflict(err.to_string())
    }
}

impl From<Rejection> for ServiceError {
    fn from(rejection: Rejection) -> Self {
        let message = rejection.to_string();
        match rejection {
            Rejection::SupervisorRequired => ServiceError::Forbidden(message),
            Rejection::WrongCode => ServiceError::Rejected(message),
            Rejection::EmptyInput(_) | Rejection::NonNumericCode => {
                ServiceError::InvalidInput(message)
            }
            Rejection::AllStagesComplete
            | Rejection::NoQuestion(_)
            | Rejection::StageLocked(_)
            | Rejection::UnlockNotSupported
            | Rejection::AlreadyUnlocked(_)
            | Rejection::MissingTeamSecret => ServiceError::Conflict(message),
        }
    }
}

/// What a handler can fail with; each variant is one HTTP status.
#[derive(Debug, Error)]
pub enum AppError {
    /// 400.
    #[error("{0}")]
    BadRequest(String),
    /// 401.
    #[error("{0}")]
    Unauthorized(String),
    /// 403.
    #[error("{0}")]
    Forbidden(String),
    /// 404.
    #[error("{0}")]
    NotFound(String),
    /// 409.
    #[error("{0}")]
    Conflict(String),
    /// 422.
    #[error("{0}")]
    Unprocessable(String),
    /// 503.
    #[error("{0}")]
    ServiceUnavailable(String),
    /// 500, always with a generic message.
    #[error("{0}")]
    Internal(String),
}

const INTERNAL_MESSAGE: &str = "unexpected server error";

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Degraded => {
                AppError::ServiceUnavailable("storage is not available yet".into())
            }
            ServiceError::Storage(source) => {
                error!(error = %source, "storage operation failed");
                AppError::Internal(INTERNAL_MESSAGE.into())
            }
            ServiceError::Internal(message) => {
                error!(error = %message, "request failed");
                AppError::Internal(INTERNAL_MESSAGE.into())
            }
            ServiceError::Unauthenticated(message) => AppError::Unauthorized(message),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Rejected(message) => AppError::Unprocessable(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

/// JSON body of every error response: `{"code": "conflict", "message": "..."}`.
#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, "bad_request", m),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m),
            AppError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, "rejected", m),
            AppError::ServiceUnavailable(m) => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable", m)
            }
            AppError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", m),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = self.parts();
        (status, Json(ErrorBody { code, message })).into_response()
    }
}
