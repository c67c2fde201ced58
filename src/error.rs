//! Error types for Libris server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchUnit = 4,
    NoSuchBook = 5,
    ItemNotAvailable = 7,
    NoOpenLoan = 8,
    UnitBorrowed = 13,
    BadValue = 18,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Book not found: {0}")]
    BookNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("No open loan: {0}")]
    NoOpenLoan(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Outcome of a lending transition that did not succeed.
///
/// Everything except `Fault` is part of the normal contract and is not logged as an error.
#[derive(Error, Debug)]
pub enum LendingError {
    #[error("Lending unit {0} not found")]
    NotFound(i32),

    #[error("Lending unit {0} is already reserved")]
    Unavailable(i32),

    #[error("Lending unit {0} has no open loan")]
    NoOpenLoan(i32),

    #[error(transparent)]
    Fault(#[from] AppError),
}

impl From<sqlx::Error> for LendingError {
    fn from(e: sqlx::Error) -> Self {
        LendingError::Fault(AppError::Database(e))
    }
}

impl From<LendingError> for AppError {
    fn from(e: LendingError) -> Self {
        match e {
            LendingError::NotFound(_) => AppError::NotFound(e.to_string()),
            LendingError::Unavailable(_) => AppError::Unavailable(e.to_string()),
            LendingError::NoOpenLoan(_) => AppError::NoOpenLoan(e.to_string()),
            LendingError::Fault(inner) => inner,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    fn parts(&self) -> (StatusCode, ErrorCode, String) {
        match self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchUnit, msg.clone())
            }
            AppError::BookNotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchBook, msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Unavailable(msg) => {
                (StatusCode::CONFLICT, ErrorCode::ItemNotAvailable, msg.clone())
            }
            AppError::NoOpenLoan(msg) => {
                (StatusCode::CONFLICT, ErrorCode::NoOpenLoan, msg.clone())
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::UnitBorrowed, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

impl IntoResponse for LendingError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for lending transitions
pub type LendingResult<T> = Result<T, LendingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lending_outcomes_map_to_distinct_responses() {
        let (status, code, _) = AppError::from(LendingError::NotFound(1)).parts();
        assert_eq!((status, code), (StatusCode::NOT_FOUND, ErrorCode::NoSuchUnit));

        let (status, code, _) = AppError::from(LendingError::Unavailable(1)).parts();
        assert_eq!((status, code), (StatusCode::CONFLICT, ErrorCode::ItemNotAvailable));

        let (status, code, _) = AppError::from(LendingError::NoOpenLoan(1)).parts();
        assert_eq!((status, code), (StatusCode::CONFLICT, ErrorCode::NoOpenLoan));

        let fault = LendingError::Fault(AppError::Internal("boom".to_string()));
        let (status, _, message) = AppError::from(fault).parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
    }

    #[test]
    fn test_client_errors_carry_failure_codes() {
        let (status, code, _) = AppError::Validation("language: length".to_string()).parts();
        assert_eq!((status, code), (StatusCode::BAD_REQUEST, ErrorCode::BadValue));

        let (status, code, _) = AppError::Authorization("denied".to_string()).parts();
        assert_eq!((status, code), (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized));
        assert_ne!(code as u32, 0);
    }
}
