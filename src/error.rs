use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::ErrorBody;
use crate::resolver::ParseError;

/// StoreError
///
/// Failures reported by a `Repository` implementation. "Record absent" is not an error at
/// this layer; lookups and conditional mutations return `Option` for that.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint (username or email) rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The store could not be reached or failed unexpectedly.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let field = match db_err.constraint() {
                    Some(c) if c.contains("username") => "username",
                    Some(c) if c.contains("email") => "email",
                    _ => "record",
                };
                return StoreError::Conflict(format!("{field} already exists"));
            }
        }
        StoreError::Unavailable(err.to_string())
    }
}

/// ApiError
///
/// The complete failure taxonomy of the request pipeline. Each variant maps to exactly one
/// HTTP status and renders the uniform `{ "error": ... }` body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The path identifier failed resolution.
    #[error("invalid id")]
    Parse(#[from] ParseError),
    /// A required body field was absent or empty, or the body was not valid JSON.
    #[error("{0}")]
    Validation(String),
    /// The access gate denied the operation.
    #[error("forbidden")]
    Forbidden,
    /// The record does not exist.
    #[error("User not found")]
    NotFound,
    /// The store rejected a write because of a uniqueness constraint.
    #[error("{0}")]
    Conflict(String),
    /// The store failed; the detail is logged but never sent to the client.
    #[error("internal server error")]
    Service(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Parse(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Unavailable(detail) => ApiError::Service(detail),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let ApiError::Service(detail) = &self {
            tracing::error!(%detail, "request failed with a store error");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
