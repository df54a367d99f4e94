use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error")]
    InternalServerError,
}

impl AppError {
    /// Store failures that mean the write never reached (or never came back
    /// from) the backing store.
    pub fn from_store(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(e) => AppError::Transport(e.to_string()),
            sqlx::Error::PoolTimedOut => AppError::Transport("store timed out".to_string()),
            sqlx::Error::PoolClosed => AppError::Transport("store is closed".to_string()),
            sqlx::Error::Database(e) if is_busy(e.code().as_deref()) => {
                AppError::Transport(format!("store is busy: {}", e.message()))
            }
            other => AppError::Database(other),
        }
    }

    /// Short text for the person who triggered the failed action.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Conflict(_) => "This topic was saved elsewhere. Reload to see the latest version.".to_string(),
            AppError::Transport(_) => "Network issue. Your change was not saved.".to_string(),
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound => "Not Found".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended codes.
fn is_busy(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .is_some_and(|c| matches!(c & 0xff, 5 | 6))
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Transport(msg) => {
                error!("transport error: {}", msg);
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Database(e) => {
                error!("database error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Config(msg) => {
                error!("configuration error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: self.user_message(),
        });

        (status, body).into_response()
    }
}
