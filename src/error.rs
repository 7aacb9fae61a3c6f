use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Authentication failed")]
    Auth,
    #[error("Not found")]
    NotFound,
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Forbidden: {0}")]
    Authorization(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            Self::Auth => {
                tracing::debug!("Authentication failed");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            Self::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Not found".to_string())
            }
            Self::Validation(msg) => {
                tracing::debug!(message = %msg, "Validation failed");
                (StatusCode::BAD_REQUEST, msg)
            }
            Self::Authorization(msg) => {
                tracing::debug!(message = %msg, "Authorization failed");
                (StatusCode::FORBIDDEN, msg)
            }
            Self::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
