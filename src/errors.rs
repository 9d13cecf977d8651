//! Errors for fleet tracker
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("{0}")]
    Storage(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    Validation(String),

    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("IO error")]
    IoError(#[from] std::io::Error),
}

impl TrackerError {
    pub fn status(&self) -> StatusCode {
        match self {
            TrackerError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Storage failures are reported with the underlying driver message.
impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
