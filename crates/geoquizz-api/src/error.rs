//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use geoquizz_core::error::GameError;
use serde::Serialize;
use thiserror::Error;

/// Startup errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// An environment variable is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),

    /// The photo catalog could not be loaded.
    #[error("catalog error: {0}")]
    Catalog(#[from] GameError),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `GameError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub GameError);

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// HTTP status for the wrapped error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            GameError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            GameError::CapacityExceeded { .. } | GameError::NoPhotosAvailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GameError::RoomFull { .. }
            | GameError::InvalidTransition(_)
            | GameError::DuplicateGuess { .. } => StatusCode::CONFLICT,
            GameError::StaleSession | GameError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GameError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.0.code(),
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
