use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error taxonomy of the detection engine itself.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// An event conflicts with already-recorded immutable state (replayed
    /// trade with different fields, or a second, different resolution).
    /// The original data stays authoritative.
    #[error("Consistency: {0}")]
    Consistency(String),

    #[error("Transient storage error: {0}")]
    TransientStorage(#[source] sqlx::Error),
}

/// HTTP boundary error. Engine errors map onto it so handlers can `?`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.into())
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotFound(msg) => AppError::NotFound(msg),
            EngineError::Validation(msg) | EngineError::Consistency(msg) => {
                AppError::BadRequest(msg)
            }
            EngineError::TransientStorage(e) => AppError::Internal(e.into()),
        }
    }
}
