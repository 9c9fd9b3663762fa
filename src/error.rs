use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use thiserror::Error;

/// Failures that cross the HTTP boundary. Backend unavailability and log-write
/// failures deliberately have no variant here: the first degrades to fallback
/// text inside the generator, the second is reported on the tracing channel.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Generation(String),
    #[error("{0}")]
    Stats(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation error"),
            ServiceError::Generation(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Generation failed"),
            ServiceError::Stats(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read log statistics",
            ),
            ServiceError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
        };

        let body = serde_json::json!({
            "error": error,
            "detail": self.to_string(),
            "timestamp": Utc::now().to_rfc3339(),
        });

        (status, axum::Json(body)).into_response()
    }
}
