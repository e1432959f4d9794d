use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::gemini::client::GeminiError;

/// Error taxonomy for the JSON API surface. Form routes use redirects and
/// flash messages instead; this type covers everything that answers with an
/// `{"error": ...}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server is missing a piece of configuration (no upstream API key).
    #[error("{0}")]
    Configuration(&'static str),
    /// The caller sent an unusable request and can retry with corrected
    /// input.
    #[error("{0}")]
    Validation(String),
    /// The generative API call failed; detail stays in the logs.
    #[error(transparent)]
    Upstream(#[from] GeminiError),
    /// Database or session-store failures. The client message is generic.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Configuration(msg) => {
                error!(msg, "server configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.to_string())
            }
            ApiError::Validation(msg) => {
                warn!(msg = %msg, "rejected request");
                (StatusCode::BAD_REQUEST, msg)
            }
            ApiError::Upstream(e) => {
                error!(error = %e, "upstream generative API call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Failed to communicate with Gemini.".to_string(),
                )
            }
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error.".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
