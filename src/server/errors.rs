//! HTTP error mapping for the chat service.
//!
//! Every failure is reported as `{"error": <message>}` with a status code
//! that tells the caller whether retrying could help.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::RagError;

/// Errors returned to HTTP clients
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Backend request failed: {message}")]
    Backend { message: String },

    #[error("Language model did not answer within {seconds} seconds")]
    Timeout { seconds: u64 },
}

impl ApiError {
    #[inline]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Backend { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        Self::Backend {
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest {
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Chat request failed: {}", self);
        } else {
            warn!("Rejected chat request: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
