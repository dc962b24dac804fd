//! Error to HTTP response mapping.
//!
//! The body is always `{"error": <reason>, "message": <text>}`. Internal
//! failures are logged here and answered with a generic message.

use crate::errors::{Error, ErrorKind};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl Error {
    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match (self.kind(), self) {
            (ErrorKind::Upstream, Self::UpstreamTimeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            (ErrorKind::Upstream, _) => StatusCode::BAD_GATEWAY,
            (ErrorKind::Validation, _) => StatusCode::BAD_REQUEST,
            (ErrorKind::Unauthorized, _) => StatusCode::UNAUTHORIZED,
            (ErrorKind::NotFound, _) => StatusCode::NOT_FOUND,
            (ErrorKind::Conflict | ErrorKind::InsufficientBalance, _) => StatusCode::CONFLICT,
            (ErrorKind::Internal, _) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self.kind() {
            ErrorKind::Internal => {
                error!("Request failed: {}", self);
                "Internal server error".to_string()
            }
            ErrorKind::Upstream => {
                warn!("Upstream failure: {}", self);
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorBody {
            error: self.reason(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
