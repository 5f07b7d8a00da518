use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::error::PaymentError;

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Canonical reason of the status code, e.g. "Not Found".
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a caller; internal failures are not described.
    pub fn response_message(&self) -> String {
        match self {
            Self::NotFound(message)
            | Self::ValidationError(message)
            | Self::BadRequest(message)
            | Self::Conflict(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message) => message.clone(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            PaymentError::not_found("x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PaymentError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(PaymentError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            PaymentError::Unauthorized("bad signature".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            PaymentError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );

        let internal = PaymentError::InternalError(Box::new(std::io::Error::other("disk on fire")));
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.response_message(), "Internal server error");
    }
}
