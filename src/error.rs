use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::types::{ConversionError, ErrorResponse};

/// Errors surfaced to HTTP clients. The body is always `{"detail": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },

    #[error("{context}: {source}")]
    Conversion {
        context: &'static str,
        #[source]
        source: ConversionError,
    },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    /// Password problems become validation errors; everything else is a
    /// server-side failure reported under `context`.
    pub fn from_conversion(context: &'static str, error: ConversionError) -> Self {
        if error.is_client_error() {
            ApiError::Validation(error.to_string())
        } else {
            ApiError::Conversion {
                context,
                source: error,
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Conversion { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            detail: self.to_string(),
        })
    }
}
