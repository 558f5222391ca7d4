//! Error types for the signature packet server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sigpacket_core::SigPacketError;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::DocumentNotFound(_) => (StatusCode::NOT_FOUND, "DOCUMENT_NOT_FOUND"),
            ServerError::RecordNotFound(_) => (StatusCode::NOT_FOUND, "RECORD_NOT_FOUND"),
            ServerError::UnsupportedInput(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_INPUT")
            }
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ServerError::ExportFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EXPORT_FAILED"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<SigPacketError> for ServerError {
    fn from(err: SigPacketError) -> Self {
        match err {
            SigPacketError::DocumentNotFound(id) => ServerError::DocumentNotFound(id),
            SigPacketError::RecordNotFound(id) => ServerError::RecordNotFound(id),
            SigPacketError::UnsupportedInput(msg) => ServerError::UnsupportedInput(msg),
            SigPacketError::OperationError(msg) => ServerError::InvalidRequest(msg),
            SigPacketError::ParseError(_)
            | SigPacketError::PageOutOfRange { .. }
            | SigPacketError::SerializationError(_) => ServerError::ExportFailed(err.to_string()),
            other => ServerError::Internal(other.to_string()),
        }
    }
}
