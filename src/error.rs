//! Error handling for the timelapse rig

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Crate-wide result
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the rig, on the command loop or over HTTP
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown session, snapshot or endpoint
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected request input (bad session name, page)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Camera could not be reached or claimed
    #[error("Camera connection error: {0}")]
    CameraConnection(String),

    /// A single capture failed
    #[error("Capture error: {0}")]
    Capture(String),

    /// Video encoding failed
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Event transport failed (open or read)
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON encode/decode
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Printer status request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem or child process
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Missing or invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Error::CameraConnection(_) => (StatusCode::SERVICE_UNAVAILABLE, "CAMERA_UNAVAILABLE"),
            Error::Capture(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CAPTURE_ERROR"),
            Error::Encoding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ENCODING_ERROR"),
            Error::Transport(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TRANSPORT_ERROR"),
            Error::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "HTTP_ERROR"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Error::Image(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IMAGE_ERROR"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        let message = self.to_string();

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
