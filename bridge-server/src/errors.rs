use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bridge_core::BridgeError;
use std::fmt;

pub type AppResult<T> = Result<T, AppError>;

/// Every failure surfaces as an HTTP response carrying the error's display
/// text as a plain-text body. No recovery happens server-side; the peers
/// decide what to do with the status.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn missing_channel() -> Self {
        Self::internal("Channel is missing in parameter list")
    }

    pub fn bad_content_type(expected: &str) -> Self {
        Self::internal(format!("Payload must be {expected}"))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "text/plain")],
            self.message,
        )
            .into_response()
    }
}

impl From<BridgeError> for AppError {
    fn from(err: BridgeError) -> Self {
        Self::internal(err.to_string())
    }
}
