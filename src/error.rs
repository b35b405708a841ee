//! Per-request error taxonomy and its JSON representation.
//!
//! Every variant renders as `{"error": "<public message>"}`. The underlying cause never
//! reaches the client; it travels in an [`ErrorReport`] response extension so the
//! error boundary can log it next to the request method and path.

use std::time::Duration;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
}

/// A request body that could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON body must be an object or an array")]
    NonContainerJson,

    #[error("body is not valid UTF-8")]
    InvalidUtf8,

    #[error("failed to read body: {0}")]
    Read(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("malformed request body: {0}")]
    Parse(#[from] ParseError),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error("no route matched")]
    NotFound,

    #[error("request cancelled by shutdown")]
    ShuttingDown,

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Parse(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to clients. Never includes the cause.
    pub fn public_message(&self) -> &'static str {
        match self {
            AppError::Parse(_) => "Invalid request body",
            AppError::PayloadTooLarge { .. } => "Request body too large",
            AppError::RateLimited { .. } => "Too many requests",
            AppError::NotFound => "Not found",
            AppError::ShuttingDown => "Service unavailable",
            AppError::Internal(_) => "Internal server error",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        Self::Internal(anyhow::Error::new(e).context("Database error"))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        Self::Internal(anyhow::Error::new(e).context("Cache error"))
    }
}

/// Server-side description of an error response, attached as a response extension.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub cause: String,
}

impl AppError {
    /// Builds the client response without consuming the error.
    pub fn render(&self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.public_message(),
        };

        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimited { retry_after } = self {
            let secs = retry_after.as_secs_f64().ceil() as u64;
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response.extensions_mut().insert(ErrorReport {
            status,
            cause: self.to_string(),
        });

        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.render()
    }
}
