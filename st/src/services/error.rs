//! Service adapter error types

use thiserror::Error;

/// Errors raised by the HTTP-backed service adapters
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid service response: {0}")]
    InvalidResponse(String),

    #[error("Missing credential: set the {0} environment variable")]
    MissingCredential(String),
}
