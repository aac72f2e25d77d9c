//! Error types for pulse-client.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failure to turn a complete (non-streamed) body into a reply.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("response body was empty")]
    EmptyBody,

    #[error("response carried no message content")]
    MissingContent,

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Transport-level failures for one request.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Server returned {status}: {body_preview}")]
    Status {
        status: StatusCode,
        body_preview: String,
    },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid response: {0}")]
    Decode(#[from] DecodeError),

    #[error("Failed to encode request: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Request(err)
        }
    }
}

impl ClientError {
    /// Short, user-readable text shown in place of the assistant reply.
    pub fn diagnostic(&self) -> String {
        match self {
            ClientError::Request(e) if e.is_connect() => {
                format!("Network error: could not connect ({e})")
            }
            ClientError::Request(e) => format!("Network error: {e}"),
            ClientError::Timeout => "Network error: request timed out".to_string(),
            ClientError::Status { status, .. } => format!("HTTP error: {status}"),
            ClientError::Stream(msg) => format!("Network error: {msg}"),
            ClientError::Decode(DecodeError::EmptyBody) => "No data returned".to_string(),
            ClientError::Decode(DecodeError::MissingContent) => {
                "Could not parse API response".to_string()
            }
            ClientError::Decode(DecodeError::Json(e)) => format!("JSON parse error: {e}"),
            ClientError::Json(e) => format!("Request serialization error: {e}"),
            ClientError::InvalidEndpoint(_) => "Invalid API URL".to_string(),
            ClientError::Build(msg) => format!("Client setup error: {msg}"),
        }
    }

    /// HTTP status for protocol errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
