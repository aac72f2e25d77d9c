//! Error types for pulse-storage.

use thiserror::Error;

use crate::conversation::MessageId;

/// Storage error types.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Key cannot be mapped to a file name.
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Home directory not found.
    #[error("Could not determine home/data directory")]
    HomeDirNotFound,

    /// No message with this identifier.
    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    /// Message exists but is not the one receiving content.
    #[error("Message is not open for appending: {0}")]
    MessageNotOpen(MessageId),

    /// An assistant reply is still streaming.
    #[error("An assistant message is still open: {0}")]
    MessageStillOpen(MessageId),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
