//! Error types shared across docdrop crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, DocdropError>;

/// Main error type for shared docdrop functionality
#[derive(Error, Debug)]
pub enum DocdropError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid fingerprint '{value}': {reason}")]
    InvalidFingerprint { value: String, reason: String },
}

impl DocdropError {
    /// Create an invalid fingerprint error
    pub fn invalid_fingerprint(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFingerprint {
            value: value.into(),
            reason: reason.into(),
        }
    }
}
