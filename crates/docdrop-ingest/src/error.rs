//! Error types for ingestion
//!
//! One variant per failure category a submission or job can hit. None of
//! these ever reach the arrival trigger: `IngestionCoordinator::submit`
//! logs them and returns.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Submitted path is missing, not a regular file, or not an accepted type
    #[error("Rejected '{}': {reason}", path.display())]
    Validation { path: PathBuf, reason: String },

    /// Reading the file for hashing failed
    #[error("Failed to fingerprint '{}': {source}", path.display())]
    Fingerprint {
        path: PathBuf,
        #[source]
        source: docdrop_common::DocdropError,
    },

    /// SQLite refused an operation on the ledger
    #[error("Ledger storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Ledger is reachable but unusable (bad row, bad location)
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// A single processing attempt failed
    #[error("Processing failed: {0}")]
    Processing(String),

    /// A single processing attempt ran past its deadline
    #[error("Processing attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Every attempt failed; the source file stays where it is
    #[error("Gave up on '{}' after {attempts} attempts", path.display())]
    ExhaustedRetries { path: PathBuf, attempts: u32 },

    /// Post-success deletion of the source file failed
    #[error("Failed to delete '{}': {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Worker pool no longer accepts jobs
    #[error("Worker pool is shut down")]
    PoolClosed,

    #[error("Configuration error: {0}. Check your DOCDROP_* environment variables.")]
    Config(String),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IngestError {
    pub fn validation(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::Validation {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn fingerprint(path: impl AsRef<Path>, source: docdrop_common::DocdropError) -> Self {
        Self::Fingerprint {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn ledger(msg: impl Into<String>) -> Self {
        Self::Ledger(msg.into())
    }

    pub fn cleanup(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Cleanup {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for failures of the ledger itself
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Ledger(_))
    }
}
