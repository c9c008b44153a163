//! Docdrop Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the docdrop workspace.
//!
//! # Overview
//!
//! - **Error Handling**: Common error type and result alias
//! - **Fingerprints**: Content hashing used as the deduplication key
//! - **Logging**: Centralized `tracing` subscriber setup
//! - **Types**: Records shared between the ledger and its consumers
//!
//! # Example
//!
//! ```no_run
//! use docdrop_common::{Fingerprint, Result};
//!
//! fn describe(path: &str) -> Result<()> {
//!     let fingerprint = Fingerprint::from_file(path)?;
//!     println!("{path}: {fingerprint}");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{DocdropError, Result};
pub use fingerprint::Fingerprint;
pub use types::ProcessedRecord;
