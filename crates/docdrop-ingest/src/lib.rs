//! Docdrop Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Exactly-once ingestion of dropped documents with bounded retry.
//!
//! # Overview
//!
//! - **Coordinator**: public `submit(path)` entry point; dedup, scheduling, cleanup
//! - **Ledger**: durable SQLite record of processed content fingerprints
//! - **Worker Pool**: fixed number of concurrent jobs fed by an unbounded queue
//! - **Retry**: per-job attempts with exponential backoff and optional deadline
//! - **Pipeline**: the processing capability, behind a trait
//!
//! # Example
//!
//! ```no_run
//! use docdrop_ingest::{CommandPipeline, IngestConfig, IngestionCoordinator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::builder()
//!         .ledger_path("./processed.db")
//!         .pipeline_command("ocr-upload --lang eng")
//!         .build();
//!
//!     let pipeline = Arc::new(CommandPipeline::from_config(&config)?);
//!     let coordinator = IngestionCoordinator::new(&config, pipeline)?;
//!
//!     coordinator.submit("./inbox/invoice.pdf").await;
//!     coordinator.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod job;
pub mod ledger;
pub mod pipeline;
pub mod pool;
pub mod retry;
pub mod stats;

// Re-export commonly used types
pub use config::IngestConfig;
pub use coordinator::{Admission, IngestionCoordinator};
pub use error::{IngestError, Result};
pub use job::Job;
pub use ledger::Ledger;
pub use pipeline::{CommandPipeline, DocumentPipeline};
pub use pool::WorkerPool;
pub use retry::{run_with_retry, RetryPolicy, TerminalOutcome};
pub use stats::IngestStats;
