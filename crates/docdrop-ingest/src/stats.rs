//! Running counters for one coordinator instance

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Counters since the coordinator started. Reset on restart; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct IngestStats {
    /// Every call to `submit`, valid or not
    pub submitted: u64,
    /// Failed the type, regular-file or fingerprint checks
    pub rejected: u64,
    /// Content already in the ledger; source deleted (or deletion attempted)
    pub duplicates: u64,
    pub scheduled: u64,
    pub succeeded: u64,
    /// Exhausted every attempt
    pub failed: u64,
    /// Processed, but the ledger write failed; source kept, not counted as succeeded
    pub unrecorded: u64,
    /// Source file could not be deleted after a duplicate hit or a recorded success
    pub cleanup_failures: u64,
    /// Processing attempts across all jobs
    pub attempts: u64,
    pub started_at: DateTime<Utc>,
}

impl Default for IngestStats {
    fn default() -> Self {
        Self {
            submitted: 0,
            rejected: 0,
            duplicates: 0,
            scheduled: 0,
            succeeded: 0,
            failed: 0,
            unrecorded: 0,
            cleanup_failures: 0,
            attempts: 0,
            started_at: Utc::now(),
        }
    }
}

impl IngestStats {
    /// Jobs scheduled but not yet terminated
    pub fn in_flight(&self) -> u64 {
        self.scheduled
            .saturating_sub(self.succeeded + self.failed + self.unrecorded)
    }

    /// Files that finished without a ledger record and remain in place
    pub fn left_in_place(&self) -> u64 {
        self.failed + self.unrecorded
    }
}

impl fmt::Display for IngestStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "submitted={} rejected={} duplicates={} scheduled={} succeeded={} failed={} unrecorded={} cleanup_failures={} attempts={}",
            self.submitted,
            self.rejected,
            self.duplicates,
            self.scheduled,
            self.succeeded,
            self.failed,
            self.unrecorded,
            self.cleanup_failures,
            self.attempts
        )
    }
}

pub(crate) type SharedStats = Arc<RwLock<IngestStats>>;

pub(crate) async fn log_summary(stats: &SharedStats) {
    let s = stats.read().await;
    let elapsed = Utc::now() - s.started_at;

    info!(
        submitted = s.submitted,
        rejected = s.rejected,
        duplicates = s.duplicates,
        succeeded = s.succeeded,
        failed = s.failed,
        unrecorded = s.unrecorded,
        cleanup_failures = s.cleanup_failures,
        attempts = s.attempts,
        elapsed_secs = elapsed.num_seconds(),
        "Ingestion summary"
    );
}
