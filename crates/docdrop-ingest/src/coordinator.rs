//! Ingestion coordinator
//!
//! Public entry point for arriving files. For each path it checks the type
//! and that it is a regular file, fingerprints the content, and consults the
//! ledger. Known content is deleted on the spot. New content becomes a job
//! on the worker pool, runs through the retry loop, and on success is
//! recorded in the ledger before the source file is removed.
//!
//! Construct one coordinator at startup and hand references to whatever
//! delivers files. There is no global state.

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::job::Job;
use crate::ledger::Ledger;
use crate::pipeline::DocumentPipeline;
use crate::pool::WorkerPool;
use crate::retry::{run_with_retry, RetryPolicy, TerminalOutcome};
use crate::stats::{self, IngestStats, SharedStats};
use chrono::Utc;
use docdrop_common::Fingerprint;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// What happened to an accepted submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Content already processed; the source file was deleted (or deletion was attempted)
    Duplicate,
    /// Handed to the worker pool
    Scheduled,
}

/// State shared between submission calls and worker jobs
struct Shared {
    ledger: Ledger,
    pipeline: Arc<dyn DocumentPipeline>,
    policy: RetryPolicy,
    stats: SharedStats,
}

pub struct IngestionCoordinator {
    shared: Arc<Shared>,
    pool: WorkerPool,
    accepted_extensions: Vec<String>,
}

impl IngestionCoordinator {
    /// Validate the config, bootstrap the ledger and start the worker pool
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: &IngestConfig, pipeline: Arc<dyn DocumentPipeline>) -> Result<Self> {
        config.validate()?;

        let ledger = Ledger::open(&config.ledger_path)?;
        info!(
            ledger = %ledger.path().display(),
            workers = config.max_workers,
            max_attempts = config.max_attempts,
            pipeline = pipeline.name(),
            "Ingestion coordinator ready"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                ledger,
                pipeline,
                policy: config.retry_policy(),
                stats: Arc::new(RwLock::new(IngestStats::default())),
            }),
            pool: WorkerPool::new(config.max_workers),
            accepted_extensions: config.accepted_extensions.clone(),
        })
    }

    /// Fire-and-forget submission. Every outcome is logged; nothing is returned.
    pub async fn submit(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();

        match self.try_submit(path).await {
            Ok(Admission::Scheduled) => debug!(path = %path.display(), "Submission scheduled"),
            Ok(Admission::Duplicate) => debug!(path = %path.display(), "Submission was a duplicate"),
            Err(e @ IngestError::Validation { .. }) => warn!("{e}"),
            Err(e) if e.is_storage() => {
                error!(path = %path.display(), error = %e, "Ledger lookup failed; leaving file in place");
            },
            Err(e) => error!(path = %path.display(), error = %e, "Submission aborted"),
        }
    }

    /// Same steps as [`submit`](Self::submit), with the outcome returned
    ///
    /// A failed ledger lookup aborts the submission rather than risk
    /// processing content twice. The file stays where it is.
    pub async fn try_submit(&self, path: impl AsRef<Path>) -> Result<Admission> {
        let path = path.as_ref().to_path_buf();
        self.shared.stats.write().await.submitted += 1;

        let fingerprint = match self.admit(&path).await {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                self.shared.stats.write().await.rejected += 1;
                return Err(e);
            },
        };

        let ledger = self.shared.ledger.clone();
        let already_processed = blocking(move || ledger.contains(&fingerprint)).await?;

        if already_processed {
            info!(path = %path.display(), fingerprint = %fingerprint, "Duplicate content; deleting");
            let removed = tokio::fs::remove_file(&path).await;

            let mut stats = self.shared.stats.write().await;
            stats.duplicates += 1;
            if let Err(e) = removed {
                stats.cleanup_failures += 1;
                warn!("{}", IngestError::cleanup(&path, e));
            }
            return Ok(Admission::Duplicate);
        }

        let shared = Arc::clone(&self.shared);
        self.pool
            .schedule(Job::new(path.clone(), fingerprint), move |job| process_job(shared, job))?;

        self.shared.stats.write().await.scheduled += 1;
        info!(path = %path.display(), fingerprint = %fingerprint, "Scheduled for processing");

        Ok(Admission::Scheduled)
    }

    /// Type filter, regular-file check and fingerprint
    async fn admit(&self, path: &Path) -> Result<Fingerprint> {
        if !self.accepts(path) {
            return Err(IngestError::validation(path, "not an accepted document type"));
        }

        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {},
            Ok(_) => return Err(IngestError::validation(path, "not a regular file")),
            Err(e) => return Err(IngestError::validation(path, format!("cannot stat file: {e}"))),
        }

        let owned = path.to_path_buf();
        blocking(move || {
            Fingerprint::from_file(&owned).map_err(|e| IngestError::fingerprint(&owned, e))
        })
        .await
    }

    /// Case-insensitive extension match against the accepted list
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.accepted_extensions.iter().any(|accepted| *accepted == ext)
            })
            .unwrap_or(false)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.shared.ledger
    }

    /// Snapshot of the counters
    pub async fn stats(&self) -> IngestStats {
        self.shared.stats.read().await.clone()
    }

    /// Jobs waiting for a free worker
    pub fn pending(&self) -> usize {
        self.pool.pending()
    }

    /// Stop accepting files and wait for every scheduled job to terminate
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
        stats::log_summary(&self.shared.stats).await;
    }
}

/// Worker side: retry loop, then record and clean up on success
async fn process_job(shared: Arc<Shared>, mut job: Job) {
    let pipeline = Arc::clone(&shared.pipeline);
    let attempt_stats = Arc::clone(&shared.stats);

    let outcome = run_with_retry(&mut job, &shared.policy, move |path| {
        let pipeline = Arc::clone(&pipeline);
        let stats = Arc::clone(&attempt_stats);
        async move {
            stats.write().await.attempts += 1;
            pipeline.process(&path).await
        }
    })
    .await;

    match outcome {
        TerminalOutcome::Success { attempts } => {
            info!(path = %job.path.display(), attempts, "Processing succeeded");
            if finish_success(&shared, &job).await {
                shared.stats.write().await.succeeded += 1;
            }
        },
        TerminalOutcome::ExhaustedFailure { .. } => {
            shared.stats.write().await.failed += 1;
        },
    }
}

/// Ledger first, then delete. Without a durable record the file is kept.
///
/// Returns whether the ledger write went through.
async fn finish_success(shared: &Shared, job: &Job) -> bool {
    let ledger = shared.ledger.clone();
    let fingerprint = job.fingerprint;
    let filename = job.filename();

    if let Err(e) = blocking(move || ledger.record(&fingerprint, &filename, Utc::now())).await {
        shared.stats.write().await.unrecorded += 1;
        error!(
            path = %job.path.display(),
            error = %e,
            "Processed but could not record in ledger; leaving file in place"
        );
        return false;
    }

    match tokio::fs::remove_file(&job.path).await {
        Ok(()) => info!(path = %job.path.display(), "Recorded and removed source file"),
        Err(e) => {
            shared.stats.write().await.cleanup_failures += 1;
            warn!("{}; ledger record stands", IngestError::cleanup(&job.path, e));
        },
    }

    true
}

/// Run blocking file or SQLite work off the async workers
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| IngestError::Other(e.into()))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Fails the first `fail_first` calls, then succeeds
    struct FlakyPipeline {
        fail_first: u32,
        calls: AtomicU32,
    }

    impl FlakyPipeline {
        fn new(fail_first: u32) -> Arc<Self> {
            Arc::new(Self {
                fail_first,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentPipeline for FlakyPipeline {
        async fn process(&self, _path: &Path) -> anyhow::Result<bool> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(n > self.fail_first)
        }
    }

    /// Panics on the first call, succeeds afterwards
    struct PanicOncePipeline {
        calls: AtomicU32,
    }

    #[async_trait]
    impl DocumentPipeline for PanicOncePipeline {
        async fn process(&self, path: &Path) -> anyhow::Result<bool> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("renderer crashed on {}", path.display());
            }
            Ok(true)
        }
    }

    /// Succeeds, but swaps the ledger file for a directory first so the record write fails
    struct LedgerBreakingPipeline {
        ledger_path: PathBuf,
    }

    #[async_trait]
    impl DocumentPipeline for LedgerBreakingPipeline {
        async fn process(&self, _path: &Path) -> anyhow::Result<bool> {
            std::fs::remove_file(&self.ledger_path)?;
            std::fs::create_dir(&self.ledger_path)?;
            Ok(true)
        }
    }

    fn config(dir: &TempDir) -> IngestConfig {
        IngestConfig::builder()
            .ledger_path(dir.path().join("processed.db"))
            .max_workers(2)
            .max_attempts(3)
            .initial_backoff_ms(1)
            .build()
    }

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn test_success_records_then_deletes() {
        let dir = TempDir::new().unwrap();
        let pipeline = FlakyPipeline::new(0);
        let coordinator = IngestionCoordinator::new(&config(&dir), pipeline.clone()).unwrap();
        let file = write(&dir, "report.pdf", b"%PDF report");

        let admission = coordinator.try_submit(&file).await.unwrap();
        coordinator.shutdown().await;

        assert_eq!(admission, Admission::Scheduled);
        assert!(!file.exists());
        let record = coordinator
            .ledger()
            .get(&Fingerprint::from_bytes(b"%PDF report"))
            .unwrap()
            .unwrap();
        assert_eq!(record.filename, "report.pdf");

        let stats = coordinator.stats().await;
        assert_eq!((stats.submitted, stats.scheduled, stats.succeeded), (1, 1, 1));
        assert_eq!(stats.attempts, 1);
    }

    #[tokio::test]
    async fn test_duplicate_is_deleted_without_scheduling() {
        let dir = TempDir::new().unwrap();
        let pipeline = FlakyPipeline::new(0);
        let coordinator = IngestionCoordinator::new(&config(&dir), pipeline.clone()).unwrap();
        coordinator
            .ledger()
            .record(&Fingerprint::from_bytes(b"seen before"), "old.pdf", Utc::now())
            .unwrap();
        let file = write(&dir, "again.pdf", b"seen before");

        let admission = coordinator.try_submit(&file).await.unwrap();
        coordinator.shutdown().await;

        assert_eq!(admission, Admission::Duplicate);
        assert!(!file.exists());
        assert_eq!(pipeline.calls(), 0);
        assert_eq!(coordinator.stats().await.duplicates, 1);
    }

    #[tokio::test]
    async fn test_rejections_never_reach_ledger_or_pool() {
        let dir = TempDir::new().unwrap();
        let pipeline = FlakyPipeline::new(0);
        let coordinator = IngestionCoordinator::new(&config(&dir), pipeline.clone()).unwrap();
        let text = write(&dir, "notes.txt", b"plain text");
        std::fs::create_dir(dir.path().join("folder.pdf")).unwrap();

        for path in [
            text.clone(),
            dir.path().join("missing.pdf"),
            dir.path().join("folder.pdf"),
        ] {
            let result = coordinator.try_submit(&path).await;
            assert!(matches!(result, Err(IngestError::Validation { .. })), "{path:?}");
        }
        coordinator.shutdown().await;

        assert!(text.exists());
        assert_eq!(pipeline.calls(), 0);
        assert_eq!(coordinator.ledger().count().unwrap(), 0);
        assert_eq!(coordinator.stats().await.rejected, 3);
    }

    #[tokio::test]
    async fn test_extension_match_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let coordinator = IngestionCoordinator::new(&config(&dir), FlakyPipeline::new(0)).unwrap();

        assert!(coordinator.accepts(Path::new("/in/SCAN.PDF")));
        assert!(!coordinator.accepts(Path::new("/in/scan.pdf.part")));
        assert!(!coordinator.accepts(Path::new("/in/pdf")));
        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_exhausted_job_leaves_file_and_ledger_untouched() {
        let dir = TempDir::new().unwrap();
        let pipeline = FlakyPipeline::new(u32::MAX);
        let coordinator = IngestionCoordinator::new(&config(&dir), pipeline.clone()).unwrap();
        let file = write(&dir, "stubborn.pdf", b"never works");

        coordinator.submit(&file).await;
        coordinator.shutdown().await;

        assert!(file.exists());
        assert_eq!(pipeline.calls(), 3);
        assert_eq!(coordinator.ledger().count().unwrap(), 0);
        let stats = coordinator.stats().await;
        assert_eq!((stats.failed, stats.attempts), (1, 3));
    }

    #[tokio::test]
    async fn test_panicking_attempt_is_retried_to_success() {
        let dir = TempDir::new().unwrap();
        let pipeline = Arc::new(PanicOncePipeline {
            calls: AtomicU32::new(0),
        });
        let coordinator = IngestionCoordinator::new(&config(&dir), pipeline.clone()).unwrap();
        let file = write(&dir, "crashy.pdf", b"%PDF crashes once");

        coordinator.submit(&file).await;
        coordinator.shutdown().await;

        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 2);
        assert!(!file.exists());
        let stats = coordinator.stats().await;
        assert_eq!((stats.succeeded, stats.failed, stats.attempts), (1, 0, 2));
        assert_eq!(stats.in_flight(), 0);
    }

    /// Regular file per metadata whose reads fail straight away
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_unreadable_file_is_a_fingerprint_error() {
        let dir = TempDir::new().unwrap();
        let pipeline = FlakyPipeline::new(0);
        let coordinator = IngestionCoordinator::new(&config(&dir), pipeline.clone()).unwrap();
        let file = dir.path().join("memory.pdf");
        std::os::unix::fs::symlink("/proc/self/mem", &file).unwrap();

        let result = coordinator.try_submit(&file).await;
        coordinator.shutdown().await;

        assert!(matches!(result, Err(IngestError::Fingerprint { .. })), "{result:?}");
        assert!(file.symlink_metadata().is_ok());
        assert_eq!(pipeline.calls(), 0);
        let stats = coordinator.stats().await;
        assert_eq!((stats.rejected, stats.scheduled), (1, 0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_undeletable_duplicate_counts_cleanup_failure() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let pipeline = FlakyPipeline::new(0);
        let coordinator = IngestionCoordinator::new(&config(&dir), pipeline.clone()).unwrap();
        coordinator
            .ledger()
            .record(&Fingerprint::from_bytes(b"seen before"), "old.pdf", Utc::now())
            .unwrap();

        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        let file = locked.join("again.pdf");
        std::fs::write(&file, b"seen before").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users can still unlink from a read-only directory
        if std::fs::File::create(locked.join("writable")).is_ok() {
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
            coordinator.shutdown().await;
            return;
        }

        let admission = coordinator.try_submit(&file).await.unwrap();
        coordinator.shutdown().await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(admission, Admission::Duplicate);
        assert!(file.exists());
        assert_eq!(pipeline.calls(), 0);
        let stats = coordinator.stats().await;
        assert_eq!((stats.duplicates, stats.cleanup_failures), (1, 1));
    }

    #[tokio::test]
    async fn test_failed_ledger_write_keeps_source_file() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let pipeline = Arc::new(LedgerBreakingPipeline {
            ledger_path: config.ledger_path.clone(),
        });
        let coordinator = IngestionCoordinator::new(&config, pipeline).unwrap();
        let file = write(&dir, "unrecorded.pdf", b"no durable record");

        coordinator.submit(&file).await;
        coordinator.shutdown().await;

        assert!(file.exists());
        let stats = coordinator.stats().await;
        assert_eq!((stats.succeeded, stats.unrecorded), (0, 1));
        assert_eq!(stats.cleanup_failures, 0);
        assert_eq!(stats.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_ledger_aborts_submission() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let pipeline = FlakyPipeline::new(0);
        let coordinator = IngestionCoordinator::new(&config, pipeline.clone()).unwrap();
        std::fs::remove_file(&config.ledger_path).unwrap();
        std::fs::create_dir(&config.ledger_path).unwrap();
        let file = write(&dir, "kept.pdf", b"lookup will fail");

        let result = coordinator.try_submit(&file).await;
        coordinator.shutdown().await;

        assert!(result.unwrap_err().is_storage());
        assert!(file.exists());
        assert_eq!(pipeline.calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_pool_closed() {
        let dir = TempDir::new().unwrap();
        let coordinator = IngestionCoordinator::new(&config(&dir), FlakyPipeline::new(0)).unwrap();
        let file = write(&dir, "late.pdf", b"too late");

        coordinator.shutdown().await;
        let result = coordinator.try_submit(&file).await;

        assert!(matches!(result, Err(IngestError::PoolClosed)));
        assert!(file.exists());
    }

    #[test]
    fn test_invalid_config_is_rejected_before_startup() {
        let config = IngestConfig::builder().max_workers(0).build();

        let result = IngestionCoordinator::new(&config, FlakyPipeline::new(0));
        assert!(matches!(result, Err(IngestError::Config(_))));
    }
}
