//! Processed-content ledger
//!
//! A small SQLite file mapping content fingerprints to the moment they were
//! fully processed. It is the only source of truth for "has this content
//! already gone through the pipeline" and it survives restarts.
//!
//! Every operation opens its own connection, acts, and drops it. Nothing is
//! held open across a job, so concurrent lookups and upserts from submission
//! calls and workers interleave one statement at a time.

use crate::error::{IngestError, Result};
use chrono::{DateTime, Utc};
use docdrop_common::{Fingerprint, ProcessedRecord};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// How long a connection waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the ledger file. Cheap to clone; holds no open connection.
#[derive(Debug, Clone)]
pub struct Ledger {
    db_path: PathBuf,
}

impl Ledger {
    /// Create a handle without touching the filesystem
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// Create a handle and make sure the schema exists
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let ledger = Self::new(db_path);
        ledger.initialize()?;
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open_connection(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    IngestError::ledger(format!(
                        "Cannot create ledger directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Create the schema if absent. Safe to call any number of times.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.open_connection()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS processed (
                file_hash TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                processed_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_processed_at ON processed(processed_at)",
            [],
        )?;

        debug!(path = %self.db_path.display(), "Ledger schema initialized");
        Ok(())
    }

    /// Whether this content has already been fully processed
    pub fn contains(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let conn = self.open_connection()?;

        let found = conn
            .query_row(
                "SELECT 1 FROM processed WHERE file_hash = ?1",
                params![fingerprint.to_hex()],
                |_| Ok(()),
            )
            .optional()?;

        Ok(found.is_some())
    }

    /// Upsert a record. Writing an existing fingerprint replaces its row.
    pub fn record(
        &self,
        fingerprint: &Fingerprint,
        filename: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.open_connection()?;

        conn.execute(
            "INSERT OR REPLACE INTO processed (file_hash, filename, processed_at) VALUES (?1, ?2, ?3)",
            params![fingerprint.to_hex(), filename, processed_at.to_rfc3339()],
        )?;

        debug!(fingerprint = %fingerprint, filename, "Recorded processed content");
        Ok(())
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Result<Option<ProcessedRecord>> {
        let conn = self.open_connection()?;

        let row = conn
            .query_row(
                "SELECT file_hash, filename, processed_at FROM processed WHERE file_hash = ?1",
                params![fingerprint.to_hex()],
                raw_row,
            )
            .optional()?;

        row.map(into_record).transpose()
    }

    /// Most recently processed first
    pub fn list(&self, limit: usize) -> Result<Vec<ProcessedRecord>> {
        let conn = self.open_connection()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = conn.prepare(
            r#"
            SELECT file_hash, filename, processed_at
            FROM processed
            ORDER BY processed_at DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt
            .query_map(params![limit], raw_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(into_record).collect()
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.open_connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM processed", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

type RawRow = (String, String, String);

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_record((hash, filename, processed_at): RawRow) -> Result<ProcessedRecord> {
    let fingerprint = Fingerprint::from_hex(&hash)
        .map_err(|e| IngestError::ledger(format!("Corrupt fingerprint in ledger: {e}")))?;

    let processed_at = DateTime::parse_from_rfc3339(&processed_at)
        .map_err(|e| {
            IngestError::ledger(format!(
                "Corrupt timestamp '{processed_at}' for {hash}: {e}"
            ))
        })?
        .with_timezone(&Utc);

    Ok(ProcessedRecord {
        fingerprint,
        filename,
        processed_at,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn temp_ledger() -> (TempDir, Ledger) {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::open(dir.path().join("processed.db")).unwrap();
        (dir, ledger)
    }

    #[test]
    fn test_initialize_creates_file_and_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("nested").join("processed.db");

        let ledger = Ledger::open(&path).unwrap();

        assert!(path.exists());
        assert_eq!(ledger.count().unwrap(), 0);
    }

    #[test]
    fn test_initialize_idempotent() {
        let (_dir, ledger) = temp_ledger();
        let fp = Fingerprint::from_bytes(b"kept");
        ledger.record(&fp, "kept.pdf", Utc::now()).unwrap();

        ledger.initialize().unwrap();
        ledger.initialize().unwrap();

        assert!(ledger.contains(&fp).unwrap());
    }

    #[test]
    fn test_contains_after_record() {
        let (_dir, ledger) = temp_ledger();
        let fp = Fingerprint::from_bytes(b"invoice");

        assert!(!ledger.contains(&fp).unwrap());
        ledger.record(&fp, "invoice.pdf", Utc::now()).unwrap();
        assert!(ledger.contains(&fp).unwrap());
        assert!(!ledger.contains(&Fingerprint::from_bytes(b"other")).unwrap());
    }

    #[test]
    fn test_record_is_upsert() {
        let (_dir, ledger) = temp_ledger();
        let fp = Fingerprint::from_bytes(b"same bytes");
        let first = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 1, 2, 9, 30, 0).unwrap();

        ledger.record(&fp, "scan_a.pdf", first).unwrap();
        ledger.record(&fp, "scan_b.pdf", second).unwrap();

        assert_eq!(ledger.count().unwrap(), 1);
        let record = ledger.get(&fp).unwrap().unwrap();
        assert_eq!(record.filename, "scan_b.pdf");
        assert_eq!(record.processed_at, second);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("processed.db");
        let fp = Fingerprint::from_bytes(b"durable");

        Ledger::open(&path)
            .unwrap()
            .record(&fp, "durable.pdf", Utc::now())
            .unwrap();

        let reopened = Ledger::open(&path).unwrap();
        assert!(reopened.contains(&fp).unwrap());
    }

    #[test]
    fn test_list_newest_first_with_limit() {
        let (_dir, ledger) = temp_ledger();
        for day in 1..=3 {
            let at = Utc.with_ymd_and_hms(2026, 2, day, 0, 0, 0).unwrap();
            let fp = Fingerprint::from_bytes(format!("doc {day}").as_bytes());
            ledger.record(&fp, &format!("doc_{day}.pdf"), at).unwrap();
        }

        let records = ledger.list(2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].filename, "doc_3.pdf");
        assert_eq!(records[1].filename, "doc_2.pdf");
    }

    #[test]
    fn test_corrupt_timestamp_is_ledger_error() {
        let (_dir, ledger) = temp_ledger();
        let fp = Fingerprint::from_bytes(b"bad row");

        let conn = Connection::open(ledger.path()).unwrap();
        conn.execute(
            "INSERT INTO processed (file_hash, filename, processed_at) VALUES (?1, 'x.pdf', 'yesterday')",
            params![fp.to_hex()],
        )
        .unwrap();

        assert!(ledger.contains(&fp).unwrap());
        assert!(matches!(ledger.get(&fp), Err(IngestError::Ledger(_))));
    }

    #[test]
    fn test_unusable_location_is_storage_failure() {
        let dir = TempDir::new().unwrap();
        // A directory where the database file should be
        let ledger = Ledger::new(dir.path());

        let result = ledger.contains(&Fingerprint::from_bytes(b"x"));
        assert!(result.unwrap_err().is_storage());
    }
}
