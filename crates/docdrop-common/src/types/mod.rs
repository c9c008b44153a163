//! Common types used across docdrop

use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fully processed piece of content, as stored in the ledger.
///
/// There is at most one record per fingerprint; writing the same fingerprint
/// again replaces the earlier record.
///
/// # Examples
///
/// ```rust
/// use docdrop_common::{Fingerprint, ProcessedRecord};
///
/// let record = ProcessedRecord::new(
///     Fingerprint::from_bytes(b"%PDF-1.7"),
///     "scan_0001.pdf",
///     chrono::Utc::now(),
/// );
/// assert_eq!(record.filename, "scan_0001.pdf");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    /// Content hash, the unique key
    pub fingerprint: Fingerprint,

    /// Original file name, for display only
    pub filename: String,

    /// When processing completed
    pub processed_at: DateTime<Utc>,
}

impl ProcessedRecord {
    pub fn new(
        fingerprint: Fingerprint,
        filename: impl Into<String>,
        processed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            fingerprint,
            filename: filename.into(),
            processed_at,
        }
    }
}

impl std::fmt::Display for ProcessedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}  {}  {}",
            self.fingerprint,
            self.processed_at.to_rfc3339(),
            self.filename
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_json_shape() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();
        let record = ProcessedRecord::new(Fingerprint::from_bytes(b"x"), "a.pdf", at);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["filename"], "a.pdf");
        assert_eq!(value["fingerprint"], Fingerprint::from_bytes(b"x").to_hex());
        assert_eq!(value["processed_at"], "2026-03-01T12:30:00Z");
    }
}
