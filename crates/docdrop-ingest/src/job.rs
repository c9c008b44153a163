//! In-memory unit of work for one submitted file

use docdrop_common::Fingerprint;
use std::path::PathBuf;

/// One file's trip through the worker pool. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    /// Attempt in flight, or the final attempt once the job has terminated
    pub attempt: u32,
}

impl Job {
    pub fn new(path: impl Into<PathBuf>, fingerprint: Fingerprint) -> Self {
        Self {
            path: path.into(),
            fingerprint,
            attempt: 0,
        }
    }

    /// File name for display, falling back to the full path
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}
