//! Configuration management

use crate::error::{IngestError, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Ingestion Configuration Constants
// ============================================================================

/// Default location of the processed ledger.
pub const DEFAULT_LEDGER_PATH: &str = "./processed.db";

/// Default number of concurrent workers.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default number of processing attempts per file.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default wait before the first retry, in milliseconds. Doubles per retry.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1000;

/// Default per-attempt deadline in seconds.
pub const DEFAULT_PROCESSING_TIMEOUT_SECS: u64 = 600;

/// Default accepted file extension.
pub const DEFAULT_ACCEPTED_EXTENSION: &str = "pdf";

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// SQLite file holding processed fingerprints; created on first run
    pub ledger_path: PathBuf,

    /// Size of the worker pool
    pub max_workers: usize,

    /// Attempts per file before giving up
    pub max_attempts: u32,

    pub initial_backoff_ms: u64,

    /// Upper bound on a single retry wait (None = unbounded doubling)
    pub max_backoff_ms: Option<u64>,

    /// Deadline for one processing attempt (None = wait forever)
    pub processing_timeout_secs: Option<u64>,

    /// Lowercase extensions without the leading dot
    pub accepted_extensions: Vec<String>,

    /// External program run once per attempt, with the file path appended
    pub pipeline_command: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            max_workers: DEFAULT_MAX_WORKERS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: None,
            processing_timeout_secs: Some(DEFAULT_PROCESSING_TIMEOUT_SECS),
            accepted_extensions: vec![DEFAULT_ACCEPTED_EXTENSION.to_string()],
            pipeline_command: None,
        }
    }
}

impl IngestConfig {
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Load configuration from `.env` and environment variables over defaults
    ///
    /// Environment variables:
    /// - `DOCDROP_LEDGER_PATH`
    /// - `DOCDROP_MAX_WORKERS`
    /// - `DOCDROP_MAX_ATTEMPTS`
    /// - `DOCDROP_INITIAL_BACKOFF_MS`
    /// - `DOCDROP_MAX_BACKOFF_MS`
    /// - `DOCDROP_PROCESSING_TIMEOUT_SECS` (0 disables the deadline)
    /// - `DOCDROP_ACCEPTED_EXTENSIONS` (comma separated, e.g. "pdf,tiff")
    /// - `DOCDROP_PIPELINE_COMMAND`
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(path) = std::env::var("DOCDROP_LEDGER_PATH") {
            config.ledger_path = PathBuf::from(path);
        }

        if let Some(workers) = env_parse("DOCDROP_MAX_WORKERS")? {
            config.max_workers = workers;
        }

        if let Some(attempts) = env_parse("DOCDROP_MAX_ATTEMPTS")? {
            config.max_attempts = attempts;
        }

        if let Some(ms) = env_parse("DOCDROP_INITIAL_BACKOFF_MS")? {
            config.initial_backoff_ms = ms;
        }

        if let Some(ms) = env_parse("DOCDROP_MAX_BACKOFF_MS")? {
            config.max_backoff_ms = Some(ms);
        }

        if let Some(secs) = env_parse::<u64>("DOCDROP_PROCESSING_TIMEOUT_SECS")? {
            config.processing_timeout_secs = (secs > 0).then_some(secs);
        }

        if let Ok(list) = std::env::var("DOCDROP_ACCEPTED_EXTENSIONS") {
            config.accepted_extensions = parse_extensions(&list);
        }

        if let Ok(command) = std::env::var("DOCDROP_PIPELINE_COMMAND") {
            if !command.trim().is_empty() {
                config.pipeline_command = Some(command);
            }
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.ledger_path.as_os_str().is_empty() {
            return Err(IngestError::config("Ledger path cannot be empty"));
        }

        if self.max_workers == 0 {
            return Err(IngestError::config("max_workers must be greater than 0"));
        }

        if self.max_attempts == 0 {
            return Err(IngestError::config("max_attempts must be greater than 0"));
        }

        if self.initial_backoff_ms == 0 {
            return Err(IngestError::config("initial_backoff_ms must be greater than 0"));
        }

        if let Some(max) = self.max_backoff_ms {
            if max < self.initial_backoff_ms {
                return Err(IngestError::config(format!(
                    "max_backoff_ms ({}) cannot be lower than initial_backoff_ms ({})",
                    max, self.initial_backoff_ms
                )));
            }
        }

        if self.accepted_extensions.is_empty() {
            return Err(IngestError::config("At least one accepted extension is required"));
        }

        if self.max_backoff_ms.is_none() && self.max_attempts > 10 {
            tracing::warn!(
                max_attempts = self.max_attempts,
                "Backoff is uncapped; late retries will wait a very long time. Set DOCDROP_MAX_BACKOFF_MS to bound it"
            );
        }

        Ok(())
    }

    /// Retry behavior derived from this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: self.max_backoff_ms.map(Duration::from_millis),
            attempt_timeout: self.processing_timeout_secs.map(Duration::from_secs),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| IngestError::config(format!("{key} has an invalid value '{raw}'"))),
        Err(_) => Ok(None),
    }
}

/// Normalize a comma separated extension list ("PDF, .tiff" -> ["pdf", "tiff"])
pub fn parse_extensions(list: &str) -> Vec<String> {
    list.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Builder for IngestConfig
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    ledger_path: Option<PathBuf>,
    max_workers: Option<usize>,
    max_attempts: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    processing_timeout_secs: Option<Option<u64>>,
    accepted_extensions: Option<Vec<String>>,
    pipeline_command: Option<String>,
}

impl IngestConfigBuilder {
    pub fn ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_path = Some(path.into());
        self
    }

    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn initial_backoff_ms(mut self, ms: u64) -> Self {
        self.initial_backoff_ms = Some(ms);
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.max_backoff_ms = Some(ms);
        self
    }

    pub fn processing_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.processing_timeout_secs = Some(secs);
        self
    }

    pub fn accepted_extensions(mut self, list: &str) -> Self {
        self.accepted_extensions = Some(parse_extensions(list));
        self
    }

    pub fn pipeline_command(mut self, command: impl Into<String>) -> Self {
        self.pipeline_command = Some(command.into());
        self
    }

    pub fn build(self) -> IngestConfig {
        let default = IngestConfig::default();

        IngestConfig {
            ledger_path: self.ledger_path.unwrap_or(default.ledger_path),
            max_workers: self.max_workers.unwrap_or(default.max_workers),
            max_attempts: self.max_attempts.unwrap_or(default.max_attempts),
            initial_backoff_ms: self.initial_backoff_ms.unwrap_or(default.initial_backoff_ms),
            max_backoff_ms: self.max_backoff_ms,
            processing_timeout_secs: self
                .processing_timeout_secs
                .unwrap_or(default.processing_timeout_secs),
            accepted_extensions: self
                .accepted_extensions
                .unwrap_or(default.accepted_extensions),
            pipeline_command: self.pipeline_command,
        }
    }
}
