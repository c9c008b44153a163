//! Document processing pipeline seam
//!
//! Whatever turns a file into a finished document (OCR, classification,
//! upload) lives behind [`DocumentPipeline`]. The coordinator only cares
//! whether an attempt succeeded.

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// One processing attempt for one file
#[async_trait]
pub trait DocumentPipeline: Send + Sync {
    /// Process the file at `path`
    ///
    /// # Returns
    /// `Ok(true)` when the document is fully handled, `Ok(false)` when the
    /// pipeline ran but reported failure. Both `Ok(false)` and `Err` are
    /// retried.
    async fn process(&self, path: &Path) -> anyhow::Result<bool>;

    /// Short name used in logs
    fn name(&self) -> &str {
        "pipeline"
    }
}

/// Runs an external program per attempt with the file path as its last argument
///
/// Exit status 0 is success; any other status is a failed attempt. A program
/// that cannot be started is an error. The child is killed if the attempt is
/// abandoned (for example on timeout).
#[derive(Debug, Clone)]
pub struct CommandPipeline {
    program: String,
    args: Vec<String>,
}

impl CommandPipeline {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a command line on whitespace: "ocr-upload --lang eng"
    pub fn parse(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| IngestError::config("Pipeline command is empty"))?;

        Ok(Self::new(program, parts.collect()))
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        let command = config.pipeline_command.as_deref().ok_or_else(|| {
            IngestError::config("No pipeline command configured (set DOCDROP_PIPELINE_COMMAND)")
        })?;
        Self::parse(command)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl DocumentPipeline for CommandPipeline {
    async fn process(&self, path: &Path) -> anyhow::Result<bool> {
        debug!(program = %self.program, path = %path.display(), "Running pipeline command");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run pipeline command '{}'", self.program))?;

        if output.status.success() {
            return Ok(true);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(
            program = %self.program,
            status = %output.status,
            stderr = %stderr.trim(),
            "Pipeline command failed"
        );
        Ok(false)
    }

    fn name(&self) -> &str {
        &self.program
    }
}
