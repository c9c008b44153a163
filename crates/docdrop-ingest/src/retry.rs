//! Bounded retry with exponential backoff for a single job
//!
//! Attempts run strictly one after another inside the worker that owns the
//! job. The loop never looks at other jobs and never touches the ledger.

use crate::error::IngestError;
use crate::job::Job;
use crate::pool::panic_message;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// How many times to try, and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,

    /// Wait after the first failed attempt. Doubles after every further failure.
    pub initial_backoff: Duration,

    /// Cap on a single wait. None keeps doubling without bound.
    pub max_backoff: Option<Duration>,

    /// Deadline for one attempt. An attempt past its deadline counts as failed.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: None,
            attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    /// Wait that follows failed attempt number `attempt` (1-based): 1, 2, 4, ... units
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let backoff = self
            .initial_backoff
            .checked_mul(factor)
            .unwrap_or(Duration::MAX);

        match self.max_backoff {
            Some(cap) => backoff.min(cap),
            None => backoff,
        }
    }
}

/// How a job ended. No further attempts happen after either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalOutcome {
    Success { attempts: u32 },
    ExhaustedFailure { attempts: u32 },
}

impl TerminalOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TerminalOutcome::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            TerminalOutcome::Success { attempts } | TerminalOutcome::ExhaustedFailure { attempts } => {
                *attempts
            },
        }
    }
}

/// Run `execute` for the job's path until it reports success or attempts run out
///
/// `Ok(true)` ends the loop with success. `Ok(false)`, any `Err`, a panic
/// and an attempt that overruns `attempt_timeout` are failed attempts.
/// `job.attempt` tracks the attempt in flight.
pub async fn run_with_retry<F, Fut>(
    job: &mut Job,
    policy: &RetryPolicy,
    mut execute: F,
) -> TerminalOutcome
where
    F: FnMut(PathBuf) -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        job.attempt = attempt;
        info!(path = %job.path.display(), attempt, max_attempts, "Processing attempt");

        let call = AssertUnwindSafe(execute(job.path.clone())).catch_unwind();
        let result = match policy.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Ok(Err(IngestError::Timeout(limit).into())),
            },
            None => call.await,
        };

        let failure = match result {
            Ok(Ok(true)) => return TerminalOutcome::Success { attempts: attempt },
            Ok(Ok(false)) => IngestError::Processing("pipeline reported failure".to_string()),
            Ok(Err(e)) => IngestError::Processing(format!("{e:#}")),
            Err(panic) => {
                IngestError::Processing(format!("pipeline panicked: {}", panic_message(&*panic)))
            },
        };
        warn!(path = %job.path.display(), attempt, "{failure}");

        if attempt < max_attempts {
            let backoff = policy.backoff_for(attempt);
            info!(
                path = %job.path.display(),
                backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                "Retrying after backoff"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    let exhausted = IngestError::ExhaustedRetries {
        path: job.path.clone(),
        attempts: max_attempts,
    };
    error!(fingerprint = %job.fingerprint, "{exhausted}; leaving file in place");

    TerminalOutcome::ExhaustedFailure {
        attempts: max_attempts,
    }
}
