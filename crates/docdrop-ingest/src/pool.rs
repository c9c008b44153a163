//! Fixed-size worker pool
//!
//! `N` long-lived tokio tasks pull from one unbounded queue, so at most `N`
//! jobs are in flight and scheduling never blocks the caller. A panicking job
//! is caught and logged; its worker moves on to the next job.

use crate::error::{IngestError, Result};
use crate::job::Job;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub struct WorkerPool {
    sender: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    pending: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Start `worker_count` workers (at least one). Must be called inside a tokio runtime.
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (sender, receiver) = mpsc::unbounded_channel::<Task>();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let pending = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));

        let workers = (0..worker_count)
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                let pending = Arc::clone(&pending);
                let active = Arc::clone(&active);
                tokio::spawn(worker_loop(id, receiver, pending, active))
            })
            .collect();

        info!(workers = worker_count, "Worker pool started");

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            worker_count,
            pending,
            active,
        }
    }

    /// Queue `execute(job)` for a worker. Returns immediately; fails only once
    /// the pool is shut down.
    pub fn schedule<F, Fut>(&self, job: Job, execute: F) -> Result<()>
    where
        F: FnOnce(Job) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let guard = self.sender.lock().map_err(|_| IngestError::PoolClosed)?;
        let sender = guard.as_ref().ok_or(IngestError::PoolClosed)?;

        self.pending.fetch_add(1, Ordering::SeqCst);
        if sender.send(Box::pin(async move { execute(job).await })).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(IngestError::PoolClosed);
        }

        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Jobs queued but not yet picked up by a worker
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Jobs currently running
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }

    /// Stop accepting jobs and wait until every queued job has finished
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        let sender = self.sender.lock().ok().and_then(|mut guard| guard.take());
        if sender.is_none() {
            return;
        }
        drop(sender);

        info!(pending = self.pending(), "Draining worker pool");

        let workers = self
            .workers
            .lock()
            .map(|mut guard| std::mem::take(&mut *guard))
            .unwrap_or_default();

        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task terminated abnormally");
            }
        }

        info!("Worker pool stopped");
    }
}

async fn worker_loop(
    id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Task>>>,
    pending: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
) {
    loop {
        let task = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };

        let Some(task) = task else {
            break;
        };

        pending.fetch_sub(1, Ordering::SeqCst);
        active.fetch_add(1, Ordering::SeqCst);

        if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
            let message = panic_message(&*panic);
            error!(worker = id, panic = %message, "Job panicked; worker continues");
        }

        active.fetch_sub(1, Ordering::SeqCst);
    }

    debug!(worker = id, "Worker exiting");
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
