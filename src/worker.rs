//! Consumer loop: poll one entity's queue, run a handler, report results.
//!
//! Dequeue never blocks, so the worker sleeps `poll_interval` whenever the
//! queue is empty and `error_backoff` after a transient store error. A lost
//! store or a misconfigured entity/priority ends the loop with that error.

use crate::error::{Error, Result};
use crate::model::Job;
use crate::service::QueueService;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Configuration for a worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub entity: String,
    /// Only take jobs of this priority. `None` = highest non-empty tier.
    pub priority: Option<String>,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    /// Stop after this many jobs.
    pub max_jobs: Option<usize>,
}

impl WorkerConfig {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            priority: None,
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
            max_jobs: None,
        }
    }
}

#[derive(Clone)]
pub struct Worker {
    service: Arc<QueueService>,
    config: WorkerConfig,
    stopping: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl Worker {
    pub fn new(service: Arc<QueueService>, config: WorkerConfig) -> Self {
        Self {
            service,
            config,
            stopping: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Signal the worker to stop after the job in hand.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    /// Run until shutdown, `max_jobs`, or a fatal error. Returns the number
    /// of jobs processed.
    ///
    /// A handler error is still reported, as `{"error": "<message>"}`, so
    /// that whoever polls the job's status is not left waiting.
    pub async fn run<H, Fut>(&self, handler: H) -> Result<usize>
    where
        H: Fn(Job) -> Fut,
        Fut: Future<Output = Result<serde_json::Value>>,
    {
        let entity = self.config.entity.as_str();
        let priority = self.config.priority.as_deref();
        let mut processed = 0usize;

        info!(entity, priority, "worker started");

        loop {
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }
            if self.config.max_jobs.is_some_and(|max| processed >= max) {
                break;
            }

            let job = match self.service.dequeue_job(entity, priority).await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    if self.pause(self.config.poll_interval).await {
                        break;
                    }
                    continue;
                }
                Err(e) if is_fatal(&e) => {
                    error!(entity, "worker stopping: {e}");
                    return Err(e);
                }
                Err(e) => {
                    warn!(entity, "dequeue failed, backing off: {e}");
                    if self.pause(self.config.error_backoff).await {
                        break;
                    }
                    continue;
                }
            };

            let urn = job.urn();
            let started = Instant::now();
            let result = match handler(job.clone()).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(urn = %urn, "job handler failed: {e}");
                    serde_json::json!({ "error": e.to_string() })
                }
            };
            processed += 1;

            match self.service.report_result(&job, result).await {
                Ok(()) => {
                    info!(urn = %urn, elapsed_ms = started.elapsed().as_millis() as u64, "job done");
                }
                Err(e) if e.is_unavailable() => return Err(e),
                Err(e) => error!(urn = %urn, "could not report result: {e}"),
            }
        }

        info!(entity, processed, "worker stopped");
        Ok(processed)
    }

    /// Sleep, waking early on shutdown. Returns true if shutting down.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.notified() => true,
            _ = tokio::time::sleep(duration) => self.stopping.load(Ordering::SeqCst),
        }
    }
}

fn is_fatal(e: &Error) -> bool {
    matches!(
        e,
        Error::StoreUnavailable(_) | Error::UnregisteredEntity(_) | Error::UnknownPriority(_)
    )
}
