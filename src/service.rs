//! Queue service: the public API producers and consumers call.
//!
//! Composes the queue directory, the priority tiers and the job tracker.
//! Construction is pure; `connect` probes the store and loads the
//! registrations. Until that succeeds, and after any call finds the store
//! gone, every operation fails with `StoreUnavailable`. There is no
//! reconnect: build a new service with a fresh store instead.
//!
//! Enqueue and dequeue are two store writes each with nothing tying them
//! together. A failure between the two is reported as an orphan error.

use crate::config::Config;
use crate::directory::QueueDirectory;
use crate::error::{Error, Result};
use crate::model::{Envelope, Job, JobId, StatusRecord};
use crate::priority::{PendingCounts, QueueSet};
use crate::store::Store;
use crate::telemetry::job::{record_state_transition, start_job_span};
use crate::telemetry::metrics;
use crate::tracker::JobTracker;
use opentelemetry::KeyValue;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Instrument, error, info, warn};

pub struct QueueService {
    store: Arc<dyn Store>,
    directory: QueueDirectory,
    queues: QueueSet,
    tracker: JobTracker,
    connected: AtomicBool,
}

impl QueueService {
    pub fn new(config: &Config, store: Arc<dyn Store>) -> Self {
        Self {
            directory: QueueDirectory::new(Arc::clone(&store), &config.queue_hash_map),
            queues: QueueSet::new(
                Arc::clone(&store),
                config.priority_levels.clone(),
                config.queue_name_template.clone(),
            ),
            tracker: JobTracker::new(Arc::clone(&store), &config.job_tracker_hash_map),
            store,
            connected: AtomicBool::new(false),
        }
    }

    /// Probe the store and load registrations. On failure the service
    /// stays disconnected.
    pub async fn connect(&self) -> Result<()> {
        let info = self.store.info().await.inspect_err(|e| {
            error!("store connectivity probe failed: {e}");
        })?;
        let version = info
            .lines()
            .find_map(|l| l.strip_prefix("redis_version:"))
            .unwrap_or("unknown");
        info!(version, "connected to store");

        self.directory.load_all().await?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn directory(&self) -> &QueueDirectory {
        &self.directory
    }

    pub fn queues(&self) -> &QueueSet {
        &self.queues
    }

    // -- registrations -----------------------------------------------------

    pub async fn register_queue(&self, entity: &str, queue_base: &str) -> Result<bool> {
        self.ensure_connected()?;
        let r = self.directory.register(entity, queue_base).await;
        self.observe(r)
    }

    pub async fn delete_queue(&self, entity: &str) -> Result<String> {
        self.ensure_connected()?;
        let r = self.directory.delete(entity).await;
        self.observe(r)
    }

    /// Registered (entity, queue base) pairs from the local cache.
    pub async fn registered_queues(&self) -> Result<Vec<(String, String)>> {
        self.ensure_connected()?;
        Ok(self.directory.entities().await)
    }

    // -- jobs --------------------------------------------------------------

    /// Queue `payload` for `entity` at `priority`. Returns the new urn.
    ///
    /// Nothing is written when the entity or priority is unknown. If the
    /// push fails after the tracker record was written, the error is
    /// `OrphanEnqueue` and the urn stays in the tracker as Queued.
    pub async fn enqueue_job(
        &self,
        entity: &str,
        payload: serde_json::Value,
        priority: &str,
    ) -> Result<JobId> {
        self.ensure_connected()?;
        let queue = self.directory.require(entity).await?;
        self.queues.levels().check(priority)?;

        let urn = self.observe(self.tracker.begin_job().await)?;
        let span = start_job_span(entity, &urn);

        let pushed = async {
            let envelope = Job::new(urn, payload).to_envelope()?.encode()?;
            self.queues.push(&queue, priority, &envelope).await
        }
        .instrument(span.clone())
        .await;

        if let Err(e) = pushed {
            error!(urn = %urn, entity, priority, "job tracked but not queued: {e}");
            let reason = e.to_string();
            if e.is_unavailable() {
                self.disconnect(&reason);
            }
            return Err(Error::OrphanEnqueue {
                urn: urn.urn(),
                reason,
            });
        }

        record_state_transition(&span, "new", "Queued");
        metrics::jobs_enqueued().add(
            1,
            &[
                KeyValue::new("entity", entity.to_string()),
                KeyValue::new("priority", priority.to_string()),
            ],
        );
        info!(urn = %urn, entity, priority, queue = %queue, "job enqueued");
        Ok(urn)
    }

    /// Pop the next job for `entity`, from one priority or from the highest
    /// non-empty tier. `Ok(None)` when there is nothing to do.
    pub async fn dequeue_job(&self, entity: &str, priority: Option<&str>) -> Result<Option<Job>> {
        self.ensure_connected()?;
        let queue = self.directory.require(entity).await?;

        let popped = self.queues.pop(&queue, priority).await;
        let Some(raw) = self.observe(popped)? else {
            return Ok(None);
        };
        // The entry is already off the queue; log it whole so it can be recovered.
        let job = match Envelope::decode(&raw) {
            Ok(envelope) => {
                let urn = envelope.urn;
                Job::from_envelope(envelope).inspect_err(|e| {
                    error!(urn = %urn, entity, queue = %queue, raw = %raw, "dropped queue entry with bad payload: {e}");
                })?
            }
            Err(e) => {
                error!(entity, queue = %queue, raw = %raw, "dropped undecodable queue entry: {e}");
                return Err(e);
            }
        };
        let urn = job.urn();

        let span = start_job_span(entity, &urn);
        let marked = self.tracker.mark_executing(&urn).instrument(span.clone()).await;
        if let Err(e) = marked {
            error!(urn = %urn, entity, "job dequeued but status not updated: {e}");
            let reason = e.to_string();
            if e.is_unavailable() {
                self.disconnect(&reason);
            }
            return Err(Error::OrphanDequeue {
                urn: urn.urn(),
                reason,
            });
        }

        record_state_transition(&span, "Queued", "Executing");
        metrics::jobs_dequeued().add(1, &[KeyValue::new("entity", entity.to_string())]);
        info!(urn = %urn, entity, "job dequeued");
        Ok(Some(job))
    }

    /// Report the result of a job taken with `dequeue_job`.
    pub async fn report_result(&self, job: &Job, result: serde_json::Value) -> Result<()> {
        self.complete_job(&job.urn(), result).await
    }

    /// Report a result by urn alone, for consumers that kept only the urn.
    pub async fn complete_job(&self, urn: &JobId, result: serde_json::Value) -> Result<()> {
        self.ensure_connected()?;
        let r = self.tracker.complete(urn, result).await;
        self.observe(r)
    }

    /// Status of a job. A Completed status is returned once, then the record
    /// is gone and later reads fail with `UnknownJob`.
    pub async fn get_status(&self, urn: &JobId) -> Result<StatusRecord> {
        self.ensure_connected()?;
        let r = self.tracker.read_status(urn).await;
        self.observe(r)
    }

    /// Drop every tracker record, in flight or not.
    pub async fn clear_pending(&self) -> Result<()> {
        self.ensure_connected()?;
        let r = self.tracker.clear_all().await;
        self.observe(r)
    }

    pub async fn count_pending(&self, entity: &str) -> Result<PendingCounts> {
        self.ensure_connected()?;
        let queue = self.directory.require(entity).await?;
        let r = self.queues.lengths(&queue).await;
        self.observe(r)
    }

    /// Delete every queued job of `entity`. Tracker records are left alone.
    pub async fn purge_entity_queues(&self, entity: &str) -> Result<()> {
        self.ensure_connected()?;
        let queue = self.directory.require(entity).await?;
        let r = self.queues.purge_all(&queue).await;
        self.observe(r)
    }

    // -- connection state --------------------------------------------------

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::StoreUnavailable(
                "not connected to the store".to_string(),
            ))
        }
    }

    /// Pass a result through, dropping the connection if the store is gone.
    fn observe<T>(&self, r: Result<T>) -> Result<T> {
        if let Err(Error::StoreUnavailable(ref reason)) = r {
            self.disconnect(reason);
        }
        r
    }

    fn disconnect(&self, reason: &str) {
        if self.connected.swap(false, Ordering::SeqCst) {
            warn!("store lost, failing all further operations: {reason}");
        }
    }
}
