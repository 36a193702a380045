//! Job status tracker.
//!
//! One shared hash map, field = job urn, value = JSON status record.
//! Status moves Queued -> Executing -> Completed, but nothing here enforces
//! that order: each write overwrites the record. A Completed record is
//! deleted by the status read that observes it.

use crate::error::{Error, Result};
use crate::model::{JobId, JobStatus, StatusRecord};
use crate::store::Store;
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct JobTracker {
    store: Arc<dyn Store>,
    hash_map: String,
}

impl JobTracker {
    pub fn new(store: Arc<dyn Store>, hash_map: impl Into<String>) -> Self {
        Self {
            store,
            hash_map: hash_map.into(),
        }
    }

    /// Issue a fresh urn and record it as Queued.
    pub async fn begin_job(&self) -> Result<JobId> {
        let urn = JobId::new();
        self.write(&urn, &StatusRecord::queued()).await?;
        record_transition(FROM_NEW, JobStatus::Queued);
        Ok(urn)
    }

    /// Record the job as Executing, whatever its previous state.
    pub async fn mark_executing(&self, urn: &JobId) -> Result<()> {
        self.write(urn, &StatusRecord::executing()).await?;
        record_transition(FROM_ANY, JobStatus::Executing);
        Ok(())
    }

    /// Record the job as Completed with `result`. The job must be tracked.
    pub async fn complete(&self, urn: &JobId, result: serde_json::Value) -> Result<()> {
        let field = urn.urn();
        let known = self.store.hkeys(&self.hash_map).await?;
        if !known.iter().any(|k| *k == field) {
            return Err(Error::UnknownJob(field));
        }
        self.write(urn, &StatusRecord::completed(result)).await?;
        record_transition(FROM_ANY, JobStatus::Completed);
        info!(urn = %urn, "job completed");
        Ok(())
    }

    /// Current status of a job. Reading a Completed record deletes it, so
    /// the result is handed out exactly once.
    pub async fn read_status(&self, urn: &JobId) -> Result<StatusRecord> {
        let field = urn.urn();
        let raw = self
            .store
            .hget(&self.hash_map, &field)
            .await?
            .ok_or_else(|| Error::UnknownJob(field.clone()))?;
        let record: StatusRecord = serde_json::from_str(&raw)?;

        if record.status == JobStatus::Completed {
            if self.store.hdel(&self.hash_map, &field).await? {
                info!(urn = %urn, "completed job result consumed");
            } else {
                // Another poller consumed it between our read and delete.
                warn!(urn = %urn, "completed job result already consumed");
                return Err(Error::UnknownJob(field));
            }
        }
        Ok(record)
    }

    /// Drop the whole tracker map, including Queued and Executing records.
    pub async fn clear_all(&self) -> Result<()> {
        let existed = self.store.del(&self.hash_map).await?;
        warn!(hash_map = %self.hash_map, existed, "cleared job tracker");
        Ok(())
    }

    async fn write(&self, urn: &JobId, record: &StatusRecord) -> Result<()> {
        let value = serde_json::to_string(record)?;
        self.store.hset(&self.hash_map, &urn.urn(), &value).await?;
        debug!(urn = %urn, status = %record.status, "tracker updated");
        Ok(())
    }
}

/// `from` label of a freshly issued urn.
const FROM_NEW: &str = "new";
/// `from` label of a blind overwrite; the previous status is never read.
const FROM_ANY: &str = "any";

fn transition_attributes(from: &'static str, to: JobStatus) -> [KeyValue; 2] {
    [KeyValue::new("from", from), KeyValue::new("to", to.as_str())]
}

fn record_transition(from: &'static str, to: JobStatus) {
    metrics::job_state_transitions().add(1, &transition_attributes(from, to));
}
