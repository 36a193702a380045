//! Core data model.
//!
//! A job is an opaque payload plus the identifier it was issued at enqueue
//! time. The tracker stores one status record per job; the queue tiers store
//! serialized envelopes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Job identifier
// ---------------------------------------------------------------------------

/// Unique job identifier, rendered as `urn:uuid:<uuid>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(pub Uuid);

impl JobId {
    /// Fresh random (v4) identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a `urn:uuid:...` string or a bare UUID.
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| Error::InvalidArgument(format!("bad job urn {s:?}: {e}")))
    }

    /// Tracker field / envelope representation.
    pub fn urn(&self) -> String {
        self.0.urn().to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.urn())
    }
}

impl std::str::FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for JobId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.urn()
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a job in the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Tracker record written at enqueue time.
    Queued,
    /// A consumer popped the job.
    Executing,
    /// A result was reported. Consumed by the next status read.
    Completed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued",
            JobStatus::Executing => "Executing",
            JobStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Queued" => Ok(JobStatus::Queued),
            "Executing" => Ok(JobStatus::Executing),
            "Completed" => Ok(JobStatus::Completed),
            other => Err(Error::InvalidArgument(format!("unknown job status: {other}"))),
        }
    }
}

/// Value stored in the tracker hash for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: JobStatus,
    /// Result payload; only set once the job is `Completed`.
    #[serde(rename = "data")]
    pub result: Option<serde_json::Value>,
}

impl StatusRecord {
    pub fn queued() -> Self {
        Self {
            status: JobStatus::Queued,
            result: None,
        }
    }

    pub fn executing() -> Self {
        Self {
            status: JobStatus::Executing,
            result: None,
        }
    }

    pub fn completed(result: serde_json::Value) -> Self {
        Self {
            status: JobStatus::Completed,
            result: Some(result),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Wire form of a job on a queue tier. The payload is JSON text inside the
/// JSON object, so it is encoded twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "_data")]
    pub data: String,
    pub urn: JobId,
}

impl Envelope {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A unit of work handed to a consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    urn: JobId,
    payload: serde_json::Value,
}

impl Job {
    pub fn new(urn: JobId, payload: serde_json::Value) -> Self {
        Self { urn, payload }
    }

    /// Rebuild a job from its queued envelope.
    pub fn from_envelope(envelope: Envelope) -> Result<Self> {
        let payload = serde_json::from_str(&envelope.data)?;
        Ok(Self::new(envelope.urn, payload))
    }

    pub fn to_envelope(&self) -> Result<Envelope> {
        Ok(Envelope {
            data: serde_json::to_string(&self.payload)?,
            urn: self.urn,
        })
    }

    pub fn urn(&self) -> JobId {
        self.urn
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn into_payload(self) -> serde_json::Value {
        self.payload
    }
}
