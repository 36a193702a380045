//! Error types for qit.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The store could not be reached, or the connection was lost earlier.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("entity {0} has no registered queue")]
    UnregisteredEntity(String),

    #[error("priority {0} is not defined")]
    UnknownPriority(String),

    #[error("job {0} is not present in the tracker")]
    UnknownJob(String),

    /// Tracker record written but the queue push failed.
    #[error("job {urn} is tracked but was not queued: {reason}")]
    OrphanEnqueue { urn: String, reason: String },

    /// Item popped from the queue but the tracker was not advanced.
    #[error("job {urn} was dequeued but its status was not updated: {reason}")]
    OrphanDequeue { urn: String, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error means the store connection is gone.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
