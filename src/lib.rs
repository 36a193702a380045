//! # qit
//!
//! Multi-tenant priority work queue with job status tracking, layered over
//! a shared Redis instance.
//!
//! Producers register a queue per entity and enqueue jobs at a priority;
//! consumers dequeue the highest-priority pending job, run it, and report a
//! result through the tracker, where a single status read collects it.

pub mod config;
pub mod directory;
pub mod error;
pub mod model;
pub mod priority;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod tracker;
pub mod worker;

pub use error::{Error, Result};
pub use model::{Job, JobId, JobStatus, StatusRecord};
pub use service::QueueService;
