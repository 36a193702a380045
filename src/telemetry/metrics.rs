//! Metric instrument factories for qit.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"qit"` meter; without an
//! installed provider they are no-ops.

use opentelemetry::metrics::{Counter, Meter};

/// Returns the shared meter for qit instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("qit")
}

/// Counter: jobs pushed onto a priority tier.
/// Labels: `entity`, `priority`.
pub fn jobs_enqueued() -> Counter<u64> {
    meter()
        .u64_counter("qit.jobs.enqueued")
        .with_description("Number of jobs enqueued")
        .build()
}

/// Counter: jobs handed to a consumer.
/// Labels: `entity`.
pub fn jobs_dequeued() -> Counter<u64> {
    meter()
        .u64_counter("qit.jobs.dequeued")
        .with_description("Number of jobs dequeued")
        .build()
}

/// Counter: tracker status writes.
/// Labels: `from`, `to`.
pub fn job_state_transitions() -> Counter<u64> {
    meter()
        .u64_counter("qit.jobs.state_transitions")
        .with_description("Number of job status transitions")
        .build()
}

/// Counter: individual store commands.
/// Labels: `operation`, `result` ("ok" | "error").
pub fn store_operations() -> Counter<u64> {
    meter()
        .u64_counter("qit.store.operations")
        .with_description("Number of store commands issued")
        .build()
}
