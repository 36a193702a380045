//! Job span helpers.
//!
//! Spans carry the entity and urn so every event logged while a job moves
//! through the queue can be correlated.

use crate::model::JobId;
use tracing::Span;

/// Start a span for one job operation.
///
/// The `job.status` field is declared empty and can be updated via
/// [`record_state_transition`].
pub fn start_job_span(entity: &str, urn: &JobId) -> Span {
    tracing::info_span!(
        "job",
        "job.entity" = entity,
        "job.urn" = %urn,
        "job.status" = tracing::field::Empty,
    )
}

/// Record a status transition on the span and emit an event inside it.
pub fn record_state_transition(span: &Span, from: &str, to: &str) {
    span.record("job.status", to);
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "state_transition");
    });
}
