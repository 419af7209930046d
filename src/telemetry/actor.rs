//! Span helpers for actor loops.
//!
//! Each actor task runs inside one span for its whole lifetime; the cycle
//! counter is declared empty and filled in as the loop progresses.

use tracing::Span;

use crate::model::ParticipantId;

pub fn convener_span() -> Span {
    tracing::info_span!("convener", "actor.cycle" = tracing::field::Empty)
}

pub fn participant_span(id: ParticipantId) -> Span {
    tracing::info_span!(
        "participant",
        "participant.id" = id.0,
        "actor.cycle" = tracing::field::Empty,
    )
}

/// Span for the producer or the retirer of a named queue.
pub fn queue_worker_span(role: &'static str, queue: &str) -> Span {
    tracing::info_span!("queue_worker", "worker.role" = role, "queue.name" = queue)
}

/// Record the cycle number an actor is starting.
pub fn record_cycle(span: &Span, cycle: u64) {
    span.record("actor.cycle", cycle);
}
