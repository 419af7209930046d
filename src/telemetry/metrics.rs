//! Metric instrument factories for convene.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! With no provider installed the instruments are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("convene")
}

/// Counter: queue-level operations (publish, take).
/// Labels: `queue`, `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("convene.queue.operations")
        .with_description("Number of work queue operations")
        .build()
}

/// Counter: meeting phase transitions.
/// Labels: `transition` ("begins" | "ends").
pub fn meeting_transitions() -> Counter<u64> {
    meter()
        .u64_counter("convene.meeting.transitions")
        .with_description("Number of times a meeting began or ended")
        .build()
}

/// Counter: actor movements through the hall.
/// Labels: `actor` ("convener" | "participant"), `movement`.
pub fn hall_movements() -> Counter<u64> {
    meter()
        .u64_counter("convene.hall.movements")
        .with_description("Enter, exit, sit and stand events")
        .build()
}

/// Histogram: time spent blocked in a coordinator or queue wait.
/// Labels: `operation`.
pub fn wait_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("convene.wait.duration_ms")
        .with_description("Time spent blocked waiting for a precondition")
        .with_unit("ms")
        .build()
}
