//! Named, unbounded FIFO of work items with a blocking take.

use std::collections::VecDeque;
use std::time::Instant;

use opentelemetry::KeyValue;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;
use crate::model::WorkItem;
use crate::sync::Monitor;
use crate::telemetry::metrics;

/// A thread-safe FIFO queue. Items leave in the order they entered, and each
/// item is handed to exactly one [`take`](WorkQueue::take).
#[derive(Debug)]
pub struct WorkQueue {
    name: String,
    items: Monitor<VecDeque<WorkItem>>,
}

impl WorkQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Monitor::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.items.inspect(VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.items.inspect(VecDeque::is_empty)
    }

    /// Append an item to the tail and wake blocked takers. Never blocks.
    pub fn publish(&self, item: WorkItem) {
        debug!(queue = %self.name, item = %item, "work published");
        self.items.update(|items| items.push_back(item));
        self.record("publish");
    }

    /// Remove and return the head, waiting while the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`](crate::error::Error::Cancelled) if `cancel`
    /// fires first; nothing is removed in that case.
    pub async fn take(&self, cancel: &CancellationToken) -> Result<WorkItem> {
        let started = Instant::now();
        let item = self.items.wait_for(cancel, VecDeque::pop_front).await?;

        debug!(queue = %self.name, item = %item, "work taken");
        self.record("take");
        metrics::wait_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "queue_take")],
        );
        Ok(item)
    }

    fn record(&self, operation: &'static str) {
        metrics::queue_operations().add(
            1,
            &[
                KeyValue::new("queue", self.name.clone()),
                KeyValue::new("operation", operation),
            ],
        );
    }
}
