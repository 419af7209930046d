//! Queue workers: the producer feeding new work and the retirer draining
//! completed work.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info};

use crate::config::DelayRange;
use crate::model::WorkItem;
use crate::queue::WorkQueue;
use crate::telemetry::actor::queue_worker_span;

use super::pause;

/// Publishes a new numbered item every `interval`.
pub struct Producer {
    queue: Arc<WorkQueue>,
    interval: DelayRange,
    cancel: CancellationToken,
    /// Number given to the next item.
    next: u64,
}

impl Producer {
    /// `first` continues the numbering after any items seeded up front.
    pub fn new(
        queue: Arc<WorkQueue>,
        interval: DelayRange,
        cancel: CancellationToken,
        first: u64,
    ) -> Self {
        Self {
            queue,
            interval,
            cancel,
            next: first,
        }
    }

    /// Returns how many items were produced.
    pub async fn run(mut self) -> u64 {
        let span = queue_worker_span("producer", self.queue.name());
        async {
            let mut rng = StdRng::from_entropy();
            let mut produced = 0;
            while pause(&self.cancel, self.interval.sample(&mut rng)).await.is_ok() {
                self.queue.publish(work_item(self.next));
                self.next += 1;
                produced += 1;
            }
            info!(produced, "producer done");
            produced
        }
        .instrument(span)
        .await
    }
}

/// Takes completed items off their queue and discards them.
pub struct Retirer {
    queue: Arc<WorkQueue>,
    cancel: CancellationToken,
}

impl Retirer {
    pub fn new(queue: Arc<WorkQueue>, cancel: CancellationToken) -> Self {
        Self { queue, cancel }
    }

    /// Returns how many items were retired.
    pub async fn run(self) -> u64 {
        let span = queue_worker_span("retirer", self.queue.name());
        async {
            let mut retired = 0;
            loop {
                match self.queue.take(&self.cancel).await {
                    Ok(item) => {
                        info!(item = %item, queue = %self.queue.name(), "work retired");
                        retired += 1;
                    }
                    Err(e) if e.is_cancelled() => break,
                    Err(e) => {
                        error!("retirer stopped: {e}");
                        break;
                    }
                }
            }
            info!(retired, "retirer done");
            retired
        }
        .instrument(span)
        .await
    }
}

/// The `n`th item of the simulation.
pub fn work_item(n: u64) -> WorkItem {
    WorkItem::new(format!("quest {n}"))
}
