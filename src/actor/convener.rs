//! The convener: waits for the last meeting's participants to leave, enters,
//! waits for the meeting to run its course, leaves.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info};

use crate::config::Timing;
use crate::coordinator::MeetingCoordinator;
use crate::error::Result;
use crate::telemetry::actor::{convener_span, record_cycle};

use super::pause;

pub struct Convener {
    coordinator: Arc<MeetingCoordinator>,
    timing: Timing,
    cancel: CancellationToken,
    rng: StdRng,
}

impl Convener {
    pub fn new(
        coordinator: Arc<MeetingCoordinator>,
        timing: Timing,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            coordinator,
            timing,
            cancel,
            rng: StdRng::from_entropy(),
        }
    }

    /// Run meeting cycles until cancelled. Returns the number of meetings held.
    pub async fn run(mut self) -> u64 {
        let span = convener_span();
        async {
            let mut meetings = 0;
            loop {
                record_cycle(&tracing::Span::current(), meetings + 1);
                match self.cycle().await {
                    Ok(()) => meetings += 1,
                    Err(e) if e.is_cancelled() => break,
                    Err(e) => {
                        error!("convener stopped: {e}");
                        break;
                    }
                }
            }
            info!(meetings, "convener done");
            meetings
        }
        .instrument(span)
        .await
    }

    async fn cycle(&mut self) -> Result<()> {
        pause(&self.cancel, self.timing.convener_wait.sample(&mut self.rng)).await?;
        self.coordinator.convener_awaits_departures(&self.cancel).await?;

        self.coordinator.convener_enters();
        self.coordinator.convener_awaits_quorum(&self.cancel).await?;
        debug!("waiting for the hall to stand");
        self.coordinator.convener_exits(&self.cancel).await
    }
}
