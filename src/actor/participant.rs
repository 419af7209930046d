//! A participant: enters, sits, trades work, stands, leaves, does the work.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info};

use crate::config::Timing;
use crate::coordinator::MeetingCoordinator;
use crate::error::Result;
use crate::model::{ParticipantId, WorkItem};
use crate::telemetry::actor::{participant_span, record_cycle};

use super::pause;

/// What a participant got done before it was stopped.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantReport {
    pub id: ParticipantId,
    pub cycles: u64,
    pub quests_completed: u64,
}

pub struct Participant {
    id: ParticipantId,
    coordinator: Arc<MeetingCoordinator>,
    timing: Timing,
    cancel: CancellationToken,
    rng: StdRng,
    /// The item currently held. Owned exclusively until released.
    quest: Option<WorkItem>,
    quests_completed: u64,
}

impl Participant {
    pub fn new(
        id: ParticipantId,
        coordinator: Arc<MeetingCoordinator>,
        timing: Timing,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            coordinator,
            timing,
            cancel,
            rng: StdRng::from_entropy(),
            quest: None,
            quests_completed: 0,
        }
    }

    /// Run the enter/meet/leave/quest script until cancelled.
    pub async fn run(mut self) -> ParticipantReport {
        let span = participant_span(self.id);
        async {
            let mut cycles = 0;
            loop {
                record_cycle(&tracing::Span::current(), cycles + 1);
                match self.cycle().await {
                    Ok(()) => cycles += 1,
                    Err(e) if e.is_cancelled() => break,
                    Err(e) => {
                        error!(participant = %self.id, "participant stopped: {e}");
                        break;
                    }
                }
            }
            ParticipantReport {
                id: self.id,
                cycles,
                quests_completed: self.quests_completed,
            }
        }
        .instrument(span)
        .await
    }

    async fn cycle(&mut self) -> Result<()> {
        let hall = Arc::clone(&self.coordinator);

        hall.participant_enters(self.id, &self.cancel).await?;
        self.mingle().await?;

        hall.participant_sits_down(self.id)?;
        if let Some(done) = self.quest.take() {
            hall.participant_releases_work(self.id, done, &self.cancel).await?;
        }
        self.quest = Some(hall.participant_acquires_work(self.id, &self.cancel).await?);
        hall.participant_stands_up(self.id)?;

        self.mingle().await?;
        hall.participant_exits(self.id, &self.cancel).await?;

        self.go_questing().await
    }

    async fn mingle(&mut self) -> Result<()> {
        pause(&self.cancel, self.timing.mingle.sample(&mut self.rng)).await
    }

    async fn go_questing(&mut self) -> Result<()> {
        let delay = self.timing.quest.sample(&mut self.rng);
        let Some(quest) = &self.quest else {
            return Ok(());
        };

        info!(participant = %self.id, item = %quest, "participant sets off");
        pause(&self.cancel, delay).await?;
        info!(participant = %self.id, item = %quest, "participant completes work");

        self.quests_completed += 1;
        Ok(())
    }
}
