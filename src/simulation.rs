//! Simulation: wires the queues, the coordinator and the actors together and
//! runs them until shutdown.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::actor::supply::work_item;
use crate::actor::{Convener, Participant, ParticipantReport, Producer, Retirer};
use crate::config::Config;
use crate::coordinator::MeetingCoordinator;
use crate::model::{MeetingSnapshot, ParticipantId};
use crate::queue::WorkQueue;

pub const NEW_WORK_QUEUE: &str = "new work";
pub const COMPLETED_WORK_QUEUE: &str = "completed work";

/// What happened during a run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub meetings_held: u64,
    pub items_produced: u64,
    pub items_retired: u64,
    pub participants: Vec<ParticipantReport>,
    /// Items still waiting on each queue when the run stopped.
    pub new_work_left: usize,
    pub completed_work_left: usize,
    pub final_state: MeetingSnapshot,
}

/// One convener, `config.participants` participants, a producer and a
/// retirer sharing one coordinator.
///
/// Clones share the coordinator and the shutdown signal, so a clone can stop
/// a run from another task.
#[derive(Clone)]
pub struct Simulation {
    config: Config,
    coordinator: Arc<MeetingCoordinator>,
    shutdown: CancellationToken,
}

impl Simulation {
    pub fn new(config: Config) -> Self {
        let new_work = Arc::new(WorkQueue::new(NEW_WORK_QUEUE));
        for n in 1..=u64::from(config.initial_work) {
            new_work.publish(work_item(n));
        }
        let completed_work = Arc::new(WorkQueue::new(COMPLETED_WORK_QUEUE));

        Self {
            coordinator: Arc::new(MeetingCoordinator::new(new_work, completed_work)),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn coordinator(&self) -> &Arc<MeetingCoordinator> {
        &self.coordinator
    }

    /// Signal every actor to stop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Run all actors until [`shutdown`](Self::shutdown) or, if given, until
    /// `duration` has elapsed. Returns once every actor has stopped.
    ///
    /// A run is one-shot: it cancels the shared shutdown signal on the way
    /// out, so it consumes the simulation.
    pub async fn run(self, duration: Option<Duration>) -> SimulationReport {
        let timing = self.config.timing;
        let coordinator = &self.coordinator;
        info!(
            participants = self.config.participants,
            initial_work = self.config.initial_work,
            "simulation started"
        );

        let convener = tokio::spawn(
            Convener::new(Arc::clone(coordinator), timing, self.shutdown.child_token()).run(),
        );
        let participants: Vec<JoinHandle<ParticipantReport>> = (1..=self.config.participants)
            .map(|n| {
                let participant = Participant::new(
                    ParticipantId(n),
                    Arc::clone(coordinator),
                    timing,
                    self.shutdown.child_token(),
                );
                tokio::spawn(participant.run())
            })
            .collect();
        let producer = tokio::spawn(
            Producer::new(
                Arc::clone(coordinator.new_work()),
                timing.produce,
                self.shutdown.child_token(),
                u64::from(self.config.initial_work) + 1,
            )
            .run(),
        );
        let retirer = tokio::spawn(
            Retirer::new(
                Arc::clone(coordinator.completed_work()),
                self.shutdown.child_token(),
            )
            .run(),
        );

        match duration {
            Some(limit) => {
                tokio::select! {
                    () = self.shutdown.cancelled() => {}
                    () = tokio::time::sleep(limit) => info!("simulation time limit reached"),
                }
            }
            None => self.shutdown.cancelled().await,
        }
        self.shutdown.cancel();
        info!("simulation shutting down");

        let mut reports = Vec::with_capacity(participants.len());
        for handle in participants {
            if let Some(report) = joined("participant", handle).await {
                reports.push(report);
            }
        }

        let report = SimulationReport {
            meetings_held: joined("convener", convener).await.unwrap_or_default(),
            items_produced: joined("producer", producer).await.unwrap_or_default(),
            items_retired: joined("retirer", retirer).await.unwrap_or_default(),
            participants: reports,
            new_work_left: coordinator.new_work().len(),
            completed_work_left: coordinator.completed_work().len(),
            final_state: coordinator.snapshot(),
        };
        info!(
            meetings = report.meetings_held,
            produced = report.items_produced,
            retired = report.items_retired,
            "simulation stopped"
        );
        report
    }
}

async fn joined<T>(actor: &str, handle: JoinHandle<T>) -> Option<T> {
    match handle.await {
        Ok(out) => Some(out),
        Err(e) => {
            warn!(actor, "actor task failed: {e}");
            None
        }
    }
}
