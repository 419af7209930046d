//! Meeting coordinator: the hall's joint state and its blocking operations.
//!
//! The convener gates the hall. While the convener is present nobody may
//! enter or leave; the meeting begins once everyone inside is seated and ends
//! once everyone inside is standing again, and work only changes hands while
//! it is in session. The convener may only leave once everyone has stood up.
//!
//! "Everyone seated" and "everyone standing" are recomputed from the full
//! seating map under the lock on every call, so there is no separate quorum
//! counter to drift out of sync.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{MeetingSnapshot, ParticipantId, WorkItem};
use crate::queue::WorkQueue;
use crate::sync::Monitor;
use crate::telemetry::metrics;

#[derive(Debug, Default)]
struct HallState {
    convener_present: bool,
    meeting_active: bool,
    meeting_held: bool,
    seating: BTreeMap<ParticipantId, bool>,
    /// Inside when the last meeting ended and not yet gone.
    departing: BTreeSet<ParticipantId>,
    meetings_begun: u64,
}

impl HallState {
    fn all_seated(&self) -> bool {
        self.seating.values().all(|&sitting| sitting)
    }

    fn all_standing(&self) -> bool {
        self.seating.values().all(|&sitting| !sitting)
    }

    fn set_seated(&mut self, id: ParticipantId, sitting: bool) -> Result<()> {
        let seat = self.seating.get_mut(&id).ok_or(Error::NotInside(id))?;
        *seat = sitting;
        Ok(())
    }

    /// Start the meeting if the convener is here and everyone is seated.
    fn try_begin(&mut self) {
        if self.convener_present && !self.meeting_active && self.all_seated() {
            self.meeting_active = true;
            self.meeting_held = true;
            self.meetings_begun += 1;
            info!(participants = self.seating.len(), "meeting begins");
            metrics::meeting_transitions().add(1, &[KeyValue::new("transition", "begins")]);
        }
    }

    /// End the meeting. Everyone inside is now on their way out.
    fn end(&mut self) {
        if self.meeting_active {
            self.meeting_active = false;
            self.departing.extend(self.seating.keys().copied());
            info!("meeting ends");
            metrics::meeting_transitions().add(1, &[KeyValue::new("transition", "ends")]);
        }
    }

    fn snapshot(&self) -> MeetingSnapshot {
        MeetingSnapshot {
            convener_present: self.convener_present,
            meeting_active: self.meeting_active,
            meeting_held: self.meeting_held,
            seating: self.seating.clone(),
            departing: self.departing.clone(),
        }
    }
}

/// The hall monitor, bound to the new-work and completed-work queues.
#[derive(Debug)]
pub struct MeetingCoordinator {
    hall: Monitor<HallState>,
    new_work: Arc<WorkQueue>,
    completed_work: Arc<WorkQueue>,
}

impl MeetingCoordinator {
    pub fn new(new_work: Arc<WorkQueue>, completed_work: Arc<WorkQueue>) -> Self {
        Self {
            hall: Monitor::new(HallState::default()),
            new_work,
            completed_work,
        }
    }

    pub fn new_work(&self) -> &Arc<WorkQueue> {
        &self.new_work
    }

    pub fn completed_work(&self) -> &Arc<WorkQueue> {
        &self.completed_work
    }

    /// A consistent copy of the current state.
    pub fn snapshot(&self) -> MeetingSnapshot {
        self.hall.inspect(HallState::snapshot)
    }

    /// How many meetings have begun since the coordinator was created.
    pub fn meetings_begun(&self) -> u64 {
        self.hall.inspect(|hall| hall.meetings_begun)
    }

    // -----------------------------------------------------------------------
    // Participant operations
    // -----------------------------------------------------------------------

    /// Enter the hall, waiting while the convener is present. The participant
    /// starts out standing.
    pub async fn participant_enters(
        &self,
        id: ParticipantId,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let started = Instant::now();
        self.hall
            .wait_for(cancel, |hall| {
                if hall.convener_present {
                    return None;
                }
                if hall.seating.contains_key(&id) {
                    return Some(Err(Error::AlreadyInside(id)));
                }
                hall.seating.insert(id, false);
                Some(Ok(()))
            })
            .await??;

        record_wait("participant_enters", started);
        record_movement("participant", "enter");
        info!(participant = %id, "participant enters the hall");
        Ok(())
    }

    /// Leave the hall, waiting while the convener is present.
    pub async fn participant_exits(
        &self,
        id: ParticipantId,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let started = Instant::now();
        self.hall
            .wait_for(cancel, |hall| {
                if hall.convener_present {
                    return None;
                }
                if hall.seating.remove(&id).is_none() {
                    return Some(Err(Error::NotInside(id)));
                }
                hall.departing.remove(&id);
                Some(Ok(()))
            })
            .await??;

        record_wait("participant_exits", started);
        record_movement("participant", "exit");
        info!(participant = %id, "participant exits the hall");
        Ok(())
    }

    /// Take a seat. Starts the meeting if this completes the quorum.
    pub fn participant_sits_down(&self, id: ParticipantId) -> Result<()> {
        self.hall.update(|hall| {
            hall.set_seated(id, true)?;
            info!(participant = %id, "participant sits down");
            hall.try_begin();
            Ok::<_, Error>(())
        })?;
        record_movement("participant", "sit");
        Ok(())
    }

    /// Stand up. Ends the meeting once everyone inside is standing.
    pub fn participant_stands_up(&self, id: ParticipantId) -> Result<()> {
        self.hall.update(|hall| {
            hall.set_seated(id, false)?;
            info!(participant = %id, "participant stands up");
            if hall.convener_present && hall.all_standing() {
                hall.end();
            }
            Ok::<_, Error>(())
        })?;
        record_movement("participant", "stand");
        Ok(())
    }

    /// Wait for the meeting to be in session, then take the next new item.
    ///
    /// The take happens outside the hall lock, so an empty new-work queue
    /// never stalls other hall operations.
    pub async fn participant_acquires_work(
        &self,
        id: ParticipantId,
        cancel: &CancellationToken,
    ) -> Result<WorkItem> {
        self.await_session("participant_acquires_work", cancel).await?;
        let item = self.new_work.take(cancel).await?;
        info!(participant = %id, item = %item, "participant acquires work");
        Ok(item)
    }

    /// Wait for the meeting to be in session, then hand in a completed item.
    pub async fn participant_releases_work(
        &self,
        id: ParticipantId,
        item: WorkItem,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.await_session("participant_releases_work", cancel).await?;
        info!(participant = %id, item = %item, "participant releases work");
        self.completed_work.publish(item);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Convener operations
    // -----------------------------------------------------------------------

    /// Wait until everyone who sat in the previous meeting has left.
    ///
    /// Entering earlier could strand them: they are standing and on their
    /// way out, so no new meeting could begin while they are stuck inside.
    pub async fn convener_awaits_departures(&self, cancel: &CancellationToken) -> Result<()> {
        let started = Instant::now();
        self.hall
            .wait_for(cancel, |hall| hall.departing.is_empty().then_some(()))
            .await?;
        record_wait("convener_awaits_departures", started);
        Ok(())
    }

    /// Enter the hall. Never blocks; the meeting begins at once if everyone
    /// inside is already seated (or nobody is inside).
    pub fn convener_enters(&self) {
        self.hall.update(|hall| {
            hall.convener_present = true;
            hall.meeting_held = false;
            info!(inside = hall.seating.len(), "convener enters the hall");
            hall.try_begin();
        });
        record_movement("convener", "enter");
    }

    /// Wait until a meeting has begun during this visit.
    ///
    /// The meeting may already have begun and ended by the time this runs,
    /// so it waits on `meeting_held` rather than on the meeting being active.
    pub async fn convener_awaits_quorum(&self, cancel: &CancellationToken) -> Result<()> {
        let started = Instant::now();
        self.hall
            .wait_for(cancel, |hall| hall.meeting_held.then_some(()))
            .await?;
        debug!("quorum reached");
        record_wait("convener_awaits_quorum", started);
        Ok(())
    }

    /// Leave the hall once everyone inside is standing.
    pub async fn convener_exits(&self, cancel: &CancellationToken) -> Result<()> {
        let started = Instant::now();
        self.hall
            .wait_for(cancel, |hall| {
                if !hall.all_standing() {
                    return None;
                }
                hall.end();
                hall.convener_present = false;
                Some(())
            })
            .await?;

        record_wait("convener_exits", started);
        record_movement("convener", "exit");
        info!("convener exits the hall");
        Ok(())
    }

    async fn await_session(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let started = Instant::now();
        self.hall
            .wait_for(cancel, |hall| hall.meeting_active.then_some(()))
            .await?;
        debug!(operation, "meeting in session");
        record_wait(operation, started);
        Ok(())
    }
}

fn record_wait(operation: &'static str, started: Instant) {
    metrics::wait_duration_ms().record(
        started.elapsed().as_secs_f64() * 1000.0,
        &[KeyValue::new("operation", operation)],
    );
}

fn record_movement(actor: &'static str, movement: &'static str) {
    metrics::hall_movements().add(
        1,
        &[
            KeyValue::new("actor", actor),
            KeyValue::new("movement", movement),
        ],
    );
}
