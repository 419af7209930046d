//! Integration tests for the meeting coordinator.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use convene::coordinator::MeetingCoordinator;
use convene::error::Error;
use convene::model::{ParticipantId, Phase, WorkItem};
use convene::queue::WorkQueue;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

const P1: ParticipantId = ParticipantId(1);
const P2: ParticipantId = ParticipantId(2);

fn test_hall() -> Arc<MeetingCoordinator> {
    Arc::new(MeetingCoordinator::new(
        Arc::new(WorkQueue::new("new work")),
        Arc::new(WorkQueue::new("completed work")),
    ))
}

/// Let spawned tasks run until they block.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

// ---------------------------------------------------------------------------
// Entering and leaving
// ---------------------------------------------------------------------------

#[tokio::test]
async fn entering_registers_participant_standing() {
    let hall = test_hall();
    let cancel = CancellationToken::new();

    hall.participant_enters(P1, &cancel).await.unwrap();

    let snap = hall.snapshot();
    assert_eq!(snap.seating.get(&P1), Some(&false));
    assert_eq!(snap.phase(), Phase::Idle);
    assert!(!snap.meeting_active);
}

#[tokio::test]
async fn enter_waits_while_convener_present() {
    let hall = test_hall();
    let cancel = CancellationToken::new();
    hall.convener_enters();

    let entering = {
        let hall = Arc::clone(&hall);
        let cancel = cancel.clone();
        tokio::spawn(async move { hall.participant_enters(P1, &cancel).await })
    };
    settle().await;
    assert!(!entering.is_finished());
    assert!(!hall.snapshot().is_inside(P1));

    // Unrelated state changes do not let it through.
    hall.participant_sits_down(P2).unwrap_err();
    settle().await;
    assert!(!entering.is_finished());

    hall.convener_exits(&cancel).await.unwrap();
    entering.await.unwrap().unwrap();
    assert!(hall.snapshot().is_inside(P1));
}

#[tokio::test]
async fn exit_waits_while_convener_present() {
    let hall = test_hall();
    let cancel = CancellationToken::new();
    hall.participant_enters(P1, &cancel).await.unwrap();
    hall.participant_sits_down(P1).unwrap();
    hall.convener_enters();
    hall.participant_stands_up(P1).unwrap();

    let leaving = {
        let hall = Arc::clone(&hall);
        let cancel = cancel.clone();
        tokio::spawn(async move { hall.participant_exits(P1, &cancel).await })
    };
    settle().await;
    assert!(!leaving.is_finished());
    assert!(hall.snapshot().is_inside(P1));

    hall.convener_exits(&cancel).await.unwrap();
    leaving.await.unwrap().unwrap();
    assert!(hall.snapshot().seating.is_empty());
}

#[tokio::test]
async fn double_enter_and_stray_calls_are_rejected() {
    let hall = test_hall();
    let cancel = CancellationToken::new();
    hall.participant_enters(P1, &cancel).await.unwrap();

    assert!(matches!(
        hall.participant_enters(P1, &cancel).await,
        Err(Error::AlreadyInside(id)) if id == P1
    ));
    assert!(matches!(
        hall.participant_exits(P2, &cancel).await,
        Err(Error::NotInside(id)) if id == P2
    ));
    assert!(matches!(
        hall.participant_sits_down(P2),
        Err(Error::NotInside(_))
    ));
    assert!(matches!(
        hall.participant_stands_up(P2),
        Err(Error::NotInside(_))
    ));

    let snap = hall.snapshot();
    assert_eq!(snap.seating.len(), 1);
    assert_eq!(snap.seating.get(&P1), Some(&false));
}

// ---------------------------------------------------------------------------
// Meeting begins and ends
// ---------------------------------------------------------------------------

#[tokio::test]
async fn convener_in_empty_hall_starts_and_ends_meeting_at_once() {
    let hall = test_hall();
    let cancel = CancellationToken::new();

    hall.convener_enters();
    assert_eq!(hall.snapshot().phase(), Phase::Active);
    hall.convener_awaits_quorum(&cancel).await.unwrap();

    hall.convener_exits(&cancel).await.unwrap();
    let snap = hall.snapshot();
    assert!(!snap.convener_present);
    assert!(!snap.meeting_active);
}

#[tokio::test]
async fn convener_entering_a_seated_hall_starts_meeting() {
    let hall = test_hall();
    let cancel = CancellationToken::new();
    for p in [P1, P2] {
        hall.participant_enters(p, &cancel).await.unwrap();
        hall.participant_sits_down(p).unwrap();
    }
    assert!(!hall.snapshot().meeting_active, "no meeting without the convener");

    hall.convener_enters();
    assert_eq!(hall.snapshot().phase(), Phase::Active);
}

#[tokio::test]
async fn meeting_phases_follow_the_protocol() {
    let hall = test_hall();
    let cancel = CancellationToken::new();
    hall.participant_enters(P1, &cancel).await.unwrap();

    hall.convener_enters();
    assert_eq!(hall.snapshot().phase(), Phase::Convening);

    hall.participant_sits_down(P1).unwrap();
    assert_eq!(hall.snapshot().phase(), Phase::Active);

    hall.participant_stands_up(P1).unwrap();
    let snap = hall.snapshot();
    assert_eq!(snap.phase(), Phase::Dispersing);
    assert!(snap.departing.contains(&P1));

    hall.convener_exits(&cancel).await.unwrap();
    assert_eq!(hall.snapshot().phase(), Phase::Idle);

    hall.participant_exits(P1, &cancel).await.unwrap();
    assert!(hall.snapshot().departing.is_empty());
}

#[tokio::test]
async fn convener_exit_waits_until_everyone_stands() {
    let hall = test_hall();
    let cancel = CancellationToken::new();
    for p in [P1, P2] {
        hall.participant_enters(p, &cancel).await.unwrap();
        hall.participant_sits_down(p).unwrap();
    }
    hall.convener_enters();

    let leaving = {
        let hall = Arc::clone(&hall);
        let cancel = cancel.clone();
        tokio::spawn(async move { hall.convener_exits(&cancel).await })
    };
    settle().await;
    assert!(!leaving.is_finished());

    hall.participant_stands_up(P1).unwrap();
    settle().await;
    assert!(!leaving.is_finished());
    assert!(hall.snapshot().meeting_active, "meeting lasts until the last stands");

    hall.participant_stands_up(P2).unwrap();
    leaving.await.unwrap().unwrap();
    let snap = hall.snapshot();
    assert!(!snap.convener_present);
    assert!(!snap.meeting_active);
    // Registration survives the convener's departure.
    assert_eq!(snap.seating.len(), 2);
}

#[tokio::test]
async fn convener_waits_for_last_meeting_to_clear_out() {
    let hall = test_hall();
    let cancel = CancellationToken::new();
    hall.participant_enters(P1, &cancel).await.unwrap();
    hall.participant_sits_down(P1).unwrap();
    hall.convener_enters();
    hall.participant_stands_up(P1).unwrap();
    hall.convener_exits(&cancel).await.unwrap();

    let returning = {
        let hall = Arc::clone(&hall);
        let cancel = cancel.clone();
        tokio::spawn(async move { hall.convener_awaits_departures(&cancel).await })
    };
    settle().await;
    assert!(!returning.is_finished());

    // Someone new may come in meanwhile; only the old attendee matters.
    hall.participant_enters(P2, &cancel).await.unwrap();
    settle().await;
    assert!(!returning.is_finished());

    hall.participant_exits(P1, &cancel).await.unwrap();
    returning.await.unwrap().unwrap();
}

#[tokio::test]
async fn quorum_wait_sees_a_meeting_that_already_ended() {
    let hall = test_hall();
    let cancel = CancellationToken::new();
    hall.new_work().publish(WorkItem::new("quest 1"));
    hall.participant_enters(P1, &cancel).await.unwrap();
    hall.participant_sits_down(P1).unwrap();

    // The whole meeting runs its course before the convener checks for quorum.
    hall.convener_enters();
    hall.participant_acquires_work(P1, &cancel).await.unwrap();
    hall.participant_stands_up(P1).unwrap();
    let leaving = {
        let hall = Arc::clone(&hall);
        let cancel = cancel.clone();
        tokio::spawn(async move { hall.participant_exits(P1, &cancel).await })
    };
    settle().await;
    assert_eq!(hall.snapshot().phase(), Phase::Dispersing);

    tokio::time::timeout(Duration::from_secs(1), hall.convener_awaits_quorum(&cancel))
        .await
        .expect("quorum wait should see the meeting held this visit")
        .unwrap();
    hall.convener_exits(&cancel).await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), leaving)
        .await
        .expect("participant should leave once the convener has gone")
        .unwrap()
        .unwrap();
    assert!(hall.snapshot().seating.is_empty());
}

#[tokio::test]
async fn quorum_wait_blocks_until_a_meeting_begins() {
    let hall = test_hall();
    let cancel = CancellationToken::new();
    hall.participant_enters(P1, &cancel).await.unwrap();
    hall.convener_enters();

    let waiting = {
        let hall = Arc::clone(&hall);
        let cancel = cancel.clone();
        tokio::spawn(async move { hall.convener_awaits_quorum(&cancel).await })
    };
    settle().await;
    assert!(!waiting.is_finished());

    hall.participant_sits_down(P1).unwrap();
    waiting.await.unwrap().unwrap();
}

// ---------------------------------------------------------------------------
// Work exchange
// ---------------------------------------------------------------------------

#[tokio::test]
async fn acquire_waits_for_meeting_then_takes_new_work() {
    let hall = test_hall();
    let cancel = CancellationToken::new();
    let quest = WorkItem::new("quest 1");
    hall.new_work().publish(quest.clone());

    hall.participant_enters(P1, &cancel).await.unwrap();
    hall.participant_sits_down(P1).unwrap();

    let acquiring = {
        let hall = Arc::clone(&hall);
        let cancel = cancel.clone();
        tokio::spawn(async move { hall.participant_acquires_work(P1, &cancel).await })
    };
    settle().await;
    assert!(!acquiring.is_finished(), "no work changes hands before the meeting");
    assert_eq!(hall.new_work().len(), 1);

    hall.convener_enters();
    assert_eq!(acquiring.await.unwrap().unwrap(), quest);
    assert!(hall.new_work().is_empty());
}

#[tokio::test]
async fn release_waits_for_meeting_then_publishes_completed_work() {
    let hall = test_hall();
    let cancel = CancellationToken::new();
    let done = WorkItem::new("quest 0");

    hall.participant_enters(P1, &cancel).await.unwrap();
    hall.participant_sits_down(P1).unwrap();

    let releasing = {
        let hall = Arc::clone(&hall);
        let cancel = cancel.clone();
        let done = done.clone();
        tokio::spawn(async move { hall.participant_releases_work(P1, done, &cancel).await })
    };
    settle().await;
    assert!(!releasing.is_finished());
    assert!(hall.completed_work().is_empty());

    hall.convener_enters();
    releasing.await.unwrap().unwrap();
    assert_eq!(hall.completed_work().take(&cancel).await.unwrap(), done);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelled_waits_leave_state_untouched() {
    let hall = test_hall();
    let cancel = CancellationToken::new();
    hall.participant_enters(P1, &cancel).await.unwrap();
    hall.participant_sits_down(P1).unwrap();
    hall.convener_enters();
    hall.participant_stands_up(P1).unwrap();
    hall.participant_sits_down(P1).unwrap();
    let before = hall.snapshot();

    let doomed = CancellationToken::new();
    let waits = {
        let hall = Arc::clone(&hall);
        let doomed = doomed.clone();
        tokio::spawn(async move {
            let enter = hall.participant_enters(P2, &doomed);
            let leave = hall.convener_exits(&doomed);
            tokio::join!(enter, leave)
        })
    };
    settle().await;
    doomed.cancel();

    let (enter, leave) = waits.await.unwrap();
    assert!(enter.unwrap_err().is_cancelled());
    assert!(leave.unwrap_err().is_cancelled());
    assert_eq!(hall.snapshot(), before);
}

// ---------------------------------------------------------------------------
// Randomized interleavings
// ---------------------------------------------------------------------------

/// Drive random non-blocking sequences of hall calls and check the joint
/// state after every one of them against a simple shadow model.
#[tokio::test]
async fn random_interleavings_preserve_meeting_invariants() {
    const PARTICIPANTS: u32 = 4;
    const STEPS: usize = 2_000;

    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let hall = test_hall();
        let cancel = CancellationToken::new();
        let mut shadow: BTreeMap<ParticipantId, bool> = BTreeMap::new();

        for step in 0..STEPS {
            let before = hall.snapshot();
            let id = ParticipantId(rng.gen_range(1..=PARTICIPANTS));
            let inside = shadow.contains_key(&id);

            match rng.gen_range(0..6) {
                0 if !before.convener_present && !inside => {
                    hall.participant_enters(id, &cancel).await.unwrap();
                    shadow.insert(id, false);
                }
                1 if !before.convener_present && inside => {
                    hall.participant_exits(id, &cancel).await.unwrap();
                    shadow.remove(&id);
                }
                2 if inside => {
                    hall.participant_sits_down(id).unwrap();
                    shadow.insert(id, true);
                }
                3 if inside => {
                    hall.participant_stands_up(id).unwrap();
                    shadow.insert(id, false);
                }
                4 if !before.convener_present => hall.convener_enters(),
                5 if before.convener_present && before.all_standing() => {
                    hall.convener_exits(&cancel).await.unwrap();
                }
                _ => continue,
            }

            let after = hall.snapshot();
            assert!(
                after.is_consistent(),
                "seed {seed} step {step}: inconsistent state {after:?}"
            );
            assert_eq!(after.seating, shadow, "seed {seed} step {step}");
            if after.convener_present && before.convener_present {
                let joined: Vec<_> = after
                    .seating
                    .keys()
                    .filter(|p| !before.seating.contains_key(p))
                    .collect();
                assert!(joined.is_empty(), "nobody enters while the convener is present");
                assert_eq!(
                    after.seating.len(),
                    before.seating.len(),
                    "nobody leaves while the convener is present"
                );
            }
        }
    }
}
