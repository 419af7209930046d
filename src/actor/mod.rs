//! Actor loops: the convener, the participants, and the two queue workers.
//!
//! Each actor is a plain struct with an async `run` that loops until its
//! cancellation token fires. Actors share nothing but the coordinator and the
//! queues.

pub mod convener;
pub mod participant;
pub mod supply;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

pub use convener::Convener;
pub use participant::{Participant, ParticipantReport};
pub use supply::{Producer, Retirer};

/// Sleep for `delay`, returning early with [`Error::Cancelled`] if the token fires.
pub(crate) async fn pause(cancel: &CancellationToken, delay: Duration) -> Result<()> {
    if delay.is_zero() {
        // Still yield so a zero-delay loop cannot starve the scheduler.
        tokio::task::yield_now().await;
        return if cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}
