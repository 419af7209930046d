//! Monitor: shared state behind a mutex with broadcast wake-ups.
//!
//! Every blocking operation in the crate is built from [`Monitor::wait_for`]:
//! register for the next broadcast, try the operation under the lock, and if
//! its precondition does not hold yet, release the lock and sleep until some
//! other caller changes the state. Registration happens before the attempt, so
//! a change made between the attempt and the sleep still wakes the waiter.
//!
//! The lock is a plain `std::sync::Mutex`. It is never held across an
//! `.await`, and a poisoned lock is recovered: state is only mutated inside a
//! single critical section once its precondition holds.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// A value guarded by a mutex, plus a broadcast channel for "state changed".
#[derive(Debug, Default)]
pub struct Monitor<S> {
    state: Mutex<S>,
    changed: Notify,
}

impl<S> Monitor<S> {
    pub fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
            changed: Notify::new(),
        }
    }

    /// Read the state under the lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.lock())
    }

    /// Mutate the state under the lock, then wake every waiter.
    pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let out = {
            let mut state = self.lock();
            f(&mut state)
        };
        self.changed.notify_waiters();
        out
    }

    /// Block until `attempt` succeeds, then wake every waiter.
    ///
    /// `attempt` runs under the lock each time the state may have changed. It
    /// returns `None` (leaving the state untouched) while its precondition is
    /// unmet, and `Some` once it has applied its mutation. Wake-ups are only a
    /// hint; the attempt is always re-run before proceeding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires before the attempt
    /// succeeds. A cancelled wait never mutates the state.
    pub async fn wait_for<R>(
        &self,
        cancel: &CancellationToken,
        mut attempt: impl FnMut(&mut S) -> Option<R>,
    ) -> Result<R> {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let changed = self.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            let outcome = {
                let mut state = self.lock();
                attempt(&mut state)
            };
            if let Some(out) = outcome {
                self.changed.notify_waiters();
                return Ok(out);
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                () = &mut changed => {}
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
