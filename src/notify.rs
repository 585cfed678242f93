//! Wake-up plumbing between the cooperative tasks.
//!
//! Two primitives cross task boundaries:
//!
//! - [`ChangeNotifier`] — the single shared change notification raised by
//!   the poller when any switch value changes.  It is a single-slot signal,
//!   not a queue: multiple `raise()` calls before the consumer wakes
//!   coalesce into one wake, and `wait()` atomically clears the slot for
//!   the one waiter that observes it.
//! - [`FaultLatch`] — a first-error-wins slot that carries a fatal error
//!   from a background task (poller, motion) to the coordinator's run
//!   loop.  Writers latch the error and then raise the notifier so the
//!   waiting coordinator observes it on its next wake.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::error::Error;

/// Coalescing change notification with clear-on-consume semantics.
pub struct ChangeNotifier {
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl ChangeNotifier {
    pub const fn new() -> Self {
        Self { signal: Signal::new() }
    }

    /// Mark that at least one switch changed.  Idempotent until consumed.
    pub fn raise(&self) {
        self.signal.signal(());
    }

    /// Suspend until the notification is raised, consuming it.
    pub async fn wait(&self) {
        self.signal.wait().await;
    }

    /// Whether a raise is pending (not yet consumed by a waiter).
    pub fn pending(&self) -> bool {
        self.signal.signaled()
    }
}

/// First-error-wins fatal error slot.
pub struct FaultLatch {
    slot: Cell<Option<Error>>,
}

impl FaultLatch {
    pub const fn new() -> Self {
        Self { slot: Cell::new(None) }
    }

    /// Record a fatal error.  Later errors are dropped: the first failure
    /// is the one that explains the shutdown.
    pub fn latch(&self, error: Error) {
        if self.slot.get().is_none() {
            self.slot.set(Some(error));
        }
    }

    /// Consume the latched error, if any.
    pub fn take(&self) -> Option<Error> {
        self.slot.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;

    #[test]
    fn raises_coalesce_into_one_wake() {
        let n = ChangeNotifier::new();
        n.raise();
        n.raise();
        n.raise();
        assert!(n.pending());
        futures_lite::future::block_on(n.wait());
        // A single wait consumed all three raises.
        assert!(!n.pending());
    }

    #[test]
    fn first_fault_wins() {
        let latch = FaultLatch::new();
        latch.latch(Error::Driver(DriverError::Unavailable));
        latch.latch(Error::Init("late failure"));
        assert_eq!(latch.take(), Some(Error::Driver(DriverError::Unavailable)));
        assert_eq!(latch.take(), None);
    }
}
