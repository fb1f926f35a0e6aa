//! Auto-relock timer.
//!
//! A single pending deadline, replaced by every [`RelockTimer::arm`] and
//! dropped by [`RelockTimer::cancel`]. The deadline is stored in the timer
//! itself, so at most one relock is ever pending and a waiter that is dropped
//! and restarted picks the same deadline up again. An embassy `Signal` only
//! wakes the waiter when the deadline changes.
//!
//! The timer does not lock anything itself. [`RelockTimer::elapsed`] resolves
//! with the generation of the deadline that ran out, and the controller
//! decides whether that generation is still current.

use core::cell::Cell;

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Instant, Timer};

/// Generation and deadline of the armed relock.
type Pending = Option<(u32, Instant)>;

/// Cancellable one-shot relock deadline.
pub struct RelockTimer {
    pending: BlockingMutex<CriticalSectionRawMutex, Cell<Pending>>,
    changed: Signal<CriticalSectionRawMutex, ()>,
}

impl RelockTimer {
    pub const fn new() -> Self {
        Self {
            pending: BlockingMutex::new(Cell::new(None)),
            changed: Signal::new(),
        }
    }

    /// Schedule a relock at `deadline`, replacing any pending one.
    pub fn arm(
        &self,
        generation: u32,
        deadline: Instant,
    ) {
        self.replace(Some((generation, deadline)));
    }

    /// Drop the pending relock, if any.
    pub fn cancel(&self) { self.replace(None); }

    /// Generation and deadline of the pending relock.
    pub fn pending(&self) -> Pending { self.pending.lock(Cell::get) }

    /// Wait until an armed deadline passes without being replaced or
    /// cancelled, and return its generation. The deadline is consumed.
    pub async fn elapsed(&self) -> u32 {
        loop {
            let Some((generation, deadline)) = self.pending() else {
                self.changed.wait().await;
                continue;
            };

            if let Either::First(()) = select(Timer::at(deadline), self.changed.wait()).await
                && self.take_if(generation, deadline)
            {
                return generation;
            }
        }
    }

    fn replace(
        &self,
        pending: Pending,
    ) {
        self.pending.lock(|cell| cell.set(pending));
        self.changed.signal(());
    }

    /// Clear the pending deadline if it is still the one that ran out.
    fn take_if(
        &self,
        generation: u32,
        deadline: Instant,
    ) -> bool {
        self.pending.lock(|cell| {
            let current = cell.get() == Some((generation, deadline));
            if current {
                cell.set(None);
            }
            current
        })
    }
}

impl Default for RelockTimer {
    fn default() -> Self { Self::new() }
}

// =============================================================================
// Unit Tests
// =============================================================================
