//! Async door controller.
//!
//! [`DoorControl`] wraps a [`DoorCore`] and adds everything that involves
//! time: actuation delays, the auto-relock timer and state notifications.
//!
//! # Single-Writer Discipline
//!
//! - The core sits in a critical-section mutex. Each transition and its audit
//!   entry are applied inside one critical section, so readers never see a
//!   state without its log entry.
//! - Actuation sequences (unlock, lock, auto-relock) are serialized by an
//!   async mutex held across the actuation delay. A second unlock arriving
//!   mid-actuation waits its turn and is validated when it gets it.
//! - `manual_override`, `trigger_fault` and `reset_fault` act immediately
//!   without waiting. An actuation that finds its moving state replaced when
//!   its delay ends stops without touching the door.
//!
//! # Auto-Relock
//!
//! The relock timer only fires while [`DoorControl::run_auto_relock`] is being
//! polled. The pending deadline lives in the door, not in the worker future,
//! so the worker may be dropped and started again without losing a relock.
//! The host runs it once per door, next to its other tasks:
//!
//! ```ignore
//! let door = DoorControl::new(DoorConfig::DEFAULT);
//! let outcome = select(door.run_auto_relock(), app(&door)).await;
//! ```
//!
//! # Observers
//!
//! Every transition is applied and broadcast inside one critical section, so
//! observers and state receivers see transitions in the order they happened
//! and the last notified state always matches [`DoorControl::state`].
//!
//! Observers therefore run synchronously inside that critical section. On a
//! single-core embedded target this masks interrupts for as long as the
//! callbacks take, which adds directly to interrupt latency. Keep callbacks to
//! a few instructions (set a flag, signal a task) and do the real work
//! elsewhere; [`DoorControl::state_receiver`] is the way to react from a task.
//! Observers may read the door (state, log, counters) but must not register
//! further observers.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::RefCell;

use door_common::{AccessEvent, AccessToken, DoorConfig, DoorCore, DoorState, LockStart, UnlockStart};
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::watch::{Receiver, Watch};
use embassy_time::{Duration, Instant, Timer};
use log::{debug, info};

use crate::observers::ObserverList;
use crate::relock::RelockTimer;

/// Maximum number of concurrent [`DoorControl::state_receiver`]s.
pub const STATE_RECEIVERS: usize = 4;

/// Async receiver of the latest door state.
pub type StateReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, DoorState, STATE_RECEIVERS>;

/// Door access controller with token-gated unlock and auto-relock.
pub struct DoorControl {
    config: DoorConfig,
    core: BlockingMutex<CriticalSectionRawMutex, RefCell<DoorCore>>,
    observers: BlockingMutex<CriticalSectionRawMutex, RefCell<ObserverList>>,
    actuation: Mutex<CriticalSectionRawMutex, ()>,
    relock: RelockTimer,
    state_watch: Watch<CriticalSectionRawMutex, DoorState, STATE_RECEIVERS>,
}

impl DoorControl {
    /// A locked door with no tokens. `const` so a door can live in a `static`.
    pub const fn new(config: DoorConfig) -> Self {
        Self {
            config,
            core: BlockingMutex::new(RefCell::new(DoorCore::new())),
            observers: BlockingMutex::new(RefCell::new(ObserverList::new())),
            actuation: Mutex::new(()),
            relock: RelockTimer::new(),
            state_watch: Watch::new(),
        }
    }

    #[inline]
    pub const fn config(&self) -> &DoorConfig { &self.config }

    // =========================================================================
    // Tokens
    // =========================================================================

    /// Issue a token valid for `lifetime`.
    pub fn generate_token(
        &self,
        lifetime: Duration,
    ) -> AccessToken {
        let now = Instant::now();
        self.with_core(|core| core.generate_token(now, lifetime))
    }

    /// Revoke a token. Returns `false` for an unknown id. Logged either way.
    pub fn revoke_token(
        &self,
        token_id: &str,
    ) -> bool {
        let now = Instant::now();
        self.with_core(|core| core.revoke_token(token_id, now))
    }

    /// Tokens that could unlock the door right now.
    pub fn active_tokens(&self) -> Vec<AccessToken> {
        let now = Instant::now();
        self.with_core(|core| core.active_tokens(now))
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub fn state(&self) -> DoorState { self.with_core(|core| core.state()) }

    /// Unlock attempts denied for a bad token.
    pub fn failed_attempts(&self) -> u32 { self.with_core(|core| core.failed_attempts()) }

    /// Copy of the audit log, oldest entry first.
    pub fn log(&self) -> Vec<AccessEvent> { self.with_core(|core| core.log().entries().to_vec()) }

    /// Register a callback invoked with the new state on every transition.
    pub fn on_state_changed(
        &self,
        observer: impl Fn(DoorState) + Send + 'static,
    ) {
        self.observers
            .lock(|observers| observers.borrow_mut().register(Box::new(observer)));
    }

    /// Receiver that can await the next state change.
    ///
    /// Returns `None` once [`STATE_RECEIVERS`] receivers are alive.
    pub fn state_receiver(&self) -> Option<StateReceiver<'_>> { self.state_watch.receiver() }

    // =========================================================================
    // Actuation
    // =========================================================================

    /// Unlock with a token.
    ///
    /// Returns `true` once the door reached `Unlocked` and the auto-relock is
    /// armed. Returns `false` for a bad token (counted and logged as
    /// `Denied`), for a faulted door, or if a fault or manual override
    /// replaced `Unlocking` before the motor finished.
    pub async fn unlock_door(
        &self,
        token_id: &str,
    ) -> bool {
        let _actuation = self.actuation.lock().await;

        let start = self.transition(
            |core| core.begin_unlock(token_id, Instant::now()),
            |start| (*start == UnlockStart::Started).then_some(DoorState::Unlocking),
        );
        if start != UnlockStart::Started {
            return false;
        }

        Timer::after(self.config.actuation_delay).await;

        let finished = self.transition(DoorCore::finish_unlock, |generation| {
            generation.is_some().then_some(DoorState::Unlocked)
        });
        let Some(generation) = finished else {
            return false;
        };

        let deadline = Instant::now()
            .checked_add(self.config.auto_relock_after)
            .unwrap_or(Instant::MAX);
        self.relock.arm(generation, deadline);
        info!("door unlocked, auto-relock in {} ms", self.config.auto_relock_after.as_millis());
        true
    }

    /// Lock the door, cancelling any pending auto-relock.
    ///
    /// Returns `true` once the door reached `Locked`. A faulted door refuses
    /// (logged as `Lock/Failed`).
    pub async fn lock_door(&self) -> bool {
        let _actuation = self.actuation.lock().await;
        self.relock.cancel();
        self.run_lock(None).await
    }

    /// Auto-relock worker. Never returns; poll it for the door's lifetime.
    pub async fn run_auto_relock(&self) {
        loop {
            let generation = self.relock.elapsed().await;
            let _actuation = self.actuation.lock().await;
            debug!("auto-relock deadline reached (generation {generation})");

            if self.run_lock(Some(generation)).await {
                info!("door relocked automatically");
            }
        }
    }

    /// Release the door immediately from any state.
    ///
    /// Does not arm the auto-relock; a relock that is already pending stays
    /// pending.
    pub fn manual_override(&self) {
        let now = Instant::now();
        self.transition(|core| core.manual_override(now), |_| Some(DoorState::Unlocked));
    }

    /// Simulate a hardware fault. Cancels any pending auto-relock.
    pub fn trigger_fault(&self) {
        let now = Instant::now();
        self.transition(|core| core.trigger_fault(now), |_| Some(DoorState::Fault));
        self.relock.cancel();
    }

    /// Return a faulted door to `Locked`. Returns `false` if not faulted.
    pub fn reset_fault(&self) -> bool {
        let now = Instant::now();
        self.transition(|core| core.reset_fault(now), |reset| (*reset).then_some(DoorState::Locked))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Locking → Locked. The caller holds the actuation mutex.
    async fn run_lock(
        &self,
        relock_generation: Option<u32>,
    ) -> bool {
        let start = self.transition(
            |core| core.begin_lock(relock_generation, Instant::now()),
            |start| (*start == LockStart::Started).then_some(DoorState::Locking),
        );
        if start != LockStart::Started {
            return false;
        }

        Timer::after(self.config.actuation_delay).await;

        self.transition(
            |core| core.finish_lock(Instant::now()),
            |locked| (*locked).then_some(DoorState::Locked),
        )
    }

    fn with_core<R>(
        &self,
        f: impl FnOnce(&mut DoorCore) -> R,
    ) -> R {
        self.core.lock(|core| f(&mut core.borrow_mut()))
    }

    /// Apply `step` and, if `entered` reports a new state, broadcast it before
    /// leaving the critical section.
    ///
    /// The core borrow ends before observers run, so they can read the door.
    fn transition<R>(
        &self,
        step: impl FnOnce(&mut DoorCore) -> R,
        entered: impl FnOnce(&R) -> Option<DoorState>,
    ) -> R {
        self.core.lock(|core| {
            let outcome = step(&mut core.borrow_mut());
            if let Some(state) = entered(&outcome) {
                self.notify(state);
            }
            outcome
        })
    }

    fn notify(
        &self,
        state: DoorState,
    ) {
        debug!("door state -> {state}");
        self.state_watch.sender().send(state);
        self.observers.lock(|observers| observers.borrow().notify(state));
    }
}

impl Default for DoorControl {
    fn default() -> Self { Self::new(DoorConfig::DEFAULT) }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use core::future::Future;
    use std::sync::{Arc, Mutex as StdMutex};

    use door_common::{AccessAction, AccessResult};
    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_futures::select::{Either, select};

    use super::*;

    const ACTUATION_MS: u64 = 20;
    const RELOCK_MS: u64 = 200;
    const LIFETIME: Duration = Duration::from_secs(60);

    fn door() -> DoorControl { DoorControl::new(DoorConfig::from_millis(ACTUATION_MS, RELOCK_MS).unwrap()) }

    /// Drive `body` while the door's auto-relock worker runs alongside.
    fn run<F: Future>(
        door: &DoorControl,
        body: F,
    ) -> F::Output {
        block_on(async {
            match select(door.run_auto_relock(), body).await {
                Either::First(()) => unreachable!("auto-relock worker returned"),
                Either::Second(output) => output,
            }
        })
    }

    /// Record every state the door reports.
    fn record_states(door: &DoorControl) -> Arc<StdMutex<std::vec::Vec<DoorState>>> {
        let seen = Arc::new(StdMutex::new(std::vec::Vec::new()));
        let sink = Arc::clone(&seen);
        door.on_state_changed(move |state| sink.lock().unwrap().push(state));
        seen
    }

    fn entries(door: &DoorControl) -> std::vec::Vec<(AccessAction, AccessResult)> {
        door.log().iter().map(|e| (e.action, e.result)).collect()
    }

    // -------------------------------------------------------------------------
    // Unlock
    // -------------------------------------------------------------------------

    #[test]
    fn test_new_door_is_locked() {
        let door = door();
        assert_eq!(door.state(), DoorState::Locked);
        assert_eq!(door.failed_attempts(), 0);
        assert!(door.log().is_empty());
    }

    #[test]
    fn test_unlock_with_valid_token() {
        let door = door();
        let states = record_states(&door);
        let token = door.generate_token(LIFETIME);

        let unlocked = run(&door, door.unlock_door(token.id.as_str()));
        assert!(unlocked, "Valid token should unlock");
        assert_eq!(door.state(), DoorState::Unlocked);
        assert_eq!(*states.lock().unwrap(), [DoorState::Unlocking, DoorState::Unlocked]);

        let again = run(&door, door.unlock_door(token.id.as_str()));
        assert!(!again, "Token must be single-use");
        assert_eq!(door.failed_attempts(), 1);
    }

    #[test]
    fn test_unlock_takes_actuation_delay() {
        let door = door();
        let token = door.generate_token(LIFETIME);
        let start = Instant::now();

        assert!(run(&door, door.unlock_door(token.id.as_str())));
        assert!(start.elapsed() >= Duration::from_millis(ACTUATION_MS));
    }

    #[test]
    fn test_unlock_with_unknown_token() {
        let door = door();
        let states = record_states(&door);

        assert!(!run(&door, door.unlock_door("nonexistent")));
        assert_eq!(door.state(), DoorState::Locked);
        assert_eq!(door.failed_attempts(), 1);
        assert!(states.lock().unwrap().is_empty(), "Denied unlock must not notify");
        assert_eq!(entries(&door), [(AccessAction::Unlock, AccessResult::Denied)]);
    }

    #[test]
    fn test_queued_unlocks_run_one_after_another() {
        let door = door();
        let states = record_states(&door);
        let first = door.generate_token(LIFETIME);
        let second = door.generate_token(LIFETIME);

        let (a, b) = run(
            &door,
            join(door.unlock_door(first.id.as_str()), door.unlock_door(second.id.as_str())),
        );
        assert!(a && b, "Both queued unlocks should succeed");
        assert_eq!(
            *states.lock().unwrap(),
            [DoorState::Unlocking, DoorState::Unlocked, DoorState::Unlocking, DoorState::Unlocked],
            "Actuation sequences must not interleave"
        );
    }

    // -------------------------------------------------------------------------
    // Lock / Auto-Relock
    // -------------------------------------------------------------------------

    #[test]
    fn test_manual_lock() {
        let door = door();
        let states = record_states(&door);
        let token = door.generate_token(LIFETIME);

        let locked = run(&door, async {
            door.unlock_door(token.id.as_str()).await;
            door.lock_door().await
        });
        assert!(locked);
        assert_eq!(door.state(), DoorState::Locked);
        assert_eq!(
            *states.lock().unwrap(),
            [DoorState::Unlocking, DoorState::Unlocked, DoorState::Locking, DoorState::Locked]
        );
        assert_eq!(
            entries(&door),
            [
                (AccessAction::Unlock, AccessResult::Success),
                (AccessAction::Lock, AccessResult::Success),
            ]
        );
    }

    #[test]
    fn test_auto_relock_after_interval() {
        let door = door();
        let token = door.generate_token(LIFETIME);

        run(&door, async {
            assert!(door.unlock_door(token.id.as_str()).await);
            Timer::after_millis(RELOCK_MS / 2).await;
            assert_eq!(door.state(), DoorState::Unlocked, "Relock must not fire early");
            Timer::after_millis(RELOCK_MS / 2 + ACTUATION_MS + 80).await;
        });

        assert_eq!(door.state(), DoorState::Locked);
        assert_eq!(
            entries(&door),
            [
                (AccessAction::Unlock, AccessResult::Success),
                (AccessAction::Lock, AccessResult::Success),
            ]
        );
    }

    #[test]
    fn test_second_unlock_postpones_relock() {
        let door = door();
        let first = door.generate_token(LIFETIME);
        let second = door.generate_token(LIFETIME);

        run(&door, async {
            assert!(door.unlock_door(first.id.as_str()).await);
            Timer::after_millis(100).await;
            assert!(door.unlock_door(second.id.as_str()).await);

            // Past the first deadline, before the second
            Timer::after_millis(120).await;
            assert_eq!(door.state(), DoorState::Unlocked, "First relock should have been replaced");

            Timer::after_millis(RELOCK_MS).await;
        });

        assert_eq!(door.state(), DoorState::Locked);
        let locks = door.log().iter().filter(|e| e.action == AccessAction::Lock).count();
        assert_eq!(locks, 1, "Exactly one relock should run");
    }

    #[test]
    fn test_manual_lock_cancels_auto_relock() {
        let door = door();
        let token = door.generate_token(LIFETIME);

        run(&door, async {
            assert!(door.unlock_door(token.id.as_str()).await);
            assert!(door.lock_door().await);
            Timer::after_millis(RELOCK_MS + ACTUATION_MS + 80).await;
        });

        let locks = door.log().iter().filter(|e| e.action == AccessAction::Lock).count();
        assert_eq!(locks, 1, "Cancelled relock must not lock again");
    }

    #[test]
    fn test_auto_relock_survives_worker_restart() {
        let door = door();
        let token = door.generate_token(LIFETIME);

        // The worker future is dropped when this call returns
        assert!(run(&door, door.unlock_door(token.id.as_str())));

        run(&door, Timer::after_millis(RELOCK_MS + ACTUATION_MS + 80));
        assert_eq!(door.state(), DoorState::Locked, "Restarted worker must still relock");
    }

    // -------------------------------------------------------------------------
    // Fault / Override
    // -------------------------------------------------------------------------

    #[test]
    fn test_fault_cancels_pending_relock() {
        let door = door();
        let states = record_states(&door);
        let token = door.generate_token(LIFETIME);

        run(&door, async {
            assert!(door.unlock_door(token.id.as_str()).await);
            door.trigger_fault();
            Timer::after_millis(RELOCK_MS + ACTUATION_MS + 80).await;
        });

        assert_eq!(door.state(), DoorState::Fault, "Fault must be sticky");
        assert_eq!(states.lock().unwrap().last(), Some(&DoorState::Fault));
        assert_eq!(
            entries(&door),
            [
                (AccessAction::Unlock, AccessResult::Success),
                (AccessAction::Fault, AccessResult::SystemError),
            ]
        );
    }

    #[test]
    fn test_fault_during_unlock_actuation() {
        let door = door();
        let token = door.generate_token(LIFETIME);

        let (unlocked, ()) = run(
            &door,
            join(door.unlock_door(token.id.as_str()), async {
                Timer::after_millis(ACTUATION_MS / 2).await;
                door.trigger_fault();
            }),
        );

        assert!(!unlocked, "Interrupted unlock should report failure");
        assert_eq!(door.state(), DoorState::Fault);
    }

    #[test]
    fn test_faulted_door_refuses_motor_actions() {
        let door = door();
        let token = door.generate_token(LIFETIME);
        door.trigger_fault();

        let (unlocked, locked) = run(&door, async {
            (door.unlock_door(token.id.as_str()).await, door.lock_door().await)
        });

        assert!(!unlocked && !locked);
        assert_eq!(door.state(), DoorState::Fault);
        assert_eq!(door.failed_attempts(), 0, "Valid token is not a failed attempt");
        assert_eq!(door.active_tokens().len(), 1, "Token must not be consumed");
        assert_eq!(
            entries(&door),
            [
                (AccessAction::Fault, AccessResult::SystemError),
                (AccessAction::Unlock, AccessResult::Failed),
                (AccessAction::Lock, AccessResult::Failed),
            ]
        );
    }

    #[test]
    fn test_reset_fault_returns_to_locked() {
        let door = door();
        let states = record_states(&door);

        assert!(!door.reset_fault(), "Nothing to reset");
        door.trigger_fault();
        assert!(door.reset_fault());
        assert_eq!(door.state(), DoorState::Locked);
        assert_eq!(*states.lock().unwrap(), [DoorState::Fault, DoorState::Locked]);

        let token = door.generate_token(LIFETIME);
        assert!(run(&door, door.unlock_door(token.id.as_str())), "Door works again after reset");
    }

    #[test]
    fn test_manual_override_is_immediate() {
        let door = door();
        let states = record_states(&door);

        door.manual_override();
        assert_eq!(door.state(), DoorState::Unlocked);
        assert_eq!(*states.lock().unwrap(), [DoorState::Unlocked]);
        assert_eq!(entries(&door), [(AccessAction::ManualOverride, AccessResult::Unlocked)]);
    }

    // -------------------------------------------------------------------------
    // Tokens
    // -------------------------------------------------------------------------

    #[test]
    fn test_revoke_token() {
        let door = door();
        let token = door.generate_token(LIFETIME);

        assert!(door.revoke_token(token.id.as_str()));
        assert!(door.active_tokens().is_empty());
        assert!(!door.revoke_token(token.id.as_str()));
        assert!(!run(&door, door.unlock_door(token.id.as_str())), "Revoked token must not unlock");
    }

    #[test]
    fn test_active_tokens_exclude_used() {
        let door = door();
        let first = door.generate_token(LIFETIME);
        let second = door.generate_token(LIFETIME);

        assert!(run(&door, door.unlock_door(first.id.as_str())));
        let active = door.active_tokens();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);
    }

    // -------------------------------------------------------------------------
    // Notifications / Log
    // -------------------------------------------------------------------------

    #[test]
    fn test_observers_called_in_registration_order() {
        let door = door();
        let calls = Arc::new(StdMutex::new(std::vec::Vec::new()));
        for tag in [1u8, 2, 3] {
            let calls = Arc::clone(&calls);
            door.on_state_changed(move |state| calls.lock().unwrap().push((tag, state)));
        }

        door.trigger_fault();
        assert_eq!(
            *calls.lock().unwrap(),
            [(1, DoorState::Fault), (2, DoorState::Fault), (3, DoorState::Fault)]
        );
    }

    #[test]
    fn test_concurrent_transitions_notify_in_order() {
        let door = door();
        let mut receiver = door.state_receiver().expect("receiver slot");
        let last = Arc::new(StdMutex::new(None));
        let sink = Arc::clone(&last);
        door.on_state_changed(move |state| *sink.lock().unwrap() = Some(state));

        for round in 0..1000 {
            std::thread::scope(|scope| {
                scope.spawn(|| door.manual_override());
                scope.spawn(|| door.trigger_fault());
            });

            let state = door.state();
            assert_eq!(*last.lock().unwrap(), Some(state), "Observer out of order in round {round}");
            assert_eq!(receiver.try_get(), Some(state), "Receiver out of order in round {round}");
        }
    }

    #[test]
    fn test_state_receiver_sees_latest_state() {
        let door = door();
        let mut receiver = door.state_receiver().expect("receiver slot");
        let token = door.generate_token(LIFETIME);

        assert!(run(&door, door.unlock_door(token.id.as_str())));
        assert_eq!(receiver.try_changed(), Some(DoorState::Unlocked));
        assert_eq!(receiver.try_changed(), None, "No change since last read");
    }

    #[test]
    fn test_log_is_chronological() {
        let door = door();
        let token = door.generate_token(LIFETIME);

        run(&door, async {
            door.unlock_door("bad-id").await;
            door.unlock_door(token.id.as_str()).await;
            door.revoke_token(token.id.as_str());
            door.manual_override();
            door.lock_door().await;
            door.trigger_fault();
        });

        assert_eq!(
            entries(&door),
            [
                (AccessAction::Unlock, AccessResult::Denied),
                (AccessAction::Unlock, AccessResult::Success),
                (AccessAction::RevokeToken, AccessResult::Success),
                (AccessAction::ManualOverride, AccessResult::Unlocked),
                (AccessAction::Lock, AccessResult::Success),
                (AccessAction::Fault, AccessResult::SystemError),
            ]
        );
        let log = door.log();
        assert!(
            log.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp),
            "Timestamps must never go backwards"
        );
    }
}
