//! Synchronous core of the door state machine.
//!
//! [`DoorCore`] owns the door state, the token registry, the audit log, the
//! failed-attempt counter and the auto-relock generation. It has no notion of
//! waiting: every actuation is split into a `begin_*` step (validate, log,
//! enter the moving state) and a `finish_*` step (land in the resting state)
//! that the async controller calls around its actuation delay.
//!
//! Each step applies its transition and its audit entry together, so a caller
//! that holds the core behind a single lock gets log entries in exactly the
//! order the transitions happened.
//!
//! # Auto-Relock Generation
//!
//! Arming or cancelling the auto-relock bumps a generation counter. A relock
//! timer carries the generation it was armed with; when it elapses, the lock
//! only proceeds if that generation is still current. Faults and manual locks
//! bump the counter, so a stale timer can never lock a faulted door.

use alloc::vec::Vec;

use embassy_time::{Duration, Instant};
use log::{debug, error, info, warn};

use crate::event::{AccessAction, AccessEvent, AccessLog, AccessResult};
use crate::registry::TokenRegistry;
use crate::state::DoorState;
use crate::token::AccessToken;

// =============================================================================
// Step Outcomes
// =============================================================================

/// Result of [`DoorCore::begin_unlock`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[must_use]
pub enum UnlockStart {
    /// Token consumed, door now `Unlocking`.
    Started,
    /// Token absent, used or expired. Counted as a failed attempt.
    Denied,
    /// Token valid but the door is faulted. Token left unused.
    Faulted,
    /// Registry refused to consume a token it had just validated.
    Failed,
}

/// Result of [`DoorCore::begin_lock`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[must_use]
pub enum LockStart {
    /// Door now `Locking`.
    Started,
    /// Door is faulted, nothing moved.
    Faulted,
    /// The relock timer that asked for this lock has been replaced or cancelled.
    Superseded,
}

// =============================================================================
// Door Core
// =============================================================================

/// Door state, tokens and audit log behind one owner.
#[derive(Debug, Default)]
pub struct DoorCore {
    state: DoorState,
    registry: TokenRegistry,
    log: AccessLog,
    failed_attempts: u32,
    relock_generation: u32,
}

impl DoorCore {
    /// A locked door with no tokens and an empty log.
    pub const fn new() -> Self {
        Self {
            state: DoorState::Locked,
            registry: TokenRegistry::new(),
            log: AccessLog::new(),
            failed_attempts: 0,
            relock_generation: 0,
        }
    }

    #[inline]
    pub const fn state(&self) -> DoorState { self.state }

    /// Unlock attempts denied for a bad token.
    #[inline]
    pub const fn failed_attempts(&self) -> u32 { self.failed_attempts }

    #[inline]
    pub const fn log(&self) -> &AccessLog { &self.log }

    #[inline]
    pub const fn registry(&self) -> &TokenRegistry { &self.registry }

    /// Generation a relock timer must carry to be honoured.
    #[inline]
    pub const fn relock_generation(&self) -> u32 { self.relock_generation }

    // -------------------------------------------------------------------------
    // Tokens
    // -------------------------------------------------------------------------

    /// Issue a token through the registry. Not logged.
    pub fn generate_token(
        &mut self,
        now: Instant,
        lifetime: Duration,
    ) -> AccessToken {
        let token = self.registry.issue_at(now, lifetime);
        debug!("issued token {} valid for {} ms", token.id, lifetime.as_millis());
        token
    }

    /// Revoke a token and log the outcome.
    pub fn revoke_token(
        &mut self,
        id: &str,
        now: Instant,
    ) -> bool {
        let removed = self.registry.revoke(id);
        let result = if removed {
            info!("token {id} revoked");
            AccessResult::Success
        } else {
            warn!("revoke requested for unknown token {id}");
            AccessResult::Failed
        };
        self.log
            .push(AccessEvent::with_token(id, AccessAction::RevokeToken, result, now));
        removed
    }

    /// Tokens that could unlock the door at `now`.
    pub fn active_tokens(
        &self,
        now: Instant,
    ) -> Vec<AccessToken> {
        self.registry.list_active_at(now)
    }

    // -------------------------------------------------------------------------
    // Unlock
    // -------------------------------------------------------------------------

    /// Validate `id` and, if accepted, consume it and enter `Unlocking`.
    ///
    /// A bad token is counted and logged as `Denied` in any state. A valid
    /// token presented to a faulted door is logged as `Failed` and not
    /// consumed.
    pub fn begin_unlock(
        &mut self,
        id: &str,
        now: Instant,
    ) -> UnlockStart {
        let Some(token) = self.registry.validate_at(id, now) else {
            self.failed_attempts = self.failed_attempts.saturating_add(1);
            warn!("unlock denied for token {id} ({} failed attempts)", self.failed_attempts);
            self.log
                .push(AccessEvent::with_token(id, AccessAction::Unlock, AccessResult::Denied, now));
            return UnlockStart::Denied;
        };

        if self.state.is_fault() {
            warn!("unlock refused, door is faulted");
            self.log
                .push(AccessEvent::with_token(id, AccessAction::Unlock, AccessResult::Failed, now));
            return UnlockStart::Faulted;
        }

        let token_id = token.id.clone();
        if let Err(err) = self.registry.mark_used(&token_id) {
            error!("validated token could not be consumed: {err}");
            self.log
                .push(AccessEvent::with_token(id, AccessAction::Unlock, AccessResult::Failed, now));
            return UnlockStart::Failed;
        }

        self.log
            .push(AccessEvent::with_token(id, AccessAction::Unlock, AccessResult::Success, now));
        self.state = DoorState::Unlocking;
        UnlockStart::Started
    }

    /// Land in `Unlocked` after the actuation delay and arm a new relock
    /// generation.
    ///
    /// Returns the generation the relock timer must carry, or `None` if the
    /// door left `Unlocking` in the meantime (fault or manual override). In
    /// that case nothing changes.
    pub fn finish_unlock(&mut self) -> Option<u32> {
        if self.state != DoorState::Unlocking {
            warn!("unlock interrupted, door is {}", self.state);
            return None;
        }
        self.state = DoorState::Unlocked;
        Some(self.bump_relock_generation())
    }

    // -------------------------------------------------------------------------
    // Lock
    // -------------------------------------------------------------------------

    /// Enter `Locking`.
    ///
    /// `relock_generation` is `Some` when an auto-relock timer asks for the
    /// lock; the request is dropped silently if that generation is no longer
    /// current. Manual locks pass `None`. Starting a lock cancels any pending
    /// auto-relock.
    pub fn begin_lock(
        &mut self,
        relock_generation: Option<u32>,
        now: Instant,
    ) -> LockStart {
        if let Some(generation) = relock_generation
            && generation != self.relock_generation
        {
            debug!("stale auto-relock generation {generation} ignored");
            return LockStart::Superseded;
        }

        if self.state.is_fault() {
            warn!("lock refused, door is faulted");
            self.log
                .push(AccessEvent::without_token(AccessAction::Lock, AccessResult::Failed, now));
            return LockStart::Faulted;
        }

        self.bump_relock_generation();
        self.state = DoorState::Locking;
        LockStart::Started
    }

    /// Land in `Locked` after the actuation delay and log the lock.
    ///
    /// Returns `false` without changing anything if the door left `Locking`
    /// in the meantime.
    pub fn finish_lock(
        &mut self,
        now: Instant,
    ) -> bool {
        if self.state != DoorState::Locking {
            warn!("lock interrupted, door is {}", self.state);
            return false;
        }
        self.state = DoorState::Locked;
        self.log
            .push(AccessEvent::without_token(AccessAction::Lock, AccessResult::Success, now));
        true
    }

    // -------------------------------------------------------------------------
    // Override / Fault
    // -------------------------------------------------------------------------

    /// Release the door immediately, from any state.
    pub fn manual_override(
        &mut self,
        now: Instant,
    ) {
        info!("manual override from {}", self.state);
        self.state = DoorState::Unlocked;
        self.log.push(AccessEvent::without_token(
            AccessAction::ManualOverride,
            AccessResult::Unlocked,
            now,
        ));
    }

    /// Enter `Fault` and cancel any pending auto-relock.
    pub fn trigger_fault(
        &mut self,
        now: Instant,
    ) {
        error!("door fault raised in state {}", self.state);
        self.state = DoorState::Fault;
        self.bump_relock_generation();
        self.log
            .push(AccessEvent::without_token(AccessAction::Fault, AccessResult::SystemError, now));
    }

    /// Leave `Fault` for `Locked`. Logged as `Failed` when not faulted.
    pub fn reset_fault(
        &mut self,
        now: Instant,
    ) -> bool {
        if !self.state.is_fault() {
            warn!("fault reset requested while {}", self.state);
            self.log
                .push(AccessEvent::without_token(AccessAction::ResetFault, AccessResult::Failed, now));
            return false;
        }
        info!("fault cleared, door locked");
        self.state = DoorState::Locked;
        self.log
            .push(AccessEvent::without_token(AccessAction::ResetFault, AccessResult::Success, now));
        true
    }

    fn bump_relock_generation(&mut self) -> u32 {
        self.relock_generation = self.relock_generation.wrapping_add(1);
        self.relock_generation
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
