//! Audit log of attempted door actions.
//!
//! Every action a caller attempts, successful or not, appends one
//! [`AccessEvent`]. Entries are never modified or removed, so insertion
//! order is chronological order.
//!
//! # Display Format
//!
//! ```text
//!    12.700s | Token: 3f9c0d41a2b7e655 | Action: Unlock | Result: Success
//!    18.402s | Token: N/A | Action: Lock | Result: Success
//! ```

use alloc::vec::Vec;
use core::fmt;

use embassy_time::Instant;
use heapless::String;

use crate::config::EVENT_TOKEN_LEN;

/// Placeholder shown for entries not tied to a token.
pub const NO_TOKEN: &str = "N/A";

// =============================================================================
// Action / Result
// =============================================================================

/// What the caller attempted.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AccessAction {
    Unlock,
    Lock,
    ManualOverride,
    Fault,
    RevokeToken,
    ResetFault,
}

impl AccessAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unlock => "Unlock",
            Self::Lock => "Lock",
            Self::ManualOverride => "ManualOverride",
            Self::Fault => "Fault",
            Self::RevokeToken => "RevokeToken",
            Self::ResetFault => "ResetFault",
        }
    }
}

/// How the attempt ended.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AccessResult {
    /// The action completed.
    Success,
    /// The presented token was absent, used or expired.
    Denied,
    /// The action was refused or interrupted for a reason other than the token.
    Failed,
    /// Hardware fault raised.
    SystemError,
    /// Door released by the manual override.
    Unlocked,
}

impl AccessResult {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Denied => "Denied",
            Self::Failed => "Failed",
            Self::SystemError => "SystemError",
            Self::Unlocked => "Unlocked",
        }
    }
}

impl fmt::Display for AccessAction {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for AccessResult {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Access Event
// =============================================================================

/// One immutable audit entry.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AccessEvent {
    token: Option<String<EVENT_TOKEN_LEN>>,
    /// Attempted action.
    pub action: AccessAction,
    /// Outcome.
    pub result: AccessResult,
    /// When the entry was appended.
    pub timestamp: Instant,
}

impl AccessEvent {
    /// Entry for an action tied to a token id.
    ///
    /// The id is stored as given by the caller, truncated to `EVENT_TOKEN_LEN`
    /// characters, since denied attempts may carry arbitrary strings.
    pub fn with_token(
        token: &str,
        action: AccessAction,
        result: AccessResult,
        timestamp: Instant,
    ) -> Self {
        let mut stored: String<EVENT_TOKEN_LEN> = String::new();
        for c in token.chars() {
            if stored.push(c).is_err() {
                break;
            }
        }
        Self {
            token: Some(stored),
            action,
            result,
            timestamp,
        }
    }

    /// Entry for an action not tied to a token.
    pub const fn without_token(
        action: AccessAction,
        result: AccessResult,
        timestamp: Instant,
    ) -> Self {
        Self {
            token: None,
            action,
            result,
            timestamp,
        }
    }

    /// Token id recorded with the entry, if any.
    pub fn token(&self) -> Option<&str> { self.token.as_ref().map(|t| t.as_str()) }
}

impl fmt::Display for AccessEvent {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let ms = self.timestamp.as_millis();
        write!(
            f,
            "{:>6}.{:03}s | Token: {} | Action: {} | Result: {}",
            ms / 1000,
            ms % 1000,
            self.token().unwrap_or(NO_TOKEN),
            self.action,
            self.result
        )
    }
}

// =============================================================================
// Access Log
// =============================================================================

/// Append-only sequence of [`AccessEvent`]s.
#[derive(Debug, Default)]
pub struct AccessLog {
    entries: Vec<AccessEvent>,
}

impl AccessLog {
    pub const fn new() -> Self { Self { entries: Vec::new() } }

    /// Append an entry at the end.
    pub fn push(
        &mut self,
        event: AccessEvent,
    ) {
        self.entries.push(event);
    }

    /// All entries, oldest first.
    #[inline]
    pub fn entries(&self) -> &[AccessEvent] { &self.entries }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &AccessEvent> { self.entries.iter() }

    #[inline]
    pub fn last(&self) -> Option<&AccessEvent> { self.entries.last() }

    #[inline]
    pub fn len(&self) -> usize { self.entries.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

// =============================================================================
// Unit Tests
// =============================================================================
