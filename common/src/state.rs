//! Door lifecycle states.
//!
//! # States
//!
//! - [`DoorState::Locked`]: Latched, the initial state
//! - [`DoorState::Unlocking`]: Motor releasing the latch
//! - [`DoorState::Unlocked`]: Released, auto-relock may be pending
//! - [`DoorState::Locking`]: Motor driving the latch home
//! - [`DoorState::Fault`]: Simulated hardware failure, motor actions refused

use core::fmt;

/// Current position of the door latch.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub enum DoorState {
    /// Latched. Every door starts here.
    #[default]
    Locked,

    /// Actuation in progress towards `Unlocked`.
    Unlocking,

    /// Released.
    Unlocked,

    /// Actuation in progress towards `Locked`.
    Locking,

    /// Hardware fault. Only a fault reset or the manual override leaves it.
    Fault,
}

impl DoorState {
    /// Name used in audit output and on status lines.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Locked => "Locked",
            Self::Unlocking => "Unlocking",
            Self::Unlocked => "Unlocked",
            Self::Locking => "Locking",
            Self::Fault => "Fault",
        }
    }

    /// True while the motor is moving.
    #[inline]
    pub const fn is_moving(self) -> bool { matches!(self, Self::Unlocking | Self::Locking) }

    #[inline]
    pub const fn is_fault(self) -> bool { matches!(self, Self::Fault) }
}

impl fmt::Display for DoorState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_default() {
        assert_eq!(DoorState::default(), DoorState::Locked);
    }

    #[test]
    fn test_moving_states() {
        assert!(DoorState::Unlocking.is_moving());
        assert!(DoorState::Locking.is_moving());
        assert!(!DoorState::Locked.is_moving());
        assert!(!DoorState::Unlocked.is_moving());
        assert!(!DoorState::Fault.is_moving());
    }

    #[test]
    fn test_display_matches_name() {
        assert_eq!(std::format!("{}", DoorState::Unlocking), "Unlocking");
        assert_eq!(DoorState::Fault.as_str(), "Fault");
    }
}
