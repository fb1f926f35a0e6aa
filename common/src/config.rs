//! Door timing configuration.
//!
//! Compile-time defaults live here as `const` values with build-time
//! assertions. A runtime
//! [`DoorConfig`] carries the values actually used by a door instance so the
//! simulator and tests can shorten the delays.
//!
//! # Compile-Time Validation
//!
//! The defaults are checked with `const` assertions. If someone sets the
//! relock interval shorter than the actuation delay, the build fails.

use embassy_time::Duration;

// =============================================================================
// Actuation Timing
// =============================================================================

/// Time the door motor needs to travel between latched and released.
/// Applies to both `Unlocking` and `Locking`.
pub const DEFAULT_ACTUATION_DELAY: Duration = Duration::from_millis(700);

/// Upper bound for a configured actuation delay.
/// A motor that takes longer than this is treated as a misconfiguration.
pub const MAX_ACTUATION_DELAY: Duration = Duration::from_secs(10);

const _: () = assert!(DEFAULT_ACTUATION_DELAY.as_ticks() > 0);
const _: () = assert!(DEFAULT_ACTUATION_DELAY.as_ticks() <= MAX_ACTUATION_DELAY.as_ticks());

// =============================================================================
// Auto-Relock Timing
// =============================================================================

/// Interval after a successful unlock before the door locks itself again.
pub const DEFAULT_AUTO_RELOCK: Duration = Duration::from_secs(5);

const _: () = assert!(DEFAULT_ACTUATION_DELAY.as_ticks() < DEFAULT_AUTO_RELOCK.as_ticks());

// =============================================================================
// Token Defaults
// =============================================================================

/// Lifetime used by front-ends that generate a token without asking for one.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(60);

/// Characters kept from a caller-supplied token id in an audit entry.
/// Longer ids are truncated so audit entries stay fixed-size.
pub const EVENT_TOKEN_LEN: usize = 40;

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Rejected [`DoorConfig`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The actuation delay must be non-zero.
    #[error("actuation delay must be greater than zero")]
    ZeroActuationDelay,

    /// The actuation delay exceeds [`MAX_ACTUATION_DELAY`].
    #[error("actuation delay of {requested_ms} ms exceeds the {max_ms} ms limit")]
    ActuationDelayTooLong { requested_ms: u64, max_ms: u64 },

    /// The door would try to relock before it finished unlocking.
    #[error("auto-relock interval ({relock_ms} ms) must be longer than the actuation delay ({actuation_ms} ms)")]
    RelockNotAfterActuation { relock_ms: u64, actuation_ms: u64 },
}

/// Timing used by one door instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorConfig {
    /// Motor travel time for each `Unlocking`/`Locking` phase.
    pub actuation_delay: Duration,
    /// Delay between reaching `Unlocked` and the automatic lock.
    pub auto_relock_after: Duration,
}

impl DoorConfig {
    /// Factory timing (700 ms actuation, 5 s auto-relock).
    pub const DEFAULT: Self = Self {
        actuation_delay: DEFAULT_ACTUATION_DELAY,
        auto_relock_after: DEFAULT_AUTO_RELOCK,
    };

    /// Build a validated configuration.
    pub fn new(
        actuation_delay: Duration,
        auto_relock_after: Duration,
    ) -> Result<Self, ConfigError> {
        if actuation_delay.as_ticks() == 0 {
            return Err(ConfigError::ZeroActuationDelay);
        }
        if actuation_delay > MAX_ACTUATION_DELAY {
            return Err(ConfigError::ActuationDelayTooLong {
                requested_ms: actuation_delay.as_millis(),
                max_ms: MAX_ACTUATION_DELAY.as_millis(),
            });
        }
        if auto_relock_after <= actuation_delay {
            return Err(ConfigError::RelockNotAfterActuation {
                relock_ms: auto_relock_after.as_millis(),
                actuation_ms: actuation_delay.as_millis(),
            });
        }

        Ok(Self {
            actuation_delay,
            auto_relock_after,
        })
    }

    /// Same as [`DoorConfig::new`], taking milliseconds.
    pub fn from_millis(
        actuation_ms: u64,
        relock_ms: u64,
    ) -> Result<Self, ConfigError> {
        Self::new(Duration::from_millis(actuation_ms), Duration::from_millis(relock_ms))
    }
}

impl Default for DoorConfig {
    fn default() -> Self { Self::DEFAULT }
}

// =============================================================================
// Unit Tests
// =============================================================================
