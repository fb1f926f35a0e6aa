//! Access tokens: time-bounded, single-use unlock credentials.
//!
//! A token is valid while it is unused and the clock has not passed its
//! expiry. Validity is always computed from the current time, never stored.
//!
//! Token ids are 16 lowercase hex characters produced by running the
//! registry's issue counter through a bijective mixer, so ids are unique
//! per registry without needing a random source on embedded targets.

use core::fmt::{self, Write};

use embassy_time::{Duration, Instant};
use heapless::String;

/// Length of a token id in characters.
pub const TOKEN_ID_LEN: usize = 16;

// =============================================================================
// Token Id
// =============================================================================

/// Opaque token identifier.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TokenId(String<TOKEN_ID_LEN>);

impl TokenId {
    /// Render a mixed 64-bit value as a token id.
    pub(crate) fn from_raw(raw: u64) -> Self {
        let mut id: String<TOKEN_ID_LEN> = String::new();
        // 16 hex digits always fit
        let _ = write!(id, "{raw:016x}");
        Self(id)
    }

    #[inline]
    pub fn as_str(&self) -> &str { self.0.as_str() }
}

impl fmt::Display for TokenId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<str> for TokenId {
    fn eq(
        &self,
        other: &str,
    ) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for TokenId {
    fn eq(
        &self,
        other: &&str,
    ) -> bool {
        self.as_str() == *other
    }
}

/// SplitMix64 finalizer. A bijection on `u64`, so distinct inputs give
/// distinct ids.
pub(crate) const fn mix64(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

// =============================================================================
// Access Token
// =============================================================================

/// A single-use credential authorizing one unlock.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AccessToken {
    /// Unique id handed to the holder.
    pub id: TokenId,
    /// Moment the registry created the token.
    pub issued_at: Instant,
    /// Last instant at which the token is still accepted.
    pub expires_at: Instant,
    /// Set once a successful unlock consumed the token.
    pub used: bool,
}

impl AccessToken {
    /// Create an unused token valid for `lifetime` from `issued_at`.
    ///
    /// Lifetimes that overflow the clock saturate to [`Instant::MAX`].
    pub fn new(
        id: TokenId,
        issued_at: Instant,
        lifetime: Duration,
    ) -> Self {
        Self {
            id,
            issued_at,
            expires_at: issued_at.checked_add(lifetime).unwrap_or(Instant::MAX),
            used: false,
        }
    }

    /// Unused and not yet past its expiry at `now`.
    #[inline]
    pub fn is_valid_at(
        &self,
        now: Instant,
    ) -> bool {
        !self.used && now <= self.expires_at
    }

    /// True once `now` is past the expiry.
    #[inline]
    pub fn is_expired_at(
        &self,
        now: Instant,
    ) -> bool {
        now > self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining_at(
        &self,
        now: Instant,
    ) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

impl fmt::Display for AccessToken {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "Token[{}] Expires: {}ms, Used: {}",
            self.id,
            self.expires_at.as_millis(),
            self.used
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
