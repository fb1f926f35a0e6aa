//! Token registry: issues, validates, consumes and revokes access tokens.
//!
//! Tokens are kept in issue order. Expired tokens stay stored until they are
//! revoked; they simply stop showing up in [`TokenRegistry::list_active_at`]
//! and fail validation.
//!
//! Every time-dependent operation has an `_at` form that takes the clock
//! reading explicitly. The short forms read `embassy_time::Instant::now()`.

use alloc::vec::Vec;

use embassy_time::{Duration, Instant};

use crate::token::{AccessToken, TokenId, mix64};

/// Registry failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No stored token carries this id.
    #[error("token {0} not found")]
    NotFound(TokenId),
}

/// Outstanding access tokens, in issue order.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    tokens: Vec<AccessToken>,
    issued: u32,
}

impl TokenRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            tokens: Vec::new(),
            issued: 0,
        }
    }

    // -------------------------------------------------------------------------
    // Issue / Revoke
    // -------------------------------------------------------------------------

    /// Issue a token valid for `lifetime` from now.
    pub fn issue(
        &mut self,
        lifetime: Duration,
    ) -> AccessToken {
        self.issue_at(Instant::now(), lifetime)
    }

    /// Issue a token valid for `lifetime` from `now`. Always succeeds.
    pub fn issue_at(
        &mut self,
        now: Instant,
        lifetime: Duration,
    ) -> AccessToken {
        // Low half is the issue counter, so ids stay unique for 2^32 issues
        let raw = ((now.as_ticks() & 0xffff_ffff) << 32) | u64::from(self.issued);
        self.issued = self.issued.wrapping_add(1);

        let token = AccessToken::new(TokenId::from_raw(mix64(raw)), now, lifetime);
        self.tokens.push(token.clone());
        token
    }

    /// Remove a token. Returns `false` if no token had this id.
    pub fn revoke(
        &mut self,
        id: &str,
    ) -> bool {
        match self.position(id) {
            Some(index) => {
                self.tokens.remove(index);
                true
            }
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// The token with this id if it is currently valid.
    pub fn validate(
        &self,
        id: &str,
    ) -> Option<&AccessToken> {
        self.validate_at(id, Instant::now())
    }

    /// The token with this id if it is present, unused and unexpired at `now`.
    pub fn validate_at(
        &self,
        id: &str,
        now: Instant,
    ) -> Option<&AccessToken> {
        self.get(id).filter(|token| token.is_valid_at(now))
    }

    /// Copies of all currently valid tokens.
    pub fn list_active(&self) -> Vec<AccessToken> { self.list_active_at(Instant::now()) }

    /// Copies of all tokens valid at `now`, in issue order.
    pub fn list_active_at(
        &self,
        now: Instant,
    ) -> Vec<AccessToken> {
        self.tokens
            .iter()
            .filter(|token| token.is_valid_at(now))
            .cloned()
            .collect()
    }

    /// Stored token by id, valid or not.
    pub fn get(
        &self,
        id: &str,
    ) -> Option<&AccessToken> {
        self.tokens.iter().find(|token| token.id == id)
    }

    // -------------------------------------------------------------------------
    // Consume
    // -------------------------------------------------------------------------

    /// Mark a token as consumed.
    ///
    /// The caller is expected to have validated the id first; an unknown id
    /// is reported as [`RegistryError::NotFound`].
    pub fn mark_used(
        &mut self,
        id: &TokenId,
    ) -> Result<(), RegistryError> {
        let index = self
            .position(id.as_str())
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        self.tokens[index].used = true;
        Ok(())
    }

    /// Number of stored tokens, including used and expired ones.
    #[inline]
    pub fn len(&self) -> usize { self.tokens.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.tokens.is_empty() }

    fn position(
        &self,
        id: &str,
    ) -> Option<usize> {
        self.tokens.iter().position(|token| token.id == id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
