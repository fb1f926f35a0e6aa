//! Door access types and state machine core for the EV dashboard.
//!
//! This crate contains the platform-agnostic part of the door subsystem,
//! shared between the async controller and the desktop simulator:
//!
//! - [`config`]: Timing defaults and the runtime [`DoorConfig`]
//! - [`state`]: The [`DoorState`] enum
//! - [`token`]: Access tokens and their validity rule
//! - [`registry`]: The token registry (issue, validate, consume, revoke)
//! - [`event`]: Audit entries and the append-only access log
//! - [`door`]: [`DoorCore`], the synchronous state machine
//!
//! # no_std Compatibility
//!
//! This crate is `no_std` (with `alloc`) outside of tests and only uses
//! `embassy_time` types for time, so it builds for embedded targets. Host
//! tests link the `embassy-time` std driver.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod door;
pub mod event;
pub mod registry;
pub mod state;
pub mod token;

// Re-export commonly used items
pub use config::{ConfigError, DoorConfig};
pub use door::{DoorCore, LockStart, UnlockStart};
pub use event::{AccessAction, AccessEvent, AccessLog, AccessResult};
pub use registry::{RegistryError, TokenRegistry};
pub use state::DoorState;
pub use token::{AccessToken, TokenId};
