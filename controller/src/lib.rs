//! Async door access controller.
//!
//! Builds on the synchronous state machine in `door-common` and adds time:
//!
//! - [`controller`]: [`DoorControl`], actuation delays and notifications
//! - [`relock`]: The cancellable auto-relock deadline
//! - [`observers`]: State-change callbacks
//!
//! Only `embassy-sync` and `embassy-time` primitives are used, so the
//! controller runs under any executor that provides an embassy time driver.
//!
//! # Testing
//!
//! ```bash
//! cargo test -p door-controller
//! ```
//!
//! Tests link the `embassy-time` std driver and drive futures with
//! `embassy_futures::block_on`, so timings are real wall-clock milliseconds.

// Use no_std only when NOT testing (tests need std for the test harness)
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod controller;
pub mod observers;
pub mod relock;

pub use controller::{DoorControl, STATE_RECEIVERS, StateReceiver};
pub use observers::{ObserverList, StateObserver};
pub use relock::RelockTimer;
