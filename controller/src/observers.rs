//! State-change observers.
//!
//! Callbacks are invoked synchronously, in registration order, with the new
//! [`DoorState`] on every transition.

use alloc::boxed::Box;
use alloc::vec::Vec;

use door_common::DoorState;

/// Boxed state-change callback.
pub type StateObserver = Box<dyn Fn(DoorState) + Send>;

/// Registered callbacks in registration order.
#[derive(Default)]
pub struct ObserverList {
    observers: Vec<StateObserver>,
}

impl ObserverList {
    pub const fn new() -> Self { Self { observers: Vec::new() } }

    pub fn register(
        &mut self,
        observer: StateObserver,
    ) {
        self.observers.push(observer);
    }

    /// Call every observer with `state`.
    pub fn notify(
        &self,
        state: DoorState,
    ) {
        for observer in &self.observers {
            observer(state);
        }
    }

    #[inline]
    pub fn len(&self) -> usize { self.observers.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.observers.is_empty() }
}
