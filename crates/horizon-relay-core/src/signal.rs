//! Signal/slot event delivery for Horizon Relay.
//!
//! A [`Signal<Args>`] holds any number of connected slots (closures). Emitting
//! the signal invokes every slot on the emitting thread.
//!
//! Slots are invoked after the internal slot table lock has been released, so
//! a slot may connect or disconnect slots on the same signal, or call back into
//! the component that emitted it, without deadlocking.
//!
//! # Example
//!
//! ```
//! use horizon_relay_core::Signal;
//!
//! let text_received = Signal::<String>::new();
//!
//! let slot = text_received.connect(|text| {
//!     println!("received: {}", text);
//! });
//!
//! text_received.emit("hello".to_string());
//! text_received.disconnect(slot);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::log::targets;

new_key_type! {
    /// Identifies one slot connected to a [`Signal`].
    ///
    /// Returned by [`Signal::connect`] and accepted by [`Signal::disconnect`].
    pub struct SlotId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// # Type Parameter
///
/// - `Args`: The argument passed (by reference) to connected slots. Use `()`
///   for signals with no payload.
///
/// # Thread Safety
///
/// `Signal<Args>` is `Send + Sync`. Emission from several threads at once is
/// allowed; ordering between concurrent emissions is up to the emitter.
pub struct Signal<Args> {
    slots: Mutex<SlotMap<SlotId, Slot<Args>>>,
    blocked: AtomicBool,
}

impl<Args: Send + 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Send + 'static> Signal<Args> {
    /// Create a new signal with no connected slots.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot to this signal.
    ///
    /// Returns a [`SlotId`] that can be used to disconnect the slot later.
    pub fn connect<F>(&self, slot: F) -> SlotId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.slots.lock().insert(Arc::new(slot))
    }

    /// Disconnect a slot by its id.
    ///
    /// Returns `true` if the slot was connected.
    pub fn disconnect(&self, id: SlotId) -> bool {
        self.slots.lock().remove(id).is_some()
    }

    /// Disconnect all slots.
    pub fn disconnect_all(&self) {
        self.slots.lock().clear();
    }

    /// Number of connected slots.
    pub fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Block or unblock emission. While blocked, `emit` does nothing.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking every connected slot with `args`.
    ///
    /// Returns the number of slots invoked.
    pub fn emit(&self, args: Args) -> usize {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return 0;
        }

        let slots: Vec<Slot<Args>> = self.slots.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, slot_count = slots.len(), "emitting signal");

        for slot in &slots {
            slot(&args);
        }
        slots.len()
    }
}

impl<Args> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.slots.lock().len())
            .field("blocked", &self.blocked.load(Ordering::SeqCst))
            .finish()
    }
}
