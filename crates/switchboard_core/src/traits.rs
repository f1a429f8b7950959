//! Name-based lookup of signals and slots.
//!
//! Wiring by name goes through these two traits. Implementors keep an
//! explicit name → handle table built once per instance; a failed lookup
//! becomes a [`crate::WiringError`] at the wiring call.

use crate::bilateral::BilateralEvent;
use crate::error::WiringError;
use crate::events::Event;
use crate::slot::Slot;

/// A signal of either kind, as seen by the wiring functions.
#[derive(Debug, Clone)]
pub enum SignalRef {
    Multi(Event),
    Single(BilateralEvent),
}

impl SignalRef {
    pub fn name(&self) -> &str {
        match self {
            SignalRef::Multi(event) => event.name(),
            SignalRef::Single(event) => event.name(),
        }
    }

    /// Attaches `slot` as a listener.
    pub fn attach(&self, slot: &Slot) -> Result<(), WiringError> {
        match self {
            SignalRef::Multi(event) => {
                event.add_listener(slot);
                Ok(())
            }
            SignalRef::Single(event) => event.add_listener(slot),
        }
    }

    /// Detaches `slot`.
    ///
    /// A plain event reports a slot that is not attached as an error; a
    /// bilateral event ignores a mismatch.
    pub fn detach(&self, slot: &Slot) -> Result<(), WiringError> {
        match self {
            SignalRef::Multi(event) => event.remove_listener(slot),
            SignalRef::Single(event) => {
                event.remove_listener(slot);
                Ok(())
            }
        }
    }

    pub fn clear(&self) {
        match self {
            SignalRef::Multi(event) => event.clear_listeners(),
            SignalRef::Single(event) => event.clear_listeners(),
        }
    }
}

impl From<&Event> for SignalRef {
    fn from(event: &Event) -> Self {
        SignalRef::Multi(event.clone())
    }
}

impl From<Event> for SignalRef {
    fn from(event: Event) -> Self {
        SignalRef::Multi(event)
    }
}

impl From<&BilateralEvent> for SignalRef {
    fn from(event: &BilateralEvent) -> Self {
        SignalRef::Single(event.clone())
    }
}

impl From<BilateralEvent> for SignalRef {
    fn from(event: BilateralEvent) -> Self {
        SignalRef::Single(event)
    }
}

/// Something that declares named signals.
pub trait Emitter {
    /// Name used in wiring errors and logs.
    fn emitter_name(&self) -> &str;

    /// Looks up a declared signal by name.
    fn signal(&self, name: &str) -> Option<SignalRef>;

    /// All declared signal names, in declaration order.
    fn signal_names(&self) -> Vec<String>;
}

/// Something that exposes named slots.
pub trait Receiver {
    /// Name used in wiring errors and logs.
    fn receiver_name(&self) -> &str;

    /// Looks up a slot by name.
    fn slot(&self, name: &str) -> Option<Slot>;
}
