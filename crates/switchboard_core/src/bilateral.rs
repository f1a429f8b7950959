//! Single-listener events whose invocation returns the listener's result.

use crate::args::Args;
use crate::error::{CallError, WiringError};
use crate::slot::{Reply, Slot};
use crate::traits::{Emitter, SignalRef};
use crate::utils::{read, write};
use compact_str::CompactString;
use std::sync::{Arc, RwLock};
use tracing::debug;

struct BilateralInner {
    name: CompactString,
    listener: RwLock<Option<Slot>>,
}

/// A named signal bound to at most one listener.
///
/// Invoking it returns whatever the listener returns, which is a
/// [`Reply::Deferred`] when the listener's owner runs a scheduler.
#[derive(Clone)]
pub struct BilateralEvent {
    inner: Arc<BilateralInner>,
}

impl BilateralEvent {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            inner: Arc::new(BilateralInner {
                name: name.into(),
                listener: RwLock::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Binds the listener.
    ///
    /// # Returns
    ///
    /// `WiringError::AlreadyBound` if a listener is already bound.
    pub fn add_listener(&self, slot: &Slot) -> Result<(), WiringError> {
        let mut listener = write(&self.inner.listener);
        if listener.is_some() {
            return Err(WiringError::AlreadyBound {
                event: self.name().to_string(),
            });
        }
        *listener = Some(slot.clone());
        debug!(event = %self.name(), slot = %slot.name(), "Bilateral listener bound");
        Ok(())
    }

    /// Unbinds `slot` if it is the bound listener.
    ///
    /// Returns `false` and leaves the binding untouched when `slot` is not
    /// the bound listener.
    pub fn remove_listener(&self, slot: &Slot) -> bool {
        let mut listener = write(&self.inner.listener);
        if listener.as_ref().is_some_and(|bound| bound.same_as(slot)) {
            *listener = None;
            debug!(event = %self.name(), slot = %slot.name(), "Bilateral listener unbound");
            true
        } else {
            false
        }
    }

    pub fn clear_listeners(&self) {
        *write(&self.inner.listener) = None;
    }

    pub fn is_bound(&self) -> bool {
        read(&self.inner.listener).is_some()
    }

    /// Calls the bound listener and returns its reply.
    ///
    /// Resolves to `CallError::NoListener` when nothing is bound.
    pub fn invoke(&self, args: Args) -> Reply {
        let listener = read(&self.inner.listener).clone();
        match listener {
            Some(slot) => slot.call(args),
            None => Reply::Ready(Err(CallError::NoListener {
                event: self.name().to_string(),
            })),
        }
    }
}

impl std::fmt::Debug for BilateralEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BilateralEvent")
            .field("name", &self.inner.name)
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Ordered, append-only set of named bilateral events.
#[derive(Debug, Clone, Default)]
pub struct BilateralEvents {
    events: Vec<BilateralEvent>,
}

impl BilateralEvents {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut events = Self::default();
        for name in names {
            events.add(name.as_ref());
        }
        events
    }

    pub fn add(&mut self, name: &str) -> BilateralEvent {
        if let Some(event) = self.get(name) {
            return event;
        }
        let event = BilateralEvent::new(name);
        self.events.push(event.clone());
        event
    }

    pub fn get(&self, name: &str) -> Option<BilateralEvent> {
        self.events.iter().find(|event| event.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.events.iter().map(|event| event.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Invokes the bilateral event named `name` and returns its reply.
    pub fn call(&self, name: &str, args: Args) -> Reply {
        match self.get(name) {
            Some(event) => event.invoke(args),
            None => Reply::Ready(Err(CallError::UnknownEvent {
                event: name.to_string(),
            })),
        }
    }
}

impl Emitter for BilateralEvents {
    fn emitter_name(&self) -> &str {
        "bilateral_events"
    }

    fn signal(&self, name: &str) -> Option<SignalRef> {
        self.get(name).map(SignalRef::Single)
    }

    fn signal_names(&self) -> Vec<String> {
        self.names()
    }
}
