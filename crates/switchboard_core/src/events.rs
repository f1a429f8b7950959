//! # Multi-listener Events
//!
//! An [`Event`] is a named broadcast point with an ordered listener list.
//! Invoking it calls every listener in attachment order with the same
//! arguments. [`Events`] is the fixed, ordered set of events an owner declares
//! once at construction.
//!
//! Dispatch is fail-fast: the first listener that returns an error stops the
//! remaining listeners for that invocation and the error is returned to the
//! invoker. Listeners whose owner runs a scheduler only enqueue work, so their
//! failures surface on the scheduler, not here.

use crate::args::Args;
use crate::error::{CallError, WiringError};
use crate::slot::{Reply, Slot};
use crate::traits::{Emitter, SignalRef};
use crate::utils::{read, write};
use compact_str::CompactString;
use smallvec::SmallVec;
use std::sync::{Arc, RwLock};
use tracing::{debug, trace, warn};

type Listeners = SmallVec<[Slot; 4]>;

struct EventInner {
    name: CompactString,
    listeners: RwLock<Listeners>,
}

/// A named signal with any number of listeners.
///
/// Clones share the listener list.
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            inner: Arc::new(EventInner {
                name: name.into(),
                listeners: RwLock::new(SmallVec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Appends a listener. The same slot may be attached more than once and
    /// is then called once per attachment.
    pub fn add_listener(&self, slot: &Slot) {
        write(&self.inner.listeners).push(slot.clone());
        debug!(event = %self.name(), slot = %slot.name(), "Listener attached");
    }

    /// Removes the first attachment of `slot`.
    ///
    /// # Returns
    ///
    /// `WiringError::ListenerNotAttached` if the slot is not a listener.
    pub fn remove_listener(&self, slot: &Slot) -> Result<(), WiringError> {
        let mut listeners = write(&self.inner.listeners);
        match listeners.iter().position(|listener| listener.same_as(slot)) {
            Some(index) => {
                listeners.remove(index);
                debug!(event = %self.name(), slot = %slot.name(), "Listener detached");
                Ok(())
            }
            None => Err(WiringError::ListenerNotAttached {
                event: self.name().to_string(),
                slot: slot.name().to_string(),
            }),
        }
    }

    pub fn clear_listeners(&self) {
        write(&self.inner.listeners).clear();
    }

    pub fn listener_count(&self) -> usize {
        read(&self.inner.listeners).len()
    }

    pub fn has_listener(&self, slot: &Slot) -> bool {
        read(&self.inner.listeners)
            .iter()
            .any(|listener| listener.same_as(slot))
    }

    /// Calls every listener in attachment order.
    ///
    /// The listener list is snapshotted first, so listeners may attach or
    /// detach (themselves included) while the event is dispatching; the
    /// change applies from the next invocation on.
    pub fn invoke(&self, args: Args) -> Result<(), CallError> {
        let listeners: Listeners = read(&self.inner.listeners).clone();
        trace!(event = %self.name(), listeners = listeners.len(), "Invoking event");

        for slot in &listeners {
            match slot.call(args.clone()) {
                Reply::Ready(Ok(_)) | Reply::Deferred(_) => {}
                Reply::Ready(Err(err)) => {
                    debug!(event = %self.name(), slot = %slot.name(), error = %err, "Listener failed; dispatch aborted");
                    return Err(err);
                }
                Reply::Pending(_) => {
                    warn!(
                        event = %self.name(),
                        slot = %slot.name(),
                        "Asynchronous slot invoked without a scheduler; call dropped"
                    );
                }
            }
        }
        Ok(())
    }

    /// True when both handles refer to the same event.
    pub fn same_as(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.inner.name)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Ordered, append-only set of named events.
#[derive(Debug, Clone, Default)]
pub struct Events {
    events: Vec<Event>,
}

impl Events {
    /// Creates one event per name. Repeated names map to the same event.
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

    /// Returns the event named `name`, creating it if it does not exist.
    pub fn add(&mut self, name: &str) -> Event {
        if let Some(event) = self.get(name) {
            return event;
        }
        let event = Event::new(name);
        self.events.push(event.clone());
        event
    }

    pub fn get(&self, name: &str) -> Option<Event> {
        self.events.iter().find(|event| event.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.events.iter().any(|event| event.name() == name)
    }

    /// Event names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.events.iter().map(|event| event.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Invokes the event named `name`.
    pub fn emit(&self, name: &str, args: Args) -> Result<(), CallError> {
        match self.get(name) {
            Some(event) => event.invoke(args),
            None => Err(CallError::UnknownEvent {
                event: name.to_string(),
            }),
        }
    }
}

impl Emitter for Events {
    fn emitter_name(&self) -> &str {
        "events"
    }

    fn signal(&self, name: &str) -> Option<SignalRef> {
        self.get(name).map(SignalRef::Multi)
    }

    fn signal_names(&self) -> Vec<String> {
        self.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::error::SlotError;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    fn recorder(name: &str, log: &Arc<Mutex<Vec<(String, Args)>>>) -> Slot {
        let log = log.clone();
        let label = name.to_string();
        Slot::new(name, move |args| {
            log.lock().unwrap().push((label.clone(), args));
            Ok(Value::Null)
        })
    }

    #[test]
    fn test_every_listener_sees_every_invocation_in_order() {
        let event = Event::new("produced");
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = recorder("first", &log);
        let second = recorder("second", &log);
        event.add_listener(&first);
        event.add_listener(&second);

        for i in 0..3 {
            event.invoke(args![i]).unwrap();
        }

        let log = log.lock().unwrap();
        let expected: Vec<(String, Args)> = (0..3)
            .flat_map(|i| {
                vec![
                    ("first".to_string(), args![i]),
                    ("second".to_string(), args![i]),
                ]
            })
            .collect();
        assert_eq!(*log, expected);
    }

    #[test]
    fn test_detach_mid_stream_affects_only_later_invocations() {
        let event = Event::new("tick");
        let log = Arc::new(Mutex::new(Vec::new()));
        let one = recorder("one", &log);
        let two = recorder("two", &log);
        event.add_listener(&one);
        event.add_listener(&two);

        event.invoke(args![1]).unwrap();
        event.invoke(args![2]).unwrap();
        event.remove_listener(&one).unwrap();
        event.invoke(args![3]).unwrap();
        event.invoke(args![4]).unwrap();

        let log = log.lock().unwrap();
        let seen_by = |name: &str| {
            log.iter()
                .filter(|(label, _)| label == name)
                .map(|(_, args)| args.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(seen_by("one"), vec![args![1], args![2]]);
        assert_eq!(seen_by("two"), vec![args![1], args![2], args![3], args![4]]);
    }

    #[test]
    fn test_duplicates_and_removal_by_identity() {
        let event = Event::new("dup");
        let log = Arc::new(Mutex::new(Vec::new()));
        let slot = recorder("dup", &log);
        event.add_listener(&slot);
        event.add_listener(&slot);

        event.invoke(args![]).unwrap();
        assert_eq!(log.lock().unwrap().len(), 2);

        event.remove_listener(&slot).unwrap();
        assert_eq!(event.listener_count(), 1);
        event.remove_listener(&slot).unwrap();
        assert!(matches!(
            event.remove_listener(&slot),
            Err(WiringError::ListenerNotAttached { .. })
        ));
    }

    #[test]
    fn test_dispatch_is_fail_fast() {
        let event = Event::new("chain");
        let log = Arc::new(Mutex::new(Vec::new()));
        event.add_listener(&recorder("before", &log));
        event.add_listener(&Slot::new("broken", |_| Err(SlotError::failed("broken"))));
        event.add_listener(&recorder("after", &log));

        let err = event.invoke(args![]).unwrap_err();
        assert_eq!(err, CallError::Slot(SlotError::failed("broken")));
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "before");
    }

    #[test]
    fn test_listener_may_detach_itself_during_dispatch() {
        let event = Event::new("once");
        let hits = Arc::new(Mutex::new(0));
        let cell: Arc<Mutex<Option<Slot>>> = Arc::new(Mutex::new(None));
        let source = event.clone();
        let counter = hits.clone();
        let handle = cell.clone();
        let slot = Slot::new("once", move |_| {
            *counter.lock().unwrap() += 1;
            if let Some(me) = handle.lock().unwrap().take() {
                source.remove_listener(&me).unwrap();
            }
            Ok(Value::Null)
        });
        *cell.lock().unwrap() = Some(slot.clone());
        event.add_listener(&slot);

        event.invoke(args![]).unwrap();
        event.invoke(args![]).unwrap();
        assert_eq!(*hits.lock().unwrap(), 1);
        assert_eq!(event.listener_count(), 0);
    }

    #[test]
    fn test_registry_is_ordered_and_unique() {
        let mut events = Events::new(["b", "a", "b"]);
        assert_eq!(events.names(), vec!["b", "a"]);
        let a = events.get("a").unwrap();
        assert!(events.add("a").same_as(&a));
        events.add("c");
        assert_eq!(events.names(), vec!["b", "a", "c"]);

        assert_eq!(
            events.emit("missing", args![]),
            Err(CallError::UnknownEvent {
                event: "missing".to_string()
            })
        );

        let log = Arc::new(Mutex::new(Vec::new()));
        a.add_listener(&recorder("a", &log));
        events.emit("a", args!["v"]).unwrap();
        assert_eq!(log.lock().unwrap()[0].1.get(0), Some(&json!("v")));
    }
}
