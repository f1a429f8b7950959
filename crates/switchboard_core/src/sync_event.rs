//! # One-shot Event Adapter
//!
//! [`SyncEvent`] turns the next invocation of an [`Event`] into a single
//! awaitable value. It attaches a listener at construction; the first
//! invocation detaches that listener and resolves the adapter.
//!
//! Awaiting an adapter whose event is never invoked does not time out; the
//! waiter stays suspended until the event fires.

use crate::args::{Args, Map, Value};
use crate::events::Event;
use crate::slot::Slot;
use crate::utils::lock;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::IntoFuture;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Normalized arguments of the invocation that resolved a [`SyncEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Invoked without arguments
    Empty,
    /// Exactly one positional argument and no named ones
    Single(Value),
    /// Several positional arguments and no named ones
    Positional(Vec<Value>),
    /// Only named arguments
    Named(Map<String, Value>),
    /// Both positional and named arguments
    Mixed(Vec<Value>, Map<String, Value>),
}

impl Delivery {
    pub fn from_args(args: Args) -> Self {
        let Args {
            mut positional,
            named,
        } = args;
        match (positional.len(), named.is_empty()) {
            (0, true) => Delivery::Empty,
            (0, false) => Delivery::Named(named),
            (_, false) => Delivery::Mixed(positional, named),
            (1, true) => Delivery::Single(positional.remove(0)),
            (_, true) => Delivery::Positional(positional),
        }
    }

    /// Collapses the delivery into one JSON value.
    ///
    /// `Empty` becomes `null` and `Mixed` becomes `[[positional...], {named}]`.
    pub fn into_value(self) -> Value {
        match self {
            Delivery::Empty => Value::Null,
            Delivery::Single(value) => value,
            Delivery::Positional(values) => Value::Array(values),
            Delivery::Named(named) => Value::Object(named),
            Delivery::Mixed(values, named) => {
                Value::Array(vec![Value::Array(values), Value::Object(named)])
            }
        }
    }
}

/// Awaitable adapter resolved by the next invocation of an event.
pub struct SyncEvent {
    event: Event,
    pending: Arc<Mutex<Option<Slot>>>,
    outcome: watch::Receiver<Option<Delivery>>,
}

impl SyncEvent {
    /// Attaches to `event` and waits for its next invocation.
    pub fn new(event: &Event) -> Self {
        let (sender, outcome) = watch::channel(None);
        let pending: Arc<Mutex<Option<Slot>>> = Arc::new(Mutex::new(None));

        let source = event.clone();
        let armed = pending.clone();
        let slot = Slot::new("onSyncEvent", move |args: Args| {
            // Only the first invocation resolves; taking the slot out also
            // breaks the slot → closure → slot cycle.
            let Some(me) = lock(&armed).take() else {
                return Ok(Value::Null);
            };
            let _ = source.remove_listener(&me);
            sender.send_replace(Some(Delivery::from_args(args)));
            Ok(Value::Null)
        });

        *lock(&pending) = Some(slot.clone());
        event.add_listener(&slot);

        Self {
            event: event.clone(),
            pending,
            outcome,
        }
    }

    /// Waits for the event's first invocation and returns its normalized
    /// arguments. Later calls return the same delivery immediately.
    pub async fn wait(&self) -> Delivery {
        let mut outcome = self.outcome.clone();
        let _ = outcome.wait_for(Option::is_some).await;
        let resolved = outcome.borrow().clone();
        match resolved {
            Some(delivery) => delivery,
            None => futures::future::pending().await,
        }
    }

    /// Blocks the current thread until the event fires.
    pub fn wait_blocking(&self) -> Delivery {
        futures::executor::block_on(self.wait())
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    pub fn event(&self) -> &Event {
        &self.event
    }
}

impl IntoFuture for SyncEvent {
    type Output = Delivery;
    type IntoFuture = BoxFuture<'static, Delivery>;

    fn into_future(self) -> Self::IntoFuture {
        async move { self.wait().await }.boxed()
    }
}

impl Drop for SyncEvent {
    fn drop(&mut self) {
        if let Some(slot) = lock(&self.pending).take() {
            let _ = self.event.remove_listener(&slot);
        }
    }
}

impl std::fmt::Debug for SyncEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEvent")
            .field("event", &self.event.name())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use serde_json::json;

    #[tokio::test]
    async fn test_normalization_rules() {
        let event = Event::new("produced");

        let pair = SyncEvent::new(&event);
        event.invoke(args!["a", "b"]).unwrap();
        assert_eq!(pair.await.into_value(), json!(["a", "b"]));

        let named = SyncEvent::new(&event);
        event.invoke(args![; x => 1]).unwrap();
        assert_eq!(named.await.into_value(), json!({"x": 1}));

        let single = SyncEvent::new(&event);
        event.invoke(args!["foo"]).unwrap();
        assert_eq!(single.await, Delivery::Single(json!("foo")));

        let mixed = SyncEvent::new(&event);
        event.invoke(args![1; y => 2]).unwrap();
        assert_eq!(mixed.await.into_value(), json!([[1], {"y": 2}]));

        let empty = SyncEvent::new(&event);
        event.invoke(args![]).unwrap();
        assert_eq!(empty.await, Delivery::Empty);
    }

    #[tokio::test]
    async fn test_detaches_after_first_invocation() {
        let event = Event::new("tick");
        let sync = SyncEvent::new(&event);
        assert_eq!(event.listener_count(), 1);

        event.invoke(args![1]).unwrap();
        event.invoke(args![2]).unwrap();
        assert_eq!(event.listener_count(), 0);

        assert_eq!(sync.wait().await, Delivery::Single(json!(1)));
        assert_eq!(sync.wait().await, Delivery::Single(json!(1)));
    }

    #[tokio::test]
    async fn test_resolves_from_another_thread() {
        let event = Event::new("produced");
        let sync = SyncEvent::new(&event);
        let emitter = event.clone();
        let producer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            emitter.invoke(args!["some product"]).unwrap();
        });

        assert_eq!(sync.wait().await.into_value(), json!("some product"));
        producer.join().unwrap();
    }

    #[test]
    fn test_drop_detaches_unresolved_adapter() {
        let event = Event::new("never");
        let sync = SyncEvent::new(&event);
        assert!(!sync.is_resolved());
        drop(sync);
        assert_eq!(event.listener_count(), 0);
    }
}
