//! # Object Binding
//!
//! A [`Binding`] is what an owning object embeds to take part in wiring: an
//! optional registry of events it emits, an optional registry of bilateral
//! events, an optional scheduler, and the table of slots it exposes by name.
//!
//! Slots registered through a binding follow the binding's scheduler. While a
//! scheduler is attached, calling such a slot queues the call and hands back
//! a [`Reply::Deferred`]; without one the handler runs in the caller's
//! context. Attaching or detaching a scheduler later changes this for every
//! slot of the binding at once.
//!
//! ```
//! use switchboard_core::{args, Binding, Value};
//!
//! let producer = Binding::builder("producer").emits(["produced"]).build().unwrap();
//! let consumer = Binding::builder("consumer").build().unwrap();
//! consumer.add_slot("onProduced", |args| {
//!     println!("{:?}", args.get(0));
//!     Ok(Value::Null)
//! });
//! switchboard_core::connect_all(&producer, &consumer).unwrap();
//! producer.emit("produced", args!["x"]).unwrap();
//! ```


use crate::args::Args;
use crate::bilateral::{BilateralEvent, BilateralEvents};
use crate::error::{CallError, WiringError};
use crate::events::{Event, Events};
use crate::names::slot_to_event_name;
use crate::scheduler::{Scheduler, SchedulerCell};
use crate::slot::{Callable, Reply, Slot, SlotResult};
use crate::traits::{Emitter, Receiver, SignalRef};
use compact_str::CompactString;
use dashmap::DashMap;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Builder for [`Binding`].
#[derive(Debug)]
pub struct BindingBuilder {
    name: CompactString,
    events: Option<Vec<String>>,
    bilateral: Option<Vec<String>>,
    scheduler: Option<Scheduler>,
    forwards: Vec<(String, String)>,
    error: Option<WiringError>,
}

impl BindingBuilder {
    /// Declares the events the owner emits.
    pub fn emits<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events
            .get_or_insert_with(Vec::new)
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Declares the bilateral events the owner answers through.
    pub fn emits_bilaterally<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bilateral
            .get_or_insert_with(Vec::new)
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Declares slots that re-emit the owner's own events.
    ///
    /// The event for each slot is derived by convention:
    /// `onProcessedResult` forwards to `processed_result`.
    pub fn forwards<I, S>(mut self, slot_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for slot in slot_names {
            let slot = slot.into();
            let event = slot_to_event_name(&slot);
            self.forwards.push((slot, event));
        }
        self
    }

    /// Declares forwarding slots with explicit target events.
    ///
    /// The lists are paired by index; a length mismatch fails [`Self::build`].
    pub fn forwards_to(mut self, slot_names: &[&str], event_names: &[&str]) -> Self {
        if slot_names.len() != event_names.len() {
            if self.error.is_none() {
                self.error = Some(WiringError::LengthMismatch {
                    events: event_names.len(),
                    slots: slot_names.len(),
                });
            }
            return self;
        }
        self.forwards.extend(
            slot_names
                .iter()
                .zip(event_names)
                .map(|(slot, event)| (slot.to_string(), event.to_string())),
        );
        self
    }

    /// Builds the binding.
    ///
    /// # Returns
    ///
    /// A wiring error if a forwarding slot targets an event the binding does
    /// not declare, or if the forwarding lists were mismatched.
    pub fn build(self) -> Result<Binding, WiringError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let binding = Binding {
            events: self.events.map(Events::new),
            bilateral: self.bilateral.map(BilateralEvents::new),
            scheduler: SchedulerCell::new(self.scheduler),
            slots: DashMap::new(),
            name: self.name,
        };

        for (slot, event) in self.forwards {
            let events = binding.events.as_ref().ok_or_else(|| WiringError::NoRegistry {
                owner: binding.name.to_string(),
            })?;
            let target = events.get(&event).ok_or_else(|| WiringError::UnknownEvent {
                emitter: binding.name.to_string(),
                event: event.clone(),
            })?;
            binding
                .slots
                .insert(CompactString::from(slot.as_str()), Slot::forwarding(slot, target));
        }

        debug!(binding = %binding.name, slots = binding.slots.len(), "Binding built");
        Ok(binding)
    }
}

/// Signals, scheduler and named slots of one owning object.
pub struct Binding {
    name: CompactString,
    events: Option<Events>,
    bilateral: Option<BilateralEvents>,
    scheduler: SchedulerCell,
    slots: DashMap<CompactString, Slot>,
}

impl Binding {
    pub fn builder(name: impl Into<CompactString>) -> BindingBuilder {
        BindingBuilder {
            name: name.into(),
            events: None,
            bilateral: None,
            scheduler: None,
            forwards: Vec::new(),
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> Option<&Events> {
        self.events.as_ref()
    }

    pub fn bilateral_events(&self) -> Option<&BilateralEvents> {
        self.bilateral.as_ref()
    }

    /// Handle to one of the owner's events, for handlers that emit.
    pub fn event(&self, name: &str) -> Option<Event> {
        self.events.as_ref().and_then(|events| events.get(name))
    }

    pub fn bilateral_event(&self, name: &str) -> Option<BilateralEvent> {
        self.bilateral.as_ref().and_then(|events| events.get(name))
    }

    /// Invokes the owner's event `name`.
    pub fn emit(&self, name: &str, args: Args) -> Result<(), CallError> {
        match self.event(name) {
            Some(event) => event.invoke(args),
            None => Err(CallError::UnknownEvent {
                event: name.to_string(),
            }),
        }
    }

    /// Invokes the owner's bilateral event `name` and returns its reply.
    pub fn call(&self, name: &str, args: Args) -> Reply {
        match self.bilateral_event(name) {
            Some(event) => event.invoke(args),
            None => Reply::Ready(Err(CallError::UnknownEvent {
                event: name.to_string(),
            })),
        }
    }

    pub fn scheduler(&self) -> Option<Scheduler> {
        self.scheduler.current()
    }

    /// Attaches or detaches the scheduler the owner's slots run on.
    pub fn set_scheduler(&self, scheduler: Option<Scheduler>) {
        debug!(
            binding = %self.name,
            scheduler = scheduler.as_ref().map(Scheduler::name).unwrap_or("none"),
            "Binding scheduler changed"
        );
        self.scheduler.set(scheduler);
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduler.current().is_some()
    }

    /// Registers a synchronous slot and returns it.
    ///
    /// A slot registered under an existing name replaces it for future
    /// lookups; signals it is already attached to keep the old one.
    pub fn add_slot<F>(&self, name: &str, handler: F) -> Slot
    where
        F: Fn(Args) -> SlotResult + Send + Sync + 'static,
    {
        self.register(name, Callable::Sync(Arc::new(handler)))
    }

    /// Registers an asynchronous slot and returns it.
    pub fn add_async_slot<F, Fut>(&self, name: &str, handler: F) -> Slot
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SlotResult> + Send + 'static,
    {
        self.register(
            name,
            Callable::Async(Arc::new(move |args| handler(args).boxed())),
        )
    }

    fn register(&self, name: &str, callable: Callable) -> Slot {
        let name = CompactString::from(name);
        let slot = Slot::owned(name.clone(), callable, self.scheduler.clone());
        self.slots.insert(name, slot.clone());
        slot
    }

    /// Calls the slot registered as `name`.
    pub fn call_slot(&self, name: &str, args: Args) -> Result<Reply, WiringError> {
        let slot = Receiver::slot(self, name).ok_or_else(|| WiringError::UnknownSlot {
            receiver: self.name.to_string(),
            slot: name.to_string(),
        })?;
        Ok(slot.call(args))
    }

    /// Registered slot names, sorted.
    pub fn slot_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.iter().map(|entry| entry.key().to_string()).collect();
        names.sort();
        names
    }
}

impl Emitter for Binding {
    fn emitter_name(&self) -> &str {
        &self.name
    }

    fn signal(&self, name: &str) -> Option<SignalRef> {
        self.event(name)
            .map(SignalRef::Multi)
            .or_else(|| self.bilateral_event(name).map(SignalRef::Single))
    }

    fn signal_names(&self) -> Vec<String> {
        let mut names = self.events.as_ref().map(Events::names).unwrap_or_default();
        if let Some(bilateral) = &self.bilateral {
            names.extend(bilateral.names());
        }
        names
    }
}

impl Receiver for Binding {
    fn receiver_name(&self) -> &str {
        &self.name
    }

    fn slot(&self, name: &str) -> Option<Slot> {
        self.slots.get(name).map(|entry| entry.value().clone())
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("events", &self.events.as_ref().map(Events::names))
            .field("bilateral", &self.bilateral.as_ref().map(BilateralEvents::names))
            .field("scheduler", &self.scheduler.current().map(|s| s.name().to_string()))
            .field("slots", &self.slot_names())
            .finish()
    }
}
