//! # Switchboard Core
//!
//! A signal/slot toolkit for wiring components that each own an event loop.
//!
//! ## Core Features
//!
//! - **Events**: Named multi-listener signals invoked in attachment order
//! - **Bilateral Events**: Single-listener signals whose invocation returns the listener's reply
//! - **Slots**: Sync or async handlers that follow their owner's scheduler
//! - **Schedulers**: Per-owner FIFO loops on a dedicated thread or a Tokio runtime
//! - **Wiring**: Connect and disconnect by handle, by name or by naming convention
//! - **Gateway**: The seam between local signals and a transport
//!
//! ## Quick Start Example
//!
//! ```rust,no_run
//! use switchboard_core::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let event_loop = Scheduler::thread(SchedulerConfig::named("consumer"));
//!     let producer = Binding::builder("producer").emits(["produced"]).build()?;
//!     let consumer = Binding::builder("consumer")
//!         .with_scheduler(event_loop.clone())
//!         .build()?;
//!     consumer.add_slot("onProduced", |args| {
//!         println!("consumed {:?}", args.get(0));
//!         Ok(Value::Null)
//!     });
//!
//!     connect_all(&producer, &consumer)?;
//!     event_loop.enter()?;
//!     producer.emit("produced", args!["some product"])?;
//!     event_loop.exit().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Threading
//!
//! Every scheduler runs queued calls one at a time in submission order.
//! Emitting from any thread is safe; a listener owned by a scheduler runs on
//! that scheduler, a listener without one runs in the emitter's context.

pub mod args;
pub mod bilateral;
pub mod binding;
pub mod connect;
pub mod deferred;
pub mod error;
pub mod events;
pub mod gateway;
pub mod names;
pub mod scheduler;
pub mod slot;
pub mod spy;
pub mod sync_event;
pub mod traits;
pub mod worker;

mod utils;

pub use args::{Args, Map, Value};
pub use bilateral::{BilateralEvent, BilateralEvents};
pub use binding::{Binding, BindingBuilder};
pub use connect::*;
pub use deferred::Deferred;
pub use error::{
    CallError, DeliveryError, SchedulerError, SlotError, TransportError, WiringError,
};
pub use events::{Event, Events};
pub use gateway::{Gateway, Outbound, OutboundMessage};
pub use names::{event_to_request_name, event_to_slot_name, slot_to_event_name};
pub use scheduler::{
    Backend, ExceptionPolicy, Scheduler, SchedulerConfig, SchedulerId, SchedulerState,
    SchedulerStats, Terminator, LIFECYCLE_EVENTS,
};
pub use slot::{CallResult, Reply, Slot, SlotResult};
pub use spy::Spy;
pub use sync_event::{Delivery, SyncEvent};
pub use traits::{Emitter, Receiver, SignalRef};
pub use worker::{Work, Worker, WorkerReport};
