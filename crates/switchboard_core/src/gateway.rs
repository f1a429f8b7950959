//! # Transport Gateway
//!
//! The boundary between the core and a transport layer. A transport decodes
//! inbound messages and hands them to [`Gateway::deliver`], which invokes the
//! matching local event or bilateral event. In the other direction,
//! [`Gateway::publisher`] and [`Gateway::requester`] produce slots that local
//! emitters connect to; calling them hands an [`OutboundMessage`] to the
//! transport's [`Outbound`] implementation.
//!
//! The gateway knows nothing about sockets or wire formats. Outbound slots
//! are owned by the gateway's binding, so they run on its scheduler when one
//! is attached.

use crate::args::{Args, Value};
use crate::binding::Binding;
use crate::error::{DeliveryError, SlotError, TransportError};
use crate::names::event_to_request_name;
use crate::slot::{CallResult, Reply, Slot};
use crate::traits::Receiver;
use crate::utils::panic_message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// An event invocation leaving the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Remote event name
    pub name: String,
    /// Arguments to invoke it with
    pub args: Args,
}

/// The sending half of a transport.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Broadcasts an event invocation; fire and forget.
    async fn publish(&self, message: OutboundMessage) -> Result<(), TransportError>;

    /// Sends a request and waits for the remote reply.
    async fn request(&self, message: OutboundMessage) -> Result<Value, TransportError> {
        Err(TransportError::Unsupported(format!("request '{}'", message.name)))
    }
}

/// Connects a binding's signals to a transport.
pub struct Gateway {
    binding: Binding,
    outbound: Arc<dyn Outbound>,
}

impl Gateway {
    /// Creates a gateway over `binding`.
    ///
    /// The binding's events and bilateral events are the names inbound
    /// messages may target.
    pub fn new(binding: Binding, outbound: Arc<dyn Outbound>) -> Self {
        Self { binding, outbound }
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Invokes the local event or bilateral event `name`.
    ///
    /// Never panics into the transport: unknown names, handler failures and
    /// panics all come back as a [`DeliveryError`]. For a bilateral event the
    /// reply may be deferred; await it to get the value to send back.
    pub fn deliver(&self, name: &str, args: Args) -> Result<Reply, DeliveryError> {
        debug!(gateway = %self.binding.name(), event = name, "Delivering inbound message");
        let dispatched = catch_unwind(AssertUnwindSafe(|| {
            if let Some(event) = self.binding.event(name) {
                return Some(event.invoke(args).map(|()| Reply::Ready(Ok(Value::Null))));
            }
            self.binding
                .bilateral_event(name)
                .map(|event| Ok(event.invoke(args)))
        }));

        let failed = |source| DeliveryError::Dispatch {
            event: name.to_string(),
            source,
        };
        match dispatched {
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(event = name, panic = %message, "Inbound dispatch panicked");
                Err(DeliveryError::Panicked {
                    event: name.to_string(),
                    message,
                })
            }
            Ok(None) => {
                warn!(event = name, "Inbound message for unknown event");
                Err(DeliveryError::UnknownEvent(name.to_string()))
            }
            Ok(Some(Err(source))) => Err(failed(source)),
            Ok(Some(Ok(Reply::Ready(Err(source))))) => Err(failed(source)),
            Ok(Some(Ok(reply))) => Ok(reply),
        }
    }

    /// Delivers an inbound message and waits for its final value.
    pub async fn deliver_and_wait(&self, name: &str, args: Args) -> Result<Value, DeliveryError> {
        let reply = self.deliver(name, args)?;
        reply.await.map_err(|source| DeliveryError::Dispatch {
            event: name.to_string(),
            source,
        })
    }

    /// Slot that publishes remote event `name` with the arguments it is
    /// called with. Created on first use and registered under `name`.
    pub fn publisher(&self, name: &str) -> Slot {
        if let Some(slot) = Receiver::slot(&self.binding, name) {
            return slot;
        }
        let outbound = self.outbound.clone();
        let event = name.to_string();
        self.binding.add_async_slot(name, move |args: Args| {
            let outbound = outbound.clone();
            let message = OutboundMessage {
                name: event.clone(),
                args,
            };
            async move {
                outbound.publish(message).await?;
                Ok(Value::Null)
            }
        })
    }

    /// Slot that requests remote event `name` and resolves to the reply.
    /// Registered under [`event_to_request_name`], e.g. `onRequestSum`.
    pub fn requester(&self, name: &str) -> Slot {
        let slot_name = event_to_request_name(name);
        if let Some(slot) = Receiver::slot(&self.binding, &slot_name) {
            return slot;
        }
        let outbound = self.outbound.clone();
        let event = name.to_string();
        self.binding.add_async_slot(&slot_name, move |args: Args| {
            let outbound = outbound.clone();
            let message = OutboundMessage {
                name: event.clone(),
                args,
            };
            async move { outbound.request(message).await.map_err(SlotError::from) }
        })
    }

    /// Publishes remote event `name` through its publisher slot.
    pub async fn publish(&self, name: &str, args: Args) -> CallResult {
        self.publisher(name).call(args).await
    }

    /// Requests remote event `name` through its requester slot.
    pub async fn request(&self, name: &str, args: Args) -> CallResult {
        self.requester(name).call(args).await
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("binding", &self.binding)
            .finish()
    }
}
