//! Error types for signal dispatch, wiring and scheduling

use std::fmt::Display;

/// Errors raised by a slot while handling a call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    /// Handler reported a failure
    #[error("Slot failed: {0}")]
    Failed(String),

    /// An argument could not be converted to the expected type
    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument { name: String, reason: String },

    /// A required argument was not supplied
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    /// Handler panicked; the panic was contained
    #[error("Slot panicked: {0}")]
    Panicked(String),
}

impl SlotError {
    /// Shorthand for [`SlotError::Failed`].
    pub fn failed(message: impl Display) -> Self {
        SlotError::Failed(message.to_string())
    }
}

impl From<serde_json::Error> for SlotError {
    fn from(err: serde_json::Error) -> Self {
        SlotError::InvalidArgument {
            name: "value".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Outcome error of an invocation, as observed by the caller.
///
/// This is what a caller sees when it awaits a [`crate::Reply`] or a
/// [`crate::Deferred`]. It is `Clone` because every observer of a deferred
/// call reads the same terminal value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// The handler itself failed
    #[error(transparent)]
    Slot(#[from] SlotError),

    /// The owning scheduler no longer accepts or runs work
    #[error("Scheduler '{scheduler}' is stopped")]
    SchedulerStopped { scheduler: String },

    /// The deferred call was dropped before it produced a result
    #[error("Deferred call was dropped before it ran")]
    Abandoned,

    /// A bilateral event was invoked with no listener attached
    #[error("No listener attached to bilateral event '{event}'")]
    NoListener { event: String },

    /// A named event does not exist in the registry
    #[error("Unknown event: {event}")]
    UnknownEvent { event: String },
}

/// Programmer errors surfaced by connect/disconnect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WiringError {
    /// The emitter declares no event with this name
    #[error("Emitter '{emitter}' has no event '{event}'")]
    UnknownEvent { emitter: String, event: String },

    /// The receiver exposes no slot with this name
    #[error("Receiver '{receiver}' has no slot '{slot}'")]
    UnknownSlot { receiver: String, slot: String },

    /// The slot is not attached to the event being detached from
    #[error("Slot '{slot}' is not attached to event '{event}'")]
    ListenerNotAttached { event: String, slot: String },

    /// A bilateral event already has its single listener
    #[error("Bilateral event '{event}' already has a listener")]
    AlreadyBound { event: String },

    /// Parallel event/slot lists have different lengths
    #[error("Length mismatch: {events} events but {slots} slots")]
    LengthMismatch { events: usize, slots: usize },

    /// The owner has no signal registry to forward into
    #[error("Owner '{owner}' declares no events")]
    NoRegistry { owner: String },
}

/// Scheduler lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// `enter` was called on a scheduler that already ran
    #[error("Scheduler '{scheduler}' was already started")]
    AlreadyStarted { scheduler: String },

    /// Work was submitted from a foreign context after the scheduler stopped
    #[error("Scheduler '{scheduler}' is stopped")]
    Stopped { scheduler: String },

    /// A task-backed scheduler was created without a runtime handle
    #[error("Scheduler '{scheduler}' needs a runtime handle for the task backend")]
    MissingRuntime { scheduler: String },

    /// The dedicated worker thread could not be spawned
    #[error("Failed to spawn scheduler thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker thread's runtime could not be built
    #[error("Failed to build scheduler runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl From<SchedulerError> for CallError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Stopped { scheduler } => CallError::SchedulerStopped { scheduler },
            other => CallError::Slot(SlotError::failed(other)),
        }
    }
}

/// Failures reported back to a transport that delivered an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// No local event or bilateral event carries this name
    #[error("Unknown inbound event: {0}")]
    UnknownEvent(String),

    /// The local invocation failed
    #[error("Dispatch of '{event}' failed: {source}")]
    Dispatch {
        event: String,
        #[source]
        source: CallError,
    },

    /// A direct listener panicked during delivery
    #[error("Dispatch of '{event}' panicked: {message}")]
    Panicked { event: String, message: String },
}

/// Errors produced by an outbound transport implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The transport does not implement this operation
    #[error("Operation not supported by transport: {0}")]
    Unsupported(String),

    /// The transport connection is closed
    #[error("Transport is closed")]
    Closed,

    /// Sending or receiving failed
    #[error("Transport failure: {0}")]
    Failed(String),
}

impl From<TransportError> for SlotError {
    fn from(err: TransportError) -> Self {
        SlotError::Failed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_scheduler_maps_to_call_error() {
        let err: CallError = SchedulerError::Stopped {
            scheduler: "loop".to_string(),
        }
        .into();
        assert_eq!(
            err,
            CallError::SchedulerStopped {
                scheduler: "loop".to_string()
            }
        );
    }

    #[test]
    fn test_slot_error_is_transparent_in_call_error() {
        let err = CallError::from(SlotError::failed("boom"));
        assert_eq!(err.to_string(), "Slot failed: boom");
    }

    #[test]
    fn test_json_error_becomes_invalid_argument() {
        let json_err = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        assert!(matches!(
            SlotError::from(json_err),
            SlotError::InvalidArgument { .. }
        ));
    }
}
