//! # Wiring
//!
//! Connect and disconnect signals and slots. Every public function in this
//! module is one call shape of a single primitive that resolves a signal on
//! the producer side and a slot on the consumer side, then attaches or
//! detaches the pair.
//!
//! | shape | connect | disconnect |
//! |---|---|---|
//! | signal handle + slot | [`connect`] | [`disconnect`] |
//! | emitter/event name + receiver/slot name | [`connect_by_name`] | [`disconnect_by_name`] |
//! | emitter/event name + bare slot | [`connect_slot`] | [`disconnect_slot`] |
//! | emitter/event name + receiver, slot by convention | [`connect_by_convention`] | [`disconnect_by_convention`] |
//! | parallel name lists | [`connect_lists`] | [`disconnect_lists`] |
//! | event name list, slots by convention | [`connect_lists_by_convention`] | [`disconnect_lists_by_convention`] |
//! | every event, slots by convention | [`connect_all`] | [`disconnect_all`] |
//! | every event, slot named like the event | [`connect_all_plain`] | [`disconnect_all_plain`] |
//!
//! Clearing: [`clear_signal`], [`clear_event`] and [`clear_emitter`].
//!
//! Missing names and length mismatches are programmer errors and fail the
//! call immediately. The wildcard shapes are the exception: events whose slot
//! the receiver does not expose are skipped.

use crate::error::WiringError;
use crate::names::event_to_slot_name;
use crate::slot::Slot;
use crate::traits::{Emitter, Receiver, SignalRef};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Attach,
    Detach,
}

impl Op {
    fn inverse(self) -> Self {
        match self {
            Op::Attach => Op::Detach,
            Op::Detach => Op::Attach,
        }
    }
}

/// How the consumer-side slot is found.
enum Target<'a> {
    Slot(&'a Slot),
    Named(&'a dyn Receiver, &'a str),
    Convention(&'a dyn Receiver),
}

/// Which event names a wildcard walks and how slot names derive from them.
#[derive(Debug, Clone, Copy)]
enum Naming {
    Convention,
    Plain,
}

fn resolve_signal(emitter: &dyn Emitter, event: &str) -> Result<SignalRef, WiringError> {
    emitter.signal(event).ok_or_else(|| WiringError::UnknownEvent {
        emitter: emitter.emitter_name().to_string(),
        event: event.to_string(),
    })
}

fn resolve_slot(receiver: &dyn Receiver, slot: &str) -> Result<Slot, WiringError> {
    receiver.slot(slot).ok_or_else(|| WiringError::UnknownSlot {
        receiver: receiver.receiver_name().to_string(),
        slot: slot.to_string(),
    })
}

fn resolve_target(event: &str, target: Target<'_>) -> Result<Slot, WiringError> {
    match target {
        Target::Slot(slot) => Ok(slot.clone()),
        Target::Named(receiver, slot) => resolve_slot(receiver, slot),
        Target::Convention(receiver) => resolve_slot(receiver, &event_to_slot_name(event)),
    }
}

fn apply(op: Op, signal: &SignalRef, slot: &Slot) -> Result<(), WiringError> {
    match op {
        Op::Attach => signal.attach(slot)?,
        Op::Detach => signal.detach(slot)?,
    }
    debug!(signal = %signal.name(), slot = %slot.name(), op = ?op, "Wiring updated");
    Ok(())
}

fn wire(op: Op, emitter: &dyn Emitter, event: &str, target: Target<'_>) -> Result<(), WiringError> {
    let signal = resolve_signal(emitter, event)?;
    let slot = resolve_target(event, target)?;
    apply(op, &signal, &slot)
}

/// Resolves every pair before touching any signal, so a bad name leaves the
/// wiring unchanged. Pairs already applied are reverted if a later one fails.
fn wire_pairs(
    op: Op,
    emitter: &dyn Emitter,
    events: &[&str],
    receiver: &dyn Receiver,
    slots: Option<&[&str]>,
) -> Result<(), WiringError> {
    if let Some(slots) = slots {
        if slots.len() != events.len() {
            return Err(WiringError::LengthMismatch {
                events: events.len(),
                slots: slots.len(),
            });
        }
    }

    let mut pairs = Vec::with_capacity(events.len());
    for (index, event) in events.iter().enumerate() {
        let target = match slots {
            Some(slots) => Target::Named(receiver, slots[index]),
            None => Target::Convention(receiver),
        };
        pairs.push((resolve_signal(emitter, event)?, resolve_target(event, target)?));
    }

    for (applied, (signal, slot)) in pairs.iter().enumerate() {
        if let Err(err) = apply(op, signal, slot) {
            for (signal, slot) in pairs[..applied].iter().rev() {
                if let Err(undo) = apply(op.inverse(), signal, slot) {
                    warn!(
                        signal = %signal.name(),
                        slot = %slot.name(),
                        error = %undo,
                        "Failed to revert wiring"
                    );
                }
            }
            return Err(err);
        }
    }
    Ok(())
}

fn wire_all(
    op: Op,
    emitter: &dyn Emitter,
    receiver: &dyn Receiver,
    naming: Naming,
) -> Result<(), WiringError> {
    for event in emitter.signal_names() {
        let slot_name = match naming {
            Naming::Convention => event_to_slot_name(&event),
            Naming::Plain => event.clone(),
        };
        let Some(slot) = receiver.slot(&slot_name) else {
            continue;
        };
        let signal = resolve_signal(emitter, &event)?;
        apply(op, &signal, &slot)?;
    }
    Ok(())
}

/// Attaches `slot` to a signal handle.
pub fn connect(signal: impl Into<SignalRef>, slot: &Slot) -> Result<(), WiringError> {
    apply(Op::Attach, &signal.into(), slot)
}

/// Detaches `slot` from a signal handle.
pub fn disconnect(signal: impl Into<SignalRef>, slot: &Slot) -> Result<(), WiringError> {
    apply(Op::Detach, &signal.into(), slot)
}

/// Connects `emitter`'s event `event` to `receiver`'s slot `slot`.
pub fn connect_by_name(
    emitter: &dyn Emitter,
    event: &str,
    receiver: &dyn Receiver,
    slot: &str,
) -> Result<(), WiringError> {
    wire(Op::Attach, emitter, event, Target::Named(receiver, slot))
}

pub fn disconnect_by_name(
    emitter: &dyn Emitter,
    event: &str,
    receiver: &dyn Receiver,
    slot: &str,
) -> Result<(), WiringError> {
    wire(Op::Detach, emitter, event, Target::Named(receiver, slot))
}

/// Connects `emitter`'s event `event` to a bare slot.
pub fn connect_slot(emitter: &dyn Emitter, event: &str, slot: &Slot) -> Result<(), WiringError> {
    wire(Op::Attach, emitter, event, Target::Slot(slot))
}

pub fn disconnect_slot(emitter: &dyn Emitter, event: &str, slot: &Slot) -> Result<(), WiringError> {
    wire(Op::Detach, emitter, event, Target::Slot(slot))
}

/// Connects `emitter`'s event `event` to the receiver slot named by
/// [`event_to_slot_name`], e.g. `produced` → `onProduced`.
pub fn connect_by_convention(
    emitter: &dyn Emitter,
    event: &str,
    receiver: &dyn Receiver,
) -> Result<(), WiringError> {
    wire(Op::Attach, emitter, event, Target::Convention(receiver))
}

pub fn disconnect_by_convention(
    emitter: &dyn Emitter,
    event: &str,
    receiver: &dyn Receiver,
) -> Result<(), WiringError> {
    wire(Op::Detach, emitter, event, Target::Convention(receiver))
}

/// Connects `events[i]` to `slots[i]` for every index.
///
/// # Returns
///
/// `WiringError::LengthMismatch` if the lists differ in length. Nothing is
/// attached unless every name resolves.
pub fn connect_lists(
    emitter: &dyn Emitter,
    events: &[&str],
    receiver: &dyn Receiver,
    slots: &[&str],
) -> Result<(), WiringError> {
    wire_pairs(Op::Attach, emitter, events, receiver, Some(slots))
}

pub fn disconnect_lists(
    emitter: &dyn Emitter,
    events: &[&str],
    receiver: &dyn Receiver,
    slots: &[&str],
) -> Result<(), WiringError> {
    wire_pairs(Op::Detach, emitter, events, receiver, Some(slots))
}

/// Connects each listed event to its convention-named slot.
pub fn connect_lists_by_convention(
    emitter: &dyn Emitter,
    events: &[&str],
    receiver: &dyn Receiver,
) -> Result<(), WiringError> {
    wire_pairs(Op::Attach, emitter, events, receiver, None)
}

pub fn disconnect_lists_by_convention(
    emitter: &dyn Emitter,
    events: &[&str],
    receiver: &dyn Receiver,
) -> Result<(), WiringError> {
    wire_pairs(Op::Detach, emitter, events, receiver, None)
}

/// Connects every declared event of `emitter` to the receiver's
/// convention-named slot, skipping events the receiver has no slot for.
pub fn connect_all(emitter: &dyn Emitter, receiver: &dyn Receiver) -> Result<(), WiringError> {
    wire_all(Op::Attach, emitter, receiver, Naming::Convention)
}

/// Mirror of [`connect_all`]. A slot that exists but is not attached is
/// still reported as an error.
pub fn disconnect_all(emitter: &dyn Emitter, receiver: &dyn Receiver) -> Result<(), WiringError> {
    wire_all(Op::Detach, emitter, receiver, Naming::Convention)
}

/// Like [`connect_all`], but the slot must carry the event's own name.
pub fn connect_all_plain(emitter: &dyn Emitter, receiver: &dyn Receiver) -> Result<(), WiringError> {
    wire_all(Op::Attach, emitter, receiver, Naming::Plain)
}

pub fn disconnect_all_plain(
    emitter: &dyn Emitter,
    receiver: &dyn Receiver,
) -> Result<(), WiringError> {
    wire_all(Op::Detach, emitter, receiver, Naming::Plain)
}

/// Removes every listener from a signal.
pub fn clear_signal(signal: impl Into<SignalRef>) {
    let signal = signal.into();
    signal.clear();
    debug!(signal = %signal.name(), "Signal cleared");
}

/// Removes every listener from `emitter`'s event `event`.
pub fn clear_event(emitter: &dyn Emitter, event: &str) -> Result<(), WiringError> {
    clear_signal(resolve_signal(emitter, event)?);
    Ok(())
}

/// Removes every listener from every event of `emitter`.
pub fn clear_emitter(emitter: &dyn Emitter) {
    for name in emitter.signal_names() {
        if let Some(signal) = emitter.signal(&name) {
            clear_signal(signal);
        }
    }
}
