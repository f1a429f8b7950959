//! Naming conventions between events and slots.
//!
//! These mappings are only consulted by the convention-based wiring paths
//! (`connect_by_convention`, `connect_all`, forwarding slots). Direct wiring
//! never goes through them.

/// Maps an event name to its conventional slot name.
///
/// `"processed_result"` becomes `"onProcessedResult"`.
pub fn event_to_slot_name(event: &str) -> String {
    let mut slot = String::with_capacity(event.len() + 2);
    slot.push_str("on");
    for segment in event.split('_') {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            slot.extend(first.to_uppercase());
            slot.extend(chars.flat_map(char::to_lowercase));
        }
    }
    slot
}

/// Maps a conventional slot name back to its event name.
///
/// The name is split before every uppercase letter, the leading `on` segment
/// is dropped and the rest is joined with `_` in lowercase:
/// `"onProcessedResult"` becomes `"processed_result"`.
pub fn slot_to_event_name(slot: &str) -> String {
    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in slot.chars() {
        if c.is_uppercase() && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        segments.push(current);
    }

    segments
        .into_iter()
        .skip(1)
        .collect::<Vec<_>>()
        .join("_")
}

/// Slot name for the request side of a request/reply event.
///
/// `"sum"` becomes `"onRequestSum"`.
pub fn event_to_request_name(event: &str) -> String {
    event_to_slot_name(&format!("request_{event}"))
}
