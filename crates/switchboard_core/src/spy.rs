//! Recording receiver for tests and debugging.

use crate::args::{Args, Value};
use crate::slot::Slot;
use crate::traits::Receiver;
use crate::utils::lock;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A [`Receiver`] whose slots record every call they receive.
///
/// Each slot appends its arguments to a per-slot list and to a shared
/// history that keeps the global arrival order. Slots return `null`.
pub struct Spy {
    slots: HashMap<String, Slot>,
    calls: Arc<DashMap<String, Vec<Args>>>,
    history: Arc<Mutex<Vec<(String, Args)>>>,
}

impl Spy {
    pub fn new<I, S>(slot_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let calls: Arc<DashMap<String, Vec<Args>>> = Arc::new(DashMap::new());
        let history: Arc<Mutex<Vec<(String, Args)>>> = Arc::new(Mutex::new(Vec::new()));

        let slots = slot_names
            .into_iter()
            .map(|name| {
                let name = name.as_ref().to_string();
                let calls = calls.clone();
                let history = history.clone();
                let label = name.clone();
                let slot = Slot::new(name.as_str(), move |args: Args| {
                    lock(&history).push((label.clone(), args.clone()));
                    calls.entry(label.clone()).or_default().push(args);
                    Ok(Value::Null)
                });
                (name, slot)
            })
            .collect();

        Self {
            slots,
            calls,
            history,
        }
    }

    /// Arguments of every call `slot` received, oldest first.
    pub fn calls(&self, slot: &str) -> Vec<Args> {
        self.calls
            .get(slot)
            .map(|calls| calls.value().clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self, slot: &str) -> usize {
        self.calls.get(slot).map(|calls| calls.len()).unwrap_or(0)
    }

    /// Every call to any slot, in arrival order.
    pub fn history(&self) -> Vec<(String, Args)> {
        lock(&self.history).clone()
    }

    /// Slot names of [`Spy::history`].
    pub fn history_names(&self) -> Vec<String> {
        lock(&self.history)
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.calls.clear();
        lock(&self.history).clear();
    }
}

impl Receiver for Spy {
    fn receiver_name(&self) -> &str {
        "spy"
    }

    fn slot(&self, name: &str) -> Option<Slot> {
        self.slots.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;

    #[test]
    fn test_records_per_slot_and_in_order() {
        let spy = Spy::new(["onA", "onB"]);
        let a = spy.slot("onA").unwrap();
        let b = spy.slot("onB").unwrap();

        a.call(args![1]);
        b.call(args!["two"; flag => true]);
        a.call(args![3]);

        assert_eq!(spy.calls("onA"), vec![args![1], args![3]]);
        assert_eq!(spy.call_count("onB"), 1);
        assert_eq!(spy.call_count("onC"), 0);
        assert_eq!(spy.history_names(), vec!["onA", "onB", "onA"]);

        spy.clear();
        assert!(spy.history().is_empty());
        assert!(spy.slot("onC").is_none());
    }
}
