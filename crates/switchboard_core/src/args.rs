//! # Invocation Arguments
//!
//! Every signal invocation carries an [`Args`] value: an ordered list of
//! positional values and a map of named values, both as `serde_json::Value`.
//! Name-based wiring, inbound delivery from a transport and the one-shot
//! adapter all share this single dynamic shape, and handlers recover typed
//! values through [`Args::arg`] and [`Args::named_arg`].

use crate::error::SlotError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use serde_json::{Map, Value};

/// Positional and named arguments of a single invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Args {
    /// Positional arguments in call order
    #[serde(default)]
    pub positional: Vec<Value>,
    /// Named arguments
    #[serde(default)]
    pub named: Map<String, Value>,
}

impl Args {
    /// Creates an empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an argument set from positional values only.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            named: Map::new(),
        }
    }

    /// Appends a positional value.
    pub fn with(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Sets a named value, replacing any previous value under `key`.
    pub fn with_named(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(key.into(), value.into());
        self
    }

    /// Returns the positional value at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Returns the named value under `key`.
    pub fn get_named(&self, key: &str) -> Option<&Value> {
        self.named.get(key)
    }

    /// Total number of positional and named values.
    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Deserializes the positional value at `index` into `T`.
    ///
    /// # Returns
    ///
    /// `SlotError::MissingArgument` when there is no value at `index`, or
    /// `SlotError::InvalidArgument` when it does not deserialize into `T`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, SlotError> {
        let value = self
            .positional
            .get(index)
            .ok_or_else(|| SlotError::MissingArgument(format!("#{index}")))?;
        T::deserialize(value).map_err(|e| SlotError::InvalidArgument {
            name: format!("#{index}"),
            reason: e.to_string(),
        })
    }

    /// Deserializes the named value under `key` into `T`.
    pub fn named_arg<T: DeserializeOwned>(&self, key: &str) -> Result<T, SlotError> {
        let value = self
            .named
            .get(key)
            .ok_or_else(|| SlotError::MissingArgument(key.to_string()))?;
        T::deserialize(value).map_err(|e| SlotError::InvalidArgument {
            name: key.to_string(),
            reason: e.to_string(),
        })
    }
}

impl From<Vec<Value>> for Args {
    fn from(positional: Vec<Value>) -> Self {
        Self {
            positional,
            named: Map::new(),
        }
    }
}

impl From<Map<String, Value>> for Args {
    fn from(named: Map<String, Value>) -> Self {
        Self {
            positional: Vec::new(),
            named,
        }
    }
}

/// Builds an [`Args`] value.
///
/// Positional values come first, named values follow a `;`:
///
/// ```
/// use switchboard_core::args;
///
/// let a = args!["x", 2];
/// let b = args!["x"; flag => true];
/// let c = args![; x => 1];
/// assert_eq!(a.positional.len(), 2);
/// assert_eq!(b.named.len(), 1);
/// assert!(c.positional.is_empty());
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::Args::new()
    };
    (; $($key:ident => $value:expr),+ $(,)?) => {
        $crate::Args::new()$(.with_named(stringify!($key), $value))+
    };
    ($($pos:expr),+ ; $($key:ident => $value:expr),+ $(,)?) => {
        $crate::Args::new()$(.with($pos))+$(.with_named(stringify!($key), $value))+
    };
    ($($pos:expr),+ $(,)?) => {
        $crate::Args::new()$(.with($pos))+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_macro_shapes() {
        assert!(args![].is_empty());

        let a = args!["a", 2];
        assert_eq!(a.positional, vec![json!("a"), json!(2)]);
        assert!(a.named.is_empty());

        let b = args![1; key => "v"];
        assert_eq!(b.positional, vec![json!(1)]);
        assert_eq!(b.get_named("key"), Some(&json!("v")));

        let c = args![; x => 1, y => 2];
        assert!(c.positional.is_empty());
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_typed_accessors() {
        let args = args![3, "three"; scale => 1.5];
        assert_eq!(args.arg::<u32>(0).unwrap(), 3);
        assert_eq!(args.arg::<String>(1).unwrap(), "three");
        assert_eq!(args.named_arg::<f64>("scale").unwrap(), 1.5);

        assert_eq!(
            args.arg::<u32>(5),
            Err(SlotError::MissingArgument("#5".to_string()))
        );
        assert!(matches!(
            args.arg::<u32>(1),
            Err(SlotError::InvalidArgument { .. })
        ));
        assert!(matches!(
            args.named_arg::<u32>("missing"),
            Err(SlotError::MissingArgument(_))
        ));
    }

    #[test]
    fn test_serde_shape() {
        let args = args!["p"; n => 1];
        let encoded = serde_json::to_value(&args).unwrap();
        assert_eq!(encoded, json!({"positional": ["p"], "named": {"n": 1}}));

        let decoded: Args = serde_json::from_value(json!({"positional": [1]})).unwrap();
        assert_eq!(decoded, Args::positional([1]));
    }
}
