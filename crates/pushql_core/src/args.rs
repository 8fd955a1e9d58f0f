//! Argument bags for PushQL.
//!
//! Arguments are carried in declaration order, with values already
//! variable-substituted by the time they reach the compiler.

use indexmap::IndexMap;
use serde_json::Value;

/// An error accessing an argument.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    /// The argument was not supplied.
    #[error("missing required argument: {0}")]
    Missing(String),

    /// The argument value could not be converted to the requested type.
    #[error("failed to parse argument '{name}': {reason}")]
    Parse { name: String, reason: String },
}

/// An ordered name → value argument bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    args: IndexMap<String, Value>,
}

impl Arguments {
    /// Creates an empty argument bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an argument bag from (name, value) pairs, preserving order.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            args: pairs.into_iter().collect(),
        }
    }

    /// Sets an argument.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.args.insert(name.into(), value);
    }

    /// Gets an argument by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Gets an argument converted to a specific type.
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.args
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Gets a required argument, failing when absent or malformed.
    pub fn require<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T, ArgumentError> {
        self.args
            .get(name)
            .ok_or_else(|| ArgumentError::Missing(name.to_string()))
            .and_then(|v| {
                serde_json::from_value(v.clone()).map_err(|e| ArgumentError::Parse {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            })
    }

    /// Returns an iterator over (name, value) pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.args.iter()
    }

    /// Returns true if no arguments are present.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Returns the number of arguments.
    pub fn len(&self) -> usize {
        self.args.len()
    }
}

impl FromIterator<(String, Value)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_preserve_order() {
        let args = Arguments::from_pairs([
            ("b".to_string(), serde_json::json!(1)),
            ("a".to_string(), serde_json::json!(2)),
        ]);

        let names: Vec<&String> = args.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn test_require() {
        let mut args = Arguments::new();
        args.set("id", serde_json::json!(42));

        assert_eq!(args.require::<i64>("id"), Ok(42));
        assert_eq!(
            args.require::<i64>("missing"),
            Err(ArgumentError::Missing("missing".to_string()))
        );
        assert!(matches!(
            args.require::<String>("id"),
            Err(ArgumentError::Parse { .. })
        ));
    }

    #[test]
    fn test_get_as() {
        let mut args = Arguments::new();
        args.set("name", serde_json::json!("x"));

        assert_eq!(args.get_as::<String>("name"), Some("x".to_string()));
        assert_eq!(args.get_as::<String>("missing"), None);
    }
}
