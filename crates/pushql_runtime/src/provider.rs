//! Backing data context contract and the in-memory implementation.
//!
//! A data context answers one composed [`StoreQuery`] per root field; the
//! engine never issues per-element follow-up fetches. The in-memory context
//! exists for tests and demos; a production context would translate the
//! store query into its own query language.

use async_trait::async_trait;
use indexmap::IndexMap;
use pushql_compiler::{StoreQuery, StoreSelection};
use pushql_core::ProviderError;
use serde_json::Value;

/// Fetches data for the pure pass of an operation.
#[async_trait]
pub trait DataContext: Send + Sync {
    /// Executes one composed store query and returns the projected value.
    ///
    /// The returned value must contain exactly the selection's result keys;
    /// the engine reads nothing else from it.
    async fn fetch(&self, query: &StoreQuery) -> Result<Value, ProviderError>;
}

/// An in-memory data context over named collections.
///
/// Root field arguments filter by member equality; an `id` argument selects
/// a single element instead of a list.
#[derive(Debug, Default)]
pub struct MemoryContext {
    collections: IndexMap<String, Value>,
}

impl MemoryContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a collection under a root field name.
    pub fn with_collection(mut self, name: impl Into<String>, value: Value) -> Self {
        self.collections.insert(name.into(), value);
        self
    }
}

#[async_trait]
impl DataContext for MemoryContext {
    async fn fetch(&self, query: &StoreQuery) -> Result<Value, ProviderError> {
        let stored = self
            .collections
            .get(&query.name)
            .ok_or_else(|| ProviderError::Fetch(format!("no collection '{}'", query.name)))?;

        let matched = match stored {
            Value::Array(items) => {
                let filtered: Vec<&Value> = items
                    .iter()
                    .filter(|item| {
                        query
                            .arguments
                            .iter()
                            .all(|(name, wanted)| item.get(name) == Some(wanted))
                    })
                    .collect();
                if query.arguments.get("id").is_some() {
                    filtered.first().map(|v| (*v).clone()).unwrap_or(Value::Null)
                } else {
                    Value::Array(filtered.into_iter().cloned().collect())
                }
            }
            _ if !query.arguments.is_empty() => {
                return Err(ProviderError::UnexpectedResult(format!(
                    "collection '{}' is not a list and cannot be filtered",
                    query.name
                )));
            }
            other => other.clone(),
        };

        tracing::debug!(root = %query.name, shape = %query.shape.id(), "memory fetch");
        Ok(project(&query.selection, &matched))
    }
}

/// Projects a raw value through a pure selection: aliases applied, only
/// selected members kept, `__typename` synthesized from the selection's
/// parent type.
///
/// Also used to project a mutation handler's returned value before the
/// result selection is assembled.
pub fn project(selection: &[StoreSelection], value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| project(selection, item)).collect())
        }
        Value::Object(_) if !selection.is_empty() => {
            let mut out = serde_json::Map::new();
            for sel in selection {
                if let Some(condition) = &sel.type_condition {
                    let type_name = value.get("__typename").and_then(Value::as_str);
                    if type_name.is_some_and(|t| t != condition) {
                        continue;
                    }
                }
                let projected = if sel.name == "__typename" {
                    value
                        .get("__typename")
                        .cloned()
                        .unwrap_or_else(|| Value::String(sel.parent_type.clone()))
                } else {
                    match value.get(&sel.name) {
                        Some(member) if !sel.children.is_empty() => {
                            project(&sel.children, member)
                        }
                        Some(member) => member.clone(),
                        None => Value::Null,
                    }
                };
                out.insert(sel.result_key.clone(), projected);
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}
