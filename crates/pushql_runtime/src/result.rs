//! Result envelope for executed operations.

use indexmap::IndexMap;
use pushql_core::GraphQLError;
use serde::Serialize;
use serde_json::Value;

/// The outcome of executing one operation.
///
/// `data` holds one entry per root field, in declaration order. When the
/// execution produced nothing but errors the key is omitted entirely rather
/// than serialized as null.
#[derive(Debug, Default, Serialize)]
pub struct QueryResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<IndexMap<String, Value>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

impl QueryResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a result holding a single error and no data.
    pub fn from_error(error: impl Into<GraphQLError>) -> Self {
        Self {
            data: None,
            errors: vec![error.into()],
        }
    }

    /// Inserts a root field value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.data
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value);
    }

    /// Appends an error.
    pub fn add_error(&mut self, error: impl Into<GraphQLError>) {
        self.errors.push(error.into());
    }

    /// Merges externally collected errors (a host's document validator, for
    /// instance) ahead of the execution's own.
    pub fn merge_errors(&mut self, errors: impl IntoIterator<Item = GraphQLError>) {
        let mut merged: Vec<GraphQLError> = errors.into_iter().collect();
        merged.append(&mut self.errors);
        self.errors = merged;
    }

    /// True when no error was recorded.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}
