//! Error taxonomy for PushQL.
//!
//! Three failure classes exist with different blast radii:
//! - [`CompileError`]: fatal to the whole document, raised before any
//!   backing-store interaction
//! - [`ProviderError`]: fatal to the owning operation, reported in the
//!   result envelope
//! - [`ServiceError`]: fatal to the owning field only; sibling fields still
//!   resolve
//!
//! [`GraphQLError`] is the wire-level form that ends up in the `errors` key
//! of a response.

use crate::args::ArgumentError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An error raised while compiling a document into an execution plan.
///
/// Compile errors abort the whole document before the backing store is
/// touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// The document text failed to parse.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// A fragment spread referenced a fragment not defined in the document.
    #[error("fragment '{0}' not found in query document")]
    UndefinedFragment(String),

    /// A selection named a field the schema does not declare.
    #[error("field '{field}' not found on type '{type_name}'")]
    UnknownField { type_name: String, field: String },

    /// A selection or operation referenced a type the schema does not declare.
    #[error("type '{0}' not found in schema")]
    UnknownType(String),

    /// More than one operation is present but at least one is unnamed.
    #[error("an operation name must be defined for all operations if there are multiple operations in the request")]
    UnnamedOperations,

    /// The requested operation name matched no operation in the document.
    #[error("operation '{0}' not found in query document")]
    UnknownOperation(String),

    /// The document contains no executable operation.
    #[error("no operation found in query document")]
    NoOperation,

    /// The document used an operation kind this engine does not execute.
    #[error("{0} operations are not supported")]
    UnsupportedOperation(String),

    /// A directive application named a directive the schema does not register.
    #[error("directive '@{0}' is not registered on the schema")]
    UnknownDirective(String),

    /// A directive was applied at a location it does not support.
    #[error("directive '@{directive}' is not valid at location {location}")]
    InvalidDirectiveLocation { directive: String, location: String },

    /// A directive was applied with missing or malformed arguments.
    #[error("invalid arguments for directive '@{directive}': {reason}")]
    InvalidDirectiveArguments { directive: String, reason: String },

    /// A variable used in an argument was not supplied and has no default.
    #[error("variable '${0}' was not supplied and has no default value")]
    UndefinedVariable(String),

    /// A mutation field has no result selection to execute.
    #[error("mutation '{0}' should have a result selection")]
    MissingResultSelection(String),
}

/// An error from the backing data provider.
///
/// Provider errors are fatal to the owning operation and are reported in the
/// result envelope, never retried by this layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The backing fetch failed.
    #[error("backing provider fetch failed: {0}")]
    Fetch(String),

    /// The provider returned a value of an unexpected cardinality or shape.
    #[error("backing provider returned an unexpected result: {0}")]
    UnexpectedResult(String),
}

/// An error raised while resolving a service-dependent field.
///
/// Service errors are attached at the failing field's result position;
/// sibling fields still resolve unless strict mode is enabled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The required service was not registered in the active scope.
    #[error("service '{0}' is not registered in the active scope")]
    NotRegistered(String),

    /// The service was invoked and failed.
    #[error("service '{service}' failed: {message}")]
    Failed { service: String, message: String },

    /// An argument required by the service was missing or malformed.
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    /// Any other service failure.
    #[error("{0}")]
    Custom(String),
}

impl ServiceError {
    /// Creates a failure error for a named service.
    pub fn failed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            service: service.into(),
            message: message.into(),
        }
    }
}

/// A path segment locating a value inside a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl PathSegment {
    /// Creates a field segment.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }
}

/// An error as reported in a result envelope's `errors` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    /// The error message.
    pub message: String,
    /// The path to the field that failed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    /// Error extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<HashMap<String, serde_json::Value>>,
}

impl GraphQLError {
    /// Creates a new error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            extensions: None,
        }
    }

    /// Attaches the result path where the error occurred.
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = Some(path);
        self
    }

    /// Adds an extension entry.
    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    /// Sets the error code extension.
    pub fn with_code(self, code: impl Into<String>) -> Self {
        self.with_extension("code", serde_json::Value::String(code.into()))
    }
}

impl From<ProviderError> for GraphQLError {
    fn from(error: ProviderError) -> Self {
        GraphQLError::new(error.to_string()).with_code("PROVIDER_ERROR")
    }
}

impl From<ServiceError> for GraphQLError {
    fn from(error: ServiceError) -> Self {
        let code = match &error {
            ServiceError::NotRegistered(_) => "SERVICE_NOT_CONFIGURED",
            _ => "SERVICE_ERROR",
        };
        GraphQLError::new(error.to_string()).with_code(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_display() {
        let err = CompileError::UndefinedFragment("frag1".to_string());
        assert_eq!(err.to_string(), "fragment 'frag1' not found in query document");
    }

    #[test]
    fn test_graphql_error_builders() {
        let error = GraphQLError::new("boom")
            .with_path(vec![PathSegment::field("people"), PathSegment::Index(2)])
            .with_code("SERVICE_ERROR");

        assert_eq!(error.message, "boom");
        assert_eq!(error.path.as_ref().map(Vec::len), Some(2));
        assert!(error.extensions.is_some());
    }

    #[test]
    fn test_service_error_converts_with_code() {
        let gql: GraphQLError = ServiceError::NotRegistered("ageService".to_string()).into();
        let code = gql
            .extensions
            .and_then(|e| e.get("code").cloned())
            .expect("should have a code");
        assert_eq!(code, serde_json::json!("SERVICE_NOT_CONFIGURED"));
    }

    #[test]
    fn test_path_segment_serializes_untagged() {
        let path = vec![PathSegment::field("people"), PathSegment::Index(0)];
        let json = serde_json::to_value(&path).expect("should serialize");
        assert_eq!(json, serde_json::json!(["people", 0]));
    }
}
