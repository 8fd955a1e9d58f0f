//! Executable document model for PushQL.
//!
//! A document owns one selection arena shared by all of its operations and
//! fragments. Fragments may be declared after the operation that references
//! them; resolution happens lazily at expansion time.

use crate::node::{NodeId, SelectionArena};
use pushql_core::CompileError;

/// The kind of a top-level operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

/// A variable declared on an operation.
#[derive(Debug, Clone)]
pub struct VariableDef {
    pub name: String,
    pub ty: String,
    pub default_value: Option<serde_json::Value>,
}

/// A top-level query or mutation.
#[derive(Debug)]
pub struct Operation {
    /// The operation name; required when the document has several
    /// operations.
    pub name: Option<String>,
    pub kind: OperationKind,
    /// Root selection, in declaration order.
    pub roots: Vec<NodeId>,
    pub variables: Vec<VariableDef>,
}

/// A named, reusable selection fragment bound to a target type.
#[derive(Debug)]
pub struct Fragment {
    pub name: String,
    pub type_condition: String,
    /// The fragment's fields, in declaration order.
    pub roots: Vec<NodeId>,
}

/// Top level result of lowering a parsed query document.
///
/// Contains the operations defined in the document (queries or mutations)
/// and the fragments they may reference.
#[derive(Debug, Default)]
pub struct Document {
    pub arena: SelectionArena,
    pub operations: Vec<Operation>,
    pub fragments: Vec<Fragment>,
}

impl Document {
    /// Selects the operation to execute.
    ///
    /// With more than one operation present every operation must be named;
    /// that check fails before any execution. An explicit name must match;
    /// without one the first operation runs.
    pub fn select_operation(&self, name: Option<&str>) -> Result<usize, CompileError> {
        if self.operations.is_empty() {
            return Err(CompileError::NoOperation);
        }
        if self.operations.len() > 1
            && self
                .operations
                .iter()
                .any(|op| op.name.as_deref().unwrap_or("").is_empty())
        {
            return Err(CompileError::UnnamedOperations);
        }
        match name {
            Some(wanted) if !wanted.is_empty() => self
                .operations
                .iter()
                .position(|op| op.name.as_deref() == Some(wanted))
                .ok_or_else(|| CompileError::UnknownOperation(wanted.to_string())),
            _ => Ok(0),
        }
    }

    /// Looks up a fragment by name.
    pub fn fragment(&self, name: &str) -> Option<&Fragment> {
        self.fragments.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operation(name: Option<&str>) -> Operation {
        Operation {
            name: name.map(str::to_string),
            kind: OperationKind::Query,
            roots: Vec::new(),
            variables: Vec::new(),
        }
    }

    #[test]
    fn test_select_sole_operation() {
        let doc = Document {
            operations: vec![operation(None)],
            ..Document::default()
        };

        assert_eq!(doc.select_operation(None), Ok(0));
    }

    #[test]
    fn test_select_by_name() {
        let doc = Document {
            operations: vec![operation(Some("Op1")), operation(Some("Op2"))],
            ..Document::default()
        };

        assert_eq!(doc.select_operation(Some("Op2")), Ok(1));
        assert_eq!(
            doc.select_operation(Some("Op3")),
            Err(CompileError::UnknownOperation("Op3".to_string()))
        );
    }

    #[test]
    fn test_multiple_operations_require_names() {
        let doc = Document {
            operations: vec![operation(Some("Op1")), operation(None)],
            ..Document::default()
        };

        assert_eq!(
            doc.select_operation(None),
            Err(CompileError::UnnamedOperations)
        );
        // Even an explicit name does not excuse the unnamed sibling.
        assert_eq!(
            doc.select_operation(Some("Op1")),
            Err(CompileError::UnnamedOperations)
        );
    }

    #[test]
    fn test_empty_document() {
        let doc = Document::default();
        assert_eq!(doc.select_operation(None), Err(CompileError::NoOperation));
    }
}
