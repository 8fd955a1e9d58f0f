//! Query compilation for PushQL.
//!
//! This crate provides:
//! - `lower`: Parsed-text to document lowering
//! - `node`: Selection arena and field nodes
//! - `document`: Operations, fragments and operation selection
//! - `expand`: Fragment resolution and directive evaluation
//! - `plan`: Pure/service split and store query planning
//! - `shape`: Cached structural result shapes

pub mod document;
pub mod expand;
pub mod lower;
pub mod node;
pub mod plan;
pub mod shape;

pub use document::{Document, Fragment, Operation, OperationKind, VariableDef};
pub use expand::{CompileContext, ExpandedField};
pub use lower::lower_source;
pub use node::{DirectiveApplication, FieldNode, NodeId, NodeKind, SelectionArena};
pub use plan::{compile_operation, OperationPlan, RootPlan, StoreQuery, StoreSelection};
pub use shape::{shape_for, Shape, ShapeRegistry, ValueKind};
