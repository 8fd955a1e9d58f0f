//! Service-split projection for PushQL.
//!
//! Every resolvable field is either pure (expressible inside the single
//! composed query sent to the backing store) or service-dependent (needs an
//! injected runtime capability). The projector compiles one selection
//! twice: a pure pass pruned of service fields, lowered into a
//! [`StoreQuery`] with its projection [`Shape`], and a full pass kept for
//! result assembly and the in-process service resolution that follows the
//! fetch. Collapsing this into per-field resolution would forfeit the
//! query-pushdown benefit that motivates the split.

use crate::document::{Document, OperationKind};
use crate::expand::{expand_many, CompileContext, ExpandedField};
use crate::node::{NodeId, NodeKind, SelectionArena};
use crate::shape::{shape_for, Shape, ValueKind};
use indexmap::IndexMap;
use pushql_core::{Arguments, CompileError};
use pushql_schema::{SchemaProvider, TypeDef};
use std::sync::Arc;

/// One pure selection entry, as sent to the backing data context.
#[derive(Debug, Clone)]
pub struct StoreSelection {
    /// The schema field name.
    pub name: String,
    /// The key the store projects the value under (alias or name).
    pub result_key: String,
    /// Argument bindings, already variable-substituted.
    pub arguments: Arguments,
    /// The object type this field lives on.
    pub parent_type: String,
    /// Inline-fragment type condition inherited by this field, if any.
    pub type_condition: Option<String>,
    /// True when the field's outermost type wrapper is a list.
    pub is_list: bool,
    /// Nested pure selections.
    pub children: Vec<StoreSelection>,
}

/// The composed pure-pass query for one root field, executable by the
/// backing data context as a single request.
#[derive(Debug, Clone)]
pub struct StoreQuery {
    /// The root field name on the query type.
    pub name: String,
    /// Root field arguments.
    pub arguments: Arguments,
    /// The pure selection tree.
    pub selection: Vec<StoreSelection>,
    /// The projection shape the fetch materializes into.
    pub shape: Arc<Shape>,
}

/// The compiled plan for one root field of an operation.
#[derive(Debug)]
pub struct RootPlan {
    /// The root field's arena node.
    pub node: NodeId,
    /// The key this root's value appears under in the result.
    pub result_key: String,
    /// Root field arguments.
    pub arguments: Arguments,
    /// The pure-pass query; absent when nothing about this root is
    /// expressible against the store.
    pub store_query: Option<StoreQuery>,
    /// The full expanded selection, for assembly and service resolution.
    pub selection: Vec<ExpandedField>,
    /// The mutation handler to invoke first, for mutation operations.
    pub mutation: Option<String>,
    /// True when the root resolves to a sequence.
    pub is_list: bool,
}

/// A compiled, immutable execution plan for one operation.
#[derive(Debug)]
pub struct OperationPlan {
    pub kind: OperationKind,
    /// Root plans in declaration order.
    pub roots: Vec<RootPlan>,
    /// Runtime services the plan depends on, in discovery order.
    pub services: Vec<String>,
}

/// Compiles the selected operation into a two-phase plan.
///
/// Expansion runs before any backing-store interaction; every compile error
/// (undefined fragment, unknown directive, missing mutation selection)
/// surfaces here.
pub fn compile_operation(
    document: &mut Document,
    schema: &dyn SchemaProvider,
    op_index: usize,
) -> Result<OperationPlan, CompileError> {
    let kind = document.operations[op_index].kind;
    let roots = document.operations[op_index].roots.clone();
    let Document {
        arena, fragments, ..
    } = document;

    let mut ctx = CompileContext::new();
    let full = expand_many(arena, fragments, schema, &mut ctx, &roots, false)?;
    let pure = expand_many(arena, fragments, schema, &mut ctx, &roots, true)?;

    let mut plans = Vec::with_capacity(full.len());
    for root in full {
        let node = arena.node(root.id);
        let is_mutation = matches!(node.kind, NodeKind::Mutation);
        if is_mutation && root.children.is_empty() && returns_object(schema, arena, root.id) {
            return Err(CompileError::MissingResultSelection(node.name.clone()));
        }

        let pure_root = pure.iter().find(|p| p.id == root.id);
        let store_query = pure_root
            .map(|p| build_store_query(arena, schema, p))
            .transpose()?;

        let node = arena.node(root.id);
        plans.push(RootPlan {
            node: root.id,
            result_key: node.result_key().to_string(),
            arguments: node.arguments.clone(),
            store_query,
            mutation: is_mutation.then(|| node.name.clone()),
            is_list: node.field.as_ref().is_some_and(|f| f.ty.is_list()),
            selection: root.children,
        });
    }

    tracing::debug!(
        roots = plans.len(),
        services = ctx.services().count(),
        "compiled operation plan"
    );

    Ok(OperationPlan {
        kind,
        roots: plans,
        services: ctx.services().cloned().collect(),
    })
}

fn returns_object(schema: &dyn SchemaProvider, arena: &SelectionArena, id: NodeId) -> bool {
    arena
        .node(id)
        .field
        .as_ref()
        .and_then(|f| schema.type_def(f.ty.base_name()))
        .is_some_and(|t| matches!(t, TypeDef::Object(_)))
}

fn build_store_query(
    arena: &SelectionArena,
    schema: &dyn SchemaProvider,
    root: &ExpandedField,
) -> Result<StoreQuery, CompileError> {
    let node = arena.node(root.id);
    let root_type = node
        .field
        .as_ref()
        .map(|f| f.ty.base_name().to_string())
        .unwrap_or_else(|| schema.query_type().to_string());

    let selection = build_selections(arena, schema, &root.children, &root_type);
    let shape = build_shape(schema, &selection);

    Ok(StoreQuery {
        name: node.name.clone(),
        arguments: node.arguments.clone(),
        selection,
        shape,
    })
}

/// Lowers expanded pure fields into store selections, deduplicating by
/// result key (an extracted service input may repeat an explicitly
/// requested field).
fn build_selections(
    arena: &SelectionArena,
    schema: &dyn SchemaProvider,
    fields: &[ExpandedField],
    parent_type: &str,
) -> Vec<StoreSelection> {
    let mut out: IndexMap<String, StoreSelection> = IndexMap::new();
    for field in fields {
        let node = arena.node(field.id);
        let key = node.result_key().to_string();
        if out.contains_key(&key) {
            continue;
        }

        let child_type = node
            .field
            .as_ref()
            .map(|f| f.ty.base_name().to_string())
            .unwrap_or_else(|| parent_type.to_string());
        let children = build_selections(arena, schema, &field.children, &child_type);

        out.insert(
            key.clone(),
            StoreSelection {
                name: node.name.clone(),
                result_key: key,
                arguments: node.arguments.clone(),
                parent_type: parent_type.to_string(),
                type_condition: field.type_condition.clone(),
                is_list: node.field.as_ref().is_some_and(|f| f.ty.is_list()),
                children,
            },
        );
    }
    out.into_values().collect()
}

/// Builds the projection shape for a pure selection.
///
/// Fields carrying an inline-fragment type condition specialize a base
/// shape built from the unconditional fields, so a polymorphic selection
/// reuses the shared members.
fn build_shape(schema: &dyn SchemaProvider, selection: &[StoreSelection]) -> Arc<Shape> {
    let mut unconditional = Vec::new();
    let mut conditional = Vec::new();
    for sel in selection {
        let entry = (sel.result_key.clone(), selection_kind(schema, sel));
        if sel.type_condition.is_some() {
            conditional.push(entry);
        } else {
            unconditional.push(entry);
        }
    }

    let base = shape_for(&unconditional, None);
    if conditional.is_empty() {
        base
    } else {
        shape_for(&conditional, Some(&base))
    }
}

fn selection_kind(schema: &dyn SchemaProvider, sel: &StoreSelection) -> ValueKind {
    let kind = if sel.children.is_empty() {
        let scalar = sel
            .name
            .strip_prefix("__")
            .map(|_| "String".to_string())
            .or_else(|| {
                schema
                    .field(&sel.parent_type, &sel.name)
                    .map(|f| f.ty.base_name().to_string())
            })
            .unwrap_or_else(|| "String".to_string());
        ValueKind::Scalar(scalar)
    } else {
        ValueKind::Object(build_shape(schema, &sel.children))
    };
    if sel.is_list {
        ValueKind::list(kind)
    } else {
        kind
    }
}
