//! Selection arena for PushQL.
//!
//! Field nodes live in an arena owned by the document; parent relationships
//! are stored as indices rather than ownership edges, so service-dependence
//! discovered late (inside a fragment expanded after the operation was
//! lowered) can still be propagated to already-visited ancestors.

use pushql_core::Arguments;
use pushql_schema::{DirectiveLocation, FieldDef};

/// An index into a [`SelectionArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a NodeId from a raw value.
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

/// What a selection node stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A plain field selection.
    Field,
    /// A named fragment spread, resolved lazily at expansion time.
    FragmentSpread { fragment: String },
    /// An inline fragment with an optional type condition.
    InlineFragment { type_condition: Option<String> },
    /// A mutation root field; its children are the result selection.
    Mutation,
}

/// A directive applied to a selection node.
#[derive(Debug, Clone)]
pub struct DirectiveApplication {
    /// The directive name, without the leading `@`.
    pub name: String,
    /// Where the application sits.
    pub location: DirectiveLocation,
    /// Argument values, already variable-substituted.
    pub arguments: Arguments,
}

/// The unit of compilation: a named selection with arguments, sub-selections
/// and resolved schema metadata.
#[derive(Debug, Clone)]
pub struct FieldNode {
    /// The field name as written in the document.
    pub name: String,
    /// The response alias, if any.
    pub alias: Option<String>,
    /// What this node stands for.
    pub kind: NodeKind,
    /// Resolved schema field metadata; absent for structural nodes such as
    /// fragment spreads, inline fragments and `__typename`.
    pub field: Option<FieldDef>,
    /// Argument bindings, already variable-substituted.
    pub arguments: Arguments,
    /// Directive applications on this node.
    pub directives: Vec<DirectiveApplication>,
    /// The parent node, as an arena index.
    pub parent: Option<NodeId>,
    /// Child selections, in declaration order.
    pub children: Vec<NodeId>,
    /// True when resolving this node or any descendant requires a runtime
    /// service.
    pub has_services: bool,
}

impl FieldNode {
    /// Creates a plain field node.
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            kind: NodeKind::Field,
            field: None,
            arguments: Arguments::new(),
            directives: Vec::new(),
            parent: None,
            children: Vec::new(),
            has_services: false,
        }
    }

    /// The key this node's value appears under in the result.
    pub fn result_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// True when this node's own schema field declares services (as opposed
    /// to a descendant doing so).
    pub fn is_service_field(&self) -> bool {
        self.field.as_ref().is_some_and(FieldDef::has_services)
    }
}

/// The arena all selection nodes of one document live in.
#[derive(Debug, Default)]
pub struct SelectionArena {
    nodes: Vec<FieldNode>,
}

impl SelectionArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a node, returning its id.
    pub fn alloc(&mut self, node: FieldNode) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(node);
        id
    }

    /// Gets a node.
    pub fn node(&self, id: NodeId) -> &FieldNode {
        &self.nodes[id.0 as usize]
    }

    /// Gets a node mutably.
    pub fn node_mut(&mut self, id: NodeId) -> &mut FieldNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Returns the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Marks a node and every ancestor as service-dependent.
    pub fn mark_services_upward(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(id) = current {
            let node = self.node_mut(id);
            if node.has_services {
                break;
            }
            node.has_services = true;
            current = node.parent;
        }
    }

    /// True when the node or any descendant carries the service flag.
    pub fn has_services_at_or_below(&self, id: NodeId) -> bool {
        let node = self.node(id);
        node.has_services
            || node
                .children
                .iter()
                .any(|&child| self.has_services_at_or_below(child))
    }
}
