//! Runtime shape builder for PushQL.
//!
//! A shape is the structural descriptor of a projection target: exactly the
//! members the pure pass will fetch, in requested order. Shapes are keyed by
//! the sorted (field name, value kind) set plus the base-shape identity, so
//! two queries requesting the same field set in different textual order
//! reuse one cached shape. Shape identifiers are short synthetic names; the
//! full structural key maps to the short id so repeat lookups are O(1).
//!
//! Shapes are immutable once created and cached for the process lifetime
//! behind a single lock: the set of distinct shapes is bounded by the set of
//! distinct query shapes ever executed, not by request volume.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// The kind of value a shape member holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// A scalar, by schema type name.
    Scalar(String),
    /// A nested object of the given shape.
    Object(Arc<Shape>),
    /// A list of the inner kind.
    List(Box<ValueKind>),
}

impl ValueKind {
    /// Creates a scalar kind.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::Scalar(name.into())
    }

    /// Creates a list kind.
    pub fn list(inner: ValueKind) -> Self {
        Self::List(Box::new(inner))
    }

    fn key_fragment(&self) -> String {
        match self {
            Self::Scalar(name) => name.clone(),
            Self::Object(shape) => format!("obj({})", shape.id()),
            Self::List(inner) => format!("list({})", inner.key_fragment()),
        }
    }
}

/// A generated structural result shape.
#[derive(Debug, PartialEq, Eq)]
pub struct Shape {
    id: String,
    fields: IndexMap<String, ValueKind>,
    base: Option<Arc<Shape>>,
}

impl Shape {
    /// The short synthetic identifier of this shape.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The members defined directly on this shape, in requested order.
    pub fn own_fields(&self) -> impl Iterator<Item = (&String, &ValueKind)> {
        self.fields.iter()
    }

    /// The base shape this one specializes, if any.
    pub fn base(&self) -> Option<&Arc<Shape>> {
        self.base.as_ref()
    }

    /// True when this shape or its base chain defines the member.
    pub fn defines(&self, name: &str) -> bool {
        self.fields.contains_key(name)
            || self.base.as_ref().is_some_and(|b| b.defines(name))
    }

    /// Gets a member's kind, searching the base chain.
    pub fn field_kind(&self, name: &str) -> Option<&ValueKind> {
        self.fields
            .get(name)
            .or_else(|| self.base.as_ref().and_then(|b| b.field_kind(name)))
    }

    /// The number of members, including inherited ones.
    pub fn len(&self) -> usize {
        self.fields.len() + self.base.as_ref().map_or(0, |b| b.len())
    }

    /// True when no members are defined anywhere in the chain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The process-wide shape cache.
///
/// Lookup and definition are serialized behind one lock, held only while
/// consulting or extending the registry, never during query execution.
#[derive(Debug, Default)]
pub struct ShapeRegistry {
    /// Full structural key → short shape id.
    key_to_id: FxHashMap<String, String>,
    /// Short shape id → shape.
    shapes: FxHashMap<String, Arc<Shape>>,
    next: u32,
}

impl ShapeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached shape for the field set, building it on first
    /// request.
    ///
    /// Members already defined on `base` are not redefined on the new shape.
    pub fn get_or_build(
        &mut self,
        fields: &[(String, ValueKind)],
        base: Option<&Arc<Shape>>,
    ) -> Arc<Shape> {
        let key = Self::structural_key(fields, base);
        if let Some(id) = self.key_to_id.get(&key) {
            if let Some(shape) = self.shapes.get(id) {
                return Arc::clone(shape);
            }
        }

        let id = format!("S{}", self.next);
        self.next += 1;

        let own: IndexMap<String, ValueKind> = fields
            .iter()
            .filter(|(name, _)| !base.is_some_and(|b| b.defines(name)))
            .map(|(name, kind)| (name.clone(), kind.clone()))
            .collect();

        tracing::debug!(shape = %id, members = own.len(), "building runtime shape");

        let shape = Arc::new(Shape {
            id: id.clone(),
            fields: own,
            base: base.cloned(),
        });
        self.key_to_id.insert(key, id.clone());
        self.shapes.insert(id, Arc::clone(&shape));
        shape
    }

    /// The number of distinct shapes built so far.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// True when no shape has been built yet.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    fn structural_key(fields: &[(String, ValueKind)], base: Option<&Arc<Shape>>) -> String {
        let mut parts: Vec<String> = fields
            .iter()
            .map(|(name, kind)| format!("{name}:{}", kind.key_fragment()))
            .collect();
        parts.sort_unstable();
        let mut key = parts.join("|");
        if let Some(base) = base {
            key.push('^');
            key.push_str(base.id());
        }
        key
    }
}

fn registry() -> &'static Mutex<ShapeRegistry> {
    static REGISTRY: OnceLock<Mutex<ShapeRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(ShapeRegistry::new()))
}

/// Builds or retrieves a shape from the process-wide cache.
pub fn shape_for(fields: &[(String, ValueKind)], base: Option<&Arc<Shape>>) -> Arc<Shape> {
    registry()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get_or_build(fields, base)
}
