//! Schema provider contract and the in-memory schema.

use crate::directive::{DirectiveProcessor, IncludeDirective, SkipDirective};
use crate::types::{FieldDef, ObjectDef, ScalarDef, TypeDef};
use indexmap::IndexMap;
use std::sync::Arc;

/// Supplies type and field metadata during compilation.
///
/// Implementations must answer deterministically for the duration of one
/// compilation.
pub trait SchemaProvider: Send + Sync {
    /// Returns true if the schema declares a type with this name.
    fn has_type(&self, name: &str) -> bool;

    /// Gets a type definition by name.
    fn type_def(&self, name: &str) -> Option<&TypeDef>;

    /// Returns the name of the root query type.
    fn query_type(&self) -> &str;

    /// Returns the name of the root mutation type, if mutations exist.
    fn mutation_type(&self) -> Option<&str>;

    /// Gets a registered directive processor by name.
    fn directive(&self, name: &str) -> Option<&dyn DirectiveProcessor>;

    /// Gets the fields of an object type.
    fn fields(&self, type_name: &str) -> Option<&IndexMap<String, FieldDef>> {
        self.type_def(type_name).and_then(TypeDef::fields)
    }

    /// Gets a field definition on a type.
    fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDef> {
        self.fields(type_name).and_then(|f| f.get(field_name))
    }
}

/// An in-memory schema.
#[derive(Clone, Default)]
pub struct Schema {
    query_type: String,
    mutation_type: Option<String>,
    types: IndexMap<String, TypeDef>,
    directives: IndexMap<String, Arc<dyn DirectiveProcessor>>,
}

impl Schema {
    /// Starts building a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Returns all types in declaration order.
    pub fn types(&self) -> impl Iterator<Item = (&String, &TypeDef)> {
        self.types.iter()
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("query_type", &self.query_type)
            .field("mutation_type", &self.mutation_type)
            .field("type_count", &self.types.len())
            .field("directives", &self.directives.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SchemaProvider for Schema {
    fn has_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    fn query_type(&self) -> &str {
        &self.query_type
    }

    fn mutation_type(&self) -> Option<&str> {
        self.mutation_type.as_deref()
    }

    fn directive(&self, name: &str) -> Option<&dyn DirectiveProcessor> {
        self.directives.get(name).map(|d| d.as_ref())
    }
}

/// Schema builder.
///
/// Registers the built-in scalars and the `@include` / `@skip` directive
/// processors up front.
pub struct SchemaBuilder {
    schema: Schema,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    /// Creates a new schema builder.
    pub fn new() -> Self {
        let mut schema = Schema {
            query_type: "Query".to_string(),
            ..Schema::default()
        };
        for name in ["Int", "Float", "String", "Boolean", "ID"] {
            schema.types.insert(
                name.to_string(),
                TypeDef::Scalar(ScalarDef {
                    name: name.to_string(),
                    description: Some(format!("Built-in {name} scalar")),
                }),
            );
        }
        let mut builder = Self { schema };
        builder = builder
            .add_directive(Arc::new(IncludeDirective))
            .add_directive(Arc::new(SkipDirective));
        builder
    }

    /// Sets the root query type name.
    pub fn query_type(mut self, name: impl Into<String>) -> Self {
        self.schema.query_type = name.into();
        self
    }

    /// Sets the root mutation type name.
    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.schema.mutation_type = Some(name.into());
        self
    }

    /// Adds a type.
    pub fn add_type(mut self, type_def: TypeDef) -> Self {
        self.schema
            .types
            .insert(type_def.name().to_string(), type_def);
        self
    }

    /// Adds an object type.
    pub fn add_object(self, object: ObjectDef) -> Self {
        self.add_type(TypeDef::Object(object))
    }

    /// Registers a directive processor, keyed by its name.
    pub fn add_directive(mut self, directive: Arc<dyn DirectiveProcessor>) -> Self {
        self.schema
            .directives
            .insert(directive.name().to_string(), directive);
        self
    }

    /// Builds the schema.
    pub fn build(self) -> Schema {
        self.schema
    }
}
