//! Type and field definitions for PushQL schemas.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeDef {
    Scalar(ScalarDef),
    Object(ObjectDef),
}

impl TypeDef {
    /// Returns the type name.
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar(s) => &s.name,
            Self::Object(o) => &o.name,
        }
    }

    /// Returns the object fields, if this is an object type.
    pub fn fields(&self) -> Option<&IndexMap<String, FieldDef>> {
        match self {
            Self::Object(o) => Some(&o.fields),
            Self::Scalar(_) => None,
        }
    }
}

/// Scalar type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarDef {
    pub name: String,
    pub description: Option<String>,
}

/// Object type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
}

impl ObjectDef {
    /// Creates a new object type with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Adds a field, keyed by its name.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}

/// Field definition.
///
/// A field that declares one or more `services` is service-dependent: its
/// value cannot be produced by the backing query and is computed in-process
/// after the pure fetch. `extracted_inputs` names the sibling pure fields a
/// service needs from the store to do that computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub arguments: IndexMap<String, InputFieldDef>,
    /// Runtime services this field's resolution requires.
    pub services: Vec<String>,
    /// Pure fields the services need fetched from the store.
    pub extracted_inputs: Vec<String>,
}

impl FieldDef {
    /// Creates a new field definition.
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            arguments: IndexMap::new(),
            services: Vec::new(),
            extracted_inputs: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Declares an argument.
    pub fn with_argument(mut self, arg: InputFieldDef) -> Self {
        self.arguments.insert(arg.name.clone(), arg);
        self
    }

    /// Declares a runtime service this field depends on.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.services.push(service.into());
        self
    }

    /// Declares the pure input fields a declared service needs.
    pub fn with_extracted_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extracted_inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if resolving this field requires a runtime service.
    pub fn has_services(&self) -> bool {
        !self.services.is_empty()
    }
}

/// Input field (argument) definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputFieldDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub default_value: Option<serde_json::Value>,
}

impl InputFieldDef {
    /// Creates a new input field definition.
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            default_value: None,
        }
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// Type reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeRef {
    Named(String),
    Option(Box<TypeRef>),
    List(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn option(inner: TypeRef) -> Self {
        Self::Option(Box::new(inner))
    }

    pub fn list(inner: TypeRef) -> Self {
        Self::List(Box::new(inner))
    }

    /// Returns the innermost named type.
    pub fn base_name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Option(inner) | Self::List(inner) => inner.base_name(),
        }
    }

    /// Returns true if the outermost wrapper is a list.
    pub fn is_list(&self) -> bool {
        match self {
            Self::List(_) => true,
            Self::Option(inner) => inner.is_list(),
            Self::Named(_) => false,
        }
    }

    /// Returns true if the reference permits null.
    pub fn is_nullable(&self) -> bool {
        matches!(self, Self::Option(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ref_base_name() {
        let ty = TypeRef::option(TypeRef::list(TypeRef::named("Person")));
        assert_eq!(ty.base_name(), "Person");
        assert!(ty.is_list());
        assert!(ty.is_nullable());
    }

    #[test]
    fn test_field_def_services() {
        let field = FieldDef::new("age", TypeRef::named("Int"))
            .with_service("ageService")
            .with_extracted_inputs(["birthday"]);

        assert!(field.has_services());
        assert_eq!(field.extracted_inputs, ["birthday"]);
    }

    #[test]
    fn test_object_def_field_order() {
        let obj = ObjectDef::new("Person")
            .with_field(FieldDef::new("name", TypeRef::named("String")))
            .with_field(FieldDef::new("id", TypeRef::named("ID")));

        let names: Vec<&String> = obj.fields.keys().collect();
        assert_eq!(names, ["name", "id"]);
    }
}
