//! Schema provider model for PushQL.
//!
//! This crate describes the typed schema a query document is compiled
//! against:
//! - `types`: type and field definitions, including the services a field
//!   depends on and the pure inputs those services need
//! - `provider`: the [`SchemaProvider`] contract and the in-memory
//!   [`Schema`] with its builder
//! - `directive`: the directive processor plugin contract and the built-in
//!   `@include` / `@skip` processors

pub mod directive;
pub mod provider;
pub mod types;

pub use directive::{
    DirectiveDecision, DirectiveLocation, DirectiveProcessor, IncludeDirective, SkipDirective,
};
pub use provider::{Schema, SchemaBuilder, SchemaProvider};
pub use types::{FieldDef, InputFieldDef, ObjectDef, ScalarDef, TypeDef, TypeRef};
