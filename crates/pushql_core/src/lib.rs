//! Core utilities for PushQL.
//!
//! This crate provides the pieces shared by every layer of the engine:
//! - `error`: the error taxonomy (compile, provider, service) and the
//!   wire-level error reported in result envelopes
//! - `args`: the ordered argument bag attached to fields, directives and
//!   service invocations

pub mod args;
pub mod error;

pub use args::{ArgumentError, Arguments};
pub use error::{CompileError, GraphQLError, PathSegment, ProviderError, ServiceError};
