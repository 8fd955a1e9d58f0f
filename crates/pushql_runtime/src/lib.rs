//! Execution engine for PushQL.
//!
//! This crate provides:
//! - `engine`: Document-level execution
//! - `executor`: Plan execution and result assembly
//! - `provider`: Backing data context contract
//! - `services`: Runtime service scope
//! - `result`: Result envelope

pub mod engine;
pub mod executor;
pub mod provider;
pub mod result;
pub mod services;

pub use engine::DocumentExecutor;
pub use executor::{execute_plan, ExecutionOptions};
pub use provider::{project, DataContext, MemoryContext};
pub use result::QueryResult;
pub use services::{FieldService, MutationHandler, ServiceInvocation, ServiceScope};
