//! Runtime service scope for service-dependent fields and mutations.
//!
//! Services are registered per scope and looked up by the names a schema
//! field declares. Lookup failure is a field-level error at execution time,
//! never a compile error: the same compiled plan may run against scopes
//! with different capabilities.

use async_trait::async_trait;
use pushql_core::{Arguments, ServiceError};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;

/// Everything a field service sees when resolving one element.
#[derive(Debug, Clone, Copy)]
pub struct ServiceInvocation<'a> {
    /// The schema field being resolved.
    pub field: &'a str,
    /// The field's argument bindings.
    pub arguments: &'a Arguments,
    /// The fetched parent element, including the field's extracted inputs.
    pub parent: &'a Value,
}

/// Resolves a service-dependent field for one parent element.
#[async_trait]
pub trait FieldService: Send + Sync {
    async fn resolve(&self, invocation: ServiceInvocation<'_>) -> Result<Value, ServiceError>;
}

/// Handles a mutation root field.
///
/// The returned value is what the mutation's result selection executes
/// against.
#[async_trait]
pub trait MutationHandler: Send + Sync {
    async fn invoke(&self, arguments: &Arguments) -> Result<Value, ServiceError>;
}

struct ServiceFn<F>(F);

#[async_trait]
impl<F> FieldService for ServiceFn<F>
where
    F: for<'a> Fn(ServiceInvocation<'a>) -> Result<Value, ServiceError> + Send + Sync,
{
    async fn resolve(&self, invocation: ServiceInvocation<'_>) -> Result<Value, ServiceError> {
        (self.0)(invocation)
    }
}

struct MutationFn<F>(F);

#[async_trait]
impl<F> MutationHandler for MutationFn<F>
where
    F: Fn(&Arguments) -> Result<Value, ServiceError> + Send + Sync,
{
    async fn invoke(&self, arguments: &Arguments) -> Result<Value, ServiceError> {
        (self.0)(arguments)
    }
}

/// The services and mutation handlers available to one execution.
#[derive(Default)]
pub struct ServiceScope {
    services: FxHashMap<String, Arc<dyn FieldService>>,
    mutations: FxHashMap<String, Arc<dyn MutationHandler>>,
}

impl ServiceScope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a field service under a name.
    pub fn register(mut self, name: impl Into<String>, service: Arc<dyn FieldService>) -> Self {
        self.services.insert(name.into(), service);
        self
    }

    /// Registers a synchronous closure as a field service.
    pub fn register_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: for<'a> Fn(ServiceInvocation<'a>) -> Result<Value, ServiceError>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, Arc::new(ServiceFn(f)))
    }

    /// Registers a mutation handler under a mutation field name.
    pub fn register_mutation(
        mut self,
        name: impl Into<String>,
        handler: Arc<dyn MutationHandler>,
    ) -> Self {
        self.mutations.insert(name.into(), handler);
        self
    }

    /// Registers a synchronous closure as a mutation handler.
    pub fn register_mutation_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Value, ServiceError> + Send + Sync + 'static,
    {
        self.register_mutation(name, Arc::new(MutationFn(f)))
    }

    /// Looks up a field service; missing services are a field-level error.
    pub fn service(&self, name: &str) -> Result<&Arc<dyn FieldService>, ServiceError> {
        self.services
            .get(name)
            .ok_or_else(|| ServiceError::NotRegistered(name.to_string()))
    }

    /// Looks up a mutation handler.
    pub fn mutation(&self, name: &str) -> Result<&Arc<dyn MutationHandler>, ServiceError> {
        self.mutations
            .get(name)
            .ok_or_else(|| ServiceError::NotRegistered(name.to_string()))
    }
}

impl std::fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceScope")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("mutations", &self.mutations.keys().collect::<Vec<_>>())
            .finish()
    }
}
