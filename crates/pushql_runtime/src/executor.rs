//! Plan execution: pure fetch, service resolution and result assembly.
//!
//! Execution walks each root plan in declaration order. The pure pass is a
//! single [`DataContext::fetch`] per root; the service pass then walks the
//! full expanded selection over the fetched value, invoking field services
//! once per element. A service failure nulls the owning field and records a
//! path-tagged error; sibling fields still resolve unless strict mode is
//! enabled.

use crate::provider::{project, DataContext};
use crate::result::QueryResult;
use crate::services::{ServiceInvocation, ServiceScope};
use pushql_compiler::{ExpandedField, OperationPlan, RootPlan, SelectionArena};
use pushql_core::{GraphQLError, PathSegment, ServiceError};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Knobs controlling one execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// When set, any service failure discards the whole data payload
    /// instead of nulling the owning field.
    pub strict_services: bool,
}

impl ExecutionOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables strict service mode.
    pub fn with_strict_services(mut self, strict: bool) -> Self {
        self.strict_services = strict;
        self
    }
}

/// Where a root currently sits in its two-phase lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecutionPhase {
    Pending,
    PureFetch,
    ServiceResolve,
    Assembled,
    Failed,
}

/// Executes a compiled plan against a data context and service scope.
pub async fn execute_plan(
    arena: &SelectionArena,
    plan: &OperationPlan,
    data: &dyn DataContext,
    services: &ServiceScope,
    options: &ExecutionOptions,
) -> QueryResult {
    let mut executor = PlanExecutor {
        arena,
        data,
        services,
        errors: Vec::new(),
        service_failed: false,
    };

    let mut result = QueryResult::new();
    for root in &plan.roots {
        executor.execute_root(root, &mut result).await;
    }

    result.errors.append(&mut executor.errors);
    if options.strict_services && executor.service_failed {
        result.data = None;
    }
    result
}

struct PlanExecutor<'a> {
    arena: &'a SelectionArena,
    data: &'a dyn DataContext,
    services: &'a ServiceScope,
    errors: Vec<GraphQLError>,
    service_failed: bool,
}

impl<'a> PlanExecutor<'a> {
    async fn execute_root(&mut self, root: &RootPlan, result: &mut QueryResult) {
        let key = root.result_key.clone();
        let path = vec![PathSegment::field(&key)];
        tracing::trace!(root = %key, phase = ?ExecutionPhase::Pending);

        let value = if let Some(mutation) = &root.mutation {
            self.execute_mutation(mutation, root, path).await
        } else {
            self.execute_query_root(root, path).await
        };

        match value {
            Some(value) => result.insert(key, value),
            None => result.insert(key, Value::Null),
        }
    }

    /// Runs the pure fetch for a query root, then assembles the full
    /// selection over the fetched value.
    async fn execute_query_root(
        &mut self,
        root: &RootPlan,
        path: Vec<PathSegment>,
    ) -> Option<Value> {
        let fetched = match &root.store_query {
            Some(query) => {
                tracing::debug!(root = %root.result_key, phase = ?ExecutionPhase::PureFetch);
                match self.data.fetch(query).await {
                    Ok(value) => value,
                    Err(error) => {
                        tracing::debug!(root = %root.result_key, phase = ?ExecutionPhase::Failed);
                        self.errors.push(GraphQLError::from(error).with_path(path));
                        return None;
                    }
                }
            }
            // Nothing about this root is store-expressible.
            None => Value::Null,
        };

        let arena = self.arena;
        let node = arena.node(root.node);
        let assembled = if node.is_service_field() {
            let field = ExpandedField {
                id: root.node,
                type_condition: None,
                children: root.selection.clone(),
            };
            self.resolve_service(&field, &fetched, path).await
        } else {
            self.assemble_value(&root.selection, fetched, path).await
        };
        tracing::debug!(root = %root.result_key, phase = ?ExecutionPhase::Assembled);
        Some(assembled)
    }

    /// Invokes the mutation handler, projects its returned value through the
    /// pure result selection and assembles the full one over it.
    async fn execute_mutation(
        &mut self,
        name: &str,
        root: &RootPlan,
        path: Vec<PathSegment>,
    ) -> Option<Value> {
        let handler = match self.services.mutation(name) {
            Ok(handler) => Arc::clone(handler),
            Err(error) => {
                self.push_mutation_error(name, error, path);
                return None;
            }
        };

        let returned = match handler.invoke(&root.arguments).await {
            Ok(value) => value,
            Err(error) => {
                self.push_mutation_error(name, error, path);
                return None;
            }
        };

        // The result selection executes against what the handler returned,
        // the same way a query root executes against a fetch.
        let projected = match &root.store_query {
            Some(query) => project(&query.selection, &returned),
            None => returned,
        };
        tracing::debug!(mutation = %name, phase = ?ExecutionPhase::ServiceResolve);
        Some(
            self.assemble_value(&root.selection, projected, path)
                .await,
        )
    }

    fn push_mutation_error(&mut self, name: &str, error: ServiceError, path: Vec<PathSegment>) {
        let mut gql = GraphQLError::from(error);
        gql.message = format!("{name}: {}", gql.message);
        self.errors.push(gql.with_path(path));
        self.service_failed = true;
    }

    fn assemble_value<'s>(
        &'s mut self,
        selection: &'s [ExpandedField],
        value: Value,
        path: Vec<PathSegment>,
    ) -> Pin<Box<dyn Future<Output = Value> + Send + 's>> {
        Box::pin(async move {
            match value {
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for (index, item) in items.into_iter().enumerate() {
                        let mut item_path = path.clone();
                        item_path.push(PathSegment::Index(index));
                        out.push(self.assemble_value(selection, item, item_path).await);
                    }
                    Value::Array(out)
                }
                Value::Object(_) if !selection.is_empty() => {
                    self.assemble_object(selection, value, path).await
                }
                other => other,
            }
        })
    }

    /// Assembles one object element: pure members are copied from the
    /// fetched value by result key, service members are resolved here.
    async fn assemble_object(
        &mut self,
        selection: &[ExpandedField],
        element: Value,
        path: Vec<PathSegment>,
    ) -> Value {
        let arena = self.arena;
        let mut out = serde_json::Map::new();
        for field in selection {
            let node = arena.node(field.id);
            if let Some(condition) = &field.type_condition {
                let type_name = element.get("__typename").and_then(Value::as_str);
                if type_name.is_some_and(|t| t != condition) {
                    continue;
                }
            }

            let key = node.result_key().to_string();
            let mut field_path = path.clone();
            field_path.push(PathSegment::field(&key));

            let value = if node.is_service_field() {
                self.resolve_service(field, &element, field_path).await
            } else if field.children.is_empty() {
                element.get(&key).cloned().unwrap_or(Value::Null)
            } else {
                let member = element.get(&key).cloned().unwrap_or(Value::Null);
                self.assemble_value(&field.children, member, field_path)
                    .await
            };
            out.insert(key, value);
        }
        Value::Object(out)
    }

    /// Resolves one service-dependent field for one parent element.
    ///
    /// Every service the field declares must be registered; the first one
    /// computes the value. Failure nulls the field and records a path-tagged
    /// error.
    async fn resolve_service(
        &mut self,
        field: &ExpandedField,
        parent: &Value,
        path: Vec<PathSegment>,
    ) -> Value {
        let arena = self.arena;
        let node = arena.node(field.id);
        let Some(def) = &node.field else {
            return Value::Null;
        };

        let mut resolver = None;
        for name in &def.services {
            match self.services.service(name) {
                Ok(service) => {
                    if resolver.is_none() {
                        resolver = Some(Arc::clone(service));
                    }
                }
                Err(error) => {
                    self.errors.push(GraphQLError::from(error).with_path(path));
                    self.service_failed = true;
                    return Value::Null;
                }
            }
        }
        let Some(service) = resolver else {
            return Value::Null;
        };

        let invocation = ServiceInvocation {
            field: &node.name,
            arguments: &node.arguments,
            parent,
        };
        match service.resolve(invocation).await {
            Ok(value) if field.children.is_empty() => value,
            Ok(value) => self.assemble_value(&field.children, value, path).await,
            Err(error) => {
                self.errors.push(GraphQLError::from(error).with_path(path));
                self.service_failed = true;
                Value::Null
            }
        }
    }
}
