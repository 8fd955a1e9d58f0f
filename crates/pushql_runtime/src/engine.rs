//! Document-level entry point: parse, select, compile, execute.

use crate::executor::{execute_plan, ExecutionOptions};
use crate::provider::DataContext;
use crate::result::QueryResult;
use crate::services::ServiceScope;
use pushql_compiler::{compile_operation, lower_source};
use pushql_core::{CompileError, GraphQLError};
use pushql_schema::SchemaProvider;
use std::collections::HashMap;

/// Executes whole query documents against a schema.
///
/// One executor is built per schema and reused across requests; everything
/// request-scoped (document, plan, errors) lives on the stack of
/// [`execute`](DocumentExecutor::execute).
#[derive(Debug)]
pub struct DocumentExecutor<S> {
    schema: S,
    options: ExecutionOptions,
}

impl<S: SchemaProvider> DocumentExecutor<S> {
    /// Creates an executor with default options.
    pub fn new(schema: S) -> Self {
        Self {
            schema,
            options: ExecutionOptions::default(),
        }
    }

    /// Replaces the execution options.
    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    /// The schema this executor serves.
    pub fn schema(&self) -> &S {
        &self.schema
    }

    /// Compiles and runs one document.
    ///
    /// Compile failures return an error-only result without touching the
    /// data context or any service.
    pub async fn execute(
        &self,
        source: &str,
        operation_name: Option<&str>,
        variables: &HashMap<String, serde_json::Value>,
        data: &dyn DataContext,
        services: &ServiceScope,
    ) -> QueryResult {
        let mut document = match lower_source(&self.schema, source, variables) {
            Ok(document) => document,
            Err(error) => return compile_failure(error),
        };
        let op_index = match document.select_operation(operation_name) {
            Ok(index) => index,
            Err(error) => return compile_failure(error),
        };
        let plan = match compile_operation(&mut document, &self.schema, op_index) {
            Ok(plan) => plan,
            Err(error) => return compile_failure(error),
        };

        tracing::debug!(
            operation = operation_name.unwrap_or("<default>"),
            roots = plan.roots.len(),
            "executing operation"
        );
        execute_plan(&document.arena, &plan, data, services, &self.options).await
    }

    /// Like [`execute`](Self::execute), merging errors a host-side document
    /// validator collected beforehand.
    ///
    /// Any validator error preempts execution: the result carries only the
    /// errors and no data key.
    pub async fn execute_validated(
        &self,
        source: &str,
        operation_name: Option<&str>,
        variables: &HashMap<String, serde_json::Value>,
        data: &dyn DataContext,
        services: &ServiceScope,
        validator_errors: Vec<GraphQLError>,
    ) -> QueryResult {
        if !validator_errors.is_empty() {
            let mut result = QueryResult::new();
            result.merge_errors(validator_errors);
            return result;
        }
        self.execute(source, operation_name, variables, data, services)
            .await
    }
}

fn compile_failure(error: CompileError) -> QueryResult {
    QueryResult::from_error(
        GraphQLError::new(error.to_string()).with_code("GRAPHQL_VALIDATION_FAILED"),
    )
}
