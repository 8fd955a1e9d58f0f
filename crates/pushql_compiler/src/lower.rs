//! Lowering from parsed GraphQL text to the executable document model.
//!
//! Lowering resolves every field against the schema, substitutes variables
//! into arguments and directive applications, and allocates the selection
//! arena. Fragment spreads are left unresolved here; the expansion pass
//! inlines them so fragments may appear after the operations that use them.

use crate::document::{Document, Fragment, Operation, OperationKind, VariableDef};
use crate::node::{DirectiveApplication, FieldNode, NodeId, NodeKind, SelectionArena};
use graphql_parser::query as ast;
use pushql_core::{Arguments, CompileError};
use pushql_schema::{DirectiveLocation, SchemaProvider};
use std::collections::HashMap;

/// Parses and lowers a query document.
///
/// `variables` are the externally supplied values; operation-declared
/// defaults fill in anything missing. Every compile error a document can
/// produce surfaces here or in plan compilation, before any fetch.
pub fn lower_source(
    schema: &dyn SchemaProvider,
    source: &str,
    variables: &HashMap<String, serde_json::Value>,
) -> Result<Document, CompileError> {
    let parsed = graphql_parser::parse_query::<String>(source)
        .map_err(|e| CompileError::Syntax(e.to_string()))?;

    // Fragments resolve in the referencing operation's context, so their
    // argument values see operation-declared defaults too. Supplied values
    // win; across operations the first declaration of a default wins.
    let mut fragment_vars: HashMap<String, serde_json::Value> = HashMap::new();
    for definition in &parsed.definitions {
        if let ast::Definition::Operation(op) = definition {
            for def in variable_definitions(op) {
                if let Some(default) = &def.default_value {
                    let value = lower_value(&HashMap::new(), default)?;
                    fragment_vars.entry(def.name.clone()).or_insert(value);
                }
            }
        }
    }
    for (name, value) in variables {
        fragment_vars.insert(name.clone(), value.clone());
    }

    let mut document = Document::default();
    for definition in &parsed.definitions {
        match definition {
            ast::Definition::Operation(op) => {
                let operation = lower_operation(&mut document.arena, schema, variables, op)?;
                document.operations.push(operation);
            }
            ast::Definition::Fragment(frag) => {
                let fragment =
                    lower_fragment(&mut document.arena, schema, &fragment_vars, frag)?;
                document.fragments.push(fragment);
            }
        }
    }

    tracing::debug!(
        operations = document.operations.len(),
        fragments = document.fragments.len(),
        nodes = document.arena.len(),
        "lowered query document"
    );
    Ok(document)
}

fn lower_operation(
    arena: &mut SelectionArena,
    schema: &dyn SchemaProvider,
    provided: &HashMap<String, serde_json::Value>,
    op: &ast::OperationDefinition<'_, String>,
) -> Result<Operation, CompileError> {
    let (kind, name, set) = match op {
        ast::OperationDefinition::SelectionSet(set) => (OperationKind::Query, None, set),
        ast::OperationDefinition::Query(q) => {
            (OperationKind::Query, q.name.clone(), &q.selection_set)
        }
        ast::OperationDefinition::Mutation(m) => {
            (OperationKind::Mutation, m.name.clone(), &m.selection_set)
        }
        ast::OperationDefinition::Subscription(_) => {
            return Err(CompileError::UnsupportedOperation("subscription".to_string()))
        }
    };
    let var_defs = variable_definitions(op);

    let mut variables = Vec::with_capacity(var_defs.len());
    let mut vars: HashMap<String, serde_json::Value> = HashMap::new();
    for def in var_defs {
        // Defaults are constants; a variable reference inside one is an
        // error.
        let default_value = def
            .default_value
            .as_ref()
            .map(|v| lower_value(&HashMap::new(), v))
            .transpose()?;
        if let Some(default) = &default_value {
            vars.insert(def.name.clone(), default.clone());
        }
        variables.push(VariableDef {
            name: def.name.clone(),
            ty: type_text(&def.var_type),
            default_value,
        });
    }
    // Supplied values win over declared defaults.
    for (name, value) in provided {
        vars.insert(name.clone(), value.clone());
    }

    let parent_type = match kind {
        OperationKind::Query => schema.query_type().to_string(),
        OperationKind::Mutation => schema
            .mutation_type()
            .map(str::to_string)
            .ok_or_else(|| CompileError::UnsupportedOperation("mutation".to_string()))?,
    };

    let roots = lower_selection_set(
        arena,
        schema,
        &vars,
        set,
        &parent_type,
        None,
        kind == OperationKind::Mutation,
    )?;

    Ok(Operation {
        name,
        kind,
        roots,
        variables,
    })
}

fn lower_fragment(
    arena: &mut SelectionArena,
    schema: &dyn SchemaProvider,
    provided: &HashMap<String, serde_json::Value>,
    frag: &ast::FragmentDefinition<'_, String>,
) -> Result<Fragment, CompileError> {
    let ast::TypeCondition::On(type_condition) = &frag.type_condition;
    if !schema.has_type(type_condition) {
        return Err(CompileError::UnknownType(type_condition.clone()));
    }

    let roots = lower_selection_set(
        arena,
        schema,
        provided,
        &frag.selection_set,
        type_condition,
        None,
        false,
    )?;

    Ok(Fragment {
        name: frag.name.clone(),
        type_condition: type_condition.clone(),
        roots,
    })
}

fn lower_selection_set(
    arena: &mut SelectionArena,
    schema: &dyn SchemaProvider,
    vars: &HashMap<String, serde_json::Value>,
    set: &ast::SelectionSet<'_, String>,
    parent_type: &str,
    parent: Option<NodeId>,
    mutation_roots: bool,
) -> Result<Vec<NodeId>, CompileError> {
    let mut out = Vec::with_capacity(set.items.len());
    for item in &set.items {
        match item {
            ast::Selection::Field(field) => {
                out.push(lower_field(
                    arena,
                    schema,
                    vars,
                    field,
                    parent_type,
                    parent,
                    mutation_roots,
                )?);
            }
            ast::Selection::FragmentSpread(spread) => {
                let node = FieldNode {
                    kind: NodeKind::FragmentSpread {
                        fragment: spread.fragment_name.clone(),
                    },
                    directives: lower_directives(
                        vars,
                        &spread.directives,
                        DirectiveLocation::FragmentSpread,
                    )?,
                    parent,
                    ..FieldNode::field(spread.fragment_name.clone())
                };
                out.push(arena.alloc(node));
            }
            ast::Selection::InlineFragment(inline) => {
                let type_condition = inline
                    .type_condition
                    .as_ref()
                    .map(|ast::TypeCondition::On(name)| name.clone());
                if let Some(name) = &type_condition {
                    if !schema.has_type(name) {
                        return Err(CompileError::UnknownType(name.clone()));
                    }
                }
                let child_type = type_condition.as_deref().unwrap_or(parent_type).to_string();

                let node = FieldNode {
                    kind: NodeKind::InlineFragment {
                        type_condition: type_condition.clone(),
                    },
                    directives: lower_directives(
                        vars,
                        &inline.directives,
                        DirectiveLocation::InlineFragment,
                    )?,
                    parent,
                    ..FieldNode::field("")
                };
                let id = arena.alloc(node);
                let children = lower_selection_set(
                    arena,
                    schema,
                    vars,
                    &inline.selection_set,
                    &child_type,
                    Some(id),
                    false,
                )?;
                arena.node_mut(id).children = children;
                out.push(id);
            }
        }
    }
    Ok(out)
}

fn lower_field(
    arena: &mut SelectionArena,
    schema: &dyn SchemaProvider,
    vars: &HashMap<String, serde_json::Value>,
    field: &ast::Field<'_, String>,
    parent_type: &str,
    parent: Option<NodeId>,
    mutation_root: bool,
) -> Result<NodeId, CompileError> {
    // `__typename` is resolved by the projection layer, not the schema.
    let field_def = if field.name == "__typename" {
        None
    } else {
        Some(
            schema
                .field(parent_type, &field.name)
                .cloned()
                .ok_or_else(|| CompileError::UnknownField {
                    type_name: parent_type.to_string(),
                    field: field.name.clone(),
                })?,
        )
    };
    let child_type = field_def
        .as_ref()
        .map(|f| f.ty.base_name().to_string())
        .unwrap_or_else(|| parent_type.to_string());

    let node = FieldNode {
        alias: field.alias.clone(),
        kind: if mutation_root {
            NodeKind::Mutation
        } else {
            NodeKind::Field
        },
        field: field_def,
        arguments: lower_arguments(vars, &field.arguments)?,
        directives: lower_directives(vars, &field.directives, DirectiveLocation::Field)?,
        parent,
        ..FieldNode::field(field.name.clone())
    };
    let id = arena.alloc(node);

    let children = lower_selection_set(
        arena,
        schema,
        vars,
        &field.selection_set,
        &child_type,
        Some(id),
        false,
    )?;
    arena.node_mut(id).children = children;

    if arena.node(id).is_service_field() {
        arena.mark_services_upward(id);
    }
    Ok(id)
}

fn lower_arguments(
    vars: &HashMap<String, serde_json::Value>,
    arguments: &[(String, ast::Value<'_, String>)],
) -> Result<Arguments, CompileError> {
    let mut out = Arguments::new();
    for (name, value) in arguments {
        out.set(name.clone(), lower_value(vars, value)?);
    }
    Ok(out)
}

fn lower_directives(
    vars: &HashMap<String, serde_json::Value>,
    directives: &[ast::Directive<'_, String>],
    location: DirectiveLocation,
) -> Result<Vec<DirectiveApplication>, CompileError> {
    directives
        .iter()
        .map(|d| {
            Ok(DirectiveApplication {
                name: d.name.clone(),
                location,
                arguments: lower_arguments(vars, &d.arguments)?,
            })
        })
        .collect()
}

fn lower_value(
    vars: &HashMap<String, serde_json::Value>,
    value: &ast::Value<'_, String>,
) -> Result<serde_json::Value, CompileError> {
    Ok(match value {
        ast::Value::Variable(name) => vars
            .get(name)
            .cloned()
            .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?,
        ast::Value::Int(n) => n
            .as_i64()
            .map(serde_json::Value::from)
            .ok_or_else(|| CompileError::Syntax("integer literal out of range".to_string()))?,
        ast::Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ast::Value::String(s) => serde_json::Value::String(s.clone()),
        ast::Value::Boolean(b) => serde_json::Value::Bool(*b),
        ast::Value::Null => serde_json::Value::Null,
        ast::Value::Enum(name) => serde_json::Value::String(name.clone()),
        ast::Value::List(items) => serde_json::Value::Array(
            items
                .iter()
                .map(|v| lower_value(vars, v))
                .collect::<Result<_, _>>()?,
        ),
        ast::Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, value) in map {
                out.insert(key.clone(), lower_value(vars, value)?);
            }
            serde_json::Value::Object(out)
        }
    })
}

fn variable_definitions<'a, 'd>(
    op: &'a ast::OperationDefinition<'d, String>,
) -> &'a [ast::VariableDefinition<'d, String>] {
    match op {
        ast::OperationDefinition::SelectionSet(_) => &[],
        ast::OperationDefinition::Query(q) => &q.variable_definitions,
        ast::OperationDefinition::Mutation(m) => &m.variable_definitions,
        ast::OperationDefinition::Subscription(s) => &s.variable_definitions,
    }
}

fn type_text(ty: &ast::Type<'_, String>) -> String {
    match ty {
        ast::Type::NamedType(name) => name.clone(),
        ast::Type::ListType(inner) => format!("[{}]", type_text(inner)),
        ast::Type::NonNullType(inner) => format!("{}!", type_text(inner)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushql_schema::{FieldDef, ObjectDef, Schema, TypeRef};

    fn people_schema() -> Schema {
        Schema::builder()
            .mutation_type("Mutation")
            .add_object(ObjectDef::new("Query").with_field(FieldDef::new(
                "people",
                TypeRef::list(TypeRef::named("Person")),
            )))
            .add_object(
                ObjectDef::new("Person")
                    .with_field(FieldDef::new("name", TypeRef::named("String")))
                    .with_field(FieldDef::new("birthday", TypeRef::named("String")))
                    .with_field(
                        FieldDef::new("age", TypeRef::named("Int"))
                            .with_service("ageService")
                            .with_extracted_inputs(["birthday"]),
                    ),
            )
            .add_object(
                ObjectDef::new("Mutation")
                    .with_field(FieldDef::new("addPerson", TypeRef::named("Person"))),
            )
            .build()
    }

    fn lower(schema: &Schema, source: &str) -> Result<Document, CompileError> {
        lower_source(schema, source, &HashMap::new())
    }

    #[test]
    fn test_lower_simple_query() {
        let schema = people_schema();
        let doc = lower(&schema, "{ people { name age } }").expect("should lower");

        assert_eq!(doc.operations.len(), 1);
        let roots = &doc.operations[0].roots;
        assert_eq!(roots.len(), 1);
        let people = doc.arena.node(roots[0]);
        assert_eq!(people.name, "people");
        assert_eq!(people.children.len(), 2);
        // The service field marked its ancestors at lowering.
        assert!(people.has_services);
    }

    #[test]
    fn test_alias_sets_result_key() {
        let schema = people_schema();
        let doc = lower(&schema, "{ people { fullName: name } }").expect("should lower");

        let people = doc.arena.node(doc.operations[0].roots[0]);
        let child = doc.arena.node(people.children[0]);
        assert_eq!(child.name, "name");
        assert_eq!(child.result_key(), "fullName");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let schema = people_schema();
        let err = lower(&schema, "{ people { salary } }").expect_err("should fail");

        assert_eq!(
            err,
            CompileError::UnknownField {
                type_name: "Person".to_string(),
                field: "salary".to_string(),
            }
        );
    }

    #[test]
    fn test_typename_has_no_schema_field() {
        let schema = people_schema();
        let doc = lower(&schema, "{ people { __typename name } }").expect("should lower");

        let people = doc.arena.node(doc.operations[0].roots[0]);
        let typename = doc.arena.node(people.children[0]);
        assert_eq!(typename.name, "__typename");
        assert!(typename.field.is_none());
    }

    #[test]
    fn test_variable_default_applies() {
        let schema = people_schema();
        let doc = lower(
            &schema,
            "query Q($on: Boolean = false) { people { name @include(if: $on) } }",
        )
        .expect("should lower");

        let people = doc.arena.node(doc.operations[0].roots[0]);
        let name = doc.arena.node(people.children[0]);
        assert_eq!(name.directives.len(), 1);
        assert_eq!(
            name.directives[0].arguments.get("if"),
            Some(&serde_json::json!(false))
        );
    }

    #[test]
    fn test_supplied_variable_overrides_default() {
        let schema = people_schema();
        let vars = HashMap::from([("on".to_string(), serde_json::json!(true))]);
        let doc = lower_source(
            &schema,
            "query Q($on: Boolean = false) { people { name @include(if: $on) } }",
            &vars,
        )
        .expect("should lower");

        let people = doc.arena.node(doc.operations[0].roots[0]);
        let name = doc.arena.node(people.children[0]);
        assert_eq!(
            name.directives[0].arguments.get("if"),
            Some(&serde_json::json!(true))
        );
    }

    #[test]
    fn test_fragment_sees_operation_variable_default() {
        let schema = people_schema();
        let doc = lower(
            &schema,
            "query Q($hide: Boolean = true) { people { name ...extra } } \
             fragment extra on Person { birthday @skip(if: $hide) }",
        )
        .expect("should lower");

        let birthday = doc.arena.node(doc.fragments[0].roots[0]);
        assert_eq!(
            birthday.directives[0].arguments.get("if"),
            Some(&serde_json::json!(true))
        );
    }

    #[test]
    fn test_supplied_variable_overrides_default_in_fragment() {
        let schema = people_schema();
        let vars = HashMap::from([("hide".to_string(), serde_json::json!(false))]);
        let doc = lower_source(
            &schema,
            "query Q($hide: Boolean = true) { people { name ...extra } } \
             fragment extra on Person { birthday @skip(if: $hide) }",
            &vars,
        )
        .expect("should lower");

        let birthday = doc.arena.node(doc.fragments[0].roots[0]);
        assert_eq!(
            birthday.directives[0].arguments.get("if"),
            Some(&serde_json::json!(false))
        );
    }

    #[test]
    fn test_out_of_range_int_literal_is_rejected() {
        let schema = people_schema();
        let err = lower(&schema, "{ people(id: 99999999999999999999999999) { name } }")
            .expect_err("should fail");

        assert!(matches!(err, CompileError::Syntax(_)));
    }

    #[test]
    fn test_missing_variable_is_rejected() {
        let schema = people_schema();
        let err = lower(&schema, "query Q($on: Boolean!) { people { name @skip(if: $on) } }")
            .expect_err("should fail");

        assert_eq!(err, CompileError::UndefinedVariable("on".to_string()));
    }

    #[test]
    fn test_subscription_is_unsupported() {
        let schema = people_schema();
        let err = lower(&schema, "subscription { people { name } }").expect_err("should fail");

        assert_eq!(
            err,
            CompileError::UnsupportedOperation("subscription".to_string())
        );
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let schema = people_schema();
        let err = lower(&schema, "{ people {").expect_err("should fail");

        assert!(matches!(err, CompileError::Syntax(_)));
    }

    #[test]
    fn test_mutation_roots_are_marked() {
        let schema = people_schema();
        let doc = lower(&schema, "mutation { addPerson { name } }").expect("should lower");

        assert_eq!(doc.operations[0].kind, OperationKind::Mutation);
        let root = doc.arena.node(doc.operations[0].roots[0]);
        assert_eq!(root.kind, NodeKind::Mutation);
        // The result selection is lowered against the mutation's return type.
        let name = doc.arena.node(root.children[0]);
        assert_eq!(name.name, "name");
    }

    #[test]
    fn test_fragment_with_unknown_type_condition() {
        let schema = people_schema();
        let err = lower(
            &schema,
            "{ people { ...f } } fragment f on Animal { name }",
        )
        .expect_err("should fail");

        assert_eq!(err, CompileError::UnknownType("Animal".to_string()));
    }

    #[test]
    fn test_fragment_after_operation_is_lowered() {
        let schema = people_schema();
        let doc = lower(
            &schema,
            "{ people { ...basics } } fragment basics on Person { name birthday }",
        )
        .expect("should lower");

        assert_eq!(doc.fragments.len(), 1);
        assert_eq!(doc.fragments[0].name, "basics");
        assert_eq!(doc.fragments[0].roots.len(), 2);
        let people = doc.arena.node(doc.operations[0].roots[0]);
        let spread = doc.arena.node(people.children[0]);
        assert!(matches!(spread.kind, NodeKind::FragmentSpread { .. }));
    }

    #[test]
    fn test_inline_fragment_condition_is_checked() {
        let schema = people_schema();
        let doc = lower(&schema, "{ people { ... on Person { name } } }")
            .expect("should lower");

        let people = doc.arena.node(doc.operations[0].roots[0]);
        let inline = doc.arena.node(people.children[0]);
        assert_eq!(
            inline.kind,
            NodeKind::InlineFragment {
                type_condition: Some("Person".to_string())
            }
        );
    }
}
