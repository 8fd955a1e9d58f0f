//! Fragment resolution and directive evaluation for PushQL.
//!
//! Expansion flattens a selection: directive-excluded nodes disappear,
//! fragment spreads inline the referenced fragment's fields at the spread
//! position, and (in the pure pass) service-dependent fields are dropped or
//! replaced by their extracted store inputs. Fragments may be declared after
//! the operation that references them, so services discovered while
//! expanding a fragment are recorded in the compile context and propagated
//! to the spread's already-visited ancestors through their parent indices.

use crate::document::Fragment;
use crate::node::{NodeId, NodeKind, SelectionArena};
use indexmap::IndexSet;
use pushql_core::CompileError;
use pushql_schema::SchemaProvider;

/// Transient per-execution compile state.
///
/// Accumulates the runtime services discovered while expanding
/// service-dependent fields; owns no long-lived data and is recreated per
/// execution.
#[derive(Debug, Default)]
pub struct CompileContext {
    services: IndexSet<String>,
}

impl CompileContext {
    /// Creates a fresh compile context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records services required by an expanded field.
    pub fn add_services<I, S>(&mut self, services: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for service in services {
            self.services.insert(service.into());
        }
    }

    /// The services discovered so far, in discovery order.
    pub fn services(&self) -> impl Iterator<Item = &String> {
        self.services.iter()
    }

    /// True when no service has been discovered.
    pub fn is_pure(&self) -> bool {
        self.services.is_empty()
    }
}

/// A node surviving expansion, with its expanded children.
///
/// Expansion never rewrites the arena's child lists; both passes (full and
/// pure) read the same lowered nodes and describe their own view of the
/// tree here.
#[derive(Debug, Clone)]
pub struct ExpandedField {
    /// The arena node this entry stands for.
    pub id: NodeId,
    /// Type condition inherited from an enclosing inline fragment, if any.
    pub type_condition: Option<String>,
    /// Expanded child selections, in declaration order.
    pub children: Vec<ExpandedField>,
}

/// Expands a root selection.
///
/// With `exclude_service_fields` set this produces the pure view used to
/// build the backing-store query: service-dependent fields contribute their
/// extracted inputs or nothing.
pub fn expand_many(
    arena: &mut SelectionArena,
    fragments: &[Fragment],
    schema: &dyn SchemaProvider,
    ctx: &mut CompileContext,
    ids: &[NodeId],
    exclude_service_fields: bool,
) -> Result<Vec<ExpandedField>, CompileError> {
    let mut out = Vec::new();
    for &id in ids {
        out.extend(expand_node(
            arena,
            fragments,
            schema,
            ctx,
            id,
            exclude_service_fields,
            None,
        )?);
    }
    Ok(out)
}

fn expand_node(
    arena: &mut SelectionArena,
    fragments: &[Fragment],
    schema: &dyn SchemaProvider,
    ctx: &mut CompileContext,
    id: NodeId,
    exclude_service_fields: bool,
    condition: Option<&str>,
) -> Result<Vec<ExpandedField>, CompileError> {
    if !evaluate_directives(arena, schema, id)? {
        return Ok(Vec::new());
    }

    let kind = arena.node(id).kind.clone();
    match kind {
        NodeKind::FragmentSpread { fragment } => {
            let frag = fragments
                .iter()
                .find(|f| f.name == fragment)
                .ok_or_else(|| CompileError::UndefinedFragment(fragment.clone()))?;
            tracing::trace!(fragment = %frag.name, "inlining fragment spread");

            let roots = frag.roots.clone();
            let mut out = Vec::new();
            for root in roots {
                // The spread inherits its parent's runtime context, not the
                // fragment's declaration context.
                out.extend(expand_node(
                    arena,
                    fragments,
                    schema,
                    ctx,
                    root,
                    exclude_service_fields,
                    condition,
                )?);
            }

            // The operation may not have known about services inside the
            // fragment (the definition can follow the operation in the
            // document); propagate what expansion just discovered.
            if !exclude_service_fields
                && out.iter().any(|f| arena.node(f.id).has_services)
            {
                arena.mark_services_upward(id);
            }
            Ok(out)
        }
        NodeKind::InlineFragment { type_condition } => {
            let next_condition = type_condition.or_else(|| condition.map(str::to_string));
            let children = arena.node(id).children.clone();
            let mut out = Vec::new();
            for child in children {
                out.extend(expand_node(
                    arena,
                    fragments,
                    schema,
                    ctx,
                    child,
                    exclude_service_fields,
                    next_condition.as_deref(),
                )?);
            }
            Ok(out)
        }
        NodeKind::Field | NodeKind::Mutation => {
            if exclude_service_fields && arena.node(id).is_service_field() {
                return Ok(substitute_extracted_inputs(arena, schema, id, condition));
            }

            let child_ids = arena.node(id).children.clone();
            let mut children = Vec::new();
            for child in child_ids {
                children.extend(expand_node(
                    arena,
                    fragments,
                    schema,
                    ctx,
                    child,
                    exclude_service_fields,
                    None,
                )?);
            }

            if !exclude_service_fields {
                let node = arena.node(id);
                if let Some(field) = &node.field {
                    if field.has_services() {
                        ctx.add_services(field.services.clone());
                        arena.mark_services_upward(id);
                    }
                }
            }

            Ok(vec![ExpandedField {
                id,
                type_condition: condition.map(str::to_string),
                children,
            }])
        }
    }
}

/// Evaluates every directive on the node; false means the node is removed
/// from the plan.
fn evaluate_directives(
    arena: &SelectionArena,
    schema: &dyn SchemaProvider,
    id: NodeId,
) -> Result<bool, CompileError> {
    use pushql_schema::DirectiveDecision;

    for app in &arena.node(id).directives {
        let processor = schema
            .directive(&app.name)
            .ok_or_else(|| CompileError::UnknownDirective(app.name.clone()))?;
        if !processor.locations().contains(&app.location) {
            return Err(CompileError::InvalidDirectiveLocation {
                directive: app.name.clone(),
                location: app.location.to_string(),
            });
        }
        if processor.visit(app.location, &app.arguments)? == DirectiveDecision::Exclude {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Replaces a service field with its precomputed extracted inputs: values
/// the services need fetched from the store, known not to require further
/// service computation.
fn substitute_extracted_inputs(
    arena: &mut SelectionArena,
    schema: &dyn SchemaProvider,
    id: NodeId,
    condition: Option<&str>,
) -> Vec<ExpandedField> {
    let extracted = arena
        .node(id)
        .field
        .as_ref()
        .map(|f| f.extracted_inputs.clone())
        .unwrap_or_default();
    if extracted.is_empty() {
        return Vec::new();
    }

    let parent = arena.node(id).parent;
    let parent_type = parent_type_name(arena, schema, id);
    extracted
        .into_iter()
        .map(|input| {
            let field_def = schema.field(&parent_type, &input).cloned();
            let mut node = crate::node::FieldNode::field(input);
            node.field = field_def;
            node.parent = parent;
            ExpandedField {
                id: arena.alloc(node),
                type_condition: condition.map(str::to_string),
                children: Vec::new(),
            }
        })
        .collect()
}

/// The object type a node's siblings live on, walking parent indices past
/// structural nodes.
pub(crate) fn parent_type_name(
    arena: &SelectionArena,
    schema: &dyn SchemaProvider,
    id: NodeId,
) -> String {
    let mut current = arena.node(id).parent;
    while let Some(pid) = current {
        let parent = arena.node(pid);
        if let Some(field) = &parent.field {
            return field.ty.base_name().to_string();
        }
        current = parent.parent;
    }
    schema.query_type().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{DirectiveApplication, FieldNode};
    use pushql_core::Arguments;
    use pushql_schema::{
        DirectiveLocation, FieldDef, ObjectDef, Schema, TypeRef,
    };

    fn people_schema() -> Schema {
        Schema::builder()
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
            .build()
    }

    struct Fixture {
        arena: SelectionArena,
        fragments: Vec<Fragment>,
        roots: Vec<NodeId>,
    }

    /// Builds `{ people { name age } }` against the people schema.
    fn people_selection(schema: &Schema) -> Fixture {
        let mut arena = SelectionArena::new();
        let mut people = FieldNode::field("people");
        people.field = schema.field("Query", "people").cloned();
        let people = arena.alloc(people);

        for name in ["name", "age"] {
            let mut node = FieldNode::field(name);
            node.field = schema.field("Person", name).cloned();
            node.parent = Some(people);
            node.has_services = node.is_service_field();
            let id = arena.alloc(node);
            if arena.node(id).has_services {
                arena.mark_services_upward(id);
            }
            arena.node_mut(people).children.push(id);
        }

        Fixture {
            arena,
            fragments: Vec::new(),
            roots: vec![people],
        }
    }

    fn names(arena: &SelectionArena, fields: &[ExpandedField]) -> Vec<String> {
        fields
            .iter()
            .map(|f| arena.node(f.id).name.clone())
            .collect()
    }

    #[test]
    fn test_pure_pass_drops_service_field_and_substitutes_inputs() {
        let schema = people_schema();
        let mut fx = people_selection(&schema);
        let mut ctx = CompileContext::new();

        let pure = expand_many(&mut fx.arena, &fx.fragments, &schema, &mut ctx, &fx.roots, true)
            .expect("should expand");

        assert_eq!(pure.len(), 1);
        // `age` is replaced by its extracted input `birthday`.
        assert_eq!(names(&fx.arena, &pure[0].children), ["name", "birthday"]);
    }

    #[test]
    fn test_full_pass_keeps_order_and_records_services() {
        let schema = people_schema();
        let mut fx = people_selection(&schema);
        let mut ctx = CompileContext::new();

        let full = expand_many(&mut fx.arena, &fx.fragments, &schema, &mut ctx, &fx.roots, false)
            .expect("should expand");

        assert_eq!(names(&fx.arena, &full[0].children), ["name", "age"]);
        let services: Vec<&String> = ctx.services().collect();
        assert_eq!(services, ["ageService"]);
    }

    #[test]
    fn test_undefined_fragment_is_a_compile_error() {
        let schema = people_schema();
        let mut arena = SelectionArena::new();
        let spread = arena.alloc(FieldNode {
            kind: NodeKind::FragmentSpread {
                fragment: "missing".to_string(),
            },
            ..FieldNode::field("missing")
        });
        let mut ctx = CompileContext::new();

        let err = expand_many(&mut arena, &[], &schema, &mut ctx, &[spread], false)
            .expect_err("should fail");
        assert_eq!(err, CompileError::UndefinedFragment("missing".to_string()));
    }

    #[test]
    fn test_fragment_spread_inlines_at_position() {
        let schema = people_schema();
        let mut arena = SelectionArena::new();

        let mut frag_name = FieldNode::field("name");
        frag_name.field = schema.field("Person", "name").cloned();
        let frag_name = arena.alloc(frag_name);
        let fragments = vec![Fragment {
            name: "personFields".to_string(),
            type_condition: "Person".to_string(),
            roots: vec![frag_name],
        }];

        let mut people = FieldNode::field("people");
        people.field = schema.field("Query", "people").cloned();
        let people = arena.alloc(people);
        let mut before = FieldNode::field("birthday");
        before.field = schema.field("Person", "birthday").cloned();
        before.parent = Some(people);
        let before = arena.alloc(before);
        let spread = arena.alloc(FieldNode {
            kind: NodeKind::FragmentSpread {
                fragment: "personFields".to_string(),
            },
            parent: Some(people),
            ..FieldNode::field("personFields")
        });
        arena.node_mut(people).children = vec![before, spread];

        let mut ctx = CompileContext::new();
        let full = expand_many(&mut arena, &fragments, &schema, &mut ctx, &[people], false)
            .expect("should expand");

        assert_eq!(names(&arena, &full[0].children), ["birthday", "name"]);
    }

    #[test]
    fn test_fragment_services_mark_spread_ancestors() {
        let schema = people_schema();
        let mut arena = SelectionArena::new();

        // Fragment declared "after" the operation, containing the service
        // field; the operation cannot know about it at lowering time.
        let mut frag_age = FieldNode::field("age");
        frag_age.field = schema.field("Person", "age").cloned();
        frag_age.has_services = true;
        let frag_age = arena.alloc(frag_age);
        let fragments = vec![Fragment {
            name: "withAge".to_string(),
            type_condition: "Person".to_string(),
            roots: vec![frag_age],
        }];

        let mut people = FieldNode::field("people");
        people.field = schema.field("Query", "people").cloned();
        let people = arena.alloc(people);
        let spread = arena.alloc(FieldNode {
            kind: NodeKind::FragmentSpread {
                fragment: "withAge".to_string(),
            },
            parent: Some(people),
            ..FieldNode::field("withAge")
        });
        arena.node_mut(people).children = vec![spread];
        assert!(!arena.node(people).has_services);

        let mut ctx = CompileContext::new();
        expand_many(&mut arena, &fragments, &schema, &mut ctx, &[people], false)
            .expect("should expand");

        assert!(arena.node(people).has_services, "ancestor should be marked");
        assert!(!ctx.is_pure());
    }

    #[test]
    fn test_directive_exclusion_removes_node() {
        let schema = people_schema();
        let mut fx = people_selection(&schema);
        let name_id = fx.arena.node(fx.roots[0]).children[0];
        fx.arena.node_mut(name_id).directives.push(DirectiveApplication {
            name: "include".to_string(),
            location: DirectiveLocation::Field,
            arguments: Arguments::from_pairs([("if".to_string(), serde_json::json!(false))]),
        });

        let mut ctx = CompileContext::new();
        let full =
            expand_many(&mut fx.arena, &fx.fragments, &schema, &mut ctx, &fx.roots, false)
                .expect("should expand");

        assert_eq!(names(&fx.arena, &full[0].children), ["age"]);
    }

    #[test]
    fn test_unknown_directive_is_a_compile_error() {
        let schema = people_schema();
        let mut fx = people_selection(&schema);
        let name_id = fx.arena.node(fx.roots[0]).children[0];
        fx.arena.node_mut(name_id).directives.push(DirectiveApplication {
            name: "defer".to_string(),
            location: DirectiveLocation::Field,
            arguments: Arguments::new(),
        });

        let mut ctx = CompileContext::new();
        let err = expand_many(&mut fx.arena, &fx.fragments, &schema, &mut ctx, &fx.roots, false)
            .expect_err("should fail");
        assert_eq!(err, CompileError::UnknownDirective("defer".to_string()));
    }

    #[test]
    fn test_inline_fragment_condition_is_inherited() {
        let schema = people_schema();
        let mut arena = SelectionArena::new();

        let mut people = FieldNode::field("people");
        people.field = schema.field("Query", "people").cloned();
        let people = arena.alloc(people);
        let inline = arena.alloc(FieldNode {
            kind: NodeKind::InlineFragment {
                type_condition: Some("Person".to_string()),
            },
            parent: Some(people),
            ..FieldNode::field("")
        });
        let mut name = FieldNode::field("name");
        name.field = schema.field("Person", "name").cloned();
        name.parent = Some(inline);
        let name = arena.alloc(name);
        arena.node_mut(inline).children = vec![name];
        arena.node_mut(people).children = vec![inline];

        let mut ctx = CompileContext::new();
        let full = expand_many(&mut arena, &[], &schema, &mut ctx, &[people], false)
            .expect("should expand");

        let child = &full[0].children[0];
        assert_eq!(arena.node(child.id).name, "name");
        assert_eq!(child.type_condition.as_deref(), Some("Person"));
    }
}
