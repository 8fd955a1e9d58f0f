//! Directive processors for PushQL.
//!
//! A directive processor is a named plugin registered on the schema. During
//! expansion the engine evaluates every directive application against its
//! node; an [`DirectiveDecision::Exclude`] decision removes the node from
//! the plan entirely, before any backing-store interaction.

use pushql_core::{Arguments, CompileError};
use std::fmt;

/// Where a directive application may appear in an executable document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveLocation {
    Field,
    FragmentSpread,
    InlineFragment,
}

impl fmt::Display for DirectiveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Field => "FIELD",
            Self::FragmentSpread => "FRAGMENT_SPREAD",
            Self::InlineFragment => "INLINE_FRAGMENT",
        };
        write!(f, "{name}")
    }
}

/// The outcome of evaluating a directive against a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveDecision {
    /// Keep the node in the plan.
    Include,
    /// Remove the node from the plan.
    Exclude,
}

/// A directive processor plugin.
pub trait DirectiveProcessor: Send + Sync {
    /// The directive name, without the leading `@`.
    fn name(&self) -> &str;

    /// The locations this directive may be applied at.
    fn locations(&self) -> &[DirectiveLocation];

    /// Evaluates the directive against the node it annotates.
    fn visit(
        &self,
        location: DirectiveLocation,
        arguments: &Arguments,
    ) -> Result<DirectiveDecision, CompileError>;
}

const EXECUTABLE_LOCATIONS: &[DirectiveLocation] = &[
    DirectiveLocation::Field,
    DirectiveLocation::FragmentSpread,
    DirectiveLocation::InlineFragment,
];

fn require_if(directive: &str, arguments: &Arguments) -> Result<bool, CompileError> {
    arguments
        .get_as::<bool>("if")
        .ok_or_else(|| CompileError::InvalidDirectiveArguments {
            directive: directive.to_string(),
            reason: "argument 'if' is required and must be a Boolean".to_string(),
        })
}

/// The `@include` directive: keeps the node only when `if` is true.
#[derive(Debug, Default)]
pub struct IncludeDirective;

impl DirectiveProcessor for IncludeDirective {
    fn name(&self) -> &str {
        "include"
    }

    fn locations(&self) -> &[DirectiveLocation] {
        EXECUTABLE_LOCATIONS
    }

    fn visit(
        &self,
        _location: DirectiveLocation,
        arguments: &Arguments,
    ) -> Result<DirectiveDecision, CompileError> {
        Ok(if require_if("include", arguments)? {
            DirectiveDecision::Include
        } else {
            DirectiveDecision::Exclude
        })
    }
}

/// The `@skip` directive: removes the node when `if` is true.
#[derive(Debug, Default)]
pub struct SkipDirective;

impl DirectiveProcessor for SkipDirective {
    fn name(&self) -> &str {
        "skip"
    }

    fn locations(&self) -> &[DirectiveLocation] {
        EXECUTABLE_LOCATIONS
    }

    fn visit(
        &self,
        _location: DirectiveLocation,
        arguments: &Arguments,
    ) -> Result<DirectiveDecision, CompileError> {
        Ok(if require_if("skip", arguments)? {
            DirectiveDecision::Exclude
        } else {
            DirectiveDecision::Include
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: serde_json::Value) -> Arguments {
        Arguments::from_pairs([("if".to_string(), value)])
    }

    #[test]
    fn test_include_true_keeps_node() {
        let decision = IncludeDirective
            .visit(DirectiveLocation::Field, &args(serde_json::json!(true)))
            .expect("should evaluate");
        assert_eq!(decision, DirectiveDecision::Include);
    }

    #[test]
    fn test_include_false_removes_node() {
        let decision = IncludeDirective
            .visit(DirectiveLocation::Field, &args(serde_json::json!(false)))
            .expect("should evaluate");
        assert_eq!(decision, DirectiveDecision::Exclude);
    }

    #[test]
    fn test_skip_true_removes_node() {
        let decision = SkipDirective
            .visit(DirectiveLocation::FragmentSpread, &args(serde_json::json!(true)))
            .expect("should evaluate");
        assert_eq!(decision, DirectiveDecision::Exclude);
    }

    #[test]
    fn test_missing_if_is_a_compile_error() {
        let err = IncludeDirective
            .visit(DirectiveLocation::Field, &Arguments::new())
            .expect_err("should fail without 'if'");
        assert!(matches!(err, CompileError::InvalidDirectiveArguments { .. }));
    }
}
