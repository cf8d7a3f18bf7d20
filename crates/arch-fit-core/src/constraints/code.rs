//! Rules over declarations, calls and mutations.

use super::matching::{decorator_matches, target_matches};
use super::{violation, ConstraintContext, ConstraintResult};
use crate::registry::Constraint;
use crate::semantic::{FunctionCall, Visibility};
use crate::types::Violation;

fn call_matches(call: &FunctionCall, pattern: &str) -> bool {
    target_matches(&call.callee, pattern)
}

pub(super) fn forbid_call(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let forbidden = c.value.items();
    let violations = ctx
        .model
        .function_calls
        .iter()
        .filter_map(|call| {
            let pattern = forbidden.iter().find(|p| call_matches(call, p))?;
            Some(violation(
                c,
                ctx,
                call.line,
                call.column,
                pattern,
                format!("Call to '{}' is forbidden", call.callee),
            ))
        })
        .collect();
    ConstraintResult::from_violations(violations)
}

pub(super) fn require_call(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let violations = c
        .value
        .items()
        .into_iter()
        .filter(|p| !ctx.model.function_calls.iter().any(|call| call_matches(call, p)))
        .map(|p| violation(c, ctx, 0, 0, p, format!("Required call to '{p}' not found")))
        .collect();
    ConstraintResult::from_violations(violations)
}

pub(super) fn require_try_catch(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let guarded = c.value.items();
    let violations = ctx
        .model
        .function_calls
        .iter()
        .filter(|call| !call.control_flow.in_try)
        .filter_map(|call| {
            let pattern = guarded.iter().find(|p| call_matches(call, p))?;
            Some(violation(
                c,
                ctx,
                call.line,
                call.column,
                pattern,
                format!("Call to '{}' must be wrapped in try/catch", call.callee),
            ))
        })
        .collect();
    ConstraintResult::from_violations(violations)
}

pub(super) fn forbid_mutation(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let forbidden = c.value.items();
    let violations = ctx
        .model
        .mutations
        .iter()
        .filter_map(|m| {
            let pattern = forbidden.iter().find(|p| target_matches(&m.target, p))?;
            let action = if m.is_delete { "Deletion" } else { "Mutation" };
            Some(violation(
                c,
                ctx,
                m.line,
                m.column,
                pattern,
                format!("{action} of '{}' is forbidden", m.target),
            ))
        })
        .collect();
    ConstraintResult::from_violations(violations)
}

pub(super) fn forbid_decorator(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let forbidden = c.value.items();
    let violations = ctx
        .model
        .all_decorators()
        .filter_map(|d| {
            let pattern = forbidden.iter().find(|p| decorator_matches(&d.name, p))?;
            Some(violation(
                c,
                ctx,
                d.line,
                0,
                pattern,
                format!("Decorator '@{}' is forbidden", d.name),
            ))
        })
        .collect();
    ConstraintResult::from_violations(violations)
}

/// Every class must carry every listed decorator. Files without classes pass.
pub(super) fn require_decorator(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let required = c.value.items();
    let mut violations = Vec::new();
    for class in &ctx.model.classes {
        for name in &required {
            if !class.decorators.iter().any(|d| decorator_matches(&d.name, name)) {
                violations.push(violation(
                    c,
                    ctx,
                    class.line,
                    0,
                    name,
                    format!("Class '{}' is missing required decorator '@{name}'", class.name),
                ));
            }
        }
    }
    ConstraintResult::from_violations(violations)
}

/// Constructors and static methods are not counted.
pub(super) fn max_public_methods(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let Some(limit) = c.value.as_number() else {
        return ConstraintResult::pass();
    };
    let limit = usize::try_from(limit).unwrap_or(0);
    let violations: Vec<Violation> = ctx
        .model
        .classes
        .iter()
        .filter_map(|class| {
            let count = class
                .methods
                .iter()
                .filter(|m| {
                    m.visibility == Visibility::Public
                        && !m.is_static
                        && !matches!(m.name.as_str(), "constructor" | "__init__")
                })
                .count();
            (count > limit).then(|| {
                violation(
                    c,
                    ctx,
                    class.line,
                    0,
                    &limit.to_string(),
                    format!(
                        "Class '{}' has {count} public methods (max {limit})",
                        class.name
                    ),
                )
            })
        })
        .collect();
    ConstraintResult::from_violations(violations)
}

/// `*` requires at least one export.
pub(super) fn require_export(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let exports = &ctx.model.exports;
    let violations = c
        .value
        .items()
        .into_iter()
        .filter(|name| {
            if *name == "*" {
                exports.is_empty()
            } else {
                !exports.iter().any(|e| e.name == *name)
            }
        })
        .map(|name| {
            violation(
                c,
                ctx,
                0,
                0,
                name,
                format!("Required export '{name}' not found"),
            )
        })
        .collect();
    ConstraintResult::from_violations(violations)
}
