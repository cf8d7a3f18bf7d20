//! Condition gating and `unless` exemptions.

use super::matching::{decorator_matches, glob_matches, import_matches, ImportStyle};
use super::ConstraintContext;
use crate::registry::{Condition, ConditionClause, ConditionKind, Constraint, Exemption};

/// Returns true if every clause of `condition` holds for the file.
#[must_use]
pub fn holds(condition: &Condition, ctx: &ConstraintContext<'_>) -> bool {
    condition.clauses.iter().all(|clause| clause_holds(clause, ctx))
}

fn clause_holds(clause: &ConditionClause, ctx: &ConstraintContext<'_>) -> bool {
    let model = ctx.model;
    let style = ImportStyle::for_model(model);
    let any = |check: &dyn Fn(&str) -> bool| clause.values.iter().any(|v| check(v));
    let result = match clause.kind {
        ConditionKind::HasDecorator => any(&|v| {
            model
                .class_decorators()
                .any(|d| decorator_matches(&d.name, v))
        }),
        ConditionKind::MethodHasDecorator => any(&|v| {
            model
                .classes
                .iter()
                .flat_map(|c| c.methods.iter())
                .flat_map(|m| m.decorators.iter())
                .any(|d| decorator_matches(&d.name, v))
        }),
        ConditionKind::HasImport => {
            any(&|v| model.imports.iter().any(|i| import_matches(&i.module, v, style)))
        }
        ConditionKind::Extends => any(&|v| {
            model.classes.iter().any(|c| {
                c.extends.as_deref() == Some(v) || c.inheritance_chain.iter().any(|p| p == v)
            })
        }),
        ConditionKind::Implements => any(&|v| {
            model
                .classes
                .iter()
                .any(|c| c.implements.iter().any(|i| i == v))
        }),
        ConditionKind::FileMatches => any(&|v| glob_matches(v, ctx.relative_path)),
    };
    result != clause.negated
}

/// Returns true if a file-level `unless` entry exempts the file from `constraint`.
#[must_use]
pub fn file_exempt(constraint: &Constraint, ctx: &ConstraintContext<'_>) -> bool {
    constraint.unless.iter().any(|exemption| match exemption {
        Exemption::Intent(name) => ctx.has_intent(name),
        Exemption::Import(module) => ctx
            .model
            .imports
            .iter()
            .any(|i| import_matches(&i.module, module, ImportStyle::for_model(ctx.model))),
        Exemption::Decorator(name) => ctx
            .model
            .all_decorators()
            .any(|d| decorator_matches(&d.name, name)),
    })
}

/// Returns true if the function or method enclosing `line` carries an exempting intent.
#[must_use]
pub fn line_exempt(constraint: &Constraint, ctx: &ConstraintContext<'_>, line: usize) -> bool {
    let intents = ctx.model.intents_at_line(line);
    constraint
        .unless
        .iter()
        .filter_map(Exemption::as_intent)
        .any(|name| intents.contains(&name))
}
