//! Import rules: `forbid_import`, `require_import`, `importable_by`, `forbid_circular_deps`.

use super::matching::{import_matches, slash_path, target_matches, ImportStyle};
use super::{violation, ConstraintContext, ConstraintResult};
use crate::registry::Constraint;
use crate::types::Suggestion;

pub(super) fn forbid_import(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let forbidden = c.value.items();
    let style = ImportStyle::for_model(ctx.model);
    let violations = ctx
        .model
        .imports
        .iter()
        .filter_map(|import| {
            let pattern = forbidden
                .iter()
                .find(|p| import_matches(&import.module, p, style))?;
            let mut v = violation(
                c,
                ctx,
                import.line,
                import.column,
                pattern,
                format!("Import of '{}' is forbidden", import.module),
            );
            if let Some(entry) = ctx.patterns.and_then(|p| p.find_for(pattern)) {
                let message = format!(
                    "Use the canonical '{}' implementation at {}",
                    entry.name, entry.canonical
                );
                v = v.with_suggestion(match &entry.usage {
                    Some(usage) => Suggestion::with_replacement(message, usage),
                    None => Suggestion::new(message),
                });
            }
            Some(v)
        })
        .collect();
    ConstraintResult::from_violations(violations)
}

pub(super) fn require_import(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let style = ImportStyle::for_model(ctx.model);
    let violations = c
        .value
        .items()
        .into_iter()
        .filter(|required| {
            !ctx.model
                .imports
                .iter()
                .any(|i| import_matches(&i.module, required, style))
        })
        .map(|required| {
            violation(
                c,
                ctx,
                0,
                0,
                required,
                format!("Required import '{required}' is missing"),
            )
        })
        .collect();
    ConstraintResult::from_violations(violations)
}

/// Untagged importers cannot be classified and are skipped.
pub(super) fn importable_by(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let Some(project) = ctx.project else {
        return ConstraintResult::pass();
    };
    let allowed = c.value.items();
    let violations = project
        .importers
        .iter()
        .filter_map(|importer| {
            let arch = importer.arch_id.as_deref()?;
            if arch == ctx.arch_id || allowed.iter().any(|a| target_matches(arch, a)) {
                return None;
            }
            Some(violation(
                c,
                ctx,
                0,
                0,
                arch,
                format!(
                    "Imported by '{}' ({arch}:{}), which is not in the allowed importers",
                    slash_path(&importer.file),
                    importer.line
                ),
            ))
        })
        .collect();
    ConstraintResult::from_violations(violations)
}

pub(super) fn forbid_circular_deps(
    c: &Constraint,
    ctx: &ConstraintContext<'_>,
) -> ConstraintResult {
    let Some(project) = ctx.project else {
        return ConstraintResult::pass();
    };
    let violations = project
        .cycles
        .iter()
        .filter(|cycle| cycle.iter().any(|p| p == ctx.relative_path))
        .map(|cycle| {
            let members: Vec<String> = cycle.iter().map(|p| slash_path(p)).collect();
            violation(
                c,
                ctx,
                0,
                0,
                "",
                format!("File is part of an import cycle among: {}", members.join(", ")),
            )
        })
        .collect();
    ConstraintResult::from_violations(violations)
}
