//! File-level rules: `max_file_lines`, `require_test_file`, `require_companion_file`.

use super::matching::slash_path;
use super::{violation, ConstraintContext, ConstraintResult};
use crate::registry::Constraint;
use std::path::Path;

pub(super) fn max_file_lines(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let Some(limit) = c.value.as_number() else {
        return ConstraintResult::pass();
    };
    let lines = ctx.model.line_count;
    if i64::try_from(lines).unwrap_or(i64::MAX) <= limit {
        return ConstraintResult::pass();
    }
    ConstraintResult::from_violations(vec![violation(
        c,
        ctx,
        0,
        0,
        &limit.to_string(),
        format!("File has {lines} lines (max {limit})"),
    )])
}

/// Returns true for files that are themselves tests.
#[must_use]
pub fn is_test_file(path: &Path) -> bool {
    let in_test_dir = path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some("tests" | "test" | "__tests__" | "spec")
        )
    });
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    in_test_dir
        || name.contains(".test.")
        || name.contains(".spec.")
        || stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.ends_with("Test")
}

const DEFAULT_TEST_TEMPLATES: &[&str] = &[
    "{dir}/{name}.test.{ext}",
    "{dir}/{name}.spec.{ext}",
    "{dir}/__tests__/{name}.test.{ext}",
    "{dir}/{name}_test.{ext}",
    "{dir}/test_{name}.{ext}",
    "tests/{name}.{ext}",
    "tests/test_{name}.{ext}",
];

/// Expands `{dir}`, `{name}` and `{ext}` for `file`.
///
/// `{name}` is everything before the last extension (`user.service` for
/// `user.service.ts`). An empty `{dir}` drops its trailing separator.
#[must_use]
pub fn render_template(template: &str, file: &Path) -> String {
    let dir = file.parent().map(slash_path).unwrap_or_default();
    let name = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = file
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let template = if dir.is_empty() {
        template.replace("{dir}/", "")
    } else {
        template.to_string()
    };
    template
        .replace("{dir}", &dir)
        .replace("{name}", &name)
        .replace("{ext}", &ext)
}

/// Without a project root the rule cannot look at the disk and passes.
pub(super) fn require_test_file(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let Some(root) = ctx.project_root else {
        return ConstraintResult::pass();
    };
    if is_test_file(ctx.relative_path) {
        return ConstraintResult::pass();
    }
    let custom = c.value.items();
    let templates: &[&str] = if custom.is_empty() {
        DEFAULT_TEST_TEMPLATES
    } else {
        &custom
    };
    let candidates: Vec<String> = templates
        .iter()
        .map(|t| render_template(t, ctx.relative_path))
        .collect();
    if candidates.iter().any(|p| root.join(p).is_file()) {
        return ConstraintResult::pass();
    }
    let expected = candidates.first().cloned().unwrap_or_default();
    let v = violation(
        c,
        ctx,
        0,
        0,
        &expected,
        format!(
            "No test file found for '{}'",
            slash_path(ctx.relative_path)
        ),
    )
    .with_fix_hint(format!("Create {expected}"));
    ConstraintResult::from_violations(vec![v])
}

pub(super) fn require_companion_file(
    c: &Constraint,
    ctx: &ConstraintContext<'_>,
) -> ConstraintResult {
    let Some(root) = ctx.project_root else {
        return ConstraintResult::pass();
    };
    let violations = c
        .value
        .items()
        .into_iter()
        .filter_map(|template| {
            let companion = render_template(template, ctx.relative_path);
            if root.join(&companion).exists() {
                return None;
            }
            Some(
                violation(
                    c,
                    ctx,
                    0,
                    0,
                    template,
                    format!("Companion file '{companion}' is missing"),
                )
                .with_fix_hint(format!("Create {companion}")),
            )
        })
        .collect();
    ConstraintResult::from_violations(violations)
}
