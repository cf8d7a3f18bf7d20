//! Regex rules: `forbid_pattern`, `require_pattern`, `naming_pattern`, `location_pattern`.

use super::condition::line_exempt;
use super::matching::slash_path;
use super::{violation, ConstraintContext, ConstraintResult};
use crate::registry::Constraint;
use crate::types::{EngineRule, Violation};
use regex::{Regex, RegexBuilder};

/// Compiles a constraint pattern.
///
/// Accepts a plain regex or the `/body/flags` form with flags from `imsx`.
///
/// # Errors
///
/// Returns the regex error for a malformed pattern.
pub fn compile_pattern(raw: &str) -> Result<Regex, regex::Error> {
    if let Some(rest) = raw.strip_prefix('/') {
        if let Some(end) = rest.rfind('/') {
            let (body, flags) = (&rest[..end], &rest[end + 1..]);
            if flags.chars().all(|f| "imsx".contains(f)) {
                return RegexBuilder::new(body)
                    .case_insensitive(flags.contains('i'))
                    .multi_line(flags.contains('m'))
                    .dot_matches_new_line(flags.contains('s'))
                    .ignore_whitespace(flags.contains('x'))
                    .build();
            }
        }
    }
    Regex::new(raw)
}

fn invalid_pattern(
    c: &Constraint,
    ctx: &ConstraintContext<'_>,
    raw: &str,
    err: &regex::Error,
) -> Violation {
    let mut v = EngineRule::InvalidPattern
        .violation(
            c.severity,
            ctx.location(0, 0),
            format!("Invalid pattern '{raw}' in {}: {err}", c.rule),
        )
        .with_value(raw);
    if !c.source.is_empty() {
        v = v.with_source(&c.source);
    }
    v
}

/// One violation per line with a match; matches inside functions carrying an
/// exempting intent are skipped.
pub(super) fn forbid_pattern(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let content = ctx.model.content.as_str();
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(content.match_indices('\n').map(|(i, _)| i + 1))
        .collect();

    let mut violations = Vec::new();
    for raw in c.value.items() {
        let re = match compile_pattern(raw) {
            Ok(re) => re,
            Err(err) => {
                violations.push(invalid_pattern(c, ctx, raw, &err));
                continue;
            }
        };
        let mut last_line = 0;
        for m in re.find_iter(content) {
            let idx = line_starts.partition_point(|&start| start <= m.start());
            let line = idx.max(1);
            if line == last_line || line_exempt(c, ctx, line) {
                continue;
            }
            last_line = line;
            let column = m.start() - line_starts[line - 1] + 1;
            violations.push(violation(
                c,
                ctx,
                line,
                column,
                raw,
                format!("Forbidden pattern '{raw}' found: '{}'", m.as_str().trim()),
            ));
        }
    }
    ConstraintResult::from_violations(violations)
}

pub(super) fn require_pattern(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let violations = c
        .value
        .items()
        .into_iter()
        .filter_map(|raw| match compile_pattern(raw) {
            Err(err) => Some(invalid_pattern(c, ctx, raw, &err)),
            Ok(re) if re.is_match(&ctx.model.content) => None,
            Ok(_) => Some(violation(
                c,
                ctx,
                0,
                0,
                raw,
                format!("Required pattern '{raw}' not found"),
            )),
        })
        .collect();
    ConstraintResult::from_violations(violations)
}

/// Matches the file name against every pattern.
pub(super) fn naming_pattern(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let file_name = ctx
        .relative_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match_all(c, ctx, &file_name, "File name")
}

/// Matches the `/`-separated relative path against every pattern.
pub(super) fn location_pattern(c: &Constraint, ctx: &ConstraintContext<'_>) -> ConstraintResult {
    let path = slash_path(ctx.relative_path);
    match_all(c, ctx, &path, "File path")
}

fn match_all(
    c: &Constraint,
    ctx: &ConstraintContext<'_>,
    subject: &str,
    what: &str,
) -> ConstraintResult {
    let violations = c
        .value
        .items()
        .into_iter()
        .filter_map(|raw| match compile_pattern(raw) {
            Err(err) => Some(invalid_pattern(c, ctx, raw, &err)),
            Ok(re) if re.is_match(subject) => None,
            Ok(_) => Some(violation(
                c,
                ctx,
                0,
                0,
                raw,
                format!("{what} '{subject}' does not match '{raw}'"),
            )),
        })
        .collect();
    ConstraintResult::from_violations(violations)
}
