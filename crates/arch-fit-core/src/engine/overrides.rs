//! Override reconciliation.
//!
//! Each `@override rule:value` block is checked against the override policy.
//! Blocks that pass suppress every finding with the same rule and value; the
//! rest become findings of their own.

use crate::annotations::OverrideAnnotation;
use crate::config::OverrideConfig;
use crate::types::{ActiveOverride, EngineRule, Location, Severity, Violation};
use chrono::{Days, NaiveDate};
use std::path::Path;

/// Findings after overrides were applied.
#[derive(Debug, Default)]
pub(crate) struct OverrideOutcome {
    /// Findings that were not suppressed.
    pub remaining: Vec<Violation>,
    /// Overrides that suppressed at least one finding.
    pub active: Vec<ActiveOverride>,
    /// Policy findings about the overrides themselves.
    pub policy: Vec<Violation>,
}

/// Checks one override against the policy.
enum Verdict {
    /// Suppresses its target.
    Apply(Option<NaiveDate>),
    /// Rejected; the target stays.
    Reject,
}

pub(crate) fn apply_overrides(
    findings: Vec<Violation>,
    overrides: &[OverrideAnnotation],
    policy: &OverrideConfig,
    today: NaiveDate,
    file: &Path,
) -> OverrideOutcome {
    let mut outcome = OverrideOutcome {
        remaining: findings,
        ..OverrideOutcome::default()
    };

    let limit = policy.max_overrides_per_file;
    if overrides.len() > limit {
        let first_excess = &overrides[limit];
        outcome.policy.push(
            EngineRule::OverrideLimit
                .violation(
                    Severity::Error,
                    Location::new(file, first_excess.line, 0),
                    format!("File has {} overrides (max {limit})", overrides.len()),
                )
                .with_value(overrides.len().to_string())
                .with_fix_hint("Remove overrides or fix the underlying violations"),
        );
    }

    for annotation in overrides.iter().take(limit) {
        let Verdict::Apply(expires) =
            check_policy(annotation, policy, today, file, &mut outcome.policy)
        else {
            continue;
        };

        let before = outcome.remaining.len();
        outcome.remaining.retain(|v| !targets(annotation, v));
        if outcome.remaining.len() == before {
            outcome.policy.push(
                override_violation(
                    EngineRule::UnusedOverride,
                    Severity::Warning,
                    annotation,
                    file,
                    format!("Override '{}' matches no violation", target(annotation)),
                )
                .with_fix_hint("Remove the override"),
            );
            continue;
        }
        tracing::debug!(
            file = %file.display(),
            rule = %annotation.rule,
            value = %annotation.value,
            "Override applied"
        );
        outcome.active.push(ActiveOverride {
            rule: annotation.rule.clone(),
            value: annotation.value.clone(),
            reason: annotation.reason.clone().unwrap_or_default(),
            expires,
            ticket: annotation.ticket.clone(),
            line: annotation.line,
        });
    }
    outcome
}

fn check_policy(
    annotation: &OverrideAnnotation,
    policy: &OverrideConfig,
    today: NaiveDate,
    file: &Path,
    findings: &mut Vec<Violation>,
) -> Verdict {
    let mut invalid = |message: String| {
        findings.push(override_violation(
            EngineRule::InvalidOverride,
            Severity::Error,
            annotation,
            file,
            message,
        ));
        Verdict::Reject
    };

    if annotation.rule.is_empty() {
        return invalid("Override has no rule; expected `@override rule:value`".to_string());
    }
    if annotation.reason.is_none() {
        return invalid(format!("Override '{}' has no @reason", target(annotation)));
    }
    if policy.requires("ticket") && annotation.ticket.is_none() {
        return invalid(format!("Override '{}' has no @ticket", target(annotation)));
    }

    let Some(raw) = annotation.expires.as_deref() else {
        if policy.requires("expires") {
            return invalid(format!("Override '{}' has no @expires", target(annotation)));
        }
        if policy.warn_no_expiry {
            findings.push(override_violation(
                EngineRule::OverrideNoExpiry,
                Severity::Warning,
                annotation,
                file,
                format!("Override '{}' has no @expires date", target(annotation)),
            ));
        }
        return Verdict::Apply(None);
    };

    let Ok(expires) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") else {
        return invalid(format!("Invalid @expires date '{raw}', expected YYYY-MM-DD"));
    };

    let horizon = u64::try_from(policy.max_expiry_days)
        .ok()
        .and_then(|days| today.checked_add_days(Days::new(days)));
    if horizon.is_some_and(|h| expires > h) {
        return invalid(format!(
            "Override expiry {expires} is more than {} days away",
            policy.max_expiry_days
        ));
    }

    if expires < today {
        let message = format!("Override '{}' expired on {expires}", target(annotation));
        if policy.fail_on_expired_override {
            findings.push(override_violation(
                EngineRule::ExpiredOverride,
                Severity::Error,
                annotation,
                file,
                message,
            ));
            return Verdict::Reject;
        }
        findings.push(override_violation(
            EngineRule::ExpiredOverride,
            Severity::Warning,
            annotation,
            file,
            message,
        ));
    }
    Verdict::Apply(Some(expires))
}

/// An empty override value covers every value of the rule.
fn covers(rule: &str, value: &str, finding_rule: &str, finding_value: &str) -> bool {
    finding_rule == rule && (value.is_empty() || finding_value == value)
}

fn targets(annotation: &OverrideAnnotation, violation: &Violation) -> bool {
    covers(&annotation.rule, &annotation.value, &violation.rule, &violation.value)
}

/// Returns true if an applied override suppressed findings with `rule` and `value`.
pub(crate) fn suppressed(active: &[ActiveOverride], rule: &str, value: &str) -> bool {
    active.iter().any(|o| covers(&o.rule, &o.value, rule, value))
}

fn target(annotation: &OverrideAnnotation) -> String {
    format!("{}:{}", annotation.rule, annotation.value)
}

fn override_violation(
    rule: EngineRule,
    severity: Severity,
    annotation: &OverrideAnnotation,
    file: &Path,
    message: String,
) -> Violation {
    rule.violation(severity, Location::new(file, annotation.line, 0), message)
        .with_value(target(annotation))
}
