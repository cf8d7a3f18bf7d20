//! Core types for violations and validation results.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Severity level for constraint violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reported, but does not fail the file.
    Warning,
    /// Fails the file.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Source code location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// File path relative to project root.
    pub file: PathBuf,
    /// Line number (1-indexed, 0 for file-level findings).
    pub line: usize,
    /// Column number (1-indexed, 0 when unknown).
    pub column: usize,
}

impl Location {
    /// Creates a new location with explicit values.
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Creates a location that refers to the whole file.
    #[must_use]
    pub fn file_level(file: impl Into<PathBuf>) -> Self {
        Self::new(file, 0, 0)
    }
}

/// A suggested fix for a violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Human-readable description of the fix.
    pub message: String,
    /// Replacement text (e.g. the import statement to use instead).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

impl Suggestion {
    /// Creates a new suggestion without replacement text.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            replacement: None,
        }
    }

    /// Creates a new suggestion with replacement text.
    #[must_use]
    pub fn with_replacement(message: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            replacement: Some(replacement.into()),
        }
    }
}

/// A constraint violation found during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule code (e.g., "AF101").
    pub code: String,
    /// Rule name (e.g., "forbid_import").
    pub rule: String,
    /// The offending value (e.g., the forbidden module).
    pub value: String,
    /// Severity of this violation.
    pub severity: Severity,
    /// Primary location of the violation.
    pub location: Location,
    /// Human-readable message.
    pub message: String,
    /// Rationale copied from the constraint's `why`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
    /// Short hint on how to fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
    /// Architecture that declared the violated constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Structured suggestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Suggestion>,
    /// Closest known value when the offending value looks like a typo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did_you_mean: Option<String>,
}

impl Violation {
    /// Creates a new violation.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        rule: impl Into<String>,
        severity: Severity,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            rule: rule.into(),
            value: String::new(),
            severity,
            location,
            message: message.into(),
            why: None,
            fix_hint: None,
            source: None,
            suggestion: None,
            did_you_mean: None,
        }
    }

    /// Sets the offending value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Sets the rationale.
    #[must_use]
    pub fn with_why(mut self, why: Option<String>) -> Self {
        self.why = why;
        self
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Sets the provenance architecture.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds a suggestion to this violation.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: Suggestion) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    /// Adds a "did you mean" value.
    #[must_use]
    pub fn with_did_you_mean(mut self, candidate: impl Into<String>) -> Self {
        self.did_you_mean = Some(candidate.into());
        self
    }

    /// Returns true if this violation was produced by the given rule name.
    #[must_use]
    pub fn is_rule(&self, rule: &str) -> bool {
        self.rule == rule
    }

    /// Formats the violation for terminal output.
    #[must_use]
    pub fn format(&self) -> String {
        use std::fmt::Write;
        let mut output = format!(
            "{} {} at {}:{}:{}\n",
            self.code,
            self.rule,
            self.location.file.display(),
            self.location.line,
            self.location.column,
        );
        let _ = writeln!(output, "  {}: {}", self.severity, self.message);
        if let Some(why) = &self.why {
            let _ = writeln!(output, "  = why: {why}");
        }
        if let Some(hint) = &self.fix_hint {
            let _ = writeln!(output, "  = fix: {hint}");
        }
        if let Some(suggestion) = &self.suggestion {
            let _ = writeln!(output, "  = help: {}", suggestion.message);
        }
        if let Some(candidate) = &self.did_you_mean {
            let _ = writeln!(output, "  = did you mean `{candidate}`?");
        }
        output
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} [{}] {}",
            self.location.file.display(),
            self.location.line,
            self.location.column,
            self.severity,
            self.code,
            self.message
        )?;
        if let Some(source) = &self.source {
            write!(f, " (from: {source})")?;
        }
        Ok(())
    }
}

/// Violations raised by the engine itself rather than by a registry constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineRule {
    /// File has no `@arch` tag and the untagged policy reports it.
    MissingArchTag,
    /// `@arch` tag names an architecture the registry does not define.
    InvalidArchId,
    /// File could not be read or validated.
    InternalError,
    /// More than one file resolves to a singleton architecture.
    SingletonViolation,
    /// Registry problem found while flattening the file's architecture.
    ResolutionConflict,
    /// Too many overrides in one file.
    OverrideLimit,
    /// Override is malformed (missing reason, bad date, expiry too far out).
    InvalidOverride,
    /// Override expiry date has passed.
    ExpiredOverride,
    /// Override has no `@expires`.
    OverrideNoExpiry,
    /// Override matches no violation.
    UnusedOverride,
    /// A `forbid_*` constraint fired without a `why`.
    MissingWhy,
    /// A regex in a constraint value failed to compile.
    InvalidPattern,
    /// Import crosses a configured layer boundary.
    LayerViolation,
    /// A planned change points outside the project root.
    PathTraversal,
    /// A planned file creation names no architecture.
    MissingArchId,
}

impl EngineRule {
    /// Returns the snake_case rule name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::MissingArchTag => "missing_arch_tag",
            Self::InvalidArchId => "invalid_arch_id",
            Self::InternalError => "internal_error",
            Self::SingletonViolation => "singleton_violation",
            Self::ResolutionConflict => "resolution_conflict",
            Self::OverrideLimit => "override_limit",
            Self::InvalidOverride => "invalid_override",
            Self::ExpiredOverride => "expired_override",
            Self::OverrideNoExpiry => "override_no_expiry",
            Self::UnusedOverride => "unused_override",
            Self::MissingWhy => "missing_why",
            Self::InvalidPattern => "invalid_pattern",
            Self::LayerViolation => "layer_violation",
            Self::PathTraversal => "path_traversal",
            Self::MissingArchId => "missing_arch_id",
        }
    }

    /// Returns the rule code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::MissingArchTag => "AF901",
            Self::InvalidArchId => "AF902",
            Self::InternalError => "AF903",
            Self::SingletonViolation => "AF904",
            Self::ResolutionConflict => "AF905",
            Self::OverrideLimit => "AF910",
            Self::InvalidOverride => "AF911",
            Self::ExpiredOverride => "AF912",
            Self::OverrideNoExpiry => "AF913",
            Self::UnusedOverride => "AF914",
            Self::MissingWhy => "AF920",
            Self::InvalidPattern => "AF921",
            Self::LayerViolation => "AF930",
            Self::PathTraversal => "AF940",
            Self::MissingArchId => "AF941",
        }
    }

    /// Creates a violation for this rule.
    #[must_use]
    pub fn violation(
        self,
        severity: Severity,
        location: Location,
        message: impl Into<String>,
    ) -> Violation {
        Violation::new(self.code(), self.name(), severity, location, message)
    }
}

/// Final status of a validated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// No violations and no warnings.
    Pass,
    /// Warnings only.
    Warn,
    /// At least one unsuppressed violation.
    Fail,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Warn => write!(f, "warn"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// An override that passed every policy check and suppresses a violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveOverride {
    /// Overridden rule name.
    pub rule: String,
    /// Overridden value.
    pub value: String,
    /// Justification.
    pub reason: String,
    /// Expiry date, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<NaiveDate>,
    /// Tracking ticket, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    /// Line of the `@override` annotation.
    pub line: usize,
}

/// Result of validating a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// File path relative to project root.
    pub file: PathBuf,
    /// Resolved architecture, `None` when the file is untagged.
    pub arch_id: Option<String>,
    /// Final status.
    pub status: ValidationStatus,
    /// Unsuppressed error-level findings.
    pub violations: Vec<Violation>,
    /// Warning-level findings.
    pub warnings: Vec<Violation>,
    /// Overrides that suppressed a violation.
    pub overrides_active: Vec<ActiveOverride>,
    /// Number of constraints evaluated without findings.
    pub passed: usize,
    /// Number of constraints that produced error-level findings.
    pub failed: usize,
    /// Number of constraints that produced warning-level findings.
    pub warned: usize,
    /// Number of `@override` annotations found in the file.
    pub override_count: usize,
    /// Root-to-leaf inheritance chain of the resolved architecture.
    pub inheritance_chain: Vec<String>,
    /// Mixins applied during flattening.
    pub mixins_applied: Vec<String>,
}

impl ValidationResult {
    /// Creates an empty passing result for a file.
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, arch_id: Option<String>) -> Self {
        Self {
            file: file.into(),
            arch_id,
            status: ValidationStatus::Pass,
            violations: Vec::new(),
            warnings: Vec::new(),
            overrides_active: Vec::new(),
            passed: 0,
            failed: 0,
            warned: 0,
            override_count: 0,
            inheritance_chain: Vec::new(),
            mixins_applied: Vec::new(),
        }
    }

    /// Creates a failed result carrying a single `internal_error` violation.
    #[must_use]
    pub fn internal_error(
        file: &Path,
        arch_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut result = Self::new(file, arch_id);
        result.violations.push(EngineRule::InternalError.violation(
            Severity::Error,
            Location::file_level(file),
            message,
        ));
        result.compute_status();
        result
    }

    /// Adds a finding to `violations` or `warnings` depending on its severity.
    pub fn push(&mut self, violation: Violation) {
        match violation.severity {
            Severity::Error => self.violations.push(violation),
            Severity::Warning => self.warnings.push(violation),
        }
    }

    /// Recomputes `status` from the current findings.
    pub fn compute_status(&mut self) {
        self.status = if !self.violations.is_empty() {
            ValidationStatus::Fail
        } else if !self.warnings.is_empty() {
            ValidationStatus::Warn
        } else {
            ValidationStatus::Pass
        };
    }

    /// Moves every warning into `violations` with error severity.
    pub fn promote_warnings(&mut self) {
        for mut warning in self.warnings.drain(..) {
            warning.severity = Severity::Error;
            self.violations.push(warning);
        }
    }

    /// Returns true if any violation or warning was produced by `rule`.
    #[must_use]
    pub fn has_rule(&self, rule: &str) -> bool {
        self.violations
            .iter()
            .chain(&self.warnings)
            .any(|v| v.is_rule(rule))
    }
}

/// Aggregate counts for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Files in the batch.
    pub total_files: usize,
    /// Files with status `pass`.
    pub passed: usize,
    /// Files with status `warn`.
    pub warned: usize,
    /// Files with status `fail`.
    pub failed: usize,
    /// Files without an `@arch` tag.
    pub untagged: usize,
    /// Total error-level findings.
    pub total_violations: usize,
    /// Total warning-level findings.
    pub total_warnings: usize,
    /// Results hydrated from the cache without re-parsing.
    pub cache_hits: usize,
}

/// Result of validating a batch of files.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BatchResult {
    /// One result per requested file, in request order.
    pub results: Vec<ValidationResult>,
    /// Aggregated counts.
    pub summary: BatchSummary,
}

impl BatchResult {
    /// Builds a batch result and computes the summary.
    #[must_use]
    pub fn new(results: Vec<ValidationResult>, cache_hits: usize) -> Self {
        let mut summary = BatchSummary {
            total_files: results.len(),
            cache_hits,
            ..BatchSummary::default()
        };
        for result in &results {
            match result.status {
                ValidationStatus::Pass => summary.passed += 1,
                ValidationStatus::Warn => summary.warned += 1,
                ValidationStatus::Fail => summary.failed += 1,
            }
            if result.arch_id.is_none() {
                summary.untagged += 1;
            }
            summary.total_violations += result.violations.len();
            summary.total_warnings += result.warnings.len();
        }
        Self { results, summary }
    }

    /// Returns true if any file failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    /// Returns the result for a file, if present.
    #[must_use]
    pub fn result_for(&self, file: &Path) -> Option<&ValidationResult> {
        self.results.iter().find(|r| r.file == file)
    }

    /// Formats every finding plus a summary line.
    #[must_use]
    pub fn format_report(&self) -> String {
        use std::fmt::Write;

        let mut report = String::new();
        for result in &self.results {
            for v in result.violations.iter().chain(&result.warnings) {
                let _ = writeln!(report, "{}", v.format());
            }
        }
        let s = &self.summary;
        let _ = writeln!(
            report,
            "Checked {} file(s): {} passed, {} warned, {} failed ({} untagged)",
            s.total_files, s.passed, s.warned, s.failed, s.untagged
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_violation(severity: Severity) -> Violation {
        Violation::new(
            "AF101",
            "forbid_import",
            severity,
            Location::new("src/core/engine.ts", 3, 1),
            "Import of 'axios' is forbidden",
        )
        .with_value("axios")
    }

    #[test]
    fn violation_format_includes_why_and_help() {
        let v = make_violation(Severity::Error)
            .with_why(Some("engine must stay I/O free".to_string()))
            .with_suggestion(Suggestion::new("Use src/core/http"));
        insta::assert_snapshot!(v.format(), @r"
        AF101 forbid_import at src/core/engine.ts:3:1
          error: Import of 'axios' is forbidden
          = why: engine must stay I/O free
          = help: Use src/core/http
        ");
    }

    #[test]
    fn violation_display_includes_source() {
        let v = make_violation(Severity::Error).with_source("base");
        let display = format!("{v}");
        assert!(display.contains("(from: base)"));
        assert!(display.starts_with("src/core/engine.ts:3:1: error [AF101]"));
    }

    #[test]
    fn push_partitions_by_severity() {
        let mut result = ValidationResult::new("a.ts", Some("core".into()));
        result.push(make_violation(Severity::Error));
        result.push(make_violation(Severity::Warning));
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.warnings.len(), 1);
        result.compute_status();
        assert_eq!(result.status, ValidationStatus::Fail);
    }

    #[test]
    fn warnings_only_is_warn() {
        let mut result = ValidationResult::new("a.ts", None);
        result.push(make_violation(Severity::Warning));
        result.compute_status();
        assert_eq!(result.status, ValidationStatus::Warn);
    }

    #[test]
    fn promote_warnings_fails_result() {
        let mut result = ValidationResult::new("a.ts", None);
        result.push(make_violation(Severity::Warning));
        result.promote_warnings();
        result.compute_status();
        assert!(result.warnings.is_empty());
        assert_eq!(result.violations[0].severity, Severity::Error);
        assert_eq!(result.status, ValidationStatus::Fail);
    }

    #[test]
    fn internal_error_result_fails() {
        let result = ValidationResult::internal_error(Path::new("gone.ts"), None, "read failed");
        assert_eq!(result.status, ValidationStatus::Fail);
        assert!(result.has_rule("internal_error"));
    }

    #[test]
    fn batch_summary_counts() {
        let mut failing = ValidationResult::new("a.ts", Some("core".into()));
        failing.push(make_violation(Severity::Error));
        failing.compute_status();
        let untagged = ValidationResult::new("b.ts", None);

        let batch = BatchResult::new(vec![failing, untagged], 1);
        assert_eq!(batch.summary.total_files, 2);
        assert_eq!(batch.summary.failed, 1);
        assert_eq!(batch.summary.passed, 1);
        assert_eq!(batch.summary.untagged, 1);
        assert_eq!(batch.summary.cache_hits, 1);
        assert!(batch.has_failures());
    }

    #[test]
    fn engine_rule_violation_uses_name_and_code() {
        let v = EngineRule::SingletonViolation.violation(
            Severity::Error,
            Location::file_level("a.ts"),
            "duplicate",
        );
        assert_eq!(v.rule, "singleton_violation");
        assert_eq!(v.code, "AF904");
    }
}
