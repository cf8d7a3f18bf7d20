//! Constraint validator framework.
//!
//! Every [`Rule`] has exactly one validator function. Validators are plain
//! `fn` items looked up through [`validator_for`], so adding a rule means
//! adding an enum variant and a match arm; the compiler flags the rest.
//!
//! [`evaluate`] is the entry point the engine uses: it applies the
//! constraint's `condition` and file-level `unless` exemptions before
//! dispatching.

mod code;
pub mod condition;
mod imports;
mod layout;
pub mod matching;
mod patterns;

pub use patterns::compile_pattern;

use crate::registry::{Constraint, PatternRegistry, Rule};
use crate::semantic::SemanticModel;
use crate::types::{Location, Violation};
use std::path::{Path, PathBuf};

/// A file that imports the file under validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImporterInfo {
    /// Importing file, relative to the project root.
    pub file: PathBuf,
    /// Architecture of the importing file, `None` when untagged.
    pub arch_id: Option<String>,
    /// Line of the import statement.
    pub line: usize,
}

/// Project-scope facts computed outside the file itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectConstraintContext {
    /// Direct importers of the file.
    pub importers: Vec<ImporterInfo>,
    /// Import cycle groups the file belongs to, as relative paths.
    pub cycles: Vec<Vec<PathBuf>>,
}

/// Everything a validator may look at.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintContext<'a> {
    /// Parsed file.
    pub model: &'a SemanticModel,
    /// Architecture the file is tagged with.
    pub arch_id: &'a str,
    /// Path relative to the project root.
    pub relative_path: &'a Path,
    /// Project root, required by rules that read the file system.
    pub project_root: Option<&'a Path>,
    /// Active file-level intents.
    pub intents: &'a [String],
    /// Importers and cycles, when a graph was built.
    pub project: Option<&'a ProjectConstraintContext>,
    /// Canonical implementations for suggestions.
    pub patterns: Option<&'a PatternRegistry>,
}

impl<'a> ConstraintContext<'a> {
    /// Creates a context whose intents are the model's file-level intents.
    #[must_use]
    pub fn new(model: &'a SemanticModel, arch_id: &'a str, relative_path: &'a Path) -> Self {
        Self {
            model,
            arch_id,
            relative_path,
            project_root: None,
            intents: &model.intents,
            project: None,
            patterns: None,
        }
    }

    /// Sets the project root.
    #[must_use]
    pub fn with_project_root(mut self, root: &'a Path) -> Self {
        self.project_root = Some(root);
        self
    }

    /// Replaces the active intents.
    #[must_use]
    pub fn with_intents(mut self, intents: &'a [String]) -> Self {
        self.intents = intents;
        self
    }

    /// Sets the project-scope facts.
    #[must_use]
    pub fn with_project(mut self, project: &'a ProjectConstraintContext) -> Self {
        self.project = Some(project);
        self
    }

    /// Sets the pattern registry.
    #[must_use]
    pub fn with_patterns(mut self, patterns: &'a PatternRegistry) -> Self {
        self.patterns = Some(patterns);
        self
    }

    /// Returns true if `name` is an active file-level intent.
    #[must_use]
    pub fn has_intent(&self, name: &str) -> bool {
        self.intents.iter().any(|i| i == name)
    }

    /// Location in the file under validation.
    #[must_use]
    pub fn location(&self, line: usize, column: usize) -> Location {
        Location::new(self.relative_path, line, column)
    }
}

/// Outcome of one validator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintResult {
    /// True when no violations were found.
    pub passed: bool,
    /// Findings.
    pub violations: Vec<Violation>,
}

impl ConstraintResult {
    /// A passing result.
    #[must_use]
    pub fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    /// A result that passes iff `violations` is empty.
    #[must_use]
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }
}

/// Signature shared by every rule validator.
pub type ValidatorFn = fn(&Constraint, &ConstraintContext<'_>) -> ConstraintResult;

/// Returns the validator for `rule`.
#[must_use]
pub fn validator_for(rule: Rule) -> ValidatorFn {
    match rule {
        Rule::ForbidImport => imports::forbid_import,
        Rule::RequireImport => imports::require_import,
        Rule::ImportableBy => imports::importable_by,
        Rule::ForbidCircularDeps => imports::forbid_circular_deps,
        Rule::ForbidPattern => patterns::forbid_pattern,
        Rule::RequirePattern => patterns::require_pattern,
        Rule::NamingPattern => patterns::naming_pattern,
        Rule::LocationPattern => patterns::location_pattern,
        Rule::ForbidCall => code::forbid_call,
        Rule::RequireCall => code::require_call,
        Rule::RequireTryCatch => code::require_try_catch,
        Rule::ForbidMutation => code::forbid_mutation,
        Rule::ForbidDecorator => code::forbid_decorator,
        Rule::RequireDecorator => code::require_decorator,
        Rule::MaxPublicMethods => code::max_public_methods,
        Rule::RequireExport => code::require_export,
        Rule::MaxFileLines => layout::max_file_lines,
        Rule::RequireTestFile => layout::require_test_file,
        Rule::RequireCompanionFile => layout::require_companion_file,
        Rule::AllowImport | Rule::AllowPattern => cancellation,
    }
}

fn cancellation(_: &Constraint, _: &ConstraintContext<'_>) -> ConstraintResult {
    ConstraintResult::pass()
}

/// Evaluates a constraint against a file.
///
/// Returns `None` when the constraint does not apply: its condition is unmet
/// or a file-level `unless` exemption matches.
#[must_use]
pub fn evaluate(constraint: &Constraint, ctx: &ConstraintContext<'_>) -> Option<ConstraintResult> {
    if let Some(cond) = &constraint.condition {
        if !condition::holds(cond, ctx) {
            tracing::debug!(
                rule = %constraint.rule,
                file = %ctx.relative_path.display(),
                "Condition unmet, skipping constraint"
            );
            return None;
        }
    }
    if condition::file_exempt(constraint, ctx) {
        tracing::debug!(
            rule = %constraint.rule,
            file = %ctx.relative_path.display(),
            "Exempted by unless"
        );
        return None;
    }
    Some(validator_for(constraint.rule)(constraint, ctx))
}

/// Builds a violation carrying the constraint's code, severity, rationale,
/// provenance and alternatives.
pub(crate) fn violation(
    constraint: &Constraint,
    ctx: &ConstraintContext<'_>,
    line: usize,
    column: usize,
    value: &str,
    message: String,
) -> Violation {
    let mut v = Violation::new(
        constraint.rule.code(),
        constraint.rule.as_str(),
        constraint.severity,
        ctx.location(line, column),
        message,
    )
    .with_value(value)
    .with_why(constraint.why.clone());
    if !constraint.source.is_empty() {
        v = v.with_source(&constraint.source);
    }
    let alternatives: Vec<&str> = constraint.all_alternatives().collect();
    if !alternatives.is_empty() {
        v = v.with_fix_hint(format!("Use {}", alternatives.join(" or ")));
    }
    v
}
