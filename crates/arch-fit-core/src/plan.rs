//! Pre-write validation of proposed changes.
//!
//! A [`Plan`] lists files to create, modify, delete or rename together with
//! the imports and code snippets they will contain. Nothing is read from the
//! planned content itself: declared imports and snippets are checked against
//! the target architecture's `forbid_import` and `forbid_pattern`
//! constraints and against layer rules, and existing importers of touched
//! files are reported as impacted.

use crate::annotations::extract_arch_tag;
use crate::constraints::{self, matching::slash_path, ConstraintContext};
use crate::engine::ValidationEngine;
use crate::graph::{normalize, ContentCache, ImportResolver};
use crate::registry::{FlattenedArchitecture, Rule};
use crate::semantic::{ImportInfo, SemanticModel};
use crate::types::{EngineRule, Location, Severity, Suggestion, Violation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Kind of planned change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// A new file.
    Create,
    /// Edit of an existing file.
    Modify,
    /// Removal of an existing file.
    Delete,
    /// Move of an existing file to `new_path`.
    Rename,
}

/// One proposed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedChange {
    /// Target file, relative to the project root.
    pub path: PathBuf,
    /// What happens to the file.
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Architecture of a created file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch_id: Option<String>,
    /// Destination of a rename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_path: Option<PathBuf>,
    /// Import specifiers the change adds.
    #[serde(default)]
    pub new_imports: Vec<String>,
    /// Code snippets the change adds.
    #[serde(default)]
    pub code_patterns: Vec<String>,
}

impl PlannedChange {
    /// Creates a change with no declared imports or snippets.
    #[must_use]
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind,
            arch_id: None,
            new_path: None,
            new_imports: Vec::new(),
            code_patterns: Vec::new(),
        }
    }

    /// Sets the architecture.
    #[must_use]
    pub fn with_arch(mut self, arch_id: impl Into<String>) -> Self {
        self.arch_id = Some(arch_id.into());
        self
    }

    /// Sets the rename destination.
    #[must_use]
    pub fn with_new_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.new_path = Some(path.into());
        self
    }

    /// Adds a declared import.
    #[must_use]
    pub fn with_import(mut self, module: impl Into<String>) -> Self {
        self.new_imports.push(module.into());
        self
    }

    /// Adds a declared code snippet.
    #[must_use]
    pub fn with_pattern(mut self, snippet: impl Into<String>) -> Self {
        self.code_patterns.push(snippet.into());
        self
    }
}

/// A set of proposed changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Changes in the order they are proposed.
    pub changes: Vec<PlannedChange>,
}

/// Counts for a validated plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStats {
    /// Changes in the plan.
    pub total_changes: usize,
    /// `create` changes.
    pub creates: usize,
    /// `modify` changes.
    pub modifies: usize,
    /// `delete` changes.
    pub deletes: usize,
    /// `rename` changes.
    pub renames: usize,
    /// Files that import a modified, deleted or renamed file.
    pub impacted_files: usize,
}

/// Outcome of [`validate_plan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResult {
    /// True when no error-level findings were produced.
    pub valid: bool,
    /// Error-level findings.
    pub violations: Vec<Violation>,
    /// Warning-level findings.
    pub warnings: Vec<Violation>,
    /// Existing files affected by the plan, relative to the root.
    pub impacted_files: Vec<PathBuf>,
    /// Counts.
    pub stats: PlanStats,
}

impl PlanResult {
    fn push(&mut self, violation: Violation) {
        match violation.severity {
            Severity::Error => self.violations.push(violation),
            Severity::Warning => self.warnings.push(violation),
        }
    }
}

/// Validates `plan` against the engine's registry and layers.
///
/// `content` holds the current content of scanned files; it is used to
/// recover the architecture of modified files and to find importers. Files
/// missing from it are read from disk.
///
/// Any path resolving outside the project root aborts validation with
/// `path_traversal` violations only.
#[must_use]
pub fn validate_plan(engine: &ValidationEngine, plan: &Plan, content: &ContentCache) -> PlanResult {
    let mut result = PlanResult {
        stats: count(plan),
        ..PlanResult::default()
    };

    for change in &plan.changes {
        for path in std::iter::once(&change.path).chain(&change.new_path) {
            if !inside_root(engine.root(), path) {
                result.violations.push(
                    EngineRule::PathTraversal
                        .violation(
                            Severity::Error,
                            Location::file_level(path),
                            format!(
                                "Path '{}' resolves outside the project root",
                                slash_path(path)
                            ),
                        )
                        .with_value(slash_path(path)),
                );
            }
        }
    }
    if !result.violations.is_empty() {
        info!(violations = result.violations.len(), "Plan rejected: path traversal");
        return result;
    }

    let mut impacted: BTreeSet<PathBuf> = BTreeSet::new();
    let touched: BTreeSet<PathBuf> = plan
        .changes
        .iter()
        .map(|c| engine.relative_path(&c.path))
        .collect();

    for change in &plan.changes {
        let relative = engine.relative_path(&change.path);
        match change.kind {
            ChangeKind::Create => match change.arch_id.as_deref() {
                None => result.push(
                    EngineRule::MissingArchId
                        .violation(
                            Severity::Error,
                            Location::file_level(&relative),
                            "Planned file has no archId",
                        )
                        .with_fix_hint("Choose an architecture for the new file"),
                ),
                Some(arch_id) => check_declared(engine, change, &relative, arch_id, &mut result),
            },
            ChangeKind::Modify => {
                let arch_id =
                    current_arch(engine, content, &relative).or_else(|| change.arch_id.clone());
                match arch_id {
                    Some(arch_id) => {
                        check_declared(engine, change, &relative, &arch_id, &mut result);
                    }
                    None => debug!(path = %relative.display(), "Modified file is untagged"),
                }
                impacted.extend(importers_of(engine, content, &relative));
            }
            ChangeKind::Delete => impacted.extend(importers_of(engine, content, &relative)),
            ChangeKind::Rename => {
                if let Some(new_path) = &change.new_path {
                    let destination = engine.relative_path(new_path);
                    let layers = engine.layers();
                    let from = layers.layer_of(&relative);
                    let to = layers.layer_of(&destination);
                    if from != to {
                        result.push(
                            EngineRule::LayerViolation
                                .violation(
                                    Severity::Warning,
                                    Location::file_level(&relative),
                                    format!(
                                        "Rename moves the file from layer '{}' to layer '{}'",
                                        from.unwrap_or("none"),
                                        to.unwrap_or("none")
                                    ),
                                )
                                .with_value(slash_path(&destination)),
                        );
                    }
                }
                impacted.extend(importers_of(engine, content, &relative));
            }
        }
    }

    result.impacted_files = impacted.into_iter().filter(|p| !touched.contains(p)).collect();
    result.stats.impacted_files = result.impacted_files.len();
    result.valid = result.violations.is_empty();
    info!(
        changes = result.stats.total_changes,
        violations = result.violations.len(),
        warnings = result.warnings.len(),
        impacted = result.stats.impacted_files,
        "Validated plan"
    );
    result
}

fn count(plan: &Plan) -> PlanStats {
    let mut stats = PlanStats {
        total_changes: plan.changes.len(),
        ..PlanStats::default()
    };
    for change in &plan.changes {
        match change.kind {
            ChangeKind::Create => stats.creates += 1,
            ChangeKind::Modify => stats.modifies += 1,
            ChangeKind::Delete => stats.deletes += 1,
            ChangeKind::Rename => stats.renames += 1,
        }
    }
    stats
}

fn inside_root(root: &Path, path: &Path) -> bool {
    let resolved = if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&root.join(path))
    };
    resolved.starts_with(root)
}

/// Architecture tag of the existing file, from `content` or disk.
fn current_arch(
    engine: &ValidationEngine,
    content: &ContentCache,
    relative: &Path,
) -> Option<String> {
    let absolute = engine.absolute_path(relative);
    let text = content
        .get(&absolute)
        .or_else(|| std::fs::read_to_string(&absolute).ok().map(Arc::from))?;
    extract_arch_tag(&text)
}

/// Checks declared imports and snippets of a created or modified file.
fn check_declared(
    engine: &ValidationEngine,
    change: &PlannedChange,
    relative: &Path,
    arch_id: &str,
    result: &mut PlanResult,
) {
    let resolution = engine.resolver().resolve(arch_id);
    let Some(arch) = resolution.architecture.as_ref() else {
        let mut violation = EngineRule::InvalidArchId
            .violation(
                Severity::Error,
                Location::file_level(relative),
                format!("Unknown architecture '{arch_id}'"),
            )
            .with_value(arch_id);
        if let Some(candidate) = engine.registry().closest_id(arch_id) {
            violation = violation.with_did_you_mean(candidate);
        }
        result.push(violation);
        return;
    };

    let model = declared_model(change, relative);
    for violation in declared_violations(engine, arch, &model, relative) {
        result.push(violation);
    }

    let layers = engine.layers();
    if let Some(from) = layers.layer_of(relative) {
        for module in &change.new_imports {
            let Some(to) = layers.layer_of_import(relative, module) else {
                continue;
            };
            if !layers.can_import(from, to) {
                result.push(
                    EngineRule::LayerViolation
                        .violation(
                            Severity::Error,
                            Location::file_level(relative),
                            format!("Layer '{from}' cannot import from layer '{to}'"),
                        )
                        .with_value(module.clone()),
                );
            }
        }
    }
}

/// A model holding only what the plan declares: imports, and snippets as content.
fn declared_model(change: &PlannedChange, relative: &Path) -> SemanticModel {
    let mut model = SemanticModel::new(relative, "plan", &change.code_patterns.join("\n"));
    model.imports = change
        .new_imports
        .iter()
        .map(|module| ImportInfo {
            module: module.clone(),
            ..ImportInfo::default()
        })
        .collect();
    model
}

fn declared_violations(
    engine: &ValidationEngine,
    arch: &FlattenedArchitecture,
    model: &SemanticModel,
    relative: &Path,
) -> Vec<Violation> {
    let ctx = ConstraintContext::new(model, &arch.arch_id, relative)
        .with_patterns(&engine.registry().patterns);
    arch.constraints
        .iter()
        .filter(|c| matches!(c.rule, Rule::ForbidImport | Rule::ForbidPattern))
        .filter_map(|c| constraints::evaluate(c, &ctx))
        .flat_map(|outcome| outcome.violations)
        .map(|mut violation| {
            violation.location = Location::file_level(relative);
            violation.message = format!("Planned change: {}", violation.message);
            if violation.suggestion.is_none() && violation.rule == Rule::ForbidImport.as_str() {
                if let Some(hint) = &violation.fix_hint {
                    violation.suggestion = Some(Suggestion::new(hint.clone()));
                }
            }
            violation
        })
        .collect()
}

/// Existing files importing `relative`.
///
/// Files are first filtered by a substring match on the target's module
/// name; only those are parsed and their imports resolved.
fn importers_of(
    engine: &ValidationEngine,
    content: &ContentCache,
    relative: &Path,
) -> Vec<PathBuf> {
    let target = engine.absolute_path(relative);
    let Some(name) = module_name(&target) else {
        return Vec::new();
    };
    let entries = content.entries();
    let resolver = ImportResolver::new(
        entries
            .iter()
            .map(|(p, _)| p.clone())
            .chain(std::iter::once(target.clone())),
    );
    let importers: Vec<PathBuf> = entries
        .iter()
        .filter(|(path, text)| *path != target && text.contains(name.as_str()))
        .filter(|(path, text)| {
            engine
                .providers()
                .parse(path, text)
                .imports
                .iter()
                .any(|i| resolver.resolve(path, &i.module).as_deref() == Some(target.as_path()))
        })
        .map(|(path, _)| engine.relative_path(path))
        .collect();
    debug!(
        target = %relative.display(),
        importers = importers.len(),
        "Importer lookup"
    );
    importers
}

/// Name a file is imported by: its stem, or its directory for index files.
fn module_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    if matches!(stem, "index" | "mod" | "__init__") {
        path.parent()?.file_name()?.to_str().map(str::to_string)
    } else {
        Some(stem.to_string())
    }
}
