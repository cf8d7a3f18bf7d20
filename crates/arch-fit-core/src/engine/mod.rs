//! Validation engine.
//!
//! For each file the engine extracts the `@arch` tag, resolves the
//! architecture, parses the file into a [`SemanticModel`], evaluates every
//! flattened constraint, reconciles `@override` blocks and computes a status.
//! Batches finish with a sequential pass for rules that span files
//! (singleton architectures).
//!
//! A failure or panic while validating one file becomes that file's
//! `internal_error` result; siblings are unaffected.

mod incremental;
mod overrides;
mod untagged;

pub use incremental::RunMode;

use crate::annotations::parse_file_annotations;
use crate::config::Config;
use crate::constraints::matching::slash_path;
use crate::constraints::{self, ConstraintContext, ImporterInfo, ProjectConstraintContext};
use crate::graph::{build_import_graph, normalize, GraphBuild, GraphError, ImportGraph};
use crate::layers::LayerMap;
use crate::registry::{Constraint, Registry, Resolver};
use crate::semantic::{ProviderRegistry, SemanticModel};
use crate::types::{
    BatchResult, EngineRule, Location, Severity, Suggestion, ValidationResult, Violation,
};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// IO error resolving the project root.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Import graph construction failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Builder for configuring a [`ValidationEngine`].
#[derive(Default)]
pub struct EngineBuilder {
    root: Option<PathBuf>,
    config: Option<Config>,
    registry: Option<Arc<Registry>>,
    providers: Option<ProviderRegistry>,
    today: Option<NaiveDate>,
}

impl EngineBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the project root.
    #[must_use]
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the architecture registry.
    #[must_use]
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    /// Sets a registry shared with other components.
    #[must_use]
    pub fn shared_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the semantic model providers (default: the built-in script provider).
    #[must_use]
    pub fn providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Fixes the date override expiry is checked against.
    #[must_use]
    pub fn today(mut self, date: NaiveDate) -> Self {
        self.today = Some(date);
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if a relative root cannot be made absolute.
    pub fn build(self) -> Result<ValidationEngine, EngineError> {
        let root = self.root.unwrap_or_else(|| PathBuf::from("."));
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()?.join(&root)
        };
        let config = self.config.unwrap_or_default();
        let registry = self.registry.unwrap_or_default();

        Ok(ValidationEngine {
            root: normalize(&root),
            layers: LayerMap::new(&config.layers),
            config,
            resolver: Resolver::new(registry),
            providers: self
                .providers
                .unwrap_or_else(ProviderRegistry::with_builtin),
            today: self
                .today
                .unwrap_or_else(|| chrono::Local::now().date_naive()),
        })
    }
}

/// Validates files against a registry.
///
/// Use [`ValidationEngine::builder()`] to construct an instance.
#[derive(Debug)]
pub struct ValidationEngine {
    root: PathBuf,
    config: Config,
    resolver: Resolver,
    providers: ProviderRegistry,
    layers: LayerMap,
    today: NaiveDate,
}

impl ValidationEngine {
    /// Creates a new builder for configuring an engine.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Returns the project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        self.resolver.registry()
    }

    /// Returns the run-scoped resolver.
    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Returns the semantic model providers.
    #[must_use]
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Returns the configured layers.
    #[must_use]
    pub fn layers(&self) -> &LayerMap {
        &self.layers
    }

    /// Absolute, normalized form of `path` (relative paths are taken from the root).
    #[must_use]
    pub fn absolute_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.root.join(path))
        }
    }

    /// `path` relative to the project root; paths outside the root are kept as is.
    #[must_use]
    pub fn relative_path(&self, path: &Path) -> PathBuf {
        let absolute = self.absolute_path(path);
        match absolute.strip_prefix(&self.root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => absolute,
        }
    }

    fn concurrency(&self) -> usize {
        self.config.validation.concurrency.max(1)
    }

    /// Validates in-memory content as the file at `path`, without project context.
    #[must_use]
    pub fn validate_content(&self, path: &Path, content: &str) -> ValidationResult {
        self.validate_content_with(path, content, None)
    }

    /// Validates in-memory content with importer and cycle data.
    #[must_use]
    pub fn validate_content_with(
        &self,
        path: &Path,
        content: &str,
        project: Option<&ProjectConstraintContext>,
    ) -> ValidationResult {
        self.guarded(&self.relative_path(path), content, project)
    }

    /// Reads and validates one file. Read failures become `internal_error`.
    #[must_use]
    pub fn validate_file(&self, path: &Path) -> ValidationResult {
        let absolute = self.absolute_path(path);
        let relative = self.relative_path(&absolute);
        match std::fs::read_to_string(&absolute) {
            Ok(content) => self.guarded(&relative, &content, None),
            Err(e) => {
                warn!(path = %relative.display(), error = %e, "Failed to read file");
                let message = format!("Failed to read file: {e}");
                ValidationResult::internal_error(&relative, None, message)
            }
        }
    }

    /// Validates a batch: builds the import graph, validates every file with
    /// at most `validation.concurrency` workers, then applies batch rules.
    ///
    /// # Errors
    ///
    /// Returns an error only if the worker pool cannot be created.
    pub fn validate_files(&self, files: &[PathBuf]) -> Result<BatchResult, EngineError> {
        let files: Vec<PathBuf> = files.iter().map(|f| self.absolute_path(f)).collect();
        info!(root = %self.root.display(), files = files.len(), "Validating files");

        let build = build_import_graph(&files, &self.providers, self.concurrency())?;
        let mut results = self.validate_built(&files, &build)?;
        self.apply_batch_rules(&mut results);

        let batch = BatchResult::new(results, 0);
        log_summary(&batch);
        Ok(batch)
    }

    /// Validates `targets` (absolute paths) using the content and graph of `build`.
    fn validate_built(
        &self,
        targets: &[PathBuf],
        build: &GraphBuild,
    ) -> Result<Vec<ValidationResult>, EngineError> {
        let cycles = build.graph.find_cycles();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency())
            .build()?;

        Ok(pool.install(|| {
            targets
                .par_iter()
                .map(|absolute| {
                    let relative = self.relative_path(absolute);
                    let Some(content) = build.content.get(absolute) else {
                        return ValidationResult::internal_error(
                            &relative,
                            None,
                            "File could not be read",
                        );
                    };
                    let project = self.project_context(absolute, &build.graph, &cycles);
                    self.guarded(&relative, &content, Some(&project))
                })
                .collect()
        }))
    }

    /// Importers and cycles of `absolute`, with paths made relative.
    fn project_context(
        &self,
        absolute: &Path,
        graph: &ImportGraph,
        cycles: &[Vec<PathBuf>],
    ) -> ProjectConstraintContext {
        let importers = graph
            .importers(absolute)
            .into_iter()
            .map(|node| ImporterInfo {
                file: self.relative_path(&node.path),
                arch_id: node.arch_id.clone(),
                line: node.imports.get(absolute).copied().unwrap_or(0),
            })
            .collect();
        let cycles = cycles
            .iter()
            .filter(|cycle| cycle.iter().any(|p| p == absolute))
            .map(|cycle| cycle.iter().map(|p| self.relative_path(p)).collect())
            .collect();
        ProjectConstraintContext { importers, cycles }
    }

    /// Runs [`Self::check`], turning a panic into an `internal_error` result.
    fn guarded(
        &self,
        relative: &Path,
        content: &str,
        project: Option<&ProjectConstraintContext>,
    ) -> ValidationResult {
        match panic::catch_unwind(AssertUnwindSafe(|| self.check(relative, content, project))) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(path = %relative.display(), %message, "Validation panicked");
                ValidationResult::internal_error(
                    relative,
                    None,
                    format!("Validation panicked: {message}"),
                )
            }
        }
    }

    /// The per-file state machine.
    fn check(
        &self,
        relative: &Path,
        content: &str,
        project: Option<&ProjectConstraintContext>,
    ) -> ValidationResult {
        let annotations = parse_file_annotations(content);
        let Some(arch_id) = annotations.arch_id.as_deref() else {
            debug!(path = %relative.display(), "Untagged file");
            let result = untagged::untagged_result(relative, self.config.files.untagged.policy);
            return self.finish(result);
        };

        let resolution = self.resolver.resolve(arch_id);
        let Some(arch) = resolution.architecture.as_ref() else {
            return self.finish(self.invalid_arch_id(relative, arch_id, annotations.arch_line));
        };

        let mut result = ValidationResult::new(relative, Some(arch_id.to_string()));
        result.inheritance_chain.clone_from(&arch.inheritance_chain);
        result.mixins_applied.clone_from(&arch.applied_mixins);
        result.override_count = annotations.overrides.len();
        for conflict in &resolution.conflicts {
            result.push(
                EngineRule::ResolutionConflict
                    .violation(
                        Severity::Warning,
                        Location::new(relative, annotations.arch_line, 0),
                        conflict.message.clone(),
                    )
                    .with_value(conflict.kind.name())
                    .with_source(conflict.arch_id.clone()),
            );
        }

        let model = self.providers.parse(&self.root.join(relative), content);
        let mut ctx = ConstraintContext::new(&model, arch_id, relative)
            .with_project_root(&self.root)
            .with_patterns(&self.registry().patterns);
        if let Some(project) = project {
            ctx = ctx.with_project(project);
        }

        let mut findings = Vec::new();
        // (rule, value, severity) of each evaluated constraint's findings.
        let mut fired: Vec<Vec<(String, String, Severity)>> = Vec::new();
        for constraint in arch.constraints.iter().filter(|c| !c.rule.is_cancellation()) {
            let Some(outcome) = constraints::evaluate(constraint, &ctx) else {
                continue;
            };
            fired.push(
                outcome
                    .violations
                    .iter()
                    .map(|v| (v.rule.clone(), v.value.clone(), v.severity))
                    .collect(),
            );
            if !outcome.violations.is_empty() {
                findings.extend(self.missing_why(constraint, relative));
                findings.extend(outcome.violations);
            }
        }
        findings.extend(self.layer_violations(&model, relative));

        let outcome = overrides::apply_overrides(
            findings,
            &annotations.overrides,
            &self.config.overrides,
            self.today,
            relative,
        );
        for keys in &fired {
            let live: Vec<Severity> = keys
                .iter()
                .filter(|(rule, value, _)| !overrides::suppressed(&outcome.active, rule, value))
                .map(|(_, _, severity)| *severity)
                .collect();
            if live.is_empty() {
                result.passed += 1;
            } else if live.contains(&Severity::Error) {
                result.failed += 1;
            } else {
                result.warned += 1;
            }
        }
        for violation in outcome.remaining.into_iter().chain(outcome.policy) {
            result.push(violation);
        }
        result.overrides_active = outcome.active;
        self.finish(result)
    }

    fn invalid_arch_id(&self, relative: &Path, arch_id: &str, line: usize) -> ValidationResult {
        let mut violation = EngineRule::InvalidArchId
            .violation(
                Severity::Error,
                Location::new(relative, line, 0),
                format!("Unknown architecture '{arch_id}'"),
            )
            .with_value(arch_id);
        if let Some(candidate) = self.registry().closest_id(arch_id) {
            violation = violation
                .with_did_you_mean(candidate)
                .with_suggestion(Suggestion::with_replacement(
                    format!("Did you mean '{candidate}'?"),
                    format!("@arch {candidate}"),
                ));
        }
        debug!(path = %relative.display(), arch_id, "Unknown architecture");
        let mut result = ValidationResult::new(relative, Some(arch_id.to_string()));
        result.push(violation);
        result
    }

    fn missing_why(&self, constraint: &Constraint, relative: &Path) -> Option<Violation> {
        if !constraint.rule.is_forbid_class() || constraint.why.is_some() {
            return None;
        }
        let severity = self.config.validation.missing_why.severity()?;
        Some(
            EngineRule::MissingWhy
                .violation(
                    severity,
                    Location::file_level(relative),
                    format!(
                        "Constraint {} '{}' has no `why`",
                        constraint.rule, constraint.value
                    ),
                )
                .with_value(format!("{}:{}", constraint.rule, constraint.value.normalized()))
                .with_source(constraint.source.clone())
                .with_fix_hint("Add a `why` to the constraint in the registry"),
        )
    }

    fn layer_violations(&self, model: &SemanticModel, relative: &Path) -> Vec<Violation> {
        let Some(from) = self.layers.layer_of(relative) else {
            return Vec::new();
        };
        model
            .imports
            .iter()
            .filter_map(|import| {
                let to = self.layers.layer_of_import(relative, &import.module)?;
                if self.layers.can_import(from, to) {
                    return None;
                }
                let allowed = self.layers.allowed_imports(from);
                let hint = if allowed.is_empty() {
                    format!("Layer '{from}' may only import from itself")
                } else {
                    format!("Layer '{from}' may import from: {}", allowed.join(", "))
                };
                Some(
                    EngineRule::LayerViolation
                        .violation(
                            Severity::Error,
                            Location::new(relative, import.line, import.column),
                            format!("Layer '{from}' cannot import from layer '{to}'"),
                        )
                        .with_value(import.module.clone())
                        .with_fix_hint(hint),
                )
            })
            .collect()
    }

    /// Applies `strict` and computes the final status.
    fn finish(&self, mut result: ValidationResult) -> ValidationResult {
        if self.config.validation.strict {
            result.promote_warnings();
        }
        result.compute_status();
        debug!(path = %result.file.display(), status = %result.status, "Validated");
        result
    }

    /// Batch rules: every file of a singleton architecture used by more
    /// than one file gets a `singleton_violation`.
    pub fn apply_batch_rules(&self, results: &mut [ValidationResult]) {
        let registry = self.registry();
        let mut by_arch: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (index, result) in results.iter().enumerate() {
            let Some(arch_id) = result.arch_id.as_deref() else {
                continue;
            };
            if registry.node(arch_id).is_some_and(|n| n.singleton) {
                by_arch.entry(arch_id.to_string()).or_default().push(index);
            }
        }

        for (arch_id, indices) in by_arch.into_iter().filter(|(_, i)| i.len() > 1) {
            let files: Vec<String> = indices
                .iter()
                .map(|&i| slash_path(&results[i].file))
                .collect();
            warn!(
                arch_id = %arch_id,
                files = files.len(),
                "Singleton architecture used more than once"
            );
            for &index in &indices {
                let result = &mut results[index];
                let violation = EngineRule::SingletonViolation
                    .violation(
                        Severity::Error,
                        Location::file_level(&result.file),
                        format!(
                            "Singleton architecture '{arch_id}' is used by {} files: {}",
                            files.len(),
                            files.join(", ")
                        ),
                    )
                    .with_value(arch_id.clone());
                result.push(violation);
                result.compute_status();
            }
        }
    }
}

fn log_summary(batch: &BatchResult) {
    let s = &batch.summary;
    info!(
        files = s.total_files,
        passed = s.passed,
        warned = s.warned,
        failed = s.failed,
        untagged = s.untagged,
        cache_hits = s.cache_hits,
        "Validation complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LayerConfig, MissingWhyPolicy, UntaggedPolicy};
    use crate::registry::{ArchId, ArchitectureNode, ConstraintValue, Rule};
    use crate::types::ValidationStatus;

    fn node(id: &str, constraints: Vec<Constraint>) -> ArchitectureNode {
        let mut node = ArchitectureNode::new(ArchId::new(id).unwrap());
        node.constraints = constraints;
        node
    }

    fn forbid(module: &str) -> Constraint {
        Constraint::new(
            Rule::ForbidImport,
            ConstraintValue::Text(module.into()),
            Severity::Error,
        )
    }

    fn registry() -> Registry {
        let mut engine = node("core.engine", vec![forbid("axios").with_why("stay pure")]);
        engine.inherits = Some("base".into());
        let mut main = node("app.main", Vec::new());
        main.singleton = true;
        Registry::new()
            .with_node(node("base", Vec::new()))
            .with_node(engine)
            .with_node(main)
    }

    fn engine_with(config: Config) -> ValidationEngine {
        ValidationEngine::builder()
            .root("/project")
            .config(config)
            .registry(registry())
            .today(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
            .build()
            .unwrap()
    }

    fn engine() -> ValidationEngine {
        engine_with(Config::default())
    }

    #[test]
    fn forbidden_import_fails() {
        let content = "/** @arch core.engine */\nimport axios from 'axios';\n";
        let result = engine().validate_content(Path::new("src/core/http.ts"), content);
        assert_eq!(result.status, ValidationStatus::Fail);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].rule, "forbid_import");
        assert_eq!(result.violations[0].location.line, 2);
        assert_eq!(result.inheritance_chain, vec!["base", "core.engine"]);
        assert_eq!(result.failed, 1);
    }

    #[test]
    fn override_suppresses_violation() {
        let content = "/**\n * @arch core.engine\n * @override forbid_import:axios\n * @reason \"legacy\"\n * @expires 2026-03-31\n */\nimport axios from 'axios';\n";
        let result = engine().validate_content(Path::new("src/core/http.ts"), content);
        assert_eq!(result.status, ValidationStatus::Pass);
        assert_eq!(result.overrides_active.len(), 1);
        assert_eq!(result.override_count, 1);
        assert_eq!((result.passed, result.failed, result.warned), (1, 0, 0));
    }

    #[test]
    fn rejected_override_keeps_constraint_failed() {
        let content = "/**
 * @arch core.engine
 * @override forbid_import:axios
 * @expires 2026-03-31
 */
import axios from 'axios';
";
        let result = engine().validate_content(Path::new("src/core/http.ts"), content);
        assert_eq!(result.status, ValidationStatus::Fail);
        assert!(result.overrides_active.is_empty());
        assert_eq!((result.passed, result.failed, result.warned), (0, 1, 0));
    }

    #[test]
    fn resolution_conflicts_are_warnings() {
        let mut looped = node("loop.a", Vec::new());
        looped.inherits = Some("loop.b".into());
        let mut back = node("loop.b", Vec::new());
        back.inherits = Some("loop.a".into());
        let engine = ValidationEngine::builder()
            .root("/project")
            .registry(registry().with_node(looped).with_node(back))
            .build()
            .unwrap();
        let result = engine.validate_content(Path::new("src/a.ts"), "// @arch loop.a
");
        assert_eq!(result.status, ValidationStatus::Warn);
        assert_eq!(result.warnings[0].rule, "resolution_conflict");
        assert_eq!(result.warnings[0].value, "circular_inheritance");
        assert_eq!(result.warnings[0].location.line, 1);
    }

    #[test]
    fn unknown_arch_suggests_closest() {
        let content = "// @arch core.engin\n";
        let result = engine().validate_content(Path::new("src/a.ts"), content);
        assert_eq!(result.status, ValidationStatus::Fail);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].rule, "invalid_arch_id");
        assert_eq!(result.violations[0].did_you_mean.as_deref(), Some("core.engine"));
    }

    #[test]
    fn untagged_policies() {
        let mut config = Config::default();
        config.files.untagged.policy = UntaggedPolicy::Deny;
        let denied = engine_with(config).validate_content(Path::new("src/a.ts"), "let a = 1;\n");
        assert_eq!(denied.status, ValidationStatus::Fail);
        assert!(denied.has_rule("missing_arch_tag"));

        let mut config = Config::default();
        config.files.untagged.policy = UntaggedPolicy::Allow;
        let allowed = engine_with(config).validate_content(Path::new("src/a.ts"), "let a = 1;\n");
        assert_eq!(allowed.status, ValidationStatus::Pass);
        assert!(allowed.violations.is_empty() && allowed.warnings.is_empty());
    }

    #[test]
    fn strict_promotes_warnings() {
        let mut config = Config::default();
        config.validation.strict = true;
        let result = engine_with(config).validate_content(Path::new("src/a.ts"), "let a = 1;\n");
        assert_eq!(result.status, ValidationStatus::Fail);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn missing_why_policy() {
        let registry = Registry::new().with_node(node("core", vec![forbid("axios")]));
        let mut config = Config::default();
        config.validation.missing_why = MissingWhyPolicy::Warning;
        let engine = ValidationEngine::builder()
            .root("/project")
            .config(config)
            .registry(registry)
            .build()
            .unwrap();
        let result = engine.validate_content(
            Path::new("src/a.ts"),
            "// @arch core\nimport axios from 'axios';\n",
        );
        assert!(result.has_rule("forbid_import"));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].rule, "missing_why");
    }

    #[test]
    fn layer_boundaries() {
        let mut config = Config::default();
        config.layers = vec![
            LayerConfig {
                name: "domain".into(),
                paths: vec!["src/domain/**".into()],
                can_import: Vec::new(),
            },
            LayerConfig {
                name: "infra".into(),
                paths: vec!["src/infra/**".into()],
                can_import: vec!["domain".into()],
            },
        ];
        let engine = engine_with(config);
        let content = "// @arch core.engine\nimport { db } from '../infra/db';\n";
        let result = engine.validate_content(Path::new("src/domain/user.ts"), content);
        assert!(result.has_rule("layer_violation"));
        assert_eq!(result.status, ValidationStatus::Fail);

        let content = "// @arch core.engine\nimport { User } from '../domain/user';\n";
        let result = engine.validate_content(Path::new("src/infra/db.ts"), content);
        assert!(!result.has_rule("layer_violation"));
    }

    #[test]
    fn singleton_rule_marks_every_offender() {
        let engine = engine();
        let mut results = vec![
            engine.validate_content(Path::new("src/a.ts"), "// @arch app.main\n"),
            engine.validate_content(Path::new("src/b.ts"), "// @arch app.main\n"),
        ];
        engine.apply_batch_rules(&mut results);
        assert!(results.iter().all(|r| r.has_rule("singleton_violation")));
        assert!(results.iter().all(|r| r.status == ValidationStatus::Fail));

        let only = engine.validate_content(Path::new("src/a.ts"), "// @arch app.main\n");
        let mut single = vec![only];
        engine.apply_batch_rules(&mut single);
        assert!(!single[0].has_rule("singleton_violation"));
    }

    #[test]
    fn unreadable_file_is_internal_error() {
        let result = engine().validate_file(Path::new("does/not/exist.ts"));
        assert_eq!(result.status, ValidationStatus::Fail);
        assert!(result.has_rule("internal_error"));
        assert_eq!(result.file, PathBuf::from("does/not/exist.ts"));
    }

    #[test]
    fn paths_are_made_relative_to_root() {
        let engine = engine();
        assert_eq!(
            engine.relative_path(Path::new("/project/src/./a.ts")),
            PathBuf::from("src/a.ts")
        );
        assert_eq!(
            engine.absolute_path(Path::new("src/a.ts")),
            PathBuf::from("/project/src/a.ts")
        );
    }
}
