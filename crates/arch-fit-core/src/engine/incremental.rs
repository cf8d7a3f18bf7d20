//! Cache-backed runs.
//!
//! An incremental run revalidates changed and new files plus their
//! dependents up to `validation.incremental_depth` import hops; every other
//! file is hydrated from the cache. The depth bound is a cost heuristic: a
//! change further away than the bound is not picked up until the dependent
//! itself changes.

use super::{log_summary, EngineError, ValidationEngine};
use crate::cache::{checksum, CacheEntry, ChangeDetector, ValidationCache};
use crate::graph::build_import_graph_with;
use crate::types::{BatchResult, ValidationResult};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::info;

/// How a cache-backed run treats unchanged files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Revalidate every file, then refresh the cache.
    #[default]
    Full,
    /// Revalidate changed files and their dependents; hydrate the rest.
    Incremental,
}

impl ValidationEngine {
    /// Validates `files` and writes fresh results back into `cache`.
    ///
    /// Persisting the cache is left to the caller ([`ValidationCache::save`]).
    ///
    /// # Errors
    ///
    /// Returns an error only if a worker pool cannot be created.
    pub fn validate_cached(
        &self,
        files: &[PathBuf],
        cache: &mut ValidationCache,
        mode: RunMode,
    ) -> Result<BatchResult, EngineError> {
        let files: Vec<PathBuf> = files.iter().map(|f| self.absolute_path(f)).collect();
        info!(root = %self.root.display(), files = files.len(), ?mode, "Validating files");

        let build = {
            let cached: &ValidationCache = cache;
            let reuse = |path: &Path, content: &str| {
                if mode == RunMode::Full {
                    return None;
                }
                let entry = cached.get(&self.relative_path(path))?;
                (entry.checksum == checksum(content)).then(|| entry.import_pairs())
            };
            build_import_graph_with(&files, &self.providers, self.concurrency(), reuse)?
        };

        let relative: Vec<(PathBuf, PathBuf)> = files
            .iter()
            .map(|f| (f.clone(), self.relative_path(f)))
            .collect();
        let contents: Vec<(&Path, std::sync::Arc<str>)> = relative
            .iter()
            .filter_map(|(abs, rel)| build.content.get(abs).map(|c| (rel.as_path(), c)))
            .collect();
        let changes = ChangeDetector::new(cache)
            .detect_changes(contents.iter().map(|(rel, c)| (*rel, &**c)));

        let targets: BTreeSet<PathBuf> = match mode {
            RunMode::Full => files.iter().cloned().collect(),
            RunMode::Incremental => {
                let dirty: Vec<PathBuf> =
                    changes.dirty().map(|rel| self.absolute_path(rel)).collect();
                let dependents = build.graph.dependents(
                    dirty.iter().map(PathBuf::as_path),
                    self.config.validation.incremental_depth,
                );
                dirty
                    .into_iter()
                    .chain(dependents)
                    .chain(build.unreadable.iter().cloned())
                    .collect()
            }
        };
        info!(
            changed = changes.changed.len(),
            new = changes.new.len(),
            unchanged = changes.unchanged.len(),
            revalidate = targets.len(),
            "Detected changes"
        );

        let fresh_paths: Vec<PathBuf> = files
            .iter()
            .filter(|f| targets.contains(*f))
            .cloned()
            .collect();
        let fresh_results = self.validate_built(&fresh_paths, &build)?;

        for (absolute, result) in fresh_paths.iter().zip(&fresh_results) {
            let relative = self.relative_path(absolute);
            match changes.checksum_of(&relative) {
                Some(sum) => {
                    let imports = build.specifiers.get(absolute).cloned().unwrap_or_default();
                    cache.set(
                        &relative,
                        CacheEntry::new(sum, result.clone()).with_imports(imports),
                    );
                }
                None => {
                    cache.remove(&relative);
                }
            }
        }

        let mut fresh: HashMap<PathBuf, ValidationResult> =
            fresh_paths.into_iter().zip(fresh_results).collect();
        let mut hits = 0;
        let mut results = Vec::with_capacity(files.len());
        for (absolute, relative) in &relative {
            if let Some(result) = fresh.remove(absolute) {
                results.push(result);
            } else if let Some(entry) = cache.get(relative) {
                hits += 1;
                results.push(entry.result.clone());
            } else {
                results.push(ValidationResult::internal_error(
                    relative,
                    None,
                    "No cached result for unchanged file",
                ));
            }
        }

        self.apply_batch_rules(&mut results);
        let batch = BatchResult::new(results, hits);
        log_summary(&batch);
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::registry::{ArchId, ArchitectureNode, Constraint, ConstraintValue, Registry, Rule};
    use crate::semantic::{ProviderRegistry, ScriptProvider, SemanticModel, SemanticModelProvider};
    use crate::types::{Severity, ValidationStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts parses, delegating to the script provider.
    struct Counting {
        inner: ScriptProvider,
        calls: Arc<AtomicUsize>,
    }

    impl SemanticModelProvider for Counting {
        fn language_id(&self) -> &'static str {
            "typescript"
        }

        fn extensions(&self) -> &'static [&'static str] {
            &["ts"]
        }

        fn parse(&self, path: &Path, content: &str) -> SemanticModel {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.parse(path, content)
        }
    }

    fn setup() -> (tempfile::TempDir, ValidationEngine, Arc<AtomicUsize>) {
        let dir = tempfile::tempdir().unwrap();
        let mut node = ArchitectureNode::new(ArchId::new("core").unwrap());
        node.constraints = vec![Constraint::new(
            Rule::ForbidImport,
            ConstraintValue::Text("axios".into()),
            Severity::Error,
        )];
        let calls = Arc::new(AtomicUsize::new(0));
        let providers = ProviderRegistry::new().with(Counting {
            inner: ScriptProvider::new(),
            calls: Arc::clone(&calls),
        });
        let engine = ValidationEngine::builder()
            .root(dir.path())
            .config(Config::default())
            .registry(Registry::new().with_node(node))
            .providers(providers)
            .build()
            .unwrap();
        (dir, engine, calls)
    }

    fn write(root: &Path, name: &str, content: &str) -> PathBuf {
        let path = root.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn unchanged_files_are_hydrated_without_parsing() {
        let (dir, engine, calls) = setup();
        let files = vec![write(dir.path(), "a.ts", "// @arch core\nimport axios from 'axios';\n")];
        let mut cache = ValidationCache::new(dir.path().join("cache.json"), "fp");

        let first = engine.validate_cached(&files, &mut cache, RunMode::Incremental).unwrap();
        assert_eq!(first.summary.cache_hits, 0);
        assert_eq!(first.results[0].status, ValidationStatus::Fail);

        let parses = calls.load(Ordering::SeqCst);
        let second = engine.validate_cached(&files, &mut cache, RunMode::Incremental).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), parses);
        assert_eq!(second.summary.cache_hits, 1);
        assert_eq!(
            serde_json::to_string(&first.results).unwrap(),
            serde_json::to_string(&second.results).unwrap()
        );
    }

    #[test]
    fn dependents_of_changed_files_are_revalidated() {
        let (dir, engine, _) = setup();
        let root = dir.path();
        let files = vec![
            write(root, "a.ts", "// @arch core\nimport { b } from './b';\n"),
            write(root, "b.ts", "// @arch core\nimport { c } from './c';\n"),
            write(root, "c.ts", "// @arch core\nexport const c = 1;\n"),
            write(root, "d.ts", "// @arch core\nexport const d = 1;\n"),
        ];
        let mut cache = ValidationCache::new(root.join("cache.json"), "fp");
        engine.validate_cached(&files, &mut cache, RunMode::Incremental).unwrap();

        write(root, "c.ts", "// @arch core\nexport const c = 2;\n");
        let batch = engine.validate_cached(&files, &mut cache, RunMode::Incremental).unwrap();
        // c changed; b and a depend on it within two hops; only d is hydrated.
        assert_eq!(batch.summary.cache_hits, 1);
        assert_eq!(batch.summary.total_files, 4);
    }

    #[test]
    fn full_mode_revalidates_everything() {
        let (dir, engine, calls) = setup();
        let files = vec![write(dir.path(), "a.ts", "// @arch core\n")];
        let mut cache = ValidationCache::new(dir.path().join("cache.json"), "fp");
        engine.validate_cached(&files, &mut cache, RunMode::Full).unwrap();
        let parses = calls.load(Ordering::SeqCst);

        let batch = engine.validate_cached(&files, &mut cache, RunMode::Full).unwrap();
        assert_eq!(batch.summary.cache_hits, 0);
        assert!(calls.load(Ordering::SeqCst) > parses);
        assert_eq!(cache.stats().entries, 1);
    }
}
