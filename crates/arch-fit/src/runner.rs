//! Whole-project entry points.

use crate::default_providers;
use anyhow::{Context, Result};
use arch_fit_core::cache::combined_checksum;
use arch_fit_core::constraints::matching::slash_path;
use arch_fit_core::{
    discover_files, registry, validate_plan, BatchResult, Config, ContentCache, Plan,
    PlanResult, RunMode, ValidationCache, ValidationEngine,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Engine plus the inputs it was built from.
struct Project {
    engine: ValidationEngine,
    config: Config,
    registry_text: String,
}

fn load_project(root: &Path) -> Result<Project> {
    let config = Config::load_or_default(root).context("Failed to load configuration")?;
    let registry_path = root.join(&config.registry.path);
    let registry_text = std::fs::read_to_string(&registry_path)
        .with_context(|| format!("Failed to read registry {}", registry_path.display()))?;
    let registry = registry::parse(&registry_text)
        .with_context(|| format!("Invalid registry {}", registry_path.display()))?;

    let engine = ValidationEngine::builder()
        .root(root)
        .config(config.clone())
        .registry(registry)
        .providers(default_providers())
        .build()
        .context("Failed to build validation engine")?;

    Ok(Project {
        engine,
        config,
        registry_text,
    })
}

fn project_files(project: &Project) -> Result<Vec<PathBuf>> {
    let extensions = project.engine.providers().extensions();
    discover_files(
        project.engine.root(),
        &project.config.files.scan,
        &extensions,
    )
    .context("Failed to discover files")
}

/// Validates every scanned file under `root`.
///
/// With `[cache] enabled`, results are read from and written back to the
/// cache file; entries for files no longer scanned are dropped. The cache is
/// keyed on a checksum of the registry text and the configuration, so editing
/// either discards it.
///
/// # Errors
///
/// Returns an error if the configuration, registry or cache cannot be read or
/// written, or if file discovery fails. Per-file problems are reported as
/// violations in the returned batch.
pub fn run(root: impl AsRef<Path>, mode: RunMode) -> Result<BatchResult> {
    let project = load_project(root.as_ref())?;
    let files = project_files(&project)?;
    info!(
        root = %project.engine.root().display(),
        files = files.len(),
        cache = project.config.cache.enabled,
        "Starting run"
    );

    if !project.config.cache.enabled {
        return project
            .engine
            .validate_files(&files)
            .context("Validation failed");
    }

    let fingerprint = combined_checksum([
        project.registry_text.as_str(),
        project.config.fingerprint().as_str(),
    ]);
    let cache_path = project.engine.absolute_path(&project.config.cache.path);
    let mut cache = match ValidationCache::load(&cache_path, fingerprint.as_str()) {
        Ok(cache) => cache,
        Err(e) => {
            warn!(path = %cache_path.display(), error = %e, "Ignoring unreadable cache");
            ValidationCache::new(&cache_path, fingerprint.as_str())
        }
    };

    let batch = project
        .engine
        .validate_cached(&files, &mut cache, mode)
        .context("Validation failed")?;

    let scanned: HashSet<String> = files
        .iter()
        .map(|f| slash_path(&project.engine.relative_path(f)))
        .collect();
    cache.retain(|key| scanned.contains(key));
    cache
        .save()
        .with_context(|| format!("Failed to write cache {}", cache_path.display()))?;
    Ok(batch)
}

/// Validates a proposed change set against the project under `root`.
///
/// Current content of every scanned file is loaded so importers of modified,
/// deleted or renamed files can be reported.
///
/// # Errors
///
/// Returns an error if the configuration or registry cannot be loaded, or if
/// file discovery fails.
pub fn plan(root: impl AsRef<Path>, plan: &Plan) -> Result<PlanResult> {
    let project = load_project(root.as_ref())?;
    let files = project_files(&project)?;
    let content = ContentCache::new();
    for file in &files {
        match std::fs::read_to_string(file) {
            Ok(text) => content.insert(file.clone(), text),
            Err(e) => warn!(path = %file.display(), error = %e, "Skipping unreadable file"),
        }
    }
    Ok(validate_plan(&project.engine, plan, &content))
}
