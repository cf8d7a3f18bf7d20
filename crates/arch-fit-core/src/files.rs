//! Source file discovery.

use crate::config::ScanConfig;
use crate::constraints::matching::slash_path;
use std::path::{Path, PathBuf};

/// Errors from file discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// An include or exclude pattern is not a valid glob.
    #[error("Invalid glob pattern `{pattern}`: {source}")]
    Glob {
        /// The pattern as configured.
        pattern: String,
        /// Underlying glob error.
        source: glob::PatternError,
    },
}

/// Compiled include/exclude globs, matched against `/`-separated relative paths.
#[derive(Debug, Clone, Default)]
pub struct FileSelector {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
}

impl FileSelector {
    /// Compiles the scan configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for the first invalid pattern.
    pub fn new(scan: &ScanConfig) -> Result<Self, DiscoveryError> {
        Ok(Self {
            include: compile(&scan.include)?,
            exclude: compile(&scan.exclude)?,
        })
    }

    /// Returns true if `relative` is selected. An empty include list selects everything.
    #[must_use]
    pub fn is_selected(&self, relative: &Path) -> bool {
        let path = slash_path(relative);
        let included = self.include.is_empty() || self.include.iter().any(|p| matches(p, &path));
        included && !self.exclude.iter().any(|p| matches(p, &path))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<glob::Pattern>, DiscoveryError> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| DiscoveryError::Glob {
                pattern: p.clone(),
                source: e,
            })
        })
        .collect()
}

fn matches(pattern: &glob::Pattern, path: &str) -> bool {
    pattern.matches(path)
        || pattern.as_str().strip_suffix("/**").is_some_and(|prefix| {
            path.strip_prefix(prefix.trim_start_matches("**/"))
                .is_some_and(|rest| rest.starts_with('/'))
        })
}

/// Walks `root` and returns every selected file with a supported extension,
/// as sorted absolute paths.
///
/// Unreadable directory entries are logged and skipped.
///
/// # Errors
///
/// Returns an error if a scan pattern is invalid.
pub fn discover_files(
    root: &Path,
    scan: &ScanConfig,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let selector = FileSelector::new(scan)?;

    let mut builder = ignore::WalkBuilder::new(root);
    builder
        .hidden(false)
        .git_ignore(scan.respect_gitignore)
        .git_exclude(scan.respect_gitignore)
        .require_git(false);

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.contains(&e));
        if !supported {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        if selector.is_selected(relative) {
            files.push(path.to_path_buf());
        } else {
            tracing::debug!(path = %relative.display(), "Excluded");
        }
    }

    files.sort();
    tracing::debug!(root = %root.display(), files = files.len(), "Discovered files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(include: &[&str], exclude: &[&str]) -> ScanConfig {
        ScanConfig {
            include: include.iter().map(|s| (*s).to_string()).collect(),
            exclude: exclude.iter().map(|s| (*s).to_string()).collect(),
            respect_gitignore: true,
        }
    }

    #[test]
    fn selector_include_and_exclude() {
        let selector = FileSelector::new(&scan(&["src/**"], &["**/generated/**"])).unwrap();
        assert!(selector.is_selected(Path::new("src/a.ts")));
        assert!(selector.is_selected(Path::new("src/deep/b.ts")));
        assert!(!selector.is_selected(Path::new("lib/a.ts")));
        assert!(!selector.is_selected(Path::new("src/generated/c.ts")));
    }

    #[test]
    fn default_excludes_drop_node_modules() {
        let selector = FileSelector::new(&ScanConfig::default()).unwrap();
        assert!(!selector.is_selected(Path::new("node_modules/axios/index.js")));
        assert!(!selector.is_selected(Path::new("web/node_modules/x/index.js")));
        assert!(selector.is_selected(Path::new("web/index.js")));
    }

    #[test]
    fn invalid_glob_is_error() {
        let err = FileSelector::new(&scan(&["src/[unclosed"], &[])).unwrap_err();
        assert!(err.to_string().contains("src/[unclosed"));
    }

    #[test]
    fn discovers_supported_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/core")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("src/core/b.ts"), "").unwrap();
        std::fs::write(root.join("src/a.ts"), "").unwrap();
        std::fs::write(root.join("src/readme.md"), "").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.ts"), "").unwrap();

        let files = discover_files(root, &ScanConfig::default(), &["ts"]).unwrap();
        let relative: Vec<String> = files
            .iter()
            .map(|f| slash_path(f.strip_prefix(root).unwrap()))
            .collect();
        assert_eq!(relative, vec!["src/a.ts", "src/core/b.ts"]);
    }
}
