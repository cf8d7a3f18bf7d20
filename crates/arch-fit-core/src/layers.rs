//! Layer resolution: maps files and import specifiers to configured layers.

use crate::config::LayerConfig;
use crate::constraints::matching::glob_matches;
use crate::graph::normalize;
use std::collections::HashMap;
use std::path::Path;

/// Resolves relative paths to layer names and checks layer dependencies.
///
/// When several globs match, the one with the longest literal prefix wins,
/// so `src/infra/db/**` takes priority over `src/infra/**`.
#[derive(Debug, Clone, Default)]
pub struct LayerMap {
    /// (glob, layer name), most specific first.
    patterns: Vec<(String, String)>,
    allowed: HashMap<String, Vec<String>>,
}

fn literal_prefix_len(pattern: &str) -> usize {
    pattern.find(['*', '?', '[']).unwrap_or(pattern.len())
}

impl LayerMap {
    /// Builds a map from configuration.
    #[must_use]
    pub fn new(layers: &[LayerConfig]) -> Self {
        let mut patterns: Vec<(String, String)> = layers
            .iter()
            .flat_map(|l| l.paths.iter().map(|p| (p.clone(), l.name.clone())))
            .collect();
        patterns.sort_by_key(|(p, _)| std::cmp::Reverse(literal_prefix_len(p)));
        let allowed = layers
            .iter()
            .map(|l| (l.name.clone(), l.can_import.clone()))
            .collect();
        Self { patterns, allowed }
    }

    /// Returns true if no layers are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Layer of a file, by relative path.
    #[must_use]
    pub fn layer_of(&self, relative: &Path) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(pattern, _)| glob_matches(pattern, relative))
            .map(|(_, layer)| layer.as_str())
    }

    /// Layer of an import specifier written in `from` (relative path).
    ///
    /// Relative specifiers are joined to the importing file's directory;
    /// `.` and `..` stand for the index file of that directory or its parent.
    /// Other specifiers are matched as project paths (`src/infra/db`).
    #[must_use]
    pub fn layer_of_import(&self, from: &Path, specifier: &str) -> Option<&str> {
        let dir = from.parent().unwrap_or_else(|| Path::new(""));
        if matches!(specifier, "." | "..") {
            return self.layer_of(&normalize(&dir.join(specifier)).join("index"));
        }
        if specifier.starts_with("./") || specifier.starts_with("../") {
            return self.layer_of(&normalize(&dir.join(specifier)));
        }
        self.layer_of(Path::new(specifier))
    }

    /// Layers `layer` may import besides itself.
    #[must_use]
    pub fn allowed_imports(&self, layer: &str) -> &[String] {
        self.allowed.get(layer).map_or(&[], Vec::as_slice)
    }

    /// Returns true if `from` may import `to`. A layer may always import itself.
    #[must_use]
    pub fn can_import(&self, from: &str, to: &str) -> bool {
        from == to
            || self
                .allowed
                .get(from)
                .is_some_and(|allowed| allowed.iter().any(|a| a == to))
    }

    /// Returns `(from_layer, to_layer)` when an import from `from` to `to`
    /// (both relative paths) crosses a forbidden boundary.
    #[must_use]
    pub fn violation<'a>(&'a self, from: &Path, to: &Path) -> Option<(&'a str, &'a str)> {
        let from_layer = self.layer_of(from)?;
        let to_layer = self.layer_of(to)?;
        (!self.can_import(from_layer, to_layer)).then_some((from_layer, to_layer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str, paths: &[&str], can_import: &[&str]) -> LayerConfig {
        LayerConfig {
            name: name.into(),
            paths: paths.iter().map(|s| (*s).to_string()).collect(),
            can_import: can_import.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn layers() -> LayerMap {
        LayerMap::new(&[
            layer("domain", &["src/domain/**"], &[]),
            layer("app", &["src/app/**"], &["domain"]),
            layer("infra", &["src/infra/**"], &["domain", "app"]),
            layer("db", &["src/infra/db/**"], &["domain"]),
        ])
    }

    #[test]
    fn resolves_most_specific_layer() {
        let map = layers();
        assert_eq!(map.layer_of(Path::new("src/domain/user.ts")), Some("domain"));
        assert_eq!(map.layer_of(Path::new("src/infra/http.ts")), Some("infra"));
        assert_eq!(map.layer_of(Path::new("src/infra/db/repo.ts")), Some("db"));
        assert_eq!(map.layer_of(Path::new("scripts/x.ts")), None);
    }

    #[test]
    fn dependency_rules() {
        let map = layers();
        assert!(map.can_import("app", "domain"));
        assert!(map.can_import("domain", "domain"));
        assert!(!map.can_import("domain", "app"));
        assert_eq!(
            map.violation(Path::new("src/domain/user.ts"), Path::new("src/infra/http.ts")),
            Some(("domain", "infra"))
        );
        assert_eq!(
            map.violation(Path::new("src/app/main.ts"), Path::new("src/domain/user.ts")),
            None
        );
    }

    #[test]
    fn import_specifiers_map_to_layers() {
        let map = layers();
        let from = Path::new("src/domain/user.ts");
        assert_eq!(map.layer_of_import(from, "../infra/http"), Some("infra"));
        assert_eq!(map.layer_of_import(from, "src/app/service"), Some("app"));
        assert_eq!(map.layer_of_import(from, "axios"), None);
        assert_eq!(map.layer_of_import(from, "."), Some("domain"));
        let nested = Path::new("src/infra/db/repo.ts");
        assert_eq!(map.layer_of_import(nested, ".."), Some("infra"));
    }
}
