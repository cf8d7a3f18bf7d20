//! Matching helpers shared by the validators.

use crate::semantic::SemanticModel;
use std::path::Path;

/// Checks if a separated path matches a pattern.
///
/// Supports wildcards:
/// - `*` matches any single segment
/// - `**` matches any number of segments
///
/// # Examples
///
/// ```ignore
/// assert!(segments_match("std::fs::read", "std::fs::*", "::"));
/// assert!(segments_match("window.location.href", "window.**", "."));
/// ```
#[must_use]
pub fn segments_match(path: &str, pattern: &str, separator: &str) -> bool {
    let path_parts: Vec<&str> = path.split(separator).collect();
    let pattern_parts: Vec<&str> = pattern.split(separator).collect();
    match_parts(&path_parts, &pattern_parts)
}

fn match_parts(path: &[&str], pattern: &[&str]) -> bool {
    let Some((&first, rest)) = pattern.split_first() else {
        return path.is_empty();
    };
    match first {
        "**" => (0..=path.len()).any(|i| match_parts(&path[i..], rest)),
        "*" => !path.is_empty() && match_parts(&path[1..], rest),
        literal => path.first() == Some(&literal) && match_parts(&path[1..], rest),
    }
}

/// Hierarchical dotted-target match used by mutation, call and architecture rules.
///
/// `pattern` matches `target` when it is the exact target, the root object
/// (`window` matches `window.location`), a dotted prefix (`window.location`
/// matches `window.location.href`), or a wildcard form (`x.*`, `x.**`).
#[must_use]
pub fn target_matches(target: &str, pattern: &str) -> bool {
    let target = normalize_separators(target);
    let pattern = normalize_separators(pattern);
    if pattern.contains('*') {
        return segments_match(&target, &pattern, ".");
    }
    target == pattern
        || target
            .strip_prefix(pattern.as_str())
            .is_some_and(|rest| rest.starts_with('.'))
}

/// How a language splits an import specifier into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStyle {
    /// npm-style specifiers; only `/` separates segments, so `lodash.debounce`
    /// is its own package.
    Package,
    /// Module paths split on `.` or `::` (Python, Kotlin, Rust).
    Dotted,
}

impl ImportStyle {
    /// Style of the language a model was parsed as, falling back to its extension.
    #[must_use]
    pub fn for_model(model: &SemanticModel) -> Self {
        match model.language.as_str() {
            "typescript" | "javascript" => Self::Package,
            "python" | "kotlin" | "rust" => Self::Dotted,
            _ => Self::for_path(&model.file_path),
        }
    }

    /// Style for a file extension.
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py" | "kt" | "kts" | "rs" | "java") => Self::Dotted,
            _ => Self::Package,
        }
    }

    fn separators(self) -> &'static [&'static str] {
        match self {
            Self::Package => &["/"],
            Self::Dotted => &[".", "::"],
        }
    }
}

/// Segment-aware import match.
///
/// `pattern` matches `module` when it is the exact specifier, the bare
/// package of a deep import (`lodash` matches `lodash/fp`), a scoped-package
/// prefix (`@acme` matches `@acme/ui`), a module prefix in dotted languages
/// (`std` matches `std::fs`, `com.acme` matches `com.acme.db.Repo`), the same
/// module behind a `node:` scheme, or a wildcard form (`@acme/*`, `std::**`).
#[must_use]
pub fn import_matches(module: &str, pattern: &str, style: ImportStyle) -> bool {
    let module = module.trim();
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return false;
    }
    if module == pattern || module.strip_prefix("node:") == Some(pattern) {
        return true;
    }
    if pattern.contains('*') {
        let separator = if pattern.contains("::") {
            "::"
        } else if pattern.contains('/') || style == ImportStyle::Package {
            "/"
        } else {
            "."
        };
        return segments_match(module, pattern, separator);
    }
    style.separators().iter().any(|sep| {
        module
            .strip_prefix(pattern)
            .is_some_and(|rest| rest.starts_with(sep))
    })
}

/// Decorator match: leading `@` ignored, qualified names match on the last segment.
#[must_use]
pub fn decorator_matches(name: &str, pattern: &str) -> bool {
    let name = name.trim_start_matches('@');
    let pattern = pattern.trim_start_matches('@');
    if name == pattern {
        return true;
    }
    let last = name.rsplit(['.', ':']).next().unwrap_or(name);
    last == pattern
}

/// Relative path rendered with `/` separators.
#[must_use]
pub fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Glob match on a relative path; `dir/**` also matches everything below `dir`.
#[must_use]
pub fn glob_matches(pattern: &str, path: &Path) -> bool {
    let path_str = slash_path(path);
    if glob::Pattern::new(pattern).is_ok_and(|p| p.matches(&path_str)) {
        return true;
    }
    pattern.strip_suffix("/**").is_some_and(|prefix| {
        let prefix = prefix.trim_end_matches('/');
        path_str
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
    })
}

fn normalize_separators(text: &str) -> String {
    text.trim().replace("::", ".").replace("?.", ".")
}
