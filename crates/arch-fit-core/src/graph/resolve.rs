//! Import specifier resolution against a known file set.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

const EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "rs", "kt"];

const INDEX_FILES: &[&str] = &[
    "index.ts",
    "index.tsx",
    "index.js",
    "index.jsx",
    "index.mjs",
    "__init__.py",
    "mod.rs",
];

/// Lexically normalizes `.` and `..` components.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolves project-local import specifiers to files of a scanned set.
///
/// Handled forms: relative script specifiers (`./util`, `../lib/index.js`,
/// and `.`, `..` or `./dir/` for a directory's index file),
/// Python relative imports (`.models`, `..pkg.mod`) and Rust module paths
/// (`crate::a::b`, `super::x`, `self::y`). Package imports resolve to `None`.
#[derive(Debug, Clone, Default)]
pub struct ImportResolver {
    known: HashSet<PathBuf>,
}

impl ImportResolver {
    /// Creates a resolver over absolute, normalized file paths.
    #[must_use]
    pub fn new(known: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            known: known.into_iter().collect(),
        }
    }

    /// Resolves `specifier` as written in `from`.
    #[must_use]
    pub fn resolve(&self, from: &Path, specifier: &str) -> Option<PathBuf> {
        let dir = from.parent()?;
        let is_python = from.extension().is_some_and(|e| e == "py");

        if is_python && specifier.starts_with('.') {
            let dots = specifier.chars().take_while(|c| *c == '.').count();
            let mut base = dir.to_path_buf();
            for _ in 1..dots {
                base = base.parent()?.to_path_buf();
            }
            let rest = &specifier[dots..];
            if !rest.is_empty() {
                base.push(rest.replace('.', "/"));
            }
            return self.find_file(&base);
        }
        if matches!(specifier, "." | "..") || specifier.ends_with('/') {
            return self.find_index(&normalize(&dir.join(specifier)));
        }
        if specifier.starts_with("./") || specifier.starts_with("../") {
            return self.find_file(&normalize(&dir.join(specifier)));
        }
        if let Some(rest) = specifier.strip_prefix("crate::") {
            let src = from
                .ancestors()
                .find(|a| a.file_name().is_some_and(|n| n == "src"))
                .unwrap_or(dir);
            return self.resolve_rust(src, rest);
        }
        if specifier.starts_with("super::") || specifier.starts_with("self::") {
            let mut base = rust_module_dir(from)?;
            let mut rest = specifier;
            loop {
                if let Some(r) = rest.strip_prefix("super::") {
                    base = base.parent()?.to_path_buf();
                    rest = r;
                } else if let Some(r) = rest.strip_prefix("self::") {
                    rest = r;
                } else {
                    break;
                }
            }
            return self.resolve_rust(&base, rest);
        }
        None
    }

    fn find_file(&self, base: &Path) -> Option<PathBuf> {
        if self.known.contains(base) {
            return Some(base.to_path_buf());
        }
        for ext in EXTENSIONS {
            let mut candidate: OsString = base.as_os_str().to_owned();
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            if self.known.contains(&candidate) {
                return Some(candidate);
            }
        }
        if let Some(index) = self.find_index(base) {
            return Some(index);
        }
        let swaps: &[&str] = match base.extension().and_then(|e| e.to_str()) {
            Some("js") => &["ts", "tsx"],
            Some("jsx") => &["tsx"],
            Some("mjs") => &["mts"],
            _ => &[],
        };
        swaps
            .iter()
            .map(|ext| base.with_extension(ext))
            .find(|candidate| self.known.contains(candidate))
    }

    /// Index file of the directory `base`.
    fn find_index(&self, base: &Path) -> Option<PathBuf> {
        INDEX_FILES
            .iter()
            .map(|index| base.join(index))
            .find(|candidate| self.known.contains(candidate))
    }

    /// Longest module prefix of `path` that exists as `<seg>.rs` or `<seg>/mod.rs`.
    fn resolve_rust(&self, base: &Path, path: &str) -> Option<PathBuf> {
        let segments: Vec<&str> = path
            .split("::")
            .take_while(|s| !s.is_empty() && *s != "*" && !s.starts_with('{'))
            .collect();
        for len in (1..=segments.len()).rev() {
            let module: PathBuf = segments[..len].iter().collect();
            let module = base.join(module);
            for candidate in [module.with_extension("rs"), module.join("mod.rs")] {
                if self.known.contains(&candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

/// Directory holding the submodules of the module defined by `file`.
fn rust_module_dir(file: &Path) -> Option<PathBuf> {
    let parent = file.parent()?;
    let stem = file.file_stem()?.to_str()?;
    if matches!(stem, "mod" | "lib" | "main") {
        Some(parent.to_path_buf())
    } else {
        Some(parent.join(stem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(files: &[&str]) -> ImportResolver {
        ImportResolver::new(files.iter().map(PathBuf::from))
    }

    #[test]
    fn normalizes_parent_components() {
        assert_eq!(
            normalize(Path::new("/p/src/a/../b/./c.ts")),
            PathBuf::from("/p/src/b/c.ts")
        );
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn script_specifiers_try_extensions_and_index() {
        let r = resolver(&[
            "/p/src/util.ts",
            "/p/src/lib/index.ts",
            "/p/src/user.service.ts",
            "/p/src/esm.ts",
        ]);
        let from = Path::new("/p/src/app/main.ts");
        assert_eq!(r.resolve(from, "../util"), Some(PathBuf::from("/p/src/util.ts")));
        assert_eq!(r.resolve(from, "../lib"), Some(PathBuf::from("/p/src/lib/index.ts")));
        assert_eq!(
            r.resolve(from, "../user.service"),
            Some(PathBuf::from("/p/src/user.service.ts"))
        );
        assert_eq!(r.resolve(from, "../esm.js"), Some(PathBuf::from("/p/src/esm.ts")));
        assert_eq!(r.resolve(from, "axios"), None);
        assert_eq!(r.resolve(from, "./missing"), None);
    }

    #[test]
    fn dot_specifiers_resolve_to_directory_index() {
        let r = resolver(&[
            "/p/src/index.ts",
            "/p/src/app/index.tsx",
            "/p/src/app.ts",
            "/p/src/lib/index.js",
        ]);
        let from = Path::new("/p/src/app/main.ts");
        assert_eq!(r.resolve(from, "."), Some(PathBuf::from("/p/src/app/index.tsx")));
        assert_eq!(r.resolve(from, ".."), Some(PathBuf::from("/p/src/index.ts")));
        assert_eq!(r.resolve(from, "../lib/"), Some(PathBuf::from("/p/src/lib/index.js")));
        assert_eq!(
            r.resolve(Path::new("/p/src/lib/util.ts"), "./"),
            Some(PathBuf::from("/p/src/lib/index.js"))
        );
        assert_eq!(r.resolve(Path::new("/p/other/a.ts"), "."), None);
    }

    #[test]
    fn python_relative_imports() {
        let r = resolver(&["/p/app/models.py", "/p/app/db/__init__.py", "/p/shared.py"]);
        let from = Path::new("/p/app/views.py");
        assert_eq!(r.resolve(from, ".models"), Some(PathBuf::from("/p/app/models.py")));
        assert_eq!(r.resolve(from, ".db"), Some(PathBuf::from("/p/app/db/__init__.py")));
        assert_eq!(r.resolve(from, "..shared"), Some(PathBuf::from("/p/shared.py")));
    }

    #[test]
    fn rust_module_paths() {
        let r = resolver(&[
            "/p/src/domain/mod.rs",
            "/p/src/domain/user.rs",
            "/p/src/infra.rs",
        ]);
        let from = Path::new("/p/src/domain/order.rs");
        assert_eq!(
            r.resolve(from, "crate::domain::user::User"),
            Some(PathBuf::from("/p/src/domain/user.rs"))
        );
        assert_eq!(
            r.resolve(from, "crate::infra"),
            Some(PathBuf::from("/p/src/infra.rs"))
        );
        assert_eq!(
            r.resolve(from, "super::user"),
            Some(PathBuf::from("/p/src/domain/user.rs"))
        );
        assert_eq!(
            r.resolve(Path::new("/p/src/domain/mod.rs"), "self::user::User"),
            Some(PathBuf::from("/p/src/domain/user.rs"))
        );
        assert_eq!(r.resolve(from, "std::fs"), None);
    }
}
