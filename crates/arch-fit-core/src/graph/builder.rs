//! Parallel graph construction.

use super::content::ContentCache;
use super::resolve::{normalize, ImportResolver};
use super::ImportGraph;
use crate::annotations::extract_arch_tag;
use crate::semantic::ProviderRegistry;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Errors that abort graph construction.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Output of [`build_import_graph`].
#[derive(Debug)]
pub struct GraphBuild {
    /// The graph.
    pub graph: ImportGraph,
    /// Content of every readable file, keyed by absolute path.
    pub content: Arc<ContentCache>,
    /// Files that could not be read.
    pub unreadable: Vec<PathBuf>,
    /// Raw import specifiers with their lines, keyed by absolute path.
    pub specifiers: HashMap<PathBuf, Vec<(String, usize)>>,
    /// Files whose specifiers came from the caller instead of a parse.
    pub reused: usize,
}

struct Scanned {
    path: PathBuf,
    content: Arc<str>,
    arch_id: Option<String>,
    imports: Vec<(String, usize)>,
    reused: bool,
}

/// Reads and parses `files` (absolute paths) with at most `concurrency`
/// workers, then resolves every import against the scanned set.
///
/// Unreadable files are logged, left out of the graph and listed in
/// [`GraphBuild::unreadable`].
///
/// # Errors
///
/// Returns an error if the worker pool cannot be created.
pub fn build_import_graph(
    files: &[PathBuf],
    providers: &ProviderRegistry,
    concurrency: usize,
) -> Result<GraphBuild, GraphError> {
    build_import_graph_with(files, providers, concurrency, |_, _| None)
}

/// Same as [`build_import_graph`], but asks `known_imports` first.
///
/// `known_imports(path, content)` may return the specifiers of a file whose
/// content is unchanged since they were last extracted; the file is then not
/// parsed again.
///
/// # Errors
///
/// Returns an error if the worker pool cannot be created.
pub fn build_import_graph_with<F>(
    files: &[PathBuf],
    providers: &ProviderRegistry,
    concurrency: usize,
    known_imports: F,
) -> Result<GraphBuild, GraphError>
where
    F: Fn(&Path, &str) -> Option<Vec<(String, usize)>> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency.max(1))
        .build()?;

    let scanned: Vec<Result<Scanned, PathBuf>> = pool.install(|| {
        files
            .par_iter()
            .map(|file| {
                let path = normalize(file);
                let content: Arc<str> = match std::fs::read_to_string(&path) {
                    Ok(content) => content.into(),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Unreadable file");
                        return Err(path);
                    }
                };
                let (imports, reused) = match known_imports(&path, &content) {
                    Some(imports) => (imports, true),
                    None => {
                        let model = providers.parse(&path, &content);
                        let imports = model.imports.into_iter().map(|i| (i.module, i.line));
                        (imports.collect(), false)
                    }
                };
                Ok(Scanned {
                    arch_id: extract_arch_tag(&content),
                    imports,
                    reused,
                    path,
                    content,
                })
            })
            .collect()
    });

    let content = Arc::new(ContentCache::new());
    let mut graph = ImportGraph::new();
    let mut unreadable = Vec::new();
    let mut parsed = Vec::with_capacity(scanned.len());
    for entry in scanned {
        match entry {
            Ok(file) => {
                graph.add_file(file.path.clone(), file.arch_id.clone());
                content.insert(file.path.clone(), Arc::clone(&file.content));
                parsed.push(file);
            }
            Err(path) => unreadable.push(path),
        }
    }

    let resolver = ImportResolver::new(parsed.iter().map(|f| f.path.clone()));
    for file in &parsed {
        for (specifier, line) in &file.imports {
            if let Some(target) = resolver.resolve(&file.path, specifier) {
                graph.add_edge(&file.path, &target, *line);
            }
        }
    }

    let reused = parsed.iter().filter(|f| f.reused).count();
    tracing::info!(
        files = graph.len(),
        edges = graph.edge_count(),
        reused,
        unreadable = unreadable.len(),
        "Built import graph"
    );
    Ok(GraphBuild {
        graph,
        content,
        unreadable,
        specifiers: parsed.into_iter().map(|f| (f.path, f.imports)).collect(),
        reused,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn builds_graph_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(
            root.join("src/a.ts"),
            "/** @arch app.entry */\nimport { b } from './b';\nimport axios from 'axios';\n",
        )
        .unwrap();
        std::fs::write(root.join("src/b.ts"), "import { c } from './c';\n").unwrap();
        std::fs::write(root.join("src/c.ts"), "export const c = 1;\n").unwrap();

        let files: Vec<PathBuf> = ["a", "b", "c", "gone"]
            .iter()
            .map(|n| root.join(format!("src/{n}.ts")))
            .collect();
        let build = build_import_graph(&files, &ProviderRegistry::with_builtin(), 2).unwrap();

        let a = normalize(&root.join("src/a.ts"));
        let c = normalize(&root.join("src/c.ts"));
        assert_eq!(build.graph.len(), 3);
        assert_eq!(build.graph.edge_count(), 2);
        assert_eq!(
            build.graph.node(&a).and_then(|n| n.arch_id.as_deref()),
            Some("app.entry")
        );
        assert_eq!(build.graph.dependents([c.as_path()], 2).len(), 2);
        assert_eq!(build.unreadable.len(), 1);
        assert!(build.content.contains(Path::new(&c)));
        assert_eq!(build.reused, 0);
        assert_eq!(build.specifiers[&a].len(), 2);
    }

    #[test]
    fn known_imports_skip_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("a.ts"), "export const a = 1;\n").unwrap();
        std::fs::write(root.join("b.ts"), "export const b = 2;\n").unwrap();
        let files = vec![root.join("a.ts"), root.join("b.ts")];

        // The edge only exists in the reused specifiers, not in the file.
        let build = build_import_graph_with(&files, &ProviderRegistry::new(), 1, |path, _| {
            path.ends_with("a.ts").then(|| vec![("./b".to_string(), 1)])
        })
        .unwrap();
        assert_eq!(build.reused, 1);
        assert_eq!(build.graph.edge_count(), 1);
    }
}
