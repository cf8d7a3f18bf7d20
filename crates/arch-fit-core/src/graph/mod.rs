//! File-level import graph.
//!
//! The graph is built once per run from the scanned file set. It answers
//! direct-importer, bounded transitive-dependent and cycle-group queries, and the
//! [`ContentCache`] filled while building it is shared with the engine.

mod builder;
mod content;
mod resolve;

pub use builder::{build_import_graph, build_import_graph_with, GraphBuild, GraphError};
pub use content::ContentCache;
pub use resolve::{normalize, ImportResolver};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// One file of the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphNode {
    /// Absolute path.
    pub path: PathBuf,
    /// `@arch` tag of the file.
    pub arch_id: Option<String>,
    /// Resolved imports with the line of the first import statement.
    pub imports: BTreeMap<PathBuf, usize>,
    /// Files importing this one.
    pub imported_by: BTreeSet<PathBuf>,
}

/// Bidirectional import adjacency over absolute paths.
#[derive(Debug, Clone, Default)]
pub struct ImportGraph {
    nodes: BTreeMap<PathBuf, GraphNode>,
}

impl ImportGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, keeping existing edges if it is already present.
    pub fn add_file(&mut self, path: impl Into<PathBuf>, arch_id: Option<String>) {
        let path = path.into();
        let node = self.nodes.entry(path.clone()).or_insert_with(|| GraphNode {
            path,
            ..GraphNode::default()
        });
        node.arch_id = arch_id;
    }

    /// Adds an edge `from -> to`. Unknown endpoints are added untagged.
    pub fn add_edge(&mut self, from: &Path, to: &Path, line: usize) {
        if from == to {
            return;
        }
        for path in [from, to] {
            if !self.nodes.contains_key(path) {
                self.add_file(path, None);
            }
        }
        if let Some(node) = self.nodes.get_mut(from) {
            node.imports.entry(to.to_path_buf()).or_insert(line);
        }
        if let Some(node) = self.nodes.get_mut(to) {
            node.imported_by.insert(from.to_path_buf());
        }
    }

    /// Looks up a node.
    #[must_use]
    pub fn node(&self, path: &Path) -> Option<&GraphNode> {
        self.nodes.get(path)
    }

    /// Iterates over all nodes in path order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.imports.len()).sum()
    }

    /// Direct importers of `path`.
    #[must_use]
    pub fn importers(&self, path: &Path) -> Vec<&GraphNode> {
        self.nodes
            .get(path)
            .map(|n| {
                n.imported_by
                    .iter()
                    .filter_map(|p| self.nodes.get(p))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Direct imports of `path`.
    #[must_use]
    pub fn dependencies(&self, path: &Path) -> Vec<&Path> {
        self.nodes
            .get(path)
            .map(|n| n.imports.keys().map(PathBuf::as_path).collect())
            .unwrap_or_default()
    }

    /// Files that import any seed transitively, at most `depth` hops away.
    ///
    /// Seeds are excluded from the result even when they import each other.
    #[must_use]
    pub fn dependents<'a>(
        &self,
        seeds: impl IntoIterator<Item = &'a Path>,
        depth: usize,
    ) -> BTreeSet<PathBuf> {
        let seeds: BTreeSet<&Path> = seeds.into_iter().collect();
        let mut visited: BTreeSet<&Path> = seeds.clone();
        let mut queue: VecDeque<(&Path, usize)> = seeds.iter().map(|p| (*p, 0)).collect();
        let mut found = BTreeSet::new();

        while let Some((path, distance)) = queue.pop_front() {
            if distance >= depth {
                continue;
            }
            let Some(node) = self.nodes.get(path) else {
                continue;
            };
            for importer in &node.imported_by {
                if visited.insert(importer.as_path()) {
                    found.insert(importer.clone());
                    queue.push_back((importer.as_path(), distance + 1));
                }
            }
        }
        found
    }

    /// Groups of files that import each other, directly or transitively.
    ///
    /// Each group is a strongly connected component with more than one file,
    /// found with Tarjan's algorithm. A file belongs to a group exactly when it
    /// lies on some import cycle. Members and groups are sorted by path.
    #[must_use]
    pub fn find_cycles(&self) -> Vec<Vec<PathBuf>> {
        let mut digraph: DiGraph<&Path, ()> = DiGraph::new();
        let index: HashMap<&Path, NodeIndex> = self
            .nodes
            .keys()
            .map(|path| (path.as_path(), digraph.add_node(path.as_path())))
            .collect();
        for node in self.nodes.values() {
            let Some(&from) = index.get(node.path.as_path()) else {
                continue;
            };
            for target in node.imports.keys() {
                if let Some(&to) = index.get(target.as_path()) {
                    digraph.add_edge(from, to, ());
                }
            }
        }

        let mut groups: Vec<Vec<PathBuf>> = tarjan_scc(&digraph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut members: Vec<PathBuf> =
                    scc.into_iter().map(|i| digraph[i].to_path_buf()).collect();
                members.sort();
                members
            })
            .collect();
        groups.sort();
        groups
    }
}
