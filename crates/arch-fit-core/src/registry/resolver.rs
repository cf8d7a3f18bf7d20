//! Flattens inheritance chains and mixins into concrete constraint sets.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::model::{Constraint, Pointer, Registry, Rule};

/// The effective constraint set of one architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedArchitecture {
    /// Resolved id.
    pub arch_id: String,
    /// Root-to-leaf chain, ending with `arch_id`.
    pub inheritance_chain: Vec<String>,
    /// Mixins applied, in application order.
    pub applied_mixins: Vec<String>,
    /// At most one entry per `(rule, normalized value)`.
    pub constraints: Vec<Constraint>,
    /// Hints collected along the chain.
    pub hints: Vec<String>,
    /// Pointers collected along the chain.
    pub pointers: Vec<Pointer>,
    /// Leaf node is a singleton.
    pub singleton: bool,
}

impl FlattenedArchitecture {
    /// Iterates over the constraints of one rule.
    pub fn constraints_for(&self, rule: Rule) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(move |c| c.rule == rule)
    }
}

/// Kind of resolution problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The requested id is not in the registry.
    UnknownArchitecture,
    /// `inherits` loops back onto the chain.
    CircularInheritance,
    /// `inherits` names a missing node.
    UnknownParent,
    /// A node references a missing mixin.
    UnknownMixin,
    /// One declaration site lists the same key twice with different severities.
    SeverityMismatch,
}

impl ConflictKind {
    /// Returns the snake_case name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::UnknownArchitecture => "unknown_architecture",
            Self::CircularInheritance => "circular_inheritance",
            Self::UnknownParent => "unknown_parent",
            Self::UnknownMixin => "unknown_mixin",
            Self::SeverityMismatch => "severity_mismatch",
        }
    }
}

/// A diagnostic produced while flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionConflict {
    /// Node being processed when the problem was found.
    pub arch_id: String,
    /// Kind.
    pub kind: ConflictKind,
    /// Human-readable message.
    pub message: String,
}

/// Result of resolving one id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// `None` when the id is unknown.
    pub architecture: Option<FlattenedArchitecture>,
    /// Problems found along the way.
    pub conflicts: Vec<ResolutionConflict>,
}

/// Ordered map keyed by `(rule, normalized value)`. A later insert replaces
/// the earlier entry in place and carries its own provenance.
#[derive(Default)]
struct ConstraintMap {
    entries: Vec<Constraint>,
    index: HashMap<(Rule, String), usize>,
}

impl ConstraintMap {
    fn insert(&mut self, constraint: Constraint, conflicts: &mut Vec<ResolutionConflict>) {
        let key = constraint.key();
        match self.index.get(&key) {
            Some(&i) => {
                let existing = &self.entries[i];
                if existing.source == constraint.source && existing.severity != constraint.severity
                {
                    conflicts.push(ResolutionConflict {
                        arch_id: constraint.source.clone(),
                        kind: ConflictKind::SeverityMismatch,
                        message: format!(
                            "`{}: {}` declared as both {} and {}; using {}",
                            key.0,
                            key.1,
                            existing.severity,
                            constraint.severity,
                            constraint.severity
                        ),
                    });
                }
                self.entries[i] = constraint;
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(constraint);
            }
        }
    }

    fn into_vec(self) -> Vec<Constraint> {
        self.entries
    }
}

/// Resolves `arch_id` against `registry`.
#[must_use]
pub fn resolve(registry: &Registry, arch_id: &str) -> Resolution {
    let mut conflicts = Vec::new();
    if !registry.contains(arch_id) {
        conflicts.push(ResolutionConflict {
            arch_id: arch_id.to_string(),
            kind: ConflictKind::UnknownArchitecture,
            message: format!("architecture `{arch_id}` is not defined"),
        });
        return Resolution {
            architecture: None,
            conflicts,
        };
    }

    let chain = walk_chain(registry, arch_id, &mut conflicts);

    let mut merged = ConstraintMap::default();
    let mut applied_mixins: Vec<String> = Vec::new();
    let mut hints: Vec<String> = Vec::new();
    let mut pointers: Vec<Pointer> = Vec::new();

    for id in &chain {
        let Some(node) = registry.node(id) else { continue };
        for mixin_id in &node.mixins {
            let Some(mixin) = registry.mixins.get(mixin_id) else {
                conflicts.push(ResolutionConflict {
                    arch_id: id.clone(),
                    kind: ConflictKind::UnknownMixin,
                    message: format!("`{id}` references unknown mixin `{mixin_id}`"),
                });
                continue;
            };
            if !applied_mixins.contains(mixin_id) {
                applied_mixins.push(mixin_id.clone());
            }
            for constraint in &mixin.constraints {
                merged.insert(constraint.clone(), &mut conflicts);
            }
        }
        for constraint in &node.constraints {
            merged.insert(constraint.clone(), &mut conflicts);
        }
        for hint in &node.hints {
            if !hints.contains(hint) {
                hints.push(hint.clone());
            }
        }
        for pointer in &node.pointers {
            if !pointers.contains(pointer) {
                pointers.push(pointer.clone());
            }
        }
    }

    let constraints = apply_cancellations(merged.into_vec(), &mut conflicts);
    let singleton = registry.node(arch_id).is_some_and(|n| n.singleton);

    Resolution {
        architecture: Some(FlattenedArchitecture {
            arch_id: arch_id.to_string(),
            inheritance_chain: chain,
            applied_mixins,
            constraints,
            hints,
            pointers,
            singleton,
        }),
        conflicts,
    }
}

/// Returns the root-to-leaf chain. Nodes without `inherits` get `base` as
/// their implicit parent when the registry defines it.
fn walk_chain(
    registry: &Registry,
    arch_id: &str,
    conflicts: &mut Vec<ResolutionConflict>,
) -> Vec<String> {
    let mut chain = vec![arch_id.to_string()];
    let mut visited: HashSet<&str> = HashSet::from([arch_id]);
    let mut current = arch_id;

    while let Some(node) = registry.node(current) {
        let parent = match node.inherits.as_deref() {
            Some(parent) => parent,
            None if current != Registry::BASE && registry.contains(Registry::BASE) => {
                Registry::BASE
            }
            None => break,
        };
        if !visited.insert(parent) {
            conflicts.push(ResolutionConflict {
                arch_id: current.to_string(),
                kind: ConflictKind::CircularInheritance,
                message: format!("circular inheritance: `{current}` inherits `{parent}`"),
            });
            break;
        }
        if !registry.contains(parent) {
            conflicts.push(ResolutionConflict {
                arch_id: current.to_string(),
                kind: ConflictKind::UnknownParent,
                message: format!("`{current}` inherits unknown architecture `{parent}`"),
            });
            break;
        }
        chain.push(parent.to_string());
        current = parent;
    }

    chain.reverse();
    chain
}

/// Removes `forbid_pattern`/`forbid_import` values re-permitted by an
/// `allow_pattern`/`allow_import` anywhere in the merged set, then drops the
/// allow entries themselves.
fn apply_cancellations(
    merged: Vec<Constraint>,
    conflicts: &mut Vec<ResolutionConflict>,
) -> Vec<Constraint> {
    let allowed = |rule: Rule| -> Vec<String> {
        merged
            .iter()
            .filter(|c| c.rule == rule)
            .flat_map(|c| c.value.items())
            .map(String::from)
            .collect()
    };
    let allowed_patterns = allowed(Rule::AllowPattern);
    let allowed_imports = allowed(Rule::AllowImport);

    let mut result = ConstraintMap::default();
    for mut constraint in merged {
        let removed: Vec<&str> = match constraint.rule {
            Rule::AllowPattern | Rule::AllowImport => continue,
            Rule::ForbidPattern => allowed_patterns.iter().map(String::as_str).collect(),
            Rule::ForbidImport => allowed_imports.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        };
        if !removed.is_empty() {
            constraint.value = constraint.value.without(&removed);
            if constraint.value.is_none() {
                tracing::debug!(
                    rule = %constraint.rule,
                    source = %constraint.source,
                    "Constraint cancelled by allow rule"
                );
                continue;
            }
        }
        result.insert(constraint, conflicts);
    }
    result.into_vec()
}

/// Resolves ids against a fixed registry, caching results for the run.
#[derive(Debug)]
pub struct Resolver {
    registry: Arc<Registry>,
    cache: RwLock<HashMap<String, Arc<Resolution>>>,
}

impl Resolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the underlying registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolves an id, reusing an earlier result when available.
    pub fn resolve(&self, arch_id: &str) -> Arc<Resolution> {
        if let Some(hit) = self.cache.read().get(arch_id) {
            return Arc::clone(hit);
        }
        let resolution = Arc::new(resolve(&self.registry, arch_id));
        for conflict in &resolution.conflicts {
            tracing::warn!(arch_id, conflict = %conflict.message, "Resolution conflict");
        }
        self.cache
            .write()
            .entry(arch_id.to_string())
            .or_insert(resolution)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::model::{ArchId, ArchitectureNode, ConstraintValue, Mixin};
    use crate::types::Severity;

    fn constraint(rule: Rule, value: &str, source: &str) -> Constraint {
        Constraint::new(rule, ConstraintValue::Text(value.into()), Severity::Error)
            .with_source(source)
    }

    fn node(id: &str, inherits: Option<&str>, constraints: Vec<Constraint>) -> ArchitectureNode {
        let mut node = ArchitectureNode::new(ArchId::new(id).unwrap());
        node.inherits = inherits.map(String::from);
        node.constraints = constraints;
        node
    }

    fn sample() -> Registry {
        Registry::new()
            .with_node(node(
                "base",
                None,
                vec![constraint(Rule::ForbidPattern, "console\\.log", "base")],
            ))
            .with_node(node(
                "core",
                None,
                vec![constraint(Rule::ForbidImport, "axios", "core")],
            ))
            .with_node(node(
                "core.engine",
                Some("core"),
                vec![constraint(Rule::AllowPattern, "console\\.log", "core.engine")],
            ))
    }

    #[test]
    fn chain_includes_implicit_base() {
        let resolution = resolve(&sample(), "core.engine");
        let arch = resolution.architecture.unwrap();
        assert_eq!(arch.inheritance_chain, vec!["base", "core", "core.engine"]);
        assert!(resolution.conflicts.is_empty());
    }

    #[test]
    fn allow_pattern_cancels_ancestor_forbid() {
        let arch = resolve(&sample(), "core.engine").architecture.unwrap();
        assert!(arch.constraints_for(Rule::ForbidPattern).next().is_none());
        assert!(arch.constraints_for(Rule::AllowPattern).next().is_none());
        assert_eq!(arch.constraints_for(Rule::ForbidImport).count(), 1);

        let core = resolve(&sample(), "core").architecture.unwrap();
        assert_eq!(core.constraints_for(Rule::ForbidPattern).count(), 1);
    }

    #[test]
    fn allow_import_strips_list_items() {
        let mut forbid = constraint(Rule::ForbidImport, "", "base");
        forbid.value = ConstraintValue::List(vec!["axios".into(), "http".into()]);
        let registry = Registry::new()
            .with_node(node("base", None, vec![forbid]))
            .with_node(node(
                "adapter",
                None,
                vec![constraint(Rule::AllowImport, "http", "adapter")],
            ));
        let arch = resolve(&registry, "adapter").architecture.unwrap();
        let remaining: Vec<&Constraint> = arch.constraints_for(Rule::ForbidImport).collect();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].value.items(), vec!["axios"]);
    }

    #[test]
    fn leaf_overrides_ancestor_with_own_provenance() {
        let mut warning = constraint(Rule::ForbidImport, "axios", "core.engine");
        warning.severity = Severity::Warning;
        let registry = sample().with_node(node("core.engine", Some("core"), vec![warning]));
        let arch = resolve(&registry, "core.engine").architecture.unwrap();
        let forbid: Vec<&Constraint> = arch.constraints_for(Rule::ForbidImport).collect();
        assert_eq!(forbid.len(), 1);
        assert_eq!(forbid[0].severity, Severity::Warning);
        assert_eq!(forbid[0].source, "core.engine");
    }

    #[test]
    fn mixins_apply_between_parent_and_own_constraints() {
        let mut mixin_forbid = constraint(Rule::ForbidImport, "axios", "strict");
        mixin_forbid.why = Some("from mixin".into());
        let mut own = constraint(Rule::MaxFileLines, "", "core.engine");
        own.value = ConstraintValue::Number(100);
        let mut mixin_lines = constraint(Rule::MaxFileLines, "", "strict");
        mixin_lines.value = ConstraintValue::Number(100);
        mixin_lines.severity = Severity::Warning;

        let mut engine = node("core.engine", Some("core"), vec![own]);
        engine.mixins = vec!["strict".into()];
        let registry = sample().with_node(engine).with_mixin(Mixin {
            id: "strict".into(),
            description: None,
            constraints: vec![mixin_forbid, mixin_lines],
        });

        let arch = resolve(&registry, "core.engine").architecture.unwrap();
        assert_eq!(arch.applied_mixins, vec!["strict"]);
        let forbid: Vec<&Constraint> = arch.constraints_for(Rule::ForbidImport).collect();
        assert_eq!(forbid[0].source, "strict");
        let lines: Vec<&Constraint> = arch.constraints_for(Rule::MaxFileLines).collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].severity, Severity::Error);
        assert_eq!(lines[0].source, "core.engine");
    }

    #[test]
    fn circular_inheritance_is_reported() {
        let registry = Registry::new()
            .with_node(node("a", Some("b"), vec![]))
            .with_node(node("b", Some("a"), vec![]));
        let resolution = resolve(&registry, "a");
        assert!(resolution.architecture.is_some());
        assert_eq!(
            resolution.conflicts[0].kind,
            ConflictKind::CircularInheritance
        );
    }

    #[test]
    fn dangling_references_are_conflicts() {
        let mut orphan = node("orphan", Some("ghost"), vec![]);
        orphan.mixins = vec!["missing".into()];
        let resolution = resolve(&Registry::new().with_node(orphan), "orphan");
        let kinds: Vec<ConflictKind> = resolution.conflicts.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ConflictKind::UnknownParent, ConflictKind::UnknownMixin]
        );
    }

    #[test]
    fn same_site_severity_mismatch_is_conflict() {
        let mut warning = constraint(Rule::ForbidImport, "axios", "a");
        warning.severity = Severity::Warning;
        let registry = Registry::new().with_node(node(
            "a",
            None,
            vec![constraint(Rule::ForbidImport, "axios", "a"), warning],
        ));
        let resolution = resolve(&registry, "a");
        assert_eq!(resolution.conflicts[0].kind, ConflictKind::SeverityMismatch);
        let arch = resolution.architecture.unwrap();
        assert_eq!(arch.constraints.len(), 1);
    }

    #[test]
    fn unknown_architecture_has_no_result() {
        let resolution = resolve(&sample(), "nope");
        assert!(resolution.architecture.is_none());
        assert_eq!(
            resolution.conflicts[0].kind,
            ConflictKind::UnknownArchitecture
        );
    }

    #[test]
    fn resolution_is_deterministic_and_cached() {
        let resolver = Resolver::new(Arc::new(sample()));
        let first = resolver.resolve("core.engine");
        let second = resolver.resolve("core.engine");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, resolve(&sample(), "core.engine"));
    }
}
