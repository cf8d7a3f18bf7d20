//! Pure domain model for the architecture registry.
//!
//! This module contains no serde and no I/O. Invariants are enforced at
//! construction time via validated newtypes; cross-node references
//! (`inherits`, mixin ids) are deliberately left unchecked here and surface
//! as resolution conflicts instead.

use crate::types::Severity;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ────────────────────────────────────────────
// Newtypes with validation
// ────────────────────────────────────────────

/// A validated, dot-namespaced architecture id (e.g. `domain.payment.service`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchId(String);

impl ArchId {
    /// Creates a new architecture id.
    ///
    /// # Errors
    ///
    /// Returns error if the id is empty, has empty segments, or contains
    /// characters other than ASCII alphanumerics, `-`, `_` and `.`.
    pub fn new(id: &str) -> Result<Self, ModelError> {
        if id.is_empty() {
            return Err(ModelError::EmptyArchId);
        }
        let valid_chars = id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid_chars || id.split('.').any(str::is_empty) {
            return Err(ModelError::InvalidArchId { id: id.to_string() });
        }
        Ok(Self(id.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ────────────────────────────────────────────
// Rules
// ────────────────────────────────────────────

/// The closed set of constraint rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rule {
    /// Module must not be imported.
    ForbidImport,
    /// Module must be imported.
    RequireImport,
    /// Cancels a matching `forbid_import` from anywhere in the chain.
    AllowImport,
    /// Only the listed architectures may import this file.
    ImportableBy,
    /// File must not take part in an import cycle.
    ForbidCircularDeps,
    /// Regex must not match the file content.
    ForbidPattern,
    /// Regex must match the file content.
    RequirePattern,
    /// Cancels a matching `forbid_pattern` from anywhere in the chain.
    AllowPattern,
    /// Callee must not be called.
    ForbidCall,
    /// Callee must be called at least once.
    RequireCall,
    /// Calls to the callee must sit inside a try block.
    RequireTryCatch,
    /// Target must not be assigned or deleted.
    ForbidMutation,
    /// Decorator must not be used.
    ForbidDecorator,
    /// Every class must carry the decorator.
    RequireDecorator,
    /// File name must match the regex.
    NamingPattern,
    /// File path must match the regex.
    LocationPattern,
    /// File must not exceed the line count.
    MaxFileLines,
    /// No class may expose more public methods than the limit.
    MaxPublicMethods,
    /// A test file must exist next to the file.
    RequireTestFile,
    /// A companion file must exist.
    RequireCompanionFile,
    /// Symbol must be exported.
    RequireExport,
}

impl Rule {
    /// Every rule, in declaration order.
    pub const ALL: [Self; 21] = [
        Self::ForbidImport,
        Self::RequireImport,
        Self::AllowImport,
        Self::ImportableBy,
        Self::ForbidCircularDeps,
        Self::ForbidPattern,
        Self::RequirePattern,
        Self::AllowPattern,
        Self::ForbidCall,
        Self::RequireCall,
        Self::RequireTryCatch,
        Self::ForbidMutation,
        Self::ForbidDecorator,
        Self::RequireDecorator,
        Self::NamingPattern,
        Self::LocationPattern,
        Self::MaxFileLines,
        Self::MaxPublicMethods,
        Self::RequireTestFile,
        Self::RequireCompanionFile,
        Self::RequireExport,
    ];

    /// Returns the snake_case rule name used in the registry.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ForbidImport => "forbid_import",
            Self::RequireImport => "require_import",
            Self::AllowImport => "allow_import",
            Self::ImportableBy => "importable_by",
            Self::ForbidCircularDeps => "forbid_circular_deps",
            Self::ForbidPattern => "forbid_pattern",
            Self::RequirePattern => "require_pattern",
            Self::AllowPattern => "allow_pattern",
            Self::ForbidCall => "forbid_call",
            Self::RequireCall => "require_call",
            Self::RequireTryCatch => "require_try_catch",
            Self::ForbidMutation => "forbid_mutation",
            Self::ForbidDecorator => "forbid_decorator",
            Self::RequireDecorator => "require_decorator",
            Self::NamingPattern => "naming_pattern",
            Self::LocationPattern => "location_pattern",
            Self::MaxFileLines => "max_file_lines",
            Self::MaxPublicMethods => "max_public_methods",
            Self::RequireTestFile => "require_test_file",
            Self::RequireCompanionFile => "require_companion_file",
            Self::RequireExport => "require_export",
        }
    }

    /// Returns the violation code for this rule.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::ForbidImport => "AF101",
            Self::RequireImport => "AF102",
            Self::AllowImport => "AF103",
            Self::ImportableBy => "AF104",
            Self::ForbidCircularDeps => "AF105",
            Self::ForbidPattern => "AF201",
            Self::RequirePattern => "AF202",
            Self::AllowPattern => "AF203",
            Self::ForbidCall => "AF301",
            Self::RequireCall => "AF302",
            Self::RequireTryCatch => "AF303",
            Self::ForbidMutation => "AF304",
            Self::ForbidDecorator => "AF401",
            Self::RequireDecorator => "AF402",
            Self::NamingPattern => "AF501",
            Self::LocationPattern => "AF502",
            Self::MaxFileLines => "AF503",
            Self::MaxPublicMethods => "AF504",
            Self::RequireTestFile => "AF505",
            Self::RequireCompanionFile => "AF506",
            Self::RequireExport => "AF507",
        }
    }

    /// Rules subject to the `missing_why` policy.
    #[must_use]
    pub fn is_forbid_class(self) -> bool {
        matches!(
            self,
            Self::ForbidImport
                | Self::ForbidPattern
                | Self::ForbidCall
                | Self::ForbidMutation
                | Self::ForbidDecorator
                | Self::ForbidCircularDeps
        )
    }

    /// Rules that only cancel other constraints and never validate anything.
    #[must_use]
    pub fn is_cancellation(self) -> bool {
        matches!(self, Self::AllowImport | Self::AllowPattern)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rule {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ModelError::UnknownRule {
                rule: s.to_string(),
            })
    }
}

// ────────────────────────────────────────────
// Constraint values, conditions, exemptions
// ────────────────────────────────────────────

/// A constraint value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConstraintValue {
    /// No value (rules like `forbid_circular_deps`).
    #[default]
    None,
    /// Single string.
    Text(String),
    /// List of strings.
    List(Vec<String>),
    /// Number.
    Number(i64),
}

impl ConstraintValue {
    /// Returns the string items of the value.
    #[must_use]
    pub fn items(&self) -> Vec<&str> {
        match self {
            Self::Text(s) => vec![s.as_str()],
            Self::List(items) => items.iter().map(String::as_str).collect(),
            Self::None | Self::Number(_) => Vec::new(),
        }
    }

    /// Returns the numeric value, parsing text if needed.
    #[must_use]
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::None | Self::List(_) => None,
        }
    }

    /// Key used for deduplication: list order and surrounding whitespace do not matter.
    #[must_use]
    pub fn normalized(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => n.to_string(),
            Self::List(items) => {
                let mut items: Vec<&str> = items.iter().map(|s| s.trim()).collect();
                items.sort_unstable();
                items.dedup();
                items.join(",")
            }
        }
    }

    /// Returns a copy with the given items removed. A list emptied this way becomes `None`.
    #[must_use]
    pub fn without(&self, removed: &[&str]) -> Self {
        match self {
            Self::Text(s) if removed.contains(&s.as_str()) => Self::None,
            Self::List(items) => {
                let kept: Vec<String> = items
                    .iter()
                    .filter(|i| !removed.contains(&i.as_str()))
                    .cloned()
                    .collect();
                if kept.is_empty() {
                    Self::None
                } else {
                    Self::List(kept)
                }
            }
            other => other.clone(),
        }
    }

    /// Returns true for [`Self::None`].
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for ConstraintValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

/// Predicate kinds usable in a `condition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    /// Some class carries the decorator.
    HasDecorator,
    /// File imports the module.
    HasImport,
    /// Some class extends the named class.
    Extends,
    /// Some class implements the named interface.
    Implements,
    /// File path matches the glob.
    FileMatches,
    /// Some method carries the decorator.
    MethodHasDecorator,
}

impl ConditionKind {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "has_decorator" => Some(Self::HasDecorator),
            "has_import" => Some(Self::HasImport),
            "extends" => Some(Self::Extends),
            "implements" => Some(Self::Implements),
            "file_matches" => Some(Self::FileMatches),
            "method_has_decorator" => Some(Self::MethodHasDecorator),
            _ => None,
        }
    }
}

/// One predicate of a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionClause {
    /// Predicate kind.
    pub kind: ConditionKind,
    /// `not_*` form.
    pub negated: bool,
    /// Accepted values; the predicate holds if any value matches.
    pub values: Vec<String>,
}

impl ConditionClause {
    /// Parses a clause from a key like `has_decorator` or `not_extends`.
    ///
    /// # Errors
    ///
    /// Returns error for an unknown predicate name.
    pub fn new(key: &str, values: Vec<String>) -> Result<Self, ModelError> {
        let (negated, base) = match key.strip_prefix("not_") {
            Some(base) => (true, base),
            None => (false, key),
        };
        let kind = ConditionKind::parse(base).ok_or_else(|| ModelError::UnknownCondition {
            key: key.to_string(),
        })?;
        Ok(Self {
            kind,
            negated,
            values,
        })
    }
}

/// A conjunction of clauses; every clause must hold for the constraint to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Condition {
    /// Clauses.
    pub clauses: Vec<ConditionClause>,
}

/// An `unless` exemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exemption {
    /// `@intent:<name>` (or a bare name).
    Intent(String),
    /// `import:<module>`.
    Import(String),
    /// `decorator:<name>`.
    Decorator(String),
}

impl Exemption {
    /// Parses an `unless` entry.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(intent) = raw.strip_prefix("@intent:") {
            Self::Intent(intent.to_string())
        } else if let Some(module) = raw.strip_prefix("import:") {
            Self::Import(module.to_string())
        } else if let Some(name) = raw.strip_prefix("decorator:") {
            Self::Decorator(name.trim_start_matches('@').to_string())
        } else {
            Self::Intent(raw.to_string())
        }
    }

    /// Returns the intent name for intent exemptions.
    #[must_use]
    pub fn as_intent(&self) -> Option<&str> {
        match self {
            Self::Intent(name) => Some(name),
            _ => None,
        }
    }
}

// ────────────────────────────────────────────
// Constraints, nodes, mixins, patterns
// ────────────────────────────────────────────

/// A single rule + value + severity entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// Rule.
    pub rule: Rule,
    /// Value.
    pub value: ConstraintValue,
    /// Severity.
    pub severity: Severity,
    /// Rationale.
    pub why: Option<String>,
    /// Single suggested alternative.
    pub alternative: Option<String>,
    /// Several suggested alternatives.
    pub alternatives: Vec<String>,
    /// Applicability predicate.
    pub condition: Option<Condition>,
    /// Exemptions.
    pub unless: Vec<Exemption>,
    /// Architecture or mixin that declared the constraint.
    pub source: String,
}

impl Constraint {
    /// Creates a constraint with defaults for the optional fields.
    #[must_use]
    pub fn new(rule: Rule, value: ConstraintValue, severity: Severity) -> Self {
        Self {
            rule,
            value,
            severity,
            why: None,
            alternative: None,
            alternatives: Vec::new(),
            condition: None,
            unless: Vec::new(),
            source: String::new(),
        }
    }

    /// Sets the provenance.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the rationale.
    #[must_use]
    pub fn with_why(mut self, why: impl Into<String>) -> Self {
        self.why = Some(why.into());
        self
    }

    /// Deduplication key.
    #[must_use]
    pub fn key(&self) -> (Rule, String) {
        (self.rule, self.value.normalized())
    }

    /// Every suggested alternative, single first.
    pub fn all_alternatives(&self) -> impl Iterator<Item = &str> {
        self.alternative
            .iter()
            .chain(&self.alternatives)
            .map(String::as_str)
    }
}

/// A documentation link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer {
    /// Display label.
    pub label: String,
    /// Target.
    pub uri: String,
}

/// An architecture definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchitectureNode {
    /// Id.
    pub id: ArchId,
    /// Short description.
    pub description: Option<String>,
    /// Longer rationale.
    pub rationale: Option<String>,
    /// Parent id, unchecked.
    pub inherits: Option<String>,
    /// Mixin ids, unchecked.
    pub mixins: Vec<String>,
    /// Constraints declared directly on the node.
    pub constraints: Vec<Constraint>,
    /// Guidance for authors.
    pub hints: Vec<String>,
    /// Documentation links.
    pub pointers: Vec<Pointer>,
    /// At most one file per batch.
    pub singleton: bool,
}

impl ArchitectureNode {
    /// Creates a node with no parent, mixins or constraints.
    #[must_use]
    pub fn new(id: ArchId) -> Self {
        Self {
            id,
            description: None,
            rationale: None,
            inherits: None,
            mixins: Vec::new(),
            constraints: Vec::new(),
            hints: Vec::new(),
            pointers: Vec::new(),
            singleton: false,
        }
    }
}

/// A reusable bundle of constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mixin {
    /// Id.
    pub id: String,
    /// Short description.
    pub description: Option<String>,
    /// Constraints.
    pub constraints: Vec<Constraint>,
}

/// A canonical implementation other code should reuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternEntry {
    /// Pattern name.
    pub name: String,
    /// Path of the canonical implementation.
    pub canonical: String,
    /// Keywords that identify the concern.
    pub keywords: Vec<String>,
    /// Example usage.
    pub usage: Option<String>,
    /// Short description.
    pub description: Option<String>,
}

/// Pattern lookup for violation suggestions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternRegistry {
    entries: Vec<PatternEntry>,
}

impl PatternRegistry {
    /// Creates a pattern registry.
    #[must_use]
    pub fn new(entries: Vec<PatternEntry>) -> Self {
        Self { entries }
    }

    /// Returns true if no patterns are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries.
    pub fn iter(&self) -> impl Iterator<Item = &PatternEntry> {
        self.entries.iter()
    }

    /// Finds the pattern whose keywords match `value` (case-insensitive,
    /// whole value or its first path segment).
    #[must_use]
    pub fn find_for(&self, value: &str) -> Option<&PatternEntry> {
        let value = value.to_ascii_lowercase();
        let head = value.split(['/', ':', '.']).next().unwrap_or(value.as_str());
        self.entries.iter().find(|entry| {
            entry.keywords.iter().any(|k| {
                let k = k.to_ascii_lowercase();
                k == value || k == head
            })
        })
    }
}

/// The validated registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    /// Nodes keyed by id.
    pub nodes: BTreeMap<String, ArchitectureNode>,
    /// Mixins keyed by id.
    pub mixins: BTreeMap<String, Mixin>,
    /// Canonical-implementation patterns.
    pub patterns: PatternRegistry,
}

impl Registry {
    /// Id of the implicit root architecture.
    pub const BASE: &'static str = "base";

    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, replacing any node with the same id.
    #[must_use]
    pub fn with_node(mut self, node: ArchitectureNode) -> Self {
        self.nodes.insert(node.id.as_str().to_string(), node);
        self
    }

    /// Adds a mixin.
    #[must_use]
    pub fn with_mixin(mut self, mixin: Mixin) -> Self {
        self.mixins.insert(mixin.id.clone(), mixin);
        self
    }

    /// Looks up a node.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&ArchitectureNode> {
        self.nodes.get(id)
    }

    /// Returns true if the node exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Ids of singleton architectures.
    pub fn singleton_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .values()
            .filter(|n| n.singleton)
            .map(|n| n.id.as_str())
    }

    /// Closest known id within an edit distance of 3, for "did you mean".
    #[must_use]
    pub fn closest_id(&self, id: &str) -> Option<&str> {
        self.nodes
            .keys()
            .map(|k| (edit_distance(id, k), k))
            .filter(|(d, _)| *d <= 3)
            .min_by_key(|(d, _)| *d)
            .map(|(_, k)| k.as_str())
    }
}

/// Levenshtein distance over chars.
#[must_use]
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut curr = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        prev = curr;
    }
    prev[b.len()]
}

// ────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────

/// Domain model validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Architecture id is empty.
    #[error("architecture id must not be empty")]
    EmptyArchId,

    /// Architecture id contains invalid characters or empty segments.
    #[error("invalid architecture id `{id}`: use dot-separated [A-Za-z0-9_-] segments")]
    InvalidArchId {
        /// The invalid id.
        id: String,
    },

    /// Rule name is not part of the closed rule set.
    #[error("unknown rule `{rule}`")]
    UnknownRule {
        /// The unknown rule.
        rule: String,
    },

    /// Condition key is not a known predicate.
    #[error("unknown condition `{key}`")]
    UnknownCondition {
        /// The unknown key.
        key: String,
    },

    /// Value has the wrong shape for the rule.
    #[error("rule `{rule}` expects {expected}")]
    InvalidValue {
        /// Rule name.
        rule: String,
        /// Description of the expected shape.
        expected: &'static str,
    },
}
