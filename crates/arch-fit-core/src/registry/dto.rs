//! YAML deserialization types (DTO layer).
//!
//! These types exist solely for serde deserialization.
//! They are converted to domain model types via the loader.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Raw YAML representation of the architecture registry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryDto {
    /// Architecture nodes keyed by id.
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeDto>,

    /// Mixins keyed by id.
    #[serde(default)]
    pub mixins: BTreeMap<String, MixinDto>,

    /// Canonical-implementation patterns keyed by name.
    #[serde(default)]
    pub patterns: BTreeMap<String, PatternDto>,
}

/// YAML representation of an architecture node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeDto {
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
    /// Longer rationale.
    #[serde(default)]
    pub rationale: Option<String>,
    /// Parent architecture id.
    #[serde(default)]
    pub inherits: Option<String>,
    /// Mixin ids applied to this node.
    #[serde(default)]
    pub mixins: Vec<String>,
    /// At most one file per batch may use this architecture.
    #[serde(default)]
    pub singleton: bool,
    /// Free-form guidance for authors.
    #[serde(default)]
    pub hints: Vec<String>,
    /// Links to documentation.
    #[serde(default)]
    pub pointers: Vec<PointerDto>,
    /// Constraints declared on the node.
    #[serde(default)]
    pub constraints: Vec<ConstraintDto>,
}

/// YAML representation of a mixin.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MixinDto {
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
    /// Constraints contributed by the mixin.
    #[serde(default)]
    pub constraints: Vec<ConstraintDto>,
}

/// YAML representation of a documentation pointer.
#[derive(Debug, Clone, Deserialize)]
pub struct PointerDto {
    /// Display label.
    pub label: String,
    /// Target URI or repository path.
    pub uri: String,
}

/// A constraint value: string, list of strings, or number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ValueDto {
    /// Numeric value (`max_file_lines: 300`).
    Number(i64),
    /// Single string.
    Text(String),
    /// List of strings.
    List(Vec<String>),
}

/// YAML representation of a constraint.
#[derive(Debug, Clone, Deserialize)]
pub struct ConstraintDto {
    /// Rule name (e.g., "forbid_import").
    pub rule: String,
    /// Rule value.
    #[serde(default)]
    pub value: Option<ValueDto>,
    /// Severity (default: "error").
    #[serde(default)]
    pub severity: Option<String>,
    /// Rationale shown with violations.
    #[serde(default)]
    pub why: Option<String>,
    /// Single suggested alternative.
    #[serde(default)]
    pub alternative: Option<String>,
    /// Several suggested alternatives.
    #[serde(default)]
    pub alternatives: Vec<String>,
    /// Applicability predicate (`{ has_decorator: Injectable }`).
    #[serde(default)]
    pub condition: Option<BTreeMap<String, ValueDto>>,
    /// Exemptions (`@intent:x`, `import:y`, `decorator:z`).
    #[serde(default)]
    pub unless: Vec<String>,
}

/// YAML representation of a canonical-implementation pattern.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternDto {
    /// Path of the canonical implementation.
    pub canonical: String,
    /// Keywords that identify the concern.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Example usage.
    #[serde(default)]
    pub usage: Option<String>,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
}
