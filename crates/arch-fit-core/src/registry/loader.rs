//! DTO → Domain model conversion with validation.

use crate::types::Severity;
use std::path::{Path, PathBuf};

use super::dto::{ConstraintDto, MixinDto, NodeDto, PatternDto, RegistryDto, ValueDto};
use super::model::{
    ArchId, ArchitectureNode, Condition, ConditionClause, Constraint, ConstraintValue, Exemption,
    Mixin, ModelError, PatternEntry, PatternRegistry, Pointer, Registry, Rule,
};

/// Errors while loading the registry document.
#[derive(Debug, thiserror::Error)]
pub enum RegistryLoadError {
    /// IO error reading the registry file.
    #[error("Failed to read registry {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// YAML syntax or shape error.
    #[error("Failed to parse registry: {message}")]
    Parse {
        /// Parse error message.
        message: String,
    },

    /// A field-level validation error.
    #[error("{context}: {source}")]
    Validation {
        /// Where the error occurred (e.g., "nodes.core.engine.constraints[0]").
        context: String,
        /// The underlying model error.
        source: ModelError,
    },

    /// Unknown severity string.
    #[error("{context}: unknown severity `{value}`, expected: error, warning")]
    UnknownSeverity {
        /// Where the error occurred.
        context: String,
        /// The invalid value.
        value: String,
    },
}

/// Reads and converts a registry YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn load_file(path: &Path) -> Result<Registry, RegistryLoadError> {
    let content = std::fs::read_to_string(path).map_err(|e| RegistryLoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let registry = parse(&content)?;
    tracing::debug!(
        path = %path.display(),
        nodes = registry.nodes.len(),
        mixins = registry.mixins.len(),
        "Loaded registry"
    );
    Ok(registry)
}

/// Parses and converts a registry YAML document.
///
/// # Errors
///
/// Returns an error if the YAML is invalid or fails validation.
pub fn parse(content: &str) -> Result<Registry, RegistryLoadError> {
    let dto: RegistryDto = serde_yaml::from_str(content).map_err(|e| RegistryLoadError::Parse {
        message: e.to_string(),
    })?;
    load(dto)
}

/// Converts a `RegistryDto` to a validated `Registry`.
///
/// Dangling `inherits` and mixin references are kept as-is; the resolver
/// reports them as conflicts.
///
/// # Errors
///
/// Returns the first error encountered during conversion.
pub fn load(dto: RegistryDto) -> Result<Registry, RegistryLoadError> {
    let nodes = dto
        .nodes
        .into_iter()
        .map(|(id, node)| convert_node(&id, node).map(|n| (id, n)))
        .collect::<Result<_, _>>()?;

    let mixins = dto
        .mixins
        .into_iter()
        .map(|(id, mixin)| convert_mixin(&id, mixin).map(|m| (id, m)))
        .collect::<Result<_, _>>()?;

    let patterns = dto
        .patterns
        .into_iter()
        .map(|(name, p)| convert_pattern(name, p))
        .collect();

    Ok(Registry {
        nodes,
        mixins,
        patterns: PatternRegistry::new(patterns),
    })
}

fn convert_node(id: &str, dto: NodeDto) -> Result<ArchitectureNode, RegistryLoadError> {
    let ctx = format!("nodes.{id}");
    let arch_id = ArchId::new(id).map_err(|e| RegistryLoadError::Validation {
        context: ctx.clone(),
        source: e,
    })?;
    let constraints = convert_constraints(&dto.constraints, id, &ctx)?;

    Ok(ArchitectureNode {
        id: arch_id,
        description: dto.description,
        rationale: dto.rationale,
        inherits: dto.inherits,
        mixins: dto.mixins,
        constraints,
        hints: dto.hints,
        pointers: dto
            .pointers
            .into_iter()
            .map(|p| Pointer {
                label: p.label,
                uri: p.uri,
            })
            .collect(),
        singleton: dto.singleton,
    })
}

fn convert_mixin(id: &str, dto: MixinDto) -> Result<Mixin, RegistryLoadError> {
    let ctx = format!("mixins.{id}");
    Ok(Mixin {
        id: id.to_string(),
        description: dto.description,
        constraints: convert_constraints(&dto.constraints, id, &ctx)?,
    })
}

fn convert_pattern(name: String, dto: PatternDto) -> PatternEntry {
    PatternEntry {
        name,
        canonical: dto.canonical,
        keywords: dto.keywords,
        usage: dto.usage,
        description: dto.description,
    }
}

fn convert_constraints(
    dtos: &[ConstraintDto],
    source: &str,
    ctx: &str,
) -> Result<Vec<Constraint>, RegistryLoadError> {
    dtos.iter()
        .enumerate()
        .map(|(i, c)| convert_constraint(c, source, &format!("{ctx}.constraints[{i}]")))
        .collect()
}

fn convert_constraint(
    dto: &ConstraintDto,
    source: &str,
    ctx: &str,
) -> Result<Constraint, RegistryLoadError> {
    let validation = |e: ModelError| RegistryLoadError::Validation {
        context: ctx.to_string(),
        source: e,
    };

    let rule: Rule = dto.rule.parse().map_err(validation)?;
    let value = convert_value(dto.value.as_ref());
    check_value_shape(rule, &value).map_err(validation)?;
    let severity = parse_severity(dto.severity.as_deref(), ctx)?;

    let condition = match &dto.condition {
        Some(map) => {
            let clauses = map
                .iter()
                .map(|(key, value)| {
                    let values = convert_value(Some(value))
                        .items()
                        .into_iter()
                        .map(String::from)
                        .collect();
                    ConditionClause::new(key, values)
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(validation)?;
            Some(Condition { clauses })
        }
        None => None,
    };

    Ok(Constraint {
        rule,
        value,
        severity,
        why: dto.why.clone(),
        alternative: dto.alternative.clone(),
        alternatives: dto.alternatives.clone(),
        condition,
        unless: dto.unless.iter().map(|u| Exemption::parse(u)).collect(),
        source: source.to_string(),
    })
}

fn convert_value(dto: Option<&ValueDto>) -> ConstraintValue {
    match dto {
        None => ConstraintValue::None,
        Some(ValueDto::Number(n)) => ConstraintValue::Number(*n),
        Some(ValueDto::Text(s)) => ConstraintValue::Text(s.clone()),
        Some(ValueDto::List(items)) => ConstraintValue::List(items.clone()),
    }
}

fn check_value_shape(rule: Rule, value: &ConstraintValue) -> Result<(), ModelError> {
    let expected = match rule {
        Rule::MaxFileLines | Rule::MaxPublicMethods => {
            if value.as_number().is_some() {
                return Ok(());
            }
            "a number"
        }
        Rule::ForbidCircularDeps | Rule::RequireTestFile => return Ok(()),
        _ => {
            if !value.items().is_empty() {
                return Ok(());
            }
            "a string or a list of strings"
        }
    };
    Err(ModelError::InvalidValue {
        rule: rule.as_str().to_string(),
        expected,
    })
}

fn parse_severity(s: Option<&str>, context: &str) -> Result<Severity, RegistryLoadError> {
    match s {
        None | Some("error") => Ok(Severity::Error),
        Some("warning" | "warn") => Ok(Severity::Warning),
        Some(other) => Err(RegistryLoadError::UnknownSeverity {
            context: context.to_string(),
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
nodes:
  base:
    description: Root architecture
    constraints:
      - { rule: forbid_pattern, value: "console\\.log", severity: warning, why: "use the logger" }
  core.engine:
    inherits: base
    mixins: [no-network]
    hints: ["keep pure"]
    pointers: [{ label: "ADR", uri: "docs/adr/001.md" }]
    constraints:
      - rule: forbid_import
        value: [axios, node-fetch]
        severity: error
        why: "engine must stay I/O free"
        alternative: "src/core/http"
        condition: { has_decorator: Injectable }
        unless: ["@intent:network-adapter"]
      - { rule: max_file_lines, value: 300 }
mixins:
  no-network:
    constraints:
      - { rule: forbid_import, value: [http, https] }
patterns:
  http-client:
    canonical: "src/core/http"
    keywords: [axios, fetch, http]
    usage: "import { http } from 'src/core/http'"
"#;

    #[test]
    fn loads_sample_registry() {
        let registry = parse(SAMPLE).unwrap();
        assert_eq!(registry.nodes.len(), 2);
        assert_eq!(registry.mixins.len(), 1);

        let engine = registry.node("core.engine").unwrap();
        assert_eq!(engine.inherits.as_deref(), Some("base"));
        assert_eq!(engine.mixins, vec!["no-network"]);
        assert_eq!(engine.pointers[0].label, "ADR");

        let forbid = &engine.constraints[0];
        assert_eq!(forbid.rule, Rule::ForbidImport);
        assert_eq!(forbid.value.items(), vec!["axios", "node-fetch"]);
        assert_eq!(forbid.severity, Severity::Error);
        assert_eq!(forbid.source, "core.engine");
        assert_eq!(forbid.unless, vec![Exemption::Intent("network-adapter".into())]);
        let condition = forbid.condition.as_ref().unwrap();
        assert_eq!(condition.clauses[0].values, vec!["Injectable"]);

        assert_eq!(engine.constraints[1].value.as_number(), Some(300));

        let base = registry.node("base").unwrap();
        assert_eq!(base.constraints[0].severity, Severity::Warning);
        assert_eq!(base.constraints[0].value.items(), vec!["console\\.log"]);

        let mixin = &registry.mixins["no-network"];
        assert_eq!(mixin.constraints[0].source, "no-network");
        assert!(registry.patterns.find_for("axios").is_some());
    }

    #[test]
    fn unknown_rule_is_error() {
        let err = parse("nodes:\n  a:\n    constraints:\n      - { rule: forbid_magic, value: x }\n")
            .unwrap_err();
        assert!(matches!(err, RegistryLoadError::Validation { .. }));
        assert!(err.to_string().contains("nodes.a.constraints[0]"));
    }

    #[test]
    fn unknown_severity_is_error() {
        let err = parse(
            "nodes:\n  a:\n    constraints:\n      - { rule: forbid_import, value: x, severity: fatal }\n",
        )
        .unwrap_err();
        assert!(matches!(err, RegistryLoadError::UnknownSeverity { .. }));
    }

    #[test]
    fn invalid_arch_id_is_error() {
        let err = parse("nodes:\n  \"bad id\": {}\n").unwrap_err();
        assert!(matches!(err, RegistryLoadError::Validation { .. }));
    }

    #[test]
    fn numeric_rule_requires_number() {
        let err = parse(
            "nodes:\n  a:\n    constraints:\n      - { rule: max_file_lines, value: lots }\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("expects a number"));
    }

    #[test]
    fn dangling_references_are_not_load_errors() {
        let registry = parse("nodes:\n  a:\n    inherits: ghost\n    mixins: [missing]\n").unwrap();
        assert_eq!(registry.node("a").unwrap().inherits.as_deref(), Some("ghost"));
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        assert!(matches!(
            parse("nodes: [unclosed"),
            Err(RegistryLoadError::Parse { .. })
        ));
    }

    #[test]
    fn load_file_reports_missing_file() {
        let err = load_file(Path::new("/no/such/registry.yaml")).unwrap_err();
        assert!(matches!(err, RegistryLoadError::Io { .. }));
    }
}
