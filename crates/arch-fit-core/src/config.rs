//! Configuration types for arch-fit.

use crate::types::Severity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File names searched for in the project root, in priority order.
pub const CONFIG_CANDIDATES: &[&str] = &["arch-fit.toml", ".arch-fit.toml"];

/// Top-level configuration for arch-fit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Registry location.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// File selection and untagged-file policy.
    #[serde(default)]
    pub files: FilesConfig,

    /// Override policy.
    #[serde(default)]
    pub overrides: OverrideConfig,

    /// Engine behaviour.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Result cache.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Layer boundaries.
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

impl Config {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Finds the first config candidate present in `root`.
    #[must_use]
    pub fn find_in(root: &Path) -> Option<PathBuf> {
        CONFIG_CANDIDATES
            .iter()
            .map(|name| root.join(name))
            .find(|p| p.is_file())
    }

    /// Loads the config found in `root`, or the default config when none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed.
    pub fn load_or_default(root: &Path) -> Result<Self, ConfigError> {
        match Self::find_in(root) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading config");
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Serializes back to TOML, used for the cache invalidation checksum.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

/// Registry location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Path of the registry YAML, relative to the project root.
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

/// File selection settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Include/exclude globs.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Untagged-file handling.
    #[serde(default)]
    pub untagged: UntaggedConfig,
}

/// Include/exclude globs for file discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Glob patterns to include (if empty, every supported file).
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Glob patterns to exclude.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Whether to respect .gitignore files.
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: default_exclude(),
            respect_gitignore: true,
        }
    }
}

/// What to do with files lacking an `@arch` tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UntaggedPolicy {
    /// Silently pass.
    Allow,
    /// Report a `missing_arch_tag` warning.
    #[default]
    Warn,
    /// Report a `missing_arch_tag` error.
    Deny,
}

/// Untagged-file settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UntaggedConfig {
    /// Policy to apply.
    #[serde(default)]
    pub policy: UntaggedPolicy,
}

/// Override policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideConfig {
    /// Fields every override must carry. `reason` is always required.
    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<String>,

    /// Maximum distance of `@expires` from today, in days.
    #[serde(default = "default_max_expiry_days")]
    pub max_expiry_days: i64,

    /// Warn when an override has no `@expires`.
    #[serde(default = "default_true")]
    pub warn_no_expiry: bool,

    /// Restore the target violation once an override has expired.
    #[serde(default = "default_true")]
    pub fail_on_expired_override: bool,

    /// Maximum overrides in a single file.
    #[serde(default = "default_max_overrides")]
    pub max_overrides_per_file: usize,
}

impl Default for OverrideConfig {
    fn default() -> Self {
        Self {
            required_fields: default_required_fields(),
            max_expiry_days: default_max_expiry_days(),
            warn_no_expiry: true,
            fail_on_expired_override: true,
            max_overrides_per_file: default_max_overrides(),
        }
    }
}

impl OverrideConfig {
    /// Returns true if `field` is required on every override.
    #[must_use]
    pub fn requires(&self, field: &str) -> bool {
        field == "reason" || self.required_fields.iter().any(|f| f == field)
    }
}

/// Policy for `forbid_*` constraints declared without a `why`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingWhyPolicy {
    /// Do nothing.
    #[default]
    Ignore,
    /// Report a warning.
    Warning,
    /// Report an error.
    Error,
}

impl MissingWhyPolicy {
    /// Severity to report with, or `None` for [`Self::Ignore`].
    #[must_use]
    pub fn severity(self) -> Option<Severity> {
        match self {
            Self::Ignore => None,
            Self::Warning => Some(Severity::Warning),
            Self::Error => Some(Severity::Error),
        }
    }
}

/// Engine behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Promote every warning to a violation.
    #[serde(default)]
    pub strict: bool,

    /// `missing_why` policy.
    #[serde(default)]
    pub missing_why: MissingWhyPolicy,

    /// Maximum number of files processed in parallel.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Dependent depth used to widen incremental runs.
    #[serde(default = "default_incremental_depth")]
    pub incremental_depth: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict: false,
            missing_why: MissingWhyPolicy::Ignore,
            concurrency: default_concurrency(),
            incremental_depth: default_incremental_depth(),
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether the cache is used at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache file, relative to the project root.
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_cache_path(),
        }
    }
}

/// A named layer and the layers it may import from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Layer name.
    pub name: String,
    /// Glob patterns of files belonging to the layer.
    pub paths: Vec<String>,
    /// Layers this layer may import. The layer itself is always allowed.
    #[serde(default)]
    pub can_import: Vec<String>,
}

fn default_registry_path() -> PathBuf {
    PathBuf::from(".arch/registry.yaml")
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".arch/cache/validation.json")
}

fn default_include() -> Vec<String> {
    Vec::new()
}

fn default_exclude() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/target/**".to_string(),
        "**/.git/**".to_string(),
    ]
}

fn default_required_fields() -> Vec<String> {
    vec!["reason".to_string()]
}

fn default_max_expiry_days() -> i64 {
    180
}

fn default_max_overrides() -> usize {
    5
}

fn default_concurrency() -> usize {
    8
}

fn default_incremental_depth() -> usize {
    2
}

fn default_true() -> bool {
    true
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Parse error in config file.
    #[error("Failed to parse config: {message}")]
    Parse {
        /// Parse error message.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.registry.path, PathBuf::from(".arch/registry.yaml"));
        assert_eq!(config.files.untagged.policy, UntaggedPolicy::Warn);
        assert_eq!(config.overrides.max_expiry_days, 180);
        assert_eq!(config.overrides.max_overrides_per_file, 5);
        assert!(config.overrides.fail_on_expired_override);
        assert_eq!(config.validation.incremental_depth, 2);
        assert!(config.cache.enabled);
        assert!(config.layers.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[registry]
path = "arch/registry.yaml"

[files.scan]
include = ["src/**"]
respect_gitignore = false

[files.untagged]
policy = "deny"

[overrides]
max_expiry_days = 30
required_fields = ["reason", "ticket"]

[validation]
strict = true
missing_why = "warning"

[[layers]]
name = "domain"
paths = ["src/domain/**"]
can_import = ["shared"]
"#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.registry.path, PathBuf::from("arch/registry.yaml"));
        assert_eq!(config.files.scan.include, vec!["src/**"]);
        assert!(!config.files.scan.respect_gitignore);
        assert!(config.files.scan.exclude.iter().any(|e| e.contains("node_modules")));
        assert_eq!(config.files.untagged.policy, UntaggedPolicy::Deny);
        assert_eq!(config.overrides.max_expiry_days, 30);
        assert!(config.overrides.requires("ticket"));
        assert!(config.validation.strict);
        assert_eq!(
            config.validation.missing_why.severity(),
            Some(Severity::Warning)
        );
        assert_eq!(config.layers[0].can_import, vec!["shared"]);
    }

    #[test]
    fn test_reason_always_required() {
        let config = OverrideConfig {
            required_fields: Vec::new(),
            ..OverrideConfig::default()
        };
        assert!(config.requires("reason"));
        assert!(!config.requires("ticket"));
    }

    #[test]
    fn test_invalid_policy_is_parse_error() {
        let err = Config::parse("[files.untagged]\npolicy = \"sometimes\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_or_default_finds_candidate() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load_or_default(dir.path()).unwrap(), Config::default());

        std::fs::write(
            dir.path().join(".arch-fit.toml"),
            "[validation]\nconcurrency = 2\n",
        )
        .unwrap();
        let config = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(config.validation.concurrency, 2);
    }
}
