//! # arch-fit-core
//!
//! Architectural fitness engine.
//!
//! Source files declare an architecture with an `@arch <id>` tag. Each id is
//! defined in a YAML registry with inheritance, mixins and typed constraints.
//! This crate provides:
//!
//! - [`registry`]: loading the registry and flattening ids into effective
//!   constraint sets
//! - [`constraints`]: one validator per rule
//! - [`ValidationEngine`] for per-file and batch validation with overrides,
//!   singleton and layer checks
//! - [`ValidationCache`] for checksum-based incremental runs
//! - [`ImportGraph`] for importer lookups, dependents and cycles
//! - [`validate_plan`] for checking proposed changes before they are written
//!
//! Language front ends implement [`SemanticModelProvider`]; a regex-based
//! provider for TypeScript, JavaScript and Python ships with this crate.
//!
//! ## Example
//!
//! ```ignore
//! use arch_fit_core::{registry, Config, ValidationEngine};
//!
//! let config = Config::load_or_default(".")?;
//! let engine = ValidationEngine::builder()
//!     .root(".")
//!     .registry(registry::load_file(&config.registry.path)?)
//!     .config(config)
//!     .build()?;
//!
//! let batch = engine.validate_files(&files)?;
//! println!("{}", batch.format_report());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod annotations;
pub mod cache;
pub mod config;
pub mod constraints;
mod engine;
pub mod files;
pub mod graph;
mod layers;
pub mod plan;
pub mod registry;
pub mod semantic;
mod types;

pub use cache::{ChangeDetector, ValidationCache};
pub use config::{Config, ConfigError};
pub use engine::{EngineBuilder, EngineError, RunMode, ValidationEngine};
pub use files::{discover_files, DiscoveryError};
pub use graph::{ContentCache, ImportGraph};
pub use layers::LayerMap;
pub use plan::{validate_plan, ChangeKind, Plan, PlanResult, PlannedChange};
pub use registry::{Registry, Resolver};
pub use semantic::{ProviderRegistry, ScriptProvider, SemanticModel, SemanticModelProvider};
pub use types::{
    ActiveOverride, BatchResult, BatchSummary, EngineRule, Location, Severity, Suggestion,
    ValidationResult, ValidationStatus, Violation,
};
