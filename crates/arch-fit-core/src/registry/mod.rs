//! Architecture registry: YAML document, validated model, and resolver.
//!
//! The module follows a two-layer architecture:
//!
//! - **DTO layer** (`dto`): serde types for YAML deserialization
//! - **Domain layer** (`model`): validated types with no serde dependency
//!
//! The `loader` converts DTOs to domain models, and the `resolver` flattens
//! inheritance chains and mixins into per-architecture constraint sets.

pub mod dto;
pub mod loader;
pub mod model;
pub mod resolver;

pub use loader::{load_file, parse, RegistryLoadError};
pub use model::{
    ArchId, ArchitectureNode, Condition, ConditionClause, ConditionKind, Constraint,
    ConstraintValue, Exemption, Mixin, ModelError, PatternEntry, PatternRegistry, Pointer,
    Registry, Rule,
};
pub use resolver::{
    resolve, ConflictKind, FlattenedArchitecture, Resolution, ResolutionConflict, Resolver,
};
