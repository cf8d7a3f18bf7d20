//! # arch-fit
//!
//! Architectural fitness checks for multi-language codebases.
//!
//! This is the facade crate: it re-exports [`arch_fit_core`], wires the
//! Rust and Kotlin providers next to the built-in script provider, and runs
//! a whole project from its on-disk configuration.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use arch_fit::RunMode;
//!
//! let batch = arch_fit::run(".", RunMode::Incremental)?;
//! println!("{}", batch.format_report());
//! if batch.has_failures() {
//!     std::process::exit(1);
//! }
//! ```
//!
//! Configuration is read from `arch-fit.toml` (or `.arch-fit.toml`) at the
//! project root; the registry from `[registry] path`.

#![forbid(unsafe_code)]

pub use arch_fit_core::*;
pub use arch_fit_syn::RustProvider;
pub use arch_fit_ts::KotlinProvider;

mod runner;

pub use runner::{plan, run};

/// Script, Rust and Kotlin providers.
#[must_use]
pub fn default_providers() -> ProviderRegistry {
    ProviderRegistry::with_builtin()
        .with(RustProvider::new())
        .with(KotlinProvider::new())
}
