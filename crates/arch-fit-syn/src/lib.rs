//! # arch-fit-syn
//!
//! Semantic model provider for Rust sources, built on `syn`.
//!
//! The provider maps Rust items onto the language-neutral
//! [`SemanticModel`](arch_fit_core::SemanticModel):
//!
//! - `use` trees become imports (`use a::b::{c, d}` is module `a::b` with
//!   bindings `c` and `d`)
//! - structs and enums become classes; `impl` blocks contribute methods and
//!   implemented traits
//! - traits become interfaces
//! - attributes become decorators (`#[derive(Debug)]` is decorator `derive`
//!   with arguments `Debug`)
//! - `?` marks a call as running in a try context
//!
//! ## Example
//!
//! ```ignore
//! use arch_fit_core::ProviderRegistry;
//! use arch_fit_syn::RustProvider;
//!
//! let providers = ProviderRegistry::with_builtin().with(RustProvider::new());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod visitor;

use arch_fit_core::{SemanticModel, SemanticModelProvider};
use std::path::Path;
use tracing::debug;

/// Language identifier reported by [`RustProvider`].
pub const LANGUAGE: &str = "rust";

/// Parses `.rs` files with `syn`.
///
/// Files that fail to parse yield a model with line metrics and file-level
/// intents only.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustProvider;

impl RustProvider {
    /// Creates the provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SemanticModelProvider for RustProvider {
    fn language_id(&self) -> &'static str {
        LANGUAGE
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn parse(&self, path: &Path, content: &str) -> SemanticModel {
        let mut model = SemanticModel::new(path, LANGUAGE, content);
        match syn::parse_file(content) {
            Ok(ast) => visitor::collect(&ast, &mut model),
            Err(e) => debug!(
                path = %path.display(),
                line = e.span().start().line,
                error = %e,
                "Rust parse failed, using partial model"
            ),
        }
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arch_fit_core::semantic::Visibility;

    fn parse(content: &str) -> SemanticModel {
        RustProvider::new().parse(Path::new("src/lib.rs"), content)
    }

    #[test]
    fn use_trees_become_imports() {
        let model = parse(
            "use std::fs;\nuse crate::graph::{ImportGraph, normalize as norm};\nuse super::*;\nextern crate serde;\n",
        );
        let imports: Vec<(&str, Vec<&str>, usize)> = model
            .imports
            .iter()
            .map(|i| {
                (
                    i.module.as_str(),
                    i.bindings.iter().map(String::as_str).collect(),
                    i.line,
                )
            })
            .collect();
        assert_eq!(
            imports,
            vec![
                ("std::fs", vec!["fs"], 1),
                ("crate::graph", vec!["ImportGraph", "norm"], 2),
                ("super", vec!["*"], 3),
                ("serde", vec!["serde"], 4),
            ]
        );
    }

    #[test]
    fn structs_collect_impl_methods_and_traits() {
        let model = parse(
            r#"
#[derive(Debug, Clone)]
pub struct Cache {
    entries: Vec<u8>,
}

impl Cache {
    pub fn new() -> Self { Self { entries: Vec::new() } }
    pub fn len(&self) -> usize { self.entries.len() }
    fn grow(&mut self) {}
}

impl Default for Cache {
    fn default() -> Self { Self::new() }
}
"#,
        );
        let class = &model.classes[0];
        assert_eq!(class.name, "Cache");
        assert!(class.is_exported);
        assert_eq!(class.decorators[0].name, "derive");
        assert_eq!(class.decorators[0].arguments.as_deref(), Some("Debug, Clone"));
        assert_eq!(class.implements, vec!["Default"]);

        let methods: Vec<(&str, Visibility, bool)> = class
            .methods
            .iter()
            .map(|m| (m.name.as_str(), m.visibility, m.is_static))
            .collect();
        assert_eq!(
            methods,
            vec![
                ("new", Visibility::Public, true),
                ("len", Visibility::Public, false),
                ("grow", Visibility::Private, false),
                ("default", Visibility::Public, true),
            ]
        );
        assert_eq!(class.line, 3);
        assert_eq!(class.end_line, 5);
    }

    #[test]
    fn functions_calls_and_try_context() {
        let model = parse(
            r#"
/// Loads the file.
/// @intent:io-boundary
pub async fn load(path: &Path) -> io::Result<String> {
    let text = std::fs::read_to_string(path)?;
    for line in text.lines() {
        tracing::debug!("{line}");
    }
    Ok(text.trim().to_string())
}
"#,
        );
        let function = &model.functions[0];
        assert_eq!(function.name, "load");
        assert!(function.is_async);
        assert!(function.is_exported);
        assert_eq!(function.intents, vec!["io-boundary"]);

        let read = model
            .function_calls
            .iter()
            .find(|c| c.callee == "std::fs::read_to_string")
            .unwrap();
        assert_eq!(read.receiver.as_deref(), Some("std::fs"));
        assert_eq!(read.method_name, "read_to_string");
        assert!(read.control_flow.in_try);
        assert_eq!(read.enclosing_function.as_deref(), Some("load"));
        assert_eq!(read.line, 5);

        let debug = model
            .function_calls
            .iter()
            .find(|c| c.callee == "tracing::debug!")
            .unwrap();
        assert!(debug.control_flow.in_loop);
        assert!(!debug.control_flow.in_try);

        let trim = model.function_calls.iter().find(|c| c.method_name == "trim").unwrap();
        assert_eq!(trim.callee, "text.trim");
        assert_eq!(trim.receiver.as_deref(), Some("text"));
    }

    #[test]
    fn assignments_are_mutations() {
        let model = parse("fn bump(state: &mut State) {\n    state.count += 1;\n    state.name = String::new();\n}\n");
        let mutations: Vec<(&str, &str, &str)> = model
            .mutations
            .iter()
            .map(|m| (m.target.as_str(), m.root_object.as_str(), m.operator.as_str()))
            .collect();
        assert_eq!(
            mutations,
            vec![("state.count", "state", "+="), ("state.name", "state", "=")]
        );
    }

    #[test]
    fn public_items_are_exports() {
        let model = parse(
            "pub trait Store: Send + Sync {}\npub(crate) fn helper() {}\npub const LIMIT: usize = 3;\npub use crate::a::Thing;\nfn private() {}\n",
        );
        let exports: Vec<(&str, &str)> = model
            .exports
            .iter()
            .map(|e| (e.name.as_str(), e.kind.as_str()))
            .collect();
        assert_eq!(
            exports,
            vec![("Store", "trait"), ("LIMIT", "const"), ("Thing", "use")]
        );
        assert_eq!(model.interfaces[0].extends, vec!["Send", "Sync"]);
        assert_eq!(model.functions[0].visibility, Visibility::Protected);
        assert!(!model.functions[0].is_exported);
    }

    #[test]
    fn invalid_source_yields_partial_model() {
        let model = parse("//! @intent:draft\nfn broken( {\n");
        assert_eq!(model.language, "rust");
        assert_eq!(model.line_count, 2);
        assert_eq!(model.intents, vec!["draft"]);
        assert!(model.functions.is_empty());
    }
}
