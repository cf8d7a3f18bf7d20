//! Language-agnostic semantic model and the provider extension point.
//!
//! A [`SemanticModelProvider`] turns one source file into a [`SemanticModel`].
//! Constraint validators only ever look at the model, never at a language AST,
//! so adding a language means implementing the trait and registering it in a
//! [`ProviderRegistry`].

mod script;

pub use script::ScriptProvider;

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An import statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportInfo {
    /// Module specifier as written (`axios`, `./util`, `std::fs`).
    pub module: String,
    /// Named bindings (`{ a, b }`, `use x::{a, b}`).
    pub bindings: Vec<String>,
    /// Default binding (`import axios from 'axios'`).
    pub default_binding: Option<String>,
    /// `import('x')` or `require('x')` style.
    pub is_dynamic: bool,
    /// Line number (1-indexed).
    pub line: usize,
    /// Column (1-indexed).
    pub column: usize,
}

/// A decorator, annotation or attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoratorInfo {
    /// Name without the leading `@`/`#[`.
    pub name: String,
    /// Raw argument text, if any.
    pub arguments: Option<String>,
    /// Line number (1-indexed).
    pub line: usize,
}

/// Member visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    /// Visible outside the declaring module.
    #[default]
    Public,
    /// Visible to subclasses or the enclosing crate.
    Protected,
    /// Visible only inside the declaration.
    Private,
}

/// A method declared in a class body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodInfo {
    /// Method name.
    pub name: String,
    /// Visibility.
    pub visibility: Visibility,
    /// Static / associated function without receiver.
    pub is_static: bool,
    /// Async method.
    pub is_async: bool,
    /// Decorators on the method.
    pub decorators: Vec<DecoratorInfo>,
    /// `@intent:` markers from the method's doc comment.
    pub intents: Vec<String>,
    /// First line (1-indexed).
    pub line: usize,
    /// Last line (1-indexed).
    pub end_line: usize,
}

/// A class-like declaration (class, struct, enum, object).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassInfo {
    /// Class name.
    pub name: String,
    /// Direct superclass.
    pub extends: Option<String>,
    /// Implemented interfaces/traits.
    pub implements: Vec<String>,
    /// Known superclass chain, nearest first.
    pub inheritance_chain: Vec<String>,
    /// Decorators on the class.
    pub decorators: Vec<DecoratorInfo>,
    /// Methods in the class body.
    pub methods: Vec<MethodInfo>,
    /// Exported from the module.
    pub is_exported: bool,
    /// Abstract class.
    pub is_abstract: bool,
    /// First line (1-indexed).
    pub line: usize,
    /// Last line (1-indexed).
    pub end_line: usize,
}

/// An interface/trait declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceInfo {
    /// Interface name.
    pub name: String,
    /// Extended interfaces.
    pub extends: Vec<String>,
    /// Exported from the module.
    pub is_exported: bool,
    /// Line number (1-indexed).
    pub line: usize,
}

/// A free function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionInfo {
    /// Function name.
    pub name: String,
    /// Async function.
    pub is_async: bool,
    /// Generator function.
    pub is_generator: bool,
    /// Visibility.
    pub visibility: Visibility,
    /// Decorators on the function.
    pub decorators: Vec<DecoratorInfo>,
    /// `@intent:` markers from the function's doc comment.
    pub intents: Vec<String>,
    /// Exported from the module.
    pub is_exported: bool,
    /// First line (1-indexed).
    pub line: usize,
    /// Last line (1-indexed).
    pub end_line: usize,
}

/// Control-flow context enclosing a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlFlow {
    /// Inside a `try` block (or a `?`-propagated expression).
    pub in_try: bool,
    /// Inside a `catch` handler.
    pub in_catch: bool,
    /// Inside a loop body.
    pub in_loop: bool,
}

/// A call expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionCall {
    /// Full callee text (`http.get`, `fs::read`).
    pub callee: String,
    /// Receiver for method calls (`http` in `http.get`).
    pub receiver: Option<String>,
    /// Last callee segment (`get`).
    pub method_name: String,
    /// Number of arguments.
    pub argument_count: usize,
    /// Enclosing control flow.
    pub control_flow: ControlFlow,
    /// Name of the enclosing function or method.
    pub enclosing_function: Option<String>,
    /// Line number (1-indexed).
    pub line: usize,
    /// Column (1-indexed).
    pub column: usize,
}

/// An assignment or deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mutation {
    /// Full target expression (`window.location.href`).
    pub target: String,
    /// First segment of the target (`window`).
    pub root_object: String,
    /// Remaining segments (`["location", "href"]`).
    pub property_path: Vec<String>,
    /// Operator text (`=`, `+=`, `delete`).
    pub operator: String,
    /// `delete x.y`.
    pub is_delete: bool,
    /// Line number (1-indexed).
    pub line: usize,
    /// Column (1-indexed).
    pub column: usize,
}

impl Mutation {
    /// Builds a mutation, splitting the target on `.`.
    #[must_use]
    pub fn new(target: &str, operator: &str, line: usize, column: usize) -> Self {
        let mut parts = target.split('.').map(str::trim);
        let root_object = parts.next().unwrap_or_default().to_string();
        Self {
            target: target.to_string(),
            root_object,
            property_path: parts.map(String::from).collect(),
            operator: operator.to_string(),
            is_delete: operator == "delete",
            line,
            column,
        }
    }
}

/// An exported symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportInfo {
    /// Exported name (`default` for default exports).
    pub name: String,
    /// Declaration kind (`class`, `function`, `const`, `struct`, ...).
    pub kind: String,
    /// Line number (1-indexed).
    pub line: usize,
}

/// One parsed source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SemanticModel {
    /// Path of the file (as passed to the provider).
    pub file_path: PathBuf,
    /// Language identifier.
    pub language: String,
    /// Raw content.
    pub content: String,
    /// Total number of lines.
    pub line_count: usize,
    /// Non-blank, non-comment lines.
    pub loc: usize,
    /// Imports.
    pub imports: Vec<ImportInfo>,
    /// Class-like declarations.
    pub classes: Vec<ClassInfo>,
    /// Interfaces/traits.
    pub interfaces: Vec<InterfaceInfo>,
    /// Free functions.
    pub functions: Vec<FunctionInfo>,
    /// Calls.
    pub function_calls: Vec<FunctionCall>,
    /// Assignments and deletions.
    pub mutations: Vec<Mutation>,
    /// Exports.
    pub exports: Vec<ExportInfo>,
    /// File-level `@intent:` markers.
    pub intents: Vec<String>,
}

impl SemanticModel {
    /// Creates a model with line metrics and file-level intents filled in.
    #[must_use]
    pub fn new(file_path: impl Into<PathBuf>, language: &str, content: &str) -> Self {
        let line_count = content.lines().count();
        let loc = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !is_comment_line(l))
            .count();
        let intents = crate::annotations::parse_file_annotations(content).intents;
        Self {
            file_path: file_path.into(),
            language: language.to_string(),
            content: content.to_string(),
            line_count,
            loc,
            intents,
            ..Self::default()
        }
    }

    /// Iterates over every class decorator.
    pub fn class_decorators(&self) -> impl Iterator<Item = &DecoratorInfo> {
        self.classes.iter().flat_map(|c| c.decorators.iter())
    }

    /// Iterates over every decorator in the file (classes, methods, functions).
    pub fn all_decorators(&self) -> impl Iterator<Item = &DecoratorInfo> {
        self.class_decorators()
            .chain(
                self.classes
                    .iter()
                    .flat_map(|c| c.methods.iter().flat_map(|m| m.decorators.iter())),
            )
            .chain(self.functions.iter().flat_map(|f| f.decorators.iter()))
    }

    /// Returns the intents of every function or method whose body contains `line`.
    #[must_use]
    pub fn intents_at_line(&self, line: usize) -> Vec<&str> {
        let functions = self
            .functions
            .iter()
            .filter(|f| f.line <= line && line <= f.end_line)
            .flat_map(|f| f.intents.iter());
        let methods = self
            .classes
            .iter()
            .flat_map(|c| c.methods.iter())
            .filter(|m| m.line <= line && line <= m.end_line)
            .flat_map(|m| m.intents.iter());
        functions.chain(methods).map(String::as_str).collect()
    }
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with("//")
        || line.starts_with("/*")
        || line.starts_with('*')
        || (line.starts_with('#') && !line.starts_with("#["))
}

/// Trait for language-specific semantic extraction.
///
/// Providers must not fail on syntactically invalid source: they return a
/// best-effort partial model instead.
pub trait SemanticModelProvider: Send + Sync {
    /// Language identifier (e.g., `"rust"`, `"kotlin"`).
    fn language_id(&self) -> &'static str;

    /// File extensions this provider handles, without the dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Parses one file.
    fn parse(&self, path: &Path, content: &str) -> SemanticModel;
}

/// Errors from [`ProviderRegistry::parse_file`].
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// File could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// Selects a provider by file extension.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn SemanticModelProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in script provider.
    #[must_use]
    pub fn with_builtin() -> Self {
        Self::new().with(ScriptProvider::new())
    }

    /// Registers a provider. Later registrations win for shared extensions.
    #[must_use]
    pub fn with(mut self, provider: impl SemanticModelProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Returns the provider for `path`, if any.
    #[must_use]
    pub fn for_path(&self, path: &Path) -> Option<&dyn SemanticModelProvider> {
        let ext = path.extension()?.to_str()?;
        self.providers
            .iter()
            .rev()
            .find(|p| p.extensions().contains(&ext))
            .map(AsRef::as_ref)
    }

    /// Returns every extension handled by a registered provider.
    #[must_use]
    pub fn extensions(&self) -> Vec<&'static str> {
        let mut exts: Vec<&'static str> = self
            .providers
            .iter()
            .flat_map(|p| p.extensions().iter().copied())
            .collect();
        exts.sort_unstable();
        exts.dedup();
        exts
    }

    /// Returns true if some provider handles `path`.
    #[must_use]
    pub fn supports(&self, path: &Path) -> bool {
        self.for_path(path).is_some()
    }

    /// Parses `content`, falling back to a text-only model for unknown extensions.
    #[must_use]
    pub fn parse(&self, path: &Path, content: &str) -> SemanticModel {
        match self.for_path(path) {
            Some(provider) => provider.parse(path, content),
            None => {
                tracing::debug!(path = %path.display(), "No provider, using text model");
                SemanticModel::new(path, "text", content)
            }
        }
    }

    /// Parses a file, reading it from disk when `content` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file has to be read and cannot be.
    pub fn parse_file(
        &self,
        path: &Path,
        content: Option<&str>,
    ) -> Result<SemanticModel, ProviderError> {
        match content {
            Some(content) => Ok(self.parse(path, content)),
            None => {
                let content = std::fs::read_to_string(path).map_err(|e| ProviderError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                Ok(self.parse(path, &content))
            }
        }
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field(
                "languages",
                &self.providers.iter().map(|p| p.language_id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_counts_lines_and_loc() {
        let model = SemanticModel::new("a.ts", "typescript", "// c\n\nconst a = 1;\nlet b = 2;\n");
        assert_eq!(model.line_count, 4);
        assert_eq!(model.loc, 2);
    }

    #[test]
    fn model_collects_file_intents() {
        let model = SemanticModel::new(
            "a.ts",
            "typescript",
            "/**\n * @arch core.engine\n * @intent:cli-output\n */\nconsole.log(1);\n",
        );
        assert_eq!(model.intents, vec!["cli-output"]);
    }

    #[test]
    fn intents_at_line_uses_function_ranges() {
        let mut model = SemanticModel::new("a.ts", "typescript", "");
        model.functions.push(FunctionInfo {
            name: "debug".into(),
            intents: vec!["debug-output".into()],
            line: 3,
            end_line: 6,
            ..FunctionInfo::default()
        });
        assert_eq!(model.intents_at_line(4), vec!["debug-output"]);
        assert!(model.intents_at_line(7).is_empty());
    }

    #[test]
    fn mutation_splits_target() {
        let m = Mutation::new("window.location.href", "=", 1, 1);
        assert_eq!(m.root_object, "window");
        assert_eq!(m.property_path, vec!["location", "href"]);
        assert!(!m.is_delete);
    }

    #[test]
    fn registry_falls_back_to_text_model() {
        let registry = ProviderRegistry::with_builtin();
        let model = registry.parse(Path::new("notes.md"), "# title\n");
        assert_eq!(model.language, "text");
        assert!(model.imports.is_empty());
        assert!(registry.supports(Path::new("a.ts")));
        assert!(!registry.supports(Path::new("notes.md")));
    }

    #[test]
    fn parse_file_reports_missing_file() {
        let registry = ProviderRegistry::with_builtin();
        let err = registry
            .parse_file(Path::new("/definitely/not/here.ts"), None)
            .unwrap_err();
        assert!(matches!(err, ProviderError::Io { .. }));
    }
}
