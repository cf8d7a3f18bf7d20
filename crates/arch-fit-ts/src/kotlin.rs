//! Kotlin semantic model provider using Tree-sitter.

use arch_fit_core::semantic::{
    ClassInfo, DecoratorInfo, ExportInfo, FunctionCall, FunctionInfo, ImportInfo, InterfaceInfo,
    MethodInfo, Visibility,
};
use arch_fit_core::{SemanticModel, SemanticModelProvider};
use std::path::Path;
use tracing::debug;
use tree_sitter::{Language, Node, Parser};

/// Language identifier reported by [`KotlinProvider`].
pub const LANGUAGE: &str = "kotlin";

/// Extracts imports, classes, interfaces, objects, functions and calls from
/// Kotlin source.
pub struct KotlinProvider {
    language: Language,
}

impl std::fmt::Debug for KotlinProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KotlinProvider").finish_non_exhaustive()
    }
}

impl KotlinProvider {
    /// Creates a new Kotlin provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            language: tree_sitter_kotlin_ng::LANGUAGE.into(),
        }
    }
}

impl Default for KotlinProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticModelProvider for KotlinProvider {
    fn language_id(&self) -> &'static str {
        LANGUAGE
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["kt", "kts"]
    }

    fn parse(&self, path: &Path, content: &str) -> SemanticModel {
        let mut model = SemanticModel::new(path, LANGUAGE, content);
        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(&self.language) {
            debug!(error = %e, "Kotlin grammar unavailable, using partial model");
            return model;
        }
        let Some(tree) = parser.parse(content, None) else {
            debug!(path = %path.display(), "Kotlin parse failed, using partial model");
            return model;
        };

        let src = content.as_bytes();
        let root = tree.root_node();
        let mut cursor = root.walk();
        for node in root.children(&mut cursor) {
            match node.kind() {
                "import" => {
                    if let Some(import) = import_info(&node, src) {
                        model.imports.push(import);
                    }
                }
                "class_declaration" | "object_declaration" => declaration(&node, src, &mut model),
                "function_declaration" => {
                    if let Some(function) = function_info(&node, src) {
                        if function.is_exported {
                            model.exports.push(ExportInfo {
                                name: function.name.clone(),
                                kind: "fun".to_string(),
                                line: function.line,
                            });
                        }
                        model.functions.push(function);
                    }
                }
                _ => {}
            }
        }
        collect_calls(root, src, None, &mut model.function_calls);
        model
    }
}

fn text<'a>(node: &Node<'_>, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

fn line(node: &Node<'_>) -> usize {
    node.start_position().row + 1
}

fn end_line(node: &Node<'_>) -> usize {
    node.end_position().row + 1
}

fn child_of_kind<'t>(node: &Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn name_of(node: &Node<'_>, src: &[u8]) -> Option<String> {
    child_of_kind(node, "identifier").map(|n| text(&n, src).to_owned())
}

/// Join identifier children of a `qualified_identifier` node with dots.
fn qualified_id(node: &Node<'_>, src: &[u8]) -> String {
    let mut cursor = node.walk();
    let parts: Vec<&str> = node
        .children(&mut cursor)
        .filter(|c| c.kind() == "identifier")
        .map(|c| text(&c, src))
        .collect();
    parts.join(".")
}

fn import_info(node: &Node<'_>, src: &[u8]) -> Option<ImportInfo> {
    let path = qualified_id(&child_of_kind(node, "qualified_identifier")?, src);
    let wildcard = text(node, src).trim_end().ends_with('*');
    let binding = if wildcard {
        "*".to_string()
    } else {
        path.rsplit('.').next().unwrap_or(path.as_str()).to_string()
    };
    Some(ImportInfo {
        module: path,
        bindings: vec![binding],
        line: line(node),
        column: node.start_position().column + 1,
        ..ImportInfo::default()
    })
}

/// Modifier keywords and annotations of a declaration.
#[derive(Default)]
struct Modifiers {
    keywords: Vec<String>,
    annotations: Vec<DecoratorInfo>,
}

impl Modifiers {
    fn of(node: &Node<'_>, src: &[u8]) -> Self {
        let mut modifiers = Self::default();
        let Some(list) = child_of_kind(node, "modifiers") else {
            return modifiers;
        };
        let mut cursor = list.walk();
        for child in list.children(&mut cursor) {
            if child.kind() == "annotation" {
                modifiers.annotations.push(annotation(&child, src));
            } else {
                modifiers
                    .keywords
                    .extend(text(&child, src).split_whitespace().map(str::to_owned));
            }
        }
        modifiers
    }

    fn has(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k == keyword)
    }

    fn visibility(&self) -> Visibility {
        if self.has("private") {
            Visibility::Private
        } else if self.has("protected") || self.has("internal") {
            Visibility::Protected
        } else {
            Visibility::Public
        }
    }
}

/// `@Service("x")` becomes decorator `Service` with arguments `"x"`.
fn annotation(node: &Node<'_>, src: &[u8]) -> DecoratorInfo {
    let raw = text(node, src).trim_start_matches('@');
    let raw = match raw.split_once(':') {
        Some((target, rest)) if !target.contains('(') => rest,
        _ => raw,
    };
    let (name, arguments) = match raw.split_once('(') {
        Some((name, args)) => (name, Some(args.trim_end_matches(')').to_string())),
        None => (raw, None),
    };
    DecoratorInfo {
        name: name.trim().to_string(),
        arguments,
        line: line(node),
    }
}

/// Supertypes listed after `:`; the first entry with a constructor call is the superclass.
fn supertypes(node: &Node<'_>, src: &[u8]) -> (Option<String>, Vec<String>) {
    let Some(list) = child_of_kind(node, "delegation_specifiers") else {
        return (None, Vec::new());
    };
    let mut extends = None;
    let mut implements = Vec::new();
    let mut cursor = list.walk();
    for spec in list.children(&mut cursor).filter(|c| c.is_named()) {
        let raw = text(&spec, src).trim();
        let is_call = raw.contains('(');
        let name = raw
            .split(['(', '<', ' '])
            .next()
            .unwrap_or(raw)
            .to_string();
        if name.is_empty() {
            continue;
        }
        if is_call && extends.is_none() {
            extends = Some(name);
        } else {
            implements.push(name);
        }
    }
    (extends, implements)
}

fn declaration(node: &Node<'_>, src: &[u8], model: &mut SemanticModel) {
    let Some(name) = name_of(node, src) else {
        return;
    };
    let modifiers = Modifiers::of(node, src);
    let exported = modifiers.visibility() == Visibility::Public;
    let is_interface =
        node.kind() == "class_declaration" && child_of_kind(node, "interface").is_some();
    let (extends, implements) = supertypes(node, src);

    if is_interface {
        model.interfaces.push(InterfaceInfo {
            name: name.clone(),
            extends: extends.into_iter().chain(implements).collect(),
            is_exported: exported,
            line: line(node),
        });
    } else {
        model.classes.push(ClassInfo {
            name: name.clone(),
            extends,
            implements,
            decorators: modifiers.annotations.clone(),
            methods: methods(node, src),
            is_exported: exported,
            is_abstract: modifiers.has("abstract"),
            line: line(node),
            end_line: end_line(node),
            ..ClassInfo::default()
        });
    }

    if exported {
        let kind = if is_interface {
            "interface"
        } else if node.kind() == "object_declaration" {
            "object"
        } else {
            "class"
        };
        model.exports.push(ExportInfo {
            name,
            kind: kind.to_string(),
            line: line(node),
        });
    }
}

fn methods(node: &Node<'_>, src: &[u8]) -> Vec<MethodInfo> {
    let body = child_of_kind(node, "class_body").or_else(|| child_of_kind(node, "enum_class_body"));
    let Some(body) = body else {
        return Vec::new();
    };
    let mut cursor = body.walk();
    let mut found = Vec::new();
    for member in body.children(&mut cursor) {
        if member.kind() == "function_declaration" {
            if let Some(function) = function_info(&member, src) {
                found.push(MethodInfo {
                    name: function.name,
                    visibility: function.visibility,
                    is_static: false,
                    is_async: function.is_async,
                    decorators: function.decorators,
                    intents: Vec::new(),
                    line: function.line,
                    end_line: function.end_line,
                });
            }
        } else if member.kind() == "companion_object" {
            found.extend(methods(&member, src).into_iter().map(|mut m| {
                m.is_static = true;
                m
            }));
        }
    }
    found
}

fn function_info(node: &Node<'_>, src: &[u8]) -> Option<FunctionInfo> {
    let name = name_of(node, src)?;
    let modifiers = Modifiers::of(node, src);
    let visibility = modifiers.visibility();
    Some(FunctionInfo {
        name,
        is_async: modifiers.has("suspend"),
        is_generator: false,
        visibility,
        decorators: modifiers.annotations,
        intents: Vec::new(),
        is_exported: visibility == Visibility::Public,
        line: line(node),
        end_line: end_line(node),
    })
}

/// Records every `call_expression`, tracking the enclosing function.
fn collect_calls(
    node: Node<'_>,
    src: &[u8],
    function: Option<&str>,
    out: &mut Vec<FunctionCall>,
) {
    let own_name;
    let function = if node.kind() == "function_declaration" {
        own_name = name_of(&node, src);
        own_name.as_deref().or(function)
    } else {
        function
    };

    if node.kind() == "call_expression" {
        if let Some(callee) = node.named_child(0) {
            let callee_text: String = text(&callee, src).split_whitespace().collect();
            let (receiver, method) = match callee_text.rsplit_once('.') {
                Some((receiver, method)) => (Some(receiver.to_string()), method.to_string()),
                None => (None, callee_text.clone()),
            };
            let argument_count = child_of_kind(&node, "value_arguments").map_or(0, |args| {
                let mut cursor = args.walk();
                let count = args
                    .children(&mut cursor)
                    .filter(|c| c.kind() == "value_argument")
                    .count();
                count
            });
            out.push(FunctionCall {
                callee: callee_text,
                receiver,
                method_name: method,
                argument_count,
                enclosing_function: function.map(str::to_string),
                line: line(&node),
                column: node.start_position().column + 1,
                ..FunctionCall::default()
            });
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(child, src, function, out);
    }
}
