//! Line-scanning provider for JavaScript, TypeScript and Python.
//!
//! No full parser is involved: declarations, imports, calls and mutations are
//! recognised line by line, with brace depth (or indentation for Python) used
//! to track enclosing scopes. Good enough for architectural rules, and it
//! never fails on broken input.

use super::{
    ClassInfo, ControlFlow, DecoratorInfo, ExportInfo, FunctionCall, FunctionInfo, ImportInfo,
    InterfaceInfo, MethodInfo, Mutation, SemanticModel, SemanticModelProvider, Visibility,
};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::path::Path;
use std::sync::OnceLock;

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).unwrap_or_else(|e| panic!("regex: {e}")))
        }
    };
}

static_regex!(
    js_import_from,
    r#"^\s*import\s+(?:type\s+)?(.+?)\s+from\s+['"]([^'"]+)['"]"#
);
static_regex!(js_import_bare, r#"^\s*import\s+['"]([^'"]+)['"]"#);
static_regex!(
    js_reexport,
    r#"^\s*export\s+(?:type\s+)?(\*(?:\s+as\s+\w+)?|\{[^}]*\})\s+from\s+['"]([^'"]+)['"]"#
);
static_regex!(js_require, r#"require\(\s*['"]([^'"]+)['"]\s*\)"#);
static_regex!(js_dynamic_import, r#"import\(\s*['"]([^'"]+)['"]\s*\)"#);
static_regex!(
    js_class,
    r"^\s*(export\s+)?(default\s+)?(abstract\s+)?class\s+([A-Za-z_$][\w$]*)(?:\s+extends\s+([\w$.]+))?(?:\s+implements\s+([\w$.,\s]+?))?\s*(?:\{.*)?$"
);
static_regex!(
    js_interface,
    r"^\s*(export\s+)?interface\s+([A-Za-z_$][\w$]*)(?:\s+extends\s+([\w$.,\s]+?))?\s*(?:\{.*)?$"
);
static_regex!(
    js_function,
    r"^\s*(export\s+)?(default\s+)?(async\s+)?function\s*(\*)?\s*([A-Za-z_$][\w$]*)"
);
static_regex!(
    js_arrow,
    r"^\s*(export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=>"
);
static_regex!(
    js_method,
    r"^\s*((?:public|private|protected|static|async|readonly|override|get|set)\s+)*(#?[A-Za-z_$][\w$]*)\s*\([^)]*\)?\s*(?::[^{]*)?\{?\s*$"
);
static_regex!(
    js_export_decl,
    r"^\s*export\s+(default\s+)?(?:abstract\s+)?(?:async\s+)?(class|function\*?|const|let|var|interface|type|enum)\s+([A-Za-z_$][\w$]*)"
);
static_regex!(js_export_list, r"^\s*export\s*\{([^}]*)\}\s*;?\s*$");
static_regex!(js_export_default, r"^\s*export\s+default\s+([A-Za-z_$][\w$]*)");
static_regex!(py_import, r"^\s*import\s+([\w.]+(?:\s+as\s+\w+)?(?:\s*,\s*[\w.]+(?:\s+as\s+\w+)?)*)");
static_regex!(py_from_import, r"^\s*from\s+(\.*[\w.]*)\s+import\s+(.+)$");
static_regex!(py_class, r"^(\s*)class\s+(\w+)\s*(?:\((.*)\))?\s*:");
static_regex!(py_def, r"^(\s*)(async\s+)?def\s+(\w+)\s*\(");
static_regex!(decorator, r"^\s*@([A-Za-z_$][\w$.]*)\s*(?:\((.*)\))?\s*$");
static_regex!(
    call,
    r"([A-Za-z_$][\w$]*(?:\s*\??\.\s*[A-Za-z_$][\w$]*)*)\s*\("
);
static_regex!(
    assignment,
    r"^\s*([A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*)\s*(\+\+|--|[+\-*/%|&]?=)(?:[^=>]|$)"
);
static_regex!(delete_stmt, r"^\s*(?:delete|del)\s+([A-Za-z_$][\w$.]*)");
static_regex!(intent, r"@intent:([\w\-./]+)");

const CALL_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "function", "return", "typeof", "elif", "except",
    "def", "class", "with", "super", "await", "async", "import", "require", "not", "and", "or",
    "in", "constructor",
];

const METHOD_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "function", "else", "do", "try", "new",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Script,
    Python,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Class(usize),
    Method(usize, usize),
    Function(usize),
    Try,
    Catch,
    Loop,
    Block,
}

#[derive(Debug, Clone, Copy)]
struct Scope {
    kind: ScopeKind,
    indent: usize,
}

/// Best-effort provider for `.ts`, `.tsx`, `.js`, `.jsx`, `.mjs`, `.cjs` and `.py` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptProvider;

impl ScriptProvider {
    /// Creates a new script provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SemanticModelProvider for ScriptProvider {
    fn language_id(&self) -> &'static str {
        "script"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx", "js", "jsx", "mjs", "cjs", "py"]
    }

    fn parse(&self, path: &Path, content: &str) -> SemanticModel {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let (language, dialect) = match ext {
            "ts" | "tsx" => ("typescript", Dialect::Script),
            "py" => ("python", Dialect::Python),
            _ => ("javascript", Dialect::Script),
        };
        let mut scanner = Scanner::new(SemanticModel::new(path, language, content), dialect);
        scanner.scan(content);
        scanner.finish()
    }
}

struct Scanner {
    model: SemanticModel,
    dialect: Dialect,
    scopes: Vec<Scope>,
    pending_kind: Option<ScopeKind>,
    pending_decorators: Vec<DecoratorInfo>,
    pending_intents: Vec<String>,
    in_block_comment: bool,
    open_string: Option<Delimiter>,
    import_buffer: Option<(String, String, usize)>,
    last_code_line: usize,
}

impl Scanner {
    fn new(model: SemanticModel, dialect: Dialect) -> Self {
        Self {
            model,
            dialect,
            scopes: Vec::new(),
            pending_kind: None,
            pending_decorators: Vec::new(),
            pending_intents: Vec::new(),
            in_block_comment: false,
            open_string: None,
            import_buffer: None,
            last_code_line: 0,
        }
    }

    fn scan(&mut self, content: &str) {
        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let continued = self.open_string.is_some();
            if !continued && self.consume_comment(raw) {
                continue;
            }
            let masked = mask_line(raw, self.dialect, &mut self.open_string);
            if masked.text.trim().is_empty() {
                continue;
            }
            // Text of a string carried over from the previous line stays blank.
            let code = if masked.resumed_at == 0 {
                Cow::Borrowed(raw)
            } else {
                let at = masked.resumed_at;
                Cow::Owned(format!("{}{}", &masked.text[..at], &raw[at..]))
            };
            if self.dialect == Dialect::Python && !continued {
                self.close_python_scopes(indent_of(raw));
            }
            if self.buffer_import(&code, &masked.text, line_no) {
                continue;
            }
            self.scan_line(&code, &masked.text, line_no);
            self.last_code_line = line_no;
        }
    }

    fn finish(mut self) -> SemanticModel {
        let end = self.model.line_count.max(self.last_code_line);
        while let Some(scope) = self.scopes.pop() {
            self.close_scope(scope.kind, end);
        }
        self.model
    }

    /// Tracks comment lines and collects `@intent:` markers for the next declaration.
    fn consume_comment(&mut self, raw: &str) -> bool {
        let trimmed = raw.trim();
        if self.in_block_comment {
            self.collect_intents(trimmed);
            if trimmed.contains("*/") {
                self.in_block_comment = false;
            }
            return true;
        }
        let is_comment = match self.dialect {
            Dialect::Script => {
                if trimmed.starts_with("/*") {
                    self.in_block_comment = !trimmed.contains("*/");
                    true
                } else {
                    trimmed.starts_with("//")
                }
            }
            Dialect::Python => trimmed.starts_with('#'),
        };
        if is_comment {
            self.collect_intents(trimmed);
        }
        is_comment
    }

    fn collect_intents(&mut self, text: &str) {
        for cap in intent().captures_iter(text) {
            self.pending_intents.push(cap[1].to_string());
        }
    }

    /// Joins multi-line `import { ... } from 'x'` statements.
    ///
    /// The raw and masked texts are joined the same way so byte offsets keep matching.
    fn buffer_import(&mut self, raw: &str, masked: &str, line_no: usize) -> bool {
        if self.dialect != Dialect::Script {
            return false;
        }
        if let Some((mut text, mut masked_text, start)) = self.import_buffer.take() {
            text.push(' ');
            text.push_str(raw);
            masked_text.push(' ');
            masked_text.push_str(masked);
            if masked.contains('\'') || masked.contains('"') {
                self.scan_imports(&text, &masked_text, start);
            } else {
                self.import_buffer = Some((text, masked_text, start));
            }
            return true;
        }
        let trimmed = masked.trim_start();
        let opens_multiline = (trimmed.starts_with("import ") || trimmed.starts_with("export {"))
            && trimmed.contains('{')
            && !trimmed.contains('}');
        if opens_multiline {
            self.import_buffer = Some((raw.to_string(), masked.to_string(), line_no));
            return true;
        }
        false
    }

    fn scan_line(&mut self, raw: &str, masked: &str, line_no: usize) {
        if let Some(cap) = decorator().captures(masked) {
            self.pending_decorators.push(DecoratorInfo {
                name: group(raw, &cap, 1).to_string(),
                arguments: cap.get(2).map(|m| raw[m.range()].to_string()),
                line: line_no,
            });
            return;
        }

        self.scan_imports(raw, masked, line_no);
        self.scan_exports(raw, line_no);
        let declared = match self.dialect {
            Dialect::Script => self.scan_script_declaration(raw, masked, line_no),
            Dialect::Python => self.scan_python_declaration(raw, line_no),
        };

        let opened = match self.dialect {
            Dialect::Script => self.track_braces(masked, line_no),
            Dialect::Python => Vec::new(),
        };

        self.scan_calls(masked, line_no, declared.as_deref(), &opened);
        if declared.is_none() {
            self.scan_mutation(raw, line_no);
        }
        self.pending_decorators.clear();
        self.pending_intents.clear();
    }

    /// Imports are matched on `masked`; specifiers are read from `raw` at the same offsets.
    fn scan_imports(&mut self, raw: &str, masked: &str, line_no: usize) {
        let column = indent_of(raw) + 1;
        match self.dialect {
            Dialect::Script => {
                if let Some(cap) = js_import_from().captures(masked) {
                    let (default_binding, bindings) = parse_js_bindings(group(raw, &cap, 1));
                    self.model.imports.push(ImportInfo {
                        module: group(raw, &cap, 2).to_string(),
                        bindings,
                        default_binding,
                        is_dynamic: false,
                        line: line_no,
                        column,
                    });
                } else if let Some(cap) = js_import_bare().captures(masked) {
                    self.push_import(group(raw, &cap, 1), false, line_no, column);
                } else if let Some(cap) = js_reexport().captures(masked) {
                    let (_, bindings) = parse_js_bindings(group(raw, &cap, 1));
                    self.model.imports.push(ImportInfo {
                        module: group(raw, &cap, 2).to_string(),
                        bindings,
                        line: line_no,
                        column,
                        ..ImportInfo::default()
                    });
                }
                for cap in js_require().captures_iter(masked) {
                    self.push_import(group(raw, &cap, 1), false, line_no, column);
                }
                for cap in js_dynamic_import().captures_iter(masked) {
                    self.push_import(group(raw, &cap, 1), true, line_no, column);
                }
            }
            Dialect::Python => {
                if let Some(cap) = py_from_import().captures(masked) {
                    let bindings = group(raw, &cap, 2)
                        .trim_matches(|c| c == '(' || c == ')')
                        .split(',')
                        .map(|b| b.split_whitespace().next().unwrap_or_default().to_string())
                        .filter(|b| !b.is_empty())
                        .collect();
                    self.model.imports.push(ImportInfo {
                        module: group(raw, &cap, 1).to_string(),
                        bindings,
                        line: line_no,
                        column,
                        ..ImportInfo::default()
                    });
                } else if let Some(cap) = py_import().captures(masked) {
                    for module in group(raw, &cap, 1).split(',') {
                        if let Some(name) = module.split_whitespace().next() {
                            self.push_import(name, false, line_no, column);
                        }
                    }
                }
            }
        }
    }

    fn push_import(&mut self, module: &str, is_dynamic: bool, line: usize, column: usize) {
        self.model.imports.push(ImportInfo {
            module: module.to_string(),
            is_dynamic,
            line,
            column,
            ..ImportInfo::default()
        });
    }

    fn scan_exports(&mut self, line: &str, line_no: usize) {
        if self.dialect == Dialect::Python {
            return;
        }
        if let Some(cap) = js_export_decl().captures(line) {
            let name = if cap.get(1).is_some() {
                "default".to_string()
            } else {
                cap[3].to_string()
            };
            let kind = cap[2].trim_end_matches('*').to_string();
            self.model.exports.push(ExportInfo {
                name,
                kind,
                line: line_no,
            });
        } else if let Some(cap) = js_export_list().captures(line) {
            for item in cap[1].split(',') {
                let name = item.split_whitespace().last().unwrap_or_default();
                if !name.is_empty() {
                    self.model.exports.push(ExportInfo {
                        name: name.to_string(),
                        kind: "binding".to_string(),
                        line: line_no,
                    });
                }
            }
        } else if let Some(cap) = js_export_default().captures(line) {
            self.model.exports.push(ExportInfo {
                name: "default".to_string(),
                kind: cap[1].to_string(),
                line: line_no,
            });
        }
    }

    /// Returns the declared name when the line declares something.
    fn scan_script_declaration(
        &mut self,
        raw: &str,
        masked: &str,
        line_no: usize,
    ) -> Option<String> {
        let decorators = std::mem::take(&mut self.pending_decorators);
        let intents = std::mem::take(&mut self.pending_intents);

        if let Some(cap) = js_class().captures(raw) {
            let idx = self.model.classes.len();
            self.model.classes.push(ClassInfo {
                name: cap[4].to_string(),
                extends: cap.get(5).map(|m| m.as_str().to_string()),
                implements: split_names(cap.get(6).map_or("", |m| m.as_str())),
                inheritance_chain: cap.get(5).map(|m| m.as_str().to_string()).into_iter().collect(),
                decorators,
                is_exported: cap.get(1).is_some(),
                is_abstract: cap.get(3).is_some(),
                line: line_no,
                end_line: line_no,
                ..ClassInfo::default()
            });
            self.pending_kind = Some(ScopeKind::Class(idx));
            return Some(cap[4].to_string());
        }

        if let Some(cap) = js_interface().captures(raw) {
            self.model.interfaces.push(InterfaceInfo {
                name: cap[2].to_string(),
                extends: split_names(cap.get(3).map_or("", |m| m.as_str())),
                is_exported: cap.get(1).is_some(),
                line: line_no,
            });
            self.pending_kind = Some(ScopeKind::Block);
            return Some(cap[2].to_string());
        }

        if let Some((name, function)) = parse_js_function(raw, line_no) {
            let idx = self.model.functions.len();
            self.model.functions.push(FunctionInfo {
                decorators,
                intents,
                ..function
            });
            self.open_or_close(ScopeKind::Function(idx), masked, line_no);
            return Some(name);
        }

        if let Some(ScopeKind::Class(class_idx)) = self.innermost_declaration() {
            if let Some(cap) = js_method().captures(raw) {
                let name = cap[2].to_string();
                if !METHOD_KEYWORDS.contains(&name.as_str()) {
                    let modifiers = cap.get(1).map_or("", |m| m.as_str());
                    let method = MethodInfo {
                        visibility: js_visibility(modifiers, &name),
                        is_static: modifiers.contains("static"),
                        is_async: modifiers.contains("async"),
                        name: name.trim_start_matches('#').to_string(),
                        decorators,
                        intents,
                        line: line_no,
                        end_line: line_no,
                    };
                    let method_idx = self.model.classes[class_idx].methods.len();
                    self.model.classes[class_idx].methods.push(method);
                    self.open_or_close(ScopeKind::Method(class_idx, method_idx), masked, line_no);
                    return Some(name);
                }
            }
        }

        if let Some(kind) = flow_kind(raw.trim_start()) {
            self.pending_kind = Some(kind);
        }
        None
    }

    /// Sets the pending scope for a body that opens with `{`, or closes it on the spot.
    fn open_or_close(&mut self, kind: ScopeKind, masked: &str, line_no: usize) {
        let trimmed = masked.trim_end();
        let braceless = !masked.contains('{')
            && (trimmed.ends_with(';') || trimmed.contains("=>"));
        if braceless {
            self.close_scope(kind, line_no);
        } else {
            self.pending_kind = Some(kind);
        }
    }

    fn scan_python_declaration(&mut self, raw: &str, line_no: usize) -> Option<String> {
        let decorators = std::mem::take(&mut self.pending_decorators);
        let intents = std::mem::take(&mut self.pending_intents);
        let indent = indent_of(raw);

        if let Some(cap) = py_class().captures(raw) {
            let bases: Vec<String> = cap
                .get(3)
                .map_or("", |m| m.as_str())
                .split(',')
                .map(str::trim)
                .filter(|b| !b.is_empty() && !b.contains('='))
                .map(String::from)
                .collect();
            let name = cap[2].to_string();
            let idx = self.model.classes.len();
            self.model.classes.push(ClassInfo {
                name: name.clone(),
                extends: bases.first().cloned(),
                implements: bases.iter().skip(1).cloned().collect(),
                inheritance_chain: bases.first().cloned().into_iter().collect(),
                decorators,
                is_exported: indent == 0 && !name.starts_with('_'),
                line: line_no,
                end_line: line_no,
                ..ClassInfo::default()
            });
            if indent == 0 && !name.starts_with('_') {
                self.push_export(&name, "class", line_no);
            }
            self.scopes.push(Scope {
                kind: ScopeKind::Class(idx),
                indent,
            });
            return Some(name);
        }

        if let Some(cap) = py_def().captures(raw) {
            let name = cap[3].to_string();
            let is_async = cap.get(2).is_some();
            let kind = match self.scopes.last().map(|s| s.kind) {
                Some(ScopeKind::Class(class_idx)) => {
                    let class = &mut self.model.classes[class_idx];
                    let is_static = decorators
                        .iter()
                        .any(|d| d.name == "staticmethod" || d.name == "classmethod");
                    class.methods.push(MethodInfo {
                        name: name.clone(),
                        visibility: if name.starts_with('_') && !name.starts_with("__") {
                            Visibility::Private
                        } else {
                            Visibility::Public
                        },
                        is_static,
                        is_async,
                        decorators,
                        intents,
                        line: line_no,
                        end_line: line_no,
                    });
                    ScopeKind::Method(class_idx, class.methods.len() - 1)
                }
                _ => {
                    let exported = indent == 0 && !name.starts_with('_');
                    self.model.functions.push(FunctionInfo {
                        name: name.clone(),
                        is_async,
                        visibility: if name.starts_with('_') {
                            Visibility::Private
                        } else {
                            Visibility::Public
                        },
                        decorators,
                        intents,
                        is_exported: exported,
                        line: line_no,
                        end_line: line_no,
                        ..FunctionInfo::default()
                    });
                    if exported {
                        self.push_export(&name, "function", line_no);
                    }
                    ScopeKind::Function(self.model.functions.len() - 1)
                }
            };
            self.scopes.push(Scope { kind, indent });
            return Some(name);
        }

        let trimmed = raw.trim_start();
        if trimmed.ends_with(':') {
            if let Some(kind) = flow_kind(trimmed) {
                self.scopes.push(Scope { kind, indent });
            }
        }
        None
    }

    fn push_export(&mut self, name: &str, kind: &str, line: usize) {
        self.model.exports.push(ExportInfo {
            name: name.to_string(),
            kind: kind.to_string(),
            line,
        });
    }

    fn close_python_scopes(&mut self, indent: usize) {
        while let Some(scope) = self.scopes.last().copied() {
            if scope.indent < indent {
                break;
            }
            self.scopes.pop();
            self.close_scope(scope.kind, self.last_code_line);
        }
    }

    /// Applies the line's braces to the scope stack. Returns kinds opened on this line.
    fn track_braces(&mut self, masked: &str, line_no: usize) -> Vec<ScopeKind> {
        let mut opened = Vec::new();
        for ch in masked.chars() {
            match ch {
                '{' => {
                    let kind = self.pending_kind.take().unwrap_or(ScopeKind::Block);
                    opened.push(kind);
                    self.scopes.push(Scope { kind, indent: 0 });
                }
                '}' => {
                    if let Some(scope) = self.scopes.pop() {
                        self.close_scope(scope.kind, line_no);
                    }
                }
                _ => {}
            }
        }
        opened
    }

    fn close_scope(&mut self, kind: ScopeKind, end_line: usize) {
        match kind {
            ScopeKind::Class(idx) => {
                if let Some(class) = self.model.classes.get_mut(idx) {
                    class.end_line = end_line.max(class.line);
                }
            }
            ScopeKind::Method(class_idx, method_idx) => {
                if let Some(method) = self
                    .model
                    .classes
                    .get_mut(class_idx)
                    .and_then(|c| c.methods.get_mut(method_idx))
                {
                    method.end_line = end_line.max(method.line);
                }
            }
            ScopeKind::Function(idx) => {
                if let Some(function) = self.model.functions.get_mut(idx) {
                    function.end_line = end_line.max(function.line);
                }
            }
            ScopeKind::Try | ScopeKind::Catch | ScopeKind::Loop | ScopeKind::Block => {}
        }
    }

    fn innermost_declaration(&self) -> Option<ScopeKind> {
        self.scopes
            .iter()
            .rev()
            .map(|s| s.kind)
            .find(|k| {
                matches!(
                    k,
                    ScopeKind::Class(_) | ScopeKind::Method(..) | ScopeKind::Function(_)
                )
            })
    }

    fn enclosing_function(&self) -> Option<String> {
        match self.innermost_declaration()? {
            ScopeKind::Method(c, m) => Some(self.model.classes[c].methods[m].name.clone()),
            ScopeKind::Function(f) => Some(self.model.functions[f].name.clone()),
            _ => None,
        }
    }

    fn control_flow(&self, opened: &[ScopeKind]) -> ControlFlow {
        let mut flow = ControlFlow::default();
        for kind in self.scopes.iter().map(|s| s.kind).chain(opened.iter().copied()) {
            match kind {
                ScopeKind::Try => flow.in_try = true,
                ScopeKind::Catch => flow.in_catch = true,
                ScopeKind::Loop => flow.in_loop = true,
                _ => {}
            }
        }
        flow
    }

    fn scan_calls(
        &mut self,
        masked: &str,
        line_no: usize,
        declared: Option<&str>,
        opened: &[ScopeKind],
    ) {
        let control_flow = self.control_flow(opened);
        let enclosing_function = self.enclosing_function();
        let mut skip_declared = declared;

        for cap in call().captures_iter(masked) {
            let Some(m) = cap.get(1) else { continue };
            let callee: String = m
                .as_str()
                .replace("?.", ".")
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            let (receiver, method_name) = match callee.rsplit_once('.') {
                Some((recv, name)) => (Some(recv.to_string()), name.to_string()),
                None => (None, callee.clone()),
            };
            if receiver.is_none() && CALL_KEYWORDS.contains(&method_name.as_str()) {
                continue;
            }
            if skip_declared == Some(method_name.as_str()) {
                skip_declared = None;
                continue;
            }
            if masked[..m.start()].trim_end().ends_with("function") {
                continue;
            }
            self.model.function_calls.push(FunctionCall {
                argument_count: count_arguments(masked, &cap),
                callee,
                receiver,
                method_name,
                control_flow,
                enclosing_function: enclosing_function.clone(),
                line: line_no,
                column: m.start() + 1,
            });
        }
    }

    fn scan_mutation(&mut self, raw: &str, line_no: usize) {
        if let Some(cap) = delete_stmt().captures(raw) {
            let target = &cap[1];
            let column = cap.get(1).map_or(1, |m| m.start() + 1);
            self.model
                .mutations
                .push(Mutation::new(target, "delete", line_no, column));
            return;
        }
        if let Some(cap) = assignment().captures(raw) {
            let column = cap.get(1).map_or(1, |m| m.start() + 1);
            self.model
                .mutations
                .push(Mutation::new(&cap[1], &cap[2], line_no, column));
        }
    }
}

fn parse_js_function(raw: &str, line_no: usize) -> Option<(String, FunctionInfo)> {
    if let Some(cap) = js_function().captures(raw) {
        let name = cap[5].to_string();
        return Some((
            name.clone(),
            FunctionInfo {
                name,
                is_async: cap.get(3).is_some(),
                is_generator: cap.get(4).is_some(),
                is_exported: cap.get(1).is_some(),
                line: line_no,
                end_line: line_no,
                ..FunctionInfo::default()
            },
        ));
    }
    let cap = js_arrow().captures(raw)?;
    let name = cap[2].to_string();
    Some((
        name.clone(),
        FunctionInfo {
            name,
            is_async: cap.get(3).is_some(),
            is_exported: cap.get(1).is_some(),
            line: line_no,
            end_line: line_no,
            ..FunctionInfo::default()
        },
    ))
}

fn flow_kind(trimmed: &str) -> Option<ScopeKind> {
    let keyword = trimmed
        .trim_start_matches('}')
        .trim_start()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .next()
        .unwrap_or_default();
    match keyword {
        "try" => Some(ScopeKind::Try),
        "catch" | "except" | "finally" => Some(ScopeKind::Catch),
        "for" | "while" | "do" => Some(ScopeKind::Loop),
        _ => None,
    }
}

fn js_visibility(modifiers: &str, name: &str) -> Visibility {
    if modifiers.contains("private") || name.starts_with('#') {
        Visibility::Private
    } else if modifiers.contains("protected") {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

/// Splits `import X, { a, b as c }` binding clauses into default and named bindings.
fn parse_js_bindings(clause: &str) -> (Option<String>, Vec<String>) {
    let mut default_binding = None;
    let mut bindings = Vec::new();
    let (head, named) = match clause.find('{') {
        Some(start) => {
            let end = clause.rfind('}').unwrap_or(clause.len());
            (&clause[..start], clause.get(start + 1..end).unwrap_or_default())
        }
        None => (clause, ""),
    };
    for part in head.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(ns) = part.strip_prefix("* as ") {
            bindings.push(ns.trim().to_string());
        } else if part != "*" {
            default_binding = Some(part.to_string());
        }
    }
    for item in named.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let name = item.trim_start_matches("type ");
        let name = name.split(" as ").next().unwrap_or(name).trim();
        bindings.push(name.to_string());
    }
    (default_binding, bindings)
}

fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn count_arguments(masked: &str, cap: &Captures<'_>) -> usize {
    let Some(whole) = cap.get(0) else { return 0 };
    let rest = &masked[whole.end()..];
    let mut depth = 0usize;
    let mut commas = 0usize;
    let mut any = false;
    for ch in rest.chars() {
        match ch {
            '(' | '[' | '{' => {
                depth += 1;
                any = true;
            }
            ')' | ']' | '}' if depth == 0 => break,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => commas += 1,
            c if !c.is_whitespace() => any = true,
            _ => {}
        }
    }
    if any {
        commas + 1
    } else {
        0
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Text of capture group `i` taken from `raw`, which is byte-aligned with the matched text.
fn group<'a>(raw: &'a str, cap: &Captures<'_>, i: usize) -> &'a str {
    cap.get(i).and_then(|m| raw.get(m.range())).unwrap_or_default()
}

/// Quote of a string literal still open at the end of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Delimiter {
    quote: char,
    triple: bool,
}

impl Delimiter {
    fn spans_lines(self) -> bool {
        self.triple || self.quote == '`'
    }

    /// Byte width of the closing quote if `rest` starts with it.
    fn closes_at(self, rest: &str) -> Option<usize> {
        let width = if self.triple { 3 } else { 1 };
        rest.starts_with(&self.quote.to_string().repeat(width)).then_some(width)
    }
}

/// One line with string contents and trailing comments blanked.
struct MaskedLine {
    text: String,
    /// Byte offset just past the quote closing a string carried in from the previous line.
    resumed_at: usize,
}

/// Blanks out string literal contents and trailing comments, preserving byte offsets.
///
/// Template literals and Python triple-quoted strings stay open across lines
/// through `open`.
fn mask_line(line: &str, dialect: Dialect, open: &mut Option<Delimiter>) -> MaskedLine {
    let carried = open.is_some();
    let mut out = String::with_capacity(line.len());
    let mut resumed_at = 0;
    let mut escaped = false;
    let mut i = 0;
    while let Some(ch) = line[i..].chars().next() {
        let width = ch.len_utf8();
        if let Some(delim) = *open {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if let Some(close) = delim.closes_at(&line[i..]) {
                *open = None;
                out.push_str(&line[i..i + close]);
                i += close;
                if carried && resumed_at == 0 {
                    resumed_at = i;
                }
                continue;
            }
            out.push_str(&" ".repeat(width));
            i += width;
            continue;
        }
        let rest = &line[i..];
        let opens_triple =
            dialect == Dialect::Python && (rest.starts_with("\"\"\"") || rest.starts_with("'''"));
        match ch {
            '\'' | '"' if opens_triple => {
                *open = Some(Delimiter {
                    quote: ch,
                    triple: true,
                });
                out.push_str(&line[i..i + 3]);
                i += 3;
                continue;
            }
            '\'' | '"' => {
                *open = Some(Delimiter {
                    quote: ch,
                    triple: false,
                });
                out.push(ch);
            }
            '`' if dialect == Dialect::Script => {
                *open = Some(Delimiter {
                    quote: ch,
                    triple: false,
                });
                out.push(ch);
            }
            '/' if dialect == Dialect::Script && rest[1..].starts_with('/') => break,
            '#' if dialect == Dialect::Python => break,
            _ => out.push(ch),
        }
        i += width;
    }
    if open.is_some_and(|d| !d.spans_lines()) {
        *open = None;
    }
    MaskedLine {
        text: out,
        resumed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ts(src: &str) -> SemanticModel {
        ScriptProvider::new().parse(Path::new("src/a.ts"), src)
    }

    fn parse_py(src: &str) -> SemanticModel {
        ScriptProvider::new().parse(Path::new("app/a.py"), src)
    }

    #[test]
    fn extracts_default_and_named_imports() {
        let model = parse_ts(
            "import axios from 'axios';\nimport { a, b as c } from \"./util\";\nimport './side';\n",
        );
        assert_eq!(model.imports.len(), 3);
        assert_eq!(model.imports[0].module, "axios");
        assert_eq!(model.imports[0].default_binding.as_deref(), Some("axios"));
        assert_eq!(model.imports[1].bindings, vec!["a", "b"]);
        assert_eq!(model.imports[2].module, "./side");
        assert_eq!(model.imports[2].line, 3);
    }

    #[test]
    fn joins_multiline_imports() {
        let model = parse_ts("import {\n  one,\n  two,\n} from '@scope/pkg';\nconst x = 1;\n");
        assert_eq!(model.imports.len(), 1);
        assert_eq!(model.imports[0].module, "@scope/pkg");
        assert_eq!(model.imports[0].bindings, vec!["one", "two"]);
        assert_eq!(model.imports[0].line, 1);
    }

    #[test]
    fn import_text_inside_template_literal_is_not_an_import() {
        let model = parse_ts(
            "const tpl = `\nimport axios from 'axios';\nrequire('fs');\n`;\nimport { u } from './util';\n",
        );
        let modules: Vec<&str> = model.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["./util"]);
        assert_eq!(model.imports[0].line, 5);
    }

    #[test]
    fn require_inside_string_is_not_an_import() {
        let model =
            parse_ts("const doc = \"require('fs')\";\nconst s = \"é\"; const b = require('./b');\n");
        let modules: Vec<&str> = model.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["./b"]);
    }

    #[test]
    fn python_docstring_imports_are_ignored() {
        let src = "\
DOC = \"\"\"
import os
from app import secrets
\"\"\"
import sys

def run():
    '''
    import json
    '''
    return 1
";
        let model = parse_py(src);
        let modules: Vec<&str> = model.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["sys"]);
        assert_eq!(model.functions[0].name, "run");
        assert_eq!(model.functions[0].end_line, 11);
    }

    #[test]
    fn detects_require_and_dynamic_import() {
        let model = parse_ts("const fs = require('fs');\nconst m = await import('./lazy');\n");
        assert_eq!(model.imports.len(), 2);
        assert!(!model.imports[0].is_dynamic);
        assert!(model.imports[1].is_dynamic);
    }

    #[test]
    fn extracts_class_with_decorators_and_methods() {
        let src = "\
@Injectable()
export class UserService extends BaseService implements Auditable {
  private cache = new Map();

  async find(id: string): Promise<User> {
    return this.repo.get(id);
  }

  private helper() {
    return 1;
  }
}
";
        let model = parse_ts(src);
        assert_eq!(model.classes.len(), 1);
        let class = &model.classes[0];
        assert_eq!(class.name, "UserService");
        assert_eq!(class.extends.as_deref(), Some("BaseService"));
        assert_eq!(class.implements, vec!["Auditable"]);
        assert_eq!(class.decorators[0].name, "Injectable");
        assert!(class.is_exported);
        assert_eq!(class.methods.len(), 2);
        assert_eq!(class.methods[0].name, "find");
        assert!(class.methods[0].is_async);
        assert_eq!(class.methods[0].end_line, 7);
        assert_eq!(class.methods[1].visibility, Visibility::Private);
        assert_eq!(class.end_line, 12);
    }

    #[test]
    fn calls_carry_receiver_and_try_context() {
        let src = "\
function load() {
  try {
    http.get(url, opts);
  } catch (e) {
    logger.error(e);
  }
}
";
        let model = parse_ts(src);
        let get = model
            .function_calls
            .iter()
            .find(|c| c.method_name == "get")
            .unwrap();
        assert_eq!(get.receiver.as_deref(), Some("http"));
        assert_eq!(get.argument_count, 2);
        assert!(get.control_flow.in_try);
        assert_eq!(get.enclosing_function.as_deref(), Some("load"));

        let error = model
            .function_calls
            .iter()
            .find(|c| c.method_name == "error")
            .unwrap();
        assert!(error.control_flow.in_catch);
        assert!(!error.control_flow.in_try);
        assert_eq!(model.functions[0].end_line, 7);
    }

    #[test]
    fn calls_inside_strings_are_ignored() {
        let model = parse_ts("const s = 'fetch(x)';\n");
        assert!(model.function_calls.is_empty());
    }

    #[test]
    fn detects_mutations_and_deletes() {
        let model = parse_ts("window.location.href = '/';\ncount += 1;\ndelete cache.entry;\nif (a === b) {}\n");
        assert_eq!(model.mutations.len(), 3);
        assert_eq!(model.mutations[0].root_object, "window");
        assert_eq!(model.mutations[1].operator, "+=");
        assert!(model.mutations[2].is_delete);
    }

    #[test]
    fn function_intents_come_from_preceding_doc() {
        let src = "\
/**
 * @intent:debug-output
 */
export function dump() {
  console.log(state);
}
";
        let model = parse_ts(src);
        assert_eq!(model.functions[0].intents, vec!["debug-output"]);
        assert!(model.functions[0].is_exported);
        assert_eq!(model.intents_at_line(5), vec!["debug-output"]);
    }

    #[test]
    fn extracts_exports() {
        let model = parse_ts("export const a = 1;\nexport default class Foo {}\nexport { b, c as d };\n");
        let names: Vec<&str> = model.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "default", "b", "d"]);
    }

    #[test]
    fn arrow_functions_are_functions() {
        let model = parse_ts("export const handler = async (req) => {\n  return ok(req);\n};\n");
        assert_eq!(model.functions.len(), 1);
        assert!(model.functions[0].is_async);
        assert_eq!(model.functions[0].end_line, 3);
    }

    #[test]
    fn python_imports_classes_and_methods() {
        let src = "\
import os, sys
from app.core import engine, util as u

@dataclass
class Service(Base):
    def run(self):
        try:
            os.remove(path)
        except OSError:
            pass

    def _helper(self):
        return 1

def main():
    Service().run()
";
        let model = parse_py(src);
        assert_eq!(model.language, "python");
        let modules: Vec<&str> = model.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["os", "sys", "app.core"]);
        assert_eq!(model.imports[2].bindings, vec!["engine", "util"]);

        let class = &model.classes[0];
        assert_eq!(class.decorators[0].name, "dataclass");
        assert_eq!(class.extends.as_deref(), Some("Base"));
        assert_eq!(class.methods.len(), 2);
        assert_eq!(class.methods[1].visibility, Visibility::Private);
        assert_eq!(class.methods[0].end_line, 10);

        let remove = model
            .function_calls
            .iter()
            .find(|c| c.method_name == "remove")
            .unwrap();
        assert!(remove.control_flow.in_try);
        assert_eq!(remove.enclosing_function.as_deref(), Some("run"));

        assert_eq!(model.functions[0].name, "main");
        assert!(model.exports.iter().any(|e| e.name == "Service"));
    }

    #[test]
    fn broken_source_still_yields_model() {
        let model = parse_ts("class {{{ import from\n)))\n");
        assert_eq!(model.line_count, 2);
    }
}
