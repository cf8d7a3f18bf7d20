//! AST walk that fills a [`SemanticModel`].

use arch_fit_core::annotations::extract_intents;
use arch_fit_core::semantic::{
    ClassInfo, ControlFlow, DecoratorInfo, ExportInfo, FunctionCall, FunctionInfo, ImportInfo,
    InterfaceInfo, MethodInfo, Mutation, Visibility,
};
use arch_fit_core::SemanticModel;
use proc_macro2::Span;
use quote::ToTokens;
use syn::spanned::Spanned;
use syn::visit::{self, Visit};
use syn::{
    Attribute, BinOp, Expr, ExprAssign, ExprBinary, ExprCall, ExprForLoop, ExprLoop,
    ExprMethodCall, ExprTry, ExprWhile, ImplItemFn, ItemConst, ItemEnum, ItemExternCrate, ItemFn,
    ItemImpl, ItemMod, ItemStatic, ItemStruct, ItemTrait, ItemType, ItemUse, Macro, Meta, Type,
    TypeParamBound, UseTree,
};

/// Walks `ast` and appends everything found to `model`.
pub(crate) fn collect(ast: &syn::File, model: &mut SemanticModel) {
    let mut visitor = ModelVisitor {
        model,
        functions: Vec::new(),
        impls: Vec::new(),
        flow: ControlFlow::default(),
    };
    visitor.visit_file(ast);
}

struct ModelVisitor<'m> {
    model: &'m mut SemanticModel,
    /// Names of the enclosing functions, innermost last.
    functions: Vec<String>,
    /// Self types of the enclosing `impl` blocks, innermost last, with
    /// whether the block implements a trait.
    impls: Vec<(String, bool)>,
    flow: ControlFlow,
}

fn line_of(span: Span) -> usize {
    span.start().line
}

fn column_of(span: Span) -> usize {
    span.start().column + 1
}

fn end_line_of(span: Span) -> usize {
    span.end().line
}

/// Token text with the spacing `proc_macro2` inserts around punctuation removed.
fn tidy(text: &str) -> String {
    text.replace(" :: ", "::")
        .replace(" ,", ",")
        .replace(" . ", ".")
        .replace("( ", "(")
        .replace(" )", ")")
        .replace(" !", "!")
}

fn path_text(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

/// Dotted rendering of an expression used as a call receiver or assignment target.
fn expr_text(expr: &Expr) -> String {
    match expr {
        Expr::Path(p) => path_text(&p.path),
        Expr::Field(f) => {
            let member = match &f.member {
                syn::Member::Named(ident) => ident.to_string(),
                syn::Member::Unnamed(index) => index.index.to_string(),
            };
            format!("{}.{member}", expr_text(&f.base))
        }
        Expr::MethodCall(m) => format!("{}.{}()", expr_text(&m.receiver), m.method),
        Expr::Call(c) => format!("{}()", expr_text(&c.func)),
        Expr::Paren(p) => expr_text(&p.expr),
        Expr::Reference(r) => expr_text(&r.expr),
        Expr::Unary(u) => expr_text(&u.expr),
        Expr::Try(t) => format!("{}?", expr_text(&t.expr)),
        Expr::Index(i) => format!("{}[]", expr_text(&i.expr)),
        other => tidy(&other.to_token_stream().to_string()).replace(' ', ""),
    }
}

fn visibility(vis: &syn::Visibility) -> Visibility {
    match vis {
        syn::Visibility::Public(_) => Visibility::Public,
        syn::Visibility::Restricted(_) => Visibility::Protected,
        syn::Visibility::Inherited => Visibility::Private,
    }
}

fn is_public(vis: &syn::Visibility) -> bool {
    matches!(vis, syn::Visibility::Public(_))
}

fn is_doc(attr: &Attribute) -> bool {
    attr.path().is_ident("doc")
}

fn decorators(attrs: &[Attribute]) -> Vec<DecoratorInfo> {
    attrs
        .iter()
        .filter(|a| !is_doc(a))
        .map(|attr| DecoratorInfo {
            name: path_text(attr.path()),
            arguments: match &attr.meta {
                Meta::List(list) => Some(tidy(&list.tokens.to_string())),
                Meta::NameValue(nv) => Some(tidy(&nv.value.to_token_stream().to_string())),
                Meta::Path(_) => None,
            },
            line: line_of(attr.span()),
        })
        .collect()
}

fn doc_text(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter(|a| is_doc(a))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(s),
                    ..
                }) => Some(s.value()),
                _ => None,
            },
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
        Type::Reference(r) => type_name(&r.elem),
        _ => None,
    }
}

/// Flattens a `use` tree into `(module, binding)` pairs.
///
/// Members of a group share the group's path as module; a plain path keeps
/// its full text (`use std::fs` is module `std::fs`).
fn flatten_use(
    tree: &UseTree,
    prefix: &mut Vec<String>,
    grouped: bool,
    out: &mut Vec<(String, String)>,
) {
    match tree {
        UseTree::Path(p) => {
            prefix.push(p.ident.to_string());
            flatten_use(&p.tree, prefix, false, out);
            prefix.pop();
        }
        UseTree::Name(n) => {
            let name = n.ident.to_string();
            out.push(leaf(prefix, &name, &name, grouped));
        }
        UseTree::Rename(r) => {
            out.push(leaf(prefix, &r.ident.to_string(), &r.rename.to_string(), grouped));
        }
        UseTree::Glob(_) => out.push((prefix.join("::"), "*".to_string())),
        UseTree::Group(g) => {
            for item in &g.items {
                flatten_use(item, prefix, true, out);
            }
        }
    }
}

fn leaf(prefix: &[String], name: &str, binding: &str, grouped: bool) -> (String, String) {
    if name == "self" {
        let module = prefix.join("::");
        let binding = prefix.last().cloned().unwrap_or_default();
        return (module, binding);
    }
    if grouped && !prefix.is_empty() {
        (prefix.join("::"), binding.to_string())
    } else if prefix.is_empty() {
        (name.to_string(), binding.to_string())
    } else {
        (format!("{}::{name}", prefix.join("::")), binding.to_string())
    }
}

impl ModelVisitor<'_> {
    fn export(&mut self, vis: &syn::Visibility, name: String, kind: &str, span: Span) {
        if is_public(vis) {
            self.model.exports.push(ExportInfo {
                name,
                kind: kind.to_string(),
                line: line_of(span),
            });
        }
    }

    /// Class entry for `name`, created on first sight (an `impl` may precede its type).
    fn class_mut(&mut self, name: &str, line: usize) -> &mut ClassInfo {
        let index = match self.model.classes.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.model.classes.push(ClassInfo {
                    name: name.to_string(),
                    line,
                    end_line: line,
                    ..ClassInfo::default()
                });
                self.model.classes.len() - 1
            }
        };
        &mut self.model.classes[index]
    }

    fn type_decl(
        &mut self,
        name: String,
        attrs: &[Attribute],
        vis: &syn::Visibility,
        keyword: Span,
        whole: Span,
        kind: &str,
    ) {
        let line = line_of(keyword);
        let class = self.class_mut(&name, line);
        class.line = line;
        class.end_line = end_line_of(whole);
        class.decorators = decorators(attrs);
        class.is_exported = is_public(vis);
        self.export(vis, name, kind, keyword);
    }

    fn record_call(
        &mut self,
        callee: String,
        receiver: Option<String>,
        method_name: String,
        argument_count: usize,
        span: Span,
    ) {
        self.model.function_calls.push(FunctionCall {
            callee,
            receiver,
            method_name,
            argument_count,
            control_flow: self.flow,
            enclosing_function: self.functions.last().cloned(),
            line: line_of(span),
            column: column_of(span),
        });
    }

    fn with_flow(&mut self, flow: ControlFlow, walk: impl FnOnce(&mut Self)) {
        let saved = self.flow;
        self.flow = flow;
        walk(self);
        self.flow = saved;
    }

    fn in_function(&mut self, name: String, walk: impl FnOnce(&mut Self)) {
        self.functions.push(name);
        let saved = std::mem::take(&mut self.flow);
        walk(self);
        self.flow = saved;
        self.functions.pop();
    }
}

impl<'ast> Visit<'ast> for ModelVisitor<'_> {
    fn visit_item_use(&mut self, node: &'ast ItemUse) {
        let mut pairs = Vec::new();
        flatten_use(&node.tree, &mut Vec::new(), false, &mut pairs);
        let span = node.use_token.span;
        let first = self.model.imports.len();
        for (module, binding) in pairs {
            if is_public(&node.vis) && binding != "*" {
                self.export(&node.vis, binding.clone(), "use", span);
            }
            if let Some(existing) = self.model.imports[first..]
                .iter_mut()
                .find(|i| i.module == module)
            {
                existing.bindings.push(binding);
                continue;
            }
            self.model.imports.push(ImportInfo {
                module,
                bindings: vec![binding],
                line: line_of(span),
                column: column_of(span),
                ..ImportInfo::default()
            });
        }
    }

    fn visit_item_extern_crate(&mut self, node: &'ast ItemExternCrate) {
        let name = node.ident.to_string();
        let binding = node
            .rename
            .as_ref()
            .map_or_else(|| name.clone(), |(_, rename)| rename.to_string());
        let span = node.extern_token.span;
        self.model.imports.push(ImportInfo {
            module: name,
            bindings: vec![binding],
            line: line_of(span),
            column: column_of(span),
            ..ImportInfo::default()
        });
    }

    fn visit_item_struct(&mut self, node: &'ast ItemStruct) {
        self.type_decl(
            node.ident.to_string(),
            &node.attrs,
            &node.vis,
            node.struct_token.span,
            node.span(),
            "struct",
        );
        visit::visit_item_struct(self, node);
    }

    fn visit_item_enum(&mut self, node: &'ast ItemEnum) {
        self.type_decl(
            node.ident.to_string(),
            &node.attrs,
            &node.vis,
            node.enum_token.span,
            node.span(),
            "enum",
        );
        visit::visit_item_enum(self, node);
    }

    fn visit_item_trait(&mut self, node: &'ast ItemTrait) {
        let extends = node
            .supertraits
            .iter()
            .filter_map(|bound| match bound {
                TypeParamBound::Trait(t) => t.path.segments.last().map(|s| s.ident.to_string()),
                _ => None,
            })
            .collect();
        let span = node.trait_token.span;
        self.model.interfaces.push(InterfaceInfo {
            name: node.ident.to_string(),
            extends,
            is_exported: is_public(&node.vis),
            line: line_of(span),
        });
        self.export(&node.vis, node.ident.to_string(), "trait", span);
        visit::visit_item_trait(self, node);
    }

    fn visit_item_impl(&mut self, node: &'ast ItemImpl) {
        let Some(name) = type_name(&node.self_ty) else {
            visit::visit_item_impl(self, node);
            return;
        };
        let trait_impl = node
            .trait_
            .as_ref()
            .and_then(|(_, path, _)| path.segments.last())
            .map(|s| s.ident.to_string());

        let line = line_of(node.impl_token.span);
        let class = self.class_mut(&name, line);
        if let Some(trait_name) = &trait_impl {
            if !class.implements.contains(trait_name) {
                class.implements.push(trait_name.clone());
            }
        }
        self.impls.push((name, trait_impl.is_some()));
        visit::visit_item_impl(self, node);
        self.impls.pop();
    }

    fn visit_impl_item_fn(&mut self, node: &'ast ImplItemFn) {
        let span = node.sig.fn_token.span;
        let method = MethodInfo {
            name: node.sig.ident.to_string(),
            visibility: if self.impls.last().is_some_and(|(_, of_trait)| *of_trait) {
                Visibility::Public
            } else {
                visibility(&node.vis)
            },
            is_static: node.sig.receiver().is_none(),
            is_async: node.sig.asyncness.is_some(),
            decorators: decorators(&node.attrs),
            intents: extract_intents(&doc_text(&node.attrs)),
            line: line_of(span),
            end_line: end_line_of(node.span()),
        };
        self.push_method(method);
        self.in_function(node.sig.ident.to_string(), |v| visit::visit_impl_item_fn(v, node));
    }

    fn visit_item_fn(&mut self, node: &'ast ItemFn) {
        let span = node.sig.fn_token.span;
        self.model.functions.push(FunctionInfo {
            name: node.sig.ident.to_string(),
            is_async: node.sig.asyncness.is_some(),
            is_generator: false,
            visibility: visibility(&node.vis),
            decorators: decorators(&node.attrs),
            intents: extract_intents(&doc_text(&node.attrs)),
            is_exported: is_public(&node.vis),
            line: line_of(span),
            end_line: end_line_of(node.span()),
        });
        self.export(&node.vis, node.sig.ident.to_string(), "fn", span);
        self.in_function(node.sig.ident.to_string(), |v| visit::visit_item_fn(v, node));
    }

    fn visit_item_const(&mut self, node: &'ast ItemConst) {
        self.export(&node.vis, node.ident.to_string(), "const", node.const_token.span);
        visit::visit_item_const(self, node);
    }

    fn visit_item_static(&mut self, node: &'ast ItemStatic) {
        self.export(&node.vis, node.ident.to_string(), "static", node.static_token.span);
        visit::visit_item_static(self, node);
    }

    fn visit_item_type(&mut self, node: &'ast ItemType) {
        self.export(&node.vis, node.ident.to_string(), "type", node.type_token.span);
        visit::visit_item_type(self, node);
    }

    fn visit_item_mod(&mut self, node: &'ast ItemMod) {
        self.export(&node.vis, node.ident.to_string(), "mod", node.mod_token.span);
        visit::visit_item_mod(self, node);
    }

    fn visit_expr_call(&mut self, node: &'ast ExprCall) {
        if let Expr::Path(p) = &*node.func {
            let callee = path_text(&p.path);
            let (receiver, method) = match callee.rsplit_once("::") {
                Some((receiver, method)) => (Some(receiver.to_string()), method.to_string()),
                None => (None, callee.clone()),
            };
            self.record_call(callee, receiver, method, node.args.len(), p.path.span());
        }
        visit::visit_expr_call(self, node);
    }

    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        let receiver = expr_text(&node.receiver);
        let method = node.method.to_string();
        self.record_call(
            format!("{receiver}.{method}"),
            Some(receiver),
            method,
            node.args.len(),
            node.method.span(),
        );
        visit::visit_expr_method_call(self, node);
    }

    fn visit_macro(&mut self, node: &'ast Macro) {
        let path = path_text(&node.path);
        let (receiver, method) = match path.rsplit_once("::") {
            Some((receiver, method)) => (Some(receiver.to_string()), format!("{method}!")),
            None => (None, format!("{path}!")),
        };
        self.record_call(format!("{path}!"), receiver, method, 0, node.path.span());
        visit::visit_macro(self, node);
    }

    fn visit_expr_try(&mut self, node: &'ast ExprTry) {
        let flow = ControlFlow {
            in_try: true,
            ..self.flow
        };
        self.with_flow(flow, |v| visit::visit_expr_try(v, node));
    }

    fn visit_expr_for_loop(&mut self, node: &'ast ExprForLoop) {
        self.visit_expr(&node.expr);
        let flow = ControlFlow {
            in_loop: true,
            ..self.flow
        };
        self.with_flow(flow, |v| v.visit_block(&node.body));
    }

    fn visit_expr_while(&mut self, node: &'ast ExprWhile) {
        let flow = ControlFlow {
            in_loop: true,
            ..self.flow
        };
        self.with_flow(flow, |v| visit::visit_expr_while(v, node));
    }

    fn visit_expr_loop(&mut self, node: &'ast ExprLoop) {
        let flow = ControlFlow {
            in_loop: true,
            ..self.flow
        };
        self.with_flow(flow, |v| visit::visit_expr_loop(v, node));
    }

    fn visit_expr_assign(&mut self, node: &'ast ExprAssign) {
        let span = node.left.span();
        self.model.mutations.push(Mutation::new(
            &expr_text(&node.left),
            "=",
            line_of(span),
            column_of(span),
        ));
        visit::visit_expr_assign(self, node);
    }

    fn visit_expr_binary(&mut self, node: &'ast ExprBinary) {
        if is_compound_assign(&node.op) {
            let span = node.left.span();
            self.model.mutations.push(Mutation::new(
                &expr_text(&node.left),
                &node.op.to_token_stream().to_string(),
                line_of(span),
                column_of(span),
            ));
        }
        visit::visit_expr_binary(self, node);
    }
}

impl ModelVisitor<'_> {
    fn push_method(&mut self, method: MethodInfo) {
        if let Some(class) = self.current_impl_class() {
            class.methods.push(method);
        }
    }

    /// Class of the innermost `impl` being walked.
    fn current_impl_class(&mut self) -> Option<&mut ClassInfo> {
        let (name, _) = self.impls.last()?;
        self.model.classes.iter_mut().find(|c| &c.name == name)
    }
}

fn is_compound_assign(op: &BinOp) -> bool {
    matches!(
        op,
        BinOp::AddAssign(_)
            | BinOp::SubAssign(_)
            | BinOp::MulAssign(_)
            | BinOp::DivAssign(_)
            | BinOp::RemAssign(_)
            | BinOp::BitXorAssign(_)
            | BinOp::BitAndAssign(_)
            | BinOp::BitOrAssign(_)
            | BinOp::ShlAssign(_)
            | BinOp::ShrAssign(_)
    )
}
