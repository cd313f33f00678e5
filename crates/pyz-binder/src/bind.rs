//! The binding pass.
//!
//! One walk over the parse tree that creates scopes, declares symbols,
//! records the accessed-symbol set, notes the module's import list, detects
//! the export filter, and marks statements that follow a terminal statement
//! as unreachable. The checker consumes the resulting `BinderInfo` and never
//! re-derives any of it.

use crate::scopes::{Scope, ScopeArena, ScopeId, ScopeKind, lookup_recursive};
use crate::symbols::{Declaration, Symbol, SymbolArena, SymbolFlags, SymbolId};
use indexmap::IndexMap;
use pyz_ast::{NodeArena, NodeId, NodeKind};
use pyz_common::{Diagnostic, DiagnosticSink, Rule, RuleLevels, Span};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

/// Host-supplied per-file configuration.
#[derive(Clone, Debug, Default)]
pub struct BinderOptions {
    pub path: String,
    /// Stub files relax unknown-type, unused-symbol and self/cls rules.
    pub is_stub_file: bool,
    /// Generated files suppress unused-import reporting.
    pub is_generated: bool,
    pub rule_levels: RuleLevels,
}

/// One top-level import, recorded for the duplicate-import audit.
#[derive(Clone, Debug)]
pub struct ImportRecord {
    pub node: NodeId,
    /// Module path for `import m`; the `from` module for from-imports.
    pub module: String,
    /// The imported symbol name for from-imports.
    pub symbol_name: Option<String>,
    pub alias: Option<String>,
    pub span: Span,
}

/// Everything the binder hands to the checker for one file.
#[derive(Debug)]
pub struct BinderInfo {
    pub scopes: ScopeArena,
    pub symbols: SymbolArena,
    /// Enclosing scope of every bound node.
    pub scope_of_node: FxHashMap<NodeId, ScopeId>,
    /// Symbols resolved at least once in load position.
    pub accessed: FxHashSet<SymbolId>,
    pub builtin_scope: ScopeId,
    pub module_scope: ScopeId,
    pub module_node: NodeId,
    pub imports: Vec<ImportRecord>,
    /// Class-definition node -> the scope of its suite.
    pub class_scopes: FxHashMap<NodeId, ScopeId>,
    /// Per class-definition node: members declared through `self`.
    pub instance_members: FxHashMap<NodeId, IndexMap<String, SymbolId>>,
    /// Statements that follow a terminal statement in their suite.
    pub unreachable: FxHashSet<NodeId>,
    pub options: BinderOptions,
}

impl BinderInfo {
    pub fn scope_of(&self, node: NodeId) -> ScopeId {
        self.scope_of_node
            .get(&node)
            .copied()
            .unwrap_or(self.module_scope)
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        self.symbols.get(id)
    }
}

/// Bind one module tree.
pub fn bind_module(
    arena: &NodeArena,
    module: NodeId,
    options: BinderOptions,
    sink: &DiagnosticSink,
) -> BinderInfo {
    let mut scopes = ScopeArena::new();
    let builtin_scope = scopes.add(Scope::new(ScopeKind::Builtin, None));
    let module_scope = scopes.add(Scope::new(ScopeKind::Module, Some(builtin_scope)));

    let mut binder = Binder {
        arena,
        scopes,
        symbols: SymbolArena::new(),
        scope_of_node: FxHashMap::default(),
        accessed: FxHashSet::default(),
        imports: Vec::new(),
        class_scopes: Vec::new(),
        instance_members: FxHashMap::default(),
        unreachable: FxHashSet::default(),
        global_redirects: FxHashMap::default(),
        method_self: Vec::new(),
        options,
        sink,
        builtin_scope,
        module_scope,
    };

    binder.scope_of_node.insert(module, module_scope);
    if let NodeKind::Module { body } = &arena.get(module).kind {
        binder.bind_suite(body, module_scope, true);
    } else {
        debug_assert!(false, "bind_module called on a non-module node");
    }
    debug!(
        scopes = binder.scopes.len(),
        symbols = binder.symbols.len(),
        "binding complete"
    );

    BinderInfo {
        scopes: binder.scopes,
        symbols: binder.symbols,
        scope_of_node: binder.scope_of_node,
        accessed: binder.accessed,
        builtin_scope,
        module_scope,
        module_node: module,
        imports: binder.imports,
        class_scopes: binder.class_scopes.into_iter().collect(),
        instance_members: binder.instance_members,
        unreachable: binder.unreachable,
        options: binder.options,
    }
}

struct Binder<'a> {
    arena: &'a NodeArena,
    scopes: ScopeArena,
    symbols: SymbolArena,
    scope_of_node: FxHashMap<NodeId, ScopeId>,
    accessed: FxHashSet<SymbolId>,
    imports: Vec<ImportRecord>,
    class_scopes: Vec<(NodeId, ScopeId)>,
    instance_members: FxHashMap<NodeId, IndexMap<String, SymbolId>>,
    unreachable: FxHashSet<NodeId>,
    /// `global`/`nonlocal` redirections: (declaring scope, name) -> target scope.
    global_redirects: FxHashMap<(ScopeId, String), ScopeId>,
    /// Stack of (class node, self parameter name) for method bodies.
    method_self: Vec<(NodeId, String)>,
    options: BinderOptions,
    sink: &'a DiagnosticSink,
    builtin_scope: ScopeId,
    module_scope: ScopeId,
}

impl<'a> Binder<'a> {
    fn report(&self, rule: Rule, message: String, span: Span) {
        if let Some(severity) = self.options.rule_levels.level_for(rule).severity() {
            self.sink
                .push(Diagnostic::new(severity, rule, message, span));
        }
    }

    fn mark(&mut self, node: NodeId, scope: ScopeId) {
        self.scope_of_node.insert(node, scope);
    }

    /// Declare `name` in `scope`, honouring `global`/`nonlocal` redirects.
    fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        declaration: Declaration,
        extra_flags: SymbolFlags,
    ) -> SymbolId {
        let target_scope = self
            .global_redirects
            .get(&(scope, name.to_string()))
            .copied()
            .unwrap_or(scope);

        let mut flags = extra_flags;
        if name.starts_with("__") && !name.ends_with("__") {
            flags |= SymbolFlags::PRIVATE_MEMBER;
        }
        if self.scopes.get(target_scope).kind == ScopeKind::Class {
            flags |= SymbolFlags::CLASS_MEMBER;
        }

        let id = match self.scopes.get(target_scope).lookup_local(name) {
            Some(id) => id,
            None => {
                let id = self.symbols.add(Symbol::new(name, flags));
                self.scopes
                    .get_mut(target_scope)
                    .table
                    .insert(name.to_string(), id);
                id
            }
        };
        self.symbols.get_mut(id).flags |= flags;
        self.symbols.get_mut(id).add_declaration(declaration);
        id
    }

    /// Bind a statement suite, marking statements after a terminal one as
    /// unreachable (they are still bound so the evaluator can warm caches on
    /// explicit queries).
    fn bind_suite(&mut self, body: &[NodeId], scope: ScopeId, is_module_level: bool) {
        let mut terminated = false;
        for &stmt in body {
            if terminated {
                self.unreachable.insert(stmt);
            }
            self.bind_stmt(stmt, scope, is_module_level);
            if matches!(
                self.arena.get(stmt).kind,
                NodeKind::Return { .. }
                    | NodeKind::Raise { .. }
                    | NodeKind::Break
                    | NodeKind::Continue
            ) {
                terminated = true;
            }
        }
    }

    fn bind_stmt(&mut self, stmt: NodeId, scope: ScopeId, is_module_level: bool) {
        self.mark(stmt, scope);
        let kind = self.arena.get(stmt).kind.clone();
        match kind {
            NodeKind::FunctionDef {
                ref name,
                name_span,
                ref params,
                return_annotation,
                ref decorators,
                ref body,
                ..
            } => {
                for &dec in decorators {
                    self.bind_expr(dec, scope);
                }
                let is_method = self.scopes.get(scope).kind == ScopeKind::Class;
                self.declare(
                    scope,
                    name,
                    Declaration::Function {
                        node: stmt,
                        is_method,
                        span: name_span,
                    },
                    SymbolFlags::empty(),
                );

                let function_scope = self.scopes.add(Scope::new(ScopeKind::Function, Some(scope)));
                // Annotations and defaults evaluate in the enclosing scope.
                let mut self_name = None;
                for (i, &param) in params.iter().enumerate() {
                    self.bind_parameter(param, function_scope, scope);
                    if i == 0 {
                        if let NodeKind::Parameter { name: Some(n), .. } = &self.arena.get(param).kind
                        {
                            self_name = Some(n.clone());
                        }
                    }
                }
                if let Some(ann) = return_annotation {
                    self.bind_expr(ann, scope);
                }

                let entered_method = if is_method {
                    if let (Some(self_name), Some(class_node)) =
                        (self_name, self.enclosing_class_node(scope))
                    {
                        self.method_self.push((class_node, self_name));
                        true
                    } else {
                        false
                    }
                } else {
                    false
                };
                self.bind_suite(body, function_scope, false);
                if entered_method {
                    self.method_self.pop();
                }
            }
            NodeKind::ClassDef {
                ref name,
                name_span,
                ref arguments,
                ref decorators,
                ref body,
            } => {
                for &dec in decorators {
                    self.bind_expr(dec, scope);
                }
                for arg in arguments {
                    self.bind_expr(arg.value, scope);
                }
                self.declare(
                    scope,
                    name,
                    Declaration::Class {
                        node: stmt,
                        span: name_span,
                    },
                    SymbolFlags::empty(),
                );
                let class_scope = self.scopes.add(Scope::new(ScopeKind::Class, Some(scope)));
                self.class_scopes.push((stmt, class_scope));
                self.bind_suite(body, class_scope, false);
            }
            NodeKind::Assign {
                ref targets,
                value,
            } => {
                self.bind_expr(value, scope);
                for &target in targets {
                    self.bind_target(target, scope, None, Some(value));
                }
                if is_module_level {
                    self.detect_dunder_all(&targets[..], value, scope);
                }
            }
            NodeKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                self.bind_expr(annotation, scope);
                if let Some(value) = value {
                    self.bind_expr(value, scope);
                }
                self.bind_target(target, scope, Some(annotation), value);
            }
            NodeKind::AugAssign { target, value, .. } => {
                // Augmented assignment reads then writes the target.
                self.bind_expr(target, scope);
                self.bind_expr(value, scope);
                self.bind_target(target, scope, None, Some(value));
            }
            NodeKind::For {
                target,
                iterable,
                ref body,
                ref orelse,
                ..
            } => {
                self.bind_expr(iterable, scope);
                self.bind_target(target, scope, None, None);
                self.bind_suite(body, scope, false);
                self.bind_suite(orelse, scope, false);
            }
            NodeKind::While {
                test,
                ref body,
                ref orelse,
            }
            | NodeKind::If {
                test,
                ref body,
                ref orelse,
            } => {
                self.bind_expr(test, scope);
                self.bind_suite(body, scope, false);
                self.bind_suite(orelse, scope, false);
            }
            NodeKind::With {
                ref items,
                ref body,
                ..
            } => {
                for item in items {
                    self.bind_expr(item.context, scope);
                    if let Some(target) = item.target {
                        self.bind_target(target, scope, None, Some(item.context));
                    }
                }
                self.bind_suite(body, scope, false);
            }
            NodeKind::Raise { exc, cause } => {
                if let Some(exc) = exc {
                    self.bind_expr(exc, scope);
                }
                if let Some(cause) = cause {
                    self.bind_expr(cause, scope);
                }
            }
            NodeKind::Try {
                ref body,
                ref handlers,
                ref orelse,
                ref finally,
            } => {
                self.bind_suite(body, scope, false);
                for &handler in handlers {
                    self.bind_stmt(handler, scope, false);
                }
                self.bind_suite(orelse, scope, false);
                self.bind_suite(finally, scope, false);
            }
            NodeKind::ExceptHandler {
                exc_type,
                ref name,
                name_span,
                ref body,
            } => {
                if let Some(exc_type) = exc_type {
                    self.bind_expr(exc_type, scope);
                }
                if let Some(name) = name {
                    self.declare(
                        scope,
                        name,
                        Declaration::Variable {
                            node: stmt,
                            type_annotation: None,
                            is_final: false,
                            inferred_source: exc_type,
                            span: name_span,
                        },
                        SymbolFlags::empty(),
                    );
                }
                self.bind_suite(body, scope, false);
            }
            NodeKind::Assert { test, message } => {
                self.bind_expr(test, scope);
                if let Some(message) = message {
                    self.bind_expr(message, scope);
                }
            }
            NodeKind::Import { ref names } => {
                for alias in names {
                    let bound_name = alias
                        .alias
                        .clone()
                        .unwrap_or_else(|| alias.name.split('.').next().unwrap_or("").to_string());
                    self.declare(
                        scope,
                        &bound_name,
                        Declaration::Alias {
                            node: stmt,
                            target: alias.name.clone(),
                            span: alias.span,
                        },
                        SymbolFlags::empty(),
                    );
                    if is_module_level {
                        self.imports.push(ImportRecord {
                            node: stmt,
                            module: alias.name.clone(),
                            symbol_name: None,
                            alias: alias.alias.clone(),
                            span: alias.span,
                        });
                    }
                }
            }
            NodeKind::ImportFrom {
                ref module,
                ref names,
            } => {
                for alias in names {
                    let bound_name = alias.alias.clone().unwrap_or_else(|| alias.name.clone());
                    self.declare(
                        scope,
                        &bound_name,
                        Declaration::Alias {
                            node: stmt,
                            target: format!("{module}.{}", alias.name),
                            span: alias.span,
                        },
                        SymbolFlags::empty(),
                    );
                    if is_module_level {
                        self.imports.push(ImportRecord {
                            node: stmt,
                            module: module.clone(),
                            symbol_name: Some(alias.name.clone()),
                            alias: alias.alias.clone(),
                            span: alias.span,
                        });
                    }
                }
            }
            NodeKind::ExprStmt { value } => self.bind_expr(value, scope),
            NodeKind::Return { value } => {
                if let Some(value) = value {
                    self.bind_expr(value, scope);
                }
            }
            NodeKind::Global { ref names } => {
                for name in names {
                    self.global_redirects
                        .insert((scope, name.clone()), self.module_scope);
                }
            }
            NodeKind::Nonlocal { ref names } => {
                if let Some(parent) = self.scopes.get(scope).parent {
                    if let Some(target) = self
                        .scopes
                        .enclosing_of_kind(parent, ScopeKind::Function)
                    {
                        for name in names {
                            self.global_redirects.insert((scope, name.clone()), target);
                        }
                    }
                }
            }
            NodeKind::Delete { ref targets } => {
                for &target in targets {
                    self.bind_expr(target, scope);
                }
            }
            NodeKind::Pass | NodeKind::Break | NodeKind::Continue => {}
            _ => {
                // Expression used in statement position by a host tree.
                self.bind_expr(stmt, scope);
            }
        }
    }

    fn bind_parameter(&mut self, param: NodeId, function_scope: ScopeId, outer_scope: ScopeId) {
        self.mark(param, function_scope);
        if let NodeKind::Parameter {
            name,
            name_span,
            annotation,
            default,
            ..
        } = &self.arena.get(param).kind
        {
            if let Some(ann) = annotation {
                self.bind_expr(*ann, outer_scope);
            }
            if let Some(default) = default {
                self.bind_expr(*default, outer_scope);
            }
            if let Some(name) = name {
                let is_final = annotation.is_some_and(|a| self.annotation_is_final(a));
                self.declare(
                    function_scope,
                    name,
                    Declaration::Parameter {
                        node: param,
                        is_final,
                        span: *name_span,
                    },
                    SymbolFlags::empty(),
                );
            }
        }
    }

    /// Declare assignment targets. Tuple/list targets distribute; member
    /// targets through the method's self parameter declare instance members.
    fn bind_target(
        &mut self,
        target: NodeId,
        scope: ScopeId,
        annotation: Option<NodeId>,
        value: Option<NodeId>,
    ) {
        self.mark(target, scope);
        let kind = self.arena.get(target).kind.clone();
        match kind {
            NodeKind::Name { ref id } => {
                let is_final = annotation.is_some_and(|a| self.annotation_is_final(a));
                let span = self.arena.span(target);
                self.declare(
                    scope,
                    id,
                    Declaration::Variable {
                        node: target,
                        type_annotation: annotation,
                        is_final,
                        inferred_source: value,
                        span,
                    },
                    SymbolFlags::INITIALLY_UNBOUND,
                );
            }
            NodeKind::TupleExpr { ref elements } | NodeKind::ListExpr { ref elements } => {
                for &element in elements {
                    self.bind_target(element, scope, None, None);
                }
            }
            NodeKind::Unpack { operand } => self.bind_target(operand, scope, None, None),
            NodeKind::MemberAccess {
                base,
                ref member,
                member_span,
            } => {
                self.bind_expr(base, scope);
                if let NodeKind::Name { id } = &self.arena.get(base).kind {
                    if let Some((class_node, self_name)) = self.method_self.last().cloned() {
                        if *id == self_name {
                            let is_final =
                                annotation.is_some_and(|a| self.annotation_is_final(a));
                            let mut flags = SymbolFlags::INSTANCE_MEMBER;
                            if member.starts_with("__") && !member.ends_with("__") {
                                flags |= SymbolFlags::PRIVATE_MEMBER;
                            }
                            let members =
                                self.instance_members.entry(class_node).or_default();
                            let symbol_id = match members.get(member) {
                                Some(&id) => id,
                                None => {
                                    let id = self.symbols.add(Symbol::new(member, flags));
                                    members.insert(member.clone(), id);
                                    id
                                }
                            };
                            self.symbols.get_mut(symbol_id).flags |= flags;
                            self.symbols.get_mut(symbol_id).add_declaration(
                                Declaration::Variable {
                                    node: target,
                                    type_annotation: annotation,
                                    is_final,
                                    inferred_source: value,
                                    span: member_span,
                                },
                            );
                        }
                    }
                }
            }
            NodeKind::Index { base, ref args } => {
                self.bind_expr(base, scope);
                for &arg in args {
                    self.bind_expr(arg, scope);
                }
            }
            _ => self.bind_expr(target, scope),
        }
    }

    fn bind_expr(&mut self, expr: NodeId, scope: ScopeId) {
        self.mark(expr, scope);
        let kind = self.arena.get(expr).kind.clone();
        match kind {
            NodeKind::Name { ref id } => {
                if let Some(result) = lookup_recursive(&self.scopes, &self.symbols, scope, id) {
                    self.accessed.insert(result.symbol);
                }
            }
            NodeKind::ComprehensionExpr { ref comp } => {
                let comp_scope = self
                    .scopes
                    .add(Scope::new(ScopeKind::Comprehension, Some(scope)));
                self.scope_of_node.insert(expr, comp_scope);
                // The first clause's iterable evaluates in the enclosing
                // scope; everything else inside the private scope.
                for (i, clause) in comp.clauses.iter().enumerate() {
                    let iter_scope = if i == 0 { scope } else { comp_scope };
                    self.bind_expr(clause.iterable, iter_scope);
                    self.bind_target(clause.target, comp_scope, None, None);
                    for &condition in &clause.conditions {
                        self.bind_expr(condition, comp_scope);
                    }
                }
                if let Some(key) = comp.key {
                    self.bind_expr(key, comp_scope);
                }
                self.bind_expr(comp.element, comp_scope);
            }
            NodeKind::Lambda { ref params, body } => {
                let lambda_scope = self.scopes.add(Scope::new(ScopeKind::Function, Some(scope)));
                self.scope_of_node.insert(expr, scope);
                for &param in params {
                    self.bind_parameter(param, lambda_scope, scope);
                }
                self.bind_expr(body, lambda_scope);
            }
            NodeKind::AssignmentExpr { target, value } => {
                self.bind_expr(value, scope);
                // Walrus targets bind in the nearest non-comprehension scope.
                let mut target_scope = scope;
                while self.scopes.get(target_scope).kind == ScopeKind::Comprehension {
                    match self.scopes.get(target_scope).parent {
                        Some(parent) => target_scope = parent,
                        None => break,
                    }
                }
                self.bind_target(target, target_scope, None, Some(value));
            }
            _ => {
                for child in self.arena.get(expr).kind.children() {
                    self.bind_expr(child, scope);
                }
            }
        }
    }

    fn annotation_is_final(&self, annotation: NodeId) -> bool {
        match &self.arena.get(annotation).kind {
            NodeKind::Name { id } => id == "Final",
            NodeKind::Index { base, .. } => {
                matches!(&self.arena.get(*base).kind, NodeKind::Name { id } if id == "Final")
            }
            _ => false,
        }
    }

    fn enclosing_class_node(&self, class_scope: ScopeId) -> Option<NodeId> {
        self.class_scopes
            .iter()
            .find(|(_, s)| *s == class_scope)
            .map(|(n, _)| *n)
    }

    fn detect_dunder_all(&mut self, targets: &[NodeId], value: NodeId, scope: ScopeId) {
        let Some(&target) = targets.first() else {
            return;
        };
        let NodeKind::Name { id } = &self.arena.get(target).kind else {
            return;
        };
        if id != "__all__" {
            return;
        }
        let names = match &self.arena.get(value).kind {
            NodeKind::ListExpr { elements } | NodeKind::TupleExpr { elements } => {
                let mut names = FxHashSet::default();
                for &element in elements {
                    match &self.arena.get(element).kind {
                        NodeKind::StringLiteral {
                            value, is_bytes: false, ..
                        } => {
                            names.insert(value.clone());
                        }
                        _ => {
                            self.report(
                                Rule::UnsupportedDunderAll,
                                "Operation on \"__all__\" is not supported, so exported symbol list may be incorrect".to_string(),
                                self.arena.span(element),
                            );
                            return;
                        }
                    }
                }
                names
            }
            _ => {
                self.report(
                    Rule::UnsupportedDunderAll,
                    "Operation on \"__all__\" is not supported, so exported symbol list may be incorrect".to_string(),
                    self.arena.span(value),
                );
                return;
            }
        };
        let module_scope = self
            .scopes
            .enclosing_of_kind(scope, ScopeKind::Module)
            .unwrap_or(self.module_scope);
        self.scopes.get_mut(module_scope).export_filter = Some(names);
    }
}
