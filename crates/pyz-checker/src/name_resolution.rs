//! Name resolution and symbol-type computation.

use crate::state::{CheckerState, EvalUsage};
use pyz_ast::{NodeId, NodeKind};
use pyz_binder::{Declaration, LookupResult, SymbolId, lookup_recursive};
use pyz_common::Rule;
use pyz_solver::{
    FunctionFlags, ModuleType, OverloadedFunctionType, Type, strip_literal_value,
};
use std::sync::Arc;

/// Modules the synthesised registry stands in for; importing from them
/// resolves against the builtin scope instead of a stub file.
const KNOWN_MODULES: &[&str] = &["typing", "typing_extensions", "dataclasses", "abc", "builtins", "collections"];

pub(crate) fn is_known_module(module: &str) -> bool {
    KNOWN_MODULES.contains(&module)
}

impl<'a> CheckerState<'a> {
    pub(crate) fn evaluate_name(&mut self, node: NodeId, id: &str, usage: EvalUsage) -> Type {
        let scope = self.binder.scope_of(node);
        let Some(result) = lookup_recursive(&self.binder.scopes, &self.binder.symbols, scope, id)
        else {
            if usage == EvalUsage::Get {
                self.report(
                    Rule::UndefinedVariable,
                    self.arena.span(node),
                    format!("\"{id}\" is not defined"),
                );
            }
            return Type::Unknown;
        };

        self.check_possibly_unbound(node, id, usage, &result);

        let mut t = self.type_of_symbol(result.symbol);

        // Flow-sensitive narrowing applies only inside the execution scope.
        if !result.is_beyond_execution_scope {
            t = self.apply_matching_constraints(node, t);
        }

        // A bare generic class reference outside callee/subscript position
        // specialises implicitly with Any.
        if let Type::Class(class) = &t {
            if class.type_arguments.is_none()
                && !class.details.type_parameters().is_empty()
                && !self.in_no_specialize_position(node)
            {
                t = Type::Class(class.clone_for_specialization(vec![]));
            }
        }
        t
    }

    fn in_no_specialize_position(&self, node: NodeId) -> bool {
        let Some(parent) = self.arena.parent(node) else {
            return false;
        };
        match &self.arena.get(parent).kind {
            NodeKind::Call { callee, .. } => *callee == node,
            NodeKind::Index { base, .. } => *base == node,
            _ => false,
        }
    }

    fn check_possibly_unbound(
        &mut self,
        node: NodeId,
        id: &str,
        usage: EvalUsage,
        result: &LookupResult,
    ) {
        if usage != EvalUsage::Get || result.is_beyond_execution_scope {
            return;
        }
        let symbol = self.binder.symbols.get(result.symbol);
        if !symbol.is_initially_unbound() {
            return;
        }
        // A binding on the path walked so far, or a narrowing constraint on
        // this name, clears the unbound state.
        if self.assigned_symbols.contains(&result.symbol) {
            return;
        }
        if symbol
            .declarations()
            .iter()
            .any(|d| !matches!(d.kind(), pyz_binder::DeclarationKind::Variable))
        {
            return;
        }
        self.report(
            Rule::UnboundVariable,
            self.arena.span(node),
            format!("\"{id}\" is possibly unbound"),
        );
    }

    /// The effective type of a symbol, computed once per pass.
    pub(crate) fn type_of_symbol(&mut self, symbol: SymbolId) -> Type {
        if let Some(cached) = self.symbol_types.get(&symbol) {
            return cached.clone();
        }
        if let Some(t) = self.builtins.known_symbol_type(symbol) {
            self.symbol_types.insert(symbol, t.clone());
            return t;
        }
        if !self.pending_symbols.insert(symbol) {
            return Type::Unknown;
        }
        let computed = self.compute_symbol_type(symbol);
        self.pending_symbols.remove(&symbol);
        self.symbol_types.insert(symbol, computed.clone());
        computed
    }

    fn compute_symbol_type(&mut self, symbol: SymbolId) -> Type {
        let declarations: Vec<Declaration> =
            self.binder.symbols.get(symbol).declarations().to_vec();
        if declarations.is_empty() {
            return Type::Unknown;
        }

        // An overload set: multiple function declarations marked @overload.
        let function_nodes: Vec<NodeId> = declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Function { node, .. } => Some(*node),
                _ => None,
            })
            .collect();
        if function_nodes.len() > 1 {
            // `@property` + `@x.setter` pairs merge into one property.
            if let Some(property) = self.merge_property_accessors(&function_nodes) {
                return property;
            }
            let mut overloads = Vec::new();
            let mut implementation = None;
            for node in &function_nodes {
                match self.get_type_of_function(*node) {
                    Type::Function(f) => {
                        if f.flags.contains(FunctionFlags::OVERLOAD) {
                            overloads.push(f);
                        } else {
                            implementation = Some(f);
                        }
                    }
                    Type::Property(p) => return Type::Property(p),
                    other => return other,
                }
            }
            if overloads.len() > 1 {
                return Type::Overloaded(Arc::new(OverloadedFunctionType { overloads }));
            }
            if let Some(implementation) = implementation {
                return Type::Function(implementation);
            }
            if let Some(single) = overloads.pop() {
                return Type::Function(single);
            }
        }

        let declaration = self
            .binder
            .symbols
            .get(symbol)
            .last_typed_declaration()
            .cloned()
            .or_else(|| declarations.last().cloned());
        let Some(declaration) = declaration else {
            return Type::Unknown;
        };

        match declaration {
            Declaration::Class { node, .. } => Type::Class(self.get_type_of_class(node)),
            Declaration::Function { node, .. } => self.get_type_of_function(node),
            Declaration::Parameter { node, .. } => match &self.arena.get(node).kind.clone() {
                NodeKind::Parameter {
                    annotation: Some(ann),
                    ..
                } => self.get_type_of_annotation(*ann),
                _ => Type::Unknown,
            },
            Declaration::Variable {
                type_annotation,
                inferred_source,
                ..
            } => {
                if let Some(annotation) = type_annotation {
                    self.get_type_of_annotation(annotation)
                } else if let Some(source) = inferred_source {
                    strip_literal_value(&self.get_type(source))
                } else {
                    Type::Unknown
                }
            }
            Declaration::Alias { ref target, .. } => self.resolve_alias(target),
            Declaration::Intrinsic { .. } => Type::Unknown,
        }
    }

    /// Resolve an import alias through the (modelled) importer: names from
    /// the known modules resolve against the builtin scope, and a plain
    /// `import m` of a known module binds a Module type over that scope's
    /// table. Everything else is Unknown, the gradual stand-in for an
    /// untyped module.
    fn resolve_alias(&mut self, target: &str) -> Type {
        let mut parts = target.rsplitn(2, '.');
        let last = parts.next().unwrap_or(target);
        let module = parts.next();

        match module {
            Some(module) if KNOWN_MODULES.contains(&module) => {
                let builtin_scope = self.binder.builtin_scope;
                match self.binder.scopes.get(builtin_scope).lookup_local(last) {
                    Some(symbol) => self.type_of_symbol(symbol),
                    None => Type::Unknown,
                }
            }
            None if KNOWN_MODULES.contains(&last) => {
                let builtin_scope = self.binder.builtin_scope;
                let fields = self.binder.scopes.get(builtin_scope).table.clone();
                Type::Module(Arc::new(ModuleType {
                    name: last.to_string(),
                    fields,
                    is_partial: false,
                }))
            }
            _ => Type::Unknown,
        }
    }

    /// The declared symbol a binding target refers to.
    pub(crate) fn symbol_for_target(&self, node: NodeId) -> Option<SymbolId> {
        let name = match &self.arena.get(node).kind {
            NodeKind::Name { id } => id.clone(),
            NodeKind::Parameter { name: Some(name), .. } => name.clone(),
            _ => return None,
        };
        let scope = self.binder.scope_of(node);
        lookup_recursive(&self.binder.scopes, &self.binder.symbols, scope, &name)
            .map(|result| result.symbol)
    }

    /// Record the type a binding target takes, distributing through
    /// destructuring shapes and validating member/subscript stores.
    pub(crate) fn bind_target_to_type(&mut self, target: NodeId, t: Type) {
        let kind = self.arena.get(target).kind.clone();
        match kind {
            NodeKind::Name { .. } => {
                let Some(symbol) = self.symbol_for_target(target) else {
                    return;
                };
                self.assigned_symbols.insert(symbol);
                // An explicit annotation is authoritative; inference only
                // fills symbols that have none.
                let has_annotation = self
                    .binder
                    .symbols
                    .get(symbol)
                    .get_typed_declarations()
                    .next()
                    .is_some();
                if !has_annotation {
                    self.symbol_types
                        .insert(symbol, strip_literal_value(&t));
                }
            }
            NodeKind::TupleExpr { ref elements } | NodeKind::ListExpr { ref elements } => {
                let distributed = self.destructured_types(&t, elements.len());
                for (&element, element_type) in elements.iter().zip(distributed) {
                    self.bind_target_to_type(element, element_type);
                }
            }
            NodeKind::Unpack { operand } => {
                let element = self.element_of_type(&t);
                let as_list = self.builtins.list_of(element);
                self.bind_target_to_type(operand, as_list);
            }
            NodeKind::MemberAccess { .. } | NodeKind::Index { .. } => {
                let _ = self.get_type_with_usage(target, EvalUsage::Set);
            }
            _ => {}
        }
    }

    fn destructured_types(&mut self, t: &Type, count: usize) -> Vec<Type> {
        if let Type::Object(o) = t {
            if o.class.name() == "tuple" {
                if let Some(args) = &o.class.type_arguments {
                    if args.len() == count
                        && !args
                            .iter()
                            .any(|a| matches!(a, Type::Any { is_ellipsis: true }))
                    {
                        return args.as_ref().clone();
                    }
                }
            }
        }
        let element = self.element_of_type(t);
        vec![element; count]
    }

    /// The per-step element type of `t`, without diagnostics.
    pub(crate) fn element_of_type(&mut self, t: &Type) -> Type {
        self.ensure_members_for(t);
        let source = self.type_source();
        pyz_solver::get_type_from_iterable(t, false, true, &source)
            .element_type
            .unwrap_or(Type::Unknown)
    }
}
