//! Function-signature rules: unknown parameter types, self/cls naming,
//! return-path validation, and the raise/except exception rules.

use crate::state::{CheckerState, FunctionContext};
use crate::walker::suite_terminates;
use pyz_ast::{NodeId, NodeKind, ParameterCategory};
use pyz_binder::ScopeKind;
use pyz_common::Rule;
use pyz_solver::{
    ClassFlags, FunctionFlags, Type, combine_types, convert_class_to_object, format_type,
    strip_literal_value,
};

impl<'a> CheckerState<'a> {
    /// Parameter-type completeness and method parameter-name rules.
    pub(crate) fn check_function_signature(&mut self, node: NodeId, function_type: &Type) {
        let NodeKind::FunctionDef {
            ref name,
            ref params,
            ..
        } = self.arena.get(node).kind.clone()
        else {
            return;
        };

        // Unknown / partially-unknown parameter types. Annotation
        // re-evaluation is silenced; its diagnostics were already emitted
        // when the signature was built.
        if !self.is_stub_file() {
            for &param in params {
                let NodeKind::Parameter {
                    name: Some(ref param_name),
                    name_span,
                    annotation,
                    ..
                } = self.arena.get(param).kind.clone()
                else {
                    continue;
                };
                let param_type = match annotation {
                    Some(annotation) => {
                        let sink = self.diagnostics.clone();
                        sink.silenced(|| self.get_type_of_annotation(annotation))
                    }
                    None => Type::Unknown,
                };
                if param_name == "self" || param_name == "cls" {
                    continue;
                }
                if param_type.is_unknown() {
                    self.report(
                        Rule::UnknownParameterType,
                        name_span,
                        format!("Type of parameter \"{param_name}\" is unknown"),
                    );
                } else if contains_unknown(&param_type, 0) {
                    self.report(
                        Rule::UnknownParameterType,
                        name_span,
                        format!("Type of parameter \"{param_name}\" is partially unknown"),
                    );
                }
            }
        }

        // Method signature validation.
        let scope = self.binder.scope_of(node);
        let is_method = self.binder.scopes.get(scope).kind == ScopeKind::Class;
        if !is_method || matches!(function_type, Type::Property(_)) {
            return;
        }
        let (is_static, is_classmethod) = match function_type {
            Type::Function(f) => (
                f.flags.contains(FunctionFlags::STATIC_METHOD),
                f.flags.contains(FunctionFlags::CLASS_METHOD),
            ),
            _ => (false, false),
        };
        let first = params.iter().find_map(|&param| {
            match &self.arena.get(param).kind {
                NodeKind::Parameter {
                    name: Some(param_name),
                    name_span,
                    category: ParameterCategory::Simple,
                    ..
                } => Some((param_name.clone(), *name_span)),
                _ => None,
            }
        });

        let in_metaclass = self.enclosing_class_of_scope(scope).is_some_and(|class| {
            class.details.flags().contains(ClassFlags::METACLASS)
                || class.is_derived_from(&self.builtins.type_class, 0)
        });
        let lenient = |name: &str| self.is_stub_file() && (name.starts_with('_') || name == "metacls");

        if name == "__new__" || name == "__init_subclass__" {
            if let Some((first_name, span)) = first {
                if first_name != "cls" && first_name != "mcs" && !lenient(&first_name) {
                    self.report(
                        Rule::SelfClsParameterName,
                        span,
                        format!("Class methods should take a \"cls\" parameter, not \"{first_name}\""),
                    );
                }
            }
            return;
        }
        if is_static {
            if let Some((first_name, span)) = first {
                if first_name == "self" || first_name == "cls" {
                    self.report(
                        Rule::SelfClsParameterName,
                        span,
                        format!("Static methods should not take a \"{first_name}\" parameter"),
                    );
                }
            }
            return;
        }
        if is_classmethod {
            match first {
                Some((first_name, span)) => {
                    if first_name != "cls" && !lenient(&first_name) {
                        self.report(
                            Rule::SelfClsParameterName,
                            span,
                            format!(
                                "Class methods should take a \"cls\" parameter, not \"{first_name}\""
                            ),
                        );
                    }
                }
                None => {
                    self.report(
                        Rule::SelfClsParameterName,
                        self.arena.span(node),
                        "Class methods should take a \"cls\" parameter",
                    );
                }
            }
            return;
        }
        // Ordinary instance method: self (or cls in a metaclass).
        match first {
            Some((first_name, span)) => {
                let acceptable = first_name == "self"
                    || (in_metaclass && first_name == "cls")
                    || lenient(&first_name);
                if !acceptable {
                    self.report(
                        Rule::SelfClsParameterName,
                        span,
                        format!(
                            "Instance methods should take a \"self\" parameter, not \"{first_name}\""
                        ),
                    );
                }
            }
            None => {
                self.report(
                    Rule::SelfClsParameterName,
                    self.arena.span(node),
                    "Instance methods should take a \"self\" parameter",
                );
            }
        }
    }

    /// Return-path validation once the body has been walked, plus inferred
    /// return/yield publication.
    pub(crate) fn check_function_return(
        &mut self,
        node: NodeId,
        function_type: &Type,
        context: &FunctionContext,
        body: &[NodeId],
    ) {
        let falls_off = !suite_terminates(self.arena, body);

        // Publish inference for un-annotated callers.
        if let Type::Function(f) = function_type {
            let mut returns: Vec<Type> = context
                .return_types
                .iter()
                .map(strip_literal_value)
                .collect();
            if falls_off || returns.is_empty() {
                returns.push(Type::None);
            }
            let _ = f.inferred_return_type.set(combine_types(returns));
            if context.is_generator {
                let _ = f
                    .inferred_yield_type
                    .set(combine_types(context.yield_types.clone()));
            }
        }

        let is_abstract = matches!(
            function_type,
            Type::Function(f) if f.flags.contains(FunctionFlags::ABSTRACT)
        );
        let Some(declared) = &context.declared_return else {
            return;
        };

        if declared.is_never() {
            if falls_off && !is_stub_body(self.arena, body) {
                self.report(
                    Rule::GeneralTypeIssues,
                    self.arena.span(node),
                    "Function with declared return type \"NoReturn\" can implicitly return None",
                );
            }
            return;
        }

        if context.is_generator || is_abstract || self.is_stub_file() {
            return;
        }
        if falls_off && !is_stub_body(self.arena, body) {
            let declared = declared.clone();
            if !self.is_assignable(&declared, &Type::None) {
                self.report(
                    Rule::GeneralTypeIssues,
                    self.arena.span(node),
                    format!(
                        "Function with declared return type \"{}\" must return a value on all code paths",
                        format_type(&declared)
                    ),
                );
            }
        }
    }

    /// `raise E` / `raise E from cause`: the exception must derive the
    /// language's base exception type. Problems accumulate in an addendum
    /// flushed once per statement.
    pub(crate) fn check_raise(&mut self, node: NodeId, exc: Option<NodeId>, cause: Option<NodeId>) {
        let mut addendum = pyz_common::DiagnosticAddendum::new();

        if let Some(exc) = exc {
            self.walk_expression(exc);
            let exc_type = self.get_type(exc);
            if !self.derives_base_exception(&exc_type) {
                addendum.add(format!(
                    "\"{}\" does not derive from BaseException",
                    format_type(&exc_type)
                ));
            }
        }
        if let Some(cause) = cause {
            self.walk_expression(cause);
            let cause_type = self.get_type(cause);
            let acceptable = cause_type.is_none() || self.derives_base_exception(&cause_type);
            if !acceptable {
                addendum.add(format!(
                    "Exception cause \"{}\" must be an exception or None",
                    format_type(&cause_type)
                ));
            }
        }
        if !addendum.is_empty() {
            self.report(
                Rule::GeneralTypeIssues,
                self.arena.span(node),
                format!(
                    "Invalid exception in \"raise\"{}",
                    addendum.format()
                ),
            );
        }
    }

    /// `except E as e`: E must be an exception class or a tuple of them;
    /// the binding takes the instance (Object) form.
    pub(crate) fn check_exception_filter(&mut self, exc_type: NodeId) -> Type {
        let filter_type = self.get_type(exc_type);
        if filter_type.is_any_or_unknown() {
            return Type::Unknown;
        }
        // A tuple display of classes binds the union of their instances.
        if let NodeKind::TupleExpr { elements } = &self.arena.get(exc_type).kind.clone() {
            let mut instances = Vec::with_capacity(elements.len());
            for &element in elements {
                let element_type = self.get_type(element);
                if !self.is_exception_class(&element_type) {
                    self.report(
                        Rule::GeneralTypeIssues,
                        self.arena.span(element),
                        format!(
                            "\"{}\" is not an exception class",
                            format_type(&element_type)
                        ),
                    );
                    instances.push(Type::Unknown);
                } else {
                    instances.push(convert_class_to_object(&element_type));
                }
            }
            return combine_types(instances);
        }
        if !self.is_exception_class(&filter_type) {
            self.report(
                Rule::GeneralTypeIssues,
                self.arena.span(exc_type),
                format!(
                    "\"{}\" is not an exception class",
                    format_type(&filter_type)
                ),
            );
            return Type::Unknown;
        }
        convert_class_to_object(&filter_type)
    }

    fn is_exception_class(&mut self, t: &Type) -> bool {
        match t {
            Type::Class(class) => class.is_derived_from(&self.builtins.base_exception, 0),
            _ => false,
        }
    }

    fn derives_base_exception(&mut self, t: &Type) -> bool {
        match t {
            Type::Any { .. } | Type::Unknown => true,
            Type::Class(class) => class.is_derived_from(&self.builtins.base_exception, 0),
            Type::Object(o) => o.class.is_derived_from(&self.builtins.base_exception, 0),
            Type::Union(u) => {
                let entries = u.entries.clone();
                entries.iter().all(|e| self.derives_base_exception(e))
            }
            _ => false,
        }
    }

    pub(crate) fn enclosing_class_of_scope(
        &self,
        scope: pyz_binder::ScopeId,
    ) -> Option<pyz_solver::ClassType> {
        let class_scope = self
            .binder
            .scopes
            .enclosing_of_kind(scope, ScopeKind::Class)?;
        let (&node, _) = self
            .binder
            .class_scopes
            .iter()
            .find(|&(_, &s)| s == class_scope)?;
        self.class_types.get(&node).cloned()
    }
}

/// A body that is a stub placeholder: docstring, `...`, or `pass` only.
fn is_stub_body(arena: &pyz_ast::NodeArena, body: &[NodeId]) -> bool {
    body.iter().all(|&stmt| match &arena.get(stmt).kind {
        NodeKind::Pass => true,
        NodeKind::ExprStmt { value } => matches!(
            &arena.get(*value).kind,
            NodeKind::EllipsisLiteral | NodeKind::StringLiteral { .. }
        ),
        NodeKind::Raise { .. } => true,
        _ => false,
    })
}

/// Does the type contain Unknown somewhere beneath the surface?
fn contains_unknown(t: &Type, recursion: u32) -> bool {
    if recursion > pyz_solver::MAX_TYPE_RECURSION {
        return false;
    }
    match t {
        Type::Unknown => true,
        Type::Class(c) => c
            .type_arguments
            .as_ref()
            .is_some_and(|args| args.iter().any(|a| contains_unknown(a, recursion + 1))),
        Type::Object(o) => contains_unknown(&Type::Class(o.class.clone()), recursion),
        Type::Union(u) => u.entries.iter().any(|e| contains_unknown(e, recursion + 1)),
        Type::Function(f) => {
            (0..f.parameters.len()).any(|i| contains_unknown(&f.parameter_type(i), recursion + 1))
                || contains_unknown(&f.effective_return_type(), recursion + 1)
        }
        _ => false,
    }
}
