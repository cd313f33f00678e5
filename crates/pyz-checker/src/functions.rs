//! Function-definition types: signature construction, decorator
//! application, and property accessor assembly.

use crate::state::{CheckerState, EvalUsage};
use pyz_ast::{NodeId, NodeKind};
use pyz_binder::ScopeKind;
use pyz_common::Rule;
use pyz_solver::{
    FunctionFlags, FunctionParameter, FunctionType, PropertyType, Type,
};
use std::sync::Arc;

impl<'a> CheckerState<'a> {
    /// The type of a function definition, decorators applied.
    pub(crate) fn get_type_of_function(&mut self, node: NodeId) -> Type {
        self.cached_type(node, EvalUsage::Get, |state| {
            state.compute_function_type(node)
        })
    }

    fn compute_function_type(&mut self, node: NodeId) -> Type {
        let NodeKind::FunctionDef {
            name,
            params,
            return_annotation,
            decorators,
            is_async,
            ..
        } = self.arena.get(node).kind.clone()
        else {
            return Type::Unknown;
        };

        let scope = self.binder.scope_of(node);
        let is_method = self.binder.scopes.get(scope).kind == ScopeKind::Class;

        let mut flags = FunctionFlags::empty();
        if is_method {
            flags |= FunctionFlags::INSTANCE_METHOD;
        }
        if name == "__init__" || name == "__new__" {
            flags |= FunctionFlags::CONSTRUCTOR;
        }

        let mut function = FunctionType::new(Some(&name), flags);
        function.declaration = Some(node);

        for &param in &params {
            let NodeKind::Parameter {
                name: param_name,
                category,
                annotation,
                default,
                ..
            } = self.arena.get(param).kind.clone()
            else {
                continue;
            };
            let param_type = match annotation {
                Some(annotation) => self.get_type_of_annotation(annotation),
                None => Type::Unknown,
            };
            if let Some(default) = default {
                // Defaults evaluate in the enclosing scope; calls inside
                // them are checked by the walker.
                let default_type = self.get_type(default);
                if annotation.is_some() && !default_type.is_any_or_unknown() {
                    let declared = param_type.clone();
                    self.check_assignable(
                        &declared,
                        &default_type,
                        self.arena.span(default),
                        Rule::GeneralTypeIssues,
                        "Default value mismatch",
                    );
                }
            }
            function.parameters.push(FunctionParameter {
                category,
                name: param_name,
                has_default: default.is_some(),
                param_type: param_type.clone(),
            });
            if let Some(symbol) = self.symbol_for_target(param) {
                if annotation.is_some() {
                    self.symbol_types.insert(symbol, param_type);
                }
            }
        }

        if let Some(annotation) = return_annotation {
            let declared = self.get_type_of_annotation(annotation);
            // An async function's callers receive a coroutine over the
            // declared return unless the annotation already is one.
            let declared = if is_async && !is_async_aware_return(&declared) {
                self.builtins.coroutine_of(declared)
            } else {
                declared
            };
            function.declared_return_type = Some(declared);
        }

        let mut result = Type::Function(Arc::new(function));

        // Decorators apply innermost-first.
        for &decorator in decorators.iter().rev() {
            result = self.apply_decorator(node, decorator, result);
        }
        result
    }

    /// Apply one decorator expression to a function definition's type.
    fn apply_decorator(&mut self, function_node: NodeId, decorator: NodeId, current: Type) -> Type {
        // `@x.setter` / `@x.deleter`: accessor assembly on an existing
        // property, recognised syntactically.
        if let NodeKind::MemberAccess { base, member, .. } = &self.arena.get(decorator).kind.clone()
        {
            if member == "setter" || member == "deleter" {
                let base_type = self.get_type(*base);
                if let Type::Property(existing) = base_type {
                    if let Type::Function(accessor) = &current {
                        let mut property = (*existing).clone();
                        if member == "setter" {
                            property.setter = Some(accessor.clone());
                        } else {
                            property.deleter = Some(accessor.clone());
                        }
                        return Type::Property(Arc::new(property));
                    }
                }
                return current;
            }
        }

        let decorator_type = self.get_type(decorator);
        match &decorator_type {
            Type::Function(f) => {
                if let Some(builtin) = f.builtin_name.clone() {
                    return match builtin.as_str() {
                        "property" | "staticmethod" | "classmethod" | "abstractmethod" => {
                            self.apply_wrapper_builtin(&builtin, current)
                        }
                        "final" => mark_function(current, FunctionFlags::FINAL),
                        "overload" => mark_function(current, FunctionFlags::OVERLOAD),
                        _ => current,
                    };
                }
                // A typed user decorator transforms the definition into its
                // return type.
                let return_type = f.effective_return_type();
                if return_type.is_unknown() {
                    self.report(
                        Rule::UntypedFunctionDecorator,
                        self.arena.span(decorator),
                        "Untyped function decorator obscures the type of the function",
                    );
                    let _ = function_node;
                    return current;
                }
                return_type
            }
            Type::Unknown => {
                self.report(
                    Rule::UntypedFunctionDecorator,
                    self.arena.span(decorator),
                    "Untyped function decorator obscures the type of the function",
                );
                current
            }
            _ => current,
        }
    }

    /// Merge a symbol's function declarations into a property when the
    /// accessor-decorator pattern is present.
    pub(crate) fn merge_property_accessors(&mut self, nodes: &[NodeId]) -> Option<Type> {
        let mut property: Option<PropertyType> = None;
        for &node in nodes {
            let t = self.get_type_of_function(node);
            match t {
                Type::Property(p) => match &mut property {
                    None => property = Some((*p).clone()),
                    Some(existing) => {
                        if p.setter.is_some() {
                            existing.setter = p.setter.clone();
                        }
                        if p.deleter.is_some() {
                            existing.deleter = p.deleter.clone();
                        }
                    }
                },
                _ => return None,
            }
        }
        property.map(|p| Type::Property(Arc::new(p)))
    }
}

fn mark_function(t: Type, flag: FunctionFlags) -> Type {
    match t {
        Type::Function(f) => {
            let mut updated = (*f).clone();
            updated.flags |= flag;
            Type::Function(Arc::new(updated))
        }
        other => other,
    }
}

fn is_async_aware_return(t: &Type) -> bool {
    matches!(
        t,
        Type::Object(o) if matches!(
            o.class.name(),
            "Coroutine" | "Awaitable" | "AsyncGenerator" | "AsyncIterator"
        )
    )
}
