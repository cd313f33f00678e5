//! TypeVar substitution.

use crate::assign::TypeVarMap;
use crate::types::{SpecializedFunction, Type, MAX_TYPE_RECURSION};
use std::sync::Arc;

/// Substitute TypeVars structurally.
///
/// A TypeVar missing from `subst` is left free when `subst` is `None`;
/// otherwise it is replaced by its bound, else its first constraint, else
/// Any. Recursion is bounded; at the limit the input is returned unchanged.
pub fn specialize_type(t: &Type, subst: Option<&TypeVarMap>, recursion: u32) -> Type {
    if recursion > MAX_TYPE_RECURSION {
        return t.clone();
    }
    match t {
        Type::TypeVar(tv) => {
            if let Some(map) = subst {
                if let Some(bound_type) = map.get(&tv.name) {
                    return bound_type.clone();
                }
                if let Some(bound) = &tv.bound {
                    return bound.clone();
                }
                if let Some(first) = tv.constraints.first() {
                    return first.clone();
                }
                Type::any()
            } else {
                t.clone()
            }
        }
        Type::Class(c) => {
            let Some(args) = &c.type_arguments else {
                return t.clone();
            };
            let new_args: Vec<Type> = args
                .iter()
                .map(|a| specialize_type(a, subst, recursion + 1))
                .collect();
            Type::Class(c.clone_for_specialization(new_args))
        }
        Type::Object(o) => {
            let specialized = specialize_type(&Type::Class(o.class.clone()), subst, recursion);
            match specialized {
                Type::Class(class) => Type::Object(crate::types::ObjectType {
                    class,
                    literal: o.literal.clone(),
                }),
                other => other,
            }
        }
        Type::Function(f) => {
            if !t.requires_specialization(recursion) {
                return t.clone();
            }
            let parameter_types: Vec<Type> = (0..f.parameters.len())
                .map(|i| specialize_type(&f.parameter_type(i), subst, recursion + 1))
                .collect();
            let return_type =
                specialize_type(&f.effective_return_type(), subst, recursion + 1);
            let mut specialized = (**f).clone();
            specialized.specialized = Some(SpecializedFunction {
                parameter_types,
                return_type: Some(return_type),
            });
            Type::Function(Arc::new(specialized))
        }
        Type::Overloaded(o) => {
            let overloads = o
                .overloads
                .iter()
                .map(|f| match specialize_type(&Type::Function(f.clone()), subst, recursion) {
                    Type::Function(f) => f,
                    _ => f.clone(),
                })
                .collect();
            Type::Overloaded(Arc::new(crate::types::OverloadedFunctionType { overloads }))
        }
        Type::Union(u) => {
            let entries: Vec<Type> = u
                .entries
                .iter()
                .map(|e| specialize_type(e, subst, recursion + 1))
                .collect();
            crate::combine::combine_types(entries)
        }
        _ => t.clone(),
    }
}
