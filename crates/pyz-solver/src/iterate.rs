//! Iterable and awaitable element resolution.

use crate::combine::{combine_types, do_for_subtypes};
use crate::members::{
    bind_function_to_class_or_object, look_up_object_member, specialize_member_for_class,
};
use crate::types::{Type, TypeSource};

/// Outcome of iterating a type.
pub struct IterableResult {
    /// The per-step element type; Unknown when the protocol is absent.
    pub element_type: Option<Type>,
    /// A None member was stripped before resolution; the caller reports the
    /// optional-iterable warning.
    pub had_none: bool,
}

/// Resolve the element type produced by iterating `t`.
///
/// For an instance: `__iter__` (or `__aiter__`), then the returned
/// iterator's `__next__` (or `__anext__`) gives the element; absent that,
/// `__getitem__` when `support_getitem` is requested. Unions distribute and
/// recombine; None members are stripped and flagged.
pub fn get_type_from_iterable(
    t: &Type,
    is_async: bool,
    support_getitem: bool,
    source: &dyn TypeSource,
) -> IterableResult {
    let mut had_none = false;
    let mut failed = false;
    let element = do_for_subtypes(t, |entry| {
        if entry.is_none() {
            had_none = true;
            return None;
        }
        match iterate_single(entry, is_async, support_getitem, source) {
            Some(element) => Some(element),
            None => {
                failed = true;
                Some(Type::Unknown)
            }
        }
    });
    IterableResult {
        element_type: if failed { None } else { Some(element) },
        had_none,
    }
}

fn iterate_single(
    t: &Type,
    is_async: bool,
    support_getitem: bool,
    source: &dyn TypeSource,
) -> Option<Type> {
    if t.is_any_or_unknown() {
        return Some(Type::Unknown);
    }
    let Type::Object(obj) = t else {
        return None;
    };

    // Tuples iterate to the join of their element types; the trailing
    // ellipsis marker denotes a homogeneous tuple.
    if obj.class.name() == "tuple" {
        if let Some(args) = &obj.class.type_arguments {
            let elements: Vec<Type> = args
                .iter()
                .filter(|a| !matches!(a, Type::Any { is_ellipsis: true }))
                .cloned()
                .collect();
            if !elements.is_empty() {
                return Some(combine_types(elements));
            }
        }
    }

    let iter_name = if is_async { "__aiter__" } else { "__iter__" };
    if let Some(found) = look_up_object_member(&obj.class, iter_name) {
        let member = specialize_member_for_class(source.symbol_type(found.symbol), &obj.class);
        let iterator = member_return_type(&member, t)?;
        return step_type(&iterator, is_async, source);
    }

    if support_getitem && !is_async {
        if let Some(found) = look_up_object_member(&obj.class, "__getitem__") {
            let member = specialize_member_for_class(source.symbol_type(found.symbol), &obj.class);
            return member_return_type(&member, t);
        }
    }
    None
}

/// The `__next__`/`__anext__` result of an iterator type, awaited for the
/// async form.
fn step_type(iterator: &Type, is_async: bool, source: &dyn TypeSource) -> Option<Type> {
    if iterator.is_any_or_unknown() {
        return Some(Type::Unknown);
    }
    let Type::Object(obj) = iterator else {
        return None;
    };
    let next_name = if is_async { "__anext__" } else { "__next__" };
    let found = look_up_object_member(&obj.class, next_name)?;
    let member = specialize_member_for_class(source.symbol_type(found.symbol), &obj.class);
    let stepped = member_return_type(&member, iterator)?;
    if is_async {
        get_type_from_awaitable(&stepped, source).or(Some(stepped))
    } else {
        Some(stepped)
    }
}

/// The await-result of `t`: the third type argument of the generator that
/// `__await__` returns, or of the generator/coroutine itself.
pub fn get_type_from_awaitable(t: &Type, source: &dyn TypeSource) -> Option<Type> {
    if t.is_any_or_unknown() {
        return Some(Type::Unknown);
    }
    let Type::Object(obj) = t else {
        return None;
    };
    if matches!(obj.class.name(), "Generator" | "Coroutine") {
        return Some(obj.class.type_argument(2));
    }
    if obj.class.name() == "Awaitable" {
        return Some(obj.class.type_argument(0));
    }
    let found = look_up_object_member(&obj.class, "__await__")?;
    let member = specialize_member_for_class(source.symbol_type(found.symbol), &obj.class);
    let generator = member_return_type(&member, t)?;
    match &generator {
        Type::Object(g) if matches!(g.class.name(), "Generator" | "Coroutine") => {
            Some(g.class.type_argument(2))
        }
        Type::Object(g) if matches!(g.class.name(), "Iterator" | "Iterable") => {
            Some(g.class.type_argument(0))
        }
        _ => Some(Type::Unknown),
    }
}

fn member_return_type(member: &Type, owner: &Type) -> Option<Type> {
    match member {
        Type::Function(f) => {
            let bound = bind_function_to_class_or_object(owner, f);
            match bound {
                Type::Function(f) => Some(f.effective_return_type()),
                _ => None,
            }
        }
        Type::Overloaded(o) => o
            .overloads
            .first()
            .map(|f| f.effective_return_type()),
        _ => None,
    }
}
