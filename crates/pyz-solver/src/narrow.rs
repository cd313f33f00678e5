//! Narrowing primitives.
//!
//! The checker's constraint engine describes *where* to narrow; these
//! functions implement *what* a narrowing does to a type.

use crate::combine::do_for_subtypes;
use crate::types::{LiteralValue, ObjectType, Type};

/// Remove None members; `Optional[T]` becomes `T`.
pub fn remove_none_from_union(t: &Type) -> Type {
    do_for_subtypes(t, |entry| {
        if entry.is_none() {
            None
        } else {
            Some(entry.clone())
        }
    })
}

/// Keep only members that can be falsy (the `and` left-operand result).
pub fn remove_truthy_from_union(t: &Type) -> Type {
    do_for_subtypes(t, |entry| {
        if is_always_truthy(entry) {
            None
        } else {
            Some(entry.clone())
        }
    })
}

/// Keep only members that can be truthy (the `or` left-operand result).
pub fn remove_falsy_from_union(t: &Type) -> Type {
    do_for_subtypes(t, |entry| {
        if is_always_falsy(entry) {
            None
        } else {
            Some(entry.clone())
        }
    })
}

fn is_always_truthy(t: &Type) -> bool {
    match t {
        Type::Object(o) => o.literal.as_ref().is_some_and(LiteralValue::is_truthy),
        // Functions, classes and modules have no falsy values.
        Type::Function(_) | Type::Overloaded(_) | Type::Class(_) | Type::Module(_) => true,
        _ => false,
    }
}

fn is_always_falsy(t: &Type) -> bool {
    match t {
        Type::None | Type::Never => true,
        Type::Object(o) => o
            .literal
            .as_ref()
            .is_some_and(|literal| !literal.is_truthy()),
        _ => false,
    }
}

/// Drop literal payloads, widening `Literal[3]` to `int`.
pub fn strip_literal_value(t: &Type) -> Type {
    do_for_subtypes(t, |entry| match entry {
        Type::Object(o) if o.literal.is_some() => Some(Type::Object(ObjectType {
            class: o.class.clone(),
            literal: None,
        })),
        other => Some(other.clone()),
    })
}

/// Convert class references to instances (`C` to an instance of `C`).
pub fn convert_class_to_object(t: &Type) -> Type {
    do_for_subtypes(t, |entry| match entry {
        Type::Class(c) => Some(Type::object(c.clone())),
        other => Some(other.clone()),
    })
}

/// Unwrap `Type[X]` objects back to the class X.
///
/// A `Type[X]` value is represented as an instance of the builtin `type`
/// class specialised with `[X]`; this recovers the Class form for code paths
/// that treat the value as a class (constructor calls, isinstance filters).
pub fn transform_type_object_to_class(t: &Type) -> Type {
    do_for_subtypes(t, |entry| match entry {
        Type::Object(o) if o.class.name() == "type" || o.class.name() == "Type" => {
            match o.class.type_argument(0) {
                Type::Object(inner) => Some(Type::Class(inner.class)),
                Type::Class(inner) => Some(Type::Class(inner)),
                Type::Any { .. } => Some(entry.clone()),
                other => Some(other),
            }
        }
        other => Some(other.clone()),
    })
}
