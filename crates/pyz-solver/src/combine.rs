//! Union algebra.
//!
//! `combine_types` is the only constructor of `Type::Union`, and it
//! maintains the normal form every consumer relies on: flat, duplicate-free,
//! Never-absorbing, and never a single-member union.

use crate::types::{Type, UnionType};
use std::sync::Arc;

/// Produce the smallest type equivalent to the union of `types`.
///
/// Nested unions are flattened, Never is dropped, exact duplicates are
/// dropped, singleton results collapse, and an empty input yields Never.
pub fn combine_types(types: Vec<Type>) -> Type {
    let mut entries: Vec<Type> = Vec::with_capacity(types.len());
    let mut push = |t: Type, entries: &mut Vec<Type>| {
        if t.is_never() {
            return;
        }
        if !entries.iter().any(|e| e.is_same(&t, 0)) {
            entries.push(t);
        }
    };
    for t in types {
        match t {
            Type::Union(u) => {
                for entry in u.entries.iter() {
                    push(entry.clone(), &mut entries);
                }
            }
            other => push(other, &mut entries),
        }
    }
    match entries.len() {
        0 => Type::Never,
        1 => entries.pop().unwrap_or(Type::Never),
        _ => Type::Union(Arc::new(UnionType { entries })),
    }
}

/// Map `f` over a union's members (or apply it to a non-union directly) and
/// rebuild the result.
///
/// `f` returning `None` filters the member out; a fully filtered union is
/// Never. Used for exhaustive case analysis without manual flattening.
pub fn do_for_subtypes(t: &Type, mut f: impl FnMut(&Type) -> Option<Type>) -> Type {
    match t {
        Type::Union(u) => {
            let mapped: Vec<Type> = u.entries.iter().filter_map(|entry| f(entry)).collect();
            combine_types(mapped)
        }
        other => f(other).unwrap_or(Type::Never),
    }
}
