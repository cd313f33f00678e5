//! Member lookup across the MRO, and method binding.

use crate::class::ClassType;
use crate::types::{FunctionFlags, FunctionType, Type, TypeSource};
use pyz_binder::SymbolId;
use rustc_hash::FxHashMap;
use std::sync::Arc;

bitflags::bitflags! {
    /// Controls for `look_up_class_member`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MemberLookupFlags: u8 {
        /// Start the walk at the first base instead of the class itself.
        const SKIP_ORIGINAL_CLASS = 1 << 0;
        /// Consider only class-scope members, not `self`-declared fields.
        const SKIP_INSTANCE_VARIABLES = 1 << 1;
        /// Stop before the universal `object` base.
        const SKIP_OBJECT_BASE = 1 << 2;
    }
}

/// A found member: the symbol plus the class that declared it (needed for
/// descriptor binding and override checks).
#[derive(Clone, Debug)]
pub struct ClassMemberResult {
    pub symbol: SymbolId,
    pub defining_class: ClassType,
}

/// Walk the linearised MRO resolving `name`.
pub fn look_up_class_member(
    class: &ClassType,
    name: &str,
    flags: MemberLookupFlags,
) -> Option<ClassMemberResult> {
    for (i, entry) in class.mro().iter().enumerate() {
        if i == 0 && flags.contains(MemberLookupFlags::SKIP_ORIGINAL_CLASS) {
            continue;
        }
        if flags.contains(MemberLookupFlags::SKIP_OBJECT_BASE) && entry.name() == "object" {
            continue;
        }
        if !flags.contains(MemberLookupFlags::SKIP_INSTANCE_VARIABLES) {
            if let Some(symbol) = entry.details.instance_field(name) {
                return Some(ClassMemberResult {
                    symbol,
                    defining_class: entry.clone(),
                });
            }
        }
        if let Some(symbol) = entry.details.field(name) {
            return Some(ClassMemberResult {
                symbol,
                defining_class: entry.clone(),
            });
        }
    }
    None
}

/// Member lookup for instance access: instance fields are visible.
pub fn look_up_object_member(class: &ClassType, name: &str) -> Option<ClassMemberResult> {
    look_up_class_member(class, name, MemberLookupFlags::empty())
}

/// Bind a member function to the access base, dropping the implicit first
/// parameter when appropriate.
///
/// - static methods bind unchanged
/// - class methods drop `cls` for class and instance access alike
/// - instance methods drop `self` only for instance access; accessing one
///   through the class yields the unbound function
pub fn bind_function_to_class_or_object(owner: &Type, f: &Arc<FunctionType>) -> Type {
    if f.flags.contains(FunctionFlags::STATIC_METHOD) {
        return Type::Function(f.clone());
    }
    if f.flags.contains(FunctionFlags::CLASS_METHOD) {
        return Type::Function(Arc::new(f.strip_first_parameter()));
    }
    match owner {
        Type::Object(_) => Type::Function(Arc::new(f.strip_first_parameter())),
        _ => Type::Function(f.clone()),
    }
}

/// Specialise a member's type for access through a specialised class:
/// the class's type parameters substitute to its type arguments.
pub fn specialize_member_for_class(member: Type, class: &ClassType) -> Type {
    let params = class.details.type_parameters();
    if params.is_empty() {
        return member;
    }
    let mut map = crate::assign::TypeVarMap::default();
    for (i, param) in params.iter().enumerate() {
        map.insert(param.name.clone(), class.type_argument(i));
    }
    crate::specialize::specialize_type(&member, Some(&map), 0)
}

/// Names of abstract methods in the class's MRO that no more-derived class
/// overrides concretely, in MRO discovery order.
pub fn get_abstract_methods(class: &ClassType, source: &dyn TypeSource) -> Vec<String> {
    // First occurrence along the MRO is the most derived declaration.
    let mut first_seen: FxHashMap<String, bool> = FxHashMap::default();
    let mut order: Vec<String> = Vec::new();
    for entry in class.mro() {
        for (name, symbol) in entry.details.fields() {
            if first_seen.contains_key(&name) {
                continue;
            }
            let is_abstract = match source.symbol_type(symbol) {
                Type::Function(f) => f.flags.contains(FunctionFlags::ABSTRACT),
                Type::Overloaded(o) => o
                    .overloads
                    .iter()
                    .all(|f| f.flags.contains(FunctionFlags::ABSTRACT)),
                _ => false,
            };
            first_seen.insert(name.clone(), is_abstract);
            order.push(name);
        }
    }
    order
        .into_iter()
        .filter(|name| first_seen.get(name).copied().unwrap_or(false))
        .collect()
}
