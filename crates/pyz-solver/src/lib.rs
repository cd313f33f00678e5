//! Type model and type relations for the pyz Python type checker.
//!
//! This crate is organized into several submodules:
//! - `types` - The `Type` sum type and its variant payloads
//! - `class` - Class details, specialisation overlays, MRO linearisation
//! - `assign` - Directional assignability (`can_assign_type`) and override
//!   compatibility
//! - `combine` - Union algebra (`combine_types`, `do_for_subtypes`)
//! - `specialize` - TypeVar substitution
//! - `members` - MRO member lookup and method binding
//! - `narrow` - Narrowing primitives used by the checker's constraint engine
//! - `iterate` - Iterable/awaitable element resolution
//! - `printer` - Diagnostic-facing type formatting
//! - `builtins` - The synthesised builtin registry
//!
//! Everything here is pure with respect to diagnostics: relation checks
//! explain failures through a `DiagnosticAddendum`, never by emitting.

pub mod assign;
pub mod builtins;
pub mod class;
pub mod combine;
pub mod iterate;
pub mod members;
pub mod narrow;
pub mod printer;
pub mod specialize;
pub mod types;

#[cfg(test)]
mod tests;

pub use assign::{AssignabilityChecker, TypeVarMap, can_override_method};
pub use builtins::Builtins;
pub use class::{BaseClass, ClassDetails, ClassFlags, ClassType, Variance};
pub use combine::{combine_types, do_for_subtypes};
pub use iterate::{IterableResult, get_type_from_awaitable, get_type_from_iterable};
pub use members::{
    ClassMemberResult, MemberLookupFlags, bind_function_to_class_or_object,
    get_abstract_methods, look_up_class_member, look_up_object_member,
    specialize_member_for_class,
};
pub use narrow::{
    convert_class_to_object, remove_falsy_from_union, remove_none_from_union,
    remove_truthy_from_union, strip_literal_value, transform_type_object_to_class,
};
pub use printer::{format_argument_types, format_type};
pub use specialize::specialize_type;
pub use types::{
    FunctionFlags, FunctionParameter, FunctionType, LiteralValue, MAX_TYPE_RECURSION, ModuleType,
    ObjectType, OverloadedFunctionType, PropertyType, SpecializedFunction, Type, TypeSource,
    TypeVarType, UnionType,
};
