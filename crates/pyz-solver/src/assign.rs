//! Directional assignability.
//!
//! `can_assign_type(dest, src)` answers whether a value of type `src` may be
//! bound to a location declared `dest`. The relation is non-symmetric; the
//! gradual types (Any, Unknown) are compatible in both directions. Failures
//! explain themselves through a `DiagnosticAddendum`; nothing here emits
//! diagnostics directly, so speculative probes are naturally silent.

use crate::class::{ClassType, Variance};
use crate::combine::combine_types;
use crate::members::look_up_object_member;
use crate::printer::format_type;
use crate::types::{FunctionFlags, FunctionParameter, FunctionType, Type, TypeSource};
use pyz_ast::ParameterCategory;
use pyz_common::DiagnosticAddendum;
use rustc_hash::FxHashMap;
use tracing::trace;

/// Accumulated TypeVar bindings for one matching operation.
pub type TypeVarMap = FxHashMap<String, Type>;

/// The assignability relation, parameterised over the capability to resolve
/// member symbols to types (needed for protocol matching).
pub struct AssignabilityChecker<'a> {
    source: Option<&'a dyn TypeSource>,
}

impl<'a> AssignabilityChecker<'a> {
    /// A checker without member-type access; protocols match nominally only.
    pub fn new() -> Self {
        AssignabilityChecker { source: None }
    }

    pub fn with_source(source: &'a dyn TypeSource) -> Self {
        AssignabilityChecker {
            source: Some(source),
        }
    }

    /// The rule sequence of the relation; first match wins.
    pub fn can_assign(
        &self,
        dest: &Type,
        src: &Type,
        addendum: &mut DiagnosticAddendum,
        type_var_map: &mut TypeVarMap,
        recursion: u32,
    ) -> bool {
        if recursion > crate::types::MAX_TYPE_RECURSION {
            return true;
        }
        trace!(dest = %format_type(dest), src = %format_type(src), "can_assign");

        // Rule 1: the gradual escape hatch is a two-sided identity.
        if dest.is_any_or_unknown() || src.is_any_or_unknown() {
            return true;
        }
        if src.is_never() || src.is_unbound() {
            return true;
        }

        // Rule 2: unions on the destination side.
        if let Some(dest_entries) = dest.union_entries() {
            if let Some(src_entries) = src.union_entries() {
                for src_entry in src_entries {
                    let accepted = dest_entries.iter().any(|dest_entry| {
                        let mut probe = DiagnosticAddendum::new();
                        self.can_assign(dest_entry, src_entry, &mut probe, type_var_map, recursion + 1)
                    });
                    if !accepted {
                        addendum.add(format!(
                            "Type \"{}\" is incompatible with \"{}\"",
                            format_type(src_entry),
                            format_type(dest)
                        ));
                        return false;
                    }
                }
                return true;
            }
            let accepted = dest_entries.iter().any(|dest_entry| {
                let mut probe = DiagnosticAddendum::new();
                self.can_assign(dest_entry, src, &mut probe, type_var_map, recursion + 1)
            });
            if !accepted {
                addendum.add(format!(
                    "Type \"{}\" is incompatible with \"{}\"",
                    format_type(src),
                    format_type(dest)
                ));
            }
            return accepted;
        }
        // A union source must be accepted member-wise.
        if let Some(src_entries) = src.union_entries() {
            for src_entry in src_entries {
                if !self.can_assign(dest, src_entry, addendum, type_var_map, recursion + 1) {
                    return false;
                }
            }
            return true;
        }

        // Rule 3: None.
        if src.is_none() {
            if dest.is_none() || is_universal_object(dest) {
                return true;
            }
            addendum.add(format!(
                "\"None\" is incompatible with \"{}\"",
                format_type(dest)
            ));
            return false;
        }
        if dest.is_none() {
            addendum.add(format!(
                "Type \"{}\" is incompatible with \"None\"",
                format_type(src)
            ));
            return false;
        }

        // Rule 4: TypeVar destinations record bindings.
        if let Type::TypeVar(dest_tv) = dest {
            return self.assign_to_type_var(dest_tv, src, addendum, type_var_map, recursion);
        }
        if let Type::TypeVar(src_tv) = src {
            // A free TypeVar source stands for its bound.
            if let Some(bound) = &src_tv.bound {
                return self.can_assign(dest, bound, addendum, type_var_map, recursion + 1);
            }
            if !src_tv.constraints.is_empty() {
                let joined = combine_types(src_tv.constraints.clone());
                return self.can_assign(dest, &joined, addendum, type_var_map, recursion + 1);
            }
            return true;
        }

        match (dest, src) {
            // Rules 5 and 8: instances, with literal retention/stripping.
            (Type::Object(dest_obj), Type::Object(src_obj)) => {
                if let Some(dest_literal) = &dest_obj.literal {
                    let matches = src_obj.literal.as_ref() == Some(dest_literal)
                        && dest_obj.class.same_generic_class(&src_obj.class);
                    if !matches {
                        addendum.add(format!(
                            "Type \"{}\" is incompatible with \"{}\"",
                            format_type(src),
                            format_type(dest)
                        ));
                    }
                    return matches;
                }
                // The numeric tower: int fits float, float fits complex.
                if numeric_rank(dest_obj.class.name())
                    .zip(numeric_rank(src_obj.class.name()))
                    .is_some_and(|(d, s)| s <= d)
                {
                    return true;
                }
                if dest_obj.class.is_protocol()
                    && !src_obj.class.same_generic_class(&dest_obj.class)
                {
                    return self.can_assign_protocol(
                        &dest_obj.class,
                        src,
                        addendum,
                        type_var_map,
                        recursion,
                    );
                }
                self.can_assign_class(
                    &dest_obj.class,
                    &src_obj.class,
                    addendum,
                    type_var_map,
                    recursion,
                )
            }
            // Rule 6: class references.
            (Type::Class(dest_class), Type::Class(src_class)) => {
                if src_class.is_derived_from(dest_class, recursion) {
                    return true;
                }
                addendum.add(format!(
                    "\"{}\" is not derived from \"{}\"",
                    src_class.name(),
                    dest_class.name()
                ));
                false
            }
            // A class reference is an instance of `type` (and of `object`).
            (Type::Object(dest_obj), Type::Class(_)) => {
                if is_universal_object(dest) || dest_obj.class.name() == "type" {
                    return true;
                }
                addendum.add(format!(
                    "Type \"{}\" is incompatible with \"{}\"",
                    format_type(src),
                    format_type(dest)
                ));
                false
            }
            (Type::Object(_), Type::Function(_) | Type::Overloaded(_) | Type::Module(_)) => {
                if is_universal_object(dest) {
                    return true;
                }
                addendum.add(format!(
                    "Type \"{}\" is incompatible with \"{}\"",
                    format_type(src),
                    format_type(dest)
                ));
                false
            }
            // Rule 7: callables.
            (Type::Function(dest_fn), Type::Function(src_fn)) => {
                self.signatures_compatible(dest_fn, src_fn, addendum, type_var_map, recursion)
            }
            (Type::Function(_), Type::Overloaded(src_ov)) => {
                let accepted = src_ov.overloads.iter().any(|overload| {
                    let mut probe = DiagnosticAddendum::new();
                    self.can_assign(
                        dest,
                        &Type::Function(overload.clone()),
                        &mut probe,
                        type_var_map,
                        recursion + 1,
                    )
                });
                if !accepted {
                    addendum.add("no overload matches the target signature".to_string());
                }
                accepted
            }
            (Type::Overloaded(dest_ov), _) => dest_ov.overloads.iter().all(|overload| {
                self.can_assign(
                    &Type::Function(overload.clone()),
                    src,
                    addendum,
                    type_var_map,
                    recursion + 1,
                )
            }),
            (Type::Module(dest_mod), Type::Module(src_mod)) => dest_mod.name == src_mod.name,
            _ => {
                addendum.add(format!(
                    "Type \"{}\" is incompatible with \"{}\"",
                    format_type(src),
                    format_type(dest)
                ));
                false
            }
        }
    }

    fn assign_to_type_var(
        &self,
        dest_tv: &crate::types::TypeVarType,
        src: &Type,
        addendum: &mut DiagnosticAddendum,
        type_var_map: &mut TypeVarMap,
        recursion: u32,
    ) -> bool {
        // Constrained TypeVars accept only values matching a constraint.
        if !dest_tv.constraints.is_empty() {
            let matched = dest_tv.constraints.iter().any(|constraint| {
                let mut probe = DiagnosticAddendum::new();
                let mut scratch = TypeVarMap::default();
                self.can_assign(constraint, src, &mut probe, &mut scratch, recursion + 1)
            });
            if !matched {
                addendum.add(format!(
                    "Type \"{}\" matches no constraint of \"{}\"",
                    format_type(src),
                    dest_tv.name
                ));
                return false;
            }
        }
        if let Some(bound) = &dest_tv.bound {
            let mut scratch = TypeVarMap::default();
            if !self.can_assign(bound, src, addendum, &mut scratch, recursion + 1) {
                addendum.add(format!(
                    "Type \"{}\" is not assignable to the bound of \"{}\"",
                    format_type(src),
                    dest_tv.name
                ));
                return false;
            }
        }

        match type_var_map.get(&dest_tv.name).cloned() {
            None => {
                type_var_map.insert(dest_tv.name.clone(), src.clone());
                true
            }
            Some(existing) => match dest_tv.variance {
                Variance::Invariant => {
                    if existing.is_same(src, recursion) {
                        return true;
                    }
                    let mut probe = DiagnosticAddendum::new();
                    let mut scratch = TypeVarMap::default();
                    if self.can_assign(&existing, src, &mut probe, &mut scratch, recursion + 1) {
                        return true;
                    }
                    addendum.add(format!(
                        "\"{}\" was bound to \"{}\", not \"{}\"",
                        dest_tv.name,
                        format_type(&existing),
                        format_type(src)
                    ));
                    false
                }
                Variance::Covariant | Variance::Contravariant => {
                    let joined = combine_types(vec![existing, src.clone()]);
                    type_var_map.insert(dest_tv.name.clone(), joined);
                    true
                }
            },
        }
    }

    /// Nominal class compatibility: walk the source MRO to a same-generic
    /// match, then compare type arguments position-wise per the declared
    /// variance of each type parameter.
    pub fn can_assign_class(
        &self,
        dest_class: &ClassType,
        src_class: &ClassType,
        addendum: &mut DiagnosticAddendum,
        type_var_map: &mut TypeVarMap,
        recursion: u32,
    ) -> bool {
        if recursion > crate::types::MAX_TYPE_RECURSION {
            return true;
        }
        let Some(matched) = src_class
            .mro()
            .into_iter()
            .find(|entry| entry.same_generic_class(dest_class))
        else {
            addendum.add(format!(
                "\"{}\" is incompatible with \"{}\"",
                src_class.name(),
                dest_class.name()
            ));
            return false;
        };

        // When the match is the source class itself, keep the source's
        // arguments; otherwise substitute the source's arguments through the
        // base entry (a base written as `Iterable[_T]` picks up the source's
        // binding for `_T`).
        let effective = if matched.same_generic_class(src_class) && src_class.type_arguments.is_some()
        {
            src_class.clone()
        } else {
            match crate::members::specialize_member_for_class(Type::Class(matched), src_class) {
                Type::Class(c) => c,
                _ => src_class.clone(),
            }
        };

        let params = dest_class.details.type_parameters();
        let count = dest_class
            .type_arguments
            .as_ref()
            .map(|a| a.len())
            .unwrap_or(params.len());
        for i in 0..count {
            let dest_arg = dest_class.type_argument(i);
            let src_arg = effective.type_argument(i);
            let variance = params.get(i).map(|p| p.variance).unwrap_or_default();

            // TypeVar destinations recurse so bindings are recorded.
            let ok = if matches!(dest_arg, Type::TypeVar(_)) {
                self.can_assign(&dest_arg, &src_arg, addendum, type_var_map, recursion + 1)
            } else {
                match variance {
                    Variance::Invariant => {
                        dest_arg.is_any_or_unknown()
                            || src_arg.is_any_or_unknown()
                            || dest_arg.is_same(&src_arg, recursion)
                    }
                    Variance::Covariant => {
                        self.can_assign(&dest_arg, &src_arg, addendum, type_var_map, recursion + 1)
                    }
                    Variance::Contravariant => {
                        self.can_assign(&src_arg, &dest_arg, addendum, type_var_map, recursion + 1)
                    }
                }
            };
            if !ok {
                addendum.add(format!(
                    "Type argument {} is \"{}\", expected \"{}\"",
                    i + 1,
                    format_type(&src_arg),
                    format_type(&dest_arg)
                ));
                return false;
            }
        }
        true
    }

    /// Structural protocol matching: every member the protocol declares must
    /// exist on the source with a compatible type.
    fn can_assign_protocol(
        &self,
        protocol: &ClassType,
        src: &Type,
        addendum: &mut DiagnosticAddendum,
        type_var_map: &mut TypeVarMap,
        recursion: u32,
    ) -> bool {
        let Some(source) = self.source else {
            // No member-type capability; fall back to nominal matching.
            return match src {
                Type::Object(o) => o.class.is_derived_from(protocol, recursion),
                _ => false,
            };
        };
        let Type::Object(src_obj) = src else {
            return false;
        };
        for (name, protocol_symbol) in protocol.details.fields() {
            if source.symbol_ignored_for_protocol(protocol_symbol) {
                continue;
            }
            let Some(found) = look_up_object_member(&src_obj.class, &name) else {
                addendum.add(format!(
                    "\"{}\" is not present on \"{}\"",
                    name,
                    src_obj.class.name()
                ));
                return false;
            };
            let expected = bound_member_type(source.symbol_type(protocol_symbol), src);
            let actual = bound_member_type(source.symbol_type(found.symbol), src);
            let mut nested = DiagnosticAddendum::new();
            if !self.can_assign(&expected, &actual, &mut nested, type_var_map, recursion + 1) {
                addendum.add(format!("member \"{name}\" is incompatible"));
                return false;
            }
        }
        true
    }

    /// Signature compatibility for rule 7: the source must accept every call
    /// shape the destination admits (parameters contravariant), and its
    /// result must flow where the destination's result flows (return
    /// covariant).
    fn signatures_compatible(
        &self,
        dest_fn: &FunctionType,
        src_fn: &FunctionType,
        addendum: &mut DiagnosticAddendum,
        type_var_map: &mut TypeVarMap,
        recursion: u32,
    ) -> bool {
        let skip = usize::from(
            dest_fn.flags.contains(FunctionFlags::INSTANCE_METHOD)
                && src_fn.flags.contains(FunctionFlags::INSTANCE_METHOD),
        );

        let is_simple = |p: &FunctionParameter| {
            p.category == ParameterCategory::Simple && p.name.is_some()
        };
        let dest_params: Vec<usize> = (skip..dest_fn.parameters.len())
            .filter(|&i| is_simple(&dest_fn.parameters[i]))
            .collect();
        let src_params: Vec<usize> = (skip..src_fn.parameters.len())
            .filter(|&i| is_simple(&src_fn.parameters[i]))
            .collect();
        let src_absorbs = src_fn
            .parameters
            .iter()
            .any(|p| p.category != ParameterCategory::Simple && p.name.is_some());

        if src_params.len() < dest_params.len() && !src_absorbs {
            addendum.add(format!(
                "accepts {} positional parameters, expected {}",
                src_params.len(),
                dest_params.len()
            ));
            return false;
        }
        // Extra source parameters must be defaulted.
        if src_params.len() > dest_params.len() {
            for &i in &src_params[dest_params.len()..] {
                if !src_fn.parameters[i].has_default {
                    addendum.add(format!(
                        "parameter \"{}\" has no matching parameter",
                        src_fn.parameters[i].name.as_deref().unwrap_or("?")
                    ));
                    return false;
                }
            }
        }

        for (position, &dest_i) in dest_params.iter().enumerate() {
            let dest_param = dest_fn.parameter_type(dest_i);
            let src_param = match src_params.get(position) {
                Some(&src_i) => src_fn.parameter_type(src_i),
                None => {
                    // Absorbed by *args/**kwargs.
                    match src_fn
                        .parameters
                        .iter()
                        .position(|p| p.category == ParameterCategory::VarArgList && p.name.is_some())
                    {
                        Some(i) => src_fn.parameter_type(i),
                        None => Type::any(),
                    }
                }
            };
            let mut nested = DiagnosticAddendum::new();
            if !self.can_assign(&src_param, &dest_param, &mut nested, type_var_map, recursion + 1) {
                addendum.add(format!(
                    "parameter {} type \"{}\" is incompatible with \"{}\"",
                    position + 1,
                    format_type(&src_param),
                    format_type(&dest_param)
                ));
                return false;
            }
        }

        let dest_return = dest_fn.effective_return_type();
        let src_return = src_fn.effective_return_type();
        let mut nested = DiagnosticAddendum::new();
        if !self.can_assign(&dest_return, &src_return, &mut nested, type_var_map, recursion + 1) {
            addendum.add(format!(
                "return type \"{}\" is incompatible with \"{}\"",
                format_type(&src_return),
                format_type(&dest_return)
            ));
            return false;
        }
        true
    }
}

impl Default for AssignabilityChecker<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Override compatibility: the overriding method must accept every call the
/// base method accepts, and return within the base's declared return.
pub fn can_override_method(
    base: &FunctionType,
    derived: &FunctionType,
    addendum: &mut DiagnosticAddendum,
) -> bool {
    let checker = AssignabilityChecker::new();
    let mut map = TypeVarMap::default();
    checker.signatures_compatible(base, derived, addendum, &mut map, 0)
}

fn is_universal_object(t: &Type) -> bool {
    matches!(t, Type::Object(o) if o.class.name() == "object" && o.literal.is_none())
}

fn numeric_rank(name: &str) -> Option<u8> {
    match name {
        "bool" => Some(0),
        "int" => Some(1),
        "float" => Some(2),
        "complex" => Some(3),
        _ => None,
    }
}

/// A protocol member compared through instance access: methods compare with
/// their self parameter dropped.
fn bound_member_type(member: Type, owner: &Type) -> Type {
    match &member {
        Type::Function(f) if f.is_instance_method() => {
            crate::members::bind_function_to_class_or_object(owner, f)
        }
        _ => member,
    }
}
