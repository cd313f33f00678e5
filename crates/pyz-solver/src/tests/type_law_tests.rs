//! Type relation law tests.
//!
//! ## Laws tested
//! - **Reflexivity**: every type is assignable to itself, with no addendum
//! - **Gradual identity**: Any/Unknown are assignable in both directions
//! - **Bottom**: Never is assignable to every type
//! - **Direction**: assignability is not symmetric for subclassing

use super::setup;
use crate::assign::{AssignabilityChecker, TypeVarMap};
use crate::types::Type;
use pyz_common::DiagnosticAddendum;

fn assignable(dest: &Type, src: &Type) -> (bool, DiagnosticAddendum) {
    let checker = AssignabilityChecker::new();
    let mut addendum = DiagnosticAddendum::new();
    let mut map = TypeVarMap::default();
    let result = checker.can_assign(dest, src, &mut addendum, &mut map, 0);
    (result, addendum)
}

#[test]
fn law_reflexivity() {
    let (_info, builtins) = setup();
    let samples = vec![
        Type::Unknown,
        Type::any(),
        Type::None,
        builtins.instance(&builtins.int),
        builtins.instance(&builtins.str),
        builtins.int_literal(42),
        builtins.str_literal("hello"),
        builtins.list_of(builtins.instance(&builtins.int)),
        builtins.optional(builtins.instance(&builtins.str)),
        Type::Class(builtins.int.clone()),
    ];
    for t in samples {
        let (ok, addendum) = assignable(&t, &t);
        assert!(ok, "reflexivity failed for {}", crate::printer::format_type(&t));
        assert!(addendum.is_empty(), "reflexive check appended messages");
    }
}

#[test]
fn law_any_is_two_sided_identity() {
    let (_info, builtins) = setup();
    let samples = vec![
        Type::None,
        Type::Never,
        builtins.instance(&builtins.int),
        builtins.optional(builtins.instance(&builtins.int)),
        Type::Class(builtins.str.clone()),
    ];
    for t in &samples {
        assert!(assignable(&Type::any(), t).0);
        assert!(assignable(t, &Type::any()).0);
        assert!(assignable(&Type::Unknown, t).0);
        assert!(assignable(t, &Type::Unknown).0);
    }
}

#[test]
fn law_never_is_bottom() {
    let (_info, builtins) = setup();
    for t in [
        Type::None,
        builtins.instance(&builtins.int),
        builtins.instance(&builtins.object),
    ] {
        assert!(assignable(&t, &Type::Never).0);
    }
}

#[test]
fn subclass_assignability_is_directional() {
    let (_info, builtins) = setup();
    let int_instance = builtins.instance(&builtins.int);
    let bool_instance = builtins.instance(&builtins.bool);
    assert!(assignable(&int_instance, &bool_instance).0);
    assert!(!assignable(&bool_instance, &int_instance).0);
}

#[test]
fn numeric_tower_promotes_upward_only() {
    let (_info, builtins) = setup();
    let int_instance = builtins.instance(&builtins.int);
    let float_instance = builtins.instance(&builtins.float);
    let complex_instance = builtins.instance(&builtins.complex);
    assert!(assignable(&float_instance, &int_instance).0);
    assert!(assignable(&complex_instance, &float_instance).0);
    assert!(!assignable(&int_instance, &float_instance).0);
}

#[test]
fn none_requires_optional_destination() {
    let (_info, builtins) = setup();
    let int_instance = builtins.instance(&builtins.int);
    let optional_int = builtins.optional(int_instance.clone());
    let (ok, addendum) = assignable(&int_instance, &Type::None);
    assert!(!ok);
    assert!(!addendum.is_empty());
    assert!(assignable(&optional_int, &Type::None).0);
    assert!(assignable(&builtins.instance(&builtins.object), &Type::None).0);
}

#[test]
fn literal_assigns_to_its_class_but_not_back() {
    let (_info, builtins) = setup();
    let int_instance = builtins.instance(&builtins.int);
    let three = builtins.int_literal(3);
    assert!(assignable(&int_instance, &three).0);
    assert!(!assignable(&three, &int_instance).0);
    assert!(assignable(&three, &builtins.int_literal(3)).0);
    assert!(!assignable(&three, &builtins.int_literal(4)).0);
}

#[test]
fn union_destination_accepts_each_member() {
    let (_info, builtins) = setup();
    let int_instance = builtins.instance(&builtins.int);
    let str_instance = builtins.instance(&builtins.str);
    let int_or_str = Type::union_of(vec![int_instance.clone(), str_instance.clone()]);
    assert!(assignable(&int_or_str, &int_instance).0);
    assert!(assignable(&int_or_str, &str_instance).0);
    assert!(assignable(&int_or_str, &int_or_str).0);
    assert!(!assignable(&int_instance, &int_or_str).0);
}

#[test]
fn invariant_container_arguments() {
    let (_info, builtins) = setup();
    let list_int = builtins.list_of(builtins.instance(&builtins.int));
    let list_bool = builtins.list_of(builtins.instance(&builtins.bool));
    let list_any = builtins.list_of(Type::any());
    assert!(assignable(&list_int, &list_int).0);
    assert!(!assignable(&list_int, &list_bool).0, "list is invariant");
    assert!(assignable(&list_int, &list_any).0);
    assert!(assignable(&list_any, &list_int).0);
}

#[test]
fn covariant_iterator_arguments() {
    let (_info, builtins) = setup();
    let iter_int = builtins.iterator_of(builtins.instance(&builtins.int));
    let iter_bool = builtins.iterator_of(builtins.instance(&builtins.bool));
    assert!(assignable(&iter_int, &iter_bool).0, "Iterator is covariant");
    assert!(!assignable(&iter_bool, &iter_int).0);
}

#[test]
fn list_assigns_to_iterable_through_mro() {
    let (_info, builtins) = setup();
    let list_int = builtins.list_of(builtins.instance(&builtins.int));
    let iterable_int = builtins.iterable_of(builtins.instance(&builtins.int));
    assert!(assignable(&iterable_int, &list_int).0);
    assert!(!assignable(&list_int, &iterable_int).0);
}
