//! Narrowing primitive tests.

use super::setup;
use crate::narrow::{
    convert_class_to_object, remove_falsy_from_union, remove_none_from_union,
    remove_truthy_from_union, strip_literal_value, transform_type_object_to_class,
};
use crate::types::Type;

#[test]
fn remove_none_narrows_optional() {
    let (_info, builtins) = setup();
    let int_instance = builtins.instance(&builtins.int);
    let optional_int = builtins.optional(int_instance.clone());
    let narrowed = remove_none_from_union(&optional_int);
    assert!(narrowed.is_same(&int_instance, 0));
    // Narrowing None itself empties the type.
    assert!(remove_none_from_union(&Type::None).is_never());
}

#[test]
fn remove_falsy_drops_none_and_falsy_literals() {
    let (_info, builtins) = setup();
    let t = Type::union_of(vec![
        builtins.instance(&builtins.int),
        Type::None,
        builtins.int_literal(0),
        builtins.str_literal(""),
    ]);
    let narrowed = remove_falsy_from_union(&t);
    assert!(narrowed.is_same(&builtins.instance(&builtins.int), 0));
}

#[test]
fn remove_truthy_keeps_possibly_falsy_members() {
    let (_info, builtins) = setup();
    let t = Type::union_of(vec![
        builtins.int_literal(1),
        Type::None,
        builtins.instance(&builtins.str),
    ]);
    let narrowed = remove_truthy_from_union(&t);
    let entries = narrowed.union_entries().expect("union expected");
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().any(|e| e.is_none()));
}

#[test]
fn strip_literal_widens_to_class() {
    let (_info, builtins) = setup();
    let widened = strip_literal_value(&builtins.int_literal(3));
    assert!(widened.is_same(&builtins.instance(&builtins.int), 0));
}

#[test]
fn class_to_object_conversion() {
    let (_info, builtins) = setup();
    let converted = convert_class_to_object(&Type::Class(builtins.int.clone()));
    assert!(converted.is_same(&builtins.instance(&builtins.int), 0));
}

#[test]
fn type_wrapper_unwraps_to_class() {
    let (_info, builtins) = setup();
    let wrapper = builtins.type_of(builtins.instance(&builtins.str));
    let unwrapped = transform_type_object_to_class(&wrapper);
    match unwrapped {
        Type::Class(c) => assert!(c.same_generic_class(&builtins.str)),
        other => panic!("expected a class, got {}", crate::printer::format_type(&other)),
    }
}
