//! MRO member lookup and iterable resolution tests.

use super::setup;
use crate::iterate::{get_type_from_awaitable, get_type_from_iterable};
use crate::members::{
    MemberLookupFlags, bind_function_to_class_or_object, look_up_class_member,
    look_up_object_member, specialize_member_for_class,
};
use crate::types::{Type, TypeSource};

#[test]
fn finds_inherited_members_and_reports_defining_class() {
    let (_info, builtins) = setup();
    // bool inherits bit_length from int.
    let found = look_up_object_member(&builtins.bool, "bit_length").expect("member expected");
    assert!(found.defining_class.same_generic_class(&builtins.int));
    // __eq__ comes from object.
    let found = look_up_object_member(&builtins.bool, "__eq__").expect("member expected");
    assert!(found.defining_class.same_generic_class(&builtins.object));
}

#[test]
fn skip_object_base_hides_universal_members() {
    let (_info, builtins) = setup();
    let found = look_up_class_member(
        &builtins.int,
        "__eq__",
        MemberLookupFlags::SKIP_OBJECT_BASE,
    );
    assert!(found.is_none());
}

#[test]
fn skip_original_class_starts_at_bases() {
    let (_info, builtins) = setup();
    let found = look_up_class_member(
        &builtins.int,
        "bit_length",
        MemberLookupFlags::SKIP_ORIGINAL_CLASS,
    );
    assert!(found.is_none(), "bit_length is declared on int itself");
}

#[test]
fn binding_strips_self() {
    let (_info, builtins) = setup();
    let found = look_up_object_member(&builtins.int, "bit_length").expect("member expected");
    let Type::Function(f) = builtins.symbol_type(found.symbol) else {
        panic!("expected a function member");
    };
    assert_eq!(f.parameters.len(), 1);
    let owner = builtins.instance(&builtins.int);
    let Type::Function(bound) = bind_function_to_class_or_object(&owner, &f) else {
        panic!("binding produced a non-function");
    };
    assert!(bound.parameters.is_empty());
    // Class access leaves the function unbound.
    let Type::Function(unbound) =
        bind_function_to_class_or_object(&Type::Class(builtins.int.clone()), &f)
    else {
        panic!("binding produced a non-function");
    };
    assert_eq!(unbound.parameters.len(), 1);
}

#[test]
fn member_specialization_substitutes_class_arguments() {
    let (_info, builtins) = setup();
    let list_int = builtins.list.clone_for_specialization(vec![builtins.instance(&builtins.int)]);
    let found = look_up_object_member(&list_int, "append").expect("member expected");
    let member = specialize_member_for_class(builtins.symbol_type(found.symbol), &list_int);
    let Type::Function(f) = member else {
        panic!("expected a function member");
    };
    // append(self, object: T) with T := int
    assert!(f.parameter_type(1).is_same(&builtins.instance(&builtins.int), 0));
}

#[test]
fn iterating_a_list_yields_its_element() {
    let (_info, builtins) = setup();
    let list_int = builtins.list_of(builtins.instance(&builtins.int));
    let result = get_type_from_iterable(&list_int, false, false, &builtins);
    let element = result.element_type.expect("list is iterable");
    assert!(element.is_same(&builtins.instance(&builtins.int), 0));
    assert!(!result.had_none);
}

#[test]
fn iterating_an_optional_strips_none_and_flags_it() {
    let (_info, builtins) = setup();
    let optional_list = builtins.optional(builtins.list_of(builtins.instance(&builtins.str)));
    let result = get_type_from_iterable(&optional_list, false, false, &builtins);
    assert!(result.had_none);
    let element = result.element_type.expect("list member is iterable");
    assert!(element.is_same(&builtins.instance(&builtins.str), 0));
}

#[test]
fn getitem_fallback_requires_opt_in() {
    let (_info, builtins) = setup();
    // range has __iter__, so the fallback is irrelevant; bytes has
    // __getitem__ but no __iter__ in this registry.
    let bytes_instance = builtins.instance(&builtins.bytes);
    let without = get_type_from_iterable(&bytes_instance, false, false, &builtins);
    assert!(without.element_type.is_none());
    let with = get_type_from_iterable(&bytes_instance, false, true, &builtins);
    let element = with.element_type.expect("getitem fallback");
    assert!(element.is_same(&builtins.instance(&builtins.int), 0));
}

#[test]
fn awaitable_resolution_reads_the_third_argument() {
    let (_info, builtins) = setup();
    let coro = builtins.coroutine_of(builtins.instance(&builtins.int));
    let awaited = get_type_from_awaitable(&coro, &builtins).expect("awaitable");
    assert!(awaited.is_same(&builtins.instance(&builtins.int), 0));

    let not_awaitable = builtins.instance(&builtins.int);
    assert!(get_type_from_awaitable(&not_awaitable, &builtins).is_none());
}
