//! Union normal-form tests.

use super::setup;
use crate::combine::{combine_types, do_for_subtypes};
use crate::types::Type;

#[test]
fn empty_input_is_never() {
    assert!(combine_types(vec![]).is_never());
}

#[test]
fn singleton_collapses() {
    let (_info, builtins) = setup();
    let int_instance = builtins.instance(&builtins.int);
    let combined = combine_types(vec![int_instance.clone()]);
    assert!(combined.is_same(&int_instance, 0));
    assert!(!combined.is_union());
}

#[test]
fn normal_form_is_flat_deduplicated_and_never_free() {
    let (_info, builtins) = setup();
    let int_instance = builtins.instance(&builtins.int);
    let str_instance = builtins.instance(&builtins.str);
    let nested = combine_types(vec![int_instance.clone(), str_instance.clone()]);
    let combined = combine_types(vec![
        nested,
        int_instance.clone(),
        Type::Never,
        Type::None,
        str_instance.clone(),
    ]);
    let entries = combined.union_entries().expect("expected a union");
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| !e.is_union()));
    assert!(entries.iter().all(|e| !e.is_never()));
    // Deduplicated: int and str appear once each.
    assert_eq!(
        entries.iter().filter(|e| e.is_same(&int_instance, 0)).count(),
        1
    );
}

#[test]
fn union_equality_is_order_insensitive() {
    let (_info, builtins) = setup();
    let int_instance = builtins.instance(&builtins.int);
    let str_instance = builtins.instance(&builtins.str);
    let a = combine_types(vec![int_instance.clone(), str_instance.clone()]);
    let b = combine_types(vec![str_instance, int_instance]);
    assert!(a.is_same(&b, 0));
}

#[test]
fn all_never_members_collapse_to_never() {
    let combined = combine_types(vec![Type::Never, Type::Never]);
    assert!(combined.is_never());
}

#[test]
fn do_for_subtypes_filters_and_collapses() {
    let (_info, builtins) = setup();
    let int_instance = builtins.instance(&builtins.int);
    let optional_int = builtins.optional(int_instance.clone());

    let filtered = do_for_subtypes(&optional_int, |entry| {
        if entry.is_none() {
            None
        } else {
            Some(entry.clone())
        }
    });
    assert!(filtered.is_same(&int_instance, 0));

    let emptied = do_for_subtypes(&optional_int, |_| None);
    assert!(emptied.is_never());

    // Non-union input applies the function directly.
    let direct = do_for_subtypes(&int_instance, |entry| Some(entry.clone()));
    assert!(direct.is_same(&int_instance, 0));
}
