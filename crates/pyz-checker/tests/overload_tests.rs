//! Overload declaration and selection.

mod common;

use common::{assert_rule_count, check, with_rule};
use pyz_ast::TreeBuilder;
use pyz_common::Rule;

/// `@overload def f(x: int) -> str` / `@overload def f(x: str) -> int`.
fn overload_pair(b: &mut TreeBuilder) -> Vec<pyz_ast::NodeId> {
    let overload_1 = b.name("overload");
    let int_ann = b.name("int");
    let x1 = b.param("x", Some(int_ann), None);
    let str_ret = b.name("str");
    let ellipsis_1 = b.ellipsis();
    let body_1 = b.expr_stmt(ellipsis_1);
    let f1 = b.func_full("f", vec![x1], Some(str_ret), vec![overload_1], vec![body_1], false);

    let overload_2 = b.name("overload");
    let str_ann = b.name("str");
    let x2 = b.param("x", Some(str_ann), None);
    let int_ret = b.name("int");
    let ellipsis_2 = b.ellipsis();
    let body_2 = b.expr_stmt(ellipsis_2);
    let f2 = b.func_full("f", vec![x2], Some(int_ret), vec![overload_2], vec![body_2], false);

    vec![f1, f2]
}

/// `f(1.0)` matches neither overload; the error lists the argument types.
#[test]
fn no_matching_overload_is_reported_with_argument_types() {
    let diagnostics = check(|b| {
        let mut body = overload_pair(b);
        let f_use = b.name("f");
        let arg_value = b.float(1.0);
        let arg = b.arg(arg_value);
        let call = b.call(f_use, vec![arg]);
        body.push(b.expr_stmt(call));
        body
    });
    let found = with_rule(&diagnostics, Rule::GeneralTypeIssues);
    assert_eq!(found.len(), 1, "got {diagnostics:#?}");
    assert!(found[0].message.contains("No overloads match"));
    assert!(found[0].message.contains("(float)"));
}

/// `f(1)` resolves to the first overload and returns str.
#[test]
fn matching_overload_selects_first_and_returns_its_type() {
    let diagnostics = check(|b| {
        let mut body = overload_pair(b);
        let f_use = b.name("f");
        let arg_value = b.int(1);
        let arg = b.arg(arg_value);
        let call = b.call(f_use, vec![arg]);
        let str_ann = b.name("str");
        let target = b.name("y");
        body.push(b.ann_assign(target, str_ann, Some(call)));
        body
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}

/// Assigning the str result where int is expected fails, proving the
/// selected overload's return type flows.
#[test]
fn selected_overload_return_type_is_enforced() {
    let diagnostics = check(|b| {
        let mut body = overload_pair(b);
        let f_use = b.name("f");
        let arg_value = b.int(1);
        let arg = b.arg(arg_value);
        let call = b.call(f_use, vec![arg]);
        let int_ann = b.name("int");
        let target = b.name("y");
        body.push(b.ann_assign(target, int_ann, Some(call)));
        body
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 1);
}

/// The second overload also resolves, with its own return type.
#[test]
fn second_overload_resolves() {
    let diagnostics = check(|b| {
        let mut body = overload_pair(b);
        let f_use = b.name("f");
        let arg_value = b.str_("s");
        let arg = b.arg(arg_value);
        let call = b.call(f_use, vec![arg]);
        let int_ann = b.name("int");
        let target = b.name("y");
        body.push(b.ann_assign(target, int_ann, Some(call)));
        body
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}

/// Failed probes leave no speculative diagnostics behind.
#[test]
fn probe_diagnostics_are_silenced() {
    let diagnostics = check(|b| {
        let mut body = overload_pair(b);
        // A matching call after a non-matching probe of the first overload.
        let f_use = b.name("f");
        let arg_value = b.str_("s");
        let arg = b.arg(arg_value);
        let call = b.call(f_use, vec![arg]);
        body.push(b.expr_stmt(call));
        body
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}
