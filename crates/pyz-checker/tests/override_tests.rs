//! Method override compatibility and final enforcement.

mod common;

use common::{assert_rule_count, check, with_rule};
use pyz_ast::TreeBuilder;
use pyz_common::Rule;

fn method(
    b: &mut TreeBuilder,
    name: &str,
    param_ann: &str,
    ret_ann: &str,
    decorators: Vec<pyz_ast::NodeId>,
) -> pyz_ast::NodeId {
    let self_param = b.param("self", None, None);
    let ann = b.name(param_ann);
    let x_param = b.param("x", Some(ann), None);
    let ret = b.name(ret_ann);
    let ellipsis = b.ellipsis();
    let body = b.expr_stmt(ellipsis);
    b.func_full(name, vec![self_param, x_param], Some(ret), decorators, vec![body], false)
}

/// `class B(A)` overriding `m(self, x: int)` with `m(self, x: str)` is
/// incompatible, with related info pointing at the base method.
#[test]
fn incompatible_override_is_reported_with_related_info() {
    let diagnostics = check(|b| {
        let m_a = method(b, "m", "int", "int", vec![]);
        let a = b.class_("A", vec![], vec![m_a]);
        let m_b = method(b, "m", "str", "int", vec![]);
        let a_base = b.name("A");
        let base_arg = b.arg(a_base);
        let b_class = b.class_("B", vec![base_arg], vec![m_b]);
        vec![a, b_class]
    });
    let found = with_rule(&diagnostics, Rule::IncompatibleMethodOverride);
    assert_eq!(found.len(), 1, "got {diagnostics:#?}");
    assert_eq!(found[0].related.len(), 1);
}

/// Widening the parameter and narrowing the return is a legal override.
#[test]
fn compatible_override_is_clean() {
    let diagnostics = check(|b| {
        let m_a = method(b, "m", "int", "int", vec![]);
        let a = b.class_("A", vec![], vec![m_a]);
        let m_b = method(b, "m", "object", "bool", vec![]);
        let a_base = b.name("A");
        let base_arg = b.arg(a_base);
        let b_class = b.class_("B", vec![base_arg], vec![m_b]);
        vec![a, b_class]
    });
    assert_rule_count(&diagnostics, Rule::IncompatibleMethodOverride, 0);
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}

/// A `@final` method cannot be overridden at all.
#[test]
fn final_method_override_is_reported() {
    let diagnostics = check(|b| {
        let final_dec = b.name("final");
        let m_a = method(b, "m", "int", "int", vec![final_dec]);
        let a = b.class_("A", vec![], vec![m_a]);
        let m_b = method(b, "m", "int", "int", vec![]);
        let a_base = b.name("A");
        let base_arg = b.arg(a_base);
        let b_class = b.class_("B", vec![base_arg], vec![m_b]);
        vec![a, b_class]
    });
    let found = with_rule(&diagnostics, Rule::GeneralTypeIssues);
    assert_eq!(found.len(), 1, "got {diagnostics:#?}");
    assert!(found[0].message.contains("final"));
}

/// Methods that do not shadow anything check clean.
#[test]
fn unrelated_methods_are_clean() {
    let diagnostics = check(|b| {
        let m_a = method(b, "m", "int", "int", vec![]);
        let a = b.class_("A", vec![], vec![m_a]);
        let m_b = method(b, "other", "str", "str", vec![]);
        let a_base = b.name("A");
        let base_arg = b.arg(a_base);
        let b_class = b.class_("B", vec![base_arg], vec![m_b]);
        vec![a, b_class]
    });
    assert_rule_count(&diagnostics, Rule::IncompatibleMethodOverride, 0);
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}
