//! Optional-access diagnostics: member access, calls, subscripts,
//! iteration and context managers through Optional types.

mod common;

use common::{assert_rule_count, check};
use pyz_common::Rule;

/// `def f(x: Optional[int]) -> int: return x.bit_length()`
#[test]
fn optional_member_access_is_reported_once() {
    let diagnostics = check(|b| {
        let optional = b.name("Optional");
        let int_arg = b.name("int");
        let annotation = b.index(optional, vec![int_arg]);
        let x_param = b.param("x", Some(annotation), None);

        let x_use = b.name("x");
        let member = b.member(x_use, "bit_length");
        let call = b.call0(member);
        let ret = b.ret(Some(call));
        let ret_ann = b.name("int");
        let f = b.func("f", vec![x_param], Some(ret_ann), vec![ret]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::OptionalMemberAccess, 1);
    // The int branch still produces an int; no return-type mismatch.
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}

#[test]
fn optional_call_is_reported() {
    let diagnostics = check(|b| {
        let callable = b.name("Callable");
        let params = b.ellipsis();
        let ret = b.name("int");
        let callable_ann = b.index(callable, vec![params, ret]);
        let optional = b.name("Optional");
        let annotation = b.index(optional, vec![callable_ann]);
        let f_param = b.param("f", Some(annotation), None);

        let f_use = b.name("f");
        let call = b.call0(f_use);
        let stmt = b.expr_stmt(call);
        let outer = b.func("run", vec![f_param], None, vec![stmt]);
        vec![outer]
    });
    assert_rule_count(&diagnostics, Rule::OptionalCall, 1);
}

#[test]
fn optional_subscript_is_reported() {
    let diagnostics = check(|b| {
        let list_name = b.name("list");
        let int_name = b.name("int");
        let list_ann = b.index(list_name, vec![int_name]);
        let optional = b.name("Optional");
        let annotation = b.index(optional, vec![list_ann]);
        let xs_param = b.param("xs", Some(annotation), None);

        let xs_use = b.name("xs");
        let zero = b.int(0);
        let subscript = b.index(xs_use, vec![zero]);
        let stmt = b.expr_stmt(subscript);
        let f = b.func("f", vec![xs_param], None, vec![stmt]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::OptionalSubscript, 1);
}

#[test]
fn optional_iterable_is_reported_and_element_still_flows() {
    let diagnostics = check(|b| {
        let list_name = b.name("list");
        let int_name = b.name("int");
        let list_ann = b.index(list_name, vec![int_name]);
        let optional = b.name("Optional");
        let annotation = b.index(optional, vec![list_ann]);
        let xs_param = b.param("xs", Some(annotation), None);

        // for i in xs: j: int = i
        let xs_use = b.name("xs");
        let i_target = b.name("i");
        let i_use = b.name("i");
        let int_ann = b.name("int");
        let j_target = b.name("j");
        let body_stmt = b.ann_assign(j_target, int_ann, Some(i_use));
        let for_stmt = b.for_(i_target, xs_use, vec![body_stmt]);
        let f = b.func("f", vec![xs_param], None, vec![for_stmt]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::OptionalIterable, 1);
    // The stripped element type is int, so the annotated binding agrees.
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}

#[test]
fn optional_context_manager_is_reported() {
    let diagnostics = check(|b| {
        let optional = b.name("Optional");
        let int_name = b.name("int");
        let annotation = b.index(optional, vec![int_name]);
        let cm_param = b.param("cm", Some(annotation), None);

        let cm_use = b.name("cm");
        let pass = b.pass_();
        let with_stmt = b.with_(
            vec![pyz_ast::WithItem {
                context: cm_use,
                target: None,
            }],
            vec![pass],
        );
        let f = b.func("f", vec![cm_param], None, vec![with_stmt]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::OptionalContextManager, 1);
}

#[test]
fn optional_operand_is_reported() {
    let diagnostics = check(|b| {
        let optional = b.name("Optional");
        let int_name = b.name("int");
        let annotation = b.index(optional, vec![int_name]);
        let x_param = b.param("x", Some(annotation), None);

        let x_use = b.name("x");
        let one = b.int(1);
        let add = b.binary(pyz_ast::BinaryOperator::Add, x_use, one);
        let stmt = b.expr_stmt(add);
        let f = b.func("f", vec![x_param], None, vec![stmt]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::OptionalOperand, 1);
}

#[test]
fn plain_int_access_is_clean() {
    let diagnostics = check(|b| {
        let int_ann = b.name("int");
        let x_param = b.param("x", Some(int_ann), None);
        let x_use = b.name("x");
        let member = b.member(x_use, "bit_length");
        let call = b.call0(member);
        let ret = b.ret(Some(call));
        let ret_ann = b.name("int");
        let f = b.func("f", vec![x_param], Some(ret_ann), vec![ret]);
        vec![f]
    });
    assert!(
        diagnostics.is_empty(),
        "expected no diagnostics, got {diagnostics:#?}"
    );
}
