//! Flow-sensitive narrowing scenarios.

mod common;

use common::{assert_rule_count, check};
use pyz_ast::BinaryOperator;
use pyz_common::Rule;

/// `def g(x: Union[int, str]) -> int:` with an isinstance split checks
/// clean: the then-branch sees str, the fall-through sees int.
#[test]
fn isinstance_narrows_both_branches() {
    let diagnostics = check(|b| {
        let union = b.name("Union");
        let int_arg = b.name("int");
        let str_arg = b.name("str");
        let annotation = b.index(union, vec![int_arg, str_arg]);
        let x_param = b.param("x", Some(annotation), None);

        // if isinstance(x, str): return len(x)
        let isinstance = b.name("isinstance");
        let x_test = b.name("x");
        let str_filter = b.name("str");
        let a0 = b.arg(x_test);
        let a1 = b.arg(str_filter);
        let test = b.call(isinstance, vec![a0, a1]);
        let len_name = b.name("len");
        let x_len = b.name("x");
        let len_arg = b.arg(x_len);
        let len_call = b.call(len_name, vec![len_arg]);
        let ret_then = b.ret(Some(len_call));
        let if_stmt = b.if_(test, vec![ret_then], vec![]);

        // return x  (narrowed to int here)
        let x_tail = b.name("x");
        let ret_tail = b.ret(Some(x_tail));

        let ret_ann = b.name("int");
        let g = b.func("g", vec![x_param], Some(ret_ann), vec![if_stmt, ret_tail]);
        vec![g]
    });
    assert!(
        diagnostics.is_empty(),
        "expected a clean pass, got {diagnostics:#?}"
    );
}

/// After `if x is not None:` the then-branch type has no None; the
/// else-branch is exactly None.
#[test]
fn is_not_none_narrows() {
    let diagnostics = check(|b| {
        let optional = b.name("Optional");
        let int_arg = b.name("int");
        let annotation = b.index(optional, vec![int_arg]);
        let x_param = b.param("x", Some(annotation), None);

        // if x is not None: return x
        let x_test = b.name("x");
        let none = b.none();
        let test = b.binary(BinaryOperator::IsNot, x_test, none);
        let x_then = b.name("x");
        let ret_then = b.ret(Some(x_then));
        let if_stmt = b.if_(test, vec![ret_then], vec![]);

        // return 0
        let zero = b.int(0);
        let ret_tail = b.ret(Some(zero));

        let ret_ann = b.name("int");
        let f = b.func("f", vec![x_param], Some(ret_ann), vec![if_stmt, ret_tail]);
        vec![f]
    });
    assert!(
        diagnostics.is_empty(),
        "expected a clean pass, got {diagnostics:#?}"
    );
}

/// `if x is None: return 0` leaves the remainder narrowed to int.
#[test]
fn is_none_early_return_narrows_the_tail() {
    let diagnostics = check(|b| {
        let optional = b.name("Optional");
        let int_arg = b.name("int");
        let annotation = b.index(optional, vec![int_arg]);
        let x_param = b.param("x", Some(annotation), None);

        let x_test = b.name("x");
        let none = b.none();
        let test = b.binary(BinaryOperator::Is, x_test, none);
        let zero = b.int(0);
        let ret_then = b.ret(Some(zero));
        let if_stmt = b.if_(test, vec![ret_then], vec![]);

        // return x.bit_length()  -- legal: x cannot be None here
        let x_tail = b.name("x");
        let member = b.member(x_tail, "bit_length");
        let call = b.call0(member);
        let ret_tail = b.ret(Some(call));

        let ret_ann = b.name("int");
        let f = b.func("f", vec![x_param], Some(ret_ann), vec![if_stmt, ret_tail]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::OptionalMemberAccess, 0);
    assert!(
        diagnostics.is_empty(),
        "expected a clean pass, got {diagnostics:#?}"
    );
}

/// Ternary branches evaluate under the test's constraints.
#[test]
fn ternary_narrows_branches() {
    let diagnostics = check(|b| {
        let optional = b.name("Optional");
        let int_arg = b.name("int");
        let annotation = b.index(optional, vec![int_arg]);
        let x_param = b.param("x", Some(annotation), None);

        // return x.bit_length() if x is not None else 0
        let x_test = b.name("x");
        let none = b.none();
        let test = b.binary(BinaryOperator::IsNot, x_test, none);
        let x_then = b.name("x");
        let member = b.member(x_then, "bit_length");
        let then_expr = b.call0(member);
        let else_expr = b.int(0);
        let ternary = b.ternary(test, then_expr, else_expr);
        let ret = b.ret(Some(ternary));

        let ret_ann = b.name("int");
        let f = b.func("f", vec![x_param], Some(ret_ann), vec![ret]);
        vec![f]
    });
    assert!(
        diagnostics.is_empty(),
        "expected a clean pass, got {diagnostics:#?}"
    );
}

/// `x and x.bit_length()` narrows the right-hand side.
#[test]
fn boolean_and_narrows_right_operand() {
    let diagnostics = check(|b| {
        let optional = b.name("Optional");
        let int_arg = b.name("int");
        let annotation = b.index(optional, vec![int_arg]);
        let x_param = b.param("x", Some(annotation), None);

        let x_left = b.name("x");
        let x_right = b.name("x");
        let member = b.member(x_right, "bit_length");
        let call = b.call0(member);
        let and = b.binary(BinaryOperator::And, x_left, call);
        let stmt = b.expr_stmt(and);
        let f = b.func("f", vec![x_param], None, vec![stmt]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::OptionalMemberAccess, 0);
}

/// An assert pins its condition for the remainder of the suite.
#[test]
fn assert_narrows_the_tail() {
    let diagnostics = check(|b| {
        let optional = b.name("Optional");
        let int_arg = b.name("int");
        let annotation = b.index(optional, vec![int_arg]);
        let x_param = b.param("x", Some(annotation), None);

        let x_test = b.name("x");
        let none = b.none();
        let test = b.binary(BinaryOperator::IsNot, x_test, none);
        let assert_stmt = b.assert_(test, None);

        let x_tail = b.name("x");
        let ret = b.ret(Some(x_tail));
        let ret_ann = b.name("int");
        let f = b.func("f", vec![x_param], Some(ret_ann), vec![assert_stmt, ret]);
        vec![f]
    });
    assert!(
        diagnostics.is_empty(),
        "expected a clean pass, got {diagnostics:#?}"
    );
}

/// Equality against a literal narrows to the literal on the true branch.
#[test]
fn literal_equality_narrows() {
    let diagnostics = check(|b| {
        let union = b.name("Union");
        let int_arg = b.name("int");
        let str_arg = b.name("str");
        let annotation = b.index(union, vec![int_arg, str_arg]);
        let x_param = b.param("x", Some(annotation), None);

        // if x == "go": y: str = x
        let x_test = b.name("x");
        let go = b.str_("go");
        let test = b.binary(BinaryOperator::Equal, x_test, go);
        let x_then = b.name("x");
        let str_ann = b.name("str");
        let y_target = b.name("y");
        let assign = b.ann_assign(y_target, str_ann, Some(x_then));
        let if_stmt = b.if_(test, vec![assign], vec![]);
        let f = b.func("f", vec![x_param], None, vec![if_stmt]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}
