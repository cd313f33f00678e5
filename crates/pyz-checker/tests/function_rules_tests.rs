//! Function-signature rules: unknown parameter types, self/cls naming,
//! return-path validation, NoReturn, and default-initializer calls.

mod common;

use common::{assert_rule_count, check, check_with_options, with_rule};
use pyz_binder::BinderOptions;
use pyz_common::Rule;

#[test]
fn unannotated_parameter_is_reported() {
    let diagnostics = check(|b| {
        let x_param = b.param("x", None, None);
        let pass = b.pass_();
        let f = b.func("f", vec![x_param], None, vec![pass]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::UnknownParameterType, 1);
}

#[test]
fn partially_unknown_parameter_is_reported() {
    let diagnostics = check(|b| {
        // list[Unknown] via a bare `list` annotation stays fully unknown-free
        // (Any fill), so use a list of an undefined name.
        let list_name = b.name("list");
        let missing = b.name("NotDefined");
        let annotation = b.index(list_name, vec![missing]);
        let x_param = b.param("x", Some(annotation), None);
        let pass = b.pass_();
        let f = b.func("f", vec![x_param], None, vec![pass]);
        vec![f]
    });
    let found = with_rule(&diagnostics, Rule::UnknownParameterType);
    assert_eq!(found.len(), 1, "got {diagnostics:#?}");
    assert!(found[0].message.contains("partially unknown"));
    assert_rule_count(&diagnostics, Rule::UndefinedVariable, 1);
}

#[test]
fn stub_files_skip_unknown_parameter_reporting() {
    let options = BinderOptions {
        is_stub_file: true,
        ..BinderOptions::default()
    };
    let diagnostics = check_with_options(options, |b| {
        let x_param = b.param("x", None, None);
        let pass = b.pass_();
        let f = b.func("f", vec![x_param], None, vec![pass]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::UnknownParameterType, 0);
}

#[test]
fn instance_method_requires_self() {
    let diagnostics = check(|b| {
        let int_ann = b.name("int");
        let x_param = b.param("x", Some(int_ann), None);
        let pass = b.pass_();
        let m = b.func("m", vec![x_param], None, vec![pass]);
        let c = b.class_("C", vec![], vec![m]);
        vec![c]
    });
    let found = with_rule(&diagnostics, Rule::SelfClsParameterName);
    assert_eq!(found.len(), 1, "got {diagnostics:#?}");
    assert!(found[0].message.contains("self"));
}

#[test]
fn static_method_must_not_take_self() {
    let diagnostics = check(|b| {
        let static_dec = b.name("staticmethod");
        let self_param = b.param("self", None, None);
        let pass = b.pass_();
        let m = b.func_full("m", vec![self_param], None, vec![static_dec], vec![pass], false);
        let c = b.class_("C", vec![], vec![m]);
        vec![c]
    });
    assert_rule_count(&diagnostics, Rule::SelfClsParameterName, 1);
}

#[test]
fn class_method_requires_cls() {
    let diagnostics = check(|b| {
        let classmethod_dec = b.name("classmethod");
        let self_param = b.param("self", None, None);
        let pass = b.pass_();
        let m = b.func_full("m", vec![self_param], None, vec![classmethod_dec], vec![pass], false);
        let c = b.class_("C", vec![], vec![m]);
        vec![c]
    });
    let found = with_rule(&diagnostics, Rule::SelfClsParameterName);
    assert_eq!(found.len(), 1, "got {diagnostics:#?}");
    assert!(found[0].message.contains("cls"));
}

#[test]
fn well_formed_method_signatures_are_clean() {
    let diagnostics = check(|b| {
        let self_param = b.param("self", None, None);
        let pass_1 = b.pass_();
        let m = b.func("m", vec![self_param], None, vec![pass_1]);
        let static_dec = b.name("staticmethod");
        let int_ann = b.name("int");
        let x_param = b.param("x", Some(int_ann), None);
        let pass_2 = b.pass_();
        let s = b.func_full("s", vec![x_param], None, vec![static_dec], vec![pass_2], false);
        let c = b.class_("C", vec![], vec![m, s]);
        vec![c]
    });
    assert_rule_count(&diagnostics, Rule::SelfClsParameterName, 0);
}

/// A declared non-optional return with a falling-off body is an error.
#[test]
fn missing_return_is_reported() {
    let diagnostics = check(|b| {
        let int_ann = b.name("int");
        let print_name = b.name("print");
        let call = b.call0(print_name);
        let stmt = b.expr_stmt(call);
        let f = b.func("f", vec![], Some(int_ann), vec![stmt]);
        vec![f]
    });
    let found = with_rule(&diagnostics, Rule::GeneralTypeIssues);
    assert_eq!(found.len(), 1, "got {diagnostics:#?}");
    assert!(found[0].message.contains("all code paths"));
}

/// `Optional[int]` admits the implicit None fall-through.
#[test]
fn optional_return_admits_fall_through() {
    let diagnostics = check(|b| {
        let optional = b.name("Optional");
        let int_name = b.name("int");
        let annotation = b.index(optional, vec![int_name]);
        let print_name = b.name("print");
        let call = b.call0(print_name);
        let stmt = b.expr_stmt(call);
        let f = b.func("f", vec![], Some(annotation), vec![stmt]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}

/// A NoReturn function cannot return.
#[test]
fn noreturn_function_cannot_return() {
    let diagnostics = check(|b| {
        let noreturn = b.name("NoReturn");
        let one = b.int(1);
        let ret = b.ret(Some(one));
        let f = b.func("f", vec![], Some(noreturn), vec![ret]);
        vec![f]
    });
    let found = with_rule(&diagnostics, Rule::GeneralTypeIssues);
    assert_eq!(found.len(), 1, "got {diagnostics:#?}");
    assert!(found[0].message.contains("NoReturn"));
}

/// Return-type mismatches surface at the return expression.
#[test]
fn return_type_mismatch_is_reported() {
    let diagnostics = check(|b| {
        let int_ann = b.name("int");
        let text = b.str_("nope");
        let ret = b.ret(Some(text));
        let f = b.func("f", vec![], Some(int_ann), vec![ret]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 1);
}

/// Calls inside default-value initialisers are flagged outside stubs.
#[test]
fn call_in_default_initializer_is_reported() {
    let diagnostics = check(|b| {
        let list_callee = b.name("list");
        let default = b.call0(list_callee);
        let x_param = b.param("x", None, Some(default));
        let pass = b.pass_();
        let f = b.func("f", vec![x_param], None, vec![pass]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::CallInDefaultInitializer, 1);
}

/// Unannotated lambda parameters report under the lambda rule.
#[test]
fn unknown_lambda_parameter_is_reported() {
    let diagnostics = check(|b| {
        let v_param = b.param("v", None, None);
        let v_use = b.name("v");
        let lambda = b.lambda_(vec![v_param], v_use);
        let target = b.name("f");
        let assign = b.assign(target, lambda);
        vec![assign]
    });
    assert_rule_count(&diagnostics, Rule::UnknownLambdaType, 1);
}
