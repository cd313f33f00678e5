//! Statement-level rules: raise/except, assert, private access, constant
//! redefinition, string-literal hygiene, and tuple indexing.

mod common;

use common::{assert_rule_count, check, check_with_options, with_rule};
use pyz_ast::NodeKind;
use pyz_binder::BinderOptions;
use pyz_common::Rule;

/// `raise 3` is not an exception.
#[test]
fn raising_a_non_exception_is_reported() {
    let diagnostics = check(|b| {
        let three = b.int(3);
        let raise = b.raise_(Some(three), None);
        vec![raise]
    });
    let found = with_rule(&diagnostics, Rule::GeneralTypeIssues);
    assert_eq!(found.len(), 1, "got {diagnostics:#?}");
    assert!(found[0].message.contains("BaseException"));
}

/// Raising an exception class or instance is fine.
#[test]
fn raising_exceptions_is_clean() {
    let diagnostics = check(|b| {
        let cls = b.name("ValueError");
        let raise_class = b.raise_(Some(cls), None);
        let cls_2 = b.name("ValueError");
        let message = b.str_("bad");
        let arg = b.arg(message);
        let instance = b.call(cls_2, vec![arg]);
        let raise_instance = b.raise_(Some(instance), None);
        vec![raise_class, raise_instance]
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}

/// `except ValueError as e:` binds the instance form.
#[test]
fn except_binds_the_instance() {
    let diagnostics = check(|b| {
        let body_pass = b.pass_();
        let filter = b.name("ValueError");
        // e.args-free check: pass the exception to a str-typed annotation
        // through `repr`, which accepts object.
        let e_use = b.name("e");
        let repr_name = b.name("repr");
        let arg = b.arg(e_use);
        let call = b.call(repr_name, vec![arg]);
        let target = b.name("text");
        let str_ann = b.name("str");
        let handler_stmt = b.ann_assign(target, str_ann, Some(call));
        let handler = b.except(Some(filter), Some("e"), vec![handler_stmt]);
        let try_stmt = b.try_(vec![body_pass], vec![handler], vec![], vec![]);
        vec![try_stmt]
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}

/// A non-class except filter is reported.
#[test]
fn except_with_non_class_filter_is_reported() {
    let diagnostics = check(|b| {
        let body_pass = b.pass_();
        let filter = b.int(3);
        let handler_pass = b.pass_();
        let handler = b.except(Some(filter), None, vec![handler_pass]);
        let try_stmt = b.try_(vec![body_pass], vec![handler], vec![], vec![]);
        vec![try_stmt]
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 1);
}

/// `assert (x, "message")` is always true.
#[test]
fn assert_on_tuple_is_reported() {
    let diagnostics = check(|b| {
        let x = b.int(1);
        let message = b.str_("oops");
        let tuple = b.tuple_(vec![x, message]);
        let assert_stmt = b.assert_(tuple, None);
        vec![assert_stmt]
    });
    assert_rule_count(&diagnostics, Rule::AssertAlwaysTrue, 1);
}

/// Private members are inaccessible outside their declaring class.
#[test]
fn private_member_access_is_reported_outside_the_class() {
    let diagnostics = check(|b| {
        // class C: def __init__(self) -> None: self.__secret = 1
        let self_param = b.param("self", None, None);
        let self_use = b.name("self");
        let member_target = b.member(self_use, "__secret");
        let one = b.int(1);
        let assign = b.assign(member_target, one);
        let none_ret = b.none();
        let init = b.func("__init__", vec![self_param], Some(none_ret), vec![assign]);
        let c = b.class_("C", vec![], vec![init]);

        // C().__secret
        let c_use = b.name("C");
        let instance = b.call0(c_use);
        let access = b.member(instance, "__secret");
        let stmt = b.expr_stmt(access);
        vec![c, stmt]
    });
    assert_rule_count(&diagnostics, Rule::PrivateUsage, 1);
}

/// Protected members are open to subclasses.
#[test]
fn protected_member_access_from_subclass_is_clean() {
    let diagnostics = check(|b| {
        let self_param_1 = b.param("self", None, None);
        let self_use_1 = b.name("self");
        let member_target = b.member(self_use_1, "_value");
        let one = b.int(1);
        let assign = b.assign(member_target, one);
        let none_ret_1 = b.none();
        let init = b.func("__init__", vec![self_param_1], Some(none_ret_1), vec![assign]);
        let base = b.class_("Base", vec![], vec![init]);

        // class Sub(Base): def get(self) -> int: return Base()._value
        let self_param_2 = b.param("self", None, None);
        let base_use = b.name("Base");
        let instance = b.call0(base_use);
        let access = b.member(instance, "_value");
        let ret = b.ret(Some(access));
        let int_ret = b.name("int");
        let get = b.func("get", vec![self_param_2], Some(int_ret), vec![ret]);
        let base_arg_name = b.name("Base");
        let base_arg = b.arg(base_arg_name);
        let sub = b.class_("Sub", vec![base_arg], vec![get]);
        vec![base, sub]
    });
    assert_rule_count(&diagnostics, Rule::PrivateUsage, 0);
}

#[test]
fn protected_member_access_outside_hierarchy_is_reported() {
    let diagnostics = check(|b| {
        let self_param = b.param("self", None, None);
        let self_use = b.name("self");
        let member_target = b.member(self_use, "_value");
        let one = b.int(1);
        let assign = b.assign(member_target, one);
        let none_ret = b.none();
        let init = b.func("__init__", vec![self_param], Some(none_ret), vec![assign]);
        let base = b.class_("Base", vec![], vec![init]);

        let base_use = b.name("Base");
        let instance = b.call0(base_use);
        let access = b.member(instance, "_value");
        let stmt = b.expr_stmt(access);
        vec![base, stmt]
    });
    assert_rule_count(&diagnostics, Rule::PrivateUsage, 1);
}

/// A module's underscore members are private to it; accessing one through
/// an imported module reference is reported.
#[test]
fn module_private_member_access_is_reported() {
    let diagnostics = check(|b| {
        let typing = b.alias("typing");
        let import = b.import_(vec![typing]);
        let typing_use = b.name("typing");
        let access = b.member(typing_use, "_SpecialForm");
        let stmt = b.expr_stmt(access);
        vec![import, stmt]
    });
    assert_rule_count(&diagnostics, Rule::PrivateUsage, 1);
    // The member itself resolves; only the access is illegal.
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}

/// The declaring module may use its own private members.
#[test]
fn module_private_member_access_within_module_is_clean() {
    let options = BinderOptions {
        path: "typing.py".into(),
        ..BinderOptions::default()
    };
    let diagnostics = check_with_options(options, |b| {
        let typing = b.alias("typing");
        let import = b.import_(vec![typing]);
        let typing_use = b.name("typing");
        let access = b.member(typing_use, "_SpecialForm");
        let stmt = b.expr_stmt(access);
        vec![import, stmt]
    });
    assert_rule_count(&diagnostics, Rule::PrivateUsage, 0);
}

/// Public module members stay accessible.
#[test]
fn module_public_member_access_is_clean() {
    let diagnostics = check(|b| {
        let typing = b.alias("typing");
        let import = b.import_(vec![typing]);
        let typing_use = b.name("typing");
        let access = b.member(typing_use, "Optional");
        let stmt = b.expr_stmt(access);
        vec![import, stmt]
    });
    assert_rule_count(&diagnostics, Rule::PrivateUsage, 0);
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}

/// Reassigning an uppercase module constant is flagged.
#[test]
fn constant_redefinition_is_reported() {
    let diagnostics = check(|b| {
        let one = b.int(1);
        let first_target = b.name("LIMIT");
        let first = b.assign(first_target, one);
        let two = b.int(2);
        let second_target = b.name("LIMIT");
        let second = b.assign(second_target, two);
        vec![first, second]
    });
    assert_rule_count(&diagnostics, Rule::ConstantRedefinition, 1);
}

/// Parser-flagged string literals surface the hygiene rules.
#[test]
fn string_literal_hygiene_rules() {
    let diagnostics = check(|b| {
        let bad_escape = b.add(NodeKind::StringLiteral {
            value: "\\q".into(),
            is_bytes: false,
            has_invalid_escape: true,
            is_implicit_concat: false,
        });
        let stmt_1 = b.expr_stmt(bad_escape);
        let concat = b.add(NodeKind::StringLiteral {
            value: "ab".into(),
            is_bytes: false,
            has_invalid_escape: false,
            is_implicit_concat: true,
        });
        let stmt_2 = b.expr_stmt(concat);
        vec![stmt_1, stmt_2]
    });
    assert_rule_count(&diagnostics, Rule::InvalidStringEscapeSequence, 1);
    assert_rule_count(&diagnostics, Rule::ImplicitStringConcatenation, 1);
}

/// A literal integer index into a tuple resolves the exact element.
#[test]
fn tuple_literal_index_resolves_exact_element() {
    let diagnostics = check(|b| {
        let tuple_name = b.name("tuple");
        let int_name = b.name("int");
        let str_name = b.name("str");
        let annotation = b.index(tuple_name, vec![int_name, str_name]);
        let t_param = b.param("t", Some(annotation), None);

        // y: str = t[1]
        let t_use = b.name("t");
        let one = b.int(1);
        let subscript = b.index(t_use, vec![one]);
        let str_ann = b.name("str");
        let target = b.name("y");
        let assign = b.ann_assign(target, str_ann, Some(subscript));
        let f = b.func("f", vec![t_param], None, vec![assign]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}

#[test]
fn tuple_index_out_of_range_is_reported() {
    let diagnostics = check(|b| {
        let tuple_name = b.name("tuple");
        let int_name = b.name("int");
        let str_name = b.name("str");
        let annotation = b.index(tuple_name, vec![int_name, str_name]);
        let t_param = b.param("t", Some(annotation), None);

        let t_use = b.name("t");
        let five = b.int(5);
        let subscript = b.index(t_use, vec![five]);
        let stmt = b.expr_stmt(subscript);
        let f = b.func("f", vec![t_param], None, vec![stmt]);
        vec![f]
    });
    let found = with_rule(&diagnostics, Rule::GeneralTypeIssues);
    assert_eq!(found.len(), 1, "got {diagnostics:#?}");
    assert!(found[0].message.contains("out of range"));
}

/// A name used before any assignment on the walked path is possibly
/// unbound; an undefined name is reported as such.
#[test]
fn unbound_and_undefined_names() {
    let diagnostics = check(|b| {
        // def f() -> None: print(x); x = 1; print(zzz)
        let print_1 = b.name("print");
        let x_use = b.name("x");
        let a0 = b.arg(x_use);
        let call_1 = b.call(print_1, vec![a0]);
        let stmt_1 = b.expr_stmt(call_1);
        let one = b.int(1);
        let x_target = b.name("x");
        let assign = b.assign(x_target, one);
        let print_2 = b.name("print");
        let zzz = b.name("zzz");
        let a1 = b.arg(zzz);
        let call_2 = b.call(print_2, vec![a1]);
        let stmt_2 = b.expr_stmt(call_2);
        let none_ret = b.none();
        let f = b.func("f", vec![], Some(none_ret), vec![stmt_1, assign, stmt_2]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::UnboundVariable, 1);
    assert_rule_count(&diagnostics, Rule::UndefinedVariable, 1);
}
