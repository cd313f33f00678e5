//! Constructor matching: default constructors, data-class synthesis,
//! abstract classes, and NamedTuple synthesis.

mod common;

use common::{assert_rule_count, check, with_rule};
use pyz_common::Rule;

/// A class with no custom constructor rejects arguments.
#[test]
fn default_constructor_expects_no_arguments() {
    let diagnostics = check(|b| {
        let pass = b.pass_();
        let c = b.class_("C", vec![], vec![pass]);
        let c_use = b.name("C");
        let one = b.int(1);
        let arg = b.arg(one);
        let call = b.call(c_use, vec![arg]);
        let stmt = b.expr_stmt(call);
        vec![c, stmt]
    });
    let found = with_rule(&diagnostics, Rule::GeneralTypeIssues);
    assert_eq!(found.len(), 1, "got {diagnostics:#?}");
    assert!(found[0].message.contains("Expected no arguments"));
}

#[test]
fn default_constructor_accepts_empty_call() {
    let diagnostics = check(|b| {
        let pass = b.pass_();
        let c = b.class_("C", vec![], vec![pass]);
        let c_use = b.name("C");
        let call = b.call0(c_use);
        let target = b.name("instance");
        let assign = b.assign(target, call);
        vec![c, assign]
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}

/// `__init__` drives argument validation and the instance type.
#[test]
fn custom_init_validates_arguments() {
    let diagnostics = check(|b| {
        let self_param = b.param("self", None, None);
        let int_ann = b.name("int");
        let x_param = b.param("x", Some(int_ann), None);
        let none_ret = b.none();
        let init_body_target = b.name("ignored");
        let zero = b.int(0);
        let init_body = b.assign(init_body_target, zero);
        let init = b.func("__init__", vec![self_param, x_param], Some(none_ret), vec![init_body]);
        let c = b.class_("C", vec![], vec![init]);

        // C("wrong") mismatches; C(3) is fine.
        let c_bad = b.name("C");
        let bad_value = b.str_("wrong");
        let bad_arg = b.arg(bad_value);
        let bad_call = b.call(c_bad, vec![bad_arg]);
        let bad_stmt = b.expr_stmt(bad_call);

        let c_good = b.name("C");
        let good_value = b.int(3);
        let good_arg = b.arg(good_value);
        let good_call = b.call(c_good, vec![good_arg]);
        let good_stmt = b.expr_stmt(good_call);

        vec![c, bad_stmt, good_stmt]
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 1);
}

/// `@dataclass` synthesises `__init__` from the annotated fields.
#[test]
fn dataclass_init_is_synthesized() {
    let diagnostics = check(|b| {
        let dataclass = b.name("dataclass");
        let int_ann = b.name("int");
        let x_target = b.name("x");
        let x_field = b.ann_assign(x_target, int_ann, None);
        let str_ann = b.name("str");
        let y_target = b.name("y");
        let y_field = b.ann_assign(y_target, str_ann, None);
        let point = b.class_full("Point", vec![], vec![dataclass], vec![x_field, y_field]);

        let p_use = b.name("Point");
        let one = b.int(1);
        let label = b.str_("a");
        let a0 = b.arg(one);
        let a1 = b.arg(label);
        let call = b.call(p_use, vec![a0, a1]);
        let target = b.name("p");
        let assign = b.assign(target, call);
        vec![point, assign]
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}

/// A missing data-class field argument is reported.
#[test]
fn dataclass_missing_argument_is_reported() {
    let diagnostics = check(|b| {
        let dataclass = b.name("dataclass");
        let int_ann = b.name("int");
        let x_target = b.name("x");
        let x_field = b.ann_assign(x_target, int_ann, None);
        let str_ann = b.name("str");
        let y_target = b.name("y");
        let y_field = b.ann_assign(y_target, str_ann, None);
        let point = b.class_full("Point", vec![], vec![dataclass], vec![x_field, y_field]);

        let p_use = b.name("Point");
        let one = b.int(1);
        let a0 = b.arg(one);
        let call = b.call(p_use, vec![a0]);
        let stmt = b.expr_stmt(call);
        vec![point, stmt]
    });
    let found = with_rule(&diagnostics, Rule::GeneralTypeIssues);
    assert_eq!(found.len(), 1, "got {diagnostics:#?}");
    assert!(found[0].message.contains("Argument missing"));
    assert!(found[0].message.contains("\"y\""));
}

/// Instantiating a class with unimplemented abstract methods is an error
/// naming the offenders.
#[test]
fn abstract_class_instantiation_is_reported() {
    let diagnostics = check(|b| {
        let abstract_dec = b.name("abstractmethod");
        let self_param = b.param("self", None, None);
        let int_ret = b.name("int");
        let ellipsis = b.ellipsis();
        let m_body = b.expr_stmt(ellipsis);
        let m = b.func_full("compute", vec![self_param], Some(int_ret), vec![abstract_dec], vec![m_body], false);
        let base = b.class_("Base", vec![], vec![m]);

        let base_use = b.name("Base");
        let call = b.call0(base_use);
        let stmt = b.expr_stmt(call);
        vec![base, stmt]
    });
    let found = with_rule(&diagnostics, Rule::GeneralTypeIssues);
    assert_eq!(found.len(), 1, "got {diagnostics:#?}");
    assert!(found[0].message.contains("abstract"));
    assert!(found[0].message.contains("compute"));
}

/// A concrete subclass instantiates cleanly.
#[test]
fn concrete_subclass_instantiates() {
    let diagnostics = check(|b| {
        let abstract_dec = b.name("abstractmethod");
        let self_1 = b.param("self", None, None);
        let int_ret_1 = b.name("int");
        let ellipsis = b.ellipsis();
        let m_body = b.expr_stmt(ellipsis);
        let m = b.func_full("compute", vec![self_1], Some(int_ret_1), vec![abstract_dec], vec![m_body], false);
        let base = b.class_("Base", vec![], vec![m]);

        let self_2 = b.param("self", None, None);
        let int_ret_2 = b.name("int");
        let zero = b.int(0);
        let ret = b.ret(Some(zero));
        let concrete_m = b.func("compute", vec![self_2], Some(int_ret_2), vec![ret]);
        let base_name = b.name("Base");
        let base_arg = b.arg(base_name);
        let derived = b.class_("Derived", vec![base_arg], vec![concrete_m]);

        let derived_use = b.name("Derived");
        let call = b.call0(derived_use);
        let target = b.name("d");
        let assign = b.assign(target, call);
        vec![base, derived, assign]
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
}

/// `NamedTuple("P", [...])` synthesises a constructible class with one
/// identity per call site.
#[test]
fn named_tuple_synthesis() {
    let diagnostics = check(|b| {
        // P = NamedTuple("P", [("x", int)])
        let named_tuple = b.name("NamedTuple");
        let type_name = b.str_("P");
        let field_name = b.str_("x");
        let int_name = b.name("int");
        let field = b.tuple_(vec![field_name, int_name]);
        let fields = b.list_(vec![field]);
        let a0 = b.arg(type_name);
        let a1 = b.arg(fields);
        let call = b.call(named_tuple, vec![a0, a1]);
        let p_target = b.name("P");
        let assign = b.assign(p_target, call);

        // P(3) type-checks.
        let p_use = b.name("P");
        let three = b.int(3);
        let arg = b.arg(three);
        let construct = b.call(p_use, vec![arg]);
        let instance = b.name("p");
        let construct_assign = b.assign(instance, construct);
        vec![assign, construct_assign]
    });
    assert_rule_count(&diagnostics, Rule::GeneralTypeIssues, 0);
    assert_rule_count(&diagnostics, Rule::UntypedNamedTuple, 0);
}

/// String-only field lists are flagged as untyped.
#[test]
fn untyped_named_tuple_is_reported() {
    let diagnostics = check(|b| {
        let named_tuple = b.name("NamedTuple");
        let type_name = b.str_("P");
        let field_name = b.str_("x");
        let fields = b.list_(vec![field_name]);
        let a0 = b.arg(type_name);
        let a1 = b.arg(fields);
        let call = b.call(named_tuple, vec![a0, a1]);
        let p_target = b.name("P");
        let assign = b.assign(p_target, call);
        vec![assign]
    });
    assert_rule_count(&diagnostics, Rule::UntypedNamedTuple, 1);
}
