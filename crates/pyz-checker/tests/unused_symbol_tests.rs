//! Unused-symbol auditing and audit determinism.

mod common;

use common::{assert_rule_count, check};
use pyz_ast::{NodeId, TreeBuilder};
use pyz_common::Rule;

/// A local variable that is never read reports; one that is read does not.
#[test]
fn unused_local_variable_is_reported() {
    let diagnostics = check(|b| {
        let one = b.int(1);
        let x_target = b.name("x");
        let assign = b.assign(x_target, one);
        let two = b.int(2);
        let ret = b.ret(Some(two));
        let int_ann = b.name("int");
        let f = b.func("f", vec![], Some(int_ann), vec![assign, ret]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::UnusedVariable, 1);
}

#[test]
fn read_local_variable_is_clean() {
    let diagnostics = check(|b| {
        let one = b.int(1);
        let x_target = b.name("x");
        let assign = b.assign(x_target, one);
        let x_use = b.name("x");
        let ret = b.ret(Some(x_use));
        let int_ann = b.name("int");
        let f = b.func("f", vec![], Some(int_ann), vec![assign, ret]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::UnusedVariable, 0);
}

/// Leading-underscore names are exempt.
#[test]
fn underscore_names_are_exempt() {
    let diagnostics = check(|b| {
        let one = b.int(1);
        let x_target = b.name("_ignored");
        let assign = b.assign(x_target, one);
        let two = b.int(2);
        let ret = b.ret(Some(two));
        let int_ann = b.name("int");
        let f = b.func("f", vec![], Some(int_ann), vec![assign, ret]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::UnusedVariable, 0);
}

/// Functions and classes report only when scope-private (nested).
#[test]
fn nested_unused_function_and_class_are_reported() {
    let diagnostics = check(|b| {
        let pass_1 = b.pass_();
        let helper = b.func("helper", vec![], None, vec![pass_1]);
        let pass_2 = b.pass_();
        let local_class = b.class_("Local", vec![], vec![pass_2]);
        let none_ret = b.none();
        let ret = b.ret(Some(none_ret));
        let outer = b.func("outer", vec![], None, vec![helper, local_class, ret]);
        vec![outer]
    });
    assert_rule_count(&diagnostics, Rule::UnusedFunction, 1);
    assert_rule_count(&diagnostics, Rule::UnusedClass, 1);
}

/// Module-level functions are part of the module surface; not reported.
#[test]
fn module_level_function_is_clean() {
    let diagnostics = check(|b| {
        let pass = b.pass_();
        let f = b.func("exported", vec![], None, vec![pass]);
        vec![f]
    });
    assert_rule_count(&diagnostics, Rule::UnusedFunction, 0);
}

fn unused_module(b: &mut TreeBuilder) -> Vec<NodeId> {
    let one = b.int(1);
    let x_target = b.name("x");
    let assign = b.assign(x_target, one);
    let os = b.alias("os");
    let import = b.import_(vec![os]);
    let two = b.int(2);
    let ret = b.ret(Some(two));
    let int_ann = b.name("int");
    let f = b.func("f", vec![], Some(int_ann), vec![assign, ret]);
    vec![import, f]
}

/// Running the audit twice over the same tree yields identical output.
#[test]
fn audit_is_deterministic() {
    let first = check(unused_module);
    let second = check(unused_module);
    assert_eq!(first, second);
}
