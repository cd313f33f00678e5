//! Shared helpers for the checker scenario tests: build a tree through the
//! builder, bind it, check it, and filter the resulting diagnostics.

use pyz_ast::{NodeId, TreeBuilder};
use pyz_binder::BinderOptions;
use pyz_checker::check_module;
use pyz_common::{Diagnostic, Rule};

/// Build a module body and run a full check pass over it.
pub fn check(build: impl FnOnce(&mut TreeBuilder) -> Vec<NodeId>) -> Vec<Diagnostic> {
    check_with_options(BinderOptions::default(), build)
}

#[allow(dead_code)]
pub fn check_with_options(
    options: BinderOptions,
    build: impl FnOnce(&mut TreeBuilder) -> Vec<NodeId>,
) -> Vec<Diagnostic> {
    let mut builder = TreeBuilder::new();
    let body = build(&mut builder);
    let module = builder.module(body);
    let arena = builder.finish();
    check_module(&arena, module, options)
}

#[allow(dead_code)]
pub fn with_rule(diagnostics: &[Diagnostic], rule: Rule) -> Vec<Diagnostic> {
    diagnostics
        .iter()
        .filter(|d| d.rule == rule)
        .cloned()
        .collect()
}

#[allow(dead_code)]
pub fn count_rule(diagnostics: &[Diagnostic], rule: Rule) -> usize {
    with_rule(diagnostics, rule).len()
}

#[allow(dead_code)]
pub fn assert_rule_count(diagnostics: &[Diagnostic], rule: Rule, expected: usize) {
    let found = with_rule(diagnostics, rule);
    assert_eq!(
        found.len(),
        expected,
        "expected {expected} diagnostics under {}, got {:#?}",
        rule.as_str(),
        diagnostics
    );
}
