//! Duplicate-import and unused-import auditing.

mod common;

use common::{assert_rule_count, check, check_with_options, with_rule};
use pyz_binder::BinderOptions;
use pyz_common::{DiagnosticAction, Rule};

/// `import os` twice produces one duplicate-import diagnostic.
#[test]
fn duplicate_import_is_reported_once() {
    let diagnostics = check(|b| {
        let os_1 = b.alias("os");
        let first = b.import_(vec![os_1]);
        let os_2 = b.alias("os");
        let second = b.import_(vec![os_2]);
        vec![first, second]
    });
    assert_rule_count(&diagnostics, Rule::DuplicateImport, 1);
}

/// An aliased re-import is deliberate and not flagged.
#[test]
fn aliased_reimport_is_clean() {
    let diagnostics = check(|b| {
        let os_1 = b.alias("os");
        let first = b.import_(vec![os_1]);
        let os_2 = b.alias_as("os", "operating_system");
        let second = b.import_(vec![os_2]);
        vec![first, second]
    });
    assert_rule_count(&diagnostics, Rule::DuplicateImport, 0);
}

/// Two from-imports of the same symbol duplicate; different symbols do not.
#[test]
fn duplicate_from_import_is_reported() {
    let diagnostics = check(|b| {
        let opt_1 = b.alias("Optional");
        let first = b.import_from("typing", vec![opt_1]);
        let opt_2 = b.alias("Optional");
        let second = b.import_from("typing", vec![opt_2]);
        let union = b.alias("Union");
        let third = b.import_from("typing", vec![union]);
        vec![first, second, third]
    });
    assert_rule_count(&diagnostics, Rule::DuplicateImport, 1);
}

/// An unaccessed import reports with a removal action.
#[test]
fn unused_import_carries_remove_action() {
    let diagnostics = check(|b| {
        let os = b.alias("os");
        vec![b.import_(vec![os])]
    });
    let found = with_rule(&diagnostics, Rule::UnusedImport);
    assert_eq!(found.len(), 1, "got {diagnostics:#?}");
    assert!(matches!(
        found[0].action,
        Some(DiagnosticAction::RemoveImport { .. })
    ));
}

/// An import the module actually uses is not reported.
#[test]
fn used_import_is_clean() {
    let diagnostics = check(|b| {
        let optional = b.alias("Optional");
        let import = b.import_from("typing", vec![optional]);
        // x: Optional[int] = None
        let optional_use = b.name("Optional");
        let int_name = b.name("int");
        let annotation = b.index(optional_use, vec![int_name]);
        let none = b.none();
        let target = b.name("x");
        let assign = b.ann_assign(target, annotation, Some(none));
        vec![import, assign]
    });
    assert_rule_count(&diagnostics, Rule::UnusedImport, 0);
    assert_rule_count(&diagnostics, Rule::MissingTypeStubs, 0);
}

/// Generated files suppress unused-import reporting.
#[test]
fn generated_files_suppress_unused_imports() {
    let options = BinderOptions {
        is_generated: true,
        ..BinderOptions::default()
    };
    let diagnostics = check_with_options(options, |b| {
        let os = b.alias("os");
        vec![b.import_(vec![os])]
    });
    assert_rule_count(&diagnostics, Rule::UnusedImport, 0);
}

/// Modules without stubs are reported under the missing-stubs rule.
#[test]
fn unknown_module_reports_missing_stubs() {
    let diagnostics = check(|b| {
        let os = b.alias_as("os", "my_os");
        let import = b.import_(vec![os]);
        // Access it so unused-import stays quiet.
        let use_it = b.name("my_os");
        let stmt = b.expr_stmt(use_it);
        vec![import, stmt]
    });
    assert_rule_count(&diagnostics, Rule::MissingTypeStubs, 1);
    assert_rule_count(&diagnostics, Rule::UnusedImport, 0);
}
