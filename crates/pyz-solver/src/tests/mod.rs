//! Solver unit tests.

mod assignability_tests;
mod member_lookup_tests;
mod narrowing_tests;
mod type_law_tests;
mod union_tests;

use crate::Builtins;
use pyz_ast::TreeBuilder;
use pyz_binder::{BinderInfo, BinderOptions, bind_module};
use pyz_common::DiagnosticSink;

/// An empty bound module with the builtin registry installed.
pub(crate) fn setup() -> (BinderInfo, Builtins) {
    let mut builder = TreeBuilder::new();
    let module = builder.module(vec![]);
    let arena = builder.finish();
    let sink = DiagnosticSink::new();
    let mut info = bind_module(&arena, module, BinderOptions::default(), &sink);
    let builtins = Builtins::install(&mut info);
    (info, builtins)
}
