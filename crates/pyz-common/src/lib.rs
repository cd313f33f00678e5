//! Common types shared by every crate in the pyz workspace.
//!
//! This crate provides:
//! - `Span` - Source location tracking for tree nodes and diagnostics
//! - `Diagnostic` and `DiagnosticSink` - The structured output of a check pass
//! - `Rule` - The closed diagnostic-rule catalogue
//! - `RuleLevels` - Per-rule severity configuration

pub mod diagnostics;
pub mod span;

pub use diagnostics::{
    Diagnostic, DiagnosticAction, DiagnosticAddendum, DiagnosticSink, RelatedInfo, Rule,
    RuleLevel, RuleLevels, Severity,
};
pub use span::{Span, Spanned};
