//! Diagnostics - the structured output of a check pass.
//!
//! Every rule violation the checker finds becomes a `Diagnostic`: a severity,
//! a rule identifier from the closed catalogue, a message, and a source span.
//! Diagnostics are collected in a `DiagnosticSink`; they are never raised as
//! errors, so one pass produces the maximum useful output per run.
//!
//! The sink supports scoped silencing for speculative evaluation (overload
//! probing, constructor matching). Silencing is counted, not boolean, so
//! nested speculative regions compose, and the guard restores the count on
//! every exit path including unwinds.

use crate::span::Span;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::cell::{Cell, RefCell};

/// Severity of an emitted diagnostic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Error,
    Warning,
    Information,
}

/// Configured reporting level for a rule.
///
/// `None` suppresses the rule entirely.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub enum RuleLevel {
    #[default]
    Error,
    Warning,
    Information,
    None,
}

impl RuleLevel {
    pub fn severity(self) -> Option<Severity> {
        match self {
            RuleLevel::Error => Some(Severity::Error),
            RuleLevel::Warning => Some(Severity::Warning),
            RuleLevel::Information => Some(Severity::Information),
            RuleLevel::None => None,
        }
    }
}

macro_rules! rules {
    ($($variant:ident => $name:literal : $default:ident),+ $(,)?) => {
        /// The closed diagnostic-rule catalogue.
        ///
        /// Rule identifiers are the strings hosts configure levels by; the
        /// enum keeps rule dispatch exhaustive inside the checker.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
        pub enum Rule {
            $($variant),+
        }

        impl Rule {
            /// The external rule identifier, e.g. `reportGeneralTypeIssues`.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Rule::$variant => $name),+
                }
            }

            /// Parse an external rule identifier.
            pub fn from_str(name: &str) -> Option<Rule> {
                match name {
                    $($name => Some(Rule::$variant),)+
                    _ => None,
                }
            }

            /// The reporting level used when the host supplies no override.
            pub fn default_level(self) -> RuleLevel {
                match self {
                    $(Rule::$variant => RuleLevel::$default),+
                }
            }

            /// All rules, in catalogue order.
            pub const ALL: &'static [Rule] = &[$(Rule::$variant),+];
        }
    };
}

rules! {
    UnknownParameterType => "reportUnknownParameterType" : Warning,
    UnknownLambdaType => "reportUnknownLambdaType" : Warning,
    UnknownVariableType => "reportUnknownVariableType" : Warning,
    UnknownMemberType => "reportUnknownMemberType" : Warning,
    MissingTypeStubs => "reportMissingTypeStubs" : Warning,
    ImportCycles => "reportImportCycles" : Warning,
    UnusedImport => "reportUnusedImport" : Warning,
    UnusedClass => "reportUnusedClass" : Warning,
    UnusedFunction => "reportUnusedFunction" : Warning,
    UnusedVariable => "reportUnusedVariable" : Warning,
    DuplicateImport => "reportDuplicateImport" : Warning,
    OptionalSubscript => "reportOptionalSubscript" : Error,
    OptionalMemberAccess => "reportOptionalMemberAccess" : Error,
    OptionalCall => "reportOptionalCall" : Error,
    OptionalIterable => "reportOptionalIterable" : Error,
    OptionalContextManager => "reportOptionalContextManager" : Error,
    OptionalOperand => "reportOptionalOperand" : Error,
    UntypedFunctionDecorator => "reportUntypedFunctionDecorator" : Warning,
    UntypedClassDecorator => "reportUntypedClassDecorator" : Warning,
    UntypedBaseClass => "reportUntypedBaseClass" : Warning,
    UntypedNamedTuple => "reportUntypedNamedTuple" : Warning,
    PrivateUsage => "reportPrivateUsage" : Error,
    ConstantRedefinition => "reportConstantRedefinition" : Warning,
    IncompatibleMethodOverride => "reportIncompatibleMethodOverride" : Error,
    InvalidStringEscapeSequence => "reportInvalidStringEscapeSequence" : Warning,
    AssertAlwaysTrue => "reportAssertAlwaysTrue" : Warning,
    SelfClsParameterName => "reportSelfClsParameterName" : Error,
    ImplicitStringConcatenation => "reportImplicitStringConcatenation" : Warning,
    UndefinedVariable => "reportUndefinedVariable" : Error,
    UnboundVariable => "reportUnboundVariable" : Error,
    InvalidStubStatement => "reportInvalidStubStatement" : Error,
    CallInDefaultInitializer => "reportCallInDefaultInitializer" : Warning,
    UnnecessaryIsInstance => "reportUnnecessaryIsInstance" : Warning,
    UnnecessaryCast => "reportUnnecessaryCast" : Warning,
    UnsupportedDunderAll => "reportUnsupportedDunderAll" : Warning,
    GeneralTypeIssues => "reportGeneralTypeIssues" : Error,
}

/// Per-rule reporting levels, with catalogue defaults for unset rules.
#[derive(Clone, Debug, Default)]
pub struct RuleLevels {
    overrides: FxHashMap<Rule, RuleLevel>,
}

impl RuleLevels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the level for a rule, replacing any previous override.
    pub fn set(&mut self, rule: Rule, level: RuleLevel) -> &mut Self {
        self.overrides.insert(rule, level);
        self
    }

    /// The effective level for a rule.
    pub fn level_for(&self, rule: Rule) -> RuleLevel {
        self.overrides
            .get(&rule)
            .copied()
            .unwrap_or_else(|| rule.default_level())
    }
}

/// Additional location attached to a diagnostic (e.g. the overridden base
/// method for an override error).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelatedInfo {
    pub message: String,
    pub path: String,
    pub span: Span,
}

/// A machine-applicable action hint attached to a diagnostic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticAction {
    /// The span of the import statement (or name part) that can be deleted.
    RemoveImport { span: Span },
}

/// A single reported problem.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub rule: Rule,
    pub message: String,
    pub span: Span,
    pub related: Vec<RelatedInfo>,
    pub action: Option<DiagnosticAction>,
}

impl Diagnostic {
    pub fn new(severity: Severity, rule: Rule, message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            severity,
            rule,
            message: message.into(),
            span,
            related: Vec::new(),
            action: None,
        }
    }

    pub fn with_related(
        mut self,
        message: impl Into<String>,
        path: impl Into<String>,
        span: Span,
    ) -> Self {
        self.related.push(RelatedInfo {
            message: message.into(),
            path: path.into(),
            span,
        });
        self
    }

    pub fn with_action(mut self, action: DiagnosticAction) -> Self {
        self.action = Some(action);
        self
    }
}

/// Accumulates nested explanatory messages for a failed check, so the final
/// diagnostic can say *why* an assignment was rejected.
///
/// Messages are recorded with a nesting depth and rendered one per line,
/// indented two spaces per level.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticAddendum {
    entries: Vec<(u32, String)>,
    depth: u32,
}

impl DiagnosticAddendum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one explanatory message at the current depth.
    pub fn add(&mut self, message: impl Into<String>) {
        self.entries.push((self.depth, message.into()));
    }

    /// Run `f` with all messages it records nested one level deeper.
    pub fn nested<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the addendum for appending to a diagnostic message.
    ///
    /// Returns an empty string when nothing was recorded.
    pub fn format(&self) -> String {
        let mut out = String::new();
        for (depth, message) in &self.entries {
            out.push('\n');
            for _ in 0..=(*depth) {
                out.push_str("  ");
            }
            out.push_str(message);
        }
        out
    }
}

/// Collects diagnostics for one file pass.
///
/// Interior mutability keeps emission available from shared evaluator
/// borrows; a check pass is single-threaded (one sink per file).
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    items: RefCell<Vec<Diagnostic>>,
    silence: Cell<u32>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a diagnostic unless the sink is currently silenced.
    pub fn push(&self, diagnostic: Diagnostic) {
        if self.silence.get() == 0 {
            self.items.borrow_mut().push(diagnostic);
        }
    }

    /// Number of diagnostics recorded so far.
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// True while a `silenced` scope is active.
    pub fn is_silenced(&self) -> bool {
        self.silence.get() > 0
    }

    /// Run `f` with emission suppressed, restoring the previous state on all
    /// exit paths.
    pub fn silenced<R>(&self, f: impl FnOnce() -> R) -> R {
        struct Guard<'a>(&'a Cell<u32>);
        impl Drop for Guard<'_> {
            fn drop(&mut self) {
                self.0.set(self.0.get() - 1);
            }
        }
        self.silence.set(self.silence.get() + 1);
        let _guard = Guard(&self.silence);
        f()
    }

    /// Extract the accumulated diagnostics, leaving the sink empty.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.items.borrow_mut())
    }

    /// Snapshot of the diagnostics recorded so far.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.items.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(rule: Rule) -> Diagnostic {
        Diagnostic::new(Severity::Error, rule, "boom", Span::new(0, 1))
    }

    #[test]
    fn rule_names_round_trip() {
        for &rule in Rule::ALL {
            assert_eq!(Rule::from_str(rule.as_str()), Some(rule));
        }
    }

    #[test]
    fn levels_fall_back_to_defaults() {
        let mut levels = RuleLevels::new();
        assert_eq!(levels.level_for(Rule::UnusedImport), RuleLevel::Warning);
        levels.set(Rule::UnusedImport, RuleLevel::None);
        assert_eq!(levels.level_for(Rule::UnusedImport), RuleLevel::None);
        assert_eq!(levels.level_for(Rule::GeneralTypeIssues), RuleLevel::Error);
    }

    #[test]
    fn silenced_scope_drops_diagnostics() {
        let sink = DiagnosticSink::new();
        sink.push(diag(Rule::GeneralTypeIssues));
        sink.silenced(|| {
            sink.push(diag(Rule::GeneralTypeIssues));
            sink.silenced(|| sink.push(diag(Rule::GeneralTypeIssues)));
            assert!(sink.is_silenced());
        });
        assert!(!sink.is_silenced());
        sink.push(diag(Rule::GeneralTypeIssues));
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn addendum_indents_nested_messages() {
        let mut addendum = DiagnosticAddendum::new();
        addendum.add("type \"int\" is incompatible with \"str\"");
        addendum.nested(|a| a.add("member \"x\" mismatch"));
        let text = addendum.format();
        assert!(text.contains("\n  type \"int\""));
        assert!(text.contains("\n    member \"x\""));
    }
}
