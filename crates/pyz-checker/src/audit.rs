//! The end-of-module symbol-table audit.
//!
//! One pass over every scope the binder produced, in creation order, with
//! symbols visited in insertion order so the output is deterministic:
//! unused symbols, obscured declarations, final misuse, type-alias
//! redeclaration, and duplicate imports.

use crate::state::CheckerState;
use pyz_ast::NodeId;
use pyz_binder::{Declaration, DeclarationKind, ScopeKind, SymbolId};
use pyz_common::{Diagnostic, DiagnosticAction, Rule, Span};
use pyz_solver::Type;
use rustc_hash::FxHashSet;

impl<'a> CheckerState<'a> {
    pub(crate) fn audit_symbol_tables(&mut self) {
        self.audit_duplicate_imports();

        let scope_count = self.binder.scopes.len();
        for index in 0..scope_count {
            let scope_id = pyz_binder::ScopeId(index as u32);
            let kind = self.binder.scopes.get(scope_id).kind;
            if kind == ScopeKind::Builtin {
                continue;
            }
            let symbols: Vec<(String, SymbolId)> = self
                .binder
                .scopes
                .get(scope_id)
                .table
                .iter()
                .map(|(name, &symbol)| (name.clone(), symbol))
                .collect();
            for (name, symbol) in symbols {
                self.audit_symbol(&name, symbol, kind);
            }
        }
    }

    fn audit_symbol(&mut self, name: &str, symbol: SymbolId, scope_kind: ScopeKind) {
        self.check_unused_symbol(name, symbol, scope_kind);
        self.check_obscured_declarations(name, symbol);
        self.check_final_declarations(name, symbol);
        self.check_type_alias_declarations(name, symbol);
    }

    fn check_unused_symbol(&mut self, name: &str, symbol: SymbolId, scope_kind: ScopeKind) {
        if self.is_stub_file() {
            return;
        }
        if self.binder.accessed.contains(&symbol) {
            return;
        }
        if name.starts_with('_') {
            return;
        }
        let declarations = self.binder.symbols.get(symbol).declarations().to_vec();
        let Some(first) = declarations.first() else {
            return;
        };

        match first.kind() {
            DeclarationKind::Alias => {
                // Imports report unconditionally (generated files excepted),
                // with a removal action. Multi-part aliased imports span all
                // of their name parts.
                if self.binder.options.is_generated {
                    return;
                }
                let span = declarations
                    .iter()
                    .fold(Span::dummy(), |acc, d| acc.merge(d.span()));
                self.report_diag(Rule::UnusedImport, |severity| {
                    Diagnostic::new(
                        severity,
                        Rule::UnusedImport,
                        format!("Import \"{name}\" is not accessed"),
                        span,
                    )
                    .with_action(DiagnosticAction::RemoveImport { span })
                });
            }
            DeclarationKind::Class => {
                // Classes report only when private by scope.
                if scope_kind == ScopeKind::Function {
                    self.report(
                        Rule::UnusedClass,
                        first.span(),
                        format!("Class \"{name}\" is not accessed"),
                    );
                }
            }
            DeclarationKind::Function => {
                if scope_kind == ScopeKind::Function {
                    self.report(
                        Rule::UnusedFunction,
                        first.span(),
                        format!("Function \"{name}\" is not accessed"),
                    );
                }
            }
            DeclarationKind::Variable => {
                // Variables are private by scope inside functions and
                // comprehensions.
                if matches!(scope_kind, ScopeKind::Function | ScopeKind::Comprehension) {
                    self.report(
                        Rule::UnusedVariable,
                        first.span(),
                        format!("Variable \"{name}\" is not accessed"),
                    );
                }
            }
            // Parameters form the function's public signature; an unused
            // one is not reported.
            DeclarationKind::Parameter | DeclarationKind::Intrinsic => {}
        }
    }

    /// A primary typed declaration obscures later incompatible ones.
    fn check_obscured_declarations(&mut self, name: &str, symbol: SymbolId) {
        let declarations = self.binder.symbols.get(symbol).declarations().to_vec();
        if declarations.len() < 2 {
            return;
        }
        let Some(primary) = self
            .binder
            .symbols
            .get(symbol)
            .primary_declaration()
            .cloned()
        else {
            return;
        };
        if !primary.is_typed() {
            return;
        }
        let primary_span = primary.span();
        let path = self.binder.options.path.clone();

        for declaration in &declarations {
            if declaration.span() == primary_span && declaration.kind() == primary.kind() {
                continue;
            }
            let compatible = match (primary.kind(), declaration.kind()) {
                // Overloads of a function primary are expected.
                (DeclarationKind::Function, DeclarationKind::Function) => true,
                (DeclarationKind::Class, DeclarationKind::Class) => true,
                // A variable re-declaration must carry the same declared
                // type.
                (DeclarationKind::Variable, DeclarationKind::Variable) => {
                    self.variable_redeclaration_compatible(&primary, declaration)
                }
                (DeclarationKind::Parameter, DeclarationKind::Variable) => true,
                (_, DeclarationKind::Intrinsic) | (DeclarationKind::Intrinsic, _) => true,
                _ => false,
            };
            if !compatible {
                let what = match primary.kind() {
                    DeclarationKind::Class => "Class",
                    DeclarationKind::Function => "Function",
                    DeclarationKind::Parameter => "Parameter",
                    _ => "Variable",
                };
                let span = declaration.span();
                let message = format!("{what} declaration \"{name}\" is obscured by a declaration of the same name");
                let path = path.clone();
                self.report_diag(Rule::GeneralTypeIssues, |severity| {
                    Diagnostic::new(severity, Rule::GeneralTypeIssues, message, span)
                        .with_related("Primary declaration", path, primary_span)
                });
            }
        }
    }

    fn variable_redeclaration_compatible(
        &mut self,
        primary: &Declaration,
        other: &Declaration,
    ) -> bool {
        let annotation_of = |d: &Declaration| match d {
            Declaration::Variable {
                type_annotation, ..
            } => *type_annotation,
            _ => None,
        };
        let (Some(primary_ann), other_ann) = (annotation_of(primary), annotation_of(other)) else {
            return true;
        };
        let Some(other_ann) = other_ann else {
            // An untyped re-assignment is checked for assignability at the
            // assignment site, not here.
            return true;
        };
        let primary_type = self.get_type_of_annotation(primary_ann);
        let other_type = self.get_type_of_annotation(other_ann);
        primary_type.is_same(&other_type, 0)
    }

    /// Final symbols: at most one final-qualified declaration, at most one
    /// assignment, and (outside stubs) at least one assignment.
    fn check_final_declarations(&mut self, name: &str, symbol: SymbolId) {
        let declarations = self.binder.symbols.get(symbol).declarations().to_vec();
        let final_declarations: Vec<&Declaration> =
            declarations.iter().filter(|d| d.is_final()).collect();
        if final_declarations.is_empty() {
            return;
        }
        if final_declarations.len() > 1 {
            let span = final_declarations[1].span();
            self.report(
                Rule::GeneralTypeIssues,
                span,
                format!("\"{name}\" was previously declared as Final"),
            );
        }
        let assignments: Vec<&Declaration> = declarations
            .iter()
            .filter(|d| {
                matches!(
                    d,
                    Declaration::Variable {
                        inferred_source: Some(_),
                        ..
                    }
                )
            })
            .collect();
        if assignments.len() > 1 {
            let span = assignments[1].span();
            self.report(
                Rule::GeneralTypeIssues,
                span,
                format!("\"{name}\" is declared Final and cannot be reassigned"),
            );
        }
        if assignments.is_empty() && !self.is_stub_file() {
            let span = final_declarations[0].span();
            self.report(
                Rule::GeneralTypeIssues,
                span,
                format!("\"{name}\" is declared Final, but value is not assigned"),
            );
        }
    }

    /// A symbol whose value is a type alias must have exactly one
    /// declaration.
    fn check_type_alias_declarations(&mut self, name: &str, symbol: SymbolId) {
        let declarations = self.binder.symbols.get(symbol).declarations().to_vec();
        if declarations.len() < 2 {
            return;
        }
        let all_variables = declarations
            .iter()
            .all(|d| d.kind() == DeclarationKind::Variable && !d.is_typed());
        if !all_variables {
            return;
        }
        let is_alias = matches!(
            self.type_of_symbol(symbol),
            Type::Class(_) | Type::TypeVar(_)
        );
        if is_alias {
            let span = declarations[1].span();
            self.report(
                Rule::GeneralTypeIssues,
                span,
                format!("Type alias \"{name}\" may not be redeclared"),
            );
        }
    }

    /// Two equivalent non-aliased imports at module level.
    fn audit_duplicate_imports(&mut self) {
        let mut seen: FxHashSet<(String, Option<String>)> = FxHashSet::default();
        let mut seen_nodes: FxHashSet<NodeId> = FxHashSet::default();
        let records = self.binder.imports.clone();
        for record in records {
            if record.alias.is_some() {
                continue;
            }
            let key = (record.module.clone(), record.symbol_name.clone());
            if seen.contains(&key) {
                // One report per offending statement.
                if seen_nodes.insert(record.node) {
                    let what = record.symbol_name.as_deref().unwrap_or(&record.module);
                    self.report(
                        Rule::DuplicateImport,
                        record.span,
                        format!("\"{what}\" is imported more than once"),
                    );
                }
            } else {
                seen.insert(key);
            }
        }
    }
}
