//! Class-level rules: override compatibility, final enforcement, private
//! access policy, and TypedDict suite restrictions.

use crate::state::CheckerState;
use pyz_ast::{NodeId, NodeKind};
use pyz_common::{Diagnostic, Rule};
use pyz_solver::{
    ClassFlags, ClassType, FunctionFlags, FunctionType, MemberLookupFlags, Type,
    can_override_method, look_up_class_member, look_up_object_member,
};

impl<'a> CheckerState<'a> {
    /// Once a class's type is computed and its suite visited, run the
    /// cross-member rules.
    pub(crate) fn check_class(&mut self, node: NodeId, class: &ClassType) {
        self.check_overrides(class);
        if class.details.flags().contains(ClassFlags::TYPED_DICT) {
            self.check_typed_dict_suite(node);
        }
    }

    fn check_overrides(&mut self, class: &ClassType) {
        let fields = class.details.fields();
        for (name, symbol) in fields {
            if name.starts_with("__") && name.ends_with("__") {
                continue;
            }
            let member_type = self.type_of_symbol(symbol);
            let Some(base_found) = look_up_class_member(
                class,
                &name,
                MemberLookupFlags::SKIP_ORIGINAL_CLASS,
            ) else {
                continue;
            };
            let base_type = self.type_of_symbol(base_found.symbol);

            let derived_fn = first_function(&member_type);
            let base_fn = first_function(&base_type);
            if let (Some(derived_fn), Some(base_fn)) = (derived_fn, base_fn) {
                if base_fn.flags.contains(FunctionFlags::FINAL) {
                    self.report(
                        Rule::GeneralTypeIssues,
                        self.declaration_span(symbol),
                        format!(
                            "Method \"{name}\" cannot override final method defined in class \"{}\"",
                            base_found.defining_class.name()
                        ),
                    );
                    continue;
                }
                let mut addendum = pyz_common::DiagnosticAddendum::new();
                if !can_override_method(&base_fn, &derived_fn, &mut addendum) {
                    let span = self.declaration_span(symbol);
                    let base_span = self.declaration_span(base_found.symbol);
                    let path = self.binder.options.path.clone();
                    let base_class_name = base_found.defining_class.name().to_string();
                    self.report_diag(Rule::IncompatibleMethodOverride, |severity| {
                        Diagnostic::new(
                            severity,
                            Rule::IncompatibleMethodOverride,
                            format!(
                                "Method \"{name}\" overrides class \"{base_class_name}\" in an incompatible manner{}",
                                addendum.format()
                            ),
                            span,
                        )
                        .with_related(
                            format!("Overridden method \"{name}\""),
                            path,
                            base_span,
                        )
                    });
                }
                continue;
            }

            // An inherited variable marked final cannot be redefined.
            let base_final = self
                .binder
                .symbols
                .get(base_found.symbol)
                .final_declarations()
                .next()
                .is_some();
            if base_final {
                self.report(
                    Rule::GeneralTypeIssues,
                    self.declaration_span(symbol),
                    format!(
                        "\"{name}\" is declared final in class \"{}\" and cannot be redefined",
                        base_found.defining_class.name()
                    ),
                );
            }
        }
    }

    fn check_typed_dict_suite(&mut self, node: NodeId) {
        let NodeKind::ClassDef { body, .. } = self.arena.get(node).kind.clone() else {
            return;
        };
        for &stmt in &body {
            let allowed = match &self.arena.get(stmt).kind {
                NodeKind::AnnAssign { value: None, .. } | NodeKind::Pass => true,
                NodeKind::ExprStmt { value } => matches!(
                    &self.arena.get(*value).kind,
                    NodeKind::StringLiteral { .. } | NodeKind::EllipsisLiteral
                ),
                _ => false,
            };
            if !allowed {
                self.report(
                    Rule::GeneralTypeIssues,
                    self.arena.span(stmt),
                    "TypedDict classes can contain only type annotations",
                );
            }
        }
    }

    /// Private-name access policy for `base.member`.
    ///
    /// A double-underscore member is private to its declaring class; a
    /// single-underscore member is protected (declaring class and its
    /// subclasses). Underscore members of a module are private to that
    /// module. Stub files and the name `_` are exempt.
    pub(crate) fn check_private_member_access(
        &mut self,
        node: NodeId,
        base: NodeId,
        member: &str,
        member_span: pyz_common::Span,
    ) {
        if self.is_stub_file() || member == "_" {
            return;
        }
        if member.starts_with("__") && member.ends_with("__") {
            return;
        }
        let is_private = member.starts_with("__");
        let is_protected = !is_private && member.starts_with('_');
        if !is_private && !is_protected {
            return;
        }

        let base_type = self.get_type(base);

        // Module-private members: underscore names are visible only inside
        // the module that declares them.
        if let Type::Module(module) = &base_type {
            if module.name != self.current_module_name() {
                self.report(
                    Rule::PrivateUsage,
                    member_span,
                    format!(
                        "\"{member}\" is private to module \"{}\" and used outside of it",
                        module.name
                    ),
                );
            }
            return;
        }

        let target_class = match &base_type {
            Type::Object(o) => o.class.clone(),
            Type::Class(c) => c.clone(),
            _ => return,
        };
        let Some(found) = look_up_object_member(&target_class, member) else {
            return;
        };
        let scope = self.binder.scope_of(node);
        let enclosing = self.enclosing_class_of_scope(scope);

        let allowed = match &enclosing {
            Some(enclosing) if is_private => {
                enclosing.same_generic_class(&found.defining_class)
            }
            Some(enclosing) => enclosing.is_derived_from(&found.defining_class, 0),
            None => false,
        };
        if !allowed {
            let kind = if is_private { "private" } else { "protected" };
            self.report(
                Rule::PrivateUsage,
                member_span,
                format!(
                    "\"{member}\" is {kind} and used outside of the class in which it is declared"
                ),
            );
        }
    }

    /// The checked file's module name, from its path stem.
    fn current_module_name(&self) -> String {
        let path = &self.binder.options.path;
        let file = path.rsplit(['/', '\\']).next().unwrap_or(path.as_str());
        file.trim_end_matches(".pyi")
            .trim_end_matches(".py")
            .to_string()
    }

    fn declaration_span(&self, symbol: pyz_binder::SymbolId) -> pyz_common::Span {
        self.binder
            .symbols
            .get(symbol)
            .declarations()
            .last()
            .map(|d| d.span())
            .unwrap_or_else(pyz_common::Span::dummy)
    }
}

/// Overloaded members compare through their first variant.
fn first_function(t: &Type) -> Option<FunctionType> {
    match t {
        Type::Function(f) => Some((**f).clone()),
        Type::Overloaded(o) => o.overloads.first().map(|f| (**f).clone()),
        _ => None,
    }
}
