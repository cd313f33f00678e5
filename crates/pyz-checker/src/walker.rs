//! The checker walker: a depth-first, pre-order traversal of the parse
//! tree that drives the evaluator for side effects and enforces the rules
//! pure type evaluation cannot express.
//!
//! Two controls shape the walk: statements the binder marked unreachable
//! are skipped (no diagnostics for dead code, though explicit queries may
//! still warm the cache), and every statement handler decides how its
//! children are visited.

use crate::state::{CheckerState, EvalUsage, FunctionContext};
use pyz_ast::{NodeId, NodeKind};
use pyz_common::Rule;
use pyz_solver::{
    Type, format_type, look_up_object_member, remove_none_from_union,
    specialize_member_for_class, strip_literal_value,
};

impl<'a> CheckerState<'a> {
    /// Visit one statement (or the module root).
    pub(crate) fn visit_node(&mut self, node: NodeId) {
        if self.binder.unreachable.contains(&node) {
            return;
        }
        let kind = self.arena.get(node).kind.clone();

        // Stub files contain declarations only.
        if self.is_stub_file()
            && matches!(
                kind,
                NodeKind::For { .. }
                    | NodeKind::While { .. }
                    | NodeKind::With { .. }
                    | NodeKind::Try { .. }
                    | NodeKind::Raise { .. }
                    | NodeKind::AugAssign { .. }
                    | NodeKind::Delete { .. }
            )
        {
            self.report(
                Rule::InvalidStubStatement,
                self.arena.span(node),
                "Statement is not allowed in a type stub file",
            );
        }

        match kind {
            NodeKind::Module { ref body } => self.visit_suite(body),

            NodeKind::FunctionDef { .. } => self.visit_function(node),
            NodeKind::ClassDef { .. } => self.visit_class(node),

            NodeKind::Return { value } => self.visit_return(node, value),

            NodeKind::Assign {
                ref targets,
                value,
            } => {
                self.walk_expression(value);
                let value_type = self.get_type(value);
                for &target in targets {
                    self.check_constant_redefinition(target);
                    self.check_annotated_assignment(target, &value_type, value);
                }
                self.evaluate_types_for_statement(node);
            }

            NodeKind::AnnAssign {
                target: _,
                annotation,
                value,
            } => {
                let declared = self.get_type_of_annotation(annotation);
                if let Some(value) = value {
                    self.walk_expression(value);
                    let value_type = self.get_type(value);
                    self.check_assignable(
                        &declared,
                        &value_type,
                        self.arena.span(value),
                        Rule::GeneralTypeIssues,
                        "Assignment mismatch",
                    );
                }
                self.evaluate_types_for_statement(node);
            }

            NodeKind::AugAssign { value, .. } => {
                self.walk_expression(value);
                // Reads then writes: the binary result must flow back.
                self.evaluate_types_for_statement(node);
            }

            NodeKind::For {
                iterable,
                ref body,
                ref orelse,
                ..
            } => {
                self.walk_expression(iterable);
                self.evaluate_types_for_statement(node);
                self.visit_suite(body);
                self.visit_suite(orelse);
            }

            NodeKind::While {
                test,
                ref body,
                ref orelse,
            } => {
                self.walk_expression(test);
                let _ = self.get_type(test);
                let (if_true, _) = self.narrowing_constraints(test);
                let mark = self.constraints.len();
                self.constraints.extend(if_true);
                self.visit_suite(body);
                self.constraints.truncate(mark);
                self.visit_suite(orelse);
            }

            NodeKind::If {
                test,
                ref body,
                ref orelse,
            } => {
                self.walk_expression(test);
                let _ = self.get_type(test);
                let (if_true, if_false) = self.narrowing_constraints(test);

                let mark = self.constraints.len();
                self.constraints.extend(if_true.clone());
                self.visit_suite(body);
                self.constraints.truncate(mark);

                self.constraints.extend(if_false.clone());
                self.visit_suite(orelse);
                self.constraints.truncate(mark);

                // A branch that cannot complete leaves the other branch's
                // constraints in force for the remainder of the suite.
                let body_terminates = suite_terminates(self.arena, body);
                let orelse_terminates = !orelse.is_empty() && suite_terminates(self.arena, orelse);
                if body_terminates && !orelse_terminates {
                    self.constraints.extend(if_false);
                } else if orelse_terminates && !body_terminates {
                    self.constraints.extend(if_true);
                }
            }

            NodeKind::With {
                ref items,
                ref body,
                ..
            } => {
                for item in items {
                    self.walk_expression(item.context);
                }
                self.evaluate_types_for_statement(node);
                self.visit_suite(body);
            }

            NodeKind::Raise { exc, cause } => self.check_raise(node, exc, cause),

            NodeKind::Try {
                ref body,
                ref handlers,
                ref orelse,
                ref finally,
            } => {
                self.visit_suite(body);
                for &handler in handlers {
                    self.visit_node(handler);
                }
                self.visit_suite(orelse);
                self.visit_suite(finally);
            }

            NodeKind::ExceptHandler { .. } => self.visit_except_handler(node),

            NodeKind::Assert { test, message } => {
                self.walk_expression(test);
                let _ = self.get_type(test);
                if let Some(message) = message {
                    self.walk_expression(message);
                    let _ = self.get_type(message);
                }
                // A non-empty tuple test is always truthy.
                if let NodeKind::TupleExpr { elements } = &self.arena.get(test).kind {
                    if !elements.is_empty() {
                        self.report(
                            Rule::AssertAlwaysTrue,
                            self.arena.span(test),
                            "Assert expression always evaluates to true",
                        );
                    }
                }
                // The asserted condition holds for the rest of the suite.
                let (if_true, _) = self.narrowing_constraints(test);
                self.constraints.extend(if_true);
            }

            NodeKind::Import { .. } | NodeKind::ImportFrom { .. } => {
                self.visit_import(node);
            }

            NodeKind::ExprStmt { value } => {
                self.walk_expression(value);
                let _ = self.get_type(value);
            }

            NodeKind::Delete { ref targets } => {
                for &target in targets {
                    self.walk_expression(target);
                    let _ = self.get_type_with_usage(target, EvalUsage::Del);
                }
            }

            NodeKind::Pass
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Global { .. }
            | NodeKind::Nonlocal { .. } => {}

            // Expression in statement position (host-built trees).
            _ => {
                self.walk_expression(node);
                let _ = self.get_type(node);
            }
        }
    }

    /// Visit a statement suite; constraints established inside (asserts,
    /// terminating branches) stay local to it.
    pub(crate) fn visit_suite(&mut self, body: &[NodeId]) {
        let mark = self.constraints.len();
        for &stmt in body {
            self.visit_node(stmt);
        }
        self.constraints.truncate(mark);
    }

    fn visit_function(&mut self, node: NodeId) {
        let NodeKind::FunctionDef {
            ref params,
            return_annotation,
            ref decorators,
            ref body,
            is_async,
            ..
        } = self.arena.get(node).kind.clone()
        else {
            return;
        };

        for &decorator in decorators {
            self.walk_expression(decorator);
        }

        let function_type = self.get_type_of_function(node);
        self.check_function_signature(node, &function_type);

        // Defaults execute at definition time, in the enclosing scope.
        for &param in params {
            if let NodeKind::Parameter {
                default: Some(default),
                ..
            } = self.arena.get(param).kind
            {
                let was = self.in_default_initializer;
                self.in_default_initializer = true;
                self.walk_expression(default);
                self.in_default_initializer = was;
            }
        }

        let declared_return = return_annotation.map(|ann| self.get_type_of_annotation(ann));
        self.function_stack.push(FunctionContext {
            node,
            declared_return,
            is_async,
            is_generator: false,
            yield_types: Vec::new(),
            return_types: Vec::new(),
        });

        let saved_assigned = std::mem::take(&mut self.assigned_symbols);
        self.visit_suite(body);
        self.assigned_symbols = saved_assigned;

        let Some(context) = self.function_stack.pop() else {
            debug_assert!(false, "function context pushed above");
            return;
        };
        self.check_function_return(node, &function_type, &context, body);
    }

    fn visit_class(&mut self, node: NodeId) {
        let NodeKind::ClassDef {
            ref decorators,
            ref body,
            ..
        } = self.arena.get(node).kind.clone()
        else {
            return;
        };
        for &decorator in decorators {
            self.walk_expression(decorator);
        }
        let class = self.get_type_of_class(node);
        if let Some(symbol) = self.class_symbol_for_node(node) {
            self.assigned_symbols.insert(symbol);
        }
        self.visit_suite(body);
        self.check_class(node, &class);
    }

    fn class_symbol_for_node(&self, node: NodeId) -> Option<pyz_binder::SymbolId> {
        let NodeKind::ClassDef { name, .. } = &self.arena.get(node).kind else {
            return None;
        };
        let scope = self.binder.scope_of(node);
        pyz_binder::lookup_recursive(&self.binder.scopes, &self.binder.symbols, scope, name)
            .map(|r| r.symbol)
    }

    fn visit_return(&mut self, node: NodeId, value: Option<NodeId>) {
        let returned = match value {
            Some(value) => {
                self.walk_expression(value);
                self.get_type(value)
            }
            None => Type::None,
        };
        let span = value
            .map(|v| self.arena.span(v))
            .unwrap_or_else(|| self.arena.span(node));

        if returned.is_unknown() {
            self.report(
                Rule::UnknownVariableType,
                span,
                "Return type is unknown",
            );
        }

        let declared = self
            .function_stack
            .last()
            .and_then(|c| c.declared_return.clone());
        if let Some(context) = self.function_stack.last_mut() {
            context.return_types.push(returned.clone());
        }
        let Some(declared) = declared else {
            return;
        };
        if declared.is_never() {
            self.report(
                Rule::GeneralTypeIssues,
                span,
                "Function with declared return type \"NoReturn\" cannot return",
            );
            return;
        }
        // Generators validate yields, not returns, against the annotation.
        if self
            .function_stack
            .last()
            .is_some_and(|c| c.is_generator)
        {
            return;
        }
        let returned = strip_literal_value(&returned);
        if !returned.is_unknown() {
            self.check_assignable(
                &declared,
                &returned,
                span,
                Rule::GeneralTypeIssues,
                "Return type mismatch",
            );
        }
    }

    fn visit_except_handler(&mut self, node: NodeId) {
        let NodeKind::ExceptHandler {
            exc_type,
            ref name,
            ref body,
            ..
        } = self.arena.get(node).kind.clone()
        else {
            return;
        };
        let mut bound_type = Type::Unknown;
        if let Some(exc_type) = exc_type {
            self.walk_expression(exc_type);
            bound_type = self.check_exception_filter(exc_type);
        }
        if let Some(name) = name {
            let scope = self.binder.scope_of(node);
            if let Some(result) = pyz_binder::lookup_recursive(
                &self.binder.scopes,
                &self.binder.symbols,
                scope,
                name,
            ) {
                self.assigned_symbols.insert(result.symbol);
                self.symbol_types.insert(result.symbol, bound_type);
            }
        }
        self.visit_suite(body);
    }

    fn visit_import(&mut self, node: NodeId) {
        let records: Vec<pyz_binder::ImportRecord> = self
            .binder
            .imports
            .iter()
            .filter(|r| r.node == node)
            .cloned()
            .collect();
        for record in records {
            if !crate::name_resolution::is_known_module(&record.module) {
                self.report(
                    Rule::MissingTypeStubs,
                    record.span,
                    format!("Stub file not found for \"{}\"", record.module),
                );
            }
            // Mark the bound name assigned on this path.
            let bound = record
                .alias
                .clone()
                .or(record.symbol_name.clone())
                .unwrap_or_else(|| {
                    record
                        .module
                        .split('.')
                        .next()
                        .unwrap_or_default()
                        .to_string()
                });
            let scope = self.binder.scope_of(node);
            if let Some(result) = pyz_binder::lookup_recursive(
                &self.binder.scopes,
                &self.binder.symbols,
                scope,
                &bound,
            ) {
                self.assigned_symbols.insert(result.symbol);
            }
        }
    }

    /// `with ctx:` resolves `__enter__`/`__aenter__` on the context
    /// expression; None members warn under the optional rule.
    pub(crate) fn enter_context_manager(&mut self, context: NodeId, is_async: bool) -> Type {
        let context_type = self.get_type(context);
        if context_type.is_any_or_unknown() {
            return Type::Unknown;
        }
        let had_none = context_type.is_none()
            || context_type
                .union_entries()
                .is_some_and(|entries| entries.iter().any(Type::is_none));
        if had_none {
            self.report(
                Rule::OptionalContextManager,
                self.arena.span(context),
                "Object of type \"None\" cannot be used with \"with\"",
            );
        }
        let context_type = remove_none_from_union(&context_type);
        let enter = if is_async { "__aenter__" } else { "__enter__" };
        let Type::Object(obj) = &context_type else {
            return Type::Unknown;
        };
        let class = obj.class.clone();
        self.ensure_class_members_computed(&class);
        let Some(found) = look_up_object_member(&class, enter) else {
            self.report(
                Rule::GeneralTypeIssues,
                self.arena.span(context),
                format!(
                    "\"{}\" does not implement the context manager protocol",
                    format_type(&context_type)
                ),
            );
            return Type::Unknown;
        };
        let member = self.type_of_symbol(found.symbol);
        let member = specialize_member_for_class(member, &class);
        match pyz_solver::bind_function_to_class_or_object(&context_type, &match member {
            Type::Function(f) => f,
            _ => return Type::Unknown,
        }) {
            Type::Function(bound) => {
                let result = bound.effective_return_type();
                if is_async {
                    self.ensure_members_for(&result);
                    let source = self.type_source();
                    pyz_solver::get_type_from_awaitable(&result, &source).unwrap_or(Type::Unknown)
                } else {
                    result
                }
            }
            _ => Type::Unknown,
        }
    }

    fn check_annotated_assignment(&mut self, target: NodeId, value_type: &Type, value: NodeId) {
        let Some(symbol) = self.symbol_for_target(target) else {
            return;
        };
        let annotated = self
            .binder
            .symbols
            .get(symbol)
            .declarations()
            .iter()
            .find_map(|d| match d {
                pyz_binder::Declaration::Variable {
                    type_annotation: Some(ann),
                    ..
                } => Some(*ann),
                _ => None,
            });
        if let Some(annotation) = annotated {
            let declared = self.get_type_of_annotation(annotation);
            self.check_assignable(
                &declared,
                value_type,
                self.arena.span(value),
                Rule::GeneralTypeIssues,
                "Assignment mismatch",
            );
        }
    }

    /// Reassigning an upper-case module constant is flagged.
    fn check_constant_redefinition(&mut self, target: NodeId) {
        let NodeKind::Name { id } = &self.arena.get(target).kind.clone() else {
            return;
        };
        if id.len() < 2 || !id.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
            return;
        }
        let Some(symbol) = self.symbol_for_target(target) else {
            return;
        };
        let declarations = self.binder.symbols.get(symbol).declarations();
        let first_node = declarations.iter().find_map(|d| d.node());
        if declarations.len() > 1 && first_node.is_some() && first_node != Some(target) {
            self.report(
                Rule::ConstantRedefinition,
                self.arena.span(target),
                format!("\"{id}\" is constant (because it is uppercase) and cannot be redefined"),
            );
        }
    }
}

impl<'a> CheckerState<'a> {
    /// Walk an expression subtree applying the per-node rules that are not
    /// part of type evaluation: private access, string-literal hygiene,
    /// calls in default initialisers, and unknown-member reporting.
    pub(crate) fn walk_expression(&mut self, node: NodeId) {
        let kind = self.arena.get(node).kind.clone();

        // Branching expressions establish the same constraint contexts the
        // evaluator uses, so eager child evaluation sees narrowed types.
        match &kind {
            NodeKind::Ternary {
                test,
                then_expr,
                else_expr,
            } => {
                self.walk_expression(*test);
                let (if_true, if_false) = self.narrowing_constraints(*test);
                let mark = self.constraints.len();
                self.constraints.extend(if_true);
                self.walk_expression(*then_expr);
                self.constraints.truncate(mark);
                self.constraints.extend(if_false);
                self.walk_expression(*else_expr);
                self.constraints.truncate(mark);
                return;
            }
            NodeKind::BinaryOp {
                op: op @ (pyz_ast::BinaryOperator::And | pyz_ast::BinaryOperator::Or),
                left,
                right,
            } => {
                self.walk_expression(*left);
                let (if_true, if_false) = self.narrowing_constraints(*left);
                let mark = self.constraints.len();
                if *op == pyz_ast::BinaryOperator::And {
                    self.constraints.extend(if_true);
                } else {
                    self.constraints.extend(if_false);
                }
                self.walk_expression(*right);
                self.constraints.truncate(mark);
                return;
            }
            NodeKind::ComprehensionExpr { comp } => {
                let mark = self.constraints.len();
                for clause in &comp.clauses {
                    self.walk_expression(clause.iterable);
                    for &condition in &clause.conditions {
                        self.walk_expression(condition);
                        let (if_true, _) = self.narrowing_constraints(condition);
                        self.constraints.extend(if_true);
                    }
                }
                if let Some(key) = comp.key {
                    self.walk_expression(key);
                }
                // Evaluate first so comprehension targets are bound before
                // the element expression is inspected.
                let _ = self.get_type(node);
                self.walk_expression(comp.element);
                self.constraints.truncate(mark);
                return;
            }
            _ => {}
        }

        match &kind {
            NodeKind::Call { .. } => {
                if self.in_default_initializer && !self.is_stub_file() {
                    self.report(
                        Rule::CallInDefaultInitializer,
                        self.arena.span(node),
                        "Function calls within default value initializer are not permitted",
                    );
                }
            }
            NodeKind::StringLiteral {
                has_invalid_escape,
                is_implicit_concat,
                ..
            } => {
                if *has_invalid_escape {
                    self.report(
                        Rule::InvalidStringEscapeSequence,
                        self.arena.span(node),
                        "Unsupported escape sequence in string literal",
                    );
                }
                if *is_implicit_concat {
                    self.report(
                        Rule::ImplicitStringConcatenation,
                        self.arena.span(node),
                        "Implicit string concatenation not allowed",
                    );
                }
            }
            NodeKind::MemberAccess {
                base,
                member,
                member_span,
            } => {
                self.check_private_member_access(node, *base, member, *member_span);
                let member_type = self.get_type(node);
                let base_type = self.get_type(*base);
                if member_type.is_unknown() && !base_type.is_any_or_unknown() {
                    self.report(
                        Rule::UnknownMemberType,
                        *member_span,
                        format!("Type of \"{member}\" is unknown"),
                    );
                }
            }
            NodeKind::Lambda { params, .. } => {
                if !self.is_stub_file() {
                    for &param in params {
                        if let NodeKind::Parameter {
                            name: Some(param_name),
                            name_span,
                            annotation: None,
                            ..
                        } = &self.arena.get(param).kind
                        {
                            self.report(
                                Rule::UnknownLambdaType,
                                *name_span,
                                format!("Type of lambda parameter \"{param_name}\" is unknown"),
                            );
                        }
                    }
                }
            }
            _ => {}
        }
        for child in kind.children() {
            // Parameter defaults are handled by the function visitor with
            // the default-initializer flag set.
            if self.arena.get(child).kind.is_expression() {
                self.walk_expression(child);
            }
        }
    }
}

/// Whether a suite cannot complete normally.
pub(crate) fn suite_terminates(arena: &pyz_ast::NodeArena, body: &[NodeId]) -> bool {
    let Some(&last) = body.last() else {
        return false;
    };
    statement_terminates(arena, last)
}

fn statement_terminates(arena: &pyz_ast::NodeArena, stmt: NodeId) -> bool {
    match &arena.get(stmt).kind {
        NodeKind::Return { .. }
        | NodeKind::Raise { .. }
        | NodeKind::Break
        | NodeKind::Continue => true,
        NodeKind::If { body, orelse, .. } => {
            !orelse.is_empty()
                && suite_terminates(arena, body)
                && suite_terminates(arena, orelse)
        }
        NodeKind::With { body, .. } => suite_terminates(arena, body),
        NodeKind::Try { body, finally, .. } => {
            suite_terminates(arena, finally) || suite_terminates(arena, body)
        }
        _ => false,
    }
}
