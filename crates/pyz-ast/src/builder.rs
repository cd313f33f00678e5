//! Programmatic tree construction.
//!
//! `TreeBuilder` assigns each node a fresh, strictly increasing span so a
//! hand-built tree behaves like a parsed one: node identity is stable,
//! spans are distinct, and construction order stands in for source order.
//! Hosts with a real parser build the arena directly with real spans.

use crate::nodes::{
    Argument, ArgumentCategory, BinaryOperator, Comprehension, ComprehensionClause,
    ComprehensionKind, DictEntry, ImportAlias, NodeArena, NodeId, NodeKind, NumberValue,
    ParameterCategory, UnaryOperator, WithItem,
};
use pyz_common::Span;

/// Builds a `NodeArena` one node at a time.
pub struct TreeBuilder {
    arena: NodeArena,
    cursor: u32,
}

impl TreeBuilder {
    pub fn new() -> Self {
        TreeBuilder {
            arena: NodeArena::new(),
            cursor: 0,
        }
    }

    fn next_span(&mut self) -> Span {
        let span = Span::from_len(self.cursor, 1);
        self.cursor += 2;
        span
    }

    /// Append a node with a fresh synthetic span.
    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        let span = self.next_span();
        self.arena.add(kind, span)
    }

    /// Finish building and hand over the arena.
    pub fn finish(self) -> NodeArena {
        self.arena
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    // ---- Expressions ----

    pub fn name(&mut self, id: &str) -> NodeId {
        self.add(NodeKind::Name { id: id.into() })
    }

    pub fn member(&mut self, base: NodeId, member: &str) -> NodeId {
        let member_span = self.next_span();
        self.add(NodeKind::MemberAccess {
            base,
            member: member.into(),
            member_span,
        })
    }

    pub fn index(&mut self, base: NodeId, args: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::Index { base, args })
    }

    pub fn call(&mut self, callee: NodeId, args: Vec<Argument>) -> NodeId {
        self.add(NodeKind::Call { callee, args })
    }

    pub fn call0(&mut self, callee: NodeId) -> NodeId {
        self.call(callee, vec![])
    }

    pub fn unary(&mut self, op: UnaryOperator, operand: NodeId) -> NodeId {
        self.add(NodeKind::UnaryOp { op, operand })
    }

    pub fn binary(&mut self, op: BinaryOperator, left: NodeId, right: NodeId) -> NodeId {
        self.add(NodeKind::BinaryOp { op, left, right })
    }

    pub fn int(&mut self, value: i64) -> NodeId {
        self.add(NodeKind::NumberLiteral {
            value: NumberValue::Int(value),
        })
    }

    pub fn float(&mut self, value: f64) -> NodeId {
        self.add(NodeKind::NumberLiteral {
            value: NumberValue::Float(value),
        })
    }

    pub fn str_(&mut self, value: &str) -> NodeId {
        self.add(NodeKind::StringLiteral {
            value: value.into(),
            is_bytes: false,
            has_invalid_escape: false,
            is_implicit_concat: false,
        })
    }

    pub fn bytes(&mut self, value: &str) -> NodeId {
        self.add(NodeKind::StringLiteral {
            value: value.into(),
            is_bytes: true,
            has_invalid_escape: false,
            is_implicit_concat: false,
        })
    }

    pub fn bool_(&mut self, value: bool) -> NodeId {
        self.add(NodeKind::BooleanLiteral { value })
    }

    pub fn none(&mut self) -> NodeId {
        self.add(NodeKind::NoneLiteral)
    }

    pub fn ellipsis(&mut self) -> NodeId {
        self.add(NodeKind::EllipsisLiteral)
    }

    pub fn tuple_(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::TupleExpr { elements })
    }

    pub fn list_(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::ListExpr { elements })
    }

    pub fn set_(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::SetExpr { elements })
    }

    pub fn dict_(&mut self, entries: Vec<(Option<NodeId>, NodeId)>) -> NodeId {
        let entries = entries
            .into_iter()
            .map(|(key, value)| DictEntry { key, value })
            .collect();
        self.add(NodeKind::DictExpr { entries })
    }

    pub fn ternary(&mut self, test: NodeId, then_expr: NodeId, else_expr: NodeId) -> NodeId {
        self.add(NodeKind::Ternary {
            test,
            then_expr,
            else_expr,
        })
    }

    pub fn comprehension(
        &mut self,
        kind: ComprehensionKind,
        key: Option<NodeId>,
        element: NodeId,
        clauses: Vec<ComprehensionClause>,
    ) -> NodeId {
        self.add(NodeKind::ComprehensionExpr {
            comp: Comprehension {
                kind,
                key,
                element,
                clauses,
            },
        })
    }

    pub fn clause(&mut self, target: NodeId, iterable: NodeId, conditions: Vec<NodeId>) -> ComprehensionClause {
        ComprehensionClause {
            target,
            iterable,
            conditions: conditions.into(),
            is_async: false,
        }
    }

    pub fn lambda_(&mut self, params: Vec<NodeId>, body: NodeId) -> NodeId {
        self.add(NodeKind::Lambda { params, body })
    }

    pub fn await_(&mut self, operand: NodeId) -> NodeId {
        self.add(NodeKind::Await { operand })
    }

    pub fn yield_(&mut self, value: Option<NodeId>) -> NodeId {
        self.add(NodeKind::Yield { value })
    }

    pub fn yield_from(&mut self, operand: NodeId) -> NodeId {
        self.add(NodeKind::YieldFrom { operand })
    }

    pub fn walrus(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.add(NodeKind::AssignmentExpr { target, value })
    }

    pub fn error_expr(&mut self, child: Option<NodeId>) -> NodeId {
        self.add(NodeKind::Error { child })
    }

    // ---- Arguments ----

    pub fn arg(&mut self, value: NodeId) -> Argument {
        Argument {
            category: ArgumentCategory::Simple,
            name: None,
            value,
        }
    }

    pub fn kwarg(&mut self, name: &str, value: NodeId) -> Argument {
        Argument {
            category: ArgumentCategory::Simple,
            name: Some(name.into()),
            value,
        }
    }

    pub fn star_arg(&mut self, value: NodeId) -> Argument {
        Argument {
            category: ArgumentCategory::UnpackedList,
            name: None,
            value,
        }
    }

    pub fn double_star_arg(&mut self, value: NodeId) -> Argument {
        Argument {
            category: ArgumentCategory::UnpackedDict,
            name: None,
            value,
        }
    }

    // ---- Statements ----

    pub fn param(
        &mut self,
        name: &str,
        annotation: Option<NodeId>,
        default: Option<NodeId>,
    ) -> NodeId {
        let name_span = self.next_span();
        self.add(NodeKind::Parameter {
            name: Some(name.into()),
            name_span,
            category: ParameterCategory::Simple,
            annotation,
            default,
        })
    }

    pub fn vararg_param(&mut self, name: &str, annotation: Option<NodeId>) -> NodeId {
        let name_span = self.next_span();
        self.add(NodeKind::Parameter {
            name: Some(name.into()),
            name_span,
            category: ParameterCategory::VarArgList,
            annotation,
            default: None,
        })
    }

    pub fn kwarg_param(&mut self, name: &str, annotation: Option<NodeId>) -> NodeId {
        let name_span = self.next_span();
        self.add(NodeKind::Parameter {
            name: Some(name.into()),
            name_span,
            category: ParameterCategory::VarArgDict,
            annotation,
            default: None,
        })
    }

    /// The bare `*` keyword-only separator.
    pub fn star_separator(&mut self) -> NodeId {
        let name_span = self.next_span();
        self.add(NodeKind::Parameter {
            name: None,
            name_span,
            category: ParameterCategory::VarArgList,
            annotation: None,
            default: None,
        })
    }

    pub fn func(
        &mut self,
        name: &str,
        params: Vec<NodeId>,
        return_annotation: Option<NodeId>,
        body: Vec<NodeId>,
    ) -> NodeId {
        self.func_full(name, params, return_annotation, vec![], body, false)
    }

    pub fn func_full(
        &mut self,
        name: &str,
        params: Vec<NodeId>,
        return_annotation: Option<NodeId>,
        decorators: Vec<NodeId>,
        body: Vec<NodeId>,
        is_async: bool,
    ) -> NodeId {
        let name_span = self.next_span();
        self.add(NodeKind::FunctionDef {
            name: name.into(),
            name_span,
            params,
            return_annotation,
            decorators,
            body,
            is_async,
        })
    }

    pub fn class_(&mut self, name: &str, arguments: Vec<Argument>, body: Vec<NodeId>) -> NodeId {
        self.class_full(name, arguments, vec![], body)
    }

    pub fn class_full(
        &mut self,
        name: &str,
        arguments: Vec<Argument>,
        decorators: Vec<NodeId>,
        body: Vec<NodeId>,
    ) -> NodeId {
        let name_span = self.next_span();
        self.add(NodeKind::ClassDef {
            name: name.into(),
            name_span,
            arguments,
            decorators,
            body,
        })
    }

    pub fn ret(&mut self, value: Option<NodeId>) -> NodeId {
        self.add(NodeKind::Return { value })
    }

    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.add(NodeKind::Assign {
            targets: vec![target],
            value,
        })
    }

    pub fn ann_assign(&mut self, target: NodeId, annotation: NodeId, value: Option<NodeId>) -> NodeId {
        self.add(NodeKind::AnnAssign {
            target,
            annotation,
            value,
        })
    }

    pub fn aug_assign(&mut self, target: NodeId, op: BinaryOperator, value: NodeId) -> NodeId {
        self.add(NodeKind::AugAssign { target, op, value })
    }

    pub fn for_(&mut self, target: NodeId, iterable: NodeId, body: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::For {
            target,
            iterable,
            body,
            orelse: vec![],
            is_async: false,
        })
    }

    pub fn while_(&mut self, test: NodeId, body: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::While {
            test,
            body,
            orelse: vec![],
        })
    }

    pub fn if_(&mut self, test: NodeId, body: Vec<NodeId>, orelse: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::If { test, body, orelse })
    }

    pub fn with_(&mut self, items: Vec<WithItem>, body: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::With {
            items,
            body,
            is_async: false,
        })
    }

    pub fn raise_(&mut self, exc: Option<NodeId>, cause: Option<NodeId>) -> NodeId {
        self.add(NodeKind::Raise { exc, cause })
    }

    pub fn try_(
        &mut self,
        body: Vec<NodeId>,
        handlers: Vec<NodeId>,
        orelse: Vec<NodeId>,
        finally: Vec<NodeId>,
    ) -> NodeId {
        self.add(NodeKind::Try {
            body,
            handlers,
            orelse,
            finally,
        })
    }

    pub fn except(&mut self, exc_type: Option<NodeId>, name: Option<&str>, body: Vec<NodeId>) -> NodeId {
        let name_span = self.next_span();
        self.add(NodeKind::ExceptHandler {
            exc_type,
            name: name.map(Into::into),
            name_span,
            body,
        })
    }

    pub fn assert_(&mut self, test: NodeId, message: Option<NodeId>) -> NodeId {
        self.add(NodeKind::Assert { test, message })
    }

    pub fn alias(&mut self, name: &str) -> ImportAlias {
        let span = self.next_span();
        ImportAlias {
            name: name.into(),
            alias: None,
            span,
        }
    }

    pub fn alias_as(&mut self, name: &str, alias: &str) -> ImportAlias {
        let span = self.next_span();
        ImportAlias {
            name: name.into(),
            alias: Some(alias.into()),
            span,
        }
    }

    pub fn import_(&mut self, names: Vec<ImportAlias>) -> NodeId {
        self.add(NodeKind::Import { names })
    }

    pub fn import_from(&mut self, module: &str, names: Vec<ImportAlias>) -> NodeId {
        self.add(NodeKind::ImportFrom {
            module: module.into(),
            names,
        })
    }

    pub fn expr_stmt(&mut self, value: NodeId) -> NodeId {
        self.add(NodeKind::ExprStmt { value })
    }

    pub fn pass_(&mut self) -> NodeId {
        self.add(NodeKind::Pass)
    }

    pub fn global_(&mut self, names: Vec<&str>) -> NodeId {
        self.add(NodeKind::Global {
            names: names.into_iter().map(Into::into).collect(),
        })
    }

    pub fn nonlocal_(&mut self, names: Vec<&str>) -> NodeId {
        self.add(NodeKind::Nonlocal {
            names: names.into_iter().map(Into::into).collect(),
        })
    }

    pub fn module(&mut self, body: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::Module { body })
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_are_distinct_and_increasing() {
        let mut b = TreeBuilder::new();
        let x = b.name("x");
        let y = b.name("y");
        let arena = b.finish();
        assert!(arena.span(x).end <= arena.span(y).start);
    }
}
