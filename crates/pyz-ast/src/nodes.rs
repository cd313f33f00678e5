//! Node definitions for the parse tree.
//!
//! Nodes live in a flat `NodeArena`; every cross-reference is a `NodeId`.
//! Payloads are folded into the `NodeKind` sum type so consumers dispatch
//! with exhaustive matches; adding a kind is a compile-time event for every
//! handler.

use pyz_common::Span;
use smallvec::SmallVec;

/// Stable identity of a node within its arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One node of the parse tree.
#[derive(Clone, Debug)]
pub struct Node {
    pub span: Span,
    /// The enclosing node; `None` only for the module root.
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

/// How a call or class argument is passed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgumentCategory {
    /// `f(x)` or `f(name=x)`
    Simple,
    /// `f(*xs)`
    UnpackedList,
    /// `f(**kwargs)`
    UnpackedDict,
}

/// An argument at a call site or in a class definition's base list.
#[derive(Clone, Debug)]
pub struct Argument {
    pub category: ArgumentCategory,
    /// Keyword name for `f(name=x)`; also carries `metaclass=` on classes.
    pub name: Option<String>,
    pub value: NodeId,
}

/// How a parameter is declared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterCategory {
    /// An ordinary positional-or-keyword parameter, or a bare `*` separator
    /// when the parameter has no name.
    Simple,
    /// `*args`
    VarArgList,
    /// `**kwargs`
    VarArgDict,
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    Positive,
    Invert,
}

/// Binary operators, including boolean and comparison forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Modulo,
    Power,
    MatrixMultiply,
    LeftShift,
    RightShift,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    And,
    Or,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Is,
    IsNot,
    In,
    NotIn,
}

impl BinaryOperator {
    /// Comparison operators always evaluate to `bool`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::LessThan
                | BinaryOperator::LessThanOrEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanOrEqual
                | BinaryOperator::Is
                | BinaryOperator::IsNot
                | BinaryOperator::In
                | BinaryOperator::NotIn
        )
    }

    pub fn is_boolean(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

/// A parsed numeric literal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NumberValue {
    Int(i64),
    Float(f64),
    Complex(f64),
}

/// One `key: value` entry of a dict display; `key == None` is `**` expansion.
#[derive(Clone, Copy, Debug)]
pub struct DictEntry {
    pub key: Option<NodeId>,
    pub value: NodeId,
}

/// Which container a comprehension builds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComprehensionKind {
    List,
    Set,
    Dict,
    Generator,
}

/// One `for target in iter if cond...` clause.
#[derive(Clone, Debug)]
pub struct ComprehensionClause {
    pub target: NodeId,
    pub iterable: NodeId,
    pub conditions: SmallVec<[NodeId; 2]>,
    pub is_async: bool,
}

/// A full comprehension expression.
#[derive(Clone, Debug)]
pub struct Comprehension {
    pub kind: ComprehensionKind,
    /// Dict comprehensions carry a key expression; the others do not.
    pub key: Option<NodeId>,
    pub element: NodeId,
    pub clauses: Vec<ComprehensionClause>,
}

/// One name of an `import` / `from ... import` statement.
#[derive(Clone, Debug)]
pub struct ImportAlias {
    /// Dotted module path for `import`, bare symbol name for `from-import`.
    pub name: String,
    pub alias: Option<String>,
    pub span: Span,
}

/// One `ctx [as target]` item of a `with` statement.
#[derive(Clone, Copy, Debug)]
pub struct WithItem {
    pub context: NodeId,
    pub target: Option<NodeId>,
}

/// The sum type of every node kind the checker dispatches on.
#[derive(Clone, Debug)]
pub enum NodeKind {
    // ---- Expressions ----
    Name {
        id: String,
    },
    MemberAccess {
        base: NodeId,
        member: String,
        member_span: Span,
    },
    Index {
        base: NodeId,
        args: Vec<NodeId>,
    },
    Call {
        callee: NodeId,
        args: Vec<Argument>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: NodeId,
    },
    BinaryOp {
        op: BinaryOperator,
        left: NodeId,
        right: NodeId,
    },
    NumberLiteral {
        value: NumberValue,
    },
    StringLiteral {
        value: String,
        is_bytes: bool,
        /// Set by the parser when an unrecognised backslash escape appeared.
        has_invalid_escape: bool,
        /// Set by the parser for adjacent-literal concatenation.
        is_implicit_concat: bool,
    },
    BooleanLiteral {
        value: bool,
    },
    NoneLiteral,
    EllipsisLiteral,
    TupleExpr {
        elements: Vec<NodeId>,
    },
    ListExpr {
        elements: Vec<NodeId>,
    },
    SetExpr {
        elements: Vec<NodeId>,
    },
    DictExpr {
        entries: Vec<DictEntry>,
    },
    Ternary {
        test: NodeId,
        then_expr: NodeId,
        else_expr: NodeId,
    },
    ComprehensionExpr {
        comp: Comprehension,
    },
    Lambda {
        params: Vec<NodeId>,
        body: NodeId,
    },
    Await {
        operand: NodeId,
    },
    Yield {
        value: Option<NodeId>,
    },
    YieldFrom {
        operand: NodeId,
    },
    AssignmentExpr {
        target: NodeId,
        value: NodeId,
    },
    Unpack {
        operand: NodeId,
    },
    /// A parse error; the parser keeps whatever child it recovered.
    Error {
        child: Option<NodeId>,
    },

    // ---- Statements ----
    Module {
        body: Vec<NodeId>,
    },
    FunctionDef {
        name: String,
        name_span: Span,
        params: Vec<NodeId>,
        return_annotation: Option<NodeId>,
        decorators: Vec<NodeId>,
        body: Vec<NodeId>,
        is_async: bool,
    },
    Parameter {
        name: Option<String>,
        name_span: Span,
        category: ParameterCategory,
        annotation: Option<NodeId>,
        default: Option<NodeId>,
    },
    ClassDef {
        name: String,
        name_span: Span,
        arguments: Vec<Argument>,
        decorators: Vec<NodeId>,
        body: Vec<NodeId>,
    },
    Return {
        value: Option<NodeId>,
    },
    Assign {
        targets: Vec<NodeId>,
        value: NodeId,
    },
    AnnAssign {
        target: NodeId,
        annotation: NodeId,
        value: Option<NodeId>,
    },
    AugAssign {
        target: NodeId,
        op: BinaryOperator,
        value: NodeId,
    },
    For {
        target: NodeId,
        iterable: NodeId,
        body: Vec<NodeId>,
        orelse: Vec<NodeId>,
        is_async: bool,
    },
    While {
        test: NodeId,
        body: Vec<NodeId>,
        orelse: Vec<NodeId>,
    },
    If {
        test: NodeId,
        body: Vec<NodeId>,
        orelse: Vec<NodeId>,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<NodeId>,
        is_async: bool,
    },
    Raise {
        exc: Option<NodeId>,
        cause: Option<NodeId>,
    },
    Try {
        body: Vec<NodeId>,
        handlers: Vec<NodeId>,
        orelse: Vec<NodeId>,
        finally: Vec<NodeId>,
    },
    ExceptHandler {
        exc_type: Option<NodeId>,
        name: Option<String>,
        name_span: Span,
        body: Vec<NodeId>,
    },
    Assert {
        test: NodeId,
        message: Option<NodeId>,
    },
    Import {
        names: Vec<ImportAlias>,
    },
    ImportFrom {
        module: String,
        names: Vec<ImportAlias>,
    },
    ExprStmt {
        value: NodeId,
    },
    Pass,
    Break,
    Continue,
    Global {
        names: Vec<String>,
    },
    Nonlocal {
        names: Vec<String>,
    },
    Delete {
        targets: Vec<NodeId>,
    },
}

impl NodeKind {
    /// Child nodes in source order.
    ///
    /// Drives parent fix-up at construction time and generic traversal in
    /// the checker walker.
    pub fn children(&self) -> SmallVec<[NodeId; 8]> {
        let mut out: SmallVec<[NodeId; 8]> = SmallVec::new();
        let mut push = |id: NodeId| out.push(id);
        match self {
            NodeKind::Name { .. }
            | NodeKind::NumberLiteral { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::BooleanLiteral { .. }
            | NodeKind::NoneLiteral
            | NodeKind::EllipsisLiteral
            | NodeKind::Pass
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Global { .. }
            | NodeKind::Nonlocal { .. } => {}
            NodeKind::MemberAccess { base, .. } => push(*base),
            NodeKind::Index { base, args } => {
                push(*base);
                args.iter().copied().for_each(&mut push);
            }
            NodeKind::Call { callee, args } => {
                push(*callee);
                args.iter().for_each(|a| push(a.value));
            }
            NodeKind::UnaryOp { operand, .. } => push(*operand),
            NodeKind::BinaryOp { left, right, .. } => {
                push(*left);
                push(*right);
            }
            NodeKind::TupleExpr { elements }
            | NodeKind::ListExpr { elements }
            | NodeKind::SetExpr { elements } => elements.iter().copied().for_each(&mut push),
            NodeKind::DictExpr { entries } => {
                for entry in entries {
                    if let Some(key) = entry.key {
                        push(key);
                    }
                    push(entry.value);
                }
            }
            NodeKind::Ternary {
                test,
                then_expr,
                else_expr,
            } => {
                push(*test);
                push(*then_expr);
                push(*else_expr);
            }
            NodeKind::ComprehensionExpr { comp } => {
                for clause in &comp.clauses {
                    push(clause.target);
                    push(clause.iterable);
                    clause.conditions.iter().copied().for_each(&mut push);
                }
                if let Some(key) = comp.key {
                    push(key);
                }
                push(comp.element);
            }
            NodeKind::Lambda { params, body } => {
                params.iter().copied().for_each(&mut push);
                push(*body);
            }
            NodeKind::Await { operand }
            | NodeKind::YieldFrom { operand }
            | NodeKind::Unpack { operand } => push(*operand),
            NodeKind::Yield { value } => {
                if let Some(value) = value {
                    push(*value);
                }
            }
            NodeKind::AssignmentExpr { target, value } => {
                push(*target);
                push(*value);
            }
            NodeKind::Error { child } => {
                if let Some(child) = child {
                    push(*child);
                }
            }
            NodeKind::Module { body } => body.iter().copied().for_each(&mut push),
            NodeKind::FunctionDef {
                params,
                return_annotation,
                decorators,
                body,
                ..
            } => {
                decorators.iter().copied().for_each(&mut push);
                params.iter().copied().for_each(&mut push);
                if let Some(ann) = return_annotation {
                    push(*ann);
                }
                body.iter().copied().for_each(&mut push);
            }
            NodeKind::Parameter {
                annotation, default, ..
            } => {
                if let Some(ann) = annotation {
                    push(*ann);
                }
                if let Some(default) = default {
                    push(*default);
                }
            }
            NodeKind::ClassDef {
                arguments,
                decorators,
                body,
                ..
            } => {
                decorators.iter().copied().for_each(&mut push);
                arguments.iter().for_each(|a| push(a.value));
                body.iter().copied().for_each(&mut push);
            }
            NodeKind::Return { value } => {
                if let Some(value) = value {
                    push(*value);
                }
            }
            NodeKind::Assign { targets, value } => {
                targets.iter().copied().for_each(&mut push);
                push(*value);
            }
            NodeKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                push(*target);
                push(*annotation);
                if let Some(value) = value {
                    push(*value);
                }
            }
            NodeKind::AugAssign { target, value, .. } => {
                push(*target);
                push(*value);
            }
            NodeKind::For {
                target,
                iterable,
                body,
                orelse,
                ..
            } => {
                push(*target);
                push(*iterable);
                body.iter().copied().for_each(&mut push);
                orelse.iter().copied().for_each(&mut push);
            }
            NodeKind::While { test, body, orelse } | NodeKind::If { test, body, orelse } => {
                push(*test);
                body.iter().copied().for_each(&mut push);
                orelse.iter().copied().for_each(&mut push);
            }
            NodeKind::With { items, body, .. } => {
                for item in items {
                    push(item.context);
                    if let Some(target) = item.target {
                        push(target);
                    }
                }
                body.iter().copied().for_each(&mut push);
            }
            NodeKind::Raise { exc, cause } => {
                if let Some(exc) = exc {
                    push(*exc);
                }
                if let Some(cause) = cause {
                    push(*cause);
                }
            }
            NodeKind::Try {
                body,
                handlers,
                orelse,
                finally,
            } => {
                body.iter().copied().for_each(&mut push);
                handlers.iter().copied().for_each(&mut push);
                orelse.iter().copied().for_each(&mut push);
                finally.iter().copied().for_each(&mut push);
            }
            NodeKind::ExceptHandler { exc_type, body, .. } => {
                if let Some(exc_type) = exc_type {
                    push(*exc_type);
                }
                body.iter().copied().for_each(&mut push);
            }
            NodeKind::Assert { test, message } => {
                push(*test);
                if let Some(message) = message {
                    push(*message);
                }
            }
            NodeKind::Import { .. } | NodeKind::ImportFrom { .. } => {}
            NodeKind::ExprStmt { value } => push(*value),
            NodeKind::Delete { targets } => targets.iter().copied().for_each(&mut push),
        }
        out
    }

    /// True for kinds that appear in expression position.
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::Name { .. }
                | NodeKind::MemberAccess { .. }
                | NodeKind::Index { .. }
                | NodeKind::Call { .. }
                | NodeKind::UnaryOp { .. }
                | NodeKind::BinaryOp { .. }
                | NodeKind::NumberLiteral { .. }
                | NodeKind::StringLiteral { .. }
                | NodeKind::BooleanLiteral { .. }
                | NodeKind::NoneLiteral
                | NodeKind::EllipsisLiteral
                | NodeKind::TupleExpr { .. }
                | NodeKind::ListExpr { .. }
                | NodeKind::SetExpr { .. }
                | NodeKind::DictExpr { .. }
                | NodeKind::Ternary { .. }
                | NodeKind::ComprehensionExpr { .. }
                | NodeKind::Lambda { .. }
                | NodeKind::Await { .. }
                | NodeKind::Yield { .. }
                | NodeKind::YieldFrom { .. }
                | NodeKind::AssignmentExpr { .. }
                | NodeKind::Unpack { .. }
                | NodeKind::Error { .. }
        )
    }
}

/// Flat storage for all nodes of one source file.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and fix up its children's parent links.
    pub fn add(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for child in kind.children() {
            if let Some(node) = self.nodes.get_mut(child.index()) {
                node.parent = Some(id);
            }
        }
        self.nodes.push(Node {
            span,
            parent: None,
            kind,
        });
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walk ancestors from `id` (excluding `id` itself).
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |&p| self.parent(p))
    }
}
