//! The narrowing engine.
//!
//! A test expression produces two constraint sets: one that holds when the
//! test is true and one when it is false. Constraints are plain values - a
//! reference path plus an operation - kept on a stack that branch handlers
//! push and pop; applying them happens when a name or member access whose
//! path matches is evaluated.

use crate::state::CheckerState;
use pyz_ast::{ArgumentCategory, BinaryOperator, NodeId, NodeKind, NumberValue, UnaryOperator};
use pyz_common::Rule;
use pyz_solver::{
    ClassFlags, ClassType, LiteralValue, Type, combine_types, do_for_subtypes,
    remove_falsy_from_union, remove_none_from_union, remove_truthy_from_union,
    transform_type_object_to_class,
};

/// One segment of a narrowing target: `a.b.c` is `[Name(a), Member(b),
/// Member(c)]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefSegment {
    Name(String),
    Member(String),
}

pub type RefPath = Vec<RefSegment>;

/// The operation a constraint applies to its target's type.
#[derive(Clone, Debug)]
pub enum NarrowOp {
    /// `x is None` / `x is not None`.
    IsNone { positive: bool },
    /// `isinstance(x, C)` / `issubclass(x, C)`.
    IsInstance { classes: Vec<ClassType>, positive: bool },
    /// `type(x) is C`: exact class filter.
    IsClass { class: ClassType, positive: bool },
    /// `x == literal` / `x != literal`.
    LiteralEq { literal: LiteralValue, class: ClassType, positive: bool },
    /// Bare truthiness of the reference.
    Truthy { positive: bool },
}

#[derive(Clone, Debug)]
pub struct Constraint {
    pub path: RefPath,
    pub op: NarrowOp,
}

impl<'a> CheckerState<'a> {
    /// The reference path of a narrowable expression, if it is one.
    pub(crate) fn reference_path(&self, node: NodeId) -> Option<RefPath> {
        match &self.arena.get(node).kind {
            NodeKind::Name { id } => Some(vec![RefSegment::Name(id.clone())]),
            NodeKind::MemberAccess { base, member, .. } => {
                let mut path = self.reference_path(*base)?;
                path.push(RefSegment::Member(member.clone()));
                Some(path)
            }
            _ => None,
        }
    }

    /// Build the (if-true, if-false) constraint sets for a test expression.
    pub(crate) fn narrowing_constraints(
        &mut self,
        test: NodeId,
    ) -> (Vec<Constraint>, Vec<Constraint>) {
        let kind = self.arena.get(test).kind.clone();
        match kind {
            NodeKind::UnaryOp {
                op: UnaryOperator::Not,
                operand,
            } => {
                let (if_true, if_false) = self.narrowing_constraints(operand);
                (if_false, if_true)
            }

            NodeKind::BinaryOp {
                op: BinaryOperator::And,
                left,
                right,
            } => {
                let (mut left_true, _) = self.narrowing_constraints(left);
                let (right_true, _) = self.narrowing_constraints(right);
                left_true.extend(right_true);
                (left_true, Vec::new())
            }
            NodeKind::BinaryOp {
                op: BinaryOperator::Or,
                left,
                right,
            } => {
                let (_, mut left_false) = self.narrowing_constraints(left);
                let (_, right_false) = self.narrowing_constraints(right);
                left_false.extend(right_false);
                (Vec::new(), left_false)
            }

            NodeKind::BinaryOp {
                op: op @ (BinaryOperator::Is | BinaryOperator::IsNot),
                left,
                right,
            } => self.is_test_constraints(op, left, right),

            NodeKind::BinaryOp {
                op: op @ (BinaryOperator::Equal | BinaryOperator::NotEqual),
                left,
                right,
            } => self.equality_constraints(op, left, right),

            NodeKind::Call {
                callee, ref args, ..
            } => self.call_test_constraints(test, callee, args),

            NodeKind::Name { .. } | NodeKind::MemberAccess { .. } => {
                match self.reference_path(test) {
                    Some(path) => (
                        vec![Constraint {
                            path: path.clone(),
                            op: NarrowOp::Truthy { positive: true },
                        }],
                        vec![Constraint {
                            path,
                            op: NarrowOp::Truthy { positive: false },
                        }],
                    ),
                    None => (Vec::new(), Vec::new()),
                }
            }

            NodeKind::AssignmentExpr { target, .. } => match self.reference_path(target) {
                Some(path) => (
                    vec![Constraint {
                        path: path.clone(),
                        op: NarrowOp::Truthy { positive: true },
                    }],
                    vec![Constraint {
                        path,
                        op: NarrowOp::Truthy { positive: false },
                    }],
                ),
                None => (Vec::new(), Vec::new()),
            },

            _ => (Vec::new(), Vec::new()),
        }
    }

    fn is_test_constraints(
        &mut self,
        op: BinaryOperator,
        left: NodeId,
        right: NodeId,
    ) -> (Vec<Constraint>, Vec<Constraint>) {
        let positive_on_true = op == BinaryOperator::Is;

        // `x is None` (either operand order).
        let none_side = |state: &Self, a: NodeId, b: NodeId| {
            matches!(state.arena.get(a).kind, NodeKind::NoneLiteral)
                .then(|| b)
        };
        if let Some(reference) = none_side(self, right, left).or_else(|| none_side(self, left, right))
        {
            if let Some(path) = self.reference_path(reference) {
                let make = |positive: bool| Constraint {
                    path: path.clone(),
                    op: NarrowOp::IsNone { positive },
                };
                return (
                    vec![make(positive_on_true)],
                    vec![make(!positive_on_true)],
                );
            }
            return (Vec::new(), Vec::new());
        }

        // `type(x) is C`.
        if let NodeKind::Call { callee, args } = &self.arena.get(left).kind.clone() {
            if let NodeKind::Name { id } = &self.arena.get(*callee).kind {
                if id == "type" && args.len() == 1 {
                    if let Some(path) = self.reference_path(args[0].value) {
                        let right_type = self.get_type(right);
                        if let Type::Class(class) = right_type {
                            let make = |positive: bool| Constraint {
                                path: path.clone(),
                                op: NarrowOp::IsClass {
                                    class: class.clone(),
                                    positive,
                                },
                            };
                            return (
                                vec![make(positive_on_true)],
                                vec![make(!positive_on_true)],
                            );
                        }
                    }
                }
            }
        }

        (Vec::new(), Vec::new())
    }

    fn equality_constraints(
        &mut self,
        op: BinaryOperator,
        left: NodeId,
        right: NodeId,
    ) -> (Vec<Constraint>, Vec<Constraint>) {
        let positive_on_true = op == BinaryOperator::Equal;
        let literal_of = |state: &mut Self, node: NodeId| -> Option<(LiteralValue, ClassType)> {
            match &state.arena.get(node).kind {
                NodeKind::NumberLiteral {
                    value: NumberValue::Int(v),
                } => Some((LiteralValue::Int(*v), state.builtins.int.clone())),
                NodeKind::BooleanLiteral { value } => {
                    Some((LiteralValue::Bool(*value), state.builtins.bool.clone()))
                }
                NodeKind::StringLiteral {
                    value,
                    is_bytes: false,
                    ..
                } => Some((LiteralValue::Str(value.clone()), state.builtins.str.clone())),
                _ => None,
            }
        };

        let (reference, literal) = if let Some(literal) = literal_of(self, right) {
            (left, literal)
        } else if let Some(literal) = literal_of(self, left) {
            (right, literal)
        } else {
            return (Vec::new(), Vec::new());
        };
        let Some(path) = self.reference_path(reference) else {
            return (Vec::new(), Vec::new());
        };
        let (literal, class) = literal;
        let make = |positive: bool| Constraint {
            path: path.clone(),
            op: NarrowOp::LiteralEq {
                literal: literal.clone(),
                class: class.clone(),
                positive,
            },
        };
        (
            vec![make(positive_on_true)],
            vec![make(!positive_on_true)],
        )
    }

    fn call_test_constraints(
        &mut self,
        _test: NodeId,
        callee: NodeId,
        args: &[pyz_ast::Argument],
    ) -> (Vec<Constraint>, Vec<Constraint>) {
        let NodeKind::Name { id } = &self.arena.get(callee).kind.clone() else {
            return (Vec::new(), Vec::new());
        };
        if id != "isinstance" && id != "issubclass" {
            return (Vec::new(), Vec::new());
        }
        if args.len() != 2 || args.iter().any(|a| a.category != ArgumentCategory::Simple) {
            return (Vec::new(), Vec::new());
        }
        let Some(path) = self.reference_path(args[0].value) else {
            return (Vec::new(), Vec::new());
        };
        let classes = self.filter_classes_from_argument(args[1].value);
        if classes.is_empty() {
            return (Vec::new(), Vec::new());
        }
        let make = |positive: bool| Constraint {
            path: path.clone(),
            op: NarrowOp::IsInstance {
                classes: classes.clone(),
                positive,
            },
        };
        (vec![make(true)], vec![make(false)])
    }

    /// The class filter of an isinstance second argument: a class reference
    /// or a tuple of them. Non-runtime-checkable protocols are rejected.
    pub(crate) fn filter_classes_from_argument(&mut self, node: NodeId) -> Vec<ClassType> {
        let mut nodes = vec![node];
        if let NodeKind::TupleExpr { elements } = &self.arena.get(node).kind {
            nodes = elements.clone();
        }
        let mut classes = Vec::new();
        for filter_node in nodes {
            let t = self.get_type(filter_node);
            let t = transform_type_object_to_class(&t);
            if let Type::Class(class) = t {
                if class.details.flags().contains(ClassFlags::PROTOCOL)
                    && !class.details.flags().contains(ClassFlags::RUNTIME_CHECKABLE)
                {
                    self.report(
                        Rule::GeneralTypeIssues,
                        self.arena.span(filter_node),
                        format!(
                            "Protocol class \"{}\" cannot be used in instance checks because it is not runtime checkable",
                            class.name()
                        ),
                    );
                    continue;
                }
                classes.push(class);
            }
        }
        classes
    }

    /// Apply every constraint in force whose path matches `node`.
    pub(crate) fn apply_matching_constraints(&mut self, node: NodeId, t: Type) -> Type {
        let Some(path) = self.reference_path(node) else {
            return t;
        };
        let matching: Vec<NarrowOp> = self
            .constraints
            .iter()
            .filter(|c| c.path == path)
            .map(|c| c.op.clone())
            .collect();
        let mut t = t;
        for op in matching {
            t = apply_narrow_op(&t, &op);
        }
        t
    }
}

/// What one narrowing operation does to a type.
pub(crate) fn apply_narrow_op(t: &Type, op: &NarrowOp) -> Type {
    match op {
        NarrowOp::IsNone { positive: true } => {
            let admits_none = t.is_none()
                || t.is_any_or_unknown()
                || t.union_entries()
                    .is_some_and(|entries| entries.iter().any(Type::is_none));
            if admits_none { Type::None } else { Type::Never }
        }
        NarrowOp::IsNone { positive: false } => remove_none_from_union(t),

        NarrowOp::IsInstance { classes, positive } => {
            narrow_for_isinstance(t, classes, *positive)
        }

        NarrowOp::IsClass { class, positive } => do_for_subtypes(t, |entry| match entry {
            Type::Object(o) => {
                let matches = o.class.same_generic_class(class);
                if matches == *positive {
                    Some(Type::object(class.clone()))
                } else {
                    None
                }
            }
            other => {
                if *positive && other.is_any_or_unknown() {
                    Some(Type::object(class.clone()))
                } else {
                    Some(other.clone())
                }
            }
        }),

        NarrowOp::LiteralEq {
            literal,
            class,
            positive: true,
        } => do_for_subtypes(t, |entry| match entry {
            Type::Object(o) if o.class.same_generic_class(class) => match &o.literal {
                Some(existing) if existing == literal => Some(entry.clone()),
                Some(_) => None,
                None => Some(Type::literal_object(o.class.clone(), literal.clone())),
            },
            Type::Unknown | Type::Any { .. } => {
                Some(Type::literal_object(class.clone(), literal.clone()))
            }
            _ => None,
        }),
        NarrowOp::LiteralEq {
            literal,
            positive: false,
            ..
        } => do_for_subtypes(t, |entry| {
            if entry.literal_value() == Some(literal) {
                None
            } else {
                Some(entry.clone())
            }
        }),

        NarrowOp::Truthy { positive: true } => remove_falsy_from_union(t),
        NarrowOp::Truthy { positive: false } => remove_truthy_from_union(t),
    }
}

/// The isinstance union filter: keep members compatible with the class
/// list (narrowing super-types down to the filter class), drop the rest.
pub(crate) fn narrow_for_isinstance(t: &Type, classes: &[ClassType], positive: bool) -> Type {
    if positive && t.is_any_or_unknown() {
        let instances: Vec<Type> = classes.iter().map(|c| Type::object(c.clone())).collect();
        return combine_types(instances);
    }
    do_for_subtypes(t, |entry| match entry {
        Type::Object(o) => {
            let derived = classes.iter().any(|c| o.class.is_derived_from(c, 0));
            if positive {
                if derived {
                    Some(entry.clone())
                } else {
                    // A super-type of the filter narrows down to the filter.
                    classes
                        .iter()
                        .find(|c| c.is_derived_from(&o.class, 0))
                        .map(|c| Type::object(c.clone()))
                }
            } else if derived {
                None
            } else {
                Some(entry.clone())
            }
        }
        Type::None => {
            // None survives a negative filter and a NoneType-positive one.
            if positive { None } else { Some(Type::None) }
        }
        other => Some(other.clone()),
    })
}
