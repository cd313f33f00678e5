//! Unary and binary operator evaluation.

use crate::state::CheckerState;
use pyz_ast::{BinaryOperator, NodeId, UnaryOperator};
use pyz_common::Rule;
use pyz_solver::{
    LiteralValue, Type, bind_function_to_class_or_object, combine_types, format_type,
    look_up_object_member, remove_falsy_from_union, remove_none_from_union,
    remove_truthy_from_union, specialize_member_for_class, strip_literal_value,
};

fn binary_dunder(op: BinaryOperator) -> Option<&'static str> {
    Some(match op {
        BinaryOperator::Add => "__add__",
        BinaryOperator::Subtract => "__sub__",
        BinaryOperator::Multiply => "__mul__",
        BinaryOperator::Divide => "__truediv__",
        BinaryOperator::FloorDivide => "__floordiv__",
        BinaryOperator::Modulo => "__mod__",
        BinaryOperator::Power => "__pow__",
        BinaryOperator::MatrixMultiply => "__matmul__",
        BinaryOperator::LeftShift => "__lshift__",
        BinaryOperator::RightShift => "__rshift__",
        BinaryOperator::BitwiseAnd => "__and__",
        BinaryOperator::BitwiseOr => "__or__",
        BinaryOperator::BitwiseXor => "__xor__",
        _ => return None,
    })
}

fn operator_symbol(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Add => "+",
        BinaryOperator::Subtract => "-",
        BinaryOperator::Multiply => "*",
        BinaryOperator::Divide => "/",
        BinaryOperator::FloorDivide => "//",
        BinaryOperator::Modulo => "%",
        BinaryOperator::Power => "**",
        BinaryOperator::MatrixMultiply => "@",
        BinaryOperator::LeftShift => "<<",
        BinaryOperator::RightShift => ">>",
        BinaryOperator::BitwiseAnd => "&",
        BinaryOperator::BitwiseOr => "|",
        BinaryOperator::BitwiseXor => "^",
        _ => "?",
    }
}

impl<'a> CheckerState<'a> {
    pub(crate) fn evaluate_unary(
        &mut self,
        node: NodeId,
        op: UnaryOperator,
        operand: NodeId,
    ) -> Type {
        let operand_type = self.get_type(operand);
        match op {
            UnaryOperator::Not => self.builtins.instance(&self.builtins.bool),
            UnaryOperator::Negate | UnaryOperator::Positive | UnaryOperator::Invert => {
                if operand_type.is_any_or_unknown() {
                    return Type::Unknown;
                }
                if operand_type.is_none() {
                    self.report(
                        Rule::OptionalOperand,
                        self.arena.span(node),
                        "Operator not supported for \"None\"",
                    );
                    return Type::Unknown;
                }
                // Negating an int literal stays literal.
                if op == UnaryOperator::Negate {
                    if let Some(LiteralValue::Int(v)) = operand_type.literal_value() {
                        return self.builtins.int_literal(-v);
                    }
                }
                let dunder = match op {
                    UnaryOperator::Negate => "__neg__",
                    UnaryOperator::Positive => "__pos__",
                    _ => "__invert__",
                };
                match self.dunder_return(&operand_type, dunder, None, node) {
                    Some(result) => result,
                    None => {
                        self.report(
                            Rule::GeneralTypeIssues,
                            self.arena.span(node),
                            format!(
                                "Operator not supported for \"{}\"",
                                format_type(&operand_type)
                            ),
                        );
                        Type::Unknown
                    }
                }
            }
        }
    }

    pub(crate) fn evaluate_binary(
        &mut self,
        node: NodeId,
        op: BinaryOperator,
        left: NodeId,
        right: NodeId,
    ) -> Type {
        // Short-circuit operators narrow their right operand by the
        // constraint the left operand implies.
        if op.is_boolean() {
            let left_type = self.get_type(left);
            let (if_true, if_false) = self.narrowing_constraints(left);
            let mark = self.constraints.len();
            match op {
                BinaryOperator::And => self.constraints.extend(if_true),
                _ => self.constraints.extend(if_false),
            }
            let right_type = self.get_type(right);
            self.constraints.truncate(mark);
            return match op {
                BinaryOperator::And => {
                    combine_types(vec![remove_truthy_from_union(&left_type), right_type])
                }
                _ => combine_types(vec![remove_falsy_from_union(&left_type), right_type]),
            };
        }

        if op.is_comparison() {
            let _ = self.get_type(left);
            let _ = self.get_type(right);
            return self.builtins.instance(&self.builtins.bool);
        }

        let left_type = self.get_type(left);
        let right_type = self.get_type(right);

        // `int | str` in value position is the PEP 604 union constructor.
        if op == BinaryOperator::BitwiseOr
            && matches!(left_type, Type::Class(_))
            && matches!(right_type, Type::Class(_))
        {
            let left_ann = self.get_type_of_annotation(left);
            let right_ann = self.get_type_of_annotation(right);
            return combine_types(vec![left_ann, right_ann]);
        }

        if left_type.is_any_or_unknown() || right_type.is_any_or_unknown() {
            return Type::Unknown;
        }

        let mut reported_none = false;
        for operand in [&left_type, &right_type] {
            let has_none = operand.is_none()
                || operand
                    .union_entries()
                    .is_some_and(|entries| entries.iter().any(Type::is_none));
            if has_none && !reported_none {
                self.report(
                    Rule::OptionalOperand,
                    self.arena.span(node),
                    format!(
                        "Operator \"{}\" not supported for \"None\"",
                        operator_symbol(op)
                    ),
                );
                reported_none = true;
            }
        }
        let left_type = remove_none_from_union(&left_type);
        let right_type = remove_none_from_union(&right_type);
        if left_type.is_never() || right_type.is_never() {
            return Type::Unknown;
        }

        // Builtin numerics follow the promotion lattice directly.
        if let (Type::Object(l), Type::Object(r)) = (&left_type, &right_type) {
            if let Some(promoted) = self.builtins.promote_numeric(&l.class, &r.class) {
                if op == BinaryOperator::Divide
                    && !promoted.same_generic_class(&self.builtins.complex)
                {
                    return self.builtins.instance(&self.builtins.float);
                }
                return self.builtins.instance(&promoted);
            }
        }

        let Some(dunder) = binary_dunder(op) else {
            return Type::Unknown;
        };
        match self.dunder_return(&left_type, dunder, Some((&right_type, right)), node) {
            Some(result) => result,
            None => {
                self.report(
                    Rule::GeneralTypeIssues,
                    self.arena.span(node),
                    format!(
                        "Operator \"{}\" not supported for types \"{}\" and \"{}\"",
                        operator_symbol(op),
                        format_type(&left_type),
                        format_type(&right_type)
                    ),
                );
                Type::Unknown
            }
        }
    }

    /// Resolve an operator dunder on the operand's class, validating the
    /// right-hand argument when one applies.
    fn dunder_return(
        &mut self,
        operand: &Type,
        dunder: &str,
        argument: Option<(&Type, NodeId)>,
        node: NodeId,
    ) -> Option<Type> {
        let Type::Object(obj) = operand else {
            return None;
        };
        let class = obj.class.clone();
        self.ensure_class_members_computed(&class);
        let found = look_up_object_member(&class, dunder)?;
        let member = self.type_of_symbol(found.symbol);
        let member = specialize_member_for_class(member, &class);
        let Type::Function(f) = member else {
            return None;
        };
        let Type::Function(bound) = bind_function_to_class_or_object(operand, &f) else {
            return None;
        };
        if let (Some((argument_type, argument_node)), Some(param)) =
            (argument, bound.parameters.first())
        {
            let param_type = param.param_type.clone();
            let stripped = strip_literal_value(argument_type);
            if !self.is_assignable(&param_type, &stripped) {
                self.report(
                    Rule::GeneralTypeIssues,
                    self.arena.span(argument_node),
                    format!(
                        "Operand of type \"{}\" is not assignable to \"{}\"",
                        format_type(argument_type),
                        format_type(&param_type)
                    ),
                );
                let _ = node;
            }
        }
        Some(bound.effective_return_type())
    }
}
