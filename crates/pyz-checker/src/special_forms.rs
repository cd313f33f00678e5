//! Type-annotation evaluation and typing special forms.
//!
//! Annotations denote instances: `int` in `x: int` means "an instance of
//! int". Expression evaluation yields class references for names like
//! `int`, so annotation evaluation converts, then the special forms
//! (`Optional`, `Union`, `Callable`, `Literal`, ...) build their composite
//! types directly.

use crate::state::CheckerState;
use pyz_ast::{BinaryOperator, NodeId, NodeKind};
use pyz_common::Rule;
use pyz_ast::ParameterCategory;
use pyz_solver::{
    ClassType, FunctionFlags, FunctionParameter, FunctionType, Type, combine_types,
};

impl<'a> CheckerState<'a> {
    /// Evaluate a type-annotation expression to the type it denotes.
    pub(crate) fn get_type_of_annotation(&mut self, node: NodeId) -> Type {
        let kind = self.arena.get(node).kind.clone();
        match kind {
            NodeKind::NoneLiteral => Type::None,
            NodeKind::EllipsisLiteral => Type::ellipsis(),
            // A string annotation is a forward reference; resolve the name
            // it spells.
            NodeKind::StringLiteral { ref value, .. } => {
                let scope = self.binder.scope_of(node);
                match pyz_binder::lookup_recursive(
                    &self.binder.scopes,
                    &self.binder.symbols,
                    scope,
                    value,
                ) {
                    Some(result) => {
                        let t = self.type_of_symbol(result.symbol);
                        self.annotation_value_to_type(t)
                    }
                    None => {
                        self.report(
                            Rule::UndefinedVariable,
                            self.arena.span(node),
                            format!("\"{value}\" is not defined"),
                        );
                        Type::Unknown
                    }
                }
            }
            // PEP 604 unions: `int | None`.
            NodeKind::BinaryOp {
                op: BinaryOperator::BitwiseOr,
                left,
                right,
            } => {
                let left = self.get_type_of_annotation(left);
                let right = self.get_type_of_annotation(right);
                combine_types(vec![left, right])
            }
            _ => {
                let t = self.get_type(node);
                self.annotation_value_to_type(t)
            }
        }
    }

    /// Convert an evaluated annotation expression value into the type it
    /// denotes.
    fn annotation_value_to_type(&mut self, t: Type) -> Type {
        match t {
            Type::Class(class) => {
                if class.is_special_builtin() {
                    return self.bare_special_form_type(&class);
                }
                let class = if class.type_arguments.is_none()
                    && !class.details.type_parameters().is_empty()
                {
                    class.clone_for_specialization(vec![])
                } else {
                    class
                };
                Type::object(class)
            }
            other => other,
        }
    }

    /// A special form used bare (no subscript) in annotation position.
    fn bare_special_form_type(&mut self, class: &ClassType) -> Type {
        // Bare container aliases mean their builtin class, unspecialised.
        if let Some(alias) = class.details.alias.clone() {
            let alias = if alias.details.type_parameters().is_empty() {
                alias
            } else {
                alias.clone_for_specialization(vec![])
            };
            return Type::object(alias);
        }
        match class.name() {
            "Callable" => Type::function(unconstrained_callable(Type::Unknown)),
            _ => Type::any(),
        }
    }

    /// Dispatch `Form[args...]`.
    pub(crate) fn evaluate_special_form(
        &mut self,
        node: NodeId,
        form: &ClassType,
        args: &[NodeId],
    ) -> Type {
        match form.name() {
            "Optional" => {
                if args.len() != 1 {
                    self.report(
                        Rule::GeneralTypeIssues,
                        self.arena.span(node),
                        "\"Optional\" expects a single type argument",
                    );
                    return Type::Unknown;
                }
                let inner = self.get_type_of_annotation(args[0]);
                combine_types(vec![inner, Type::None])
            }

            "Union" => {
                let entries: Vec<Type> = args
                    .iter()
                    .map(|&arg| self.get_type_of_annotation(arg))
                    .collect();
                combine_types(entries)
            }

            "Callable" => self.evaluate_callable_form(node, args),

            "Type" => {
                if args.len() != 1 {
                    self.report(
                        Rule::GeneralTypeIssues,
                        self.arena.span(node),
                        "\"Type\" expects a single type argument",
                    );
                    return Type::Unknown;
                }
                let inner = self.get_type_of_annotation(args[0]);
                self.builtins.type_of(inner)
            }

            "ClassVar" => {
                if args.len() != 1 {
                    self.report(
                        Rule::GeneralTypeIssues,
                        self.arena.span(node),
                        "\"ClassVar\" expects a single type argument",
                    );
                    return Type::Unknown;
                }
                let inner = self.get_type_of_annotation(args[0]);
                if inner.requires_specialization(0) {
                    self.report(
                        Rule::GeneralTypeIssues,
                        self.arena.span(args[0]),
                        "\"ClassVar\" cannot contain a type variable",
                    );
                }
                inner
            }

            "Final" => {
                if let Some(&arg) = args.first() {
                    self.get_type_of_annotation(arg)
                } else {
                    Type::any()
                }
            }

            "Literal" => {
                let mut entries = Vec::with_capacity(args.len());
                for &arg in args {
                    match self.literal_form_entry(arg) {
                        Some(entry) => entries.push(entry),
                        None => {
                            self.report(
                                Rule::GeneralTypeIssues,
                                self.arena.span(arg),
                                "Literal values must be int, bool, str, or bytes literals",
                            );
                            return Type::Unknown;
                        }
                    }
                }
                combine_types(entries)
            }

            "Generic" | "Protocol" => {
                let mut seen: Vec<String> = Vec::new();
                let mut type_args = Vec::with_capacity(args.len());
                for &arg in args {
                    let arg_type = self.get_type_of_annotation(arg);
                    match &arg_type {
                        Type::TypeVar(tv) => {
                            if seen.contains(&tv.name) {
                                self.report(
                                    Rule::GeneralTypeIssues,
                                    self.arena.span(arg),
                                    format!(
                                        "Type variable \"{}\" appears more than once",
                                        tv.name
                                    ),
                                );
                            }
                            seen.push(tv.name.clone());
                        }
                        _ => {
                            self.report(
                                Rule::GeneralTypeIssues,
                                self.arena.span(arg),
                                format!(
                                    "\"{}\" arguments must be distinct type variables",
                                    form.name()
                                ),
                            );
                        }
                    }
                    type_args.push(arg_type);
                }
                Type::Class(form.clone_for_specialization(type_args))
            }

            "Tuple" => {
                let target = form
                    .details
                    .alias
                    .clone()
                    .unwrap_or_else(|| form.clone());
                // `Tuple[T, ...]`: trailing ellipsis marks homogeneity.
                let type_args: Vec<Type> = args
                    .iter()
                    .map(|&arg| self.get_type_of_annotation(arg))
                    .collect();
                Type::object(target.clone_for_specialization(type_args))
            }

            // Fixed-arity container aliases.
            _ => {
                let Some(target) = form.details.alias.clone() else {
                    return Type::Unknown;
                };
                let expected = target.details.type_parameters().len();
                if args.len() != expected {
                    self.report(
                        Rule::GeneralTypeIssues,
                        self.arena.span(node),
                        format!(
                            "Expected {expected} type argument(s) for \"{}\", got {}",
                            form.name(),
                            args.len()
                        ),
                    );
                }
                let type_args: Vec<Type> = args
                    .iter()
                    .take(expected)
                    .map(|&arg| self.get_type_of_annotation(arg))
                    .collect();
                Type::object(target.clone_for_specialization(type_args))
            }
        }
    }

    fn evaluate_callable_form(&mut self, node: NodeId, args: &[NodeId]) -> Type {
        if args.len() != 2 {
            self.report(
                Rule::GeneralTypeIssues,
                self.arena.span(node),
                "\"Callable\" expects a parameter list and a return type",
            );
            return Type::Unknown;
        }
        let return_type = self.get_type_of_annotation(args[1]);
        match self.arena.get(args[0]).kind.clone() {
            NodeKind::ListExpr { ref elements } => {
                let mut function = FunctionType::new(None, FunctionFlags::SYNTHESIZED);
                for (i, &element) in elements.iter().enumerate() {
                    let param_type = self.get_type_of_annotation(element);
                    function.parameters.push(FunctionParameter {
                        category: ParameterCategory::Simple,
                        name: Some(format!("_p{i}")),
                        has_default: false,
                        param_type,
                    });
                }
                function.declared_return_type = Some(return_type);
                Type::function(function)
            }
            NodeKind::EllipsisLiteral => Type::function(unconstrained_callable(return_type)),
            _ => {
                self.report(
                    Rule::GeneralTypeIssues,
                    self.arena.span(args[0]),
                    "\"Callable\" parameter list must be a list of types or \"...\"",
                );
                Type::Unknown
            }
        }
    }

    fn literal_form_entry(&mut self, node: NodeId) -> Option<Type> {
        match &self.arena.get(node).kind {
            NodeKind::NumberLiteral {
                value: pyz_ast::NumberValue::Int(v),
            } => Some(self.builtins.int_literal(*v)),
            NodeKind::BooleanLiteral { value } => Some(self.builtins.bool_literal(*value)),
            NodeKind::StringLiteral {
                value,
                is_bytes: false,
                ..
            } => {
                let value = value.clone();
                Some(self.builtins.str_literal(&value))
            }
            NodeKind::StringLiteral {
                value,
                is_bytes: true,
                ..
            } => {
                let value = value.clone();
                Some(self.builtins.bytes_literal(value.as_bytes()))
            }
            NodeKind::UnaryOp {
                op: pyz_ast::UnaryOperator::Negate,
                operand,
            } => match &self.arena.get(*operand).kind {
                NodeKind::NumberLiteral {
                    value: pyz_ast::NumberValue::Int(v),
                } => Some(self.builtins.int_literal(-v)),
                _ => None,
            },
            NodeKind::NoneLiteral => Some(Type::None),
            _ => None,
        }
    }
}

/// `Callable[..., R]`: accepts any argument list.
fn unconstrained_callable(return_type: Type) -> FunctionType {
    let mut function = FunctionType::new(None, FunctionFlags::SYNTHESIZED);
    function.parameters = vec![
        FunctionParameter::var_positional("args", Type::any()),
        FunctionParameter::var_keyword("kwargs", Type::any()),
    ];
    function.declared_return_type = Some(return_type);
    function
}
