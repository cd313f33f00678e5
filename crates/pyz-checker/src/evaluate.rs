//! Expression evaluation: `get_type` dispatch.
//!
//! `get_type(node)` returns the type of any expression node, memoised per
//! (node, usage) pair. Handlers never raise for user-visible problems; they
//! emit a diagnostic and return Unknown so downstream checks continue with
//! maximally permissive information.

use crate::state::{CheckerState, EvalUsage};
use pyz_ast::{ComprehensionKind, NodeId, NodeKind, NumberValue};
use pyz_common::Rule;
use pyz_solver::{
    FunctionFlags, FunctionParameter, FunctionType, Type, combine_types, format_type,
    get_type_from_awaitable, get_type_from_iterable, strip_literal_value,
};
use std::sync::Arc;
use tracing::trace;

impl<'a> CheckerState<'a> {
    /// The type of an expression in load position.
    pub fn get_type(&mut self, node: NodeId) -> Type {
        self.get_type_with_usage(node, EvalUsage::Get)
    }

    /// The type of an expression under an explicit usage.
    pub fn get_type_with_usage(&mut self, node: NodeId, usage: EvalUsage) -> Type {
        self.cached_type(node, usage, |state| {
            let t = state.evaluate_expression(node, usage);
            trace!(node = node.0, ?usage, ty = %format_type(&t), "evaluated");
            t
        })
    }

    /// The void entry for statements with type side effects but no single
    /// expression type: assignments, loops, `with` items. Binds targets and
    /// populates the node cache; rule checks stay with the walker.
    pub fn evaluate_types_for_statement(&mut self, node: NodeId) {
        let kind = self.arena.get(node).kind.clone();
        match kind {
            NodeKind::Assign {
                ref targets,
                value,
            } => {
                let value_type = self.get_type(value);
                for &target in targets {
                    self.bind_target_to_type(target, value_type.clone());
                }
            }
            NodeKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                let declared = self.get_type_of_annotation(annotation);
                if let Some(value) = value {
                    let _ = self.get_type(value);
                }
                self.bind_target_to_type(target, declared);
            }
            NodeKind::AugAssign { target, op, value } => {
                let result = self.evaluate_binary(node, op, target, value);
                self.bind_target_to_type(target, result);
            }
            NodeKind::For {
                target,
                iterable,
                is_async,
                ..
            } => {
                let element = self.iterable_element_type(iterable, is_async, true);
                self.bind_target_to_type(target, element);
            }
            NodeKind::With {
                ref items,
                is_async,
                ..
            } => {
                for item in items {
                    let entered = self.enter_context_manager(item.context, is_async);
                    if let Some(target) = item.target {
                        self.bind_target_to_type(target, entered);
                    }
                }
            }
            _ => {}
        }
    }

    fn evaluate_expression(&mut self, node: NodeId, usage: EvalUsage) -> Type {
        let kind = self.arena.get(node).kind.clone();
        match kind {
            NodeKind::Name { ref id } => self.evaluate_name(node, id, usage),
            NodeKind::MemberAccess {
                base,
                ref member,
                member_span,
            } => self.evaluate_member_access(node, base, member, member_span, usage),
            NodeKind::Index { base, ref args } => self.evaluate_index(node, base, args, usage),
            NodeKind::Call { callee, ref args } => self.evaluate_call(node, callee, args),
            NodeKind::UnaryOp { op, operand } => self.evaluate_unary(node, op, operand),
            NodeKind::BinaryOp { op, left, right } => self.evaluate_binary(node, op, left, right),

            NodeKind::NumberLiteral { value } => match value {
                NumberValue::Int(v) => self.builtins.int_literal(v),
                NumberValue::Float(_) => self.builtins.instance(&self.builtins.float),
                NumberValue::Complex(_) => self.builtins.instance(&self.builtins.complex),
            },
            NodeKind::StringLiteral {
                ref value,
                is_bytes,
                ..
            } => {
                if is_bytes {
                    self.builtins.bytes_literal(value.as_bytes())
                } else {
                    self.builtins.str_literal(value)
                }
            }
            NodeKind::BooleanLiteral { value } => self.builtins.bool_literal(value),
            NodeKind::NoneLiteral => Type::None,
            NodeKind::EllipsisLiteral => Type::ellipsis(),

            NodeKind::TupleExpr { ref elements } => {
                let element_types: Vec<Type> = elements
                    .iter()
                    .map(|&e| strip_literal_value(&self.get_type(e)))
                    .collect();
                self.builtins.tuple_of(element_types)
            }
            NodeKind::ListExpr { ref elements } => {
                let element = self.joined_element_type(elements);
                self.builtins.list_of(element)
            }
            NodeKind::SetExpr { ref elements } => {
                let element = self.joined_element_type(elements);
                self.builtins.set_of(element)
            }
            NodeKind::DictExpr { ref entries } => {
                let mut keys: Vec<Type> = Vec::new();
                let mut values: Vec<Type> = Vec::new();
                for entry in entries {
                    match entry.key {
                        Some(key) => {
                            keys.push(strip_literal_value(&self.get_type(key)));
                            values.push(strip_literal_value(&self.get_type(entry.value)));
                        }
                        None => {
                            // `**mapping` expansion contributes its own k/v.
                            let mapping = self.get_type(entry.value);
                            if let Type::Object(o) = &mapping {
                                keys.push(o.class.type_argument(0));
                                values.push(o.class.type_argument(1));
                            }
                        }
                    }
                }
                let key = self.join_or_unknown(keys);
                let value = self.join_or_unknown(values);
                self.builtins.dict_of(key, value)
            }

            NodeKind::Ternary {
                test,
                then_expr,
                else_expr,
            } => {
                let _ = self.get_type(test);
                let (if_true, if_false) = self.narrowing_constraints(test);

                let mark = self.constraints.len();
                self.constraints.extend(if_true);
                let then_type = self.get_type(then_expr);
                self.constraints.truncate(mark);

                self.constraints.extend(if_false);
                let else_type = self.get_type(else_expr);
                self.constraints.truncate(mark);

                combine_types(vec![then_type, else_type])
            }

            NodeKind::ComprehensionExpr { ref comp } => {
                let mark = self.constraints.len();
                for clause in &comp.clauses {
                    let element =
                        self.iterable_element_type(clause.iterable, clause.is_async, false);
                    self.bind_target_to_type(clause.target, element);
                    for &condition in &clause.conditions {
                        let _ = self.get_type(condition);
                        let (if_true, _) = self.narrowing_constraints(condition);
                        self.constraints.extend(if_true);
                    }
                }
                let element = strip_literal_value(&self.get_type(comp.element));
                let key = comp.key.map(|k| strip_literal_value(&self.get_type(k)));
                self.constraints.truncate(mark);

                match comp.kind {
                    ComprehensionKind::List => self.builtins.list_of(element),
                    ComprehensionKind::Set => self.builtins.set_of(element),
                    ComprehensionKind::Dict => {
                        self.builtins.dict_of(key.unwrap_or(Type::Unknown), element)
                    }
                    ComprehensionKind::Generator => {
                        self.builtins.generator_of(element, Type::None, Type::None)
                    }
                }
            }

            NodeKind::Lambda { ref params, body } => self.evaluate_lambda(node, params, body),

            NodeKind::Await { operand } => {
                let operand_type = self.get_type(operand);
                if operand_type.is_any_or_unknown() {
                    return Type::Unknown;
                }
                self.ensure_members_for(&operand_type);
                let source = self.type_source();
                match get_type_from_awaitable(&operand_type, &source) {
                    Some(result) => result,
                    None => {
                        drop(source);
                        self.report(
                            Rule::GeneralTypeIssues,
                            self.arena.span(operand),
                            format!(
                                "\"{}\" is not awaitable",
                                format_type(&operand_type)
                            ),
                        );
                        Type::Unknown
                    }
                }
            }

            NodeKind::Yield { value } => self.evaluate_yield(node, value),
            NodeKind::YieldFrom { operand } => self.evaluate_yield_from(node, operand),

            NodeKind::AssignmentExpr { target, value } => {
                let value_type = self.get_type(value);
                self.bind_target_to_type(target, value_type.clone());
                value_type
            }

            NodeKind::Unpack { operand } => self.get_type(operand),

            // Evaluate the recovered child to keep downstream caches warm.
            NodeKind::Error { child } => {
                if let Some(child) = child {
                    let _ = self.get_type(child);
                }
                Type::Unknown
            }

            _ => {
                debug_assert!(
                    !self.arena.get(node).kind.is_expression(),
                    "unhandled expression kind"
                );
                Type::Unknown
            }
        }
    }

    /// The element join for list/set displays: the common type if every
    /// entry agrees (after literal stripping), Unknown otherwise.
    fn joined_element_type(&mut self, elements: &[NodeId]) -> Type {
        let types: Vec<Type> = elements
            .iter()
            .map(|&e| strip_literal_value(&self.get_type(e)))
            .collect();
        self.join_or_unknown(types)
    }

    fn join_or_unknown(&mut self, types: Vec<Type>) -> Type {
        let Some(first) = types.first().cloned() else {
            return Type::Unknown;
        };
        if types.iter().all(|t| t.is_same(&first, 0)) {
            first
        } else {
            Type::Unknown
        }
    }

    /// Resolve the element type of an iteration, reporting optional-iterable
    /// and non-iterable problems at `iterable_node`.
    pub(crate) fn iterable_element_type(
        &mut self,
        iterable_node: NodeId,
        is_async: bool,
        support_getitem: bool,
    ) -> Type {
        let iterable_type = self.get_type(iterable_node);
        self.ensure_members_for(&iterable_type);
        let source = self.type_source();
        let result = get_type_from_iterable(&iterable_type, is_async, support_getitem, &source);
        drop(source);
        if result.had_none {
            self.report(
                Rule::OptionalIterable,
                self.arena.span(iterable_node),
                "Object of type \"None\" cannot be used as iterable value",
            );
        }
        match result.element_type {
            Some(element) => element,
            None => {
                self.report(
                    Rule::GeneralTypeIssues,
                    self.arena.span(iterable_node),
                    format!("\"{}\" is not iterable", format_type(&iterable_type)),
                );
                Type::Unknown
            }
        }
    }

    /// Make the member symbols of every class mentioned by `t` resolvable
    /// through a `type_source` snapshot.
    pub(crate) fn ensure_members_for(&mut self, t: &Type) {
        match t {
            Type::Object(o) => self.ensure_class_members_computed(&o.class.clone()),
            Type::Class(c) => self.ensure_class_members_computed(&c.clone()),
            Type::Union(u) => {
                for entry in u.entries.clone() {
                    self.ensure_members_for(&entry);
                }
            }
            _ => {}
        }
    }

    fn evaluate_lambda(&mut self, node: NodeId, params: &[NodeId], body: NodeId) -> Type {
        if let Some(cached) = self.function_types.get(&node) {
            return Type::Function(cached.clone());
        }
        let mut function = FunctionType::new(None, FunctionFlags::SYNTHESIZED);
        function.declaration = Some(node);
        for &param in params {
            if let NodeKind::Parameter {
                name,
                category,
                annotation,
                default,
                ..
            } = &self.arena.get(param).kind.clone()
            {
                let param_type = match annotation {
                    Some(ann) => self.get_type_of_annotation(*ann),
                    None => Type::Unknown,
                };
                if let Some(default) = default {
                    let _ = self.get_type(*default);
                }
                function.parameters.push(FunctionParameter {
                    category: *category,
                    name: name.clone(),
                    has_default: default.is_some(),
                    param_type: param_type.clone(),
                });
                if let Some(symbol) = self.symbol_for_target(param) {
                    self.symbol_types.insert(symbol, param_type);
                }
            }
        }
        let body_type = self.get_type(body);
        let _ = function.inferred_return_type.set(body_type);
        let function = Arc::new(function);
        self.function_types.insert(node, function.clone());
        Type::Function(function)
    }

    fn evaluate_yield(&mut self, node: NodeId, value: Option<NodeId>) -> Type {
        let yielded = match value {
            Some(value) => self.get_type(value),
            None => Type::None,
        };
        let span = value
            .map(|v| self.arena.span(v))
            .unwrap_or_else(|| self.arena.span(node));
        self.record_yield(yielded.clone());
        let Some((declared_yield, send)) = self.enclosing_generator_types() else {
            return Type::Unknown;
        };
        if let Some(declared_yield) = declared_yield {
            self.check_assignable(
                &declared_yield,
                &yielded,
                span,
                Rule::GeneralTypeIssues,
                "Yield type mismatch",
            );
        }
        send.unwrap_or(Type::Unknown)
    }

    fn evaluate_yield_from(&mut self, node: NodeId, operand: NodeId) -> Type {
        let element = self.iterable_element_type(operand, false, false);
        self.record_yield(element.clone());
        if let Some((Some(declared_yield), _)) = self.enclosing_generator_types() {
            self.check_assignable(
                &declared_yield,
                &element,
                self.arena.span(operand),
                Rule::GeneralTypeIssues,
                "Yield type mismatch",
            );
        }
        // The value of `yield from` is the sub-generator's return type.
        let operand_type = self.get_type(operand);
        match &operand_type {
            Type::Object(o) if o.class.name() == "Generator" => o.class.type_argument(2),
            _ => {
                let _ = node;
                Type::Unknown
            }
        }
    }

    fn record_yield(&mut self, yielded: Type) {
        if let Some(context) = self.function_stack.last_mut() {
            context.is_generator = true;
            context.yield_types.push(yielded);
        }
    }

    /// The declared (yield, send) pair of the enclosing generator, read from
    /// its return annotation: `Generator[Y, S, R]`, `Iterator[Y]`,
    /// `Iterable[Y]`, or `AsyncGenerator[Y, S]`.
    pub(crate) fn enclosing_generator_types(&self) -> Option<(Option<Type>, Option<Type>)> {
        let context = self.function_stack.last()?;
        let declared = context.declared_return.as_ref()?;
        let Type::Object(o) = declared else {
            return Some((None, None));
        };
        match o.class.name() {
            "Generator" | "AsyncGenerator" => Some((
                Some(o.class.type_argument(0)),
                Some(o.class.type_argument(1)),
            )),
            "Iterator" | "Iterable" => Some((Some(o.class.type_argument(0)), None)),
            _ => Some((None, None)),
        }
    }
}
