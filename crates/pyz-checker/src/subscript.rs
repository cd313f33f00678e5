//! Index expressions: special-form dispatch, explicit specialisation of
//! generic classes, and `__getitem__`/`__setitem__`/`__delitem__` access.

use crate::state::{CheckerState, EvalUsage};
use pyz_ast::{NodeId, NodeKind, NumberValue};
use pyz_common::Rule;
use pyz_solver::{
    ClassType, LiteralValue, Type, bind_function_to_class_or_object, combine_types, format_type,
    look_up_object_member, specialize_member_for_class,
};

impl<'a> CheckerState<'a> {
    pub(crate) fn evaluate_index(
        &mut self,
        node: NodeId,
        base: NodeId,
        args: &[NodeId],
        usage: EvalUsage,
    ) -> Type {
        let base_type = self.get_type(base);
        match &base_type {
            Type::Any { .. } | Type::Unknown => Type::Unknown,

            Type::Class(class) if class.is_special_builtin() => {
                let class = class.clone();
                self.evaluate_special_form(node, &class, args)
            }

            // Explicit specialisation of a generic class reference.
            Type::Class(class) => {
                let class = class.clone();
                self.specialize_class_reference(node, &class, args)
            }

            Type::None => {
                self.report(
                    Rule::OptionalSubscript,
                    self.arena.span(node),
                    "\"None\" is not subscriptable",
                );
                Type::Unknown
            }

            Type::Union(u) => {
                let entries = u.entries.clone();
                let mut results = Vec::with_capacity(entries.len());
                for entry in &entries {
                    if entry.is_none() {
                        self.report(
                            Rule::OptionalSubscript,
                            self.arena.span(node),
                            "\"None\" is not subscriptable",
                        );
                        continue;
                    }
                    results.push(self.subscript_object(node, entry, args, usage));
                }
                combine_types(results)
            }

            _ => self.subscript_object(node, &base_type, args, usage),
        }
    }

    fn subscript_object(
        &mut self,
        node: NodeId,
        base_type: &Type,
        args: &[NodeId],
        usage: EvalUsage,
    ) -> Type {
        let Type::Object(obj) = base_type else {
            self.report(
                Rule::GeneralTypeIssues,
                self.arena.span(node),
                format!("\"{}\" is not subscriptable", format_type(base_type)),
            );
            return Type::Unknown;
        };

        // A literal integer index into a known tuple resolves to the exact
        // element type.
        if obj.class.name() == "tuple" && usage == EvalUsage::Get {
            if let Some(result) = self.tuple_literal_index(node, &obj.class, args) {
                return result;
            }
        }

        let dunder = match usage {
            EvalUsage::Get => "__getitem__",
            EvalUsage::Set => "__setitem__",
            EvalUsage::Del => "__delitem__",
        };
        let class = obj.class.clone();
        self.ensure_class_members_computed(&class);
        let Some(found) = look_up_object_member(&class, dunder) else {
            self.report(
                Rule::GeneralTypeIssues,
                self.arena.span(node),
                format!(
                    "\"{}\" does not define \"{dunder}\"",
                    format_type(base_type)
                ),
            );
            return Type::Unknown;
        };
        let member = self.type_of_symbol(found.symbol);
        let member = specialize_member_for_class(member, &class);
        // Overloaded dunders resolve through their first variant.
        let function = match member {
            Type::Function(f) => f,
            Type::Overloaded(o) => match o.overloads.first() {
                Some(f) => f.clone(),
                None => return Type::Unknown,
            },
            _ => return Type::Unknown,
        };
        let Type::Function(f) = bind_function_to_class_or_object(base_type, &function) else {
            return Type::Unknown;
        };

        // Validate the index argument against the bound signature.
        if let (Some(&index_node), Some(param)) = (args.first(), f.parameters.first()) {
            let index_type = self.get_type(index_node);
            let param_type = param.param_type.clone();
            self.check_assignable(
                &param_type,
                &index_type,
                self.arena.span(index_node),
                Rule::GeneralTypeIssues,
                "Subscript index mismatch",
            );
        }
        match usage {
            EvalUsage::Get => f.effective_return_type(),
            EvalUsage::Set => f
                .parameters
                .get(1)
                .map(|p| p.param_type.clone())
                .unwrap_or(Type::Unknown),
            EvalUsage::Del => Type::None,
        }
    }

    fn tuple_literal_index(
        &mut self,
        node: NodeId,
        tuple_class: &ClassType,
        args: &[NodeId],
    ) -> Option<Type> {
        let type_args = tuple_class.type_arguments.as_ref()?;
        if type_args
            .iter()
            .any(|a| matches!(a, Type::Any { is_ellipsis: true }))
        {
            // Homogeneous tuple: every index yields the element type.
            return type_args.first().cloned();
        }
        let &index_node = args.first()?;
        let index_type = self.get_type(index_node);
        let Some(LiteralValue::Int(index)) = index_type.literal_value().cloned() else {
            return None;
        };
        let len = type_args.len() as i64;
        let normalized = if index < 0 { index + len } else { index };
        if normalized < 0 || normalized >= len {
            self.report(
                Rule::GeneralTypeIssues,
                self.arena.span(node),
                format!("Index {index} is out of range for \"{}\"", tuple_class.name()),
            );
            return Some(Type::Unknown);
        }
        type_args.get(normalized as usize).cloned()
    }

    /// `C[T1, T2]`: validate argument count and bounds, and produce the
    /// specialised class reference.
    fn specialize_class_reference(
        &mut self,
        node: NodeId,
        class: &ClassType,
        args: &[NodeId],
    ) -> Type {
        let params = class.details.type_parameters();
        if params.is_empty() {
            self.report(
                Rule::GeneralTypeIssues,
                self.arena.span(node),
                format!("\"{}\" is not generic", class.name()),
            );
            return Type::Class(class.clone());
        }
        // tuple is variadic; every other class is fixed-arity.
        if args.len() > params.len() && class.name() != "tuple" {
            self.report(
                Rule::GeneralTypeIssues,
                self.arena.span(node),
                format!(
                    "Expected {} type argument(s) for \"{}\", got {}",
                    params.len(),
                    class.name(),
                    args.len()
                ),
            );
        }
        let mut type_args = Vec::with_capacity(args.len());
        for (i, &arg) in args.iter().enumerate() {
            let arg_type = self.get_type_of_annotation(arg);
            if let Some(param) = params.get(i) {
                if let Some(bound) = &param.bound {
                    let bound = bound.clone();
                    self.check_assignable(
                        &bound,
                        &arg_type,
                        self.arena.span(arg),
                        Rule::GeneralTypeIssues,
                        "Type argument violates bound",
                    );
                }
                if !param.constraints.is_empty() {
                    let constraints = param.constraints.clone();
                    let satisfied = constraints
                        .iter()
                        .any(|c| self.is_assignable(c, &arg_type));
                    if !satisfied {
                        self.report(
                            Rule::GeneralTypeIssues,
                            self.arena.span(arg),
                            format!(
                                "Type argument \"{}\" matches no constraint of \"{}\"",
                                format_type(&arg_type),
                                param.name
                            ),
                        );
                    }
                }
            }
            type_args.push(arg_type);
        }
        Type::Class(class.clone_for_specialization(type_args))
    }
}
