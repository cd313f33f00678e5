//! Member access evaluation: class members, instance members, modules,
//! descriptors, and optional-access reporting.

use crate::state::{CheckerState, EvalUsage};
use pyz_ast::NodeId;
use pyz_common::{Rule, Span};
use pyz_solver::{
    MemberLookupFlags, Type, bind_function_to_class_or_object, combine_types, format_type,
    look_up_class_member, look_up_object_member, specialize_member_for_class,
    transform_type_object_to_class,
};

impl<'a> CheckerState<'a> {
    pub(crate) fn evaluate_member_access(
        &mut self,
        node: NodeId,
        base: NodeId,
        member: &str,
        member_span: Span,
        usage: EvalUsage,
    ) -> Type {
        let base_type = self.get_type(base);
        let t = self.member_type_for_base(&base_type, member, member_span, usage);
        self.apply_matching_constraints(node, t)
    }

    fn member_type_for_base(
        &mut self,
        base_type: &Type,
        member: &str,
        member_span: Span,
        usage: EvalUsage,
    ) -> Type {
        match base_type {
            Type::Any { .. } => Type::any(),
            Type::Unknown | Type::Unbound | Type::Never => Type::Unknown,

            Type::None => {
                self.report(
                    Rule::OptionalMemberAccess,
                    member_span,
                    format!("\"{member}\" is not a known member of \"None\""),
                );
                Type::Unknown
            }

            // Distribute; None members warn but do not abort the access.
            Type::Union(u) => {
                let entries = u.entries.clone();
                let mut results = Vec::with_capacity(entries.len());
                for entry in &entries {
                    if entry.is_none() {
                        self.report(
                            Rule::OptionalMemberAccess,
                            member_span,
                            format!("\"{member}\" is not a known member of \"None\""),
                        );
                        continue;
                    }
                    results.push(self.member_type_for_base(entry, member, member_span, usage));
                }
                combine_types(results)
            }

            Type::Class(class) => {
                let class = class.clone();
                self.ensure_class_members_computed(&class);
                match look_up_class_member(
                    &class,
                    member,
                    MemberLookupFlags::SKIP_INSTANCE_VARIABLES,
                ) {
                    Some(found) => {
                        let member_type = self.type_of_symbol(found.symbol);
                        let member_type = specialize_member_for_class(member_type, &class);
                        self.bind_member(base_type, member_type, member_span, usage)
                    }
                    None => {
                        self.report(
                            Rule::GeneralTypeIssues,
                            member_span,
                            format!(
                                "\"{member}\" is not a known member of class \"{}\"",
                                class.name()
                            ),
                        );
                        Type::Unknown
                    }
                }
            }

            Type::Object(obj) => {
                // A `Type[X]` wrapper accesses members of the class X.
                if obj.class.name() == "type" && obj.class.type_arguments.is_some() {
                    let unwrapped = transform_type_object_to_class(base_type);
                    if let Type::Class(_) = &unwrapped {
                        return self.member_type_for_base(&unwrapped, member, member_span, usage);
                    }
                }
                let class = obj.class.clone();
                self.ensure_class_members_computed(&class);
                match look_up_object_member(&class, member) {
                    Some(found) => {
                        let member_type = self.type_of_symbol(found.symbol);
                        let member_type = specialize_member_for_class(member_type, &class);
                        self.bind_member(base_type, member_type, member_span, usage)
                    }
                    None => {
                        self.report(
                            Rule::GeneralTypeIssues,
                            member_span,
                            format!(
                                "\"{member}\" is not a known member of \"{}\"",
                                format_type(base_type)
                            ),
                        );
                        Type::Unknown
                    }
                }
            }

            Type::Module(module) => match module.fields.get(member) {
                Some(&symbol) => self.type_of_symbol(symbol),
                None => {
                    if module.is_partial {
                        return Type::Unknown;
                    }
                    self.report(
                        Rule::GeneralTypeIssues,
                        member_span,
                        format!(
                            "\"{member}\" is not a known member of module \"{}\"",
                            module.name
                        ),
                    );
                    Type::Unknown
                }
            },

            // Function/property/overload bases synthesise a small surface.
            Type::Function(_) | Type::Overloaded(_) => match member {
                "__call__" => base_type.clone(),
                "__name__" => self.builtins.instance(&self.builtins.str),
                _ => Type::Unknown,
            },
            Type::Property(p) => match member {
                // Accessor-decorator forms (`@x.setter`) are recognised
                // syntactically by the function evaluator; the value here is
                // the property itself so the decorator call type-checks.
                "setter" | "deleter" | "getter" => Type::Property(p.clone()),
                _ => Type::Unknown,
            },
            Type::TypeVar(tv) => {
                // Access through the bound, when one exists.
                match &tv.bound {
                    Some(bound) => {
                        let bound = bound.clone();
                        self.member_type_for_base(&bound, member, member_span, usage)
                    }
                    None => Type::Unknown,
                }
            }
        }
    }

    /// Apply binding and the descriptor protocol to a found member.
    fn bind_member(
        &mut self,
        base_type: &Type,
        member_type: Type,
        member_span: Span,
        usage: EvalUsage,
    ) -> Type {
        match &member_type {
            Type::Function(f) => bind_function_to_class_or_object(base_type, f),
            Type::Property(p) => match usage {
                EvalUsage::Get => {
                    let bound = bind_function_to_class_or_object(base_type, &p.getter);
                    match bound {
                        Type::Function(getter) => getter.effective_return_type(),
                        other => other,
                    }
                }
                EvalUsage::Set => {
                    if let Some(setter) = &p.setter {
                        setter
                            .parameters
                            .get(1)
                            .map(|param| param.param_type.clone())
                            .unwrap_or(Type::Unknown)
                    } else {
                        self.report(
                            Rule::GeneralTypeIssues,
                            member_span,
                            "Property has no setter".to_string(),
                        );
                        Type::Unknown
                    }
                }
                EvalUsage::Del => {
                    if p.deleter.is_none() {
                        self.report(
                            Rule::GeneralTypeIssues,
                            member_span,
                            "Property has no deleter".to_string(),
                        );
                    }
                    Type::None
                }
            },
            // A user descriptor customises attribute access via
            // __get__/__set__/__delete__.
            Type::Object(o) => {
                let descriptor_member = match usage {
                    EvalUsage::Get => "__get__",
                    EvalUsage::Set => "__set__",
                    EvalUsage::Del => "__delete__",
                };
                let class = o.class.clone();
                if let Some(found) = look_up_object_member(&class, descriptor_member) {
                    let accessor = self.type_of_symbol(found.symbol);
                    let accessor = specialize_member_for_class(accessor, &class);
                    if let Type::Function(f) = accessor {
                        return match usage {
                            EvalUsage::Get => f.effective_return_type(),
                            EvalUsage::Set => f
                                .parameters
                                .last()
                                .map(|p| p.param_type.clone())
                                .unwrap_or(Type::Unknown),
                            EvalUsage::Del => Type::None,
                        };
                    }
                }
                member_type
            }
            _ => member_type,
        }
    }
}
