//! Class-definition types: base-class evaluation, type-parameter
//! collection, decorator flags, and data-class `__init__` synthesis.

use crate::state::CheckerState;
use pyz_ast::{NodeId, NodeKind};
use pyz_common::Rule;
use pyz_solver::{
    BaseClass, ClassDetails, ClassFlags, ClassType, FunctionFlags, FunctionParameter,
    FunctionType, Type, TypeVarType,
};
use std::sync::Arc;

impl<'a> CheckerState<'a> {
    /// The class type of a class-definition node; one identity per pass.
    pub(crate) fn get_type_of_class(&mut self, node: NodeId) -> ClassType {
        if let Some(cached) = self.class_types.get(&node) {
            return cached.clone();
        }
        let class = self.compute_class_type(node);
        self.class_types.insert(node, class.clone());
        class
    }

    fn compute_class_type(&mut self, node: NodeId) -> ClassType {
        let NodeKind::ClassDef {
            name,
            arguments,
            decorators,
            ..
        } = self.arena.get(node).kind.clone()
        else {
            return ClassType::new(Arc::new(ClassDetails::new(
                "<error>",
                ClassFlags::empty(),
                Some(node),
            )));
        };

        let mut flags = ClassFlags::empty();

        // Decorator flags first; they influence synthesis below.
        let mut untyped_decorator_spans = Vec::new();
        for &decorator in &decorators {
            let decorator_type = self.get_type(decorator);
            match &decorator_type {
                Type::Function(f) => match f.builtin_name.as_deref() {
                    Some("dataclass") => flags |= ClassFlags::DATA_CLASS,
                    Some("runtime_checkable") => flags |= ClassFlags::RUNTIME_CHECKABLE,
                    Some("final") => flags |= ClassFlags::FINAL,
                    _ => {
                        if f.effective_return_type().is_unknown() {
                            untyped_decorator_spans.push(self.arena.span(decorator));
                        }
                    }
                },
                Type::Unknown => untyped_decorator_spans.push(self.arena.span(decorator)),
                _ => {}
            }
        }
        for span in untyped_decorator_spans {
            self.report(
                Rule::UntypedClassDecorator,
                span,
                "Untyped class decorator obscures the type of the class",
            );
        }

        let details = Arc::new(ClassDetails::new(&name, flags, Some(node)));
        let class = ClassType::new(details);
        // Publish the identity before walking bases and members so
        // self-references resolve to this class.
        self.class_types.insert(node, class.clone());

        let mut type_parameters: Vec<Arc<TypeVarType>> = Vec::new();
        let mut generic_parameters: Option<Vec<Arc<TypeVarType>>> = None;
        let mut protocol = false;
        let mut saw_base = false;

        for argument in &arguments {
            let is_metaclass = argument.name.as_deref() == Some("metaclass");
            if argument.name.is_some() && !is_metaclass {
                // Other class keywords (e.g. total=) are recorded by
                // evaluating the value only.
                let _ = self.get_type(argument.value);
                continue;
            }
            let base_type = self.get_type(argument.value);
            match &base_type {
                Type::Class(base_class) => {
                    match base_class.name() {
                        "Generic" => {
                            generic_parameters =
                                Some(collect_type_vars(base_class, &mut Vec::new()));
                            continue;
                        }
                        "Protocol" => {
                            protocol = true;
                            if base_class.type_arguments.is_some() {
                                generic_parameters =
                                    Some(collect_type_vars(base_class, &mut Vec::new()));
                            }
                            continue;
                        }
                        "TypedDict" => {
                            add_flag(&class, ClassFlags::TYPED_DICT);
                            continue;
                        }
                        _ => {}
                    }
                    if base_class.details.flags().contains(ClassFlags::FINAL) {
                        self.report(
                            Rule::GeneralTypeIssues,
                            self.arena.span(argument.value),
                            format!("Base class \"{}\" is marked final", base_class.name()),
                        );
                    }
                    saw_base = true;
                    collect_free_type_vars(&base_type, &mut type_parameters);
                    class.details.add_base(BaseClass {
                        class_type: base_type.clone(),
                        is_metaclass,
                    });
                    if is_metaclass
                        && base_class.is_derived_from(&self.builtins.type_class, 0)
                    {
                        add_flag(&class, ClassFlags::METACLASS);
                    }
                }
                Type::Unknown => {
                    self.report(
                        Rule::UntypedBaseClass,
                        self.arena.span(argument.value),
                        "Base class type is unknown, which obscures the class type",
                    );
                    saw_base = true;
                    class.details.add_base(BaseClass {
                        class_type: Type::Unknown,
                        is_metaclass,
                    });
                }
                _ => {
                    self.report(
                        Rule::GeneralTypeIssues,
                        self.arena.span(argument.value),
                        "Base class must be a class",
                    );
                }
            }
        }

        if protocol {
            add_flag(&class, ClassFlags::PROTOCOL);
        }
        // Every class ultimately derives object.
        if !saw_base && !class.details.flags().contains(ClassFlags::SPECIAL_BUILT_IN) {
            class.details.add_base(BaseClass {
                class_type: Type::Class(self.builtins.object.clone()),
                is_metaclass: false,
            });
        }

        // Generic[...] pins the parameter list; otherwise free TypeVars in
        // the bases define it, in appearance order.
        let parameters = generic_parameters.unwrap_or(type_parameters);
        if !parameters.is_empty() {
            class.details.set_type_parameters(parameters);
        }

        // Class-suite symbols become class fields.
        if let Some(&class_scope) = self.binder.class_scopes.get(&node) {
            let table = self.binder.scopes.get(class_scope).table.clone();
            for (field_name, symbol) in table {
                class.details.add_field(&field_name, symbol);
            }
        }
        // `self.x = ...` declarations become instance fields.
        if let Some(members) = self.binder.instance_members.get(&node) {
            for (member_name, &symbol) in members.clone().iter() {
                class.details.add_instance_field(member_name, symbol);
            }
        }

        if class.details.flags().contains(ClassFlags::DATA_CLASS)
            && !class
                .details
                .flags()
                .contains(ClassFlags::SKIP_SYNTHESIZED_INIT)
        {
            self.synthesize_dataclass_init(node, &class);
        }

        class
    }

    /// `@dataclass` synthesises `__init__` from the annotated class fields,
    /// in declaration order, unless the suite defines its own.
    fn synthesize_dataclass_init(&mut self, node: NodeId, class: &ClassType) {
        if class.details.field("__init__").is_some() {
            return;
        }
        let NodeKind::ClassDef { body, .. } = self.arena.get(node).kind.clone() else {
            return;
        };
        let mut init = FunctionType::new(
            Some("__init__"),
            FunctionFlags::INSTANCE_METHOD | FunctionFlags::CONSTRUCTOR | FunctionFlags::SYNTHESIZED,
        );
        init.parameters.push(FunctionParameter::simple("self", Type::any()));
        init.declared_return_type = Some(Type::None);

        for &stmt in &body {
            let NodeKind::AnnAssign {
                target,
                annotation,
                value,
            } = self.arena.get(stmt).kind.clone()
            else {
                continue;
            };
            let NodeKind::Name { id } = self.arena.get(target).kind.clone() else {
                continue;
            };
            let field_type = self.get_type_of_annotation(annotation);
            init.parameters.push(FunctionParameter {
                category: pyz_ast::ParameterCategory::Simple,
                name: Some(id),
                has_default: value.is_some(),
                param_type: field_type,
            });
        }

        let symbol = self.add_synthesized_symbol("__init__", Type::function(init));
        class.details.add_field("__init__", symbol);
    }
}

fn add_flag(class: &ClassType, flag: ClassFlags) {
    class.details.add_flags(flag);
}

fn collect_type_vars(
    class: &ClassType,
    _seen: &mut Vec<String>,
) -> Vec<Arc<TypeVarType>> {
    let mut result = Vec::new();
    if let Some(args) = &class.type_arguments {
        for arg in args.iter() {
            if let Type::TypeVar(tv) = arg {
                result.push(tv.clone());
            }
        }
    }
    result
}

fn collect_free_type_vars(t: &Type, into: &mut Vec<Arc<TypeVarType>>) {
    match t {
        Type::TypeVar(tv) => {
            if !into.iter().any(|existing| existing.name == tv.name) {
                into.push(tv.clone());
            }
        }
        Type::Class(c) => {
            if let Some(args) = &c.type_arguments {
                for arg in args.iter() {
                    collect_free_type_vars(arg, into);
                }
            }
        }
        Type::Object(o) => collect_free_type_vars(&Type::Class(o.class.clone()), into),
        Type::Union(u) => {
            for entry in &u.entries {
                collect_free_type_vars(entry, into);
            }
        }
        _ => {}
    }
}
