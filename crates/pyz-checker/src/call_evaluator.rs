//! Call evaluation: constructor matching, function validation, overload
//! selection, `__call__` dispatch, and the synthesising builtin calls.

use crate::arguments::EvalArg;
use crate::state::CheckerState;
use pyz_ast::{Argument, ArgumentCategory, NodeId, NodeKind};
use pyz_common::Rule;
use pyz_solver::{
    ClassType, FunctionFlags, MemberLookupFlags, Type, TypeVarMap, Variance, combine_types,
    format_argument_types, format_type, get_abstract_methods, look_up_class_member,
    look_up_object_member, specialize_member_for_class, strip_literal_value,
};
use std::sync::Arc;

impl<'a> CheckerState<'a> {
    pub(crate) fn evaluate_call(
        &mut self,
        node: NodeId,
        callee: NodeId,
        args: &[Argument],
    ) -> Type {
        // Synthesising builtins are recognised before argument evaluation
        // so their argument lists can be read syntactically.
        if let Some(result) = self.evaluate_special_call(node, callee, args) {
            return result;
        }

        let callee_type = self.get_type(callee);
        let eval_args = self.evaluate_arguments(args);
        self.call_type(node, callee, &callee_type, &eval_args)
    }

    fn evaluate_arguments(&mut self, args: &[Argument]) -> Vec<EvalArg> {
        args.iter()
            .map(|arg| {
                let value_type = self.get_type(arg.value);
                EvalArg {
                    category: arg.category,
                    name: arg.name.clone(),
                    node: arg.value,
                    value_type,
                }
            })
            .collect()
    }

    fn call_type(
        &mut self,
        node: NodeId,
        callee: NodeId,
        callee_type: &Type,
        args: &[EvalArg],
    ) -> Type {
        match callee_type {
            Type::Any { .. } | Type::Unknown | Type::Unbound => Type::Unknown,

            Type::None => {
                self.report(
                    Rule::OptionalCall,
                    self.arena.span(callee),
                    "Object of type \"None\" cannot be called",
                );
                Type::Unknown
            }

            Type::Union(u) => {
                let entries = u.entries.clone();
                let mut results = Vec::with_capacity(entries.len());
                for entry in &entries {
                    if entry.is_none() {
                        self.report(
                            Rule::OptionalCall,
                            self.arena.span(callee),
                            "Object of type \"None\" cannot be called",
                        );
                        continue;
                    }
                    results.push(self.call_type(node, callee, entry, args));
                }
                combine_types(results)
            }

            Type::Class(class) => {
                // Calling a container alias (`List(...)`) constructs the
                // aliased builtin.
                let target = class
                    .details
                    .alias
                    .clone()
                    .unwrap_or_else(|| class.clone());
                self.match_constructor(node, &target, args)
            }

            Type::Function(f) => {
                let name = f.name.clone().unwrap_or_else(|| "<callable>".to_string());
                let result = self.validate_arguments(f, args, node, &name);
                result.return_type
            }

            Type::Overloaded(overloaded) => {
                // Pick the first overload whose argument list validates
                // under a silenced sink.
                let overloads = overloaded.overloads.clone();
                for overload in &overloads {
                    let name = overload.name.clone().unwrap_or_default();
                    if self.probe_overload(overload, args, node, &name) {
                        let result = self.validate_arguments(overload, args, node, &name);
                        return result.return_type;
                    }
                }
                let arg_types: Vec<Type> =
                    args.iter().map(|a| a.value_type.clone()).collect();
                self.report(
                    Rule::GeneralTypeIssues,
                    self.arena.span(node),
                    format!(
                        "No overloads match the provided arguments; argument types: {}",
                        format_argument_types(&arg_types)
                    ),
                );
                Type::Unknown
            }

            Type::Object(obj) => {
                let class = obj.class.clone();
                self.ensure_class_members_computed(&class);
                match look_up_object_member(&class, "__call__") {
                    Some(found) => {
                        let member = self.type_of_symbol(found.symbol);
                        let member = specialize_member_for_class(member, &class);
                        match pyz_solver::bind_function_to_class_or_object(callee_type, &match member {
                            Type::Function(f) => f,
                            _ => {
                                return Type::Unknown;
                            }
                        }) {
                            Type::Function(bound) => {
                                let name = class.name().to_string();
                                self.validate_arguments(&bound, args, node, &name).return_type
                            }
                            _ => Type::Unknown,
                        }
                    }
                    None => {
                        self.report(
                            Rule::GeneralTypeIssues,
                            self.arena.span(callee),
                            format!(
                                "\"{}\" is not callable",
                                format_type(callee_type)
                            ),
                        );
                        Type::Unknown
                    }
                }
            }

            _ => {
                self.report(
                    Rule::GeneralTypeIssues,
                    self.arena.span(callee),
                    format!("\"{}\" is not callable", format_type(callee_type)),
                );
                Type::Unknown
            }
        }
    }

    /// Silent trial of one overload: the silencing guard stays active for
    /// the whole validation, including nested assignability probes.
    fn probe_overload(
        &mut self,
        overload: &Arc<pyz_solver::FunctionType>,
        args: &[EvalArg],
        node: NodeId,
        name: &str,
    ) -> bool {
        let sink = self.diagnostics.clone();
        sink.silenced(|| self.validate_arguments(overload, args, node, name).ok)
    }

    /// Constructor matching for `C(args...)`.
    pub(crate) fn match_constructor(
        &mut self,
        node: NodeId,
        class: &ClassType,
        args: &[EvalArg],
    ) -> Type {
        self.ensure_class_members_computed(class);

        // Abstract classes cannot be instantiated.
        let abstract_methods = {
            let source = self.type_source();
            get_abstract_methods(class, &source)
        };
        if !abstract_methods.is_empty() {
            let mut listed: Vec<String> = abstract_methods
                .iter()
                .take(2)
                .map(|m| format!("\"{m}\""))
                .collect();
            if abstract_methods.len() > 2 {
                listed.push(format!("and {} more", abstract_methods.len() - 2));
            }
            self.report(
                Rule::GeneralTypeIssues,
                self.arena.span(node),
                format!(
                    "Cannot instantiate abstract class \"{}\"; unimplemented: {}",
                    class.name(),
                    listed.join(", ")
                ),
            );
        }

        let lookup_flags =
            MemberLookupFlags::SKIP_OBJECT_BASE | MemberLookupFlags::SKIP_INSTANCE_VARIABLES;
        let mut type_var_map = TypeVarMap::default();
        let mut saw_custom = false;
        let mut new_errors = false;

        // Step 1: __new__, bound to the class.
        if let Some(found) = look_up_class_member(class, "__new__", lookup_flags) {
            saw_custom = true;
            let member = self.type_of_symbol(found.symbol);
            let member = specialize_member_for_class(member, &found.defining_class);
            if let Type::Function(f) = member {
                let bound = f.strip_first_parameter();
                let before = self.diagnostics.len();
                let result = self.validate_arguments(&bound, args, node, class.name());
                new_errors = !result.ok || self.diagnostics.len() > before;
            }
        }

        // Step 2: __init__, bound to a fresh instance. Its diagnostics are
        // elided when __new__ already produced some (uniformly, including
        // overloaded __new__).
        if let Some(found) = look_up_class_member(class, "__init__", lookup_flags) {
            saw_custom = true;
            let member = self.type_of_symbol(found.symbol);
            let member = specialize_member_for_class(member, &found.defining_class);
            let functions: Vec<Arc<pyz_solver::FunctionType>> = match member {
                Type::Function(f) => vec![f],
                Type::Overloaded(o) => o.overloads.clone(),
                _ => vec![],
            };
            let count = functions.len();
            for (i, f) in functions.iter().enumerate() {
                let bound = f.strip_first_parameter();
                let silent = new_errors || i + 1 < count;
                let matched = if silent {
                    let sink = self.diagnostics.clone();
                    let name = class.name().to_string();
                    sink.silenced(|| self.validate_arguments(&bound, args, node, &name).ok)
                } else {
                    let name = class.name().to_string();
                    self.validate_arguments(&bound, args, node, &name).ok
                };
                if matched {
                    type_var_map = self.last_argument_type_vars(&bound, args);
                    break;
                }
            }
        }

        // Step 4: no custom constructor and arguments present.
        if !saw_custom && !args.is_empty() {
            self.report(
                Rule::GeneralTypeIssues,
                self.arena.span(node),
                format!("Expected no arguments to \"{}\" constructor", class.name()),
            );
        }

        // Specialise the instance by whatever the matching unified.
        let params = class.details.type_parameters();
        if !params.is_empty() && class.type_arguments.is_none() {
            let type_args: Vec<Type> = params
                .iter()
                .map(|p| {
                    type_var_map
                        .get(&p.name)
                        .cloned()
                        .map(|t| strip_literal_value(&t))
                        .unwrap_or_else(Type::any)
                })
                .collect();
            return Type::object(class.clone_for_specialization(type_args));
        }
        Type::object(class.clone())
    }

    /// Re-derive the TypeVar substitutions the last argument match implies.
    ///
    /// Argument matching reports and unifies in one pass; constructor
    /// specialisation wants just the substitutions, so they are recomputed
    /// silently here.
    fn last_argument_type_vars(
        &mut self,
        function: &pyz_solver::FunctionType,
        args: &[EvalArg],
    ) -> TypeVarMap {
        let mut map = TypeVarMap::default();
        let simple_params: Vec<&pyz_solver::FunctionParameter> = function
            .parameters
            .iter()
            .filter(|p| p.category == pyz_ast::ParameterCategory::Simple && p.name.is_some())
            .collect();
        let mut positional = 0usize;
        for arg in args {
            let param = match (&arg.name, arg.category) {
                (None, ArgumentCategory::Simple) => {
                    let p = simple_params.get(positional).copied();
                    positional += 1;
                    p
                }
                (Some(name), ArgumentCategory::Simple) => simple_params
                    .iter()
                    .find(|p| p.name.as_deref() == Some(name))
                    .copied(),
                _ => None,
            };
            if let Some(param) = param {
                let mut addendum = pyz_common::DiagnosticAddendum::new();
                let source = self.type_source();
                let _ = pyz_solver::AssignabilityChecker::with_source(&source).can_assign(
                    &param.param_type,
                    &arg.value_type,
                    &mut addendum,
                    &mut map,
                    0,
                );
            }
        }
        map
    }

    /// Builtins the evaluator recognises by name and handles specially:
    /// TypeVar construction, NamedTuple synthesis, cast, isinstance
    /// narrowness checks, and decorator factories.
    fn evaluate_special_call(
        &mut self,
        node: NodeId,
        callee: NodeId,
        args: &[Argument],
    ) -> Option<Type> {
        let builtin_name = {
            let callee_type = self.get_type(callee);
            match &callee_type {
                Type::Function(f) => f.builtin_name.clone()?,
                _ => return None,
            }
        };

        match builtin_name.as_str() {
            "TypeVar" => Some(self.synthesize_type_var(node, args)),
            "NamedTuple" => Some(self.synthesize_named_tuple(node, args)),
            "cast" => {
                if args.len() != 2 {
                    return Some(Type::Unknown);
                }
                let target = self.get_type_of_annotation(args[0].value);
                let value = self.get_type(args[1].value);
                if !target.is_any_or_unknown() && value.is_same(&target, 0) {
                    self.report(
                        Rule::UnnecessaryCast,
                        self.arena.span(node),
                        format!(
                            "Unnecessary \"cast\" call; type is already \"{}\"",
                            format_type(&target)
                        ),
                    );
                }
                Some(target)
            }
            "isinstance" | "issubclass" => {
                let result = self.builtins.instance(&self.builtins.bool);
                self.check_unnecessary_isinstance(node, &builtin_name, args);
                Some(result)
            }
            // Decorator factories return themselves so `@dataclass()`
            // type-checks like `@dataclass`.
            "dataclass" | "final" | "overload" | "runtime_checkable" => {
                for arg in args {
                    let _ = self.get_type(arg.value);
                }
                Some(self.get_type(callee))
            }
            "property" | "staticmethod" | "classmethod" | "abstractmethod" => {
                // Direct application: property(f) yields the wrapped form.
                if let Some(arg) = args.first() {
                    let wrapped = self.get_type(arg.value);
                    return Some(self.apply_wrapper_builtin(&builtin_name, wrapped));
                }
                Some(Type::Unknown)
            }
            _ => None,
        }
    }

    pub(crate) fn apply_wrapper_builtin(&mut self, name: &str, wrapped: Type) -> Type {
        let Type::Function(f) = &wrapped else {
            return wrapped;
        };
        let mut updated = (**f).clone();
        match name {
            "staticmethod" => {
                updated.flags.remove(FunctionFlags::INSTANCE_METHOD);
                updated.flags |= FunctionFlags::STATIC_METHOD;
            }
            "classmethod" => {
                updated.flags.remove(FunctionFlags::INSTANCE_METHOD);
                updated.flags |= FunctionFlags::CLASS_METHOD;
            }
            "abstractmethod" => updated.flags |= FunctionFlags::ABSTRACT,
            "property" => {
                updated.flags |= FunctionFlags::PROPERTY_GETTER;
                return Type::Property(Arc::new(pyz_solver::PropertyType {
                    getter: Arc::new(updated),
                    setter: None,
                    deleter: None,
                }));
            }
            _ => {}
        }
        Type::Function(Arc::new(updated))
    }

    /// `isinstance(x, C)` that narrows nothing (or everything) is flagged.
    fn check_unnecessary_isinstance(&mut self, node: NodeId, name: &str, args: &[Argument]) {
        if args.len() != 2 {
            return;
        }
        let input = self.get_type(args[0].value);
        if input.is_any_or_unknown() {
            return;
        }
        let classes = self.filter_classes_from_argument(args[1].value);
        if classes.is_empty() {
            return;
        }
        let input = strip_literal_value(&input);
        let narrowed = crate::narrowing::narrow_for_isinstance(&input, &classes, true);
        if narrowed.is_never() {
            self.report(
                Rule::UnnecessaryIsInstance,
                self.arena.span(node),
                format!(
                    "Unnecessary \"{name}\" call; \"{}\" is never an instance of the filter",
                    format_type(&input)
                ),
            );
        } else if narrowed.is_same(&input, 0) {
            self.report(
                Rule::UnnecessaryIsInstance,
                self.arena.span(node),
                format!(
                    "Unnecessary \"{name}\" call; \"{}\" is always an instance of the filter",
                    format_type(&input)
                ),
            );
        }
    }

    fn synthesize_type_var(&mut self, node: NodeId, args: &[Argument]) -> Type {
        let name = args
            .first()
            .and_then(|arg| match &self.arena.get(arg.value).kind {
                NodeKind::StringLiteral { value, .. } => Some(value.clone()),
                _ => None,
            })
            .unwrap_or_else(|| "_T".to_string());

        let mut constraints = Vec::new();
        let mut bound = None;
        let mut variance = Variance::Invariant;
        for arg in args.iter().skip(1) {
            match arg.name.as_deref() {
                None => {
                    let constraint = self.get_type_of_annotation(arg.value);
                    constraints.push(constraint);
                }
                Some("bound") => {
                    bound = Some(self.get_type_of_annotation(arg.value));
                }
                Some("covariant") => {
                    if matches!(
                        self.arena.get(arg.value).kind,
                        NodeKind::BooleanLiteral { value: true }
                    ) {
                        variance = Variance::Covariant;
                    }
                }
                Some("contravariant") => {
                    if matches!(
                        self.arena.get(arg.value).kind,
                        NodeKind::BooleanLiteral { value: true }
                    ) {
                        variance = Variance::Contravariant;
                    }
                }
                _ => {}
            }
        }
        let _ = node;
        Type::TypeVar(Arc::new(pyz_solver::TypeVarType {
            name,
            constraints,
            bound,
            variance,
        }))
    }

    /// `NamedTuple("X", [("a", int), ...])` synthesises a class; the
    /// allocation is cached by call node so later passes reuse the identity.
    fn synthesize_named_tuple(&mut self, node: NodeId, args: &[Argument]) -> Type {
        if let Some(cached) = self.class_types.get(&node) {
            return Type::Class(cached.clone());
        }
        let Some(name) = args
            .first()
            .and_then(|arg| match &self.arena.get(arg.value).kind {
                NodeKind::StringLiteral { value, .. } => Some(value.clone()),
                _ => None,
            })
        else {
            self.report(
                Rule::UntypedNamedTuple,
                self.arena.span(node),
                "NamedTuple requires a literal type name",
            );
            return Type::Unknown;
        };

        let details = pyz_solver::ClassDetails::new(&name, pyz_solver::ClassFlags::empty(), Some(node));
        let class = ClassType::new(Arc::new(details));
        class.details.add_base(pyz_solver::BaseClass {
            class_type: Type::Class(self.builtins.tuple.clone()),
            is_metaclass: false,
        });

        // Fields become instance members and synthesised __init__ params.
        let mut init = pyz_solver::FunctionType::new(
            Some("__init__"),
            FunctionFlags::INSTANCE_METHOD | FunctionFlags::SYNTHESIZED,
        );
        init.parameters
            .push(pyz_solver::FunctionParameter::simple("self", Type::any()));
        init.declared_return_type = Some(Type::None);

        let mut untyped = false;
        if let Some(fields_arg) = args.get(1) {
            if let NodeKind::ListExpr { elements } = &self.arena.get(fields_arg.value).kind.clone()
            {
                for &element in elements {
                    match &self.arena.get(element).kind.clone() {
                        NodeKind::TupleExpr { elements: pair } if pair.len() == 2 => {
                            let field_name = match &self.arena.get(pair[0]).kind {
                                NodeKind::StringLiteral { value, .. } => value.clone(),
                                _ => continue,
                            };
                            let field_type = self.get_type_of_annotation(pair[1]);
                            self.add_synthesized_member(&class, &field_name, field_type.clone());
                            init.parameters.push(pyz_solver::FunctionParameter::simple(
                                &field_name,
                                field_type,
                            ));
                        }
                        NodeKind::StringLiteral { value, .. } => {
                            untyped = true;
                            let field_name = value.clone();
                            self.add_synthesized_member(&class, &field_name, Type::Unknown);
                            init.parameters.push(pyz_solver::FunctionParameter::simple(
                                &field_name,
                                Type::Unknown,
                            ));
                        }
                        _ => {}
                    }
                }
            } else {
                untyped = true;
            }
        }
        if untyped {
            self.report(
                Rule::UntypedNamedTuple,
                self.arena.span(node),
                format!("\"{name}\" is not fully typed; use typed field declarations"),
            );
        }

        let init_symbol = self.add_synthesized_symbol("__init__", Type::function(init));
        class.details.add_field("__init__", init_symbol);

        self.class_types.insert(node, class.clone());
        Type::Class(class)
    }

    fn add_synthesized_member(&mut self, class: &ClassType, name: &str, t: Type) {
        let symbol = self.add_synthesized_symbol(name, t);
        class.details.add_instance_field(name, symbol);
    }

    pub(crate) fn add_synthesized_symbol(&mut self, name: &str, t: Type) -> pyz_binder::SymbolId {
        let mut symbol = pyz_binder::Symbol::new(name, pyz_binder::SymbolFlags::empty());
        symbol.add_declaration(pyz_binder::Declaration::Intrinsic {
            span: pyz_common::Span::dummy(),
        });
        symbol.has_undeclared_type = true;
        let id = self.binder.symbols.add(symbol);
        self.symbol_types.insert(id, t);
        id
    }
}
