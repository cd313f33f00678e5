//! Argument matching: validating a call's argument list against a
//! parameter list and accumulating TypeVar substitutions.

use crate::state::CheckerState;
use pyz_ast::{ArgumentCategory, NodeId, ParameterCategory};
use pyz_common::Rule;
use pyz_solver::{
    FunctionType, Type, TypeVarMap, format_type, specialize_type, strip_literal_value,
};

/// One evaluated call-site argument.
#[derive(Clone, Debug)]
pub(crate) struct EvalArg {
    pub category: ArgumentCategory,
    pub name: Option<String>,
    pub node: NodeId,
    pub value_type: Type,
}

/// Result of matching arguments against one signature.
pub(crate) struct MatchResult {
    pub ok: bool,
    pub return_type: Type,
}

struct ParamSlot {
    index: usize,
    name: Option<String>,
    param_type: Type,
    has_default: bool,
    keyword_only: bool,
    assigned: bool,
}

impl<'a> CheckerState<'a> {
    /// Match `args` against `function`'s parameter list: positional
    /// consumption, `*args` absorption, keyword resolution,
    /// duplicate/unknown detection, per-pair assignability, and
    /// specialised-return computation.
    pub(crate) fn validate_arguments(
        &mut self,
        function: &FunctionType,
        args: &[EvalArg],
        call_node: NodeId,
        callee_name: &str,
    ) -> MatchResult {
        let mut ok = true;
        let mut type_var_map = TypeVarMap::default();

        // Partition the parameter list.
        let mut slots: Vec<ParamSlot> = Vec::new();
        let mut var_positional: Option<Type> = None;
        let mut var_keyword: Option<Type> = None;
        let mut keyword_only = false;
        for (index, param) in function.parameters.iter().enumerate() {
            match param.category {
                ParameterCategory::Simple => {
                    slots.push(ParamSlot {
                        index,
                        name: param.name.clone(),
                        param_type: function.parameter_type(index),
                        has_default: param.has_default,
                        keyword_only,
                        assigned: false,
                    });
                }
                ParameterCategory::VarArgList => {
                    if param.name.is_some() {
                        var_positional = Some(function.parameter_type(index));
                    }
                    // A bare `*` (or `*args`) ends the positional run.
                    keyword_only = true;
                }
                ParameterCategory::VarArgDict => {
                    var_keyword = Some(function.parameter_type(index));
                }
            }
        }

        // An unpacked argument makes the argument count unknowable;
        // missing-argument errors are suppressed.
        let has_unpack = args
            .iter()
            .any(|a| a.category != ArgumentCategory::Simple);

        let mut positional_cursor = 0usize;
        for arg in args {
            match arg.category {
                ArgumentCategory::Simple if arg.name.is_none() => {
                    let slot = slots
                        .iter_mut()
                        .filter(|s| !s.keyword_only)
                        .nth(positional_cursor);
                    match slot {
                        Some(slot) => {
                            slot.assigned = true;
                            let param_type = slot.param_type.clone();
                            ok &= self.check_argument(&param_type, arg, &mut type_var_map);
                            positional_cursor += 1;
                        }
                        None => match &var_positional {
                            Some(element_type) => {
                                let element_type = element_type.clone();
                                ok &= self.check_argument(&element_type, arg, &mut type_var_map);
                            }
                            None => {
                                let expected =
                                    slots.iter().filter(|s| !s.keyword_only).count();
                                self.report(
                                    Rule::GeneralTypeIssues,
                                    self.arena.span(arg.node),
                                    format!(
                                        "Expected {expected} positional argument(s) to \"{callee_name}\""
                                    ),
                                );
                                ok = false;
                            }
                        },
                    }
                }

                ArgumentCategory::Simple => {
                    let name = arg.name.clone().unwrap_or_default();
                    match slots.iter_mut().find(|s| s.name.as_deref() == Some(&name)) {
                        Some(slot) => {
                            if slot.assigned {
                                self.report(
                                    Rule::GeneralTypeIssues,
                                    self.arena.span(arg.node),
                                    format!("Parameter \"{name}\" is already assigned"),
                                );
                                ok = false;
                            } else {
                                slot.assigned = true;
                                let param_type = slot.param_type.clone();
                                ok &= self.check_argument(&param_type, arg, &mut type_var_map);
                            }
                        }
                        None => match &var_keyword {
                            Some(value_type) => {
                                let value_type = value_type.clone();
                                ok &= self.check_argument(&value_type, arg, &mut type_var_map);
                            }
                            None => {
                                self.report(
                                    Rule::GeneralTypeIssues,
                                    self.arena.span(arg.node),
                                    format!("No parameter named \"{name}\""),
                                );
                                ok = false;
                            }
                        },
                    }
                }

                ArgumentCategory::UnpackedList => {
                    // Element-wise assignability against the remaining
                    // positional parameters and the *args element type.
                    let element = self.element_of_type(&arg.value_type.clone());
                    for slot in slots.iter_mut().filter(|s| !s.keyword_only && !s.assigned) {
                        slot.assigned = true;
                        let param_type = slot.param_type.clone();
                        if !self.probe_argument(&param_type, &element, &mut type_var_map) {
                            self.report(
                                Rule::GeneralTypeIssues,
                                self.arena.span(arg.node),
                                format!(
                                    "Unpacked element of type \"{}\" is not assignable to parameter \"{}\"",
                                    format_type(&element),
                                    slot.name.as_deref().unwrap_or("?")
                                ),
                            );
                            ok = false;
                        }
                    }
                    if let Some(element_type) = &var_positional {
                        let element_type = element_type.clone();
                        let _ = self.probe_argument(&element_type, &element, &mut type_var_map);
                    }
                }

                ArgumentCategory::UnpackedDict => {
                    // Static analysis cannot enumerate the mapping; accept.
                }
            }
        }

        if !has_unpack {
            let missing: Vec<String> = slots
                .iter()
                .filter(|s| !s.assigned && !s.has_default)
                .filter_map(|s| s.name.clone())
                .collect();
            for name in missing {
                self.report(
                    Rule::GeneralTypeIssues,
                    self.arena.span(call_node),
                    format!("Argument missing for parameter \"{name}\""),
                );
                ok = false;
            }
        }

        let return_type = specialize_type(
            &function.effective_return_type(),
            Some(&type_var_map),
            0,
        );
        MatchResult { ok, return_type }
    }

    fn check_argument(
        &mut self,
        param_type: &Type,
        arg: &EvalArg,
        type_var_map: &mut TypeVarMap,
    ) -> bool {
        // Literal payloads are retained only when the parameter wants them.
        let arg_type = if matches!(param_type.literal_value(), Some(_))
            || param_type.is_union()
            || matches!(param_type, Type::TypeVar(_))
        {
            arg.value_type.clone()
        } else {
            strip_literal_value(&arg.value_type)
        };

        self.ensure_members_for(param_type);
        self.ensure_members_for(&arg_type);
        let mut addendum = pyz_common::DiagnosticAddendum::new();
        let ok = {
            let source = self.type_source();
            pyz_solver::AssignabilityChecker::with_source(&source).can_assign(
                param_type,
                &arg_type,
                &mut addendum,
                type_var_map,
                0,
            )
        };
        if !ok {
            self.report(
                Rule::GeneralTypeIssues,
                self.arena.span(arg.node),
                format!(
                    "Argument of type \"{}\" is not assignable to parameter of type \"{}\"{}",
                    format_type(&arg.value_type),
                    format_type(param_type),
                    addendum.format()
                ),
            );
        }
        ok
    }

    fn probe_argument(
        &mut self,
        param_type: &Type,
        arg_type: &Type,
        type_var_map: &mut TypeVarMap,
    ) -> bool {
        self.ensure_members_for(param_type);
        self.ensure_members_for(arg_type);
        let mut addendum = pyz_common::DiagnosticAddendum::new();
        let source = self.type_source();
        pyz_solver::AssignabilityChecker::with_source(&source).can_assign(
            param_type,
            arg_type,
            &mut addendum,
            type_var_map,
            0,
        )
    }
}
