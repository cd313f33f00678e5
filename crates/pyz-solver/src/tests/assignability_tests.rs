//! Function, TypeVar and protocol assignability tests.

use super::setup;
use crate::assign::{AssignabilityChecker, TypeVarMap, can_override_method};
use crate::class::{ClassDetails, ClassFlags, ClassType, Variance};
use crate::types::{
    FunctionFlags, FunctionParameter, FunctionType, Type, TypeVarType,
};
use pyz_binder::{Declaration, Symbol, SymbolFlags};
use pyz_common::{DiagnosticAddendum, Span};
use std::sync::Arc;

fn assignable_with_map(dest: &Type, src: &Type, map: &mut TypeVarMap) -> bool {
    let checker = AssignabilityChecker::new();
    let mut addendum = DiagnosticAddendum::new();
    checker.can_assign(dest, src, &mut addendum, map, 0)
}

fn assignable(dest: &Type, src: &Type) -> bool {
    assignable_with_map(dest, src, &mut TypeVarMap::default())
}

fn method(params: Vec<FunctionParameter>, ret: Type) -> FunctionType {
    let mut f = FunctionType::new(Some("m"), FunctionFlags::INSTANCE_METHOD);
    f.parameters = params;
    f.declared_return_type = Some(ret);
    f
}

#[test]
fn function_parameters_are_contravariant() {
    let (_info, builtins) = setup();
    let int_instance = builtins.instance(&builtins.int);
    let bool_instance = builtins.instance(&builtins.bool);

    let takes_int = Type::function(FunctionType::with_signature(
        "f",
        FunctionFlags::empty(),
        vec![FunctionParameter::simple("x", int_instance.clone())],
        Type::None,
    ));
    let takes_bool = Type::function(FunctionType::with_signature(
        "g",
        FunctionFlags::empty(),
        vec![FunctionParameter::simple("x", bool_instance.clone())],
        Type::None,
    ));
    // A bool-taking function cannot stand in where ints flow.
    assert!(!assignable(&takes_int, &takes_bool));
    // An int-taking function accepts every call a bool-taker admits.
    assert!(assignable(&takes_bool, &takes_int));
}

#[test]
fn function_return_is_covariant() {
    let (_info, builtins) = setup();
    let int_instance = builtins.instance(&builtins.int);
    let bool_instance = builtins.instance(&builtins.bool);

    let returns_int = Type::function(FunctionType::with_signature(
        "f",
        FunctionFlags::empty(),
        vec![],
        int_instance.clone(),
    ));
    let returns_bool = Type::function(FunctionType::with_signature(
        "g",
        FunctionFlags::empty(),
        vec![],
        bool_instance.clone(),
    ));
    assert!(assignable(&returns_int, &returns_bool));
    assert!(!assignable(&returns_bool, &returns_int));
}

#[test]
fn override_compatibility() {
    let (_info, builtins) = setup();
    let int_instance = builtins.instance(&builtins.int);
    let str_instance = builtins.instance(&builtins.str);
    let object_instance = builtins.instance(&builtins.object);
    let self_param = FunctionParameter::simple("self", Type::any());

    let base = method(
        vec![self_param.clone(), FunctionParameter::simple("x", int_instance.clone())],
        int_instance.clone(),
    );

    // Widening the parameter is a legal override.
    let widened = method(
        vec![self_param.clone(), FunctionParameter::simple("x", object_instance.clone())],
        int_instance.clone(),
    );
    let mut addendum = DiagnosticAddendum::new();
    assert!(can_override_method(&base, &widened, &mut addendum));

    // Changing the parameter to an unrelated type is not.
    let narrowed = method(
        vec![self_param.clone(), FunctionParameter::simple("x", str_instance.clone())],
        int_instance.clone(),
    );
    let mut addendum = DiagnosticAddendum::new();
    assert!(!can_override_method(&base, &narrowed, &mut addendum));
    assert!(!addendum.is_empty());

    // Narrowing the return is legal; widening it is not.
    let narrower_return = method(
        vec![self_param.clone(), FunctionParameter::simple("x", int_instance.clone())],
        builtins.instance(&builtins.bool),
    );
    let mut addendum = DiagnosticAddendum::new();
    assert!(can_override_method(&base, &narrower_return, &mut addendum));

    let wider_return = method(
        vec![self_param, FunctionParameter::simple("x", int_instance)],
        object_instance,
    );
    let mut addendum = DiagnosticAddendum::new();
    assert!(!can_override_method(&base, &wider_return, &mut addendum));
}

#[test]
fn absorbing_tail_accepts_extra_parameters() {
    let (_info, builtins) = setup();
    let int_instance = builtins.instance(&builtins.int);
    let base = method(
        vec![
            FunctionParameter::simple("self", Type::any()),
            FunctionParameter::simple("x", int_instance.clone()),
            FunctionParameter::simple("y", int_instance.clone()),
        ],
        Type::None,
    );
    let absorbing = method(
        vec![
            FunctionParameter::simple("self", Type::any()),
            FunctionParameter::var_positional("args", int_instance),
        ],
        Type::None,
    );
    let mut addendum = DiagnosticAddendum::new();
    assert!(can_override_method(&base, &absorbing, &mut addendum));
}

#[test]
fn type_var_destination_records_binding() {
    let (_info, builtins) = setup();
    let int_instance = builtins.instance(&builtins.int);
    let t = Type::TypeVar(Arc::new(TypeVarType {
        name: "T".into(),
        constraints: vec![],
        bound: None,
        variance: Variance::Invariant,
    }));
    let mut map = TypeVarMap::default();
    assert!(assignable_with_map(&t, &int_instance, &mut map));
    assert!(map.get("T").is_some_and(|bound| bound.is_same(&int_instance, 0)));

    // Re-binding an invariant TypeVar to an incompatible type fails.
    assert!(!assignable_with_map(&t, &builtins.instance(&builtins.str), &mut map));
}

#[test]
fn generic_container_binds_through_arguments() {
    let (_info, builtins) = setup();
    let t = Type::TypeVar(Arc::new(TypeVarType {
        name: "T".into(),
        constraints: vec![],
        bound: None,
        variance: Variance::Invariant,
    }));
    let dest = builtins.list_of(t);
    let src = builtins.list_of(builtins.instance(&builtins.int));
    let mut map = TypeVarMap::default();
    assert!(assignable_with_map(&dest, &src, &mut map));
    assert!(
        map.get("T")
            .is_some_and(|bound| bound.is_same(&builtins.instance(&builtins.int), 0))
    );
}

#[test]
fn bounded_type_var_rejects_values_outside_the_bound() {
    let (_info, builtins) = setup();
    let t = Type::TypeVar(Arc::new(TypeVarType {
        name: "N".into(),
        constraints: vec![],
        bound: Some(builtins.instance(&builtins.int)),
        variance: Variance::Invariant,
    }));
    assert!(assignable(&t, &builtins.instance(&builtins.bool)));
    assert!(!assignable(&t, &builtins.instance(&builtins.str)));
}

#[test]
fn protocol_matches_structurally() {
    let (mut info, builtins) = setup();

    // protocol Sized { def __len__(self) -> int }
    let details = ClassDetails::new("Sized", ClassFlags::PROTOCOL, None);
    let sized = ClassType::new(Arc::new(details));
    let mut symbol = Symbol::new("__len__", SymbolFlags::CLASS_MEMBER);
    symbol.add_declaration(Declaration::Intrinsic { span: Span::dummy() });
    let len_symbol = info.symbols.add(symbol);
    sized.details.add_field("__len__", len_symbol);

    // Resolve the protocol member through a source that knows its type.
    struct Source<'a> {
        builtins: &'a crate::Builtins,
        len_symbol: pyz_binder::SymbolId,
    }
    impl crate::types::TypeSource for Source<'_> {
        fn symbol_type(&self, symbol: pyz_binder::SymbolId) -> Type {
            if symbol == self.len_symbol {
                let mut f = FunctionType::new(Some("__len__"), FunctionFlags::INSTANCE_METHOD);
                f.parameters = vec![FunctionParameter::simple("self", Type::any())];
                f.declared_return_type = Some(self.builtins.instance(&self.builtins.int));
                return Type::function(f);
            }
            self.builtins.symbol_type(symbol)
        }
    }
    let source = Source {
        builtins: &builtins,
        len_symbol,
    };
    let checker = AssignabilityChecker::with_source(&source);
    let dest = Type::object(sized);
    let mut addendum = DiagnosticAddendum::new();
    let mut map = TypeVarMap::default();

    // str defines __len__; int does not.
    assert!(checker.can_assign(
        &dest,
        &builtins.instance(&builtins.str),
        &mut addendum,
        &mut map,
        0
    ));
    let mut addendum = DiagnosticAddendum::new();
    assert!(!checker.can_assign(
        &dest,
        &builtins.instance(&builtins.int),
        &mut addendum,
        &mut map,
        0
    ));
    assert!(!addendum.is_empty());
}
