//! The `Type` sum type.
//!
//! Every type the language admits is one case of `Type`. Payload-free cases
//! (Unbound, Unknown, Any, None, Never) are the interned singletons - the
//! enum constructor is the intern. Payload-carrying cases share their data
//! behind `Arc`, so `Type` clones are cheap and types published to the
//! evaluator cache are immutable.

use crate::class::{ClassType, Variance};
use indexmap::IndexMap;
use pyz_ast::{NodeId, ParameterCategory};
use pyz_binder::SymbolId;
use std::sync::{Arc, OnceLock};

/// Bound on structural recursion through types (cyclic class graphs, deep
/// nesting). At the limit, relations answer "compatible".
pub const MAX_TYPE_RECURSION: u32 = 16;

/// Resolves a symbol to its type.
///
/// Member lookup yields symbols; turning a symbol into a type requires the
/// evaluator (user code) or the builtin registry. Relation checks that need
/// member types take this as a capability instead of depending on either.
pub trait TypeSource {
    fn symbol_type(&self, symbol: SymbolId) -> Type;

    /// Whether the symbol is excluded from structural protocol matching.
    fn symbol_ignored_for_protocol(&self, _symbol: SymbolId) -> bool {
        false
    }
}

/// A literal value payload on an instance type.
#[derive(Clone, Debug, PartialEq)]
pub enum LiteralValue {
    Int(i64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
}

impl LiteralValue {
    pub fn is_truthy(&self) -> bool {
        match self {
            LiteralValue::Int(v) => *v != 0,
            LiteralValue::Bool(v) => *v,
            LiteralValue::Str(v) => !v.is_empty(),
            LiteralValue::Bytes(v) => !v.is_empty(),
        }
    }
}

bitflags::bitflags! {
    /// Properties of a function type.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FunctionFlags: u16 {
        const INSTANCE_METHOD = 1 << 0;
        const CLASS_METHOD = 1 << 1;
        const STATIC_METHOD = 1 << 2;
        const CONSTRUCTOR = 1 << 3;
        const ABSTRACT = 1 << 4;
        const SYNTHESIZED = 1 << 5;
        /// Suppress default parameter-shape validation (builtin escape hatch).
        const DISABLE_DEFAULT_CHECKS = 1 << 6;
        const OVERLOAD = 1 << 7;
        const FINAL = 1 << 8;
        const PROPERTY_GETTER = 1 << 9;
    }
}

/// One declared parameter of a function type.
#[derive(Clone, Debug)]
pub struct FunctionParameter {
    pub category: ParameterCategory,
    /// `None` for the bare `*` keyword-only separator.
    pub name: Option<String>,
    pub has_default: bool,
    pub param_type: Type,
}

impl FunctionParameter {
    pub fn simple(name: &str, param_type: Type) -> Self {
        FunctionParameter {
            category: ParameterCategory::Simple,
            name: Some(name.into()),
            has_default: false,
            param_type,
        }
    }

    pub fn with_default(name: &str, param_type: Type) -> Self {
        FunctionParameter {
            category: ParameterCategory::Simple,
            name: Some(name.into()),
            has_default: true,
            param_type,
        }
    }

    pub fn var_positional(name: &str, element_type: Type) -> Self {
        FunctionParameter {
            category: ParameterCategory::VarArgList,
            name: Some(name.into()),
            has_default: false,
            param_type: element_type,
        }
    }

    pub fn var_keyword(name: &str, value_type: Type) -> Self {
        FunctionParameter {
            category: ParameterCategory::VarArgDict,
            name: Some(name.into()),
            has_default: false,
            param_type: value_type,
        }
    }
}

/// Per-specialisation overlay on a shared function definition.
///
/// `parameter_types` always has one entry per declared parameter.
#[derive(Clone, Debug)]
pub struct SpecializedFunction {
    pub parameter_types: Vec<Type>,
    pub return_type: Option<Type>,
}

/// A function or method type.
#[derive(Debug)]
pub struct FunctionType {
    pub flags: FunctionFlags,
    pub name: Option<String>,
    pub parameters: Vec<FunctionParameter>,
    pub declared_return_type: Option<Type>,
    /// Return type accumulated from the body when no annotation exists.
    pub inferred_return_type: OnceLock<Type>,
    pub inferred_yield_type: OnceLock<Type>,
    /// Identifies builtin functions the evaluator special-cases.
    pub builtin_name: Option<String>,
    pub declaration: Option<NodeId>,
    pub specialized: Option<SpecializedFunction>,
}

impl Clone for FunctionType {
    fn clone(&self) -> Self {
        FunctionType {
            flags: self.flags,
            name: self.name.clone(),
            parameters: self.parameters.clone(),
            declared_return_type: self.declared_return_type.clone(),
            inferred_return_type: self.inferred_return_type.clone(),
            inferred_yield_type: self.inferred_yield_type.clone(),
            builtin_name: self.builtin_name.clone(),
            declaration: self.declaration.clone(),
            specialized: self.specialized.clone(),
        }
    }
}

impl FunctionType {
    pub fn new(name: Option<&str>, flags: FunctionFlags) -> Self {
        FunctionType {
            flags,
            name: name.map(Into::into),
            parameters: Vec::new(),
            declared_return_type: None,
            inferred_return_type: OnceLock::new(),
            inferred_yield_type: OnceLock::new(),
            builtin_name: None,
            declaration: None,
            specialized: None,
        }
    }

    /// Convenience constructor for fully-known signatures.
    pub fn with_signature(
        name: &str,
        flags: FunctionFlags,
        parameters: Vec<FunctionParameter>,
        return_type: Type,
    ) -> Self {
        let mut f = FunctionType::new(Some(name), flags);
        f.parameters = parameters;
        f.declared_return_type = Some(return_type);
        f
    }

    /// The effective type of parameter `i`, honouring the specialisation
    /// overlay.
    pub fn parameter_type(&self, i: usize) -> Type {
        if let Some(specialized) = &self.specialized {
            if let Some(t) = specialized.parameter_types.get(i) {
                return t.clone();
            }
        }
        self.parameters
            .get(i)
            .map(|p| p.param_type.clone())
            .unwrap_or(Type::Unknown)
    }

    /// Declared return, specialised return, inferred return, or Unknown.
    pub fn effective_return_type(&self) -> Type {
        if let Some(specialized) = &self.specialized {
            if let Some(ret) = &specialized.return_type {
                return ret.clone();
            }
        }
        if let Some(declared) = &self.declared_return_type {
            return declared.clone();
        }
        self.inferred_return_type
            .get()
            .cloned()
            .unwrap_or(Type::Unknown)
    }

    pub fn is_static_method(&self) -> bool {
        self.flags.contains(FunctionFlags::STATIC_METHOD)
    }

    pub fn is_class_method(&self) -> bool {
        self.flags.contains(FunctionFlags::CLASS_METHOD)
    }

    pub fn is_instance_method(&self) -> bool {
        self.flags.contains(FunctionFlags::INSTANCE_METHOD)
    }

    /// A copy with the first (self/cls) parameter dropped, for bound access.
    pub fn strip_first_parameter(&self) -> FunctionType {
        let mut stripped = self.clone();
        if !stripped.parameters.is_empty() {
            stripped.parameters.remove(0);
            if let Some(specialized) = &mut stripped.specialized {
                if !specialized.parameter_types.is_empty() {
                    specialized.parameter_types.remove(0);
                }
            }
        }
        stripped
    }
}

/// A declared overload set.
#[derive(Clone, Debug)]
pub struct OverloadedFunctionType {
    pub overloads: Vec<Arc<FunctionType>>,
}

/// A property: getter plus optional setter/deleter.
#[derive(Clone, Debug)]
pub struct PropertyType {
    pub getter: Arc<FunctionType>,
    pub setter: Option<Arc<FunctionType>>,
    pub deleter: Option<Arc<FunctionType>>,
}

/// A module's type: its top-level symbol table.
#[derive(Clone, Debug)]
pub struct ModuleType {
    pub name: String,
    pub fields: IndexMap<String, SymbolId>,
    /// Intermediate state while a multi-part import is being resolved.
    pub is_partial: bool,
}

/// An unordered union of at least two types.
///
/// Construction goes through `combine_types`, which maintains the normal
/// form: flat, duplicate-free, Never-absorbing.
#[derive(Clone, Debug)]
pub struct UnionType {
    pub entries: Vec<Type>,
}

impl UnionType {
    pub fn contains(&self, t: &Type, recursion: u32) -> bool {
        self.entries.iter().any(|e| e.is_same(t, recursion + 1))
    }
}

/// A type variable.
#[derive(Clone, Debug)]
pub struct TypeVarType {
    pub name: String,
    pub constraints: Vec<Type>,
    pub bound: Option<Type>,
    pub variance: Variance,
}

/// An instance of a class, optionally carrying a literal value.
#[derive(Clone, Debug)]
pub struct ObjectType {
    pub class: ClassType,
    pub literal: Option<LiteralValue>,
}

/// The type of an expression.
#[derive(Clone, Debug)]
pub enum Type {
    /// Declared but not yet assigned on this code path.
    Unbound,
    /// The gradual-typing escape hatch; compatible in both directions.
    Unknown,
    /// Explicit opaque type; `is_ellipsis` marks the `...` placeholder.
    Any { is_ellipsis: bool },
    /// The `None` singleton.
    None,
    /// Bottom; produced by exhaustive union filtering.
    Never,
    Class(ClassType),
    Object(ObjectType),
    Function(Arc<FunctionType>),
    Overloaded(Arc<OverloadedFunctionType>),
    Property(Arc<PropertyType>),
    Module(Arc<ModuleType>),
    Union(Arc<UnionType>),
    TypeVar(Arc<TypeVarType>),
}

impl Type {
    pub fn any() -> Type {
        Type::Any { is_ellipsis: false }
    }

    pub fn ellipsis() -> Type {
        Type::Any { is_ellipsis: true }
    }

    pub fn object(class: ClassType) -> Type {
        Type::Object(ObjectType {
            class,
            literal: None,
        })
    }

    pub fn literal_object(class: ClassType, literal: LiteralValue) -> Type {
        Type::Object(ObjectType {
            class,
            literal: Some(literal),
        })
    }

    pub fn function(f: FunctionType) -> Type {
        Type::Function(Arc::new(f))
    }

    pub fn union_of(entries: Vec<Type>) -> Type {
        crate::combine::combine_types(entries)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Any { .. })
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    /// Either direction of the gradual escape hatch.
    pub fn is_any_or_unknown(&self) -> bool {
        matches!(self, Type::Any { .. } | Type::Unknown)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Type::None)
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Type::Never)
    }

    pub fn is_unbound(&self) -> bool {
        matches!(self, Type::Unbound)
    }

    pub fn is_union(&self) -> bool {
        matches!(self, Type::Union(_))
    }

    pub fn union_entries(&self) -> Option<&[Type]> {
        match self {
            Type::Union(u) => Some(&u.entries),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassType> {
        match self {
            Type::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectType> {
        match self {
            Type::Object(o) => Some(o),
            _ => None,
        }
    }

    /// The literal payload, if this is a literal-bearing instance.
    pub fn literal_value(&self) -> Option<&LiteralValue> {
        match self {
            Type::Object(o) => o.literal.as_ref(),
            _ => None,
        }
    }

    /// Structural equality, recursion-bounded to tolerate cyclic class
    /// graphs. At the depth limit the answer is "same".
    pub fn is_same(&self, other: &Type, recursion: u32) -> bool {
        if recursion > MAX_TYPE_RECURSION {
            return true;
        }
        match (self, other) {
            (Type::Unbound, Type::Unbound)
            | (Type::Unknown, Type::Unknown)
            | (Type::None, Type::None)
            | (Type::Never, Type::Never)
            | (Type::Any { .. }, Type::Any { .. }) => true,
            (Type::Class(a), Type::Class(b)) => a.is_same(b, recursion),
            (Type::Object(a), Type::Object(b)) => {
                a.literal == b.literal && a.class.is_same(&b.class, recursion)
            }
            (Type::Function(a), Type::Function(b)) => {
                if a.parameters.len() != b.parameters.len() {
                    return false;
                }
                for (i, (pa, pb)) in a.parameters.iter().zip(b.parameters.iter()).enumerate() {
                    if pa.category != pb.category {
                        return false;
                    }
                    if !a
                        .parameter_type(i)
                        .is_same(&b.parameter_type(i), recursion + 1)
                    {
                        return false;
                    }
                }
                a.effective_return_type()
                    .is_same(&b.effective_return_type(), recursion + 1)
            }
            (Type::Overloaded(a), Type::Overloaded(b)) => {
                a.overloads.len() == b.overloads.len()
                    && a.overloads.iter().zip(b.overloads.iter()).all(|(x, y)| {
                        Type::Function(x.clone()).is_same(&Type::Function(y.clone()), recursion + 1)
                    })
            }
            (Type::Property(a), Type::Property(b)) => {
                Type::Function(a.getter.clone())
                    .is_same(&Type::Function(b.getter.clone()), recursion + 1)
            }
            (Type::Module(a), Type::Module(b)) => a.name == b.name,
            (Type::Union(a), Type::Union(b)) => {
                // Order-insensitive: equal cardinality and mutual membership.
                a.entries.len() == b.entries.len()
                    && a.entries.iter().all(|e| b.contains(e, recursion))
            }
            (Type::TypeVar(a), Type::TypeVar(b)) => Arc::ptr_eq(a, b) || a.name == b.name,
            _ => false,
        }
    }

    /// True iff the type contains a free TypeVar.
    pub fn requires_specialization(&self, recursion: u32) -> bool {
        if recursion > MAX_TYPE_RECURSION {
            return false;
        }
        match self {
            Type::TypeVar(_) => true,
            Type::Class(c) => match &c.type_arguments {
                Some(args) => args.iter().any(|a| a.requires_specialization(recursion + 1)),
                None => !c.details.type_parameters().is_empty(),
            },
            Type::Object(o) => Type::Class(o.class.clone()).requires_specialization(recursion),
            Type::Function(f) => {
                (0..f.parameters.len())
                    .any(|i| f.parameter_type(i).requires_specialization(recursion + 1))
                    || f.effective_return_type().requires_specialization(recursion + 1)
            }
            Type::Overloaded(o) => o
                .overloads
                .iter()
                .any(|f| Type::Function(f.clone()).requires_specialization(recursion)),
            Type::Union(u) => u
                .entries
                .iter()
                .any(|e| e.requires_specialization(recursion + 1)),
            _ => false,
        }
    }
}
