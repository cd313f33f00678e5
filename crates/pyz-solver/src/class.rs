//! Class details and specialisation overlays.
//!
//! A class's identity-bearing data (name, flags, fields, bases, type
//! parameters, MRO cache) lives once behind a shared `ClassDetails` handle.
//! Specialising a generic class clones only the handle plus a type-argument
//! overlay, so `list[int]` and `list[str]` alias the same details.
//!
//! Details sections that grow during the first pass over a file (fields,
//! bases, type parameters) sit behind `RwLock` and are populated
//! monotonically; they are read-only once the checker's audit phase starts.

use crate::types::{Type, TypeVarType, MAX_TYPE_RECURSION};
use indexmap::IndexMap;
use pyz_ast::NodeId;
use pyz_binder::SymbolId;
use rustc_hash::FxHashSet;
use std::sync::{Arc, OnceLock, RwLock};

bitflags::bitflags! {
    /// Properties of a class, fixed when its definition is evaluated.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ClassFlags: u16 {
        const BUILT_IN = 1 << 0;
        /// Typing special forms (List, Optional, Callable, ...).
        const SPECIAL_BUILT_IN = 1 << 1;
        const DATA_CLASS = 1 << 2;
        const PROTOCOL = 1 << 3;
        const RUNTIME_CHECKABLE = 1 << 4;
        /// Suppress the synthesised data-class `__init__`.
        const SKIP_SYNTHESIZED_INIT = 1 << 5;
        /// Declared with a metaclass deriving from `type`.
        const METACLASS = 1 << 6;
        /// TypedDict classes restrict their suite to field declarations.
        const TYPED_DICT = 1 << 7;
        const FINAL = 1 << 8;
    }
}

/// Declared variance of a type parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Variance {
    #[default]
    Invariant,
    Covariant,
    Contravariant,
}

/// One entry of a class's base-class list.
#[derive(Clone, Debug)]
pub struct BaseClass {
    /// Usually `Type::Class`; Unknown for untyped bases.
    pub class_type: Type,
    pub is_metaclass: bool,
}

/// Shared, identity-bearing class data.
#[derive(Debug)]
pub struct ClassDetails {
    pub name: String,
    /// Grows monotonically: flags that surface while bases are walked
    /// (protocol, typed-dict, metaclass) are added during the first pass.
    flags: RwLock<ClassFlags>,
    /// The class-definition node, absent for synthesised classes.
    pub node: Option<NodeId>,
    /// Builtin alias relationship (`List` aliases `list`).
    pub alias: Option<ClassType>,
    bases: RwLock<Vec<BaseClass>>,
    fields: RwLock<IndexMap<String, SymbolId>>,
    instance_fields: RwLock<IndexMap<String, SymbolId>>,
    type_parameters: RwLock<Vec<Arc<TypeVarType>>>,
    mro: OnceLock<Vec<ClassType>>,
}

impl ClassDetails {
    pub fn new(name: &str, flags: ClassFlags, node: Option<NodeId>) -> Self {
        ClassDetails {
            name: name.into(),
            flags: RwLock::new(flags),
            node,
            alias: None,
            bases: RwLock::new(Vec::new()),
            fields: RwLock::new(IndexMap::new()),
            instance_fields: RwLock::new(IndexMap::new()),
            type_parameters: RwLock::new(Vec::new()),
            mro: OnceLock::new(),
        }
    }

    pub fn with_alias(mut self, alias: ClassType) -> Self {
        self.alias = Some(alias);
        self
    }

    pub fn flags(&self) -> ClassFlags {
        *self.flags.read().unwrap()
    }

    pub fn add_flags(&self, flags: ClassFlags) {
        *self.flags.write().unwrap() |= flags;
    }

    pub fn add_base(&self, base: BaseClass) {
        self.bases.write().unwrap().push(base);
    }

    pub fn bases(&self) -> Vec<BaseClass> {
        self.bases.read().unwrap().clone()
    }

    pub fn add_field(&self, name: &str, symbol: SymbolId) {
        self.fields.write().unwrap().insert(name.into(), symbol);
    }

    pub fn field(&self, name: &str) -> Option<SymbolId> {
        self.fields.read().unwrap().get(name).copied()
    }

    pub fn fields(&self) -> IndexMap<String, SymbolId> {
        self.fields.read().unwrap().clone()
    }

    pub fn add_instance_field(&self, name: &str, symbol: SymbolId) {
        self.instance_fields
            .write()
            .unwrap()
            .insert(name.into(), symbol);
    }

    pub fn instance_field(&self, name: &str) -> Option<SymbolId> {
        self.instance_fields.read().unwrap().get(name).copied()
    }

    pub fn instance_fields(&self) -> IndexMap<String, SymbolId> {
        self.instance_fields.read().unwrap().clone()
    }

    /// Replace the type-parameter list.
    ///
    /// Re-setting is allowed while a pass populates the class; callers must
    /// preserve the previous list structurally once published.
    pub fn set_type_parameters(&self, params: Vec<Arc<TypeVarType>>) {
        let mut slot = self.type_parameters.write().unwrap();
        debug_assert!(
            slot.is_empty()
                || slot.len() == params.len()
                    && slot.iter().zip(&params).all(|(a, b)| a.name == b.name),
            "type-parameter list changed structurally after publication"
        );
        *slot = params;
    }

    pub fn type_parameters(&self) -> Vec<Arc<TypeVarType>> {
        self.type_parameters.read().unwrap().clone()
    }
}

/// A nominal class type: a shared details handle plus an optional
/// type-argument overlay.
#[derive(Clone, Debug)]
pub struct ClassType {
    pub details: Arc<ClassDetails>,
    pub type_arguments: Option<Arc<Vec<Type>>>,
}

impl ClassType {
    pub fn new(details: Arc<ClassDetails>) -> Self {
        ClassType {
            details,
            type_arguments: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn is_special_builtin(&self) -> bool {
        self.details.flags().contains(ClassFlags::SPECIAL_BUILT_IN)
    }

    pub fn is_protocol(&self) -> bool {
        self.details.flags().contains(ClassFlags::PROTOCOL)
    }

    /// A cheap specialised copy aliasing the same details.
    ///
    /// Argument lists shorter than the type-parameter count are padded with
    /// Any on intake.
    pub fn clone_for_specialization(&self, mut type_arguments: Vec<Type>) -> ClassType {
        let param_count = self.details.type_parameters().len();
        while type_arguments.len() < param_count {
            type_arguments.push(Type::any());
        }
        ClassType {
            details: self.details.clone(),
            type_arguments: Some(Arc::new(type_arguments)),
        }
    }

    /// The type argument at `index`, Any when unspecialised.
    pub fn type_argument(&self, index: usize) -> Type {
        self.type_arguments
            .as_ref()
            .and_then(|args| args.get(index).cloned())
            .unwrap_or_else(Type::any)
    }

    /// Two classes are "same-generic" iff they share details identity, or
    /// both are special builtins with equal names, or one aliases the other.
    pub fn same_generic_class(&self, other: &ClassType) -> bool {
        if Arc::ptr_eq(&self.details, &other.details) {
            return true;
        }
        if self.is_special_builtin()
            && other.is_special_builtin()
            && self.details.name == other.details.name
        {
            return true;
        }
        if let Some(alias) = &self.details.alias {
            if Arc::ptr_eq(&alias.details, &other.details) {
                return true;
            }
        }
        if let Some(alias) = &other.details.alias {
            if Arc::ptr_eq(&alias.details, &self.details) {
                return true;
            }
        }
        false
    }

    /// Full structural equality: same-generic plus argument-wise `is_same`
    /// with missing positions treated as Any.
    pub fn is_same(&self, other: &ClassType, recursion: u32) -> bool {
        if recursion > MAX_TYPE_RECURSION {
            return true;
        }
        if !self.same_generic_class(other) {
            return false;
        }
        let count = self
            .type_arguments
            .as_ref()
            .map(|a| a.len())
            .max(other.type_arguments.as_ref().map(|a| a.len()))
            .unwrap_or(0);
        for i in 0..count {
            if !self
                .type_argument(i)
                .is_same(&other.type_argument(i), recursion + 1)
            {
                return false;
            }
        }
        true
    }

    /// The linearised MRO: this class first, then bases depth-first in
    /// declaration order, de-duplicated by generic identity. Computed lazily
    /// and cached on the details handle; cyclic base graphs are tolerated
    /// through the visited set.
    pub fn mro(&self) -> Vec<ClassType> {
        self.details
            .mro
            .get_or_init(|| {
                let mut result: Vec<ClassType> = Vec::new();
                let mut visited: FxHashSet<*const ClassDetails> = FxHashSet::default();
                linearize(self, &mut result, &mut visited);
                result
            })
            .clone()
    }

    /// Walk this class's MRO looking for a same-generic match.
    pub fn is_derived_from(&self, other: &ClassType, recursion: u32) -> bool {
        if recursion > MAX_TYPE_RECURSION {
            return true;
        }
        self.mro().iter().any(|entry| entry.same_generic_class(other))
    }
}

fn linearize(
    class: &ClassType,
    result: &mut Vec<ClassType>,
    visited: &mut FxHashSet<*const ClassDetails>,
) {
    let key = Arc::as_ptr(&class.details);
    if !visited.insert(key) {
        return;
    }
    result.push(class.clone());
    for base in class.details.bases() {
        if base.is_metaclass {
            continue;
        }
        if let Type::Class(base_class) = &base.class_type {
            linearize(base_class, result, visited);
        }
    }
}
