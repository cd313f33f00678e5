//! The synthesised builtin registry.
//!
//! Hosts with a stub library resolve builtins from stub files; this
//! registry synthesises the same surface programmatically: the builtin
//! classes with the members the checker's rules rely on, the builtin
//! functions, and the typing special forms. Everything is installed into
//! the binder's builtin scope as ordinary symbols, so name resolution and
//! member lookup treat builtins exactly like user code.

use crate::class::{BaseClass, ClassDetails, ClassFlags, ClassType, Variance};
use crate::combine::combine_types;
use crate::types::{
    FunctionFlags, FunctionParameter, FunctionType, LiteralValue, Type, TypeSource, TypeVarType,
};
use pyz_binder::{BinderInfo, Declaration, Symbol, SymbolFlags, SymbolId};
use pyz_common::Span;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Handles to every builtin the checker needs by identity, plus the
/// symbol-to-type table for builtin members.
pub struct Builtins {
    pub object: ClassType,
    pub type_class: ClassType,
    pub int: ClassType,
    pub float: ClassType,
    pub complex: ClassType,
    pub bool: ClassType,
    pub str: ClassType,
    pub bytes: ClassType,
    pub list: ClassType,
    pub dict: ClassType,
    pub set: ClassType,
    pub frozenset: ClassType,
    pub tuple: ClassType,
    pub range: ClassType,
    pub base_exception: ClassType,
    pub exception: ClassType,
    pub iterator: ClassType,
    pub iterable: ClassType,
    pub generator: ClassType,
    pub coroutine: ClassType,
    pub awaitable: ClassType,
    pub async_iterator: ClassType,
    pub async_generator: ClassType,
    types_by_symbol: FxHashMap<SymbolId, Type>,
}

impl TypeSource for Builtins {
    fn symbol_type(&self, symbol: SymbolId) -> Type {
        self.types_by_symbol
            .get(&symbol)
            .cloned()
            .unwrap_or(Type::Unknown)
    }
}

impl Builtins {
    /// The type of a builtin member symbol, if it is one.
    pub fn known_symbol_type(&self, symbol: SymbolId) -> Option<Type> {
        self.types_by_symbol.get(&symbol).cloned()
    }

    pub fn instance(&self, class: &ClassType) -> Type {
        Type::object(class.clone())
    }

    pub fn int_literal(&self, value: i64) -> Type {
        Type::literal_object(self.int.clone(), LiteralValue::Int(value))
    }

    pub fn bool_literal(&self, value: bool) -> Type {
        Type::literal_object(self.bool.clone(), LiteralValue::Bool(value))
    }

    pub fn str_literal(&self, value: &str) -> Type {
        Type::literal_object(self.str.clone(), LiteralValue::Str(value.into()))
    }

    pub fn bytes_literal(&self, value: &[u8]) -> Type {
        Type::literal_object(self.bytes.clone(), LiteralValue::Bytes(value.to_vec()))
    }

    pub fn optional(&self, t: Type) -> Type {
        combine_types(vec![t, Type::None])
    }

    pub fn list_of(&self, element: Type) -> Type {
        Type::object(self.list.clone_for_specialization(vec![element]))
    }

    pub fn set_of(&self, element: Type) -> Type {
        Type::object(self.set.clone_for_specialization(vec![element]))
    }

    pub fn dict_of(&self, key: Type, value: Type) -> Type {
        Type::object(self.dict.clone_for_specialization(vec![key, value]))
    }

    pub fn tuple_of(&self, elements: Vec<Type>) -> Type {
        Type::object(self.tuple.clone_for_specialization(elements))
    }

    pub fn iterator_of(&self, element: Type) -> Type {
        Type::object(self.iterator.clone_for_specialization(vec![element]))
    }

    pub fn iterable_of(&self, element: Type) -> Type {
        Type::object(self.iterable.clone_for_specialization(vec![element]))
    }

    pub fn generator_of(&self, yield_type: Type, send_type: Type, return_type: Type) -> Type {
        Type::object(
            self.generator
                .clone_for_specialization(vec![yield_type, send_type, return_type]),
        )
    }

    pub fn coroutine_of(&self, return_type: Type) -> Type {
        Type::object(
            self.coroutine
                .clone_for_specialization(vec![Type::any(), Type::any(), return_type]),
        )
    }

    pub fn awaitable_of(&self, return_type: Type) -> Type {
        Type::object(self.awaitable.clone_for_specialization(vec![return_type]))
    }

    pub fn async_generator_of(&self, yield_type: Type, send_type: Type) -> Type {
        Type::object(
            self.async_generator
                .clone_for_specialization(vec![yield_type, send_type]),
        )
    }

    /// `Type[X]`: an instance of the `type` class specialised with X.
    pub fn type_of(&self, inner: Type) -> Type {
        Type::object(self.type_class.clone_for_specialization(vec![inner]))
    }

    /// The numeric promotion lattice: int ⊑ float ⊑ complex.
    pub fn promote_numeric(&self, a: &ClassType, b: &ClassType) -> Option<ClassType> {
        let rank = |c: &ClassType| {
            if c.same_generic_class(&self.complex) {
                Some(3)
            } else if c.same_generic_class(&self.float) {
                Some(2)
            } else if c.same_generic_class(&self.int) || c.same_generic_class(&self.bool) {
                Some(1)
            } else {
                None
            }
        };
        let (ra, rb) = (rank(a)?, rank(b)?);
        let widest = ra.max(rb);
        Some(match widest {
            3 => self.complex.clone(),
            2 => self.float.clone(),
            _ => self.int.clone(),
        })
    }

    pub fn is_numeric_class(&self, class: &ClassType) -> bool {
        self.promote_numeric(class, class).is_some()
    }

    /// Build the registry and install every builtin symbol into the binder's
    /// builtin scope.
    pub fn install(info: &mut BinderInfo) -> Builtins {
        Installer::new(info).run()
    }
}

struct Installer<'a> {
    info: &'a mut BinderInfo,
    types_by_symbol: FxHashMap<SymbolId, Type>,
}

impl<'a> Installer<'a> {
    fn new(info: &'a mut BinderInfo) -> Self {
        Installer {
            info,
            types_by_symbol: FxHashMap::default(),
        }
    }

    /// Install a symbol into the builtin scope.
    fn declare(&mut self, name: &str, t: Type) -> SymbolId {
        let mut symbol = Symbol::new(name, SymbolFlags::empty());
        symbol.add_declaration(Declaration::Intrinsic { span: Span::dummy() });
        symbol.has_undeclared_type = true;
        let id = self.info.symbols.add(symbol);
        let scope = self.info.builtin_scope;
        self.info
            .scopes
            .get_mut(scope)
            .table
            .insert(name.into(), id);
        self.types_by_symbol.insert(id, t);
        id
    }

    fn class(&mut self, name: &str, flags: ClassFlags, bases: &[&ClassType]) -> ClassType {
        let details = ClassDetails::new(name, flags | ClassFlags::BUILT_IN, None);
        for base in bases {
            details.add_base(BaseClass {
                class_type: Type::Class((*base).clone()),
                is_metaclass: false,
            });
        }
        let class = ClassType::new(Arc::new(details));
        self.declare(name, Type::Class(class.clone()));
        class
    }

    fn type_var(&self, name: &str, variance: Variance) -> Arc<TypeVarType> {
        Arc::new(TypeVarType {
            name: name.into(),
            constraints: vec![],
            bound: None,
            variance,
        })
    }

    fn method(&mut self, class: &ClassType, name: &str, mut f: FunctionType) {
        f.flags |= FunctionFlags::INSTANCE_METHOD;
        let mut symbol = Symbol::new(name, SymbolFlags::CLASS_MEMBER);
        symbol.add_declaration(Declaration::Intrinsic { span: Span::dummy() });
        symbol.has_undeclared_type = true;
        let id = self.info.symbols.add(symbol);
        self.types_by_symbol.insert(id, Type::function(f));
        class.details.add_field(name, id);
    }

    fn function(&mut self, name: &str, mut f: FunctionType) {
        f.builtin_name = Some(name.into());
        self.declare(name, Type::function(f));
    }

    /// A function used only as a decorator marker; the evaluator recognises
    /// it by builtin name.
    fn marker(&mut self, name: &str) {
        let mut f = FunctionType::new(Some(name), FunctionFlags::empty());
        f.parameters = vec![FunctionParameter::simple("obj", Type::any())];
        f.declared_return_type = Some(Type::any());
        self.function(name, f);
    }

    fn special_form(&mut self, name: &str, alias: Option<&ClassType>) -> ClassType {
        let mut details = ClassDetails::new(
            name,
            ClassFlags::BUILT_IN | ClassFlags::SPECIAL_BUILT_IN,
            None,
        );
        if let Some(alias) = alias {
            details = details.with_alias(alias.clone());
        }
        let class = ClassType::new(Arc::new(details));
        self.declare(name, Type::Class(class.clone()));
        class
    }

    fn sig(params: Vec<FunctionParameter>, ret: Type) -> FunctionType {
        let mut f = FunctionType::new(None, FunctionFlags::empty());
        f.parameters = params;
        f.declared_return_type = Some(ret);
        f
    }

    fn run(mut self) -> Builtins {
        use FunctionParameter as P;

        // Root classes first; `object` has no bases.
        let object = self.class("object", ClassFlags::empty(), &[]);
        let type_class = self.class("type", ClassFlags::METACLASS, &[&object]);
        let t_type = self.type_var("_T_type", Variance::Covariant);
        type_class.details.set_type_parameters(vec![t_type]);

        let object_instance = Type::object(object.clone());

        let int = self.class("int", ClassFlags::empty(), &[&object]);
        let float = self.class("float", ClassFlags::empty(), &[&object]);
        let complex = self.class("complex", ClassFlags::empty(), &[&object]);
        let bool_class = self.class("bool", ClassFlags::empty(), &[&int]);
        let str_class = self.class("str", ClassFlags::empty(), &[&object]);
        let bytes = self.class("bytes", ClassFlags::empty(), &[&object]);
        let range = self.class("range", ClassFlags::empty(), &[&object]);

        let int_instance = Type::object(int.clone());
        let float_instance = Type::object(float.clone());
        let complex_instance = Type::object(complex.clone());
        let bool_instance = Type::object(bool_class.clone());
        let str_instance = Type::object(str_class.clone());
        let bytes_instance = Type::object(bytes.clone());

        // Iteration protocol classes. Bases that bind a type parameter are
        // written specialised (`Iterator` derives `Iterable[_T_co]`) so
        // assignability substitutes arguments through them.
        let t_co = self.type_var("_T_co", Variance::Covariant);
        let free_t_co = Type::TypeVar(t_co.clone());
        let iterable = self.class("Iterable", ClassFlags::empty(), &[&object]);
        iterable.details.set_type_parameters(vec![t_co.clone()]);
        let iterator = self.class("Iterator", ClassFlags::empty(), &[]);
        iterator.details.set_type_parameters(vec![t_co.clone()]);
        iterator.details.add_base(BaseClass {
            class_type: Type::Class(iterable.clone_for_specialization(vec![free_t_co.clone()])),
            is_metaclass: false,
        });
        self.method(
            &iterable,
            "__iter__",
            Self::sig(
                vec![P::simple("self", Type::any())],
                Type::object(iterator.clone_for_specialization(vec![free_t_co.clone()])),
            ),
        );
        self.method(
            &iterator,
            "__iter__",
            Self::sig(
                vec![P::simple("self", Type::any())],
                Type::object(iterator.clone_for_specialization(vec![free_t_co.clone()])),
            ),
        );
        self.method(
            &iterator,
            "__next__",
            Self::sig(vec![P::simple("self", Type::any())], free_t_co.clone()),
        );

        let y_co = self.type_var("_YieldT_co", Variance::Covariant);
        let s_contra = self.type_var("_SendT_contra", Variance::Contravariant);
        let r_co = self.type_var("_ReturnT_co", Variance::Covariant);
        let generator = self.class("Generator", ClassFlags::empty(), &[]);
        generator.details.set_type_parameters(vec![
            y_co.clone(),
            s_contra.clone(),
            r_co.clone(),
        ]);
        generator.details.add_base(BaseClass {
            class_type: Type::Class(
                iterator.clone_for_specialization(vec![Type::TypeVar(y_co.clone())]),
            ),
            is_metaclass: false,
        });
        self.method(
            &generator,
            "__next__",
            Self::sig(vec![P::simple("self", Type::any())], Type::TypeVar(y_co.clone())),
        );
        self.method(
            &generator,
            "send",
            Self::sig(
                vec![
                    P::simple("self", Type::any()),
                    P::simple("value", Type::TypeVar(s_contra.clone())),
                ],
                Type::TypeVar(y_co.clone()),
            ),
        );

        let awaitable = self.class("Awaitable", ClassFlags::empty(), &[&object]);
        awaitable.details.set_type_parameters(vec![t_co.clone()]);
        self.method(
            &awaitable,
            "__await__",
            Self::sig(
                vec![P::simple("self", Type::any())],
                Type::object(generator.clone_for_specialization(vec![
                    Type::any(),
                    Type::any(),
                    free_t_co.clone(),
                ])),
            ),
        );

        let coroutine = self.class("Coroutine", ClassFlags::empty(), &[]);
        coroutine.details.set_type_parameters(vec![
            y_co.clone(),
            s_contra.clone(),
            r_co.clone(),
        ]);
        coroutine.details.add_base(BaseClass {
            class_type: Type::Class(
                awaitable.clone_for_specialization(vec![Type::TypeVar(r_co.clone())]),
            ),
            is_metaclass: false,
        });
        self.method(
            &coroutine,
            "__await__",
            Self::sig(
                vec![P::simple("self", Type::any())],
                Type::object(generator.clone_for_specialization(vec![
                    Type::any(),
                    Type::any(),
                    Type::TypeVar(r_co.clone()),
                ])),
            ),
        );

        let async_iterator = self.class("AsyncIterator", ClassFlags::empty(), &[&object]);
        async_iterator.details.set_type_parameters(vec![t_co.clone()]);
        self.method(
            &async_iterator,
            "__aiter__",
            Self::sig(
                vec![P::simple("self", Type::any())],
                Type::object(async_iterator.clone_for_specialization(vec![free_t_co.clone()])),
            ),
        );
        self.method(
            &async_iterator,
            "__anext__",
            Self::sig(
                vec![P::simple("self", Type::any())],
                Type::object(awaitable.clone_for_specialization(vec![free_t_co.clone()])),
            ),
        );

        let async_generator = self.class("AsyncGenerator", ClassFlags::empty(), &[]);
        async_generator
            .details
            .set_type_parameters(vec![y_co.clone(), s_contra.clone()]);
        async_generator.details.add_base(BaseClass {
            class_type: Type::Class(
                async_iterator.clone_for_specialization(vec![Type::TypeVar(y_co.clone())]),
            ),
            is_metaclass: false,
        });

        // Numerics. Comparison dunders return bool; arithmetic promotes via
        // the lattice (the operator evaluator consults `promote_numeric`).
        for op in ["__add__", "__sub__", "__mul__", "__floordiv__", "__mod__", "__pow__"] {
            self.method(
                &int,
                op,
                Self::sig(
                    vec![P::simple("self", Type::any()), P::simple("value", int_instance.clone())],
                    int_instance.clone(),
                ),
            );
            self.method(
                &float,
                op,
                Self::sig(
                    vec![
                        P::simple("self", Type::any()),
                        P::simple("value", float_instance.clone()),
                    ],
                    float_instance.clone(),
                ),
            );
            self.method(
                &complex,
                op,
                Self::sig(
                    vec![
                        P::simple("self", Type::any()),
                        P::simple("value", complex_instance.clone()),
                    ],
                    complex_instance.clone(),
                ),
            );
        }
        for op in ["__and__", "__or__", "__xor__", "__lshift__", "__rshift__"] {
            self.method(
                &int,
                op,
                Self::sig(
                    vec![P::simple("self", Type::any()), P::simple("value", int_instance.clone())],
                    int_instance.clone(),
                ),
            );
        }
        self.method(
            &int,
            "__truediv__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("value", int_instance.clone())],
                float_instance.clone(),
            ),
        );
        self.method(
            &float,
            "__truediv__",
            Self::sig(
                vec![
                    P::simple("self", Type::any()),
                    P::simple("value", float_instance.clone()),
                ],
                float_instance.clone(),
            ),
        );
        for class in [&int, &float] {
            let instance = Type::object((*class).clone());
            for op in ["__neg__", "__pos__"] {
                self.method(
                    class,
                    op,
                    Self::sig(vec![P::simple("self", Type::any())], instance.clone()),
                );
            }
            for op in ["__lt__", "__le__", "__gt__", "__ge__"] {
                self.method(
                    class,
                    op,
                    Self::sig(
                        vec![P::simple("self", Type::any()), P::simple("value", instance.clone())],
                        bool_instance.clone(),
                    ),
                );
            }
        }
        self.method(
            &int,
            "__invert__",
            Self::sig(vec![P::simple("self", Type::any())], int_instance.clone()),
        );
        self.method(
            &int,
            "bit_length",
            Self::sig(vec![P::simple("self", Type::any())], int_instance.clone()),
        );
        self.method(
            &int,
            "__init__",
            Self::sig(
                vec![
                    P::simple("self", Type::any()),
                    P::with_default("x", Type::any()),
                    P::with_default("base", int_instance.clone()),
                ],
                Type::None,
            ),
        );
        self.method(
            &float,
            "__init__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::with_default("x", Type::any())],
                Type::None,
            ),
        );
        self.method(
            &bool_class,
            "__init__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::with_default("o", Type::any())],
                Type::None,
            ),
        );

        // str
        str_class.details.add_base(BaseClass {
            class_type: Type::Class(
                iterable.clone_for_specialization(vec![str_instance.clone()]),
            ),
            is_metaclass: false,
        });
        self.method(
            &str_class,
            "__add__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("value", str_instance.clone())],
                str_instance.clone(),
            ),
        );
        self.method(
            &str_class,
            "__mul__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("value", int_instance.clone())],
                str_instance.clone(),
            ),
        );
        self.method(
            &str_class,
            "__mod__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("value", object_instance.clone())],
                str_instance.clone(),
            ),
        );
        self.method(
            &str_class,
            "__len__",
            Self::sig(vec![P::simple("self", Type::any())], int_instance.clone()),
        );
        self.method(
            &str_class,
            "__getitem__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("index", int_instance.clone())],
                str_instance.clone(),
            ),
        );
        self.method(
            &str_class,
            "__iter__",
            Self::sig(
                vec![P::simple("self", Type::any())],
                Type::object(iterator.clone_for_specialization(vec![str_instance.clone()])),
            ),
        );
        self.method(
            &str_class,
            "__contains__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("value", str_instance.clone())],
                bool_instance.clone(),
            ),
        );
        for op in ["__lt__", "__le__", "__gt__", "__ge__"] {
            self.method(
                &str_class,
                op,
                Self::sig(
                    vec![P::simple("self", Type::any()), P::simple("value", str_instance.clone())],
                    bool_instance.clone(),
                ),
            );
        }
        for name in ["upper", "lower", "strip"] {
            self.method(
                &str_class,
                name,
                Self::sig(vec![P::simple("self", Type::any())], str_instance.clone()),
            );
        }
        self.method(
            &str_class,
            "startswith",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("prefix", str_instance.clone())],
                bool_instance.clone(),
            ),
        );
        self.method(
            &str_class,
            "join",
            Self::sig(
                vec![
                    P::simple("self", Type::any()),
                    P::simple(
                        "iterable",
                        Type::object(iterable.clone_for_specialization(vec![str_instance.clone()])),
                    ),
                ],
                str_instance.clone(),
            ),
        );
        self.method(
            &str_class,
            "__init__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::with_default("object", Type::any())],
                Type::None,
            ),
        );

        // bytes
        self.method(
            &bytes,
            "__len__",
            Self::sig(vec![P::simple("self", Type::any())], int_instance.clone()),
        );
        self.method(
            &bytes,
            "__getitem__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("index", int_instance.clone())],
                int_instance.clone(),
            ),
        );
        self.method(
            &bytes,
            "__add__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("value", bytes_instance.clone())],
                bytes_instance.clone(),
            ),
        );

        // object
        self.method(
            &object,
            "__init__",
            Self::sig(vec![P::simple("self", Type::any())], Type::None),
        );
        self.method(
            &object,
            "__eq__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("value", object_instance.clone())],
                bool_instance.clone(),
            ),
        );
        self.method(
            &object,
            "__ne__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("value", object_instance.clone())],
                bool_instance.clone(),
            ),
        );
        self.method(
            &object,
            "__str__",
            Self::sig(vec![P::simple("self", Type::any())], str_instance.clone()),
        );
        self.method(
            &object,
            "__hash__",
            Self::sig(vec![P::simple("self", Type::any())], int_instance.clone()),
        );

        // Containers.
        let t_list = self.type_var("_T", Variance::Invariant);
        let free_t = Type::TypeVar(t_list.clone());
        let list = self.class("list", ClassFlags::empty(), &[]);
        list.details.set_type_parameters(vec![t_list.clone()]);
        list.details.add_base(BaseClass {
            class_type: Type::Class(iterable.clone_for_specialization(vec![free_t.clone()])),
            is_metaclass: false,
        });
        self.method(
            &list,
            "__init__",
            Self::sig(
                vec![
                    P::simple("self", Type::any()),
                    P::with_default(
                        "iterable",
                        Type::object(iterable.clone_for_specialization(vec![free_t.clone()])),
                    ),
                ],
                Type::None,
            ),
        );
        self.method(
            &list,
            "append",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("object", free_t.clone())],
                Type::None,
            ),
        );
        self.method(
            &list,
            "extend",
            Self::sig(
                vec![
                    P::simple("self", Type::any()),
                    P::simple(
                        "iterable",
                        Type::object(iterable.clone_for_specialization(vec![free_t.clone()])),
                    ),
                ],
                Type::None,
            ),
        );
        self.method(
            &list,
            "pop",
            Self::sig(
                vec![P::simple("self", Type::any()), P::with_default("index", int_instance.clone())],
                free_t.clone(),
            ),
        );
        self.method(
            &list,
            "__getitem__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("index", int_instance.clone())],
                free_t.clone(),
            ),
        );
        self.method(
            &list,
            "__setitem__",
            Self::sig(
                vec![
                    P::simple("self", Type::any()),
                    P::simple("index", int_instance.clone()),
                    P::simple("value", free_t.clone()),
                ],
                Type::None,
            ),
        );
        self.method(
            &list,
            "__delitem__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("index", int_instance.clone())],
                Type::None,
            ),
        );
        self.method(
            &list,
            "__iter__",
            Self::sig(
                vec![P::simple("self", Type::any())],
                Type::object(iterator.clone_for_specialization(vec![free_t.clone()])),
            ),
        );
        self.method(
            &list,
            "__len__",
            Self::sig(vec![P::simple("self", Type::any())], int_instance.clone()),
        );
        self.method(
            &list,
            "__contains__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("value", object_instance.clone())],
                bool_instance.clone(),
            ),
        );
        self.method(
            &list,
            "__add__",
            Self::sig(
                vec![
                    P::simple("self", Type::any()),
                    P::simple(
                        "value",
                        Type::object(list.clone_for_specialization(vec![free_t.clone()])),
                    ),
                ],
                Type::object(list.clone_for_specialization(vec![free_t.clone()])),
            ),
        );

        let k_var = self.type_var("_KT", Variance::Invariant);
        let v_var = self.type_var("_VT", Variance::Invariant);
        let free_k = Type::TypeVar(k_var.clone());
        let free_v = Type::TypeVar(v_var.clone());
        let dict = self.class("dict", ClassFlags::empty(), &[]);
        dict.details
            .set_type_parameters(vec![k_var.clone(), v_var.clone()]);
        dict.details.add_base(BaseClass {
            class_type: Type::Class(iterable.clone_for_specialization(vec![free_k.clone()])),
            is_metaclass: false,
        });
        self.method(
            &dict,
            "__init__",
            Self::sig(vec![P::simple("self", Type::any())], Type::None),
        );
        self.method(
            &dict,
            "__getitem__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("key", free_k.clone())],
                free_v.clone(),
            ),
        );
        self.method(
            &dict,
            "__setitem__",
            Self::sig(
                vec![
                    P::simple("self", Type::any()),
                    P::simple("key", free_k.clone()),
                    P::simple("value", free_v.clone()),
                ],
                Type::None,
            ),
        );
        self.method(
            &dict,
            "__delitem__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("key", free_k.clone())],
                Type::None,
            ),
        );
        self.method(
            &dict,
            "__iter__",
            Self::sig(
                vec![P::simple("self", Type::any())],
                Type::object(iterator.clone_for_specialization(vec![free_k.clone()])),
            ),
        );
        self.method(
            &dict,
            "__len__",
            Self::sig(vec![P::simple("self", Type::any())], int_instance.clone()),
        );
        self.method(
            &dict,
            "__contains__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("key", object_instance.clone())],
                bool_instance.clone(),
            ),
        );
        self.method(
            &dict,
            "get",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("key", free_k.clone())],
                combine_types(vec![free_v.clone(), Type::None]),
            ),
        );
        self.method(
            &dict,
            "keys",
            Self::sig(
                vec![P::simple("self", Type::any())],
                Type::object(iterable.clone_for_specialization(vec![free_k.clone()])),
            ),
        );
        self.method(
            &dict,
            "values",
            Self::sig(
                vec![P::simple("self", Type::any())],
                Type::object(iterable.clone_for_specialization(vec![free_v.clone()])),
            ),
        );

        let set_class = self.class("set", ClassFlags::empty(), &[]);
        set_class.details.set_type_parameters(vec![t_list.clone()]);
        set_class.details.add_base(BaseClass {
            class_type: Type::Class(iterable.clone_for_specialization(vec![free_t.clone()])),
            is_metaclass: false,
        });
        self.method(
            &set_class,
            "__init__",
            Self::sig(
                vec![
                    P::simple("self", Type::any()),
                    P::with_default(
                        "iterable",
                        Type::object(iterable.clone_for_specialization(vec![free_t.clone()])),
                    ),
                ],
                Type::None,
            ),
        );
        self.method(
            &set_class,
            "add",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("element", free_t.clone())],
                Type::None,
            ),
        );
        self.method(
            &set_class,
            "__iter__",
            Self::sig(
                vec![P::simple("self", Type::any())],
                Type::object(iterator.clone_for_specialization(vec![free_t.clone()])),
            ),
        );
        self.method(
            &set_class,
            "__len__",
            Self::sig(vec![P::simple("self", Type::any())], int_instance.clone()),
        );
        self.method(
            &set_class,
            "__contains__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("value", object_instance.clone())],
                bool_instance.clone(),
            ),
        );

        let frozenset = self.class("frozenset", ClassFlags::empty(), &[]);
        frozenset.details.set_type_parameters(vec![t_co.clone()]);
        frozenset.details.add_base(BaseClass {
            class_type: Type::Class(iterable.clone_for_specialization(vec![free_t_co.clone()])),
            is_metaclass: false,
        });
        self.method(
            &frozenset,
            "__iter__",
            Self::sig(
                vec![P::simple("self", Type::any())],
                Type::object(iterator.clone_for_specialization(vec![free_t_co.clone()])),
            ),
        );
        self.method(
            &frozenset,
            "__len__",
            Self::sig(vec![P::simple("self", Type::any())], int_instance.clone()),
        );

        let tuple = self.class("tuple", ClassFlags::empty(), &[]);
        tuple.details.set_type_parameters(vec![t_co.clone()]);
        tuple.details.add_base(BaseClass {
            class_type: Type::Class(iterable.clone_for_specialization(vec![free_t_co.clone()])),
            is_metaclass: false,
        });
        self.method(
            &tuple,
            "__len__",
            Self::sig(vec![P::simple("self", Type::any())], int_instance.clone()),
        );
        self.method(
            &tuple,
            "__contains__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("value", object_instance.clone())],
                bool_instance.clone(),
            ),
        );

        // range
        range.details.add_base(BaseClass {
            class_type: Type::Class(
                iterable.clone_for_specialization(vec![int_instance.clone()]),
            ),
            is_metaclass: false,
        });
        self.method(
            &range,
            "__init__",
            Self::sig(
                vec![
                    P::simple("self", Type::any()),
                    P::simple("start", int_instance.clone()),
                    P::with_default("stop", int_instance.clone()),
                    P::with_default("step", int_instance.clone()),
                ],
                Type::None,
            ),
        );
        self.method(
            &range,
            "__iter__",
            Self::sig(
                vec![P::simple("self", Type::any())],
                Type::object(iterator.clone_for_specialization(vec![int_instance.clone()])),
            ),
        );
        self.method(
            &range,
            "__getitem__",
            Self::sig(
                vec![P::simple("self", Type::any()), P::simple("index", int_instance.clone())],
                int_instance.clone(),
            ),
        );
        self.method(
            &range,
            "__len__",
            Self::sig(vec![P::simple("self", Type::any())], int_instance.clone()),
        );

        // Exceptions.
        let base_exception = self.class("BaseException", ClassFlags::empty(), &[&object]);
        self.method(
            &base_exception,
            "__init__",
            Self::sig(
                vec![
                    P::simple("self", Type::any()),
                    P::var_positional("args", object_instance.clone()),
                ],
                Type::None,
            ),
        );
        let exception = self.class("Exception", ClassFlags::empty(), &[&base_exception]);
        for name in [
            "TypeError",
            "ValueError",
            "KeyError",
            "IndexError",
            "RuntimeError",
            "StopIteration",
            "NotImplementedError",
            "AttributeError",
        ] {
            self.class(name, ClassFlags::empty(), &[&exception]);
        }

        // Builtin functions.
        let mut len_fn = Self::sig(
            vec![P::simple("obj", object_instance.clone())],
            int_instance.clone(),
        );
        len_fn.name = Some("len".into());
        self.function("len", len_fn);

        let mut isinstance_fn = Self::sig(
            vec![
                P::simple("obj", object_instance.clone()),
                P::simple("class_or_tuple", object_instance.clone()),
            ],
            bool_instance.clone(),
        );
        isinstance_fn.name = Some("isinstance".into());
        self.function("isinstance", isinstance_fn);

        let mut issubclass_fn = Self::sig(
            vec![
                P::simple("cls", object_instance.clone()),
                P::simple("class_or_tuple", object_instance.clone()),
            ],
            bool_instance.clone(),
        );
        issubclass_fn.name = Some("issubclass".into());
        self.function("issubclass", issubclass_fn);

        let mut print_fn = Self::sig(
            vec![P::var_positional("values", object_instance.clone())],
            Type::None,
        );
        print_fn.name = Some("print".into());
        self.function("print", print_fn);

        let mut repr_fn = Self::sig(
            vec![P::simple("obj", object_instance.clone())],
            str_instance.clone(),
        );
        repr_fn.name = Some("repr".into());
        self.function("repr", repr_fn);

        let mut cast_fn = Self::sig(
            vec![
                P::simple("typ", object_instance.clone()),
                P::simple("val", object_instance.clone()),
            ],
            Type::any(),
        );
        cast_fn.name = Some("cast".into());
        self.function("cast", cast_fn);

        let mut type_var_fn = Self::sig(
            vec![
                P::simple("name", str_instance.clone()),
                P::var_positional("constraints", object_instance.clone()),
                P::with_default("bound", object_instance.clone()),
                P::with_default("covariant", bool_instance.clone()),
                P::with_default("contravariant", bool_instance.clone()),
            ],
            object_instance.clone(),
        );
        type_var_fn.name = Some("TypeVar".into());
        self.function("TypeVar", type_var_fn);

        let mut named_tuple_fn = Self::sig(
            vec![
                P::simple("typename", str_instance.clone()),
                P::with_default("fields", object_instance.clone()),
            ],
            Type::Class(object.clone()),
        );
        named_tuple_fn.name = Some("NamedTuple".into());
        self.function("NamedTuple", named_tuple_fn);

        // Decorator markers the evaluator recognises by builtin name.
        for name in [
            "dataclass",
            "property",
            "staticmethod",
            "classmethod",
            "abstractmethod",
            "final",
            "overload",
            "runtime_checkable",
        ] {
            self.marker(name);
        }

        // The typing module's internal machinery class. Underscore-named,
        // so accessing it through a module reference exercises the
        // module-privacy rule.
        self.class("_SpecialForm", ClassFlags::empty(), &[&object]);

        // Typing special forms. Container forms alias their builtin class;
        // the rest are markers the subscript evaluator dispatches on.
        self.special_form("List", Some(&list));
        self.special_form("Dict", Some(&dict));
        self.special_form("Set", Some(&set_class));
        self.special_form("FrozenSet", Some(&frozenset));
        self.special_form("Tuple", Some(&tuple));
        self.special_form("Type", Some(&type_class));
        for name in [
            "Optional", "Union", "Callable", "ClassVar", "Literal", "Generic", "Protocol",
            "Final", "TypedDict",
        ] {
            self.special_form(name, None);
        }

        // Collection aliases backed by their own builtin classes.
        let deque = self.class("deque", ClassFlags::empty(), &[]);
        deque.details.set_type_parameters(vec![t_list.clone()]);
        deque.details.add_base(BaseClass {
            class_type: Type::Class(iterable.clone_for_specialization(vec![free_t.clone()])),
            is_metaclass: false,
        });
        self.method(
            &deque,
            "__iter__",
            Self::sig(
                vec![P::simple("self", Type::any())],
                Type::object(iterator.clone_for_specialization(vec![free_t.clone()])),
            ),
        );
        self.special_form("Deque", Some(&deque));
        let defaultdict = self.class("defaultdict", ClassFlags::empty(), &[&dict]);
        defaultdict
            .details
            .set_type_parameters(vec![k_var.clone(), v_var.clone()]);
        self.special_form("DefaultDict", Some(&defaultdict));
        let chain_map = self.class("ChainMap", ClassFlags::empty(), &[&dict]);
        chain_map
            .details
            .set_type_parameters(vec![k_var.clone(), v_var.clone()]);

        // Opaque typing names.
        self.declare("Any", Type::any());
        self.declare("NoReturn", Type::Never);

        Builtins {
            object,
            type_class,
            int,
            float,
            complex,
            bool: bool_class,
            str: str_class,
            bytes,
            list,
            dict,
            set: set_class,
            frozenset,
            tuple,
            range,
            base_exception,
            exception,
            iterator,
            iterable,
            generator,
            coroutine,
            awaitable,
            async_iterator,
            async_generator,
            types_by_symbol: self.types_by_symbol,
        }
    }
}
