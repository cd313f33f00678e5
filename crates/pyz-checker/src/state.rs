//! `CheckerState` - the per-file state every checker and evaluator method
//! hangs off.
//!
//! One instance owns one file's pass: the node-type cache, the symbol-type
//! cache, the constraint stack, the diagnostic sink, and the builtin
//! registry. A fresh instance per file keeps concurrent per-file runs
//! trivially isolated.

use crate::narrowing::Constraint;
use pyz_ast::{NodeArena, NodeId};
use pyz_binder::{BinderInfo, BinderOptions, SymbolId, bind_module};
use pyz_common::{Diagnostic, DiagnosticAddendum, DiagnosticSink, Rule, Severity, Span};
use pyz_solver::{
    AssignabilityChecker, Builtins, ClassType, FunctionType, Type, TypeSource, TypeVarMap,
    format_type,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

/// How an expression is being used; the cache key includes it because
/// `x[i]` resolves through a different dunder per usage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EvalUsage {
    Get,
    Set,
    Del,
}

/// Everything a yield/return statement needs to know about its enclosing
/// function while the walker is inside it.
#[derive(Clone, Debug)]
pub struct FunctionContext {
    pub node: NodeId,
    pub declared_return: Option<Type>,
    pub is_async: bool,
    pub is_generator: bool,
    /// Yield types accumulated for inference.
    pub yield_types: Vec<Type>,
    /// Return types accumulated for inference.
    pub return_types: Vec<Type>,
}

/// Bind a module, install the builtin registry, and run a full check pass.
///
/// The single entry point: it either completes with the file's diagnostics
/// or is abandoned wholesale; nothing is committed before it returns.
pub fn check_module(
    arena: &NodeArena,
    module: NodeId,
    options: BinderOptions,
) -> Vec<Diagnostic> {
    let sink = DiagnosticSink::new();
    let mut binder = bind_module(arena, module, options, &sink);
    let builtins = Builtins::install(&mut binder);
    let state = CheckerState::new(arena, binder, builtins, sink);
    state.check(module)
}

pub struct CheckerState<'a> {
    pub arena: &'a NodeArena,
    pub binder: BinderInfo,
    pub builtins: Builtins,
    /// Shared handle so speculative paths can silence the sink while
    /// re-borrowing the checker mutably inside the silenced scope.
    pub diagnostics: Rc<DiagnosticSink>,

    /// Per-(node, usage) type cache; single computation per key per pass.
    pub(crate) node_types: FxHashMap<(NodeId, EvalUsage), Type>,
    /// Re-entrancy sentinel: keys currently being computed resolve to
    /// Unknown, breaking cycles in recursive type definitions.
    pub(crate) pending_nodes: FxHashSet<(NodeId, EvalUsage)>,
    /// Computed symbol types (declared, inferred, or synthesised).
    pub(crate) symbol_types: FxHashMap<SymbolId, Type>,
    pub(crate) pending_symbols: FxHashSet<SymbolId>,
    /// Class identity per definition node, so every pass over a definition
    /// (or a synthesising call such as NamedTuple) reuses the same details.
    pub(crate) class_types: FxHashMap<NodeId, ClassType>,
    pub(crate) function_types: FxHashMap<NodeId, Arc<FunctionType>>,

    /// Narrowing constraints currently in force, innermost last.
    pub(crate) constraints: Vec<Constraint>,
    /// Enclosing function stack for return/yield checking.
    pub(crate) function_stack: Vec<FunctionContext>,
    /// Symbols assigned on the path walked so far (possibly-unbound check).
    pub(crate) assigned_symbols: FxHashSet<SymbolId>,
    /// Set while evaluating a parameter default value.
    pub(crate) in_default_initializer: bool,
}

impl<'a> CheckerState<'a> {
    pub fn new(
        arena: &'a NodeArena,
        binder: BinderInfo,
        builtins: Builtins,
        diagnostics: DiagnosticSink,
    ) -> Self {
        CheckerState {
            arena,
            binder,
            builtins,
            diagnostics: Rc::new(diagnostics),
            node_types: FxHashMap::default(),
            pending_nodes: FxHashSet::default(),
            symbol_types: FxHashMap::default(),
            pending_symbols: FxHashSet::default(),
            class_types: FxHashMap::default(),
            function_types: FxHashMap::default(),
            constraints: Vec::new(),
            function_stack: Vec::new(),
            assigned_symbols: FxHashSet::default(),
            in_default_initializer: false,
        }
    }

    /// Run the pass: walk the tree, audit the symbol tables, and hand back
    /// the accumulated diagnostics.
    pub fn check(mut self, module: NodeId) -> Vec<Diagnostic> {
        debug!(path = %self.binder.options.path, "checking module");
        self.visit_node(module);
        self.audit_symbol_tables();
        self.diagnostics.take()
    }

    // ---- Diagnostic plumbing ----

    /// Emit under a rule, honouring the configured level.
    pub(crate) fn report(&self, rule: Rule, span: Span, message: impl Into<String>) {
        if let Some(severity) = self.rule_severity(rule) {
            self.diagnostics
                .push(Diagnostic::new(severity, rule, message, span));
        }
    }

    pub(crate) fn report_diag(&self, rule: Rule, diagnostic: impl FnOnce(Severity) -> Diagnostic) {
        if let Some(severity) = self.rule_severity(rule) {
            self.diagnostics.push(diagnostic(severity));
        }
    }

    pub(crate) fn rule_severity(&self, rule: Rule) -> Option<Severity> {
        self.binder.options.rule_levels.level_for(rule).severity()
    }

    pub(crate) fn is_stub_file(&self) -> bool {
        self.binder.options.is_stub_file
    }

    // ---- Cache plumbing ----

    /// Cached, cycle-safe type computation for one (node, usage) key.
    pub(crate) fn cached_type(
        &mut self,
        node: NodeId,
        usage: EvalUsage,
        compute: impl FnOnce(&mut Self) -> Type,
    ) -> Type {
        let key = (node, usage);
        if let Some(cached) = self.node_types.get(&key) {
            return cached.clone();
        }
        if !self.pending_nodes.insert(key) {
            // Re-entrant request: the sentinel resolves to Unknown.
            return Type::Unknown;
        }
        let computed = compute(self);
        self.pending_nodes.remove(&key);
        self.node_types.insert(key, computed.clone());
        computed
    }

    /// A `TypeSource` snapshot over everything computed so far, for solver
    /// operations that resolve member symbols (iteration, protocols).
    pub(crate) fn type_source(&self) -> SnapshotSource<'_> {
        SnapshotSource {
            computed: &self.symbol_types,
            binder: &self.binder,
            builtins: &self.builtins,
        }
    }

    /// Probe or enforce assignability; on failure, emit under `rule` with
    /// the relation's explanatory addendum appended.
    pub(crate) fn check_assignable(
        &mut self,
        dest: &Type,
        src: &Type,
        span: Span,
        rule: Rule,
        context: &str,
    ) -> bool {
        self.ensure_members_for(dest);
        self.ensure_members_for(src);
        let mut addendum = DiagnosticAddendum::new();
        let mut type_var_map = TypeVarMap::default();
        let ok = {
            let source = self.type_source();
            AssignabilityChecker::with_source(&source).can_assign(
                dest,
                src,
                &mut addendum,
                &mut type_var_map,
                0,
            )
        };
        if !ok {
            self.report(
                rule,
                span,
                format!(
                    "{context}: type \"{}\" is not assignable to \"{}\"{}",
                    format_type(src),
                    format_type(dest),
                    addendum.format()
                ),
            );
        }
        ok
    }

    /// Silent assignability probe.
    pub(crate) fn is_assignable(&mut self, dest: &Type, src: &Type) -> bool {
        self.ensure_members_for(dest);
        self.ensure_members_for(src);
        let mut addendum = DiagnosticAddendum::new();
        let mut type_var_map = TypeVarMap::default();
        let source = self.type_source();
        AssignabilityChecker::with_source(&source).can_assign(
            dest,
            src,
            &mut addendum,
            &mut type_var_map,
            0,
        )
    }

    /// Compute the types of every member symbol reachable from `class`, so
    /// a subsequent `type_source` snapshot can resolve them.
    pub(crate) fn ensure_class_members_computed(&mut self, class: &ClassType) {
        let mut symbols: Vec<SymbolId> = Vec::new();
        for entry in class.mro() {
            for (_, symbol) in entry.details.fields() {
                symbols.push(symbol);
            }
            for (_, symbol) in entry.details.instance_fields() {
                symbols.push(symbol);
            }
        }
        for symbol in symbols {
            let _ = self.type_of_symbol(symbol);
        }
    }
}

/// Immutable view used wherever the solver needs member types.
pub struct SnapshotSource<'b> {
    computed: &'b FxHashMap<SymbolId, Type>,
    binder: &'b BinderInfo,
    builtins: &'b Builtins,
}

impl TypeSource for SnapshotSource<'_> {
    fn symbol_type(&self, symbol: SymbolId) -> Type {
        if let Some(t) = self.computed.get(&symbol) {
            return t.clone();
        }
        self.builtins
            .known_symbol_type(symbol)
            .unwrap_or(Type::Unknown)
    }

    fn symbol_ignored_for_protocol(&self, symbol: SymbolId) -> bool {
        self.binder
            .symbols
            .get(symbol)
            .flags
            .contains(pyz_binder::SymbolFlags::IGNORED_FOR_PROTOCOL_MATCH)
    }
}
