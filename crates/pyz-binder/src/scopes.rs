//! Scopes and scope-aware lookup.
//!
//! Symbol tables are insertion-ordered (`IndexMap`) so the end-of-module
//! audit iterates symbols deterministically.

use crate::symbols::{SymbolArena, SymbolId};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;

/// Stable identity of a scope within one binder run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Builtin,
    Module,
    Class,
    Function,
    /// Comprehensions execute in a private scope of their own.
    Comprehension,
}

/// One scope of the scope tree.
#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Insertion-ordered symbol table.
    pub table: IndexMap<String, SymbolId>,
    /// For module scopes: names exported to importers (`__all__`). A lookup
    /// crossing into this scope from another module sees only these names.
    pub export_filter: Option<FxHashSet<String>>,
}

impl Scope {
    pub fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Scope {
            kind,
            parent,
            table: IndexMap::new(),
            export_filter: None,
        }
    }

    pub fn lookup_local(&self, name: &str) -> Option<SymbolId> {
        self.table.get(name).copied()
    }

    /// True when the lookup walk leaving this scope upward crosses an
    /// execution boundary (closures capture, but execution state does not
    /// flow across function frames).
    fn is_execution_boundary(&self) -> bool {
        matches!(self.kind, ScopeKind::Function)
    }
}

/// Flat storage for all scopes of one binder run.
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(scope);
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Iterate `(id, scope)` pairs in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes
            .iter()
            .enumerate()
            .map(|(i, s)| (ScopeId(i as u32), s))
    }

    /// The nearest enclosing scope (including `from`) of the given kind.
    pub fn enclosing_of_kind(&self, from: ScopeId, kind: ScopeKind) -> Option<ScopeId> {
        let mut current = Some(from);
        while let Some(id) = current {
            if self.get(id).kind == kind {
                return Some(id);
            }
            current = self.get(id).parent;
        }
        None
    }
}

/// Result of a recursive scope lookup.
#[derive(Clone, Copy, Debug)]
pub struct LookupResult {
    pub symbol: SymbolId,
    /// The scope the symbol was found in.
    pub scope: ScopeId,
    /// The walk crossed a function-scope boundary before finding the symbol;
    /// flow-sensitive facts about the symbol do not apply at the use site.
    pub is_beyond_execution_scope: bool,
    /// The walk crossed a module boundary before finding the symbol.
    pub is_outside_caller_module: bool,
}

/// Walk parent scopes resolving `name`.
///
/// Class scopes are skipped for names referenced from nested scopes (Python
/// name resolution: a class body is not an enclosing lexical scope for its
/// methods). Crossing a module scope with an export filter suppresses names
/// the filter does not list.
pub fn lookup_recursive(
    scopes: &ScopeArena,
    _symbols: &SymbolArena,
    start: ScopeId,
    name: &str,
) -> Option<LookupResult> {
    let mut current = Some(start);
    let mut beyond_execution = false;
    let mut outside_module = false;

    while let Some(scope_id) = current {
        let scope = scopes.get(scope_id);

        // A class suite's names are visible only to the suite itself.
        let skip = scope.kind == ScopeKind::Class && scope_id != start;

        if !skip {
            if outside_module {
                if let Some(filter) = &scope.export_filter {
                    if !filter.contains(name) {
                        return None;
                    }
                }
            }
            if let Some(symbol) = scope.lookup_local(name) {
                return Some(LookupResult {
                    symbol,
                    scope: scope_id,
                    is_beyond_execution_scope: beyond_execution,
                    is_outside_caller_module: outside_module,
                });
            }
        }

        if scope.is_execution_boundary() {
            beyond_execution = true;
        }
        if scope.kind == ScopeKind::Module {
            outside_module = true;
        }
        current = scope.parent;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{Symbol, SymbolFlags};

    fn setup() -> (ScopeArena, SymbolArena, ScopeId, ScopeId, ScopeId) {
        let mut scopes = ScopeArena::new();
        let mut symbols = SymbolArena::new();
        let builtin = scopes.add(Scope::new(ScopeKind::Builtin, None));
        let module = scopes.add(Scope::new(ScopeKind::Module, Some(builtin)));
        let function = scopes.add(Scope::new(ScopeKind::Function, Some(module)));

        let global = symbols.add(Symbol::new("g", SymbolFlags::empty()));
        scopes.get_mut(module).table.insert("g".into(), global);
        let local = symbols.add(Symbol::new("x", SymbolFlags::empty()));
        scopes.get_mut(function).table.insert("x".into(), local);

        (scopes, symbols, builtin, module, function)
    }

    #[test]
    fn local_lookup_stays_inside_execution_scope() {
        let (scopes, symbols, _, _, function) = setup();
        let result = lookup_recursive(&scopes, &symbols, function, "x").unwrap();
        assert!(!result.is_beyond_execution_scope);
        assert!(!result.is_outside_caller_module);
    }

    #[test]
    fn global_lookup_crosses_execution_boundary() {
        let (scopes, symbols, _, module, function) = setup();
        let result = lookup_recursive(&scopes, &symbols, function, "g").unwrap();
        assert!(result.is_beyond_execution_scope);
        assert_eq!(result.scope, module);
    }

    #[test]
    fn export_filter_hides_names_across_module_boundary() {
        let (mut scopes, mut symbols, builtin, _, _) = setup();
        // Model an importer looking through a module scope that filters.
        let other = symbols.add(Symbol::new("hidden", SymbolFlags::empty()));
        let filtered = scopes.add(Scope::new(ScopeKind::Module, Some(builtin)));
        scopes.get_mut(filtered).table.insert("hidden".into(), other);
        scopes.get_mut(filtered).export_filter = Some(FxHashSet::default());
        let inner = scopes.add(Scope::new(ScopeKind::Module, Some(filtered)));

        assert!(lookup_recursive(&scopes, &symbols, inner, "hidden").is_none());
    }
}
