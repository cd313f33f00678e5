//! Symbols and declarations.
//!
//! A symbol is a named entity of a scope; each symbol carries the ordered
//! list of declarations the source provides for it. Python allows the same
//! name to be declared many times (reassignment, conditional definition,
//! overloads), so the declaration list - not a single declared type - is the
//! unit the evaluator works from.

use bitflags::bitflags;
use pyz_ast::NodeId;
use pyz_common::Span;
use smallvec::SmallVec;

/// Stable identity of a symbol within one binder run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    /// Properties of a symbol, fixed at binding time.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SymbolFlags: u16 {
        /// Declared but not assigned on every path into the scope.
        const INITIALLY_UNBOUND = 1 << 0;
        /// Hidden from importers (not listed in the module's export filter).
        const EXTERNALLY_HIDDEN = 1 << 1;
        /// Declared in a class suite.
        const CLASS_MEMBER = 1 << 2;
        /// Declared by assignment through the method's self parameter.
        const INSTANCE_MEMBER = 1 << 3;
        /// Name is private by convention (leading double underscore).
        const PRIVATE_MEMBER = 1 << 4;
        /// Excluded when matching the enclosing protocol structurally.
        const IGNORED_FOR_PROTOCOL_MATCH = 1 << 5;
    }
}

/// What kind of source construct a declaration came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclarationKind {
    Alias,
    Class,
    Function,
    Parameter,
    Variable,
    Intrinsic,
}

/// One declaration of a symbol.
///
/// Declarations are compared by node identity, kind, and span; re-binding an
/// equivalent declaration replaces rather than appends, and a typed variable
/// form supersedes an untyped one at the same position.
#[derive(Clone, Debug)]
pub enum Declaration {
    /// Binding introduced by an import.
    Alias {
        node: NodeId,
        /// Dotted module path (`import a.b`) or `module.symbol` for
        /// from-imports.
        target: String,
        span: Span,
    },
    Class {
        node: NodeId,
        span: Span,
    },
    Function {
        node: NodeId,
        is_method: bool,
        span: Span,
    },
    Parameter {
        node: NodeId,
        is_final: bool,
        span: Span,
    },
    Variable {
        node: NodeId,
        type_annotation: Option<NodeId>,
        is_final: bool,
        /// The value expression this declaration's type is inferred from
        /// when no annotation is present.
        inferred_source: Option<NodeId>,
        span: Span,
    },
    /// Synthesised by the checker or the builtin registry; no source node.
    Intrinsic {
        span: Span,
    },
}

impl Declaration {
    pub fn kind(&self) -> DeclarationKind {
        match self {
            Declaration::Alias { .. } => DeclarationKind::Alias,
            Declaration::Class { .. } => DeclarationKind::Class,
            Declaration::Function { .. } => DeclarationKind::Function,
            Declaration::Parameter { .. } => DeclarationKind::Parameter,
            Declaration::Variable { .. } => DeclarationKind::Variable,
            Declaration::Intrinsic { .. } => DeclarationKind::Intrinsic,
        }
    }

    pub fn node(&self) -> Option<NodeId> {
        match self {
            Declaration::Alias { node, .. }
            | Declaration::Class { node, .. }
            | Declaration::Function { node, .. }
            | Declaration::Parameter { node, .. }
            | Declaration::Variable { node, .. } => Some(*node),
            Declaration::Intrinsic { .. } => None,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Declaration::Alias { span, .. }
            | Declaration::Class { span, .. }
            | Declaration::Function { span, .. }
            | Declaration::Parameter { span, .. }
            | Declaration::Variable { span, .. }
            | Declaration::Intrinsic { span } => *span,
        }
    }

    /// A declaration that pins the symbol's type without inference:
    /// classes, functions, parameters with annotations are handled by the
    /// evaluator; for variables it means an explicit type annotation.
    pub fn is_typed(&self) -> bool {
        match self {
            Declaration::Variable {
                type_annotation, ..
            } => type_annotation.is_some(),
            Declaration::Parameter { .. }
            | Declaration::Class { .. }
            | Declaration::Function { .. } => true,
            Declaration::Alias { .. } | Declaration::Intrinsic { .. } => false,
        }
    }

    pub fn is_final(&self) -> bool {
        match self {
            Declaration::Variable { is_final, .. } | Declaration::Parameter { is_final, .. } => {
                *is_final
            }
            _ => false,
        }
    }

    /// Same source position and kind: the replace-in-place criterion.
    fn same_position(&self, other: &Declaration) -> bool {
        self.kind() == other.kind() && self.node() == other.node() && self.span() == other.span()
    }
}

/// A named entity of a scope.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub flags: SymbolFlags,
    declarations: SmallVec<[Declaration; 2]>,
    /// Set for fully synthesised symbols that have no declarations.
    pub has_undeclared_type: bool,
}

impl Symbol {
    pub fn new(name: impl Into<String>, flags: SymbolFlags) -> Self {
        Symbol {
            name: name.into(),
            flags,
            declarations: SmallVec::new(),
            has_undeclared_type: false,
        }
    }

    /// Add a declaration, replacing an equivalent one that was re-seen.
    ///
    /// A typed form replaces an untyped form at the same position (a second
    /// binder pass over the same tree, or an annotated re-declaration of the
    /// same assignment target).
    pub fn add_declaration(&mut self, declaration: Declaration) {
        if let Some(existing) = self
            .declarations
            .iter_mut()
            .find(|d| d.same_position(&declaration))
        {
            if declaration.is_typed() || !existing.is_typed() {
                *existing = declaration;
            }
            return;
        }
        self.declarations.push(declaration);
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Declarations that pin the symbol's type.
    pub fn get_typed_declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(|d| d.is_typed())
    }

    /// The last declaration that pins the symbol's type, if any.
    pub fn last_typed_declaration(&self) -> Option<&Declaration> {
        self.declarations.iter().rev().find(|d| d.is_typed())
    }

    /// The primary declaration the audit measures the others against.
    pub fn primary_declaration(&self) -> Option<&Declaration> {
        self.get_typed_declarations()
            .next()
            .or_else(|| self.declarations.first())
    }

    pub fn is_initially_unbound(&self) -> bool {
        self.flags.contains(SymbolFlags::INITIALLY_UNBOUND)
    }

    pub fn is_class_member(&self) -> bool {
        self.flags.contains(SymbolFlags::CLASS_MEMBER)
    }

    pub fn is_instance_member(&self) -> bool {
        self.flags.contains(SymbolFlags::INSTANCE_MEMBER)
    }

    pub fn is_private_member(&self) -> bool {
        self.flags.contains(SymbolFlags::PRIVATE_MEMBER)
    }

    pub fn is_externally_hidden(&self) -> bool {
        self.flags.contains(SymbolFlags::EXTERNALLY_HIDDEN)
    }

    /// Final symbols allow at most one final-qualified declaration.
    pub fn final_declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(|d| d.is_final())
    }
}

/// Flat storage for all symbols of one binder run.
#[derive(Debug, Default)]
pub struct SymbolArena {
    symbols: Vec<Symbol>,
}

impl SymbolArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var_decl(node: u32, annotated: bool) -> Declaration {
        Declaration::Variable {
            node: NodeId(node),
            type_annotation: annotated.then(|| NodeId(900 + node)),
            is_final: false,
            inferred_source: None,
            span: Span::new(node, node + 1),
        }
    }

    #[test]
    fn typed_declaration_supersedes_untyped_at_same_position() {
        let mut symbol = Symbol::new("x", SymbolFlags::empty());
        symbol.add_declaration(var_decl(1, false));
        symbol.add_declaration(var_decl(1, true));
        assert_eq!(symbol.declarations().len(), 1);
        assert!(symbol.declarations()[0].is_typed());
    }

    #[test]
    fn untyped_does_not_replace_typed() {
        let mut symbol = Symbol::new("x", SymbolFlags::empty());
        symbol.add_declaration(var_decl(1, true));
        symbol.add_declaration(var_decl(1, false));
        assert!(symbol.declarations()[0].is_typed());
    }

    #[test]
    fn distinct_positions_append() {
        let mut symbol = Symbol::new("x", SymbolFlags::empty());
        symbol.add_declaration(var_decl(1, false));
        symbol.add_declaration(var_decl(2, true));
        assert_eq!(symbol.declarations().len(), 2);
        assert!(symbol.last_typed_declaration().is_some());
    }
}
