//! Name binder for the pyz Python type checker.
//!
//! This crate provides:
//! - `Symbol` and `Declaration` - Multi-declaration symbols with
//!   typed-declaration extraction
//! - `Scope` - Scope tree with insertion-ordered symbol tables
//! - `lookup_recursive` - Scope-aware lookup with execution/module boundary
//!   tracking and export-filter suppression
//! - `bind_module` - The binding pass that populates all of the above from a
//!   parse tree and records the accessed-symbol set

pub mod bind;
pub mod scopes;
pub mod symbols;

pub use bind::{BinderInfo, BinderOptions, ImportRecord, bind_module};
pub use scopes::{LookupResult, Scope, ScopeArena, ScopeId, ScopeKind, lookup_recursive};
pub use symbols::{
    Declaration, DeclarationKind, Symbol, SymbolArena, SymbolFlags, SymbolId,
};
