//! Type evaluator and checker walker for the pyz Python type checker.
//!
//! This crate is organized into several submodules:
//! - `state` - `CheckerState`, the per-file caches and diagnostic plumbing
//! - `evaluate` - `get_type` dispatch over expression kinds
//! - `name_resolution` - Name handling and symbol-type computation
//! - `member_access` - Member access, descriptors, method binding
//! - `subscript` / `special_forms` - Index expressions and typing forms
//! - `call_evaluator` / `arguments` - Calls, constructors, overloads
//! - `operators` - Unary/binary/boolean operators
//! - `functions` / `classes` - Definition-type construction and synthesis
//! - `narrowing` - Flow-sensitive constraint building and application
//! - `walker` - The full-tree visit driving diagnostics
//! - `function_checker` / `class_checker` - Signature and override rules
//! - `audit` - The end-of-module symbol-table audit
//!
//! The entry point is `check_module`: bind, install builtins, walk, audit,
//! return the accumulated diagnostics.

pub mod arguments;
pub mod audit;
pub mod call_evaluator;
pub mod class_checker;
pub mod classes;
pub mod evaluate;
pub mod function_checker;
pub mod functions;
pub mod member_access;
pub mod name_resolution;
pub mod narrowing;
pub mod operators;
pub mod special_forms;
pub mod state;
pub mod subscript;
pub mod walker;

pub use narrowing::{Constraint, NarrowOp, RefPath, RefSegment};
pub use state::{CheckerState, EvalUsage, check_module};
