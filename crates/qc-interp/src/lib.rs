//! qc-interp - The QC interpreter core.
//!
//! This crate executes loaded QC programs. The layers, bottom up:
//!
//! - [`atom`]: the tagged runtime value ([`Atom`]) and the pointer model;
//! - [`value`]: the value engine, one function per operator with
//!   integer/floating/pointer dispatch and width cropping;
//! - [`variable`] / [`symtab`] / [`namespace`]: variable descriptors, the
//!   hashed symbol tables, and per-file namespaces;
//! - [`interp`]: the [`Interp`] owner struct (local-variable stack, call
//!   frames, builtin argument stack, cursor state) and the public
//!   load/execute API;
//! - [`eval`] / [`exec`]: the recursive-descent expression evaluator and
//!   the statement/block interpreter;
//! - [`builtins`] / [`print`]: the native library functions and the
//!   formatted-print engine behind `printf`.
//!
//! The interpreter walks the source text directly. There is no bytecode:
//! loops re-lex their bodies on every iteration, and control flow is a
//! matter of saving and restoring the cursor.

pub mod atom;
pub mod builtins;
pub mod eval;
pub mod exec;
pub mod function;
pub mod interp;
pub mod namespace;
pub mod print;
pub mod symtab;
pub mod value;
pub mod variable;

pub use atom::{Atom, PtrVal, Space, Value, VarRef};
pub use function::{FnBody, Function};
pub use interp::Interp;
pub use variable::Variable;
