//! qc-util - Shared infrastructure for the QC interpreter.
//!
//! This crate holds the pieces every other QC crate needs: the error
//! catalogue and interrupt plumbing, diagnostic rendering, and the symbol
//! hash used by the keyword and symbol tables.

pub mod diagnostic;
pub mod error;
pub mod hash;

pub use diagnostic::Diagnostic;
pub use error::{ErrorKind, Exec, Interrupt, QcError};
pub use hash::symbol_hash;
