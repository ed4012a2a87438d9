//! Per-file namespaces.
//!
//! Each loaded file owns its program buffer, its interned string
//! literals, and two file-scope symbol tables (static functions and
//! static variables). Lookups search the current namespace before the
//! process-wide tables.

use std::path::PathBuf;

use qc_lex::source::{ProgramText, StrEntry};

use crate::function::Function;
use crate::symtab::SymTable;
use crate::variable::Variable;

/// One loaded source file.
#[derive(Debug)]
pub struct Namespace {
    pub path: PathBuf,
    /// The filtered program text the scanner walks.
    pub program: String,
    /// Interned string literals, in order of appearance.
    pub strings: Vec<StrEntry>,
    /// File-scope (`static`) functions.
    pub functions: SymTable<Function>,
    /// File-scope (`static`) variables.
    pub variables: SymTable<Variable>,
}

impl Namespace {
    pub fn new(path: PathBuf, prog: ProgramText) -> Self {
        Self {
            path,
            program: prog.text,
            strings: prog.strings,
            functions: SymTable::new(),
            variables: SymTable::new(),
        }
    }
}
