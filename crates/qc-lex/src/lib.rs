//! qc-lex - Lexical layer of the QC interpreter.
//!
//! This crate owns everything between raw source text and tokens:
//!
//! - [`token`]: the packed 16-bit token encoding and the token
//!   classification tables the evaluator dispatches on;
//! - [`chars`]: byte classification tables and the single-character
//!   token map;
//! - [`source`]: the program loader, which strips comments, collapses
//!   horizontal whitespace, and interns string literals;
//! - [`lexer`]: the scanner itself, one token per call with single-step
//!   putback.
//!
//! The scanner is deliberately stateless: it reads from a loaded program
//! buffer at a byte offset and reports where the token began and where the
//! next one starts. The interpreter owns the cursor, which is what makes
//! putback and full program-state snapshots trivial.

pub mod chars;
pub mod lexer;
pub mod source;
pub mod token;

pub use lexer::{scan, Scan, TokenText};
pub use source::{load_program, ProgramText, StrEntry};
pub use token::Token;
