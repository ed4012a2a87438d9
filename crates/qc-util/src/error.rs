//! Error catalogue for the QC interpreter.
//!
//! Every failure a running script can provoke is one of the [`ErrorKind`]
//! variants below. Errors are fatal to the script: they propagate as a
//! [`QcError`] through every evaluator and interpreter frame up to the
//! top-level executor, which renders them. The script's `exit()` builtin
//! travels the same channel as [`Interrupt::Exit`] so that unwinding and
//! clean termination share one code path.

use thiserror::Error;

/// Everything that can go wrong while loading or running a QC script.
///
/// The `name()` of each kind is a stable identifier that appears in
/// rendered diagnostics, e.g. `error[ARRAY_BOUNDS]: ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("syntax error")]
    Syntax,
    #[error("unbalanced parentheses")]
    UnbalParens,
    #[error("no expression present")]
    NoExp,
    #[error("equals sign expected")]
    EqualsExpected,
    #[error("not a variable")]
    NotVar,
    #[error("parameter error")]
    ParamErr,
    #[error("semicolon expected")]
    SemiExpected,
    #[error("unbalanced braces")]
    UnbalBraces,
    #[error("function undefined")]
    FuncUndef,
    #[error("type specifier expected")]
    TypeExpected,
    #[error("too many nested function calls")]
    NestFunc,
    #[error("return without call")]
    RetNoCall,
    #[error("parentheses expected")]
    ParenExpected,
    #[error("`while' expected")]
    WhileExpected,
    #[error("closing quote expected")]
    QuoteExpected,
    #[error("nul byte in string literal not supported")]
    NulInString,
    #[error("too many local variables")]
    TooManyLvars,
    #[error("too many global variables")]
    TooManyGvars,
    #[error("incorrect number of arguments")]
    ArgCount,
    #[error("comma expected")]
    CommaExpected,
    #[error("only pointers supported for FILE objects")]
    FileNotPtr,
    #[error("too many arguments")]
    TooManyArgs,
    #[error("string literal is too long")]
    OversizeString,
    #[error("too many files open")]
    TooManyFiles,
    #[error("string literal limit exceeded")]
    TooManyStrings,
    #[error("not enough memory available")]
    NoMem,
    #[error("fatal internal trap")]
    Fatal,
    #[error("cannot open file")]
    NoFile,
    #[error("unbalanced comment")]
    UnbalComment,
    #[error("unknown type")]
    UnknownType,
    #[error("type mismatch")]
    TypeMismatch,
    #[error("invalid operation for type")]
    TypeInval,
    #[error("identifier expected")]
    IdentifierExpected,
    #[error("using uninitialized variable")]
    Uninit,
    #[error("declarations with matching names")]
    NamesMatch,
    #[error("entry point `main' not found")]
    NoMain,
    #[error("cannot dereference non-pointer")]
    Deref,
    #[error("accessing pointer out of bounds")]
    BoundErr,
    #[error("pointers may only target user-defined variables")]
    PtrRefErr,
    #[error("arrays may only be declared with numerical literals")]
    ArraySizeNotLit,
    #[error("double pointers not supported")]
    DblPtr,
    #[error("array too big")]
    ArrayTooBig,
    #[error("closing square brace expected")]
    SqubraceExpected,
    #[error("array initialization at declaration not supported")]
    ArrayInitializer,
    #[error("insane left/right shift amount")]
    InsaneShift,
    #[error("array out of bounds")]
    ArrayBounds,
}

impl ErrorKind {
    /// Stable diagnostic code name, e.g. `ARRAY_BOUNDS`.
    pub fn name(self) -> &'static str {
        use ErrorKind::*;
        match self {
            Syntax => "SYNTAX",
            UnbalParens => "UNBAL_PARENS",
            NoExp => "NO_EXP",
            EqualsExpected => "EQUALS_EXPECTED",
            NotVar => "NOT_VAR",
            ParamErr => "PARAM_ERR",
            SemiExpected => "SEMI_EXPECTED",
            UnbalBraces => "UNBAL_BRACES",
            FuncUndef => "FUNC_UNDEF",
            TypeExpected => "TYPE_EXPECTED",
            NestFunc => "NEST_FUNC",
            RetNoCall => "RET_NOCALL",
            ParenExpected => "PAREN_EXPECTED",
            WhileExpected => "WHILE_EXPECTED",
            QuoteExpected => "QUOTE_EXPECTED",
            NulInString => "NUL_IN_STRING",
            TooManyLvars => "TOO_MANY_LVARS",
            TooManyGvars => "TOO_MANY_GVARS",
            ArgCount => "ARG_COUNT",
            CommaExpected => "COMMA_EXPECTED",
            FileNotPtr => "FILE_NOT_PTR",
            TooManyArgs => "TOO_MANY_ARGS",
            OversizeString => "OVERSIZE_STRING",
            TooManyFiles => "TOO_MANY_FILES",
            TooManyStrings => "TOO_MANY_STRINGS",
            NoMem => "NOMEM",
            Fatal => "FATAL",
            NoFile => "NOFILE",
            UnbalComment => "UNBAL_COMMENT",
            UnknownType => "UNK_TYPE",
            TypeMismatch => "TYPE_MISMATCH",
            TypeInval => "TYPE_INVAL",
            IdentifierExpected => "IDENTIFIER_EXPECTED",
            Uninit => "UNINIT",
            NamesMatch => "NAMES_MATCH",
            NoMain => "NOMAIN",
            Deref => "DEREF",
            BoundErr => "BOUND_ERR",
            PtrRefErr => "PTR_REF_ERR",
            ArraySizeNotLit => "ARRAYSIZE_NOT_LIT",
            DblPtr => "DBL_PTR",
            ArrayTooBig => "ARRAY_TOO_BIG",
            SqubraceExpected => "SQUBRACE_EXPECTED",
            ArrayInitializer => "ARRAY_INITIALIZER",
            InsaneShift => "INSANE_SHIFT",
            ArrayBounds => "ARRAY_BOUNDS",
        }
    }
}

/// A positioned interpreter error.
///
/// `ns` and `offset` locate the failure inside a loaded program buffer so
/// the executor can render a line number and a source excerpt. Either may
/// be absent for errors raised before a program is in place (e.g. a file
/// that cannot be opened).
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct QcError {
    pub kind: ErrorKind,
    /// Index of the namespace whose program buffer `offset` refers to.
    pub ns: Option<usize>,
    /// Byte offset into the program buffer at the point of failure.
    pub offset: Option<usize>,
}

impl QcError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            ns: None,
            offset: None,
        }
    }

    pub fn at(kind: ErrorKind, ns: usize, offset: usize) -> Self {
        Self {
            kind,
            ns: Some(ns),
            offset: Some(offset),
        }
    }
}

impl From<ErrorKind> for QcError {
    fn from(kind: ErrorKind) -> Self {
        QcError::new(kind)
    }
}

/// Non-local exit from a running script.
///
/// The original design unwound with a long jump to the top-level executor;
/// here the same two exits travel as an error value: a fatal diagnostic, or
/// a clean `exit(code)` requested by the script.
#[derive(Debug, Clone, Error)]
pub enum Interrupt {
    #[error("{0}")]
    Fault(QcError),
    #[error("script exit with code {0}")]
    Exit(i32),
}

impl From<QcError> for Interrupt {
    fn from(e: QcError) -> Self {
        Interrupt::Fault(e)
    }
}

impl From<ErrorKind> for Interrupt {
    fn from(kind: ErrorKind) -> Self {
        Interrupt::Fault(QcError::new(kind))
    }
}

/// Result alias used throughout the evaluator and block interpreter.
pub type Exec<T> = Result<T, Interrupt>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_messages() {
        assert_eq!(ErrorKind::SemiExpected.to_string(), "semicolon expected");
        assert_eq!(ErrorKind::ArrayBounds.to_string(), "array out of bounds");
        assert_eq!(
            ErrorKind::Uninit.to_string(),
            "using uninitialized variable"
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::ArrayBounds.name(), "ARRAY_BOUNDS");
        assert_eq!(ErrorKind::Uninit.name(), "UNINIT");
        assert_eq!(ErrorKind::NestFunc.name(), "NEST_FUNC");
        assert_eq!(ErrorKind::TooManyLvars.name(), "TOO_MANY_LVARS");
    }

    #[test]
    fn test_error_position() {
        let e = QcError::at(ErrorKind::Syntax, 0, 42);
        assert_eq!(e.ns, Some(0));
        assert_eq!(e.offset, Some(42));

        let e = QcError::new(ErrorKind::NoFile);
        assert!(e.ns.is_none());
        assert!(e.offset.is_none());
    }

    #[test]
    fn test_interrupt_from_kind() {
        let i: Interrupt = ErrorKind::Deref.into();
        match i {
            Interrupt::Fault(e) => assert_eq!(e.kind, ErrorKind::Deref),
            Interrupt::Exit(_) => panic!("expected a fault"),
        }
    }
}
