//! The tagged runtime value.
//!
//! An [`Atom`] is the only value the evaluator passes around: literals,
//! variable reads, expression intermediates, return values, and builtin
//! arguments are all atoms. The type tag reuses the token encoding, so the
//! evaluator's type checks and the lexer's token checks share predicates.
//!
//! Atoms are weakly typed. The tag says how the value engine should
//! dispatch; the payload may disagree after a tolerated weak store (an
//! `int` variable can end up holding a pointer, and dereferencing then
//! trusts the payload, not the tag).

use qc_lex::token::{id, Token};
use qc_util::ErrorKind;

/// A reference to a variable's storage slot.
///
/// This is what a QC pointer actually holds. Locals are absolute slots on
/// the local-variable stack; globals are arena slots in a symbol table
/// plus an element offset for arrays. Pointer arithmetic advances whole
/// elements, so `&a[i]` and `&a[0] + i` agree for both kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRef {
    Local { slot: usize },
    Global { space: Space, slot: usize, elem: usize },
}

/// Which symbol table a global [`VarRef`] points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    /// The process-wide table.
    Process,
    /// A namespace's file-scope table.
    Ns(usize),
}

impl VarRef {
    /// Advances the reference by `n` elements.
    pub fn advance(self, n: usize) -> VarRef {
        match self {
            VarRef::Local { slot } => VarRef::Local { slot: slot + n },
            VarRef::Global { space, slot, elem } => VarRef::Global {
                space,
                slot,
                elem: elem + n,
            },
        }
    }
}

/// The payload of a pointer-valued atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtrVal {
    Null,
    /// Address of a variable (or array element).
    Var(VarRef),
    /// An interned string literal: namespace index plus intern slot.
    Str { ns: usize, idx: usize },
    /// Handle into the open-file table.
    File(usize),
    /// A raw integer moved into a pointer; comparable, never dereferenced.
    Addr(i64),
}

/// The value payload of an [`Atom`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Char(i8),
    Uchar(u8),
    Int(i32),
    Uint(u32),
    Long(i64),
    Ulong(u64),
    Float(f32),
    Double(f64),
    Ptr(PtrVal),
}

impl Value {
    /// Reads the value as a signed 64-bit integer.
    ///
    /// Signed payloads sign-extend, unsigned payloads zero-extend. A raw
    /// address reads as its integer; floats and real pointers are an
    /// invalid operand.
    pub fn as_int(&self) -> Result<i64, ErrorKind> {
        match *self {
            Value::Char(v) => Ok(i64::from(v)),
            Value::Uchar(v) => Ok(i64::from(v)),
            Value::Int(v) => Ok(i64::from(v)),
            Value::Uint(v) => Ok(i64::from(v)),
            Value::Long(v) => Ok(v),
            Value::Ulong(v) => Ok(v as i64),
            Value::Float(_) | Value::Double(_) => Err(ErrorKind::TypeInval),
            Value::Ptr(PtrVal::Addr(a)) => Ok(a),
            Value::Ptr(_) => Err(ErrorKind::TypeInval),
        }
    }

    /// Reads the value as a double.
    pub fn as_f64(&self) -> Result<f64, ErrorKind> {
        match *self {
            Value::Char(v) => Ok(f64::from(v)),
            Value::Uchar(v) => Ok(f64::from(v)),
            Value::Int(v) => Ok(f64::from(v)),
            Value::Uint(v) => Ok(f64::from(v)),
            Value::Long(v) => Ok(v as f64),
            Value::Ulong(v) => Ok(v as f64),
            Value::Float(v) => Ok(f64::from(v)),
            Value::Double(v) => Ok(v),
            Value::Ptr(_) => Err(ErrorKind::TypeInval),
        }
    }

    /// The pointed-at variable, if this value holds a variable address.
    pub fn as_var_ref(&self) -> Option<VarRef> {
        match *self {
            Value::Ptr(PtrVal::Var(vr)) => Some(vr),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match *self {
            Value::Char(v) => v != 0,
            Value::Uchar(v) => v != 0,
            Value::Int(v) => v != 0,
            Value::Uint(v) => v != 0,
            Value::Long(v) => v != 0,
            Value::Ulong(v) => v != 0,
            Value::Float(v) => v != 0.0,
            Value::Double(v) => v != 0.0,
            Value::Ptr(PtrVal::Null) => false,
            Value::Ptr(PtrVal::Addr(a)) => a != 0,
            Value::Ptr(_) => true,
        }
    }
}

/// The runtime value: a type tag in token encoding plus a payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atom {
    pub ty: Token,
    pub val: Value,
}

impl Atom {
    /// A plain `int` atom.
    pub fn int(v: i32) -> Atom {
        Atom {
            ty: Token::of(id::INT),
            val: Value::Int(v),
        }
    }

    /// A `double` atom.
    pub fn double(v: f64) -> Atom {
        Atom {
            ty: Token::of(id::DBL).with(Token::FLT),
            val: Value::Double(v),
        }
    }

    /// The empty atom an empty expression evaluates to.
    pub fn empty() -> Atom {
        Atom {
            ty: Token::of(id::EMPTY),
            val: Value::Int(0),
        }
    }

    /// A `NULL` atom: a char pointer holding the null address.
    pub fn null() -> Atom {
        Atom {
            ty: Token::of(id::CHAR).with(Token::PTR),
            val: Value::Ptr(PtrVal::Null),
        }
    }

    /// A zero value of storage type `ty`, payload arm matching the tag.
    pub fn zero_of(ty: Token) -> Atom {
        let val = if ty.is_ptr() {
            Value::Ptr(PtrVal::Null)
        } else if ty.is_flt() {
            if ty.id() == id::FLT {
                Value::Float(0.0)
            } else {
                Value::Double(0.0)
            }
        } else if ty.id() == id::CHAR {
            if ty.is_signed() {
                Value::Char(0)
            } else {
                Value::Uchar(0)
            }
        } else if ty.is_signed() {
            Value::Int(0)
        } else {
            Value::Uint(0)
        };
        Atom { ty, val }
    }

    pub fn is_truthy(&self) -> bool {
        self.val.is_truthy()
    }
}
