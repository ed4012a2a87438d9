//! The expression evaluator.
//!
//! Recursive descent over nine precedence levels, lowest first:
//!
//! | Level | Handles                                   |
//! |-------|-------------------------------------------|
//! | 0     | assignment forms, pre/post `++` `--`      |
//! | 1     | `&&` `||`                                 |
//! | 2     | `&` `|` `^`                               |
//! | 3     | `<` `<=` `>` `>=` `==` `!=`               |
//! | 4     | `<<` `>>`                                 |
//! | 5     | `+` `-`                                   |
//! | 6     | `*` `/` `%`                               |
//! | 7     | unary `-` `*` `!` `~` `&`                 |
//! | 8     | parenthesized subexpression               |
//! | atom  | literal, variable read, function call     |
//!
//! Level 0 is the interesting one: on seeing a known variable it
//! optimistically scans ahead for an assignment operator, and rewinds the
//! scanner through a program-state snapshot when the expression turns out
//! not to be an assignment. Everything below is a plain climb.

use qc_lex::token::{id, Token};
use qc_util::{ErrorKind, Exec};

use crate::atom::{Atom, PtrVal, Value, VarRef};
use crate::interp::Interp;
use crate::value;

impl Interp {
    /// Evaluates the expression at the cursor.
    ///
    /// On return the terminating token (`;`, `)`, `,`, ...) is the
    /// current token and the cursor sits just before it, so the caller
    /// can inspect and then consume it.
    pub(crate) fn expression(&mut self) -> Exec<Atom> {
        self.lex()?;
        if self.tok.id() == id::SEMI {
            return Ok(Atom::empty());
        }
        let a = self.level0()?;
        self.putback();
        Ok(a)
    }

    fn level0(&mut self) -> Exec<Atom> {
        match self.tok.id() {
            id::IDENTIFIER => {
                let name = self.text.clone();
                if let Some(vr) = self.lookup_var(&name) {
                    let st = self.program_save();
                    self.lex()?;
                    if let Some(a) = self.assign_maybe(vr)? {
                        return Ok(a);
                    }
                    self.program_restore(st);
                }
            }
            id::MUL => {
                let st = self.program_save();
                let vr = self.ptr2var()?;
                if let Some(a) = self.assign_maybe(vr)? {
                    return Ok(a);
                }
                self.program_restore(st);
            }
            id::INC => return self.preincrement(id::PLUSEQ),
            id::DEC => return self.preincrement(id::MINUSEQ),
            _ => {}
        }
        self.level1()
    }

    /// Completes an assignment when the current token is an assignment
    /// operator, applied to the variable `vr` (after an optional
    /// subscript). Returns the assigned value, or `None` when the
    /// expression is not an assignment and the caller must rewind.
    fn assign_maybe(&mut self, vr: VarRef) -> Exec<Option<Atom>> {
        let vr = self.array_offset_maybe(vr)?;
        if !self.tok.is_assign_op() {
            return Ok(None);
        }

        let mut a = self.datum(vr)?;
        let (op, operand) = match self.tok.id() {
            id::INC => {
                self.lex()?;
                (id::PLUSEQ, Atom::int(1))
            }
            id::DEC => {
                self.lex()?;
                (id::MINUSEQ, Atom::int(1))
            }
            op => {
                self.lex()?;
                // Right-associative: the full assignment expression is
                // the right-hand side, so chains like a = b = c work.
                let rhs = self.level0()?;
                (op, rhs)
            }
        };
        self.apply_assign(&mut a, &operand, op)?;
        self.store(vr, &a)?;
        Ok(Some(a))
    }

    /// Applies assignment operator `op` to `dst` with `operand`, e.g.
    /// `+=` dispatches to the engine's add.
    fn apply_assign(&mut self, dst: &mut Atom, operand: &Atom, op: u16) -> Exec<()> {
        let r = match op {
            id::ANDEQ => value::and(dst, operand),
            id::OREQ => value::or(dst, operand),
            id::PLUSEQ => value::add(dst, operand),
            id::MINUSEQ => value::sub(dst, operand),
            id::XOREQ => value::xor(dst, operand),
            id::DIVEQ => value::div(dst, operand),
            id::MULEQ => value::mul(dst, operand),
            id::MODEQ => value::rem(dst, operand),
            id::SHLEQ => value::shl(dst, operand),
            id::SHREQ => value::shr(dst, operand),
            id::ASSIGN => value::mov(dst, operand),
            _ => Err(ErrorKind::Fatal),
        };
        r.map_err(|k| self.fault(k))
    }

    /// Evaluates the target of a `*` assignment (the `*` itself already
    /// consumed) down at level 8, so `(*x[i]) + b` groups as written, and
    /// returns the pointed-at variable.
    fn ptr2var(&mut self) -> Exec<VarRef> {
        self.lex()?;
        let a = self.level8()?;
        match a.val.as_var_ref() {
            Some(vr) => Ok(vr),
            None => Err(self.fault(ErrorKind::Syntax)),
        }
    }

    /// Prefix `++x` / `--x`, handled as `x (op)= 1`.
    fn preincrement(&mut self, op: u16) -> Exec<Atom> {
        self.lex()?;
        let vr = match self.tok.id() {
            id::MUL => self.ptr2var()?,
            id::IDENTIFIER => {
                let name = self.text.clone();
                let vr = self
                    .lookup_var(&name)
                    .ok_or_else(|| self.fault(ErrorKind::Syntax))?;
                self.lex()?;
                vr
            }
            _ => return Err(self.fault(ErrorKind::Syntax)),
        };
        let mut a = self.datum(vr)?;
        let one = Atom::int(1);
        self.apply_assign(&mut a, &one, op)?;
        self.store(vr, &a)?;
        Ok(a)
    }

    /// Logical AND and OR. Both sides evaluate (no short circuit) and
    /// must be integers; the result is an int 0 or 1.
    fn level1(&mut self) -> Exec<Atom> {
        let mut a = self.level2()?;
        while self.tok.is_log_op() {
            let op = self.tok.id();
            self.lex()?;
            let b = self.level2()?;
            if !a.ty.is_int() || !b.ty.is_int() {
                return Err(self.fault(ErrorKind::TypeInval));
            }
            let hit = match op {
                id::LAND => a.is_truthy() && b.is_truthy(),
                _ => a.is_truthy() || b.is_truthy(),
            };
            a = Atom::int(i32::from(hit));
        }
        Ok(a)
    }

    fn level2(&mut self) -> Exec<Atom> {
        let mut a = self.level3()?;
        while self.tok.is_binary_op() {
            let op = self.tok.id();
            self.lex()?;
            let b = self.level3()?;
            let r = match op {
                id::AND => value::and(&mut a, &b),
                id::OR => value::or(&mut a, &b),
                _ => value::xor(&mut a, &b),
            };
            r.map_err(|k| self.fault(k))?;
        }
        Ok(a)
    }

    /// Relational operators recast the running expression to `int`.
    fn level3(&mut self) -> Exec<Atom> {
        let mut a = self.level4()?;
        while self.tok.is_cmp_op() {
            let op = self.tok.id();
            self.lex()?;
            let b = self.level4()?;
            let hit = value::cmp(&a, &b, op).map_err(|k| self.fault(k))?;
            a = Atom::int(hit);
        }
        Ok(a)
    }

    fn level4(&mut self) -> Exec<Atom> {
        let mut a = self.level5()?;
        while self.tok.is_shift_op() {
            let op = self.tok.id();
            self.lex()?;
            let b = self.level5()?;
            let r = if op == id::SHL {
                value::shl(&mut a, &b)
            } else {
                value::shr(&mut a, &b)
            };
            r.map_err(|k| self.fault(k))?;
        }
        Ok(a)
    }

    fn level5(&mut self) -> Exec<Atom> {
        let mut a = self.level6()?;
        loop {
            let op = self.tok.id();
            if op != id::PLUS && op != id::MINUS {
                break;
            }
            self.lex()?;
            let b = self.level6()?;
            let r = if op == id::PLUS {
                value::add(&mut a, &b)
            } else {
                value::sub(&mut a, &b)
            };
            r.map_err(|k| self.fault(k))?;
        }
        Ok(a)
    }

    fn level6(&mut self) -> Exec<Atom> {
        let mut a = self.level7()?;
        while self.tok.is_muldiv_op() {
            let op = self.tok.id();
            self.lex()?;
            let b = self.level7()?;
            let r = match op {
                id::MUL => value::mul(&mut a, &b),
                id::DIV => value::div(&mut a, &b),
                _ => value::rem(&mut a, &b),
            };
            r.map_err(|k| self.fault(k))?;
        }
        Ok(a)
    }

    fn level7(&mut self) -> Exec<Atom> {
        let op = self.tok.id();
        if !self.tok.is_unary_op() {
            return self.level8();
        }
        self.lex()?;
        match op {
            id::MINUS => {
                let mut a = self.level8()?;
                // Negation is multiplication by -1 of the operand's type.
                let neg = if a.ty.is_flt() {
                    Atom {
                        ty: a.ty,
                        val: Value::Double(-1.0),
                    }
                } else {
                    Atom {
                        ty: a.ty,
                        val: Value::Long(-1),
                    }
                };
                value::mul(&mut a, &neg).map_err(|k| self.fault(k))?;
                Ok(a)
            }
            id::MUL => {
                // Recursing into level 7 (not 8) makes chained `**p`
                // dereferences parse.
                let a = self.level7()?;
                let Some(vr) = a.val.as_var_ref() else {
                    return Err(self.fault(ErrorKind::Deref));
                };
                if !self.var(vr)?.is_init() {
                    return Err(self.fault(ErrorKind::Uninit));
                }
                self.datum(vr)
            }
            id::LNOT => {
                let mut a = self.level8()?;
                value::lnot(&mut a).map_err(|k| self.fault(k))?;
                Ok(a)
            }
            id::BNOT => {
                let mut a = self.level8()?;
                value::bnot(&mut a).map_err(|k| self.fault(k))?;
                Ok(a)
            }
            id::AND => {
                // Address-of wants a plain identifier. The operand is
                // not evaluated, so taking the address of an
                // uninitialized variable is fine.
                if self.tok.id() != id::IDENTIFIER {
                    return Err(self.fault(ErrorKind::IdentifierExpected));
                }
                let name = self.text.clone();
                let vr = self
                    .lookup_var(&name)
                    .ok_or_else(|| self.fault(ErrorKind::Syntax))?;
                self.lex()?;
                let vr = self.array_offset_maybe(vr)?;
                let ty = self.var(vr)?.datum.ty;
                Ok(Atom {
                    ty: ty.with(Token::PTR),
                    val: Value::Ptr(PtrVal::Var(vr)),
                })
            }
            _ => Err(self.fault(ErrorKind::Fatal)),
        }
    }

    /// Parenthesized (or bracketed) subexpression, or an atom.
    fn level8(&mut self) -> Exec<Atom> {
        let close = match self.tok.id() {
            id::OPENPAREN => id::CLOSEPAREN,
            id::OPENSQU => id::CLOSESQU,
            _ => return self.atom(),
        };
        self.lex()?;
        // Back to level 0: an assignment may nest inside the parens.
        let a = self.level0()?;
        if self.tok.id() != close {
            let kind = if close == id::CLOSEPAREN {
                ErrorKind::ParenExpected
            } else {
                ErrorKind::SqubraceExpected
            };
            return Err(self.fault(kind));
        }
        self.lex()?;
        Ok(a)
    }

    /// A number, string, `NULL`, variable read, or function call.
    fn atom(&mut self) -> Exec<Atom> {
        match self.tok.id() {
            id::IDENTIFIER => {
                let name = self.text.clone();
                if let Some(f) = self.lookup_fn(&name) {
                    let mut a = Atom::int(0);
                    self.call(&mut a, &f)?;
                    self.lex()?;
                    return Ok(a);
                }
                let Some(vr) = self.lookup_var(&name) else {
                    return Err(self.fault(ErrorKind::Syntax));
                };
                self.lex()?;
                let vr = self.array_offset_maybe(vr)?;
                if !self.var(vr)?.is_init() {
                    return Err(self.fault(ErrorKind::Uninit));
                }
                self.datum(vr)
            }
            id::NULL => {
                self.lex()?;
                Ok(Atom::null())
            }
            id::NUMBER => {
                let a = parse_number(&self.text).ok_or_else(|| self.fault(ErrorKind::Syntax))?;
                self.lex()?;
                Ok(a)
            }
            id::STRING => {
                let ns = self.cur_ns_index()?;
                let idx = self
                    .cur_str
                    .ok_or_else(|| self.fault(ErrorKind::Fatal))?;
                self.lex()?;
                Ok(Atom {
                    ty: Token::of(id::CHAR).with(Token::PTR),
                    val: Value::Ptr(PtrVal::Str { ns, idx }),
                })
            }
            // A closing bracket ends the climb without error so the
            // enclosing level can consume it.
            id::CLOSEPAREN | id::CLOSESQU => Ok(Atom::int(0)),
            _ => Err(self.fault(ErrorKind::Syntax)),
        }
    }

    /// Consumes `[index]` after a variable when present, bound-checks it,
    /// and advances the reference element-wise.
    pub(crate) fn array_offset_maybe(&mut self, vr: VarRef) -> Exec<VarRef> {
        if self.tok.id() != id::OPENSQU {
            return Ok(vr);
        }
        if !self.var(vr)?.is_array() {
            return Err(self.fault(ErrorKind::TypeInval));
        }
        self.lex()?;
        let idx = self.level0()?;
        if self.tok.id() != id::CLOSESQU {
            return Err(self.fault(ErrorKind::SqubraceExpected));
        }
        self.lex()?;
        let i = idx.val.as_int().map_err(|k| self.fault(k))?;
        let size = self.var(vr)?.asize;
        if i < 0 || i as usize >= size {
            return Err(self.fault(ErrorKind::ArrayBounds));
        }
        Ok(vr.advance(i as usize))
    }
}

/// Parses a number literal's text into a typed atom.
///
/// Default is `int`; a `U` suffix makes it unsigned; an `F` suffix or the
/// presence of `.`/`e`/`E` makes it a double. `0x` and leading-zero octal
/// forms are integers.
pub(crate) fn parse_number(text: &str) -> Option<Atom> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|v| Atom::int(v as i32));
    }
    if let Some(u) = text.strip_suffix(['u', 'U']) {
        return u.parse::<u64>().ok().map(|v| Atom {
            ty: Token::of(id::INT).with(Token::UNSIGNED),
            val: Value::Uint(v as u32),
        });
    }
    if let Some(f) = text.strip_suffix(['f', 'F']) {
        return f.parse::<f64>().ok().map(Atom::double);
    }
    if text.contains(['.', 'e', 'E']) {
        return text.parse::<f64>().ok().map(Atom::double);
    }
    if text.len() > 1 && text.starts_with('0') && text.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return i64::from_str_radix(&text[1..], 8).ok().map(|v| Atom::int(v as i32));
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Overflowing literals fold with wraparound rather than failing.
    let v = text
        .bytes()
        .fold(0i64, |acc, b| acc.wrapping_mul(10).wrapping_add(i64::from(b - b'0')));
    Some(Atom::int(v as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_int() {
        let a = parse_number("42").unwrap();
        assert_eq!(a.ty.id(), id::INT);
        assert_eq!(a.val, Value::Int(42));
    }

    #[test]
    fn test_parse_unsigned_suffix() {
        let a = parse_number("7U").unwrap();
        assert!(!a.ty.is_signed());
        assert_eq!(a.val, Value::Uint(7));
    }

    #[test]
    fn test_parse_double_forms() {
        assert_eq!(parse_number("3.5").unwrap().val, Value::Double(3.5));
        assert_eq!(parse_number("15F").unwrap().val, Value::Double(15.0));
        assert_eq!(parse_number("1e3").unwrap().val, Value::Double(1000.0));
        let a = parse_number("2.5").unwrap();
        assert!(a.ty.is_flt());
    }

    #[test]
    fn test_parse_hex_and_octal() {
        assert_eq!(parse_number("0x10").unwrap().val, Value::Int(16));
        assert_eq!(parse_number("0X1f").unwrap().val, Value::Int(31));
        assert_eq!(parse_number("010").unwrap().val, Value::Int(8));
        assert_eq!(parse_number("0").unwrap().val, Value::Int(0));
    }

    #[test]
    fn test_parse_garbage_is_none() {
        assert!(parse_number("12ab").is_none());
        assert!(parse_number("1e").is_none());
    }
}
