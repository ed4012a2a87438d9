//! The value engine.
//!
//! One function per operator, each taking the destination atom and (for
//! binary forms) a source. The destination's type class (pointer, float,
//! integer) picks the dispatch arm and dominates the promotion: the source
//! is coerced to the destination's class, never the other way around.
//! Integer arithmetic promotes both sides to signed 64 bits, operates, and
//! crops back to the destination width.
//!
//! Errors are plain [`ErrorKind`]s; the caller attaches the source
//! position.

use qc_lex::token::id;
use qc_util::ErrorKind;

use crate::atom::{Atom, PtrVal, Value};

/// Largest shift amount accepted before the operation is rejected as
/// nonsense rather than performed.
const SHIFT_SANITY: i64 = 1000;

/// Crops an integer atom back to its declared width.
///
/// Runs after every integer operation: the stored value is exactly the low
/// N bits of the 64-bit arithmetic result, reinterpreted per the
/// destination's signedness.
pub fn crop(a: &mut Atom) -> Result<(), ErrorKind> {
    let v = a.val.as_int()?;
    a.val = match (a.ty.id(), a.ty.is_signed()) {
        (id::CHAR, true) => Value::Char(v as i8),
        (id::CHAR, false) => Value::Uchar(v as u8),
        (id::INT | id::NUMBER | id::EMPTY, true) => Value::Int(v as i32),
        (id::INT | id::NUMBER, false) => Value::Uint(v as u32),
        _ => return Err(ErrorKind::TypeInval),
    };
    Ok(())
}

fn ptr_step(p: PtrVal, n: i64) -> Result<PtrVal, ErrorKind> {
    let offset = |base: usize| -> Result<usize, ErrorKind> {
        let moved = base as i64 + n;
        usize::try_from(moved).map_err(|_| ErrorKind::BoundErr)
    };
    match p {
        PtrVal::Var(vr) => {
            let vr = match vr {
                crate::atom::VarRef::Local { slot } => crate::atom::VarRef::Local {
                    slot: offset(slot)?,
                },
                crate::atom::VarRef::Global { space, slot, elem } => crate::atom::VarRef::Global {
                    space,
                    slot,
                    elem: offset(elem)?,
                },
            };
            Ok(PtrVal::Var(vr))
        }
        PtrVal::Addr(a) => Ok(PtrVal::Addr(a.wrapping_add(n))),
        PtrVal::Null | PtrVal::Str { .. } | PtrVal::File(_) => Err(ErrorKind::TypeInval),
    }
}

fn float_store(dst: &mut Atom, d: f64) -> Result<(), ErrorKind> {
    dst.val = match dst.ty.id() {
        id::FLT => Value::Float(d as f32),
        id::DBL => Value::Double(d),
        _ => return Err(ErrorKind::Fatal),
    };
    Ok(())
}

fn int_binary(
    dst: &mut Atom,
    src: &Atom,
    f: impl FnOnce(i64, i64) -> i64,
) -> Result<(), ErrorKind> {
    let l = dst.val.as_int()?;
    let r = src.val.as_int()?;
    dst.val = Value::Long(f(l, r));
    crop(dst)
}

fn float_binary(
    dst: &mut Atom,
    src: &Atom,
    f: impl FnOnce(f64, f64) -> f64,
) -> Result<(), ErrorKind> {
    let l = dst.val.as_f64()?;
    let r = src.val.as_f64()?;
    float_store(dst, f(l, r))
}

/// Moves `src` into `dst`, coercing to the destination type.
///
/// Integer destinations tolerate a pointer source by storing the pointer
/// payload unconverted; dereferencing such a variable later trusts the
/// payload. Pointer destinations accept pointer sources or plain integers
/// (stored as a raw address).
pub fn mov(dst: &mut Atom, src: &Atom) -> Result<(), ErrorKind> {
    if dst.ty.is_ptr() {
        match src.val {
            Value::Ptr(p) => dst.val = Value::Ptr(p),
            _ => {
                let a = src.val.as_int()?;
                dst.val = Value::Ptr(PtrVal::Addr(a));
            }
        }
        return Ok(());
    }
    if dst.ty.is_flt() {
        let d = src.val.as_f64()?;
        return float_store(dst, d);
    }
    if let Value::Ptr(p) = src.val {
        // Weak typing: an integer variable may hold a pointer value.
        dst.val = Value::Ptr(p);
        return Ok(());
    }
    let v = src.val.as_int()?;
    dst.val = Value::Long(v);
    crop(dst)
}

pub fn add(dst: &mut Atom, src: &Atom) -> Result<(), ErrorKind> {
    if src.ty.is_ptr() {
        if dst.ty.is_ptr() {
            return Err(ErrorKind::TypeInval);
        }
        // int + pointer: the result is the advanced pointer.
        let n = dst.val.as_int()?;
        let Value::Ptr(p) = src.val else {
            return Err(ErrorKind::TypeInval);
        };
        *dst = Atom {
            ty: src.ty,
            val: Value::Ptr(ptr_step(p, n)?),
        };
        return Ok(());
    }
    if dst.ty.is_ptr() {
        let n = src.val.as_int()?;
        let Value::Ptr(p) = dst.val else {
            return Err(ErrorKind::TypeInval);
        };
        dst.val = Value::Ptr(ptr_step(p, n)?);
        return Ok(());
    }
    if dst.ty.is_flt() {
        return float_binary(dst, src, |l, r| l + r);
    }
    int_binary(dst, src, i64::wrapping_add)
}

pub fn sub(dst: &mut Atom, src: &Atom) -> Result<(), ErrorKind> {
    if src.ty.is_ptr() {
        // Cannot subtract a pointer from anything.
        return Err(ErrorKind::TypeInval);
    }
    if dst.ty.is_ptr() {
        let n = src.val.as_int()?;
        let Value::Ptr(p) = dst.val else {
            return Err(ErrorKind::TypeInval);
        };
        dst.val = Value::Ptr(ptr_step(p, -n)?);
        return Ok(());
    }
    if dst.ty.is_flt() {
        return float_binary(dst, src, |l, r| l - r);
    }
    int_binary(dst, src, i64::wrapping_sub)
}

pub fn mul(dst: &mut Atom, src: &Atom) -> Result<(), ErrorKind> {
    if dst.ty.is_ptr() || src.ty.is_ptr() {
        return Err(ErrorKind::TypeInval);
    }
    if dst.ty.is_flt() {
        return float_binary(dst, src, |l, r| l * r);
    }
    int_binary(dst, src, i64::wrapping_mul)
}

pub fn div(dst: &mut Atom, src: &Atom) -> Result<(), ErrorKind> {
    if dst.ty.is_ptr() || src.ty.is_ptr() {
        return Err(ErrorKind::TypeInval);
    }
    if dst.ty.is_flt() {
        // Division by zero follows IEEE: the result is +-inf.
        return float_binary(dst, src, |l, r| l / r);
    }
    int_binary(dst, src, |l, r| if r == 0 { 0 } else { l.wrapping_div(r) })
}

pub fn rem(dst: &mut Atom, src: &Atom) -> Result<(), ErrorKind> {
    if dst.ty.is_ptr() || src.ty.is_ptr() || dst.ty.is_flt() {
        return Err(ErrorKind::TypeInval);
    }
    int_binary(dst, src, |l, r| if r == 0 { 0 } else { l.wrapping_rem(r) })
}

fn require_int(a: &Atom) -> Result<(), ErrorKind> {
    if a.ty.is_int() {
        Ok(())
    } else {
        Err(ErrorKind::TypeInval)
    }
}

pub fn and(dst: &mut Atom, src: &Atom) -> Result<(), ErrorKind> {
    require_int(dst)?;
    int_binary(dst, src, |l, r| l & r)
}

pub fn or(dst: &mut Atom, src: &Atom) -> Result<(), ErrorKind> {
    require_int(dst)?;
    int_binary(dst, src, |l, r| l | r)
}

pub fn xor(dst: &mut Atom, src: &Atom) -> Result<(), ErrorKind> {
    require_int(dst)?;
    int_binary(dst, src, |l, r| l ^ r)
}

/// Bitwise NOT (`~`).
pub fn bnot(a: &mut Atom) -> Result<(), ErrorKind> {
    require_int(a)?;
    let v = a.val.as_int()?;
    a.val = Value::Long(!v);
    crop(a)
}

/// Logical NOT (`!`): yields 0 or 1 at the destination width.
pub fn lnot(a: &mut Atom) -> Result<(), ErrorKind> {
    require_int(a)?;
    let v = a.val.as_int()?;
    a.val = Value::Long(i64::from(v == 0));
    crop(a)
}

fn shift_amount(amt: &Atom) -> Result<i64, ErrorKind> {
    let n = amt.val.as_int()?;
    if !(-SHIFT_SANITY..=SHIFT_SANITY).contains(&n) {
        return Err(ErrorKind::InsaneShift);
    }
    Ok(n)
}

pub fn shl(dst: &mut Atom, amt: &Atom) -> Result<(), ErrorKind> {
    require_int(dst)?;
    let n = shift_amount(amt)?;
    let l = dst.val.as_int()? as u64;
    let shifted = if (0..64).contains(&n) { l << n } else { 0 };
    dst.val = Value::Long(shifted as i64);
    crop(dst)
}

/// Logical right shift: vacated bits fill with zeros, not the sign bit.
pub fn shr(dst: &mut Atom, amt: &Atom) -> Result<(), ErrorKind> {
    require_int(dst)?;
    let n = shift_amount(amt)?;
    let l = dst.val.as_int()? as u64;
    let shifted = if (0..64).contains(&n) { l >> n } else { 0 };
    dst.val = Value::Long(shifted as i64);
    crop(dst)
}

/// Ordering key for pointer comparison. `NULL` and a raw zero address
/// compare equal; distinct pointer kinds order by discriminant.
fn ptr_key(p: PtrVal) -> (u8, u64, u64, u64) {
    match p {
        PtrVal::Null => (0, 0, 0, 0),
        PtrVal::Addr(a) => (0, a as u64, 0, 0),
        PtrVal::Var(crate::atom::VarRef::Local { slot }) => (1, slot as u64, 0, 0),
        PtrVal::Var(crate::atom::VarRef::Global { space, slot, elem }) => {
            let s = match space {
                crate::atom::Space::Process => 0u64,
                crate::atom::Space::Ns(i) => 1 + i as u64,
            };
            (2, s, slot as u64, elem as u64)
        }
        PtrVal::Str { ns, idx } => (3, ns as u64, idx as u64, 0),
        PtrVal::File(h) => (4, h as u64, 0, 0),
    }
}

fn ptr_cmp(a: &Atom, b: &Atom, op: u16) -> Result<bool, ErrorKind> {
    let lp = match a.val {
        Value::Ptr(p) => p,
        _ => PtrVal::Addr(a.val.as_int()?),
    };
    let rp = match b.val {
        Value::Ptr(p) => p,
        // A pointer may be compared against a plain number (null checks).
        _ => match b.val.as_int() {
            Ok(n) => PtrVal::Addr(n),
            Err(_) => return Err(ErrorKind::TypeMismatch),
        },
    };
    let (l, r) = (ptr_key(lp), ptr_key(rp));
    Ok(match op {
        id::LT => l < r,
        id::LE => l <= r,
        id::GT => l > r,
        id::GE => l >= r,
        id::EQ => l == r,
        id::NE => l != r,
        _ => return Err(ErrorKind::Fatal),
    })
}

fn float_cmp(a: &Atom, b: &Atom, op: u16) -> Result<bool, ErrorKind> {
    let l = a.val.as_f64()?;
    let r = b.val.as_f64()?;
    Ok(match op {
        // Ordered comparisons: NaN on either side is simply "not less".
        id::LT => l < r,
        id::LE => l <= r,
        id::GT => l > r,
        id::GE => l >= r,
        id::EQ => l == r,
        id::NE => l != r,
        _ => return Err(ErrorKind::Fatal),
    })
}

fn int_cmp(a: &Atom, b: &Atom, op: u16) -> Result<bool, ErrorKind> {
    // Unsigned comparison at 64-bit width.
    let l = a.val.as_int()? as u64;
    let r = b.val.as_int()? as u64;
    Ok(match op {
        id::LT => l < r,
        id::LE => l <= r,
        id::GT => l > r,
        id::GE => l >= r,
        id::EQ => l == r,
        id::NE => l != r,
        _ => return Err(ErrorKind::Fatal),
    })
}

/// Compares two atoms under relational operator `op` (a primary token id).
///
/// The left side picks the comparison class; the right side is coerced.
/// Returns 0 or 1.
pub fn cmp(a: &Atom, b: &Atom, op: u16) -> Result<i32, ErrorKind> {
    let hit = if a.ty.is_ptr() || matches!(a.val, Value::Ptr(_)) {
        ptr_cmp(a, b, op)?
    } else if a.ty.is_flt() {
        float_cmp(a, b, op)?
    } else {
        int_cmp(a, b, op)?
    };
    Ok(i32::from(hit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::VarRef;
    use qc_lex::token::Token;

    fn int_atom(v: i32) -> Atom {
        Atom::int(v)
    }

    fn char_atom(v: i8) -> Atom {
        Atom {
            ty: Token::of(id::CHAR),
            val: Value::Char(v),
        }
    }

    fn uchar_atom(v: u8) -> Atom {
        Atom {
            ty: Token::of(id::CHAR).with(Token::UNSIGNED),
            val: Value::Uchar(v),
        }
    }

    fn ptr_atom(vr: VarRef) -> Atom {
        Atom {
            ty: Token::of(id::INT).with(Token::PTR),
            val: Value::Ptr(PtrVal::Var(vr)),
        }
    }

    #[test]
    fn test_crop_char_width() {
        let mut a = char_atom(0);
        a.val = Value::Long(0x1FF);
        crop(&mut a).unwrap();
        assert_eq!(a.val, Value::Char(-1));

        let mut a = uchar_atom(0);
        a.val = Value::Long(0x1FF);
        crop(&mut a).unwrap();
        assert_eq!(a.val, Value::Uchar(0xFF));
    }

    #[test]
    fn test_crop_int_width() {
        let mut a = int_atom(0);
        a.val = Value::Long(0x1_0000_0001);
        crop(&mut a).unwrap();
        assert_eq!(a.val, Value::Int(1));
    }

    #[test]
    fn test_add_int() {
        let mut a = int_atom(40);
        add(&mut a, &int_atom(2)).unwrap();
        assert_eq!(a.val, Value::Int(42));
    }

    #[test]
    fn test_add_wraps_at_destination_width() {
        let mut a = int_atom(i32::MAX);
        add(&mut a, &int_atom(1)).unwrap();
        assert_eq!(a.val, Value::Int(i32::MIN));

        let mut c = char_atom(127);
        add(&mut c, &int_atom(1)).unwrap();
        assert_eq!(c.val, Value::Char(-128));
    }

    #[test]
    fn test_float_promotion_destination_dominates() {
        let mut a = Atom::double(1.5);
        add(&mut a, &int_atom(2)).unwrap();
        assert_eq!(a.val, Value::Double(3.5));

        // Integer destination with float source is invalid.
        let mut b = int_atom(1);
        assert_eq!(
            add(&mut b, &Atom::double(1.0)).unwrap_err(),
            ErrorKind::TypeInval
        );
    }

    #[test]
    fn test_div_by_zero_int_is_zero() {
        let mut a = int_atom(10);
        div(&mut a, &int_atom(0)).unwrap();
        assert_eq!(a.val, Value::Int(0));
    }

    #[test]
    fn test_div_by_zero_float_is_inf() {
        let mut a = Atom::double(1.0);
        div(&mut a, &int_atom(0)).unwrap();
        match a.val {
            Value::Double(d) => assert!(d.is_infinite()),
            other => panic!("expected a double, got {other:?}"),
        }
    }

    #[test]
    fn test_rem_rejects_float() {
        let mut a = Atom::double(4.0);
        assert_eq!(rem(&mut a, &int_atom(3)).unwrap_err(), ErrorKind::TypeInval);
    }

    #[test]
    fn test_bitwise_requires_integers() {
        let mut a = Atom::double(1.0);
        assert_eq!(and(&mut a, &int_atom(1)).unwrap_err(), ErrorKind::TypeInval);

        let mut p = ptr_atom(VarRef::Local { slot: 0 });
        assert_eq!(or(&mut p, &int_atom(1)).unwrap_err(), ErrorKind::TypeInval);
    }

    #[test]
    fn test_shifts() {
        let mut a = int_atom(1);
        shl(&mut a, &int_atom(10)).unwrap();
        assert_eq!(a.val, Value::Int(1024));

        shr(&mut a, &int_atom(4)).unwrap();
        assert_eq!(a.val, Value::Int(64));
    }

    #[test]
    fn test_shift_sanity_limit() {
        let mut a = int_atom(1);
        assert_eq!(
            shl(&mut a, &int_atom(1001)).unwrap_err(),
            ErrorKind::InsaneShift
        );
        assert_eq!(
            shr(&mut a, &int_atom(-1001)).unwrap_err(),
            ErrorKind::InsaneShift
        );
    }

    #[test]
    fn test_oversize_shift_in_sane_range_yields_zero() {
        let mut a = int_atom(1);
        shl(&mut a, &int_atom(70)).unwrap();
        assert_eq!(a.val, Value::Int(0));
    }

    #[test]
    fn test_lnot() {
        let mut a = int_atom(5);
        lnot(&mut a).unwrap();
        assert_eq!(a.val, Value::Int(0));
        lnot(&mut a).unwrap();
        assert_eq!(a.val, Value::Int(1));
    }

    #[test]
    fn test_bnot() {
        let mut a = int_atom(0);
        bnot(&mut a).unwrap();
        assert_eq!(a.val, Value::Int(-1));
    }

    #[test]
    fn test_mov_int_crops() {
        let mut c = char_atom(0);
        let mut big = int_atom(0);
        big.val = Value::Int(0x141);
        mov(&mut c, &big).unwrap();
        assert_eq!(c.val, Value::Char(0x41));
    }

    #[test]
    fn test_mov_weak_pointer_into_int() {
        let mut dst = int_atom(0);
        let src = ptr_atom(VarRef::Local { slot: 9 });
        mov(&mut dst, &src).unwrap();
        assert_eq!(dst.val.as_var_ref(), Some(VarRef::Local { slot: 9 }));
    }

    #[test]
    fn test_mov_int_into_pointer_is_raw_address() {
        let mut dst = Atom::zero_of(Token::of(id::CHAR).with(Token::PTR));
        mov(&mut dst, &int_atom(0x1000)).unwrap();
        assert_eq!(dst.val, Value::Ptr(PtrVal::Addr(0x1000)));
    }

    #[test]
    fn test_pointer_plus_int_steps_elements() {
        let base = VarRef::Local { slot: 4 };
        let mut p = ptr_atom(base);
        add(&mut p, &int_atom(3)).unwrap();
        assert_eq!(p.val.as_var_ref(), Some(VarRef::Local { slot: 7 }));

        sub(&mut p, &int_atom(2)).unwrap();
        assert_eq!(p.val.as_var_ref(), Some(VarRef::Local { slot: 5 }));
    }

    #[test]
    fn test_int_plus_pointer_commutes() {
        let base = VarRef::Local { slot: 4 };
        let mut lhs = int_atom(3);
        add(&mut lhs, &ptr_atom(base)).unwrap();
        assert!(lhs.ty.is_ptr());
        assert_eq!(lhs.val.as_var_ref(), Some(VarRef::Local { slot: 7 }));
    }

    #[test]
    fn test_pointer_plus_pointer_invalid() {
        let mut p = ptr_atom(VarRef::Local { slot: 1 });
        let q = ptr_atom(VarRef::Local { slot: 2 });
        assert_eq!(add(&mut p, &q).unwrap_err(), ErrorKind::TypeInval);
    }

    #[test]
    fn test_cmp_unsigned_at_64_bits() {
        // -1 compares as the largest unsigned value.
        assert_eq!(cmp(&int_atom(-1), &int_atom(1), id::GT).unwrap(), 1);
        assert_eq!(cmp(&int_atom(2), &int_atom(10), id::LT).unwrap(), 1);
        assert_eq!(cmp(&int_atom(7), &int_atom(7), id::EQ).unwrap(), 1);
        assert_eq!(cmp(&int_atom(7), &int_atom(8), id::NE).unwrap(), 1);
    }

    #[test]
    fn test_cmp_float() {
        let a = Atom::double(1.5);
        let b = Atom::double(2.5);
        assert_eq!(cmp(&a, &b, id::LT).unwrap(), 1);
        assert_eq!(cmp(&a, &a, id::EQ).unwrap(), 1);

        let nan = Atom::double(f64::NAN);
        assert_eq!(cmp(&nan, &b, id::LT).unwrap(), 0);
        assert_eq!(cmp(&nan, &b, id::GE).unwrap(), 0);
    }

    #[test]
    fn test_cmp_pointer_null() {
        let p = ptr_atom(VarRef::Local { slot: 3 });
        let null = Atom::null();
        assert_eq!(cmp(&p, &null, id::NE).unwrap(), 1);
        assert_eq!(cmp(&null, &Atom::int(0), id::EQ).unwrap(), 1);
    }

    #[test]
    fn test_cmp_pointer_against_number() {
        let p = ptr_atom(VarRef::Local { slot: 3 });
        assert_eq!(cmp(&p, &int_atom(0), id::EQ).unwrap(), 0);
        assert_eq!(cmp(&p, &int_atom(0), id::NE).unwrap(), 1);
    }

    #[test]
    fn test_cmp_pointer_against_float_rejected() {
        let p = ptr_atom(VarRef::Local { slot: 3 });
        assert_eq!(
            cmp(&p, &Atom::double(1.0), id::EQ).unwrap_err(),
            ErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_array_element_addresses_agree() {
        // &a[i] computed directly equals &a[0] advanced by i.
        let base = VarRef::Local { slot: 10 };
        for i in 0..5usize {
            let direct = base.advance(i);
            let mut p = ptr_atom(base);
            add(&mut p, &int_atom(i as i32)).unwrap();
            assert_eq!(p.val.as_var_ref(), Some(direct));
        }
    }
}
