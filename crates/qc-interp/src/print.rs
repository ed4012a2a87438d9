//! The formatted-print engine behind the `printf` builtin.
//!
//! Supports `%s %c %d %i %u %x %X %o` with the `- + 0 #` flags, field
//! width, precision, and the `h`/`hh`/`l`/`ll` length modifiers.
//! Floating-point conversions are not supported. `%%` prints a percent
//! sign; an unknown conversion character cancels its specification and
//! prints nothing.

/// Field width ceiling; wider requests clamp silently.
const WIDTH_MAX: usize = 55;

/// Precision ceiling; deeper requests clamp silently.
const PRECISION_MAX: usize = 43;

const F_PAD_RIGHT: u16 = 0x001;
const F_PAD_ZERO: u16 = 0x002;
const F_FORCE_SIGN: u16 = 0x004;
const F_HASH: u16 = 0x008;
const F_SIGNED: u16 = 0x010;
const F_ZERO: u16 = 0x040;
const F_PRECISION: u16 = 0x080;

#[derive(Clone, Copy, PartialEq)]
enum LenMod {
    Char,
    Short,
    Int,
    Long,
    LongLong,
}

/// A pre-resolved `printf` argument.
#[derive(Debug, Clone)]
pub enum FmtArg {
    Int(i64),
    Str(String),
}

struct Spec {
    lenmod: LenMod,
    flags: u16,
    width: usize,
    precision: usize,
    base: u32,
    upper: bool,
}

impl Spec {
    fn new() -> Self {
        Self {
            lenmod: LenMod::Int,
            flags: 0,
            width: 0,
            precision: 6,
            base: 0,
            upper: false,
        }
    }
}

/// Formats `fmt` with `args`, returning the rendered text.
pub fn format_message(fmt: &str, args: &[FmtArg]) -> String {
    let b = fmt.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(fmt.len());
    let mut i = 0;
    let mut next_arg = 0usize;

    while i < b.len() {
        let c = b[i];
        i += 1;
        if c != b'%' {
            out.push(c);
            continue;
        }
        if i >= b.len() {
            break;
        }
        if b[i] == b'%' {
            out.push(b'%');
            i += 1;
            continue;
        }

        let mut m = Spec::new();
        i = parse_flags(b, i, &mut m);
        i = parse_width(b, i, &mut m);
        i = parse_precision(b, i, &mut m);
        if i >= b.len() {
            break;
        }

        let conv = b[i];
        i += 1;
        match conv {
            b's' => {
                let s = match args.get(next_arg) {
                    Some(FmtArg::Str(s)) => s.clone(),
                    Some(FmtArg::Int(_)) | None => "(null)".to_string(),
                };
                next_arg += 1;
                pad_into(&mut out, s.as_bytes(), &m);
            }
            b'c' => {
                let v = take_int(args, &mut next_arg);
                pad_into(&mut out, &[v as u8], &m);
            }
            b'd' | b'i' => {
                m.flags |= F_SIGNED;
                m.base = 10;
                emit_number(&mut out, args, &mut next_arg, &mut m);
            }
            b'u' => {
                m.base = 10;
                emit_number(&mut out, args, &mut next_arg, &mut m);
            }
            b'x' => {
                m.base = 16;
                emit_number(&mut out, args, &mut next_arg, &mut m);
            }
            b'X' => {
                m.base = 16;
                m.upper = true;
                emit_number(&mut out, args, &mut next_arg, &mut m);
            }
            b'o' => {
                m.base = 8;
                emit_number(&mut out, args, &mut next_arg, &mut m);
            }
            // Unknown conversion: cancel the whole specification.
            _ => {
                i -= 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn parse_flags(b: &[u8], mut i: usize, m: &mut Spec) -> usize {
    while i < b.len() {
        match b[i] {
            b'h' => {
                if b.get(i + 1) == Some(&b'h') {
                    m.lenmod = LenMod::Char;
                    i += 1;
                } else {
                    m.lenmod = LenMod::Short;
                }
            }
            b'l' => {
                if b.get(i + 1) == Some(&b'l') {
                    m.lenmod = LenMod::LongLong;
                    i += 1;
                } else {
                    m.lenmod = LenMod::Long;
                }
            }
            b'0' => m.flags |= F_PAD_ZERO,
            b'+' => m.flags |= F_FORCE_SIGN,
            b'-' => m.flags |= F_PAD_RIGHT,
            b'#' => m.flags |= F_HASH,
            _ => return i,
        }
        i += 1;
    }
    i
}

fn parse_width(b: &[u8], mut i: usize, m: &mut Spec) -> usize {
    let mut w = 0usize;
    while i < b.len() && b[i].is_ascii_digit() {
        w = w.saturating_mul(10) + usize::from(b[i] - b'0');
        i += 1;
    }
    m.width = w.min(WIDTH_MAX);
    i
}

fn parse_precision(b: &[u8], mut i: usize, m: &mut Spec) -> usize {
    if i < b.len() && b[i] == b'.' {
        i += 1;
        m.flags |= F_PRECISION;
        let mut p = 0usize;
        while i < b.len() && b[i].is_ascii_digit() {
            p = p.saturating_mul(10) + usize::from(b[i] - b'0');
            i += 1;
        }
        m.precision = p.min(PRECISION_MAX);
    }
    i
}

fn take_int(args: &[FmtArg], next: &mut usize) -> i64 {
    let v = match args.get(*next) {
        Some(FmtArg::Int(v)) => *v,
        _ => 0,
    };
    *next += 1;
    v
}

/// Truncates a raw argument to the length modifier's width, returning
/// (is_negative, magnitude).
fn truncate(v: i64, m: &Spec) -> (bool, u64) {
    let signed = m.flags & F_SIGNED != 0 && m.base == 10;
    match m.lenmod {
        LenMod::Char => {
            let t = v as i8;
            if signed && t < 0 {
                (true, (t as i64).unsigned_abs())
            } else {
                (false, u64::from(t as u8))
            }
        }
        LenMod::Short => {
            let t = v as i16;
            if signed && t < 0 {
                (true, (t as i64).unsigned_abs())
            } else {
                (false, u64::from(t as u16))
            }
        }
        LenMod::Int => {
            let t = v as i32;
            if signed && t < 0 {
                (true, (t as i64).unsigned_abs())
            } else {
                (false, u64::from(t as u32))
            }
        }
        LenMod::Long | LenMod::LongLong => {
            if signed && v < 0 {
                (true, v.unsigned_abs())
            } else {
                (false, v as u64)
            }
        }
    }
}

fn digits_of(mut v: u64, m: &Spec) -> Vec<u8> {
    let letbase = if m.upper { b'A' } else { b'a' };
    let mut out = Vec::new();
    while v != 0 {
        let d = (v % u64::from(m.base)) as u8;
        out.push(if d >= 10 { letbase + d - 10 } else { b'0' + d });
        v /= u64::from(m.base);
    }
    out.reverse();
    out
}

fn emit_number(out: &mut Vec<u8>, args: &[FmtArg], next: &mut usize, m: &mut Spec) {
    // Zero padding and an explicit precision are mutually exclusive; the
    // precision wins.
    if m.flags & F_PRECISION != 0 && m.flags & F_PAD_ZERO != 0 {
        m.flags &= !F_PAD_ZERO;
    }

    let raw = take_int(args, next);
    let (neg, mag) = truncate(raw, m);

    let mut body = if mag == 0 {
        m.flags |= F_ZERO;
        vec![b'0']
    } else {
        digits_of(mag, m)
    };

    // Integer precision means a minimum digit count, zero-filled. The
    // hash prefix counts against it. A zero value bypasses the fill and
    // keeps its single digit.
    if mag != 0 && m.flags & F_PRECISION != 0 {
        let mut want = m.precision;
        if m.flags & F_HASH != 0 {
            let prefix = if m.base == 16 { 2 } else { usize::from(m.base == 8) };
            want = want.saturating_sub(prefix);
        }
        while body.len() < want {
            body.insert(0, b'0');
        }
    }

    // The sign shows for negatives, or for explicitly signed nonzero
    // values.
    let force = m.flags & (F_FORCE_SIGN | F_ZERO) == F_FORCE_SIGN;
    let sign: &[u8] = if neg {
        b"-"
    } else if force {
        b"+"
    } else {
        b""
    };
    let prefix: &[u8] = if m.flags & F_HASH != 0 {
        match (m.base, m.upper) {
            (16, false) => b"0x",
            (16, true) => b"0X",
            (8, _) => b"0",
            _ => b"",
        }
    } else {
        b""
    };

    if m.width != 0 && m.flags & F_PAD_ZERO != 0 {
        // Zero padding goes between the sign/prefix and the digits.
        out.extend_from_slice(sign);
        out.extend_from_slice(prefix);
        m.width = m.width.saturating_sub(sign.len() + prefix.len());
        pad_into(out, &body, m);
    } else {
        let mut full = Vec::with_capacity(sign.len() + prefix.len() + body.len());
        full.extend_from_slice(sign);
        full.extend_from_slice(prefix);
        full.append(&mut body);
        pad_into(out, &full, m);
    }
}

/// Emits `s` into `out` padded to the spec's width.
fn pad_into(out: &mut Vec<u8>, s: &[u8], m: &Spec) {
    let pad = m.width.saturating_sub(s.len());
    let padchar = if m.flags & F_PAD_ZERO != 0 { b'0' } else { b' ' };
    if m.flags & F_PAD_RIGHT == 0 {
        out.extend(std::iter::repeat(padchar).take(pad));
        out.extend_from_slice(s);
    } else {
        out.extend_from_slice(s);
        out.extend(std::iter::repeat(padchar).take(pad));
    }
}
