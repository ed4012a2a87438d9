//! Program loading and string interning.
//!
//! [`load_program`] turns raw source text into the buffer the scanner
//! walks, performing three transformations in one pass:
//!
//! 1. `/* ... */` comments are removed (their newlines are kept so error
//!    reports still count lines correctly);
//! 2. runs of tabs and spaces collapse to a single space, again keeping
//!    newlines;
//! 3. string literals are kept *verbatim* in the buffer, while a parallel
//!    intern table records each literal's decoded form together with the
//!    buffer offsets of its body and of the first byte after the closing
//!    quote. The scanner later returns the decoded string and jumps the
//!    cursor straight to the recorded end, so escapes are decoded exactly
//!    once, at load time.

use qc_util::{ErrorKind, QcError};

/// Maximum size of a loaded program buffer in bytes.
pub const PROG_SIZE: usize = 10_000;

/// Maximum decoded length of one string literal.
pub const STRING_LEN: usize = 512;

/// Maximum number of string literals per program.
pub const N_STRINGS: usize = 100;

/// One interned string literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrEntry {
    /// The literal with escape sequences decoded.
    pub decoded: String,
    /// Offset of the literal body in the program buffer, just after the
    /// opening quote.
    pub start: usize,
    /// Offset of the first byte after the closing quote.
    pub end: usize,
}

/// A loaded program: the filtered buffer plus its intern table.
#[derive(Debug, Default)]
pub struct ProgramText {
    pub text: String,
    pub strings: Vec<StrEntry>,
}

/// Loads raw source text into a program buffer.
///
/// # Errors
///
/// `UNBAL_COMMENT` for an unterminated comment, `QUOTE_EXPECTED` for an
/// unterminated literal, `OVERSIZE_STRING`, `TOO_MANY_STRINGS`,
/// `NUL_IN_STRING` for a decoded NUL byte, and `NOMEM` when the result
/// would exceed [`PROG_SIZE`].
pub fn load_program(raw: &str) -> Result<ProgramText, QcError> {
    let bytes = raw.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(raw.len().min(PROG_SIZE) + 1);
    let mut strings: Vec<StrEntry> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];

        if c == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            loop {
                if i >= bytes.len() {
                    return Err(fault(ErrorKind::UnbalComment, out.len()));
                }
                if bytes[i] == b'\n' {
                    out.push(b'\n');
                }
                if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    i += 2;
                    break;
                }
                i += 1;
            }
            continue;
        }

        if c == b'"' {
            out.push(b'"');
            i = read_literal(bytes, i + 1, &mut out, &mut strings)?;
            continue;
        }

        if c == b' ' || c == b'\t' {
            while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
                i += 1;
            }
            out.push(b' ');
            continue;
        }

        out.push(c);
        i += 1;

        if out.len() > PROG_SIZE {
            return Err(fault(ErrorKind::NoMem, out.len()));
        }
    }

    let text = String::from_utf8(out).map_err(|_| QcError::new(ErrorKind::Syntax))?;
    Ok(ProgramText { text, strings })
}

fn fault(kind: ErrorKind, offset: usize) -> QcError {
    QcError {
        kind,
        ns: None,
        offset: Some(offset),
    }
}

/// Reads one string literal starting just after its opening quote.
///
/// Copies the raw bytes (escapes included) into `out` and appends the
/// decoded form to `strings`. Returns the input index just after the
/// closing quote.
fn read_literal(
    bytes: &[u8],
    mut i: usize,
    out: &mut Vec<u8>,
    strings: &mut Vec<StrEntry>,
) -> Result<usize, QcError> {
    if strings.len() == N_STRINGS {
        return Err(fault(ErrorKind::TooManyStrings, out.len()));
    }

    let start = out.len();
    let mut decoded: Vec<u8> = Vec::new();

    loop {
        let Some(&c) = bytes.get(i) else {
            return Err(fault(ErrorKind::QuoteExpected, out.len()));
        };
        if c == 0 {
            return Err(fault(ErrorKind::QuoteExpected, out.len()));
        }

        if c == b'"' {
            out.push(b'"');
            i += 1;
            break;
        }

        if c == b'\\' {
            out.push(b'\\');
            i += 1;
            let Some(&esc) = bytes.get(i) else {
                return Err(fault(ErrorKind::QuoteExpected, out.len()));
            };
            match esc {
                b'n' => decoded.push(b'\n'),
                b't' => decoded.push(b'\t'),
                b'\\' => decoded.push(b'\\'),
                b'"' => decoded.push(b'"'),
                b'r' => decoded.push(b'\r'),
                b'0' => {
                    // Octal escape: `\0` plus up to two more octal digits.
                    out.push(b'0');
                    i += 1;
                    let mut value: u32 = 0;
                    let mut digits = 0;
                    while digits < 2 {
                        match bytes.get(i) {
                            Some(&d @ b'0'..=b'7') => {
                                value = value * 8 + u32::from(d - b'0');
                                out.push(d);
                                i += 1;
                                digits += 1;
                            }
                            _ => break,
                        }
                    }
                    if value == 0 {
                        return Err(fault(ErrorKind::NulInString, out.len()));
                    }
                    decoded.push(value as u8);
                    continue;
                }
                // Unknown escapes are dropped from the decoded string but
                // kept in the buffer, matching the load-time filter.
                _ => {}
            }
            out.push(esc);
            i += 1;
        } else {
            decoded.push(c);
            out.push(c);
            i += 1;
        }

        if decoded.len() > STRING_LEN {
            return Err(fault(ErrorKind::OversizeString, out.len()));
        }
    }

    let end = out.len();
    let decoded = String::from_utf8_lossy(&decoded).into_owned();
    strings.push(StrEntry {
        decoded,
        start,
        end,
    });
    Ok(i)
}
