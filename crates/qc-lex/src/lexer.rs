//! The scanner.
//!
//! [`scan`] reads one token from a loaded program buffer at a byte offset
//! and reports both where the token began and where the next scan should
//! start. The caller owns the cursor: restoring it to [`Scan::start`] is
//! the single-step putback the evaluator relies on, and saving the pair of
//! offsets is all a full program-state snapshot needs.
//!
//! String literals were interned at load time, so the scanner only has to
//! find the matching intern entry and jump the cursor to its recorded end.

use std::sync::LazyLock;

use rustc_hash::FxHashMap;

use qc_util::{ErrorKind, QcError};

use crate::chars::{is_delim, single_char_token};
use crate::source::StrEntry;
use crate::token::{id, Token};

/// Where the text of a token lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenText {
    /// The token has no interesting text (operators, keywords).
    None,
    /// Byte range of the token in the program buffer.
    Span(std::ops::Range<usize>),
    /// Index of an interned string literal.
    Interned(usize),
}

/// One scanned token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    pub tok: Token,
    pub text: TokenText,
    /// Offset the token started at; restoring the cursor here un-reads it.
    pub start: usize,
    /// Offset the next scan should start from.
    pub pos: usize,
}

/// The built-in keyword table, hashed once on first use.
static KEYWORDS: LazyLock<FxHashMap<&'static str, Token>> = LazyLock::new(|| {
    let mut m = FxHashMap::default();
    m.insert("if", Token::of(id::IF));
    m.insert("else", Token::of(id::ELSE));
    m.insert("for", Token::of(id::FOR));
    m.insert("do", Token::of(id::DO));
    m.insert("while", Token::of(id::WHILE));
    m.insert("return", Token::of(id::RETURN));
    m.insert("break", Token::of(id::BREAK));
    m.insert("NULL", Token::of(id::NULL));
    m.insert("char", Token::of(id::CHAR).with(Token::TYPE));
    m.insert("int", Token::of(id::INT).with(Token::TYPE));
    m.insert("FILE", Token::of(id::FILE).with(Token::TYPE));
    // Hardware-era aliases for FILE handles, kept for old scripts.
    m.insert("V120_HANDLE", Token::of(id::FILE).with(Token::TYPE));
    m.insert("Vme", Token::of(id::FILE).with(Token::TYPE));
    m.insert("float", Token::of(id::FLT).with(Token::TYPE | Token::FLT));
    m.insert("double", Token::of(id::DBL).with(Token::TYPE | Token::FLT));
    m.insert("unsigned", Token::of(id::INT).with(Token::TYPE | Token::UNSIGNED));
    m.insert("static", Token::of(id::INT).with(Token::TYPE | Token::STATIC));
    m.insert("void", Token::of(id::VOID).with(Token::TYPE | Token::VOID));
    m
});

/// Looks a token string up in the keyword table.
pub fn keyword(s: &str) -> Option<Token> {
    KEYWORDS.get(s).copied()
}

/// Scans one token from `src` starting at byte offset `from`.
///
/// `strings` is the program's intern table; a `"` in the buffer must match
/// an entry, otherwise the buffer and table disagree and the scan fails
/// with `FATAL`.
pub fn scan(src: &str, strings: &[StrEntry], from: usize) -> Result<Scan, QcError> {
    let bytes = src.as_bytes();
    let mut i = from.min(bytes.len());

    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\n' | b'\r') {
        i += 1;
    }
    let start = i;

    if i >= bytes.len() || bytes[i] == 0 {
        return Ok(Scan {
            tok: Token::of(id::FINISHED),
            text: TokenText::None,
            start,
            pos: i,
        });
    }

    let c = bytes[i];

    if c == b'"' {
        let Some(idx) = strings.iter().position(|e| e.start == i + 1) else {
            return Err(QcError {
                kind: ErrorKind::Fatal,
                ns: None,
                offset: Some(i),
            });
        };
        return Ok(Scan {
            tok: Token::of(id::STRING).with(Token::PTR),
            text: TokenText::Interned(idx),
            start,
            pos: strings[idx].end,
        });
    }

    if is_delim(c) {
        i += 1;
        let next = bytes.get(i).copied().unwrap_or(0);
        let two = |i: usize, t: u16| {
            Ok(Scan {
                tok: Token::of(t),
                text: TokenText::None,
                start,
                pos: i,
            })
        };
        match (c, next) {
            (b'=', b'=') => return two(i + 1, id::EQ),
            (b'!', b'=') => return two(i + 1, id::NE),
            (b'<', b'<') => {
                if bytes.get(i + 1) == Some(&b'=') {
                    return two(i + 2, id::SHLEQ);
                }
                return two(i + 1, id::SHL);
            }
            (b'<', b'=') => return two(i + 1, id::LE),
            (b'>', b'>') => {
                if bytes.get(i + 1) == Some(&b'=') {
                    return two(i + 2, id::SHREQ);
                }
                return two(i + 1, id::SHR);
            }
            (b'>', b'=') => return two(i + 1, id::GE),
            (b'&', b'&') => return two(i + 1, id::LAND),
            (b'&', b'=') => return two(i + 1, id::ANDEQ),
            (b'|', b'|') => return two(i + 1, id::LOR),
            (b'|', b'=') => return two(i + 1, id::OREQ),
            (b'+', b'=') => return two(i + 1, id::PLUSEQ),
            (b'+', b'+') => return two(i + 1, id::INC),
            (b'-', b'=') => return two(i + 1, id::MINUSEQ),
            (b'-', b'-') => return two(i + 1, id::DEC),
            (b'*', b'=') => return two(i + 1, id::MULEQ),
            (b'/', b'=') => return two(i + 1, id::DIVEQ),
            (b'%', b'=') => return two(i + 1, id::MODEQ),
            (b'^', b'=') => return two(i + 1, id::XOREQ),
            _ => {}
        }
        let Some(tok) = single_char_token(c) else {
            return Err(QcError {
                kind: ErrorKind::Syntax,
                ns: None,
                offset: Some(start),
            });
        };
        return Ok(Scan {
            tok,
            text: TokenText::None,
            start,
            pos: i,
        });
    }

    if c.is_ascii_digit() {
        let mut j = i;
        while j < bytes.len() && !is_delim(bytes[j]) {
            j += 1;
        }
        return Ok(Scan {
            tok: Token::of(id::NUMBER),
            text: TokenText::Span(i..j),
            start,
            pos: j,
        });
    }

    if c.is_ascii_alphabetic() || c == b'_' {
        let mut j = i;
        while j < bytes.len() && !is_delim(bytes[j]) {
            j += 1;
        }
        let word = &src[i..j];
        if let Some(tok) = keyword(word) {
            return Ok(Scan {
                tok,
                text: TokenText::None,
                start,
                pos: j,
            });
        }
        return Ok(Scan {
            tok: Token::of(id::IDENTIFIER),
            text: TokenText::Span(i..j),
            start,
            pos: j,
        });
    }

    Err(QcError {
        kind: ErrorKind::Syntax,
        ns: None,
        offset: Some(start),
    })
}
