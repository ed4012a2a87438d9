//! Property tests for the scanner's putback contract.

use proptest::prelude::*;

use qc_lex::source::load_program;
use qc_lex::token::id;
use qc_lex::{scan, Scan};

const OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "%", "==", "!=", "<=", ">=", "<<", ">>", "&&", "||", "+=", "(", ")", "{",
    "}", ";", ",",
];

/// One lexeme of a generated program.
fn lexeme() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z_][a-z0-9_]{0,6}".prop_map(|s| s),
        (0u32..100_000).prop_map(|n| n.to_string()),
        Just("if".to_string()),
        Just("while".to_string()),
        Just("int".to_string()),
        Just("return".to_string()),
        proptest::sample::select(OPERATORS).prop_map(str::to_string),
    ]
}

fn scan_all(text: &str, strings: &[qc_lex::StrEntry]) -> Vec<Scan> {
    let mut out = Vec::new();
    let mut pos = 0;
    loop {
        let s = scan(text, strings, pos).expect("generated program must lex");
        pos = s.pos;
        let done = s.tok.id() == id::FINISHED;
        out.push(s);
        if done {
            break;
        }
    }
    out
}

proptest! {
    /// After any scan, re-scanning from the token's start offset (the
    /// putback position) yields the identical token.
    #[test]
    fn putback_then_rescan_is_identity(parts in prop::collection::vec(lexeme(), 0..40)) {
        let src = parts.join(" ");
        let prog = load_program(&src).unwrap();
        for s in scan_all(&prog.text, &prog.strings) {
            let again = scan(&prog.text, &prog.strings, s.start).unwrap();
            prop_assert_eq!(s, again);
        }
    }

    /// Scanning is deterministic: two passes over the same program yield
    /// the same token stream.
    #[test]
    fn scanning_is_deterministic(parts in prop::collection::vec(lexeme(), 0..40)) {
        let src = parts.join(" ");
        let prog = load_program(&src).unwrap();
        let a = scan_all(&prog.text, &prog.strings);
        let b = scan_all(&prog.text, &prog.strings);
        prop_assert_eq!(a, b);
    }

    /// Whitespace between tokens never changes the token stream.
    #[test]
    fn whitespace_is_insignificant(parts in prop::collection::vec(lexeme(), 0..25)) {
        let tight = parts.join(" ");
        let loose = parts.join("  \n ");
        let pt = load_program(&tight).unwrap();
        let pl = load_program(&loose).unwrap();
        let ta: Vec<_> = scan_all(&pt.text, &pt.strings)
            .into_iter()
            .map(|s| s.tok)
            .collect();
        let tb: Vec<_> = scan_all(&pl.text, &pl.strings)
            .into_iter()
            .map(|s| s.tok)
            .collect();
        prop_assert_eq!(ta, tb);
    }
}
