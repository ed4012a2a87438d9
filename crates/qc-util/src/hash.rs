//! Symbol hashing.
//!
//! The interpreter's symbol and keyword tables all use the same running
//! byte hash: `h = h * 31 + byte`. Keeping it in one place means the
//! tables and their tests agree on the function by construction.

/// Hashes a symbol name.
pub fn symbol_hash(s: &str) -> u64 {
    s.bytes()
        .fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert_eq!(symbol_hash(""), 0);
    }

    #[test]
    fn test_single_byte() {
        assert_eq!(symbol_hash("a"), u64::from(b'a'));
    }

    #[test]
    fn test_multiplier() {
        let h = symbol_hash("ab");
        assert_eq!(h, u64::from(b'a') * 31 + u64::from(b'b'));
    }

    #[test]
    fn test_distinct_names() {
        assert_ne!(symbol_hash("main"), symbol_hash("mian"));
        assert_ne!(symbol_hash("x"), symbol_hash("y"));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(symbol_hash("printf"), symbol_hash("printf"));
    }
}
