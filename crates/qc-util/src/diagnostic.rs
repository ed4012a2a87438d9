//! Diagnostic rendering.
//!
//! A [`Diagnostic`] pairs an error with its location in the program buffer
//! and renders the way the interpreter reports failures: the stable code
//! name, the message, a 1-based line number, and a short excerpt of the
//! source around the failure point.

use std::fmt;

use crate::error::QcError;

/// Maximum number of bytes of source shown after the excerpt start.
const EXCERPT_LEN: usize = 30;

/// How far back from the error offset the excerpt may begin.
const EXCERPT_BACK: usize = 20;

/// Returns the 1-based line number of `offset` within `src`.
///
/// Counts newlines from the start of the buffer, the same way the
/// interpreter's error reporter locates a failure.
pub fn line_of(src: &str, offset: usize) -> u32 {
    let end = offset.min(src.len());
    1 + src.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() as u32
}

/// Returns up to [`EXCERPT_LEN`] bytes of source surrounding `offset`.
///
/// The excerpt starts at most [`EXCERPT_BACK`] bytes before the offset,
/// never crossing the preceding newline.
pub fn excerpt(src: &str, offset: usize) -> &str {
    let bytes = src.as_bytes();
    let at = offset.min(bytes.len());

    let mut start = at;
    while start > 0 && at - (start - 1) <= EXCERPT_BACK && bytes[start - 1] != b'\n' {
        start -= 1;
    }

    let mut end = (start + EXCERPT_LEN).min(bytes.len());
    if let Some(nl) = bytes[start..end].iter().position(|&b| b == b'\n') {
        end = start + nl;
    }

    // The program buffer is ASCII by construction, but stay on char
    // boundaries in case it is not.
    while start > 0 && !src.is_char_boundary(start) {
        start -= 1;
    }
    while end < src.len() && !src.is_char_boundary(end) {
        end += 1;
    }
    &src[start..end]
}

/// A rendered interpreter diagnostic.
pub struct Diagnostic<'a> {
    error: &'a QcError,
    source: Option<&'a str>,
}

impl<'a> Diagnostic<'a> {
    /// Builds a diagnostic for `error`, with `source` being the program
    /// buffer its offset refers to (when known).
    pub fn new(error: &'a QcError, source: Option<&'a str>) -> Self {
        Self { error, source }
    }
}

impl fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error[{}]: {}", self.error.kind.name(), self.error.kind)?;
        if let (Some(src), Some(offset)) = (self.source, self.error.offset) {
            writeln!(f, ", near line {}:", line_of(src, offset))?;
            write!(f, "  {}", excerpt(src, offset).trim_end())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, QcError};

    #[test]
    fn test_line_of() {
        let src = "int x;\nint y;\nint main(void)\n";
        assert_eq!(line_of(src, 0), 1);
        assert_eq!(line_of(src, 5), 1);
        assert_eq!(line_of(src, 7), 2);
        assert_eq!(line_of(src, 14), 3);
        assert_eq!(line_of(src, src.len()), 4);
    }

    #[test]
    fn test_line_of_offset_past_end() {
        assert_eq!(line_of("a\nb", 1000), 2);
    }

    #[test]
    fn test_excerpt_stays_on_line() {
        let src = "first line\nsecond line here\nthird";
        let e = excerpt(src, 18);
        assert!(!e.contains('\n'));
        assert!(e.contains("second"));
    }

    #[test]
    fn test_excerpt_backs_up_limited() {
        let src = "x".repeat(100);
        let e = excerpt(&src, 60);
        assert!(e.len() <= EXCERPT_LEN);
    }

    #[test]
    fn test_render_with_source() {
        let err = QcError::at(ErrorKind::ArrayBounds, 0, 22);
        let src = "int main(void)\n{\nreturn a[5];\n}\n";
        let text = Diagnostic::new(&err, Some(src)).to_string();
        assert!(text.contains("ARRAY_BOUNDS"));
        assert!(text.contains("array out of bounds"));
        assert!(text.contains("near line 3"));
        assert!(text.contains("return a[5];"));
    }

    #[test]
    fn test_render_without_source() {
        let err = QcError::new(ErrorKind::NoFile);
        let text = Diagnostic::new(&err, None).to_string();
        assert_eq!(text, "error[NOFILE]: cannot open file");
    }
}
