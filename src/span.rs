//! Source locations attached to every token and AST node.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open source range, line/column based (1-indexed), tracked through
/// lexing and parsing. Spans never mutate once a token or node has been produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub file: String,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(file: impl Into<String>, start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Span {
            file: file.into(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// A zero-width span at a single position, used for synthesized nodes.
    pub fn point(file: impl Into<String>, line: u32, col: u32) -> Self {
        Span::new(file, line, col, line, col)
    }

    /// Smallest span covering both inputs. Assumes both spans share `file`.
    pub fn cover(&self, other: &Span) -> Span {
        let (start_line, start_col) = if (self.start_line, self.start_col) <= (other.start_line, other.start_col) {
            (self.start_line, self.start_col)
        } else {
            (other.start_line, other.start_col)
        };
        let (end_line, end_col) = if (self.end_line, self.end_col) >= (other.end_line, other.end_col) {
            (self.end_line, self.end_col)
        } else {
            (other.end_line, other.end_col)
        };
        Span {
            file: self.file.clone(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.file, self.start_line, self.start_col
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_grows_to_contain_both_spans() {
        let a = Span::new("x.a0", 1, 1, 1, 5);
        let b = Span::new("x.a0", 2, 3, 2, 9);
        let c = a.cover(&b);
        assert_eq!(c.start_line, 1);
        assert_eq!(c.start_col, 1);
        assert_eq!(c.end_line, 2);
        assert_eq!(c.end_col, 9);
    }

    #[test]
    fn display_shows_start_position() {
        let s = Span::new("prog.a0", 4, 2, 4, 10);
        assert_eq!(s.to_string(), "prog.a0:4:2");
    }
}
