//! Byte spans into filter source text.

use std::ops::Range;

/// Byte range `start..end` of a token or operand in a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span containing both `self` and `other`.
    pub fn cover(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 1-based line and column of the span start. Columns count characters,
    /// not bytes.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        let mut line = 1;
        let mut line_start = 0;
        for (i, c) in source.char_indices().take_while(|(i, _)| *i < self.start) {
            if c == '\n' {
                line += 1;
                line_start = i + 1;
            }
        }
        let column = source[line_start..]
            .char_indices()
            .take_while(|(i, _)| line_start + i < self.start)
            .count();
        (line, column + 1)
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// An operand or token together with where it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self { value, span }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover() {
        let covered = Span::new(12, 20).cover(Span::new(4, 9));
        assert_eq!(covered, Span::new(4, 20));
        assert_eq!(covered.len(), 16);
        assert!(Span::new(3, 3).is_empty());
    }

    #[test]
    fn test_line_col() {
        let source = "title = 'a'\n&& rel.name != ''";
        assert_eq!(Span::new(0, 1).line_col(source), (1, 1));
        assert_eq!(Span::new(8, 11).line_col(source), (1, 9));
        assert_eq!(Span::new(12, 14).line_col(source), (2, 1));
        assert_eq!(Span::new(15, 23).line_col(source), (2, 4));
    }

    #[test]
    fn test_line_col_counts_chars() {
        assert_eq!(Span::new(10, 11).line_col("name = 'é' &&"), (1, 10));
    }
}
