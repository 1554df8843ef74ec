use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Zero-based line/column position. Columns are byte offsets within the line.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }

    /// Same line, `cols` bytes further to the right.
    pub fn translate(self, cols: usize) -> Self {
        Self {
            line: self.line,
            col: self.col + cols,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Range {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self {
            start_line: start.line,
            start_col: start.col,
            end_line: end.line,
            end_col: end.col,
        }
    }

    pub fn start(&self) -> Position {
        Position::new(self.start_line, self.start_col)
    }

    pub fn end(&self) -> Position {
        Position::new(self.end_line, self.end_col)
    }

    /// Inclusive on both ends, so a cursor placed right after a token still hits it.
    pub fn contains(&self, line: usize, col: usize) -> bool {
        if line < self.start_line || line > self.end_line {
            return false;
        }
        if line == self.start_line && col < self.start_col {
            return false;
        }
        if line == self.end_line && col > self.end_col {
            return false;
        }
        true
    }

    pub fn is_single_line(&self) -> bool {
        self.start_line == self.end_line
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line + 1,
            self.start_col + 1,
            self.end_line + 1,
            self.end_col + 1
        )
    }
}

/// A piece of source text together with the exact range it was read from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextToken {
    pub text: String,
    pub range: Range,
}

impl TextToken {
    pub fn new(text: impl Into<String>, range: Range) -> Self {
        Self {
            text: text.into(),
            range,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }
}

/// Byte offsets of every line start, used to map offsets to positions and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            line_starts,
            len: text.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        Position::new(line, offset - self.line_starts[line])
    }

    /// Clamps to the end of the line (or of the text) instead of failing.
    pub fn offset_at(&self, position: Position) -> usize {
        let Some(&start) = self.line_starts.get(position.line) else {
            return self.len;
        };
        (start + position.col).min(self.line_end(position.line))
    }

    pub fn line_start(&self, line: usize) -> usize {
        self.line_starts.get(line).copied().unwrap_or(self.len)
    }

    /// Offset of the end of the line content, excluding `\n` and a preceding `\r`.
    pub fn line_end(&self, line: usize) -> usize {
        match self.line_starts.get(line + 1) {
            Some(&next) => next - 1,
            None => self.len,
        }
    }
}

/// Immutable document text plus its line index, shared between parsed classes and queries.
#[derive(Debug)]
pub struct SourceText {
    text: Arc<str>,
    lines: LineIndex,
}

impl SourceText {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let lines = LineIndex::new(&text);
        Self { text, lines }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn shared_text(&self) -> Arc<str> {
        self.text.clone()
    }

    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn position_at(&self, offset: usize) -> Position {
        self.lines.position_at(offset)
    }

    pub fn offset_at(&self, position: Position) -> usize {
        self.lines.offset_at(position)
    }

    /// Line content without the line terminator.
    pub fn line_text(&self, line: usize) -> &str {
        if line >= self.lines.line_count() {
            return "";
        }
        let start = self.lines.line_start(line);
        let end = self.lines.line_end(line);
        self.text[start..end].trim_end_matches('\r')
    }

    pub fn line_range(&self, line: usize) -> Range {
        Range::new(
            Position::new(line, 0),
            Position::new(line, self.line_text(line).len()),
        )
    }

    pub fn range_of(&self, start: usize, end: usize) -> Range {
        Range::new(self.position_at(start), self.position_at(end))
    }

    pub fn slice(&self, range: &Range) -> &str {
        let start = self.offset_at(range.start());
        let end = self.offset_at(range.end()).max(start);
        self.text.get(start..end).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_round_trips_through_offsets() {
        let src = SourceText::new(".class A\n.super B\r\n\nlast");
        assert_eq!(src.position_at(0), Position::new(0, 0));
        assert_eq!(src.position_at(9), Position::new(1, 0));
        assert_eq!(src.position_at(src.len()), Position::new(3, 4));
        assert_eq!(src.offset_at(Position::new(1, 3)), 12);
        assert_eq!(src.line_text(1), ".super B");
        assert_eq!(src.line_text(2), "");
        assert_eq!(src.line_text(9), "");
    }

    #[test]
    fn offset_at_clamps_to_line_end() {
        let src = SourceText::new("ab\ncd");
        assert_eq!(src.offset_at(Position::new(0, 40)), 2);
        assert_eq!(src.offset_at(Position::new(5, 0)), 5);
    }

    #[test]
    fn range_contains_is_inclusive() {
        let range = Range::new(Position::new(2, 4), Position::new(2, 8));
        assert!(range.contains(2, 4));
        assert!(range.contains(2, 8));
        assert!(!range.contains(2, 9));
        assert!(!range.contains(1, 5));
    }
}
