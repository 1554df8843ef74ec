use crate::model::modifiers::is_modifier;
use crate::model::{Diagnostic, Position, Primitive, Range, SmaliType, SourceText, TextToken};

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0B' | '\x0C')
}

fn is_inline_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0B' | '\x0C')
}

/// Forward-only cursor over a document. Every read starts by skipping whitespace and
/// reports exact ranges derived from the document's line index.
#[derive(Debug, Clone, Copy)]
pub struct Scanner<'a> {
    src: &'a SourceText,
    offset: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a SourceText) -> Self {
        Self { src, offset: 0 }
    }

    /// Starts scanning at `position` instead of the top of the file.
    pub fn at(src: &'a SourceText, position: Position) -> Self {
        Self {
            src,
            offset: src.offset_at(position),
        }
    }

    pub fn at_offset(src: &'a SourceText, offset: usize) -> Self {
        Self {
            src,
            offset: offset.min(src.len()),
        }
    }

    pub fn source(&self) -> &'a SourceText {
        self.src
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn move_to(&mut self, offset: usize) {
        self.offset = offset.min(self.src.len());
    }

    pub fn position(&self) -> Position {
        self.src.position_at(self.offset)
    }

    pub fn line(&self) -> usize {
        self.position().line
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.src.len()
    }

    fn rest(&self) -> &'a str {
        &self.src.text()[self.offset..]
    }

    pub fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.offset += c.len_utf8();
        Some(c)
    }

    fn range_from(&self, start: usize) -> Range {
        self.src.range_of(start, self.offset)
    }

    pub fn skip_whitespace(&mut self) {
        let skipped = self
            .rest()
            .find(|c| !is_whitespace(c))
            .unwrap_or(self.rest().len());
        self.offset += skipped;
    }

    /// Skips spaces and tabs but never crosses a line break.
    pub fn skip_inline_whitespace(&mut self) {
        let skipped = self
            .rest()
            .find(|c| !is_inline_whitespace(c))
            .unwrap_or(self.rest().len());
        self.offset += skipped;
    }

    /// Moves just past the next `\n`, or to the end of the text.
    pub fn skip_line(&mut self) {
        match self.rest().find('\n') {
            Some(eol) => self.offset += eol + 1,
            None => self.offset = self.src.len(),
        }
    }

    /// Consumes `literal` if the text continues with it after whitespace. On a miss the
    /// offset is left where it was.
    pub fn expect(&mut self, literal: &str) -> bool {
        let saved = self.offset;
        self.skip_whitespace();
        if self.rest().starts_with(literal) {
            self.offset += literal.len();
            true
        } else {
            self.offset = saved;
            false
        }
    }

    /// Like [`Scanner::expect`] but only looks at the current line.
    pub fn expect_on_line(&mut self, literal: &str) -> bool {
        let saved = self.offset;
        self.skip_inline_whitespace();
        if self.rest().starts_with(literal) {
            self.offset += literal.len();
            true
        } else {
            self.offset = saved;
            false
        }
    }

    /// Reads the next run of non-whitespace characters. Empty at end of text.
    pub fn read_token(&mut self) -> TextToken {
        self.skip_whitespace();
        let start = self.offset;
        let len = self
            .rest()
            .find(is_whitespace)
            .unwrap_or(self.rest().len());
        self.offset += len;
        TextToken::new(&self.src.text()[start..self.offset], self.range_from(start))
    }

    pub fn peek_token(&self) -> TextToken {
        let mut lookahead = *self;
        lookahead.read_token()
    }

    /// Reads up to `separator` on the current line and consumes the separator. The
    /// returned token does not include it.
    pub fn read_token_until(&mut self, separator: char) -> Result<TextToken, Diagnostic> {
        self.skip_whitespace();
        let start = self.offset;
        let rest = self.rest();
        let eol = rest.find('\n').unwrap_or(rest.len());
        match rest[..eol].find(separator) {
            Some(at) => {
                self.offset += at;
                let token = TextToken::new(&rest[..at], self.range_from(start));
                self.offset += separator.len_utf8();
                Ok(token)
            }
            None => {
                let end = self.src.position_at(start + eol);
                Err(Diagnostic::syntax(
                    Range::new(self.src.position_at(start), end),
                    format!("expected '{}' before the end of the line", separator),
                ))
            }
        }
    }

    /// The remainder of the current line, trimmed, without consuming the line break.
    pub fn read_rest_of_line(&mut self) -> TextToken {
        self.skip_inline_whitespace();
        let start = self.offset;
        let rest = self.rest();
        let eol = rest.find('\n').unwrap_or(rest.len());
        let text = rest[..eol].trim_end();
        self.offset += text.len();
        TextToken::new(text, self.range_from(start))
    }

    /// Reads one type descriptor: `[`* followed by a primitive code or `L...;`.
    pub fn read_type(&mut self) -> Result<SmaliType, Diagnostic> {
        self.skip_whitespace();
        let start = self.offset;
        let mut dimensions = 0;
        while self.peek_char() == Some('[') {
            self.bump();
            dimensions += 1;
        }
        let element = self.read_element_type()?;
        if dimensions == 0 {
            return Ok(element);
        }
        Ok(SmaliType::array(element, dimensions, self.range_from(start)))
    }

    fn read_element_type(&mut self) -> Result<SmaliType, Diagnostic> {
        let start = self.offset;
        if let Some(primitive) = self.peek_char().and_then(Primitive::from_code) {
            self.bump();
            return Ok(SmaliType::primitive(primitive, self.range_from(start)));
        }
        match self.peek_char() {
            Some('L') => {
                let rest = self.rest();
                let stop = rest.find(|c: char| c == ';' || is_whitespace(c));
                match stop {
                    Some(at) if rest[at..].starts_with(';') => {
                        let raw = &rest[..=at];
                        self.offset += at + 1;
                        let range = self.range_from(start);
                        SmaliType::reference(raw, range).ok_or_else(|| {
                            Diagnostic::syntax(range, format!("Malformed class descriptor: {}", raw))
                        })
                    }
                    _ => {
                        let end = start + stop.unwrap_or(rest.len());
                        Err(Diagnostic::syntax(
                            self.src.range_of(start, end),
                            "Unterminated class descriptor, expected ';'",
                        ))
                    }
                }
            }
            Some(c) => {
                let range = self.src.range_of(start, start + c.len_utf8());
                Err(Diagnostic::syntax(range, format!("Unknown type identifier: {}", c)))
            }
            None => Err(Diagnostic::syntax(
                self.range_from(start),
                "Expected a type descriptor, found the end of the file",
            )),
        }
    }

    /// Consumes access-flag keywords, stopping before the first token that is not one.
    pub fn read_modifiers(&mut self) -> Vec<String> {
        let mut modifiers = Vec::new();
        loop {
            let saved = self.offset;
            let token = self.read_token();
            if !token.is_empty() && is_modifier(&token.text) {
                modifiers.push(token.text);
            } else {
                self.offset = saved;
                return modifiers;
            }
        }
    }

    /// Reads parameter types after `(` through the closing `)`, within one line.
    pub fn read_parameters(&mut self) -> Result<Vec<SmaliType>, Diagnostic> {
        let mut parameters = Vec::new();
        loop {
            self.skip_inline_whitespace();
            match self.peek_char() {
                Some(')') => {
                    self.bump();
                    return Ok(parameters);
                }
                None | Some('\n') | Some('\r') => {
                    let at = self.position();
                    return Err(Diagnostic::syntax(
                        Range::new(at, at),
                        "Unterminated parameter list, expected ')'",
                    ));
                }
                Some(_) => parameters.push(self.read_type()?),
            }
        }
    }
}
