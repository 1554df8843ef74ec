//! Point queries: what symbol sits at a given position of a document.
//!
//! Every helper answers `None` when nothing of its kind is under the position; none of
//! them report errors.

use super::patterns::{
    CLASS_DESCRIPTOR, FIELD_REFERENCE, LABEL, METHOD_REFERENCE, STRING_LITERAL, TYPE_OPCODES,
    match_at,
};
use super::{
    Scanner, read_field_definition, read_field_reference, read_method_definition,
    read_method_reference,
};
use crate::model::types::is_identifier_char;
use crate::model::{Field, Method, Position, Range, SmaliType, SourceText, TextToken};

/// `Owner->name:Type` as written in an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReference {
    pub owner: SmaliType,
    /// `range` spans the whole reference text; `modifiers` is always empty.
    pub field: Field,
}

impl FieldReference {
    pub fn key(&self) -> String {
        self.field.reference_key(&self.owner.raw())
    }
}

/// `Owner->name(Params)Return` as written in an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodReference {
    pub owner: SmaliType,
    /// `range` spans the whole reference text; `modifiers` is always empty.
    pub method: Method,
}

impl MethodReference {
    pub fn key(&self) -> String {
        self.method.reference_key(&self.owner.raw())
    }
}

/// A `:label` together with every use of it inside the enclosing method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSpot {
    pub name: TextToken,
    /// The line that declares the label, when it exists in the method.
    pub definition: Option<Range>,
    /// Every occurrence in the method, including the declaration.
    pub occurrences: Vec<Range>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Spot {
    String(TextToken),
    Type(SmaliType),
    FieldReference(FieldReference),
    MethodReference(MethodReference),
    Label(LabelSpot),
    FieldDefinition(Field),
    MethodDefinition(Method),
}

impl Spot {
    pub fn range(&self) -> Range {
        match self {
            Spot::String(token) => token.range,
            Spot::Type(ty) => ty.range(),
            Spot::FieldReference(reference) => reference.field.range,
            Spot::MethodReference(reference) => reference.method.range,
            Spot::Label(label) => label.name.range,
            Spot::FieldDefinition(field) => field.name.range,
            Spot::MethodDefinition(method) => method.name.range,
        }
    }
}

/// The most specific spot under `position`, tried from the narrowest kind outwards.
pub fn spot_at(src: &SourceText, position: Position) -> Option<Spot> {
    if let Some(token) = string_at(src, position) {
        return Some(Spot::String(token));
    }
    if let Some(ty) = type_at(src, position) {
        return Some(Spot::Type(ty));
    }
    if let Some(reference) = field_reference_at(src, position) {
        return Some(Spot::FieldReference(reference));
    }
    if let Some(reference) = method_reference_at(src, position) {
        return Some(Spot::MethodReference(reference));
    }
    if let Some(label) = label_at(src, position) {
        return Some(Spot::Label(label));
    }
    if let Some(field) = field_definition_at(src, position) {
        return Some(Spot::FieldDefinition(field));
    }
    method_definition_at(src, position).map(Spot::MethodDefinition)
}

pub fn string_at(src: &SourceText, position: Position) -> Option<TextToken> {
    let line = src.line_text(position.line);
    let m = match_at(&STRING_LITERAL, line, position.col)?;
    Some(TextToken::new(
        m.as_str(),
        Range::new(
            Position::new(position.line, m.start()),
            Position::new(position.line, m.end()),
        ),
    ))
}

fn covers(range: Range, position: Position) -> bool {
    range.start() <= position && position < range.end()
}

/// A class descriptor anywhere on the line, or a primitive/array type in a
/// signature or type operand.
pub fn type_at(src: &SourceText, position: Position) -> Option<SmaliType> {
    let line = src.line_text(position.line);
    if let Some(m) = match_at(&CLASS_DESCRIPTOR, line, position.col) {
        let mut scanner = Scanner::at(src, Position::new(position.line, m.start()));
        if let Ok(ty) = scanner.read_type() {
            return Some(ty);
        }
    }
    signature_types(src, position.line)
        .into_iter()
        .find(|ty| covers(ty.range(), position))
}

/// Every type written on `line` that belongs to a declaration, a member reference or
/// a type operand.
fn signature_types(src: &SourceText, line: usize) -> Vec<SmaliType> {
    let start = Position::new(line, 0);
    let mut types = Vec::new();
    if let Some(field) = field_definition_at(src, start) {
        types.push(field.ty);
    } else if let Some(method) = method_definition_at(src, start) {
        types.extend(method.parameters);
        types.push(method.return_type);
    }

    let text = src.line_text(line);
    for m in FIELD_REFERENCE.find_iter(text) {
        let mut scanner = Scanner::at(src, Position::new(line, m.start()));
        if let Ok(reference) = read_field_reference(&mut scanner) {
            types.push(reference.owner);
            types.push(reference.field.ty);
        }
    }
    for m in METHOD_REFERENCE.find_iter(text) {
        let mut scanner = Scanner::at(src, Position::new(line, m.start()));
        if let Ok(reference) = read_method_reference(&mut scanner) {
            types.push(reference.owner);
            types.extend(reference.method.parameters);
            types.push(reference.method.return_type);
        }
    }

    let trimmed = text.trim_start();
    let is_type_opcode = TYPE_OPCODES
        .iter()
        .any(|op| trimmed.split_whitespace().next() == Some(*op));
    if is_type_opcode {
        if let Some(at) = text.rfind(',') {
            let mut scanner = Scanner::at(src, Position::new(line, at + 1));
            if let Ok(ty) = scanner.read_type() {
                types.push(ty);
            }
        }
    }
    types
}

fn line_starts_with(src: &SourceText, line: usize, keyword: &str) -> bool {
    src.line_text(line)
        .trim_start()
        .split_whitespace()
        .next()
        == Some(keyword)
}

/// The `.field` declaration on the line of `position`.
pub fn field_definition_at(src: &SourceText, position: Position) -> Option<Field> {
    if !line_starts_with(src, position.line, ".field") {
        return None;
    }
    let mut scanner = Scanner::at(src, Position::new(position.line, 0));
    scanner.expect(".field");
    read_field_definition(&mut scanner).ok()
}

/// The `.method` declaration on the line of `position`. `body_range` is not computed.
pub fn method_definition_at(src: &SourceText, position: Position) -> Option<Method> {
    if !line_starts_with(src, position.line, ".method") {
        return None;
    }
    let mut scanner = Scanner::at(src, Position::new(position.line, 0));
    scanner.expect(".method");
    read_method_definition(&mut scanner).ok()
}

pub fn field_reference_at(src: &SourceText, position: Position) -> Option<FieldReference> {
    let line = src.line_text(position.line);
    let m = match_at(&FIELD_REFERENCE, line, position.col)?;
    let mut scanner = Scanner::at(src, Position::new(position.line, m.start()));
    read_field_reference(&mut scanner).ok()
}

pub fn method_reference_at(src: &SourceText, position: Position) -> Option<MethodReference> {
    let line = src.line_text(position.line);
    let m = match_at(&METHOD_REFERENCE, line, position.col)?;
    let mut scanner = Scanner::at(src, Position::new(position.line, m.start()));
    read_method_reference(&mut scanner).ok()
}

/// Label tokens on `text`, skipping `:` separators that follow an identifier such as
/// the one in `name:Type`.
fn labels_on_line(text: &str) -> impl Iterator<Item = regex::Match<'_>> {
    LABEL.find_iter(text).filter(move |m| {
        !text[..m.start()]
            .chars()
            .next_back()
            .is_some_and(|c| is_identifier_char(c) || c == ';')
    })
}

/// The enclosing `.method` and `.end method` lines of `line`.
fn enclosing_method(src: &SourceText, line: usize) -> Option<(usize, usize)> {
    let mut start = None;
    for candidate in (0..=line).rev() {
        if line_starts_with(src, candidate, ".method") {
            start = Some(candidate);
            break;
        }
        if candidate != line && src.line_text(candidate).trim() == ".end method" {
            return None;
        }
    }
    let start = start?;
    let end = (line..src.lines().line_count())
        .find(|candidate| src.line_text(*candidate).trim() == ".end method")?;
    Some((start, end))
}

pub fn label_at(src: &SourceText, position: Position) -> Option<LabelSpot> {
    let text = src.line_text(position.line);
    let m = labels_on_line(text).find(|m| m.start() <= position.col && position.col < m.end())?;
    let (start, end) = enclosing_method(src, position.line)?;

    let mut definition = None;
    let mut occurrences = Vec::new();
    for line in start..=end {
        let text = src.line_text(line);
        for other in labels_on_line(text).filter(|other| other.as_str() == m.as_str()) {
            let range = Range::new(
                Position::new(line, other.start()),
                Position::new(line, other.end()),
            );
            let indent = text.len() - text.trim_start().len();
            let declared = other.start() == indent
                && text.trim_start().split_whitespace().next() == Some(m.as_str());
            if declared && definition.is_none() {
                definition = Some(range);
            }
            occurrences.push(range);
        }
    }

    Some(LabelSpot {
        name: TextToken::new(
            m.as_str(),
            Range::new(
                Position::new(position.line, m.start()),
                Position::new(position.line, m.end()),
            ),
        ),
        definition,
        occurrences,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = "\
.class public Lcom/example/Foo;
.super Ljava/lang/Object;
.field private count:I
.field public static NAME:Ljava/lang/String; = \"foo\"
.method public bar(I[J)Lcom/example/Baz;
    .registers 4
    if-eqz p1, :cond_0
    iget v0, p0, Lcom/example/Foo;->count:I
    invoke-virtual {p0, v0}, Lcom/example/Foo;->bar(I[J)Lcom/example/Baz;
    const-string v1, \"a:b\"
    new-array v2, v0, [I
    :cond_0
    return-object v3
.end method
";

    fn src() -> SourceText {
        SourceText::new(SRC)
    }

    #[test]
    fn class_descriptor_in_header() {
        let spot = spot_at(&src(), Position::new(0, 16)).unwrap();
        match spot {
            Spot::Type(ty) => {
                assert_eq!(ty.raw(), "Lcom/example/Foo;");
                assert_eq!(ty.range(), Range::new(Position::new(0, 14), Position::new(0, 31)));
            }
            other => panic!("unexpected spot {:?}", other),
        }
    }

    #[test]
    fn primitive_in_signature_is_a_type() {
        // `I` in `bar(I[J)`
        let ty = type_at(&src(), Position::new(4, 19)).unwrap();
        assert_eq!(ty.raw(), "I");
        let ty = type_at(&src(), Position::new(4, 21)).unwrap();
        assert_eq!(ty.raw(), "[J");
        // `I` in `new-array v2, v0, [I`
        let ty = type_at(&src(), Position::new(10, 23)).unwrap();
        assert_eq!(ty.raw(), "[I");
        // `I` inside an opcode name is not a type
        assert!(type_at(&src(), Position::new(8, 12)).is_none());
    }

    #[test]
    fn field_reference_on_member_name() {
        // `count` in the iget line
        let spot = spot_at(&src(), Position::new(7, 37)).unwrap();
        match spot {
            Spot::FieldReference(reference) => {
                assert_eq!(reference.owner.raw(), "Lcom/example/Foo;");
                assert_eq!(reference.field.name.text, "count");
                assert_eq!(reference.key(), "Lcom/example/Foo;->count:I");
                assert_eq!(
                    reference.field.range,
                    Range::new(Position::new(7, 17), Position::new(7, 43))
                );
            }
            other => panic!("unexpected spot {:?}", other),
        }
    }

    #[test]
    fn method_reference_on_member_name() {
        let line = SRC.lines().nth(8).unwrap();
        let col = line.find("->bar").unwrap() + 3;
        let reference = method_reference_at(&src(), Position::new(8, col)).unwrap();
        assert_eq!(reference.key(), "Lcom/example/Foo;->bar(I[J)Lcom/example/Baz;");
        assert_eq!(reference.method.parameters.len(), 2);
    }

    #[test]
    fn definitions_on_declaration_lines() {
        let field = field_definition_at(&src(), Position::new(3, 22)).unwrap();
        assert_eq!(field.name.text, "NAME");
        assert_eq!(field.initial.map(|t| t.text), Some("\"foo\"".to_string()));
        match spot_at(&src(), Position::new(4, 16)) {
            Some(Spot::MethodDefinition(method)) => assert_eq!(method.name.text, "bar"),
            other => panic!("unexpected spot {:?}", other),
        }
        assert!(field_definition_at(&src(), Position::new(5, 6)).is_none());
    }

    #[test]
    fn string_literal_wins_over_labels() {
        let spot = spot_at(&src(), Position::new(9, 24)).unwrap();
        let expected = TextToken::new(
            "\"a:b\"",
            Range::new(Position::new(9, 21), Position::new(9, 26)),
        );
        assert_eq!(spot, Spot::String(expected));
    }

    #[test]
    fn label_lists_uses_inside_method() {
        let label = label_at(&src(), Position::new(6, 17)).unwrap();
        assert_eq!(label.name.text, ":cond_0");
        assert_eq!(
            label.definition,
            Some(Range::new(Position::new(11, 4), Position::new(11, 11)))
        );
        assert_eq!(label.occurrences.len(), 2);
        // the `:I` of a field signature is not a label
        assert!(label_at(&src(), Position::new(2, 21)).is_none());
    }

    #[test]
    fn nothing_on_blank_positions() {
        assert!(spot_at(&src(), Position::new(5, 0)).is_none());
        assert!(spot_at(&src(), Position::new(100, 0)).is_none());
    }
}
