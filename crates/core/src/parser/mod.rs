//! Structural parser for smali class files.
//!
//! [`parse_class`] reads a whole file in one forward pass. The point-query helpers in
//! [`spot`] reuse the same [`Scanner`] primitives but start scanning at the queried
//! line instead of the top of the file.

pub mod patterns;
pub mod scanner;
pub mod spot;

pub use scanner::Scanner;
pub use spot::{FieldReference, LabelSpot, MethodReference, Spot};

use crate::model::{Class, Diagnostic, Field, Method, Position, Range, SmaliType, SourceText, TextToken};
use patterns::{FIELD_OPCODES, FIELD_REFERENCE, INVOKE_OPCODE, METHOD_REFERENCE, TYPE_OPCODES};
use std::collections::BTreeMap;
use std::sync::Arc;

type ParseResult<T> = std::result::Result<T, Diagnostic>;

/// Parses one smali file into a [`Class`].
///
/// Any structural problem aborts the whole file; no partially filled class is
/// returned.
pub fn parse_class(source: Arc<SourceText>) -> ParseResult<Class> {
    let mut parser = ClassParser::new(&source);
    parser.read_header()?;
    parser.read_body()?;
    Ok(parser.builder.finish(source.clone()))
}

/// Convenience wrapper over [`parse_class`] for plain text.
pub fn parse_text(text: &str) -> ParseResult<Class> {
    parse_class(Arc::new(SourceText::new(text)))
}

/// Reads only the `.class` line and returns the declared class name.
pub fn class_name_of(source: &SourceText) -> Option<SmaliType> {
    let mut scanner = Scanner::new(source);
    if !scanner.expect(".class") {
        return None;
    }
    scanner.read_modifiers();
    scanner.read_type().ok().filter(SmaliType::is_reference)
}

/// Reads the signature that follows a `.field` keyword.
pub(crate) fn read_field_definition(scanner: &mut Scanner<'_>) -> ParseResult<Field> {
    let range = scanner.source().line_range(scanner.line());
    let modifiers = scanner.read_modifiers();
    let name = scanner.read_token_until(':')?;
    let ty = scanner.read_type()?;
    let initial = if scanner.expect_on_line("=") {
        Some(scanner.read_rest_of_line()).filter(|token| !token.is_empty())
    } else {
        None
    };
    Ok(Field {
        range,
        modifiers,
        name,
        ty,
        initial,
    })
}

/// Reads the signature that follows a `.method` keyword.
pub(crate) fn read_method_definition(scanner: &mut Scanner<'_>) -> ParseResult<Method> {
    let range = scanner.source().line_range(scanner.line());
    let modifiers = scanner.read_modifiers();
    let name = scanner.read_token_until('(')?;
    let parameters = scanner.read_parameters()?;
    let return_type = scanner.read_type()?;
    Ok(Method {
        range,
        body_range: None,
        modifiers,
        name,
        parameters,
        return_type,
    })
}

/// Reads `Owner->name:Type` starting at the owner descriptor.
pub(crate) fn read_field_reference(scanner: &mut Scanner<'_>) -> ParseResult<FieldReference> {
    let start = scanner.position();
    let owner = read_owner(scanner)?;
    let name = scanner.read_token_until(':')?;
    let ty = scanner.read_type()?;
    let range = Range::new(start, scanner.position());
    Ok(FieldReference {
        owner,
        field: Field {
            range,
            modifiers: Vec::new(),
            name,
            ty,
            initial: None,
        },
    })
}

/// Reads `Owner->name(Params)Return` starting at the owner descriptor.
pub(crate) fn read_method_reference(scanner: &mut Scanner<'_>) -> ParseResult<MethodReference> {
    let start = scanner.position();
    let owner = read_owner(scanner)?;
    let name = scanner.read_token_until('(')?;
    let parameters = scanner.read_parameters()?;
    let return_type = scanner.read_type()?;
    let range = Range::new(start, scanner.position());
    Ok(MethodReference {
        owner,
        method: Method {
            range,
            body_range: None,
            modifiers: Vec::new(),
            name,
            parameters,
            return_type,
        },
    })
}

fn read_owner(scanner: &mut Scanner<'_>) -> ParseResult<SmaliType> {
    let owner = scanner.read_type()?;
    if owner.class_identifier().is_none() {
        return Err(Diagnostic::internal(
            owner.range(),
            format!("member owner {} is not a class", owner.raw()),
        ));
    }
    if !scanner.expect("->") {
        let at = scanner.position();
        return Err(Diagnostic::internal(
            Range::new(at, at),
            format!("expected \"->\" after {}", owner.raw()),
        ));
    }
    Ok(owner)
}

#[derive(Default)]
struct ClassBuilder {
    name: Option<SmaliType>,
    modifiers: Vec<String>,
    super_class: Option<SmaliType>,
    source_file: Option<TextToken>,
    interfaces: Vec<SmaliType>,
    fields: Vec<Field>,
    constructors: Vec<Method>,
    methods: Vec<Method>,
    references: BTreeMap<String, Vec<Range>>,
}

impl ClassBuilder {
    fn add_reference(&mut self, key: impl Into<String>, range: Range) {
        self.references.entry(key.into()).or_default().push(range);
    }

    fn add_type_reference(&mut self, ty: &SmaliType) {
        let element = match ty {
            SmaliType::Array { element, .. } => element.as_ref(),
            other => other,
        };
        if let SmaliType::Reference { raw, range } = element {
            self.add_reference(raw.clone(), *range);
        }
    }

    fn finish(self, source: Arc<SourceText>) -> Class {
        Class {
            // The header reader fills both before the body is read.
            name: self.name.unwrap_or(SmaliType::Reference {
                raw: String::new(),
                range: Range::default(),
            }),
            modifiers: self.modifiers,
            super_class: self.super_class.unwrap_or(SmaliType::Reference {
                raw: String::new(),
                range: Range::default(),
            }),
            source_file: self.source_file,
            interfaces: self.interfaces,
            fields: self.fields,
            constructors: self.constructors,
            methods: self.methods,
            references: self.references,
            source,
        }
    }
}

struct ClassParser<'a> {
    scanner: Scanner<'a>,
    builder: ClassBuilder,
}

impl<'a> ClassParser<'a> {
    fn new(source: &'a SourceText) -> Self {
        Self {
            scanner: Scanner::new(source),
            builder: ClassBuilder::default(),
        }
    }

    fn source(&self) -> &'a SourceText {
        self.scanner.source()
    }

    fn missing_keyword(&mut self, keyword: &str) -> Diagnostic {
        self.scanner.skip_whitespace();
        let at = self.scanner.position();
        Diagnostic::syntax(
            Range::new(at, at.translate(keyword.len())),
            format!(
                "Expect \"{}\" here, the file may not be a standard smali file.",
                keyword
            ),
        )
    }

    fn read_header(&mut self) -> ParseResult<()> {
        if !self.scanner.expect(".class") {
            return Err(self.missing_keyword(".class"));
        }
        self.builder.modifiers = self.scanner.read_modifiers();
        let name = self.scanner.read_type()?;
        if !name.is_reference() {
            return Err(Diagnostic::syntax(
                name.range(),
                format!("Class name must be a class descriptor, found {}", name.raw()),
            ));
        }
        self.builder.name = Some(name);

        if !self.scanner.expect(".super") {
            return Err(self.missing_keyword(".super"));
        }
        let super_class = self.scanner.read_type()?;
        self.builder.add_type_reference(&super_class);
        self.builder.super_class = Some(super_class);

        if self.scanner.expect(".source") {
            self.builder.source_file = Some(self.scanner.read_rest_of_line());
        }
        Ok(())
    }

    fn read_body(&mut self) -> ParseResult<()> {
        loop {
            let token = self.scanner.read_token();
            if token.is_empty() {
                return Ok(());
            }
            match token.text.as_str() {
                ".implements" => {
                    let interface = self.scanner.read_type()?;
                    self.builder.add_type_reference(&interface);
                    self.builder.interfaces.push(interface);
                }
                ".annotation" => self.skip_annotation(&token)?,
                ".field" => {
                    let field = read_field_definition(&mut self.scanner)?;
                    self.builder.add_type_reference(&field.ty);
                    self.builder.fields.push(field);
                }
                ".method" => self.read_method(&token)?,
                // Comments and directives that are not modelled.
                _ => self.scanner.skip_line(),
            }
        }
    }

    fn skip_annotation(&mut self, keyword: &TextToken) -> ParseResult<()> {
        let start = Position::new(keyword.range.start_line, 0);
        loop {
            if self.scanner.expect(".end annotation") {
                return Ok(());
            }
            self.scanner.skip_line();
            if self.scanner.is_eof() {
                return Err(Diagnostic::unterminated(
                    Range::new(start, self.scanner.position()),
                    "Can not find \".end annotation\" pair",
                ));
            }
        }
    }

    fn read_method(&mut self, keyword: &TextToken) -> ParseResult<()> {
        let start = Position::new(keyword.range.start_line, 0);
        let mut method = read_method_definition(&mut self.scanner)?;
        for parameter in &method.parameters {
            self.builder.add_type_reference(parameter);
        }
        self.builder.add_type_reference(&method.return_type);
        self.scanner.skip_line();

        loop {
            self.scanner.skip_whitespace();
            if self.scanner.is_eof() {
                return Err(Diagnostic::unterminated(
                    Range::new(start, self.scanner.position()),
                    "Can not find \".end method\" pair",
                ));
            }
            if self.scanner.expect(".end method") {
                break;
            }
            self.read_instruction()?;
            self.scanner.skip_line();
        }

        method.body_range = Some(Range::new(start, self.scanner.position()));
        if method.is_constructor() {
            self.builder.constructors.push(method);
        } else {
            self.builder.methods.push(method);
        }
        Ok(())
    }

    /// Records the symbol occurrences of one body line. Leaves the scanner on that line.
    fn read_instruction(&mut self) -> ParseResult<()> {
        let line = self.scanner.line();
        if FIELD_OPCODES.iter().any(|op| self.scanner.expect(op)) {
            if let Some(m) = FIELD_REFERENCE.find(self.source().line_text(line)) {
                let mut sub = Scanner::at(self.source(), Position::new(line, m.start()));
                let reference = read_field_reference(&mut sub)?;
                self.builder.add_type_reference(&reference.owner);
                self.builder.add_type_reference(&reference.field.ty);
                self.builder.add_reference(m.as_str(), reference.field.range);
            }
        } else if self.scanner.expect(INVOKE_OPCODE) {
            if let Some(m) = METHOD_REFERENCE.find(self.source().line_text(line)) {
                let mut sub = Scanner::at(self.source(), Position::new(line, m.start()));
                let reference = read_method_reference(&mut sub)?;
                self.builder.add_type_reference(&reference.owner);
                for parameter in &reference.method.parameters {
                    self.builder.add_type_reference(parameter);
                }
                self.builder.add_type_reference(&reference.method.return_type);
                self.builder.add_reference(m.as_str(), reference.method.range);
            }
        } else if let Some(opcode) = TYPE_OPCODES
            .iter()
            .find(|op| self.scanner.peek_token().text == **op)
        {
            self.scanner.expect(opcode);
            let operands = self.scanner.read_rest_of_line();
            if let Some((_, last)) = operands.text.rsplit_once(',') {
                let mut sub = Scanner::at_offset(self.source(), self.scanner.offset() - last.len());
                if let Ok(ty) = sub.read_type() {
                    self.builder.add_type_reference(&ty);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiagnosticKind, Primitive};

    const MINIMAL: &str = "\
.class public Lcom/example/Foo;
.super Ljava/lang/Object;
.field private x:I
.method public bar()V
    return-void
.end method
";

    #[test]
    fn minimal_class() {
        let class = parse_text(MINIMAL).unwrap();
        assert_eq!(class.name.raw(), "Lcom/example/Foo;");
        assert_eq!(class.identifier(), "Lcom/example/Foo;");
        assert_eq!(class.super_class.raw(), "Ljava/lang/Object;");
        assert_eq!(class.modifiers, vec!["public"]);

        assert_eq!(class.fields.len(), 1);
        let field = &class.fields[0];
        assert_eq!(field.name.text, "x");
        assert!(matches!(
            field.ty,
            SmaliType::Primitive {
                primitive: Primitive::Int,
                ..
            }
        ));
        assert_eq!(field.range, Range::new(Position::new(2, 0), Position::new(2, 18)));

        assert_eq!(class.methods.len(), 1);
        assert!(class.constructors.is_empty());
        let method = &class.methods[0];
        assert_eq!(method.name.text, "bar");
        assert!(method.parameters.is_empty());
        assert!(method.return_type.is_void());
        assert_eq!(method.range, Range::new(Position::new(3, 0), Position::new(3, 21)));
        assert_eq!(
            method.body_range,
            Some(Range::new(Position::new(3, 0), Position::new(5, 11)))
        );
    }

    #[test]
    fn parsing_twice_gives_equal_classes() {
        let a = parse_text(MINIMAL).unwrap();
        let b = parse_text(MINIMAL).unwrap();
        assert!(!Arc::ptr_eq(a.source(), b.source()));
        assert_eq!(a, b);
    }

    #[test]
    fn header_fields_and_constructors() {
        let text = "\
.class public final Lcom/example/Bar;
.super Lcom/example/Base;
.source \"Bar.java\"

# interfaces
.implements Ljava/lang/Runnable;
.implements Ljava/io/Serializable;

.annotation system Ldalvik/annotation/MemberClasses;
    value = {
        Lcom/example/Bar$Inner;
    }
.end annotation

.field public static final NAME:Ljava/lang/String; = \"bar baz\"
.field private items:[Ljava/util/List;

.method static constructor <clinit>()V
    .registers 1
    return-void
.end method

.method public constructor <init>(ILjava/lang/String;)V
    .registers 3
    invoke-direct {p0}, Lcom/example/Base;-><init>()V
    return-void
.end method
";
        let class = parse_text(text).unwrap();
        assert_eq!(class.modifiers, vec!["public", "final"]);
        assert_eq!(class.source_file_name(), Some("Bar.java"));
        let interfaces: Vec<String> = class.interfaces.iter().map(SmaliType::raw).collect();
        assert_eq!(interfaces, vec!["Ljava/lang/Runnable;", "Ljava/io/Serializable;"]);

        assert_eq!(class.fields.len(), 2);
        assert_eq!(class.fields[0].modifiers, vec!["public", "static", "final"]);
        assert_eq!(
            class.fields[0].initial.as_ref().map(|t| t.text.as_str()),
            Some("\"bar baz\"")
        );
        assert_eq!(class.fields[1].ty.raw(), "[Ljava/util/List;");

        assert_eq!(class.constructors.len(), 2);
        assert!(class.methods.is_empty());
        assert_eq!(class.constructors[1].parameters.len(), 2);
        assert_eq!(
            class.references_to("Lcom/example/Base;-><init>()V").len(),
            1
        );
        assert_eq!(class.references_to("Lcom/example/Base;").len(), 2);
    }

    #[test]
    fn body_occurrences_have_exact_ranges() {
        let text = "\
.class public Lcom/example/Bar;
.super Ljava/lang/Object;
.method public run()V
    sget-object v0, Lcom/example/Foo;->x:I
    invoke-static {v0}, Lcom/example/Foo;->bar(I)V
    new-instance v1, Lcom/example/Baz;
    return-void
.end method
";
        let class = parse_text(text).unwrap();
        assert_eq!(
            class.references_to("Lcom/example/Foo;->x:I"),
            &[Range::new(Position::new(3, 20), Position::new(3, 42))]
        );
        assert_eq!(
            class.references_to("Lcom/example/Foo;->bar(I)V"),
            &[Range::new(Position::new(4, 24), Position::new(4, 50))]
        );
        assert_eq!(
            class.references_to("Lcom/example/Baz;"),
            &[Range::new(Position::new(5, 21), Position::new(5, 38))]
        );
        assert_eq!(class.references_to("Lcom/example/Foo;").len(), 2);
    }

    #[test]
    fn missing_end_method_spans_to_end_of_file() {
        let text = "\
.class public Lcom/example/Foo;
.super Ljava/lang/Object;
.method public bar()V
    return-void
";
        let err = parse_text(text).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Unterminated);
        assert_eq!(err.range.start(), Position::new(2, 0));
        assert_eq!(err.range.end(), Position::new(4, 0));
    }

    #[test]
    fn missing_end_annotation_is_fatal() {
        let text = ".class LA;\n.super LB;\n.annotation runtime LC;\n";
        let err = parse_text(text).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Unterminated);
        assert_eq!(err.range.start_line, 2);
    }

    #[test]
    fn missing_header_keywords() {
        let err = parse_text("hello").unwrap_err();
        assert!(err.message.contains(".class"));
        let err = parse_text(".class LA;\n.field x:I\n").unwrap_err();
        assert!(err.message.contains(".super"));
        assert_eq!(err.range.start(), Position::new(1, 0));
        let err = parse_text(".class I\n.super LB;\n").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Syntax);
    }

    #[test]
    fn malformed_signatures_are_fatal() {
        let err = parse_text(".class LA;\n.super LB;\n.field public x\n").unwrap_err();
        assert!(err.message.contains("':'"));
        let err = parse_text(".class LA;\n.super LB;\n.method foo(Q)V\n.end method\n").unwrap_err();
        assert!(err.message.contains("Unknown type identifier: Q"));
    }

    #[test]
    fn class_name_only() {
        let src = SourceText::new(".class public abstract Lcom/example/Foo;\n.super LA;");
        assert_eq!(class_name_of(&src).unwrap().raw(), "Lcom/example/Foo;");
        assert!(class_name_of(&SourceText::new("nothing")).is_none());
    }
}
