use super::resolve::{resolve_field, resolve_method};
use super::spot_in;
use crate::index::ProjectIndex;
use crate::model::{Field, Method, Position, Range, SmaliType};
use crate::parser::spot::Spot;
use crate::project::FileId;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Java-like rendering of the symbol under the cursor.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct HoverInfo {
    pub contents: String,
    pub range: Range,
}

pub async fn hover(
    index: &ProjectIndex,
    file: &FileId,
    position: Position,
    cancel: &CancellationToken,
) -> Option<HoverInfo> {
    let (_, spot) = spot_in(index, file, position).await?;
    let range = spot.range();
    let contents = match spot {
        Spot::String(token) => decode_string(&token.text),
        Spot::Type(ty) => ty.readable(),
        Spot::Label(label) => label.name.text,
        Spot::FieldDefinition(field) => render_field(&field, &field.name.text),
        Spot::MethodDefinition(method) => render_method(&method, &method.name.text),
        Spot::FieldReference(reference) => {
            let owner = reference.owner.raw();
            let declared = resolve_field(index, &owner, &reference.field, cancel)
                .await
                .into_iter()
                .next();
            let field = declared.map(|d| d.member).unwrap_or(reference.field);
            let name = format!("{}.{}", reference.owner.readable(), field.name.text);
            render_field(&field, &name)
        }
        Spot::MethodReference(reference) => {
            let owner = reference.owner.raw();
            let declared = resolve_method(index, &owner, &reference.method, cancel)
                .await
                .into_iter()
                .next();
            let method = declared.map(|d| d.member).unwrap_or(reference.method);
            let name = if method.is_constructor() {
                format!("new {}", reference.owner.readable())
            } else {
                format!("{}.{}", reference.owner.readable(), method.name.text)
            };
            render_method(&method, &name)
        }
    };
    Some(HoverInfo { contents, range })
}

fn with_modifiers(modifiers: &[String], rest: String) -> String {
    if modifiers.is_empty() {
        rest
    } else {
        format!("{} {}", modifiers.join(" "), rest)
    }
}

fn render_field(field: &Field, name: &str) -> String {
    let mut text = with_modifiers(
        &field.modifiers,
        format!("{} {}", field.ty.readable(), name),
    );
    if let Some(initial) = &field.initial {
        text.push_str(" = ");
        text.push_str(&initial.text);
    }
    text
}

/// `int param0_int, java.lang.String param1_java_lang_String`
fn render_parameters(parameters: &[SmaliType]) -> String {
    parameters
        .iter()
        .enumerate()
        .map(|(i, ty)| {
            let readable = ty.readable();
            format!(
                "{} param{}_{}",
                readable,
                i,
                readable.replace(['.', '[', ']'], "_")
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_method(method: &Method, name: &str) -> String {
    let signature = format!("{}({})", name, render_parameters(&method.parameters));
    let modifiers: Vec<String> = method
        .modifiers
        .iter()
        .filter(|m| *m != "constructor")
        .cloned()
        .collect();
    if method.is_constructor() {
        with_modifiers(&modifiers, signature)
    } else {
        with_modifiers(
            &modifiers,
            format!("{} : {}", signature, method.return_type.readable()),
        )
    }
}

/// The value of a quoted smali string literal.
pub fn decode_string(literal: &str) -> String {
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
