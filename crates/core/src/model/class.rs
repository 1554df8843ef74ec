use super::modifiers::access_flags;
use super::text::{Range, SourceText, TextToken};
use super::types::SmaliType;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const CONSTRUCTOR_NAME: &str = "<init>";
pub const STATIC_INITIALIZER_NAME: &str = "<clinit>";

#[derive(Debug, Clone)]
pub struct Field {
    /// The whole `.field` line.
    pub range: Range,
    pub modifiers: Vec<String>,
    pub name: TextToken,
    pub ty: SmaliType,
    pub initial: Option<TextToken>,
}

impl Field {
    /// `name:Type`, the member part of a field reference.
    pub fn descriptor(&self) -> String {
        format!("{}:{}", self.name.text, self.ty.raw())
    }

    /// `Owner->name:Type`, the exact text used by field access instructions.
    pub fn reference_key(&self, owner: &str) -> String {
        format!("{}->{}", owner, self.descriptor())
    }

    pub fn is_private(&self) -> bool {
        self.modifiers.iter().any(|m| m == "private")
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.iter().any(|m| m == "static")
    }

    pub fn access_flags(&self) -> u32 {
        access_flags(&self.modifiers)
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name.text == other.name.text && self.ty == other.ty
    }
}

impl Eq for Field {}

#[derive(Debug, Clone)]
pub struct Method {
    /// The `.method` line.
    pub range: Range,
    /// From the `.method` line through `.end method`; absent for references and
    /// single-line point queries.
    pub body_range: Option<Range>,
    pub modifiers: Vec<String>,
    pub name: TextToken,
    pub parameters: Vec<SmaliType>,
    pub return_type: SmaliType,
}

impl Method {
    pub fn is_constructor(&self) -> bool {
        self.name.text == CONSTRUCTOR_NAME || self.name.text == STATIC_INITIALIZER_NAME
    }

    pub fn is_private(&self) -> bool {
        self.modifiers.iter().any(|m| m == "private")
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.iter().any(|m| m == "static")
    }

    /// `name(Params)Return`.
    pub fn descriptor(&self) -> String {
        let params: String = self.parameters.iter().map(SmaliType::raw).collect();
        format!("{}({}){}", self.name.text, params, self.return_type.raw())
    }

    /// `Owner->name(Params)Return`, the exact text used by invoke instructions.
    pub fn reference_key(&self, owner: &str) -> String {
        format!("{}->{}", owner, self.descriptor())
    }

    pub fn access_flags(&self) -> u32 {
        access_flags(&self.modifiers)
    }

    /// Span used for symbol outlines: the whole body when known, the header line otherwise.
    pub fn full_range(&self) -> Range {
        self.body_range.unwrap_or(self.range)
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.name.text == other.name.text
            && self.return_type == other.return_type
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a == b)
    }
}

impl Eq for Method {}

/// One parsed smali file. Never modified after the parser hands it out.
#[derive(Debug, Clone)]
pub struct Class {
    pub name: SmaliType,
    pub modifiers: Vec<String>,
    pub super_class: SmaliType,
    /// The `.source` attribute as written, quotes included.
    pub source_file: Option<TextToken>,
    pub interfaces: Vec<SmaliType>,
    pub fields: Vec<Field>,
    pub constructors: Vec<Method>,
    pub methods: Vec<Method>,
    /// Symbol occurrences in this file keyed by their exact text.
    pub references: BTreeMap<String, Vec<Range>>,
    pub(crate) source: Arc<SourceText>,
}

impl Class {
    /// The raw descriptor of the declared class, e.g. `Lcom/example/Foo;`.
    pub fn identifier(&self) -> &str {
        match &self.name {
            SmaliType::Reference { raw, .. } => raw,
            // The parser rejects non-reference class names.
            _ => "",
        }
    }

    pub fn source(&self) -> &Arc<SourceText> {
        &self.source
    }

    pub fn text(&self) -> &str {
        self.source.text()
    }

    pub fn source_file_name(&self) -> Option<&str> {
        self.source_file
            .as_ref()
            .map(|token| token.text.trim_matches('"'))
    }

    pub fn is_interface(&self) -> bool {
        self.modifiers.iter().any(|m| m == "interface")
    }

    /// Superclass followed by interfaces.
    pub fn parents(&self) -> impl Iterator<Item = &SmaliType> {
        std::iter::once(&self.super_class).chain(self.interfaces.iter())
    }

    pub fn extends_or_implements(&self, identifier: &str) -> bool {
        self.parents()
            .any(|parent| parent.class_identifier() == Some(identifier))
    }

    /// Constructors and methods together.
    pub fn all_methods(&self) -> impl Iterator<Item = &Method> {
        self.constructors.iter().chain(self.methods.iter())
    }

    pub fn find_fields(&self, field: &Field) -> Vec<&Field> {
        self.fields.iter().filter(|f| *f == field).collect()
    }

    pub fn find_methods(&self, method: &Method) -> Vec<&Method> {
        self.all_methods().filter(|m| *m == method).collect()
    }

    pub fn declares_method(&self, method: &Method) -> bool {
        self.all_methods().any(|m| m == method)
    }

    pub fn references_to(&self, key: &str) -> &[Range] {
        self.references.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Structural equality of the parsed model, ignoring source identity.
    pub fn same_structure(&self, other: &Class) -> bool {
        self.name == other.name
            && self.modifiers == other.modifiers
            && self.super_class == other.super_class
            && self.interfaces == other.interfaces
            && self.fields == other.fields
            && self.constructors == other.constructors
            && self.methods == other.methods
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.same_structure(other)
    }
}
