use super::text::Range;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// The primitive descriptor alphabet.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Void,
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

impl Primitive {
    pub fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'V' => Self::Void,
            'Z' => Self::Boolean,
            'B' => Self::Byte,
            'S' => Self::Short,
            'C' => Self::Char,
            'I' => Self::Int,
            'J' => Self::Long,
            'F' => Self::Float,
            'D' => Self::Double,
            _ => return None,
        })
    }

    pub fn code(self) -> char {
        match self {
            Self::Void => 'V',
            Self::Boolean => 'Z',
            Self::Byte => 'B',
            Self::Short => 'S',
            Self::Char => 'C',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
        }
    }

    pub fn java_name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Char => "char",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    pub fn is_code(c: char) -> bool {
        Self::from_code(c).is_some()
    }
}

/// A type descriptor together with the range it was read from.
///
/// Equality and hashing only look at the raw descriptor, never at ranges or the
/// readable form.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum SmaliType {
    Primitive {
        primitive: Primitive,
        range: Range,
    },
    Reference {
        raw: String,
        range: Range,
    },
    Array {
        element: Box<SmaliType>,
        dimensions: usize,
        range: Range,
    },
}

impl SmaliType {
    pub fn primitive(primitive: Primitive, range: Range) -> Self {
        Self::Primitive { primitive, range }
    }

    /// Returns `None` unless `raw` has the `L...;` shape.
    pub fn reference(raw: impl Into<String>, range: Range) -> Option<Self> {
        let raw = raw.into();
        if raw.len() > 2 && raw.starts_with('L') && raw.ends_with(';') {
            Some(Self::Reference { raw, range })
        } else {
            None
        }
    }

    /// Nested arrays are flattened so that `[[I` always has one `Array` layer.
    pub fn array(element: SmaliType, dimensions: usize, range: Range) -> Self {
        match element {
            Self::Array {
                element: inner,
                dimensions: inner_dims,
                ..
            } => Self::Array {
                element: inner,
                dimensions: dimensions + inner_dims,
                range,
            },
            element => Self::Array {
                element: Box::new(element),
                dimensions,
                range,
            },
        }
    }

    /// Parses a complete descriptor string such as `[Ljava/lang/String;`.
    pub fn from_descriptor(raw: &str) -> Option<Self> {
        let dims = raw.chars().take_while(|c| *c == '[').count();
        let rest = &raw[dims..];
        let element = match rest.strip_suffix(';') {
            Some(body) if !body.contains(';') => Self::reference(rest, Range::default())?,
            Some(_) => return None,
            None => {
                let mut chars = rest.chars();
                let code = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                Self::primitive(Primitive::from_code(code)?, Range::default())
            }
        };
        Some(if dims > 0 {
            Self::array(element, dims, Range::default())
        } else {
            element
        })
    }

    pub fn range(&self) -> Range {
        match self {
            Self::Primitive { range, .. }
            | Self::Reference { range, .. }
            | Self::Array { range, .. } => *range,
        }
    }

    /// The raw descriptor, e.g. `I`, `Lcom/example/Foo;`, `[[J`.
    pub fn raw(&self) -> String {
        match self {
            Self::Primitive { primitive, .. } => primitive.code().to_string(),
            Self::Reference { raw, .. } => raw.clone(),
            Self::Array {
                element,
                dimensions,
                ..
            } => format!("{}{}", "[".repeat(*dimensions), element.raw()),
        }
    }

    /// Java-style name: `int`, `com.example.Foo`, `long[][]`.
    pub fn readable(&self) -> String {
        match self {
            Self::Primitive { primitive, .. } => primitive.java_name().to_string(),
            Self::Reference { raw, .. } => raw[1..raw.len() - 1].replace('/', "."),
            Self::Array {
                element,
                dimensions,
                ..
            } => format!("{}{}", element.readable(), "[]".repeat(*dimensions)),
        }
    }

    /// The class identifier this type points at, looking through arrays.
    pub fn class_identifier(&self) -> Option<&str> {
        match self {
            Self::Primitive { .. } => None,
            Self::Reference { raw, .. } => Some(raw),
            Self::Array { element, .. } => element.class_identifier(),
        }
    }

    /// Conventional project-relative path of the defining file, e.g. `com/example/Foo.smali`.
    pub fn file_path(&self) -> Option<String> {
        self.class_identifier()
            .map(|raw| format!("{}.smali", &raw[1..raw.len() - 1]))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference { .. })
    }

    pub fn is_void(&self) -> bool {
        matches!(
            self,
            Self::Primitive {
                primitive: Primitive::Void,
                ..
            }
        )
    }

    /// Simple name of the class without package, e.g. `Foo` for `Lcom/example/Foo;`.
    pub fn simple_name(&self) -> String {
        let readable = self.readable();
        match readable.rsplit_once('.') {
            Some((_, name)) => name.to_string(),
            None => readable,
        }
    }
}

impl PartialEq for SmaliType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Primitive { primitive: a, .. }, Self::Primitive { primitive: b, .. }) => a == b,
            (Self::Reference { raw: a, .. }, Self::Reference { raw: b, .. }) => a == b,
            (
                Self::Array {
                    element: a,
                    dimensions: da,
                    ..
                },
                Self::Array {
                    element: b,
                    dimensions: db,
                    ..
                },
            ) => da == db && a == b,
            _ => false,
        }
    }
}

impl Eq for SmaliType {}

impl Hash for SmaliType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw().hash(state);
    }
}

impl fmt::Display for SmaliType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.readable())
    }
}

/// Converts `com.example.Foo` or `Lcom/example/Foo;` into a class descriptor.
pub fn to_class_descriptor(name: &str) -> Option<String> {
    let name = name.trim();
    if name.starts_with('L') && name.ends_with(';') && name.len() > 2 {
        return Some(name.to_string());
    }
    let valid = !name.is_empty()
        && name
            .split(['.', '/'])
            .all(|part| !part.is_empty() && part.chars().all(is_identifier_char));
    valid.then(|| format!("L{};", name.replace('.', "/")))
}

pub fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trips_for_every_shape() {
        for raw in ["I", "V", "Lcom/example/Foo;", "[[I", "[Ljava/lang/String;", "[[[J"] {
            let ty = SmaliType::from_descriptor(raw).expect(raw);
            assert_eq!(ty.raw(), raw);
        }
    }

    #[test]
    fn multibyte_descriptors_never_panic() {
        for raw in ["", "é", "Lxé", "[é", "LA;B;", "II", "L;", "Q"] {
            assert!(SmaliType::from_descriptor(raw).is_none(), "{raw}");
        }
        assert_eq!(
            SmaliType::from_descriptor("Lcom/é;").map(|ty| ty.raw()),
            Some("Lcom/é;".to_string())
        );
    }

    #[test]
    fn readable_names() {
        let ty = SmaliType::from_descriptor("[[Lcom/example/Foo;").unwrap();
        assert_eq!(ty.readable(), "com.example.Foo[][]");
        assert_eq!(ty.file_path().as_deref(), Some("com/example/Foo.smali"));
        assert_eq!(ty.class_identifier(), Some("Lcom/example/Foo;"));
        assert_eq!(SmaliType::from_descriptor("Z").unwrap().readable(), "boolean");
    }

    #[test]
    fn equality_ignores_ranges_and_nesting() {
        let a = SmaliType::reference("Lfoo/Bar;", Range::default()).unwrap();
        let b = SmaliType::reference(
            "Lfoo/Bar;",
            Range {
                start_line: 4,
                start_col: 2,
                end_line: 4,
                end_col: 11,
            },
        )
        .unwrap();
        assert_eq!(a, b);

        let int = SmaliType::primitive(Primitive::Int, Range::default());
        let nested = SmaliType::array(
            SmaliType::array(int.clone(), 1, Range::default()),
            1,
            Range::default(),
        );
        assert_eq!(nested, SmaliType::from_descriptor("[[I").unwrap());
        assert_ne!(int, SmaliType::from_descriptor("[I").unwrap());
    }

    #[test]
    fn primitive_never_equals_reference() {
        let int = SmaliType::from_descriptor("I").unwrap();
        let reference = SmaliType::reference("LI;", Range::default()).unwrap();
        assert_ne!(int, reference);
    }

    #[test]
    fn malformed_descriptors_are_rejected() {
        assert!(SmaliType::from_descriptor("").is_none());
        assert!(SmaliType::from_descriptor("X").is_none());
        assert!(SmaliType::from_descriptor("Lfoo").is_none());
        assert!(SmaliType::from_descriptor("La;b;").is_none());
    }

    #[test]
    fn class_descriptor_from_dotted_name() {
        assert_eq!(
            to_class_descriptor("com.example.Baz").as_deref(),
            Some("Lcom/example/Baz;")
        );
        assert_eq!(
            to_class_descriptor("Lcom/example/Baz;").as_deref(),
            Some("Lcom/example/Baz;")
        );
        assert!(to_class_descriptor("com..Baz").is_none());
        assert!(to_class_descriptor("com.exa mple").is_none());
    }
}
