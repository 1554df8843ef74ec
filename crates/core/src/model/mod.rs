pub mod class;
pub mod diagnostic;
pub mod modifiers;
pub mod text;
pub mod types;

pub use class::{CONSTRUCTOR_NAME, Class, Field, Method, STATIC_INITIALIZER_NAME};
pub use diagnostic::{Diagnostic, DiagnosticKind, Severity};
pub use text::{LineIndex, Position, Range, SourceText, TextToken};
pub use types::{Primitive, SmaliType};
