use super::text::Range;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Malformed token, type descriptor or signature.
    Syntax,
    /// A block (`.method`, `.annotation`) that never reaches its end marker.
    Unterminated,
    /// The same class identifier is declared by more than one file.
    Conflict,
    /// Failure that is not a grammar violation of the input.
    Internal,
}

/// A located problem attached to one file.
#[derive(Error, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({range})")]
pub struct Diagnostic {
    pub range: Range,
    pub message: String,
    pub severity: Severity,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn syntax(range: Range, message: impl Into<String>) -> Self {
        Self {
            range,
            message: message.into(),
            severity: Severity::Error,
            kind: DiagnosticKind::Syntax,
        }
    }

    pub fn unterminated(range: Range, message: impl Into<String>) -> Self {
        Self {
            range,
            message: message.into(),
            severity: Severity::Error,
            kind: DiagnosticKind::Unterminated,
        }
    }

    pub fn conflict(range: Range, message: impl Into<String>) -> Self {
        Self {
            range,
            message: message.into(),
            severity: Severity::Warning,
            kind: DiagnosticKind::Conflict,
        }
    }

    pub fn internal(range: Range, message: impl Into<String>) -> Self {
        Self {
            range,
            message: format!("Parse error: {}, please report this file.", message.into()),
            severity: Severity::Hint,
            kind: DiagnosticKind::Internal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind, DiagnosticKind::Conflict)
    }
}
