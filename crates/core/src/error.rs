use crate::model::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmaliscopeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Parsing error: {0}")]
    Parse(#[from] Diagnostic),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Cannot rename: {0}")]
    Rename(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SmaliscopeError>;
