//! Editor features computed from the project index and the spot under the cursor.
//!
//! Every entry point takes a document and a byte-column position. Nothing under the
//! cursor yields `None` or an empty list, never an error.

pub mod hover;
pub mod navigation;
pub mod references;
pub mod rename;
pub mod resolve;
pub mod symbols;

pub use hover::{HoverInfo, hover};
pub use navigation::definition;
pub use references::references;
pub use rename::{RenameEdits, TextEdit, rename};
pub use symbols::{DocumentSymbol, SymbolInfo, SymbolKind, document_symbols, workspace_symbols};

use crate::index::ProjectIndex;
use crate::model::{Position, SourceText};
use crate::parser::spot::{Spot, spot_at};
use crate::project::FileId;
use std::sync::Arc;

/// The current document text of `file` and the spot at `position` in it.
pub(crate) async fn spot_in(
    index: &ProjectIndex,
    file: &FileId,
    position: Position,
) -> Option<(Arc<SourceText>, Spot)> {
    let source = index.document(file).await?;
    let spot = spot_at(&source, position)?;
    Some((source, spot))
}
