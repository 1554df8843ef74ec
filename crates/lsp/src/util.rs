use smaliscope_core::index::{Location as CoreLocation, ProjectIndex};
use smaliscope_core::model::{Position as CorePosition, Range as CoreRange, SourceText};
use smaliscope_core::project::FileId;
use smaliscope_core::util::{byte_col_to_utf16_col, utf16_col_to_byte_col};
use std::collections::HashMap;
use std::sync::Arc;
use tower_lsp::lsp_types::{Location, Position, Range, Url};

pub fn uri_to_file(uri: &Url) -> Option<FileId> {
    uri.to_file_path().ok().map(FileId::from)
}

pub fn file_to_uri(file: &FileId) -> Option<Url> {
    Url::from_file_path(file.path()).ok()
}

pub fn to_core_position(src: &SourceText, position: Position) -> CorePosition {
    let line = position.line as usize;
    CorePosition::new(
        line,
        utf16_col_to_byte_col(src, line, position.character as usize),
    )
}

pub fn to_lsp_position(src: &SourceText, position: CorePosition) -> Position {
    let character = byte_col_to_utf16_col(src, position.line, position.col);
    Position::new(position.line as u32, character as u32)
}

pub fn to_lsp_range(src: &SourceText, range: CoreRange) -> Range {
    Range::new(
        to_lsp_position(src, range.start()),
        to_lsp_position(src, range.end()),
    )
}

/// Converts core ranges of many files against their current text, reading each
/// file once.
pub struct RangeMapper<'a> {
    index: &'a ProjectIndex,
    sources: HashMap<FileId, Arc<SourceText>>,
}

impl<'a> RangeMapper<'a> {
    pub fn new(index: &'a ProjectIndex) -> Self {
        Self {
            index,
            sources: HashMap::new(),
        }
    }

    pub async fn range(&mut self, file: &FileId, range: CoreRange) -> Option<Range> {
        if !self.sources.contains_key(file) {
            let source = self.index.document(file).await?;
            self.sources.insert(file.clone(), source);
        }
        let source = self.sources.get(file)?;
        Some(to_lsp_range(source, range))
    }

    pub async fn location(&mut self, location: &CoreLocation) -> Option<Location> {
        let uri = file_to_uri(&location.file)?;
        let range = self.range(&location.file, location.range).await?;
        Some(Location { uri, range })
    }

    pub async fn locations(&mut self, locations: &[CoreLocation]) -> Vec<Location> {
        let mut converted = Vec::with_capacity(locations.len());
        for location in locations {
            if let Some(location) = self.location(location).await {
                converted.push(location);
            }
        }
        converted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_convert_through_utf16() {
        let src = SourceText::new("const-string v0, \"日本\"\n    return-void\n");
        let lsp = to_lsp_range(
            &src,
            CoreRange::new(CorePosition::new(0, 17), CorePosition::new(0, 25)),
        );
        assert_eq!(lsp.start, Position::new(0, 17));
        assert_eq!(lsp.end, Position::new(0, 21));
        assert_eq!(
            to_core_position(&src, Position::new(0, 21)),
            CorePosition::new(0, 25)
        );
    }
}
