use super::{Location, ProjectIndex};
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;

/// Characters that continue a descriptor or member name to the left. A match preceded
/// by one of them is part of a longer symbol.
fn continues_symbol(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '/' | '-')
}

/// Byte offsets of `symbol` in `text` that start on a symbol boundary.
pub(crate) fn symbol_offsets(text: &str, symbol: &str) -> Vec<usize> {
    if symbol.is_empty() {
        return Vec::new();
    }
    text.match_indices(symbol)
        .map(|(offset, _)| offset)
        .filter(|offset| {
            !text[..*offset]
                .chars()
                .next_back()
                .is_some_and(continues_symbol)
        })
        .collect()
}

impl ProjectIndex {
    /// Every textual occurrence of each symbol across the project, keyed by symbol in
    /// the order given. Locations are ordered by file, then by offset.
    pub async fn find_symbol_occurrences(
        &self,
        symbols: &[String],
        cancel: &CancellationToken,
    ) -> IndexMap<String, Vec<Location>> {
        self.wait_ready().await;
        let mut result: IndexMap<String, Vec<Location>> = symbols
            .iter()
            .map(|symbol| (symbol.clone(), Vec::new()))
            .collect();

        for file in self.known_files() {
            if cancel.is_cancelled() {
                break;
            }
            let Some(source) = self.source_of(&file).await else {
                continue;
            };
            for (symbol, locations) in result.iter_mut() {
                for offset in symbol_offsets(source.text(), symbol) {
                    let range = source.range_of(offset, offset + symbol.len());
                    locations.push(Location::new(file.clone(), range));
                }
            }
        }
        result
    }
}
