#![allow(dead_code)]

use smaliscope_core::config::IndexConfig;
use smaliscope_core::index::ProjectIndex;
use smaliscope_core::model::Position;
use smaliscope_core::project::MemoryProject;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn memory_index(files: &[(&str, &str)]) -> Arc<ProjectIndex> {
    memory_index_with(files, IndexConfig::default()).await
}

pub async fn memory_index_with(files: &[(&str, &str)], config: IndexConfig) -> Arc<ProjectIndex> {
    let project = MemoryProject::with_files(files.iter().copied());
    let index = Arc::new(ProjectIndex::new(Arc::new(project), config));
    index
        .load_project(&CancellationToken::new())
        .await
        .expect("in-memory projects always enumerate");
    index
}

/// Byte position of the first occurrence of `needle` in `text`, shifted right by `shift`.
pub fn position_of(text: &str, needle: &str, shift: usize) -> Position {
    let offset = text
        .find(needle)
        .unwrap_or_else(|| panic!("`{needle}` not in text"));
    let line = text[..offset].matches('\n').count();
    let line_start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    Position::new(line, offset - line_start + shift)
}
