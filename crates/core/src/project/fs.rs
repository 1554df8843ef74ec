use super::{FileId, LiveText, ProjectSource};
use crate::config::{IndexConfig, PathFilter};
use crate::error::{Result, SmaliscopeError};
use async_trait::async_trait;
use dashmap::DashMap;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A project rooted at a directory, with open editor buffers layered on top.
pub struct FsProject {
    root: PathBuf,
    filter: PathFilter,
    overlay: DashMap<FileId, LiveText>,
}

impl FsProject {
    pub fn new(root: impl Into<PathBuf>, config: &IndexConfig) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            filter: config.path_filter()?,
            overlay: DashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Records the buffer of an open document; it shadows the file on disk until closed.
    pub fn set_overlay(&self, file: FileId, text: impl Into<Arc<str>>, version: i32) {
        self.overlay
            .insert(file, LiveText::new(text, Some(version)));
    }

    pub fn remove_overlay(&self, file: &FileId) -> Option<LiveText> {
        self.overlay.remove(file).map(|(_, live)| live)
    }

    pub fn is_open(&self, file: &FileId) -> bool {
        self.overlay.contains_key(file)
    }

    /// Whether `path` is selected by the include/exclude globs.
    pub fn is_relevant(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.filter.is_match(relative)
    }

    fn collect_paths(root: &Path, filter: &PathFilter) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = WalkBuilder::new(root)
            .build()
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let path = entry.path();
                let relative = path.strip_prefix(root).ok()?;
                if path.is_file() && filter.is_match(relative) {
                    return Some(path.to_path_buf());
                }
                None
            })
            .collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl ProjectSource for FsProject {
    async fn enumerate(&self) -> Result<Vec<FileId>> {
        let root = self.root.clone();
        let filter = self.filter.clone();
        let paths = tokio::task::spawn_blocking(move || Self::collect_paths(&root, &filter))
            .await
            .map_err(|err| SmaliscopeError::Internal(format!("file walk failed: {err}")))?;
        Ok(paths.into_iter().map(FileId::from).collect())
    }

    async fn read(&self, file: &FileId) -> Result<Arc<str>> {
        let text = tokio::fs::read_to_string(file.path()).await?;
        Ok(Arc::from(text))
    }

    async fn open_live(&self, file: &FileId) -> Result<LiveText> {
        if let Some(live) = self.overlay.get(file) {
            return Ok(live.clone());
        }
        Ok(LiveText::new(self.read(file).await?, None))
    }
}
