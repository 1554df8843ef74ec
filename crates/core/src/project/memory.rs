use super::{FileId, LiveText, ProjectSource};
use crate::error::{Result, SmaliscopeError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// A project held entirely in memory.
#[derive(Default)]
pub struct MemoryProject {
    files: DashMap<FileId, LiveText>,
}

impl MemoryProject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<P, T>(files: impl IntoIterator<Item = (P, T)>) -> Self
    where
        P: Into<FileId>,
        T: Into<Arc<str>>,
    {
        let project = Self::new();
        for (path, text) in files {
            project.insert(path, text);
        }
        project
    }

    pub fn insert(&self, file: impl Into<FileId>, text: impl Into<Arc<str>>) {
        self.files.insert(file.into(), LiveText::new(text, None));
    }

    pub fn insert_versioned(&self, file: impl Into<FileId>, text: impl Into<Arc<str>>, version: i32) {
        self.files
            .insert(file.into(), LiveText::new(text, Some(version)));
    }

    pub fn remove(&self, file: &FileId) -> bool {
        self.files.remove(file).is_some()
    }
}

#[async_trait]
impl ProjectSource for MemoryProject {
    async fn enumerate(&self) -> Result<Vec<FileId>> {
        let mut files: Vec<FileId> = self.files.iter().map(|entry| entry.key().clone()).collect();
        files.sort();
        Ok(files)
    }

    async fn read(&self, file: &FileId) -> Result<Arc<str>> {
        Ok(self.open_live(file).await?.text)
    }

    async fn open_live(&self, file: &FileId) -> Result<LiveText> {
        self.files
            .get(file)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                SmaliscopeError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{file} is not part of the project"),
                ))
            })
    }
}
