//! Where project files come from: enumeration, reading and live editor buffers.

pub mod fs;
pub mod memory;

pub use fs::FsProject;
pub use memory::MemoryProject;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity of one project file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(PathBuf);

impl FileId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|name| name.to_str())
    }

    /// The file `relative` would be at after replacing this file's trailing
    /// `old_relative` components, or a sibling named after the last component of
    /// `relative` when the path does not end with them.
    pub fn relocated(&self, old_relative: &str, relative: &str) -> FileId {
        let old = Path::new(old_relative);
        if self.0.ends_with(old) {
            let mut base = self.0.clone();
            for _ in old.components() {
                base.pop();
            }
            return FileId(base.join(relative));
        }
        let name = Path::new(relative)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(relative));
        FileId(self.0.with_file_name(name))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for FileId {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&str> for FileId {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}

impl From<&Path> for FileId {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

/// Document text as an editor sees it. `version` is absent for text read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveText {
    pub text: Arc<str>,
    pub version: Option<i32>,
}

impl LiveText {
    pub fn new(text: impl Into<Arc<str>>, version: Option<i32>) -> Self {
        Self {
            text: text.into(),
            version,
        }
    }
}

/// File enumeration and reading, supplied by the host.
#[async_trait]
pub trait ProjectSource: Send + Sync {
    /// Every indexable file, sorted.
    async fn enumerate(&self) -> Result<Vec<FileId>>;

    /// The saved content of `file`.
    async fn read(&self, file: &FileId) -> Result<Arc<str>>;

    /// The content of `file` preferring an open editor buffer over the saved one.
    async fn open_live(&self, file: &FileId) -> Result<LiveText> {
        Ok(LiveText::new(self.read(file).await?, None))
    }
}
