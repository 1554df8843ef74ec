//! Project-wide index of parsed classes.
//!
//! Every known file has an entry recording its parse state and the identifier it
//! declares. Parsed classes live in a [`ClassCache`]; when one is evicted it is parsed
//! again from the project source on next use. The identifier map is never affected by
//! eviction.

mod hierarchy;
mod occurrences;

use crate::cache::ClassCache;
use crate::config::IndexConfig;
use crate::model::{Class, Diagnostic, DiagnosticKind, Range, SmaliType, SourceText};
use crate::parser::parse_class;
use crate::project::{FileId, ProjectSource};
use dashmap::{DashMap, DashSet};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use xxhash_rust::xxh3::xxh3_64;

/// A span inside one project file.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub file: FileId,
    pub range: Range,
}

impl Location {
    pub fn new(file: FileId, range: Range) -> Self {
        Self { file, range }
    }
}

/// Identity of one version of a file's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub version: Option<i32>,
    pub hash: u64,
}

impl Stamp {
    pub fn of(text: &str, version: Option<i32>) -> Self {
        Self {
            version,
            hash: xxh3_64(text.as_bytes()),
        }
    }

    /// True when `self` carries an editor version older than `current`'s.
    pub fn is_older_than(&self, current: &Stamp) -> bool {
        matches!((self.version, current.version), (Some(new), Some(old)) if new < old)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FileState {
    /// Enumerated but never parsed.
    Unparsed,
    /// `text` is what parsed; an evicted class is rebuilt from it.
    Parsed { identifier: String, text: Arc<str> },
    /// The last parse failed; `identifier` and `last_good` come from the last
    /// successful parse.
    Failed {
        identifier: Option<String>,
        last_good: Option<Arc<str>>,
    },
}

impl FileState {
    fn identifier(&self) -> Option<&str> {
        match self {
            FileState::Unparsed => None,
            FileState::Parsed { identifier, .. } => Some(identifier),
            FileState::Failed { identifier, .. } => identifier.as_deref(),
        }
    }

    fn good_text(&self) -> Option<&Arc<str>> {
        match self {
            FileState::Unparsed => None,
            FileState::Parsed { text, .. } => Some(text),
            FileState::Failed { last_good, .. } => last_good.as_ref(),
        }
    }
}

#[derive(Debug, Clone)]
struct FileEntry {
    state: FileState,
    stamp: Option<Stamp>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    pub files: usize,
    pub parsed: usize,
    pub failed: usize,
    pub unparsed: usize,
    pub identifiers: usize,
    pub cached_classes: usize,
    pub cached_bytes: usize,
}

pub struct ProjectIndex {
    source: Arc<dyn ProjectSource>,
    config: IndexConfig,
    files: DashMap<FileId, FileEntry>,
    by_identifier: DashMap<String, BTreeSet<FileId>>,
    diagnostics: DashMap<FileId, Vec<Diagnostic>>,
    /// Files whose diagnostics changed because another file changed.
    touched: DashSet<FileId>,
    cache: ClassCache,
    ready: watch::Sender<bool>,
}

impl ProjectIndex {
    pub fn new(source: Arc<dyn ProjectSource>, config: IndexConfig) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            cache: ClassCache::new(config.cache_budget_bytes),
            source,
            config,
            files: DashMap::new(),
            by_identifier: DashMap::new(),
            diagnostics: DashMap::new(),
            touched: DashSet::new(),
            ready,
        }
    }

    pub fn source(&self) -> &Arc<dyn ProjectSource> {
        &self.source
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    /// Resolves once the initial project load has finished.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Enumerates the project and registers every file, parsing them when the
    /// configuration asks for preloading. Flips the ready flag when done, even if
    /// cancelled part way.
    pub async fn load_project(&self, cancel: &CancellationToken) -> crate::error::Result<()> {
        let started = Instant::now();
        let files = match self.source.enumerate().await {
            Ok(files) => files,
            Err(err) => {
                self.mark_ready();
                return Err(err);
            }
        };

        let mut failed = 0;
        for file in &files {
            if cancel.is_cancelled() {
                tracing::info!("Project load cancelled");
                break;
            }
            if !self.config.preload {
                self.register(file.clone());
                continue;
            }
            match self.source.open_live(file).await {
                Ok(live) => {
                    if self.load_or_refresh(file, live.text, live.version).is_err() {
                        failed += 1;
                    }
                }
                Err(err) => {
                    tracing::warn!("Failed to read {}: {}", file, err);
                    self.register(file.clone());
                }
            }
        }

        self.mark_ready();
        tracing::info!(
            "Indexed {} files ({} failed, {} identifiers) in {:?}",
            files.len(),
            failed,
            self.by_identifier.len(),
            started.elapsed()
        );
        Ok(())
    }

    /// Makes `file` known without reading it.
    pub fn register(&self, file: FileId) {
        self.files.entry(file).or_insert(FileEntry {
            state: FileState::Unparsed,
            stamp: None,
        });
    }

    /// Parses `text` as the new content of `file`.
    ///
    /// On success the class replaces the previous one and the file's diagnostics are
    /// reset. On failure the diagnostic is recorded and the previous class stays. Text
    /// whose stamp matches the last one seen is not parsed again, and text carrying an
    /// older editor version than the last one seen leaves the index untouched.
    pub fn load_or_refresh(
        &self,
        file: &FileId,
        text: Arc<str>,
        version: Option<i32>,
    ) -> Result<Arc<Class>, Diagnostic> {
        let stamp = Stamp::of(&text, version);
        let previous = self.files.get(file).map(|entry| entry.value().clone());

        if let Some(previous) = &previous {
            if let Some(current) = previous.stamp {
                if stamp.is_older_than(&current) {
                    tracing::debug!(
                        "Discarding stale version {:?} of {} (have {:?})",
                        version,
                        file,
                        current.version
                    );
                    return match self.materialize(file, &previous.state) {
                        Some(class) => Ok(class),
                        None => Err(self.first_fatal_diagnostic(file).unwrap_or_else(|| {
                            Diagnostic::internal(
                                Range::default(),
                                format!("stale version {version:?} of {file} has nothing to fall back on"),
                            )
                        })),
                    };
                }
                if current.hash == stamp.hash {
                    match &previous.state {
                        FileState::Failed { .. } => {
                            if let Some(diagnostic) = self.first_fatal_diagnostic(file) {
                                return Err(diagnostic);
                            }
                        }
                        FileState::Parsed { .. } => {
                            if let Some(class) = self.materialize(file, &previous.state) {
                                return Ok(class);
                            }
                        }
                        FileState::Unparsed => {}
                    }
                }
            }
        }

        let previous_identifier = previous
            .as_ref()
            .and_then(|entry| entry.state.identifier().map(str::to_string));

        match parse_class(Arc::new(SourceText::new(text.clone()))) {
            Ok(class) => {
                let class = Arc::new(class);
                let identifier = class.identifier().to_string();
                tracing::debug!("Parsed {} from {}", identifier, file);

                if let Some(old) = previous_identifier.filter(|old| *old != identifier) {
                    self.unmap(&old, file);
                }
                self.by_identifier
                    .entry(identifier.clone())
                    .or_default()
                    .insert(file.clone());
                self.files.insert(
                    file.clone(),
                    FileEntry {
                        state: FileState::Parsed {
                            identifier: identifier.clone(),
                            text,
                        },
                        stamp: Some(stamp),
                    },
                );
                self.cache.insert(file.clone(), class.clone());

                let conflicts = self.conflicts(&class, file);
                if conflicts.is_empty() {
                    self.diagnostics.remove(file);
                } else {
                    self.diagnostics.insert(file.clone(), conflicts);
                }
                Ok(class)
            }
            Err(diagnostic) => {
                tracing::warn!("Failed to parse {}: {}", file, diagnostic);
                let last_good = previous
                    .as_ref()
                    .and_then(|entry| entry.state.good_text().cloned());
                self.files.insert(
                    file.clone(),
                    FileEntry {
                        state: FileState::Failed {
                            identifier: previous_identifier,
                            last_good,
                        },
                        stamp: Some(stamp),
                    },
                );
                self.diagnostics
                    .insert(file.clone(), vec![diagnostic.clone()]);
                Err(diagnostic)
            }
        }
    }

    fn conflicts(&self, class: &Class, file: &FileId) -> Vec<Diagnostic> {
        let Some(files) = self.by_identifier.get(class.identifier()) else {
            return Vec::new();
        };
        let others: Vec<String> = files
            .iter()
            .filter(|other| *other != file)
            .map(|other| other.to_string())
            .collect();
        if others.is_empty() {
            return Vec::new();
        }
        tracing::warn!(
            "{} is declared by {} and {}",
            class.identifier(),
            file,
            others.join(", ")
        );
        vec![Diagnostic::conflict(
            class.name.range(),
            conflict_message(class.identifier(), &others),
        )]
    }

    /// Brings the conflict warnings of the files still declaring `identifier` in line
    /// with the current set of declarations.
    fn refresh_conflicts(&self, identifier: &str) {
        let files: Vec<FileId> = self
            .by_identifier
            .get(identifier)
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default();
        for file in &files {
            let others: Vec<String> = files
                .iter()
                .filter(|other| *other != file)
                .map(|other| other.to_string())
                .collect();
            let Some(mut diagnostics) = self.diagnostics.get_mut(file) else {
                continue;
            };
            if !diagnostics.iter().any(|d| d.kind == DiagnosticKind::Conflict) {
                continue;
            }
            if others.is_empty() {
                diagnostics.retain(|d| d.kind != DiagnosticKind::Conflict);
            } else {
                for diagnostic in diagnostics
                    .iter_mut()
                    .filter(|d| d.kind == DiagnosticKind::Conflict)
                {
                    diagnostic.message = conflict_message(identifier, &others);
                }
            }
            drop(diagnostics);
            self.diagnostics.remove_if(file, |_, diagnostics| diagnostics.is_empty());
            self.touched.insert(file.clone());
        }
    }

    /// Files whose diagnostics changed as a side effect since the last call.
    pub fn drain_touched(&self) -> Vec<FileId> {
        let files: Vec<FileId> = self.touched.iter().map(|file| file.key().clone()).collect();
        for file in &files {
            self.touched.remove(file);
        }
        files
    }

    fn first_fatal_diagnostic(&self, file: &FileId) -> Option<Diagnostic> {
        self.diagnostics
            .get(file)?
            .iter()
            .find(|diagnostic| diagnostic.is_fatal())
            .cloned()
    }

    fn unmap(&self, identifier: &str, file: &FileId) {
        let remaining = match self.by_identifier.get_mut(identifier) {
            Some(mut files) => {
                files.remove(file);
                files.len()
            }
            None => return,
        };
        if remaining == 0 {
            self.by_identifier
                .remove_if(identifier, |_, files| files.is_empty());
        } else {
            self.refresh_conflicts(identifier);
        }
    }

    /// Forgets `file` entirely.
    pub fn remove_file(&self, file: &FileId) {
        if let Some((_, entry)) = self.files.remove(file) {
            if let Some(identifier) = entry.state.identifier() {
                self.unmap(identifier, file);
            }
        }
        self.cache.remove(file);
        self.diagnostics.remove(file);
        tracing::debug!("Removed {}", file);
    }

    /// Drops every entry; the index is empty and not ready afterwards.
    pub fn clear(&self) {
        self.files.clear();
        self.by_identifier.clear();
        self.diagnostics.clear();
        self.touched.clear();
        self.cache.clear();
        self.ready.send_replace(false);
    }

    pub fn diagnostics(&self, file: &FileId) -> Vec<Diagnostic> {
        self.diagnostics
            .get(file)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Every file with at least one diagnostic, sorted.
    pub fn files_with_diagnostics(&self) -> Vec<(FileId, Vec<Diagnostic>)> {
        let mut all: Vec<(FileId, Vec<Diagnostic>)> = self
            .diagnostics
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn known_files(&self) -> Vec<FileId> {
        let mut files: Vec<FileId> = self.files.iter().map(|entry| entry.key().clone()).collect();
        files.sort();
        files
    }

    pub fn contains_file(&self, file: &FileId) -> bool {
        self.files.contains_key(file)
    }

    /// Every declared class identifier, sorted.
    pub fn identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<String> = self
            .by_identifier
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        identifiers.sort();
        identifiers
    }

    /// The identifier `file` declares according to its last successful parse.
    pub fn identifier_of(&self, file: &FileId) -> Option<String> {
        self.files
            .get(file)?
            .state
            .identifier()
            .map(str::to_string)
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            files: self.files.len(),
            identifiers: self.by_identifier.len(),
            cached_classes: self.cache.len(),
            cached_bytes: self.cache.total_bytes(),
            ..IndexStats::default()
        };
        for entry in self.files.iter() {
            match entry.state {
                FileState::Unparsed => stats.unparsed += 1,
                FileState::Parsed { .. } => stats.parsed += 1,
                FileState::Failed { .. } => stats.failed += 1,
            }
        }
        stats
    }

    /// The current class of `file`. An evicted class is rebuilt from the last text
    /// that parsed; a file never parsed is read from the project.
    pub async fn class(&self, file: &FileId) -> Option<Arc<Class>> {
        if let Some(class) = self.cache.get(file) {
            return Some(class);
        }
        let state = self.files.get(file).map(|entry| entry.state.clone());
        match state {
            Some(FileState::Unparsed) | None => {}
            Some(state) => return self.materialize(file, &state),
        }
        let live = match self.source.open_live(file).await {
            Ok(live) => live,
            Err(err) => {
                tracing::debug!("Cannot read {}: {}", file, err);
                return None;
            }
        };
        self.load_or_refresh(file, live.text, live.version).ok()
    }

    /// The cached class of `file`, or the one rebuilt from the last text that parsed.
    fn materialize(&self, file: &FileId, state: &FileState) -> Option<Arc<Class>> {
        if let Some(class) = self.cache.get(file) {
            return Some(class);
        }
        let text = state.good_text()?.clone();
        match parse_class(Arc::new(SourceText::new(text))) {
            Ok(class) => {
                let class = Arc::new(class);
                tracing::debug!("Rebuilt evicted class of {}", file);
                let _ = self.cache.insert(file.clone(), class.clone());
                Some(class)
            }
            Err(diagnostic) => {
                tracing::warn!("Cannot rebuild {}: {}", file, diagnostic);
                None
            }
        }
    }

    /// The text the editor shows for `file`: the open buffer, else the file on disk.
    /// Point queries run against this text, even while it does not parse.
    pub async fn document(&self, file: &FileId) -> Option<Arc<SourceText>> {
        match self.source.open_live(file).await {
            Ok(live) => Some(Arc::new(SourceText::new(live.text))),
            Err(err) => {
                tracing::debug!("Cannot read {}: {}", file, err);
                self.indexed_text(file)
            }
        }
    }

    fn indexed_text(&self, file: &FileId) -> Option<Arc<SourceText>> {
        if let Some(class) = self.cache.get(file) {
            return Some(class.source().clone());
        }
        let entry = self.files.get(file)?;
        let text = entry.state.good_text()?.clone();
        Some(Arc::new(SourceText::new(text)))
    }

    /// The text of `file` for project-wide searches, from its cached class when there
    /// is one.
    pub async fn source_of(&self, file: &FileId) -> Option<Arc<SourceText>> {
        if let Some(class) = self.cache.get(file) {
            return Some(class.source().clone());
        }
        match self.source.open_live(file).await {
            Ok(live) => Some(Arc::new(SourceText::new(live.text))),
            Err(err) => {
                tracing::debug!("Cannot read {}: {}", file, err);
                None
            }
        }
    }

    /// Every class declaring `identifier`, with its file. Files that are known but not
    /// parsed yet are parsed on demand: first those whose path matches the
    /// conventional location of the class, then, if nothing was found, all of them.
    pub async fn find_classes(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Vec<(FileId, Arc<Class>)> {
        self.wait_ready().await;
        let mut found = self.mapped_classes(identifier).await;

        let unparsed: Vec<FileId> = self
            .files
            .iter()
            .filter(|entry| entry.state == FileState::Unparsed)
            .map(|entry| entry.key().clone())
            .collect();
        if unparsed.is_empty() {
            return found;
        }

        let conventional = SmaliType::from_descriptor(identifier)
            .and_then(|ty| ty.file_path());
        let (likely, rest): (Vec<FileId>, Vec<FileId>) =
            unparsed.into_iter().partition(|file| match &conventional {
                Some(path) => file.path().ends_with(path),
                None => false,
            });

        for file in likely {
            if cancel.is_cancelled() {
                return found;
            }
            if let Some(class) = self.class(&file).await {
                if class.identifier() == identifier && !found.iter().any(|(f, _)| *f == file) {
                    found.push((file, class));
                }
            }
        }
        if !found.is_empty() {
            return found;
        }

        for file in rest {
            if cancel.is_cancelled() {
                break;
            }
            if let Some(class) = self.class(&file).await {
                if class.identifier() == identifier {
                    found.push((file, class));
                }
            }
        }
        found
    }

    async fn mapped_classes(&self, identifier: &str) -> Vec<(FileId, Arc<Class>)> {
        let candidates: Vec<FileId> = self
            .by_identifier
            .get(identifier)
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default();
        let mut found = Vec::with_capacity(candidates.len());
        for file in candidates {
            if let Some(class) = self.class(&file).await {
                if class.identifier() == identifier {
                    found.push((file, class));
                }
            }
        }
        found
    }
}

fn conflict_message(identifier: &str, others: &[String]) -> String {
    let readable = SmaliType::from_descriptor(identifier)
        .map(|ty| ty.readable())
        .unwrap_or_else(|| identifier.to_string());
    format!("Class {} is also declared in {}", readable, others.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{LiveText, MemoryProject};
    use async_trait::async_trait;

    fn index_of(files: &[(&str, &str)]) -> ProjectIndex {
        let project = MemoryProject::with_files(files.iter().copied());
        ProjectIndex::new(Arc::new(project), IndexConfig::default())
    }

    const FOO: &str = ".class public Lcom/example/Foo;\n.super Ljava/lang/Object;\n";

    #[test]
    fn stamp_orders_editor_versions_only() {
        let old = Stamp::of("a", Some(3));
        let new = Stamp::of("b", Some(4));
        assert!(old.is_older_than(&new));
        assert!(!new.is_older_than(&old));
        assert!(!Stamp::of("a", None).is_older_than(&new));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_class() {
        let index = index_of(&[]);
        let file = FileId::new("Foo.smali");
        index.load_or_refresh(&file, FOO.into(), Some(1)).unwrap();

        let err = index
            .load_or_refresh(&file, ".class public Lcom/example/Foo;\n".into(), Some(2))
            .unwrap_err();
        assert!(err.message.contains(".super"));
        assert_eq!(index.diagnostics(&file), vec![err]);
        assert_eq!(index.identifier_of(&file).as_deref(), Some("Lcom/example/Foo;"));
        assert!(index.class(&file).await.is_some());

        index.load_or_refresh(&file, FOO.into(), Some(3)).unwrap();
        assert!(index.diagnostics(&file).is_empty());
    }

    #[test]
    fn stale_versions_leave_the_index_untouched() {
        let index = index_of(&[]);
        let file = FileId::new("Foo.smali");
        index.load_or_refresh(&file, FOO.into(), Some(5)).unwrap();
        let renamed = ".class public Lcom/example/Bar;\n.super Ljava/lang/Object;\n";
        index.load_or_refresh(&file, renamed.into(), Some(4)).unwrap();
        assert_eq!(index.identifier_of(&file).as_deref(), Some("Lcom/example/Foo;"));
        assert_eq!(index.identifiers(), vec!["Lcom/example/Foo;".to_string()]);
    }

    #[test]
    fn renaming_the_declared_class_moves_the_mapping() {
        let index = index_of(&[]);
        let file = FileId::new("Foo.smali");
        index.load_or_refresh(&file, FOO.into(), None).unwrap();
        let renamed = ".class public Lcom/example/Bar;\n.super Ljava/lang/Object;\n";
        index.load_or_refresh(&file, renamed.into(), None).unwrap();
        assert_eq!(index.identifiers(), vec!["Lcom/example/Bar;".to_string()]);

        index.remove_file(&file);
        assert!(index.identifiers().is_empty());
        assert!(index.known_files().is_empty());
    }

    #[test]
    fn duplicate_identifiers_are_reported_on_the_new_file() {
        let index = index_of(&[]);
        let a = FileId::new("a/Foo.smali");
        let b = FileId::new("b/Foo.smali");
        index.load_or_refresh(&a, FOO.into(), None).unwrap();
        index.load_or_refresh(&b, FOO.into(), None).unwrap();
        assert!(index.diagnostics(&a).is_empty());
        let diagnostics = index.diagnostics(&b);
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_fatal());
        assert!(diagnostics[0].message.contains("a/Foo.smali"));
    }

    #[tokio::test]
    async fn lazy_projects_parse_on_demand() {
        let project = MemoryProject::with_files([
            ("smali/com/example/Foo.smali", FOO),
            ("smali/misc/Renamed.smali", ".class LOther;\n.super Ljava/lang/Object;\n"),
        ]);
        let config = IndexConfig {
            preload: false,
            ..IndexConfig::default()
        };
        let index = ProjectIndex::new(Arc::new(project), config);
        index.load_project(&CancellationToken::new()).await.unwrap();
        assert_eq!(index.stats().unparsed, 2);

        let cancel = CancellationToken::new();
        let found = index.find_classes("Lcom/example/Foo;", &cancel).await;
        assert_eq!(found.len(), 1);
        assert_eq!(index.stats().unparsed, 1);

        // Misplaced files are found by the exhaustive fallback.
        let found = index.find_classes("LOther;", &cancel).await;
        assert_eq!(found.len(), 1);
        assert_eq!(index.stats().parsed, 2);
    }

    fn tiny_budget_index() -> ProjectIndex {
        let config = IndexConfig {
            cache_budget_bytes: 10,
            ..IndexConfig::default()
        };
        let index = ProjectIndex::new(Arc::new(MemoryProject::new()), config);
        index.mark_ready();
        index
    }

    #[tokio::test]
    async fn evicted_class_survives_a_failed_refresh() {
        let index = tiny_budget_index();
        let file = FileId::new("Big.smali");
        let good = ".class public LBig;\n.super Ljava/lang/Object;\n";
        index.load_or_refresh(&file, good.into(), Some(1)).unwrap();
        assert_eq!(index.stats().cached_classes, 0);
        index
            .load_or_refresh(&file, ".class public LBig;\n".into(), Some(2))
            .unwrap_err();

        let class = index.class(&file).await.unwrap();
        assert_eq!(class.identifier(), "LBig;");
        let found = index.find_classes("LBig;", &CancellationToken::new()).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, file);
    }

    #[test]
    fn stale_version_answers_with_the_indexed_class() {
        let index = tiny_budget_index();
        let file = FileId::new("Foo.smali");
        index.load_or_refresh(&file, FOO.into(), Some(5)).unwrap();
        let renamed = ".class public Lcom/example/Bar;\n.super Ljava/lang/Object;\n";
        let class = index.load_or_refresh(&file, renamed.into(), Some(4)).unwrap();
        assert_eq!(class.identifier(), "Lcom/example/Foo;");
    }

    #[test]
    fn stale_version_of_a_file_that_never_parsed_is_an_error() {
        let index = index_of(&[]);
        let file = FileId::new("Foo.smali");
        let broken = index
            .load_or_refresh(&file, ".class LFoo;\n".into(), Some(5))
            .unwrap_err();
        let stale = index
            .load_or_refresh(&file, FOO.into(), Some(4))
            .unwrap_err();
        assert_eq!(stale, broken);
        assert!(index.identifier_of(&file).is_none());
    }

    #[test]
    fn conflicts_follow_the_remaining_declarations() {
        let index = index_of(&[]);
        let [a, b, c] = ["a/Foo.smali", "b/Foo.smali", "c/Foo.smali"].map(|path| FileId::new(path));
        for file in [&a, &b, &c] {
            index.load_or_refresh(file, FOO.into(), None).unwrap();
        }
        assert!(index.diagnostics(&b)[0].message.contains("a/Foo.smali"));

        index.remove_file(&a);
        let message = &index.diagnostics(&b)[0].message;
        assert!(message.contains("c/Foo.smali") && !message.contains("a/Foo.smali"));
        let mut touched = index.drain_touched();
        touched.sort();
        assert_eq!(touched, vec![b.clone(), c.clone()]);

        index.remove_file(&b);
        assert!(index.diagnostics(&c).is_empty());
        assert!(index.files_with_diagnostics().is_empty());
    }

    /// Cancels `cancel` as soon as a file is read.
    struct CancelOnRead {
        inner: MemoryProject,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl ProjectSource for CancelOnRead {
        async fn enumerate(&self) -> crate::Result<Vec<FileId>> {
            self.inner.enumerate().await
        }

        async fn read(&self, file: &FileId) -> crate::Result<Arc<str>> {
            self.inner.read(file).await
        }

        async fn open_live(&self, file: &FileId) -> crate::Result<LiveText> {
            self.cancel.cancel();
            self.inner.open_live(file).await
        }
    }

    async fn lazy_index(cancel: &CancellationToken) -> ProjectIndex {
        let project = CancelOnRead {
            inner: MemoryProject::with_files([
                ("A.smali", ".class LA;\n.super Ljava/lang/Object;\n"),
                ("B.smali", ".class LB;\n.super LA;\n"),
                ("C.smali", ".class LC;\n.super LA;\n"),
            ]),
            cancel: cancel.clone(),
        };
        let config = IndexConfig {
            preload: false,
            ..IndexConfig::default()
        };
        let index = ProjectIndex::new(Arc::new(project), config);
        index.load_project(&CancellationToken::new()).await.unwrap();
        index
    }

    #[tokio::test]
    async fn cancelled_queries_return_what_they_have() {
        let cancel = CancellationToken::new();
        let index = lazy_index(&cancel).await;
        cancel.cancel();
        assert!(index.find_classes("LA;", &cancel).await.is_empty());
        let occurrences = index
            .find_symbol_occurrences(&["LA;".to_string()], &cancel)
            .await;
        assert!(occurrences["LA;"].is_empty());
        assert_eq!(index.stats().unparsed, 3);
    }

    #[tokio::test]
    async fn cancellation_between_files_keeps_partial_results() {
        let cancel = CancellationToken::new();
        let index = lazy_index(&cancel).await;
        // no file sits at the conventional path, so every file is a candidate
        assert!(index.find_classes("LMissing;", &cancel).await.is_empty());
        assert_eq!(index.stats().unparsed, 2);

        let cancel = CancellationToken::new();
        let index = lazy_index(&cancel).await;
        let occurrences = index
            .find_symbol_occurrences(&["LA;".to_string()], &cancel)
            .await;
        let found = &occurrences["LA;"];
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file, FileId::new("A.smali"));
    }
}
