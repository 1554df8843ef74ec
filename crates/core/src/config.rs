use crate::error::{Result, SmaliscopeError};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE: &str = ".smaliscope/config.json";
pub const CACHE_BUDGET_ENV: &str = "SMALISCOPE_CACHE_BUDGET";
pub const DEFAULT_CACHE_BUDGET: usize = 64 * 1024 * 1024;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct IndexConfig {
    /// Globs, relative to the project root, selecting the files to index.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Upper bound on the summed source length of parsed classes kept in memory.
    pub cache_budget_bytes: usize,
    /// Parse every file during the initial load instead of on first use.
    pub preload: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*.smali".to_string()],
            exclude: Vec::new(),
            cache_budget_bytes: DEFAULT_CACHE_BUDGET,
            preload: true,
        }
    }
}

impl IndexConfig {
    /// Reads `<root>/.smaliscope/config.json` if present, then applies environment
    /// overrides.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        let mut config = if path.is_file() {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str(&text)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        let Ok(value) = std::env::var(CACHE_BUDGET_ENV) else {
            return;
        };
        match value.trim().parse::<usize>() {
            Ok(budget) => self.cache_budget_bytes = budget,
            Err(_) => tracing::warn!("Ignoring invalid {}={:?}", CACHE_BUDGET_ENV, value),
        }
    }

    pub fn path_filter(&self) -> Result<PathFilter> {
        Ok(PathFilter {
            include: build_globset("include", &self.include)?,
            exclude: build_globset("exclude", &self.exclude)?,
        })
    }
}

fn build_globset(key: &str, patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|err| {
            SmaliscopeError::Config(format!("invalid {key} glob {pattern:?}: {err}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| SmaliscopeError::Config(format!("failed to build {key} globset: {err}")))
}

/// Compiled include/exclude globs, matched against root-relative paths.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl PathFilter {
    pub fn is_match(&self, relative: &Path) -> bool {
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }
}
