//! Filesystem schema source cache.
//!
//! Scans a flat cache directory for YANG text files and registers them
//! with the repository. File names follow the `NAME.yang` /
//! `NAME@REVISION.yang` convention; anything else is skipped with a
//! warning. Content is never held in memory: registered sources are
//! backed by a provider that reads the file when the source is resolved.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::models::{is_valid_revision, PotentialSource, SourceIdentifier};
use crate::repository::{SharedSourceRepository, SourceProvider};

pub struct FilesystemSourceCache {
    dir: PathBuf,
}

impl FilesystemSourceCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Scans the cache directory and returns the identifiers of every
    /// recognizable source file, sorted for deterministic ordering.
    pub fn scan(&self) -> Result<Vec<SourceIdentifier>> {
        let mut found = Vec::new();

        // The cache is flat; subdirectories are not part of the layout.
        for entry in WalkDir::new(&self.dir).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            match parse_cache_file_name(path) {
                Some(identifier) => found.push(identifier),
                None => {
                    warn!("skipping cache file with unrecognized name: {}", path.display());
                }
            }
        }

        found.sort();
        Ok(found)
    }

    /// Scans the directory and registers everything found as a single
    /// text-format batch, so startup produces one catalog merge.
    pub async fn register_into(&self, repository: &SharedSourceRepository) -> Result<()> {
        let identifiers = self.scan()?;
        info!(
            "loaded {} schema source(s) from {}",
            identifiers.len(),
            self.dir.display()
        );
        if identifiers.is_empty() {
            return Ok(());
        }

        let provider = Arc::new(FileSourceProvider {
            dir: self.dir.clone(),
        });
        let batch = identifiers.into_iter().map(PotentialSource::text).collect();
        repository.register_sources(provider, batch).await
    }
}

/// Reads a cached source back from disk by reconstructing its file name.
struct FileSourceProvider {
    dir: PathBuf,
}

#[async_trait]
impl SourceProvider for FileSourceProvider {
    async fn read(&self, identifier: &SourceIdentifier) -> Result<Vec<u8>> {
        let path = self.dir.join(cache_file_name(identifier));
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read cached source {}", path.display()))?;
        Ok(bytes)
    }
}

fn cache_file_name(identifier: &SourceIdentifier) -> String {
    match &identifier.revision {
        Some(revision) => format!("{}@{}.yang", identifier.name, revision),
        None => format!("{}.yang", identifier.name),
    }
}

/// Parses `NAME.yang` or `NAME@REVISION.yang` into an identifier.
/// Returns `None` for anything that does not fit the convention.
fn parse_cache_file_name(path: &Path) -> Option<SourceIdentifier> {
    if path.extension()?.to_str()? != "yang" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    match stem.split_once('@') {
        None if !stem.is_empty() => Some(SourceIdentifier::new(stem, None)),
        Some((name, revision)) if !name.is_empty() && is_valid_revision(revision) => {
            Some(SourceIdentifier::new(name, Some(revision.to_string())))
        }
        _ => None,
    }
}
