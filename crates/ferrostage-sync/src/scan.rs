//! Directory enumeration
//!
//! The scanner walks a root directory and produces the flat record list and
//! error list a [`Snapshot`] is built from. Paths matching any exclusion
//! pattern are pruned, so excluded directories are never descended into.

use chrono::{DateTime, Utc};
use ferrostage_types::{AttributeFlags, Error, InventoryRecord, Result, Snapshot};
use regex::Regex;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Records and unreadable paths found under a root
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    /// File records in enumeration order
    pub records: Vec<InventoryRecord>,
    /// Paths that could not be read
    pub error_paths: Vec<String>,
}

/// Directory scanner with regex based exclusion
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    exclude: Vec<Regex>,
    follow_links: bool,
}

impl Scanner {
    /// Create a new scanner without exclusions
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude every path matching one of `patterns`
    pub fn with_exclude_patterns<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self> {
        for pattern in patterns {
            let regex = Regex::new(pattern.as_ref()).map_err(|e| {
                Error::config(format!("invalid exclude pattern '{}': {}", pattern.as_ref(), e))
            })?;
            self.exclude.push(regex);
        }
        Ok(self)
    }

    /// Follow symbolic links while scanning
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Enumerate all files under `root`
    pub fn scan(&self, root: &Path) -> ScanOutput {
        let mut output = ScanOutput::default();

        let walker = WalkDir::new(root)
            .follow_links(self.follow_links)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_excluded(entry.path()));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => match entry.metadata() {
                    Ok(metadata) => output.records.push(record_for(&entry, &metadata)),
                    Err(e) => {
                        debug!("Cannot read metadata for {}: {}", entry.path().display(), e);
                        output.error_paths.push(entry.path().display().to_string());
                    }
                },
                Ok(_) => {}
                Err(e) => match e.path() {
                    Some(path) => {
                        debug!("Cannot read {}: {}", path.display(), e);
                        output.error_paths.push(path.display().to_string());
                    }
                    None => warn!("Scan error without a path: {}", e),
                },
            }
        }

        info!(
            "Scanned {}: {} files, {} errors",
            root.display(),
            output.records.len(),
            output.error_paths.len()
        );
        output
    }

    /// Scan `root` and wrap the result in a snapshot
    pub fn capture(&self, root: &Path) -> Result<Snapshot> {
        let root = absolute(root)?;
        if !root.is_dir() {
            return Err(Error::FileNotFound { path: root });
        }
        let output = self.scan(&root);
        Ok(Snapshot::new(
            root.display().to_string(),
            output.records,
            output.error_paths,
        ))
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.exclude.iter().any(|regex| regex.is_match(&path))
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn record_for(entry: &DirEntry, metadata: &Metadata) -> InventoryRecord {
    let last_write: DateTime<Utc> = metadata
        .modified()
        .map_or_else(|_| DateTime::from(UNIX_EPOCH), DateTime::from);
    let created = metadata.created().map_or(last_write, DateTime::from);

    InventoryRecord::new(entry.path().display().to_string(), metadata.len(), last_write)
        .with_created(created)
        .with_attributes(attributes_for(entry, metadata))
}

#[cfg(windows)]
fn attributes_for(_entry: &DirEntry, metadata: &Metadata) -> AttributeFlags {
    use std::os::windows::fs::MetadataExt;
    AttributeFlags::from_bits(metadata.file_attributes())
}

#[cfg(not(windows))]
fn attributes_for(entry: &DirEntry, metadata: &Metadata) -> AttributeFlags {
    use ferrostage_types::AttributeFlag;

    let mut flags = AttributeFlags::new();
    if metadata.permissions().readonly() {
        flags.insert(AttributeFlag::ReadOnly);
    }
    if entry.file_name().to_string_lossy().starts_with('.') {
        flags.insert(AttributeFlag::Hidden);
    }
    if entry.path_is_symlink() {
        flags.insert(AttributeFlag::ReparsePoint);
    }
    if flags.is_empty() {
        flags.insert(AttributeFlag::Normal);
    }
    flags
}
