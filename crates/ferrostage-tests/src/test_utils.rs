//! Shared fixtures for end-to-end tests
//!
//! A [`Workspace`] owns a temporary directory with a `live` tree to snapshot,
//! a `staging` root and a `restore` target.

use chrono::{DateTime, Duration, TimeZone, Utc};
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Fixed base timestamp so modification times are reproducible
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Deterministic file contents of `size` bytes
pub fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| ((i * 7 + 13) % 256) as u8).collect()
}

/// Set the last write time of `path`
pub fn set_mtime(path: &Path, time: DateTime<Utc>) {
    let mtime = FileTime::from_unix_time(time.timestamp(), time.timestamp_subsec_nanos());
    filetime::set_file_mtime(path, mtime).expect("Failed to set modification time");
}

/// Temporary directories for one test
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    /// Create a new workspace with empty `live`, `staging` and `restore` roots
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(temp_dir.path().join("live")).expect("Failed to create live dir");
        Self { temp_dir }
    }

    /// Workspace root
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Tree that gets snapshotted
    pub fn live(&self) -> PathBuf {
        self.path().join("live")
    }

    /// Staging root
    pub fn staging(&self) -> PathBuf {
        self.path().join("staging")
    }

    /// Deployment target
    pub fn restore(&self) -> PathBuf {
        self.path().join("restore")
    }

    /// Write a file below `live` with a fixed modification time
    pub fn write(&self, relative: &str, size: usize, mtime: DateTime<Utc>) -> PathBuf {
        let path = self.live().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, generate_test_data(size)).expect("Failed to write test file");
        set_mtime(&path, mtime);
        path
    }

    /// Shift the modification time of a file below `live`
    pub fn touch(&self, relative: &str, offset: Duration) -> PathBuf {
        let path = self.live().join(relative);
        set_mtime(&path, base_time() + offset);
        path
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}
