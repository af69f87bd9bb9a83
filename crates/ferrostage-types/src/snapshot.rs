//! Inventory records and snapshots

use crate::attributes::AttributeFlags;
use crate::path::{file_name_of, is_within, path_key};
use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, Local, Utc};
use std::collections::HashSet;

/// Kind of an inventoried entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FileKind {
    /// Regular file
    #[default]
    File,
    /// Directory
    Directory,
}

/// Identity and metadata of one file at capture time
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InventoryRecord {
    /// Absolute path, unique within its snapshot
    pub path: String,
    /// Display name (final path segment)
    pub name: String,
    /// Entry kind
    pub kind: FileKind,
    /// Size in bytes
    pub size: u64,
    /// Last write time
    pub last_write: DateTime<Utc>,
    /// Creation time
    pub created: DateTime<Utc>,
    /// Attribute flags
    pub attributes: AttributeFlags,
}

impl InventoryRecord {
    /// Create a new file record; creation time defaults to the last write time
    pub fn new(path: impl Into<String>, size: u64, last_write: DateTime<Utc>) -> Self {
        let path = path.into();
        let name = file_name_of(&path).to_string();
        Self {
            path,
            name,
            kind: FileKind::File,
            size,
            last_write,
            created: last_write,
            attributes: AttributeFlags::new(),
        }
    }

    /// Set the creation time
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    /// Set the attribute flags
    pub fn with_attributes(mut self, attributes: AttributeFlags) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set the entry kind
    pub fn with_kind(mut self, kind: FileKind) -> Self {
        self.kind = kind;
        self
    }

    /// Case-insensitive comparison key of the path
    pub fn key(&self) -> String {
        path_key(&self.path)
    }
}

/// Point-in-time inventory of the files under a root path
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    /// Capture time in the capturing machine's local offset
    pub captured_at_local: DateTime<FixedOffset>,
    /// Capture time in UTC
    pub captured_at_utc: DateTime<Utc>,
    /// Root path the inventory was taken from
    pub root: String,
    /// Records in enumeration order
    pub records: Vec<InventoryRecord>,
    /// Paths that could not be read during capture
    #[cfg_attr(feature = "serde", serde(default))]
    pub error_paths: Vec<String>,
}

impl Snapshot {
    /// Create a new snapshot stamped with the current time
    pub fn new(
        root: impl Into<String>,
        records: Vec<InventoryRecord>,
        error_paths: Vec<String>,
    ) -> Self {
        let now = Local::now();
        Self {
            captured_at_local: now.fixed_offset(),
            captured_at_utc: now.with_timezone(&Utc),
            root: root.into(),
            records,
            error_paths,
        }
    }

    /// Override the capture timestamp
    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at_utc = captured_at;
        self.captured_at_local = captured_at.with_timezone(&Local).fixed_offset();
        self
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check whether the snapshot holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total size of all records in bytes
    pub fn total_size(&self) -> u64 {
        self.records.iter().map(|r| r.size).sum()
    }

    /// Check the snapshot invariants.
    ///
    /// Every record path must be unique ignoring case and must lie beneath the
    /// root path. Snapshots read from storage are validated before use.
    pub fn validate(&self) -> Result<()> {
        let root = path_key(&self.root);
        let root = root.trim_end_matches('/');
        let mut seen = HashSet::with_capacity(self.records.len());

        for record in &self.records {
            let key = record.key();
            if !root.is_empty() && !is_within(&key, root) {
                return Err(Error::snapshot(format!(
                    "record '{}' is outside root '{}'",
                    record.path, self.root
                )));
            }
            if !seen.insert(key) {
                return Err(Error::snapshot(format!(
                    "duplicate path '{}'",
                    record.path
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AttributeFlag;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_record_builder() {
        let record = InventoryRecord::new("/v/data/report.txt", 42, t0())
            .with_attributes(AttributeFlags::from_flags([AttributeFlag::Archive]));

        assert_eq!(record.name, "report.txt");
        assert_eq!(record.kind, FileKind::File);
        assert_eq!(record.created, t0());
        assert_eq!(record.key(), "/v/data/report.txt");
        assert_eq!(record.attributes.to_string(), "Archive");
    }

    #[test]
    fn test_validate_accepts_descendants() {
        let snapshot = Snapshot::new(
            "/v/",
            vec![
                InventoryRecord::new("/v/f1", 1, t0()),
                InventoryRecord::new("/V/sub/f2", 2, t0()),
            ],
            Vec::new(),
        );

        assert!(snapshot.validate().is_ok());
        assert_eq!(snapshot.total_size(), 3);
    }

    #[test]
    fn test_validate_rejects_case_insensitive_duplicates() {
        let snapshot = Snapshot::new(
            "/v",
            vec![
                InventoryRecord::new("/v/File", 1, t0()),
                InventoryRecord::new("/v/file", 1, t0()),
            ],
            Vec::new(),
        );

        let err = snapshot.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_validate_rejects_paths_outside_root() {
        let snapshot = Snapshot::new(
            "/v/data",
            vec![InventoryRecord::new("/v/database/f1", 1, t0())],
            Vec::new(),
        );

        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn test_captured_at_override() {
        let snapshot = Snapshot::new("/v", Vec::new(), Vec::new()).with_captured_at(t0());

        assert_eq!(snapshot.captured_at_utc, t0());
        assert_eq!(snapshot.captured_at_local.with_timezone(&Utc), t0());
        assert!(snapshot.is_empty());
    }
}
