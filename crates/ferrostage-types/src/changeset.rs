//! Changeset entries produced by comparing two snapshots

use crate::attributes::AttributeFlags;
use crate::path::parent_of;
use crate::snapshot::InventoryRecord;
use chrono::{DateTime, Utc};
use std::fmt;

/// Change status of a path between two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChangeStatus {
    /// Present only in the later snapshot
    Added,
    /// Present in both with differing metadata
    Modified,
    /// Present only in the earlier snapshot
    Deleted,
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "Added"),
            Self::Modified => write!(f, "Modified"),
            Self::Deleted => write!(f, "Deleted"),
        }
    }
}

/// One changed path
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangeEntry {
    /// Path of the file
    pub path: String,
    /// Kind of change
    pub status: ChangeStatus,
    /// Size in the earlier snapshot
    pub old_size: Option<u64>,
    /// Size in the later snapshot
    pub new_size: Option<u64>,
    /// Signed size difference
    pub size_delta: i64,
    /// Last write time in the earlier snapshot
    pub old_last_write: Option<DateTime<Utc>>,
    /// Last write time in the later snapshot
    pub new_last_write: Option<DateTime<Utc>>,
    /// Attribute flags in the earlier snapshot
    pub old_attributes: Option<AttributeFlags>,
    /// Attribute flags in the later snapshot
    pub new_attributes: Option<AttributeFlags>,
    /// Which fields differed, for modified entries
    pub reason: Option<String>,
    /// Containing directory
    pub directory: String,
}

fn signed(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

impl ChangeEntry {
    /// Entry for a file that only exists in the later snapshot
    pub fn added(after: &InventoryRecord) -> Self {
        Self {
            path: after.path.clone(),
            status: ChangeStatus::Added,
            old_size: None,
            new_size: Some(after.size),
            size_delta: signed(after.size),
            old_last_write: None,
            new_last_write: Some(after.last_write),
            old_attributes: None,
            new_attributes: Some(after.attributes.clone()),
            reason: None,
            directory: parent_of(&after.path).to_string(),
        }
    }

    /// Entry for a file whose metadata changed
    pub fn modified(
        before: &InventoryRecord,
        after: &InventoryRecord,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            path: after.path.clone(),
            status: ChangeStatus::Modified,
            old_size: Some(before.size),
            new_size: Some(after.size),
            size_delta: signed(after.size).saturating_sub(signed(before.size)),
            old_last_write: Some(before.last_write),
            new_last_write: Some(after.last_write),
            old_attributes: Some(before.attributes.clone()),
            new_attributes: Some(after.attributes.clone()),
            reason: Some(reason.into()),
            directory: parent_of(&after.path).to_string(),
        }
    }

    /// Entry for a file that only exists in the earlier snapshot
    pub fn deleted(before: &InventoryRecord) -> Self {
        Self {
            path: before.path.clone(),
            status: ChangeStatus::Deleted,
            old_size: Some(before.size),
            new_size: None,
            size_delta: -signed(before.size),
            old_last_write: Some(before.last_write),
            new_last_write: None,
            old_attributes: Some(before.attributes.clone()),
            new_attributes: None,
            reason: None,
            directory: parent_of(&before.path).to_string(),
        }
    }

    /// Size of the file as it should be transferred
    pub fn transfer_size(&self) -> u64 {
        self.new_size.or(self.old_size).unwrap_or(0)
    }

    /// Check whether this entry should be staged
    pub fn is_stageable(&self) -> bool {
        matches!(self.status, ChangeStatus::Added | ChangeStatus::Modified)
    }
}

/// Provenance of a changeset
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangesetMetadata {
    /// Root of the earlier snapshot
    pub before_root: String,
    /// Root of the later snapshot
    pub after_root: String,
    /// Capture time of the earlier snapshot
    pub before_captured_at: DateTime<Utc>,
    /// Capture time of the later snapshot
    pub after_captured_at: DateTime<Utc>,
    /// When the comparison ran
    pub generated_at: DateTime<Utc>,
    /// Number of excluded path prefixes applied
    pub excluded_paths: usize,
}

/// Ordered list of changes between two snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Changeset {
    /// Provenance
    pub metadata: ChangesetMetadata,
    /// Changes, Added/Modified first in later-snapshot order, then Deleted
    pub entries: Vec<ChangeEntry>,
}

/// Per-status counts of a changeset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangesetSummary {
    /// Number of added files
    pub added: usize,
    /// Number of modified files
    pub modified: usize,
    /// Number of deleted files
    pub deleted: usize,
    /// Sum of all size deltas
    pub net_size_delta: i64,
}

impl Changeset {
    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether nothing changed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries with the given status, in changeset order
    pub fn with_status(&self, status: ChangeStatus) -> impl Iterator<Item = &ChangeEntry> {
        self.entries.iter().filter(move |e| e.status == status)
    }

    /// Added and modified entries, in changeset order
    pub fn stageable(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.entries.iter().filter(|e| e.is_stageable())
    }

    /// Count entries per status
    pub fn summary(&self) -> ChangesetSummary {
        self.entries
            .iter()
            .fold(ChangesetSummary::default(), |mut summary, entry| {
                match entry.status {
                    ChangeStatus::Added => summary.added += 1,
                    ChangeStatus::Modified => summary.modified += 1,
                    ChangeStatus::Deleted => summary.deleted += 1,
                }
                summary.net_size_delta = summary.net_size_delta.saturating_add(entry.size_delta);
                summary
            })
    }
}
