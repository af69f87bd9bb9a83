//! Snapshot comparison
//!
//! [`DiffEngine::compare`] turns two snapshots of the same tree into a
//! [`Changeset`]. Only metadata is compared: size, last write time and the
//! attribute flag string. Paths that either snapshot failed to read are left
//! out of the comparison entirely, together with everything beneath them.

use chrono::{DateTime, Utc};
use ferrostage_types::path::{is_within, path_key};
use ferrostage_types::{
    AttributeFlags, ChangeEntry, Changeset, ChangesetMetadata, FileKind, InventoryRecord,
    Snapshot,
};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for snapshot comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffConfig {
    /// Last write times closer than this are considered equal
    pub timestamp_tolerance: Duration,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            timestamp_tolerance: Duration::from_secs(1),
        }
    }
}

/// Engine for comparing snapshots
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    config: DiffConfig,
}

impl DiffEngine {
    /// Create a new diff engine
    pub fn new(config: DiffConfig) -> Self {
        Self { config }
    }

    /// Compare two snapshots, excluding both snapshots' error paths
    pub fn compare(&self, before: &Snapshot, after: &Snapshot) -> Changeset {
        self.compare_excluding(before, after, &[])
    }

    /// Compare two snapshots with additional excluded paths.
    ///
    /// Added and modified entries follow the order of `after`; deleted entries
    /// follow the order of `before` and come last.
    pub fn compare_excluding(
        &self,
        before: &Snapshot,
        after: &Snapshot,
        extra_exclusions: &[String],
    ) -> Changeset {
        let mut excluded: Vec<String> = before
            .error_paths
            .iter()
            .chain(&after.error_paths)
            .chain(extra_exclusions)
            .map(|p| path_key(p))
            .filter(|k| !k.is_empty())
            .collect();
        excluded.sort_unstable();
        excluded.dedup();

        let is_excluded = |key: &str| excluded.iter().any(|prefix| is_within(key, prefix));

        let before_index: HashMap<String, &InventoryRecord> = files(before)
            .map(|record| (record.key(), record))
            .filter(|(key, _)| !is_excluded(key))
            .collect();

        let mut entries = Vec::new();
        let mut after_keys = HashSet::with_capacity(after.records.len());
        let mut skipped = 0usize;

        for record in files(after) {
            let key = record.key();
            if is_excluded(&key) {
                skipped += 1;
                continue;
            }
            match before_index.get(&key) {
                None => entries.push(ChangeEntry::added(record)),
                Some(previous) => {
                    if let Some(reason) = self.describe_changes(previous, record) {
                        entries.push(ChangeEntry::modified(previous, record, reason));
                    }
                }
            }
            after_keys.insert(key);
        }

        for record in files(before) {
            let key = record.key();
            if before_index.contains_key(&key) && !after_keys.contains(&key) {
                entries.push(ChangeEntry::deleted(record));
            }
        }

        debug!(
            "Excluded {} records under {} error paths",
            skipped,
            excluded.len()
        );
        info!(
            "Compared {} and {} records: {} changes",
            before.len(),
            after.len(),
            entries.len()
        );

        Changeset {
            metadata: ChangesetMetadata {
                before_root: before.root.clone(),
                after_root: after.root.clone(),
                before_captured_at: before.captured_at_utc,
                after_captured_at: after.captured_at_utc,
                generated_at: Utc::now(),
                excluded_paths: excluded.len(),
            },
            entries,
        }
    }

    /// Describe every differing field as `Field: before → after`, or `None`
    /// when the records are considered unchanged
    fn describe_changes(&self, before: &InventoryRecord, after: &InventoryRecord) -> Option<String> {
        let mut reasons = Vec::new();

        if before.size != after.size {
            reasons.push(format!("Size: {} → {}", before.size, after.size));
        }
        if !self.timestamps_match(before.last_write, after.last_write) {
            reasons.push(format!(
                "LastWriteTime: {} → {}",
                before.last_write.to_rfc3339(),
                after.last_write.to_rfc3339()
            ));
        }
        let (old_flags, new_flags) = (before.attributes.to_string(), after.attributes.to_string());
        if old_flags != new_flags {
            reasons.push(format!(
                "Attributes: {} → {}",
                display_flags(&before.attributes),
                display_flags(&after.attributes)
            ));
        }

        if reasons.is_empty() {
            None
        } else {
            Some(reasons.join("; "))
        }
    }

    fn timestamps_match(&self, before: DateTime<Utc>, after: DateTime<Utc>) -> bool {
        (after - before)
            .num_microseconds()
            .is_some_and(|us| u128::from(us.unsigned_abs()) <= self.config.timestamp_tolerance.as_micros())
    }
}

fn display_flags(flags: &AttributeFlags) -> String {
    if flags.is_empty() {
        "(none)".to_string()
    } else {
        flags.to_string()
    }
}

/// Directory entries carry no content of their own
fn files(snapshot: &Snapshot) -> impl Iterator<Item = &InventoryRecord> {
    snapshot
        .records
        .iter()
        .filter(|record| record.kind == FileKind::File)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ferrostage_types::{AttributeFlag, ChangeStatus};
    use proptest::prelude::*;
    use rstest::rstest;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn snapshot(records: Vec<InventoryRecord>) -> Snapshot {
        Snapshot::new("/v", records, Vec::new())
    }

    fn statuses(changeset: &Changeset) -> Vec<(String, ChangeStatus)> {
        changeset
            .entries
            .iter()
            .map(|e| (e.path.clone(), e.status))
            .collect()
    }

    #[test]
    fn test_directory_records_are_ignored() {
        let t1 = t0() + chrono::Duration::hours(1);
        let before = snapshot(vec![
            InventoryRecord::new("/v/gone", 0, t0()).with_kind(FileKind::Directory),
            InventoryRecord::new("/v/docs", 0, t0()).with_kind(FileKind::Directory),
            InventoryRecord::new("/v/docs/a", 10, t0()),
        ]);
        let after = snapshot(vec![
            InventoryRecord::new("/v/docs", 0, t1).with_kind(FileKind::Directory),
            InventoryRecord::new("/v/docs/a", 10, t0()),
            InventoryRecord::new("/v/new", 0, t1).with_kind(FileKind::Directory),
        ]);

        let changeset = DiffEngine::default().compare(&before, &after);

        assert!(changeset.is_empty(), "{:?}", statuses(&changeset));
    }

    #[test]
    fn test_modified_and_added() {
        let t1 = t0() + chrono::Duration::hours(1);
        let before = snapshot(vec![InventoryRecord::new("/v/f1", 100, t0())]);
        let after = snapshot(vec![
            InventoryRecord::new("/v/f1", 200, t0()),
            InventoryRecord::new("/v/f2", 50, t1),
        ]);

        let changeset = DiffEngine::default().compare(&before, &after);

        assert_eq!(
            statuses(&changeset),
            vec![
                ("/v/f1".to_string(), ChangeStatus::Modified),
                ("/v/f2".to_string(), ChangeStatus::Added),
            ]
        );
        let modified = &changeset.entries[0];
        assert_eq!(modified.old_size, Some(100));
        assert_eq!(modified.new_size, Some(200));
        assert_eq!(modified.size_delta, 100);
        assert_eq!(modified.reason.as_deref(), Some("Size: 100 → 200"));
        assert_eq!(changeset.entries[1].size_delta, 50);
    }

    #[test]
    fn test_deleted_entries_follow_before_order_and_come_last() {
        let before = snapshot(vec![
            InventoryRecord::new("/v/z", 1, t0()),
            InventoryRecord::new("/v/keep", 1, t0()),
            InventoryRecord::new("/v/a", 7, t0()),
        ]);
        let after = snapshot(vec![
            InventoryRecord::new("/v/new", 1, t0()),
            InventoryRecord::new("/v/keep", 1, t0()),
        ]);

        let changeset = DiffEngine::default().compare(&before, &after);

        assert_eq!(
            statuses(&changeset),
            vec![
                ("/v/new".to_string(), ChangeStatus::Added),
                ("/v/z".to_string(), ChangeStatus::Deleted),
                ("/v/a".to_string(), ChangeStatus::Deleted),
            ]
        );
        assert_eq!(changeset.entries[2].size_delta, -7);
    }

    #[rstest]
    #[case(0, false)]
    #[case(999, false)]
    #[case(1000, false)]
    #[case(1001, true)]
    #[case(-1000, false)]
    #[case(-1500, true)]
    fn test_timestamp_tolerance(#[case] offset_ms: i64, #[case] modified: bool) {
        let before = snapshot(vec![InventoryRecord::new("/v/f", 1, t0())]);
        let after = snapshot(vec![InventoryRecord::new(
            "/v/f",
            1,
            t0() + chrono::Duration::milliseconds(offset_ms),
        )]);

        let changeset = DiffEngine::default().compare(&before, &after);
        assert_eq!(!changeset.is_empty(), modified);
    }

    #[test]
    fn test_reason_lists_every_differing_field() {
        let before = snapshot(vec![InventoryRecord::new("/v/f", 1, t0())]);
        let after = snapshot(vec![InventoryRecord::new(
            "/v/f",
            2,
            t0() + chrono::Duration::seconds(5),
        )
        .with_attributes(AttributeFlags::from_flags([AttributeFlag::ReadOnly]))]);

        let changeset = DiffEngine::default().compare(&before, &after);
        let reason = changeset.entries[0].reason.clone().unwrap();

        assert!(reason.starts_with("Size: 1 → 2; LastWriteTime: "));
        assert!(reason.ends_with("Attributes: (none) → ReadOnly"));
    }

    #[test]
    fn test_paths_match_case_insensitively() {
        let before = snapshot(vec![InventoryRecord::new("/v/Data/F1.txt", 1, t0())]);
        let after = snapshot(vec![InventoryRecord::new("/V/data/f1.TXT", 1, t0())]);

        assert!(DiffEngine::default().compare(&before, &after).is_empty());
    }

    #[test]
    fn test_error_path_in_one_snapshot_excludes_subtree() {
        let before = snapshot(vec![
            InventoryRecord::new("/v/locked/a", 1, t0()),
            InventoryRecord::new("/v/lockedness", 1, t0()),
        ]);
        let mut after = snapshot(vec![InventoryRecord::new("/v/locked/b", 1, t0())]);
        after.error_paths.push("/V/Locked".to_string());

        let changeset = DiffEngine::default().compare(&before, &after);

        // Only the sibling that merely shares a name prefix is compared
        assert_eq!(
            statuses(&changeset),
            vec![("/v/lockedness".to_string(), ChangeStatus::Deleted)]
        );
        assert_eq!(changeset.metadata.excluded_paths, 1);
    }

    #[test]
    fn test_extra_exclusions() {
        let before = snapshot(vec![InventoryRecord::new("/v/f1", 1, t0())]);
        let after = snapshot(vec![InventoryRecord::new("/v/f1", 2, t0())]);

        let changeset =
            DiffEngine::default().compare_excluding(&before, &after, &["/v/f1".to_string()]);
        assert!(changeset.is_empty());
    }

    fn arb_records() -> impl Strategy<Value = Vec<InventoryRecord>> {
        prop::collection::btree_map("[a-z]{1,6}", (0u64..1000, 0i64..5000), 0..24).prop_map(
            |files| {
                files
                    .into_iter()
                    .map(|(name, (size, secs))| {
                        InventoryRecord::new(
                            format!("/v/{}", name),
                            size,
                            t0() + chrono::Duration::seconds(secs),
                        )
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn test_self_comparison_is_empty(records in arb_records()) {
            let a = snapshot(records);
            prop_assert!(DiffEngine::default().compare(&a, &a).is_empty());
        }

        #[test]
        fn test_added_and_deleted_are_exact(before in arb_records(), after in arb_records()) {
            let a = snapshot(before);
            let b = snapshot(after);
            let changeset = DiffEngine::default().compare(&a, &b);

            let keys = |s: &Snapshot| s.records.iter().map(|r| r.path.clone()).collect::<HashSet<_>>();
            let (in_a, in_b) = (keys(&a), keys(&b));

            let added: Vec<_> = changeset.with_status(ChangeStatus::Added).map(|e| e.path.clone()).collect();
            let deleted: Vec<_> = changeset.with_status(ChangeStatus::Deleted).map(|e| e.path.clone()).collect();

            prop_assert_eq!(added.len(), in_b.difference(&in_a).count());
            prop_assert!(added.iter().all(|p| in_b.contains(p) && !in_a.contains(p)));
            prop_assert_eq!(deleted.len(), in_a.difference(&in_b).count());
            prop_assert!(deleted.iter().all(|p| in_a.contains(p) && !in_b.contains(p)));

            for entry in changeset.with_status(ChangeStatus::Modified) {
                let old = a.records.iter().find(|r| r.path == entry.path).unwrap();
                let new = b.records.iter().find(|r| r.path == entry.path).unwrap();
                let same_time = (new.last_write - old.last_write).num_seconds().abs() <= 1;
                prop_assert!(old.size != new.size || !same_time);
            }
        }

        #[test]
        fn test_error_paths_never_reported(before in arb_records(), after in arb_records(), pick in 0usize..24) {
            let a = snapshot(before);
            let mut b = snapshot(after);
            let candidates: Vec<String> = a.records.iter().chain(&b.records).map(|r| r.path.clone()).collect();
            prop_assume!(!candidates.is_empty());
            let excluded = candidates[pick % candidates.len()].clone();
            b.error_paths.push(excluded.clone());

            let changeset = DiffEngine::default().compare(&a, &b);
            prop_assert!(changeset.entries.iter().all(|e| e.path != excluded));
        }
    }
}
