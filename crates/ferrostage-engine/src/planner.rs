//! Operation planning for both transfer directions
//!
//! Staging re-roots every added or modified file of a changeset beneath the
//! staging root, inserting the drive identifier as the first segment:
//! `C:\data\a.txt` becomes `<staging>\C\data\a.txt` and `/v/a.txt` becomes
//! `<staging>/v/a.txt`. Deployment walks a staging root and reverses that
//! mapping, either back to the original drive or beneath an explicit target.

use crate::local::PARTIAL_SUFFIX;
use crate::operation::{OperationDescriptor, OperationOrigin};
use ferrostage_types::{Changeset, Error, Result};
use std::path::{Component, Path, PathBuf, Prefix};
use tokio::fs;
use tracing::{debug, info};
use walkdir::WalkDir;

/// An operation dropped during planning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedOperation {
    /// File that would have been read
    pub source: PathBuf,
    /// File that would have been written, if one could be computed
    pub destination: Option<PathBuf>,
    /// Size in bytes, if known
    pub size: u64,
    /// Why the operation was planned
    pub origin: OperationOrigin,
    /// Why the operation was dropped
    pub reason: String,
}

/// Operations ready for the orchestrator plus everything dropped on the way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Operations to execute, in order
    pub operations: Vec<OperationDescriptor>,
    /// Operations dropped during planning
    pub skipped: Vec<SkippedOperation>,
    /// Sum of the sizes of all planned operations
    pub total_bytes: u64,
}

impl Plan {
    /// Create a plan from a list of operations
    pub fn from_operations(operations: Vec<OperationDescriptor>) -> Self {
        let total_bytes = operations.iter().map(|op| op.size).sum();
        Self {
            operations,
            skipped: Vec::new(),
            total_bytes,
        }
    }

    /// Number of candidates considered, planned or skipped
    pub fn total_input(&self) -> usize {
        self.operations.len() + self.skipped.len()
    }

    fn push(&mut self, operation: OperationDescriptor) {
        self.total_bytes += operation.size;
        self.operations.push(operation);
    }

    fn skip(
        &mut self,
        source: PathBuf,
        destination: Option<PathBuf>,
        size: u64,
        origin: OperationOrigin,
        reason: impl Into<String>,
    ) {
        let reason = reason.into();
        debug!("Skipping {}: {}", source.display(), reason);
        self.skipped.push(SkippedOperation {
            source,
            destination,
            size,
            origin,
            reason,
        });
    }
}

/// Split an absolute path into its drive identifier and the remainder
///
/// Windows drive paths yield the upper-case drive letter, other absolute
/// paths yield their first component. UNC and relative paths have no
/// identifier.
pub fn split_root(path: &Path) -> Option<(String, PathBuf)> {
    let mut components = path.components();
    let id = match components.next()? {
        Component::Prefix(prefix) => match prefix.kind() {
            Prefix::Disk(letter) | Prefix::VerbatimDisk(letter) => {
                char::from(letter).to_ascii_uppercase().to_string()
            }
            _ => return None,
        },
        Component::RootDir => match components.next()? {
            Component::Normal(name) => name.to_string_lossy().into_owned(),
            _ => return None,
        },
        _ => return None,
    };

    let rest = components
        .filter(|c| !matches!(c, Component::RootDir))
        .collect();
    Some((id, rest))
}

/// Root directory a drive identifier maps back to
#[cfg(windows)]
pub fn root_marker(id: &str) -> PathBuf {
    if id.len() == 1 && id.chars().all(|c| c.is_ascii_alphabetic()) {
        PathBuf::from(format!("{id}:\\"))
    } else {
        PathBuf::from(format!("\\{id}"))
    }
}

/// Root directory a drive identifier maps back to
#[cfg(not(windows))]
pub fn root_marker(id: &str) -> PathBuf {
    Path::new("/").join(id)
}

/// Plan the copy of every added or modified file beneath `staging_root`
///
/// Sources that no longer exist are skipped rather than failed.
pub async fn plan_staging(changeset: &Changeset, staging_root: &Path) -> Plan {
    let mut plan = Plan::default();

    for entry in &changeset.entries {
        let Some(origin) = OperationOrigin::from_change(entry.status) else {
            continue;
        };
        let source = PathBuf::from(&entry.path);
        let expected_size = entry.transfer_size();

        let Some((id, rest)) = split_root(&source) else {
            plan.skip(source, None, expected_size, origin, "no drive identifier");
            continue;
        };
        let destination = staging_root.join(&id).join(rest);

        match fs::metadata(&source).await {
            Ok(metadata) if metadata.is_file() => {
                plan.push(OperationDescriptor::new(
                    source,
                    destination,
                    metadata.len(),
                    origin,
                ));
            }
            Ok(_) => plan.skip(
                source,
                Some(destination),
                expected_size,
                origin,
                "source is not a file",
            ),
            Err(e) => plan.skip(
                source,
                Some(destination),
                expected_size,
                origin,
                format!("source unavailable: {e}"),
            ),
        }
    }

    info!(
        "Planned {} staging operations ({} bytes), {} skipped",
        plan.operations.len(),
        plan.total_bytes,
        plan.skipped.len()
    );
    plan
}

/// Plan the return of every staged file to its drive, or beneath `target`
///
/// Files directly under the staging root carry no drive identifier and are
/// skipped, as are leftovers of interrupted transfers.
pub async fn plan_deployment(staging_root: &Path, target: Option<&Path>) -> Result<Plan> {
    let is_dir = fs::metadata(staging_root)
        .await
        .map_err(|e| Error::io_at(staging_root, &e))?
        .is_dir();
    if !is_dir {
        return Err(Error::config(format!(
            "staging root {} is not a directory",
            staging_root.display()
        )));
    }

    let root = staging_root.to_path_buf();
    let walked = tokio::task::spawn_blocking(move || walk_staging(&root))
        .await
        .map_err(|e| Error::other(format!("staging walk failed: {e}")))?;

    let target_volume = match target {
        Some(target) => Some(existing_ancestor(target).await),
        None => None,
    };

    let mut plan = Plan::default();
    for staged in walked {
        let (path, size) = match staged {
            Staged::File { path, size } => (path, size),
            Staged::Unreadable { path, error } => {
                plan.skip(path, None, 0, OperationOrigin::Restored, error);
                continue;
            }
        };

        if path.to_string_lossy().ends_with(PARTIAL_SUFFIX) {
            plan.skip(
                path,
                None,
                size,
                OperationOrigin::Restored,
                "incomplete transfer",
            );
            continue;
        }

        let Ok(relative) = path.strip_prefix(staging_root) else {
            continue;
        };
        let mut components = relative.components();
        let id = match components.next() {
            Some(Component::Normal(id)) if components.clone().next().is_some() => {
                id.to_string_lossy().into_owned()
            }
            _ => {
                plan.skip(
                    path,
                    None,
                    size,
                    OperationOrigin::Restored,
                    "no drive identifier",
                );
                continue;
            }
        };
        let rest: PathBuf = components.collect();

        let operation = match (target, &target_volume) {
            (Some(target), Some(volume)) => OperationDescriptor::new(
                &path,
                target.join(&id).join(rest),
                size,
                OperationOrigin::Restored,
            )
            .with_root(id, volume),
            _ => {
                let marker = root_marker(&id);
                OperationDescriptor::new(&path, marker.join(rest), size, OperationOrigin::Restored)
                    .with_root(id, marker)
            }
        };
        plan.push(operation);
    }

    info!(
        "Planned {} deployment operations ({} bytes), {} skipped",
        plan.operations.len(),
        plan.total_bytes,
        plan.skipped.len()
    );
    Ok(plan)
}

/// Closest ancestor of `path` that exists
///
/// A deployment target is created on demand, so only the volume it lives on
/// has to be reachable.
async fn existing_ancestor(path: &Path) -> PathBuf {
    for ancestor in path.ancestors() {
        if !ancestor.as_os_str().is_empty() && fs::metadata(ancestor).await.is_ok() {
            return ancestor.to_path_buf();
        }
    }
    path.to_path_buf()
}

enum Staged {
    File { path: PathBuf, size: u64 },
    Unreadable { path: PathBuf, error: String },
}

fn walk_staging(root: &Path) -> Vec<Staged> {
    let mut staged = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => match entry.metadata() {
                Ok(metadata) => staged.push(Staged::File {
                    path: entry.into_path(),
                    size: metadata.len(),
                }),
                Err(e) => staged.push(Staged::Unreadable {
                    path: entry.into_path(),
                    error: e.to_string(),
                }),
            },
            Ok(_) => {}
            Err(e) => {
                if let Some(path) = e.path() {
                    staged.push(Staged::Unreadable {
                        path: path.to_path_buf(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }
    staged
}
