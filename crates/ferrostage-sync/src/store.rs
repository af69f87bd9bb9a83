//! JSON persistence for snapshots, changesets and error-path sets

use ferrostage_types::{Changeset, Error, Result, Snapshot};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Write any serializable value as pretty-printed JSON
pub async fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_vec_pretty(value).map_err(|e| {
        Error::serialization(format!("Failed to encode '{}': {}", path.display(), e))
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io_at(parent, &e))?;
    }
    fs::write(path, json).await.map_err(|e| Error::io_at(path, &e))?;

    debug!("Wrote {}", path.display());
    Ok(())
}

/// Read a JSON document into `T`
pub async fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let bytes = fs::read(path).await.map_err(|e| Error::io_at(path, &e))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        Error::serialization(format!("Failed to decode '{}': {}", path.display(), e))
    })
}

/// Save a snapshot
pub async fn save_snapshot(path: impl AsRef<Path>, snapshot: &Snapshot) -> Result<()> {
    write_json(path, snapshot).await
}

/// Load a snapshot and check its invariants
pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<Snapshot> {
    let path = path.as_ref();
    let snapshot: Snapshot = read_json(path).await?;
    snapshot
        .validate()
        .map_err(|e| Error::snapshot(format!("{}: {}", path.display(), e)))?;
    Ok(snapshot)
}

/// Save a changeset
pub async fn save_changeset(path: impl AsRef<Path>, changeset: &Changeset) -> Result<()> {
    write_json(path, changeset).await
}

/// Load a changeset
pub async fn load_changeset(path: impl AsRef<Path>) -> Result<Changeset> {
    read_json(path).await
}

/// Load a set of excluded paths stored as a JSON array of strings
pub async fn load_error_paths(path: impl AsRef<Path>) -> Result<Vec<String>> {
    read_json(path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ferrostage_types::{ErrorKind, InventoryRecord};
    use tempfile::TempDir;

    fn sample() -> Snapshot {
        Snapshot::new(
            "/v",
            vec![
                InventoryRecord::new("/v/f1", 100, Utc::now()),
                InventoryRecord::new("/v/sub/f2", 50, Utc::now()),
            ],
            vec!["/v/locked".to_string()],
        )
    }

    #[tokio::test]
    async fn test_snapshot_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/before.json");

        let snapshot = sample();
        save_snapshot(&path, &snapshot).await.unwrap();
        let loaded = load_snapshot(&path).await.unwrap();

        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_load_rejects_duplicate_paths() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dup.json");

        let mut snapshot = sample();
        snapshot
            .records
            .push(InventoryRecord::new("/V/F1", 1, Utc::now()));
        write_json(&path, &snapshot).await.unwrap();

        let err = load_snapshot(&path).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Snapshot);
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_timestamps() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");

        let mut value = serde_json::to_value(sample()).unwrap();
        value["records"][0]["last_write"] = serde_json::json!("yesterday");
        fs::write(&path, value.to_string()).await.unwrap();

        let err = load_snapshot(&path).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = load_changeset("/nonexistent/changes.json").await.unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_error_paths() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("errors.json");
        fs::write(&path, r#"["/v/a", "/v/b"]"#).await.unwrap();

        let paths = load_error_paths(&path).await.unwrap();
        assert_eq!(paths, vec!["/v/a".to_string(), "/v/b".to_string()]);
    }
}
