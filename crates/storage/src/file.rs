//! File-backed storage adapter.
//!
//! This module provides [`FileAdapter`], the simple backend: a flat
//! key-value map held in memory and mirrored to a single JSON file. The
//! store is synchronous under the hood — a [`BTreeMap`] behind a
//! [`parking_lot::RwLock`] — and is exposed through the async
//! [`StorageAdapter`] contract; disk writes run on a blocking task.
//!
//! # Durability
//!
//! Every mutation rewrites the store file atomically: write to a `.tmp`
//! sibling, fsync, rename. A crash mid-write leaves the previous snapshot
//! intact.
//!
//! # Error Classification
//!
//! All I/O failures are classified in [`classify_io`], primarily by
//! inspecting the platform error: a full disk maps to
//! [`QuotaExceeded`](StorageError::QuotaExceeded), permission problems to
//! [`AccessDenied`](StorageError::AccessDenied), an unparseable store file
//! to [`CorruptedData`](StorageError::CorruptedData).
//!
//! # Limitations
//!
//! - The whole map is rewritten on every mutation; intended for the modest key counts of a single
//!   application profile, not bulk data.
//! - An individual entry whose JSON value is not a string is treated as absent, not as corruption.

use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::{
    adapter::StorageAdapter,
    error::{StorageError, StorageResult},
    size_limits::{SizeLimits, validate_sizes},
};

/// In-memory state mirrored to the store file.
struct FileState {
    entries: BTreeMap<String, String>,
    closed: bool,
}

/// File-backed implementation of [`StorageAdapter`].
///
/// # Cloning
///
/// `FileAdapter` is cheaply cloneable via [`Arc`]; all clones share the same
/// map and store file.
#[derive(Clone)]
pub struct FileAdapter {
    path: PathBuf,
    limits: SizeLimits,
    state: Arc<RwLock<FileState>>,
    /// Orders snapshot writes so the file always reflects the latest map.
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl FileAdapter {
    /// Opens (or creates) the store file at `path`.
    ///
    /// A missing file yields an empty store. An unreadable or unparseable
    /// file is an error — the factory's recovery path quarantines it.
    ///
    /// # Errors
    ///
    /// - [`CorruptedData`](StorageError::CorruptedData) if the file exists but is not a JSON object
    /// - [`AccessDenied`](StorageError::AccessDenied) / [`QuotaExceeded`](StorageError::QuotaExceeded)
    ///   / [`Unknown`](StorageError::Unknown) per I/O classification
    pub fn open(path: impl AsRef<Path>, limits: SizeLimits) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| classify_io(e, "failed to create store directory"))?;
        }

        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => parse_store(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(classify_io(err, "failed to read store file")),
        };

        debug!(path = %path.display(), entries = entries.len(), "opened file store");

        Ok(Self {
            path,
            limits,
            state: Arc::new(RwLock::new(FileState { entries, closed: false })),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Returns the filesystem path of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_open(&self) -> StorageResult<()> {
        if self.state.read().closed {
            return Err(StorageError::access_denied("file store is closed"));
        }
        Ok(())
    }

    /// Writes the given serialized snapshot to disk atomically.
    async fn persist_snapshot(&self, json: String) -> StorageResult<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, json.as_bytes()))
            .await
            .map_err(|e| StorageError::unknown_with_source("store write task failed", e))?
            .map_err(|e| classify_io(e, "failed to persist store file"))
    }

    fn snapshot_json(&self) -> StorageResult<String> {
        let state = self.state.read();
        serde_json::to_string(&state.entries)
            .map_err(|e| StorageError::unknown_with_source("failed to serialize store", e))
    }
}

impl std::fmt::Debug for FileAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAdapter").field("path", &self.path).finish()
    }
}

#[async_trait]
impl StorageAdapter for FileAdapter {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.check_open()?;
        let state = self.state.read();
        Ok(state.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check_open()?;
        validate_sizes(key, value, &self.limits)?;

        let _write = self.write_lock.lock().await;

        let previous = {
            let mut state = self.state.write();
            state.entries.insert(key.to_string(), value.to_string())
        };

        let json = self.snapshot_json()?;
        if let Err(err) = self.persist_snapshot(json).await {
            // The write did not land on disk; roll the map back so memory
            // and file stay consistent.
            let mut state = self.state.write();
            match previous {
                Some(old) => state.entries.insert(key.to_string(), old),
                None => state.entries.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.check_open()?;

        let _write = self.write_lock.lock().await;

        let previous = {
            let mut state = self.state.write();
            state.entries.remove(key)
        };
        let Some(previous) = previous else {
            return Ok(());
        };

        let json = self.snapshot_json()?;
        if let Err(err) = self.persist_snapshot(json).await {
            let mut state = self.state.write();
            state.entries.insert(key.to_string(), previous);
            return Err(err);
        }
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        self.check_open()?;

        let _write = self.write_lock.lock().await;

        let previous = {
            let mut state = self.state.write();
            std::mem::take(&mut state.entries)
        };

        let json = self.snapshot_json()?;
        if let Err(err) = self.persist_snapshot(json).await {
            let mut state = self.state.write();
            state.entries = previous;
            return Err(err);
        }
        Ok(())
    }

    async fn list_keys(&self) -> StorageResult<Vec<String>> {
        self.check_open()?;
        let state = self.state.read();
        // BTreeMap iteration is already sorted.
        Ok(state.entries.keys().cloned().collect())
    }

    fn name(&self) -> &'static str {
        "file"
    }

    async fn close(&self) -> StorageResult<()> {
        let _write = self.write_lock.lock().await;
        let mut state = self.state.write();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        debug!(path = %self.path.display(), "closed file store");
        Ok(())
    }
}

/// Parses the raw store file into an entry map.
///
/// The file must be a JSON object. Entries whose value is not a JSON string
/// fail the type check and are treated as absent.
fn parse_store(raw: &str) -> StorageResult<BTreeMap<String, String>> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| StorageError::corrupted_with_source("store file is not valid JSON", e))?;

    let serde_json::Value::Object(object) = value else {
        return Err(StorageError::corrupted("store file is not a JSON object"));
    };

    let mut entries = BTreeMap::new();
    for (key, value) in object {
        match value {
            serde_json::Value::String(s) => {
                entries.insert(key, s);
            },
            other => {
                warn!(key = %key, value_type = json_type_name(&other), "dropping non-string store entry");
            },
        }
    }
    Ok(entries)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Atomic file write: tmp sibling, fsync, rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = std::fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp, path)
}

/// Classifies an I/O error into the storage taxonomy.
///
/// This is the single conversion point for the file backend: quota-style
/// failures (full disk) map to `QuotaExceeded`, permission and read-only
/// failures to `AccessDenied`, structurally invalid data to
/// `CorruptedData`, and everything else to `Unknown`.
fn classify_io(err: std::io::Error, ctx: &str) -> StorageError {
    use std::io::ErrorKind as IoKind;

    let message = format!("{ctx}: {err}");
    match err.kind() {
        IoKind::StorageFull | IoKind::QuotaExceeded | IoKind::FileTooLarge => {
            StorageError::quota_with_source(message, err)
        },
        IoKind::PermissionDenied | IoKind::ReadOnlyFilesystem => {
            StorageError::access_denied_with_source(message, err)
        },
        IoKind::InvalidData | IoKind::UnexpectedEof => {
            StorageError::corrupted_with_source(message, err)
        },
        // Some platforms report a full disk only through the message.
        _ if err.to_string().to_ascii_lowercase().contains("no space left") => {
            StorageError::quota_with_source(message, err)
        },
        _ => StorageError::unknown_with_source(message, err),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::ErrorKind;

    fn temp_adapter() -> (FileAdapter, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let adapter = FileAdapter::open(&path, SizeLimits::default()).unwrap();
        (adapter, dir)
    }

    #[tokio::test]
    async fn basic_operations() {
        let (adapter, _dir) = temp_adapter();

        assert_eq!(adapter.get("missing").await.unwrap(), None);

        adapter.set("greeting", "hello").await.unwrap();
        assert_eq!(adapter.get("greeting").await.unwrap(), Some("hello".to_string()));

        adapter.set("greeting", "updated").await.unwrap();
        assert_eq!(adapter.get("greeting").await.unwrap(), Some("updated".to_string()));

        adapter.remove("greeting").await.unwrap();
        assert_eq!(adapter.get("greeting").await.unwrap(), None);

        // Removing a missing key is a no-op.
        adapter.remove("greeting").await.unwrap();
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let adapter = FileAdapter::open(&path, SizeLimits::default()).unwrap();
            adapter.set("sprout.settings", r#"{"theme":"dark"}"#).await.unwrap();
            adapter.close().await.unwrap();
        }

        let adapter = FileAdapter::open(&path, SizeLimits::default()).unwrap();
        assert_eq!(
            adapter.get("sprout.settings").await.unwrap(),
            Some(r#"{"theme":"dark"}"#.to_string())
        );
    }

    #[tokio::test]
    async fn list_keys_is_sorted() {
        let (adapter, _dir) = temp_adapter();

        adapter.set("c", "3").await.unwrap();
        adapter.set("a", "1").await.unwrap();
        adapter.set("b", "2").await.unwrap();

        assert_eq!(adapter.list_keys().await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let (adapter, _dir) = temp_adapter();

        adapter.set("a", "1").await.unwrap();
        adapter.set("b", "2").await.unwrap();
        adapter.clear().await.unwrap();

        assert!(adapter.list_keys().await.unwrap().is_empty());
        assert_eq!(adapter.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_operations() {
        let (adapter, _dir) = temp_adapter();

        adapter.set("key", "value").await.unwrap();
        adapter.close().await.unwrap();
        adapter.close().await.unwrap();

        let err = adapter.get("key").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        let err = adapter.set("key", "other").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn non_string_entries_are_treated_as_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, r#"{"kept": "value", "dropped": 42, "also_dropped": null}"#).unwrap();

        let adapter = FileAdapter::open(&path, SizeLimits::default()).unwrap();
        assert_eq!(adapter.get("kept").await.unwrap(), Some("value".to_string()));
        assert_eq!(adapter.get("dropped").await.unwrap(), None);
        assert_eq!(adapter.list_keys().await.unwrap(), vec!["kept"]);
    }

    #[tokio::test]
    async fn invalid_json_is_corrupted_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json at all").unwrap();

        let err = FileAdapter::open(&path, SizeLimits::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedData);
    }

    #[tokio::test]
    async fn non_object_root_is_corrupted_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let err = FileAdapter::open(&path, SizeLimits::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedData);
    }

    #[tokio::test]
    async fn oversized_writes_are_rejected_before_touching_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let adapter = FileAdapter::open(&path, SizeLimits::new(8, 8).unwrap()).unwrap();

        let err = adapter.set("key", "value that is far too long").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);

        // The rejected value must not be observable.
        assert_eq!(adapter.get("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn name_is_file() {
        let (adapter, _dir) = temp_adapter();
        assert_eq!(adapter.name(), "file");
    }

    #[tokio::test]
    async fn populated_helper_round_trips() {
        let (adapter, _dir) = crate::testutil::populated_file_adapter("plant", 5).await;

        assert_eq!(adapter.list_keys().await.unwrap().len(), 5);
        assert_eq!(
            adapter.get(&crate::testutil::make_key("plant", 3)).await.unwrap(),
            Some(crate::testutil::make_value(3)),
        );
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            /// Any key/value pair within limits survives a set→get round trip
            /// and a reopen from disk.
            #[test]
            fn set_get_round_trip(
                key in "[a-zA-Z0-9._:-]{1,64}",
                value in "\\PC{0,256}",
            ) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("runtime");

                rt.block_on(async {
                    let dir = tempdir().unwrap();
                    let path = dir.path().join("store.json");

                    let adapter = FileAdapter::open(&path, SizeLimits::default()).unwrap();
                    adapter.set(&key, &value).await.unwrap();
                    prop_assert_eq!(adapter.get(&key).await.unwrap(), Some(value.clone()));

                    let reopened = FileAdapter::open(&path, SizeLimits::default()).unwrap();
                    prop_assert_eq!(reopened.get(&key).await.unwrap(), Some(value.clone()));
                    Ok(())
                })?;
            }
        }
    }
}
