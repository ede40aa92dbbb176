//! redb-backed transactional storage adapter.
//!
//! Uses redb (pure Rust, B-tree, ACID, single-file database) to provide
//! durable key-value storage with real transactions. No C/C++ dependencies.
//!
//! # Design
//!
//! - Single redb `Database` file containing an entries table and a metadata table.
//! - The database is opened **lazily on first use**; the open is idempotent and memoized behind an
//!   async mutex, so concurrent first calls share one open.
//! - The metadata table carries a schema version. Table structure is created only if absent; a
//!   stored version newer than [`SCHEMA_VERSION`] is corruption.
//! - Every operation runs in a minimal read or write transaction; a write is only successful once
//!   `commit()` returns.
//! - When an operation fails at the handle level, the live handle and the memoized open slot are
//!   cleared so the next operation re-opens cleanly.
//! - Blocking redb calls run on `tokio::task::spawn_blocking`.
//!
//! # Value Type Check
//!
//! Entries are stored as raw bytes. A stored payload that is not valid
//! UTF-8 fails the string type check and is treated as absent, not as
//! corruption.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use sprout_storage::{
    ErrorKind, StorageAdapter, StorageError, StorageResult, validate_sizes,
};
use tracing::{debug, warn};

use crate::config::RedbAdapterConfig;

/// Table holding the application's key-value entries.
const ENTRIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");

/// Table holding store metadata (schema version).
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Metadata key under which the schema version is stamped.
const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Current schema version of the entries layout.
pub const SCHEMA_VERSION: u64 = 1;

/// Monotonic counter for unique scratch-probe file names.
static PROBE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Transactional storage adapter backed by redb.
///
/// Thread-safe; share it behind an [`Arc`] for concurrent use.
pub struct RedbAdapter {
    config: RedbAdapterConfig,
    /// The memoized live handle. `None` until the first operation opens the
    /// database, and again after `close` or handle invalidation.
    handle: Mutex<Option<Arc<Database>>>,
    /// Serializes the lazy open so concurrent first calls share one open.
    open_lock: tokio::sync::Mutex<()>,
    closed: AtomicBool,
}

impl RedbAdapter {
    /// Creates a new adapter. No I/O happens until the first operation.
    #[must_use]
    pub fn new(config: RedbAdapterConfig) -> Self {
        Self {
            config,
            handle: Mutex::new(None),
            open_lock: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the filesystem path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.config.path()
    }

    /// Clears the live handle and the memoized open slot.
    ///
    /// The next operation will re-open the database cleanly. Called when an
    /// operation fails at the handle level, and by [`repair`](Self::repair).
    pub fn invalidate_handle(&self) {
        let dropped = self.handle.lock().take();
        if dropped.is_some() {
            debug!(path = %self.config.path().display(), "invalidated redb handle");
        }
    }

    /// Returns the live handle, opening the database if necessary.
    async fn ensure_open(&self) -> StorageResult<Arc<Database>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::access_denied("redb store is closed"));
        }
        if let Some(db) = self.handle.lock().clone() {
            return Ok(db);
        }

        let _open = self.open_lock.lock().await;

        // Lost the race: another caller completed the open while we waited.
        if let Some(db) = self.handle.lock().clone() {
            return Ok(db);
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::access_denied("redb store is closed"));
        }

        let path = self.config.path().to_path_buf();
        let open_task = tokio::task::spawn_blocking(move || open_database(&path));
        let db = match tokio::time::timeout(self.config.open_timeout(), open_task).await {
            Ok(joined) => joined
                .map_err(|e| StorageError::unknown_with_source("redb open task failed", e))??,
            Err(_elapsed) => {
                return Err(StorageError::access_denied(format!(
                    "timed out opening redb store after {:?}",
                    self.config.open_timeout()
                )));
            },
        };

        let db = Arc::new(db);
        *self.handle.lock() = Some(Arc::clone(&db));
        debug!(path = %self.config.path().display(), "opened redb store");
        Ok(db)
    }

    /// Drops the handle after failures that suggest it has gone stale, so
    /// the next operation re-opens.
    fn note_op_failure(&self, err: &StorageError) {
        if matches!(err.kind(), ErrorKind::Unknown | ErrorKind::AccessDenied)
            && !self.closed.load(Ordering::Acquire)
        {
            self.invalidate_handle();
        }
    }

    /// Attempts to bring the backing store to a usable state.
    ///
    /// Drops the memoized handle and re-opens. If the store file itself is
    /// unreadable, it is quarantined (renamed aside with a `.corrupt`
    /// suffix) and a fresh store is created — the migration backup exists
    /// precisely so this is survivable.
    pub async fn repair(&self) -> StorageResult<()> {
        self.invalidate_handle();
        match self.ensure_open().await {
            Ok(_) => Ok(()),
            Err(err) if matches!(err.kind(), ErrorKind::CorruptedData | ErrorKind::Unknown) => {
                let path = self.config.path().to_path_buf();
                let quarantined = quarantine_path(&path);
                warn!(
                    path = %path.display(),
                    quarantined = %quarantined.display(),
                    error = %err,
                    "quarantining unreadable redb store",
                );
                tokio::task::spawn_blocking(move || std::fs::rename(&path, &quarantined))
                    .await
                    .map_err(|e| {
                        StorageError::unknown_with_source("redb quarantine task failed", e)
                    })?
                    .map_err(|e| classify(e, "failed to quarantine redb store"))?;
                self.ensure_open().await.map(|_db| ())
            },
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for RedbAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbAdapter")
            .field("path", &self.config.path())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[async_trait]
impl StorageAdapter for RedbAdapter {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let db = self.ensure_open().await?;
        let key = key.to_string();

        let result = tokio::task::spawn_blocking(move || -> StorageResult<Option<String>> {
            let txn = db
                .begin_read()
                .map_err(|e| classify(e, "failed to begin read transaction"))?;
            let table = match txn.open_table(ENTRIES_TABLE) {
                Ok(t) => t,
                // Table doesn't exist yet — no data has been written.
                Err(_) => return Ok(None),
            };
            match table.get(key.as_str()) {
                Ok(Some(guard)) => Ok(decode_value(guard.value())),
                Ok(None) => Ok(None),
                Err(e) => Err(classify(e, "failed to read entry")),
            }
        })
        .await
        .map_err(|e| StorageError::unknown_with_source("redb read task failed", e))?;

        if let Err(err) = &result {
            self.note_op_failure(err);
        }
        result
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        validate_sizes(key, value, self.config.limits())?;

        let db = self.ensure_open().await?;
        let key = key.to_string();
        let value = value.as_bytes().to_vec();

        let result = tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let txn = db
                .begin_write()
                .map_err(|e| classify(e, "failed to begin write transaction"))?;
            {
                let mut table = txn
                    .open_table(ENTRIES_TABLE)
                    .map_err(|e| classify(e, "failed to open entries table"))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(|e| classify(e, "failed to insert entry"))?;
            }
            // The write only counts once the transaction is committed.
            txn.commit().map_err(|e| classify(e, "failed to commit write"))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::unknown_with_source("redb write task failed", e))?;

        if let Err(err) = &result {
            self.note_op_failure(err);
        }
        result
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let db = self.ensure_open().await?;
        let key = key.to_string();

        let result = tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let txn = db
                .begin_write()
                .map_err(|e| classify(e, "failed to begin write transaction"))?;
            {
                let mut table = txn
                    .open_table(ENTRIES_TABLE)
                    .map_err(|e| classify(e, "failed to open entries table"))?;
                table
                    .remove(key.as_str())
                    .map_err(|e| classify(e, "failed to remove entry"))?;
            }
            txn.commit().map_err(|e| classify(e, "failed to commit removal"))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::unknown_with_source("redb write task failed", e))?;

        if let Err(err) = &result {
            self.note_op_failure(err);
        }
        result
    }

    async fn clear(&self) -> StorageResult<()> {
        let db = self.ensure_open().await?;

        let result = tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let txn = db
                .begin_write()
                .map_err(|e| classify(e, "failed to begin write transaction"))?;
            txn.delete_table(ENTRIES_TABLE)
                .map_err(|e| classify(e, "failed to clear entries table"))?;
            {
                // Recreate the empty table so the store keeps its shape.
                txn.open_table(ENTRIES_TABLE)
                    .map_err(|e| classify(e, "failed to recreate entries table"))?;
            }
            txn.commit().map_err(|e| classify(e, "failed to commit clear"))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::unknown_with_source("redb write task failed", e))?;

        if let Err(err) = &result {
            self.note_op_failure(err);
        }
        result
    }

    async fn list_keys(&self) -> StorageResult<Vec<String>> {
        let db = self.ensure_open().await?;

        let result = tokio::task::spawn_blocking(move || -> StorageResult<Vec<String>> {
            let txn = db
                .begin_read()
                .map_err(|e| classify(e, "failed to begin read transaction"))?;
            let table = match txn.open_table(ENTRIES_TABLE) {
                Ok(t) => t,
                Err(_) => return Ok(Vec::new()),
            };

            let mut keys = Vec::new();
            let iter = table.range(""..).map_err(|e| classify(e, "failed to scan keys"))?;
            for entry in iter {
                let entry = entry.map_err(|e| classify(e, "failed to scan entry"))?;
                keys.push(entry.0.value().to_string());
            }
            Ok(keys)
        })
        .await
        .map_err(|e| StorageError::unknown_with_source("redb read task failed", e))?;

        if let Err(err) = &result {
            self.note_op_failure(err);
        }
        result
    }

    fn name(&self) -> &'static str {
        "redb"
    }

    async fn close(&self) -> StorageResult<()> {
        let _open = self.open_lock.lock().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // Dropping the last Arc closes the database file.
        self.handle.lock().take();
        debug!(path = %self.config.path().display(), "closed redb store");
        Ok(())
    }
}

/// Interprets a stored payload as a string value.
///
/// Bytes that are not valid UTF-8 fail the type check and read as absent.
fn decode_value(bytes: &[u8]) -> Option<String> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Some(s.to_string()),
        Err(_) => None,
    }
}

/// Opens (or creates) the database and verifies its schema.
///
/// The table structure is created only if absent; a stored schema version
/// newer than [`SCHEMA_VERSION`] is corruption.
fn open_database(path: &Path) -> StorageResult<Database> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| classify(e, "failed to create store directory"))?;
    }

    let db = Database::create(path).map_err(|e| classify(e, "failed to open redb store"))?;

    let txn = db
        .begin_write()
        .map_err(|e| classify(e, "failed to begin schema transaction"))?;
    {
        let mut meta = txn
            .open_table(META_TABLE)
            .map_err(|e| classify(e, "failed to open meta table"))?;
        let stored = meta
            .get(SCHEMA_VERSION_KEY)
            .map_err(|e| classify(e, "failed to read schema version"))?
            .map(|guard| guard.value());
        match stored {
            None => {
                meta.insert(SCHEMA_VERSION_KEY, SCHEMA_VERSION)
                    .map_err(|e| classify(e, "failed to stamp schema version"))?;
            },
            Some(version) if version > SCHEMA_VERSION => {
                return Err(StorageError::corrupted(format!(
                    "store schema version {version} is newer than supported {SCHEMA_VERSION}"
                )));
            },
            Some(_) => {},
        }

        txn.open_table(ENTRIES_TABLE)
            .map_err(|e| classify(e, "failed to open entries table"))?;
    }
    txn.commit().map_err(|e| classify(e, "failed to commit schema transaction"))?;

    Ok(db)
}

/// Checks whether a redb store can be created in `dir` at all.
///
/// Creates and immediately deletes a uniquely named scratch database.
/// Intended for the factory's backend-support probe; any error means
/// "unsupported".
pub fn probe_support(dir: &Path) -> StorageResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| classify(e, "failed to create probe directory"))?;

    let seq = PROBE_SEQ.fetch_add(1, Ordering::Relaxed);
    let path = dir.join(format!(".redb-probe-{}-{seq}.tmp", std::process::id()));

    let db = Database::create(&path).map_err(|e| classify(e, "failed to open scratch store"))?;
    drop(db);
    let _ = std::fs::remove_file(&path);
    Ok(())
}

fn quarantine_path(path: &Path) -> PathBuf {
    let mut quarantined = path.as_os_str().to_owned();
    quarantined.push(".corrupt");
    PathBuf::from(quarantined)
}

/// Classifies a backend-native error into the storage taxonomy.
///
/// The single conversion point for this backend. I/O causes anywhere in the
/// source chain are classified by platform error kind; remaining redb
/// errors by their reported failure.
fn classify<E>(err: E, ctx: &str) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = format!("{ctx}: {err}");

    if let Some(kind) = find_io_kind(&err) {
        use std::io::ErrorKind as IoKind;
        return match kind {
            IoKind::StorageFull | IoKind::QuotaExceeded | IoKind::FileTooLarge => {
                StorageError::quota_with_source(message, err)
            },
            IoKind::PermissionDenied | IoKind::ReadOnlyFilesystem => {
                StorageError::access_denied_with_source(message, err)
            },
            IoKind::InvalidData | IoKind::UnexpectedEof => {
                StorageError::corrupted_with_source(message, err)
            },
            _ => StorageError::unknown_with_source(message, err),
        };
    }

    let lower = err.to_string().to_ascii_lowercase();
    if lower.contains("corrupt")
        || lower.contains("checksum")
        || lower.contains("upgrade")
        || lower.contains("invalid magic")
        || lower.contains("repair")
    {
        StorageError::corrupted_with_source(message, err)
    } else if lower.contains("no space left") || lower.contains("disk full") {
        StorageError::quota_with_source(message, err)
    } else if lower.contains("permission denied")
        || lower.contains("read-only")
        || lower.contains("already open")
        || lower.contains("lock")
    {
        StorageError::access_denied_with_source(message, err)
    } else {
        StorageError::unknown_with_source(message, err)
    }
}

/// Walks the source chain looking for an underlying I/O error.
fn find_io_kind(err: &(dyn std::error::Error + 'static)) -> Option<std::io::ErrorKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        current = e.source();
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    /// Create a temporary RedbAdapter for testing.
    ///
    /// Uses `tempdir()` so the directory persists for the lifetime of the
    /// test while redb holds the file open.
    fn temp_adapter() -> (RedbAdapter, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");
        let config = RedbAdapterConfig::builder().path(path).build().unwrap();
        (RedbAdapter::new(config), dir)
    }

    #[tokio::test]
    async fn basic_crud() {
        let (adapter, _dir) = temp_adapter();

        assert_eq!(adapter.get("key1").await.unwrap(), None);

        adapter.set("key1", "value1").await.unwrap();
        assert_eq!(adapter.get("key1").await.unwrap(), Some("value1".to_string()));

        adapter.set("key1", "updated").await.unwrap();
        assert_eq!(adapter.get("key1").await.unwrap(), Some("updated".to_string()));

        adapter.remove("key1").await.unwrap();
        assert_eq!(adapter.get("key1").await.unwrap(), None);

        // Removing a missing key is a no-op.
        adapter.remove("nonexistent").await.unwrap();
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("persist.redb");

        {
            let config = RedbAdapterConfig::builder().path(path.clone()).build().unwrap();
            let adapter = RedbAdapter::new(config);
            adapter.set("persistent-key", "persistent-value").await.unwrap();
            adapter.close().await.unwrap();
        }

        let config = RedbAdapterConfig::builder().path(path).build().unwrap();
        let adapter = RedbAdapter::new(config);
        assert_eq!(
            adapter.get("persistent-key").await.unwrap(),
            Some("persistent-value".to_string())
        );
    }

    #[tokio::test]
    async fn list_keys_is_sorted() {
        let (adapter, _dir) = temp_adapter();

        adapter.set("sprout.settings", "{}").await.unwrap();
        adapter.set("sprout.journal", "[]").await.unwrap();
        adapter.set("sprout.plantings", "[]").await.unwrap();

        assert_eq!(
            adapter.list_keys().await.unwrap(),
            vec!["sprout.journal", "sprout.plantings", "sprout.settings"]
        );
    }

    #[tokio::test]
    async fn list_keys_on_fresh_store_is_empty() {
        let (adapter, _dir) = temp_adapter();
        assert!(adapter.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let (adapter, _dir) = temp_adapter();

        adapter.set("a", "1").await.unwrap();
        adapter.set("b", "2").await.unwrap();
        adapter.clear().await.unwrap();

        assert!(adapter.list_keys().await.unwrap().is_empty());
        assert_eq!(adapter.get("a").await.unwrap(), None);

        // The store stays usable after a clear.
        adapter.set("c", "3").await.unwrap();
        assert_eq!(adapter.get("c").await.unwrap(), Some("3".to_string()));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_operations() {
        let (adapter, _dir) = temp_adapter();

        adapter.set("key", "value").await.unwrap();
        adapter.close().await.unwrap();
        adapter.close().await.unwrap();

        let err = adapter.get("key").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn close_before_first_use_is_a_noop() {
        let (adapter, _dir) = temp_adapter();
        adapter.close().await.unwrap();
        adapter.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_first_operations_share_one_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("concurrent.redb");
        let config = RedbAdapterConfig::builder().path(path).build().unwrap();
        let adapter = std::sync::Arc::new(RedbAdapter::new(config));

        let mut tasks = Vec::new();
        for i in 0..8 {
            let adapter = std::sync::Arc::clone(&adapter);
            tasks.push(tokio::spawn(async move {
                adapter.set(&format!("key-{i}"), &format!("value-{i}")).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(adapter.list_keys().await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn non_utf8_payload_reads_as_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.redb");

        // Write a non-UTF-8 payload through raw redb, bypassing the adapter.
        {
            let db = Database::create(&path).unwrap();
            let txn = db.begin_write().unwrap();
            {
                let mut table = txn.open_table(ENTRIES_TABLE).unwrap();
                table.insert("binary", [0xff, 0xfe, 0x00].as_slice()).unwrap();
                table.insert("text", "fine".as_bytes()).unwrap();
            }
            txn.commit().unwrap();
        }

        let config = RedbAdapterConfig::builder().path(path).build().unwrap();
        let adapter = RedbAdapter::new(config);

        assert_eq!(adapter.get("binary").await.unwrap(), None);
        assert_eq!(adapter.get("text").await.unwrap(), Some("fine".to_string()));
    }

    #[tokio::test]
    async fn newer_schema_version_is_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("future.redb");

        {
            let db = Database::create(&path).unwrap();
            let txn = db.begin_write().unwrap();
            {
                let mut meta = txn.open_table(META_TABLE).unwrap();
                meta.insert(SCHEMA_VERSION_KEY, SCHEMA_VERSION + 1).unwrap();
            }
            txn.commit().unwrap();
        }

        let config = RedbAdapterConfig::builder().path(path).build().unwrap();
        let adapter = RedbAdapter::new(config);

        let err = adapter.get("anything").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedData);
    }

    #[tokio::test]
    async fn repair_quarantines_an_unreadable_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.redb");
        std::fs::write(&path, b"this is not a redb file, not even close").unwrap();

        let config = RedbAdapterConfig::builder().path(path.clone()).build().unwrap();
        let adapter = RedbAdapter::new(config);

        // Operations on the broken store fail...
        assert!(adapter.get("key").await.is_err());

        // ...repair quarantines the file and recreates a working store.
        adapter.repair().await.unwrap();
        assert!(quarantine_path(&path).exists(), "corrupt store should be renamed aside");

        adapter.set("key", "value").await.unwrap();
        assert_eq!(adapter.get("key").await.unwrap(), Some("value".to_string()));
    }

    #[tokio::test]
    async fn probe_support_succeeds_in_writable_dir() {
        let dir = tempdir().unwrap();
        probe_support(dir.path()).unwrap();

        // The scratch store must be cleaned up.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "probe should clean up after itself: {leftovers:?}");
    }

    #[tokio::test]
    async fn name_is_redb() {
        let (adapter, _dir) = temp_adapter();
        assert_eq!(adapter.name(), "redb");
    }
}
