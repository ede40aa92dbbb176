//! Storage adapter trait definition.
//!
//! This module defines the [`StorageAdapter`] trait, the core abstraction
//! for key-value persistence in Sprout. All storage backends (the file-backed
//! adapter here, the transactional redb adapter in `sprout-storage-redb`)
//! implement this trait.
//!
//! # Design Philosophy
//!
//! The trait is a minimal string-valued key-value interface:
//! - **Keys and values are UTF-8 strings**: application data is serialized JSON text
//! - **Async by default**: all operations are async so backends can do real I/O
//! - **One error taxonomy**: every operation raises only [`StorageError`], classified exactly once
//!   at the adapter boundary
//!
//! Application features (plantings, journal, reminders) never talk to a
//! concrete backend; they consume this trait through the factory.
//!
//! # Implementing an Adapter
//!
//! 1. Implement the [`StorageAdapter`] trait
//! 2. Map backend-native errors to [`StorageError`] in a single classification function
//! 3. Treat a missing key, or a stored payload failing the string type check, as absent (`None`),
//!    never as an error

use async_trait::async_trait;

use crate::error::StorageResult;

/// Abstract storage adapter for Sprout's persisted application keys.
///
/// Adapters are expected to be thread-safe (`Send + Sync`) and tolerate
/// concurrent operations.
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](StorageAdapter::get) | Retrieve a value by key (`None` if absent) |
/// | [`set`](StorageAdapter::set) | Store a key-value pair |
/// | [`remove`](StorageAdapter::remove) | Delete a key (no-op if absent) |
/// | [`clear`](StorageAdapter::clear) | Delete all keys |
/// | [`list_keys`](StorageAdapter::list_keys) | Enumerate all keys in sorted order |
/// | [`name`](StorageAdapter::name) | Identify the backing store |
/// | [`close`](StorageAdapter::close) | Release the backend (idempotent) |
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Retrieves a value by key.
    ///
    /// Returns `Ok(None)` when the key does not exist **or** when the stored
    /// payload fails the string type check (e.g. bytes that are not valid
    /// UTF-8). Absence is never an error.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores a key-value pair, overwriting any existing value.
    ///
    /// Writes that exceed the backend's quota or the configured size limits
    /// fail with [`QuotaExceeded`](crate::StorageError::QuotaExceeded).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Deletes a key. Removing a missing key is a no-op.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Deletes every key in the store.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn clear(&self) -> StorageResult<()>;

    /// Returns every key in the store, sorted.
    ///
    /// This is a bulk enumeration with no cursor — callers must tolerate
    /// O(n) result sets.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn list_keys(&self) -> StorageResult<Vec<String>>;

    /// Returns the short name of the backing store (e.g. `"file"`, `"redb"`).
    fn name(&self) -> &'static str;

    /// Closes the adapter, releasing its underlying resources.
    ///
    /// Idempotent: closing an already-closed or never-opened adapter is a
    /// no-op, not an error. Operations after close fail with
    /// [`AccessDenied`](crate::StorageError::AccessDenied).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn close(&self) -> StorageResult<()>;
}
