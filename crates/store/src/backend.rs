//! Unified adapter enum for Sprout storage.
//!
//! [`Adapter`] wraps the available backend implementations behind one type,
//! enabling runtime selection by the factory while keeping static dispatch.
//!
//! | Variant | Backend |
//! |---------|---------|
//! | [`Adapter::File`] | Flat JSON file (simple) |
//! | [`Adapter::Redb`] | Embedded redb database (transactional) |

use async_trait::async_trait;
use sprout_storage::{FileAdapter, StorageAdapter, StorageResult};
use sprout_storage_redb::RedbAdapter;

use crate::config::BackendMode;

/// Unified storage adapter.
///
/// This enum wraps the backend implementations, enabling runtime selection
/// while maintaining type safety. The factory constructs, self-tests, and
/// caches values of this type.
pub enum Adapter {
    /// File-backed simple adapter.
    File(FileAdapter),
    /// redb-backed transactional adapter.
    Redb(RedbAdapter),
}

impl Adapter {
    /// Returns the mode this adapter was built for.
    #[must_use]
    pub fn mode(&self) -> BackendMode {
        match self {
            Self::File(_) => BackendMode::File,
            Self::Redb(_) => BackendMode::Redb,
        }
    }
}

#[async_trait]
impl StorageAdapter for Adapter {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match self {
            Self::File(a) => a.get(key).await,
            Self::Redb(a) => a.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        match self {
            Self::File(a) => a.set(key, value).await,
            Self::Redb(a) => a.set(key, value).await,
        }
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        match self {
            Self::File(a) => a.remove(key).await,
            Self::Redb(a) => a.remove(key).await,
        }
    }

    async fn clear(&self) -> StorageResult<()> {
        match self {
            Self::File(a) => a.clear().await,
            Self::Redb(a) => a.clear().await,
        }
    }

    async fn list_keys(&self) -> StorageResult<Vec<String>> {
        match self {
            Self::File(a) => a.list_keys().await,
            Self::Redb(a) => a.list_keys().await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::File(a) => a.name(),
            Self::Redb(a) => a.name(),
        }
    }

    async fn close(&self) -> StorageResult<()> {
        match self {
            Self::File(a) => a.close().await,
            Self::Redb(a) => a.close().await,
        }
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(_) => write!(f, "Adapter::File"),
            Self::Redb(_) => write!(f, "Adapter::Redb"),
        }
    }
}
