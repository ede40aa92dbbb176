//! Durable configuration management with bootstrap fallback.
//!
//! [`StorageConfigManager`] persists [`StorageConfig`] as JSON in its own
//! dedicated redb store, separate from the data store, so the data adapter
//! can be disposed and recreated without touching configuration.
//!
//! # Bootstrap Phase
//!
//! Until a configuration load from the store has succeeded at least once,
//! the manager is in [`Phase::Bootstrapping`]: a failed load falls back to
//! defaults immediately and schedules a single deferred retry (5 s). Once
//! any load succeeds, the phase becomes [`Phase::Ready`] permanently for
//! this process lifetime.
//!
//! # Concurrency
//!
//! Reads are served from an in-memory cache. Cache misses serialize on an
//! async mutex and re-check the cache, so concurrent callers never trigger
//! duplicate loads.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use parking_lot::{Mutex, RwLock};
use sprout_storage::{StorageAdapter, StorageError, StorageResult};
use sprout_storage_redb::RedbAdapter;
use tracing::{debug, warn};

use crate::{
    config::{StorageConfig, StorageConfigPatch},
    keys::STORAGE_CONFIG_KEY,
};

/// Delay before a failed bootstrap load is retried.
pub const CONFIG_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Whether the configuration store has been confirmed readable yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No load has succeeded; reads fall back to defaults and a deferred
    /// retry reconciles later.
    Bootstrapping,
    /// A load has succeeded; the store is authoritative.
    Ready,
}

struct Inner {
    store: RedbAdapter,
    cached: RwLock<Option<StorageConfig>>,
    /// Serializes load and reset so concurrent misses share one load.
    load_lock: tokio::sync::Mutex<()>,
    phase: Mutex<Phase>,
    retry_scheduled: AtomicBool,
    retry_delay: Duration,
}

/// Persists and caches the factory configuration.
///
/// Cheaply cloneable; all clones share the same cache and store.
#[derive(Clone)]
pub struct StorageConfigManager {
    inner: Arc<Inner>,
}

impl StorageConfigManager {
    /// Creates a manager over the given dedicated config store.
    #[must_use]
    pub fn new(store: RedbAdapter) -> Self {
        Self::with_retry_delay(store, CONFIG_RETRY_DELAY)
    }

    /// Creates a manager with a custom bootstrap retry delay.
    #[must_use]
    pub fn with_retry_delay(store: RedbAdapter, retry_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                cached: RwLock::new(None),
                load_lock: tokio::sync::Mutex::new(()),
                phase: Mutex::new(Phase::Bootstrapping),
                retry_scheduled: AtomicBool::new(false),
                retry_delay,
            }),
        }
    }

    /// Returns the current bootstrap phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.inner.phase.lock()
    }

    /// Returns the current configuration.
    ///
    /// Never fails: a load failure during bootstrap falls back to defaults
    /// and schedules a deferred retry to reconcile.
    pub async fn get_config(&self) -> StorageConfig {
        if let Some(config) = self.inner.cached.read().clone() {
            return config;
        }

        let _load = self.inner.load_lock.lock().await;

        // Lost the race: another caller finished the load while we waited.
        if let Some(config) = self.inner.cached.read().clone() {
            return config;
        }

        match self.load().await {
            Ok(config) => {
                *self.inner.phase.lock() = Phase::Ready;
                *self.inner.cached.write() = Some(config.clone());
                debug!(mode = %config.mode, "storage config loaded");
                config
            },
            Err(err) => {
                warn!(error = %err, "storage config load failed, falling back to defaults");
                let defaults = StorageConfig::default();
                *self.inner.cached.write() = Some(defaults.clone());
                self.schedule_retry();
                defaults
            },
        }
    }

    /// Merges `patch` into the current configuration, sanitizes the result,
    /// persists it best-effort, and updates the in-memory cache.
    ///
    /// A persistence failure is logged and the manager keeps operating with
    /// the updated value in memory only — it never corrupts the cache.
    pub async fn update_config(&self, patch: StorageConfigPatch) -> StorageResult<()> {
        let current = self.get_config().await;
        let updated = current.merged(patch).sanitized();

        if let Err(err) = self.persist(&updated).await {
            warn!(error = %err, "failed to persist storage config, keeping the update in memory only");
        }
        *self.inner.cached.write() = Some(updated);
        Ok(())
    }

    /// Clears the cache, re-enters the bootstrap phase, and persists the
    /// default configuration best-effort.
    pub async fn reset_to_defaults(&self) {
        let _load = self.inner.load_lock.lock().await;
        *self.inner.cached.write() = None;
        *self.inner.phase.lock() = Phase::Bootstrapping;

        let defaults = StorageConfig::default();
        if let Err(err) = self.persist(&defaults).await {
            warn!(error = %err, "failed to persist default storage config during reset");
        }
    }

    /// Closes the underlying config store.
    pub async fn close(&self) -> StorageResult<()> {
        self.inner.store.close().await
    }

    /// Loads the configuration from the store.
    ///
    /// A missing entry is the first access: defaults are persisted and
    /// returned. An unreadable entry is replaced by defaults — a corrupt
    /// config must never take the storage layer down.
    async fn load(&self) -> StorageResult<StorageConfig> {
        match self.inner.store.get(STORAGE_CONFIG_KEY).await? {
            Some(raw) => match serde_json::from_str::<StorageConfig>(&raw) {
                Ok(config) => Ok(config.sanitized()),
                Err(err) => {
                    warn!(error = %err, "persisted storage config is unreadable, replacing with defaults");
                    let defaults = StorageConfig::default();
                    if let Err(persist_err) = self.persist(&defaults).await {
                        warn!(error = %persist_err, "failed to replace unreadable storage config");
                    }
                    Ok(defaults)
                },
            },
            None => {
                let defaults = StorageConfig::default();
                if let Err(err) = self.persist(&defaults).await {
                    warn!(error = %err, "failed to persist initial storage config");
                }
                Ok(defaults)
            },
        }
    }

    async fn persist(&self, config: &StorageConfig) -> StorageResult<()> {
        let json = serde_json::to_string(config)
            .map_err(|e| StorageError::unknown_with_source("failed to serialize storage config", e))?;
        self.inner.store.set(STORAGE_CONFIG_KEY, &json).await
    }

    /// Schedules a single deferred retry of the bootstrap load.
    ///
    /// At most one retry task exists at a time; a failed retry reschedules
    /// itself until a load succeeds.
    fn schedule_retry(&self) {
        if self.inner.retry_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        let manager = self.clone();
        let delay = self.inner.retry_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.retry_load().await;
        });
    }

    async fn retry_load(&self) {
        let _load = self.inner.load_lock.lock().await;
        self.inner.retry_scheduled.store(false, Ordering::Release);

        if *self.inner.phase.lock() == Phase::Ready {
            return;
        }

        match self.load().await {
            Ok(config) => {
                *self.inner.phase.lock() = Phase::Ready;
                *self.inner.cached.write() = Some(config);
                debug!("storage config reconciled after bootstrap fallback");
            },
            Err(err) => {
                warn!(error = %err, "storage config retry failed, staying in bootstrap phase");
                self.schedule_retry();
            },
        }
    }
}

impl std::fmt::Debug for StorageConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfigManager").field("phase", &self.phase()).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use sprout_storage_redb::RedbAdapterConfig;
    use tempfile::tempdir;

    use super::*;
    use crate::config::{BackendMode, DEFAULT_STORAGE_VERSION};

    fn store_at(path: std::path::PathBuf) -> RedbAdapter {
        RedbAdapter::new(RedbAdapterConfig::builder().path(path).build().unwrap())
    }

    fn temp_manager() -> (StorageConfigManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let manager = StorageConfigManager::new(store_at(dir.path().join("config.redb")));
        (manager, dir)
    }

    #[tokio::test]
    async fn first_access_yields_defaults_and_ends_bootstrap() {
        let (manager, _dir) = temp_manager();
        assert_eq!(manager.phase(), Phase::Bootstrapping);

        let config = manager.get_config().await;
        assert_eq!(config, StorageConfig::default());
        assert_eq!(manager.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn updates_persist_across_managers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.redb");

        {
            let manager = StorageConfigManager::new(store_at(path.clone()));
            manager.update_config(StorageConfigPatch::mode(BackendMode::Redb)).await.unwrap();
            manager.close().await.unwrap();
        }

        let manager = StorageConfigManager::new(store_at(path));
        let config = manager.get_config().await;
        assert_eq!(config.mode, BackendMode::Redb);
    }

    #[tokio::test]
    async fn invalid_version_is_sanitized_on_update() {
        let (manager, _dir) = temp_manager();
        manager
            .update_config(StorageConfigPatch {
                version: Some("definitely not semver".to_string()),
                ..StorageConfigPatch::default()
            })
            .await
            .unwrap();

        assert_eq!(manager.get_config().await.version, DEFAULT_STORAGE_VERSION);
    }

    #[tokio::test]
    async fn corrupt_persisted_config_is_replaced_with_defaults() {
        let (manager, dir) = temp_manager();

        // Write garbage under the config key through a separate handle.
        manager.inner.store.set(STORAGE_CONFIG_KEY, "}{ not json").await.unwrap();

        let config = manager.get_config().await;
        assert_eq!(config, StorageConfig::default());
        assert_eq!(manager.phase(), Phase::Ready);
        drop(dir);
    }

    #[tokio::test]
    async fn load_failure_falls_back_to_defaults_and_stays_bootstrapping() {
        let dir = tempdir().unwrap();
        // Point the config store inside a regular file so every open fails.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"flat file").unwrap();
        let manager = StorageConfigManager::with_retry_delay(
            store_at(blocker.join("config.redb")),
            Duration::from_millis(20),
        );

        let config = manager.get_config().await;
        assert_eq!(config, StorageConfig::default());
        assert_eq!(manager.phase(), Phase::Bootstrapping);

        // Cached defaults are served without re-loading.
        let again = manager.get_config().await;
        assert_eq!(again, StorageConfig::default());

        // The deferred retry fires, fails, and leaves us bootstrapping.
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(manager.phase(), Phase::Bootstrapping);
    }

    #[tokio::test]
    async fn update_survives_persistence_failure_in_memory() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"flat file").unwrap();
        let manager = StorageConfigManager::with_retry_delay(
            store_at(blocker.join("config.redb")),
            Duration::from_secs(60),
        );

        manager.update_config(StorageConfigPatch::mode(BackendMode::Redb)).await.unwrap();
        assert_eq!(manager.get_config().await.mode, BackendMode::Redb);
    }

    #[tokio::test]
    async fn reset_restores_defaults() {
        let (manager, _dir) = temp_manager();
        manager.update_config(StorageConfigPatch::mode(BackendMode::Redb)).await.unwrap();
        assert_eq!(manager.get_config().await.mode, BackendMode::Redb);

        manager.reset_to_defaults().await;
        assert_eq!(manager.phase(), Phase::Bootstrapping);

        let config = manager.get_config().await;
        assert_eq!(config, StorageConfig::default());
        assert_eq!(manager.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn concurrent_cold_reads_share_one_load() {
        let (manager, _dir) = temp_manager();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move { manager.get_config().await }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), StorageConfig::default());
        }
    }
}
