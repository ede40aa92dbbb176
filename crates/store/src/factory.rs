//! The storage factory: creates, self-tests, caches, and disposes adapters.
//!
//! [`StorageFactory`] is an explicit context object constructed once at
//! application start-up and held for the process lifetime — there is no
//! global state. It owns the configuration manager, the creation lock, the
//! adapter cache, and the recovery/backoff bookkeeping.
//!
//! # Creation Protocol
//!
//! 1. Acquire the creation lock (waiting callers queue; a timeout fails only the waiter).
//! 2. Serve from cache when the resolved mode and cache version match the cached snapshot.
//! 3. Otherwise dispose any previous adapter, construct one for the resolved mode, and
//!    **self-test** it: write a uniquely named probe key, read it back, delete it, confirm the
//!    delete. Any mismatch is corruption.
//! 4. Corruption triggers bounded automatic recovery (an explicit loop, capped per factory
//!    instance); other failures surface immediately.
//! 5. Repeated failures arm an exponential backoff gate checked by timestamp comparison — a
//!    premature retry fails fast instead of sleeping.
//!
//! # Cache Invalidation
//!
//! A mode change bumps the cache version and clears the cached reference in
//! one synchronous critical section, and only then closes the captured
//! previous adapter (best-effort). No caller can observe a half-invalidated
//! cache.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU32, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use sprout_storage::{
    ConfigError, ErrorKind, FileAdapter, SizeLimits, StorageAdapter, StorageError, StorageResult,
    TimedMutex, lock::DEFAULT_ACQUIRE_TIMEOUT,
};
use sprout_storage_redb::{RedbAdapter, RedbAdapterConfig};
use tracing::{debug, info, warn};

use crate::{
    backend::Adapter,
    config::{BackendMode, StorageConfig, StorageConfigPatch},
    config_manager::{CONFIG_RETRY_DELAY, StorageConfigManager},
    metrics::{FactoryMetrics, MetricsSnapshot},
};

/// Maximum automatic recovery attempts per factory instance. The counter
/// resets on any subsequent successful creation.
pub const MAX_RECOVERY_ATTEMPTS: u32 = 3;

/// Default base delay for the creation backoff.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Default ceiling for the creation backoff.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Default bound on the backend-support probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// File name of the simple backend's store within the data directory.
const STORE_FILE_NAME: &str = "sprout-store.json";

/// File name of the transactional data store within the data directory.
const DATA_DB_NAME: &str = "sprout-data.redb";

/// File name of the dedicated configuration store within the data directory.
const CONFIG_DB_NAME: &str = "sprout-config.redb";

/// Configuration for [`StorageFactory`].
#[derive(Debug, Clone)]
pub struct StorageFactoryConfig {
    data_dir: PathBuf,
    limits: SizeLimits,
    lock_timeout: Duration,
    probe_timeout: Duration,
    backoff_base: Duration,
    backoff_cap: Duration,
    config_retry_delay: Duration,
}

#[bon::bon]
impl StorageFactoryConfig {
    /// Creates a new factory configuration.
    ///
    /// # Arguments
    ///
    /// * `data_dir` - Directory holding all store files.
    ///
    /// # Optional Fields
    ///
    /// * `limits` - Key/value size limits applied to every adapter (default: standard limits).
    /// * `lock_timeout` - Bound on waiting for the creation lock (default: 5 s).
    /// * `probe_timeout` - Bound on the backend-support probe (default: 3 s).
    /// * `backoff_base` - Initial creation backoff delay (default: 500 ms).
    /// * `backoff_cap` - Ceiling on the creation backoff (default: 30 s).
    /// * `config_retry_delay` - Bootstrap retry delay for the config manager (default: 5 s).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a duration is zero or the backoff cap
    /// is below its base.
    #[builder]
    pub fn new(
        #[builder(into)] data_dir: PathBuf,
        #[builder(default)] limits: SizeLimits,
        #[builder(default = DEFAULT_ACQUIRE_TIMEOUT)] lock_timeout: Duration,
        #[builder(default = DEFAULT_PROBE_TIMEOUT)] probe_timeout: Duration,
        #[builder(default = DEFAULT_BACKOFF_BASE)] backoff_base: Duration,
        #[builder(default = DEFAULT_BACKOFF_CAP)] backoff_cap: Duration,
        #[builder(default = CONFIG_RETRY_DELAY)] config_retry_delay: Duration,
    ) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("lock_timeout", lock_timeout),
            ("probe_timeout", probe_timeout),
            ("backoff_base", backoff_base),
            ("config_retry_delay", config_retry_delay),
        ] {
            if value.is_zero() {
                return Err(ConfigError::MustBePositive { field, value: "0s".into() });
            }
        }
        if backoff_cap < backoff_base {
            return Err(ConfigError::BelowMinimum {
                field: "backoff_cap",
                min: format!("{backoff_base:?}"),
                value: format!("{backoff_cap:?}"),
            });
        }
        Ok(Self {
            data_dir,
            limits,
            lock_timeout,
            probe_timeout,
            backoff_base,
            backoff_cap,
            config_retry_delay,
        })
    }

    /// Returns the data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn store_file(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }

    fn data_db(&self) -> PathBuf {
        self.data_dir.join(DATA_DB_NAME)
    }

    fn config_db(&self) -> PathBuf {
        self.data_dir.join(CONFIG_DB_NAME)
    }
}

/// The cached adapter together with the configuration snapshot it was
/// created under.
struct CachedAdapter {
    adapter: Arc<Adapter>,
    mode: BackendMode,
    cache_version: u64,
}

#[derive(Default)]
struct CacheState {
    adapter: Option<CachedAdapter>,
    /// Monotonic version; bumped on every (re)creation and invalidation.
    version: u64,
}

#[derive(Default)]
struct BackoffState {
    consecutive_failures: u32,
    last_attempt: Option<Instant>,
}

/// Creates, self-tests, caches, and disposes storage adapters.
pub struct StorageFactory {
    config: StorageFactoryConfig,
    config_manager: StorageConfigManager,
    creation_lock: TimedMutex,
    cache: Mutex<CacheState>,
    backoff: Mutex<BackoffState>,
    recovery_attempts: AtomicU32,
    probe_seq: AtomicU64,
    metrics: FactoryMetrics,
}

impl StorageFactory {
    /// Creates a factory over the given configuration.
    ///
    /// No store is opened yet; everything is lazy until the first
    /// [`create_adapter`](Self::create_adapter) or
    /// [`get_config`](Self::get_config) call.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the derived config-store configuration
    /// is invalid.
    pub fn new(config: StorageFactoryConfig) -> Result<Self, ConfigError> {
        let config_store = RedbAdapter::new(
            RedbAdapterConfig::builder().path(config.config_db()).limits(config.limits).build()?,
        );
        let config_manager =
            StorageConfigManager::with_retry_delay(config_store, config.config_retry_delay);

        Ok(Self {
            creation_lock: TimedMutex::new(config.lock_timeout),
            config,
            config_manager,
            cache: Mutex::new(CacheState::default()),
            backoff: Mutex::new(BackoffState::default()),
            recovery_attempts: AtomicU32::new(0),
            probe_seq: AtomicU64::new(0),
            metrics: FactoryMetrics::new(),
        })
    }

    /// Returns (creating if necessary) the live adapter.
    ///
    /// Creation is strictly serialized: concurrent callers either receive
    /// the cached adapter or queue behind the in-flight creation. Passing
    /// `force_mode` bypasses the cache and the configured mode.
    pub async fn create_adapter(
        &self,
        force_mode: Option<BackendMode>,
    ) -> StorageResult<Arc<Adapter>> {
        let _guard = self.creation_lock.acquire().await?;

        let config = self.config_manager.get_config().await;
        let resolved = self.resolve_mode(force_mode, &config);

        if force_mode.is_none()
            && let Some(cached) = self.cache_hit(resolved)
        {
            self.metrics.record_cache_hit();
            debug!(backend = cached.name(), "returning cached adapter");
            return Ok(cached);
        }

        self.check_backoff()?;

        let previous = self.cache.lock().adapter.take();
        if let Some(previous) = previous {
            debug!(backend = %previous.mode, "replacing cached adapter");
            self.dispose(previous).await;
        }

        // Bounded recovery loop: corruption triggers a repair and a full
        // retry; the attempt counter is factory-wide and resets on success.
        loop {
            let outcome = match self.build(resolved) {
                Ok(adapter) => match self.self_test(&adapter).await {
                    Ok(()) => Ok(adapter),
                    Err(err) => {
                        self.metrics.record_self_test_failure();
                        // Release file locks before any repair touches the store.
                        if let Err(close_err) = adapter.close().await {
                            warn!(error = %close_err, "failed to close adapter after failed self-test");
                        }
                        Err(err)
                    },
                },
                Err(err) => Err(err),
            };

            match outcome {
                Ok(adapter) => {
                    let adapter = Arc::new(adapter);
                    let version = {
                        let mut cache = self.cache.lock();
                        cache.version += 1;
                        cache.adapter = Some(CachedAdapter {
                            adapter: Arc::clone(&adapter),
                            mode: resolved,
                            cache_version: cache.version,
                        });
                        cache.version
                    };
                    self.note_success();
                    self.metrics.record_adapter_created();
                    info!(backend = adapter.name(), cache_version = version, "storage adapter ready");
                    return Ok(adapter);
                },
                Err(err) if err.kind() == ErrorKind::CorruptedData => {
                    let attempt = self.recovery_attempts.fetch_add(1, Ordering::AcqRel) + 1;
                    if attempt > MAX_RECOVERY_ATTEMPTS {
                        warn!(attempts = attempt - 1, "storage recovery attempts exhausted");
                        self.note_failure();
                        self.metrics.record_creation_failure();
                        return Err(err);
                    }
                    self.metrics.record_recovery_attempt();
                    warn!(attempt, error = %err, "storage corruption detected, attempting recovery");
                    match self.repair(resolved).await {
                        Ok(()) => {
                            self.metrics.record_recovery_success();
                            continue;
                        },
                        Err(repair_err) => {
                            warn!(error = %repair_err, "storage recovery failed");
                            self.note_failure();
                            self.metrics.record_creation_failure();
                            // Surface the original error, not the repair failure.
                            return Err(err);
                        },
                    }
                },
                Err(err) => {
                    self.note_failure();
                    self.metrics.record_creation_failure();
                    return Err(err);
                },
            }
        }
    }

    /// Returns the current configuration.
    pub async fn get_config(&self) -> StorageConfig {
        self.config_manager.get_config().await
    }

    /// Applies a configuration update; a mode change atomically invalidates
    /// the adapter cache and disposes the previous adapter best-effort.
    pub async fn update_config(&self, patch: StorageConfigPatch) -> StorageResult<()> {
        let previous_mode = self.config_manager.get_config().await.mode;
        self.config_manager.update_config(patch).await?;
        let new_mode = self.config_manager.get_config().await.mode;

        if previous_mode != new_mode {
            debug!(from = %previous_mode, to = %new_mode, "storage mode changed, invalidating adapter cache");
            self.invalidate_cache().await;
        }
        Ok(())
    }

    /// Resets the configuration to defaults and invalidates the cache if
    /// the mode changes as a result.
    pub async fn reset_to_defaults(&self) {
        let previous_mode = self.config_manager.get_config().await.mode;
        self.config_manager.reset_to_defaults().await;

        if previous_mode != StorageConfig::default().mode {
            self.invalidate_cache().await;
        }
    }

    /// Probes whether the transactional backend works in this environment.
    ///
    /// Opens and immediately deletes a uniquely named scratch store, bounded
    /// by the configured probe timeout. Any error, block, or timeout
    /// resolves to `false`; this never fails.
    pub async fn is_backend_supported(&self) -> bool {
        let dir = self.config.data_dir().to_path_buf();
        let probe = tokio::task::spawn_blocking(move || sprout_storage_redb::probe_support(&dir));

        match tokio::time::timeout(self.config.probe_timeout, probe).await {
            Ok(Ok(Ok(()))) => true,
            Ok(Ok(Err(err))) => {
                debug!(error = %err, "transactional backend unsupported");
                false
            },
            Ok(Err(join_err)) => {
                debug!(error = %join_err, "backend support probe task failed");
                false
            },
            Err(_elapsed) => {
                debug!(timeout = ?self.config.probe_timeout, "backend support probe timed out");
                false
            },
        }
    }

    /// Returns a snapshot of the factory telemetry counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Non-blocking observation of whether a creation is in flight.
    #[must_use]
    pub fn is_creating(&self) -> bool {
        self.creation_lock.is_locked()
    }

    /// Atomic cache invalidation: capture the reference and bump the version
    /// in one synchronous critical section, then dispose outside it.
    async fn invalidate_cache(&self) {
        let captured = {
            let mut cache = self.cache.lock();
            cache.version += 1;
            cache.adapter.take()
        };
        if let Some(previous) = captured {
            self.dispose(previous).await;
        }
    }

    fn cache_hit(&self, resolved: BackendMode) -> Option<Arc<Adapter>> {
        let cache = self.cache.lock();
        let cached = cache.adapter.as_ref()?;
        (cached.mode == resolved && cached.cache_version == cache.version)
            .then(|| Arc::clone(&cached.adapter))
    }

    /// Resolves the target mode: explicit force, then the configured
    /// override, then the configured mode — clamped away from the
    /// transactional backend while it is locked out by repeated migration
    /// failures.
    fn resolve_mode(&self, force: Option<BackendMode>, config: &StorageConfig) -> BackendMode {
        let target = force.or(config.force_mode).unwrap_or(config.mode);
        if target == BackendMode::Redb && config.transactional_locked_out() {
            warn!(
                failures = config.migration_failure_count,
                "transactional backend locked out after repeated migration failures, using file backend",
            );
            return BackendMode::File;
        }
        target
    }

    fn build(&self, mode: BackendMode) -> StorageResult<Adapter> {
        match mode {
            BackendMode::File => {
                Ok(Adapter::File(FileAdapter::open(self.config.store_file(), self.config.limits)?))
            },
            BackendMode::Redb => Ok(Adapter::Redb(RedbAdapter::new(
                RedbAdapterConfig::builder()
                    .path(self.config.data_db())
                    .limits(self.config.limits)
                    .build()
                    .map_err(|e| StorageError::unknown(e.to_string()))?,
            ))),
        }
    }

    async fn self_test(&self, adapter: &Adapter) -> StorageResult<()> {
        let nonce = self.probe_seq.fetch_add(1, Ordering::Relaxed);
        run_self_test(adapter, nonce).await
    }

    /// Backend-specific repair, against the store the failed adapter used.
    async fn repair(&self, mode: BackendMode) -> StorageResult<()> {
        match mode {
            BackendMode::File => {
                let path = self.config.store_file();
                tokio::task::spawn_blocking(move || repair_file_store(&path))
                    .await
                    .map_err(|e| StorageError::unknown_with_source("file repair task failed", e))?
            },
            BackendMode::Redb => {
                let adapter = RedbAdapter::new(
                    RedbAdapterConfig::builder()
                        .path(self.config.data_db())
                        .limits(self.config.limits)
                        .build()
                        .map_err(|e| StorageError::unknown(e.to_string()))?,
                );
                let result = adapter.repair().await;
                if let Err(err) = adapter.close().await {
                    warn!(error = %err, "failed to close repair adapter");
                }
                result
            },
        }
    }

    async fn dispose(&self, previous: CachedAdapter) {
        self.metrics.record_disposal();
        if let Err(err) = previous.adapter.close().await {
            self.metrics.record_disposal_failure();
            warn!(backend = %previous.mode, error = %err, "failed to close previous adapter");
        }
    }

    fn check_backoff(&self) -> StorageResult<()> {
        let state = self.backoff.lock();
        if state.consecutive_failures == 0 {
            return Ok(());
        }
        let delay =
            compute_backoff(self.config.backoff_base, state.consecutive_failures, self.config.backoff_cap);
        if let Some(last) = state.last_attempt {
            let elapsed = last.elapsed();
            if elapsed < delay {
                return Err(StorageError::unknown(format!(
                    "adapter creation is backing off after {} consecutive failures; retry in {:?}",
                    state.consecutive_failures,
                    delay - elapsed,
                )));
            }
        }
        Ok(())
    }

    fn note_failure(&self) {
        let mut state = self.backoff.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_attempt = Some(Instant::now());
    }

    fn note_success(&self) {
        let mut state = self.backoff.lock();
        state.consecutive_failures = 0;
        state.last_attempt = None;
        drop(state);
        self.recovery_attempts.store(0, Ordering::Release);
    }
}

impl std::fmt::Debug for StorageFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageFactory")
            .field("data_dir", &self.config.data_dir)
            .field("creating", &self.is_creating())
            .finish()
    }
}

/// Probes a freshly constructed adapter before it is cached.
///
/// Writes a uniquely named probe key, reads it back and compares exactly,
/// deletes it, and confirms the delete took effect. Any mismatch is
/// corruption; adapter errors keep their own classification with self-test
/// context added.
async fn run_self_test<A>(adapter: &A, nonce: u64) -> StorageResult<()>
where
    A: StorageAdapter + ?Sized,
{
    let key = format!("__sprout.probe.{}.{nonce}", std::process::id());
    let value = format!("probe-{nonce}");

    adapter
        .set(&key, &value)
        .await
        .map_err(|e| e.with_context("adapter self-test write failed"))?;

    let read = adapter
        .get(&key)
        .await
        .map_err(|e| e.with_context("adapter self-test read failed"))?;
    if read.as_deref() != Some(value.as_str()) {
        return Err(StorageError::corrupted(format!(
            "adapter self-test read mismatch: wrote {value:?}, read back {read:?}"
        )));
    }

    adapter
        .remove(&key)
        .await
        .map_err(|e| e.with_context("adapter self-test delete failed"))?;

    let after = adapter
        .get(&key)
        .await
        .map_err(|e| e.with_context("adapter self-test verify failed"))?;
    if after.is_some() {
        return Err(StorageError::corrupted("adapter self-test delete did not take effect"));
    }
    Ok(())
}

/// Repairs the simple backend's store: an unparseable store file is
/// quarantined (renamed aside) so the next open starts fresh.
fn repair_file_store(path: &Path) -> StorageResult<()> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(StorageError::unknown_with_source(
                "failed to read store file during repair",
                err,
            ));
        },
    };

    let healthy =
        matches!(serde_json::from_str::<serde_json::Value>(&raw), Ok(serde_json::Value::Object(_)));
    if healthy {
        return Ok(());
    }

    let mut quarantined = path.as_os_str().to_owned();
    quarantined.push(".corrupt");
    let quarantined = PathBuf::from(quarantined);
    warn!(path = %path.display(), quarantined = %quarantined.display(), "quarantining unparseable store file");
    std::fs::rename(path, &quarantined)
        .map_err(|e| StorageError::unknown_with_source("failed to quarantine store file", e))
}

/// Exponential backoff: the base delay doubles per consecutive failure,
/// capped at the ceiling.
fn compute_backoff(base: Duration, consecutive_failures: u32, cap: Duration) -> Duration {
    let exponent = consecutive_failures.saturating_sub(1);
    let doubled = base.saturating_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX));
    doubled.min(cap)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;

    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(500);
        let cap = Duration::from_secs(30);

        assert_eq!(compute_backoff(base, 1, cap), Duration::from_millis(500));
        assert_eq!(compute_backoff(base, 2, cap), Duration::from_secs(1));
        assert_eq!(compute_backoff(base, 3, cap), Duration::from_secs(2));
        assert_eq!(compute_backoff(base, 8, cap), Duration::from_secs(30));
        assert_eq!(compute_backoff(base, 32, cap), Duration::from_secs(30));
    }

    #[test]
    fn config_rejects_zero_durations() {
        let result = StorageFactoryConfig::builder()
            .data_dir("/tmp/sprout")
            .lock_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn config_rejects_cap_below_base() {
        let result = StorageFactoryConfig::builder()
            .data_dir("/tmp/sprout")
            .backoff_base(Duration::from_secs(10))
            .backoff_cap(Duration::from_secs(1))
            .build();
        assert!(result.is_err());
    }

    /// A mock adapter whose reads return a corrupted payload, for driving
    /// the self-test failure path.
    struct LyingAdapter {
        entries: SyncMutex<BTreeMap<String, String>>,
        lie_on_get: bool,
        swallow_removes: bool,
    }

    impl LyingAdapter {
        fn new(lie_on_get: bool, swallow_removes: bool) -> Self {
            Self { entries: SyncMutex::new(BTreeMap::new()), lie_on_get, swallow_removes }
        }
    }

    #[async_trait]
    impl StorageAdapter for LyingAdapter {
        async fn get(&self, key: &str) -> StorageResult<Option<String>> {
            let value = self.entries.lock().get(key).cloned();
            if self.lie_on_get {
                return Ok(value.map(|v| format!("{v}-mangled")));
            }
            Ok(value)
        }

        async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            self.entries.lock().insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn remove(&self, key: &str) -> StorageResult<()> {
            if !self.swallow_removes {
                self.entries.lock().remove(key);
            }
            Ok(())
        }

        async fn clear(&self) -> StorageResult<()> {
            self.entries.lock().clear();
            Ok(())
        }

        async fn list_keys(&self) -> StorageResult<Vec<String>> {
            Ok(self.entries.lock().keys().cloned().collect())
        }

        fn name(&self) -> &'static str {
            "lying"
        }

        async fn close(&self) -> StorageResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn self_test_passes_on_honest_adapter() {
        let adapter = LyingAdapter::new(false, false);
        run_self_test(&adapter, 1).await.unwrap();
        assert!(adapter.entries.lock().is_empty(), "probe key must be cleaned up");
    }

    #[tokio::test]
    async fn self_test_read_mismatch_is_corruption() {
        let adapter = LyingAdapter::new(true, false);
        let err = run_self_test(&adapter, 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedData);
        assert!(err.to_string().contains("mismatch"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn self_test_ineffective_delete_is_corruption() {
        let adapter = LyingAdapter::new(false, true);
        let err = run_self_test(&adapter, 3).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedData);
        assert!(err.to_string().contains("delete"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn repair_file_store_ignores_missing_and_healthy_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        // Missing file: nothing to repair.
        repair_file_store(&path).unwrap();

        // Healthy file: left alone.
        std::fs::write(&path, r#"{"a":"1"}"#).unwrap();
        repair_file_store(&path).unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn repair_file_store_quarantines_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "definitely { not json").unwrap();

        repair_file_store(&path).unwrap();
        assert!(!path.exists(), "corrupt file should be moved aside");
        assert!(dir.path().join("store.json.corrupt").exists());
    }
}
