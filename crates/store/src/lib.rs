//! Sprout's storage layer: backend selection, durable configuration, and
//! crash-safe migration backups.
//!
//! This crate is the top of the storage stack. It owns the
//! [`StorageFactory`] — the single context object the application holds for
//! its whole lifetime — which resolves configuration, constructs and
//! self-tests adapters, caches exactly one live adapter under a monotonic
//! cache version, recovers from detected corruption, and emits telemetry.
//!
//! # Components
//!
//! | Component | Responsibility |
//! |-----------|----------------|
//! | [`Adapter`] | Unified enum over the file and redb backends |
//! | [`StorageFactory`] | Create/test/cache/dispose adapters under concurrency |
//! | [`StorageConfigManager`] | Durable [`StorageConfig`] with bootstrap fallback |
//! | [`BackupManager`] | Checksummed snapshots of the critical keys |
//!
//! # Quick Start
//!
//! ```no_run
//! use sprout_storage::StorageAdapter;
//! use sprout_store::{StorageFactory, StorageFactoryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factory = StorageFactory::new(
//!         StorageFactoryConfig::builder().data_dir("/tmp/sprout").build()?,
//!     )?;
//!
//!     let adapter = factory.create_adapter(None).await?;
//!     adapter.set("sprout.settings", r#"{"theme":"dark"}"#).await?;
//!
//!     // Subsequent calls are cache hits while the configuration is stable.
//!     let same = factory.create_adapter(None).await?;
//!     assert_eq!(same.name(), adapter.name());
//!     Ok(())
//! }
//! ```
//!
//! # Migration Flow
//!
//! ```no_run
//! use std::sync::Arc;
//! use sprout_store::{BackupManager, StorageFactory, StorageFactoryConfig};
//!
//! # async fn migrate(factory: Arc<StorageFactory>) -> Result<(), Box<dyn std::error::Error>> {
//! let backups = BackupManager::new(Arc::clone(&factory));
//!
//! let backup = backups.create("2.0.0").await?;
//! match run_schema_migration().await {
//!     Ok(()) => backups.clear_persisted_backup().await?,
//!     Err(_) => backups.restore(Some(backup)).await?,
//! }
//! # Ok(())
//! # }
//! # async fn run_schema_migration() -> Result<(), ()> { Ok(()) }
//! ```

#![deny(unsafe_code)]

pub mod backend;
pub mod backup;
pub mod config;
pub mod config_manager;
pub mod factory;
pub mod keys;
pub mod metrics;

// Re-export primary types at crate root for convenience
pub use backend::Adapter;
pub use backup::{BACKUP_MAX_AGE, BackupManager, MigrationBackup, ValidationReport, compute_checksum};
pub use config::{
    BackendMode, DEFAULT_STORAGE_VERSION, MAX_MIGRATION_FAILURES, MigrationState, StorageConfig,
    StorageConfigPatch, is_valid_version,
};
pub use config_manager::{CONFIG_RETRY_DELAY, Phase, StorageConfigManager};
pub use factory::{
    DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_CAP, DEFAULT_PROBE_TIMEOUT, MAX_RECOVERY_ATTEMPTS,
    StorageFactory, StorageFactoryConfig,
};
pub use metrics::{FactoryMetrics, MetricsSnapshot};
