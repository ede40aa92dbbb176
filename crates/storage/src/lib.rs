//! Storage adapter contract and the file-backed adapter for Sprout.
//!
//! This crate provides the [`StorageAdapter`] trait and related types that
//! form the foundation of Sprout's persistence layer. The factory in
//! `sprout-store` selects between interchangeable adapter implementations;
//! application features consume the trait, never a concrete backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Application Features                       │
//! │        (plantings, journal, reminders, settings)            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      sprout-store                           │
//! │     StorageFactory │ StorageConfigManager │ BackupManager   │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     sprout-storage                          │
//! │                  StorageAdapter trait                       │
//! │        (get, set, remove, clear, list_keys, close)          │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ FileAdapter  │       RedbAdapter                            │
//! │  (simple)    │  (transactional, in sprout-storage-redb)     │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use sprout_storage::{FileAdapter, SizeLimits, StorageAdapter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = FileAdapter::open("/tmp/sprout/store.json", SizeLimits::default())?;
//!
//!     adapter.set("sprout.settings", r#"{"theme":"dark"}"#).await?;
//!     let value = adapter.get("sprout.settings").await?;
//!     assert!(value.is_some());
//!
//!     adapter.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`]. Backend-native errors are
//! classified into [`StorageError`] exactly once, at the adapter boundary.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with shared test helpers. Enable this in
//!   `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]

pub mod adapter;
pub mod error;
pub mod file;
pub mod lock;
pub mod size_limits;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

// Re-export primary types at crate root for convenience
pub use adapter::StorageAdapter;
pub use error::{BoxError, ConfigError, ErrorKind, StorageError, StorageResult};
pub use file::FileAdapter;
pub use lock::{DEFAULT_ACQUIRE_TIMEOUT, LockTimeout, TimedMutex, TimedMutexGuard};
pub use size_limits::{
    DEFAULT_MAX_KEY_SIZE, DEFAULT_MAX_VALUE_SIZE, SizeLimits, validate_key_size, validate_sizes,
};
