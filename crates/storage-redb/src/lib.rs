//! redb-backed implementation of
//! [`StorageAdapter`](sprout_storage::StorageAdapter) for Sprout.
//!
//! This crate provides [`RedbAdapter`], the transactional storage backend.
//! It implements the adapter contract on top of redb, a pure-Rust embedded
//! ACID database, giving Sprout durable multi-step transactions and a
//! versioned schema without any C/C++ dependencies.
//!
//! # Quick Start
//!
//! ```no_run
//! use sprout_storage::StorageAdapter;
//! use sprout_storage_redb::{RedbAdapter, RedbAdapterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedbAdapterConfig::builder()
//!         .path("/tmp/sprout/data.redb")
//!         .build()?;
//!     let adapter = RedbAdapter::new(config);
//!
//!     // The database opens lazily on first use.
//!     adapter.set("sprout.plantings", "[]").await?;
//!     let value = adapter.get("sprout.plantings").await?;
//!     assert!(value.is_some());
//!
//!     adapter.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Consistency Model
//!
//! Every operation runs in its own minimal redb transaction. A write is
//! only considered successful once the transaction has committed; redb
//! commits are fsynced, so a crash never leaves a half-applied write.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod config;

pub use adapter::{RedbAdapter, SCHEMA_VERSION, probe_support};
pub use config::{DEFAULT_OPEN_TIMEOUT, RedbAdapterConfig};
