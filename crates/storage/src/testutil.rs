//! Shared test utilities for storage adapter testing.
//!
//! Common helpers for creating test adapters and generating test data.
//! Feature-gated behind `testutil` to prevent leaking into production
//! builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! sprout-storage = { path = "../storage", features = ["testutil"] }
//! ```

use crate::{adapter::StorageAdapter, file::FileAdapter, size_limits::SizeLimits};

/// Create a deterministic test key from a prefix and index.
///
/// Produces keys like `"prefix:000042"` (zero-padded to 6 digits) so
/// lexicographic ordering matches numeric ordering.
#[must_use]
pub fn make_key(prefix: &str, idx: usize) -> String {
    format!("{prefix}:{idx:06}")
}

/// Create a test value tagged with an index, e.g. `"value-042"`.
#[must_use]
pub fn make_value(idx: usize) -> String {
    format!("value-{idx:03}")
}

/// Create a [`FileAdapter`] backed by a fresh temporary directory.
///
/// Returns the adapter together with the [`tempfile::TempDir`] guard; keep
/// the guard alive for the duration of the test.
///
/// # Panics
///
/// Panics if the temporary directory or the adapter cannot be created.
#[must_use]
pub fn temp_file_adapter() -> (FileAdapter, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("store.json");
    let adapter = FileAdapter::open(&path, SizeLimits::default()).expect("open file adapter");
    (adapter, dir)
}

/// Create a [`FileAdapter`] pre-populated with `count` keys.
///
/// Keys are formatted as `"{prefix}:{idx:06}"`.
///
/// # Panics
///
/// Panics if any `set` operation fails.
pub async fn populated_file_adapter(
    prefix: &str,
    count: usize,
) -> (FileAdapter, tempfile::TempDir) {
    let (adapter, dir) = temp_file_adapter();
    for i in 0..count {
        adapter.set(&make_key(prefix, i), &make_value(i)).await.expect("populate set failed");
    }
    (adapter, dir)
}
