//! Storage layer configuration model.
//!
//! [`StorageConfig`] is the factory's durable operating configuration:
//! which backend is selected, where the schema migration stands, and how
//! often it has failed. It is persisted as JSON under
//! [`STORAGE_CONFIG_KEY`](crate::keys::STORAGE_CONFIG_KEY) and only ever
//! mutated through a merge → sanitize → persist path (see
//! [`StorageConfigManager`](crate::StorageConfigManager)).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default storage schema version.
pub const DEFAULT_STORAGE_VERSION: &str = "1.0.0";

/// Number of migration failures after which the transactional backend is
/// no longer selected until an explicit reset.
pub const MAX_MIGRATION_FAILURES: u32 = 3;

/// The selectable storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// The simple backend: a flat JSON file.
    File,
    /// The transactional backend: an embedded redb database.
    Redb,
}

impl BackendMode {
    /// The adapter name reported by [`StorageAdapter::name`](sprout_storage::StorageAdapter::name)
    /// for this mode.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Redb => "redb",
        }
    }
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.backend_name())
    }
}

/// Where the schema migration currently stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    /// No migration has been attempted.
    #[default]
    NotStarted,
    /// A migration is currently running.
    InProgress,
    /// The last migration completed successfully.
    Completed,
    /// The last migration failed.
    Failed,
    /// The last migration failed and was rolled back from backup.
    RolledBack,
}

/// The factory's durable operating configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Selected backend.
    #[serde(default = "default_mode")]
    pub mode: BackendMode,

    /// Storage schema version (strict `MAJOR.MINOR.PATCH`).
    #[serde(default = "default_version")]
    pub version: String,

    /// Current migration state.
    #[serde(default)]
    pub migration_state: MigrationState,

    /// Testing override: when set, the factory resolves this mode instead
    /// of [`mode`](Self::mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_mode: Option<BackendMode>,

    /// When a migration was last attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_migration_attempt: Option<DateTime<Utc>>,

    /// How many consecutive migrations have failed.
    #[serde(default)]
    pub migration_failure_count: u32,
}

fn default_mode() -> BackendMode {
    BackendMode::File
}

fn default_version() -> String {
    DEFAULT_STORAGE_VERSION.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            version: default_version(),
            migration_state: MigrationState::default(),
            force_mode: None,
            last_migration_attempt: None,
            migration_failure_count: 0,
        }
    }
}

impl StorageConfig {
    /// Applies a partial update, field by field.
    #[must_use]
    pub fn merged(&self, patch: StorageConfigPatch) -> Self {
        Self {
            mode: patch.mode.unwrap_or(self.mode),
            version: patch.version.unwrap_or_else(|| self.version.clone()),
            migration_state: patch.migration_state.unwrap_or(self.migration_state),
            force_mode: patch.force_mode.unwrap_or(self.force_mode),
            last_migration_attempt: patch
                .last_migration_attempt
                .unwrap_or(self.last_migration_attempt),
            migration_failure_count: patch
                .migration_failure_count
                .unwrap_or(self.migration_failure_count),
        }
    }

    /// Replaces invalid values with defaults.
    ///
    /// An invalid version string falls back to [`DEFAULT_STORAGE_VERSION`]
    /// and is never propagated. Enum fields and the failure count are typed,
    /// so invalid wire values already fail at deserialization and fall back
    /// to a full default config at load time.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if !is_valid_version(&self.version) {
            warn!(version = %self.version, "invalid storage version, falling back to default");
            self.version = default_version();
        }
        self
    }

    /// Whether the transactional backend may no longer be selected until an
    /// explicit reset clears the failure counter.
    #[must_use]
    pub fn transactional_locked_out(&self) -> bool {
        self.migration_failure_count >= MAX_MIGRATION_FAILURES
    }
}

/// Checks a version string against the strict `MAJOR.MINOR.PATCH` grammar:
/// exactly three dot-separated decimal components, no leading zeros.
#[must_use]
pub fn is_valid_version(version: &str) -> bool {
    let mut components = 0;
    for part in version.split('.') {
        components += 1;
        if components > 3 {
            return false;
        }
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        if part.len() > 1 && part.starts_with('0') {
            return false;
        }
        // Reject components that overflow a u64.
        if part.parse::<u64>().is_err() {
            return false;
        }
    }
    components == 3
}

/// A partial update to [`StorageConfig`].
///
/// `None` leaves the field untouched. The double-`Option` fields distinguish
/// "leave as is" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct StorageConfigPatch {
    /// New backend mode.
    pub mode: Option<BackendMode>,
    /// New schema version.
    pub version: Option<String>,
    /// New migration state.
    pub migration_state: Option<MigrationState>,
    /// Set or clear the testing override.
    pub force_mode: Option<Option<BackendMode>>,
    /// Set or clear the last migration attempt timestamp.
    pub last_migration_attempt: Option<Option<DateTime<Utc>>>,
    /// New migration failure count.
    pub migration_failure_count: Option<u32>,
}

impl StorageConfigPatch {
    /// A patch that changes only the backend mode.
    #[must_use]
    pub fn mode(mode: BackendMode) -> Self {
        Self { mode: Some(mode), ..Self::default() }
    }
}
