//! The canonical registry of persisted storage keys.
//!
//! All well-known keys live here so the rest of the workspace never spells
//! a key inline. [`CRITICAL_KEYS`] is the fixed enumeration of application
//! keys a migration backup must cover; bump [`CRITICAL_KEYS_VERSION`] when
//! the list changes.

/// Key under which the serialized `StorageConfig` is persisted
/// (in the dedicated config store).
pub const STORAGE_CONFIG_KEY: &str = "sprout.storage_config";

/// Temporary key under which a serialized `MigrationBackup` is persisted
/// (in the live data adapter) while a migration is in flight.
pub const MIGRATION_BACKUP_KEY: &str = "sprout.migration_backup";

/// Version of the critical-key enumeration below.
pub const CRITICAL_KEYS_VERSION: u32 = 1;

/// Application storage keys a migration backup snapshots.
///
/// Order matters only for readability; the backup snapshot map is keyed and
/// sorted independently.
pub const CRITICAL_KEYS: [&str; 5] = [
    "sprout.plantings",
    "sprout.journal",
    "sprout.reminders",
    "sprout.settings",
    "sprout.season_cache",
];
