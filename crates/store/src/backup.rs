//! Checksummed migration backups.
//!
//! Before a schema migration runs, [`BackupManager::create`] snapshots
//! every key in [`CRITICAL_KEYS`](crate::keys::CRITICAL_KEYS) together with
//! a CRC32 checksum and persists the result under
//! [`MIGRATION_BACKUP_KEY`](crate::keys::MIGRATION_BACKUP_KEY). If the
//! migration fails, [`BackupManager::restore`] verifies the checksum and
//! writes every snapshotted key back.
//!
//! # Integrity
//!
//! The checksum is a pure function of the snapshot map (canonical
//! key-ordered feed into the hasher). Any mutation after creation makes
//! [`MigrationBackup::validate`] report a mismatch, and restoration is
//! refused. Age is softer: a backup older than 24 hours produces a warning
//! but still restores.
//!
//! # Adapter Resolution
//!
//! The manager never caches an adapter. Every operation resolves a fresh
//! adapter reference through the factory, so a restore that races a
//! configuration change operates entirely on the reference it resolved.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sprout_storage::{StorageAdapter, StorageError, StorageResult};
use tracing::{info, warn};

use crate::{
    backend::Adapter,
    factory::StorageFactory,
    keys::{CRITICAL_KEYS, MIGRATION_BACKUP_KEY},
};

/// Age beyond which a backup is flagged (non-fatally) as stale.
pub const BACKUP_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// A point-in-time snapshot of the critical application keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationBackup {
    /// Schema version the data was written under.
    pub source_version: String,
    /// Schema version the migration is upgrading to.
    pub target_version: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Snapshot of every critical key; `None` records that the key was
    /// absent (and triggers a delete on restore).
    pub data_snapshot: BTreeMap<String, Option<String>>,
    /// CRC32 over the canonical serialization of `data_snapshot`.
    pub checksum: u32,
}

impl MigrationBackup {
    /// Assembles a backup over `data_snapshot`, stamping the current time
    /// and computing the checksum.
    #[must_use]
    pub fn new(
        source_version: String,
        target_version: String,
        data_snapshot: BTreeMap<String, Option<String>>,
    ) -> Self {
        let checksum = compute_checksum(&data_snapshot);
        Self {
            source_version,
            target_version,
            timestamp_ms: Utc::now().timestamp_millis(),
            data_snapshot,
            checksum,
        }
    }

    /// Validates this backup without side effects.
    ///
    /// Checks required fields and recomputes the checksum; a backup older
    /// than [`BACKUP_MAX_AGE`] adds a warning but stays valid. Returns a
    /// report rather than an error so callers can decide whether to proceed
    /// despite warnings.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.source_version.is_empty() {
            errors.push("missing source_version".to_string());
        }
        if self.target_version.is_empty() {
            errors.push("missing target_version".to_string());
        }
        if self.timestamp_ms <= 0 {
            errors.push(format!("invalid timestamp_ms: {}", self.timestamp_ms));
        }

        let computed = compute_checksum(&self.data_snapshot);
        if computed != self.checksum {
            errors.push(format!(
                "checksum mismatch: stored {:#010x}, computed {computed:#010x}",
                self.checksum
            ));
        }

        if self.timestamp_ms > 0 {
            let age_ms = Utc::now().timestamp_millis() - self.timestamp_ms;
            if age_ms > BACKUP_MAX_AGE.as_millis() as i64 {
                warnings.push(format!(
                    "backup is {} hours old; changes made since it was taken will be lost on restore",
                    age_ms / 3_600_000,
                ));
            }
        }

        ValidationReport { valid: errors.is_empty(), errors, warnings }
    }
}

/// Result of validating a [`MigrationBackup`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Whether restoration may proceed.
    pub valid: bool,
    /// Hard failures (restoration is refused).
    pub errors: Vec<String>,
    /// Soft findings (restoration proceeds).
    pub warnings: Vec<String>,
}

/// Computes the CRC32 checksum over the canonical form of a snapshot.
///
/// The map is fed key-ordered with explicit present/absent markers and
/// separators, so the checksum is a pure function of the snapshot contents.
#[must_use]
pub fn compute_checksum(snapshot: &BTreeMap<String, Option<String>>) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for (key, value) in snapshot {
        hasher.update(key.as_bytes());
        hasher.update(&[0x1f]);
        match value {
            Some(v) => {
                hasher.update(&[1]);
                hasher.update(v.as_bytes());
            },
            None => hasher.update(&[0]),
        }
        hasher.update(&[0x1e]);
    }
    hasher.finalize()
}

/// Creates, validates, restores, and clears migration backups.
pub struct BackupManager {
    factory: Arc<StorageFactory>,
}

impl BackupManager {
    /// Creates a manager over the given factory.
    #[must_use]
    pub fn new(factory: Arc<StorageFactory>) -> Self {
        Self { factory }
    }

    /// Snapshots every critical key and persists the backup.
    ///
    /// A failed read of any individual key aborts the whole backup with an
    /// error naming the offending key; missing keys are recorded as `None`.
    pub async fn create(&self, target_version: &str) -> StorageResult<MigrationBackup> {
        let adapter = self.factory.create_adapter(None).await?;
        let config = self.factory.get_config().await;

        let mut snapshot = BTreeMap::new();
        for key in CRITICAL_KEYS {
            let value = adapter
                .get(key)
                .await
                .map_err(|e| e.with_context(format!("backup aborted: failed to read {key}")))?;
            snapshot.insert(key.to_string(), value);
        }

        let backup = MigrationBackup::new(config.version, target_version.to_string(), snapshot);
        let json = serde_json::to_string(&backup).map_err(|e| {
            StorageError::unknown_with_source("failed to serialize migration backup", e)
        })?;
        adapter
            .set(MIGRATION_BACKUP_KEY, &json)
            .await
            .map_err(|e| e.with_context("failed to persist migration backup"))?;

        info!(
            source = %backup.source_version,
            target = %backup.target_version,
            keys = backup.data_snapshot.len(),
            "created migration backup",
        );
        Ok(backup)
    }

    /// Restores the given backup, or the persisted one when `None`.
    ///
    /// Validation failures abort before anything is written. During the
    /// write-back phase every key is attempted — there is no short-circuit —
    /// and the operation fails with an exact failed-key count if any write
    /// failed.
    pub async fn restore(&self, backup: Option<MigrationBackup>) -> StorageResult<()> {
        let adapter = self.factory.create_adapter(None).await?;

        let backup = match backup {
            Some(backup) => backup,
            None => self
                .load_persisted(&adapter)
                .await?
                .ok_or_else(|| StorageError::unknown("no migration backup found"))?,
        };

        let report = backup.validate();
        for warning in &report.warnings {
            warn!(warning = %warning, "migration backup warning");
        }
        if !report.valid {
            return Err(StorageError::corrupted(format!(
                "migration backup failed validation: {}",
                report.errors.join("; "),
            )));
        }

        restore_snapshot(&*adapter, &backup).await
    }

    /// Whether a backup is currently persisted under the well-known key.
    pub async fn has_persisted_backup(&self) -> StorageResult<bool> {
        let adapter = self.factory.create_adapter(None).await?;
        Ok(adapter.get(MIGRATION_BACKUP_KEY).await?.is_some())
    }

    /// Removes the persisted backup (after a successful migration).
    pub async fn clear_persisted_backup(&self) -> StorageResult<()> {
        let adapter = self.factory.create_adapter(None).await?;
        adapter.remove(MIGRATION_BACKUP_KEY).await
    }

    async fn load_persisted(&self, adapter: &Adapter) -> StorageResult<Option<MigrationBackup>> {
        let Some(raw) = adapter.get(MIGRATION_BACKUP_KEY).await? else {
            return Ok(None);
        };
        let backup = serde_json::from_str(&raw).map_err(|e| {
            StorageError::corrupted_with_source("persisted migration backup is unreadable", e)
        })?;
        Ok(Some(backup))
    }
}

impl std::fmt::Debug for BackupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupManager").finish()
    }
}

/// Writes every snapshotted key back to the adapter.
///
/// `None` entries delete the key instead of writing. Every key is
/// attempted; failures are counted and reported at the end.
async fn restore_snapshot<A>(adapter: &A, backup: &MigrationBackup) -> StorageResult<()>
where
    A: StorageAdapter + ?Sized,
{
    let mut failed = 0usize;
    for (key, value) in &backup.data_snapshot {
        let result = match value {
            Some(v) => adapter.set(key, v).await,
            None => adapter.remove(key).await,
        };
        if let Err(err) = result {
            failed += 1;
            warn!(key = %key, error = %err, "failed to restore key");
        }
    }

    if failed > 0 {
        return Err(StorageError::unknown(format!(
            "restore failed for {failed} of {} keys",
            backup.data_snapshot.len(),
        )));
    }
    info!(keys = backup.data_snapshot.len(), "restored migration backup");
    Ok(())
}
