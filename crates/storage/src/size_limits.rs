//! Key and value size validation for storage adapters.
//!
//! Provides configurable size limits so oversized payloads are rejected
//! before they reach the backing store. Adapters accept a [`SizeLimits`] at
//! construction time and call [`validate_sizes`] on every write path, so
//! violations surface pre-emptively as
//! [`QuotaExceeded`](crate::StorageError::QuotaExceeded) rather than as a
//! backend write failure.
//!
//! # Defaults
//!
//! | Limit | Default |
//! |-------|---------|
//! | `max_key_size` | 512 bytes |
//! | `max_value_size` | 1 048 576 bytes (1 MiB) |

use crate::StorageError;

/// Default maximum key size in bytes (512 B).
pub const DEFAULT_MAX_KEY_SIZE: usize = 512;

/// Default maximum serialized value size in bytes (1 MiB).
pub const DEFAULT_MAX_VALUE_SIZE: usize = 1024 * 1024;

/// Configurable size limits for keys and values.
///
/// Both limits must be at least 1. Use [`SizeLimits::default`] for the
/// standard limits, or construct with custom values.
///
/// # Example
///
/// ```
/// use sprout_storage::SizeLimits;
///
/// let limits = SizeLimits::new(256, 64 * 1024).unwrap();
/// assert_eq!(limits.max_key_size(), 256);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    max_key_size: usize,
    max_value_size: usize,
}

impl SizeLimits {
    /// Creates size limits with the given bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`](crate::ConfigError::BelowMinimum)
    /// if either limit is zero.
    pub fn new(max_key_size: usize, max_value_size: usize) -> Result<Self, crate::ConfigError> {
        if max_key_size == 0 {
            return Err(crate::ConfigError::BelowMinimum {
                field: "max_key_size",
                min: "1".into(),
                value: "0".into(),
            });
        }
        if max_value_size == 0 {
            return Err(crate::ConfigError::BelowMinimum {
                field: "max_value_size",
                min: "1".into(),
                value: "0".into(),
            });
        }
        Ok(Self { max_key_size, max_value_size })
    }

    /// Returns the maximum allowed key size in bytes.
    #[must_use]
    pub fn max_key_size(&self) -> usize {
        self.max_key_size
    }

    /// Returns the maximum allowed value size in bytes.
    #[must_use]
    pub fn max_value_size(&self) -> usize {
        self.max_value_size
    }
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self { max_key_size: DEFAULT_MAX_KEY_SIZE, max_value_size: DEFAULT_MAX_VALUE_SIZE }
    }
}

/// Validates key and value byte sizes against the given limits.
///
/// Returns `Ok(())` when both sizes are within bounds, or a
/// [`QuotaExceeded`](StorageError::QuotaExceeded) error identifying which
/// limit was violated.
pub fn validate_sizes(key: &str, value: &str, limits: &SizeLimits) -> Result<(), StorageError> {
    if key.len() > limits.max_key_size {
        return Err(StorageError::quota(format!(
            "key size {} exceeds limit {}",
            key.len(),
            limits.max_key_size
        )));
    }
    if value.len() > limits.max_value_size {
        return Err(StorageError::quota(format!(
            "value size {} exceeds limit {}",
            value.len(),
            limits.max_value_size
        )));
    }
    Ok(())
}

/// Validates key size only, for operations where no value is present
/// (get, remove).
pub fn validate_key_size(key: &str, limits: &SizeLimits) -> Result<(), StorageError> {
    if key.len() > limits.max_key_size {
        return Err(StorageError::quota(format!(
            "key size {} exceeds limit {}",
            key.len(),
            limits.max_key_size
        )));
    }
    Ok(())
}
