//! Configuration for the redb storage adapter.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use sprout_storage::{ConfigError, SizeLimits};

/// Default bound on how long a lazy open may take.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for [`RedbAdapter`](crate::RedbAdapter).
///
/// # Example
///
/// ```
/// use sprout_storage_redb::RedbAdapterConfig;
///
/// let config = RedbAdapterConfig::builder()
///     .path("/tmp/sprout/data.redb")
///     .build()?;
/// assert!(config.path().ends_with("data.redb"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct RedbAdapterConfig {
    path: PathBuf,
    limits: SizeLimits,
    open_timeout: Duration,
}

#[bon::bon]
impl RedbAdapterConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Arguments
    ///
    /// * `path` - Filesystem path of the database file.
    ///
    /// # Optional Fields
    ///
    /// * `limits` - Key/value size limits (default: [`SizeLimits::default`]).
    /// * `open_timeout` - Bound on the lazy open (default: 5 seconds).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MustBePositive`] if `open_timeout` is zero.
    #[builder]
    pub fn new(
        #[builder(into)] path: PathBuf,
        #[builder(default)] limits: SizeLimits,
        #[builder(default = DEFAULT_OPEN_TIMEOUT)] open_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if open_timeout.is_zero() {
            return Err(ConfigError::MustBePositive { field: "open_timeout", value: "0s".into() });
        }
        Ok(Self { path, limits, open_timeout })
    }

    /// Returns the database file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configured size limits.
    #[must_use]
    pub fn limits(&self) -> &SizeLimits {
        &self.limits
    }

    /// Returns the open timeout.
    #[must_use]
    pub fn open_timeout(&self) -> Duration {
        self.open_timeout
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn valid_config() {
        let config = RedbAdapterConfig::builder().path("/tmp/data.redb").build().unwrap();
        assert_eq!(config.path(), Path::new("/tmp/data.redb"));
        assert_eq!(config.open_timeout(), DEFAULT_OPEN_TIMEOUT);
    }

    #[test]
    fn zero_open_timeout_rejected() {
        let result = RedbAdapterConfig::builder()
            .path("/tmp/data.redb")
            .open_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn custom_limits() {
        let limits = SizeLimits::new(64, 1024).unwrap();
        let config =
            RedbAdapterConfig::builder().path("/tmp/data.redb").limits(limits).build().unwrap();
        assert_eq!(config.limits().max_key_size(), 64);
    }
}
