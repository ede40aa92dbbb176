//! Storage error types and result alias.
//!
//! This module defines the error taxonomy shared by all storage adapters.
//! Every adapter must map its backend-native errors (I/O errors, database
//! errors, serialization errors) to exactly one [`StorageError`] at the
//! adapter boundary — no backend-native error type crosses that boundary.
//!
//! # Error Kinds
//!
//! - [`StorageError::QuotaExceeded`] - Storage limit reached; recoverable by freeing space or
//!   reducing payload size. Never auto-retried.
//! - [`StorageError::AccessDenied`] - Backend unavailable, permission denied, or unsupported
//!   environment. Triggers fallback-mode consideration, not silent retry.
//! - [`StorageError::CorruptedData`] - Schema/version/state mismatch or self-test mismatch.
//!   Triggers the bounded automatic-recovery path.
//! - [`StorageError::Unknown`] - Anything unclassified. Surfaced as-is with its cause chain.
//!
//! # Example
//!
//! ```
//! use sprout_storage::{StorageError, StorageResult};
//!
//! fn reject(key: &str) -> StorageResult<()> {
//!     Err(StorageError::access_denied(format!("store is closed, cannot read {key}")))
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// This enum is the canonical set of errors any storage adapter can produce.
/// Errors preserve their source chain via the `#[source]` attribute, and the
/// factory adds context by wrapping (see [`StorageError::with_context`])
/// while keeping the original error as the cause — an error is classified
/// once and never reclassified further up the stack.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The storage limit was reached, or a write exceeded the configured
    /// key/value size limits.
    #[error("storage quota exceeded: {message}")]
    QuotaExceeded {
        /// Description of the quota violation.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The backend is unavailable, closed, or access was denied.
    #[error("storage access denied: {message}")]
    AccessDenied {
        /// Description of the access failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// Stored data or the backend's schema/state is structurally invalid.
    #[error("corrupted storage data: {message}")]
    CorruptedData {
        /// Description of the corruption.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// Anything that does not fit the other categories.
    #[error("storage error: {message}")]
    Unknown {
        /// Description of the error.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },
}

/// The kind of a [`StorageError`], without its payload.
///
/// Useful for exhaustive matching and assertions without destructuring the
/// message/source fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Storage limit reached.
    QuotaExceeded,
    /// Backend unavailable or permission denied.
    AccessDenied,
    /// Structural/schema failure.
    CorruptedData,
    /// Unclassified.
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExceeded => write!(f, "quota_exceeded"),
            Self::AccessDenied => write!(f, "access_denied"),
            Self::CorruptedData => write!(f, "corrupted_data"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl StorageError {
    /// Creates a new `QuotaExceeded` error with the given message.
    #[must_use]
    pub fn quota(message: impl Into<String>) -> Self {
        Self::QuotaExceeded { message: message.into(), source: None }
    }

    /// Creates a new `QuotaExceeded` error with a message and source error.
    #[must_use]
    pub fn quota_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::QuotaExceeded { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `AccessDenied` error with the given message.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied { message: message.into(), source: None }
    }

    /// Creates a new `AccessDenied` error with a message and source error.
    #[must_use]
    pub fn access_denied_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::AccessDenied { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `CorruptedData` error with the given message.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::CorruptedData { message: message.into(), source: None }
    }

    /// Creates a new `CorruptedData` error with a message and source error.
    #[must_use]
    pub fn corrupted_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::CorruptedData { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Unknown` error with the given message.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown { message: message.into(), source: None }
    }

    /// Creates a new `Unknown` error with a message and source error.
    #[must_use]
    pub fn unknown_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Unknown { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::CorruptedData { .. } => ErrorKind::CorruptedData,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Wraps this error with additional context, preserving the kind and
    /// keeping the original error as the source.
    ///
    /// This is how callers above the adapter boundary add information
    /// (e.g. "adapter self-test failed") without reclassifying the error.
    #[must_use]
    pub fn with_context(self, message: impl Into<String>) -> Self {
        let kind = self.kind();
        let source: Option<BoxError> = Some(Arc::new(self));
        let message = message.into();
        match kind {
            ErrorKind::QuotaExceeded => Self::QuotaExceeded { message, source },
            ErrorKind::AccessDenied => Self::AccessDenied { message, source },
            ErrorKind::CorruptedData => Self::CorruptedData { message, source },
            ErrorKind::Unknown => Self::Unknown { message, source },
        }
    }
}

/// Errors produced when validating configuration values.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A numeric field was below its allowed minimum.
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        /// The configuration field name.
        field: &'static str,
        /// The minimum allowed value.
        min: String,
        /// The rejected value.
        value: String,
    },

    /// A duration or count field must be strictly positive.
    #[error("{field} must be positive, got {value}")]
    MustBePositive {
        /// The configuration field name.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(StorageError::quota("full").kind(), ErrorKind::QuotaExceeded);
        assert_eq!(StorageError::access_denied("closed").kind(), ErrorKind::AccessDenied);
        assert_eq!(StorageError::corrupted("bad schema").kind(), ErrorKind::CorruptedData);
        assert_eq!(StorageError::unknown("?").kind(), ErrorKind::Unknown);
    }

    #[test]
    fn with_context_preserves_kind_and_cause() {
        let inner = StorageError::corrupted("self-test read mismatch");
        let wrapped = inner.with_context("adapter self-test failed");

        assert_eq!(wrapped.kind(), ErrorKind::CorruptedData);
        assert!(wrapped.to_string().contains("adapter self-test failed"));

        let source = std::error::Error::source(&wrapped).expect("wrapped error must keep cause");
        assert!(source.to_string().contains("self-test read mismatch"));
    }

    #[test]
    fn source_chain_is_preserved_from_constructors() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = StorageError::access_denied_with_source("cannot open store", io);

        let source = std::error::Error::source(&err).expect("source must be set");
        assert!(source.to_string().contains("denied"));
    }

    #[test]
    fn display_names_the_kind() {
        let err = StorageError::quota("value too large");
        assert!(err.to_string().contains("quota"));
    }
}
