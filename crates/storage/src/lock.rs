//! Timeout-bounded async mutual exclusion.
//!
//! [`TimedMutex`] serializes adapter creation in the factory. It wraps a
//! tokio async mutex so that `acquire` suspends cooperatively until the lock
//! is free, and fails the *waiter* (never the holder) when the configured
//! bound elapses. Release is RAII: dropping the returned guard unlocks and
//! wakes one queued waiter, so starvation is bounded by each waiter's own
//! timeout.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::StorageError;

/// Default bound on how long a waiter suspends before giving up.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error returned when [`TimedMutex::acquire`] times out.
///
/// The holder is unaffected; only the timed-out waiter observes this.
#[derive(Debug, Error)]
#[error("timed out after {waited:?} waiting for the storage creation lock")]
pub struct LockTimeout {
    /// How long the waiter suspended before giving up.
    pub waited: Duration,
}

impl From<LockTimeout> for StorageError {
    fn from(err: LockTimeout) -> Self {
        StorageError::unknown_with_source("could not acquire the storage creation lock", err)
    }
}

/// A cooperative async mutex with an acquisition timeout.
///
/// Cheaply cloneable; all clones share the same lock.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use sprout_storage::TimedMutex;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let mutex = TimedMutex::new(Duration::from_secs(5));
/// let guard = mutex.acquire().await.unwrap();
/// assert!(mutex.is_locked());
/// drop(guard);
/// assert!(!mutex.is_locked());
/// # });
/// ```
#[derive(Clone)]
pub struct TimedMutex {
    inner: Arc<Mutex<()>>,
    timeout: Duration,
}

/// RAII guard returned by [`TimedMutex::acquire`]. Dropping it releases the
/// lock and wakes one waiter.
#[derive(Debug)]
pub struct TimedMutexGuard {
    _guard: OwnedMutexGuard<()>,
}

impl TimedMutex {
    /// Creates a new mutex whose `acquire` calls time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { inner: Arc::new(Mutex::new(())), timeout }
    }

    /// Suspends until the lock is free, then locks and returns a guard.
    ///
    /// # Errors
    ///
    /// Returns [`LockTimeout`] if the lock could not be acquired within the
    /// configured bound. The current holder is unaffected.
    pub async fn acquire(&self) -> Result<TimedMutexGuard, LockTimeout> {
        match tokio::time::timeout(self.timeout, Arc::clone(&self.inner).lock_owned()).await {
            Ok(guard) => Ok(TimedMutexGuard { _guard: guard }),
            Err(_elapsed) => Err(LockTimeout { waited: self.timeout }),
        }
    }

    /// Non-blocking observation of the lock state.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

impl std::fmt::Debug for TimedMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedMutex")
            .field("locked", &self.is_locked())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_and_release() {
        let mutex = TimedMutex::new(Duration::from_secs(1));
        assert!(!mutex.is_locked());

        let guard = mutex.acquire().await.unwrap();
        assert!(mutex.is_locked());

        drop(guard);
        assert!(!mutex.is_locked());
    }

    #[tokio::test]
    async fn waiter_times_out_without_affecting_holder() {
        let mutex = TimedMutex::new(Duration::from_millis(50));
        let guard = mutex.acquire().await.unwrap();

        let err = mutex.acquire().await.unwrap_err();
        assert_eq!(err.waited, Duration::from_millis(50));

        // The holder still owns the lock and can release normally.
        assert!(mutex.is_locked());
        drop(guard);
        assert!(!mutex.is_locked());

        // A fresh waiter succeeds after release.
        let _guard = mutex.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn release_wakes_a_waiter() {
        let mutex = TimedMutex::new(Duration::from_secs(1));
        let guard = mutex.acquire().await.unwrap();

        let contender = {
            let mutex = mutex.clone();
            tokio::spawn(async move { mutex.acquire().await.map(|_g| ()) })
        };

        // Give the contender time to queue, then release.
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);

        contender.await.unwrap().expect("queued waiter should acquire after release");
    }

    #[tokio::test]
    async fn lock_timeout_converts_to_storage_error() {
        let mutex = TimedMutex::new(Duration::from_millis(10));
        let _guard = mutex.acquire().await.unwrap();

        let err: StorageError = mutex.acquire().await.unwrap_err().into();
        assert_eq!(err.kind(), crate::ErrorKind::Unknown);
        assert!(std::error::Error::source(&err).is_some());
    }
}
