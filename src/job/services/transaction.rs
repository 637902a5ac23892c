//! Lock-guarded, retrying access to the record store.
//!
//! Every durable operation funnels through [`TransactionHelper`]. Writes hold
//! the process-wide lock exclusively and reads share it, so no two write
//! transactions interleave and no read observes a partial write.

use crate::job::ports::{RecordStore, SessionMode, StoreError, StoreSession};
use crate::job::services::DatabaseManagerError;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{error, warn};

/// Retry schedule for lock contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Sleep before the first retry; doubled before each further retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Returns true when `err` should be retried.
    #[must_use]
    pub const fn is_retryable(err: &DatabaseManagerError) -> bool {
        err.is_lock_contention()
    }
}

/// Decision taken by a [`StoreFailureHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Surface the failure unchanged.
    Propagate,
    /// Surface the failure as [`DatabaseManagerError::Suppressed`].
    Suppress,
}

/// Strategy invoked on every store failure that is not retried.
pub trait StoreFailureHandler: Send + Sync {
    /// Inspects a failure and decides how it is surfaced.
    fn on_failure(&self, err: &StoreError) -> FailureDisposition;
}

/// Runs units of work against the store under the process-wide lock.
pub struct TransactionHelper<S> {
    store: Arc<S>,
    lock: RwLock<()>,
    retry: RetryPolicy,
    failure_handler: Option<Arc<dyn StoreFailureHandler>>,
}

impl<S: RecordStore> TransactionHelper<S> {
    /// Creates a helper with the given retry policy and no failure handler.
    #[must_use]
    pub fn new(store: Arc<S>, retry: RetryPolicy) -> Self {
        Self {
            store,
            lock: RwLock::new(()),
            retry,
            failure_handler: None,
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Registers the strategy invoked on non-retried store failures.
    #[must_use]
    pub fn with_failure_handler(mut self, handler: Arc<dyn StoreFailureHandler>) -> Self {
        self.failure_handler = Some(handler);
        self
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Runs `work` in a transaction, committing on success.
    ///
    /// Lock contention is retried with doubling backoff; the calling thread
    /// sleeps between attempts and the sleep cannot be interrupted.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt. Store failures pass through the
    /// failure handler first.
    pub fn run_with_transaction<T, F>(
        &self,
        read_only: bool,
        mut work: F,
    ) -> Result<T, DatabaseManagerError>
    where
        F: FnMut(&mut dyn StoreSession) -> Result<T, DatabaseManagerError>,
    {
        let mode = if read_only {
            SessionMode::ReadOnly
        } else {
            SessionMode::ReadWrite
        };
        let mut backoff = self.retry.initial_backoff;
        let mut attempt = 0_u32;
        loop {
            let outcome = self.attempt(mode, &mut work);
            match outcome {
                Err(err) if RetryPolicy::is_retryable(&err) && attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.retry.max_retries,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        "lock contention on record store, retrying"
                    );
                    std::thread::sleep(backoff);
                    backoff = backoff.saturating_mul(2);
                }
                Err(DatabaseManagerError::Store(err)) => return Err(self.forward(err)),
                other => return other,
            }
        }
    }

    /// Runs `work` in a read-only session without retries.
    ///
    /// # Errors
    ///
    /// Returns the error of `work`. Store failures pass through the failure
    /// handler first.
    pub fn run_without_transaction<T, F>(&self, mut work: F) -> Result<T, DatabaseManagerError>
    where
        F: FnMut(&mut dyn StoreSession) -> Result<T, DatabaseManagerError>,
    {
        match self.attempt(SessionMode::ReadOnly, &mut work) {
            Err(DatabaseManagerError::Store(err)) => Err(self.forward(err)),
            other => other,
        }
    }

    fn attempt<T, F>(&self, mode: SessionMode, work: &mut F) -> Result<T, DatabaseManagerError>
    where
        F: FnMut(&mut dyn StoreSession) -> Result<T, DatabaseManagerError>,
    {
        match mode {
            SessionMode::ReadWrite => {
                let _exclusive = self.lock.write().unwrap_or_else(PoisonError::into_inner);
                self.store.with_session(mode, |session| work(session))
            }
            SessionMode::ReadOnly => {
                let _shared = self.lock.read().unwrap_or_else(PoisonError::into_inner);
                self.store.with_session(mode, |session| work(session))
            }
        }
    }

    fn forward(&self, err: StoreError) -> DatabaseManagerError {
        error!(error = %err, "record store operation failed");
        match &self.failure_handler {
            Some(handler) if handler.on_failure(&err) == FailureDisposition::Suppress => {
                DatabaseManagerError::Suppressed(err)
            }
            Some(_) | None => DatabaseManagerError::Store(err),
        }
    }
}
