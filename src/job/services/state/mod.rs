//! Durable state manager: the facade through which the scheduler core
//! persists and reloads jobs, tasks, results and credentials.
//!
//! Every operation runs inside [`TransactionHelper`], so writes are
//! serialized process-wide and lock contention is retried.

mod credentials;
mod loading;
mod queries;
mod removal;
mod results;
mod submission;
mod updates;

pub use credentials::EncryptedCredential;
pub use queries::JobCounts;
pub use updates::ChangedTasks;

use crate::config::StateStoreConfig;
use crate::job::domain::{InternalJob, JobId, TaskId, TaskKey};
use crate::job::ports::RecordStore;
use crate::job::services::{
    DatabaseManagerError, HousekeepingPolicy, RetryPolicy, StoreFailureHandler, TransactionHelper,
};
use mockable::Clock;
use std::sync::Arc;

/// Default number of jobs loaded per batch.
pub const DEFAULT_LOAD_BATCH_SIZE: usize = 100;

/// Result type for state manager operations.
pub type StateResult<T> = Result<T, DatabaseManagerError>;

/// Facade over the record store.
pub struct SchedulerStateManager<S, C>
where
    S: RecordStore,
    C: Clock + Send + Sync,
{
    transactions: TransactionHelper<S>,
    clock: Arc<C>,
    batch_size: usize,
    housekeeping: HousekeepingPolicy,
}

impl<S, C> SchedulerStateManager<S, C>
where
    S: RecordStore,
    C: Clock + Send + Sync,
{
    /// Creates a manager with default retry, batch and housekeeping settings.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self {
            transactions: TransactionHelper::new(store, RetryPolicy::default()),
            clock,
            batch_size: DEFAULT_LOAD_BATCH_SIZE,
            housekeeping: HousekeepingPolicy::default(),
        }
    }

    /// Creates a manager configured from `config`.
    #[must_use]
    pub fn from_config(store: Arc<S>, clock: Arc<C>, config: &StateStoreConfig) -> Self {
        Self::new(store, clock)
            .with_retry_policy(config.transaction.retry_policy())
            .with_batch_size(config.recovery_batch_size)
            .with_housekeeping_policy(config.housekeeping.policy())
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(self, retry: RetryPolicy) -> Self {
        Self {
            transactions: self.transactions.with_retry_policy(retry),
            ..self
        }
    }

    /// Registers the strategy invoked on non-retried store failures.
    #[must_use]
    pub fn with_failure_handler(self, handler: Arc<dyn StoreFailureHandler>) -> Self {
        Self {
            transactions: self.transactions.with_failure_handler(handler),
            ..self
        }
    }

    /// Sets how many jobs are loaded per batch; zero is treated as one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Sets the housekeeping policy.
    #[must_use]
    pub const fn with_housekeeping_policy(mut self, policy: HousekeepingPolicy) -> Self {
        self.housekeeping = policy;
        self
    }

    /// Returns the housekeeping policy.
    #[must_use]
    pub const fn housekeeping_policy(&self) -> HousekeepingPolicy {
        self.housekeeping
    }

    /// Returns the transaction helper shared by every operation.
    #[must_use]
    pub const fn transactions(&self) -> &TransactionHelper<S> {
        &self.transactions
    }

    fn now(&self) -> i64 {
        self.clock.utc().timestamp_millis()
    }
}

fn job_id_of(job: &InternalJob) -> StateResult<JobId> {
    Ok(job.submitted_id()?)
}

fn task_key_of(job: &InternalJob, task: TaskId) -> StateResult<TaskKey> {
    let job_id = job_id_of(job)?;
    if job.task(task).is_none() {
        return Err(DatabaseManagerError::TaskNotFound(TaskKey::new(job_id, task)));
    }
    Ok(TaskKey::new(job_id, task))
}
