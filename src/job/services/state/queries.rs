//! Paginated listings and counts.

use super::{SchedulerStateManager, StateResult};
use crate::job::domain::{JobInfo, JobStatus, Page, TaskInfo};
use crate::job::ports::{JobQuery, JobScope, RecordStore, TaskQuery};
use mockable::Clock;

/// Number of active jobs per status bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    /// Jobs waiting to start.
    pub pending: u64,
    /// Jobs started and not terminated, paused or stalled ones included.
    pub running: u64,
    /// Terminated jobs.
    pub finished: u64,
}

impl JobCounts {
    /// Returns the number of counted jobs.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.pending + self.running + self.finished
    }
}

impl<S, C> SchedulerStateManager<S, C>
where
    S: RecordStore,
    C: Clock + Send + Sync,
{
    /// Returns one page of job summaries and the total number of matches.
    ///
    /// # Errors
    ///
    /// Returns [`crate::job::services::DatabaseManagerError`] when the store
    /// fails.
    pub fn get_jobs(&self, query: &JobQuery) -> StateResult<Page<JobInfo>> {
        self.transactions.run_with_transaction(true, |session| {
            let total = session.count_jobs(query)?;
            let ids = session.find_job_ids(query)?;
            let scope = if query.include_removed {
                JobScope::Any
            } else {
                JobScope::NotRemoved
            };
            let mut records = session.load_jobs(&ids, scope)?;
            records.sort_by_key(|record| {
                record
                    .id
                    .and_then(|id| ids.iter().position(|wanted| *wanted == id))
            });
            let items = records.iter().filter_map(|record| record.to_info()).collect();
            Ok(Page { items, total })
        })
    }

    /// Returns one page of task summaries of active jobs and the total
    /// number of matches.
    ///
    /// # Errors
    ///
    /// Returns [`crate::job::services::DatabaseManagerError`] when the store
    /// fails.
    pub fn get_tasks(&self, query: &TaskQuery) -> StateResult<Page<TaskInfo>> {
        self.transactions.run_with_transaction(true, |session| {
            let total = session.count_tasks(query)?;
            let items = session
                .find_tasks(query)?
                .iter()
                .map(|record| record.to_info())
                .collect();
            Ok(Page { items, total })
        })
    }

    /// Counts active jobs per status bucket.
    ///
    /// # Errors
    ///
    /// Returns [`crate::job::services::DatabaseManagerError`] when the store
    /// fails.
    pub fn job_counts(&self) -> StateResult<JobCounts> {
        self.transactions.run_with_transaction(true, |session| {
            Ok(JobCounts {
                pending: session.count_jobs(&JobQuery::with_statuses(JobStatus::PENDING))?,
                running: session.count_jobs(&JobQuery::with_statuses(JobStatus::RUNNING))?,
                finished: session.count_jobs(&JobQuery::with_statuses(JobStatus::FINISHED))?,
            })
        })
    }

    /// Counts tasks of active jobs matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::job::services::DatabaseManagerError`] when the store
    /// fails.
    pub fn count_tasks(&self, query: &TaskQuery) -> StateResult<u64> {
        self.transactions
            .run_with_transaction(true, |session| Ok(session.count_tasks(query)?))
    }
}
