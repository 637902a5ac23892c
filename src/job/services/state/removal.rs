//! Soft and hard removal of jobs.

use super::{SchedulerStateManager, StateResult};
use crate::job::domain::JobId;
use crate::job::ports::{JobTable, RecordStore, StoreSession};
use mockable::Clock;
use std::collections::BTreeMap;
use tracing::{debug, info};

impl<S, C> SchedulerStateManager<S, C>
where
    S: RecordStore,
    C: Clock + Send + Sync,
{
    /// Flags a job as to be removed without touching its rows.
    ///
    /// # Errors
    ///
    /// Returns [`crate::job::services::DatabaseManagerError`] when the job is
    /// not stored.
    pub fn job_set_to_be_removed(&self, job_id: JobId) -> StateResult<()> {
        let now = self.now();
        self.transactions.run_with_transaction(false, |session| {
            Ok(session.mark_job_to_be_removed(job_id, now)?)
        })
    }

    /// Removes jobs.
    ///
    /// With `remove_data` every row belonging to the jobs is deleted, child
    /// rows first. Otherwise `removed_time` is set on jobs that are not
    /// already removed; repeating the call changes nothing. Returns the
    /// number of jobs affected.
    ///
    /// # Errors
    ///
    /// Returns [`crate::job::services::DatabaseManagerError`] when the store
    /// fails; no job is removed in that case.
    pub fn remove_job(
        &self,
        ids: &[JobId],
        removed_time: i64,
        remove_data: bool,
    ) -> StateResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let affected = self.transactions.run_with_transaction(false, |session| {
            if remove_data {
                hard_delete(session, ids)
            } else {
                Ok(session.mark_jobs_removed(ids, removed_time)?)
            }
        })?;
        info!(jobs = ids.len(), affected, remove_data, "jobs removed");
        Ok(affected)
    }

    /// Records when housekeeping may purge a job.
    ///
    /// # Errors
    ///
    /// Returns [`crate::job::services::DatabaseManagerError`] when the job is
    /// not stored.
    pub fn schedule_job_for_removal(&self, job_id: JobId, removal_time: i64) -> StateResult<()> {
        self.transactions.run_with_transaction(false, |session| {
            Ok(session.schedule_job_removal(job_id, removal_time)?)
        })?;
        debug!(job_id = %job_id, removal_time, "job scheduled for removal");
        Ok(())
    }

    /// Returns the owner of every job whose scheduled removal time has passed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::job::services::DatabaseManagerError`] when the store
    /// fails.
    pub fn jobs_to_remove(&self, now: i64) -> StateResult<BTreeMap<JobId, String>> {
        self.transactions.run_with_transaction(true, |session| {
            Ok(session
                .find_jobs_scheduled_for_removal(now)?
                .into_iter()
                .collect())
        })
    }

    /// Purges a batch of jobs according to the housekeeping policy.
    ///
    /// The children count of each parent is decremented first, once per
    /// child that is not already removed, then the jobs are either deleted
    /// or marked removed. Returns the number of
    /// jobs affected.
    ///
    /// # Errors
    ///
    /// Returns [`crate::job::services::DatabaseManagerError`] when the store
    /// fails; the batch is rolled back in that case.
    pub fn execute_housekeeping(&self, ids: &[JobId]) -> StateResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let policy = self.housekeeping;
        let now = self.now();
        let affected = self.transactions.run_with_transaction(false, |session| {
            let mut removed_children: BTreeMap<JobId, i64> = BTreeMap::new();
            for parent in session.find_parent_ids(ids)? {
                *removed_children.entry(parent).or_default() += 1;
            }
            for (parent, count) in &removed_children {
                session.adjust_children_count(*parent, -count)?;
            }
            if policy.remove_from_db {
                hard_delete(session, ids)
            } else {
                Ok(session.mark_jobs_removed(ids, now)?)
            }
        })?;
        info!(
            jobs = ids.len(),
            affected,
            remove_from_db = policy.remove_from_db,
            "housekeeping batch applied"
        );
        Ok(affected)
    }
}

fn hard_delete(session: &mut dyn StoreSession, ids: &[JobId]) -> StateResult<usize> {
    let mut removed_jobs = 0;
    for table in JobTable::HARD_DELETE_ORDER {
        let deleted = session.delete_job_rows(table, ids)?;
        if table == JobTable::Jobs {
            removed_jobs = deleted;
        }
    }
    Ok(removed_jobs)
}
