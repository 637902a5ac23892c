//! Bulk and single-job loads.

use super::{SchedulerStateManager, StateResult};
use crate::job::domain::{InternalJob, JobId, JobStatus, TaskKey, TaskPayload};
use crate::job::ports::{JobQuery, JobScope, RecordStore, StoreSession, TaskDetail};
use crate::job::records::{JobRecord, TaskRecord};
use crate::job::services::DatabaseManagerError;
use mockable::Clock;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info};

impl<S, C> SchedulerStateManager<S, C>
where
    S: RecordStore,
    C: Clock + Send + Sync,
{
    /// Loads jobs with their tasks in batches of the configured size.
    ///
    /// `full` selects whether payloads, scripts, selectors and variables are
    /// loaded. Duplicate ids are loaded once and unknown ids are skipped.
    /// The session cache is cleared after every batch.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the store fails or a stored
    /// record cannot be converted.
    pub fn load_jobs(&self, full: bool, ids: &[JobId]) -> StateResult<Vec<InternalJob>> {
        let mut seen = BTreeSet::new();
        let unique: Vec<JobId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }
        let detail = if full { TaskDetail::Full } else { TaskDetail::Light };
        let batch_size = self.batch_size;
        let jobs = self.transactions.run_with_transaction(true, |session| {
            let mut loaded = Vec::with_capacity(unique.len());
            for (index, batch) in unique.chunks(batch_size).enumerate() {
                loaded.extend(load_batch(session, batch, JobScope::Any, detail)?);
                session.clear();
                debug!(
                    batch = index + 1,
                    loaded = loaded.len(),
                    requested = unique.len(),
                    "job batch loaded"
                );
            }
            Ok(loaded)
        })?;
        Ok(jobs)
    }

    /// Loads every job whose status is not terminal.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the store fails.
    pub fn load_not_finished_jobs(&self, full: bool) -> StateResult<Vec<InternalJob>> {
        let query = JobQuery::with_statuses(JobStatus::not_finished());
        let ids = self
            .transactions
            .run_with_transaction(true, |session| Ok(session.find_job_ids(&query)?))?;
        info!(jobs = ids.len(), "loading not finished jobs");
        self.load_jobs(full, &ids)
    }

    /// Loads finished jobs submitted within `period`, or all of them.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the store fails.
    pub fn load_finished_jobs(
        &self,
        full: bool,
        period: Option<Duration>,
    ) -> StateResult<Vec<InternalJob>> {
        let mut query = JobQuery::with_statuses(JobStatus::FINISHED);
        if let Some(period) = period {
            let millis = i64::try_from(period.as_millis()).unwrap_or(i64::MAX);
            query.submitted_since = Some(self.now().saturating_sub(millis));
        }
        let ids = self
            .transactions
            .run_with_transaction(true, |session| Ok(session.find_job_ids(&query)?))?;
        info!(jobs = ids.len(), "loading finished jobs");
        self.load_jobs(full, &ids)
    }

    /// Loads one job with its full tasks unless it was removed.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the store fails.
    pub fn load_job_with_tasks_if_not_removed(
        &self,
        job_id: JobId,
    ) -> StateResult<Option<InternalJob>> {
        let mut jobs = self.transactions.run_with_transaction(true, |session| {
            load_batch(session, &[job_id], JobScope::NotRemoved, TaskDetail::Full)
        })?;
        Ok(jobs.pop())
    }

    /// Loads the executable payload of a task.
    ///
    /// Returns `None` once the job's runtime data has been dropped.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError::TaskNotFound`] when the task is not
    /// stored.
    pub fn load_executable_payload(&self, key: TaskKey) -> StateResult<Option<TaskPayload>> {
        let record = self.transactions.run_with_transaction(true, |session| {
            session
                .find_task(key, TaskDetail::Full)?
                .ok_or(DatabaseManagerError::TaskNotFound(key))
        })?;
        Ok(record.into_task()?.payload)
    }

    /// Returns the definition the job was submitted with.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError::MissingJobContent`] when none was
    /// stored.
    pub fn load_initial_job_content(&self, job_id: JobId) -> StateResult<String> {
        let record = self.transactions.run_with_transaction(true, |session| {
            session
                .load_job_content(job_id)?
                .ok_or(DatabaseManagerError::MissingJobContent(job_id))
        })?;
        Ok(record.decompress()?)
    }
}

fn load_batch(
    session: &mut dyn StoreSession,
    ids: &[JobId],
    scope: JobScope,
    detail: TaskDetail,
) -> StateResult<Vec<InternalJob>> {
    let records = session.load_jobs(ids, scope)?;
    let mut tasks_by_job: BTreeMap<JobId, Vec<TaskRecord>> = BTreeMap::new();
    for task in session.load_tasks(ids, detail)? {
        tasks_by_job.entry(task.key.job_id).or_default().push(task);
    }
    records
        .into_iter()
        .map(|record| {
            let tasks = record
                .id
                .and_then(|id| tasks_by_job.remove(&id))
                .unwrap_or_default();
            assemble(record, tasks)
        })
        .collect()
}

fn assemble(record: JobRecord, tasks: Vec<TaskRecord>) -> StateResult<InternalJob> {
    let mut job = record.into_job()?;
    for task in tasks {
        let restored = task.into_task()?;
        job.tasks.insert(restored.id(), restored);
    }
    Ok(job)
}
