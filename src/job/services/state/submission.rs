//! Job submission.

use super::{SchedulerStateManager, StateResult};
use crate::job::domain::{InternalJob, InternalTask, JobId, TaskKey, UNSET_TIME};
use crate::job::ports::{RecordStore, StoreSession, TaskDetail};
use crate::job::records::{JobContentRecord, JobRecord, TaskRecord};
use crate::job::services::DatabaseManagerError;
use mockable::Clock;
use tracing::{debug, info};

impl<S, C> SchedulerStateManager<S, C>
where
    S: RecordStore,
    C: Clock + Send + Sync,
{
    /// Persists a new job with all of its tasks in one transaction and
    /// assigns the store-generated identifier to `job`.
    ///
    /// Task rows are inserted before any edge so every edge targets an
    /// existing row.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError::Job`] when the task graph is invalid
    /// and other variants when the store rejects the write; nothing is
    /// persisted in that case.
    pub fn submit_job(&self, job: &mut InternalJob) -> StateResult<JobId> {
        job.validate_graph()?;
        let now = self.now();
        if job.submitted_time == UNSET_TIME {
            job.submitted_time = now;
        }
        job.last_updated_time = now;

        let submitted: &InternalJob = job;
        let id = self.transactions.run_with_transaction(false, |session| {
            let id = session.insert_job(&JobRecord::from_job(submitted)?)?;
            let tasks = submitted
                .tasks()
                .map(|task| TaskRecord::from_task(id, task))
                .collect::<Result<Vec<_>, _>>()?;
            for task in &tasks {
                session.insert_task(task)?;
            }
            for task in &tasks {
                session.replace_task_edges(&task.edges)?;
            }
            if let Some(content) = submitted.initial_content() {
                session.insert_job_content(&JobContentRecord::compress(id, content)?)?;
            }
            if let Some(parent) = submitted.parent_id() {
                session.adjust_children_count(parent, 1)?;
            }
            Ok(id)
        })?;
        job.set_id(id);
        info!(
            job_id = %id,
            tasks = job.counters().total,
            owner = job.owner(),
            "job submitted"
        );
        Ok(id)
    }
}

/// Builds the record of a task created at runtime.
///
/// Replicated tasks without their own payload reuse the stored payload of
/// the task they were generated from.
pub(super) fn generated_task_record(
    session: &mut dyn StoreSession,
    job_id: JobId,
    task: &InternalTask,
) -> StateResult<TaskRecord> {
    if task.payload().is_some() {
        return Ok(TaskRecord::from_task(job_id, task)?);
    }
    let origin = task
        .replicated_from()
        .ok_or(DatabaseManagerError::InvalidArgument(
            "generated task has neither payload nor origin",
        ))?;
    let origin_key = TaskKey::new(job_id, origin);
    let origin_task = session
        .find_task(origin_key, TaskDetail::Full)?
        .ok_or(DatabaseManagerError::TaskNotFound(origin_key))?
        .into_task()?;
    debug!(task = %TaskKey::new(job_id, task.id()), origin = %origin_key, "reusing payload of origin task");
    let mut replica = task.clone();
    replica.payload = origin_task.payload;
    Ok(TaskRecord::from_task(job_id, &replica)?)
}
