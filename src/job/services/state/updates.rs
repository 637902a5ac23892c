//! State transitions of submitted jobs.

use super::submission::generated_task_record;
use super::{SchedulerStateManager, StateResult, job_id_of, task_key_of};
use crate::job::domain::{InternalJob, JobId, JobPriority, TaskId, TaskResult};
use crate::job::ports::{JobTable, RecordStore, StoreSession};
use crate::job::records::{JobStateRecord, TaskResultRecord, TaskStateRecord, edges_of};
use crate::job::services::DatabaseManagerError;
use mockable::Clock;
use tracing::{debug, info};

/// Tasks touched by a control-flow action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedTasks {
    /// Tasks created by a loop or replicate action.
    pub new_tasks: Vec<TaskId>,
    /// Existing tasks whose state or edges changed.
    pub updated_tasks: Vec<TaskId>,
}

impl<S, C> SchedulerStateManager<S, C>
where
    S: RecordStore,
    C: Clock + Send + Sync,
{
    /// Persists the start of a task together with the job state.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the job is unsubmitted, the task
    /// unknown or the store fails.
    pub fn job_task_started(&self, job: &InternalJob, task: TaskId) -> StateResult<()> {
        let key = task_key_of(job, task)?;
        let now = self.now();
        self.transactions.run_with_transaction(false, |session| {
            write_job_state(session, job, now)?;
            write_task_states(session, job, &[task])
        })?;
        debug!(task = %key, "task start persisted");
        Ok(())
    }

    /// Persists a task put back in the waiting state, with the result of the
    /// failed attempt when there is one.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the store fails.
    pub fn task_restarted(
        &self,
        job: &InternalJob,
        task: TaskId,
        result: Option<&TaskResult>,
    ) -> StateResult<()> {
        let key = task_key_of(job, task)?;
        let now = self.now();
        self.transactions.run_with_transaction(false, |session| {
            write_job_state(session, job, now)?;
            write_task_states(session, job, &[task])?;
            if let Some(result) = result {
                session.insert_task_result(&TaskResultRecord::from_result(key, result)?)?;
            }
            Ok(())
        })
    }

    /// Persists a finished task and its result.
    ///
    /// When the job reached a terminal status every task state is written
    /// and the job's runtime data (payloads, scripts, selectors and task
    /// variables) is dropped in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the store fails; nothing is
    /// persisted in that case.
    pub fn update_after_task_finished(
        &self,
        job: &InternalJob,
        finished: TaskId,
        result: &TaskResult,
    ) -> StateResult<()> {
        let key = task_key_of(job, finished)?;
        let now = self.now();
        let terminal = job.status().is_terminal();
        self.transactions.run_with_transaction(false, |session| {
            write_job_state(session, job, now)?;
            if terminal {
                write_all_task_states(session, job)?;
            } else {
                write_task_states(session, job, &[finished])?;
            }
            session.insert_task_result(&TaskResultRecord::from_result(key, result)?)?;
            if terminal {
                drop_runtime_data(session, key.job_id)?;
            }
            Ok(())
        })?;
        if terminal {
            info!(job_id = %key.job_id, status = job.status().as_str(), "job terminated");
        }
        Ok(())
    }

    /// Persists a finished control-flow task together with the tasks its
    /// action created or modified.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when a listed task is unknown or the
    /// store fails.
    pub fn update_after_workflow_task_finished(
        &self,
        job: &InternalJob,
        finished: TaskId,
        changes: &ChangedTasks,
        result: &TaskResult,
    ) -> StateResult<()> {
        let key = task_key_of(job, finished)?;
        for id in changes.new_tasks.iter().chain(&changes.updated_tasks) {
            task_key_of(job, *id)?;
        }
        let now = self.now();
        let terminal = job.status().is_terminal();
        self.transactions.run_with_transaction(false, |session| {
            write_job_state(session, job, now)?;
            let mut created = Vec::with_capacity(changes.new_tasks.len());
            for id in &changes.new_tasks {
                let task = job
                    .task(*id)
                    .ok_or(DatabaseManagerError::InvalidArgument("unknown generated task"))?;
                let record = generated_task_record(session, key.job_id, task)?;
                session.insert_task(&record)?;
                created.push(record);
            }
            for record in &created {
                session.replace_task_edges(&record.edges)?;
            }
            for id in &changes.updated_tasks {
                if let Some(task) = job.task(*id) {
                    session.update_task_state(&TaskStateRecord::from_task(key.job_id, task))?;
                    session.replace_task_edges(&edges_of(key.job_id, task))?;
                }
            }
            write_task_states(session, job, &[finished])?;
            session.insert_task_result(&TaskResultRecord::from_result(key, result)?)?;
            if terminal {
                drop_runtime_data(session, key.job_id)?;
            }
            Ok(())
        })?;
        debug!(
            task = %key,
            created = changes.new_tasks.len(),
            updated = changes.updated_tasks.len(),
            "control-flow action persisted"
        );
        Ok(())
    }

    /// Persists a killed job with all of its tasks and drops its runtime data.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the store fails.
    pub fn update_after_job_killed(&self, job: &InternalJob) -> StateResult<()> {
        let job_id = job_id_of(job)?;
        let now = self.now();
        self.transactions.run_with_transaction(false, |session| {
            write_job_state(session, job, now)?;
            write_all_task_states(session, job)?;
            drop_runtime_data(session, job_id)
        })?;
        info!(job_id = %job_id, "killed job persisted");
        Ok(())
    }

    /// Persists the job state and the state of every task.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the store fails.
    pub fn update_job_and_tasks_state(&self, job: &InternalJob) -> StateResult<()> {
        job_id_of(job)?;
        let now = self.now();
        self.transactions.run_with_transaction(false, |session| {
            write_job_state(session, job, now)?;
            write_all_task_states(session, job)
        })
    }

    /// Persists the state of one task.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the store fails.
    pub fn update_task_state(&self, job: &InternalJob, task: TaskId) -> StateResult<()> {
        task_key_of(job, task)?;
        self.transactions
            .run_with_transaction(false, |session| write_task_states(session, job, &[task]))
    }

    /// Changes the stored priority of a job.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the job is not stored.
    pub fn change_job_priority(&self, job_id: JobId, priority: JobPriority) -> StateResult<()> {
        let now = self.now();
        self.transactions.run_with_transaction(false, |session| {
            Ok(session.update_job_priority(job_id, priority, now)?)
        })?;
        info!(job_id = %job_id, priority = priority.as_str(), "job priority changed");
        Ok(())
    }
}

fn write_job_state(session: &mut dyn StoreSession, job: &InternalJob, now: i64) -> StateResult<()> {
    session.update_job_state(&JobStateRecord::from_job(job, now)?)?;
    Ok(())
}

fn write_task_states(
    session: &mut dyn StoreSession,
    job: &InternalJob,
    tasks: &[TaskId],
) -> StateResult<()> {
    let job_id = job_id_of(job)?;
    for id in tasks {
        if let Some(task) = job.task(*id) {
            session.update_task_state(&TaskStateRecord::from_task(job_id, task))?;
        }
    }
    Ok(())
}

fn write_all_task_states(session: &mut dyn StoreSession, job: &InternalJob) -> StateResult<()> {
    let job_id = job_id_of(job)?;
    for task in job.tasks() {
        session.update_task_state(&TaskStateRecord::from_task(job_id, task))?;
    }
    Ok(())
}

fn drop_runtime_data(session: &mut dyn StoreSession, job_id: JobId) -> StateResult<()> {
    for table in JobTable::RUNTIME_DATA {
        session.delete_job_rows(table, &[job_id])?;
    }
    Ok(())
}
