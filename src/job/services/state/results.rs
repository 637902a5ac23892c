//! Task and job result queries.

use super::{SchedulerStateManager, StateResult};
use crate::job::domain::{JobId, JobResult, TaskId, TaskKey, TaskResult};
use crate::job::ports::{JobScope, RecordStore, ResultPage, StoreSession, TaskDetail};
use crate::job::records::TaskResultRecord;
use crate::job::services::DatabaseManagerError;
use mockable::Clock;
use std::collections::{BTreeMap, BTreeSet};

impl<S, C> SchedulerStateManager<S, C>
where
    S: RecordStore,
    C: Clock + Send + Sync,
{
    /// Appends a result to a task's history.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the task is not stored.
    pub fn save_task_result(&self, key: TaskKey, result: &TaskResult) -> StateResult<()> {
        let record = TaskResultRecord::from_result(key, result)?;
        self.transactions.run_with_transaction(false, |session| {
            Ok(session.insert_task_result(&record)?)
        })
    }

    /// Returns the `index`-th most recent result of a task; 0 is the latest.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the store fails.
    pub fn load_task_result(&self, key: TaskKey, index: usize) -> StateResult<Option<TaskResult>> {
        let mut records = self.transactions.run_with_transaction(true, |session| {
            Ok(session.load_task_results(key, ResultPage::nth_latest(index))?)
        })?;
        records.pop().map(TaskResultRecord::into_result).transpose().map_err(Into::into)
    }

    /// Returns the latest result of a task.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the store fails.
    pub fn load_last_task_result(&self, key: TaskKey) -> StateResult<Option<TaskResult>> {
        self.load_task_result(key, 0)
    }

    /// Returns every result of a task, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the store fails.
    pub fn load_task_result_all_attempts(&self, key: TaskKey) -> StateResult<Vec<TaskResult>> {
        let records = self.transactions.run_with_transaction(true, |session| {
            Ok(session.load_task_results(key, ResultPage::all_attempts())?)
        })?;
        records
            .into_iter()
            .map(|record| Ok(record.into_result()?))
            .collect()
    }

    /// Returns the `index`-th most recent result of the task named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError::TaskNameNotFound`] when the job has no
    /// such task.
    pub fn load_task_result_by_name(
        &self,
        job_id: JobId,
        name: &str,
        index: usize,
    ) -> StateResult<Option<TaskResult>> {
        let key = self.transactions.run_with_transaction(true, |session| {
            session.find_task_key_by_name(job_id, name)?.ok_or_else(|| {
                DatabaseManagerError::TaskNameNotFound {
                    job_id,
                    name: name.to_owned(),
                }
            })
        })?;
        self.load_task_result(key, index)
    }

    /// Returns the latest result of each listed task.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError::InvalidArgument`] for an empty list,
    /// [`DatabaseManagerError::JobNotFound`] when the job is not stored and
    /// [`DatabaseManagerError::MissingTaskResult`] when a listed task has no
    /// result.
    pub fn load_tasks_results(
        &self,
        job_id: JobId,
        tasks: &[TaskId],
    ) -> StateResult<BTreeMap<TaskId, TaskResult>> {
        if tasks.is_empty() {
            return Err(DatabaseManagerError::InvalidArgument("task id list is empty"));
        }
        let keys: Vec<TaskKey> = tasks.iter().map(|id| TaskKey::new(job_id, *id)).collect();
        let records = self.transactions.run_with_transaction(true, |session| {
            ensure_job(session, job_id)?;
            Ok(session.load_latest_task_results(&keys)?)
        })?;
        let mut latest: BTreeMap<TaskId, TaskResult> = BTreeMap::new();
        for record in records {
            let task = record.task.task_id;
            latest.insert(task, record.into_result()?);
        }
        if let Some(missing) = keys.iter().find(|key| !latest.contains_key(&key.task_id)) {
            return Err(DatabaseManagerError::MissingTaskResult(*missing));
        }
        Ok(latest)
    }

    /// Returns the latest result of every task of a job, keyed by task name.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError::JobNotFound`] when the job is not
    /// stored.
    pub fn load_job_result(&self, job_id: JobId) -> StateResult<JobResult> {
        let (tasks, records) = self.transactions.run_with_transaction(true, |session| {
            ensure_job(session, job_id)?;
            let tasks = session.load_tasks(&[job_id], TaskDetail::Light)?;
            let keys: Vec<TaskKey> = tasks.iter().map(|task| task.key).collect();
            let records = session.load_latest_task_results(&keys)?;
            Ok((tasks, records))
        })?;
        let mut results = BTreeMap::new();
        let mut precious = BTreeSet::new();
        for record in records {
            let Some(task) = tasks.iter().find(|task| task.key == record.task) else {
                continue;
            };
            if task.precious_result {
                precious.insert(task.name.clone());
            }
            results.insert(task.name.clone(), record.into_result()?);
        }
        Ok(JobResult {
            job_id,
            results,
            precious,
        })
    }
}

fn ensure_job(session: &mut dyn StoreSession, job_id: JobId) -> StateResult<()> {
    if session.load_jobs(&[job_id], JobScope::Any)?.is_empty() {
        return Err(DatabaseManagerError::JobNotFound(job_id));
    }
    Ok(())
}
