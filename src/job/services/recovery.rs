//! Startup recovery: rebuilds scheduler state from the record store.
//!
//! Non-finished jobs are loaded with full detail and classified by their
//! stored status. Jobs that had started replay their completed tasks in
//! topological order so control-flow bookkeeping is rebuilt, then come
//! back stalled: the scheduler always resumes in a non-dispatching mode.

use crate::job::domain::{InternalJob, InternalTask, JobError, JobId, JobInfo, JobStatus, TaskId};
use crate::job::ports::RecordStore;
use crate::job::services::{DatabaseManagerError, SchedulerStateManager};
use crate::topology;
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that abort recovery as a whole.
#[derive(Debug, Clone, Error)]
pub enum RecoveryError {
    /// Jobs could not be loaded.
    #[error("failed to load jobs for recovery: {0}")]
    Load(#[from] DatabaseManagerError),

    /// A job returned as not finished carries a terminal status.
    #[error("job {job_id} loaded as not finished has status {status}")]
    UnexpectedStatus {
        /// Offending job.
        job_id: String,
        /// Stored status.
        status: JobStatus,
    },
}

/// Durable operations recovery depends on.
pub trait RecoverySource {
    /// Loads every job whose status is not terminal.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the store fails.
    fn load_not_finished_jobs(&self, full: bool) -> Result<Vec<InternalJob>, DatabaseManagerError>;

    /// Loads finished jobs submitted within `period`, or all of them.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the store fails.
    fn load_finished_jobs(
        &self,
        full: bool,
        period: Option<Duration>,
    ) -> Result<Vec<InternalJob>, DatabaseManagerError>;

    /// Persists the job state and the state of every task.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the store fails.
    fn update_job_and_tasks_state(&self, job: &InternalJob) -> Result<(), DatabaseManagerError>;
}

impl<S, C> RecoverySource for SchedulerStateManager<S, C>
where
    S: RecordStore,
    C: Clock + Send + Sync,
{
    fn load_not_finished_jobs(&self, full: bool) -> Result<Vec<InternalJob>, DatabaseManagerError> {
        Self::load_not_finished_jobs(self, full)
    }

    fn load_finished_jobs(
        &self,
        full: bool,
        period: Option<Duration>,
    ) -> Result<Vec<InternalJob>, DatabaseManagerError> {
        Self::load_finished_jobs(self, full, period)
    }

    fn update_job_and_tasks_state(&self, job: &InternalJob) -> Result<(), DatabaseManagerError> {
        Self::update_job_and_tasks_state(self, job)
    }
}

/// Jobs rebuilt at startup, by bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveredSchedulerState {
    /// Jobs that never started.
    pub pending: Vec<InternalJob>,
    /// Started jobs, now stalled or paused.
    pub running: Vec<InternalJob>,
    /// Terminated jobs, including jobs whose replay failed.
    pub finished: Vec<InternalJob>,
}

/// Listing view of a [`RecoveredSchedulerState`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStateSnapshot {
    /// Pending job summaries.
    pub pending: Vec<JobInfo>,
    /// Running job summaries.
    pub running: Vec<JobInfo>,
    /// Finished job summaries.
    pub finished: Vec<JobInfo>,
}

impl RecoveredSchedulerState {
    /// Returns the number of recovered jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len() + self.running.len() + self.finished.len()
    }

    /// Returns true when no job was recovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds a recovered job by identifier.
    #[must_use]
    pub fn job(&self, id: JobId) -> Option<&InternalJob> {
        self.pending
            .iter()
            .chain(&self.running)
            .chain(&self.finished)
            .find(|job| job.id() == Some(id))
    }

    /// Summarizes every bucket.
    #[must_use]
    pub fn snapshot(&self) -> SchedulerStateSnapshot {
        let summarize =
            |jobs: &[InternalJob]| -> Vec<JobInfo> { jobs.iter().filter_map(InternalJob::info).collect() };
        SchedulerStateSnapshot {
            pending: summarize(&self.pending),
            running: summarize(&self.running),
            finished: summarize(&self.finished),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Pending,
    Running,
}

/// Startup recovery service.
pub struct RecoveryOrchestrator<R> {
    source: Arc<R>,
}

impl<R: RecoverySource> RecoveryOrchestrator<R> {
    /// Creates an orchestrator reading from `source`.
    #[must_use]
    pub const fn new(source: Arc<R>) -> Self {
        Self { source }
    }

    /// Rebuilds the scheduler state.
    ///
    /// A job whose replay fails is canceled, persisted as such on a best
    /// effort basis and returned in the finished bucket; the other jobs are
    /// unaffected. Finished jobs are loaded without replay, limited to those
    /// submitted within `look_back` when given.
    ///
    /// # Errors
    ///
    /// Returns [`RecoveryError`] when jobs cannot be loaded or a job loaded
    /// as not finished has a terminal status.
    pub fn recover(&self, look_back: Option<Duration>) -> Result<RecoveredSchedulerState, RecoveryError> {
        let jobs = self.source.load_not_finished_jobs(true)?;
        info!(jobs = jobs.len(), "recovering not finished jobs");

        let mut state = RecoveredSchedulerState::default();
        let mut started = Vec::new();
        for job in jobs {
            match classify(&job)? {
                Bucket::Pending => state.pending.push(job),
                Bucket::Running => started.push(job),
            }
        }

        for mut job in started {
            match replay(&mut job) {
                Ok(()) => state.running.push(job),
                Err(err) => {
                    warn!(
                        job_id = %display_id(&job),
                        error = %err,
                        "replay failed, canceling job"
                    );
                    job.set_status(JobStatus::Canceled);
                    if let Err(persist_err) = self.source.update_job_and_tasks_state(&job) {
                        error!(
                            job_id = %display_id(&job),
                            error = %persist_err,
                            "failed to persist canceled job"
                        );
                    }
                    state.finished.push(job);
                }
            }
        }

        for job in &mut state.pending {
            if job.status() == JobStatus::Paused {
                job.set_status(JobStatus::Stalled);
                job.set_paused();
            }
        }

        let finished = self.source.load_finished_jobs(false, look_back)?;
        state.finished.extend(finished);
        info!(
            pending = state.pending.len(),
            running = state.running.len(),
            finished = state.finished.len(),
            "scheduler state recovered"
        );
        Ok(state)
    }
}

fn classify(job: &InternalJob) -> Result<Bucket, RecoveryError> {
    match job.status() {
        JobStatus::Pending => Ok(Bucket::Pending),
        JobStatus::Stalled | JobStatus::Running | JobStatus::PausedOnError => Ok(Bucket::Running),
        JobStatus::Paused => {
            let counters = job.counters();
            if counters.pending + counters.running + counters.finished == 0 {
                Ok(Bucket::Pending)
            } else {
                Ok(Bucket::Running)
            }
        }
        status @ (JobStatus::Canceled
        | JobStatus::Failed
        | JobStatus::Killed
        | JobStatus::Finished) => Err(RecoveryError::UnexpectedStatus {
            job_id: display_id(job),
            status,
        }),
    }
}

/// Demotes running tasks and replays completed tasks parent-before-child.
fn replay(job: &mut InternalJob) -> Result<(), JobError> {
    job.demote_running_tasks();
    let completed: Vec<InternalTask> = job
        .tasks()
        .filter(|task| task.status().is_completed())
        .cloned()
        .collect();
    let order: Vec<TaskId> = topology::sort(&completed)?
        .into_iter()
        .map(InternalTask::id)
        .collect();
    for id in &order {
        job.recover_task(*id)?;
    }
    debug!(job_id = %display_id(job), replayed = order.len(), "job replayed");

    let was_paused = job.status() == JobStatus::Paused;
    if was_paused || job.status() == JobStatus::Running {
        job.set_status(JobStatus::Stalled);
    }
    if was_paused {
        job.set_paused();
    }
    job.fold_running_into_pending();
    Ok(())
}

fn display_id(job: &InternalJob) -> String {
    job.id()
        .map_or_else(|| String::from("unsubmitted"), |id| id.to_string())
}
