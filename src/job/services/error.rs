//! Errors surfaced by the state manager and its helpers.

use crate::job::domain::{JobError, JobId, TaskKey};
use crate::job::ports::StoreError;
use crate::job::records::RecordError;
use thiserror::Error;

/// Failure of a durable-state operation.
///
/// Fatal for the triggering operation, never for the process: callers may
/// retry at a higher level.
#[derive(Debug, Clone, Error)]
pub enum DatabaseManagerError {
    /// The record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A store failure the registered failure handler chose to suppress.
    #[error("store failure suppressed by handler: {0}")]
    Suppressed(StoreError),

    /// A stored record could not be converted.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// The in-memory job rejected the operation.
    #[error(transparent)]
    Job(#[from] JobError),

    /// The job is not stored.
    #[error("job {0} not found")]
    JobNotFound(JobId),

    /// The task is not stored.
    #[error("task {0} not found")]
    TaskNotFound(TaskKey),

    /// No task of the job has the given name.
    #[error("job {job_id} has no task named {name}")]
    TaskNameNotFound {
        /// Job searched.
        job_id: JobId,
        /// Requested task name.
        name: String,
    },

    /// A task expected to have a result has none.
    #[error("failed to load result for task {0}")]
    MissingTaskResult(TaskKey),

    /// The job was stored without its definition.
    #[error("no initial content stored for job {0}")]
    MissingJobContent(JobId),

    /// The caller passed an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl DatabaseManagerError {
    /// Returns true when the store reported lock contention.
    #[must_use]
    pub const fn is_lock_contention(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_lock_contention())
    }
}
