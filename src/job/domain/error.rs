//! Error types for job graph validation, state transitions and parsing.

use super::{JobStatus, TaskId, TaskStatus};
use crate::topology::CycleDetected;
use thiserror::Error;

/// Errors raised by in-memory job operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    /// A task or edge references a task that is not part of the job.
    #[error("task {0} is not part of the job")]
    UnknownTask(TaskId),

    /// The task dependency graph contains a cycle.
    #[error(transparent)]
    Cycle(#[from] CycleDetected<TaskId>),

    /// A completed task was replayed before one of its completed predecessors.
    #[error("task {task} replayed before its predecessor {predecessor}")]
    ReplayOutOfOrder {
        /// Task being replayed.
        task: TaskId,
        /// Completed predecessor that has not been replayed yet.
        predecessor: TaskId,
    },

    /// Only completed tasks can be replayed.
    #[error("task {task} cannot be replayed from status {status}")]
    NotReplayable {
        /// Offending task.
        task: TaskId,
        /// Its current status.
        status: TaskStatus,
    },

    /// The requested task transition is not allowed from its current status.
    #[error("task {task} cannot move from {from} to {to}")]
    InvalidTaskTransition {
        /// Offending task.
        task: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// The job is already terminal.
    #[error("job is already terminal with status {0}")]
    JobTerminated(JobStatus),

    /// The job has not been assigned an identifier by the store yet.
    #[error("job has not been submitted")]
    NotSubmitted,
}

/// Error returned while parsing a stored enumeration value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    /// Enumeration being parsed.
    pub kind: &'static str,
    /// Raw stored value.
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}
