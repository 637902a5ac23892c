//! Job and task status enumerations plus stored policy values.

use super::ParseEnumError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Submitted, no task started yet.
    Pending,
    /// At least one task has started.
    Running,
    /// Stopped after a restart; nothing is dispatched until resumed.
    Stalled,
    /// Paused by a user.
    Paused,
    /// Paused because a task failed under a pause-on-error policy.
    PausedOnError,
    /// Cancelled because of a task failure policy or a broken replay.
    Canceled,
    /// Failed with no executions left.
    Failed,
    /// Killed by a user.
    Killed,
    /// Every task completed.
    Finished,
}

impl JobStatus {
    /// Statuses of jobs that will never run again.
    pub const FINISHED: [Self; 4] = [Self::Canceled, Self::Failed, Self::Killed, Self::Finished];
    /// Statuses of jobs waiting for their first task to start.
    pub const PENDING: [Self; 1] = [Self::Pending];
    /// Statuses of jobs that have started but not terminated.
    pub const RUNNING: [Self; 4] = [
        Self::Paused,
        Self::PausedOnError,
        Self::Stalled,
        Self::Running,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Stalled => "STALLED",
            Self::Paused => "PAUSED",
            Self::PausedOnError => "PAUSED_ON_ERROR",
            Self::Canceled => "CANCELED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
            Self::Finished => "FINISHED",
        }
    }

    /// Returns true when the job has reached a terminal status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Canceled | Self::Failed | Self::Killed | Self::Finished
        )
    }

    /// Returns every status that is not terminal.
    #[must_use]
    pub fn not_finished() -> Vec<Self> {
        Self::PENDING.iter().chain(Self::RUNNING.iter()).copied().collect()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for JobStatus {
    type Error = ParseEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "STALLED" => Ok(Self::Stalled),
            "PAUSED" => Ok(Self::Paused),
            "PAUSED_ON_ERROR" | "IN_ERROR" => Ok(Self::PausedOnError),
            "CANCELED" => Ok(Self::Canceled),
            "FAILED" => Ok(Self::Failed),
            "KILLED" => Ok(Self::Killed),
            "FINISHED" => Ok(Self::Finished),
            _ => Err(ParseEnumError::new("job status", value)),
        }
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Created, not yet eligible.
    Submitted,
    /// Eligible for dispatch.
    Pending,
    /// Executing on a node.
    Running,
    /// Waiting before a retry after an error.
    WaitingOnError,
    /// Waiting before a retry after a node failure.
    WaitingOnFailure,
    /// Paused with its job.
    Paused,
    /// Completed normally.
    Finished,
    /// Completed with an error result.
    Faulty,
    /// Failed with no executions left.
    Failed,
    /// Aborted because its job terminated.
    Aborted,
    /// Skipped by a control-flow decision.
    Skipped,
}

impl TaskStatus {
    /// Statuses of tasks that completed before the last observation.
    pub const COMPLETED: [Self; 5] = [
        Self::Aborted,
        Self::Failed,
        Self::Finished,
        Self::Faulty,
        Self::Skipped,
    ];
    /// Task listing bucket for tasks that have not started.
    pub const PENDING_BUCKET: [Self; 5] = [
        Self::Submitted,
        Self::Pending,
        Self::Paused,
        Self::WaitingOnError,
        Self::WaitingOnFailure,
    ];
    /// Task listing bucket for executing tasks.
    pub const RUNNING_BUCKET: [Self; 1] = [Self::Running];
    /// Task listing bucket for tasks that produced a result.
    pub const FINISHED_BUCKET: [Self; 2] = [Self::Finished, Self::Faulty];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::WaitingOnError => "WAITING_ON_ERROR",
            Self::WaitingOnFailure => "WAITING_ON_FAILURE",
            Self::Paused => "PAUSED",
            Self::Finished => "FINISHED",
            Self::Faulty => "FAULTY",
            Self::Failed => "FAILED",
            Self::Aborted => "ABORTED",
            Self::Skipped => "SKIPPED",
        }
    }

    /// Returns true when the task completed, successfully or not.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(
            self,
            Self::Aborted | Self::Failed | Self::Finished | Self::Faulty | Self::Skipped
        )
    }

    /// Returns true when the task is waiting to be dispatched.
    #[must_use]
    pub const fn is_waiting(self) -> bool {
        matches!(
            self,
            Self::Submitted | Self::Pending | Self::WaitingOnError | Self::WaitingOnFailure
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "SUBMITTED" => Ok(Self::Submitted),
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "WAITING_ON_ERROR" => Ok(Self::WaitingOnError),
            "WAITING_ON_FAILURE" => Ok(Self::WaitingOnFailure),
            "PAUSED" => Ok(Self::Paused),
            "FINISHED" => Ok(Self::Finished),
            "FAULTY" => Ok(Self::Faulty),
            "FAILED" => Ok(Self::Failed),
            "ABORTED" => Ok(Self::Aborted),
            "SKIPPED" => Ok(Self::Skipped),
            _ => Err(ParseEnumError::new("task status", value)),
        }
    }
}

/// Job scheduling priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPriority {
    /// Runs only when nothing else is waiting.
    Idle,
    /// Lowest regular priority.
    Lowest,
    /// Below normal.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// Above normal.
    High,
    /// Highest priority.
    Highest,
}

impl JobPriority {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Lowest => "LOWEST",
            Self::Low => "LOW",
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
            Self::Highest => "HIGHEST",
        }
    }
}

impl fmt::Display for JobPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for JobPriority {
    type Error = ParseEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "IDLE" => Ok(Self::Idle),
            "LOWEST" => Ok(Self::Lowest),
            "LOW" => Ok(Self::Low),
            "NORMAL" => Ok(Self::Normal),
            "HIGH" => Ok(Self::High),
            "HIGHEST" => Ok(Self::Highest),
            _ => Err(ParseEnumError::new("job priority", value)),
        }
    }
}

/// Policy applied when a task ends in error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnTaskError {
    /// Inherit the job-level policy.
    #[default]
    NotSet,
    /// Continue executing the rest of the job.
    ContinueJobExecution,
    /// Pause the failing task.
    PauseTask,
    /// Pause the whole job.
    PauseJob,
    /// Cancel the job.
    CancelJob,
}

impl OnTaskError {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotSet => "NONE",
            Self::ContinueJobExecution => "CONTINUE_JOB_EXECUTION",
            Self::PauseTask => "PAUSE_TASK",
            Self::PauseJob => "PAUSE_JOB",
            Self::CancelJob => "CANCEL_JOB",
        }
    }
}

impl TryFrom<&str> for OnTaskError {
    type Error = ParseEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "NONE" => Ok(Self::NotSet),
            "CONTINUE_JOB_EXECUTION" => Ok(Self::ContinueJobExecution),
            "PAUSE_TASK" => Ok(Self::PauseTask),
            "PAUSE_JOB" => Ok(Self::PauseJob),
            "CANCEL_JOB" => Ok(Self::CancelJob),
            _ => Err(ParseEnumError::new("on-task-error policy", value)),
        }
    }
}

/// Control-flow action carried by a flow script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowActionType {
    /// No control-flow change.
    #[default]
    Continue,
    /// Choose between two branches.
    If,
    /// Repeat a block.
    Loop,
    /// Fan out replicas of a block.
    Replicate,
}

impl FlowActionType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Continue => "CONTINUE",
            Self::If => "IF",
            Self::Loop => "LOOP",
            Self::Replicate => "REPLICATE",
        }
    }
}

impl TryFrom<&str> for FlowActionType {
    type Error = ParseEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "CONTINUE" => Ok(Self::Continue),
            "IF" => Ok(Self::If),
            "LOOP" => Ok(Self::Loop),
            "REPLICATE" => Ok(Self::Replicate),
            _ => Err(ParseEnumError::new("flow action", value)),
        }
    }
}

/// Marks a task as opening or closing a control-flow block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowBlock {
    /// Not a block boundary.
    #[default]
    None,
    /// Opens a block.
    Start,
    /// Closes a block.
    End,
}

impl FlowBlock {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Start => "START",
            Self::End => "END",
        }
    }
}

impl TryFrom<&str> for FlowBlock {
    type Error = ParseEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "NONE" => Ok(Self::None),
            "START" => Ok(Self::Start),
            "END" => Ok(Self::End),
            _ => Err(ParseEnumError::new("flow block", value)),
        }
    }
}
