//! Lightweight summaries returned by listing queries.

use super::{JobId, JobPriority, JobStatus, TaskCounters, TaskKey, TaskStatus};

/// Summary of a job without its task graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    /// Job identifier.
    pub id: JobId,
    /// Job name.
    pub name: String,
    /// Submitting user.
    pub owner: String,
    /// Project name.
    pub project_name: Option<String>,
    /// Priority.
    pub priority: JobPriority,
    /// Status.
    pub status: JobStatus,
    /// Submission time.
    pub submitted_time: i64,
    /// Start time, or `-1`.
    pub start_time: i64,
    /// Finish time, or `-1`.
    pub finished_time: i64,
    /// Removal time, or `-1`.
    pub removed_time: i64,
    /// Aggregate task counters.
    pub counters: TaskCounters,
}

/// Summary of a task without payload or scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    /// Task identity.
    pub key: TaskKey,
    /// Task name.
    pub name: String,
    /// Tag.
    pub tag: Option<String>,
    /// Status.
    pub status: TaskStatus,
    /// Start time, or `-1`.
    pub start_time: i64,
    /// Finish time, or `-1`.
    pub finished_time: i64,
    /// Execution duration in milliseconds, or `-1`.
    pub execution_duration: i64,
    /// Host of the last execution.
    pub execution_host_name: Option<String>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items of this page.
    pub items: Vec<T>,
    /// Number of items matching the query across all pages.
    pub total: u64,
}

impl super::InternalJob {
    /// Returns a listing summary, or `None` before submission.
    #[must_use]
    pub fn info(&self) -> Option<JobInfo> {
        Some(JobInfo {
            id: self.id?,
            name: self.name.clone(),
            owner: self.owner.clone(),
            project_name: self.project_name.clone(),
            priority: self.priority,
            status: self.status,
            submitted_time: self.submitted_time,
            start_time: self.start_time,
            finished_time: self.finished_time,
            removed_time: self.removed_time,
            counters: self.counters,
        })
    }
}
