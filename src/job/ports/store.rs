//! Record store port: transactional sessions over job, task and result rows.

use crate::job::domain::{JobId, JobPriority, JobStatus, TaskKey, TaskStatus};
use crate::job::records::{
    JobContentRecord, JobRecord, JobStateRecord, TaskEdges, TaskRecord, TaskResultRecord,
    TaskStateRecord, ThirdPartyCredentialRecord,
};
use std::sync::Arc;
use thiserror::Error;

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by record store implementations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not acquire a lock in time; the work may be retried.
    #[error("lock contention: {0}")]
    LockContention(String),

    /// A write was attempted in a read-only session.
    #[error("write attempted in a read-only session")]
    ReadOnlySession,

    /// An update or child insert targeted a row that does not exist.
    #[error("no stored row for {0}")]
    MissingRow(String),

    /// An insert collided with an existing row.
    #[error("row already stored for {0}")]
    Conflict(String),

    /// Any other store failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Returns true for the retryable contention class.
    #[must_use]
    pub const fn is_lock_contention(&self) -> bool {
        matches!(self, Self::LockContention(_))
    }
}

/// Kind of session opened for a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Transactional; committed on success, rolled back on failure.
    ReadWrite,
    /// Read-only snapshot.
    ReadOnly,
}

/// Tables holding rows that belong to a job, in hard-delete order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobTable {
    /// Dependency, if-branch and joined-branch edges.
    TaskEdges,
    /// Scripts of every kind.
    Scripts,
    /// Data-space selectors.
    Selectors,
    /// Type-specific payload rows and their environment modifiers.
    TaskPayloads,
    /// Task variables.
    TaskVariables,
    /// Task results.
    TaskResults,
    /// Task rows.
    Tasks,
    /// Compressed job definitions.
    JobContent,
    /// Job variables.
    JobVariables,
    /// Job rows.
    Jobs,
}

impl JobTable {
    /// Order in which a hard delete visits tables so no row outlives its parent.
    pub const HARD_DELETE_ORDER: [Self; 10] = [
        Self::TaskEdges,
        Self::Scripts,
        Self::Selectors,
        Self::TaskPayloads,
        Self::TaskVariables,
        Self::TaskResults,
        Self::Tasks,
        Self::JobContent,
        Self::JobVariables,
        Self::Jobs,
    ];

    /// Heavyweight rows dropped once a job terminates.
    pub const RUNTIME_DATA: [Self; 4] = [
        Self::Scripts,
        Self::Selectors,
        Self::TaskPayloads,
        Self::TaskVariables,
    ];
}

/// Which jobs a bulk load returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobScope {
    /// Every requested job.
    Any,
    /// Only jobs whose `removed_time` is `-1`.
    NotRemoved,
}

/// How much of each task row a load returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskDetail {
    /// Task rows and edges.
    Light,
    /// Task rows, edges, payloads, scripts, selectors and variables.
    Full,
}

/// Ordering of a task's result history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOrder {
    /// Greatest `result_time` first.
    NewestFirst,
    /// Smallest `result_time` first.
    OldestFirst,
}

/// Window over a task's result history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultPage {
    /// Ordering applied before the window.
    pub order: ResultOrder,
    /// Results skipped from the start.
    pub offset: usize,
    /// Maximum results returned; `None` for all.
    pub limit: Option<usize>,
}

impl ResultPage {
    /// The `index`-th most recent result (0 is the latest).
    #[must_use]
    pub const fn nth_latest(index: usize) -> Self {
        Self {
            order: ResultOrder::NewestFirst,
            offset: index,
            limit: Some(1),
        }
    }

    /// Every result, oldest first.
    #[must_use]
    pub const fn all_attempts() -> Self {
        Self {
            order: ResultOrder::OldestFirst,
            offset: 0,
            limit: None,
        }
    }
}

/// Column a job listing is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSortField {
    /// Job identifier.
    Id,
    /// Job name.
    Name,
    /// Owner.
    Owner,
    /// Priority.
    Priority,
    /// Submission time.
    SubmittedTime,
}

/// One sort key of a job listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSort {
    /// Sorted column.
    pub field: JobSortField,
    /// Descending instead of ascending.
    pub descending: bool,
}

/// Criteria for job queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    /// Accepted statuses; `None` accepts all.
    pub statuses: Option<Vec<JobStatus>>,
    /// Required owner.
    pub owner: Option<String>,
    /// Minimum submission time.
    pub submitted_since: Option<i64>,
    /// Include soft-deleted jobs.
    pub include_removed: bool,
    /// Sort keys, applied in order; identifier order when empty.
    pub sort: Vec<JobSort>,
    /// Rows skipped.
    pub offset: usize,
    /// Maximum rows returned.
    pub limit: Option<usize>,
}

impl TaskQuery {
    /// Active-job tasks in the selected listing buckets.
    ///
    /// Pending covers tasks that have not started, running covers executing
    /// tasks and finished covers tasks that produced a result.
    #[must_use]
    pub fn with_buckets(pending: bool, running: bool, finished: bool) -> Self {
        let mut statuses = Vec::new();
        if pending {
            statuses.extend(TaskStatus::PENDING_BUCKET);
        }
        if running {
            statuses.extend(TaskStatus::RUNNING_BUCKET);
        }
        if finished {
            statuses.extend(TaskStatus::FINISHED_BUCKET);
        }
        Self {
            statuses: Some(statuses),
            ..Self::default()
        }
    }
}

impl JobQuery {
    /// Active jobs with one of `statuses`.
    #[must_use]
    pub fn with_statuses(statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        Self {
            statuses: Some(statuses.into_iter().collect()),
            ..Self::default()
        }
    }
}

/// Criteria for task queries; only tasks of active jobs are returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    /// Accepted statuses; `None` accepts all.
    pub statuses: Option<Vec<TaskStatus>>,
    /// Owner of the task's job.
    pub owner: Option<String>,
    /// Required tag.
    pub tag: Option<String>,
    /// Minimum start time.
    pub started_since: Option<i64>,
    /// Maximum finish time.
    pub finished_before: Option<i64>,
    /// Rows skipped.
    pub offset: usize,
    /// Maximum rows returned.
    pub limit: Option<usize>,
}

/// Record-level operations available inside a session.
///
/// Sessions opened with [`SessionMode::ReadOnly`] reject writes with
/// [`StoreError::ReadOnlySession`].
pub trait StoreSession {
    /// Inserts a job row with its variables and returns the generated id.
    fn insert_job(&mut self, job: &JobRecord) -> StoreResult<JobId>;

    /// Stores the compressed definition of a job.
    fn insert_job_content(&mut self, content: &JobContentRecord) -> StoreResult<()>;

    /// Loads the compressed definition of a job.
    fn load_job_content(&mut self, id: JobId) -> StoreResult<Option<JobContentRecord>>;

    /// Loads job rows with their variables; unknown ids are skipped.
    fn load_jobs(&mut self, ids: &[JobId], scope: JobScope) -> StoreResult<Vec<JobRecord>>;

    /// Returns ids of jobs matching `query`, honouring sort and pagination.
    fn find_job_ids(&mut self, query: &JobQuery) -> StoreResult<Vec<JobId>>;

    /// Counts jobs matching `query`, ignoring pagination.
    fn count_jobs(&mut self, query: &JobQuery) -> StoreResult<u64>;

    /// Writes the mutable columns of a job.
    fn update_job_state(&mut self, state: &JobStateRecord) -> StoreResult<()>;

    /// Changes the priority of a job.
    fn update_job_priority(
        &mut self,
        id: JobId,
        priority: JobPriority,
        updated_at: i64,
    ) -> StoreResult<()>;

    /// Flags a job as to be removed.
    fn mark_job_to_be_removed(&mut self, id: JobId, updated_at: i64) -> StoreResult<()>;

    /// Sets `removed_time` on active jobs among `ids`; already removed jobs
    /// keep their first removal time. Returns the number of jobs updated.
    fn mark_jobs_removed(&mut self, ids: &[JobId], removed_time: i64) -> StoreResult<usize>;

    /// Records when housekeeping may purge a job.
    fn schedule_job_removal(&mut self, id: JobId, removal_time: i64) -> StoreResult<()>;

    /// Returns `(job, owner)` pairs of active jobs scheduled for removal at or
    /// before `now`.
    fn find_jobs_scheduled_for_removal(&mut self, now: i64) -> StoreResult<Vec<(JobId, String)>>;

    /// Returns the parent of every active job in `ids` that has one, once per
    /// child. Jobs already marked removed are skipped.
    fn find_parent_ids(&mut self, ids: &[JobId]) -> StoreResult<Vec<JobId>>;

    /// Adds `delta` to the children count of a parent job, clamped at zero.
    fn adjust_children_count(&mut self, parent: JobId, delta: i64) -> StoreResult<()>;

    /// Deletes the rows of `table` belonging to the given jobs.
    fn delete_job_rows(&mut self, table: JobTable, ids: &[JobId]) -> StoreResult<usize>;

    /// Inserts a task row with its payload, scripts, selectors and variables.
    ///
    /// Edges are ignored; they are written by [`Self::replace_task_edges`]
    /// once every task row of the job exists.
    fn insert_task(&mut self, task: &TaskRecord) -> StoreResult<()>;

    /// Replaces all edges leaving a task.
    fn replace_task_edges(&mut self, edges: &TaskEdges) -> StoreResult<()>;

    /// Loads the tasks of the given jobs.
    fn load_tasks(&mut self, job_ids: &[JobId], detail: TaskDetail) -> StoreResult<Vec<TaskRecord>>;

    /// Loads one task.
    fn find_task(&mut self, key: TaskKey, detail: TaskDetail) -> StoreResult<Option<TaskRecord>>;

    /// Resolves a task by name within a job.
    fn find_task_key_by_name(&mut self, job_id: JobId, name: &str)
    -> StoreResult<Option<TaskKey>>;

    /// Returns light task rows of active jobs matching `query`.
    fn find_tasks(&mut self, query: &TaskQuery) -> StoreResult<Vec<TaskRecord>>;

    /// Counts tasks matching `query`, ignoring pagination.
    fn count_tasks(&mut self, query: &TaskQuery) -> StoreResult<u64>;

    /// Writes the mutable columns of a task.
    fn update_task_state(&mut self, state: &TaskStateRecord) -> StoreResult<()>;

    /// Appends a task result.
    fn insert_task_result(&mut self, result: &TaskResultRecord) -> StoreResult<()>;

    /// Loads a window of one task's result history.
    ///
    /// Results with equal `result_time` are ordered by insertion.
    fn load_task_results(
        &mut self,
        task: TaskKey,
        page: ResultPage,
    ) -> StoreResult<Vec<TaskResultRecord>>;

    /// Loads the latest result of each listed task that has one.
    fn load_latest_task_results(&mut self, tasks: &[TaskKey])
    -> StoreResult<Vec<TaskResultRecord>>;

    /// Inserts or replaces a third-party credential.
    fn put_credential(&mut self, credential: &ThirdPartyCredentialRecord) -> StoreResult<()>;

    /// Removes a third-party credential.
    fn remove_credential(&mut self, username: &str, key: &str) -> StoreResult<()>;

    /// Loads every credential of a user.
    fn load_credentials(&mut self, username: &str) -> StoreResult<Vec<ThirdPartyCredentialRecord>>;

    /// Releases entities cached by the session between load batches.
    fn clear(&mut self) {}
}

/// Factory of sessions.
pub trait RecordStore: Send + Sync {
    /// Runs `work` in a new session.
    ///
    /// A [`SessionMode::ReadWrite`] session commits when `work` succeeds and
    /// rolls back when it fails.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `work`, or a [`StoreError`] when the
    /// session cannot be opened or committed.
    fn with_session<T, E, F>(&self, mode: SessionMode, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreSession) -> Result<T, E>,
        E: From<StoreError>;
}
