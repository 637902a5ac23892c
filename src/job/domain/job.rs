//! Jobs and their aggregate task counters.

use super::{
    ExecutionTracker, InternalTask, JobError, JobId, JobPriority, JobStatus, OnTaskError, TaskId,
    TaskStatus, UNSET_TIME,
};
use crate::topology;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Job-level variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobVariable {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
    /// Optional type model used for validation.
    pub model: Option<String>,
}

/// Data-space locations used by a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSpaces {
    /// Input space URL.
    pub input: Option<String>,
    /// Output space URL.
    pub output: Option<String>,
    /// Global space URL.
    pub global: Option<String>,
    /// User space URL.
    pub user: Option<String>,
}

/// Aggregate task counters of a job.
///
/// `pending + running + finished <= total` holds after every mutation made
/// through [`InternalJob`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounters {
    /// Number of tasks in the job.
    pub total: u32,
    /// Tasks waiting to run, paused tasks included.
    pub pending: u32,
    /// Tasks executing.
    pub running: u32,
    /// Tasks that completed, successfully or not.
    pub finished: u32,
    /// Completed tasks that failed.
    pub failed: u32,
    /// Completed tasks with an error result.
    pub faulty: u32,
    /// Tasks paused on error.
    pub in_error: u32,
}

impl TaskCounters {
    /// Returns true when the aggregate invariant holds.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let accounted =
            u64::from(self.pending) + u64::from(self.running) + u64::from(self.finished);
        accounted <= u64::from(self.total)
    }
}

/// A submitted job and its task arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalJob {
    pub(crate) id: Option<JobId>,
    pub(crate) name: String,
    pub(crate) owner: String,
    pub(crate) description: Option<String>,
    pub(crate) project_name: Option<String>,
    pub(crate) priority: JobPriority,
    pub(crate) status: JobStatus,
    pub(crate) submitted_time: i64,
    pub(crate) start_time: i64,
    pub(crate) in_error_time: i64,
    pub(crate) finished_time: i64,
    pub(crate) removed_time: i64,
    pub(crate) scheduled_time_for_removal: i64,
    pub(crate) last_updated_time: i64,
    pub(crate) counters: TaskCounters,
    pub(crate) max_number_of_execution: u32,
    pub(crate) on_task_error: OnTaskError,
    pub(crate) data_spaces: DataSpaces,
    pub(crate) generic_information: BTreeMap<String, String>,
    pub(crate) variables: BTreeMap<String, JobVariable>,
    pub(crate) result_map: BTreeMap<String, String>,
    pub(crate) to_be_removed: bool,
    pub(crate) parent_id: Option<JobId>,
    pub(crate) children_count: u32,
    pub(crate) tasks: BTreeMap<TaskId, InternalTask>,
    pub(crate) initial_content: Option<String>,
    pub(crate) tracker: ExecutionTracker,
}

impl InternalJob {
    /// Creates a pending job with no tasks.
    #[must_use]
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            owner: owner.into(),
            description: None,
            project_name: None,
            priority: JobPriority::Normal,
            status: JobStatus::Pending,
            submitted_time: UNSET_TIME,
            start_time: UNSET_TIME,
            in_error_time: UNSET_TIME,
            finished_time: UNSET_TIME,
            removed_time: UNSET_TIME,
            scheduled_time_for_removal: 0,
            last_updated_time: UNSET_TIME,
            counters: TaskCounters::default(),
            max_number_of_execution: 1,
            on_task_error: OnTaskError::NotSet,
            data_spaces: DataSpaces::default(),
            generic_information: BTreeMap::new(),
            variables: BTreeMap::new(),
            result_map: BTreeMap::new(),
            to_be_removed: false,
            parent_id: None,
            children_count: 0,
            tasks: BTreeMap::new(),
            initial_content: None,
            tracker: ExecutionTracker::default(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the project name.
    #[must_use]
    pub fn with_project_name(mut self, project: impl Into<String>) -> Self {
        self.project_name = Some(project.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the job-level error policy.
    #[must_use]
    pub const fn with_on_task_error(mut self, policy: OnTaskError) -> Self {
        self.on_task_error = policy;
        self
    }

    /// Sets the default number of executions per task.
    #[must_use]
    pub const fn with_max_executions(mut self, executions: u32) -> Self {
        self.max_number_of_execution = executions;
        self
    }

    /// Sets data-space locations.
    #[must_use]
    pub fn with_data_spaces(mut self, spaces: DataSpaces) -> Self {
        self.data_spaces = spaces;
        self
    }

    /// Adds a generic information entry.
    #[must_use]
    pub fn with_generic_information(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.generic_information.insert(key.into(), value.into());
        self
    }

    /// Adds a job variable.
    #[must_use]
    pub fn with_variable(mut self, variable: JobVariable) -> Self {
        self.variables.insert(variable.name.clone(), variable);
        self
    }

    /// Declares the parent job of a child workflow.
    #[must_use]
    pub const fn with_parent(mut self, parent: JobId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Keeps the submitted job definition for later retrieval.
    #[must_use]
    pub fn with_initial_content(mut self, content: impl Into<String>) -> Self {
        self.initial_content = Some(content.into());
        self
    }

    /// Adds a task to the arena and returns its job-local identifier.
    pub fn add_task(&mut self, mut task: InternalTask) -> TaskId {
        let id = self.next_task_id();
        task.id = id;
        if task.max_number_of_execution == super::task::DEFAULT_MAX_EXECUTIONS {
            task.max_number_of_execution = self.max_number_of_execution;
            task.number_of_execution_left = self.max_number_of_execution;
        }
        self.counters.total += 1;
        self.counters.pending += 1;
        self.tasks.insert(id, task);
        id
    }

    /// Adds a task generated at runtime by a loop or replicate action.
    pub fn add_generated_task(&mut self, mut task: InternalTask, origin: TaskId) -> TaskId {
        task.replicated_from = Some(origin);
        task.status = TaskStatus::Pending;
        self.add_task(task)
    }

    /// Declares that `task` depends on `on`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::UnknownTask`] when either task is not in the job.
    pub fn add_dependency(&mut self, task: TaskId, on: TaskId) -> Result<(), JobError> {
        self.ensure_task(on)?;
        self.task_entry(task)?.dependencies.insert(on);
        Ok(())
    }

    /// Declares `task` as a branch of the IF task `if_task`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::UnknownTask`] when either task is not in the job.
    pub fn set_if_branch(&mut self, task: TaskId, if_task: TaskId) -> Result<(), JobError> {
        self.ensure_task(if_task)?;
        self.task_entry(task)?.if_branch = Some(if_task);
        Ok(())
    }

    /// Declares `branch` as a branch tail joined by the continuation `task`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::UnknownTask`] when either task is not in the job.
    pub fn add_joined_branch(&mut self, task: TaskId, branch: TaskId) -> Result<(), JobError> {
        self.ensure_task(branch)?;
        self.task_entry(task)?.joined_branches.insert(branch);
        Ok(())
    }

    /// Checks that every edge resolves and the task graph is acyclic.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::UnknownTask`] for a dangling edge and
    /// [`JobError::Cycle`] when the graph is cyclic.
    pub fn validate_graph(&self) -> Result<(), JobError> {
        for task in self.tasks.values() {
            for predecessor in task.all_predecessors() {
                self.ensure_task(predecessor)?;
            }
        }
        let nodes: Vec<InternalTask> = self.tasks.values().cloned().collect();
        topology::sort(&nodes)?;
        Ok(())
    }

    /// Marks a waiting task as running on `host`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::UnknownTask`], [`JobError::JobTerminated`] or
    /// [`JobError::InvalidTaskTransition`] when the task is not waiting.
    pub fn start_task(&mut self, id: TaskId, host: &str, now: i64) -> Result<(), JobError> {
        self.ensure_active()?;
        let task = self.task_entry(id)?;
        if !task.status.is_waiting() {
            return Err(JobError::InvalidTaskTransition {
                task: id,
                from: task.status,
                to: TaskStatus::Running,
            });
        }
        task.status = TaskStatus::Running;
        if task.start_time == UNSET_TIME {
            task.start_time = now;
        }
        task.execution_host_name = Some(host.to_owned());
        self.counters.pending = self.counters.pending.saturating_sub(1);
        self.counters.running += 1;
        if self.status == JobStatus::Pending || self.status == JobStatus::Stalled {
            self.status = JobStatus::Running;
        }
        if self.start_time == UNSET_TIME {
            self.start_time = now;
        }
        Ok(())
    }

    /// Completes a task with one of the completed statuses.
    ///
    /// The job becomes [`JobStatus::Finished`] when its last task completes.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidTaskTransition`] when `outcome` is not a
    /// completed status or the task already completed.
    pub fn finish_task(&mut self, id: TaskId, outcome: TaskStatus, now: i64) -> Result<(), JobError> {
        self.ensure_active()?;
        let task = self.task_entry(id)?;
        if !outcome.is_completed() || task.status.is_completed() {
            return Err(JobError::InvalidTaskTransition {
                task: id,
                from: task.status,
                to: outcome,
            });
        }
        let was_running = task.status == TaskStatus::Running;
        task.status = outcome;
        task.finished_time = now;
        if task.start_time != UNSET_TIME {
            task.execution_duration = now - task.start_time;
        }
        if was_running {
            self.counters.running = self.counters.running.saturating_sub(1);
        } else {
            self.counters.pending = self.counters.pending.saturating_sub(1);
        }
        self.counters.finished += 1;
        match outcome {
            TaskStatus::Failed => self.counters.failed += 1,
            TaskStatus::Faulty => self.counters.faulty += 1,
            _ => {}
        }
        if self.counters.finished >= self.counters.total {
            self.status = JobStatus::Finished;
            self.finished_time = now;
        }
        Ok(())
    }

    /// Puts a running task back in the waiting state after an error.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidTaskTransition`] when the task is not running.
    pub fn restart_task(&mut self, id: TaskId, now: i64) -> Result<(), JobError> {
        self.ensure_active()?;
        let task = self.task_entry(id)?;
        if task.status != TaskStatus::Running {
            return Err(JobError::InvalidTaskTransition {
                task: id,
                from: task.status,
                to: TaskStatus::WaitingOnError,
            });
        }
        task.status = TaskStatus::WaitingOnError;
        task.in_error_time = now;
        task.number_of_execution_left = task.number_of_execution_left.saturating_sub(1);
        self.counters.running = self.counters.running.saturating_sub(1);
        self.counters.pending += 1;
        Ok(())
    }

    /// Pauses the job and every task that has not started.
    pub fn set_paused(&mut self) {
        self.status = JobStatus::Paused;
        for task in self.tasks.values_mut() {
            if matches!(task.status, TaskStatus::Submitted | TaskStatus::Pending) {
                task.status = TaskStatus::Paused;
            }
        }
    }

    /// Resumes a paused job.
    pub fn set_unpaused(&mut self) {
        for task in self.tasks.values_mut() {
            if task.status == TaskStatus::Paused {
                task.status = TaskStatus::Pending;
            }
        }
        self.status = if self.start_time == UNSET_TIME {
            JobStatus::Pending
        } else {
            JobStatus::Running
        };
    }

    /// Kills the job; every task that has not completed is aborted.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::JobTerminated`] when the job already terminated.
    pub fn kill(&mut self, now: i64) -> Result<Vec<TaskId>, JobError> {
        self.ensure_active()?;
        let mut aborted = Vec::new();
        for task in self.tasks.values_mut() {
            if !task.status.is_completed() {
                task.status = TaskStatus::Aborted;
                task.finished_time = now;
                aborted.push(task.id);
            }
        }
        self.counters.finished += self.counters.pending + self.counters.running;
        self.counters.pending = 0;
        self.counters.running = 0;
        self.status = JobStatus::Killed;
        self.finished_time = now;
        Ok(aborted)
    }

    /// Changes the job priority.
    pub const fn set_priority(&mut self, priority: JobPriority) {
        self.priority = priority;
    }

    pub(crate) const fn set_status(&mut self, status: JobStatus) {
        self.status = status;
    }

    pub(crate) const fn set_id(&mut self, id: JobId) {
        self.id = Some(id);
    }

    /// Demotes every running task to pending; counters are left untouched.
    pub(crate) fn demote_running_tasks(&mut self) {
        for task in self.tasks.values_mut() {
            if task.status == TaskStatus::Running {
                task.status = TaskStatus::Pending;
            }
        }
    }

    /// Folds the running counter into the pending counter.
    pub(crate) const fn fold_running_into_pending(&mut self) {
        self.counters.pending += self.counters.running;
        self.counters.running = 0;
    }

    /// Returns the store-assigned identifier, absent before submission.
    #[must_use]
    pub const fn id(&self) -> Option<JobId> {
        self.id
    }

    /// Returns the identifier or fails for unsubmitted jobs.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotSubmitted`] before submission.
    pub fn submitted_id(&self) -> Result<JobId, JobError> {
        self.id.ok_or(JobError::NotSubmitted)
    }

    /// Returns the job name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the submitting user.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the project name.
    #[must_use]
    pub fn project_name(&self) -> Option<&str> {
        self.project_name.as_deref()
    }

    /// Returns the priority.
    #[must_use]
    pub const fn priority(&self) -> JobPriority {
        self.priority
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> JobStatus {
        self.status
    }

    /// Returns the submission time.
    #[must_use]
    pub const fn submitted_time(&self) -> i64 {
        self.submitted_time
    }

    /// Returns the start time, or `-1`.
    #[must_use]
    pub const fn start_time(&self) -> i64 {
        self.start_time
    }

    /// Returns the finish time, or `-1`.
    #[must_use]
    pub const fn finished_time(&self) -> i64 {
        self.finished_time
    }

    /// Returns the removal time, or `-1` while the job is active.
    #[must_use]
    pub const fn removed_time(&self) -> i64 {
        self.removed_time
    }

    /// Returns the aggregate task counters.
    #[must_use]
    pub const fn counters(&self) -> TaskCounters {
        self.counters
    }

    /// Returns the default number of executions per task.
    #[must_use]
    pub const fn max_number_of_execution(&self) -> u32 {
        self.max_number_of_execution
    }

    /// Returns the job-level error policy.
    #[must_use]
    pub const fn on_task_error(&self) -> OnTaskError {
        self.on_task_error
    }

    /// Returns data-space locations.
    #[must_use]
    pub const fn data_spaces(&self) -> &DataSpaces {
        &self.data_spaces
    }

    /// Returns the generic information map.
    #[must_use]
    pub const fn generic_information(&self) -> &BTreeMap<String, String> {
        &self.generic_information
    }

    /// Returns job variables keyed by name.
    #[must_use]
    pub const fn variables(&self) -> &BTreeMap<String, JobVariable> {
        &self.variables
    }

    /// Returns values exported by tasks into the job result.
    #[must_use]
    pub const fn result_map(&self) -> &BTreeMap<String, String> {
        &self.result_map
    }

    /// Records a value in the job result map.
    pub fn put_result(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.result_map.insert(key.into(), value.into());
    }

    /// Returns whether the job is flagged for removal.
    #[must_use]
    pub const fn is_to_be_removed(&self) -> bool {
        self.to_be_removed
    }

    /// Returns the parent job of a child workflow.
    #[must_use]
    pub const fn parent_id(&self) -> Option<JobId> {
        self.parent_id
    }

    /// Returns the number of child jobs still referencing this job.
    #[must_use]
    pub const fn children_count(&self) -> u32 {
        self.children_count
    }

    /// Returns the submitted job definition, when kept.
    #[must_use]
    pub fn initial_content(&self) -> Option<&str> {
        self.initial_content.as_deref()
    }

    /// Returns a task by identifier.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&InternalTask> {
        self.tasks.get(&id)
    }

    /// Returns a task by name.
    #[must_use]
    pub fn task_by_name(&self, name: &str) -> Option<&InternalTask> {
        self.tasks.values().find(|task| task.name == name)
    }

    /// Iterates over tasks in identifier order.
    pub fn tasks(&self) -> impl Iterator<Item = &InternalTask> {
        self.tasks.values()
    }

    pub(crate) fn task_entry(&mut self, id: TaskId) -> Result<&mut InternalTask, JobError> {
        self.tasks.get_mut(&id).ok_or(JobError::UnknownTask(id))
    }

    fn ensure_task(&self, id: TaskId) -> Result<(), JobError> {
        if self.tasks.contains_key(&id) {
            Ok(())
        } else {
            Err(JobError::UnknownTask(id))
        }
    }

    const fn ensure_active(&self) -> Result<(), JobError> {
        if self.status.is_terminal() {
            Err(JobError::JobTerminated(self.status))
        } else {
            Ok(())
        }
    }

    fn next_task_id(&self) -> TaskId {
        self.tasks
            .keys()
            .next_back()
            .map_or(TaskId::new(0), |last| TaskId::new(last.into_inner() + 1))
    }
}
