//! Rebuilding control-flow bookkeeping from completed tasks.
//!
//! After a restart the job only knows each task's stored status. Replaying
//! completed tasks parent-before-child restores which tasks were resolved,
//! which IF branch was taken and the current loop iteration, from which the
//! set of dispatchable tasks follows.

use super::{InternalJob, JobError, TaskId, TaskStatus};
use std::collections::{BTreeMap, BTreeSet};

/// Control-flow state observed from task completions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionTracker {
    resolved: BTreeSet<TaskId>,
    skipped: BTreeSet<TaskId>,
    branch_decisions: BTreeMap<TaskId, TaskId>,
    iteration: u32,
}

impl InternalJob {
    /// Replays the completion of a task observed before a restart.
    ///
    /// Completed predecessors must be replayed first.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::UnknownTask`] when the task or any predecessor it
    /// references is missing, [`JobError::NotReplayable`] when the task has
    /// not completed and [`JobError::ReplayOutOfOrder`] when a completed
    /// predecessor has not been replayed yet.
    pub fn recover_task(&mut self, id: TaskId) -> Result<(), JobError> {
        let task = self.tasks.get(&id).ok_or(JobError::UnknownTask(id))?;
        if !task.status.is_completed() {
            return Err(JobError::NotReplayable {
                task: id,
                status: task.status,
            });
        }
        for predecessor_id in task.all_predecessors() {
            let predecessor = self
                .tasks
                .get(&predecessor_id)
                .ok_or(JobError::UnknownTask(predecessor_id))?;
            if predecessor.status.is_completed() && !self.tracker.resolved.contains(&predecessor_id) {
                return Err(JobError::ReplayOutOfOrder {
                    task: id,
                    predecessor: predecessor_id,
                });
            }
        }

        let skipped = task.status == TaskStatus::Skipped;
        let if_task = task.if_branch;
        let iteration = task.iteration;
        self.tracker.resolved.insert(id);
        if skipped {
            self.tracker.skipped.insert(id);
        } else if let Some(if_task) = if_task {
            self.tracker.branch_decisions.insert(if_task, id);
        }
        self.tracker.iteration = self.tracker.iteration.max(iteration);
        Ok(())
    }

    /// Returns waiting tasks whose predecessors have all been resolved.
    #[must_use]
    pub fn eligible_tasks(&self) -> Vec<TaskId> {
        self.tasks
            .values()
            .filter(|task| task.status.is_waiting() || task.status == TaskStatus::Paused)
            .filter(|task| {
                task.all_predecessors()
                    .all(|predecessor| self.tracker.resolved.contains(&predecessor))
            })
            .filter(|task| {
                task.if_branch.is_none_or(|if_task| {
                    self.tracker
                        .branch_decisions
                        .get(&if_task)
                        .is_none_or(|taken| *taken == task.id)
                })
            })
            .map(|task| task.id)
            .collect()
    }

    /// Returns the branch chosen for an IF task, when it can be told.
    ///
    /// A replayed, non-skipped branch head wins; otherwise the single
    /// unskipped branch of a resolved IF task is the one taken.
    #[must_use]
    pub fn branch_taken(&self, if_task: TaskId) -> Option<TaskId> {
        if let Some(taken) = self.tracker.branch_decisions.get(&if_task) {
            return Some(*taken);
        }
        if !self.tracker.resolved.contains(&if_task) {
            return None;
        }
        let mut candidates = self
            .tasks
            .values()
            .filter(|task| task.if_branch == Some(if_task) && task.status != TaskStatus::Skipped);
        let first = candidates.next()?;
        candidates.next().is_none().then_some(first.id)
    }

    /// Returns whether a task has been replayed.
    #[must_use]
    pub fn is_resolved(&self, id: TaskId) -> bool {
        self.tracker.resolved.contains(&id)
    }

    /// Returns whether a replayed task was skipped by a control-flow decision.
    #[must_use]
    pub fn is_skipped(&self, id: TaskId) -> bool {
        self.tracker.skipped.contains(&id)
    }

    /// Returns the highest loop iteration observed during replay.
    #[must_use]
    pub const fn current_iteration(&self) -> u32 {
        self.tracker.iteration
    }
}
