//! Startup recovery through the public API.

use crate::in_memory::helpers::{Manager, chain_job, manager, script_task};
use jobvault::job::domain::{InternalJob, JobId, JobStatus, TaskResult, TaskStatus};
use jobvault::job::services::{DatabaseManagerError, RecoveryOrchestrator, RecoverySource};
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

/// Recovery source that adds jobs the store could not have validated.
struct WithInjectedJobs {
    manager: Manager,
    injected: Vec<InternalJob>,
}

impl RecoverySource for WithInjectedJobs {
    fn load_not_finished_jobs(&self, full: bool) -> Result<Vec<InternalJob>, DatabaseManagerError> {
        let mut jobs = self.manager.load_not_finished_jobs(full)?;
        jobs.extend(self.injected.iter().cloned());
        Ok(jobs)
    }

    fn load_finished_jobs(
        &self,
        full: bool,
        period: Option<Duration>,
    ) -> Result<Vec<InternalJob>, DatabaseManagerError> {
        self.manager.load_finished_jobs(full, period)
    }

    fn update_job_and_tasks_state(&self, job: &InternalJob) -> Result<(), DatabaseManagerError> {
        self.manager.update_job_and_tasks_state(job)
    }
}

/// Submits a job and leaves its first task finished and its second running.
fn start_job(manager: &Manager, name: &str) -> eyre::Result<JobId> {
    let (mut job, [first, second, _]) = chain_job::<3>(name)?;
    let id = manager.submit_job(&mut job)?;
    job.start_task(first, "node-1", 10)?;
    job.finish_task(first, TaskStatus::Finished, 20)?;
    manager.update_after_task_finished(&job, first, &TaskResult::success(vec![1], 20))?;
    job.start_task(second, "node-2", 30)?;
    manager.job_task_started(&job, second)?;
    Ok(id)
}

/// Running job whose completed tasks depend on each other; never submitted,
/// so persisting its cancellation fails as well.
fn tangled_job() -> eyre::Result<InternalJob> {
    let mut job = InternalJob::new("tangled", "mallory");
    let first = job.add_task(script_task("first"));
    let second = job.add_task(script_task("second"));
    job.add_task(script_task("third"));
    job.add_dependency(first, second)?;
    job.add_dependency(second, first)?;
    job.start_task(first, "node-1", 10)?;
    job.finish_task(first, TaskStatus::Finished, 20)?;
    job.finish_task(second, TaskStatus::Finished, 30)?;
    Ok(job)
}

/// Tests that a job whose replay fails does not disturb the others.
#[rstest]
fn broken_replays_are_isolated(manager: Manager) -> eyre::Result<()> {
    let first = start_job(&manager, "a")?;
    let last = start_job(&manager, "c")?;
    let broken = tangled_job()?;
    let source = WithInjectedJobs {
        manager,
        injected: vec![broken],
    };

    let state = RecoveryOrchestrator::new(Arc::new(source)).recover(None)?;

    let running: Vec<JobId> = state.running.iter().filter_map(InternalJob::id).collect();
    assert_eq!(running, vec![first, last]);
    assert!(state.running.iter().all(|job| job.status() == JobStatus::Stalled));
    assert_eq!(state.finished.len(), 1);
    let canceled = state
        .finished
        .first()
        .ok_or_else(|| eyre::eyre!("broken job should be finished"))?;
    assert_eq!(canceled.name(), "tangled");
    assert_eq!(canceled.status(), JobStatus::Canceled);
    Ok(())
}

/// Tests that a paused job that never made progress comes back pending.
#[rstest]
fn idle_paused_jobs_recover_as_pending(manager: Manager) -> eyre::Result<()> {
    let mut idle = InternalJob::new("placeholder", "alice");
    idle.set_paused();
    let idle_id = manager.submit_job(&mut idle)?;
    let started = start_job(&manager, "started")?;

    let state = RecoveryOrchestrator::new(Arc::new(manager)).recover(None)?;

    let recovered = state
        .job(idle_id)
        .ok_or_else(|| eyre::eyre!("job {idle_id} should be recovered"))?;
    assert_eq!(
        state.pending.iter().filter_map(InternalJob::id).collect::<Vec<_>>(),
        vec![idle_id]
    );
    assert_eq!(recovered.status(), JobStatus::Paused);
    let snapshot = state.snapshot();
    assert_eq!(
        snapshot.running.iter().map(|info| info.id).collect::<Vec<_>>(),
        vec![started]
    );
    Ok(())
}
