//! Shared fixtures for in-memory integration tests.

use jobvault::job::{
    adapters::memory::InMemoryRecordStore,
    domain::{InternalJob, InternalTask, Script, TaskId, TaskPayload},
    services::{RetryPolicy, SchedulerStateManager},
};
use mockable::DefaultClock;
use rstest::fixture;
use std::sync::Arc;
use std::time::Duration;

/// State manager over the in-memory store used throughout these tests.
pub type Manager = SchedulerStateManager<InMemoryRecordStore, DefaultClock>;

/// Provides a fresh in-memory store for each test.
#[fixture]
pub fn store() -> Arc<InMemoryRecordStore> {
    Arc::new(InMemoryRecordStore::new())
}

/// Provides a state manager that retries contention without sleeping.
#[fixture]
pub fn manager(store: Arc<InMemoryRecordStore>) -> Manager {
    SchedulerStateManager::new(store, Arc::new(DefaultClock)).with_retry_policy(RetryPolicy {
        max_retries: 5,
        initial_backoff: Duration::ZERO,
    })
}

/// Builds a task running a one-line Python script.
pub fn script_task(name: &str) -> InternalTask {
    InternalTask::new(
        name,
        TaskPayload::Script(Script::new(format!("print('{name}')"), "python")),
    )
}

/// Builds a job of `N` tasks where each task depends on the previous one.
///
/// # Errors
///
/// Returns an error if a dependency cannot be declared.
pub fn chain_job<const N: usize>(name: &str) -> eyre::Result<(InternalJob, [TaskId; N])> {
    let mut job =
        InternalJob::new(name, "alice").with_initial_content(format!("<job name='{name}'/>"));
    let mut ids = [TaskId::new(0); N];
    let mut previous = None;
    for (index, slot) in ids.iter_mut().enumerate() {
        let id = job.add_task(script_task(&format!("{name}-t{index}")));
        if let Some(predecessor) = previous {
            job.add_dependency(id, predecessor)?;
        }
        previous = Some(id);
        *slot = id;
    }
    Ok((job, ids))
}
