//! Result history ordering and job removal.

use crate::in_memory::helpers::{Manager, chain_job, manager};
use jobvault::job::domain::{JobId, TaskKey, TaskResult};
use jobvault::job::ports::JobQuery;
use rstest::rstest;

/// Tests that results are indexed by recency, not by insertion order.
#[rstest]
fn result_history_follows_result_time(manager: Manager) -> eyre::Result<()> {
    let (mut job, [task]) = chain_job::<1>("history")?;
    let id = manager.submit_job(&mut job)?;
    let key = TaskKey::new(id, task);
    for time in [100, 200, 150] {
        manager.save_task_result(key, &TaskResult::success(time.to_string().into_bytes(), time))?;
    }

    let last = manager.load_last_task_result(key)?;
    let previous = manager.load_task_result(key, 1)?;
    let oldest = manager.load_task_result_by_name(id, "history-t0", 2)?;

    assert_eq!(last.map(|result| result.result_time), Some(200));
    assert_eq!(previous.map(|result| result.result_time), Some(150));
    assert_eq!(oldest.map(|result| result.result_time), Some(100));
    let latest = manager.load_tasks_results(id, &[task])?;
    assert_eq!(
        latest.get(&task).and_then(|result| result.value.clone()),
        Some(b"200".to_vec())
    );
    Ok(())
}

/// Tests that soft removal marks a job once and leaves later calls inert.
#[rstest]
fn soft_removal_marks_jobs_once(manager: Manager) -> eyre::Result<()> {
    let (mut kept, _) = chain_job::<1>("kept")?;
    let (mut removed, _) = chain_job::<2>("removed")?;
    let kept_id = manager.submit_job(&mut kept)?;
    let removed_id = manager.submit_job(&mut removed)?;

    assert_eq!(manager.remove_job(&[removed_id], 1_000, false)?, 1);
    assert_eq!(manager.remove_job(&[removed_id], 2_000, false)?, 0);

    assert!(manager.load_job_with_tasks_if_not_removed(removed_id)?.is_none());
    let stored = manager.load_jobs(false, &[removed_id])?;
    assert_eq!(stored.first().map(|job| job.removed_time()), Some(1_000));
    let listed = manager.get_jobs(&JobQuery::default())?;
    assert_eq!(
        listed.items.iter().map(|info| info.id).collect::<Vec<_>>(),
        vec![kept_id]
    );
    Ok(())
}

/// Tests that hard removal leaves nothing behind.
#[rstest]
fn hard_removal_erases_jobs(manager: Manager) -> eyre::Result<()> {
    let (mut job, [task]) = chain_job::<1>("erased")?;
    let id = manager.submit_job(&mut job)?;
    manager.save_task_result(TaskKey::new(id, task), &TaskResult::success(vec![1], 5))?;

    assert_eq!(manager.remove_job(&[id, JobId::new(999)], 10, true)?, 1);

    assert!(manager.load_jobs(true, &[id])?.is_empty());
    assert!(manager.load_last_task_result(TaskKey::new(id, task))?.is_none());
    assert!(manager.load_initial_job_content(id).is_err());
    Ok(())
}
