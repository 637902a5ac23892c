//! Scheduled purges and parent bookkeeping.

use crate::in_memory::helpers::{Manager, chain_job, manager, script_task};
use jobvault::job::domain::InternalJob;
use jobvault::job::services::{Housekeeper, HousekeepingPolicy};
use mockable::DefaultClock;
use rstest::rstest;
use std::sync::Arc;

/// Tests that due jobs are marked removed in batches and parents updated.
#[rstest]
fn due_jobs_are_purged_in_batches(manager: Manager) -> eyre::Result<()> {
    let (mut parent, _) = chain_job::<1>("parent")?;
    let parent_id = manager.submit_job(&mut parent)?;
    let mut children = Vec::new();
    for index in 0..3 {
        let mut child = InternalJob::new(format!("child-{index}"), "alice").with_parent(parent_id);
        child.add_task(script_task("work"));
        let id = manager.submit_job(&mut child)?;
        manager.schedule_job_for_removal(id, 1)?;
        children.push(id);
    }
    let manager = Arc::new(manager.with_housekeeping_policy(HousekeepingPolicy {
        remove_from_db: false,
        batch_size: 2,
    }));

    let report = Housekeeper::new(Arc::clone(&manager), Arc::new(DefaultClock)).run_once()?;

    assert_eq!((report.due, report.purged, report.failed_batches), (3, 3, 0));
    for child in children {
        assert!(manager.load_job_with_tasks_if_not_removed(child)?.is_none());
    }
    let parent = manager
        .load_job_with_tasks_if_not_removed(parent_id)?
        .ok_or_else(|| eyre::eyre!("parent {parent_id} should remain"))?;
    assert_eq!(parent.children_count(), 0);
    Ok(())
}

/// Tests that a hard-deleting policy erases due jobs and spares the rest.
#[rstest]
fn hard_deleting_policy_erases_rows(manager: Manager) -> eyre::Result<()> {
    let (mut due, _) = chain_job::<2>("due")?;
    let (mut later, _) = chain_job::<1>("later")?;
    let due_id = manager.submit_job(&mut due)?;
    let later_id = manager.submit_job(&mut later)?;
    manager.schedule_job_for_removal(due_id, 1)?;
    manager.schedule_job_for_removal(later_id, i64::MAX)?;
    let manager = Arc::new(manager.with_housekeeping_policy(HousekeepingPolicy {
        remove_from_db: true,
        batch_size: 100,
    }));

    let report = Housekeeper::new(Arc::clone(&manager), Arc::new(DefaultClock)).run_once()?;

    assert_eq!(report.purged, 1);
    assert!(manager.load_jobs(true, &[due_id])?.is_empty());
    assert_eq!(manager.load_jobs(true, &[later_id])?.len(), 1);
    Ok(())
}

/// Tests that a pass with nothing due reports nothing.
#[rstest]
fn idle_passes_report_nothing(manager: Manager) -> eyre::Result<()> {
    let report = Housekeeper::new(Arc::new(manager), Arc::new(DefaultClock)).run_once()?;

    assert_eq!(report, Default::default());
    Ok(())
}
