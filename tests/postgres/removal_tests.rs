//! Soft and hard removal against `PostgreSQL`.

use crate::postgres::helpers::{TestDatabase, chain_job, database, script_task};
use jobvault::job::domain::{InternalJob, JobVariable, TaskKey, TaskResult};
use jobvault::job::ports::JobQuery;
use jobvault::job::services::HousekeepingPolicy;
use rstest::rstest;

/// Tests that soft removal marks a job once and leaves later calls inert.
#[rstest]
fn soft_removal_marks_jobs_once(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let manager = db.manager();
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

/// Tests that hard removal clears dependent rows before the job row.
///
/// Every child table references its parent with a foreign key, so a
/// deletion in the wrong order fails the whole transaction.
#[rstest]
fn hard_removal_erases_every_dependent_row(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let manager = db.manager();
    let (mut spared, [spared_task]) = chain_job::<1>("spared")?;
    let (chained, [first, second, third]) = chain_job::<3>("erased")?;
    let mut erased = chained.with_variable(JobVariable {
        name: String::from("region"),
        value: String::from("eu"),
        model: None,
    });
    let spared_id = manager.submit_job(&mut spared)?;
    let erased_id = manager.submit_job(&mut erased)?;
    for (task, time) in [(first, 10), (second, 20), (third, 30), (third, 40)] {
        manager.save_task_result(TaskKey::new(erased_id, task), &TaskResult::success(vec![1], time))?;
    }
    manager.save_task_result(
        TaskKey::new(spared_id, spared_task),
        &TaskResult::success(vec![2], 50),
    )?;

    assert_eq!(manager.remove_job(&[erased_id], 60, true)?, 1);

    assert!(manager.load_jobs(true, &[erased_id])?.is_empty());
    assert!(manager.load_initial_job_content(erased_id).is_err());
    assert!(
        manager
            .load_last_task_result(TaskKey::new(erased_id, third))?
            .is_none()
    );
    let survivor = manager
        .load_job_with_tasks_if_not_removed(spared_id)?
        .ok_or_else(|| eyre::eyre!("job {spared_id} should remain"))?;
    assert_eq!(survivor.tasks().count(), 1);
    assert_eq!(manager.load_initial_job_content(spared_id)?, "<job name='spared'/>");
    assert_eq!(
        manager
            .load_last_task_result(TaskKey::new(spared_id, spared_task))?
            .map(|result| result.result_time),
        Some(50)
    );
    Ok(())
}

/// Tests that repeated soft housekeeping decrements a parent only once per
/// removed child.
#[rstest]
fn repeated_soft_housekeeping_decrements_parents_once(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let manager = db.manager().with_housekeeping_policy(HousekeepingPolicy {
        remove_from_db: false,
        batch_size: 100,
    });
    let (mut parent, _) = chain_job::<1>("parent")?;
    let parent_id = manager.submit_job(&mut parent)?;
    let mut children = Vec::new();
    for name in ["first-child", "second-child"] {
        let mut child = InternalJob::new(name, "alice").with_parent(parent_id);
        child.add_task(script_task(name));
        children.push(manager.submit_job(&mut child)?);
    }
    let &[first_child, second_child] = children.as_slice() else {
        return Err(eyre::eyre!("expected two children"));
    };

    let first = manager.execute_housekeeping(&[first_child])?;
    let second = manager.execute_housekeeping(&[first_child, first_child])?;

    assert_eq!((first, second), (1, 0));
    let reloaded = manager
        .load_job_with_tasks_if_not_removed(parent_id)?
        .ok_or_else(|| eyre::eyre!("parent {parent_id} should remain"))?;
    assert_eq!(reloaded.children_count(), 1);
    assert!(manager.load_job_with_tasks_if_not_removed(second_child)?.is_some());
    Ok(())
}

/// Tests that hard housekeeping deletes due jobs and updates their parent.
#[rstest]
fn hard_housekeeping_deletes_children_and_updates_parent(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let manager = db.manager().with_housekeeping_policy(HousekeepingPolicy {
        remove_from_db: true,
        batch_size: 100,
    });
    let (mut parent, _) = chain_job::<1>("parent")?;
    let parent_id = manager.submit_job(&mut parent)?;
    let (chained, [task, _]) = chain_job::<2>("child")?;
    let mut child = chained.with_parent(parent_id);
    let child_id = manager.submit_job(&mut child)?;
    manager.save_task_result(TaskKey::new(child_id, task), &TaskResult::success(vec![3], 7))?;

    assert_eq!(manager.execute_housekeeping(&[child_id])?, 1);

    assert!(manager.load_jobs(true, &[child_id])?.is_empty());
    let reloaded = manager
        .load_job_with_tasks_if_not_removed(parent_id)?
        .ok_or_else(|| eyre::eyre!("parent {parent_id} should remain"))?;
    assert_eq!(reloaded.children_count(), 0);
    Ok(())
}
