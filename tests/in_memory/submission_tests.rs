//! Submission round trips, aggregate counters and graph ordering.

use crate::in_memory::helpers::{Manager, chain_job, manager, script_task};
use jobvault::job::domain::{
    InternalJob, InternalTask, JobPriority, JobStatus, JobVariable, TaskResult, TaskStatus,
};
use jobvault::topology;
use rstest::rstest;

/// Tests that a submitted job reloads with every task unchanged.
#[rstest]
fn submitted_jobs_reload_unchanged(manager: Manager) -> eyre::Result<()> {
    let mut job = InternalJob::new("etl", "alice")
        .with_description("nightly extract")
        .with_priority(JobPriority::High)
        .with_generic_information("queue", "batch")
        .with_variable(JobVariable {
            name: String::from("date"),
            value: String::from("2026-10-01"),
            model: None,
        })
        .with_initial_content("<job name='etl'/>");
    let extract = job.add_task(script_task("extract").with_tag("io"));
    let transform = job.add_task(script_task("transform"));
    let load = job.add_task(script_task("load").with_precious(true, true));
    job.add_dependency(transform, extract)?;
    job.add_dependency(load, transform)?;

    let id = manager.submit_job(&mut job)?;
    let loaded = manager
        .load_job_with_tasks_if_not_removed(id)?
        .ok_or_else(|| eyre::eyre!("job {id} should be stored"))?;

    assert_eq!(loaded.name(), "etl");
    assert_eq!(loaded.description(), Some("nightly extract"));
    assert_eq!(loaded.priority(), JobPriority::High);
    assert_eq!(loaded.status(), JobStatus::Pending);
    assert_eq!(loaded.generic_information(), job.generic_information());
    assert_eq!(loaded.variables(), job.variables());
    assert_eq!(
        loaded.tasks().collect::<Vec<_>>(),
        job.tasks().collect::<Vec<_>>()
    );
    assert_eq!(manager.load_initial_job_content(id)?, "<job name='etl'/>");
    Ok(())
}

/// Tests that stored counters stay consistent across a full lifecycle.
#[rstest]
fn stored_counters_stay_consistent(manager: Manager) -> eyre::Result<()> {
    let (mut job, ids) = chain_job::<4>("lifecycle")?;
    let id = manager.submit_job(&mut job)?;
    let mut now = 1_000;

    for (step, task) in ids.into_iter().enumerate() {
        job.start_task(task, "node-1", now)?;
        manager.job_task_started(&job, task)?;
        now += 10;
        let outcome = if step == 1 {
            TaskStatus::Faulty
        } else {
            TaskStatus::Finished
        };
        job.finish_task(task, outcome, now)?;
        manager.update_after_task_finished(&job, task, &TaskResult::success(vec![1], now))?;

        let stored = manager
            .load_jobs(false, &[id])?
            .pop()
            .ok_or_else(|| eyre::eyre!("job {id} should be stored"))?;
        let counters = stored.counters();
        assert!(counters.is_consistent(), "inconsistent counters {counters:?}");
        assert_eq!(counters.finished, u32::try_from(step + 1)?);
    }

    let stored = manager
        .load_jobs(false, &[id])?
        .pop()
        .ok_or_else(|| eyre::eyre!("job {id} should be stored"))?;
    assert_eq!(stored.status(), JobStatus::Finished);
    assert_eq!(stored.counters().faulty, 1);
    Ok(())
}

/// Tests that sorting a job's tasks places every task after its predecessors.
#[rstest]
fn task_graphs_sort_parents_first() -> eyre::Result<()> {
    let mut job = InternalJob::new("diamond", "bob");
    let top = job.add_task(script_task("top"));
    let left = job.add_task(script_task("left"));
    let right = job.add_task(script_task("right"));
    let bottom = job.add_task(script_task("bottom"));
    job.add_dependency(left, top)?;
    job.add_dependency(right, top)?;
    job.add_dependency(bottom, left)?;
    job.add_dependency(bottom, right)?;
    let mut tasks: Vec<InternalTask> = job.tasks().cloned().collect();
    tasks.reverse();

    let ordered = topology::sort(&tasks)?;

    let position = |id| ordered.iter().position(|task| task.id() == id);
    assert_eq!(ordered.len(), 4);
    for task in &tasks {
        for predecessor in task.dependencies() {
            assert!(
                position(*predecessor) < position(task.id()),
                "{predecessor} must precede {}",
                task.id()
            );
        }
    }
    Ok(())
}

/// Tests that cyclic graphs are rejected at submission.
#[rstest]
fn cyclic_graphs_are_not_submitted(manager: Manager) -> eyre::Result<()> {
    let (mut job, [first, _, last]) = chain_job::<3>("loop")?;
    job.add_dependency(first, last)?;

    assert!(manager.submit_job(&mut job).is_err());
    assert_eq!(manager.job_counts()?.total(), 0);
    Ok(())
}

/// Tests that loads spanning several batches return every job once.
#[rstest]
fn loads_span_batch_boundaries(manager: Manager) -> eyre::Result<()> {
    let manager = manager.with_batch_size(100);
    let mut ids = Vec::with_capacity(250);
    for index in 0..250 {
        let mut job = InternalJob::new(format!("bulk-{index}"), "carol");
        job.add_task(script_task("only"));
        ids.push(manager.submit_job(&mut job)?);
    }

    let loaded = manager.load_jobs(false, &ids)?;

    let mut loaded_ids: Vec<_> = loaded.iter().filter_map(InternalJob::id).collect();
    loaded_ids.sort();
    assert_eq!(loaded_ids, ids);
    assert!(loaded.iter().all(|job| job.tasks().count() == 1));
    Ok(())
}
