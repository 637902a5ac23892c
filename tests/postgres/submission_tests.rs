//! Submission round trips and batched loads against `PostgreSQL`.

use crate::postgres::helpers::{TestDatabase, chain_job, database, script_task};
use jobvault::job::domain::{
    DataSelector, InternalJob, JobPriority, JobStatus, JobVariable, SelectorDirection,
    TaskVariable,
};
use rstest::rstest;

/// Tests that a submitted job reloads with every task unchanged.
#[rstest]
fn submitted_jobs_reload_unchanged(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let manager = db.manager();
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
    let extract = job.add_task(
        script_task("extract")
            .with_tag("io")
            .with_variable(TaskVariable {
                name: String::from("threads"),
                value: String::from("4"),
                model: Some(String::from("PA:INTEGER")),
                job_inherited: false,
            })
            .with_selector(DataSelector {
                direction: SelectorDirection::Input,
                includes: vec![String::from("*.csv")],
                excludes: Vec::new(),
                mode: String::from("userspace"),
            }),
    );
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
    assert_eq!(manager.job_counts()?.pending, 1);
    Ok(())
}

/// Tests that loads spanning several `IN` batches return every job once.
#[rstest]
fn loads_span_batch_boundaries(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let manager = db.manager().with_batch_size(100);
    let mut ids = Vec::with_capacity(250);
    for index in 0..250 {
        let mut job = InternalJob::new(format!("bulk-{index}"), "carol");
        job.add_task(script_task("only"));
        ids.push(manager.submit_job(&mut job)?);
    }

    let loaded = manager.load_jobs(true, &ids)?;

    let mut loaded_ids: Vec<_> = loaded.iter().filter_map(InternalJob::id).collect();
    loaded_ids.sort();
    assert_eq!(loaded_ids, ids);
    assert!(loaded.iter().all(|job| job.tasks().count() == 1));
    Ok(())
}

/// Tests that cyclic graphs roll back without leaving rows behind.
#[rstest]
fn cyclic_graphs_are_not_submitted(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let manager = db.manager();
    let (mut job, [first, _, last]) = chain_job::<3>("loop")?;
    job.add_dependency(first, last)?;

    assert!(manager.submit_job(&mut job).is_err());
    assert_eq!(manager.job_counts()?.total(), 0);
    Ok(())
}
