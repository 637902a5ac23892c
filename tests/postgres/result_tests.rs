//! Result history ordering against `PostgreSQL`.

use crate::postgres::helpers::{TestDatabase, chain_job, database};
use jobvault::job::domain::{TaskKey, TaskResult};
use rstest::rstest;

/// Tests that results are indexed by recency, not by insertion order.
#[rstest]
fn result_history_follows_result_time(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let manager = db.manager();
    let (mut job, [task]) = chain_job::<1>("history")?;
    let id = manager.submit_job(&mut job)?;
    let key = TaskKey::new(id, task);
    for time in [100, 200, 150] {
        manager.save_task_result(key, &TaskResult::success(time.to_string().into_bytes(), time))?;
    }

    let last = manager.load_last_task_result(key)?;
    let previous = manager.load_task_result(key, 1)?;
    let oldest = manager.load_task_result_by_name(id, "history-t0", 2)?;
    let beyond = manager.load_task_result(key, 3)?;

    assert_eq!(last.map(|result| result.result_time), Some(200));
    assert_eq!(previous.map(|result| result.result_time), Some(150));
    assert_eq!(oldest.map(|result| result.result_time), Some(100));
    assert!(beyond.is_none());
    let latest = manager.load_tasks_results(id, &[task])?;
    assert_eq!(
        latest.get(&task).and_then(|result| result.value.clone()),
        Some(b"200".to_vec())
    );
    Ok(())
}
