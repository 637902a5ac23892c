//! Per-test databases and state managers backed by the embedded cluster.

use super::cluster::{BoxError, PostgresCluster, shared_cluster};
use jobvault::job::{
    adapters::postgres::PostgresRecordStore,
    domain::{InternalJob, InternalTask, Script, TaskId, TaskPayload},
    services::{RetryPolicy, SchedulerStateManager},
};
use mockable::DefaultClock;
use rstest::fixture;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// State manager over the `PostgreSQL` store used throughout these tests.
pub type PgManager = SchedulerStateManager<PostgresRecordStore, DefaultClock>;

const TEMPLATE_DATABASE: &str = "jobvault_test_template";
const POOL_SIZE: u32 = 4;

static DATABASE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A database cloned from the migrated template, dropped with the value.
pub struct TestDatabase {
    cluster: PostgresCluster,
    name: String,
    store: Arc<PostgresRecordStore>,
}

impl TestDatabase {
    fn create(cluster: PostgresCluster) -> Result<Self, BoxError> {
        cluster.ensure_template_exists(TEMPLATE_DATABASE, |url| {
            let template = PostgresRecordStore::connect(url, 1)?;
            template.drop_and_create_schema()?;
            Ok(())
        })?;

        let name = format!(
            "jobvault_test_{}_{}",
            std::process::id(),
            DATABASE_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        cluster.create_database_from_template(&name, TEMPLATE_DATABASE)?;
        let store = match PostgresRecordStore::connect(&cluster.database_url(&name), POOL_SIZE) {
            Ok(store) => Arc::new(store),
            Err(err) => {
                cluster.drop_database(&name)?;
                return Err(err.into());
            }
        };
        Ok(Self {
            cluster,
            name,
            store,
        })
    }

    /// The store connected to this database.
    #[must_use]
    pub fn store(&self) -> Arc<PostgresRecordStore> {
        Arc::clone(&self.store)
    }

    /// A state manager over this database that retries without sleeping.
    #[must_use]
    pub fn manager(&self) -> PgManager {
        SchedulerStateManager::new(self.store(), Arc::new(DefaultClock)).with_retry_policy(
            RetryPolicy {
                max_retries: 5,
                initial_backoff: Duration::ZERO,
            },
        )
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        drop(self.cluster.drop_database(&self.name));
    }
}

/// Provides a fresh database, or `None` when no cluster could be started.
///
/// Clusters need the `PostgreSQL` binaries, which are downloaded on first
/// use. Where that is impossible the tests return early after noting why.
#[fixture]
pub fn database() -> eyre::Result<Option<TestDatabase>> {
    let cluster = match shared_cluster() {
        Ok(cluster) => cluster,
        Err(reason) => {
            note_skipped(reason);
            return Ok(None);
        }
    };
    TestDatabase::create(cluster)
        .map(Some)
        .map_err(|err| eyre::eyre!(err))
}

#[expect(
    clippy::print_stderr,
    reason = "skipped cluster tests must say why they passed vacuously"
)]
fn note_skipped(reason: &str) {
    eprintln!("SKIP-TEST-CLUSTER: failed to start PostgreSQL: {reason}");
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
