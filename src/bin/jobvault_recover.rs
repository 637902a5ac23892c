//! Rebuilds scheduler state from the configured record store and reports it.
//!
//! Usage:
//!
//! ```text
//! jobvault-recover [config-path]
//! ```
//!
//! Configuration is read from the optional TOML file and `JOBVAULT_`
//! environment variables. Without a `database_url` the in-memory store is
//! used, which is only useful for smoke-testing the wiring. After recovery a
//! single housekeeping pass purges jobs whose removal time has passed.

use jobvault::config::StateStoreConfig;
use jobvault::job::adapters::memory::InMemoryRecordStore;
use jobvault::job::adapters::postgres::PostgresRecordStore;
use jobvault::job::ports::RecordStore;
use jobvault::job::services::{Housekeeper, RecoveryOrchestrator, SchedulerStateManager};
use mockable::DefaultClock;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), BoxError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = env::args_os().nth(1).map(PathBuf::from);
    let config = StateStoreConfig::load(config_path.as_deref())?;
    let clock = Arc::new(DefaultClock);

    match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresRecordStore::connect(url, config.pool_size)?;
            if config.drop_schema_on_start {
                store.drop_and_create_schema()?;
            }
            recover(Arc::new(store), clock, &config)
        }
        None => {
            info!("no database configured, recovering from an empty in-memory store");
            recover(Arc::new(InMemoryRecordStore::new()), clock, &config)
        }
    }
}

fn recover<S: RecordStore>(
    store: Arc<S>,
    clock: Arc<DefaultClock>,
    config: &StateStoreConfig,
) -> Result<(), BoxError> {
    let manager = Arc::new(SchedulerStateManager::from_config(
        store,
        Arc::clone(&clock),
        config,
    ));
    let recovered =
        RecoveryOrchestrator::new(Arc::clone(&manager)).recover(config.finished_jobs_look_back())?;
    let snapshot = recovered.snapshot();
    for job in snapshot
        .pending
        .iter()
        .chain(&snapshot.running)
        .chain(&snapshot.finished)
    {
        debug!(job_id = %job.id, status = %job.status, owner = %job.owner, "recovered job");
    }
    info!(
        pending = snapshot.pending.len(),
        running = snapshot.running.len(),
        finished = snapshot.finished.len(),
        "recovery complete"
    );

    let report = Housekeeper::new(manager, clock).run_once()?;
    info!(
        due = report.due,
        purged = report.purged,
        failed_batches = report.failed_batches,
        "housekeeping pass complete"
    );
    Ok(())
}
