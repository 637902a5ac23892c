//! Periodic purge of jobs whose scheduled removal time has passed.

use crate::job::domain::JobId;
use crate::job::ports::RecordStore;
use crate::job::services::{DatabaseManagerError, SchedulerStateManager};
use mockable::Clock;
use std::sync::Arc;
use tracing::{info, warn};

/// How housekeeping purges jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HousekeepingPolicy {
    /// Delete rows instead of marking jobs removed.
    pub remove_from_db: bool,
    /// Jobs purged per transaction.
    pub batch_size: usize,
}

impl Default for HousekeepingPolicy {
    fn default() -> Self {
        Self {
            remove_from_db: false,
            batch_size: 100,
        }
    }
}

/// Outcome of one housekeeping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    /// Jobs whose removal time had passed.
    pub due: usize,
    /// Jobs removed or marked removed.
    pub purged: usize,
    /// Batches rolled back after a store failure.
    pub failed_batches: usize,
}

/// Housekeeping service.
pub struct Housekeeper<S, C>
where
    S: RecordStore,
    C: Clock + Send + Sync,
{
    manager: Arc<SchedulerStateManager<S, C>>,
    clock: Arc<C>,
}

impl<S, C> Housekeeper<S, C>
where
    S: RecordStore,
    C: Clock + Send + Sync,
{
    /// Creates a housekeeper over `manager`.
    #[must_use]
    pub const fn new(manager: Arc<SchedulerStateManager<S, C>>, clock: Arc<C>) -> Self {
        Self { manager, clock }
    }

    /// Purges every job due for removal, one batch per transaction.
    ///
    /// A failing batch is logged and skipped; the remaining batches still run.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseManagerError`] when the due jobs cannot be listed.
    pub fn run_once(&self) -> Result<HousekeepingReport, DatabaseManagerError> {
        let now = self.clock.utc().timestamp_millis();
        let due: Vec<JobId> = self.manager.jobs_to_remove(now)?.into_keys().collect();
        let mut report = HousekeepingReport {
            due: due.len(),
            ..HousekeepingReport::default()
        };
        let batch_size = self.manager.housekeeping_policy().batch_size.max(1);
        for batch in due.chunks(batch_size) {
            match self.manager.execute_housekeeping(batch) {
                Ok(purged) => report.purged += purged,
                Err(err) => {
                    warn!(error = %err, jobs = batch.len(), "housekeeping batch failed");
                    report.failed_batches += 1;
                }
            }
        }
        if report.due > 0 {
            info!(
                due = report.due,
                purged = report.purged,
                failed_batches = report.failed_batches,
                "housekeeping pass complete"
            );
        }
        Ok(report)
    }
}
