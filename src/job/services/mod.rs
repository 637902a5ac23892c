//! Application services over the record store.

mod error;
mod housekeeping;
mod launcher;
mod recovery;
mod state;
mod transaction;

pub use error::DatabaseManagerError;
pub use housekeeping::{Housekeeper, HousekeepingPolicy, HousekeepingReport};
pub use launcher::LauncherRebinder;
pub use recovery::{
    RecoveredSchedulerState, RecoveryError, RecoveryOrchestrator, RecoverySource,
    SchedulerStateSnapshot,
};
pub use state::{
    ChangedTasks, DEFAULT_LOAD_BATCH_SIZE, EncryptedCredential, JobCounts, SchedulerStateManager,
    StateResult,
};
pub use transaction::{FailureDisposition, RetryPolicy, StoreFailureHandler, TransactionHelper};
