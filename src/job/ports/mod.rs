//! Port contracts for the record store and remote task launchers.

pub mod launcher;
pub mod store;

pub use launcher::{LauncherError, TaskLauncherHandle, TaskLauncherResolver};
pub use store::{
    JobQuery, JobScope, JobSort, JobSortField, JobTable, RecordStore, ResultOrder, ResultPage,
    SessionMode, StoreError, StoreResult, StoreSession, TaskDetail, TaskQuery,
};
