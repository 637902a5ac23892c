//! Domain model for jobs, tasks and their execution graph.

mod error;
mod ids;
mod info;
mod job;
mod payload;
mod replay;
mod result;
mod script;
mod status;
mod task;

pub use error::{JobError, ParseEnumError};
pub use ids::{JobId, TaskId, TaskKey};
pub use info::{JobInfo, Page, TaskInfo};
pub use job::{DataSpaces, InternalJob, JobVariable, TaskCounters};
pub use payload::{
    EnvironmentModifier, ForkEnvironment, JavaExecutable, NativeExecutable, TaskPayload, TaskType,
};
pub use replay::ExecutionTracker;
pub use result::{JobResult, TaskResult};
pub use script::{FlowAction, FlowScript, Script, SelectionScript};
pub use status::{FlowActionType, FlowBlock, JobPriority, JobStatus, OnTaskError, TaskStatus};
pub use task::{
    DEFAULT_EXECUTIONS_ON_FAILURE, DEFAULT_MAX_EXECUTIONS, DataSelector, InternalTask,
    SelectorDirection, TaskVariable,
};

/// Sentinel stored for timestamps that have not been set.
pub const UNSET_TIME: i64 = -1;
