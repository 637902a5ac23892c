//! Task execution outcomes.

use super::{FlowAction, JobId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of one task execution.
///
/// Value and exception may both be present: an exception can be captured
/// alongside a partial value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Serialized return value.
    pub value: Option<Vec<u8>>,
    /// Serialized exception.
    pub exception: Option<Vec<u8>>,
    /// Captured output logs.
    pub output: Option<String>,
    /// Properties propagated to dependent tasks.
    pub properties: BTreeMap<String, String>,
    /// Variables propagated to dependent tasks.
    pub propagated_variables: BTreeMap<String, Vec<u8>>,
    /// Control-flow decision taken after the task.
    pub flow_action: Option<FlowAction>,
    /// Epoch milliseconds at which the result was produced.
    pub result_time: i64,
}

impl TaskResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(value: Vec<u8>, result_time: i64) -> Self {
        Self {
            value: Some(value),
            result_time,
            ..Self::default()
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(exception: Vec<u8>, result_time: i64) -> Self {
        Self {
            exception: Some(exception),
            result_time,
            ..Self::default()
        }
    }

    /// Attaches captured logs.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Attaches a control-flow decision.
    #[must_use]
    pub fn with_flow_action(mut self, action: FlowAction) -> Self {
        self.flow_action = Some(action);
        self
    }

    /// Returns true when an exception was captured.
    #[must_use]
    pub const fn had_exception(&self) -> bool {
        self.exception.is_some()
    }
}

/// Latest results of every task of a job that produced one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    /// Job the results belong to.
    pub job_id: JobId,
    /// Latest result keyed by task name.
    pub results: BTreeMap<String, TaskResult>,
    /// Names of tasks whose result is flagged precious.
    pub precious: BTreeSet<String>,
}
