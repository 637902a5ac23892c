//! Task nodes of the in-memory execution graph.
//!
//! Tasks live in an arena owned by their job. Every edge (dependency,
//! if-branch, joined branch) is a [`TaskId`] into that arena, never a
//! reference, so the graph holds no ownership cycles.

use super::{
    FlowBlock, FlowScript, OnTaskError, ParseEnumError, Script, SelectionScript, TaskId,
    TaskPayload, TaskStatus, UNSET_TIME,
};
use crate::topology::TopologicalNode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Direction of a data-space file selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectorDirection {
    /// Files transferred to the node before execution.
    Input,
    /// Files transferred back after execution.
    Output,
}

impl SelectorDirection {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "INPUT",
            Self::Output => "OUTPUT",
        }
    }
}

impl TryFrom<&str> for SelectorDirection {
    type Error = ParseEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "INPUT" => Ok(Self::Input),
            "OUTPUT" => Ok(Self::Output),
            _ => Err(ParseEnumError::new("selector direction", value)),
        }
    }
}

/// File selector over a data space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSelector {
    /// Transfer direction.
    pub direction: SelectorDirection,
    /// Included glob patterns.
    pub includes: Vec<String>,
    /// Excluded glob patterns.
    pub excludes: Vec<String>,
    /// Access mode naming the source or destination space.
    pub mode: String,
}

/// Variable visible to a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskVariable {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
    /// Optional type model used for validation.
    pub model: Option<String>,
    /// Whether the value is inherited from the job.
    pub job_inherited: bool,
}

/// A schedulable unit of execution within a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalTask {
    pub(crate) id: TaskId,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) tag: Option<String>,
    pub(crate) status: TaskStatus,
    pub(crate) start_time: i64,
    pub(crate) finished_time: i64,
    pub(crate) scheduled_time: i64,
    pub(crate) in_error_time: i64,
    pub(crate) execution_duration: i64,
    pub(crate) execution_host_name: Option<String>,
    pub(crate) max_number_of_execution: u32,
    pub(crate) number_of_execution_left: u32,
    pub(crate) number_of_execution_on_failure_left: u32,
    pub(crate) on_task_error: OnTaskError,
    pub(crate) precious_result: bool,
    pub(crate) precious_logs: bool,
    pub(crate) run_as_me: bool,
    pub(crate) wall_time: i64,
    pub(crate) iteration: u32,
    pub(crate) replication: u32,
    pub(crate) matching_block: Option<String>,
    pub(crate) flow_block: FlowBlock,
    pub(crate) generic_information: BTreeMap<String, String>,
    pub(crate) variables: BTreeMap<String, TaskVariable>,
    pub(crate) dependencies: BTreeSet<TaskId>,
    pub(crate) if_branch: Option<TaskId>,
    pub(crate) joined_branches: BTreeSet<TaskId>,
    pub(crate) pre_script: Option<Script>,
    pub(crate) post_script: Option<Script>,
    pub(crate) clean_script: Option<Script>,
    pub(crate) flow_script: Option<FlowScript>,
    pub(crate) selection_scripts: Vec<SelectionScript>,
    pub(crate) selectors: Vec<DataSelector>,
    pub(crate) payload: Option<TaskPayload>,
    pub(crate) task_launcher_node_url: Option<String>,
    pub(crate) replicated_from: Option<TaskId>,
}

/// Default number of executions granted to a task.
pub const DEFAULT_MAX_EXECUTIONS: u32 = 1;
/// Default number of re-executions after a node failure.
pub const DEFAULT_EXECUTIONS_ON_FAILURE: u32 = 2;

impl InternalTask {
    /// Creates a submitted task with the given executable payload.
    ///
    /// The identifier is assigned when the task is added to a job.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: TaskPayload) -> Self {
        Self {
            id: TaskId::new(0),
            name: name.into(),
            description: None,
            tag: None,
            status: TaskStatus::Submitted,
            start_time: UNSET_TIME,
            finished_time: UNSET_TIME,
            scheduled_time: UNSET_TIME,
            in_error_time: UNSET_TIME,
            execution_duration: UNSET_TIME,
            execution_host_name: None,
            max_number_of_execution: DEFAULT_MAX_EXECUTIONS,
            number_of_execution_left: DEFAULT_MAX_EXECUTIONS,
            number_of_execution_on_failure_left: DEFAULT_EXECUTIONS_ON_FAILURE,
            on_task_error: OnTaskError::NotSet,
            precious_result: false,
            precious_logs: false,
            run_as_me: false,
            wall_time: 0,
            iteration: 0,
            replication: 0,
            matching_block: None,
            flow_block: FlowBlock::None,
            generic_information: BTreeMap::new(),
            variables: BTreeMap::new(),
            dependencies: BTreeSet::new(),
            if_branch: None,
            joined_branches: BTreeSet::new(),
            pre_script: None,
            post_script: None,
            clean_script: None,
            flow_script: None,
            selection_scripts: Vec::new(),
            selectors: Vec::new(),
            payload: Some(payload),
            task_launcher_node_url: None,
            replicated_from: None,
        }
    }

    /// Sets the task description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the task tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Sets the number of executions allowed before the task fails.
    #[must_use]
    pub const fn with_max_executions(mut self, executions: u32) -> Self {
        self.max_number_of_execution = executions;
        self.number_of_execution_left = executions;
        self
    }

    /// Sets the error policy of this task.
    #[must_use]
    pub const fn with_on_task_error(mut self, policy: OnTaskError) -> Self {
        self.on_task_error = policy;
        self
    }

    /// Marks the result (and optionally logs) as precious.
    #[must_use]
    pub const fn with_precious(mut self, result: bool, logs: bool) -> Self {
        self.precious_result = result;
        self.precious_logs = logs;
        self
    }

    /// Runs the task under the submitting user's identity.
    #[must_use]
    pub const fn with_run_as_me(mut self, run_as_me: bool) -> Self {
        self.run_as_me = run_as_me;
        self
    }

    /// Sets the wall-time limit in milliseconds.
    #[must_use]
    pub const fn with_wall_time(mut self, wall_time: i64) -> Self {
        self.wall_time = wall_time;
        self
    }

    /// Sets the control-flow block boundary and its matching task name.
    #[must_use]
    pub fn with_flow_block(mut self, block: FlowBlock, matching: Option<String>) -> Self {
        self.flow_block = block;
        self.matching_block = matching;
        self
    }

    /// Adds a generic information entry.
    #[must_use]
    pub fn with_generic_information(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.generic_information.insert(key.into(), value.into());
        self
    }

    /// Adds a task variable.
    #[must_use]
    pub fn with_variable(mut self, variable: TaskVariable) -> Self {
        self.variables.insert(variable.name.clone(), variable);
        self
    }

    /// Sets the pre-script.
    #[must_use]
    pub fn with_pre_script(mut self, script: Script) -> Self {
        self.pre_script = Some(script);
        self
    }

    /// Sets the post-script.
    #[must_use]
    pub fn with_post_script(mut self, script: Script) -> Self {
        self.post_script = Some(script);
        self
    }

    /// Sets the cleaning script.
    #[must_use]
    pub fn with_clean_script(mut self, script: Script) -> Self {
        self.clean_script = Some(script);
        self
    }

    /// Sets the control-flow script.
    #[must_use]
    pub fn with_flow_script(mut self, script: FlowScript) -> Self {
        self.flow_script = Some(script);
        self
    }

    /// Adds a node selection script.
    #[must_use]
    pub fn with_selection_script(mut self, script: SelectionScript) -> Self {
        self.selection_scripts.push(script);
        self
    }

    /// Adds a data-space selector.
    #[must_use]
    pub fn with_selector(mut self, selector: DataSelector) -> Self {
        self.selectors.push(selector);
        self
    }

    /// Returns the job-local identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task name, unique within its job.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the tag.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the start time, or `-1` when never started.
    #[must_use]
    pub const fn start_time(&self) -> i64 {
        self.start_time
    }

    /// Returns the finish time, or `-1` when not finished.
    #[must_use]
    pub const fn finished_time(&self) -> i64 {
        self.finished_time
    }

    /// Returns the host of the last execution.
    #[must_use]
    pub fn execution_host_name(&self) -> Option<&str> {
        self.execution_host_name.as_deref()
    }

    /// Returns the configured number of executions.
    #[must_use]
    pub const fn max_number_of_execution(&self) -> u32 {
        self.max_number_of_execution
    }

    /// Returns the executions left before the task fails.
    #[must_use]
    pub const fn number_of_execution_left(&self) -> u32 {
        self.number_of_execution_left
    }

    /// Returns the re-executions left after node failures.
    #[must_use]
    pub const fn number_of_execution_on_failure_left(&self) -> u32 {
        self.number_of_execution_on_failure_left
    }

    /// Returns the error policy.
    #[must_use]
    pub const fn on_task_error(&self) -> OnTaskError {
        self.on_task_error
    }

    /// Returns the loop iteration index.
    #[must_use]
    pub const fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Returns the replication index.
    #[must_use]
    pub const fn replication(&self) -> u32 {
        self.replication
    }

    /// Returns the control-flow block boundary.
    #[must_use]
    pub const fn flow_block(&self) -> FlowBlock {
        self.flow_block
    }

    /// Returns the generic information map.
    #[must_use]
    pub const fn generic_information(&self) -> &BTreeMap<String, String> {
        &self.generic_information
    }

    /// Returns task variables keyed by name.
    #[must_use]
    pub const fn variables(&self) -> &BTreeMap<String, TaskVariable> {
        &self.variables
    }

    /// Returns direct dependencies.
    #[must_use]
    pub const fn dependencies(&self) -> &BTreeSet<TaskId> {
        &self.dependencies
    }

    /// Returns the IF task this task is a branch of.
    #[must_use]
    pub const fn if_branch(&self) -> Option<TaskId> {
        self.if_branch
    }

    /// Returns the branch tails joined by this continuation task.
    #[must_use]
    pub const fn joined_branches(&self) -> &BTreeSet<TaskId> {
        &self.joined_branches
    }

    /// Returns the pre-script.
    #[must_use]
    pub const fn pre_script(&self) -> Option<&Script> {
        self.pre_script.as_ref()
    }

    /// Returns the post-script.
    #[must_use]
    pub const fn post_script(&self) -> Option<&Script> {
        self.post_script.as_ref()
    }

    /// Returns the cleaning script.
    #[must_use]
    pub const fn clean_script(&self) -> Option<&Script> {
        self.clean_script.as_ref()
    }

    /// Returns the control-flow script.
    #[must_use]
    pub const fn flow_script(&self) -> Option<&FlowScript> {
        self.flow_script.as_ref()
    }

    /// Returns node selection scripts.
    #[must_use]
    pub fn selection_scripts(&self) -> &[SelectionScript] {
        &self.selection_scripts
    }

    /// Returns data-space selectors.
    #[must_use]
    pub fn selectors(&self) -> &[DataSelector] {
        &self.selectors
    }

    /// Returns the executable payload, absent when loaded without full state.
    #[must_use]
    pub const fn payload(&self) -> Option<&TaskPayload> {
        self.payload.as_ref()
    }

    /// Returns the address of the launcher executing this task.
    #[must_use]
    pub fn task_launcher_node_url(&self) -> Option<&str> {
        self.task_launcher_node_url.as_deref()
    }

    /// Returns the task this one was replicated from, for tasks generated at runtime.
    #[must_use]
    pub const fn replicated_from(&self) -> Option<TaskId> {
        self.replicated_from
    }

    /// Iterates over every predecessor: dependencies, the IF task and joined branches.
    pub fn all_predecessors(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.dependencies
            .iter()
            .copied()
            .chain(self.if_branch)
            .chain(self.joined_branches.iter().copied())
    }
}

impl TopologicalNode for InternalTask {
    type Id = TaskId;

    fn node_id(&self) -> TaskId {
        self.id
    }

    fn predecessors(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.all_predecessors()
    }
}
