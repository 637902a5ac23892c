//! Durable task records, edges and per-task child rows.

use super::{RecordError, ScriptKind, ScriptRecord, TaskPayloadRecord, blob};
use crate::job::domain::{
    DataSelector, FlowBlock, InternalTask, JobId, OnTaskError, SelectorDirection, TaskInfo,
    TaskKey, TaskStatus, TaskType, TaskVariable,
};
use std::collections::BTreeMap;

/// Stored task row with its owned children.
///
/// Loads without full detail leave `variables`, `scripts`, `selectors` and
/// `payload` empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    /// Composite identity.
    pub key: TaskKey,
    /// Task name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Tag.
    pub tag: Option<String>,
    /// Status.
    pub status: TaskStatus,
    /// Start time.
    pub start_time: i64,
    /// Finish time.
    pub finished_time: i64,
    /// Scheduled start time.
    pub scheduled_time: i64,
    /// In-error time.
    pub in_error_time: i64,
    /// Duration of the last execution.
    pub execution_duration: i64,
    /// Host of the last execution.
    pub execution_host_name: Option<String>,
    /// Configured executions.
    pub max_number_of_execution: u32,
    /// Executions left.
    pub number_of_execution_left: u32,
    /// Re-executions left after node failures.
    pub number_of_execution_on_failure_left: u32,
    /// Error policy.
    pub on_task_error: OnTaskError,
    /// Result flagged precious.
    pub precious_result: bool,
    /// Logs flagged precious.
    pub precious_logs: bool,
    /// Runs under the submitting user's identity.
    pub run_as_me: bool,
    /// Wall-time limit in milliseconds.
    pub wall_time: i64,
    /// Loop iteration index.
    pub iteration: u32,
    /// Replication index.
    pub replication: u32,
    /// Name of the task closing or opening the matching block.
    pub matching_block: Option<String>,
    /// Block boundary marker.
    pub flow_block: FlowBlock,
    /// Payload discriminator.
    pub task_type: String,
    /// Serialized generic information map.
    pub generic_information: Option<Vec<u8>>,
    /// Address of the launcher executing the task.
    pub task_launcher_node_url: Option<String>,
    /// Control-flow edges.
    pub edges: TaskEdges,
    /// Task variables.
    pub variables: Vec<TaskVariableRecord>,
    /// Owned scripts of every kind.
    pub scripts: Vec<ScriptRecord>,
    /// Data-space selectors.
    pub selectors: Vec<SelectorRecord>,
    /// Type-specific payload row.
    pub payload: Option<TaskPayloadRecord>,
}

/// Edges of one task, written after every task row of the job exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEdges {
    /// Task the edges start from.
    pub task: TaskKey,
    /// Dependencies.
    pub dependencies: Vec<TaskKey>,
    /// IF task this task is a branch of.
    pub if_branch: Option<TaskKey>,
    /// Joined branch tails.
    pub joined_branches: Vec<TaskKey>,
}

impl TaskEdges {
    /// Creates an edge set with no edges.
    #[must_use]
    pub const fn empty(task: TaskKey) -> Self {
        Self {
            task,
            dependencies: Vec::new(),
            if_branch: None,
            joined_branches: Vec::new(),
        }
    }
}

/// Stored task variable row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskVariableRecord {
    /// Variable name.
    pub name: String,
    /// Value.
    pub value: String,
    /// Optional type model.
    pub model: Option<String>,
    /// Inherited from the job.
    pub job_inherited: bool,
}

/// Stored selector row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorRecord {
    /// Transfer direction.
    pub direction: SelectorDirection,
    /// Order among the task's selectors.
    pub position: u32,
    /// Serialized include patterns.
    pub includes: Option<Vec<u8>>,
    /// Serialized exclude patterns.
    pub excludes: Option<Vec<u8>>,
    /// Access mode.
    pub mode: String,
}

/// Mutable task columns written on every state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStateRecord {
    /// Task being updated.
    pub key: TaskKey,
    /// Status.
    pub status: TaskStatus,
    /// Start time.
    pub start_time: i64,
    /// Finish time.
    pub finished_time: i64,
    /// Scheduled time.
    pub scheduled_time: i64,
    /// In-error time.
    pub in_error_time: i64,
    /// Duration of the last execution.
    pub execution_duration: i64,
    /// Host of the last execution.
    pub execution_host_name: Option<String>,
    /// Executions left.
    pub number_of_execution_left: u32,
    /// Re-executions left after node failures.
    pub number_of_execution_on_failure_left: u32,
    /// Loop iteration index.
    pub iteration: u32,
    /// Replication index.
    pub replication: u32,
    /// Launcher address.
    pub task_launcher_node_url: Option<String>,
}

impl TaskRecord {
    /// Builds the full record of a task, edges and payload included.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when a collection cannot be serialized.
    pub fn from_task(job_id: JobId, task: &InternalTask) -> Result<Self, RecordError> {
        let key = TaskKey::new(job_id, task.id);
        let mut scripts = Vec::new();
        if let Some(script) = &task.pre_script {
            scripts.push(ScriptRecord::from_script(ScriptKind::Pre, 0, script)?);
        }
        if let Some(script) = &task.post_script {
            scripts.push(ScriptRecord::from_script(ScriptKind::Post, 0, script)?);
        }
        if let Some(script) = &task.clean_script {
            scripts.push(ScriptRecord::from_script(ScriptKind::Clean, 0, script)?);
        }
        if let Some(flow) = &task.flow_script {
            scripts.push(ScriptRecord::from_flow(flow)?);
        }
        for (position, selection) in (0_u32..).zip(&task.selection_scripts) {
            scripts.push(ScriptRecord::from_selection(position, selection)?);
        }
        let payload = match &task.payload {
            Some(payload) => {
                let (record, owned_scripts) = TaskPayloadRecord::from_payload(payload)?;
                scripts.extend(owned_scripts);
                Some(record)
            }
            None => None,
        };
        let task_type = task
            .payload
            .as_ref()
            .map(|payload| payload.task_type().as_str())
            .ok_or(RecordError::missing("task", "task_type"))?;

        Ok(Self {
            key,
            name: task.name.clone(),
            description: task.description.clone(),
            tag: task.tag.clone(),
            status: task.status,
            start_time: task.start_time,
            finished_time: task.finished_time,
            scheduled_time: task.scheduled_time,
            in_error_time: task.in_error_time,
            execution_duration: task.execution_duration,
            execution_host_name: task.execution_host_name.clone(),
            max_number_of_execution: task.max_number_of_execution,
            number_of_execution_left: task.number_of_execution_left,
            number_of_execution_on_failure_left: task.number_of_execution_on_failure_left,
            on_task_error: task.on_task_error,
            precious_result: task.precious_result,
            precious_logs: task.precious_logs,
            run_as_me: task.run_as_me,
            wall_time: task.wall_time,
            iteration: task.iteration,
            replication: task.replication,
            matching_block: task.matching_block.clone(),
            flow_block: task.flow_block,
            task_type: task_type.to_owned(),
            generic_information: blob::encode_map(
                "generic_information",
                &task.generic_information,
            )?,
            task_launcher_node_url: task.task_launcher_node_url.clone(),
            edges: edges_of(job_id, task),
            variables: task
                .variables
                .values()
                .map(|variable| TaskVariableRecord {
                    name: variable.name.clone(),
                    value: variable.value.clone(),
                    model: variable.model.clone(),
                    job_inherited: variable.job_inherited,
                })
                .collect(),
            scripts,
            selectors: task
                .selectors
                .iter()
                .zip(0_u32..)
                .map(|(selector, position)| selector_record(selector, position))
                .collect::<Result<_, _>>()?,
            payload,
        })
    }

    /// Rebuilds the task; the payload is present only when its row was loaded.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownTaskType`] for an unrecognized
    /// discriminator and other [`RecordError`] values for malformed columns.
    pub fn into_task(self) -> Result<InternalTask, RecordError> {
        let task_type = TaskType::try_from(self.task_type.as_str())
            .map_err(|_| RecordError::UnknownTaskType(self.task_type.clone()))?;
        let script_of = |kind: ScriptKind| {
            self.scripts
                .iter()
                .find(|script| script.kind == kind)
                .map(ScriptRecord::to_script)
                .transpose()
        };
        let pre_script = script_of(ScriptKind::Pre)?;
        let post_script = script_of(ScriptKind::Post)?;
        let clean_script = script_of(ScriptKind::Clean)?;
        let flow_script = self
            .scripts
            .iter()
            .find(|script| script.kind == ScriptKind::Flow)
            .map(ScriptRecord::to_flow_script)
            .transpose()?;
        let mut selection_records: Vec<&ScriptRecord> = self
            .scripts
            .iter()
            .filter(|script| script.kind == ScriptKind::Selection)
            .collect();
        selection_records.sort_by_key(|script| script.position);
        let selection_scripts = selection_records
            .into_iter()
            .map(ScriptRecord::to_selection_script)
            .collect::<Result<Vec<_>, _>>()?;
        let mut selector_records = self.selectors.clone();
        selector_records.sort_by_key(|selector| selector.position);
        let selectors = selector_records
            .iter()
            .map(selector_from_record)
            .collect::<Result<Vec<_>, _>>()?;
        let generic_information =
            blob::decode_map("generic_information", self.generic_information.as_deref())?;
        let variables: BTreeMap<String, TaskVariable> = self
            .variables
            .iter()
            .map(|variable| {
                (
                    variable.name.clone(),
                    TaskVariable {
                        name: variable.name.clone(),
                        value: variable.value.clone(),
                        model: variable.model.clone(),
                        job_inherited: variable.job_inherited,
                    },
                )
            })
            .collect();
        let payload = self
            .payload
            .clone()
            .map(|payload| payload.into_payload(task_type, &self.scripts))
            .transpose()?;

        Ok(InternalTask {
            id: self.key.task_id,
            name: self.name,
            description: self.description,
            tag: self.tag,
            status: self.status,
            start_time: self.start_time,
            finished_time: self.finished_time,
            scheduled_time: self.scheduled_time,
            in_error_time: self.in_error_time,
            execution_duration: self.execution_duration,
            execution_host_name: self.execution_host_name,
            max_number_of_execution: self.max_number_of_execution,
            number_of_execution_left: self.number_of_execution_left,
            number_of_execution_on_failure_left: self.number_of_execution_on_failure_left,
            on_task_error: self.on_task_error,
            precious_result: self.precious_result,
            precious_logs: self.precious_logs,
            run_as_me: self.run_as_me,
            wall_time: self.wall_time,
            iteration: self.iteration,
            replication: self.replication,
            matching_block: self.matching_block,
            flow_block: self.flow_block,
            generic_information,
            variables,
            dependencies: self
                .edges
                .dependencies
                .iter()
                .map(|key| key.task_id)
                .collect(),
            if_branch: self.edges.if_branch.map(|key| key.task_id),
            joined_branches: self
                .edges
                .joined_branches
                .iter()
                .map(|key| key.task_id)
                .collect(),
            pre_script,
            post_script,
            clean_script,
            flow_script,
            selection_scripts,
            selectors,
            payload,
            task_launcher_node_url: self.task_launcher_node_url,
            replicated_from: None,
        })
    }

    /// Returns a listing summary.
    #[must_use]
    pub fn to_info(&self) -> TaskInfo {
        TaskInfo {
            key: self.key,
            name: self.name.clone(),
            tag: self.tag.clone(),
            status: self.status,
            start_time: self.start_time,
            finished_time: self.finished_time,
            execution_duration: self.execution_duration,
            execution_host_name: self.execution_host_name.clone(),
        }
    }
}

impl TaskStateRecord {
    /// Captures the mutable columns of a task.
    #[must_use]
    pub fn from_task(job_id: JobId, task: &InternalTask) -> Self {
        Self {
            key: TaskKey::new(job_id, task.id),
            status: task.status,
            start_time: task.start_time,
            finished_time: task.finished_time,
            scheduled_time: task.scheduled_time,
            in_error_time: task.in_error_time,
            execution_duration: task.execution_duration,
            execution_host_name: task.execution_host_name.clone(),
            number_of_execution_left: task.number_of_execution_left,
            number_of_execution_on_failure_left: task.number_of_execution_on_failure_left,
            iteration: task.iteration,
            replication: task.replication,
            task_launcher_node_url: task.task_launcher_node_url.clone(),
        }
    }
}

/// Builds the edge set of a task.
#[must_use]
pub fn edges_of(job_id: JobId, task: &InternalTask) -> TaskEdges {
    TaskEdges {
        task: TaskKey::new(job_id, task.id),
        dependencies: task
            .dependencies
            .iter()
            .map(|id| TaskKey::new(job_id, *id))
            .collect(),
        if_branch: task.if_branch.map(|id| TaskKey::new(job_id, id)),
        joined_branches: task
            .joined_branches
            .iter()
            .map(|id| TaskKey::new(job_id, *id))
            .collect(),
    }
}

fn selector_record(selector: &DataSelector, position: u32) -> Result<SelectorRecord, RecordError> {
    Ok(SelectorRecord {
        direction: selector.direction,
        position,
        includes: blob::encode_list("includes", &selector.includes)?,
        excludes: blob::encode_list("excludes", &selector.excludes)?,
        mode: selector.mode.clone(),
    })
}

fn selector_from_record(record: &SelectorRecord) -> Result<DataSelector, RecordError> {
    Ok(DataSelector {
        direction: record.direction,
        includes: blob::decode_list("includes", record.includes.as_deref())?,
        excludes: blob::decode_list("excludes", record.excludes.as_deref())?,
        mode: record.mode.clone(),
    })
}
