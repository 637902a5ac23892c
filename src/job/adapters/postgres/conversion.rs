//! Conversions between Diesel rows and store records.

use super::models::{
    CredentialRow, EdgeRow, EnvironmentModifierRow, JobRow, JobVariableRow, NewJobRow,
    NewTaskResultRow, PayloadRow, ScriptRow, SelectorRow, TaskResultRow, TaskRow,
    TaskVariableRow,
};
use crate::job::domain::{
    DataSpaces, FlowActionType, JobId, JobPriority, JobStatus, OnTaskError, ParseEnumError,
    SelectorDirection, TaskCounters, TaskId, TaskKey, TaskStatus,
};
use crate::job::ports::{StoreError, StoreResult};
use crate::job::records::{
    EnvironmentModifierRecord, JobRecord, JobVariableRecord, RecordError, ScriptKind,
    ScriptRecord, SelectorRecord, TaskEdges, TaskPayloadRecord, TaskRecord, TaskResultRecord,
    TaskVariableRecord, ThirdPartyCredentialRecord,
};
use std::collections::BTreeMap;

pub(super) const EDGE_DEPENDENCY: &str = "DEPENDENCY";
pub(super) const EDGE_IF_BRANCH: &str = "IF_BRANCH";
pub(super) const EDGE_JOINED_BRANCH: &str = "JOINED_BRANCH";

pub(super) fn corrupt(err: impl Into<RecordError>) -> StoreError {
    StoreError::persistence(err.into())
}

pub(super) fn to_int(value: u32, column: &'static str) -> StoreResult<i32> {
    i32::try_from(value).map_err(|_| corrupt(RecordError::OutOfRange(column)))
}

pub(super) fn from_int(value: i32, column: &'static str) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| corrupt(RecordError::OutOfRange(column)))
}

fn parse<T>(value: &str) -> StoreResult<T>
where
    T: for<'v> TryFrom<&'v str, Error = ParseEnumError>,
{
    T::try_from(value).map_err(corrupt)
}

pub(super) fn task_id_column(task: TaskId) -> StoreResult<i32> {
    to_int(task.into_inner(), "task_id")
}

pub(super) fn task_key(job_id: i64, task_id: i32) -> StoreResult<TaskKey> {
    Ok(TaskKey::new(
        JobId::new(job_id),
        TaskId::new(from_int(task_id, "task_id")?),
    ))
}

pub(super) fn raw_job_ids(ids: &[JobId]) -> Vec<i64> {
    ids.iter().map(|id| id.into_inner()).collect()
}

/// Task counters converted to their column type.
pub(super) struct CounterColumns {
    pub total: i32,
    pub pending: i32,
    pub running: i32,
    pub finished: i32,
    pub failed: i32,
    pub faulty: i32,
    pub in_error: i32,
}

impl CounterColumns {
    pub(super) fn from_counters(counters: &TaskCounters) -> StoreResult<Self> {
        Ok(Self {
            total: to_int(counters.total, "total_tasks")?,
            pending: to_int(counters.pending, "pending_tasks")?,
            running: to_int(counters.running, "running_tasks")?,
            finished: to_int(counters.finished, "finished_tasks")?,
            failed: to_int(counters.failed, "failed_tasks")?,
            faulty: to_int(counters.faulty, "faulty_tasks")?,
            in_error: to_int(counters.in_error, "in_error_tasks")?,
        })
    }
}

pub(super) fn new_job_row(job: &JobRecord) -> StoreResult<NewJobRow> {
    let counters = CounterColumns::from_counters(&job.counters)?;
    Ok(NewJobRow {
        name: job.name.clone(),
        owner: job.owner.clone(),
        description: job.description.clone(),
        project_name: job.project_name.clone(),
        priority: job.priority.as_str().to_owned(),
        status: job.status.as_str().to_owned(),
        submitted_time: job.submitted_time,
        start_time: job.start_time,
        in_error_time: job.in_error_time,
        finished_time: job.finished_time,
        removed_time: job.removed_time,
        scheduled_time_for_removal: job.scheduled_time_for_removal,
        last_updated_time: job.last_updated_time,
        total_tasks: counters.total,
        pending_tasks: counters.pending,
        running_tasks: counters.running,
        finished_tasks: counters.finished,
        failed_tasks: counters.failed,
        faulty_tasks: counters.faulty,
        in_error_tasks: counters.in_error,
        max_number_of_execution: to_int(job.max_number_of_execution, "max_number_of_execution")?,
        on_task_error: job.on_task_error.as_str().to_owned(),
        input_space: job.data_spaces.input.clone(),
        output_space: job.data_spaces.output.clone(),
        global_space: job.data_spaces.global.clone(),
        user_space: job.data_spaces.user.clone(),
        generic_information: job.generic_information.clone(),
        result_map: job.result_map.clone(),
        to_be_removed: job.to_be_removed,
        parent_id: job.parent_id.map(JobId::into_inner),
        children_count: to_int(job.children_count, "children_count")?,
    })
}

pub(super) fn job_variable_rows(job_id: JobId, job: &JobRecord) -> Vec<JobVariableRow> {
    job.variables
        .iter()
        .map(|variable| JobVariableRow {
            job_id: job_id.into_inner(),
            name: variable.name.clone(),
            value: variable.value.clone(),
            model: variable.model.clone(),
        })
        .collect()
}

pub(super) fn job_record(row: JobRow, variables: Vec<JobVariableRow>) -> StoreResult<JobRecord> {
    Ok(JobRecord {
        id: Some(JobId::new(row.id)),
        name: row.name,
        owner: row.owner,
        description: row.description,
        project_name: row.project_name,
        priority: parse::<JobPriority>(&row.priority)?,
        status: parse::<JobStatus>(&row.status)?,
        submitted_time: row.submitted_time,
        start_time: row.start_time,
        in_error_time: row.in_error_time,
        finished_time: row.finished_time,
        removed_time: row.removed_time,
        scheduled_time_for_removal: row.scheduled_time_for_removal,
        last_updated_time: row.last_updated_time,
        counters: TaskCounters {
            total: from_int(row.total_tasks, "total_tasks")?,
            pending: from_int(row.pending_tasks, "pending_tasks")?,
            running: from_int(row.running_tasks, "running_tasks")?,
            finished: from_int(row.finished_tasks, "finished_tasks")?,
            failed: from_int(row.failed_tasks, "failed_tasks")?,
            faulty: from_int(row.faulty_tasks, "faulty_tasks")?,
            in_error: from_int(row.in_error_tasks, "in_error_tasks")?,
        },
        max_number_of_execution: from_int(row.max_number_of_execution, "max_number_of_execution")?,
        on_task_error: parse::<OnTaskError>(&row.on_task_error)?,
        data_spaces: DataSpaces {
            input: row.input_space,
            output: row.output_space,
            global: row.global_space,
            user: row.user_space,
        },
        generic_information: row.generic_information,
        result_map: row.result_map,
        variables: variables
            .into_iter()
            .map(|variable| JobVariableRecord {
                name: variable.name,
                value: variable.value,
                model: variable.model,
            })
            .collect(),
        to_be_removed: row.to_be_removed,
        parent_id: row.parent_id.map(JobId::new),
        children_count: from_int(row.children_count, "children_count")?,
    })
}

pub(super) fn task_row(task: &TaskRecord) -> StoreResult<TaskRow> {
    Ok(TaskRow {
        job_id: task.key.job_id.into_inner(),
        task_id: task_id_column(task.key.task_id)?,
        name: task.name.clone(),
        description: task.description.clone(),
        tag: task.tag.clone(),
        status: task.status.as_str().to_owned(),
        start_time: task.start_time,
        finished_time: task.finished_time,
        scheduled_time: task.scheduled_time,
        in_error_time: task.in_error_time,
        execution_duration: task.execution_duration,
        execution_host_name: task.execution_host_name.clone(),
        max_number_of_execution: to_int(task.max_number_of_execution, "max_number_of_execution")?,
        number_of_execution_left: to_int(
            task.number_of_execution_left,
            "number_of_execution_left",
        )?,
        number_of_execution_on_failure_left: to_int(
            task.number_of_execution_on_failure_left,
            "number_of_execution_on_failure_left",
        )?,
        on_task_error: task.on_task_error.as_str().to_owned(),
        precious_result: task.precious_result,
        precious_logs: task.precious_logs,
        run_as_me: task.run_as_me,
        wall_time: task.wall_time,
        iteration: to_int(task.iteration, "iteration")?,
        replication: to_int(task.replication, "replication")?,
        matching_block: task.matching_block.clone(),
        flow_block: task.flow_block.as_str().to_owned(),
        task_type: task.task_type.clone(),
        generic_information: task.generic_information.clone(),
        task_launcher_node_url: task.task_launcher_node_url.clone(),
    })
}

/// Child rows owned by one task.
pub(super) struct TaskChildRows {
    pub variables: Vec<TaskVariableRow>,
    pub payload: Option<PayloadRow>,
    pub env_modifiers: Vec<EnvironmentModifierRow>,
    pub scripts: Vec<ScriptRow>,
    pub selectors: Vec<SelectorRow>,
}

pub(super) fn task_child_rows(task: &TaskRecord) -> StoreResult<TaskChildRows> {
    let job_id = task.key.job_id.into_inner();
    let task_id = task_id_column(task.key.task_id)?;
    let variables = task
        .variables
        .iter()
        .map(|variable| TaskVariableRow {
            job_id,
            task_id,
            name: variable.name.clone(),
            value: variable.value.clone(),
            model: variable.model.clone(),
            job_inherited: variable.job_inherited,
        })
        .collect();
    let env_modifiers = task
        .payload
        .iter()
        .flat_map(|payload| payload.env_modifiers.iter())
        .zip(0_i32..)
        .map(|(modifier, position)| EnvironmentModifierRow {
            job_id,
            task_id,
            position,
            name: modifier.name.clone(),
            value: modifier.value.clone(),
            append: modifier.append,
        })
        .collect();
    let payload = task.payload.as_ref().map(|payload| PayloadRow {
        job_id,
        task_id,
        class_name: payload.class_name.clone(),
        arguments: payload.arguments.clone(),
        command: payload.command.clone(),
        working_dir: payload.working_dir.clone(),
        java_home: payload.java_home.clone(),
        fork_working_dir: payload.fork_working_dir.clone(),
        jvm_arguments: payload.jvm_arguments.clone(),
        additional_classpath: payload.additional_classpath.clone(),
    });
    let scripts = task
        .scripts
        .iter()
        .map(|script| {
            Ok(ScriptRow {
                job_id,
                task_id,
                kind: script.kind.as_str().to_owned(),
                position: to_int(script.position, "position")?,
                source: script.source.clone(),
                engine: script.engine.clone(),
                parameters: script.parameters.clone(),
                flow_action: script.flow_action.map(|action| action.as_str().to_owned()),
                target: script.target.clone(),
                target_else: script.target_else.clone(),
                target_continuation: script.target_continuation.clone(),
                dynamic: script.dynamic,
            })
        })
        .collect::<StoreResult<_>>()?;
    let selectors = task
        .selectors
        .iter()
        .map(|selector| {
            Ok(SelectorRow {
                job_id,
                task_id,
                direction: selector.direction.as_str().to_owned(),
                position: to_int(selector.position, "position")?,
                includes: selector.includes.clone(),
                excludes: selector.excludes.clone(),
                mode: selector.mode.clone(),
            })
        })
        .collect::<StoreResult<_>>()?;
    Ok(TaskChildRows {
        variables,
        payload,
        env_modifiers,
        scripts,
        selectors,
    })
}

pub(super) fn edge_rows(edges: &TaskEdges) -> StoreResult<Vec<EdgeRow>> {
    let job_id = edges.task.job_id.into_inner();
    let task_id = task_id_column(edges.task.task_id)?;
    let labelled = edges
        .dependencies
        .iter()
        .map(|target| (EDGE_DEPENDENCY, target))
        .chain(edges.if_branch.iter().map(|target| (EDGE_IF_BRANCH, target)))
        .chain(
            edges
                .joined_branches
                .iter()
                .map(|target| (EDGE_JOINED_BRANCH, target)),
        );
    labelled
        .map(|(kind, target)| {
            Ok(EdgeRow {
                job_id,
                task_id,
                kind: kind.to_owned(),
                target_job_id: target.job_id.into_inner(),
                target_task_id: task_id_column(target.task_id)?,
            })
        })
        .collect()
}

/// Child rows of loaded tasks grouped by task.
#[derive(Default)]
pub(super) struct LoadedChildren {
    pub edges: BTreeMap<TaskKey, Vec<EdgeRow>>,
    pub variables: BTreeMap<TaskKey, Vec<TaskVariableRow>>,
    pub payloads: BTreeMap<TaskKey, PayloadRow>,
    pub env_modifiers: BTreeMap<TaskKey, Vec<EnvironmentModifierRow>>,
    pub scripts: BTreeMap<TaskKey, Vec<ScriptRow>>,
    pub selectors: BTreeMap<TaskKey, Vec<SelectorRow>>,
}

pub(super) fn group_by_task<R>(
    rows: Vec<R>,
    key_of: impl Fn(&R) -> (i64, i32),
) -> StoreResult<BTreeMap<TaskKey, Vec<R>>> {
    let mut grouped: BTreeMap<TaskKey, Vec<R>> = BTreeMap::new();
    for row in rows {
        let (job_id, task_id) = key_of(&row);
        grouped.entry(task_key(job_id, task_id)?).or_default().push(row);
    }
    Ok(grouped)
}

pub(super) fn task_record(row: TaskRow, children: &mut LoadedChildren) -> StoreResult<TaskRecord> {
    let key = task_key(row.job_id, row.task_id)?;
    let edges = task_edges(key, children.edges.remove(&key).unwrap_or_default())?;
    let variables = children
        .variables
        .remove(&key)
        .unwrap_or_default()
        .into_iter()
        .map(|variable| TaskVariableRecord {
            name: variable.name,
            value: variable.value,
            model: variable.model,
            job_inherited: variable.job_inherited,
        })
        .collect();
    let mut modifiers = children.env_modifiers.remove(&key).unwrap_or_default();
    modifiers.sort_by_key(|modifier| modifier.position);
    let payload = children.payloads.remove(&key).map(|payload| TaskPayloadRecord {
        class_name: payload.class_name,
        arguments: payload.arguments,
        command: payload.command,
        working_dir: payload.working_dir,
        java_home: payload.java_home,
        fork_working_dir: payload.fork_working_dir,
        jvm_arguments: payload.jvm_arguments,
        additional_classpath: payload.additional_classpath,
        env_modifiers: modifiers
            .into_iter()
            .map(|modifier| EnvironmentModifierRecord {
                name: modifier.name,
                value: modifier.value,
                append: modifier.append,
            })
            .collect(),
    });
    let scripts = children
        .scripts
        .remove(&key)
        .unwrap_or_default()
        .into_iter()
        .map(script_record)
        .collect::<StoreResult<_>>()?;
    let selectors = children
        .selectors
        .remove(&key)
        .unwrap_or_default()
        .into_iter()
        .map(|selector| {
            Ok(SelectorRecord {
                direction: parse::<SelectorDirection>(&selector.direction)?,
                position: from_int(selector.position, "position")?,
                includes: selector.includes,
                excludes: selector.excludes,
                mode: selector.mode,
            })
        })
        .collect::<StoreResult<_>>()?;

    Ok(TaskRecord {
        key,
        name: row.name,
        description: row.description,
        tag: row.tag,
        status: parse::<TaskStatus>(&row.status)?,
        start_time: row.start_time,
        finished_time: row.finished_time,
        scheduled_time: row.scheduled_time,
        in_error_time: row.in_error_time,
        execution_duration: row.execution_duration,
        execution_host_name: row.execution_host_name,
        max_number_of_execution: from_int(row.max_number_of_execution, "max_number_of_execution")?,
        number_of_execution_left: from_int(
            row.number_of_execution_left,
            "number_of_execution_left",
        )?,
        number_of_execution_on_failure_left: from_int(
            row.number_of_execution_on_failure_left,
            "number_of_execution_on_failure_left",
        )?,
        on_task_error: parse::<OnTaskError>(&row.on_task_error)?,
        precious_result: row.precious_result,
        precious_logs: row.precious_logs,
        run_as_me: row.run_as_me,
        wall_time: row.wall_time,
        iteration: from_int(row.iteration, "iteration")?,
        replication: from_int(row.replication, "replication")?,
        matching_block: row.matching_block,
        flow_block: parse(&row.flow_block)?,
        task_type: row.task_type,
        generic_information: row.generic_information,
        task_launcher_node_url: row.task_launcher_node_url,
        edges,
        variables,
        scripts,
        selectors,
        payload,
    })
}

fn task_edges(task: TaskKey, rows: Vec<EdgeRow>) -> StoreResult<TaskEdges> {
    let mut edges = TaskEdges::empty(task);
    for row in rows {
        let target = task_key(row.target_job_id, row.target_task_id)?;
        match row.kind.as_str() {
            EDGE_DEPENDENCY => edges.dependencies.push(target),
            EDGE_IF_BRANCH => edges.if_branch = Some(target),
            EDGE_JOINED_BRANCH => edges.joined_branches.push(target),
            other => return Err(corrupt(ParseEnumError::new("edge kind", other))),
        }
    }
    edges.dependencies.sort();
    edges.joined_branches.sort();
    Ok(edges)
}

fn script_record(row: ScriptRow) -> StoreResult<ScriptRecord> {
    Ok(ScriptRecord {
        kind: parse::<ScriptKind>(&row.kind)?,
        position: from_int(row.position, "position")?,
        source: row.source,
        engine: row.engine,
        parameters: row.parameters,
        flow_action: row
            .flow_action
            .as_deref()
            .map(parse::<FlowActionType>)
            .transpose()?,
        target: row.target,
        target_else: row.target_else,
        target_continuation: row.target_continuation,
        dynamic: row.dynamic,
    })
}

pub(super) fn new_result_row(result: &TaskResultRecord) -> StoreResult<NewTaskResultRow> {
    Ok(NewTaskResultRow {
        job_id: result.task.job_id.into_inner(),
        task_id: task_id_column(result.task.task_id)?,
        result_time: result.result_time,
        value: result.value.clone(),
        exception: result.exception.clone(),
        output: result.output.clone(),
        properties: result.properties.clone(),
        propagated_variables: result.propagated_variables.clone(),
        flow_action: result.flow_action.clone(),
    })
}

pub(super) fn result_record(row: TaskResultRow) -> StoreResult<TaskResultRecord> {
    Ok(TaskResultRecord {
        task: task_key(row.job_id, row.task_id)?,
        result_time: row.result_time,
        value: row.value,
        exception: row.exception,
        output: row.output,
        properties: row.properties,
        propagated_variables: row.propagated_variables,
        flow_action: row.flow_action,
    })
}

pub(super) fn credential_row(credential: &ThirdPartyCredentialRecord) -> CredentialRow {
    CredentialRow {
        username: credential.username.clone(),
        credential_key: credential.key.clone(),
        encrypted_symmetric_key: credential.encrypted_symmetric_key.clone(),
        encrypted_value: credential.encrypted_value.clone(),
    }
}

pub(super) fn credential_record(row: CredentialRow) -> ThirdPartyCredentialRecord {
    ThirdPartyCredentialRecord {
        username: row.username,
        key: row.credential_key,
        encrypted_symmetric_key: row.encrypted_symmetric_key,
        encrypted_value: row.encrypted_value,
    }
}
