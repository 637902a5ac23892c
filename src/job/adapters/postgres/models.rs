//! Diesel row models for scheduler state persistence.

use super::schema::{
    environment_modifier, job_content, job_data, job_data_variable, script_data, selector_data,
    task_data, task_data_edge, task_data_variable, task_payload, task_result_data,
    third_party_credential,
};
use diesel::prelude::*;

/// Query result row for jobs.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = job_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct JobRow {
    /// Generated identifier.
    pub id: i64,
    /// Job name.
    pub name: String,
    /// Submitting user.
    pub owner: String,
    /// Description.
    pub description: Option<String>,
    /// Project name.
    pub project_name: Option<String>,
    /// Priority.
    pub priority: String,
    /// Status.
    pub status: String,
    /// Submission time.
    pub submitted_time: i64,
    /// Start time.
    pub start_time: i64,
    /// In-error time.
    pub in_error_time: i64,
    /// Finish time.
    pub finished_time: i64,
    /// Removal time.
    pub removed_time: i64,
    /// Scheduled removal time.
    pub scheduled_time_for_removal: i64,
    /// Last update time.
    pub last_updated_time: i64,
    /// Number of tasks.
    pub total_tasks: i32,
    /// Pending tasks.
    pub pending_tasks: i32,
    /// Running tasks.
    pub running_tasks: i32,
    /// Finished tasks.
    pub finished_tasks: i32,
    /// Failed tasks.
    pub failed_tasks: i32,
    /// Faulty tasks.
    pub faulty_tasks: i32,
    /// Tasks paused on error.
    pub in_error_tasks: i32,
    /// Default executions per task.
    pub max_number_of_execution: i32,
    /// Error policy.
    pub on_task_error: String,
    /// Input space.
    pub input_space: Option<String>,
    /// Output space.
    pub output_space: Option<String>,
    /// Global space.
    pub global_space: Option<String>,
    /// User space.
    pub user_space: Option<String>,
    /// Serialized generic information.
    pub generic_information: Option<Vec<u8>>,
    /// Serialized result map.
    pub result_map: Option<Vec<u8>>,
    /// Flagged for removal.
    pub to_be_removed: bool,
    /// Parent job.
    pub parent_id: Option<i64>,
    /// Child jobs still referencing this job.
    pub children_count: i32,
}

/// Insert model for jobs; the identifier is generated.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = job_data)]
pub struct NewJobRow {
    /// Job name.
    pub name: String,
    /// Submitting user.
    pub owner: String,
    /// Description.
    pub description: Option<String>,
    /// Project name.
    pub project_name: Option<String>,
    /// Priority.
    pub priority: String,
    /// Status.
    pub status: String,
    /// Submission time.
    pub submitted_time: i64,
    /// Start time.
    pub start_time: i64,
    /// In-error time.
    pub in_error_time: i64,
    /// Finish time.
    pub finished_time: i64,
    /// Removal time.
    pub removed_time: i64,
    /// Scheduled removal time.
    pub scheduled_time_for_removal: i64,
    /// Last update time.
    pub last_updated_time: i64,
    /// Number of tasks.
    pub total_tasks: i32,
    /// Pending tasks.
    pub pending_tasks: i32,
    /// Running tasks.
    pub running_tasks: i32,
    /// Finished tasks.
    pub finished_tasks: i32,
    /// Failed tasks.
    pub failed_tasks: i32,
    /// Faulty tasks.
    pub faulty_tasks: i32,
    /// Tasks paused on error.
    pub in_error_tasks: i32,
    /// Default executions per task.
    pub max_number_of_execution: i32,
    /// Error policy.
    pub on_task_error: String,
    /// Input space.
    pub input_space: Option<String>,
    /// Output space.
    pub output_space: Option<String>,
    /// Global space.
    pub global_space: Option<String>,
    /// User space.
    pub user_space: Option<String>,
    /// Serialized generic information.
    pub generic_information: Option<Vec<u8>>,
    /// Serialized result map.
    pub result_map: Option<Vec<u8>>,
    /// Flagged for removal.
    pub to_be_removed: bool,
    /// Parent job.
    pub parent_id: Option<i64>,
    /// Child jobs still referencing this job.
    pub children_count: i32,
}

/// Job variable row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = job_data_variable)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct JobVariableRow {
    /// Owning job.
    pub job_id: i64,
    /// Variable name.
    pub name: String,
    /// Value.
    pub value: String,
    /// Type model.
    pub model: Option<String>,
}

/// Compressed definition row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = job_content)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct JobContentRow {
    /// Owning job.
    pub job_id: i64,
    /// Compressed definition.
    pub content: Vec<u8>,
}

/// Task row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = task_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Owning job.
    pub job_id: i64,
    /// Job-local task identifier.
    pub task_id: i32,
    /// Task name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Tag.
    pub tag: Option<String>,
    /// Status.
    pub status: String,
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
    /// Configured executions.
    pub max_number_of_execution: i32,
    /// Executions left.
    pub number_of_execution_left: i32,
    /// Re-executions left after node failures.
    pub number_of_execution_on_failure_left: i32,
    /// Error policy.
    pub on_task_error: String,
    /// Result flagged precious.
    pub precious_result: bool,
    /// Logs flagged precious.
    pub precious_logs: bool,
    /// Runs as the submitting user.
    pub run_as_me: bool,
    /// Wall-time limit.
    pub wall_time: i64,
    /// Loop iteration.
    pub iteration: i32,
    /// Replication index.
    pub replication: i32,
    /// Matching block name.
    pub matching_block: Option<String>,
    /// Block boundary marker.
    pub flow_block: String,
    /// Payload discriminator.
    pub task_type: String,
    /// Serialized generic information.
    pub generic_information: Option<Vec<u8>>,
    /// Launcher address.
    pub task_launcher_node_url: Option<String>,
}

/// Edge row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = task_data_edge)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EdgeRow {
    /// Job of the source task.
    pub job_id: i64,
    /// Source task.
    pub task_id: i32,
    /// Edge kind.
    pub kind: String,
    /// Job of the target task.
    pub target_job_id: i64,
    /// Target task.
    pub target_task_id: i32,
}

/// Task variable row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = task_data_variable)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskVariableRow {
    /// Owning job.
    pub job_id: i64,
    /// Owning task.
    pub task_id: i32,
    /// Variable name.
    pub name: String,
    /// Value.
    pub value: String,
    /// Type model.
    pub model: Option<String>,
    /// Inherited from the job.
    pub job_inherited: bool,
}

/// Payload row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = task_payload)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PayloadRow {
    /// Owning job.
    pub job_id: i64,
    /// Owning task.
    pub task_id: i32,
    /// Java executable class.
    pub class_name: Option<String>,
    /// Serialized Java arguments.
    pub arguments: Option<Vec<u8>>,
    /// Serialized native command line.
    pub command: Option<Vec<u8>>,
    /// Native working directory.
    pub working_dir: Option<String>,
    /// Forked Java home.
    pub java_home: Option<String>,
    /// Forked working directory.
    pub fork_working_dir: Option<String>,
    /// Serialized JVM arguments.
    pub jvm_arguments: Option<Vec<u8>>,
    /// Serialized classpath entries.
    pub additional_classpath: Option<Vec<u8>>,
}

/// Environment modifier row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = environment_modifier)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EnvironmentModifierRow {
    /// Owning job.
    pub job_id: i64,
    /// Owning task.
    pub task_id: i32,
    /// Order within the payload.
    pub position: i32,
    /// Variable name.
    pub name: String,
    /// Value.
    pub value: String,
    /// Append instead of replace.
    pub append: bool,
}

/// Script row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = script_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ScriptRow {
    /// Owning job.
    pub job_id: i64,
    /// Owning task.
    pub task_id: i32,
    /// Relationship to the task.
    pub kind: String,
    /// Order among scripts of the same kind.
    pub position: i32,
    /// Source.
    pub source: String,
    /// Engine.
    pub engine: String,
    /// Serialized parameters.
    pub parameters: Option<Vec<u8>>,
    /// Flow action type.
    pub flow_action: Option<String>,
    /// Primary flow target.
    pub target: Option<String>,
    /// Else-branch flow target.
    pub target_else: Option<String>,
    /// Continuation flow target.
    pub target_continuation: Option<String>,
    /// Dynamic selection script.
    pub dynamic: bool,
}

/// Selector row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = selector_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SelectorRow {
    /// Owning job.
    pub job_id: i64,
    /// Owning task.
    pub task_id: i32,
    /// Transfer direction.
    pub direction: String,
    /// Order among selectors.
    pub position: i32,
    /// Serialized include patterns.
    pub includes: Option<Vec<u8>>,
    /// Serialized exclude patterns.
    pub excludes: Option<Vec<u8>>,
    /// Access mode.
    pub mode: String,
}

/// Query result row for task results.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = task_result_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskResultRow {
    /// Generated identifier.
    pub id: i64,
    /// Owning job.
    pub job_id: i64,
    /// Owning task.
    pub task_id: i32,
    /// Result time.
    pub result_time: i64,
    /// Serialized value.
    pub value: Option<Vec<u8>>,
    /// Serialized exception.
    pub exception: Option<Vec<u8>>,
    /// Captured logs.
    pub output: Option<String>,
    /// Serialized properties.
    pub properties: Option<Vec<u8>>,
    /// Serialized propagated variables.
    pub propagated_variables: Option<Vec<u8>>,
    /// Serialized flow action.
    pub flow_action: Option<Vec<u8>>,
}

/// Insert model for task results.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_result_data)]
pub struct NewTaskResultRow {
    /// Owning job.
    pub job_id: i64,
    /// Owning task.
    pub task_id: i32,
    /// Result time.
    pub result_time: i64,
    /// Serialized value.
    pub value: Option<Vec<u8>>,
    /// Serialized exception.
    pub exception: Option<Vec<u8>>,
    /// Captured logs.
    pub output: Option<String>,
    /// Serialized properties.
    pub properties: Option<Vec<u8>>,
    /// Serialized propagated variables.
    pub propagated_variables: Option<Vec<u8>>,
    /// Serialized flow action.
    pub flow_action: Option<Vec<u8>>,
}

/// Credential row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = third_party_credential)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CredentialRow {
    /// Owning user.
    pub username: String,
    /// Credential key.
    pub credential_key: String,
    /// Encrypted symmetric key.
    pub encrypted_symmetric_key: Vec<u8>,
    /// Encrypted value.
    pub encrypted_value: Vec<u8>,
}
