//! Diesel schema for scheduler state persistence.

diesel::table! {
    /// Job rows; `removed_time = -1` marks an active job.
    job_data (id) {
        /// Generated job identifier.
        id -> Int8,
        /// Job name.
        #[max_length = 255]
        name -> Varchar,
        /// Submitting user.
        #[max_length = 255]
        owner -> Varchar,
        /// Description.
        description -> Nullable<Text>,
        /// Project name.
        #[max_length = 255]
        project_name -> Nullable<Varchar>,
        /// Priority.
        #[max_length = 20]
        priority -> Varchar,
        /// Status.
        #[max_length = 20]
        status -> Varchar,
        /// Submission time.
        submitted_time -> Int8,
        /// Start time.
        start_time -> Int8,
        /// In-error time.
        in_error_time -> Int8,
        /// Finish time.
        finished_time -> Int8,
        /// Removal time.
        removed_time -> Int8,
        /// Time after which housekeeping may purge the job.
        scheduled_time_for_removal -> Int8,
        /// Last update time.
        last_updated_time -> Int8,
        /// Number of tasks.
        total_tasks -> Int4,
        /// Pending tasks.
        pending_tasks -> Int4,
        /// Running tasks.
        running_tasks -> Int4,
        /// Finished tasks.
        finished_tasks -> Int4,
        /// Failed tasks.
        failed_tasks -> Int4,
        /// Faulty tasks.
        faulty_tasks -> Int4,
        /// Tasks paused on error.
        in_error_tasks -> Int4,
        /// Default executions per task.
        max_number_of_execution -> Int4,
        /// Error policy.
        #[max_length = 30]
        on_task_error -> Varchar,
        /// Input space URL.
        input_space -> Nullable<Text>,
        /// Output space URL.
        output_space -> Nullable<Text>,
        /// Global space URL.
        global_space -> Nullable<Text>,
        /// User space URL.
        user_space -> Nullable<Text>,
        /// Serialized generic information.
        generic_information -> Nullable<Bytea>,
        /// Serialized result map.
        result_map -> Nullable<Bytea>,
        /// Flagged for removal.
        to_be_removed -> Bool,
        /// Parent job.
        parent_id -> Nullable<Int8>,
        /// Child jobs still referencing this job.
        children_count -> Int4,
    }
}

diesel::table! {
    /// Job variables.
    job_data_variable (job_id, name) {
        /// Owning job.
        job_id -> Int8,
        /// Variable name.
        #[max_length = 255]
        name -> Varchar,
        /// Value.
        value -> Text,
        /// Type model.
        model -> Nullable<Text>,
    }
}

diesel::table! {
    /// Compressed job definitions.
    job_content (job_id) {
        /// Owning job.
        job_id -> Int8,
        /// Gzip-compressed definition.
        content -> Bytea,
    }
}

diesel::table! {
    /// Task rows keyed by job and job-local task identifier.
    task_data (job_id, task_id) {
        /// Owning job.
        job_id -> Int8,
        /// Job-local task identifier.
        task_id -> Int4,
        /// Task name.
        #[max_length = 255]
        name -> Varchar,
        /// Description.
        description -> Nullable<Text>,
        /// Tag.
        #[max_length = 255]
        tag -> Nullable<Varchar>,
        /// Status.
        #[max_length = 30]
        status -> Varchar,
        /// Start time.
        start_time -> Int8,
        /// Finish time.
        finished_time -> Int8,
        /// Scheduled time.
        scheduled_time -> Int8,
        /// In-error time.
        in_error_time -> Int8,
        /// Duration of the last execution.
        execution_duration -> Int8,
        /// Host of the last execution.
        execution_host_name -> Nullable<Text>,
        /// Configured executions.
        max_number_of_execution -> Int4,
        /// Executions left.
        number_of_execution_left -> Int4,
        /// Re-executions left after node failures.
        number_of_execution_on_failure_left -> Int4,
        /// Error policy.
        #[max_length = 30]
        on_task_error -> Varchar,
        /// Result flagged precious.
        precious_result -> Bool,
        /// Logs flagged precious.
        precious_logs -> Bool,
        /// Runs as the submitting user.
        run_as_me -> Bool,
        /// Wall-time limit.
        wall_time -> Int8,
        /// Loop iteration.
        iteration -> Int4,
        /// Replication index.
        replication -> Int4,
        /// Matching block name.
        #[max_length = 255]
        matching_block -> Nullable<Varchar>,
        /// Block boundary marker.
        #[max_length = 10]
        flow_block -> Varchar,
        /// Payload discriminator.
        #[max_length = 30]
        task_type -> Varchar,
        /// Serialized generic information.
        generic_information -> Nullable<Bytea>,
        /// Launcher address.
        task_launcher_node_url -> Nullable<Text>,
    }
}

diesel::table! {
    /// Dependency, if-branch and joined-branch edges.
    task_data_edge (job_id, task_id, kind, target_job_id, target_task_id) {
        /// Job of the source task.
        job_id -> Int8,
        /// Source task.
        task_id -> Int4,
        /// Edge kind.
        #[max_length = 20]
        kind -> Varchar,
        /// Job of the target task.
        target_job_id -> Int8,
        /// Target task.
        target_task_id -> Int4,
    }
}

diesel::table! {
    /// Task variables.
    task_data_variable (job_id, task_id, name) {
        /// Owning job.
        job_id -> Int8,
        /// Owning task.
        task_id -> Int4,
        /// Variable name.
        #[max_length = 255]
        name -> Varchar,
        /// Value.
        value -> Text,
        /// Type model.
        model -> Nullable<Text>,
        /// Inherited from the job.
        job_inherited -> Bool,
    }
}

diesel::table! {
    /// Type-specific executable payloads.
    task_payload (job_id, task_id) {
        /// Owning job.
        job_id -> Int8,
        /// Owning task.
        task_id -> Int4,
        /// Java executable class.
        class_name -> Nullable<Text>,
        /// Serialized Java arguments.
        arguments -> Nullable<Bytea>,
        /// Serialized native command line.
        command -> Nullable<Bytea>,
        /// Native working directory.
        working_dir -> Nullable<Text>,
        /// Forked Java home.
        java_home -> Nullable<Text>,
        /// Forked working directory.
        fork_working_dir -> Nullable<Text>,
        /// Serialized JVM arguments.
        jvm_arguments -> Nullable<Bytea>,
        /// Serialized classpath entries.
        additional_classpath -> Nullable<Bytea>,
    }
}

diesel::table! {
    /// Environment modifiers of forked payloads.
    environment_modifier (job_id, task_id, position) {
        /// Owning job.
        job_id -> Int8,
        /// Owning task.
        task_id -> Int4,
        /// Order within the payload.
        position -> Int4,
        /// Variable name.
        #[max_length = 255]
        name -> Varchar,
        /// Value.
        value -> Text,
        /// Append instead of replace.
        append -> Bool,
    }
}

diesel::table! {
    /// Scripts of every kind.
    script_data (job_id, task_id, kind, position) {
        /// Owning job.
        job_id -> Int8,
        /// Owning task.
        task_id -> Int4,
        /// Relationship to the task.
        #[max_length = 20]
        kind -> Varchar,
        /// Order among scripts of the same kind.
        position -> Int4,
        /// Source.
        source -> Text,
        /// Engine.
        #[max_length = 100]
        engine -> Varchar,
        /// Serialized parameters.
        parameters -> Nullable<Bytea>,
        /// Flow action type.
        #[max_length = 20]
        flow_action -> Nullable<Varchar>,
        /// Primary flow target.
        #[max_length = 255]
        target -> Nullable<Varchar>,
        /// Else-branch flow target.
        #[max_length = 255]
        target_else -> Nullable<Varchar>,
        /// Continuation flow target.
        #[max_length = 255]
        target_continuation -> Nullable<Varchar>,
        /// Dynamic selection script.
        dynamic -> Bool,
    }
}

diesel::table! {
    /// Data-space selectors.
    selector_data (job_id, task_id, direction, position) {
        /// Owning job.
        job_id -> Int8,
        /// Owning task.
        task_id -> Int4,
        /// Transfer direction.
        #[max_length = 10]
        direction -> Varchar,
        /// Order among selectors.
        position -> Int4,
        /// Serialized include patterns.
        includes -> Nullable<Bytea>,
        /// Serialized exclude patterns.
        excludes -> Nullable<Bytea>,
        /// Access mode.
        #[max_length = 50]
        mode -> Varchar,
    }
}

diesel::table! {
    /// Append-only task results.
    task_result_data (id) {
        /// Generated identifier giving insertion order.
        id -> Int8,
        /// Owning job.
        job_id -> Int8,
        /// Owning task.
        task_id -> Int4,
        /// Time the result was produced.
        result_time -> Int8,
        /// Serialized value.
        value -> Nullable<Bytea>,
        /// Serialized exception.
        exception -> Nullable<Bytea>,
        /// Captured logs.
        output -> Nullable<Text>,
        /// Serialized properties.
        properties -> Nullable<Bytea>,
        /// Serialized propagated variables.
        propagated_variables -> Nullable<Bytea>,
        /// Serialized flow action.
        flow_action -> Nullable<Bytea>,
    }
}

diesel::table! {
    /// Encrypted third-party credentials.
    third_party_credential (username, credential_key) {
        /// Owning user.
        #[max_length = 255]
        username -> Varchar,
        /// Credential key.
        #[max_length = 255]
        credential_key -> Varchar,
        /// Encrypted symmetric key.
        encrypted_symmetric_key -> Bytea,
        /// Encrypted value.
        encrypted_value -> Bytea,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    job_data,
    job_data_variable,
    job_content,
    task_data,
    task_data_edge,
    task_data_variable,
    task_payload,
    environment_modifier,
    script_data,
    selector_data,
    task_result_data,
    third_party_credential,
);
