//! Durable job records.

use super::{RecordError, blob};
use crate::job::domain::{
    DataSpaces, ExecutionTracker, InternalJob, JobId, JobInfo, JobPriority, JobStatus,
    JobVariable, OnTaskError, TaskCounters,
};
use std::collections::BTreeMap;

/// Stored job row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    /// Generated identifier, absent until inserted.
    pub id: Option<JobId>,
    /// Job name.
    pub name: String,
    /// Submitting user.
    pub owner: String,
    /// Description.
    pub description: Option<String>,
    /// Project name.
    pub project_name: Option<String>,
    /// Priority.
    pub priority: JobPriority,
    /// Status.
    pub status: JobStatus,
    /// Submission time.
    pub submitted_time: i64,
    /// Start time, or `-1`.
    pub start_time: i64,
    /// Time the job was paused on error, or `-1`.
    pub in_error_time: i64,
    /// Finish time, or `-1`.
    pub finished_time: i64,
    /// Removal time; `-1` marks an active job.
    pub removed_time: i64,
    /// Time after which housekeeping may purge the job, `0` when unscheduled.
    pub scheduled_time_for_removal: i64,
    /// Time of the last stored update.
    pub last_updated_time: i64,
    /// Aggregate task counters.
    pub counters: TaskCounters,
    /// Default executions per task.
    pub max_number_of_execution: u32,
    /// Job-level error policy.
    pub on_task_error: OnTaskError,
    /// Data-space locations.
    pub data_spaces: DataSpaces,
    /// Serialized generic information map.
    pub generic_information: Option<Vec<u8>>,
    /// Serialized result map.
    pub result_map: Option<Vec<u8>>,
    /// Job variables.
    pub variables: Vec<JobVariableRecord>,
    /// Flagged for removal by a user.
    pub to_be_removed: bool,
    /// Parent job of a child workflow.
    pub parent_id: Option<JobId>,
    /// Number of child jobs still referencing this job.
    pub children_count: u32,
}

/// Stored job variable row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobVariableRecord {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
    /// Optional type model.
    pub model: Option<String>,
}

/// Compressed submitted definition of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContentRecord {
    /// Owning job.
    pub job_id: JobId,
    /// Gzip-compressed definition.
    pub content: Vec<u8>,
}

/// Mutable job columns written on every state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStateRecord {
    /// Job being updated.
    pub id: JobId,
    /// New status.
    pub status: JobStatus,
    /// Start time.
    pub start_time: i64,
    /// In-error time.
    pub in_error_time: i64,
    /// Finish time.
    pub finished_time: i64,
    /// Update time.
    pub last_updated_time: i64,
    /// Aggregate task counters.
    pub counters: TaskCounters,
    /// Serialized result map.
    pub result_map: Option<Vec<u8>>,
}

impl JobRecord {
    /// Builds the record inserted at submission.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when a map cannot be serialized.
    pub fn from_job(job: &InternalJob) -> Result<Self, RecordError> {
        Ok(Self {
            id: job.id,
            name: job.name.clone(),
            owner: job.owner.clone(),
            description: job.description.clone(),
            project_name: job.project_name.clone(),
            priority: job.priority,
            status: job.status,
            submitted_time: job.submitted_time,
            start_time: job.start_time,
            in_error_time: job.in_error_time,
            finished_time: job.finished_time,
            removed_time: job.removed_time,
            scheduled_time_for_removal: job.scheduled_time_for_removal,
            last_updated_time: job.last_updated_time,
            counters: job.counters,
            max_number_of_execution: job.max_number_of_execution,
            on_task_error: job.on_task_error,
            data_spaces: job.data_spaces.clone(),
            generic_information: blob::encode_map("generic_information", &job.generic_information)?,
            result_map: blob::encode_map("result_map", &job.result_map)?,
            variables: job
                .variables
                .values()
                .map(|variable| JobVariableRecord {
                    name: variable.name.clone(),
                    value: variable.value.clone(),
                    model: variable.model.clone(),
                })
                .collect(),
            to_be_removed: job.to_be_removed,
            parent_id: job.parent_id,
            children_count: job.children_count,
        })
    }

    /// Rebuilds a job without tasks.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the record has no identifier or a blob is
    /// malformed.
    pub fn into_job(self) -> Result<InternalJob, RecordError> {
        let id = self.id.ok_or(RecordError::missing("job", "id"))?;
        let generic_information =
            blob::decode_map("generic_information", self.generic_information.as_deref())?;
        let result_map = blob::decode_map("result_map", self.result_map.as_deref())?;
        let variables = self
            .variables
            .into_iter()
            .map(|variable| {
                (
                    variable.name.clone(),
                    JobVariable {
                        name: variable.name,
                        value: variable.value,
                        model: variable.model,
                    },
                )
            })
            .collect();
        Ok(InternalJob {
            id: Some(id),
            name: self.name,
            owner: self.owner,
            description: self.description,
            project_name: self.project_name,
            priority: self.priority,
            status: self.status,
            submitted_time: self.submitted_time,
            start_time: self.start_time,
            in_error_time: self.in_error_time,
            finished_time: self.finished_time,
            removed_time: self.removed_time,
            scheduled_time_for_removal: self.scheduled_time_for_removal,
            last_updated_time: self.last_updated_time,
            counters: self.counters,
            max_number_of_execution: self.max_number_of_execution,
            on_task_error: self.on_task_error,
            data_spaces: self.data_spaces,
            generic_information,
            variables,
            result_map,
            to_be_removed: self.to_be_removed,
            parent_id: self.parent_id,
            children_count: self.children_count,
            tasks: BTreeMap::new(),
            initial_content: None,
            tracker: ExecutionTracker::default(),
        })
    }

    /// Returns a listing summary, or `None` for a record never inserted.
    #[must_use]
    pub fn to_info(&self) -> Option<JobInfo> {
        Some(JobInfo {
            id: self.id?,
            name: self.name.clone(),
            owner: self.owner.clone(),
            project_name: self.project_name.clone(),
            priority: self.priority,
            status: self.status,
            submitted_time: self.submitted_time,
            start_time: self.start_time,
            finished_time: self.finished_time,
            removed_time: self.removed_time,
            counters: self.counters,
        })
    }
}

impl JobStateRecord {
    /// Captures the mutable columns of a submitted job.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingColumn`] for unsubmitted jobs and
    /// [`RecordError::InconsistentCounters`] when the counters violate the
    /// aggregate invariant.
    pub fn from_job(job: &InternalJob, updated_at: i64) -> Result<Self, RecordError> {
        let id = job.id.ok_or(RecordError::missing("job", "id"))?;
        if !job.counters.is_consistent() {
            return Err(RecordError::InconsistentCounters(id));
        }
        Ok(Self {
            id,
            status: job.status,
            start_time: job.start_time,
            in_error_time: job.in_error_time,
            finished_time: job.finished_time,
            last_updated_time: updated_at,
            counters: job.counters,
            result_map: blob::encode_map("result_map", &job.result_map)?,
        })
    }
}

impl JobContentRecord {
    /// Compresses the submitted definition of a job.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Compression`] when compression fails.
    pub fn compress(job_id: JobId, content: &str) -> Result<Self, RecordError> {
        Ok(Self {
            job_id,
            content: blob::compress_content(content)?,
        })
    }

    /// Returns the decompressed definition.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Compression`] when the stored bytes are corrupt.
    pub fn decompress(&self) -> Result<String, RecordError> {
        blob::decompress_content(&self.content)
    }
}
