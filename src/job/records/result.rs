//! Append-only task result rows and credential rows.

use super::{RecordError, blob};
use crate::job::domain::{TaskKey, TaskResult};

/// Stored result of one task execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResultRecord {
    /// Task the result belongs to.
    pub task: TaskKey,
    /// Time the result was produced; newest results have the greatest value.
    pub result_time: i64,
    /// Serialized return value.
    pub value: Option<Vec<u8>>,
    /// Serialized exception.
    pub exception: Option<Vec<u8>>,
    /// Captured logs.
    pub output: Option<String>,
    /// Serialized propagated properties.
    pub properties: Option<Vec<u8>>,
    /// Serialized propagated variables.
    pub propagated_variables: Option<Vec<u8>>,
    /// Serialized control-flow decision.
    pub flow_action: Option<Vec<u8>>,
}

impl TaskResultRecord {
    /// Builds the row appended for a result.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when a collection cannot be serialized.
    pub fn from_result(task: TaskKey, result: &TaskResult) -> Result<Self, RecordError> {
        Ok(Self {
            task,
            result_time: result.result_time,
            value: result.value.clone(),
            exception: result.exception.clone(),
            output: result.output.clone(),
            properties: blob::encode_map("properties", &result.properties)?,
            propagated_variables: blob::encode_map(
                "propagated_variables",
                &result.propagated_variables,
            )?,
            flow_action: blob::encode_value("flow_action", result.flow_action.as_ref())?,
        })
    }

    /// Rebuilds the result.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when a blob is malformed.
    pub fn into_result(self) -> Result<TaskResult, RecordError> {
        Ok(TaskResult {
            value: self.value,
            exception: self.exception,
            output: self.output,
            properties: blob::decode_map("properties", self.properties.as_deref())?,
            propagated_variables: blob::decode_map(
                "propagated_variables",
                self.propagated_variables.as_deref(),
            )?,
            flow_action: blob::decode_value("flow_action", self.flow_action.as_deref())?,
            result_time: self.result_time,
        })
    }
}

/// Stored third-party credential of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThirdPartyCredentialRecord {
    /// Owning user.
    pub username: String,
    /// Credential key.
    pub key: String,
    /// Symmetric key encrypted with the scheduler's public key.
    pub encrypted_symmetric_key: Vec<u8>,
    /// Credential value encrypted with the symmetric key.
    pub encrypted_value: Vec<u8>,
}
