//! Errors raised while converting between records and domain objects.

use crate::job::domain::{JobId, ParseEnumError};
use std::sync::Arc;
use thiserror::Error;

/// Record conversion failures.
///
/// These indicate corrupted or incompatible stored data and are never retried.
#[derive(Debug, Clone, Error)]
pub enum RecordError {
    /// The stored task-type discriminator names no known payload variant.
    #[error("illegal state: unknown task type discriminator '{0}'")]
    UnknownTaskType(String),

    /// A stored enumeration value could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseEnumError),

    /// A serialized column could not be encoded or decoded.
    #[error("malformed blob in column {column}: {source}")]
    Blob {
        /// Column holding the blob.
        column: &'static str,
        /// Underlying serialization error.
        source: Arc<serde_json::Error>,
    },

    /// A column required by the record is absent.
    #[error("{record} record is missing required column {column}")]
    MissingColumn {
        /// Record kind.
        record: &'static str,
        /// Missing column.
        column: &'static str,
    },

    /// Job content could not be compressed or decompressed.
    #[error("job content compression failed: {0}")]
    Compression(Arc<std::io::Error>),

    /// A numeric value does not fit its column.
    #[error("value out of range for column {0}")]
    OutOfRange(&'static str),

    /// The task counters of a job violate the aggregate invariant.
    #[error("job {0} has inconsistent task counters")]
    InconsistentCounters(JobId),
}

impl RecordError {
    pub(crate) fn blob(column: &'static str, err: serde_json::Error) -> Self {
        Self::Blob {
            column,
            source: Arc::new(err),
        }
    }

    pub(crate) const fn missing(record: &'static str, column: &'static str) -> Self {
        Self::MissingColumn { record, column }
    }
}
