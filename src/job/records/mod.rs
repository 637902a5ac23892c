//! Durable record schema and conversions to and from the domain model.
//!
//! Records are plain data shaped like the stored rows. Collection-valued
//! columns are opaque serialized blobs and the
//! task payload variant is selected by the stored `task_type` discriminator.

mod blob;
mod error;
mod job;
mod payload;
mod result;
mod task;

pub use blob::{compress_content, decompress_content};
pub use error::RecordError;
pub use job::{JobContentRecord, JobRecord, JobStateRecord, JobVariableRecord};
pub use payload::{EnvironmentModifierRecord, ScriptKind, ScriptRecord, TaskPayloadRecord};
pub use result::{TaskResultRecord, ThirdPartyCredentialRecord};
pub use task::{
    SelectorRecord, TaskEdges, TaskRecord, TaskStateRecord, TaskVariableRecord, edges_of,
};
