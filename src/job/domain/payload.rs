//! Executable payloads carried by tasks.

use super::{ParseEnumError, Script};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Discriminator selecting the payload variant of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// In-process Java class.
    Java,
    /// Java class run in a forked JVM.
    ForkedJava,
    /// Native command line.
    Native,
    /// In-process script.
    Script,
    /// Script run in a forked JVM.
    ForkedScript,
}

impl TaskType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Java => "JAVA",
            Self::ForkedJava => "FORKED_JAVA",
            Self::Native => "NATIVE",
            Self::Script => "SCRIPT",
            Self::ForkedScript => "FORKED_SCRIPT",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskType {
    type Error = ParseEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "JAVA" => Ok(Self::Java),
            "FORKED_JAVA" => Ok(Self::ForkedJava),
            "NATIVE" => Ok(Self::Native),
            "SCRIPT" => Ok(Self::Script),
            "FORKED_SCRIPT" => Ok(Self::ForkedScript),
            _ => Err(ParseEnumError::new("task type", value)),
        }
    }
}

/// Java class name plus serialized constructor arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JavaExecutable {
    /// Fully qualified executable class.
    pub class_name: String,
    /// Serialized arguments keyed by name.
    pub arguments: BTreeMap<String, Vec<u8>>,
}

/// Native command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeExecutable {
    /// Command and its arguments.
    pub command: Vec<String>,
    /// Working directory, when not inherited.
    pub working_dir: Option<String>,
}

/// Change applied to an environment variable of a forked process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentModifier {
    /// Variable name.
    pub name: String,
    /// Value to set or append.
    pub value: String,
    /// Append to the existing value instead of replacing it.
    pub append: bool,
}

/// Settings for a forked execution environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkEnvironment {
    /// Java installation used by the forked JVM.
    pub java_home: Option<String>,
    /// Working directory of the forked process.
    pub working_dir: Option<String>,
    /// Extra JVM arguments.
    pub jvm_arguments: Vec<String>,
    /// Extra classpath entries.
    pub additional_classpath: Vec<String>,
    /// Environment variable changes.
    pub env_modifiers: Vec<EnvironmentModifier>,
    /// Script run to prepare the environment.
    pub env_script: Option<Script>,
}

/// Executable definition of a task, one variant per task type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPayload {
    /// In-process Java class.
    Java(JavaExecutable),
    /// Java class in a forked JVM.
    ForkedJava {
        /// Class and arguments.
        executable: JavaExecutable,
        /// Fork settings.
        fork: ForkEnvironment,
    },
    /// Native command line.
    Native(NativeExecutable),
    /// In-process script.
    Script(Script),
    /// Script in a forked JVM.
    ForkedScript {
        /// Script to run.
        script: Script,
        /// Fork settings.
        fork: ForkEnvironment,
    },
}

impl TaskPayload {
    /// Returns the discriminator for this payload.
    #[must_use]
    pub const fn task_type(&self) -> TaskType {
        match self {
            Self::Java(_) => TaskType::Java,
            Self::ForkedJava { .. } => TaskType::ForkedJava,
            Self::Native(_) => TaskType::Native,
            Self::Script(_) => TaskType::Script,
            Self::ForkedScript { .. } => TaskType::ForkedScript,
        }
    }

    /// Returns the fork settings of forked variants.
    #[must_use]
    pub const fn fork_environment(&self) -> Option<&ForkEnvironment> {
        match self {
            Self::ForkedJava { fork, .. } | Self::ForkedScript { fork, .. } => Some(fork),
            Self::Java(_) | Self::Native(_) | Self::Script(_) => None,
        }
    }

    /// Returns mutable fork settings; the rest of the payload is fixed once created.
    pub const fn fork_environment_mut(&mut self) -> Option<&mut ForkEnvironment> {
        match self {
            Self::ForkedJava { fork, .. } | Self::ForkedScript { fork, .. } => Some(fork),
            Self::Java(_) | Self::Native(_) | Self::Script(_) => None,
        }
    }
}
