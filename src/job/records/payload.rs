//! Durable script and executable payload records.

use super::{RecordError, blob};
use crate::job::domain::{
    EnvironmentModifier, FlowActionType, FlowScript, ForkEnvironment, JavaExecutable,
    NativeExecutable, ParseEnumError, Script, SelectionScript, TaskPayload, TaskType,
};

/// Relationship between a script and the task owning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// Runs before the executable.
    Pre,
    /// Runs after the executable.
    Post,
    /// Runs after the task, even on failure.
    Clean,
    /// Decides the control-flow action.
    Flow,
    /// Selects execution nodes.
    Selection,
    /// Executable of a script task.
    Executable,
    /// Prepares a forked environment.
    Environment,
}

impl ScriptKind {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "PRE",
            Self::Post => "POST",
            Self::Clean => "CLEAN",
            Self::Flow => "FLOW",
            Self::Selection => "SELECTION",
            Self::Executable => "EXECUTABLE",
            Self::Environment => "ENVIRONMENT",
        }
    }
}

impl TryFrom<&str> for ScriptKind {
    type Error = ParseEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "PRE" => Ok(Self::Pre),
            "POST" => Ok(Self::Post),
            "CLEAN" => Ok(Self::Clean),
            "FLOW" => Ok(Self::Flow),
            "SELECTION" => Ok(Self::Selection),
            "EXECUTABLE" => Ok(Self::Executable),
            "ENVIRONMENT" => Ok(Self::Environment),
            _ => Err(ParseEnumError::new("script kind", value)),
        }
    }
}

/// Stored script row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRecord {
    /// Relationship to the owning task.
    pub kind: ScriptKind,
    /// Order among scripts of the same kind.
    pub position: u32,
    /// Script source.
    pub source: String,
    /// Engine name.
    pub engine: String,
    /// Serialized positional parameters.
    pub parameters: Option<Vec<u8>>,
    /// Action of a flow script.
    pub flow_action: Option<FlowActionType>,
    /// Primary flow target.
    pub target: Option<String>,
    /// Else-branch flow target.
    pub target_else: Option<String>,
    /// Continuation flow target.
    pub target_continuation: Option<String>,
    /// Dynamic flag of a selection script.
    pub dynamic: bool,
}

impl ScriptRecord {
    /// Builds a plain script record.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when parameters cannot be serialized.
    pub fn from_script(kind: ScriptKind, position: u32, script: &Script) -> Result<Self, RecordError> {
        Ok(Self {
            kind,
            position,
            source: script.source().to_owned(),
            engine: script.engine().to_owned(),
            parameters: blob::encode_list("parameters", script.parameters())?,
            flow_action: None,
            target: None,
            target_else: None,
            target_continuation: None,
            dynamic: false,
        })
    }

    /// Builds a flow script record.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when parameters cannot be serialized.
    pub fn from_flow(flow: &FlowScript) -> Result<Self, RecordError> {
        Ok(Self {
            flow_action: Some(flow.action),
            target: flow.target.clone(),
            target_else: flow.target_else.clone(),
            target_continuation: flow.target_continuation.clone(),
            ..Self::from_script(ScriptKind::Flow, 0, &flow.script)?
        })
    }

    /// Builds a selection script record.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when parameters cannot be serialized.
    pub fn from_selection(position: u32, selection: &SelectionScript) -> Result<Self, RecordError> {
        Ok(Self {
            dynamic: selection.dynamic,
            ..Self::from_script(ScriptKind::Selection, position, &selection.script)?
        })
    }

    /// Rebuilds the script.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when parameters are malformed.
    pub fn to_script(&self) -> Result<Script, RecordError> {
        let parameters: Vec<String> = blob::decode_list("parameters", self.parameters.as_deref())?;
        Ok(Script::new(self.source.clone(), self.engine.clone()).with_parameters(parameters))
    }

    /// Rebuilds a flow script.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingColumn`] when no flow action is stored.
    pub fn to_flow_script(&self) -> Result<FlowScript, RecordError> {
        let action = self
            .flow_action
            .ok_or(RecordError::missing("script", "flow_action"))?;
        Ok(FlowScript {
            script: self.to_script()?,
            action,
            target: self.target.clone(),
            target_else: self.target_else.clone(),
            target_continuation: self.target_continuation.clone(),
        })
    }

    /// Rebuilds a selection script.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when parameters are malformed.
    pub fn to_selection_script(&self) -> Result<SelectionScript, RecordError> {
        Ok(SelectionScript {
            script: self.to_script()?,
            dynamic: self.dynamic,
        })
    }
}

/// Stored environment modifier row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentModifierRecord {
    /// Variable name.
    pub name: String,
    /// Value.
    pub value: String,
    /// Append instead of replace.
    pub append: bool,
}

/// Type-specific payload row; which columns are used depends on the task type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPayloadRecord {
    /// Executable class of Java tasks.
    pub class_name: Option<String>,
    /// Serialized argument map of Java tasks.
    pub arguments: Option<Vec<u8>>,
    /// Serialized command line of native tasks.
    pub command: Option<Vec<u8>>,
    /// Working directory of native tasks.
    pub working_dir: Option<String>,
    /// Java home of forked tasks.
    pub java_home: Option<String>,
    /// Working directory of forked tasks.
    pub fork_working_dir: Option<String>,
    /// Serialized JVM arguments of forked tasks.
    pub jvm_arguments: Option<Vec<u8>>,
    /// Serialized classpath entries of forked tasks.
    pub additional_classpath: Option<Vec<u8>>,
    /// Environment modifiers of forked tasks.
    pub env_modifiers: Vec<EnvironmentModifierRecord>,
}

impl TaskPayloadRecord {
    /// Flattens a payload into its row and the scripts it owns.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when a collection cannot be serialized.
    pub fn from_payload(payload: &TaskPayload) -> Result<(Self, Vec<ScriptRecord>), RecordError> {
        let mut record = Self::default();
        let mut scripts = Vec::new();
        match payload {
            TaskPayload::Java(executable) => record.set_java(executable)?,
            TaskPayload::ForkedJava { executable, fork } => {
                record.set_java(executable)?;
                scripts.extend(record.set_fork(fork)?);
            }
            TaskPayload::Native(executable) => {
                record.command = blob::encode_list("command", &executable.command)?;
                record.working_dir.clone_from(&executable.working_dir);
            }
            TaskPayload::Script(script) => {
                scripts.push(ScriptRecord::from_script(ScriptKind::Executable, 0, script)?);
            }
            TaskPayload::ForkedScript { script, fork } => {
                scripts.push(ScriptRecord::from_script(ScriptKind::Executable, 0, script)?);
                scripts.extend(record.set_fork(fork)?);
            }
        }
        Ok((record, scripts))
    }

    /// Rebuilds the payload variant selected by `task_type`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingColumn`] when a column required by the
    /// variant is absent, or a blob error when a collection is malformed.
    pub fn into_payload(
        self,
        task_type: TaskType,
        scripts: &[ScriptRecord],
    ) -> Result<TaskPayload, RecordError> {
        match task_type {
            TaskType::Java => Ok(TaskPayload::Java(self.java()?)),
            TaskType::ForkedJava => Ok(TaskPayload::ForkedJava {
                executable: self.java()?,
                fork: self.fork(scripts)?,
            }),
            TaskType::Native => Ok(TaskPayload::Native(NativeExecutable {
                command: blob::decode_list("command", self.command.as_deref())?,
                working_dir: self.working_dir,
            })),
            TaskType::Script => Ok(TaskPayload::Script(executable_script(scripts)?)),
            TaskType::ForkedScript => Ok(TaskPayload::ForkedScript {
                script: executable_script(scripts)?,
                fork: self.fork(scripts)?,
            }),
        }
    }

    fn set_java(&mut self, executable: &JavaExecutable) -> Result<(), RecordError> {
        self.class_name = Some(executable.class_name.clone());
        self.arguments = blob::encode_map("arguments", &executable.arguments)?;
        Ok(())
    }

    fn set_fork(&mut self, fork: &ForkEnvironment) -> Result<Option<ScriptRecord>, RecordError> {
        self.java_home.clone_from(&fork.java_home);
        self.fork_working_dir.clone_from(&fork.working_dir);
        self.jvm_arguments = blob::encode_list("jvm_arguments", &fork.jvm_arguments)?;
        self.additional_classpath =
            blob::encode_list("additional_classpath", &fork.additional_classpath)?;
        self.env_modifiers = fork
            .env_modifiers
            .iter()
            .map(|modifier| EnvironmentModifierRecord {
                name: modifier.name.clone(),
                value: modifier.value.clone(),
                append: modifier.append,
            })
            .collect();
        fork.env_script
            .as_ref()
            .map(|script| ScriptRecord::from_script(ScriptKind::Environment, 0, script))
            .transpose()
    }

    fn java(&self) -> Result<JavaExecutable, RecordError> {
        let class_name = self
            .class_name
            .clone()
            .ok_or(RecordError::missing("task payload", "class_name"))?;
        Ok(JavaExecutable {
            class_name,
            arguments: blob::decode_map("arguments", self.arguments.as_deref())?,
        })
    }

    fn fork(&self, scripts: &[ScriptRecord]) -> Result<ForkEnvironment, RecordError> {
        let env_script = scripts
            .iter()
            .find(|script| script.kind == ScriptKind::Environment)
            .map(ScriptRecord::to_script)
            .transpose()?;
        Ok(ForkEnvironment {
            java_home: self.java_home.clone(),
            working_dir: self.fork_working_dir.clone(),
            jvm_arguments: blob::decode_list("jvm_arguments", self.jvm_arguments.as_deref())?,
            additional_classpath: blob::decode_list(
                "additional_classpath",
                self.additional_classpath.as_deref(),
            )?,
            env_modifiers: self
                .env_modifiers
                .iter()
                .map(|modifier| EnvironmentModifier {
                    name: modifier.name.clone(),
                    value: modifier.value.clone(),
                    append: modifier.append,
                })
                .collect(),
            env_script,
        })
    }
}

fn executable_script(scripts: &[ScriptRecord]) -> Result<Script, RecordError> {
    scripts
        .iter()
        .find(|script| script.kind == ScriptKind::Executable)
        .ok_or(RecordError::missing("task payload", "executable script"))?
        .to_script()
}
