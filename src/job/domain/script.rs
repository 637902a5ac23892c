//! Scripts attached to tasks and the control-flow decisions they produce.

use super::FlowActionType;
use serde::{Deserialize, Serialize};

/// Script source executed by a named engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    source: String,
    engine: String,
    parameters: Vec<String>,
}

impl Script {
    /// Creates a script without parameters.
    #[must_use]
    pub fn new(source: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            engine: engine.into(),
            parameters: Vec::new(),
        }
    }

    /// Sets positional script parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = String>) -> Self {
        self.parameters = parameters.into_iter().collect();
        self
    }

    /// Returns the script source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the engine name.
    #[must_use]
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Returns the positional parameters.
    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }
}

/// Node selection script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionScript {
    /// Script evaluated on candidate nodes.
    pub script: Script,
    /// Whether the script result may change between evaluations.
    pub dynamic: bool,
}

/// Script deciding which control-flow action follows a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowScript {
    /// Script producing the decision.
    pub script: Script,
    /// Kind of control-flow action.
    pub action: FlowActionType,
    /// Primary target label (if branch, loop head or replicated block).
    pub target: Option<String>,
    /// Else-branch label for IF actions.
    pub target_else: Option<String>,
    /// Continuation label joining IF branches.
    pub target_continuation: Option<String>,
}

/// Control-flow decision captured alongside a task result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowAction {
    /// Kind of action taken.
    pub action_type: FlowActionType,
    /// Selected target label.
    pub target: Option<String>,
    /// Else-branch label.
    pub target_else: Option<String>,
    /// Continuation label.
    pub target_continuation: Option<String>,
    /// Number of replicas requested by a REPLICATE action.
    pub dup_number: u32,
}
