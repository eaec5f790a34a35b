//! Tool domain entities

use crate::agent::phase::AgentPhase;
use crate::agent::value_objects::{AgentId, current_timestamp, unique_suffix};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Capability class of a tool. Decides which phases may invoke it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Inspects the working copy without changing it
    ReadOnly,
    /// Changes files or runs arbitrary processes
    Execution,
    /// Runs the project's test command
    Test,
    /// Writes to the git repository
    Git,
    /// Queries continuous integration
    Ci,
    /// Asks the operator something
    UserInput,
    /// Spawns, waits on, or cancels child agents
    Coordination,
}

impl ToolCategory {
    pub fn as_str(&self) -> &str {
        match self {
            ToolCategory::ReadOnly => "read_only",
            ToolCategory::Execution => "execution",
            ToolCategory::Test => "test",
            ToolCategory::Git => "git",
            ToolCategory::Ci => "ci",
            ToolCategory::UserInput => "user_input",
            ToolCategory::Coordination => "coordination",
        }
    }

    /// Whether a tool of this category may run while an agent is in `phase`.
    pub fn allowed_in(&self, phase: AgentPhase) -> bool {
        use ToolCategory::*;

        match phase {
            AgentPhase::Boot | AgentPhase::Completed | AgentPhase::Failed => false,
            AgentPhase::Planning => matches!(self, ReadOnly | UserInput | Coordination),
            AgentPhase::AwaitingApproval => matches!(self, UserInput),
            AgentPhase::Executing => !matches!(self, Ci),
            AgentPhase::Validating => matches!(self, ReadOnly | Test | UserInput),
            AgentPhase::CiCheck => matches!(self, ReadOnly | Ci | UserInput),
        }
    }
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// JSON type a parameter must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

/// Definition of an invocable tool, as held by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique name of the tool (e.g., "apply_patch")
    pub name: String,
    /// Human-readable description
    pub description: String,
    pub category: ToolCategory,
    /// Whether the tool changes the working copy or repository
    pub mutates: bool,
    /// Whether the tool must pass an approved gate before running
    pub requires_approval: bool,
    /// Explicitly allowed to mutate without a gate
    #[serde(default)]
    pub exempt: bool,
    /// Produces incremental output while running
    #[serde(default)]
    pub streams: bool,
    /// Parameter specifications
    pub parameters: Vec<ToolParameter>,
}

/// Parameter specification for a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub param_type: ParamType,
}

impl ToolDefinition {
    /// A read-only, ungated tool. Use the builders to tighten it.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: ToolCategory,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category,
            mutates: false,
            requires_approval: false,
            exempt: false,
            streams: false,
            parameters: Vec::new(),
        }
    }

    /// Mark the tool as mutating. Mutating tools are gated.
    pub fn mutating(mut self) -> Self {
        self.mutates = true;
        self.requires_approval = true;
        self
    }

    /// Mark the tool as mutating but exempt from approval.
    pub fn exempt(mut self) -> Self {
        self.mutates = true;
        self.requires_approval = false;
        self.exempt = true;
        self
    }

    pub fn gated(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    pub fn streaming(mut self) -> Self {
        self.streams = true;
        self
    }

    pub fn with_parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required,
            param_type: ParamType::String,
        }
    }

    pub fn with_type(mut self, param_type: ParamType) -> Self {
        self.param_type = param_type;
        self
    }
}

/// Identifier of a single tool call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(format!("call-{}", unique_suffix()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a call inside an approved plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStepRef {
    pub revision: u32,
    pub index: u32,
}

/// A request to run a tool. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: CallId,
    /// Name of the tool to call, possibly an alias
    pub tool_name: String,
    /// Arguments passed to the tool
    pub arguments: HashMap<String, serde_json::Value>,
    /// Agent that issued the call
    pub agent_id: AgentId,
    /// Milliseconds since the Unix epoch
    pub issued_at: u64,
    /// Set when the call realizes a step of a plan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_step: Option<PlanStepRef>,
}

impl ToolCall {
    pub fn new(agent_id: AgentId, tool_name: impl Into<String>) -> Self {
        Self {
            id: CallId::generate(),
            tool_name: tool_name.into(),
            arguments: HashMap::new(),
            agent_id,
            issued_at: current_timestamp(),
            plan_step: None,
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn with_arguments(mut self, arguments: HashMap<String, serde_json::Value>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn for_step(mut self, revision: u32, index: u32) -> Self {
        self.plan_step = Some(PlanStepRef { revision, index });
        self
    }

    /// Get a string argument
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}
