//! Tool domain value objects: the uniform result envelope.
//!
//! Every [`ToolCall`](super::entities::ToolCall) ends in exactly one
//! [`ToolResult`]. Faults inside a tool body never escape as errors; the
//! executor turns them into a result with [`ToolStatus::Error`] and a
//! [`ToolError`] carrying a stable code.

use super::entities::CallId;
use serde::{Deserialize, Serialize};

/// Error carried by a failed tool result.
///
/// | Code | Meaning |
/// |------|---------|
/// | `UNKNOWN_TOOL` | Name not in the registry |
/// | `INVALID_ARGUMENT` | Missing, unknown, or mistyped parameter |
/// | `PHASE_MISMATCH` | Tool category not allowed in the agent's phase |
/// | `NOT_FOUND` | File or agent does not exist |
/// | `NO_MATCH` / `AMBIGUOUS_MATCH` / `UNSAFE_EDIT` | Patch safety violation |
/// | `PARENT_NOT_FOUND` / `CAPACITY_EXCEEDED` | Spawn rejected |
/// | `TIMEOUT` | Command or wait timed out |
/// | `DENIED` | Approval gate rejected |
/// | `HOOK_BLOCKED` | A `pre_tool` or `pre_commit` hook failed |
/// | `CANCELLED` | Agent cancelled before or during the call |
/// | `EXECUTION_FAILED` | Anything else the body reported |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ToolError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new("UNKNOWN_TOOL", format!("Unknown tool: {}", name))
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", format!("Not found: {}", resource.into()))
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new("INVALID_ARGUMENT", message)
    }

    pub fn phase_mismatch(tool: &str, phase: &str) -> Self {
        Self::new(
            "PHASE_MISMATCH",
            format!("Tool '{}' is not allowed in phase {}", tool, phase),
        )
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new("EXECUTION_FAILED", message)
    }

    pub fn permission_denied(resource: impl Into<String>) -> Self {
        Self::new(
            "PERMISSION_DENIED",
            format!("Permission denied: {}", resource.into()),
        )
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::new("TIMEOUT", format!("Timed out: {}", operation.into()))
    }

    pub fn hook_blocked(event: &str, command: &str, reason: &str) -> Self {
        Self::new(
            "HOOK_BLOCKED",
            format!("{} hook '{}' failed: {}", event, command, reason),
        )
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self::new("DENIED", reason)
    }

    pub fn cancelled() -> Self {
        Self::new("CANCELLED", "Agent was cancelled")
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for ToolError {}

/// Terminal status of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Error,
    Denied,
    Cancelled,
}

impl ToolStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ToolStatus::Ok => "ok",
            ToolStatus::Error => "error",
            ToolStatus::Denied => "denied",
            ToolStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a call did to the outside world.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffects {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_touched: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands_run: Vec<String>,
}

impl SideEffects {
    pub fn is_empty(&self) -> bool {
        self.files_touched.is_empty() && self.commands_run.is_empty()
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            files_touched: vec![path.into()],
            commands_run: Vec::new(),
        }
    }

    pub fn command(command: impl Into<String>) -> Self {
        Self {
            files_touched: Vec::new(),
            commands_run: vec![command.into()],
        }
    }
}

/// What a tool body hands back on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    #[serde(default)]
    pub side_effects: SideEffects,
    /// Exit code for process-backed tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Structured payload for tools whose callers parse the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_side_effects(mut self, side_effects: SideEffects) -> Self {
        self.side_effects = side_effects;
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Uniform outcome of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: CallId,
    /// Canonical name of the tool (aliases are resolved)
    pub tool_name: String,
    pub status: ToolStatus,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    #[serde(default)]
    pub side_effects: SideEffects,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub duration_ms: u64,
}

impl ToolResult {
    pub fn ok(call_id: CallId, tool_name: impl Into<String>, output: ToolOutput) -> Self {
        Self {
            call_id,
            tool_name: tool_name.into(),
            status: ToolStatus::Ok,
            output: output.content,
            error: None,
            side_effects: output.side_effects,
            exit_code: output.exit_code,
            data: output.data,
            duration_ms: 0,
        }
    }

    pub fn error(call_id: CallId, tool_name: impl Into<String>, error: ToolError) -> Self {
        Self::terminal(call_id, tool_name, ToolStatus::Error, error)
    }

    pub fn denied(call_id: CallId, tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::terminal(call_id, tool_name, ToolStatus::Denied, ToolError::denied(reason))
    }

    pub fn cancelled(call_id: CallId, tool_name: impl Into<String>) -> Self {
        Self::terminal(call_id, tool_name, ToolStatus::Cancelled, ToolError::cancelled())
    }

    fn terminal(
        call_id: CallId,
        tool_name: impl Into<String>,
        status: ToolStatus,
        error: ToolError,
    ) -> Self {
        Self {
            call_id,
            tool_name: tool_name.into(),
            status,
            output: error.to_string(),
            error: Some(error),
            side_effects: SideEffects::default(),
            exit_code: None,
            data: None,
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ToolStatus::Ok
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}
