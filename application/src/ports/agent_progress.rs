//! Agent execution progress port.
//!
//! [`AgentProgressNotifier`] is an **output port** that the presentation layer
//! implements to show what agents are doing. All callback argument types come
//! from the domain layer.
//!
//! Callbacks arrive from many agents at once; every one carries the agent id.

use gatehouse_domain::{
    AgentId, AgentKind, AgentPhase, AgentStatus, CallId, Plan, Step, ToolCall, ToolResult,
};

/// All methods have default no-op implementations, so implementers only
/// need to override the callbacks they care about.
pub trait AgentProgressNotifier: Send + Sync {
    /// Called when an agent transitions to a new phase
    fn on_phase_change(&self, _agent: &AgentId, _from: AgentPhase, _to: AgentPhase) {}

    /// Called when a plan revision is proposed for approval
    fn on_plan_proposed(&self, _agent: &AgentId, _plan: &Plan) {}

    /// Called when a step begins execution
    fn on_step_start(&self, _agent: &AgentId, _step: &Step, _total: usize) {}

    /// Called when a tool is invoked
    fn on_tool_call(&self, _call: &ToolCall) {}

    /// Called for each chunk a streaming tool produces
    fn on_tool_output(&self, _agent: &AgentId, _call: &CallId, _chunk: &str) {}

    /// Called when a tool returns a result
    fn on_tool_result(&self, _agent: &AgentId, _result: &ToolResult) {}

    /// Called when remediation starts after failed validation or CI
    fn on_remediation(&self, _agent: &AgentId, _attempt: u32, _failures: &[String]) {}

    // ==================== Coordination Callbacks ====================

    /// Called when a child agent is registered
    fn on_agent_spawned(&self, _agent: &AgentId, _parent: &AgentId, _kind: AgentKind) {}

    /// Called when an agent reaches a terminal status
    fn on_agent_finished(&self, _agent: &AgentId, _status: &AgentStatus) {}
}

/// No-op implementation for when progress isn't needed
pub struct NoAgentProgress;

impl AgentProgressNotifier for NoAgentProgress {}
