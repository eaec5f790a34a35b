//! Application layer for gatehouse
//!
//! This crate contains use cases, port definitions, and engine configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{CoordinatorConfig, EngineConfig};
pub use ports::{
    agent_progress::{AgentProgressNotifier, NoAgentProgress},
    approval_channel::{
        ApprovalChannel, ApprovalError, AutoApproveChannel, AutoRejectChannel, CallReview,
        PlanReview,
    },
    hooks::{HookContext, HookEvent, HookOutcome, HookRunner, NoHooks},
    inference::{InferenceError, InferenceProvider, PlanningRequest, RemediationRequest},
    session_recorder::{NoSessionRecorder, SessionRecorder},
    tool_body::{ChunkSender, ToolBodies, ToolBody, ToolContext},
};
pub use use_cases::agent_handle::AgentHandle;
pub use use_cases::approval::{ApprovalLedger, PlanVerdict};
pub use use_cases::coordination_tools::{
    COORDINATION_TOOLS, CoordinationTools, coordination_definitions,
};
pub use use_cases::coordinator::{AgentCoordinator, CoordinatorError, WaitOutcome};
pub use use_cases::run_agent::{AgentRunner, RunAgentError};
pub use use_cases::session::{RunReport, Session, SessionBuilder};
pub use use_cases::tool_executor::{ExecutionEvent, ToolExecutor};
