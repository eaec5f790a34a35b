//! Domain layer for gatehouse
//!
//! This crate contains the core rules of the governed execution engine.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Phases
//!
//! Every agent walks the same state machine, from `BOOT` to `COMPLETED` or
//! `FAILED`. [`transition`] is the only way to move between phases, and
//! folding it over a recorded event log reproduces the agent's phase.
//!
//! ## Gates
//!
//! Mutating tools pass through an [`ApprovalGate`] before they run. A plan
//! gate approves every step of one plan revision; other mutating calls get
//! their own gate.
//!
//! ## Patches
//!
//! [`compute_patch`] is the pure half of the patch engine: it refuses
//! binary files, empty patterns and any match count other than the expected
//! one.

pub mod agent;
pub mod approval;
pub mod patch;
pub mod session;
pub mod tool;

pub use agent::{
    agent_policy::{AgentPolicy, ApprovalMode, GateRequirement},
    entities::{AgentLog, AgentSnapshot, AgentState, LogEntry, Task},
    phase::{AgentPhase, IllegalTransition, PhaseEvent, replay, transition},
    plan::{Plan, PlanError, Step, StepDraft},
    plan_parser::{PlanDraft, parse_plan, parse_plan_json},
    value_objects::{AgentId, AgentKind, AgentStatus, FailureReason, current_timestamp},
};
pub use approval::{ApprovalGate, GateError, GateId, GateState, GateSubject, HumanDecision};
pub use patch::{PatchComputation, PatchError, PatchRequest, compute_patch};
pub use session::{ReplayReport, SessionRecord};
pub use tool::{
    entities::{CallId, ParamType, PlanStepRef, ToolCall, ToolCategory, ToolDefinition, ToolParameter},
    invocation::{ToolInvocation, names},
    registry::{RegistryError, ToolRegistry},
    traits::{DefaultToolValidator, ToolValidator},
    value_objects::{SideEffects, ToolError, ToolOutput, ToolResult, ToolStatus},
};
