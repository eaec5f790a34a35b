//! Agent domain module
//!
//! Contains the phase state machine, plans, agent state and the policy that
//! bounds an agent's loops.

pub mod agent_policy;
pub mod entities;
pub mod phase;
pub mod plan;
pub mod plan_parser;
pub mod value_objects;

pub use entities::{AgentLog, AgentSnapshot, AgentState, LogEntry, Task};
pub use phase::{AgentPhase, PhaseEvent};
pub use plan::{Plan, Step, StepDraft};
pub use value_objects::{AgentId, AgentKind, AgentStatus, FailureReason};
