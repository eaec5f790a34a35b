//! Use cases
//!
//! Application-level operations that orchestrate domain logic: the tool
//! executor, the approval ledger, the per-agent phase loop and the agent
//! coordinator.

pub mod agent_handle;
pub mod approval;
pub mod coordination_tools;
pub mod coordinator;
pub mod run_agent;
pub mod session;
pub mod tool_executor;

#[cfg(test)]
pub(crate) mod test_support;
