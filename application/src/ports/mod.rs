//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure and presentation adapters
//! must implement.

pub mod agent_progress;
pub mod approval_channel;
pub mod hooks;
pub mod inference;
pub mod session_recorder;
pub mod tool_body;
