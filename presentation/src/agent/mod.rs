//! Agent presentation components
//!
//! - Console approval gates for plans and mutating tool calls
//! - Progress reporting for agent phases, steps and tool calls

pub mod approval;
pub mod progress;

pub use approval::ConsoleApprovalChannel;
pub use progress::{AgentProgressReporter, SimpleAgentProgress};
