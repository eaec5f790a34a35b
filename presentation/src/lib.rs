//! Presentation layer for gatehouse
//!
//! This crate contains CLI definitions, the console approval channel,
//! progress reporters and report formatters.

pub mod agent;
pub mod cli;
pub mod output;

// Re-export commonly used types
pub use agent::{AgentProgressReporter, ConsoleApprovalChannel, SimpleAgentProgress};
pub use cli::commands::{Cli, Command, ReplayArgs, RunArgs};
pub use output::ReportFormatter;
