//! Infrastructure layer for gatehouse
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: local tool bodies and the patch engine,
//! the JSONL session log, the plan document provider, shell lifecycle
//! hooks, and configuration file loading.

pub mod config;
pub mod hooks;
pub mod logging;
pub mod providers;
pub mod tools;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigLoader, FileConfig, Severity};
pub use hooks::{HookSpec, ShellHookRunner};
pub use logging::{JsonlSessionRecorder, SessionLogError, read_session_log};
pub use providers::{PlanFileError, PlanFileProvider};
pub use tools::{
    PatchEngine, PatchOutcome, ToolSettings, default_bodies, default_definitions,
    default_registry,
};
