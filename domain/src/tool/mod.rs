//! Tool domain module
//!
//! This module defines how agents reach the outside world: every effector is
//! a named tool with a [`ToolDefinition`], is invoked through a [`ToolCall`],
//! and answers with exactly one [`ToolResult`].
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌────────────────┐    ┌──────────────┐
//! │ ToolRegistry │───▶│ ToolCall     │───▶│ ToolInvocation │───▶│ ToolResult   │
//! │ (by name)    │    │ (name, args) │    │ (typed args)   │    │ (envelope)   │
//! └──────┬───────┘    └──────────────┘    └────────────────┘    └──────────────┘
//!        │
//!        ├─ aliases: "bash" → "run_command"
//!        └─ tools:   "run_command" → ToolDefinition
//! ```
//!
//! # Gating
//!
//! | Category | Examples | Gate |
//! |----------|----------|------|
//! | `read_only` | `read_file`, `git_status` | none |
//! | `execution` | `apply_patch`, `run_command` | plan or per call |
//! | `test` | `run_tests` | none (exempt) |
//! | `git` | `git_commit` | plan or per call |
//! | `coordination` | `spawn_agent`, `wait_agent` | none |
//!
//! The registry refuses a mutating tool that is neither gated nor exempt.

pub mod entities;
pub mod invocation;
pub mod registry;
pub mod traits;
pub mod value_objects;

pub use entities::{CallId, ToolCall, ToolCategory, ToolDefinition};
pub use invocation::ToolInvocation;
pub use registry::{RegistryError, ToolRegistry};
pub use traits::{DefaultToolValidator, ToolValidator};
pub use value_objects::{ToolError, ToolResult, ToolStatus};
