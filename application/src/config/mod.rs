//! Application-level configuration.
//!
//! - [`EngineConfig`]: loop bounds, approval policy, coordinator limits and
//!   which checks run after execution

pub mod engine;

pub use engine::{CoordinatorConfig, EngineConfig};
