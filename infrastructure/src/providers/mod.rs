//! Inference provider adapters.
//!
//! The language-model protocol lives outside this crate. The adapter shipped
//! here serves plans from a JSON document on disk, which is enough to drive
//! the engine end to end and to script repeatable sessions.

pub mod plan_file;

pub use plan_file::{PlanFileError, PlanFileProvider};
