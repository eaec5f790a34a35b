//! Agent domain value objects - identities and terminal outcomes.
//!
//! # Identifiers
//! - [`AgentId`] - Unique identifier for an agent within a session
//!
//! # Classification
//! - [`AgentKind`] - Role of an agent in the spawn tree
//! - [`AgentStatus`] - Terminal status observed by `wait`
//! - [`FailureReason`] - Why an agent ended in `FAILED`

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for an agent.
///
/// The root agent and every spawned child get their own id; ids are never
/// reused within a process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(String);

impl AgentId {
    /// Creates an AgentId from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh id with the given prefix (e.g. `explore-3f2a91c0-7`).
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{}-{}", prefix, unique_suffix()))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for AgentId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of an agent.
///
/// Only the root agent is created by the operator; the other kinds are
/// spawned as children through the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Root,
    Explore,
    Plan,
    Execute,
    Research,
}

impl AgentKind {
    pub fn as_str(&self) -> &str {
        match self {
            AgentKind::Root => "root",
            AgentKind::Explore => "explore",
            AgentKind::Plan => "plan",
            AgentKind::Execute => "execute",
            AgentKind::Research => "research",
        }
    }

    /// Parse a kind from its wire name. `root` is not spawnable and is rejected.
    pub fn parse_spawnable(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "explore" => Some(AgentKind::Explore),
            "plan" => Some(AgentKind::Plan),
            "execute" => Some(AgentKind::Execute),
            "research" => Some(AgentKind::Research),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an agent ended in `FAILED`.
///
/// `Cancelled` is kept distinct from real failures so that callers can tell
/// an operator-requested stop apart from a broken run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    Cancelled,
    PlanRejected,
    RemediationExhausted,
    IterationLimit,
    IllegalTransition(String),
    Inference(String),
    StepFailed(String),
}

impl FailureReason {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FailureReason::Cancelled)
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::PlanRejected => write!(f, "plan rejected too many times"),
            FailureReason::RemediationExhausted => write!(f, "remediation attempts exhausted"),
            FailureReason::IterationLimit => write!(f, "iteration limit reached"),
            FailureReason::IllegalTransition(msg) => write!(f, "illegal transition: {}", msg),
            FailureReason::Inference(msg) => write!(f, "inference failed: {}", msg),
            FailureReason::StepFailed(msg) => write!(f, "step failed: {}", msg),
        }
    }
}

/// Terminal status of an agent as observed by `wait`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentStatus {
    Completed,
    Failed { reason: FailureReason },
    Cancelled,
}

impl AgentStatus {
    /// Build the terminal status for an agent that ended with the given reason.
    pub fn from_failure(reason: FailureReason) -> Self {
        if reason.is_cancelled() {
            AgentStatus::Cancelled
        } else {
            AgentStatus::Failed { reason }
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AgentStatus::Completed => "completed",
            AgentStatus::Failed { .. } => "failed",
            AgentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AgentStatus::Completed)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Failed { reason } => write!(f, "failed ({})", reason),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Time-derived hex prefix plus a process-wide counter, so two ids minted in
/// the same nanosecond still differ.
pub(crate) fn unique_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:08x}-{}", (nanos & 0xffff_ffff) as u32, seq)
}

/// Current timestamp in milliseconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
