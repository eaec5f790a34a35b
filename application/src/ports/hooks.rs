//! Lifecycle hook port.
//!
//! Operators attach their own commands to points in an agent's life: around
//! every tool body, around commits, when a plan is approved and when an
//! agent finishes. The core decides when a hook fires and what a blocking
//! outcome means; the adapter decides how a hook runs.
//!
//! Only [`HookEvent::PreTool`] and [`HookEvent::PreCommit`] can stop
//! anything. A blocked outcome from any other event is logged and ignored.

use async_trait::async_trait;
use gatehouse_domain::AgentId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    /// Before a tool body runs
    PreTool,
    /// After a tool body returns, whatever its status
    PostTool,
    /// Before a `git_commit` body runs
    PreCommit,
    /// After a `git_commit` body succeeds
    PostCommit,
    /// A tool body or an agent failed
    OnError,
    /// An agent completed
    OnComplete,
    /// A plan revision passed its gate
    OnPlanApproved,
    /// A root agent started
    OnStart,
}

impl HookEvent {
    pub const ALL: [HookEvent; 8] = [
        HookEvent::PreTool,
        HookEvent::PostTool,
        HookEvent::PreCommit,
        HookEvent::PostCommit,
        HookEvent::OnError,
        HookEvent::OnComplete,
        HookEvent::OnPlanApproved,
        HookEvent::OnStart,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            HookEvent::PreTool => "pre_tool",
            HookEvent::PostTool => "post_tool",
            HookEvent::PreCommit => "pre_commit",
            HookEvent::PostCommit => "post_commit",
            HookEvent::OnError => "on_error",
            HookEvent::OnComplete => "on_complete",
            HookEvent::OnPlanApproved => "on_plan_approved",
            HookEvent::OnStart => "on_start",
        }
    }

    /// Whether a failing hook stops the operation it precedes.
    pub fn can_block(&self) -> bool {
        matches!(self, HookEvent::PreTool | HookEvent::PreCommit)
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HookEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        HookEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == lower)
            .ok_or_else(|| format!("unknown hook event '{}'", s))
    }
}

/// What a hook is told about the moment it fires.
#[derive(Debug, Clone, PartialEq)]
pub struct HookContext {
    pub agent_id: AgentId,
    /// Canonical tool name, for tool and commit events
    pub tool: Option<String>,
    /// Extra named values (`call_id`, `status`, `error`, `revision`, ...)
    pub vars: Vec<(String, String)>,
}

impl HookContext {
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            tool: None,
            vars: Vec::new(),
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.push((key.into(), value.into()));
        self
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Every matching hook ran and succeeded, or none matched
    Continue,
    /// The first hook that failed; later hooks for the event did not run
    Blocked { command: String, reason: String },
}

impl HookOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, HookOutcome::Blocked { .. })
    }
}

#[async_trait]
pub trait HookRunner: Send + Sync {
    /// Run every hook registered for `event` that applies to `context`.
    async fn run(&self, event: HookEvent, context: &HookContext) -> HookOutcome;
}

/// No hooks configured.
pub struct NoHooks;

#[async_trait]
impl HookRunner for NoHooks {
    async fn run(&self, _event: HookEvent, _context: &HookContext) -> HookOutcome {
        HookOutcome::Continue
    }
}
