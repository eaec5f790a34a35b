//! Agent policy: domain-level behavioral constraints.
//!
//! [`AgentPolicy`] holds the static rules that decide when an approval gate
//! is needed and how far an agent may loop before it gives up.

use crate::tool::entities::ToolDefinition;
use crate::tool::invocation::ToolInvocation;
use serde::{Deserialize, Serialize};

/// How approval gates are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Ask the operator
    #[default]
    Interactive,
    /// Approve everything without asking
    AutoApprove,
    /// Reject everything without asking
    AutoReject,
}

impl ApprovalMode {
    pub fn as_str(&self) -> &str {
        match self {
            ApprovalMode::Interactive => "interactive",
            ApprovalMode::AutoApprove => "auto_approve",
            ApprovalMode::AutoReject => "auto_reject",
        }
    }
}

impl std::str::FromStr for ApprovalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "interactive" => Ok(ApprovalMode::Interactive),
            "auto_approve" | "yes" => Ok(ApprovalMode::AutoApprove),
            "auto_reject" | "no" => Ok(ApprovalMode::AutoReject),
            other => Err(format!("unknown approval mode: {}", other)),
        }
    }
}

impl std::fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which gate, if any, a call must pass before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRequirement {
    /// Run immediately
    None,
    /// Covered by the approved plan gate of the current revision
    Plan,
    /// Needs its own gate
    PerCall,
}

pub const DEFAULT_DANGEROUS_PATTERNS: [&str; 5] = [
    "rm -rf",
    "git push --force",
    "git reset --hard",
    "DROP TABLE",
    "DELETE FROM",
];

/// Agent behavioral policy: static domain constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPolicy {
    pub approval_mode: ApprovalMode,
    /// When false, gated tools run without asking (the plan gate still applies)
    pub require_approval: bool,
    /// Command substrings that always need a per-call gate
    pub dangerous_patterns: Vec<String>,
    /// Rejected plan proposals allowed before the agent fails
    pub max_plan_revisions: u32,
    /// Remediation rounds allowed after failed validation or CI
    pub max_remediation_attempts: u32,
    /// Steps executed across all revisions before the agent fails
    pub max_iterations: u32,
}

impl Default for AgentPolicy {
    fn default() -> Self {
        Self {
            approval_mode: ApprovalMode::Interactive,
            require_approval: true,
            dangerous_patterns: DEFAULT_DANGEROUS_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_plan_revisions: 3,
            max_remediation_attempts: 2,
            max_iterations: 50,
        }
    }
}

impl AgentPolicy {
    // ==================== Builder Methods ====================

    pub fn with_approval_mode(mut self, mode: ApprovalMode) -> Self {
        self.approval_mode = mode;
        self
    }

    pub fn with_require_approval(mut self, require: bool) -> Self {
        self.require_approval = require;
        self
    }

    pub fn with_dangerous_patterns(mut self, patterns: Vec<String>) -> Self {
        self.dangerous_patterns = patterns;
        self
    }

    pub fn with_max_plan_revisions(mut self, max: u32) -> Self {
        self.max_plan_revisions = max;
        self
    }

    pub fn with_max_remediation_attempts(mut self, max: u32) -> Self {
        self.max_remediation_attempts = max;
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// The first dangerous pattern contained in `command`, if any.
    pub fn dangerous_pattern<'a>(&'a self, command: &str) -> Option<&'a str> {
        self.dangerous_patterns
            .iter()
            .map(|p| p.as_str())
            .find(|p| !p.is_empty() && command.contains(p))
    }

    /// Decide which gate a call needs.
    ///
    /// `covered_by_plan` is true when the call realizes a step of the plan
    /// revision the operator approved.
    pub fn gate_for(
        &self,
        definition: &ToolDefinition,
        invocation: &ToolInvocation,
        covered_by_plan: bool,
    ) -> GateRequirement {
        if !definition.requires_approval {
            return GateRequirement::None;
        }
        if invocation
            .command_line()
            .and_then(|cmd| self.dangerous_pattern(cmd))
            .is_some()
        {
            return GateRequirement::PerCall;
        }
        if covered_by_plan {
            GateRequirement::Plan
        } else if self.require_approval {
            GateRequirement::PerCall
        } else {
            GateRequirement::None
        }
    }

    pub fn remediation_allowed(&self, attempts_so_far: u32) -> bool {
        attempts_so_far < self.max_remediation_attempts
    }

    pub fn revision_allowed(&self, rejections_so_far: u32) -> bool {
        rejections_so_far < self.max_plan_revisions
    }
}
