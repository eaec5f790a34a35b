//! Governance configuration: `[agent]`, `[approval]` and `[coordinator]`

use super::{ConfigIssue, Severity};
use gatehouse_domain::ApprovalMode;
use gatehouse_domain::agent::agent_policy::DEFAULT_DANGEROUS_PATTERNS;
use serde::{Deserialize, Serialize};

/// Raw agent configuration from TOML
///
/// # Example
///
/// ```toml
/// [agent]
/// approval_mode = "interactive"   # "interactive", "auto_approve", "auto_reject"
/// max_plan_revisions = 3
/// max_remediation_attempts = 2
/// max_iterations = 50
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAgentConfig {
    pub approval_mode: String,
    /// Rejected plans allowed before the agent fails
    pub max_plan_revisions: u32,
    /// Remediation rounds after failed validation or CI
    pub max_remediation_attempts: u32,
    /// Executed steps across all revisions
    pub max_iterations: u32,
}

impl Default for FileAgentConfig {
    fn default() -> Self {
        Self {
            approval_mode: "interactive".to_string(),
            max_plan_revisions: 3,
            max_remediation_attempts: 2,
            max_iterations: 50,
        }
    }
}

impl FileAgentConfig {
    /// Parse approval_mode, returning a warning on failure.
    pub fn parse_approval_mode(&self) -> (ApprovalMode, Vec<ConfigIssue>) {
        match self.approval_mode.parse::<ApprovalMode>() {
            Ok(mode) => (mode, vec![]),
            Err(_) => {
                let issue = ConfigIssue {
                    severity: Severity::Warning,
                    field: "agent.approval_mode".to_string(),
                    message: format!(
                        "unknown value '{}' (expected interactive, auto_approve or auto_reject), falling back to 'interactive'",
                        self.approval_mode
                    ),
                };
                (ApprovalMode::default(), vec![issue])
            }
        }
    }

    pub(super) fn issues(&self) -> Vec<ConfigIssue> {
        let mut issues = self.parse_approval_mode().1;
        if self.max_iterations == 0 {
            issues.push(ConfigIssue::zero("agent.max_iterations", 50));
        }
        issues
    }
}

/// Raw approval configuration from TOML
///
/// ```toml
/// [approval]
/// require_approval = true
/// dangerous_patterns = ["rm -rf", "git push --force"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileApprovalConfig {
    /// When false, mutating calls outside an approved plan run without asking
    pub require_approval: bool,
    /// Commands containing any of these always get their own gate
    pub dangerous_patterns: Vec<String>,
}

impl Default for FileApprovalConfig {
    fn default() -> Self {
        Self {
            require_approval: true,
            dangerous_patterns: DEFAULT_DANGEROUS_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl FileApprovalConfig {
    pub(super) fn issues(&self) -> Vec<ConfigIssue> {
        self.dangerous_patterns
            .iter()
            .filter(|p| p.trim().is_empty())
            .map(|_| ConfigIssue {
                severity: Severity::Warning,
                field: "approval.dangerous_patterns".to_string(),
                message: "empty pattern matches every command and is ignored".to_string(),
            })
            .take(1)
            .collect()
    }

    /// Patterns with blanks removed.
    pub fn patterns(&self) -> Vec<String> {
        self.dangerous_patterns
            .iter()
            .filter(|p| !p.trim().is_empty())
            .cloned()
            .collect()
    }
}

/// Raw coordinator configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCoordinatorConfig {
    /// Live children a single parent may have at once
    pub max_children_per_parent: usize,
    pub default_wait_timeout_secs: u64,
}

impl Default for FileCoordinatorConfig {
    fn default() -> Self {
        Self {
            max_children_per_parent: 4,
            default_wait_timeout_secs: 300,
        }
    }
}

impl FileCoordinatorConfig {
    pub(super) fn issues(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.max_children_per_parent == 0 {
            issues.push(ConfigIssue::zero("coordinator.max_children_per_parent", 4));
        }
        if self.default_wait_timeout_secs == 0 {
            issues.push(ConfigIssue::zero("coordinator.default_wait_timeout_secs", 300));
        }
        issues
    }
}
