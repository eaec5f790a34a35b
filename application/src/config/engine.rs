//! Engine parameters: use case loop control.
//!
//! [`EngineConfig`] groups the static parameters the runner and coordinator
//! read at construction. The domain [`AgentPolicy`] carries the approval and
//! loop bounds; everything else here is application wiring.

use gatehouse_domain::AgentPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits applied by the agent coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Live (non-terminal) children a single parent may have at once.
    pub max_children_per_parent: usize,
    /// Used by `wait_agent`/`wait_all_agents` when the call gives no timeout.
    pub default_wait_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_children_per_parent: 4,
            default_wait_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub policy: AgentPolicy,
    pub coordinator: CoordinatorConfig,
    /// Run `run_tests` in VALIDATING when the plan did not run it itself.
    pub validate_with_tests: bool,
    /// Run `ci_status` in CI_CHECK. When false the phase passes straight through.
    pub ci_enabled: bool,
}

impl EngineConfig {
    // ==================== Builder Methods ====================

    pub fn with_policy(mut self, policy: AgentPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_children(mut self, max: usize) -> Self {
        self.coordinator.max_children_per_parent = max;
        self
    }

    pub fn with_default_wait_timeout(mut self, timeout: Duration) -> Self {
        self.coordinator.default_wait_timeout = timeout;
        self
    }

    pub fn with_validation_tests(mut self, enabled: bool) -> Self {
        self.validate_with_tests = enabled;
        self
    }

    pub fn with_ci(mut self, enabled: bool) -> Self {
        self.ci_enabled = enabled;
        self
    }
}
