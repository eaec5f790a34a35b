//! Inference provider port
//!
//! The planner that turns a goal into steps. The core treats whatever comes
//! back as untrusted structured data: every step is validated against the
//! tool registry before anything runs.

use async_trait::async_trait;
use gatehouse_domain::{AgentId, AgentKind, Plan, PlanDraft, StepDraft};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("Planner returned no usable plan: {0}")]
    NoPlan(String),

    #[error("Planner unavailable: {0}")]
    Unavailable(String),
}

/// Input for a planning round.
#[derive(Debug, Clone)]
pub struct PlanningRequest {
    pub agent_id: AgentId,
    pub kind: AgentKind,
    pub goal: String,
    /// Revision number the resulting plan will get
    pub revision: u32,
    /// Operator or validator feedback on the previous proposal
    pub feedback: Option<String>,
}

/// Input for a remediation round after failed validation or CI.
#[derive(Debug, Clone)]
pub struct RemediationRequest {
    pub agent_id: AgentId,
    pub goal: String,
    pub plan: Plan,
    /// Human-readable descriptions of what failed
    pub failures: Vec<String>,
    /// 1-based remediation attempt
    pub attempt: u32,
}

#[async_trait]
pub trait InferenceProvider: Send + Sync {
    async fn plan(&self, request: &PlanningRequest) -> Result<PlanDraft, InferenceError>;

    async fn remediate(
        &self,
        request: &RemediationRequest,
    ) -> Result<Vec<StepDraft>, InferenceError>;
}
