//! Operator approval channel port.
//!
//! Answers pending approval gates. The core blocks only the requesting agent
//! while waiting; sibling agents keep running.
//!
//! # Built-in Implementations
//!
//! - [`AutoApproveChannel`] - Always approves
//! - [`AutoRejectChannel`] - Always rejects
//!
//! For interactive use, see `ConsoleApprovalChannel` in the presentation layer.

use async_trait::async_trait;
use gatehouse_domain::{AgentId, HumanDecision, Plan, ToolCall, ToolDefinition};
use thiserror::Error;

/// Failures of the channel itself, not operator decisions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("Approval cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    IoError(String),
}

/// A plan waiting for approval.
#[derive(Debug, Clone)]
pub struct PlanReview {
    pub agent_id: AgentId,
    pub goal: String,
    pub plan: Plan,
}

/// A single tool call waiting for approval.
#[derive(Debug, Clone)]
pub struct CallReview {
    pub call: ToolCall,
    pub definition: ToolDefinition,
    /// Why this call needs its own gate (e.g. dangerous pattern)
    pub reason: String,
    /// Rendered preview of the effect, when the tool can produce one
    pub preview: Option<String>,
}

#[async_trait]
pub trait ApprovalChannel: Send + Sync {
    async fn review_plan(&self, review: &PlanReview) -> Result<HumanDecision, ApprovalError>;

    async fn review_call(&self, review: &CallReview) -> Result<HumanDecision, ApprovalError>;
}

pub struct AutoApproveChannel;

#[async_trait]
impl ApprovalChannel for AutoApproveChannel {
    async fn review_plan(&self, _review: &PlanReview) -> Result<HumanDecision, ApprovalError> {
        Ok(HumanDecision::Approve)
    }

    async fn review_call(&self, _review: &CallReview) -> Result<HumanDecision, ApprovalError> {
        Ok(HumanDecision::Approve)
    }
}

/// Safest non-interactive mode.
pub struct AutoRejectChannel;

#[async_trait]
impl ApprovalChannel for AutoRejectChannel {
    async fn review_plan(&self, _review: &PlanReview) -> Result<HumanDecision, ApprovalError> {
        Ok(HumanDecision::reject("auto-reject mode"))
    }

    async fn review_call(&self, _review: &CallReview) -> Result<HumanDecision, ApprovalError> {
        Ok(HumanDecision::reject("auto-reject mode"))
    }
}
