//! Type definitions for the agent runner.

use crate::ports::inference::InferenceError;
use gatehouse_domain::{FailureReason, IllegalTransition, ToolResult};
use thiserror::Error;

/// Why a phase loop stopped before `COMPLETED`.
#[derive(Error, Debug)]
pub enum RunAgentError {
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Plan rejected {0} times")]
    PlanRejected(u32),

    #[error("Remediation attempts exhausted")]
    RemediationExhausted,

    #[error("Iteration limit of {0} reached")]
    IterationLimit(u32),

    #[error("Step failed: {0}")]
    StepFailed(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl RunAgentError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunAgentError::Cancelled)
    }

    pub fn into_failure(self) -> FailureReason {
        match self {
            RunAgentError::IllegalTransition(e) => FailureReason::IllegalTransition(e.to_string()),
            RunAgentError::Inference(e) => FailureReason::Inference(e.to_string()),
            RunAgentError::PlanRejected(_) => FailureReason::PlanRejected,
            RunAgentError::RemediationExhausted => FailureReason::RemediationExhausted,
            RunAgentError::IterationLimit(_) => FailureReason::IterationLimit,
            RunAgentError::StepFailed(msg) => FailureReason::StepFailed(msg),
            RunAgentError::Cancelled => FailureReason::Cancelled,
        }
    }
}

/// What running one plan revision produced.
#[derive(Debug, Default)]
pub(super) struct StepsOutcome {
    /// Descriptions of failed steps; execution stops at the first one
    pub failures: Vec<String>,
    /// Latest `run_tests` result among the executed steps
    pub last_test: Option<ToolResult>,
}

/// Which check sent the agent back to EXECUTING.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RemediationCause {
    Validation,
    Ci,
}
