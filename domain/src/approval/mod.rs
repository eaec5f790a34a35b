//! Approval gates.
//!
//! A gate guards either a whole plan revision or a single tool call. It is
//! created `pending`, and resolves exactly once to `approved` or `rejected`.
//! Nothing guarded by a gate runs until the gate is observed `approved`.

use crate::agent::plan::Plan;
use crate::agent::value_objects::{AgentId, unique_suffix};
use crate::tool::entities::{CallId, ToolCall};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GateId(String);

impl GateId {
    pub fn generate() -> Self {
        Self(format!("gate-{}", unique_suffix()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the gate protects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subject", rename_all = "snake_case")]
pub enum GateSubject {
    Plan { revision: u32 },
    ToolCall { call_id: CallId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    Pending,
    Approved,
    Rejected,
}

impl GateState {
    pub fn as_str(&self) -> &str {
        match self {
            GateState::Pending => "pending",
            GateState::Approved => "approved",
            GateState::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("Gate {0} is already resolved")]
    AlreadyResolved(GateId),

    #[error("An edited plan can only answer a plan gate")]
    EditOnToolCall,
}

/// Operator answer to a pending gate.
#[derive(Debug, Clone, PartialEq)]
pub enum HumanDecision {
    Approve,
    Reject { feedback: Option<String> },
    /// Approve a replacement plan instead of the proposed one
    Edit(Plan),
}

impl HumanDecision {
    pub fn reject(feedback: impl Into<String>) -> Self {
        HumanDecision::Reject {
            feedback: Some(feedback.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalGate {
    pub id: GateId,
    pub agent_id: AgentId,
    pub subject: GateSubject,
    state: GateState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl ApprovalGate {
    pub fn for_plan(agent_id: AgentId, plan: &Plan) -> Self {
        Self::pending(
            agent_id,
            GateSubject::Plan {
                revision: plan.revision,
            },
        )
    }

    pub fn for_call(call: &ToolCall) -> Self {
        Self::pending(
            call.agent_id.clone(),
            GateSubject::ToolCall {
                call_id: call.id.clone(),
            },
        )
    }

    fn pending(agent_id: AgentId, subject: GateSubject) -> Self {
        Self {
            id: GateId::generate(),
            agent_id,
            subject,
            state: GateState::Pending,
            feedback: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_approved(&self) -> bool {
        self.state == GateState::Approved
    }

    /// Apply an operator decision. Gates resolve once.
    ///
    /// An edit is accepted only on plan gates; the caller is responsible for
    /// validating and adopting the edited plan.
    pub fn resolve(&mut self, decision: &HumanDecision) -> Result<GateState, GateError> {
        if self.state != GateState::Pending {
            return Err(GateError::AlreadyResolved(self.id.clone()));
        }
        self.state = match decision {
            HumanDecision::Approve => GateState::Approved,
            HumanDecision::Reject { feedback } => {
                self.feedback = feedback.clone();
                GateState::Rejected
            }
            HumanDecision::Edit(_) => match self.subject {
                GateSubject::Plan { .. } => GateState::Approved,
                GateSubject::ToolCall { .. } => return Err(GateError::EditOnToolCall),
            },
        };
        Ok(self.state)
    }
}
