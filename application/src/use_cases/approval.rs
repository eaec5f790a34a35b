//! Approval ledger.
//!
//! Creates gates, asks the operator channel (or answers by policy), records
//! every resolution, and remembers which plan revision each agent may
//! execute under its plan gate.

use crate::ports::agent_progress::AgentProgressNotifier;
use crate::ports::approval_channel::{ApprovalChannel, ApprovalError, CallReview, PlanReview};
use crate::ports::session_recorder::SessionRecorder;
use crate::use_cases::agent_handle::AgentHandle;
use gatehouse_domain::{
    AgentId, ApprovalGate, ApprovalMode, GateState, HumanDecision, Plan, SessionRecord,
    ToolCall, ToolDefinition,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Outcome of a plan gate.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanVerdict {
    Approved,
    /// The operator approved a replacement plan
    Edited(Plan),
    Rejected { feedback: Option<String> },
}

pub struct ApprovalLedger {
    channel: Arc<dyn ApprovalChannel>,
    mode: ApprovalMode,
    recorder: Arc<dyn SessionRecorder>,
    progress: Arc<dyn AgentProgressNotifier>,
    approved_revisions: Mutex<HashMap<AgentId, u32>>,
}

impl ApprovalLedger {
    pub fn new(
        channel: Arc<dyn ApprovalChannel>,
        mode: ApprovalMode,
        recorder: Arc<dyn SessionRecorder>,
        progress: Arc<dyn AgentProgressNotifier>,
    ) -> Self {
        Self {
            channel,
            mode,
            recorder,
            progress,
            approved_revisions: Mutex::new(HashMap::new()),
        }
    }

    /// The plan revision whose gate this agent passed, if any.
    pub fn approved_revision(&self, agent: &AgentId) -> Option<u32> {
        self.approved_revisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(agent)
            .copied()
    }

    fn mark_approved(&self, agent: &AgentId, revision: u32) {
        self.approved_revisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(agent.clone(), revision);
    }

    /// Forget the agent's plan gate once nobody can observe it anymore.
    pub fn release(&self, agent: &AgentId) {
        self.approved_revisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(agent);
    }

    /// Ask for a decision unless the mode answers it.
    ///
    /// Waiting is abandoned when the agent is cancelled.
    async fn decide<F>(&self, handle: &AgentHandle, ask: F) -> Result<HumanDecision, ApprovalError>
    where
        F: std::future::Future<Output = Result<HumanDecision, ApprovalError>>,
    {
        match self.mode {
            ApprovalMode::AutoApprove => Ok(HumanDecision::Approve),
            ApprovalMode::AutoReject => Ok(HumanDecision::reject("auto-reject mode")),
            ApprovalMode::Interactive => {
                tokio::select! {
                    biased;
                    _ = handle.cancellation().cancelled() => Err(ApprovalError::Cancelled),
                    decision = ask => decision,
                }
            }
        }
    }

    fn resolve(&self, gate: &mut ApprovalGate, decision: &HumanDecision) -> GateState {
        // A malformed answer (edit on a call gate) counts as a rejection.
        let state = gate.resolve(decision).unwrap_or_else(|_| {
            let _ = gate.resolve(&HumanDecision::reject("edit is not valid for a tool call"));
            GateState::Rejected
        });
        self.recorder.record(&SessionRecord::GateResolved { gate: gate.clone() });
        state
    }

    /// Gate a plan revision.
    pub async fn review_plan(
        &self,
        handle: &AgentHandle,
        goal: &str,
        plan: &Plan,
    ) -> Result<PlanVerdict, ApprovalError> {
        let mut gate = ApprovalGate::for_plan(handle.id().clone(), plan);
        self.progress.on_plan_proposed(handle.id(), plan);
        let review = PlanReview {
            agent_id: handle.id().clone(),
            goal: goal.to_string(),
            plan: plan.clone(),
        };
        let decision = self
            .decide(handle, self.channel.review_plan(&review))
            .await?;
        let state = self.resolve(&mut gate, &decision);
        info!(agent_id = %handle.id(), revision = plan.revision, state = state.as_str(), "Plan gate resolved");

        Ok(match decision {
            HumanDecision::Approve => PlanVerdict::Approved,
            HumanDecision::Edit(edited) => PlanVerdict::Edited(edited),
            HumanDecision::Reject { feedback } => PlanVerdict::Rejected { feedback },
        })
    }

    /// Record that the agent now executes under `revision`'s plan gate.
    pub fn adopt_plan(&self, agent: &AgentId, revision: u32) {
        self.mark_approved(agent, revision);
    }

    /// Gate a single call. Returns `Ok(None)` when approved, or the rejection
    /// feedback.
    pub async fn review_call(
        &self,
        handle: &AgentHandle,
        call: &ToolCall,
        definition: &ToolDefinition,
        reason: String,
        preview: Option<String>,
    ) -> Result<Option<String>, ApprovalError> {
        let mut gate = ApprovalGate::for_call(call);
        let review = CallReview {
            call: call.clone(),
            definition: definition.clone(),
            reason,
            preview,
        };
        let decision = self
            .decide(handle, self.channel.review_call(&review))
            .await?;
        let state = self.resolve(&mut gate, &decision);
        debug!(agent_id = %handle.id(), call_id = %call.id, state = state.as_str(), "Call gate resolved");

        if state == GateState::Approved {
            Ok(None)
        } else {
            Ok(Some(
                gate.feedback
                    .clone()
                    .unwrap_or_else(|| "rejected by operator".to_string()),
            ))
        }
    }
}
