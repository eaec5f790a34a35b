//! Session records and replay.
//!
//! The orchestration core emits one [`SessionRecord`] per observable event.
//! Storage is an outer concern; [`replay`] rebuilds every agent's phase from
//! a stored record stream and flags any recorded phase that disagrees with
//! the fold of [`transition`](crate::agent::phase::transition).

use crate::agent::phase::{AgentPhase, PhaseEvent, transition};
use crate::agent::value_objects::{AgentId, AgentKind};
use crate::approval::ApprovalGate;
use crate::tool::entities::{CallId, ToolCall};
use crate::tool::value_objects::{ToolResult, ToolStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionRecord {
    AgentSpawned {
        agent_id: AgentId,
        parent: Option<AgentId>,
        kind: AgentKind,
        goal: String,
    },
    Transition {
        agent_id: AgentId,
        from: AgentPhase,
        to: AgentPhase,
        event: PhaseEvent,
    },
    ToolCall {
        call: ToolCall,
    },
    OutputChunk {
        agent_id: AgentId,
        call_id: CallId,
        chunk: String,
    },
    ToolResult {
        agent_id: AgentId,
        result: ToolResult,
    },
    GateResolved {
        gate: ApprovalGate,
    },
}

impl SessionRecord {
    pub fn type_name(&self) -> &'static str {
        match self {
            SessionRecord::AgentSpawned { .. } => "agent_spawned",
            SessionRecord::Transition { .. } => "transition",
            SessionRecord::ToolCall { .. } => "tool_call",
            SessionRecord::OutputChunk { .. } => "output_chunk",
            SessionRecord::ToolResult { .. } => "tool_result",
            SessionRecord::GateResolved { .. } => "gate_resolved",
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        match self {
            SessionRecord::AgentSpawned { agent_id, .. }
            | SessionRecord::Transition { agent_id, .. }
            | SessionRecord::OutputChunk { agent_id, .. }
            | SessionRecord::ToolResult { agent_id, .. } => agent_id,
            SessionRecord::ToolCall { call } => &call.agent_id,
            SessionRecord::GateResolved { gate } => &gate.agent_id,
        }
    }
}

/// One agent as reconstructed from a record stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayedAgent {
    pub id: AgentId,
    pub parent: Option<AgentId>,
    pub kind: Option<AgentKind>,
    pub phase: AgentPhase,
    pub transitions: usize,
    pub tool_results: BTreeMap<ToolStatus, usize>,
}

/// A recorded transition that the state machine would not produce.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayMismatch {
    pub agent_id: AgentId,
    /// Position of the record in the stream
    pub position: usize,
    pub expected: Option<AgentPhase>,
    pub recorded: AgentPhase,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayReport {
    pub agents: BTreeMap<AgentId, ReplayedAgent>,
    pub mismatches: Vec<ReplayMismatch>,
}

impl ReplayReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Rebuild agent phases from a record stream.
pub fn replay<'a>(records: impl IntoIterator<Item = &'a SessionRecord>) -> ReplayReport {
    let mut report = ReplayReport::default();

    for (position, record) in records.into_iter().enumerate() {
        let id = record.agent_id().clone();
        let agent = report
            .agents
            .entry(id.clone())
            .or_insert_with(|| ReplayedAgent {
                id: id.clone(),
                parent: None,
                kind: None,
                phase: AgentPhase::Boot,
                transitions: 0,
                tool_results: BTreeMap::new(),
            });

        match record {
            SessionRecord::AgentSpawned { parent, kind, .. } => {
                agent.parent = parent.clone();
                agent.kind = Some(*kind);
            }
            SessionRecord::Transition { to, event, .. } => {
                let computed = transition(agent.phase, event).ok();
                if computed != Some(*to) {
                    report.mismatches.push(ReplayMismatch {
                        agent_id: id,
                        position,
                        expected: computed,
                        recorded: *to,
                    });
                }
                // Trust the recorded phase so one bad line does not cascade.
                agent.phase = *to;
                agent.transitions += 1;
            }
            SessionRecord::ToolResult { result, .. } => {
                *agent.tool_results.entry(result.status).or_default() += 1;
            }
            SessionRecord::ToolCall { .. }
            | SessionRecord::OutputChunk { .. }
            | SessionRecord::GateResolved { .. } => {}
        }
    }

    report
}
