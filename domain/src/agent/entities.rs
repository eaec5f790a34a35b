//! Agent domain entities

use super::phase::{AgentPhase, IllegalTransition, PhaseEvent, transition};
use super::plan::Plan;
use super::value_objects::{AgentId, AgentKind, AgentStatus, FailureReason, current_timestamp};
use crate::tool::entities::ToolCall;
use crate::tool::value_objects::ToolResult;
use serde::{Deserialize, Serialize};

/// The goal an agent pursues. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    goal: String,
    accepted_at: u64,
}

impl Task {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            accepted_at: current_timestamp(),
        }
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn accepted_at(&self) -> u64 {
        self.accepted_at
    }
}

/// One entry of an agent's append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntry {
    Transition {
        from: AgentPhase,
        to: AgentPhase,
        event: PhaseEvent,
        at: u64,
    },
    Tool {
        call: ToolCall,
        result: ToolResult,
    },
}

impl LogEntry {
    pub fn summary(&self) -> String {
        match self {
            LogEntry::Transition { from, to, event, .. } => {
                format!("{} -> {} ({})", from, to, event.name())
            }
            LogEntry::Tool { result, .. } => {
                format!("{} [{}]", result.tool_name, result.status)
            }
        }
    }
}

/// Append-only history of transitions and tool calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentLog {
    entries: Vec<LogEntry>,
}

impl AgentLog {
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Events of every recorded transition, in order.
    pub fn events(&self) -> impl Iterator<Item = &PhaseEvent> {
        self.entries.iter().filter_map(|e| match e {
            LogEntry::Transition { event, .. } => Some(event),
            _ => None,
        })
    }

    /// Tool results, in order.
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.entries.iter().filter_map(|e| match e {
            LogEntry::Tool { result, .. } => Some(result),
            _ => None,
        })
    }
}

/// State of one agent (Entity).
///
/// The phase only changes through [`AgentState::apply`], which also records
/// the transition, so the log always replays to the current phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub id: AgentId,
    pub parent: Option<AgentId>,
    pub kind: AgentKind,
    task: Task,
    phase: AgentPhase,
    /// Latest plan (approved or proposed)
    pub plan: Option<Plan>,
    log: AgentLog,
    pub remediation_attempts: u32,
    pub plan_revisions: u32,
    pub iterations: u32,
    pub failure: Option<FailureReason>,
}

impl AgentState {
    pub fn new(id: AgentId, kind: AgentKind, task: Task) -> Self {
        Self {
            id,
            parent: None,
            kind,
            task,
            phase: AgentPhase::Boot,
            plan: None,
            log: AgentLog::default(),
            remediation_attempts: 0,
            plan_revisions: 0,
            iterations: 0,
            failure: None,
        }
    }

    pub fn with_parent(mut self, parent: AgentId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    pub fn log(&self) -> &AgentLog {
        &self.log
    }

    /// Advance the phase and record the transition.
    ///
    /// Returns the recorded entry so callers can forward it to a session log.
    pub fn apply(&mut self, event: PhaseEvent) -> Result<LogEntry, IllegalTransition> {
        let from = self.phase;
        let to = transition(from, &event)?;
        self.phase = to;
        let entry = LogEntry::Transition {
            from,
            to,
            event,
            at: current_timestamp(),
        };
        self.log.push(entry.clone());
        Ok(entry)
    }

    /// Move to `FAILED`, remembering why. No-op on a terminal agent.
    pub fn fail(&mut self, reason: FailureReason) -> Option<LogEntry> {
        if self.phase.is_terminal() {
            return None;
        }
        let entry = self
            .apply(PhaseEvent::Fault {
                reason: reason.to_string(),
            })
            .ok()?;
        self.failure = Some(reason);
        Some(entry)
    }

    pub fn record_tool(&mut self, call: ToolCall, result: ToolResult) {
        self.log.push(LogEntry::Tool { call, result });
    }

    /// Terminal status, once the agent has stopped.
    pub fn status(&self) -> Option<AgentStatus> {
        match self.phase {
            AgentPhase::Completed => Some(AgentStatus::Completed),
            AgentPhase::Failed => Some(AgentStatus::from_failure(
                self.failure
                    .clone()
                    .unwrap_or_else(|| FailureReason::StepFailed("unknown".into())),
            )),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id.clone(),
            parent: self.parent.clone(),
            kind: self.kind,
            goal: self.task.goal().to_string(),
            phase: self.phase,
            status: self.status(),
            last_entry: self.log.last().cloned(),
        }
    }
}

/// Non-blocking view of an agent, as returned by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub parent: Option<AgentId>,
    pub kind: AgentKind,
    pub goal: String,
    pub phase: AgentPhase,
    pub status: Option<AgentStatus>,
    pub last_entry: Option<LogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::phase::replay;
    use crate::tool::entities::CallId;
    use crate::tool::value_objects::ToolOutput;

    fn agent() -> AgentState {
        AgentState::new(AgentId::new("root"), AgentKind::Root, Task::new("rename foo"))
    }

    #[test]
    fn test_apply_records_transitions() {
        let mut state = agent();
        state.apply(PhaseEvent::Start).unwrap();
        state.apply(PhaseEvent::PlanProposed { revision: 1 }).unwrap();
        assert_eq!(state.phase(), AgentPhase::AwaitingApproval);
        assert_eq!(state.log().len(), 2);
        assert_eq!(replay(state.log().events()).unwrap(), state.phase());
    }

    #[test]
    fn test_illegal_apply_leaves_state_untouched() {
        let mut state = agent();
        assert!(state.apply(PhaseEvent::StepsFinished).is_err());
        assert_eq!(state.phase(), AgentPhase::Boot);
        assert!(state.log().is_empty());
    }

    #[test]
    fn test_fail_sets_reason_once() {
        let mut state = agent();
        state.apply(PhaseEvent::Start).unwrap();
        assert!(state.fail(FailureReason::Cancelled).is_some());
        assert_eq!(state.phase(), AgentPhase::Failed);
        assert_eq!(state.status(), Some(AgentStatus::Cancelled));
        assert!(state.fail(FailureReason::IterationLimit).is_none());
        assert_eq!(state.failure, Some(FailureReason::Cancelled));
    }

    #[test]
    fn test_snapshot_has_last_entry() {
        let mut state = agent().with_parent(AgentId::new("parent"));
        state.apply(PhaseEvent::Start).unwrap();
        let call = ToolCall::new(state.id.clone(), "read_file");
        let result = ToolResult::ok(CallId::new("c"), "read_file", ToolOutput::text("x"));
        state.record_tool(call, result);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.phase, AgentPhase::Planning);
        assert_eq!(snapshot.parent, Some(AgentId::new("parent")));
        assert!(snapshot.status.is_none());
        assert_eq!(
            snapshot.last_entry.unwrap().summary(),
            "read_file [ok]"
        );
        assert_eq!(state.task().goal(), "rename foo");
    }
}
