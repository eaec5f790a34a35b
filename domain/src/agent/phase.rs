//! Phase state machine.
//!
//! Every agent moves through the same directed graph:
//!
//! ```text
//! BOOT ─▶ PLANNING ─▶ AWAITING_APPROVAL ─▶ EXECUTING ─▶ VALIDATING ─▶ CI_CHECK ─▶ COMPLETED
//!            ▲                │                ▲   ▲          │            │
//!            └── rejected ────┘                │   └─ tests ──┘            │
//!                                              └──────── ci failed ────────┘
//!
//! any non-terminal phase ─▶ FAILED
//! ```
//!
//! [`transition`] is a pure function of `(phase, event)`. Folding it over a
//! recorded event log with [`replay`] reproduces the phase the agent ended in,
//! which is what makes a session log auditable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Phase of agent execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentPhase {
    Boot,
    Planning,
    AwaitingApproval,
    Executing,
    Validating,
    CiCheck,
    Completed,
    Failed,
}

impl AgentPhase {
    pub fn as_str(&self) -> &str {
        match self {
            AgentPhase::Boot => "BOOT",
            AgentPhase::Planning => "PLANNING",
            AgentPhase::AwaitingApproval => "AWAITING_APPROVAL",
            AgentPhase::Executing => "EXECUTING",
            AgentPhase::Validating => "VALIDATING",
            AgentPhase::CiCheck => "CI_CHECK",
            AgentPhase::Completed => "COMPLETED",
            AgentPhase::Failed => "FAILED",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            AgentPhase::Boot => "Boot",
            AgentPhase::Planning => "Planning",
            AgentPhase::AwaitingApproval => "Awaiting Approval",
            AgentPhase::Executing => "Executing",
            AgentPhase::Validating => "Validating",
            AgentPhase::CiCheck => "CI Check",
            AgentPhase::Completed => "Completed",
            AgentPhase::Failed => "Failed",
        }
    }

    /// `COMPLETED` and `FAILED` have no outgoing edges.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentPhase::Completed | AgentPhase::Failed)
    }
}

impl std::fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An event that drives a phase transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "detail", rename_all = "snake_case")]
pub enum PhaseEvent {
    /// BOOT → PLANNING
    Start,
    /// PLANNING → AWAITING_APPROVAL
    PlanProposed { revision: u32 },
    /// AWAITING_APPROVAL → EXECUTING
    PlanApproved { revision: u32 },
    /// AWAITING_APPROVAL → PLANNING
    PlanRejected { feedback: Option<String> },
    /// EXECUTING → VALIDATING
    StepsFinished,
    /// VALIDATING → CI_CHECK
    ValidationPassed,
    /// VALIDATING → EXECUTING with a remediation revision
    ValidationFailed { remediation_revision: u32 },
    /// CI_CHECK → COMPLETED
    CiPassed,
    /// CI_CHECK → EXECUTING with a remediation revision
    CiFailed { remediation_revision: u32 },
    /// any non-terminal phase → FAILED
    Fault { reason: String },
}

impl PhaseEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PhaseEvent::Start => "start",
            PhaseEvent::PlanProposed { .. } => "plan_proposed",
            PhaseEvent::PlanApproved { .. } => "plan_approved",
            PhaseEvent::PlanRejected { .. } => "plan_rejected",
            PhaseEvent::StepsFinished => "steps_finished",
            PhaseEvent::ValidationPassed => "validation_passed",
            PhaseEvent::ValidationFailed { .. } => "validation_failed",
            PhaseEvent::CiPassed => "ci_passed",
            PhaseEvent::CiFailed { .. } => "ci_failed",
            PhaseEvent::Fault { .. } => "fault",
        }
    }
}

/// A rejected phase transition. Always a caller bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal transition from {from} on '{event}'")]
pub struct IllegalTransition {
    pub from: AgentPhase,
    pub event: String,
}

/// Compute the phase that `event` leads to from `from`.
///
/// Illegal pairs are rejected, never coerced.
pub fn transition(from: AgentPhase, event: &PhaseEvent) -> Result<AgentPhase, IllegalTransition> {
    use AgentPhase::*;

    let next = match (from, event) {
        (Boot, PhaseEvent::Start) => Planning,
        (Planning, PhaseEvent::PlanProposed { .. }) => AwaitingApproval,
        (AwaitingApproval, PhaseEvent::PlanApproved { .. }) => Executing,
        (AwaitingApproval, PhaseEvent::PlanRejected { .. }) => Planning,
        (Executing, PhaseEvent::StepsFinished) => Validating,
        (Validating, PhaseEvent::ValidationPassed) => CiCheck,
        (Validating, PhaseEvent::ValidationFailed { .. }) => Executing,
        (CiCheck, PhaseEvent::CiPassed) => Completed,
        (CiCheck, PhaseEvent::CiFailed { .. }) => Executing,
        (phase, PhaseEvent::Fault { .. }) if !phase.is_terminal() => Failed,
        _ => {
            return Err(IllegalTransition {
                from,
                event: event.name().to_string(),
            });
        }
    };
    Ok(next)
}

/// Fold [`transition`] over an event log starting from `BOOT`.
pub fn replay<'a>(
    events: impl IntoIterator<Item = &'a PhaseEvent>,
) -> Result<AgentPhase, IllegalTransition> {
    events
        .into_iter()
        .try_fold(AgentPhase::Boot, |phase, event| transition(phase, event))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [AgentPhase; 8] = [
        AgentPhase::Boot,
        AgentPhase::Planning,
        AgentPhase::AwaitingApproval,
        AgentPhase::Executing,
        AgentPhase::Validating,
        AgentPhase::CiCheck,
        AgentPhase::Completed,
        AgentPhase::Failed,
    ];

    fn all_events() -> Vec<PhaseEvent> {
        vec![
            PhaseEvent::Start,
            PhaseEvent::PlanProposed { revision: 1 },
            PhaseEvent::PlanApproved { revision: 1 },
            PhaseEvent::PlanRejected { feedback: None },
            PhaseEvent::StepsFinished,
            PhaseEvent::ValidationPassed,
            PhaseEvent::ValidationFailed { remediation_revision: 2 },
            PhaseEvent::CiPassed,
            PhaseEvent::CiFailed { remediation_revision: 2 },
            PhaseEvent::Fault { reason: "x".into() },
        ]
    }

    #[test]
    fn test_happy_path() {
        let events = vec![
            PhaseEvent::Start,
            PhaseEvent::PlanProposed { revision: 1 },
            PhaseEvent::PlanApproved { revision: 1 },
            PhaseEvent::StepsFinished,
            PhaseEvent::ValidationPassed,
            PhaseEvent::CiPassed,
        ];
        assert_eq!(replay(&events).unwrap(), AgentPhase::Completed);
    }

    #[test]
    fn test_rejection_loops_back_to_planning() {
        let events = vec![
            PhaseEvent::Start,
            PhaseEvent::PlanProposed { revision: 1 },
            PhaseEvent::PlanRejected {
                feedback: Some("smaller steps".into()),
            },
        ];
        assert_eq!(replay(&events).unwrap(), AgentPhase::Planning);
    }

    #[test]
    fn test_remediation_loops() {
        assert_eq!(
            transition(
                AgentPhase::Validating,
                &PhaseEvent::ValidationFailed { remediation_revision: 2 }
            ),
            Ok(AgentPhase::Executing)
        );
        assert_eq!(
            transition(AgentPhase::CiCheck, &PhaseEvent::CiFailed { remediation_revision: 3 }),
            Ok(AgentPhase::Executing)
        );
    }

    #[test]
    fn test_terminal_phases_have_no_outgoing_edges() {
        for terminal in [AgentPhase::Completed, AgentPhase::Failed] {
            for event in all_events() {
                assert!(
                    transition(terminal, &event).is_err(),
                    "{terminal} accepted {}",
                    event.name()
                );
            }
        }
    }

    #[test]
    fn test_fault_reaches_failed_from_every_live_phase() {
        let fault = PhaseEvent::Fault { reason: "io".into() };
        for phase in ALL.iter().filter(|p| !p.is_terminal()) {
            assert_eq!(transition(*phase, &fault), Ok(AgentPhase::Failed));
        }
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let err = transition(AgentPhase::Planning, &PhaseEvent::StepsFinished).unwrap_err();
        assert_eq!(err.from, AgentPhase::Planning);
        assert_eq!(err.event, "steps_finished");
        assert_eq!(
            err.to_string(),
            "illegal transition from PLANNING on 'steps_finished'"
        );
        assert!(transition(AgentPhase::Boot, &PhaseEvent::PlanApproved { revision: 1 }).is_err());
    }

    #[test]
    fn test_edge_count_matches_graph() {
        // 9 named edges plus 6 fault edges from the live phases.
        let legal = ALL
            .iter()
            .flat_map(|p| all_events().into_iter().map(move |e| (*p, e)))
            .filter(|(p, e)| transition(*p, e).is_ok())
            .count();
        assert_eq!(legal, 15);
    }

    #[test]
    fn test_replay_matches_stepwise_fold() {
        // Walk a deterministic pseudo-random path of legal events and check
        // that replaying the recorded log lands on the same phase.
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        for _ in 0..200 {
            let mut phase = AgentPhase::Boot;
            let mut log = Vec::new();
            for _ in 0..12 {
                let candidates: Vec<PhaseEvent> = all_events()
                    .into_iter()
                    .filter(|e| transition(phase, e).is_ok())
                    .collect();
                if candidates.is_empty() {
                    break;
                }
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                let event = candidates[(seed as usize) % candidates.len()].clone();
                phase = transition(phase, &event).unwrap();
                log.push(event);
            }
            assert_eq!(replay(&log).unwrap(), phase);
        }
    }

    #[test]
    fn test_phase_serializes_screaming_case() {
        assert_eq!(
            serde_json::to_value(AgentPhase::AwaitingApproval).unwrap(),
            "AWAITING_APPROVAL"
        );
        assert_eq!(AgentPhase::CiCheck.display_name(), "CI Check");
    }
}
