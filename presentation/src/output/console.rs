//! Console output formatter for run and replay reports

use colored::Colorize;
use gatehouse_application::RunReport;
use gatehouse_domain::session::ReplayedAgent;
use gatehouse_domain::{AgentStatus, LogEntry, ReplayReport, ToolStatus};
use serde_json::json;

/// Formats reports for console display
pub struct ReportFormatter;

impl ReportFormatter {
    /// Format the final report of a run, one line per executed step.
    pub fn format(report: &RunReport) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Gatehouse Run"));
        output.push('\n');
        output.push_str(&format!("{} {}\n", "Goal:".cyan().bold(), report.goal));
        output.push_str(&format!("{} {}\n", "Agent:".cyan().bold(), report.agent_id));
        output.push_str(&format!(
            "{} {} ({})\n",
            "Status:".cyan().bold(),
            Self::status(&report.status),
            report.phase
        ));
        if let Some(plan) = &report.plan {
            output.push_str(&format!(
                "{} revision {}, {} steps\n",
                "Plan:".cyan().bold(),
                plan.revision,
                plan.len()
            ));
        }

        let tool_entries: Vec<_> = report
            .entries
            .iter()
            .filter_map(|entry| match entry {
                LogEntry::Tool { call, result } => Some((call, result)),
                LogEntry::Transition { .. } => None,
            })
            .collect();

        if !tool_entries.is_empty() {
            output.push_str(&Self::section_header("Steps"));
            for (call, result) in tool_entries {
                let position = match &call.plan_step {
                    Some(step) => format!("r{}.{}", step.revision, step.index),
                    None => "-".to_string(),
                };
                output.push_str(&format!(
                    "  {:<6} {:<10} {}",
                    position,
                    Self::tool_status(result.status),
                    result.tool_name
                ));
                if let Some(code) = result.exit_code {
                    output.push_str(&format!(" (exit {})", code));
                }
                if let Some(error) = &result.error {
                    output.push_str(&format!(" {}", format!("{}: {}", error.code, error.message).red()));
                }
                output.push('\n');

                let touched = &result.side_effects.files_touched;
                if !touched.is_empty() {
                    output.push_str(&format!("         {}\n", touched.join(", ").dimmed()));
                }
            }
        }

        if !report.children.is_empty() {
            output.push_str(&Self::section_header("Child Agents"));
            for child in &report.children {
                let status = match &child.status {
                    Some(status) => Self::status(status),
                    None => "running".yellow().to_string(),
                };
                output.push_str(&format!(
                    "  {} [{}] {} - {}\n",
                    child.id,
                    child.kind.as_str(),
                    status,
                    child.goal
                ));
            }
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON
    pub fn format_json(report: &RunReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format a replay check.
    pub fn format_replay(report: &ReplayReport) -> String {
        let mut output = String::new();
        output.push_str(&Self::header("Session Replay"));
        output.push('\n');

        for agent in report.agents.values() {
            output.push_str(&format!(
                "  {} {} {} ({} transitions{})\n",
                agent.id.to_string().bold(),
                agent.kind.map(|k| k.as_str().to_string()).unwrap_or_default().dimmed(),
                agent.phase,
                agent.transitions,
                Self::result_counts(agent)
            ));
        }

        output.push('\n');
        if report.is_consistent() {
            output.push_str(&format!(
                "{}\n",
                "Consistent: every recorded transition is reproducible".green()
            ));
        } else {
            output.push_str(&format!(
                "{}\n",
                format!("{} mismatched transitions", report.mismatches.len()).red().bold()
            ));
            for mismatch in &report.mismatches {
                let expected = mismatch
                    .expected
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "no transition".to_string());
                output.push_str(&format!(
                    "  record {}: {} recorded {}, expected {}\n",
                    mismatch.position + 1,
                    mismatch.agent_id,
                    mismatch.recorded,
                    expected
                ));
            }
        }
        output.push_str(&Self::footer());
        output
    }

    /// Format a replay check as JSON
    pub fn format_replay_json(report: &ReplayReport) -> String {
        let agents: Vec<_> = report
            .agents
            .values()
            .map(|agent| {
                let results: serde_json::Map<String, serde_json::Value> = agent
                    .tool_results
                    .iter()
                    .map(|(status, count)| (status.as_str().to_string(), json!(count)))
                    .collect();
                json!({
                    "agent_id": agent.id,
                    "parent": agent.parent,
                    "kind": agent.kind,
                    "phase": agent.phase,
                    "transitions": agent.transitions,
                    "tool_results": results,
                })
            })
            .collect();
        let mismatches: Vec<_> = report
            .mismatches
            .iter()
            .map(|m| {
                json!({
                    "agent_id": m.agent_id,
                    "position": m.position,
                    "expected": m.expected,
                    "recorded": m.recorded,
                })
            })
            .collect();
        let value = json!({
            "consistent": report.is_consistent(),
            "agents": agents,
            "mismatches": mismatches,
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }

    fn result_counts(agent: &ReplayedAgent) -> String {
        agent
            .tool_results
            .iter()
            .map(|(status, count)| format!(", {} {}", count, status))
            .collect()
    }

    fn status(status: &AgentStatus) -> String {
        match status {
            AgentStatus::Completed => status.to_string().green().bold().to_string(),
            AgentStatus::Failed { .. } => status.to_string().red().bold().to_string(),
            AgentStatus::Cancelled => status.to_string().yellow().to_string(),
        }
    }

    fn tool_status(status: ToolStatus) -> String {
        let text = format!("{:<10}", status.as_str());
        match status {
            ToolStatus::Ok => text.green().to_string(),
            ToolStatus::Error => text.red().to_string(),
            ToolStatus::Denied => text.yellow().to_string(),
            ToolStatus::Cancelled => text.dimmed().to_string(),
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_domain::session::replay;
    use gatehouse_domain::{
        AgentId, AgentKind, AgentPhase, FailureReason, PhaseEvent, Plan, PlanStepRef,
        SessionRecord, StepDraft, ToolCall, ToolOutput, ToolResult,
    };

    fn report() -> RunReport {
        let mut call = ToolCall::new(AgentId::new("root"), "apply_patch");
        call.plan_step = Some(PlanStepRef { revision: 1, index: 1 });
        let mut output = ToolOutput::text("patched");
        output.side_effects.files_touched = vec!["a.py".into()];
        let result = ToolResult::ok(call.id.clone(), "apply_patch", output);

        RunReport {
            agent_id: AgentId::new("root"),
            goal: "Rename the helper".into(),
            status: AgentStatus::Failed {
                reason: FailureReason::RemediationExhausted,
            },
            phase: AgentPhase::Failed,
            plan: Some(Plan::new("g", 1, vec![StepDraft::new("Patch", "apply_patch")])),
            entries: vec![LogEntry::Tool { call, result }],
            children: vec![],
        }
    }

    #[test]
    fn test_format_lists_steps() {
        colored::control::set_override(false);
        let text = ReportFormatter::format(&report());
        assert!(text.contains("Goal: Rename the helper"));
        assert!(text.contains("Status: failed"));
        assert!(text.contains("Plan: revision 1, 1 steps"));
        assert!(text.contains("r1.1   ok         apply_patch"));
        assert!(text.contains("a.py"));
    }

    #[test]
    fn test_format_json_is_valid() {
        let value: serde_json::Value =
            serde_json::from_str(&ReportFormatter::format_json(&report())).unwrap();
        assert_eq!(value["goal"], "Rename the helper");
        assert_eq!(value["phase"], "FAILED");
    }

    #[test]
    fn test_format_replay_reports_mismatch() {
        colored::control::set_override(false);
        let records = vec![
            SessionRecord::AgentSpawned {
                agent_id: AgentId::new("root"),
                parent: None,
                kind: AgentKind::Root,
                goal: "g".into(),
            },
            SessionRecord::Transition {
                agent_id: AgentId::new("root"),
                from: AgentPhase::Boot,
                to: AgentPhase::Executing,
                event: PhaseEvent::Start,
            },
        ];
        let report = replay(&records);

        let text = ReportFormatter::format_replay(&report);
        assert!(text.contains("1 mismatched transitions"));
        assert!(text.contains("record 2: root recorded EXECUTING, expected PLANNING"));

        let value: serde_json::Value =
            serde_json::from_str(&ReportFormatter::format_replay_json(&report)).unwrap();
        assert_eq!(value["consistent"], false);
        assert_eq!(value["agents"][0]["phase"], "EXECUTING");
        assert_eq!(value["mismatches"][0]["expected"], "PLANNING");
    }
}
