//! Progress reporting for agent execution

use colored::Colorize;
use gatehouse_application::AgentProgressNotifier;
use gatehouse_domain::{
    AgentId, AgentKind, AgentPhase, AgentStatus, CallId, Plan, Step, ToolCall, ToolResult,
    ToolStatus,
};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

fn phase_emoji(phase: AgentPhase) -> &'static str {
    match phase {
        AgentPhase::Boot => "·",
        AgentPhase::Planning => "📝",
        AgentPhase::AwaitingApproval => "🔒",
        AgentPhase::Executing => "⚡",
        AgentPhase::Validating => "🧪",
        AgentPhase::CiCheck => "🔁",
        AgentPhase::Completed => "🎉",
        AgentPhase::Failed => "❌",
    }
}

fn status_mark(status: ToolStatus) -> colored::ColoredString {
    match status {
        ToolStatus::Ok => "✓".green(),
        ToolStatus::Error => "✗".red(),
        ToolStatus::Denied => "⊘".yellow(),
        ToolStatus::Cancelled => "■".dimmed(),
    }
}

/// One line describing a finished tool call.
fn result_line(result: &ToolResult) -> String {
    let mut line = format!(
        "{} {} {}",
        status_mark(result.status),
        result.tool_name,
        format!("({} ms)", result.duration_ms).dimmed()
    );
    if let Some(code) = result.exit_code
        && code != 0
    {
        line.push_str(&format!(" exit {}", code).yellow().to_string());
    }
    if let Some(error) = &result.error {
        line.push_str(&format!(" {}: {}", error.code, error.message).red().to_string());
    }
    line
}

/// Reports progress during agent execution with one spinner per live agent.
///
/// Lines are printed above the spinners. When stderr is not a terminal the
/// spinners are hidden and lines go straight to stderr.
pub struct AgentProgressReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<AgentId, ProgressBar>>,
    show_output: bool,
}

impl AgentProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            show_output: true,
        }
    }

    /// Do not echo streamed tool output.
    pub fn without_output(mut self) -> Self {
        self.show_output = false;
        self
    }

    /// Handle for hiding the spinners, e.g. during an approval prompt.
    pub fn multi(&self) -> MultiProgress {
        self.multi.clone()
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn line(&self, text: impl AsRef<str>) {
        if self.multi.is_hidden() || self.multi.println(text.as_ref()).is_err() {
            eprintln!("{}", text.as_ref());
        }
    }

    fn with_bar(&self, agent: &AgentId, f: impl FnOnce(&ProgressBar)) {
        let bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pb) = bars.get(agent) {
            f(pb);
        }
    }

    fn finish_bar(&self, agent: &AgentId) {
        let removed = self
            .bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(agent);
        if let Some(pb) = removed {
            pb.finish_and_clear();
            self.multi.remove(&pb);
        }
    }
}

impl Default for AgentProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentProgressNotifier for AgentProgressReporter {
    fn on_phase_change(&self, agent: &AgentId, _from: AgentPhase, to: AgentPhase) {
        if to.is_terminal() {
            self.finish_bar(agent);
            return;
        }

        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        let pb = bars.entry(agent.clone()).or_insert_with(|| {
            let pb = self.multi.add(ProgressBar::new_spinner());
            pb.set_style(Self::spinner_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });
        pb.set_prefix(format!("[{}] {} {}", agent, phase_emoji(to), to.display_name()));
        pb.set_message("");
    }

    fn on_plan_proposed(&self, agent: &AgentId, plan: &Plan) {
        self.line(format!(
            "{} {} proposed plan revision {} ({} steps)",
            "📝".dimmed(),
            format!("[{}]", agent).dimmed(),
            plan.revision,
            plan.len()
        ));
        for step in plan.steps() {
            self.line(format!(
                "    {}. {} {}",
                step.index,
                step.description,
                step.tool_name.cyan()
            ));
        }
    }

    fn on_step_start(&self, agent: &AgentId, step: &Step, total: usize) {
        self.with_bar(agent, |pb| {
            pb.set_message(format!("step {}/{}: {}", step.index, total, step.description));
        });
    }

    fn on_tool_call(&self, call: &ToolCall) {
        self.with_bar(&call.agent_id, |pb| {
            pb.set_message(format!("running {}", call.tool_name));
        });
    }

    fn on_tool_output(&self, _agent: &AgentId, _call: &CallId, chunk: &str) {
        if !self.show_output {
            return;
        }
        for line in chunk.lines() {
            self.line(format!("    {} {}", "│".dimmed(), line.dimmed()));
        }
    }

    fn on_tool_result(&self, agent: &AgentId, result: &ToolResult) {
        self.line(format!("  {} {}", format!("[{}]", agent).dimmed(), result_line(result)));
    }

    fn on_remediation(&self, agent: &AgentId, attempt: u32, failures: &[String]) {
        self.line(format!(
            "  {} {} remediation attempt {}",
            "↻".yellow(),
            format!("[{}]", agent).dimmed(),
            attempt
        ));
        for failure in failures.iter().take(5) {
            self.line(format!("      {}", failure.yellow()));
        }
    }

    fn on_agent_spawned(&self, agent: &AgentId, parent: &AgentId, kind: AgentKind) {
        self.line(format!(
            "  {} spawned {} agent {} (parent {})",
            "+".green(),
            kind.as_str(),
            agent,
            parent
        ));
    }

    fn on_agent_finished(&self, agent: &AgentId, status: &AgentStatus) {
        self.finish_bar(agent);
        let text = format!("[{}] {}", agent, status);
        let text = match status {
            AgentStatus::Completed => format!("{} {}", "🎉", text.green().bold()),
            AgentStatus::Failed { .. } => format!("{} {}", "❌", text.red().bold()),
            AgentStatus::Cancelled => format!("{} {}", "■", text.dimmed()),
        };
        self.line(text);
    }
}

/// Simple text-based progress (no spinners), written to stderr.
pub struct SimpleAgentProgress {
    verbose: bool,
}

impl SimpleAgentProgress {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl AgentProgressNotifier for SimpleAgentProgress {
    fn on_phase_change(&self, agent: &AgentId, from: AgentPhase, to: AgentPhase) {
        eprintln!("[{}] {} -> {}", agent, from, to);
    }

    fn on_step_start(&self, agent: &AgentId, step: &Step, total: usize) {
        eprintln!("[{}] step {}/{}: {}", agent, step.index, total, step.description);
    }

    fn on_tool_output(&self, _agent: &AgentId, _call: &CallId, chunk: &str) {
        if self.verbose {
            eprint!("{}", chunk);
        }
    }

    fn on_tool_result(&self, agent: &AgentId, result: &ToolResult) {
        eprintln!("[{}] {}", agent, result_line(result));
    }

    fn on_agent_finished(&self, agent: &AgentId, status: &AgentStatus) {
        eprintln!("[{}] {}", agent, status);
    }
}
