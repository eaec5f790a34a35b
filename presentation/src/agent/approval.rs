//! Interactive approval gates on the console.
//!
//! Plan gates show the numbered steps and accept `y`, `n` or `e`. Tool-call
//! gates show the call, the reason it needs a gate and the tool's preview
//! (for `apply_patch`, the diff) and accept `y` or `n`.
//!
//! ```text
//! ── Plan approval ─────────────────────────────────────────────
//! agent root · revision 1
//! Goal: Rename the helper
//!
//!   1. Read the module        read_file {"path":"a.py"}
//!   2. Rename the function    apply_patch {"path":"a.py",...}
//!
//! Approve? [y]es / [n]o / [e]dit >
//! ```

use async_trait::async_trait;
use colored::Colorize;
use gatehouse_application::{ApprovalChannel, ApprovalError, CallReview, PlanReview};
use gatehouse_domain::{HumanDecision, Plan, parse_plan_json};
use indicatif::MultiProgress;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::io::{self, BufRead, Write};
use std::process::Command;
use tokio::sync::Mutex;

/// One answer at the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Approve,
    Reject,
    Edit,
}

fn parse_answer(input: &str, allow_edit: bool) -> Option<Answer> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" | "approve" | "/approve" => Some(Answer::Approve),
        "n" | "no" | "reject" | "/reject" => Some(Answer::Reject),
        "e" | "edit" | "/edit" if allow_edit => Some(Answer::Edit),
        _ => None,
    }
}

/// Compact one-line rendering of tool arguments, keys sorted.
fn args_line(args: &HashMap<String, Value>) -> String {
    let sorted: BTreeMap<_, _> = args.iter().collect();
    let text = serde_json::to_string(&sorted).unwrap_or_default();
    truncate(&text, 80)
}

fn banner(title: &str) -> String {
    format!("── {} {}", title, "─".repeat(45))
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

fn render_plan_review(review: &PlanReview) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", banner("Plan approval").yellow().bold()));
    out.push_str(&format!(
        "{}\n",
        format!("agent {} · revision {}", review.agent_id, review.plan.revision).dimmed()
    ));
    out.push_str(&format!("{} {}\n", "Goal:".cyan().bold(), review.goal));
    if let Some(rationale) = &review.plan.rationale {
        out.push_str(&format!("{} {}\n", "Rationale:".cyan().bold(), rationale));
    }
    out.push('\n');
    for step in review.plan.steps() {
        out.push_str(&format!(
            "  {}. {}  {} {}\n",
            step.index,
            step.description,
            step.tool_name.cyan(),
            args_line(&step.arguments).dimmed()
        ));
    }
    out
}

fn render_call_review(review: &CallReview) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", banner("Tool approval").yellow().bold()));
    out.push_str(&format!(
        "{}\n",
        format!("agent {} · call {}", review.call.agent_id, review.call.id).dimmed()
    ));
    out.push_str(&format!(
        "{} {} {}\n",
        "Tool:".cyan().bold(),
        review.definition.name.cyan(),
        args_line(&review.call.arguments).dimmed()
    ));
    out.push_str(&format!("{} {}\n", "Why:".cyan().bold(), review.reason));
    if let Some(preview) = &review.preview {
        out.push('\n');
        for line in preview.lines() {
            let line = if line.starts_with('+') && !line.starts_with("+++") {
                line.green().to_string()
            } else if line.starts_with('-') && !line.starts_with("---") {
                line.red().to_string()
            } else {
                line.to_string()
            };
            out.push_str(&format!("  {}\n", line));
        }
    }
    out
}

/// Plan as an editable JSON document.
fn plan_document(plan: &Plan) -> Value {
    let steps: Vec<Value> = plan
        .steps()
        .iter()
        .map(|s| {
            json!({
                "description": s.description,
                "tool": s.tool_name,
                "args": s.arguments,
            })
        })
        .collect();
    json!({ "goal": plan.goal, "steps": steps })
}

fn io_error(context: &str, e: io::Error) -> ApprovalError {
    ApprovalError::IoError(format!("{}: {}", context, e))
}

/// Console implementation of [`ApprovalChannel`].
///
/// Prompts from concurrent agents are serialized; only one gate is on
/// screen at a time.
pub struct ConsoleApprovalChannel {
    prompt_lock: Mutex<()>,
    progress: Option<MultiProgress>,
    editor: Option<String>,
}

impl ConsoleApprovalChannel {
    pub fn new() -> Self {
        Self {
            prompt_lock: Mutex::new(()),
            progress: None,
            editor: None,
        }
    }

    /// Hide these progress bars while a prompt is on screen.
    pub fn with_progress(mut self, multi: MultiProgress) -> Self {
        self.progress = Some(multi);
        self
    }

    /// Editor for `e` answers. Defaults to `$VISUAL`, `$EDITOR`, then `vi`.
    pub fn with_editor(mut self, editor: impl Into<String>) -> Self {
        self.editor = Some(editor.into());
        self
    }

    fn editor(&self) -> String {
        self.editor
            .clone()
            .or_else(|| std::env::var("VISUAL").ok())
            .or_else(|| std::env::var("EDITOR").ok())
            .unwrap_or_else(|| "vi".to_string())
    }

    /// Run a blocking console interaction with the progress display held.
    async fn interact<F>(&self, f: F) -> Result<HumanDecision, ApprovalError>
    where
        F: FnOnce() -> Result<HumanDecision, ApprovalError> + Send + 'static,
    {
        let _guard = self.prompt_lock.lock().await;
        let progress = self.progress.clone();
        tokio::task::spawn_blocking(move || match progress {
            Some(multi) => multi.suspend(f),
            None => f(),
        })
        .await
        .map_err(|e| ApprovalError::IoError(format!("prompt task failed: {}", e)))?
    }
}

impl Default for ConsoleApprovalChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn read_line(prompt: &str) -> Result<String, ApprovalError> {
    print!("{} ", prompt.magenta().bold());
    io::stdout()
        .flush()
        .map_err(|e| io_error("Failed to flush stdout", e))?;

    let mut input = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut input)
        .map_err(|e| io_error("Failed to read input", e))?;
    if read == 0 {
        return Err(ApprovalError::IoError("stdin closed".to_string()));
    }
    Ok(input.trim().to_string())
}

fn ask(allow_edit: bool) -> Result<Answer, ApprovalError> {
    let prompt = if allow_edit {
        "Approve? [y]es / [n]o / [e]dit >"
    } else {
        "Approve? [y]es / [n]o >"
    };
    loop {
        let input = read_line(prompt)?;
        match parse_answer(&input, allow_edit) {
            Some(answer) => return Ok(answer),
            None => println!("{}", format!("Unknown answer: {}", input).yellow()),
        }
    }
}

fn reject_with_feedback() -> Result<HumanDecision, ApprovalError> {
    let feedback = read_line("Feedback (optional) >")?;
    Ok(if feedback.is_empty() {
        HumanDecision::Reject { feedback: None }
    } else {
        HumanDecision::reject(feedback)
    })
}

/// Open the plan in an editor and read the edited plan back.
fn edit_plan(editor: &str, plan: &Plan) -> Result<Plan, String> {
    let mut file = tempfile::Builder::new()
        .prefix("gatehouse-plan-")
        .suffix(".json")
        .tempfile()
        .map_err(|e| e.to_string())?;
    let document = serde_json::to_string_pretty(&plan_document(plan)).map_err(|e| e.to_string())?;
    file.write_all(document.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|e| e.to_string())?;

    let status = Command::new(editor)
        .arg(file.path())
        .status()
        .map_err(|e| format!("could not start {}: {}", editor, e));
    let edited = std::fs::read_to_string(file.path()).map_err(|e| e.to_string());

    if !status?.success() {
        return Err(format!("{} exited with an error", editor));
    }
    let value: Value = serde_json::from_str(&edited?).map_err(|e| format!("invalid JSON: {}", e))?;
    let draft = parse_plan_json(&value).ok_or("the edited plan has no steps")?;
    let goal = draft.goal.unwrap_or_else(|| plan.goal.clone());
    let mut edited = Plan::new(goal, plan.revision, draft.steps);
    if let Some(rationale) = draft.rationale {
        edited = edited.with_rationale(rationale);
    }
    Ok(edited)
}

#[async_trait]
impl ApprovalChannel for ConsoleApprovalChannel {
    async fn review_plan(&self, review: &PlanReview) -> Result<HumanDecision, ApprovalError> {
        let text = render_plan_review(review);
        let plan = review.plan.clone();
        let editor = self.editor();

        self.interact(move || {
            println!("{}", text);
            loop {
                match ask(true)? {
                    Answer::Approve => return Ok(HumanDecision::Approve),
                    Answer::Reject => return reject_with_feedback(),
                    Answer::Edit => match edit_plan(&editor, &plan) {
                        Ok(edited) => {
                            println!("{}", format!("Edited plan has {} steps", edited.len()).green());
                            return Ok(HumanDecision::Edit(edited));
                        }
                        Err(e) => println!("{}", format!("Edit failed: {}", e).red()),
                    },
                }
            }
        })
        .await
    }

    async fn review_call(&self, review: &CallReview) -> Result<HumanDecision, ApprovalError> {
        let text = render_call_review(review);

        self.interact(move || {
            println!("{}", text);
            match ask(false)? {
                Answer::Approve => Ok(HumanDecision::Approve),
                Answer::Reject | Answer::Edit => reject_with_feedback(),
            }
        })
        .await
    }
}
