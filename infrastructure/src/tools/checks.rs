//! Project checks: run_tests, ci_status
//!
//! Both report through the exit code: a completed call with a non-zero
//! `exit_code` means the tests or the CI run failed.

use super::ToolSettings;
use super::process::{ProcessOutcome, ProcessSpec, run_shell};
use async_trait::async_trait;
use gatehouse_application::{ToolBody, ToolContext};
use gatehouse_domain::{
    SideEffects, ToolCategory, ToolDefinition, ToolError, ToolInvocation, ToolOutput, names,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

pub fn run_tests_definition() -> ToolDefinition {
    ToolDefinition::new(
        names::RUN_TESTS,
        "Run the project's configured test command",
        ToolCategory::Test,
    )
    .exempt()
    .streaming()
}

pub fn ci_status_definition() -> ToolDefinition {
    ToolDefinition::new(
        names::CI_STATUS,
        "Report the result of the latest CI run, waiting while it is still in progress",
        ToolCategory::Ci,
    )
}

pub struct RunTestsTool {
    settings: Arc<ToolSettings>,
}

impl RunTestsTool {
    pub fn new(settings: Arc<ToolSettings>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ToolBody for RunTestsTool {
    async fn invoke(
        &self,
        _invocation: ToolInvocation,
        ctx: ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let command = self.settings.test_command.as_deref().ok_or_else(|| {
            ToolError::execution_failed("No test command configured ([validation] test_command)")
        })?;

        let outcome = run_shell(
            ProcessSpec {
                command,
                working_dir: &self.settings.working_dir,
                timeout: self.settings.command_timeout,
                max_output_bytes: self.settings.max_output_bytes,
                stream: true,
                env: &[],
            },
            &ctx,
        )
        .await?;

        let exit_code = outcome.exit_code;
        let verdict = if outcome.success() { "Tests passed" } else { "Tests failed" };
        Ok(ToolOutput::text(format!(
            "{} (exit code {})\n{}",
            verdict,
            exit_code,
            outcome.into_content()
        ))
        .with_exit_code(exit_code)
        .with_side_effects(SideEffects::command(command)))
    }
}

/// State of the latest CI run as reported by the CI command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CiState {
    Passed,
    Failed(String),
    Pending(String),
}

/// Read `gh run list --json status,conclusion` style output.
///
/// Returns `None` when the output is not in that shape; the caller then
/// falls back to the command's exit code.
fn parse_ci_state(output: &str) -> Option<CiState> {
    let value: Value = serde_json::from_str(output.trim()).ok()?;
    let run = match &value {
        Value::Array(runs) => runs.first()?,
        Value::Object(_) => &value,
        _ => return None,
    };
    let status = run.get("status").and_then(|s| s.as_str()).unwrap_or("completed");
    if status != "completed" {
        return Some(CiState::Pending(status.to_string()));
    }
    match run.get("conclusion").and_then(|c| c.as_str()) {
        Some("success") | Some("neutral") | Some("skipped") => Some(CiState::Passed),
        Some(other) => Some(CiState::Failed(other.to_string())),
        None => Some(CiState::Failed("unknown".to_string())),
    }
}

fn ci_state(outcome: &ProcessOutcome) -> CiState {
    match parse_ci_state(&outcome.output) {
        Some(state) => state,
        None if outcome.success() => CiState::Passed,
        None => CiState::Failed(format!("ci command exited with code {}", outcome.exit_code)),
    }
}

pub struct CiStatusTool {
    settings: Arc<ToolSettings>,
}

impl CiStatusTool {
    pub fn new(settings: Arc<ToolSettings>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ToolBody for CiStatusTool {
    async fn invoke(
        &self,
        _invocation: ToolInvocation,
        ctx: ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let command = self.settings.ci_command.as_str();
        let deadline = Instant::now() + self.settings.command_timeout;

        loop {
            let outcome = run_shell(
                ProcessSpec {
                    command,
                    working_dir: &self.settings.working_dir,
                    timeout: self.settings.command_timeout,
                    max_output_bytes: self.settings.max_output_bytes,
                    stream: false,
                    env: &[],
                },
                &ctx,
            )
            .await?;

            match ci_state(&outcome) {
                CiState::Passed => {
                    return Ok(ToolOutput::text(format!("CI passed\n{}", outcome.into_content()))
                        .with_exit_code(0));
                }
                CiState::Failed(conclusion) => {
                    return Ok(ToolOutput::text(format!(
                        "CI failed ({})\n{}",
                        conclusion,
                        outcome.into_content()
                    ))
                    .with_exit_code(1));
                }
                CiState::Pending(status) => {
                    debug!(status = %status, "CI run still in progress");
                    ctx.chunks.send(format!("CI run {}, waiting\n", status));
                    if Instant::now() + self.settings.ci_poll_interval > deadline {
                        return Err(ToolError::timeout(format!(
                            "CI run still {} after {} seconds",
                            status,
                            self.settings.command_timeout.as_secs()
                        )));
                    }
                    tokio::select! {
                        biased;
                        _ = ctx.cancellation.cancelled() => return Err(ToolError::cancelled()),
                        _ = tokio::time::sleep(self.settings.ci_poll_interval) => {}
                    }
                }
            }
        }
    }
}
