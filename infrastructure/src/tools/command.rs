//! Command execution tool: run_command

use super::ToolSettings;
use super::process::{ProcessSpec, run_shell};
use async_trait::async_trait;
use gatehouse_application::{ToolBody, ToolContext};
use gatehouse_domain::{
    ParamType, SideEffects, ToolCategory, ToolDefinition, ToolError, ToolInvocation, ToolOutput,
    ToolParameter, names,
};
use std::sync::Arc;
use std::time::Duration;

pub fn run_command_definition() -> ToolDefinition {
    ToolDefinition::new(
        names::RUN_COMMAND,
        "Execute a shell command and stream its output. Use with caution.",
        ToolCategory::Execution,
    )
    .mutating()
    .streaming()
    .with_parameter(ToolParameter::new("command", "The command to execute", true))
    .with_parameter(ToolParameter::new(
        "working_dir",
        "Working directory for the command",
        false,
    ))
    .with_parameter(
        ToolParameter::new("timeout_secs", "Timeout in seconds", false)
            .with_type(ParamType::Integer),
    )
}

pub struct RunCommandTool {
    settings: Arc<ToolSettings>,
}

impl RunCommandTool {
    pub fn new(settings: Arc<ToolSettings>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ToolBody for RunCommandTool {
    async fn invoke(
        &self,
        invocation: ToolInvocation,
        ctx: ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let args = match invocation {
            ToolInvocation::RunCommand(args) => args,
            other => {
                return Err(ToolError::execution_failed(format!(
                    "run_command cannot serve '{}'",
                    other.name()
                )));
            }
        };

        let working_dir = match &args.working_dir {
            Some(dir) => self.settings.resolve(dir),
            None => self.settings.working_dir.clone(),
        };
        let timeout = args
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.settings.command_timeout);

        let outcome = run_shell(
            ProcessSpec {
                command: &args.command,
                working_dir: &working_dir,
                timeout,
                max_output_bytes: self.settings.max_output_bytes,
                stream: true,
                env: &[],
            },
            &ctx,
        )
        .await?;

        // A non-zero exit is still a completed call; the exit code tells the rest.
        let exit_code = outcome.exit_code;
        let content = if outcome.success() {
            outcome.into_content()
        } else {
            format!("Command exited with code {}\n{}", exit_code, outcome.into_content())
        };
        Ok(ToolOutput::text(content)
            .with_exit_code(exit_code)
            .with_side_effects(SideEffects::command(args.command)))
    }

    async fn preview(&self, invocation: &ToolInvocation) -> Option<String> {
        let ToolInvocation::RunCommand(args) = invocation else {
            return None;
        };
        let dir = args
            .working_dir
            .clone()
            .unwrap_or_else(|| self.settings.working_dir.display().to_string());
        Some(format!("$ {}\n(in {})", args.command, dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_application::ChunkSender;
    use gatehouse_domain::AgentId;
    use gatehouse_domain::tool::invocation::RunCommandArgs;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> (ToolContext, tokio::sync::mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let ctx = ToolContext {
            agent_id: AgentId::new("root"),
            cancellation: CancellationToken::new(),
            chunks: ChunkSender::new(tx),
        };
        (ctx, rx)
    }

    fn command(cmd: &str) -> ToolInvocation {
        ToolInvocation::RunCommand(RunCommandArgs {
            command: cmd.into(),
            timeout_secs: None,
            working_dir: None,
        })
    }

    #[tokio::test]
    async fn test_run_command_echo() {
        let dir = tempfile::tempdir().unwrap();
        let tool = RunCommandTool::new(Arc::new(ToolSettings::default().with_working_dir(dir.path())));
        let (ctx, mut rx) = ctx();

        let output = tool.invoke(command("echo hello"), ctx).await.unwrap();
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.content, "hello\n");
        assert_eq!(output.side_effects.commands_run, vec!["echo hello".to_string()]);
        assert_eq!(rx.recv().await.unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn test_run_command_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let tool = RunCommandTool::new(Arc::new(ToolSettings::default().with_working_dir(dir.path())));
        let (ctx, _rx) = ctx();

        let output = tool.invoke(command("ls"), ctx).await.unwrap();
        assert!(output.content.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_run_command_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let tool = RunCommandTool::new(Arc::new(ToolSettings::default().with_working_dir(dir.path())));
        let (ctx, _rx) = ctx();

        let output = tool.invoke(command("exit 1"), ctx).await.unwrap();
        assert_eq!(output.exit_code, Some(1));
        assert!(output.content.starts_with("Command exited with code 1"));
    }

    #[tokio::test]
    async fn test_run_command_per_call_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let tool = RunCommandTool::new(Arc::new(ToolSettings::default().with_working_dir(dir.path())));
        let (ctx, _rx) = ctx();
        let invocation = ToolInvocation::RunCommand(RunCommandArgs {
            command: "sleep 5".into(),
            timeout_secs: Some(0),
            working_dir: None,
        });

        let error = tool.invoke(invocation, ctx).await.unwrap_err();
        assert_eq!(error.code, "TIMEOUT");
    }
}
