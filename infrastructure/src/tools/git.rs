//! Git tools: git_status, git_diff, git_commit

use super::ToolSettings;
use async_trait::async_trait;
use gatehouse_application::{ToolBody, ToolContext};
use gatehouse_domain::tool::invocation::{GitCommitArgs, GitDiffArgs};
use gatehouse_domain::{
    ParamType, SideEffects, ToolCategory, ToolDefinition, ToolError, ToolInvocation, ToolOutput,
    ToolParameter, names,
};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::info;

/// Canonical names served by [`GitTools`].
pub const GIT_TOOLS: [&str; 3] = [names::GIT_STATUS, names::GIT_DIFF, names::GIT_COMMIT];

pub fn read_only_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            names::GIT_STATUS,
            "Show the working tree status (porcelain format)",
            ToolCategory::ReadOnly,
        ),
        ToolDefinition::new(
            names::GIT_DIFF,
            "Show unstaged (or staged) changes, optionally for one path",
            ToolCategory::ReadOnly,
        )
        .with_parameter(ToolParameter::new("path", "Limit the diff to this path", false))
        .with_parameter(
            ToolParameter::new("staged", "Show staged changes instead", false)
                .with_type(ParamType::Boolean),
        ),
    ]
}

pub fn git_commit_definition() -> ToolDefinition {
    ToolDefinition::new(
        names::GIT_COMMIT,
        "Stage the given paths (default: all changes) and commit them",
        ToolCategory::Git,
    )
    .mutating()
    .with_parameter(ToolParameter::new("message", "Commit message", true))
    .with_parameter(
        ToolParameter::new("paths", "Paths to stage before committing", false)
            .with_type(ParamType::Array),
    )
}

pub struct GitTools {
    settings: Arc<ToolSettings>,
}

impl GitTools {
    pub fn new(settings: Arc<ToolSettings>) -> Self {
        Self { settings }
    }

    /// Run `git <args>` in the working directory and return stdout.
    async fn git(&self, args: &[&str], ctx: &ToolContext) -> Result<String, ToolError> {
        let child = Command::new("git")
            .args(args)
            .current_dir(&self.settings.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::execution_failed(format!("Failed to run git: {}", e)))?;

        let output = tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => return Err(ToolError::cancelled()),
            _ = tokio::time::sleep(self.settings.command_timeout) => {
                return Err(ToolError::timeout(format!("git {}", args.join(" "))));
            }
            output = child.wait_with_output() => output
                .map_err(|e| ToolError::execution_failed(format!("Failed to run git: {}", e)))?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolError::execution_failed(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn status(&self, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let stdout = self.git(&["status", "--porcelain=v1", "--branch"], ctx).await?;
        let changed = stdout.lines().filter(|l| !l.starts_with("##")).count();
        Ok(ToolOutput::text(stdout).with_data(serde_json::json!({ "changed": changed })))
    }

    async fn diff(&self, args: &GitDiffArgs, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let mut git_args = vec!["diff"];
        if args.staged {
            git_args.push("--cached");
        }
        if let Some(path) = &args.path {
            git_args.push("--");
            git_args.push(path.as_str());
        }
        let stdout = self.git(&git_args, ctx).await?;
        let content = if stdout.is_empty() {
            "No changes".to_string()
        } else {
            stdout
        };
        Ok(ToolOutput::text(content))
    }

    async fn commit(&self, args: GitCommitArgs, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        if args.message.trim().is_empty() {
            return Err(ToolError::invalid_argument("Commit message is empty"));
        }

        let mut add = vec!["add"];
        if args.paths.is_empty() {
            add.push("--all");
        } else {
            add.push("--");
            add.extend(args.paths.iter().map(String::as_str));
        }
        self.git(&add, ctx).await?;
        self.git(&["commit", "-m", &args.message], ctx).await?;
        let sha = self.git(&["rev-parse", "HEAD"], ctx).await?;
        let sha = sha.trim().to_string();
        info!(sha = %sha, "Committed");

        let mut effects = SideEffects::command(format!("git commit -m {:?}", args.message));
        effects.files_touched = args.paths;
        Ok(ToolOutput::text(format!("Committed {}", sha))
            .with_side_effects(effects)
            .with_data(serde_json::json!({ "sha": sha })))
    }
}

#[async_trait]
impl ToolBody for GitTools {
    async fn invoke(
        &self,
        invocation: ToolInvocation,
        ctx: ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        match invocation {
            ToolInvocation::GitStatus(_) => self.status(&ctx).await,
            ToolInvocation::GitDiff(args) => self.diff(&args, &ctx).await,
            ToolInvocation::GitCommit(args) => self.commit(args, &ctx).await,
            other => Err(ToolError::execution_failed(format!(
                "git tools cannot serve '{}'",
                other.name()
            ))),
        }
    }

    async fn preview(&self, invocation: &ToolInvocation) -> Option<String> {
        let ToolInvocation::GitCommit(args) = invocation else {
            return None;
        };
        let scope = if args.paths.is_empty() {
            "all changes".to_string()
        } else {
            args.paths.join(", ")
        };
        Some(format!("git commit ({})\n\n{}", scope, args.message))
    }
}
