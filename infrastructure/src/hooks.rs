//! Shell lifecycle hooks.
//!
//! Each configured hook is a shell command bound to one [`HookEvent`],
//! optionally limited to some tools. Hooks for an event run in order in the
//! tools working directory and see the moment they fire through
//! `GATEHOUSE_*` environment variables:
//!
//! | Variable                  | Value                                  |
//! |---------------------------|----------------------------------------|
//! | `GATEHOUSE_HOOK_EVENT`    | event name, e.g. `pre_tool`            |
//! | `GATEHOUSE_AGENT_ID`      | agent the event belongs to             |
//! | `GATEHOUSE_TOOL`          | canonical tool name (tool events only) |
//! | `GATEHOUSE_<VAR>`         | every context var, upper-cased         |
//!
//! A non-zero exit or a timeout blocks; later hooks for the event do not
//! run. A hook that cannot be started is logged and skipped.

use crate::tools::process::{ProcessSpec, run_shell};
use async_trait::async_trait;
use gatehouse_application::{ChunkSender, HookContext, HookEvent, HookOutcome, HookRunner, ToolContext};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default `[hooks] timeout_secs`
pub const DEFAULT_HOOK_TIMEOUT_SECS: u64 = 30;

/// Output kept in a blocking hook's reason.
const REASON_TAIL_BYTES: usize = 2048;

/// One configured hook.
#[derive(Debug, Clone, PartialEq)]
pub struct HookSpec {
    pub event: HookEvent,
    pub command: String,
    /// Tool names the hook is limited to; `None` matches every tool
    pub tools: Option<Vec<String>>,
    pub description: Option<String>,
}

impl HookSpec {
    pub fn new(event: HookEvent, command: impl Into<String>) -> Self {
        Self {
            event,
            command: command.into(),
            tools: None,
            description: None,
        }
    }

    pub fn for_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Events without a tool match regardless of the filter.
    fn applies_to(&self, context: &HookContext) -> bool {
        match (&self.tools, &context.tool) {
            (Some(tools), Some(tool)) => tools.iter().any(|t| t == tool),
            _ => true,
        }
    }
}

pub struct ShellHookRunner {
    hooks: Vec<HookSpec>,
    working_dir: PathBuf,
    timeout: Duration,
    max_output_bytes: usize,
}

impl ShellHookRunner {
    pub fn new(hooks: Vec<HookSpec>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            hooks,
            working_dir: working_dir.into(),
            timeout: Duration::from_secs(DEFAULT_HOOK_TIMEOUT_SECS),
            max_output_bytes: 64 * 1024,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn hooks(&self) -> &[HookSpec] {
        &self.hooks
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    fn environment(event: HookEvent, context: &HookContext) -> Vec<(String, String)> {
        let mut env = vec![
            ("GATEHOUSE_HOOK_EVENT".to_string(), event.as_str().to_string()),
            ("GATEHOUSE_AGENT_ID".to_string(), context.agent_id.to_string()),
        ];
        if let Some(tool) = &context.tool {
            env.push(("GATEHOUSE_TOOL".to_string(), tool.clone()));
        }
        for (key, value) in &context.vars {
            env.push((format!("GATEHOUSE_{}", key.to_uppercase()), value.clone()));
        }
        env
    }
}

#[async_trait]
impl HookRunner for ShellHookRunner {
    async fn run(&self, event: HookEvent, context: &HookContext) -> HookOutcome {
        let matching = self
            .hooks
            .iter()
            .filter(|hook| hook.event == event && hook.applies_to(context));

        for hook in matching {
            let env = Self::environment(event, context);
            // Hooks do not stream.
            let (tx, _) = mpsc::unbounded_channel();
            let ctx = ToolContext {
                agent_id: context.agent_id.clone(),
                cancellation: CancellationToken::new(),
                chunks: ChunkSender::new(tx),
            };
            let spec = ProcessSpec {
                command: &hook.command,
                working_dir: &self.working_dir,
                timeout: self.timeout,
                max_output_bytes: self.max_output_bytes,
                stream: false,
                env: &env,
            };

            match run_shell(spec, &ctx).await {
                Ok(outcome) if outcome.success() => {
                    debug!(event = event.as_str(), command = %hook.command, "Hook passed");
                }
                Ok(outcome) => {
                    info!(
                        agent_id = %context.agent_id,
                        event = event.as_str(),
                        command = %hook.command,
                        exit_code = outcome.exit_code,
                        "Hook failed"
                    );
                    let exit_code = outcome.exit_code;
                    return HookOutcome::Blocked {
                        command: hook.command.clone(),
                        reason: format!(
                            "exit code {}{}",
                            exit_code,
                            tail(&outcome.into_content())
                        ),
                    };
                }
                Err(e) if e.code == "TIMEOUT" => {
                    return HookOutcome::Blocked {
                        command: hook.command.clone(),
                        reason: format!("timed out after {} seconds", self.timeout.as_secs()),
                    };
                }
                Err(e) => {
                    warn!(event = event.as_str(), command = %hook.command, error = %e, "Hook could not run");
                }
            }
        }
        HookOutcome::Continue
    }
}

impl std::fmt::Debug for ShellHookRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellHookRunner")
            .field("hooks", &self.hooks.len())
            .field("working_dir", &self.working_dir)
            .finish()
    }
}

/// `": <last bytes of output>"`, or nothing when the hook printed nothing.
fn tail(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let mut start = trimmed.len().saturating_sub(REASON_TAIL_BYTES);
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!(": {}", &trimmed[start..])
}
