//! In-memory fakes shared by the use case tests.

use crate::config::EngineConfig;
use crate::ports::agent_progress::NoAgentProgress;
use crate::ports::approval_channel::{
    ApprovalChannel, ApprovalError, AutoApproveChannel, CallReview, PlanReview,
};
use crate::ports::hooks::{HookContext, HookEvent, HookOutcome, HookRunner, NoHooks};
use crate::ports::inference::{
    InferenceError, InferenceProvider, PlanningRequest, RemediationRequest,
};
use crate::ports::session_recorder::NoSessionRecorder;
use crate::ports::tool_body::{ToolBodies, ToolBody, ToolContext};
use crate::use_cases::agent_handle::AgentHandle;
use crate::use_cases::approval::ApprovalLedger;
use crate::use_cases::coordinator::AgentCoordinator;
use crate::use_cases::run_agent::AgentRunner;
use crate::use_cases::session::{Session, SessionBuilder};
use crate::use_cases::tool_executor::ToolExecutor;
use async_trait::async_trait;
use gatehouse_domain::{
    AgentId, AgentKind, AgentState, DefaultToolValidator, HumanDecision, ParamType, PatchRequest,
    PlanDraft, SideEffects, StepDraft, Task, ToolCategory, ToolDefinition, ToolError,
    ToolInvocation, ToolOutput, ToolParameter, ToolRegistry, compute_patch,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub(crate) fn plan_draft(steps: Vec<StepDraft>) -> PlanDraft {
    PlanDraft {
        goal: None,
        rationale: None,
        steps,
    }
}

/// Records every hook event it sees and fails the configured ones.
#[derive(Default)]
pub(crate) struct RecordingHooks {
    /// Event, tool and `status` var of each run
    pub fired: Mutex<Vec<(HookEvent, Option<String>, Option<String>)>>,
    failing: Vec<HookEvent>,
}

impl RecordingHooks {
    pub fn failing(events: &[HookEvent]) -> Self {
        Self {
            failing: events.to_vec(),
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<HookEvent> {
        self.fired.lock().unwrap().iter().map(|(e, _, _)| *e).collect()
    }
}

#[async_trait]
impl HookRunner for RecordingHooks {
    async fn run(&self, event: HookEvent, context: &HookContext) -> HookOutcome {
        self.fired.lock().unwrap().push((
            event,
            context.tool.clone(),
            context.var("status").map(String::from),
        ));
        if self.failing.contains(&event) {
            HookOutcome::Blocked {
                command: "lint".into(),
                reason: "exit status 1".into(),
            }
        } else {
            HookOutcome::Continue
        }
    }
}

/// Serves scripted plans per goal; unscripted goals get a one-step
/// `list_directory` plan.
#[derive(Default)]
pub(crate) struct ScriptedInference {
    plans: Mutex<HashMap<String, VecDeque<PlanDraft>>>,
    remediations: Mutex<VecDeque<Vec<StepDraft>>>,
    feedback: Mutex<Vec<Option<String>>>,
}

impl ScriptedInference {
    pub fn push_plan(&self, goal: &str, draft: PlanDraft) {
        self.plans
            .lock()
            .unwrap()
            .entry(goal.to_string())
            .or_default()
            .push_back(draft);
    }

    pub fn push_remediation(&self, steps: Vec<StepDraft>) {
        self.remediations.lock().unwrap().push_back(steps);
    }

    pub fn feedback_seen(&self) -> Vec<Option<String>> {
        self.feedback.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceProvider for ScriptedInference {
    async fn plan(&self, request: &PlanningRequest) -> Result<PlanDraft, InferenceError> {
        self.feedback.lock().unwrap().push(request.feedback.clone());
        let scripted = self
            .plans
            .lock()
            .unwrap()
            .get_mut(&request.goal)
            .and_then(|q| q.pop_front());
        Ok(scripted.unwrap_or_else(|| {
            plan_draft(vec![StepDraft::new("look", "list_directory")])
        }))
    }

    async fn remediate(
        &self,
        _request: &RemediationRequest,
    ) -> Result<Vec<StepDraft>, InferenceError> {
        self.remediations
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| InferenceError::NoPlan("no remediation scripted".into()))
    }
}

/// Answers every gate the same way, or never.
pub(crate) struct ScriptedChannel {
    decision: Option<HumanDecision>,
}

impl ScriptedChannel {
    pub fn rejecting(feedback: &str) -> Self {
        Self {
            decision: Some(HumanDecision::reject(feedback)),
        }
    }

    pub fn never() -> Self {
        Self { decision: None }
    }

    async fn answer(&self) -> Result<HumanDecision, ApprovalError> {
        match &self.decision {
            Some(decision) => Ok(decision.clone()),
            None => std::future::pending().await,
        }
    }
}

#[async_trait]
impl ApprovalChannel for ScriptedChannel {
    async fn review_plan(&self, _review: &PlanReview) -> Result<HumanDecision, ApprovalError> {
        self.answer().await
    }

    async fn review_call(&self, _review: &CallReview) -> Result<HumanDecision, ApprovalError> {
        self.answer().await
    }
}

/// Files held in memory, served by `read_file`, `write_file`, `apply_patch`
/// and `list_directory`.
#[derive(Default)]
pub(crate) struct MemoryFs(Mutex<HashMap<String, String>>);

impl MemoryFs {
    pub fn put(&self, path: &str, content: &str) {
        self.0
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.0.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl ToolBody for MemoryFs {
    async fn invoke(&self, invocation: ToolInvocation, _ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let mut files = self.0.lock().unwrap();
        match invocation {
            ToolInvocation::ReadFile(args) => files
                .get(&args.path)
                .map(|c| ToolOutput::text(c.clone()))
                .ok_or_else(|| ToolError::not_found(args.path)),
            ToolInvocation::WriteFile(args) => {
                files.insert(args.path.clone(), args.content);
                Ok(ToolOutput::text("written").with_side_effects(SideEffects::file(args.path)))
            }
            ToolInvocation::ApplyPatch(args) => {
                let content = files
                    .get(&args.path)
                    .ok_or_else(|| ToolError::not_found(args.path.clone()))?;
                let request = PatchRequest::new(args.find, args.replace)
                    .expecting(args.expected_occurrences);
                let patched = compute_patch(content, &request)?;
                files.insert(args.path.clone(), patched.new_content);
                Ok(ToolOutput::text("patched").with_side_effects(SideEffects::file(args.path)))
            }
            ToolInvocation::ListDirectory(_) => {
                let mut names: Vec<&String> = files.keys().collect();
                names.sort();
                let listing: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
                Ok(ToolOutput::text(listing.join("\n")))
            }
            other => Err(ToolError::execution_failed(format!(
                "memory fs cannot serve {}",
                other.name()
            ))),
        }
    }
}

/// Reports scripted exit codes (0 once the script runs out).
#[derive(Default)]
pub(crate) struct ScriptedExit {
    exits: Mutex<VecDeque<i32>>,
    runs: AtomicUsize,
}

impl ScriptedExit {
    pub fn push_exit(&self, code: i32) {
        self.exits.lock().unwrap().push_back(code);
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolBody for ScriptedExit {
    async fn invoke(&self, _invocation: ToolInvocation, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let code = self.exits.lock().unwrap().pop_front().unwrap_or(0);
        ctx.chunks.send(format!("exit {}\n", code));
        Ok(ToolOutput::text(format!("exit {}", code)).with_exit_code(code))
    }
}

/// `run_command` that blocks until cancelled.
pub(crate) struct BlockingCommand;

#[async_trait]
impl ToolBody for BlockingCommand {
    async fn invoke(&self, _invocation: ToolInvocation, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        tokio::select! {
            _ = ctx.cancellation.cancelled() => Err(ToolError::cancelled()),
            _ = tokio::time::sleep(Duration::from_secs(30)) => Ok(ToolOutput::text("slept")),
        }
    }
}

pub(crate) fn test_registry() -> ToolRegistry {
    let path = || ToolParameter::new("path", "File path", true);
    let mut registry = ToolRegistry::new();
    let definitions = vec![
        ToolDefinition::new("read_file", "Read a file", ToolCategory::ReadOnly)
            .with_parameter(path()),
        ToolDefinition::new("list_directory", "List files", ToolCategory::ReadOnly)
            .with_parameter(ToolParameter::new("path", "Directory", false)),
        ToolDefinition::new("write_file", "Write a file", ToolCategory::Execution)
            .mutating()
            .with_parameter(path())
            .with_parameter(ToolParameter::new("content", "Content", true)),
        ToolDefinition::new("apply_patch", "Patch a file", ToolCategory::Execution)
            .mutating()
            .with_parameter(path())
            .with_parameter(ToolParameter::new("find", "Text to find", true))
            .with_parameter(ToolParameter::new("replace", "Replacement", true))
            .with_parameter(
                ToolParameter::new("expected_occurrences", "Count", false)
                    .with_type(ParamType::Integer),
            ),
        ToolDefinition::new("run_command", "Run a command", ToolCategory::Execution)
            .mutating()
            .streaming()
            .with_parameter(ToolParameter::new("command", "Command line", true)),
        ToolDefinition::new("run_tests", "Run tests", ToolCategory::Test)
            .exempt()
            .streaming(),
        ToolDefinition::new("ci_status", "CI status", ToolCategory::Ci),
    ];
    for definition in definitions {
        registry.register(definition).unwrap();
    }
    registry
}

pub(crate) struct Harness {
    pub config: EngineConfig,
    pub channel: Arc<dyn ApprovalChannel>,
    pub approvals: Arc<ApprovalLedger>,
    pub inference: Arc<ScriptedInference>,
    pub fs: Arc<MemoryFs>,
    pub tests: Arc<ScriptedExit>,
    pub ci: Arc<ScriptedExit>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_channel(Arc::new(AutoApproveChannel))
    }

    pub fn with_channel(channel: Arc<dyn ApprovalChannel>) -> Self {
        let config = EngineConfig::default();
        Self {
            approvals: Self::ledger(&config, channel.clone()),
            config,
            channel,
            inference: Arc::new(ScriptedInference::default()),
            fs: Arc::new(MemoryFs::default()),
            tests: Arc::new(ScriptedExit::default()),
            ci: Arc::new(ScriptedExit::default()),
        }
    }

    pub fn with_config(mut self, f: impl FnOnce(&mut EngineConfig)) -> Self {
        f(&mut self.config);
        self.approvals = Self::ledger(&self.config, self.channel.clone());
        self
    }

    fn ledger(config: &EngineConfig, channel: Arc<dyn ApprovalChannel>) -> Arc<ApprovalLedger> {
        Arc::new(ApprovalLedger::new(
            channel,
            config.policy.approval_mode,
            Arc::new(NoSessionRecorder),
            Arc::new(NoAgentProgress),
        ))
    }

    pub fn bodies(&self) -> ToolBodies {
        let mut bodies = ToolBodies::new();
        bodies.register_all(
            &["read_file", "write_file", "apply_patch", "list_directory"],
            self.fs.clone(),
        );
        bodies.register("run_tests", self.tests.clone());
        bodies.register("ci_status", self.ci.clone());
        bodies.register("run_command", Arc::new(BlockingCommand));
        bodies
    }

    /// A runner without coordination tools.
    pub fn runner(&self) -> AgentRunner {
        let executor = Arc::new(ToolExecutor::new(
            Arc::new(test_registry()),
            self.bodies(),
            Arc::new(DefaultToolValidator),
            self.config.policy.clone(),
            self.approvals.clone(),
            Arc::new(NoSessionRecorder),
            Arc::new(NoAgentProgress),
        ));
        AgentRunner::new(
            self.config.clone(),
            self.inference.clone(),
            executor,
            self.approvals.clone(),
            Arc::new(NoSessionRecorder),
            Arc::new(NoAgentProgress),
        )
    }

    pub fn session(&self) -> Session {
        self.session_with_hooks(Arc::new(NoHooks))
    }

    pub fn session_with_hooks(&self, hooks: Arc<dyn HookRunner>) -> Session {
        SessionBuilder::new(
            self.config.clone(),
            test_registry(),
            self.bodies(),
            self.inference.clone(),
        )
        .with_approval_channel(self.channel.clone())
        .with_hooks(hooks)
        .build()
        .unwrap()
    }

    pub fn coordinator(&self) -> Arc<AgentCoordinator> {
        self.session().coordinator().clone()
    }

    pub fn root(&self, goal: &str) -> AgentHandle {
        AgentHandle::new(
            AgentState::new(AgentId::generate("root"), AgentKind::Root, Task::new(goal)),
            CancellationToken::new(),
        )
    }
}
