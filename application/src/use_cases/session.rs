//! Session wiring.
//!
//! Builds one coordinator, executor, approval ledger and runner that every
//! agent of a session shares, and runs root goals through them.

use crate::config::EngineConfig;
use crate::ports::agent_progress::{AgentProgressNotifier, NoAgentProgress};
use crate::ports::approval_channel::{ApprovalChannel, AutoRejectChannel};
use crate::ports::hooks::{HookRunner, NoHooks};
use crate::ports::inference::InferenceProvider;
use crate::ports::session_recorder::{NoSessionRecorder, SessionRecorder};
use crate::ports::tool_body::ToolBodies;
use crate::use_cases::approval::ApprovalLedger;
use crate::use_cases::coordination_tools::{
    COORDINATION_TOOLS, CoordinationTools, coordination_definitions,
};
use crate::use_cases::coordinator::AgentCoordinator;
use crate::use_cases::run_agent::AgentRunner;
use crate::use_cases::tool_executor::ToolExecutor;
use gatehouse_domain::{
    AgentId, AgentPhase, AgentSnapshot, AgentStatus, DefaultToolValidator, LogEntry, Plan,
    RegistryError, ToolRegistry, ToolValidator,
};
use serde::Serialize;
use std::sync::Arc;

/// Final report for a root goal.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub agent_id: AgentId,
    pub goal: String,
    pub status: AgentStatus,
    pub phase: AgentPhase,
    pub plan: Option<Plan>,
    pub entries: Vec<LogEntry>,
    /// Children still registered when the root finished
    pub children: Vec<AgentSnapshot>,
}

pub struct SessionBuilder {
    config: EngineConfig,
    registry: ToolRegistry,
    bodies: ToolBodies,
    inference: Arc<dyn InferenceProvider>,
    channel: Arc<dyn ApprovalChannel>,
    validator: Arc<dyn ToolValidator>,
    recorder: Arc<dyn SessionRecorder>,
    progress: Arc<dyn AgentProgressNotifier>,
    hooks: Arc<dyn HookRunner>,
}

impl SessionBuilder {
    /// Without further configuration, every gate is rejected, nothing is
    /// recorded and no hooks run.
    pub fn new(
        config: EngineConfig,
        registry: ToolRegistry,
        bodies: ToolBodies,
        inference: Arc<dyn InferenceProvider>,
    ) -> Self {
        Self {
            config,
            registry,
            bodies,
            inference,
            channel: Arc::new(AutoRejectChannel),
            validator: Arc::new(DefaultToolValidator),
            recorder: Arc::new(NoSessionRecorder),
            progress: Arc::new(NoAgentProgress),
            hooks: Arc::new(NoHooks),
        }
    }

    pub fn with_approval_channel(mut self, channel: Arc<dyn ApprovalChannel>) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn ToolValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn SessionRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn AgentProgressNotifier>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn HookRunner>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Register the coordination tools and wire everything together.
    pub fn build(self) -> Result<Session, RegistryError> {
        let SessionBuilder {
            config,
            mut registry,
            mut bodies,
            inference,
            channel,
            validator,
            recorder,
            progress,
            hooks,
        } = self;

        for definition in coordination_definitions() {
            if !registry.contains(&definition.name) {
                registry.register(definition)?;
            }
        }
        let registry = Arc::new(registry);
        let approvals = Arc::new(ApprovalLedger::new(
            channel,
            config.policy.approval_mode,
            recorder.clone(),
            progress.clone(),
        ));

        let coordinator = Arc::new_cyclic(|weak| {
            bodies.register_all(
                &COORDINATION_TOOLS,
                Arc::new(CoordinationTools::new(weak.clone())),
            );
            let executor = Arc::new(
                ToolExecutor::new(
                    registry,
                    bodies,
                    validator,
                    config.policy.clone(),
                    approvals.clone(),
                    recorder.clone(),
                    progress.clone(),
                )
                .with_hooks(hooks.clone()),
            );
            let runner = Arc::new(
                AgentRunner::new(
                    config.clone(),
                    inference,
                    executor,
                    approvals.clone(),
                    recorder.clone(),
                    progress.clone(),
                )
                .with_hooks(hooks),
            );
            AgentCoordinator::new(runner, config.coordinator.clone(), recorder, progress)
        });

        Ok(Session {
            coordinator,
            approvals,
        })
    }
}

pub struct Session {
    coordinator: Arc<AgentCoordinator>,
    approvals: Arc<ApprovalLedger>,
}

impl Session {
    pub fn coordinator(&self) -> &Arc<AgentCoordinator> {
        &self.coordinator
    }

    pub fn executor(&self) -> &Arc<ToolExecutor> {
        self.coordinator.runner().executor()
    }

    pub fn approvals(&self) -> &Arc<ApprovalLedger> {
        &self.approvals
    }

    /// Run a root goal to a terminal phase.
    pub async fn run(&self, goal: impl Into<String>) -> RunReport {
        let goal = goal.into();
        let (handle, status) = self.coordinator.run_root(goal.clone()).await;
        let (phase, plan, entries) =
            handle.read(|s| (s.phase(), s.plan.clone(), s.log().entries().to_vec()));
        RunReport {
            agent_id: handle.id().clone(),
            goal,
            status,
            phase,
            plan,
            entries,
            children: self.coordinator.list(handle.id()),
        }
    }

    /// Cancel every agent still running and wait for them.
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("coordinator", &self.coordinator)
            .finish()
    }
}
