//! Run Agent use case
//!
//! Drives one agent through its phase loop:
//!
//! | Phase               | Work                                     | Exit event                    |
//! |---------------------|------------------------------------------|-------------------------------|
//! | BOOT                | nothing                                  | `start`                       |
//! | PLANNING            | ask the planner, validate the plan       | `plan_proposed`               |
//! | AWAITING_APPROVAL   | plan gate                                | `plan_approved` / `plan_rejected` |
//! | EXECUTING           | run steps in order                       | `steps_finished`              |
//! | VALIDATING          | step failures, test results              | `validation_passed` / `validation_failed` |
//! | CI_CHECK            | `ci_status` when enabled                 | `ci_passed` / `ci_failed`     |
//!
//! Any unrecoverable error, the plan revision limit, the remediation limit,
//! the iteration limit and cancellation end in `FAILED`.
//!
//! Lifecycle hooks fire when a root agent starts (`on_start`), when a plan
//! revision is adopted (`on_plan_approved`) and when the agent ends
//! (`on_complete` or `on_error`; cancelled agents fire neither). They are
//! advisory here: a failing hook is logged and the agent carries on.

mod types;

pub use types::RunAgentError;

use types::{RemediationCause, StepsOutcome};

use crate::config::EngineConfig;
use crate::ports::agent_progress::AgentProgressNotifier;
use crate::ports::approval_channel::ApprovalError;
use crate::ports::hooks::{HookContext, HookEvent, HookOutcome, HookRunner, NoHooks};
use crate::ports::inference::{InferenceProvider, PlanningRequest, RemediationRequest};
use crate::ports::session_recorder::SessionRecorder;
use crate::use_cases::agent_handle::AgentHandle;
use crate::use_cases::approval::{ApprovalLedger, PlanVerdict};
use crate::use_cases::tool_executor::ToolExecutor;
use gatehouse_domain::{
    AgentKind, AgentStatus, FailureReason, LogEntry, PhaseEvent, Plan, SessionRecord, ToolCall, ToolResult,
    ToolStatus, names,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lines of tool output quoted back to the planner on failure.
const FAILURE_TAIL_LINES: usize = 20;

/// Use case for running a single agent to a terminal phase
pub struct AgentRunner {
    config: EngineConfig,
    inference: Arc<dyn InferenceProvider>,
    executor: Arc<ToolExecutor>,
    approvals: Arc<ApprovalLedger>,
    recorder: Arc<dyn SessionRecorder>,
    progress: Arc<dyn AgentProgressNotifier>,
    hooks: Arc<dyn HookRunner>,
}

impl AgentRunner {
    pub fn new(
        config: EngineConfig,
        inference: Arc<dyn InferenceProvider>,
        executor: Arc<ToolExecutor>,
        approvals: Arc<ApprovalLedger>,
        recorder: Arc<dyn SessionRecorder>,
        progress: Arc<dyn AgentProgressNotifier>,
    ) -> Self {
        Self {
            config,
            inference,
            executor,
            approvals,
            recorder,
            progress,
            hooks: Arc::new(NoHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn HookRunner>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn executor(&self) -> &Arc<ToolExecutor> {
        &self.executor
    }

    pub fn approvals(&self) -> &Arc<ApprovalLedger> {
        &self.approvals
    }

    /// Run the agent until it is terminal, then publish its status.
    pub async fn run(&self, handle: AgentHandle) -> AgentStatus {
        let (goal, kind) = handle.read(|s| (s.task().goal().to_string(), s.kind));
        info!(agent_id = %handle.id(), goal = %goal, "Starting agent");
        if kind == AgentKind::Root {
            let context = HookContext::new(handle.id().clone()).with_var("goal", goal.clone());
            self.fire(HookEvent::OnStart, &context).await;
        }

        let status = match self.drive(&handle).await {
            Ok(()) => AgentStatus::Completed,
            Err(e) => {
                let reason = if handle.is_cancelled() {
                    FailureReason::Cancelled
                } else {
                    e.into_failure()
                };
                warn!(agent_id = %handle.id(), reason = %reason, "Agent failed");
                if let Some(entry) = handle.fail(reason.clone()) {
                    self.announce(&handle, entry);
                }
                AgentStatus::from_failure(reason)
            }
        };

        info!(agent_id = %handle.id(), status = %status, "Agent finished");
        let finished = match &status {
            AgentStatus::Completed => Some(HookEvent::OnComplete),
            AgentStatus::Failed { .. } => Some(HookEvent::OnError),
            AgentStatus::Cancelled => None,
        };
        if let Some(event) = finished {
            let context = HookContext::new(handle.id().clone())
                .with_var("goal", goal)
                .with_var("status", status.to_string());
            self.fire(event, &context).await;
        }
        handle.publish(status.clone());
        self.progress.on_agent_finished(handle.id(), &status);
        // Children cannot report to a terminal parent; stop them.
        handle.cancel();
        status
    }

    async fn drive(&self, handle: &AgentHandle) -> Result<(), RunAgentError> {
        self.transition(handle, PhaseEvent::Start)?;
        let mut plan = self.plan_until_approved(handle).await?;

        loop {
            let outcome = self.execute_steps(handle, &plan).await?;
            self.transition(handle, PhaseEvent::StepsFinished)?;

            let failures = self.validate(handle, outcome).await?;
            if !failures.is_empty() {
                plan = self
                    .remediate(handle, &plan, failures, RemediationCause::Validation)
                    .await?;
                continue;
            }
            self.transition(handle, PhaseEvent::ValidationPassed)?;

            let failures = self.check_ci(handle).await?;
            if !failures.is_empty() {
                plan = self
                    .remediate(handle, &plan, failures, RemediationCause::Ci)
                    .await?;
                continue;
            }
            self.transition(handle, PhaseEvent::CiPassed)?;
            return Ok(());
        }
    }

    // ==================== Planning ====================

    /// Propose plans until one passes its gate or the revision limit is hit.
    async fn plan_until_approved(&self, handle: &AgentHandle) -> Result<Plan, RunAgentError> {
        let (goal, kind) = handle.read(|s| (s.task().goal().to_string(), s.kind));
        let mut revision = 0;
        let mut feedback: Option<String> = None;

        loop {
            revision += 1;
            let request = PlanningRequest {
                agent_id: handle.id().clone(),
                kind,
                goal: goal.clone(),
                revision,
                feedback: feedback.take(),
            };
            let draft = self
                .cancellable(handle, self.inference.plan(&request))
                .await??;

            let mut plan = Plan::new(goal.clone(), revision, draft.steps);
            if let Some(rationale) = draft.rationale {
                plan = plan.with_rationale(rationale);
            }

            if let Err(e) = plan.validate(self.executor.registry(), self.executor.validator()) {
                warn!(agent_id = %handle.id(), revision, error = %e, "Planner produced an invalid plan");
                feedback = Some(format!("Plan revision {} is invalid: {}", revision, e));
                self.count_rejection(handle)?;
                continue;
            }

            handle.update(|s| s.plan = Some(plan.clone()));
            self.transition(handle, PhaseEvent::PlanProposed { revision })?;

            let verdict = match self.approvals.review_plan(handle, &goal, &plan).await {
                Ok(verdict) => verdict,
                Err(ApprovalError::Cancelled) => return Err(RunAgentError::Cancelled),
                Err(ApprovalError::IoError(e)) => PlanVerdict::Rejected {
                    feedback: Some(format!("approval channel failed: {}", e)),
                },
            };

            match verdict {
                PlanVerdict::Approved => {
                    self.adopt(handle, &plan).await?;
                    return Ok(plan);
                }
                PlanVerdict::Edited(edited) => {
                    revision += 1;
                    let edited = edited.with_revision(revision);
                    match edited.validate(self.executor.registry(), self.executor.validator()) {
                        Ok(()) => {
                            info!(agent_id = %handle.id(), revision, "Adopting edited plan");
                            handle.update(|s| s.plan = Some(edited.clone()));
                            self.adopt(handle, &edited).await?;
                            return Ok(edited);
                        }
                        Err(e) => {
                            let reason = format!("Edited plan is invalid: {}", e);
                            self.transition(
                                handle,
                                PhaseEvent::PlanRejected {
                                    feedback: Some(reason.clone()),
                                },
                            )?;
                            feedback = Some(reason);
                            self.count_rejection(handle)?;
                        }
                    }
                }
                PlanVerdict::Rejected { feedback: reason } => {
                    self.transition(
                        handle,
                        PhaseEvent::PlanRejected {
                            feedback: reason.clone(),
                        },
                    )?;
                    feedback = reason;
                    self.count_rejection(handle)?;
                }
            }
        }
    }

    async fn adopt(&self, handle: &AgentHandle, plan: &Plan) -> Result<(), RunAgentError> {
        self.transition(
            handle,
            PhaseEvent::PlanApproved {
                revision: plan.revision,
            },
        )?;
        self.approvals.adopt_plan(handle.id(), plan.revision);
        let context = HookContext::new(handle.id().clone())
            .with_var("goal", plan.goal.clone())
            .with_var("revision", plan.revision.to_string())
            .with_var("steps", plan.len().to_string());
        self.fire(HookEvent::OnPlanApproved, &context).await;
        Ok(())
    }

    fn count_rejection(&self, handle: &AgentHandle) -> Result<(), RunAgentError> {
        let rejections = handle.update(|s| {
            s.plan_revisions += 1;
            s.plan_revisions
        });
        if self.config.policy.revision_allowed(rejections) {
            Ok(())
        } else {
            Err(RunAgentError::PlanRejected(rejections))
        }
    }

    // ==================== Execution ====================

    /// Run the plan's steps strictly in order.
    ///
    /// A failed step stops the revision; a denied step is a normal outcome
    /// and execution moves on.
    async fn execute_steps(
        &self,
        handle: &AgentHandle,
        plan: &Plan,
    ) -> Result<StepsOutcome, RunAgentError> {
        let mut outcome = StepsOutcome::default();
        let max_iterations = self.config.policy.max_iterations;

        for step in plan.steps() {
            if handle.is_cancelled() {
                return Err(RunAgentError::Cancelled);
            }
            let iterations = handle.update(|s| {
                s.iterations += 1;
                s.iterations
            });
            if iterations > max_iterations {
                return Err(RunAgentError::IterationLimit(max_iterations));
            }

            self.progress.on_step_start(handle.id(), step, plan.len());
            let call = ToolCall::new(handle.id().clone(), &step.tool_name)
                .with_arguments(step.arguments.clone())
                .for_step(plan.revision, step.index);
            let result = self.executor.execute(handle, call).await;

            match result.status {
                ToolStatus::Ok => {
                    if result.tool_name == names::RUN_TESTS {
                        outcome.last_test = Some(result);
                    }
                }
                ToolStatus::Denied => {
                    info!(agent_id = %handle.id(), step = step.index, "Step denied, continuing");
                }
                ToolStatus::Cancelled => return Err(RunAgentError::Cancelled),
                ToolStatus::Error => {
                    let failure = format!(
                        "Step {} ({}) failed: {}",
                        step.index,
                        result.tool_name,
                        tail(&result.output)
                    );
                    warn!(agent_id = %handle.id(), step = step.index, "{}", failure);
                    outcome.failures.push(failure);
                    break;
                }
            }
        }
        Ok(outcome)
    }

    // ==================== Validation ====================

    async fn validate(
        &self,
        handle: &AgentHandle,
        outcome: StepsOutcome,
    ) -> Result<Vec<String>, RunAgentError> {
        if !outcome.failures.is_empty() {
            return Ok(outcome.failures);
        }

        let test = match outcome.last_test {
            Some(result) => Some(result),
            None if self.config.validate_with_tests => Some(
                self.executor
                    .execute(handle, ToolCall::new(handle.id().clone(), names::RUN_TESTS))
                    .await,
            ),
            None => None,
        };

        let mut failures = Vec::new();
        if let Some(result) = test {
            if result.status == ToolStatus::Cancelled {
                return Err(RunAgentError::Cancelled);
            }
            if !passed(&result) {
                failures.push(format!("Tests failed: {}", tail(&result.output)));
            }
        }
        Ok(failures)
    }

    async fn check_ci(&self, handle: &AgentHandle) -> Result<Vec<String>, RunAgentError> {
        if !self.config.ci_enabled {
            debug!(agent_id = %handle.id(), "CI check disabled");
            return Ok(Vec::new());
        }
        let result = self
            .executor
            .execute(handle, ToolCall::new(handle.id().clone(), names::CI_STATUS))
            .await;
        match result.status {
            ToolStatus::Cancelled => Err(RunAgentError::Cancelled),
            _ if passed(&result) => Ok(Vec::new()),
            _ => Ok(vec![format!("CI failed: {}", tail(&result.output))]),
        }
    }

    // ==================== Remediation ====================

    async fn remediate(
        &self,
        handle: &AgentHandle,
        plan: &Plan,
        failures: Vec<String>,
        cause: RemediationCause,
    ) -> Result<Plan, RunAgentError> {
        let attempts = handle.read(|s| s.remediation_attempts);
        if !self.config.policy.remediation_allowed(attempts) {
            return Err(RunAgentError::RemediationExhausted);
        }
        let attempt = handle.update(|s| {
            s.remediation_attempts += 1;
            s.remediation_attempts
        });
        self.progress.on_remediation(handle.id(), attempt, &failures);
        info!(agent_id = %handle.id(), attempt, ?cause, "Requesting remediation");

        let request = RemediationRequest {
            agent_id: handle.id().clone(),
            goal: plan.goal.clone(),
            plan: plan.clone(),
            failures,
            attempt,
        };
        let drafts = self
            .cancellable(handle, self.inference.remediate(&request))
            .await??;

        let next = plan.remediation(drafts);
        next.validate(self.executor.registry(), self.executor.validator())
            .map_err(|e| RunAgentError::StepFailed(format!("invalid remediation plan: {}", e)))?;

        let remediation_revision = next.revision;
        let event = match cause {
            RemediationCause::Validation => PhaseEvent::ValidationFailed {
                remediation_revision,
            },
            RemediationCause::Ci => PhaseEvent::CiFailed {
                remediation_revision,
            },
        };
        handle.update(|s| s.plan = Some(next.clone()));
        self.transition(handle, event)?;
        Ok(next)
    }

    // ==================== Helpers ====================

    async fn cancellable<T>(
        &self,
        handle: &AgentHandle,
        fut: impl Future<Output = T>,
    ) -> Result<T, RunAgentError> {
        tokio::select! {
            biased;
            _ = handle.cancellation().cancelled() => Err(RunAgentError::Cancelled),
            value = fut => Ok(value),
        }
    }

    fn transition(&self, handle: &AgentHandle, event: PhaseEvent) -> Result<(), RunAgentError> {
        let entry = handle.apply(event)?;
        self.announce(handle, entry);
        Ok(())
    }

    /// Run advisory hooks; a failure is only logged.
    async fn fire(&self, event: HookEvent, context: &HookContext) {
        if let HookOutcome::Blocked { command, reason } = self.hooks.run(event, context).await {
            warn!(agent_id = %context.agent_id, event = event.as_str(), command = %command, reason = %reason, "Hook failed");
        }
    }

    fn announce(&self, handle: &AgentHandle, entry: LogEntry) {
        if let LogEntry::Transition { from, to, event, .. } = entry {
            info!(
                agent_id = %handle.id(),
                from = from.as_str(),
                to = to.as_str(),
                event = event.name(),
                "Phase transition"
            );
            self.progress.on_phase_change(handle.id(), from, to);
            self.recorder.record(&SessionRecord::Transition {
                agent_id: handle.id().clone(),
                from,
                to,
                event,
            });
        }
    }
}

/// A test or CI result passes when it ran and exited with zero.
fn passed(result: &ToolResult) -> bool {
    result.is_ok() && result.exit_code.unwrap_or(0) == 0
}

fn tail(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(FAILURE_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::approval_channel::{ApprovalChannel, CallReview, PlanReview};
    use crate::use_cases::test_support::{Harness, RecordingHooks, ScriptedChannel, plan_draft};
    use async_trait::async_trait;
    use gatehouse_domain::{AgentPhase, HumanDecision, PlanDraft, StepDraft};
    use std::time::Duration;

    fn scenario_plan() -> PlanDraft {
        plan_draft(vec![
            StepDraft::new("read", "read_file").with_arg("path", "a.py"),
            StepDraft::new("patch", "apply_patch")
                .with_arg("path", "a.py")
                .with_arg("find", "foo")
                .with_arg("replace", "bar")
                .with_arg("expected_occurrences", 1),
            StepDraft::new("test", "run_tests"),
        ])
    }

    fn events(handle: &AgentHandle) -> Vec<&'static str> {
        handle.read(|s| s.log().events().map(|e| e.name()).collect())
    }

    #[tokio::test]
    async fn test_patch_scenario_completes() {
        let harness = Harness::new();
        harness.fs.put("a.py", "x = foo\n");
        harness.inference.push_plan("fix a.py", scenario_plan());
        harness.tests.push_exit(0);

        let handle = harness.root("fix a.py");
        let status = harness.runner().run(handle.clone()).await;

        assert_eq!(status, AgentStatus::Completed);
        assert_eq!(handle.phase(), AgentPhase::Completed);
        assert_eq!(harness.fs.get("a.py").as_deref(), Some("x = bar\n"));
        let results: Vec<ToolStatus> =
            handle.read(|s| s.log().tool_results().map(|r| r.status).collect());
        assert_eq!(results, vec![ToolStatus::Ok; 3]);
        assert_eq!(
            events(&handle),
            vec![
                "start",
                "plan_proposed",
                "plan_approved",
                "steps_finished",
                "validation_passed",
                "ci_passed"
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_tests_loop_back_with_remediation() {
        let harness = Harness::new();
        harness.fs.put("a.py", "x = foo\n");
        harness.inference.push_plan("fix a.py", scenario_plan());
        harness
            .inference
            .push_remediation(vec![StepDraft::new("retest", "run_tests")]);
        harness.tests.push_exit(1);
        harness.tests.push_exit(0);

        let handle = harness.root("fix a.py");
        let status = harness.runner().run(handle.clone()).await;

        assert_eq!(status, AgentStatus::Completed);
        let events = events(&handle);
        assert!(events.contains(&"validation_failed"));
        assert_eq!(handle.read(|s| s.plan.as_ref().map(|p| p.revision)), Some(2));
        assert_eq!(handle.read(|s| s.remediation_attempts), 1);
    }

    #[tokio::test]
    async fn test_remediation_is_bounded() {
        let harness = Harness::new();
        harness.fs.put("a.py", "x = foo\n");
        harness.inference.push_plan("fix a.py", scenario_plan());
        for _ in 0..5 {
            harness
                .inference
                .push_remediation(vec![StepDraft::new("retest", "run_tests")]);
            harness.tests.push_exit(1);
        }
        harness.tests.push_exit(1);

        let handle = harness.root("fix a.py");
        let status = harness.runner().run(handle.clone()).await;

        assert_eq!(
            status,
            AgentStatus::Failed {
                reason: FailureReason::RemediationExhausted
            }
        );
        assert_eq!(handle.read(|s| s.remediation_attempts), 2);
    }

    #[tokio::test]
    async fn test_patch_no_match_fails_step_and_remediates() {
        let harness = Harness::new();
        harness.fs.put("a.py", "x = 1\n");
        harness.inference.push_plan("fix a.py", scenario_plan());

        let handle = harness.root("fix a.py");
        let status = harness.runner().run(handle.clone()).await;

        // No remediation scripted: the planner has nothing to offer.
        assert!(matches!(
            status,
            AgentStatus::Failed {
                reason: FailureReason::Inference(_)
            }
        ));
        let codes: Vec<Option<String>> = handle.read(|s| {
            s.log()
                .tool_results()
                .map(|r| r.error_code().map(String::from))
                .collect()
        });
        assert_eq!(codes, vec![None, Some("NO_MATCH".to_string())]);
        assert_eq!(harness.fs.get("a.py").as_deref(), Some("x = 1\n"));
    }

    #[tokio::test]
    async fn test_rejections_loop_back_with_feedback_until_limit() {
        let harness = Harness::with_channel(Arc::new(ScriptedChannel::rejecting("too risky")));
        let handle = harness.root("fix a.py");
        let status = harness.runner().run(handle.clone()).await;

        assert_eq!(
            status,
            AgentStatus::Failed {
                reason: FailureReason::PlanRejected
            }
        );
        let seen = harness.inference.feedback_seen();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], None);
        assert_eq!(seen[1].as_deref(), Some("too risky"));
        assert_eq!(
            events(&handle).iter().filter(|e| **e == "plan_rejected").count(),
            3
        );
    }

    #[tokio::test]
    async fn test_lifecycle_hooks_fire_around_the_run() {
        let harness = Harness::new();
        let hooks = Arc::new(RecordingHooks::failing(&[HookEvent::OnPlanApproved]));
        let handle = harness.root("look around");
        let status = harness.runner().with_hooks(hooks.clone()).run(handle).await;

        // A failing advisory hook does not stop the agent.
        assert_eq!(status, AgentStatus::Completed);
        assert_eq!(
            hooks.events(),
            vec![HookEvent::OnStart, HookEvent::OnPlanApproved, HookEvent::OnComplete]
        );
        let fired = hooks.fired.lock().unwrap();
        assert_eq!(fired[2].2.as_deref(), Some("completed"));
    }

    #[tokio::test]
    async fn test_failed_agent_fires_on_error() {
        let harness = Harness::with_channel(Arc::new(ScriptedChannel::rejecting("no")));
        let hooks = Arc::new(RecordingHooks::default());
        let handle = harness.root("fix a.py");
        let status = harness.runner().with_hooks(hooks.clone()).run(handle).await;

        assert!(matches!(status, AgentStatus::Failed { .. }));
        assert_eq!(hooks.events(), vec![HookEvent::OnStart, HookEvent::OnError]);
    }

    #[tokio::test]
    async fn test_invalid_plan_counts_as_rejection() {
        let harness = Harness::new();
        harness.inference.push_plan(
            "g",
            plan_draft(vec![StepDraft::new("nope", "teleport")]),
        );
        let handle = harness.root("g");
        let status = harness.runner().run(handle.clone()).await;

        assert_eq!(status, AgentStatus::Completed);
        let seen = harness.inference.feedback_seen();
        assert!(seen[1].as_deref().unwrap_or("").contains("invalid"));
    }

    struct EditsPlan;

    #[async_trait]
    impl ApprovalChannel for EditsPlan {
        async fn review_plan(&self, review: &PlanReview) -> Result<HumanDecision, ApprovalError> {
            Ok(HumanDecision::Edit(Plan::new(
                review.goal.clone(),
                review.plan.revision,
                vec![StepDraft::new("list", "list_directory")],
            )))
        }

        async fn review_call(&self, _review: &CallReview) -> Result<HumanDecision, ApprovalError> {
            Ok(HumanDecision::Approve)
        }
    }

    #[tokio::test]
    async fn test_edited_plan_becomes_new_revision() {
        let harness = Harness::with_channel(Arc::new(EditsPlan));
        let handle = harness.root("g");
        let status = harness.runner().run(handle.clone()).await;

        assert_eq!(status, AgentStatus::Completed);
        let plan = handle.read(|s| s.plan.clone()).unwrap();
        assert_eq!(plan.revision, 2);
        assert_eq!(plan.steps()[0].tool_name, "list_directory");
        assert_eq!(harness.approvals.approved_revision(handle.id()), Some(2));
    }

    #[tokio::test]
    async fn test_cancel_while_awaiting_approval() {
        let harness = Harness::with_channel(Arc::new(ScriptedChannel::never()));
        let handle = harness.root("g");
        let runner = Arc::new(harness.runner());
        let task = {
            let handle = handle.clone();
            let runner = runner.clone();
            tokio::spawn(async move { runner.run(handle).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.phase(), AgentPhase::AwaitingApproval);

        handle.cancel();
        let status = task.await.unwrap();
        assert_eq!(status, AgentStatus::Cancelled);
        assert_eq!(handle.phase(), AgentPhase::Failed);
        assert_eq!(
            handle.read(|s| s.failure.clone()),
            Some(FailureReason::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let harness = Harness::new().with_config(|c| {
            c.policy.max_iterations = 2;
        });
        harness.inference.push_plan(
            "g",
            plan_draft(vec![
                StepDraft::new("a", "list_directory"),
                StepDraft::new("b", "list_directory"),
                StepDraft::new("c", "list_directory"),
            ]),
        );
        let handle = harness.root("g");
        let status = harness.runner().run(handle).await;
        assert_eq!(
            status,
            AgentStatus::Failed {
                reason: FailureReason::IterationLimit
            }
        );
    }

    #[tokio::test]
    async fn test_validation_runs_tests_when_plan_did_not() {
        let harness = Harness::new().with_config(|c| c.validate_with_tests = true);
        harness.tests.push_exit(0);
        let handle = harness.root("g");
        let status = harness.runner().run(handle.clone()).await;

        assert_eq!(status, AgentStatus::Completed);
        assert_eq!(harness.tests.runs(), 1);
    }

    #[tokio::test]
    async fn test_ci_failure_loops_back() {
        let harness = Harness::new().with_config(|c| c.ci_enabled = true);
        harness.ci.push_exit(1);
        harness.ci.push_exit(0);
        harness
            .inference
            .push_remediation(vec![StepDraft::new("look again", "list_directory")]);

        let handle = harness.root("g");
        let status = harness.runner().run(handle.clone()).await;

        assert_eq!(status, AgentStatus::Completed);
        assert!(events(&handle).contains(&"ci_failed"));
        assert_eq!(harness.ci.runs(), 2);
    }
}
