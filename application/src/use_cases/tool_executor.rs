//! Tool executor.
//!
//! Every tool call from every agent goes through [`ToolExecutor::execute`]:
//!
//! 1. record the call
//! 2. resolve the name (aliases included)
//! 3. check the tool category against the agent's phase
//! 4. validate arguments
//! 5. pass the approval gate the policy requires
//! 6. run the `pre_tool` hooks (and `pre_commit` for commits); a failing
//!    hook stops the call
//! 7. run the body on its own task, forwarding streamed chunks
//! 8. run the `post_tool` hooks, then `post_commit` or `on_error` as the
//!    outcome warrants
//! 9. normalize the outcome into a [`ToolResult`] and append it to the
//!    agent's log together with the call
//!
//! A body that panics or errors never takes the agent down; it becomes an
//! `error` result like any other.

use crate::ports::agent_progress::AgentProgressNotifier;
use crate::ports::approval_channel::ApprovalError;
use crate::ports::hooks::{HookContext, HookEvent, HookOutcome, HookRunner, NoHooks};
use crate::ports::session_recorder::SessionRecorder;
use crate::ports::tool_body::{ChunkSender, ToolBodies, ToolBody, ToolContext};
use crate::use_cases::agent_handle::AgentHandle;
use crate::use_cases::approval::ApprovalLedger;
use gatehouse_domain::{
    AgentPolicy, GateRequirement, SessionRecord, ToolCall, ToolDefinition, ToolError,
    ToolInvocation, ToolOutput, ToolRegistry, ToolResult, ToolStatus, ToolValidator, names,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, warn};

/// Incremental view of a streaming call.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    Chunk(String),
    /// Always the last event
    Finished(ToolResult),
}

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    bodies: ToolBodies,
    validator: Arc<dyn ToolValidator>,
    policy: AgentPolicy,
    approvals: Arc<ApprovalLedger>,
    recorder: Arc<dyn SessionRecorder>,
    progress: Arc<dyn AgentProgressNotifier>,
    hooks: Arc<dyn HookRunner>,
}

/// A call that passed every check and may run.
struct Admitted {
    definition: ToolDefinition,
    invocation: ToolInvocation,
    body: Arc<dyn ToolBody>,
}

impl ToolExecutor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        bodies: ToolBodies,
        validator: Arc<dyn ToolValidator>,
        policy: AgentPolicy,
        approvals: Arc<ApprovalLedger>,
        recorder: Arc<dyn SessionRecorder>,
        progress: Arc<dyn AgentProgressNotifier>,
    ) -> Self {
        Self {
            registry,
            bodies,
            validator,
            policy,
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

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn validator(&self) -> &dyn ToolValidator {
        self.validator.as_ref()
    }

    /// Execute a call and wait for its result.
    pub async fn execute(&self, handle: &AgentHandle, call: ToolCall) -> ToolResult {
        self.execute_with_sink(handle, call, None).await
    }

    /// Execute a call, returning its chunks as they arrive followed by the
    /// final result.
    pub fn execute_streaming(
        self: &Arc<Self>,
        handle: &AgentHandle,
        call: ToolCall,
    ) -> mpsc::UnboundedReceiver<ExecutionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let executor = Arc::clone(self);
        let handle = handle.clone();
        tokio::spawn(async move {
            let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<String>();
            let forward = {
                let tx = tx.clone();
                tokio::spawn(async move {
                    while let Some(chunk) = chunk_rx.recv().await {
                        let _ = tx.send(ExecutionEvent::Chunk(chunk));
                    }
                })
            };
            let result = executor
                .execute_with_sink(&handle, call, Some(chunk_tx))
                .await;
            // The sink is dropped with the call, so the forwarder drains and ends.
            let _ = forward.await;
            let _ = tx.send(ExecutionEvent::Finished(result));
        });
        rx
    }

    async fn execute_with_sink(
        &self,
        handle: &AgentHandle,
        call: ToolCall,
        sink: Option<mpsc::UnboundedSender<String>>,
    ) -> ToolResult {
        let started = Instant::now();
        self.recorder.record(&SessionRecord::ToolCall { call: call.clone() });
        self.progress.on_tool_call(&call);

        let result = match self.admit(handle, &call).await {
            Ok(admitted) => self.run_hooked(handle, &call, admitted, sink).await,
            Err(result) => *result,
        };
        let result = result.with_duration(started.elapsed().as_millis() as u64);

        debug!(
            agent_id = %handle.id(),
            call_id = %call.id,
            tool = %result.tool_name,
            status = result.status.as_str(),
            duration_ms = result.duration_ms,
            "Tool call finished"
        );

        handle.record_tool(call, result.clone());
        self.recorder.record(&SessionRecord::ToolResult {
            agent_id: handle.id().clone(),
            result: result.clone(),
        });
        self.progress.on_tool_result(handle.id(), &result);
        result
    }

    /// Run every check that precedes the body. On refusal, returns the
    /// final result instead.
    async fn admit(&self, handle: &AgentHandle, call: &ToolCall) -> Result<Admitted, Box<ToolResult>> {
        let refuse = |name: &str, error: ToolError| {
            Box::new(ToolResult::error(call.id.clone(), name, error))
        };

        let definition = self
            .registry
            .resolve(&call.tool_name)
            .map_err(|_| refuse(&call.tool_name, ToolError::unknown_tool(&call.tool_name)))?
            .clone();
        let name = definition.name.clone();

        let phase = handle.phase();
        if !definition.category.allowed_in(phase) {
            return Err(refuse(&name, ToolError::phase_mismatch(&name, phase.as_str())));
        }

        self.validator
            .validate(&call.arguments, &definition)
            .map_err(|msg| refuse(&name, ToolError::invalid_argument(msg)))?;
        let invocation = ToolInvocation::parse(&name, &call.arguments)
            .map_err(|msg| refuse(&name, ToolError::invalid_argument(msg)))?;

        let body = self.bodies.get(&name).ok_or_else(|| {
            refuse(
                &name,
                ToolError::execution_failed(format!("No body registered for tool '{}'", name)),
            )
        })?;

        let covered = call.plan_step.is_some_and(|step| {
            self.approvals.approved_revision(handle.id()) == Some(step.revision)
        });
        match self.policy.gate_for(&definition, &invocation, covered) {
            GateRequirement::None => {}
            GateRequirement::Plan => {
                debug!(call_id = %call.id, "Covered by approved plan gate");
            }
            GateRequirement::PerCall => {
                let reason = match invocation
                    .command_line()
                    .and_then(|cmd| self.policy.dangerous_pattern(cmd))
                {
                    Some(pattern) => format!("command matches dangerous pattern '{}'", pattern),
                    None => format!("'{}' mutates state outside an approved plan", name),
                };
                let preview = body.preview(&invocation).await;
                match self
                    .approvals
                    .review_call(handle, call, &definition, reason, preview)
                    .await
                {
                    Ok(None) => {}
                    Ok(Some(feedback)) => {
                        return Err(Box::new(ToolResult::denied(call.id.clone(), &name, feedback)));
                    }
                    Err(ApprovalError::Cancelled) => {
                        return Err(Box::new(ToolResult::cancelled(call.id.clone(), &name)));
                    }
                    Err(ApprovalError::IoError(e)) => {
                        warn!(call_id = %call.id, error = %e, "Approval channel failed");
                        return Err(Box::new(ToolResult::denied(
                            call.id.clone(),
                            &name,
                            format!("approval channel failed: {}", e),
                        )));
                    }
                }
            }
        }

        if handle.is_cancelled() {
            return Err(Box::new(ToolResult::cancelled(call.id.clone(), &name)));
        }

        Ok(Admitted {
            definition,
            invocation,
            body,
        })
    }

    /// Surround the body with the hooks configured for it.
    async fn run_hooked(
        &self,
        handle: &AgentHandle,
        call: &ToolCall,
        admitted: Admitted,
        sink: Option<mpsc::UnboundedSender<String>>,
    ) -> ToolResult {
        let name = admitted.definition.name.clone();
        let commit = name == names::GIT_COMMIT;
        let context = HookContext::new(handle.id().clone())
            .with_tool(&name)
            .with_var("call_id", call.id.as_str())
            .with_var("phase", handle.phase().as_str());

        let mut pre = vec![HookEvent::PreTool];
        if commit {
            pre.push(HookEvent::PreCommit);
        }
        for event in pre {
            let outcome = tokio::select! {
                biased;
                _ = handle.cancellation().cancelled() => {
                    return ToolResult::cancelled(call.id.clone(), &name);
                }
                outcome = self.hooks.run(event, &context) => outcome,
            };
            if let HookOutcome::Blocked { command, reason } = outcome {
                warn!(call_id = %call.id, tool = %name, event = event.as_str(), command = %command, "Hook blocked tool call");
                return ToolResult::error(
                    call.id.clone(),
                    &name,
                    ToolError::hook_blocked(event.as_str(), &command, &reason),
                );
            }
        }

        let result = self.run_body(handle, call, admitted, sink).await;
        if result.status == ToolStatus::Cancelled {
            return result;
        }

        let context = context.with_var("status", result.status.as_str());
        let mut post = vec![(HookEvent::PostTool, context.clone())];
        if commit && result.is_ok() {
            post.push((HookEvent::PostCommit, context.clone()));
        }
        if let Some(error) = &result.error {
            post.push((
                HookEvent::OnError,
                context.with_var("error", format!("{}: {}", error.code, error.message)),
            ));
        }
        for (event, context) in post {
            if let HookOutcome::Blocked { command, reason } = self.hooks.run(event, &context).await {
                warn!(call_id = %call.id, event = event.as_str(), command = %command, reason = %reason, "Hook failed");
            }
        }
        result
    }

    async fn run_body(
        &self,
        handle: &AgentHandle,
        call: &ToolCall,
        admitted: Admitted,
        sink: Option<mpsc::UnboundedSender<String>>,
    ) -> ToolResult {
        let Admitted {
            definition,
            invocation,
            body,
        } = admitted;
        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<String>();
        let ctx = ToolContext {
            agent_id: handle.id().clone(),
            cancellation: handle.cancellation().clone(),
            chunks: ChunkSender::new(chunk_tx),
        };

        let mut task = tokio::spawn(async move { body.invoke(invocation, ctx).await });
        let mut open = true;
        let joined = loop {
            tokio::select! {
                chunk = chunk_rx.recv(), if open => match chunk {
                    Some(chunk) => self.forward_chunk(handle, call, &sink, chunk),
                    None => open = false,
                },
                joined = &mut task => break joined,
            }
        };
        while let Ok(chunk) = chunk_rx.try_recv() {
            self.forward_chunk(handle, call, &sink, chunk);
        }

        self.normalize(call, &definition.name, joined)
    }

    fn forward_chunk(
        &self,
        handle: &AgentHandle,
        call: &ToolCall,
        sink: &Option<mpsc::UnboundedSender<String>>,
        chunk: String,
    ) {
        self.recorder.record(&SessionRecord::OutputChunk {
            agent_id: handle.id().clone(),
            call_id: call.id.clone(),
            chunk: chunk.clone(),
        });
        self.progress.on_tool_output(handle.id(), &call.id, &chunk);
        if let Some(sink) = sink {
            let _ = sink.send(chunk);
        }
    }

    fn normalize(
        &self,
        call: &ToolCall,
        name: &str,
        joined: Result<Result<ToolOutput, ToolError>, JoinError>,
    ) -> ToolResult {
        match joined {
            Ok(Ok(output)) => ToolResult::ok(call.id.clone(), name, output),
            Ok(Err(error)) if error.code == ToolError::cancelled().code => {
                ToolResult::cancelled(call.id.clone(), name)
            }
            Ok(Err(error)) => ToolResult::error(call.id.clone(), name, error),
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    "tool body panicked"
                } else {
                    "tool body was aborted"
                };
                warn!(call_id = %call.id, tool = name, "{}", message);
                ToolResult::error(call.id.clone(), name, ToolError::execution_failed(message))
            }
        }
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("tools", &self.registry.len())
            .field("bodies", &self.bodies)
            .finish()
    }
}
