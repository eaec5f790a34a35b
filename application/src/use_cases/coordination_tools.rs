//! Coordination tools.
//!
//! Exposes the [`AgentCoordinator`] to agents as ordinary tools, so that
//! spawning and waiting go through the same executor path (phase check,
//! logging, result envelope) as every other effector. The calling agent is
//! always the parent.

use crate::ports::tool_body::{ToolBody, ToolContext};
use crate::use_cases::coordinator::AgentCoordinator;
use async_trait::async_trait;
use gatehouse_domain::{
    AgentId, AgentKind, ParamType, ToolCategory, ToolDefinition, ToolError, ToolInvocation,
    ToolOutput, ToolParameter, names,
};
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::sync::Weak;
use std::time::Duration;

/// Canonical names served by [`CoordinationTools`].
pub const COORDINATION_TOOLS: [&str; 7] = [
    names::SPAWN_AGENT,
    names::SPAWN_PARALLEL,
    names::WAIT_AGENT,
    names::WAIT_ALL_AGENTS,
    names::AGENT_STATUS,
    names::CANCEL_AGENT,
    names::LIST_AGENTS,
];

pub fn coordination_definitions() -> Vec<ToolDefinition> {
    let agent_id = || ToolParameter::new("agent_id", "Id of a previously spawned agent", true);
    let timeout = || {
        ToolParameter::new("timeout_secs", "Give up waiting after this many seconds", false)
            .with_type(ParamType::Integer)
    };
    let coordination = |name: &str, description: &str| {
        ToolDefinition::new(name, description, ToolCategory::Coordination)
    };

    vec![
        coordination(
            names::SPAWN_AGENT,
            "Start a child agent (explore, plan, execute, research) with its own goal",
        )
        .with_parameter(ToolParameter::new("kind", "Child agent kind", true))
        .with_parameter(ToolParameter::new("goal", "Goal handed to the child", true)),
        coordination(
            names::SPAWN_PARALLEL,
            "Start several child agents at once; either all start or none do",
        )
        .with_parameter(
            ToolParameter::new("agents", "List of {kind, goal} objects", true)
                .with_type(ParamType::Array),
        ),
        coordination(names::WAIT_AGENT, "Block until a child agent is terminal")
            .with_parameter(agent_id())
            .with_parameter(timeout()),
        coordination(
            names::WAIT_ALL_AGENTS,
            "Block until every listed agent is terminal or the deadline passes",
        )
        .with_parameter(
            ToolParameter::new("agent_ids", "Agent ids to wait for", true)
                .with_type(ParamType::Array),
        )
        .with_parameter(timeout()),
        coordination(names::AGENT_STATUS, "Current phase and status of an agent")
            .with_parameter(agent_id()),
        coordination(
            names::CANCEL_AGENT,
            "Cancel an agent and all of its descendants",
        )
        .with_parameter(agent_id()),
        coordination(names::LIST_AGENTS, "List the children of the calling agent"),
    ]
}

/// Body behind every coordination tool.
///
/// Holds a weak reference: the coordinator owns the executor that owns this
/// body.
pub struct CoordinationTools {
    coordinator: Weak<AgentCoordinator>,
}

impl CoordinationTools {
    pub fn new(coordinator: Weak<AgentCoordinator>) -> Self {
        Self { coordinator }
    }
}

fn parse_kind(kind: &str) -> Result<AgentKind, ToolError> {
    AgentKind::parse_spawnable(kind).ok_or_else(|| {
        ToolError::invalid_argument(format!(
            "Unknown agent kind '{}' (expected explore, plan, execute or research)",
            kind
        ))
    })
}

fn to_data<T: Serialize>(value: &T) -> Result<serde_json::Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::execution_failed(e.to_string()))
}

/// Abandon a blocking coordinator call when the calling agent is cancelled.
async fn until_cancelled<T>(
    ctx: &ToolContext,
    fut: impl Future<Output = T>,
) -> Result<T, ToolError> {
    tokio::select! {
        biased;
        _ = ctx.cancellation.cancelled() => Err(ToolError::cancelled()),
        value = fut => Ok(value),
    }
}

#[async_trait]
impl ToolBody for CoordinationTools {
    async fn invoke(
        &self,
        invocation: ToolInvocation,
        ctx: ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let coordinator = self
            .coordinator
            .upgrade()
            .ok_or_else(|| ToolError::execution_failed("Coordinator has shut down"))?;
        let default_timeout = coordinator.limits().default_wait_timeout;
        let timeout_or_default =
            |secs: Option<u64>| secs.map(Duration::from_secs).unwrap_or(default_timeout);

        match invocation {
            ToolInvocation::SpawnAgent(request) => {
                let kind = parse_kind(&request.kind)?;
                let id = coordinator.spawn(&ctx.agent_id, kind, request.goal)?;
                Ok(ToolOutput::text(format!("Spawned {} agent {}", kind, id))
                    .with_data(json!({ "agent_id": id })))
            }
            ToolInvocation::SpawnParallel(args) => {
                let requests = args
                    .agents
                    .into_iter()
                    .map(|r| parse_kind(&r.kind).map(|kind| (kind, r.goal)))
                    .collect::<Result<Vec<_>, ToolError>>()?;
                let ids = coordinator.spawn_parallel(&ctx.agent_id, requests)?;
                let listed: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
                Ok(
                    ToolOutput::text(format!("Spawned {} agents: {}", ids.len(), listed.join(", ")))
                        .with_data(json!({ "agent_ids": ids })),
                )
            }
            ToolInvocation::WaitAgent(args) => {
                let id = AgentId::new(args.agent_id);
                let timeout = timeout_or_default(args.timeout_secs);
                let status = until_cancelled(&ctx, coordinator.wait(&ctx.agent_id, &id, timeout)).await??;
                Ok(ToolOutput::text(format!("Agent {} {}", id, status))
                    .with_data(json!({ "agent_id": id, "status": to_data(&status)? })))
            }
            ToolInvocation::WaitAllAgents(args) => {
                let ids: Vec<AgentId> = args.agent_ids.into_iter().map(AgentId::new).collect();
                let timeout = timeout_or_default(args.timeout_secs);
                let outcomes = until_cancelled(&ctx, coordinator.wait_all(&ctx.agent_id, &ids, timeout)).await?;
                let mut lines = Vec::with_capacity(outcomes.len());
                let mut data = serde_json::Map::new();
                for (id, outcome) in &outcomes {
                    lines.push(format!("{}: {}", id, to_data(outcome)?));
                    data.insert(id.to_string(), to_data(outcome)?);
                }
                Ok(ToolOutput::text(lines.join("\n")).with_data(serde_json::Value::Object(data)))
            }
            ToolInvocation::AgentStatus(args) => {
                let snapshot = coordinator.status(&ctx.agent_id, &AgentId::new(args.agent_id))?;
                let status = snapshot
                    .status
                    .as_ref()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "running".to_string());
                Ok(ToolOutput::text(format!(
                    "Agent {} is in {} ({})",
                    snapshot.id, snapshot.phase, status
                ))
                .with_data(to_data(&snapshot)?))
            }
            ToolInvocation::CancelAgent(args) => {
                let id = AgentId::new(args.agent_id);
                coordinator.cancel(&ctx.agent_id, &id)?;
                Ok(ToolOutput::text(format!("Cancellation requested for {}", id)))
            }
            ToolInvocation::ListAgents(_) => {
                let children = coordinator.list(&ctx.agent_id);
                let lines: Vec<String> = children
                    .iter()
                    .map(|c| format!("{} [{}] {} - {}", c.id, c.kind, c.phase, c.goal))
                    .collect();
                let text = if lines.is_empty() {
                    "No child agents".to_string()
                } else {
                    lines.join("\n")
                };
                Ok(ToolOutput::text(text).with_data(to_data(&children)?))
            }
            other => Err(ToolError::invalid_argument(format!(
                "'{}' is not a coordination tool",
                other.name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::Harness;
    use gatehouse_domain::{AgentPhase, PhaseEvent, ToolCall, ToolStatus};

    #[test]
    fn test_definitions_are_coordination_and_ungated() {
        let defs = coordination_definitions();
        assert_eq!(defs.len(), COORDINATION_TOOLS.len());
        for def in &defs {
            assert_eq!(def.category, ToolCategory::Coordination);
            assert!(!def.mutates);
            assert!(COORDINATION_TOOLS.contains(&def.name.as_str()));
        }
    }

    #[tokio::test]
    async fn test_spawn_and_wait_through_executor() {
        let harness = Harness::new();
        let session = harness.session();
        let root = session.coordinator().register_root("root goal");
        root.apply(PhaseEvent::Start).unwrap();
        assert_eq!(root.phase(), AgentPhase::Planning);

        let spawn = ToolCall::new(root.id().clone(), names::SPAWN_AGENT)
            .with_arg("kind", "explore")
            .with_arg("goal", "look around");
        let result = session.executor().execute(&root, spawn).await;
        assert!(result.is_ok(), "{:?}", result.error);
        let child = result.data.as_ref().unwrap()["agent_id"]
            .as_str()
            .unwrap()
            .to_string();

        let wait = ToolCall::new(root.id().clone(), names::WAIT_AGENT)
            .with_arg("agent_id", child.clone())
            .with_arg("timeout_secs", 5);
        let result = session.executor().execute(&root, wait).await;
        assert!(result.is_ok());
        assert_eq!(result.data.unwrap()["status"]["status"], "completed");
    }

    #[tokio::test]
    async fn test_unknown_kind_is_invalid_argument() {
        let harness = Harness::new();
        let session = harness.session();
        let root = session.coordinator().register_root("root goal");
        root.apply(PhaseEvent::Start).unwrap();

        let spawn = ToolCall::new(root.id().clone(), names::SPAWN_AGENT)
            .with_arg("kind", "root")
            .with_arg("goal", "x");
        let result = session.executor().execute(&root, spawn).await;
        assert_eq!(result.status, ToolStatus::Error);
        assert_eq!(result.error_code(), Some("INVALID_ARGUMENT"));
    }

    #[tokio::test]
    async fn test_capacity_error_code() {
        let harness = Harness::new().with_config(|c| c.coordinator.max_children_per_parent = 1);
        let session = harness.session();
        let root = session.coordinator().register_root("root goal");
        root.apply(PhaseEvent::Start).unwrap();

        let spawn = ToolCall::new(root.id().clone(), names::SPAWN_PARALLEL).with_arg(
            "agents",
            serde_json::json!([
                {"kind": "explore", "goal": "a"},
                {"kind": "explore", "goal": "b"}
            ]),
        );
        let result = session.executor().execute(&root, spawn).await;
        assert_eq!(result.error_code(), Some("CAPACITY_EXCEEDED"));
        assert!(session.coordinator().list(root.id()).is_empty());
    }

    #[tokio::test]
    async fn test_foreign_agents_are_not_found() {
        let harness = Harness::new();
        let session = harness.session();
        let owner = session.coordinator().register_root("owner goal");
        let stranger = session.coordinator().register_root("stranger goal");
        owner.apply(PhaseEvent::Start).unwrap();
        stranger.apply(PhaseEvent::Start).unwrap();

        let spawn = ToolCall::new(owner.id().clone(), names::SPAWN_AGENT)
            .with_arg("kind", "explore")
            .with_arg("goal", "look around");
        let result = session.executor().execute(&owner, spawn).await;
        let child = result.data.as_ref().unwrap()["agent_id"]
            .as_str()
            .unwrap()
            .to_string();

        for name in [names::CANCEL_AGENT, names::AGENT_STATUS, names::WAIT_AGENT] {
            let mut call =
                ToolCall::new(stranger.id().clone(), name).with_arg("agent_id", child.clone());
            if name == names::WAIT_AGENT {
                call = call.with_arg("timeout_secs", 1);
            }
            let result = session.executor().execute(&stranger, call).await;
            assert_eq!(result.error_code(), Some("NOT_FOUND"), "{}", name);
        }

        let wait = ToolCall::new(owner.id().clone(), names::WAIT_AGENT)
            .with_arg("agent_id", child)
            .with_arg("timeout_secs", 5);
        let result = session.executor().execute(&owner, wait).await;
        assert_eq!(result.data.unwrap()["status"]["status"], "completed");
    }
}
