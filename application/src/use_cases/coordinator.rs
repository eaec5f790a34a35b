//! Agent coordinator.
//!
//! Registry of every agent in a session. Children are spawned under a
//! parent, run on their own tokio task with the same phase loop, and are
//! observed through `wait`, `wait_all` and `status`.
//!
//! Cancellation is transitive: a child's token is a child of its parent's
//! token, so cancelling any agent cancels its whole subtree.
//!
//! Every call names its caller. Only the parent may wait on, reap or inspect
//! a child, and only an ancestor may cancel it. Anyone else is told the
//! agent does not exist.
//!
//! The registry lock is a plain `std::sync::Mutex` and is never held across
//! an `.await`; waiting goes through each agent's status watch channel.

use crate::config::CoordinatorConfig;
use crate::ports::agent_progress::AgentProgressNotifier;
use crate::ports::session_recorder::SessionRecorder;
use crate::use_cases::agent_handle::AgentHandle;
use crate::use_cases::run_agent::AgentRunner;
use futures::future::join_all;
use gatehouse_domain::{
    AgentId, AgentKind, AgentPhase, AgentSnapshot, AgentState, AgentStatus, SessionRecord, Task,
    ToolError,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Parent agent not found: {0}")]
    ParentNotFound(AgentId),

    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error(
        "Parent {parent} has {live} live children; {requested} more would exceed the limit of {limit}"
    )]
    CapacityExceeded {
        parent: AgentId,
        limit: usize,
        live: usize,
        requested: usize,
    },

    #[error("Timed out after {timeout:?} waiting for {agent_id}")]
    Timeout {
        agent_id: AgentId,
        timeout: Duration,
    },
}

impl CoordinatorError {
    pub fn code(&self) -> &'static str {
        match self {
            CoordinatorError::ParentNotFound(_) => "PARENT_NOT_FOUND",
            CoordinatorError::AgentNotFound(_) => "NOT_FOUND",
            CoordinatorError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            CoordinatorError::Timeout { .. } => "TIMEOUT",
        }
    }
}

impl From<CoordinatorError> for ToolError {
    fn from(e: CoordinatorError) -> Self {
        ToolError::new(e.code(), e.to_string())
    }
}

/// Per-agent result of [`AgentCoordinator::wait_all`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WaitOutcome {
    Terminal { status: AgentStatus },
    /// Still running when the shared deadline passed
    Pending { phase: AgentPhase },
    NotFound,
}

struct AgentEntry {
    handle: AgentHandle,
    parent: Option<AgentId>,
    /// Spawn chain from the root down to the parent
    ancestors: Vec<AgentId>,
    join: Option<JoinHandle<AgentStatus>>,
}

pub struct AgentCoordinator {
    runner: Arc<AgentRunner>,
    limits: CoordinatorConfig,
    recorder: Arc<dyn SessionRecorder>,
    progress: Arc<dyn AgentProgressNotifier>,
    agents: Mutex<HashMap<AgentId, AgentEntry>>,
    /// Parent of every root token; cancelled on shutdown
    session_token: CancellationToken,
}

impl AgentCoordinator {
    pub fn new(
        runner: Arc<AgentRunner>,
        limits: CoordinatorConfig,
        recorder: Arc<dyn SessionRecorder>,
        progress: Arc<dyn AgentProgressNotifier>,
    ) -> Self {
        Self {
            runner,
            limits,
            recorder,
            progress,
            agents: Mutex::new(HashMap::new()),
            session_token: CancellationToken::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<AgentId, AgentEntry>> {
        self.agents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn limits(&self) -> &CoordinatorConfig {
        &self.limits
    }

    pub fn runner(&self) -> &Arc<AgentRunner> {
        &self.runner
    }

    /// Register a root agent. The caller drives it with [`Self::run_root`]
    /// or its own runner call.
    pub fn register_root(&self, goal: impl Into<String>) -> AgentHandle {
        let goal = goal.into();
        let state = AgentState::new(AgentId::generate("root"), AgentKind::Root, Task::new(&goal));
        let handle = AgentHandle::new(state, self.session_token.child_token());
        self.recorder.record(&SessionRecord::AgentSpawned {
            agent_id: handle.id().clone(),
            parent: None,
            kind: AgentKind::Root,
            goal,
        });
        self.lock().insert(
            handle.id().clone(),
            AgentEntry {
                handle: handle.clone(),
                parent: None,
                ancestors: Vec::new(),
                join: None,
            },
        );
        handle
    }

    /// Register a root agent and run it to completion on the current task.
    pub async fn run_root(&self, goal: impl Into<String>) -> (AgentHandle, AgentStatus) {
        let handle = self.register_root(goal);
        let status = self.runner.run(handle.clone()).await;
        (handle, status)
    }

    /// Spawn one child under `parent`.
    pub fn spawn(
        &self,
        parent: &AgentId,
        kind: AgentKind,
        goal: impl Into<String>,
    ) -> Result<AgentId, CoordinatorError> {
        let mut agents = self.lock();
        let parent_handle = self.admit(&agents, parent, 1)?;
        Ok(self.insert_child(&mut agents, &parent_handle, kind, goal.into()))
    }

    /// Spawn several children under `parent`, all or none.
    pub fn spawn_parallel(
        &self,
        parent: &AgentId,
        requests: Vec<(AgentKind, String)>,
    ) -> Result<Vec<AgentId>, CoordinatorError> {
        let mut agents = self.lock();
        let parent_handle = self.admit(&agents, parent, requests.len())?;
        Ok(requests
            .into_iter()
            .map(|(kind, goal)| self.insert_child(&mut agents, &parent_handle, kind, goal))
            .collect())
    }

    fn admit(
        &self,
        agents: &HashMap<AgentId, AgentEntry>,
        parent: &AgentId,
        requested: usize,
    ) -> Result<AgentHandle, CoordinatorError> {
        // A finished or cancelled parent cannot take children; they would
        // start with a cancelled token.
        let parent_handle = agents
            .get(parent)
            .map(|e| e.handle.clone())
            .filter(|h| !h.phase().is_terminal() && !h.is_cancelled())
            .ok_or_else(|| CoordinatorError::ParentNotFound(parent.clone()))?;
        let live = agents
            .values()
            .filter(|e| e.parent.as_ref() == Some(parent) && !e.handle.phase().is_terminal())
            .count();
        let limit = self.limits.max_children_per_parent;
        if live + requested > limit {
            return Err(CoordinatorError::CapacityExceeded {
                parent: parent.clone(),
                limit,
                live,
                requested,
            });
        }
        Ok(parent_handle)
    }

    fn insert_child(
        &self,
        agents: &mut HashMap<AgentId, AgentEntry>,
        parent: &AgentHandle,
        kind: AgentKind,
        goal: String,
    ) -> AgentId {
        let id = AgentId::generate(kind.as_str());
        let state = AgentState::new(id.clone(), kind, Task::new(&goal)).with_parent(parent.id().clone());
        let handle = AgentHandle::new(state, parent.cancellation().child_token());
        let mut ancestors = agents
            .get(parent.id())
            .map(|e| e.ancestors.clone())
            .unwrap_or_default();
        ancestors.push(parent.id().clone());

        self.recorder.record(&SessionRecord::AgentSpawned {
            agent_id: id.clone(),
            parent: Some(parent.id().clone()),
            kind,
            goal,
        });
        self.progress.on_agent_spawned(&id, parent.id(), kind);
        info!(agent_id = %id, parent = %parent.id(), kind = kind.as_str(), "Spawned child agent");

        let runner = Arc::clone(&self.runner);
        let join = tokio::spawn({
            let handle = handle.clone();
            async move { runner.run(handle).await }
        });
        agents.insert(
            id.clone(),
            AgentEntry {
                handle,
                parent: Some(parent.id().clone()),
                ancestors,
                join: Some(join),
            },
        );
        id
    }

    fn handle(&self, id: &AgentId) -> Result<AgentHandle, CoordinatorError> {
        self.lock()
            .get(id)
            .map(|e| e.handle.clone())
            .ok_or_else(|| CoordinatorError::AgentNotFound(id.clone()))
    }

    /// Handle of `id` if `caller` is its parent.
    fn child_handle(&self, caller: &AgentId, id: &AgentId) -> Result<AgentHandle, CoordinatorError> {
        self.lock()
            .get(id)
            .filter(|e| e.parent.as_ref() == Some(caller))
            .map(|e| e.handle.clone())
            .ok_or_else(|| CoordinatorError::AgentNotFound(id.clone()))
    }

    /// Handle of `id` if `caller` is one of its ancestors.
    fn descendant_handle(
        &self,
        caller: &AgentId,
        id: &AgentId,
    ) -> Result<AgentHandle, CoordinatorError> {
        self.lock()
            .get(id)
            .filter(|e| e.ancestors.contains(caller))
            .map(|e| e.handle.clone())
            .ok_or_else(|| CoordinatorError::AgentNotFound(id.clone()))
    }

    /// Forget a terminal agent once its status has been observed.
    fn reap(&self, id: &AgentId) {
        let removed = {
            let mut agents = self.lock();
            if agents
                .get(id)
                .is_some_and(|e| e.handle.status().is_some())
            {
                agents.remove(id)
            } else {
                None
            }
        };
        if removed.is_some() {
            self.runner.approvals().release(id);
            debug!(agent_id = %id, "Reaped agent");
        }
    }

    /// Wait for one of `caller`'s children to become terminal.
    ///
    /// A timeout is local to this call; the agent keeps running.
    pub async fn wait(
        &self,
        caller: &AgentId,
        id: &AgentId,
        timeout: Duration,
    ) -> Result<AgentStatus, CoordinatorError> {
        let handle = self.child_handle(caller, id)?;
        match tokio::time::timeout(timeout, handle.finished()).await {
            Ok(status) => {
                self.reap(id);
                Ok(status)
            }
            Err(_) => Err(CoordinatorError::Timeout {
                agent_id: id.clone(),
                timeout,
            }),
        }
    }

    /// Wait for several of `caller`'s children under one shared deadline.
    ///
    /// Never fails as a whole: each id gets its own outcome, in input order.
    pub async fn wait_all(
        &self,
        caller: &AgentId,
        ids: &[AgentId],
        timeout: Duration,
    ) -> Vec<(AgentId, WaitOutcome)> {
        let deadline = tokio::time::Instant::now() + timeout;
        let waits = ids.iter().map(|id| async move {
            let outcome = match self.child_handle(caller, id) {
                Err(_) => WaitOutcome::NotFound,
                Ok(handle) => match tokio::time::timeout_at(deadline, handle.finished()).await {
                    Ok(status) => WaitOutcome::Terminal { status },
                    Err(_) => WaitOutcome::Pending {
                        phase: handle.phase(),
                    },
                },
            };
            (id.clone(), outcome)
        });
        let outcomes = join_all(waits).await;
        for (id, outcome) in &outcomes {
            if matches!(outcome, WaitOutcome::Terminal { .. }) {
                self.reap(id);
            }
        }
        outcomes
    }

    /// Non-blocking snapshot of one of `caller`'s children.
    pub fn status(&self, caller: &AgentId, id: &AgentId) -> Result<AgentSnapshot, CoordinatorError> {
        Ok(self.child_handle(caller, id)?.snapshot())
    }

    /// Cancel a descendant of `caller` and its own descendants. Idempotent.
    pub fn cancel(&self, caller: &AgentId, id: &AgentId) -> Result<(), CoordinatorError> {
        let handle = self.descendant_handle(caller, id)?;
        info!(agent_id = %id, caller = %caller, "Cancelling agent");
        handle.cancel();
        Ok(())
    }

    /// Snapshots of the registered children of `parent`, ordered by id.
    pub fn list(&self, parent: &AgentId) -> Vec<AgentSnapshot> {
        let mut children: Vec<AgentSnapshot> = self
            .lock()
            .values()
            .filter(|e| e.parent.as_ref() == Some(parent))
            .map(|e| e.handle.snapshot())
            .collect();
        children.sort_by(|a, b| a.id.cmp(&b.id));
        children
    }

    /// Cancel every agent and wait for spawned tasks to finish.
    pub async fn shutdown(&self) {
        self.session_token.cancel();
        let joins: Vec<JoinHandle<AgentStatus>> = self
            .lock()
            .values_mut()
            .filter_map(|e| e.join.take())
            .collect();
        debug!(tasks = joins.len(), "Waiting for agent tasks");
        join_all(joins).await;
    }
}

impl std::fmt::Debug for AgentCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentCoordinator")
            .field("agents", &self.lock().len())
            .field("limits", &self.limits)
            .finish()
    }
}
