//! Tool body port
//!
//! A tool body is the effector behind a registered tool name. The executor
//! owns everything around it (resolution, phase check, approval, fault
//! isolation, logging); the body only does the work.

use async_trait::async_trait;
use gatehouse_domain::{AgentId, ToolError, ToolInvocation, ToolOutput};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Sink for incremental output. Closing it is the body's "done" signal.
#[derive(Debug, Clone)]
pub struct ChunkSender(mpsc::UnboundedSender<String>);

impl ChunkSender {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self(tx)
    }

    /// Forward one chunk. A gone receiver is ignored.
    pub fn send(&self, chunk: impl Into<String>) {
        let _ = self.0.send(chunk.into());
    }
}

/// What a body gets besides its arguments.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Agent that issued the call
    pub agent_id: AgentId,
    /// Cancelled when the agent (or any ancestor) is cancelled
    pub cancellation: CancellationToken,
    pub chunks: ChunkSender,
}

/// Port for tool bodies.
#[async_trait]
pub trait ToolBody: Send + Sync {
    /// Run the invocation.
    ///
    /// Long-running bodies should watch `ctx.cancellation` and return
    /// `ToolError::cancelled()` when it fires, unless they are in the middle
    /// of an atomic write, which they finish first.
    async fn invoke(
        &self,
        invocation: ToolInvocation,
        ctx: ToolContext,
    ) -> Result<ToolOutput, ToolError>;

    /// Render what the invocation would change, for an approval prompt.
    /// Must not touch anything.
    async fn preview(&self, _invocation: &ToolInvocation) -> Option<String> {
        None
    }
}

/// Canonical tool name → body.
#[derive(Clone, Default)]
pub struct ToolBodies {
    bodies: HashMap<String, Arc<dyn ToolBody>>,
}

impl ToolBodies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, body: Arc<dyn ToolBody>) {
        self.bodies.insert(name.into(), body);
    }

    /// Register one body under several names.
    pub fn register_all(&mut self, names: &[&str], body: Arc<dyn ToolBody>) {
        for name in names {
            self.bodies.insert((*name).to_string(), body.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolBody>> {
        self.bodies.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bodies.keys().map(|s| s.as_str())
    }
}

impl std::fmt::Debug for ToolBodies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ToolBodies").field("names", &names).finish()
    }
}
