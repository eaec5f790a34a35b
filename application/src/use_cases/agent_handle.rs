//! Shared handle to a running agent.
//!
//! The runner is the only writer of an agent's state; the coordinator and
//! the tool executor read snapshots and append log entries through the same
//! handle. The lock is never held across an `.await`.

use gatehouse_domain::{
    AgentId, AgentPhase, AgentSnapshot, AgentState, AgentStatus, FailureReason, IllegalTransition,
    LogEntry, PhaseEvent, ToolCall, ToolResult,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AgentHandle {
    id: AgentId,
    state: Arc<Mutex<AgentState>>,
    cancellation: CancellationToken,
    status_tx: Arc<watch::Sender<Option<AgentStatus>>>,
}

impl AgentHandle {
    pub fn new(state: AgentState, cancellation: CancellationToken) -> Self {
        let (status_tx, _) = watch::channel(None);
        Self {
            id: state.id.clone(),
            state: Arc::new(Mutex::new(state)),
            cancellation,
            status_tx: Arc::new(status_tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AgentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn phase(&self) -> AgentPhase {
        self.lock().phase()
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        self.lock().snapshot()
    }

    /// Run `f` against the state under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&AgentState) -> R) -> R {
        f(&self.lock())
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut AgentState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancels this agent and, through child tokens, all its descendants.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub(crate) fn apply(&self, event: PhaseEvent) -> Result<LogEntry, IllegalTransition> {
        self.lock().apply(event)
    }

    pub(crate) fn fail(&self, reason: FailureReason) -> Option<LogEntry> {
        self.lock().fail(reason)
    }

    /// Append a (call, result) pair as one entry.
    pub(crate) fn record_tool(&self, call: ToolCall, result: ToolResult) {
        self.lock().record_tool(call, result);
    }

    /// Terminal status, once published.
    pub fn status(&self) -> Option<AgentStatus> {
        self.status_tx.borrow().clone()
    }

    /// Publish the terminal status to every waiter.
    pub(crate) fn publish(&self, status: AgentStatus) {
        self.status_tx.send_replace(Some(status));
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AgentStatus>> {
        self.status_tx.subscribe()
    }

    /// Resolve once a terminal status is published.
    pub async fn finished(&self) -> AgentStatus {
        let mut rx = self.subscribe();
        let result = rx.wait_for(|s| s.is_some()).await.map(|s| s.clone());
        match result {
            Ok(Some(status)) => status,
            // The sender lives as long as any handle, including this one.
            _ => AgentStatus::Failed {
                reason: FailureReason::StepFailed("agent vanished".into()),
            },
        }
    }
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("id", &self.id)
            .field("phase", &self.phase())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_domain::{AgentKind, Task};
    use std::time::Duration;

    fn handle() -> AgentHandle {
        AgentHandle::new(
            AgentState::new(AgentId::new("a"), AgentKind::Explore, Task::new("look")),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_finished_resolves_after_publish() {
        let handle = handle();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.finished().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.publish(AgentStatus::Completed);
        assert_eq!(waiter.await.unwrap(), AgentStatus::Completed);
        assert_eq!(handle.status(), Some(AgentStatus::Completed));
    }

    #[test]
    fn test_apply_through_handle() {
        let handle = handle();
        handle.apply(PhaseEvent::Start).unwrap();
        assert_eq!(handle.phase(), AgentPhase::Planning);
        assert!(handle.apply(PhaseEvent::CiPassed).is_err());
        assert_eq!(handle.read(|s| s.log().len()), 1);
    }

    #[test]
    fn test_cancel_propagates_to_child_tokens() {
        let parent = handle();
        let child = AgentHandle::new(
            AgentState::new(AgentId::new("b"), AgentKind::Plan, Task::new("x")),
            parent.cancellation().child_token(),
        );
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
