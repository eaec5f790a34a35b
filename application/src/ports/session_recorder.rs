//! Port for the session audit log.
//!
//! Receives one [`SessionRecord`] per phase transition, tool call, streamed
//! chunk, tool result and gate resolution. This is separate from `tracing`
//! diagnostics: tracing is for humans, the session log is for replay.

use gatehouse_domain::SessionRecord;

/// Implementations write each record as a single unit (e.g. one JSONL line)
/// so records from concurrent agents never interleave. `record` is
/// synchronous and non-fallible; write failures are the adapter's problem.
pub trait SessionRecorder: Send + Sync {
    fn record(&self, record: &SessionRecord);
}

/// No-op implementation for tests and when the audit log is disabled.
pub struct NoSessionRecorder;

impl SessionRecorder for NoSessionRecorder {
    fn record(&self, _record: &SessionRecord) {}
}
