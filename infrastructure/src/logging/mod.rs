//! Logging infrastructure: the JSONL session log.
//!
//! Provides [`JsonlSessionRecorder`], a JSONL file writer that implements
//! the [`SessionRecorder`](gatehouse_application::SessionRecorder) port, and
//! [`read_session_log`] to load a log back for replay.

mod session_log;

pub use session_log::{JsonlSessionRecorder, SessionLogError, read_session_log};
