//! Shell process runner shared by run_command, run_tests, ci_status and
//! the lifecycle hooks.
//!
//! Output lines are forwarded to the call's chunk sink as they arrive and
//! collected up to a byte limit. Bytes that are not UTF-8 are replaced,
//! never dropped. The child is killed when the call is cancelled or times
//! out.

use gatehouse_application::{ChunkSender, ToolContext};
use gatehouse_domain::ToolError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

pub(crate) struct ProcessOutcome {
    pub exit_code: i32,
    pub output: String,
    pub truncated: bool,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Collected output with a trailing marker when it was cut off.
    pub fn into_content(self) -> String {
        let mut content = self.output;
        if self.truncated {
            content.push_str("\n... (output truncated)");
        }
        content
    }
}

pub(crate) struct ProcessSpec<'a> {
    pub command: &'a str,
    pub working_dir: &'a Path,
    pub timeout: Duration,
    pub max_output_bytes: usize,
    /// Forward lines to the chunk sink
    pub stream: bool,
    /// Added to the inherited environment
    pub env: &'a [(String, String)],
}

fn shell(command: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", command]);
        c
    } else {
        let mut c = Command::new("sh");
        c.args(["-c", command]);
        c
    }
}

/// Line reader that decodes lossily.
///
/// Partial lines stay in `buf` when a read is abandoned inside `select!`, so
/// the next call picks up where the last one stopped.
struct LossyLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LossyLines<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator, or `None` at end of stream.
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Ok(Some(line))
    }
}

struct Collector<'a> {
    output: String,
    limit: usize,
    truncated: bool,
    chunks: Option<&'a ChunkSender>,
}

impl Collector<'_> {
    fn push(&mut self, line: String, stderr: bool) {
        if self.truncated {
            return;
        }
        let line = if stderr { format!("[stderr] {}\n", line) } else { format!("{}\n", line) };
        if self.output.len() + line.len() > self.limit {
            self.truncated = true;
            return;
        }
        if let Some(chunks) = self.chunks {
            chunks.send(line.clone());
        }
        self.output.push_str(&line);
    }
}

pub(crate) async fn run_shell(
    spec: ProcessSpec<'_>,
    ctx: &ToolContext,
) -> Result<ProcessOutcome, ToolError> {
    if !spec.working_dir.is_dir() {
        return Err(ToolError::not_found(format!(
            "Working directory does not exist: {}",
            spec.working_dir.display()
        )));
    }

    let mut child = shell(spec.command)
        .current_dir(spec.working_dir)
        .envs(spec.env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ToolError::execution_failed(format!("Failed to spawn command: {}", e)))?;
    debug!(command = spec.command, pid = ?child.id(), "Process started");

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ToolError::execution_failed("stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ToolError::execution_failed("stderr was not captured"))?;
    let mut out_lines = LossyLines::new(stdout);
    let mut err_lines = LossyLines::new(stderr);

    let mut collector = Collector {
        output: String::new(),
        limit: spec.max_output_bytes,
        truncated: false,
        chunks: spec.stream.then_some(&ctx.chunks),
    };

    let deadline = tokio::time::sleep(spec.timeout);
    tokio::pin!(deadline);

    let (mut out_open, mut err_open) = (true, true);
    let status = loop {
        tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => {
                let _ = child.kill().await;
                debug!(command = spec.command, "Process killed on cancellation");
                return Err(ToolError::cancelled());
            }
            _ = &mut deadline => {
                let _ = child.kill().await;
                warn!(command = spec.command, timeout_secs = spec.timeout.as_secs(), "Process timed out");
                return Err(ToolError::timeout(format!(
                    "'{}' after {} seconds",
                    spec.command,
                    spec.timeout.as_secs()
                )));
            }
            line = out_lines.next_line(), if out_open => match line {
                Ok(Some(line)) => collector.push(line, false),
                Ok(None) => out_open = false,
                Err(e) => {
                    let _ = child.kill().await;
                    return Err(ToolError::execution_failed(format!("Failed to read stdout: {}", e)));
                }
            },
            line = err_lines.next_line(), if err_open => match line {
                Ok(Some(line)) => collector.push(line, true),
                Ok(None) => err_open = false,
                Err(e) => {
                    let _ = child.kill().await;
                    return Err(ToolError::execution_failed(format!("Failed to read stderr: {}", e)));
                }
            },
            status = child.wait(), if !out_open && !err_open => {
                break status.map_err(|e| {
                    ToolError::execution_failed(format!("Failed to wait for process: {}", e))
                })?;
            }
        }
    };

    Ok(ProcessOutcome {
        exit_code: status.code().unwrap_or(-1),
        output: collector.output,
        truncated: collector.truncated,
    })
}
