//! Patch engine: apply_patch, revert_patch
//!
//! [`PatchEngine`] is the only writer of working-copy files. It wraps the
//! pure [`compute_patch`] with:
//!
//! - a per-path exclusive section around read, check and write, so edits to
//!   the same file from sibling agents are serialized and each one sees the
//!   content left by the previous one
//! - an in-memory backup of the pre-edit bytes, numbered by an engine-wide
//!   revision counter, kept for the session lifetime
//! - an atomic write (temp file in the same directory, then rename), so a
//!   file is either fully replaced or left byte-identical
//!
//! Cancellation is honored only while waiting for the path lock. Once the
//! section is entered the write runs to completion.

use super::ToolSettings;
use async_trait::async_trait;
use gatehouse_application::{ToolBody, ToolContext};
use gatehouse_domain::patch::{decode_text, preview};
use gatehouse_domain::{
    ParamType, PatchError, PatchRequest, SideEffects, ToolCategory, ToolDefinition, ToolError,
    ToolInvocation, ToolOutput, ToolParameter, compute_patch, names,
};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Canonical names served by [`PatchTools`].
pub const PATCH_TOOLS: [&str; 2] = [names::APPLY_PATCH, names::REVERT_PATCH];

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            names::APPLY_PATCH,
            "Replace an exact text pattern in a file. Fails unless the pattern occurs exactly expected_occurrences times.",
            ToolCategory::Execution,
        )
        .mutating()
        .with_parameter(ToolParameter::new("path", "File to edit", true))
        .with_parameter(ToolParameter::new("find", "Exact text to find", true))
        .with_parameter(ToolParameter::new("replace", "Replacement text", true))
        .with_parameter(
            ToolParameter::new(
                "expected_occurrences",
                "How many times the pattern must occur (default: 1)",
                false,
            )
            .with_type(ParamType::Integer),
        ),
        ToolDefinition::new(
            names::REVERT_PATCH,
            "Restore a file to the content it had before its most recent edit in this session",
            ToolCategory::Execution,
        )
        .mutating()
        .with_parameter(ToolParameter::new("path", "File to restore", true)),
    ]
}

#[derive(Debug, Error)]
pub enum EditError {
    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("Cancelled while waiting for {0}")]
    Cancelled(String),
}

impl From<EditError> for ToolError {
    fn from(e: EditError) -> Self {
        match e {
            EditError::Patch(patch) => patch.into(),
            EditError::Cancelled(_) => ToolError::cancelled(),
        }
    }
}

/// What an applied patch did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchOutcome {
    pub path: PathBuf,
    /// Backup revision holding the pre-edit content
    pub revision: u64,
    pub start_line: usize,
    pub end_line: usize,
    pub lines_removed: usize,
    pub lines_added: usize,
    pub line_delta: i64,
}

#[derive(Debug, Clone)]
struct Backup {
    revision: u64,
    /// `None` when the file did not exist before the edit
    content: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct PatchEngine {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
    backups: Mutex<HashMap<PathBuf, Vec<Backup>>>,
    revision: AtomicU64,
}

impl PatchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a find/replace to `path`.
    ///
    /// The pattern is checked against the content read inside the path's
    /// exclusive section, never against anything read earlier.
    pub async fn apply(
        &self,
        path: &Path,
        request: &PatchRequest,
        cancel: &CancellationToken,
    ) -> Result<PatchOutcome, EditError> {
        let _guard = self.enter(path, cancel).await?;

        let original = read_existing(path).await?;
        let text = decode_text(&original)?;
        let computation = compute_patch(text, request)?;

        let revision = self.push_backup(path, Some(original.clone()));
        if let Err(e) = write_atomic(path, computation.new_content.into_bytes()).await {
            self.drop_backup(path, revision);
            return Err(e.into());
        }

        info!(
            path = %path.display(),
            revision,
            start_line = computation.start_line,
            line_delta = computation.line_delta,
            "Patch applied"
        );
        Ok(PatchOutcome {
            path: path.to_path_buf(),
            revision,
            start_line: computation.start_line,
            end_line: computation.end_line,
            lines_removed: computation.lines_removed,
            lines_added: computation.lines_added,
            line_delta: computation.line_delta,
        })
    }

    /// Render what [`apply`](Self::apply) would do, without writing.
    pub async fn preview(&self, path: &Path, request: &PatchRequest) -> Result<String, PatchError> {
        let original = read_existing(path).await?;
        let text = decode_text(&original)?;
        preview(&path.display().to_string(), text, request)
    }

    /// Replace the whole content of `path`, creating it if needed.
    pub async fn write(
        &self,
        path: &Path,
        content: &[u8],
        cancel: &CancellationToken,
    ) -> Result<u64, EditError> {
        let _guard = self.enter(path, cancel).await?;

        let previous = match tokio::fs::read(path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(PatchError::Io(e.to_string()).into()),
        };
        let revision = self.push_backup(path, previous);
        if let Err(e) = write_atomic(path, content.to_vec()).await {
            self.drop_backup(path, revision);
            return Err(e.into());
        }
        debug!(path = %path.display(), revision, bytes = content.len(), "File written");
        Ok(revision)
    }

    /// Delete `path`, keeping its content as a backup.
    pub async fn delete(&self, path: &Path, cancel: &CancellationToken) -> Result<u64, EditError> {
        let _guard = self.enter(path, cancel).await?;

        let original = read_existing(path).await?;
        let revision = self.push_backup(path, Some(original));
        if let Err(e) = tokio::fs::remove_file(path).await {
            self.drop_backup(path, revision);
            return Err(PatchError::Io(e.to_string()).into());
        }
        debug!(path = %path.display(), revision, "File deleted");
        Ok(revision)
    }

    /// Restore the most recent backup of `path` and return its revision.
    ///
    /// A backup taken when the file did not exist restores by deleting it.
    pub async fn revert(&self, path: &Path, cancel: &CancellationToken) -> Result<u64, EditError> {
        let _guard = self.enter(path, cancel).await?;

        let backup = self
            .backups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(path)
            .and_then(|revisions| revisions.pop())
            .ok_or_else(|| PatchError::NotFound(format!("no backup for {}", path.display())))?;

        let restored = match &backup.content {
            Some(bytes) => write_atomic(path, bytes.clone()).await,
            None => match tokio::fs::remove_file(path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(PatchError::Io(e.to_string())),
            },
        };
        if let Err(e) = restored {
            // Keep the backup so the revert can be retried.
            self.backups
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(path.to_path_buf())
                .or_default()
                .push(backup);
            return Err(e.into());
        }

        info!(path = %path.display(), revision = backup.revision, "Edit reverted");
        Ok(backup.revision)
    }

    /// Backup revisions held for `path`, oldest first.
    pub fn revisions(&self, path: &Path) -> Vec<u64> {
        self.backups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .map(|b| b.iter().map(|b| b.revision).collect())
            .unwrap_or_default()
    }

    async fn enter(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathLock<'_>, EditError> {
        let lock = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_path_buf())
            .or_default()
            .clone();

        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            guard = lock.lock_owned() => Some(guard),
        };
        let entered = PathLock {
            engine: self,
            path: path.to_path_buf(),
            guard,
        };
        if entered.guard.is_none() {
            return Err(EditError::Cancelled(path.display().to_string()));
        }
        Ok(entered)
    }

    fn push_backup(&self, path: &Path, content: Option<Vec<u8>>) -> u64 {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        self.backups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_path_buf())
            .or_default()
            .push(Backup { revision, content });
        revision
    }

    fn drop_backup(&self, path: &Path, revision: u64) {
        if let Some(revisions) = self
            .backups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(path)
        {
            revisions.retain(|b| b.revision != revision);
        }
    }
}

async fn read_existing(path: &Path) -> Result<Vec<u8>, PatchError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PatchError::NotFound(path.display().to_string()))
        }
        Err(e) => Err(PatchError::Io(format!("{}: {}", path.display(), e))),
    }
}

/// Write through a temp file in the target directory and rename it over
/// the target. Existing permissions are carried over.
async fn write_atomic(path: &Path, content: Vec<u8>) -> Result<(), PatchError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &content))
        .await
        .map_err(|e| PatchError::Io(format!("write task failed: {}", e)))?
}

fn write_atomic_blocking(path: &Path, content: &[u8]) -> Result<(), PatchError> {
    let io = |e: std::io::Error| PatchError::Io(format!("{}: {}", path.display(), e));
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(PatchError::NotFound(format!(
            "parent directory does not exist: {}",
            parent.display()
        )));
    }

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io)?;
    temp.write_all(content).map_err(io)?;
    temp.as_file().sync_all().map_err(io)?;
    if let Ok(metadata) = std::fs::metadata(path) {
        temp.as_file()
            .set_permissions(metadata.permissions())
            .map_err(io)?;
    }
    temp.persist(path).map_err(|e| io(e.error))?;
    Ok(())
}

/// Holds a path's edit lock; the map entry goes away with the last holder.
struct PathLock<'a> {
    engine: &'a PatchEngine,
    path: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self
            .engine
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.path)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.path);
        }
    }
}

/// Tool body for `apply_patch` and `revert_patch`.
pub struct PatchTools {
    settings: Arc<ToolSettings>,
    engine: Arc<PatchEngine>,
}

impl PatchTools {
    pub fn new(settings: Arc<ToolSettings>, engine: Arc<PatchEngine>) -> Self {
        Self { settings, engine }
    }
}

#[async_trait]
impl ToolBody for PatchTools {
    async fn invoke(
        &self,
        invocation: ToolInvocation,
        ctx: ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        match invocation {
            ToolInvocation::ApplyPatch(args) => {
                let path = self.settings.resolve(&args.path);
                let request =
                    PatchRequest::new(args.find, args.replace).expecting(args.expected_occurrences);
                let outcome = self.engine.apply(&path, &request, &ctx.cancellation).await?;

                let content = format!(
                    "Patched {}: lines {}-{}, -{} +{} (delta {:+}), backup revision {}",
                    args.path,
                    outcome.start_line,
                    outcome.end_line,
                    outcome.lines_removed,
                    outcome.lines_added,
                    outcome.line_delta,
                    outcome.revision
                );
                let data = serde_json::to_value(&outcome)
                    .map_err(|e| ToolError::execution_failed(e.to_string()))?;
                Ok(ToolOutput::text(content)
                    .with_side_effects(SideEffects::file(args.path))
                    .with_data(data))
            }
            ToolInvocation::RevertPatch(args) => {
                let path = self.settings.resolve(&args.path);
                let revision = self.engine.revert(&path, &ctx.cancellation).await?;
                Ok(ToolOutput::text(format!(
                    "Restored {} from backup revision {}",
                    args.path, revision
                ))
                .with_side_effects(SideEffects::file(args.path))
                .with_data(serde_json::json!({ "revision": revision })))
            }
            other => Err(ToolError::execution_failed(format!(
                "patch tools cannot serve '{}'",
                other.name()
            ))),
        }
    }

    async fn preview(&self, invocation: &ToolInvocation) -> Option<String> {
        match invocation {
            ToolInvocation::ApplyPatch(args) => {
                let path = self.settings.resolve(&args.path);
                let request = PatchRequest::new(args.find.clone(), args.replace.clone())
                    .expecting(args.expected_occurrences);
                Some(match self.engine.preview(&path, &request).await {
                    Ok(text) => text,
                    Err(e) => format!("(patch would fail: {})", e),
                })
            }
            ToolInvocation::RevertPatch(args) => {
                let path = self.settings.resolve(&args.path);
                Some(match self.engine.revisions(&path).last() {
                    Some(revision) => format!("restore {} to backup revision {}", args.path, revision),
                    None => format!("(no backup held for {})", args.path),
                })
            }
            _ => None,
        }
    }
}
