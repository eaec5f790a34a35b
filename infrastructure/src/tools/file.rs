//! File operation tools: read_file, list_directory, write_file, delete_file
//!
//! Reads go straight to disk. Writes and deletes go through the
//! [`PatchEngine`] so they share its per-path locking and backups.

use super::patch::{EditError, PatchEngine};
use super::{ToolSettings, io_error};
use async_trait::async_trait;
use gatehouse_application::{ToolBody, ToolContext};
use gatehouse_domain::patch::is_binary;
use gatehouse_domain::{
    PatchError, SideEffects, ToolCategory, ToolDefinition, ToolError, ToolInvocation, ToolOutput,
    ToolParameter, names,
};
use std::sync::Arc;

/// Canonical names served by [`FileTools`].
pub const FILE_TOOLS: [&str; 4] = [
    names::READ_FILE,
    names::LIST_DIRECTORY,
    names::WRITE_FILE,
    names::DELETE_FILE,
];

/// Maximum file size to read (10 MB)
const MAX_READ_SIZE: u64 = 10 * 1024 * 1024;

/// Lines of new content shown in a write_file preview
const PREVIEW_LINES: usize = 20;

pub fn read_file_definition() -> ToolDefinition {
    ToolDefinition::new(
        names::READ_FILE,
        "Read the contents of a file at the specified path",
        ToolCategory::ReadOnly,
    )
    .with_parameter(ToolParameter::new("path", "Path to the file to read", true))
}

pub fn list_directory_definition() -> ToolDefinition {
    ToolDefinition::new(
        names::LIST_DIRECTORY,
        "List the entries of a directory (default: working directory)",
        ToolCategory::ReadOnly,
    )
    .with_parameter(ToolParameter::new("path", "Directory to list", false))
}

pub fn write_file_definition() -> ToolDefinition {
    ToolDefinition::new(
        names::WRITE_FILE,
        "Write content to a file at the specified path. Creates the file if it doesn't exist, or overwrites if it does.",
        ToolCategory::Execution,
    )
    .mutating()
    .with_parameter(ToolParameter::new("path", "Path to the file to write", true))
    .with_parameter(ToolParameter::new("content", "Content to write to the file", true))
}

pub fn delete_file_definition() -> ToolDefinition {
    ToolDefinition::new(
        names::DELETE_FILE,
        "Delete a file. Its content is kept as a backup for revert_patch.",
        ToolCategory::Execution,
    )
    .mutating()
    .with_parameter(ToolParameter::new("path", "Path to the file to delete", true))
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        read_file_definition(),
        list_directory_definition(),
        write_file_definition(),
        delete_file_definition(),
    ]
}

pub struct FileTools {
    settings: Arc<ToolSettings>,
    engine: Arc<PatchEngine>,
}

impl FileTools {
    pub fn new(settings: Arc<ToolSettings>, engine: Arc<PatchEngine>) -> Self {
        Self { settings, engine }
    }

    async fn read_file(&self, path_str: &str) -> Result<ToolOutput, ToolError> {
        let path = self.settings.resolve(path_str);
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_error(path_str, e))?;
        if !metadata.is_file() {
            return Err(ToolError::invalid_argument(format!(
                "'{}' is not a file",
                path_str
            )));
        }
        if metadata.len() > MAX_READ_SIZE {
            return Err(ToolError::invalid_argument(format!(
                "File too large ({} bytes). Maximum size is {} bytes",
                metadata.len(),
                MAX_READ_SIZE
            )));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| io_error(path_str, e))?;
        if is_binary(&bytes) {
            return Err(ToolError::invalid_argument(format!(
                "'{}' is a binary file",
                path_str
            )));
        }
        let content = String::from_utf8_lossy(&bytes).into_owned();
        let lines = content.lines().count();
        Ok(ToolOutput::text(content)
            .with_data(serde_json::json!({ "bytes": bytes.len(), "lines": lines })))
    }

    async fn list_directory(&self, path_str: Option<&str>) -> Result<ToolOutput, ToolError> {
        let shown = path_str.unwrap_or(".");
        let path = self.settings.resolve(shown);
        let mut reader = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| io_error(shown, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| io_error(shown, e))?
        {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        let content = if entries.is_empty() {
            format!("{} is empty", shown)
        } else {
            entries.join("\n")
        };
        Ok(ToolOutput::text(content).with_data(serde_json::json!({ "entries": entries })))
    }

    async fn write_file(
        &self,
        path_str: String,
        content: String,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let path = self.settings.resolve(&path_str);
        let revision = self
            .engine
            .write(&path, content.as_bytes(), &ctx.cancellation)
            .await
            .map_err(|e| edit_error(&path_str, e))?;

        Ok(ToolOutput::text(format!(
            "Successfully wrote {} bytes to {}",
            content.len(),
            path_str
        ))
        .with_side_effects(SideEffects::file(path_str))
        .with_data(serde_json::json!({ "bytes": content.len(), "revision": revision })))
    }

    async fn delete_file(&self, path_str: String, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let path = self.settings.resolve(&path_str);
        if path.is_dir() {
            return Err(ToolError::invalid_argument(format!(
                "'{}' is a directory",
                path_str
            )));
        }
        let revision = self
            .engine
            .delete(&path, &ctx.cancellation)
            .await
            .map_err(|e| edit_error(&path_str, e))?;

        Ok(ToolOutput::text(format!("Deleted {}", path_str))
            .with_side_effects(SideEffects::file(path_str))
            .with_data(serde_json::json!({ "revision": revision })))
    }
}

/// Report engine failures against the path the caller gave, not the
/// resolved one.
fn edit_error(path: &str, e: EditError) -> ToolError {
    match e {
        EditError::Patch(PatchError::NotFound(_)) => ToolError::not_found(path),
        other => other.into(),
    }
}

fn write_preview(path: &str, content: &str, exists: bool) -> String {
    let verb = if exists { "overwrite" } else { "create" };
    let total = content.lines().count();
    let mut out = format!("{} {} ({} bytes, {} lines)\n", verb, path, content.len(), total);
    for line in content.lines().take(PREVIEW_LINES) {
        out.push_str(&format!("+{}\n", line));
    }
    if total > PREVIEW_LINES {
        out.push_str(&format!("... {} more line(s)\n", total - PREVIEW_LINES));
    }
    out
}

#[async_trait]
impl ToolBody for FileTools {
    async fn invoke(
        &self,
        invocation: ToolInvocation,
        ctx: ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        match invocation {
            ToolInvocation::ReadFile(args) => self.read_file(&args.path).await,
            ToolInvocation::ListDirectory(args) => self.list_directory(args.path.as_deref()).await,
            ToolInvocation::WriteFile(args) => self.write_file(args.path, args.content, &ctx).await,
            ToolInvocation::DeleteFile(args) => self.delete_file(args.path, &ctx).await,
            other => Err(ToolError::execution_failed(format!(
                "file tools cannot serve '{}'",
                other.name()
            ))),
        }
    }

    async fn preview(&self, invocation: &ToolInvocation) -> Option<String> {
        match invocation {
            ToolInvocation::WriteFile(args) => {
                let exists = self.settings.resolve(&args.path).exists();
                Some(write_preview(&args.path, &args.content, exists))
            }
            ToolInvocation::DeleteFile(args) => {
                let path = self.settings.resolve(&args.path);
                Some(match std::fs::metadata(&path) {
                    Ok(m) => format!("delete {} ({} bytes)", args.path, m.len()),
                    Err(_) => format!("delete {} (does not exist)", args.path),
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_application::ChunkSender;
    use gatehouse_domain::AgentId;
    use gatehouse_domain::tool::invocation::{ListDirectoryArgs, PathArgs, WriteFileArgs};
    use std::fs;
    use std::path::Path;
    use tokio_util::sync::CancellationToken;

    fn tools(dir: &Path) -> FileTools {
        FileTools::new(
            Arc::new(ToolSettings::default().with_working_dir(dir)),
            Arc::new(PatchEngine::new()),
        )
    }

    fn ctx() -> ToolContext {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        ToolContext {
            agent_id: AgentId::new("root"),
            cancellation: CancellationToken::new(),
            chunks: ChunkSender::new(tx),
        }
    }

    fn path(p: &str) -> PathArgs {
        PathArgs { path: p.into() }
    }

    #[tokio::test]
    async fn test_read_file_success() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "Hello, World!\n").unwrap();

        let output = tools(dir.path())
            .invoke(ToolInvocation::ReadFile(path("a.py")), ctx())
            .await
            .unwrap();
        assert_eq!(output.content, "Hello, World!\n");
        assert_eq!(output.data.unwrap()["lines"], 1);
    }

    #[tokio::test]
    async fn test_read_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let error = tools(dir.path())
            .invoke(ToolInvocation::ReadFile(path("missing.txt")), ctx())
            .await
            .unwrap_err();
        assert_eq!(error.code, "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_read_file_rejects_binary() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.bin"), b"\x00\x01").unwrap();
        let error = tools(dir.path())
            .invoke(ToolInvocation::ReadFile(path("x.bin")), ctx())
            .await
            .unwrap_err();
        assert_eq!(error.code, "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_list_directory_sorted_with_dir_markers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();

        let output = tools(dir.path())
            .invoke(
                ToolInvocation::ListDirectory(ListDirectoryArgs::default()),
                ctx(),
            )
            .await
            .unwrap();
        assert_eq!(output.content, "a.txt\nb.txt\nsrc/");
    }

    #[tokio::test]
    async fn test_write_then_delete_records_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let tools = tools(dir.path());

        let write = ToolInvocation::WriteFile(WriteFileArgs {
            path: "notes.md".into(),
            content: "# Notes\n".into(),
        });
        let preview = tools.preview(&write).await.unwrap();
        assert!(preview.starts_with("create notes.md"));
        assert!(!dir.path().join("notes.md").exists());

        let output = tools.invoke(write, ctx()).await.unwrap();
        assert_eq!(output.side_effects.files_touched, vec!["notes.md".to_string()]);
        assert_eq!(fs::read_to_string(dir.path().join("notes.md")).unwrap(), "# Notes\n");

        tools
            .invoke(ToolInvocation::DeleteFile(path("notes.md")), ctx())
            .await
            .unwrap();
        assert!(!dir.path().join("notes.md").exists());
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let error = tools(dir.path())
            .invoke(
                ToolInvocation::WriteFile(WriteFileArgs {
                    path: "nope/file.txt".into(),
                    content: "x".into(),
                }),
                ctx(),
            )
            .await
            .unwrap_err();
        assert_eq!(error.code, "NOT_FOUND");
    }
}
