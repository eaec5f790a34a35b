//! Local tool bodies.
//!
//! Concrete implementations of the effectors behind the tool registry:
//! files, the patch engine, shell commands, tests, git, CI and search.
//! Each submodule owns both its tool definitions and the body serving them.
//!
//! - `file`: read_file, list_directory, write_file, delete_file
//! - `patch`: apply_patch, revert_patch (and the [`PatchEngine`] itself)
//! - `command`: run_command
//! - `checks`: run_tests, ci_status
//! - `git`: git_status, git_diff, git_commit
//! - `search`: glob_search, grep_search

pub mod checks;
pub mod command;
pub mod file;
pub mod git;
pub mod patch;
pub mod search;

pub(crate) mod process;

pub use checks::{CiStatusTool, RunTestsTool};
pub use command::RunCommandTool;
pub use file::FileTools;
pub use git::GitTools;
pub use patch::{PatchEngine, PatchOutcome, PatchTools};
pub use search::SearchTools;

use gatehouse_application::ToolBodies;
use gatehouse_domain::{RegistryError, ToolDefinition, ToolError, ToolRegistry, names};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default `[ci] command`
pub const DEFAULT_CI_COMMAND: &str = "gh run list --limit 1 --json status,conclusion";

/// Alias → canonical name
pub const DEFAULT_ALIASES: [(&str, &str); 6] = [
    ("bash", names::RUN_COMMAND),
    ("shell", names::RUN_COMMAND),
    ("patch", names::APPLY_PATCH),
    ("edit_file", names::APPLY_PATCH),
    ("cat", names::READ_FILE),
    ("grep", names::GREP_SEARCH),
];

/// Runtime settings shared by the local tool bodies.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Relative tool paths are resolved against this directory
    pub working_dir: PathBuf,
    pub command_timeout: Duration,
    /// Captured output per process is cut off after this many bytes
    pub max_output_bytes: usize,
    /// Shell command behind `run_tests`
    pub test_command: Option<String>,
    /// Shell command behind `ci_status`
    pub ci_command: String,
    /// Delay between CI polls while a run is still in progress
    pub ci_poll_interval: Duration,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            command_timeout: Duration::from_secs(120),
            max_output_bytes: 1024 * 1024,
            test_command: None,
            ci_command: DEFAULT_CI_COMMAND.to_string(),
            ci_poll_interval: Duration::from_secs(15),
        }
    }
}

impl ToolSettings {
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_test_command(mut self, command: impl Into<String>) -> Self {
        self.test_command = Some(command.into());
        self
    }

    pub fn with_ci_command(mut self, command: impl Into<String>) -> Self {
        self.ci_command = command.into();
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    /// Resolve a tool path argument against the working directory.
    ///
    /// Lexically normalized so that `a.py` and `./a.py` name the same file
    /// (the patch engine keys its locks and backups on the result).
    pub fn resolve(&self, path: &str) -> PathBuf {
        let raw = Path::new(path);
        let joined = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.working_dir.join(raw)
        };
        normalize(&joined)
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Map an I/O error on `path` to the matching tool error.
pub(crate) fn io_error(path: &str, e: std::io::Error) -> ToolError {
    match e.kind() {
        std::io::ErrorKind::NotFound => ToolError::not_found(path),
        std::io::ErrorKind::PermissionDenied => ToolError::permission_denied(path),
        _ => ToolError::execution_failed(format!("{}: {}", path, e)),
    }
}

/// Every local tool definition, in catalogue order.
pub fn default_definitions() -> Vec<ToolDefinition> {
    let mut definitions = file::definitions();
    definitions.extend(search::definitions());
    definitions.extend(git::read_only_definitions());
    definitions.extend(patch::definitions());
    definitions.push(command::run_command_definition());
    definitions.push(checks::run_tests_definition());
    definitions.push(git::git_commit_definition());
    definitions.push(checks::ci_status_definition());
    definitions
}

/// Build the registry of local tools and their aliases.
///
/// Coordination tools are added by the session builder.
pub fn default_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    for definition in default_definitions() {
        registry.register(definition)?;
    }
    for (alias, canonical) in DEFAULT_ALIASES {
        registry.register_alias(alias, canonical)?;
    }
    Ok(registry)
}

/// Build the bodies for every local tool.
pub fn default_bodies(settings: ToolSettings) -> ToolBodies {
    let settings = Arc::new(settings);
    let engine = Arc::new(PatchEngine::new());
    let mut bodies = ToolBodies::new();

    bodies.register_all(
        &file::FILE_TOOLS,
        Arc::new(FileTools::new(settings.clone(), engine.clone())),
    );
    bodies.register_all(
        &patch::PATCH_TOOLS,
        Arc::new(PatchTools::new(settings.clone(), engine)),
    );
    bodies.register_all(&search::SEARCH_TOOLS, Arc::new(SearchTools::new(settings.clone())));
    bodies.register_all(&git::GIT_TOOLS, Arc::new(GitTools::new(settings.clone())));
    bodies.register(names::RUN_COMMAND, Arc::new(RunCommandTool::new(settings.clone())));
    bodies.register(names::RUN_TESTS, Arc::new(RunTestsTool::new(settings.clone())));
    bodies.register(names::CI_STATUS, Arc::new(CiStatusTool::new(settings)));
    bodies
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_domain::ToolCategory;

    #[test]
    fn test_default_registry_matches_catalogue() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.len(), 14);

        let run_tests = registry.resolve("run_tests").unwrap();
        assert!(run_tests.mutates && run_tests.exempt && !run_tests.requires_approval);

        for gated in ["write_file", "delete_file", "apply_patch", "revert_patch", "run_command", "git_commit"] {
            let definition = registry.resolve(gated).unwrap();
            assert!(definition.mutates && definition.requires_approval, "{}", gated);
        }
        for read_only in ["read_file", "list_directory", "glob_search", "grep_search", "git_status", "git_diff"] {
            let definition = registry.resolve(read_only).unwrap();
            assert_eq!(definition.category, ToolCategory::ReadOnly, "{}", read_only);
            assert!(!definition.mutates, "{}", read_only);
        }
        assert_eq!(registry.resolve("ci_status").unwrap().category, ToolCategory::Ci);
    }

    #[test]
    fn test_aliases_resolve_to_canonical() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.resolve("bash").unwrap().name, "run_command");
        assert_eq!(registry.resolve("edit_file").unwrap().name, "apply_patch");
        assert_eq!(registry.resolve("cat").unwrap().name, "read_file");
        assert_eq!(registry.resolve("grep").unwrap().name, "grep_search");
    }

    #[test]
    fn test_every_definition_has_a_body() {
        let bodies = default_bodies(ToolSettings::default());
        for definition in default_definitions() {
            assert!(bodies.get(&definition.name).is_some(), "{}", definition.name);
        }
    }

    #[test]
    fn test_resolve_normalizes() {
        let settings = ToolSettings::default().with_working_dir("/work/repo");
        assert_eq!(settings.resolve("a.py"), PathBuf::from("/work/repo/a.py"));
        assert_eq!(settings.resolve("./src/../a.py"), PathBuf::from("/work/repo/a.py"));
        assert_eq!(settings.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }
}
