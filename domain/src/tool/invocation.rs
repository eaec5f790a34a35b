//! Typed tool invocations.
//!
//! The registry hands out definitions by name; this module turns a resolved
//! name plus its JSON arguments into one closed [`ToolInvocation`] variant
//! with a typed argument record, so tool bodies never dig through untyped
//! maps.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub mod names {
    pub const READ_FILE: &str = "read_file";
    pub const LIST_DIRECTORY: &str = "list_directory";
    pub const GLOB_SEARCH: &str = "glob_search";
    pub const GREP_SEARCH: &str = "grep_search";
    pub const GIT_STATUS: &str = "git_status";
    pub const GIT_DIFF: &str = "git_diff";
    pub const WRITE_FILE: &str = "write_file";
    pub const DELETE_FILE: &str = "delete_file";
    pub const APPLY_PATCH: &str = "apply_patch";
    pub const REVERT_PATCH: &str = "revert_patch";
    pub const RUN_COMMAND: &str = "run_command";
    pub const RUN_TESTS: &str = "run_tests";
    pub const GIT_COMMIT: &str = "git_commit";
    pub const CI_STATUS: &str = "ci_status";
    pub const SPAWN_AGENT: &str = "spawn_agent";
    pub const SPAWN_PARALLEL: &str = "spawn_parallel";
    pub const WAIT_AGENT: &str = "wait_agent";
    pub const WAIT_ALL_AGENTS: &str = "wait_all_agents";
    pub const AGENT_STATUS: &str = "agent_status";
    pub const CANCEL_AGENT: &str = "cancel_agent";
    pub const LIST_AGENTS: &str = "list_agents";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathArgs {
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListDirectoryArgs {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchArgs {
    pub pattern: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitDiffArgs {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub staged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteFileArgs {
    pub path: String,
    pub content: String,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyPatchArgs {
    pub path: String,
    pub find: String,
    pub replace: String,
    #[serde(default = "one")]
    pub expected_occurrences: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCommandArgs {
    pub command: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub working_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitCommitArgs {
    pub message: String,
    #[serde(default)]
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoArgs {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub kind: String,
    pub goal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnParallelArgs {
    pub agents: Vec<SpawnRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitAgentArgs {
    pub agent_id: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitAllArgs {
    pub agent_ids: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRefArgs {
    pub agent_id: String,
}

/// One variant per tool, each carrying its typed arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "args", rename_all = "snake_case")]
pub enum ToolInvocation {
    ReadFile(PathArgs),
    ListDirectory(ListDirectoryArgs),
    GlobSearch(SearchArgs),
    GrepSearch(SearchArgs),
    GitStatus(NoArgs),
    GitDiff(GitDiffArgs),
    WriteFile(WriteFileArgs),
    DeleteFile(PathArgs),
    ApplyPatch(ApplyPatchArgs),
    RevertPatch(PathArgs),
    RunCommand(RunCommandArgs),
    RunTests(NoArgs),
    GitCommit(GitCommitArgs),
    CiStatus(NoArgs),
    SpawnAgent(SpawnRequest),
    SpawnParallel(SpawnParallelArgs),
    WaitAgent(WaitAgentArgs),
    WaitAllAgents(WaitAllArgs),
    AgentStatus(AgentRefArgs),
    CancelAgent(AgentRefArgs),
    ListAgents(NoArgs),
}

impl ToolInvocation {
    /// Build the typed invocation for a canonical tool name.
    ///
    /// Fails with a readable message when the name has no variant or the
    /// arguments do not fit the variant's record.
    pub fn parse(canonical_name: &str, arguments: &HashMap<String, Value>) -> Result<Self, String> {
        let args: serde_json::Map<String, Value> = arguments
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let tagged = serde_json::json!({ "tool": canonical_name, "args": args });
        serde_json::from_value(tagged)
            .map_err(|e| format!("Invalid arguments for '{}': {}", canonical_name, e))
    }

    pub fn name(&self) -> &'static str {
        use names::*;
        match self {
            ToolInvocation::ReadFile(_) => READ_FILE,
            ToolInvocation::ListDirectory(_) => LIST_DIRECTORY,
            ToolInvocation::GlobSearch(_) => GLOB_SEARCH,
            ToolInvocation::GrepSearch(_) => GREP_SEARCH,
            ToolInvocation::GitStatus(_) => GIT_STATUS,
            ToolInvocation::GitDiff(_) => GIT_DIFF,
            ToolInvocation::WriteFile(_) => WRITE_FILE,
            ToolInvocation::DeleteFile(_) => DELETE_FILE,
            ToolInvocation::ApplyPatch(_) => APPLY_PATCH,
            ToolInvocation::RevertPatch(_) => REVERT_PATCH,
            ToolInvocation::RunCommand(_) => RUN_COMMAND,
            ToolInvocation::RunTests(_) => RUN_TESTS,
            ToolInvocation::GitCommit(_) => GIT_COMMIT,
            ToolInvocation::CiStatus(_) => CI_STATUS,
            ToolInvocation::SpawnAgent(_) => SPAWN_AGENT,
            ToolInvocation::SpawnParallel(_) => SPAWN_PARALLEL,
            ToolInvocation::WaitAgent(_) => WAIT_AGENT,
            ToolInvocation::WaitAllAgents(_) => WAIT_ALL_AGENTS,
            ToolInvocation::AgentStatus(_) => AGENT_STATUS,
            ToolInvocation::CancelAgent(_) => CANCEL_AGENT,
            ToolInvocation::ListAgents(_) => LIST_AGENTS,
        }
    }

    /// The command line this invocation would run, if any.
    pub fn command_line(&self) -> Option<&str> {
        match self {
            ToolInvocation::RunCommand(args) => Some(&args.command),
            _ => None,
        }
    }

    /// The file this invocation targets, if it targets exactly one.
    pub fn target_path(&self) -> Option<&str> {
        match self {
            ToolInvocation::ReadFile(a)
            | ToolInvocation::DeleteFile(a)
            | ToolInvocation::RevertPatch(a) => Some(&a.path),
            ToolInvocation::WriteFile(a) => Some(&a.path),
            ToolInvocation::ApplyPatch(a) => Some(&a.path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> HashMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_apply_patch_defaults_expected_occurrences() {
        let invocation = ToolInvocation::parse(
            names::APPLY_PATCH,
            &args(json!({"path": "a.py", "find": "foo", "replace": "bar"})),
        )
        .unwrap();
        assert_eq!(
            invocation,
            ToolInvocation::ApplyPatch(ApplyPatchArgs {
                path: "a.py".into(),
                find: "foo".into(),
                replace: "bar".into(),
                expected_occurrences: 1,
            })
        );
        assert_eq!(invocation.name(), "apply_patch");
        assert_eq!(invocation.target_path(), Some("a.py"));
    }

    #[test]
    fn test_parse_no_arg_tool() {
        let invocation = ToolInvocation::parse(names::RUN_TESTS, &HashMap::new()).unwrap();
        assert_eq!(invocation, ToolInvocation::RunTests(NoArgs {}));
    }

    #[test]
    fn test_parse_spawn_parallel() {
        let invocation = ToolInvocation::parse(
            names::SPAWN_PARALLEL,
            &args(json!({"agents": [
                {"kind": "explore", "goal": "map the repo"},
                {"kind": "research", "goal": "read docs"}
            ]})),
        )
        .unwrap();
        match invocation {
            ToolInvocation::SpawnParallel(args) => assert_eq!(args.agents.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        let err = ToolInvocation::parse(names::RUN_COMMAND, &args(json!({"command": 5})))
            .unwrap_err();
        assert!(err.contains("run_command"));
        assert!(ToolInvocation::parse("teleport", &HashMap::new()).is_err());
    }

    #[test]
    fn test_null_arguments_are_dropped() {
        let invocation = ToolInvocation::parse(
            names::RUN_COMMAND,
            &args(json!({"command": "ls", "timeout_secs": null})),
        )
        .unwrap();
        assert_eq!(invocation.command_line(), Some("ls"));
    }
}
