//! Search tools: glob_search, grep_search

use super::ToolSettings;
use async_trait::async_trait;
use gatehouse_application::{ToolBody, ToolContext};
use gatehouse_domain::tool::invocation::SearchArgs;
use gatehouse_domain::{
    ToolCategory, ToolDefinition, ToolError, ToolInvocation, ToolOutput, ToolParameter, names,
};
use glob::glob;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Canonical names served by [`SearchTools`].
pub const SEARCH_TOOLS: [&str; 2] = [names::GLOB_SEARCH, names::GREP_SEARCH];

/// Maximum number of results to return
const MAX_RESULTS: usize = 1000;

/// Maximum file size for grep (5 MB)
const MAX_GREP_FILE_SIZE: u64 = 5 * 1024 * 1024;

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            names::GLOB_SEARCH,
            "Search for files matching a glob pattern (e.g., '**/*.rs', 'src/*.txt')",
            ToolCategory::ReadOnly,
        )
        .with_parameter(ToolParameter::new("pattern", "Glob pattern to match files", true))
        .with_parameter(ToolParameter::new(
            "path",
            "Base directory to search from (default: working directory)",
            false,
        )),
        ToolDefinition::new(
            names::GREP_SEARCH,
            "Search for a regex pattern within file contents",
            ToolCategory::ReadOnly,
        )
        .with_parameter(ToolParameter::new("pattern", "Regex pattern to search for", true))
        .with_parameter(ToolParameter::new(
            "path",
            "File or directory to search in (default: working directory)",
            false,
        )),
    ]
}

pub struct SearchTools {
    settings: Arc<ToolSettings>,
}

impl SearchTools {
    pub fn new(settings: Arc<ToolSettings>) -> Self {
        Self { settings }
    }

    fn base(&self, path: Option<&str>) -> PathBuf {
        match path {
            Some(p) => self.settings.resolve(p),
            None => self.settings.working_dir.clone(),
        }
    }
}

#[async_trait]
impl ToolBody for SearchTools {
    async fn invoke(
        &self,
        invocation: ToolInvocation,
        _ctx: ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let (args, grep) = match invocation {
            ToolInvocation::GlobSearch(args) => (args, false),
            ToolInvocation::GrepSearch(args) => (args, true),
            other => {
                return Err(ToolError::execution_failed(format!(
                    "search tools cannot serve '{}'",
                    other.name()
                )));
            }
        };
        let base = self.base(args.path.as_deref());
        let root = self.settings.working_dir.clone();

        tokio::task::spawn_blocking(move || {
            if grep {
                grep_search(&args, &base, &root)
            } else {
                glob_search(&args, &base, &root)
            }
        })
        .await
        .map_err(|e| ToolError::execution_failed(format!("Search task failed: {}", e)))?
    }
}

/// Show paths relative to the working directory when they live under it.
fn display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn glob_search(args: &SearchArgs, base: &Path, root: &Path) -> Result<ToolOutput, ToolError> {
    let full_pattern = if Path::new(&args.pattern).is_absolute() {
        args.pattern.clone()
    } else {
        format!("{}/{}", base.display(), args.pattern)
    };

    let entries = glob(&full_pattern)
        .map_err(|e| ToolError::invalid_argument(format!("Invalid glob pattern: {}", e)))?;

    let mut results = Vec::new();
    let mut error_count = 0;
    for entry in entries {
        if results.len() >= MAX_RESULTS {
            break;
        }
        match entry {
            Ok(path) => results.push(display(&path, root)),
            Err(_) => error_count += 1,
        }
    }

    let match_count = results.len();
    let mut output = results.join("\n");
    if match_count >= MAX_RESULTS {
        output.push_str(&format!("\n... (limited to {} results)", MAX_RESULTS));
    }
    if error_count > 0 {
        output.push_str(&format!("\n({} paths could not be accessed)", error_count));
    }
    if results.is_empty() {
        output = "No files found matching the pattern".to_string();
    }

    Ok(ToolOutput::text(output).with_data(serde_json::json!({ "matches": match_count })))
}

fn grep_search(args: &SearchArgs, base: &Path, root: &Path) -> Result<ToolOutput, ToolError> {
    if !base.exists() {
        return Err(ToolError::not_found(base.display().to_string()));
    }
    let regex = Regex::new(&args.pattern)
        .map_err(|e| ToolError::invalid_argument(format!("Invalid regex pattern: {}", e)))?;

    let files = if base.is_file() {
        vec![base.to_path_buf()]
    } else {
        collect_files(base)
    };

    let mut results = Vec::new();
    'files: for file_path in files {
        if fs::metadata(&file_path).is_ok_and(|m| m.len() > MAX_GREP_FILE_SIZE) {
            continue;
        }
        // Binary and unreadable files are skipped
        let Ok(content) = fs::read_to_string(&file_path) else {
            continue;
        };
        let file_display = display(&file_path, root);
        for (line_num, line) in content.lines().enumerate() {
            if results.len() >= MAX_RESULTS {
                break 'files;
            }
            if regex.is_match(line) {
                results.push(format!("{}:{}: {}", file_display, line_num + 1, line));
            }
        }
    }

    let match_count = results.len();
    let mut output = results.join("\n");
    if match_count >= MAX_RESULTS {
        output.push_str(&format!("\n... (limited to {} matches)", MAX_RESULTS));
    }
    if results.is_empty() {
        output = "No matches found".to_string();
    }

    Ok(ToolOutput::text(output).with_data(serde_json::json!({ "matches": match_count })))
}

/// Collect regular files under a directory, skipping `.git`.
fn collect_files(dir: &Path) -> Vec<PathBuf> {
    let full_pattern = format!("{}/**/*", dir.display());
    let Ok(paths) = glob(&full_pattern) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = paths
        .flatten()
        .filter(|p| p.is_file() && !p.components().any(|c| c.as_os_str() == ".git"))
        .collect();
    files.sort();
    files
}
