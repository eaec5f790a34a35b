//! Effector configuration: `[validation]`, `[ci]`, `[tools]` and `[logging]`

use super::{ConfigIssue, Severity};
use crate::tools::DEFAULT_CI_COMMAND;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw validation configuration from TOML
///
/// ```toml
/// [validation]
/// test_command = "cargo test"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileValidationConfig {
    /// Shell command behind `run_tests`. Unset disables test validation.
    pub test_command: Option<String>,
}

/// Raw CI configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCiConfig {
    pub enabled: bool,
    /// Prints the latest run as `gh run list --json status,conclusion` does
    pub command: String,
    pub poll_interval_secs: u64,
}

impl Default for FileCiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: DEFAULT_CI_COMMAND.to_string(),
            poll_interval_secs: 15,
        }
    }
}

impl FileCiConfig {
    pub(super) fn issues(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.enabled && self.command.trim().is_empty() {
            issues.push(ConfigIssue {
                severity: Severity::Error,
                field: "ci.command".to_string(),
                message: "CI is enabled but no command is configured".to_string(),
            });
        }
        if self.poll_interval_secs == 0 {
            issues.push(ConfigIssue::zero("ci.poll_interval_secs", 15));
        }
        issues
    }
}

/// Raw tool runtime configuration from TOML
///
/// ```toml
/// [tools]
/// working_dir = "."
/// command_timeout_secs = 120
/// max_output_bytes = 1048576
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileToolsConfig {
    /// Defaults to the process working directory
    pub working_dir: Option<PathBuf>,
    pub command_timeout_secs: u64,
    pub max_output_bytes: usize,
}

impl Default for FileToolsConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            command_timeout_secs: 120,
            max_output_bytes: 1024 * 1024,
        }
    }
}

impl FileToolsConfig {
    pub(super) fn issues(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.command_timeout_secs == 0 {
            issues.push(ConfigIssue::zero("tools.command_timeout_secs", 120));
        }
        if self.max_output_bytes == 0 {
            issues.push(ConfigIssue::zero("tools.max_output_bytes", 1024 * 1024));
        }
        if let Some(dir) = &self.working_dir
            && !dir.is_dir()
        {
            issues.push(ConfigIssue {
                severity: Severity::Error,
                field: "tools.working_dir".to_string(),
                message: format!("{} is not a directory", dir.display()),
            });
        }
        issues
    }
}

/// Raw logging configuration from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL audit log. Defaults to `.gatehouse/sessions/<timestamp>.jsonl`.
    pub session_log: Option<PathBuf>,
    /// Daily-rolling diagnostic log directory
    pub dir: Option<PathBuf>,
}

impl FileLoggingConfig {
    /// Where this session's audit log goes.
    pub fn session_log_path(&self) -> PathBuf {
        match &self.session_log {
            Some(path) => path.clone(),
            None => {
                let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
                PathBuf::from(".gatehouse")
                    .join("sessions")
                    .join(format!("{}.jsonl", stamp))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_log_path() {
        let path = FileLoggingConfig::default().session_log_path();
        assert!(path.starts_with(".gatehouse/sessions"));
        assert_eq!(path.extension().unwrap(), "jsonl");
    }

    #[test]
    fn test_enabled_ci_without_command_is_error() {
        let config = FileCiConfig {
            enabled: true,
            command: String::new(),
            poll_interval_secs: 15,
        };
        let issues = config.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
    }

    #[test]
    fn test_missing_working_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileToolsConfig {
            working_dir: Some(dir.path().join("missing")),
            ..Default::default()
        };
        assert_eq!(config.issues()[0].field, "tools.working_dir");
    }
}
