//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Bad values never fail the load: [`FileConfig::validate`] reports them as
//! [`ConfigIssue`]s and the conversions fall back to defaults.

mod agent;
mod hooks;
mod tools;

pub use agent::{FileAgentConfig, FileApprovalConfig, FileCoordinatorConfig};
pub use hooks::{FileHookConfig, FileHooksConfig};
pub use tools::{FileCiConfig, FileLoggingConfig, FileToolsConfig, FileValidationConfig};

use crate::hooks::ShellHookRunner;
use crate::tools::ToolSettings;
use gatehouse_application::EngineConfig;
use gatehouse_domain::AgentPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A problem found in the loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: Severity,
    /// Dotted path, e.g. `agent.approval_mode`
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn zero(field: &str, default: impl std::fmt::Display) -> Self {
        Self {
            severity: Severity::Warning,
            field: field.to_string(),
            message: format!("must be greater than 0, falling back to {}", default),
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub agent: FileAgentConfig,
    pub approval: FileApprovalConfig,
    pub coordinator: FileCoordinatorConfig,
    pub validation: FileValidationConfig,
    pub ci: FileCiConfig,
    pub tools: FileToolsConfig,
    pub logging: FileLoggingConfig,
    pub hooks: FileHooksConfig,
}

/// `value`, or `default` when it is zero.
fn nonzero<T: PartialEq + Default>(value: T, default: T) -> T {
    if value == T::default() { default } else { value }
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        issues.extend(self.agent.issues());
        issues.extend(self.approval.issues());
        issues.extend(self.coordinator.issues());
        issues.extend(self.ci.issues());
        issues.extend(self.tools.issues());
        issues.extend(self.hooks.issues());
        issues
    }

    /// Engine settings, with invalid values replaced by their defaults.
    pub fn to_engine_config(&self) -> EngineConfig {
        let defaults = EngineConfig::default();
        let policy = AgentPolicy::default()
            .with_approval_mode(self.agent.parse_approval_mode().0)
            .with_require_approval(self.approval.require_approval)
            .with_dangerous_patterns(self.approval.patterns())
            .with_max_plan_revisions(self.agent.max_plan_revisions)
            .with_max_remediation_attempts(self.agent.max_remediation_attempts)
            .with_max_iterations(nonzero(
                self.agent.max_iterations,
                defaults.policy.max_iterations,
            ));

        EngineConfig::default()
            .with_policy(policy)
            .with_max_children(nonzero(
                self.coordinator.max_children_per_parent,
                defaults.coordinator.max_children_per_parent,
            ))
            .with_default_wait_timeout(Duration::from_secs(nonzero(
                self.coordinator.default_wait_timeout_secs,
                defaults.coordinator.default_wait_timeout.as_secs(),
            )))
            .with_validation_tests(self.validation.test_command.is_some())
            .with_ci(self.ci.enabled)
    }

    /// Tool body settings. Relative working directories resolve against `cwd`.
    pub fn to_tool_settings(&self, cwd: &Path) -> ToolSettings {
        let defaults = ToolSettings::default();
        let working_dir = match &self.tools.working_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => cwd.join(dir),
            None => cwd.to_path_buf(),
        };

        let mut settings = ToolSettings::default()
            .with_working_dir(working_dir)
            .with_command_timeout(Duration::from_secs(nonzero(
                self.tools.command_timeout_secs,
                defaults.command_timeout.as_secs(),
            )))
            .with_max_output_bytes(nonzero(
                self.tools.max_output_bytes,
                defaults.max_output_bytes,
            ))
            .with_ci_command(self.ci.command.clone());
        if let Some(command) = &self.validation.test_command {
            settings = settings.with_test_command(command.clone());
        }
        settings.ci_poll_interval = Duration::from_secs(nonzero(
            self.ci.poll_interval_secs,
            defaults.ci_poll_interval.as_secs(),
        ));
        settings
    }

    /// Hook runner over the enabled, valid `[[hooks.commands]]`, running in
    /// `working_dir`.
    pub fn to_hook_runner(&self, working_dir: &Path) -> ShellHookRunner {
        ShellHookRunner::new(self.hooks.specs(), working_dir)
            .with_timeout(Duration::from_secs(nonzero(
                self.hooks.timeout_secs,
                crate::hooks::DEFAULT_HOOK_TIMEOUT_SECS,
            )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_domain::ApprovalMode;

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[agent]
approval_mode = "auto_reject"
max_plan_revisions = 5
max_remediation_attempts = 1
max_iterations = 20

[approval]
require_approval = false
dangerous_patterns = ["terraform destroy"]

[coordinator]
max_children_per_parent = 2
default_wait_timeout_secs = 30

[validation]
test_command = "cargo test"

[ci]
enabled = true

[tools]
command_timeout_secs = 10
max_output_bytes = 4096

[logging]
session_log = "audit.jsonl"

[hooks]
timeout_secs = 10

[[hooks.commands]]
event = "pre_commit"
command = "cargo fmt --check"
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_empty());

        let engine = config.to_engine_config();
        assert_eq!(engine.policy.approval_mode, ApprovalMode::AutoReject);
        assert!(!engine.policy.require_approval);
        assert_eq!(engine.policy.dangerous_patterns, vec!["terraform destroy".to_string()]);
        assert_eq!(engine.policy.max_plan_revisions, 5);
        assert_eq!(engine.policy.max_remediation_attempts, 1);
        assert_eq!(engine.policy.max_iterations, 20);
        assert_eq!(engine.coordinator.max_children_per_parent, 2);
        assert_eq!(engine.coordinator.default_wait_timeout, Duration::from_secs(30));
        assert!(engine.validate_with_tests);
        assert!(engine.ci_enabled);

        let settings = config.to_tool_settings(Path::new("/work"));
        assert_eq!(settings.working_dir, Path::new("/work"));
        assert_eq!(settings.command_timeout, Duration::from_secs(10));
        assert_eq!(settings.max_output_bytes, 4096);
        assert_eq!(settings.test_command.as_deref(), Some("cargo test"));
        assert_eq!(settings.ci_command, crate::tools::DEFAULT_CI_COMMAND);

        let hooks = config.to_hook_runner(Path::new("/work"));
        assert_eq!(hooks.hooks().len(), 1);
        assert_eq!(hooks.hooks()[0].event, gatehouse_application::HookEvent::PreCommit);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let toml_str = r#"
[agent]
max_plan_revisions = 1
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.agent.max_plan_revisions, 1);
        // Defaults should apply
        assert_eq!(config.agent.max_iterations, 50);
        assert!(config.approval.require_approval);
        assert_eq!(config.coordinator.max_children_per_parent, 4);
        assert!(!config.ci.enabled);
        assert!(config.to_hook_runner(Path::new("/work")).is_empty());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(FileConfig::default().validate().is_empty());
    }

    #[test]
    fn test_invalid_values_are_reported_and_defaulted() {
        let toml_str = r#"
[agent]
approval_mode = "maybe"
max_iterations = 0

[coordinator]
max_children_per_parent = 0
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let fields: Vec<String> = config.validate().into_iter().map(|i| i.field).collect();
        assert_eq!(
            fields,
            vec![
                "agent.approval_mode",
                "agent.max_iterations",
                "coordinator.max_children_per_parent"
            ]
        );

        let engine = config.to_engine_config();
        assert_eq!(engine.policy.approval_mode, ApprovalMode::Interactive);
        assert_eq!(engine.policy.max_iterations, 50);
        assert_eq!(engine.coordinator.max_children_per_parent, 4);
    }

    #[test]
    fn test_relative_working_dir() {
        let config: FileConfig = toml::from_str("[tools]\nworking_dir = \"sub\"\n").unwrap();
        let settings = config.to_tool_settings(Path::new("/work"));
        assert_eq!(settings.working_dir, Path::new("/work/sub"));
    }
}
