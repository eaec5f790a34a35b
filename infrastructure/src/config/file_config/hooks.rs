//! Lifecycle hook configuration: `[hooks]`

use super::{ConfigIssue, Severity};
use crate::hooks::{DEFAULT_HOOK_TIMEOUT_SECS, HookSpec};
use gatehouse_application::HookEvent;
use serde::{Deserialize, Serialize};

/// Raw hook configuration from TOML
///
/// ```toml
/// [hooks]
/// timeout_secs = 30
///
/// [[hooks.commands]]
/// event = "pre_tool"                      # pre_tool, post_tool, pre_commit, post_commit,
///                                         # on_error, on_complete, on_plan_approved, on_start
/// command = "cargo fmt --check"
/// tools = ["apply_patch", "write_file"]   # optional
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileHooksConfig {
    pub timeout_secs: u64,
    pub commands: Vec<FileHookConfig>,
}

impl Default for FileHooksConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HOOK_TIMEOUT_SECS,
            commands: Vec::new(),
        }
    }
}

/// One `[[hooks.commands]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileHookConfig {
    pub event: String,
    pub command: String,
    /// Limit a tool event to these canonical tool names
    pub tools: Option<Vec<String>>,
    pub description: Option<String>,
    pub enabled: bool,
}

impl Default for FileHookConfig {
    fn default() -> Self {
        Self {
            event: String::new(),
            command: String::new(),
            tools: None,
            description: None,
            enabled: true,
        }
    }
}

impl FileHookConfig {
    /// The runnable hook, or the reason this entry is skipped.
    fn to_spec(&self) -> Result<HookSpec, String> {
        let event = self.event.parse::<HookEvent>()?;
        if self.command.trim().is_empty() {
            return Err("has no command".to_string());
        }
        let mut spec = HookSpec::new(event, self.command.clone());
        if let Some(tools) = &self.tools {
            spec = spec.for_tools(tools.clone());
        }
        if let Some(description) = &self.description {
            spec = spec.with_description(description.clone());
        }
        Ok(spec)
    }
}

impl FileHooksConfig {
    /// Enabled, valid hooks in file order.
    pub fn specs(&self) -> Vec<HookSpec> {
        self.commands
            .iter()
            .filter(|c| c.enabled)
            .filter_map(|c| c.to_spec().ok())
            .collect()
    }

    pub(super) fn issues(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.timeout_secs == 0 {
            issues.push(ConfigIssue::zero("hooks.timeout_secs", DEFAULT_HOOK_TIMEOUT_SECS));
        }
        for (i, command) in self.commands.iter().enumerate() {
            if let Err(message) = command.to_spec() {
                issues.push(ConfigIssue {
                    severity: Severity::Warning,
                    field: format!("hooks.commands[{}]", i),
                    message: format!("{}, skipping it", message),
                });
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specs_skip_disabled_and_invalid_entries() {
        let toml_str = r#"
timeout_secs = 5

[[commands]]
event = "pre_tool"
command = "npm run lint"
tools = ["apply_patch", "write_file"]

[[commands]]
event = "post_commit"
command = "./notify.sh"
enabled = false

[[commands]]
event = "on_lunch"
command = "echo hi"

[[commands]]
event = "on_error"
command = "  "
"#;
        let config: FileHooksConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.timeout_secs, 5);

        let specs = config.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].event, HookEvent::PreTool);
        assert_eq!(
            specs[0].tools.as_deref(),
            Some(&["apply_patch".to_string(), "write_file".to_string()][..])
        );

        let fields: Vec<String> = config.issues().into_iter().map(|i| i.field).collect();
        assert_eq!(fields, vec!["hooks.commands[2]", "hooks.commands[3]"]);
    }

    #[test]
    fn test_zero_timeout_is_reported() {
        let config = FileHooksConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.issues()[0].field, "hooks.timeout_secs");
    }
}
