//! Configuration file loading for gatehouse
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. Environment: `GATEHOUSE_<SECTION>__<KEY>`
//! 2. `--config <path>` specified file
//! 3. Project root: `./gatehouse.toml` or `./.gatehouse.toml`
//! 4. Global: `$XDG_CONFIG_HOME/gatehouse/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigIssue, FileAgentConfig, FileApprovalConfig, FileCiConfig, FileConfig,
    FileCoordinatorConfig, FileHookConfig, FileHooksConfig, FileLoggingConfig, FileToolsConfig,
    FileValidationConfig, Severity,
};
pub use loader::ConfigLoader;
