//! Tool registry.
//!
//! Built once at boot, then shared read-only (behind an `Arc`) by every
//! agent in the session. Names are unique; aliases resolve to canonical
//! names but a canonical name always wins over an alias with the same text.

use super::entities::ToolDefinition;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Tool '{0}' mutates state but is neither gated nor exempt")]
    UngatedMutation(String),

    #[error("Alias '{alias}' points at unregistered tool '{target}'")]
    DanglingAlias { alias: String, target: String },
}

#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
    /// Alias → canonical name mapping (e.g. "bash" → "run_command")
    aliases: HashMap<String, String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool definition.
    ///
    /// Rejects duplicate names and mutating tools that would bypass approval
    /// without an explicit exemption.
    pub fn register(&mut self, tool: ToolDefinition) -> Result<(), RegistryError> {
        if self.tools.contains_key(&tool.name) {
            return Err(RegistryError::DuplicateTool(tool.name));
        }
        if tool.mutates && !tool.requires_approval && !tool.exempt {
            return Err(RegistryError::UngatedMutation(tool.name));
        }
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    /// Register an alias for an already registered tool.
    pub fn register_alias(
        &mut self,
        alias: impl Into<String>,
        canonical: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let alias = alias.into();
        let canonical = canonical.into();
        if !self.tools.contains_key(&canonical) {
            return Err(RegistryError::DanglingAlias {
                alias,
                target: canonical,
            });
        }
        self.aliases.insert(alias, canonical);
        Ok(())
    }

    /// Resolve a canonical name or alias to its definition.
    pub fn resolve(&self, name: &str) -> Result<&ToolDefinition, RegistryError> {
        if let Some(tool) = self.tools.get(name) {
            return Ok(tool);
        }
        self.aliases
            .get(name)
            .and_then(|canonical| self.tools.get(canonical))
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    pub fn all(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.values()
    }

    /// Canonical names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
