//! Plans and steps.
//!
//! A [`Plan`] is an ordered list of [`Step`]s bound to tool calls. Steps are
//! numbered from 1 without gaps. Plans are never edited in place: rejection
//! produces a new proposal, and remediation produces a new revision via
//! [`Plan::remediation`].

use crate::tool::registry::ToolRegistry;
use crate::tool::traits::ToolValidator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// A step before it has been numbered into a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDraft {
    pub description: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: HashMap<String, Value>,
}

impl StepDraft {
    pub fn new(description: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            tool_name: tool_name.into(),
            arguments: HashMap::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }
}

/// A numbered step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based position in the plan
    pub index: u32,
    pub description: String,
    pub tool_name: String,
    pub arguments: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Plan has no steps")]
    Empty,

    #[error("Step {index}: {message}")]
    InvalidStep { index: u32, message: String },
}

/// An immutable, numbered plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub goal: String,
    /// Starts at 1 and increases for every new proposal or remediation
    pub revision: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    steps: Vec<Step>,
}

impl Plan {
    pub fn new(goal: impl Into<String>, revision: u32, drafts: Vec<StepDraft>) -> Self {
        let steps = drafts
            .into_iter()
            .zip(1u32..)
            .map(|(draft, index)| Step {
                index,
                description: draft.description,
                tool_name: draft.tool_name,
                arguments: draft.arguments,
            })
            .collect();
        Self {
            goal: goal.into(),
            revision,
            rationale: None,
            steps,
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// Renumber the revision, e.g. when adopting an operator-edited plan.
    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, index: u32) -> Option<&Step> {
        index
            .checked_sub(1)
            .and_then(|i| self.steps.get(i as usize))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// A new revision holding only the remediation steps.
    pub fn remediation(&self, drafts: Vec<StepDraft>) -> Plan {
        Plan::new(self.goal.clone(), self.revision + 1, drafts)
    }

    /// Check every step against the registry and argument validator.
    ///
    /// Unknown tools and malformed arguments are rejected here so that
    /// nothing the planner produced is ever executed speculatively.
    pub fn validate(
        &self,
        registry: &ToolRegistry,
        validator: &dyn ToolValidator,
    ) -> Result<(), PlanError> {
        if self.steps.is_empty() {
            return Err(PlanError::Empty);
        }
        for step in &self.steps {
            let definition =
                registry
                    .resolve(&step.tool_name)
                    .map_err(|e| PlanError::InvalidStep {
                        index: step.index,
                        message: e.to_string(),
                    })?;
            validator
                .validate(&step.arguments, definition)
                .map_err(|message| PlanError::InvalidStep {
                    index: step.index,
                    message,
                })?;
        }
        Ok(())
    }

    /// Whether any step resolves to a mutating tool.
    pub fn mutates(&self, registry: &ToolRegistry) -> bool {
        self.steps.iter().any(|s| {
            registry
                .resolve(&s.tool_name)
                .map(|d| d.mutates)
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::entities::{ToolCategory, ToolDefinition, ToolParameter};
    use crate::tool::traits::DefaultToolValidator;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolDefinition::new("read_file", "Read", ToolCategory::ReadOnly)
                    .with_parameter(ToolParameter::new("path", "File", true)),
            )
            .unwrap();
        registry
            .register(
                ToolDefinition::new("write_file", "Write", ToolCategory::Execution)
                    .mutating()
                    .with_parameter(ToolParameter::new("path", "File", true))
                    .with_parameter(ToolParameter::new("content", "Body", true)),
            )
            .unwrap();
        registry
    }

    fn drafts() -> Vec<StepDraft> {
        vec![
            StepDraft::new("read", "read_file").with_arg("path", "a.py"),
            StepDraft::new("write", "write_file")
                .with_arg("path", "a.py")
                .with_arg("content", "x"),
        ]
    }

    #[test]
    fn test_steps_are_numbered_from_one() {
        let plan = Plan::new("goal", 1, drafts());
        let indices: Vec<u32> = plan.steps().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(plan.step(2).unwrap().tool_name, "write_file");
        assert!(plan.step(0).is_none());
        assert!(plan.step(3).is_none());
    }

    #[test]
    fn test_remediation_is_a_new_revision() {
        let plan = Plan::new("goal", 1, drafts());
        let fix = plan.remediation(vec![StepDraft::new("retry", "read_file").with_arg("path", "b")]);
        assert_eq!(fix.revision, 2);
        assert_eq!(fix.len(), 1);
        assert_eq!(fix.steps()[0].index, 1);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_validate_accepts_known_tools() {
        let plan = Plan::new("goal", 1, drafts());
        assert!(plan.validate(&registry(), &DefaultToolValidator).is_ok());
        assert!(plan.mutates(&registry()));
    }

    #[test]
    fn test_validate_rejects_unknown_tool_and_bad_args() {
        let unknown = Plan::new("goal", 1, vec![StepDraft::new("x", "format_disk")]);
        assert!(matches!(
            unknown.validate(&registry(), &DefaultToolValidator),
            Err(PlanError::InvalidStep { index: 1, .. })
        ));

        let missing = Plan::new(
            "goal",
            1,
            vec![
                StepDraft::new("read", "read_file").with_arg("path", "a"),
                StepDraft::new("write", "write_file").with_arg("path", "a"),
            ],
        );
        let err = missing.validate(&registry(), &DefaultToolValidator).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Step 2: Missing required parameter 'content' for tool 'write_file'"
        );

        let empty = Plan::new("goal", 1, vec![]);
        assert_eq!(
            empty.validate(&registry(), &DefaultToolValidator),
            Err(PlanError::Empty)
        );
    }
}
