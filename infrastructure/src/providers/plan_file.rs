//! Plan document provider.
//!
//! Serves plans from a JSON document instead of a language model:
//!
//! ```json
//! {
//!   "goal": "Fix the failing test",
//!   "steps": [{"description": "Patch", "tool": "apply_patch", "args": {...}}],
//!   "revisions": [{"steps": [...]}],
//!   "remediation": [[{"tool": "apply_patch", "args": {...}}]],
//!   "children": {"Survey the tests": {"steps": [...]}, "*": {"steps": [...]}}
//! }
//! ```
//!
//! `revisions[n]` answers planning round `n + 2` after a rejection (the last
//! entry, or the base plan, repeats when they run out). `remediation[n]`
//! answers remediation attempt `n + 1`. Child agents are looked up by goal,
//! then under `"*"`. Everything served still goes through registry
//! validation in the engine.

use async_trait::async_trait;
use gatehouse_application::{
    InferenceError, InferenceProvider, PlanningRequest, RemediationRequest,
};
use gatehouse_domain::{AgentKind, PlanDraft, StepDraft, parse_plan_json};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const ANY_CHILD: &str = "*";

#[derive(Debug, Error)]
pub enum PlanFileError {
    #[error("Could not read plan file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Plan file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Plan file has no usable plan at {0}")]
    NoPlan(String),
}

#[derive(Debug, Clone)]
pub struct PlanFileProvider {
    plan: PlanDraft,
    revisions: Vec<PlanDraft>,
    remediation: Vec<Vec<StepDraft>>,
    children: HashMap<String, PlanDraft>,
}

fn plan_at(value: &Value, location: impl Into<String>) -> Result<PlanDraft, PlanFileError> {
    parse_plan_json(value).ok_or_else(|| PlanFileError::NoPlan(location.into()))
}

impl PlanFileProvider {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PlanFileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PlanFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_value(&serde_json::from_str(&text)?)
    }

    /// Parse a plan document. Every plan in it must have at least one step.
    pub fn from_value(document: &Value) -> Result<Self, PlanFileError> {
        let plan = plan_at(document, "steps")?;

        let revisions = match document.get("revisions").and_then(Value::as_array) {
            Some(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| plan_at(v, format!("revisions[{}]", i)))
                .collect::<Result<_, _>>()?,
            None => Vec::new(),
        };

        let remediation = match document.get("remediation").and_then(Value::as_array) {
            // A flat list of steps is a single remediation round
            Some(items) if items.iter().all(Value::is_object) && !items.is_empty() => {
                vec![plan_at(&Value::Array(items.clone()), "remediation")?.steps]
            }
            Some(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| plan_at(v, format!("remediation[{}]", i)).map(|p| p.steps))
                .collect::<Result<_, _>>()?,
            None => Vec::new(),
        };

        let children = match document.get("children").and_then(Value::as_object) {
            Some(map) => map
                .iter()
                .map(|(goal, v)| Ok((goal.clone(), plan_at(v, format!("children.{}", goal))?)))
                .collect::<Result<_, PlanFileError>>()?,
            None => HashMap::new(),
        };

        Ok(Self {
            plan,
            revisions,
            remediation,
            children,
        })
    }

    /// Goal stated by the document, if any.
    pub fn goal(&self) -> Option<&str> {
        self.plan.goal.as_deref()
    }

    fn root_plan(&self, revision: u32) -> &PlanDraft {
        let index = revision.saturating_sub(2) as usize;
        if revision < 2 || self.revisions.is_empty() {
            return &self.plan;
        }
        self.revisions
            .get(index)
            .or_else(|| self.revisions.last())
            .unwrap_or(&self.plan)
    }
}

#[async_trait]
impl InferenceProvider for PlanFileProvider {
    async fn plan(&self, request: &PlanningRequest) -> Result<PlanDraft, InferenceError> {
        if let Some(feedback) = &request.feedback {
            debug!(agent_id = %request.agent_id, revision = request.revision, feedback = %feedback, "Replanning");
        }
        if request.kind == AgentKind::Root {
            return Ok(self.root_plan(request.revision).clone());
        }
        self.children
            .get(&request.goal)
            .or_else(|| self.children.get(ANY_CHILD))
            .cloned()
            .ok_or_else(|| {
                InferenceError::NoPlan(format!("no plan for child goal '{}'", request.goal))
            })
    }

    async fn remediate(
        &self,
        request: &RemediationRequest,
    ) -> Result<Vec<StepDraft>, InferenceError> {
        let index = request.attempt.saturating_sub(1) as usize;
        self.remediation.get(index).cloned().ok_or_else(|| {
            InferenceError::NoPlan(format!(
                "no remediation steps for attempt {}",
                request.attempt
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_domain::{AgentId, Plan};
    use serde_json::json;

    fn planning(kind: AgentKind, goal: &str, revision: u32) -> PlanningRequest {
        PlanningRequest {
            agent_id: AgentId::new("a"),
            kind,
            goal: goal.into(),
            revision,
            feedback: None,
        }
    }

    fn remediation(attempt: u32) -> RemediationRequest {
        RemediationRequest {
            agent_id: AgentId::new("root"),
            goal: "g".into(),
            plan: Plan::new("g", 1, vec![]),
            failures: vec!["tests failed".into()],
            attempt,
        }
    }

    fn document() -> Value {
        json!({
            "goal": "Rename the helper",
            "steps": [
                {"description": "Look", "tool": "read_file", "args": {"path": "a.py"}},
                {"description": "Patch", "tool": "apply_patch",
                 "args": {"path": "a.py", "find": "old", "replace": "new"}}
            ],
            "revisions": [
                {"steps": [{"tool": "read_file", "args": {"path": "b.py"}}]}
            ],
            "remediation": [
                [{"tool": "apply_patch", "args": {"path": "a.py", "find": "new", "replace": "newer"}}]
            ],
            "children": {
                "Survey tests": {"steps": [{"tool": "glob_search", "args": {"pattern": "tests/*"}}]},
                "*": [{"tool": "git_status"}]
            }
        })
    }

    #[tokio::test]
    async fn test_root_plan_and_revisions() {
        let provider = PlanFileProvider::from_value(&document()).unwrap();
        assert_eq!(provider.goal(), Some("Rename the helper"));

        let first = provider.plan(&planning(AgentKind::Root, "x", 1)).await.unwrap();
        assert_eq!(first.steps.len(), 2);
        assert_eq!(first.steps[1].tool_name, "apply_patch");

        let second = provider.plan(&planning(AgentKind::Root, "x", 2)).await.unwrap();
        assert_eq!(second.steps[0].arguments["path"], "b.py");
        // The last revision repeats once they run out
        let third = provider.plan(&planning(AgentKind::Root, "x", 3)).await.unwrap();
        assert_eq!(third, second);
    }

    #[tokio::test]
    async fn test_child_plans_by_goal_then_wildcard() {
        let provider = PlanFileProvider::from_value(&document()).unwrap();

        let survey = provider
            .plan(&planning(AgentKind::Explore, "Survey tests", 1))
            .await
            .unwrap();
        assert_eq!(survey.steps[0].tool_name, "glob_search");

        let other = provider
            .plan(&planning(AgentKind::Research, "Something else", 1))
            .await
            .unwrap();
        assert_eq!(other.steps[0].tool_name, "git_status");
    }

    #[tokio::test]
    async fn test_missing_child_plan_is_no_plan() {
        let provider = PlanFileProvider::from_value(&json!({
            "steps": [{"tool": "read_file", "args": {"path": "a"}}]
        }))
        .unwrap();
        let error = provider
            .plan(&planning(AgentKind::Explore, "anything", 1))
            .await
            .unwrap_err();
        assert!(matches!(error, InferenceError::NoPlan(_)));
    }

    #[tokio::test]
    async fn test_remediation_rounds() {
        let provider = PlanFileProvider::from_value(&document()).unwrap();
        let steps = provider.remediate(&remediation(1)).await.unwrap();
        assert_eq!(steps[0].arguments["replace"], "newer");
        assert!(provider.remediate(&remediation(2)).await.is_err());
    }

    #[tokio::test]
    async fn test_flat_remediation_list_is_one_round() {
        let provider = PlanFileProvider::from_value(&json!({
            "steps": [{"tool": "read_file", "args": {"path": "a"}}],
            "remediation": [{"tool": "run_tests"}, {"tool": "git_status"}]
        }))
        .unwrap();
        assert_eq!(provider.remediate(&remediation(1)).await.unwrap().len(), 2);
    }

    #[test]
    fn test_document_without_steps_is_rejected() {
        let error = PlanFileProvider::from_value(&json!({"goal": "nothing"})).unwrap_err();
        assert!(matches!(error, PlanFileError::NoPlan(_)));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, document().to_string()).unwrap();
        assert!(PlanFileProvider::from_path(&path).is_ok());

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            PlanFileProvider::from_path(&path),
            Err(PlanFileError::Json(_))
        ));
    }
}
