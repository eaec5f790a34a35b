//! Plan parsing from planner output.
//!
//! Planners hand back either a fenced ` ```plan` block or a bare JSON
//! document. Both are reduced to a [`PlanDraft`]; numbering and registry
//! validation happen later in [`Plan`](super::plan::Plan).

use super::plan::StepDraft;
use serde_json::Value;

/// Unnumbered plan as produced by a planner.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanDraft {
    pub goal: Option<String>,
    pub rationale: Option<String>,
    pub steps: Vec<StepDraft>,
}

/// Parse a plan from planner text.
///
/// Supports two formats:
/// 1. ` ```plan` fenced code blocks containing JSON
/// 2. Raw JSON (the entire text is valid JSON)
///
/// Returns `None` if no valid plan is found, or if the plan has no steps.
pub fn parse_plan(text: &str) -> Option<PlanDraft> {
    let mut in_plan_block = false;
    let mut current_block = String::new();

    for line in text.lines() {
        if line.trim() == "```plan" {
            in_plan_block = true;
            current_block.clear();
        } else if in_plan_block && line.trim() == "```" {
            in_plan_block = false;
            if let Ok(parsed) = serde_json::from_str::<Value>(&current_block) {
                return parse_plan_json(&parsed);
            }
        } else if in_plan_block {
            current_block.push_str(line);
            current_block.push('\n');
        }
    }

    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|parsed| parse_plan_json(&parsed))
}

/// Parse a plan from a JSON value.
///
/// Expected schema:
/// ```json
/// {
///   "goal": "string (optional)",
///   "rationale": "string (optional)",
///   "steps": [
///     { "description": "string", "tool": "string", "args": { ... } }
///   ]
/// }
/// ```
///
/// A bare array of steps is accepted too. Steps without a tool name are
/// dropped since every step must bind to a tool call.
pub fn parse_plan_json(json: &Value) -> Option<PlanDraft> {
    let (goal, rationale, steps_json) = match json {
        Value::Array(steps) => (None, None, steps),
        Value::Object(map) => (
            map.get("goal").and_then(non_empty_str),
            map.get("rationale").and_then(non_empty_str),
            map.get("steps").and_then(|v| v.as_array())?,
        ),
        _ => return None,
    };

    let steps: Vec<StepDraft> = steps_json.iter().filter_map(parse_step).collect();
    if steps.is_empty() {
        return None;
    }

    Some(PlanDraft {
        goal,
        rationale,
        steps,
    })
}

fn parse_step(step: &Value) -> Option<StepDraft> {
    let tool = step.get("tool").and_then(non_empty_str)?;
    let description = step
        .get("description")
        .and_then(non_empty_str)
        .unwrap_or_else(|| format!("Run {}", tool));

    let mut draft = StepDraft::new(description, tool);
    if let Some(args) = step.get("args").and_then(|v| v.as_object()) {
        for (key, value) in args {
            draft = draft.with_arg(key, value.clone());
        }
    }
    Some(draft)
}

fn non_empty_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() && s != "null" => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_fenced_plan() {
        let text = r#"
Here is the plan:

```plan
{
  "goal": "Rename foo",
  "rationale": "foo is misleading",
  "steps": [
    {"description": "Look first", "tool": "read_file", "args": {"path": "a.py"}},
    {"description": "Patch", "tool": "apply_patch",
     "args": {"path": "a.py", "find": "foo", "replace": "bar"}}
  ]
}
```
"#;
        let draft = parse_plan(text).unwrap();
        assert_eq!(draft.goal.as_deref(), Some("Rename foo"));
        assert_eq!(draft.steps.len(), 2);
        assert_eq!(draft.steps[1].tool_name, "apply_patch");
        assert_eq!(draft.steps[1].arguments["find"], json!("foo"));
    }

    #[test]
    fn test_parse_bare_array() {
        let draft = parse_plan(r#"[{"tool": "run_tests"}]"#).unwrap();
        assert_eq!(draft.steps[0].description, "Run run_tests");
        assert!(draft.goal.is_none());
    }

    #[test]
    fn test_steps_without_tool_are_dropped() {
        let draft = parse_plan_json(&json!({
            "steps": [
                {"description": "think hard"},
                {"description": "read", "tool": "read_file", "args": {"path": "x"}}
            ]
        }))
        .unwrap();
        assert_eq!(draft.steps.len(), 1);
    }

    #[test]
    fn test_no_plan_returns_none() {
        assert!(parse_plan("I will now edit the file.").is_none());
        assert!(parse_plan_json(&json!({"steps": []})).is_none());
        assert!(parse_plan_json(&json!({"goal": "x"})).is_none());
    }
}
