//! Tool domain traits
//!
//! Contains pure domain logic traits for tool validation.
//! The async tool body port is defined in the application layer (ports).

use super::entities::ToolDefinition;
use serde_json::Value;
use std::collections::HashMap;

/// Validator for tool call arguments
///
/// Pure check against the definition, no I/O. Runs before any approval is
/// requested so that operators are never asked to approve a malformed call.
pub trait ToolValidator: Send + Sync {
    fn validate(
        &self,
        arguments: &HashMap<String, Value>,
        definition: &ToolDefinition,
    ) -> Result<(), String>;
}

/// Default implementation of ToolValidator
#[derive(Debug, Clone, Default)]
pub struct DefaultToolValidator;

impl ToolValidator for DefaultToolValidator {
    fn validate(
        &self,
        arguments: &HashMap<String, Value>,
        definition: &ToolDefinition,
    ) -> Result<(), String> {
        for param in &definition.parameters {
            match arguments.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(format!(
                        "Missing required parameter '{}' for tool '{}'",
                        param.name, definition.name
                    ));
                }
                Some(value) if !value.is_null() && !param.param_type.accepts(value) => {
                    return Err(format!(
                        "Parameter '{}' for tool '{}' must be {}",
                        param.name,
                        definition.name,
                        param.param_type.as_str()
                    ));
                }
                _ => {}
            }
        }

        if let Some(unknown) = arguments
            .keys()
            .find(|name| definition.parameter(name).is_none())
        {
            return Err(format!(
                "Unknown parameter '{}' for tool '{}'",
                unknown, definition.name
            ));
        }

        Ok(())
    }
}
