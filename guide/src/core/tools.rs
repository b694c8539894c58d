//! Tool catalogue offered to the models, and argument checking for tool calls.

use std::fmt;

use jsonschema::Draft;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Tools the models may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    Search,
    GetDomSnapshot,
    Highlight,
    Pulse,
    Scroll,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::Search,
        ToolName::GetDomSnapshot,
        ToolName::Highlight,
        ToolName::Pulse,
        ToolName::Scroll,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == raw)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::Search => "search",
            ToolName::GetDomSnapshot => "get_dom_snapshot",
            ToolName::Highlight => "highlight",
            ToolName::Pulse => "pulse",
            ToolName::Scroll => "scroll",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolName::Search => "Search the web for official or recent instructions/context",
            ToolName::GetDomSnapshot => {
                "Return the current filtered snapshot of clickable elements (at most 50)"
            }
            ToolName::Highlight => "Highlight an element by ID with a short message",
            ToolName::Pulse => "Pulse a visual indicator at the target element by ID",
            ToolName::Scroll => {
                "Scroll the page up/down to bring an element into view or move the viewport"
            }
        }
    }

    /// JSON Schema (Draft 2020-12) for the tool's arguments.
    pub fn schema(self) -> Value {
        match self {
            ToolName::Search => json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "minLength": 3, "maxLength": 400},
                    "time_range": {
                        "type": "string",
                        "enum": ["day", "week", "month", "year", "none"],
                        "default": "year"
                    },
                    "max_results": {"type": "integer", "minimum": 1, "maximum": 3, "default": 1},
                    "chunks_per_source": {"type": "integer", "minimum": 1, "maximum": 3, "default": 3}
                },
                "required": ["query"]
            }),
            ToolName::GetDomSnapshot => json!({"type": "object", "properties": {}}),
            ToolName::Highlight => json!({
                "type": "object",
                "properties": {
                    "targetId": {"type": "string", "minLength": 2},
                    "message": {"type": "string", "maxLength": 120}
                },
                "required": ["targetId"]
            }),
            ToolName::Pulse => json!({
                "type": "object",
                "properties": {
                    "targetId": {"type": "string", "minLength": 2}
                },
                "required": ["targetId"]
            }),
            ToolName::Scroll => json!({
                "type": "object",
                "properties": {
                    "direction": {"type": "string", "enum": ["up", "down", "toElement"]},
                    "targetId": {"type": "string", "minLength": 2}
                },
                "required": ["direction"]
            }),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Function declaration handed to the model with every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Declarations for every tool, in catalogue order.
pub fn function_declarations() -> Vec<FunctionDeclaration> {
    ToolName::ALL
        .into_iter()
        .map(|tool| FunctionDeclaration {
            name: tool.as_str().to_string(),
            description: tool.description().to_string(),
            parameters: tool.schema(),
        })
        .collect()
}

/// Why a tool call's arguments were rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolArgsError {
    #[error("tool {tool} received invalid JSON args: {reason}")]
    Malformed { tool: String, reason: String },
    #[error("tool {tool} args must be an object")]
    NotAnObject { tool: String },
    #[error("tool {tool} args violate schema:\n- {}", .violations.join("\n- "))]
    Schema {
        tool: String,
        violations: Vec<String>,
    },
}

impl ToolArgsError {
    /// Name of the tool whose arguments were rejected.
    pub fn tool(&self) -> &str {
        match self {
            ToolArgsError::Malformed { tool, .. }
            | ToolArgsError::NotAnObject { tool }
            | ToolArgsError::Schema { tool, .. } => tool,
        }
    }
}

/// Normalize raw call arguments into a JSON object.
///
/// Strings are parsed as JSON, `null` becomes `{}`, objects pass through.
pub fn parse_tool_args(tool: &str, raw: &Value) -> Result<Value, ToolArgsError> {
    let parsed = match raw {
        Value::Null => return Ok(Value::Object(Default::default())),
        Value::String(text) if text.trim().is_empty() => {
            return Ok(Value::Object(Default::default()));
        }
        Value::String(text) => {
            serde_json::from_str(text).map_err(|err| ToolArgsError::Malformed {
                tool: tool.to_string(),
                reason: err.to_string(),
            })?
        }
        other => other.clone(),
    };
    if !parsed.is_object() {
        return Err(ToolArgsError::NotAnObject {
            tool: tool.to_string(),
        });
    }
    Ok(parsed)
}

/// Validate parsed arguments against the tool's schema.
pub fn validate_tool_args(tool: ToolName, args: &Value) -> Result<(), ToolArgsError> {
    let schema = tool.schema();
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|err| ToolArgsError::Schema {
            tool: tool.to_string(),
            violations: vec![format!("compile schema: {err}")],
        })?;
    let violations: Vec<String> = compiled
        .iter_errors(args)
        .map(|err| err.to_string())
        .collect();
    if !violations.is_empty() {
        return Err(ToolArgsError::Schema {
            tool: tool.to_string(),
            violations,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_parse_back() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::parse(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolName::parse("click"), None);
    }

    #[test]
    fn declarations_cover_catalogue() {
        let declarations = function_declarations();
        assert_eq!(declarations.len(), 5);
        assert_eq!(declarations[0].name, "search");
        assert_eq!(declarations[0].parameters["required"], json!(["query"]));
    }

    #[test]
    fn string_args_are_parsed() {
        let args = parse_tool_args("search", &json!("{\"query\": \"rust\"}")).expect("parse");
        assert_eq!(args, json!({"query": "rust"}));
    }

    #[test]
    fn null_and_blank_args_become_empty_object() {
        assert_eq!(
            parse_tool_args("get_dom_snapshot", &Value::Null).expect("parse"),
            json!({})
        );
        assert_eq!(
            parse_tool_args("get_dom_snapshot", &json!("  ")).expect("parse"),
            json!({})
        );
    }

    #[test]
    fn malformed_json_args_are_rejected() {
        let err = parse_tool_args("highlight", &json!("{targetId: ")).unwrap_err();
        assert!(matches!(err, ToolArgsError::Malformed { .. }));
        assert!(err.to_string().contains("invalid JSON args"));
    }

    #[test]
    fn non_object_args_are_rejected() {
        let err = parse_tool_args("scroll", &json!("[1, 2]")).unwrap_err();
        assert_eq!(
            err,
            ToolArgsError::NotAnObject {
                tool: "scroll".to_string()
            }
        );
    }

    #[test]
    fn schema_accepts_valid_args() {
        validate_tool_args(
            ToolName::Search,
            &json!({"query": "how to reset password", "time_range": "month", "max_results": 2}),
        )
        .expect("valid search args");
        validate_tool_args(ToolName::Scroll, &json!({"direction": "toElement", "targetId": "el-7"}))
            .expect("valid scroll args");
    }

    #[test]
    fn schema_rejects_missing_and_out_of_range_args() {
        let err = validate_tool_args(ToolName::Highlight, &json!({"message": "here"})).unwrap_err();
        assert!(matches!(err, ToolArgsError::Schema { .. }));

        let err = validate_tool_args(ToolName::Search, &json!({"query": "rust", "max_results": 9}))
            .unwrap_err();
        let ToolArgsError::Schema { violations, .. } = err else {
            panic!("expected schema error");
        };
        assert_eq!(violations.len(), 1);

        assert!(validate_tool_args(ToolName::Scroll, &json!({"direction": "left"})).is_err());
    }
}
