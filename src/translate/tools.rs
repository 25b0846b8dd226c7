//! Tool definition and tool call conversion.

use crate::types::tool::{
    FunctionCall, FunctionDefinition, InboundFunctionCall, InboundToolCall, Tool, ToolCall,
};
use crate::utils::tool_call_assembler::parse_arguments;
use serde_json::{Map, Value};
use tracing::warn;

/// Fixed id given to a legacy single `function_call` result.
pub const LEGACY_CALL_ID: &str = "call_legacy";

/// Normalizes raw tool entries into upstream tool specs.
///
/// Accepts `{"type":"function","function":{...}}` and bare
/// `{"name":..,"description":..,"parameters":..}` definitions. Entries that are
/// not objects are dropped; an object without a usable function becomes a tool
/// with an empty name.
pub fn normalize_tools(raw: &[Value]) -> Vec<Tool> {
    raw.iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let Value::Object(obj) = entry else {
                warn!(index = i, "dropping tool definition that is not an object");
                return None;
            };
            let def = match obj.get("function") {
                Some(Value::Object(func)) => function_definition(func),
                Some(_) => FunctionDefinition::default(),
                None if obj.contains_key("name") => function_definition(obj),
                None => {
                    warn!(index = i, "tool definition has no function");
                    FunctionDefinition::default()
                }
            };
            Some(Tool::function(def))
        })
        .collect()
}

fn function_definition(obj: &Map<String, Value>) -> FunctionDefinition {
    FunctionDefinition {
        name: obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        parameters: obj.get("parameters").filter(|p| !p.is_null()).cloned(),
    }
}

/// Ollama tool calls on an assistant message → upstream tool calls.
pub fn to_upstream_calls(calls: &[InboundToolCall]) -> Vec<ToolCall> {
    calls
        .iter()
        .enumerate()
        .map(|(i, call)| ToolCall {
            id: call
                .id
                .clone()
                .unwrap_or_else(|| format!("call_{}", i)),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: call.function.name.clone(),
                arguments: match &call.function.arguments {
                    Value::String(s) => s.clone(),
                    Value::Null => "{}".to_string(),
                    other => other.to_string(),
                },
            },
        })
        .collect()
}

/// Upstream tool calls (or a legacy `function_call`) → Ollama tool calls.
pub fn to_inbound_calls(
    tool_calls: Option<&[ToolCall]>,
    function_call: Option<&FunctionCall>,
) -> Vec<InboundToolCall> {
    if let Some(calls) = tool_calls.filter(|c| !c.is_empty()) {
        return calls
            .iter()
            .map(|c| InboundToolCall {
                id: Some(c.id.clone()).filter(|id| !id.is_empty()),
                function: InboundFunctionCall {
                    name: c.function.name.clone(),
                    arguments: parse_arguments(&c.function.arguments),
                },
            })
            .collect();
    }
    match function_call {
        Some(fc) => vec![InboundToolCall {
            id: Some(LEGACY_CALL_ID.to_string()),
            function: InboundFunctionCall {
                name: fc.name.clone(),
                arguments: parse_arguments(&fc.arguments),
            },
        }],
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_and_bare_definitions() {
        let tools = normalize_tools(&[
            json!({
                "type": "function",
                "function": {
                    "name": "get_weather",
                    "description": "Get weather information",
                    "parameters": {"type": "object", "properties": {"location": {"type": "string"}}}
                }
            }),
            json!({"name": "calculate", "description": "Perform calculation"}),
        ]);
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].tool_type, "function");
        assert_eq!(tools[0].function.name, "get_weather");
        assert!(tools[0].function.parameters.as_ref().unwrap()["properties"]
            .get("location")
            .is_some());
        assert_eq!(tools[1].function.name, "calculate");
        assert_eq!(tools[1].function.description.as_deref(), Some("Perform calculation"));
    }

    #[test]
    fn test_malformed_tools() {
        let tools = normalize_tools(&[json!("not a dict"), json!({"type": "function"})]);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].function.name, "");
        assert!(normalize_tools(&[]).is_empty());
    }

    #[test]
    fn test_upstream_calls_to_inbound() {
        let calls = vec![ToolCall {
            id: "call_123".into(),
            call_type: "function".into(),
            function: FunctionCall {
                name: "get_weather".into(),
                arguments: r#"{"location": "New York"}"#.into(),
            },
        }];
        let inbound = to_inbound_calls(Some(&calls), None);
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].id.as_deref(), Some("call_123"));
        assert_eq!(inbound[0].function.arguments, json!({"location": "New York"}));
    }

    #[test]
    fn test_legacy_function_call() {
        let fc = FunctionCall {
            name: "get_weather".into(),
            arguments: r#"{"location": "Boston"}"#.into(),
        };
        let inbound = to_inbound_calls(None, Some(&fc));
        assert_eq!(inbound[0].id.as_deref(), Some(LEGACY_CALL_ID));
        assert_eq!(inbound[0].function.name, "get_weather");
    }

    #[test]
    fn test_inbound_arguments_are_serialized() {
        let calls = to_upstream_calls(&[InboundToolCall {
            id: None,
            function: InboundFunctionCall {
                name: "add".into(),
                arguments: json!({"a": 1}),
            },
        }]);
        assert_eq!(calls[0].id, "call_0");
        assert_eq!(calls[0].function.arguments, r#"{"a":1}"#);
    }
}
