use crate::types::tool::{InboundFunctionCall, InboundToolCall, ToolCallDelta};
use serde_json::Value;

#[derive(Debug, Default)]
struct Partial {
    index: usize,
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Collects streamed tool call fragments (keyed by their `index`) into final calls.
/// This is intentionally tolerant: if the arguments are not valid JSON, the raw
/// string is kept.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    partials: Vec<Partial>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    pub fn on_delta(&mut self, delta: &ToolCallDelta) {
        let pos = match self.partials.iter().position(|p| p.index == delta.index) {
            Some(pos) => pos,
            None => {
                self.partials.push(Partial {
                    index: delta.index,
                    ..Default::default()
                });
                self.partials.len() - 1
            }
        };
        let partial = &mut self.partials[pos];

        if let Some(id) = delta.id.as_deref().filter(|id| !id.is_empty()) {
            partial.id.get_or_insert_with(|| id.to_string());
        }
        if let Some(func) = &delta.function {
            if let Some(name) = &func.name {
                partial.name.push_str(name);
            }
            if let Some(fragment) = &func.arguments {
                partial.arguments.push_str(fragment);
            }
        }
    }

    /// Completed calls in index order.
    pub fn finalize(mut self) -> Vec<InboundToolCall> {
        self.partials.sort_by_key(|p| p.index);
        self.partials
            .into_iter()
            .map(|p| InboundToolCall {
                id: p.id,
                function: InboundFunctionCall {
                    name: p.name,
                    arguments: parse_arguments(&p.arguments),
                },
            })
            .collect()
    }
}

/// Parses a JSON-encoded argument string, keeping it as a string if it is not JSON.
pub fn parse_arguments(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str::<Value>(trimmed).unwrap_or_else(|_| Value::String(raw.to_string()))
}
