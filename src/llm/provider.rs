//! LLM provider identities and wire-shape adapters
//!
//! Supports multiple LLM providers:
//! - OpenAI-compatible API
//! - Ollama (local models)
//!
//! Each provider gets a stateless adapter that re-encodes canonical tool
//! call and tool result entries into that backend's message shape. The
//! adapters are pure; callers surface translation failures rather than
//! retry them.

use serde_json::{json, Value};

use crate::error::{ParleyError, Result};
use crate::llm::tool_call::{ToolCall, ToolCallOutcome};

/// LLM provider identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// OpenAI-compatible API (works with OpenAI, LM Studio, OpenRouter)
    #[default]
    Openai,
    /// Ollama (local models)
    Ollama,
}

impl std::str::FromStr for Provider {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" | "openai-compatible" | "gpt" => Ok(Provider::Openai),
            "ollama" | "local" => Ok(Provider::Ollama),
            _ => Err(ParleyError::UnknownProvider(s.to_string())),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Openai => write!(f, "openai"),
            Provider::Ollama => write!(f, "ollama"),
        }
    }
}

impl Provider {
    /// Look up the wire-shape adapter for this provider
    ///
    /// Adapters are stateless statics; sharing them across threads and
    /// conversations is safe.
    pub fn adapter(&self) -> &'static dyn ProviderAdapter {
        match self {
            Provider::Openai => &OpenAiAdapter,
            Provider::Ollama => &OllamaAdapter,
        }
    }
}

/// Translation capability between canonical entries and a backend's wire shape
pub trait ProviderAdapter: Send + Sync {
    /// Re-encode a tool call the way this backend expects it inside an
    /// assistant message's `tool_calls` array
    fn wire_tool_call(&self, call: &ToolCall) -> Result<Value>;

    /// Re-encode a tool outcome as the fields of a `role: tool` message
    fn wire_tool_result(&self, outcome: &ToolCallOutcome) -> Result<Value>;
}

/// Adapter for the OpenAI-compatible chat completions API
pub struct OpenAiAdapter;

impl ProviderAdapter for OpenAiAdapter {
    fn wire_tool_call(&self, call: &ToolCall) -> Result<Value> {
        // OpenAI carries function arguments as a JSON-encoded string
        let arguments =
            serde_json::to_string(&call.arguments).map_err(|e| ParleyError::Translation {
                provider: Provider::Openai.to_string(),
                reason: e.to_string(),
            })?;
        Ok(json!({
            "type": "function",
            "id": call.tool_call_id,
            "function": {
                "name": call.function_name,
                "arguments": arguments,
            }
        }))
    }

    fn wire_tool_result(&self, outcome: &ToolCallOutcome) -> Result<Value> {
        Ok(json!({
            "tool_call_id": outcome.tool_call_id,
            "content": render_result(outcome),
        }))
    }
}

/// Adapter for the Ollama chat API
pub struct OllamaAdapter;

impl ProviderAdapter for OllamaAdapter {
    fn wire_tool_call(&self, call: &ToolCall) -> Result<Value> {
        // Ollama takes the argument mapping as structured JSON
        Ok(json!({
            "type": "function",
            "id": call.tool_call_id,
            "function": {
                "name": call.function_name,
                "arguments": call.arguments,
            }
        }))
    }

    fn wire_tool_result(&self, outcome: &ToolCallOutcome) -> Result<Value> {
        Ok(json!({
            "tool_call_id": outcome.tool_call_id,
            "content": render_result(outcome),
        }))
    }
}

/// Flatten a tool outcome into the text backends expect in a tool message
///
/// Prefers the response's content list, falls back to the raw result, and
/// finally to the error string for outcomes with no result at all.
fn render_result(outcome: &ToolCallOutcome) -> String {
    if let Some(result) = &outcome.result {
        if let Some(items) = result.get("content").and_then(Value::as_array) {
            return items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| item.to_string())
                })
                .collect::<Vec<_>>()
                .join("\n");
        }
        if let Some(text) = result.as_str() {
            return text.to_string();
        }
        return result.to_string();
    }
    outcome.error.clone().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn sample_call() -> ToolCall {
        let mut args = Map::new();
        args.insert("city".to_string(), json!("Reykjavik"));
        ToolCall::new("call_1", "weather", args)
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::Openai);
        assert_eq!("Ollama".parse::<Provider>().unwrap(), Provider::Ollama);
        assert!(matches!(
            "grok".parse::<Provider>(),
            Err(ParleyError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_openai_stringifies_arguments() {
        let wire = Provider::Openai.adapter().wire_tool_call(&sample_call()).unwrap();
        assert_eq!(wire["id"], "call_1");
        assert_eq!(wire["function"]["name"], "weather");
        let arguments = wire["function"]["arguments"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(arguments).unwrap();
        assert_eq!(parsed["city"], "Reykjavik");
    }

    #[test]
    fn test_ollama_keeps_structured_arguments() {
        let wire = Provider::Ollama.adapter().wire_tool_call(&sample_call()).unwrap();
        assert_eq!(wire["function"]["arguments"]["city"], "Reykjavik");
    }

    #[test]
    fn test_result_rendering_prefers_content_list() {
        let outcome = ToolCallOutcome::success(
            &sample_call(),
            json!({"content": ["line one", "line two"], "is_error": false}),
        );
        let wire = Provider::Openai.adapter().wire_tool_result(&outcome).unwrap();
        assert_eq!(wire["content"], "line one\nline two");
        assert_eq!(wire["tool_call_id"], "call_1");
    }

    #[test]
    fn test_result_rendering_falls_back_to_error() {
        let outcome = ToolCallOutcome::failure(&sample_call(), None, "timeout");
        let wire = Provider::Ollama.adapter().wire_tool_result(&outcome).unwrap();
        assert_eq!(wire["content"], "timeout");
    }

    #[test]
    fn test_adapters_are_deterministic() {
        let call = sample_call();
        let a = Provider::Openai.adapter().wire_tool_call(&call).unwrap();
        let b = Provider::Openai.adapter().wire_tool_call(&call).unwrap();
        assert_eq!(a, b);
    }
}
