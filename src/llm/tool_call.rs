//! Tool call data structures
//!
//! Normalized, provider-agnostic representations of a requested tool
//! invocation and its outcome. The backend-response parser produces
//! `ToolCall`s; the tool executor turns them into `ToolCallOutcome`s.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A parsed tool invocation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque identifier, unique within a tool calling sequence
    pub tool_call_id: String,
    /// Name of the function the model asked for
    pub function_name: String,
    /// Parsed argument mapping
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(
        tool_call_id: impl Into<String>,
        function_name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            function_name: function_name.into(),
            arguments,
        }
    }
}

/// Outcome of a dispatched tool call
///
/// `error` set signals failure. `result` holds best-effort output even on
/// failure; at least one of the two is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallOutcome {
    pub tool_call_id: String,
    pub function_name: String,
    pub arguments: Map<String, Value>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl ToolCallOutcome {
    /// Build a successful outcome for a dispatched call
    pub fn success(call: &ToolCall, result: Value) -> Self {
        Self {
            tool_call_id: call.tool_call_id.clone(),
            function_name: call.function_name.clone(),
            arguments: call.arguments.clone(),
            result: Some(result),
            error: None,
        }
    }

    /// Build a failed outcome, keeping whatever partial result exists
    pub fn failure(call: &ToolCall, result: Option<Value>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.tool_call_id.clone(),
            function_name: call.function_name.clone(),
            arguments: call.arguments.clone(),
            result,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_call() -> ToolCall {
        let mut args = Map::new();
        args.insert("q".to_string(), json!("x"));
        ToolCall::new("t1", "lookup", args)
    }

    #[test]
    fn test_success_outcome() {
        let outcome = ToolCallOutcome::success(&sample_call(), json!({"content": ["ok"]}));
        assert!(!outcome.is_error());
        assert_eq!(outcome.tool_call_id, "t1");
        assert!(outcome.result.is_some());
    }

    #[test]
    fn test_failure_keeps_partial_result() {
        let outcome =
            ToolCallOutcome::failure(&sample_call(), Some(json!({"content": []})), "timeout");
        assert!(outcome.is_error());
        assert_eq!(outcome.error.as_deref(), Some("timeout"));
        assert!(outcome.result.is_some());
    }
}
