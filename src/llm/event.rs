//! Stream and tool lifecycle events
//!
//! The closed set of events the conversation engine consumes. Backend
//! drivers publish content/finish events while streaming a response; the
//! tool executor publishes the tool lifecycle events. Every event carries
//! the provider tag of the backend it originated from.

use serde::{Deserialize, Serialize};

use crate::llm::provider::Provider;
use crate::llm::tool_call::{ToolCall, ToolCallOutcome};

/// Event kind discriminant, used for subscription interest sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Partial assistant text from a streaming response
    Content,
    /// The streaming response finished
    Finish,
    /// A tool call was handed to the tool service
    ToolDispatched,
    /// A tool call completed successfully
    ToolResult,
    /// A tool call failed or faulted
    ToolError,
}

/// Event payload, one variant per kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Content { text: String },
    Finish,
    ToolDispatched(ToolCall),
    ToolResult(ToolCallOutcome),
    ToolError(ToolCallOutcome),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Content { .. } => EventKind::Content,
            EventPayload::Finish => EventKind::Finish,
            EventPayload::ToolDispatched(_) => EventKind::ToolDispatched,
            EventPayload::ToolResult(_) => EventKind::ToolResult,
            EventPayload::ToolError(_) => EventKind::ToolError,
        }
    }
}

/// An event on the conversation bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Provider the event originated from
    pub provider: Provider,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(provider: Provider, payload: EventPayload) -> Self {
        Self { provider, payload }
    }

    /// Convenience constructor for streamed assistant text
    pub fn content(provider: Provider, text: impl Into<String>) -> Self {
        Self::new(provider, EventPayload::Content { text: text.into() })
    }

    /// Convenience constructor for end-of-stream
    pub fn finish(provider: Provider) -> Self {
        Self::new(provider, EventPayload::Finish)
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let event = Event::content(Provider::Openai, "hi");
        assert_eq!(event.kind(), EventKind::Content);

        let event = Event::finish(Provider::Ollama);
        assert_eq!(event.kind(), EventKind::Finish);
    }
}
