//! Tool invocation boundary
//!
//! The executor drives one tool call end-to-end against an external
//! `ToolService`, publishing lifecycle events on the conversation bus.
//! The collector is a bus subscriber that correlates dispatches with
//! their outcomes for drivers assembling a turn's tool results.

pub mod collector;
pub mod executor;

pub use collector::ToolResultCollector;
pub use executor::ToolExecutor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw outcome from the external tool service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Text content items produced by the tool
    pub content: Vec<String>,
    /// Whether the service reported a failure
    #[serde(default)]
    pub is_error: bool,
}

/// External tool invocation service
///
/// Implementations own the transport. Invocation-time faults are returned
/// as errors; the executor converts every failure path into a tool-error
/// event rather than letting it propagate.
#[async_trait]
pub trait ToolService: Send + Sync {
    async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> anyhow::Result<ToolResponse>;
}
