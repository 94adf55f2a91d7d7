//! Tool execution management with event publishing
//!
//! Turns a parsed tool call into dispatched/result/error events on the
//! conversation bus. The iteration counter and sequence clock recorded
//! here are read-only inputs to the caller's bounded-loop policy; limits
//! live in `ToolCallingConfig` and are enforced outside this module.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error};

use crate::llm::bus::EventBus;
use crate::llm::event::{Event, EventPayload};
use crate::llm::provider::Provider;
use crate::llm::tool_call::{ToolCall, ToolCallOutcome};
use crate::tools::{ToolResponse, ToolService};

/// Drives tool invocations and publishes their lifecycle events
pub struct ToolExecutor {
    bus: Arc<EventBus>,
    service: Arc<dyn ToolService>,
    /// Provider tag stamped on published events
    provider: Mutex<Provider>,
    /// Tool call iterations in the current sequence
    iteration: AtomicUsize,
    /// When the current sequence started
    sequence_start: Mutex<Option<Instant>>,
    /// The user query that started the current sequence
    root_query: Mutex<Option<String>>,
}

impl ToolExecutor {
    pub fn new(bus: Arc<EventBus>, service: Arc<dyn ToolService>, provider: Provider) -> Self {
        Self {
            bus,
            service,
            provider: Mutex::new(provider),
            iteration: AtomicUsize::new(0),
            sequence_start: Mutex::new(None),
            root_query: Mutex::new(None),
        }
    }

    /// Update the provider tag stamped on published events
    pub fn set_provider(&self, provider: Provider) {
        *self.provider.lock() = provider;
    }

    /// Reset sequence state for a new top-level user query
    ///
    /// Called once per user turn, before any tool calls in that turn's
    /// reasoning chain.
    pub fn reset_for_new_query(&self, query: &str) {
        self.iteration.store(0, Ordering::SeqCst);
        *self.sequence_start.lock() = Some(Instant::now());
        *self.root_query.lock() = Some(query.to_string());
    }

    /// Tool call iterations in the current sequence
    pub fn iteration(&self) -> usize {
        self.iteration.load(Ordering::SeqCst)
    }

    /// Time elapsed since the current sequence started
    pub fn elapsed(&self) -> Option<Duration> {
        let start = *self.sequence_start.lock();
        start.map(|s| s.elapsed())
    }

    /// The query that started the current sequence
    pub fn root_query(&self) -> Option<String> {
        self.root_query.lock().clone()
    }

    /// Execute a tool and publish its outcome
    ///
    /// Every failure path resolves into a tool-error event carrying the
    /// original call identity; nothing propagates to the caller.
    pub async fn execute_tool(&self, call: ToolCall) {
        debug!(
            "executing tool call {} ({})",
            call.tool_call_id, call.function_name
        );

        self.iteration.fetch_add(1, Ordering::SeqCst);
        let provider = *self.provider.lock();

        self.bus.publish(Event::new(
            provider,
            EventPayload::ToolDispatched(call.clone()),
        ));

        match self
            .service
            .call_tool(&call.function_name, &call.arguments)
            .await
        {
            Ok(response) if !response.is_error => {
                let result = serde_json::to_value(&response).unwrap_or(Value::Null);
                let outcome = ToolCallOutcome::success(&call, result);
                self.bus
                    .publish(Event::new(provider, EventPayload::ToolResult(outcome)));
            }
            Ok(response) => {
                // The service answered but flagged the call as failed;
                // its response still goes into the outcome.
                let result = serde_json::to_value(&response).unwrap_or(Value::Null);
                let outcome = ToolCallOutcome::failure(
                    &call,
                    Some(result),
                    "tool execution failed or returned no valid response",
                );
                self.bus
                    .publish(Event::new(provider, EventPayload::ToolError(outcome)));
            }
            Err(e) => {
                error!("error executing tool {}: {:#}", call.function_name, e);
                let description = format!("{:#}", e);
                let synthesized = ToolResponse {
                    content: vec![description.clone()],
                    is_error: true,
                };
                let result = serde_json::to_value(&synthesized).unwrap_or(Value::Null);
                let outcome = ToolCallOutcome::failure(&call, Some(result), description);
                self.bus
                    .publish(Event::new(provider, EventPayload::ToolError(outcome)));
            }
        }
    }

    /// Schedule a tool execution without waiting for completion
    ///
    /// For callers whose control flow cannot suspend; the outcome still
    /// arrives as a bus event.
    pub fn spawn_execute(self: Arc<Self>, call: ToolCall) {
        tokio::spawn(async move {
            self.execute_tool(call).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::bus::shared;
    use crate::llm::history::{HistoryEntry, MessageHistory};
    use crate::tools::ToolResultCollector;
    use async_trait::async_trait;
    use serde_json::{json, Map};

    struct FixedService {
        response: ToolResponse,
    }

    #[async_trait]
    impl ToolService for FixedService {
        async fn call_tool(
            &self,
            _name: &str,
            _arguments: &Map<String, Value>,
        ) -> anyhow::Result<ToolResponse> {
            Ok(self.response.clone())
        }
    }

    struct FaultingService;

    #[async_trait]
    impl ToolService for FaultingService {
        async fn call_tool(
            &self,
            _name: &str,
            _arguments: &Map<String, Value>,
        ) -> anyhow::Result<ToolResponse> {
            anyhow::bail!("timeout")
        }
    }

    fn sample_call() -> ToolCall {
        let mut args = Map::new();
        args.insert("q".to_string(), json!("x"));
        ToolCall::new("t1", "lookup", args)
    }

    fn wired(
        service: Arc<dyn ToolService>,
    ) -> (
        Arc<EventBus>,
        Arc<Mutex<MessageHistory>>,
        Arc<Mutex<ToolResultCollector>>,
        ToolExecutor,
    ) {
        let bus = Arc::new(EventBus::new());
        let history = shared(MessageHistory::new(Provider::Openai));
        let collector = shared(ToolResultCollector::new());
        bus.subscribe(history.clone());
        bus.subscribe(collector.clone());
        let executor = ToolExecutor::new(bus.clone(), service, Provider::Openai);
        (bus, history, collector, executor)
    }

    #[tokio::test]
    async fn test_successful_execution() {
        let service = Arc::new(FixedService {
            response: ToolResponse {
                content: vec!["found it".to_string()],
                is_error: false,
            },
        });
        let (_bus, history, collector, executor) = wired(service);

        executor.execute_tool(sample_call()).await;

        let history = history.lock();
        assert_eq!(history.len(), 2);
        assert!(matches!(&history.canonical_history()[0], HistoryEntry::ToolCall(_)));
        match &history.canonical_history()[1] {
            HistoryEntry::ToolResult(outcome) => {
                assert!(outcome.error.is_none());
                assert!(outcome.result.is_some());
            }
            other => panic!("expected tool result, got {:?}", other),
        }

        let outcomes = collector.lock().drain();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].is_error());
    }

    #[tokio::test]
    async fn test_service_reported_failure() {
        let service = Arc::new(FixedService {
            response: ToolResponse {
                content: vec!["partial output".to_string()],
                is_error: true,
            },
        });
        let (_bus, history, _collector, executor) = wired(service);

        executor.execute_tool(sample_call()).await;

        let history = history.lock();
        match &history.canonical_history()[1] {
            HistoryEntry::ToolResult(outcome) => {
                assert!(outcome.error.is_some());
                assert_eq!(outcome.result.as_ref().unwrap()["content"][0], "partial output");
            }
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invocation_fault_becomes_error_outcome() {
        let (_bus, history, _collector, executor) = wired(Arc::new(FaultingService));

        executor.execute_tool(sample_call()).await;

        let history = history.lock();
        assert_eq!(history.len(), 2);
        match &history.canonical_history()[1] {
            HistoryEntry::ToolResult(outcome) => {
                assert_eq!(outcome.tool_call_id, "t1");
                assert_eq!(outcome.error.as_deref(), Some("timeout"));
                // The fault description doubles as the textual result
                assert_eq!(outcome.result.as_ref().unwrap()["content"][0], "timeout");
            }
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_every_outcome_has_result_or_error() {
        for service in [
            Arc::new(FixedService {
                response: ToolResponse {
                    content: vec!["ok".to_string()],
                    is_error: false,
                },
            }) as Arc<dyn ToolService>,
            Arc::new(FixedService {
                response: ToolResponse {
                    content: vec![],
                    is_error: true,
                },
            }),
            Arc::new(FaultingService),
        ] {
            let (_bus, _history, collector, executor) = wired(service);
            executor.execute_tool(sample_call()).await;
            for outcome in collector.lock().drain() {
                assert!(outcome.result.is_some() || outcome.error.is_some());
            }
        }
    }

    #[tokio::test]
    async fn test_sequence_counters() {
        let service = Arc::new(FixedService {
            response: ToolResponse {
                content: vec![],
                is_error: false,
            },
        });
        let (_bus, _history, _collector, executor) = wired(service);

        executor.reset_for_new_query("what is the weather?");
        assert_eq!(executor.iteration(), 0);
        assert_eq!(
            executor.root_query().as_deref(),
            Some("what is the weather?")
        );

        executor.execute_tool(sample_call()).await;
        executor.execute_tool(sample_call()).await;
        assert_eq!(executor.iteration(), 2);
        assert!(executor.elapsed().is_some());

        executor.reset_for_new_query("next question");
        assert_eq!(executor.iteration(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_spawn_execute_is_fire_and_forget() {
        let service = Arc::new(FixedService {
            response: ToolResponse {
                content: vec!["async".to_string()],
                is_error: false,
            },
        });
        let (_bus, _history, collector, executor) = wired(service);
        let executor = Arc::new(executor);

        executor.clone().spawn_execute(sample_call());

        for _ in 0..100 {
            if collector.lock().settled_count() == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("spawned execution never settled");
    }
}
