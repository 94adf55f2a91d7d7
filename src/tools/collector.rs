//! Tool result collection
//!
//! A bus subscriber that correlates dispatched tool calls with their
//! outcomes. Drivers that need a turn's tool results in dispatch order
//! subscribe one of these alongside the history engine.

use std::collections::{HashMap, VecDeque};

use tracing::warn;

use crate::llm::bus::EventSubscriber;
use crate::llm::event::{Event, EventKind, EventPayload};
use crate::llm::tool_call::{ToolCall, ToolCallOutcome};

const SUBSCRIBED_EVENTS: [EventKind; 3] = [
    EventKind::ToolDispatched,
    EventKind::ToolResult,
    EventKind::ToolError,
];

/// Accumulates tool call outcomes until drained or reset
#[derive(Default)]
pub struct ToolResultCollector {
    /// Dispatched calls in publish order
    pending: VecDeque<ToolCall>,
    /// Outcomes keyed by tool_call_id
    outcomes: HashMap<String, ToolCallOutcome>,
}

impl ToolResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatched calls still waiting for an outcome
    pub fn pending_count(&self) -> usize {
        self.pending
            .iter()
            .filter(|call| !self.outcomes.contains_key(&call.tool_call_id))
            .count()
    }

    /// Dispatched calls whose outcome has arrived
    pub fn settled_count(&self) -> usize {
        self.pending.len() - self.pending_count()
    }

    /// Whether every dispatched call has an outcome
    pub fn is_settled(&self) -> bool {
        self.pending_count() == 0
    }

    /// Take the settled outcomes, in dispatch order
    ///
    /// Calls still waiting for an outcome stay pending.
    pub fn drain(&mut self) -> Vec<ToolCallOutcome> {
        let mut drained = Vec::new();
        let mut remaining = VecDeque::new();
        for call in self.pending.drain(..) {
            match self.outcomes.remove(&call.tool_call_id) {
                Some(outcome) => drained.push(outcome),
                None => remaining.push_back(call),
            }
        }
        self.pending = remaining;
        drained
    }

    /// Drop all pending calls and buffered outcomes
    pub fn reset(&mut self) {
        self.pending.clear();
        self.outcomes.clear();
    }
}

impl EventSubscriber for ToolResultCollector {
    fn subscribed_events(&self) -> &[EventKind] {
        &SUBSCRIBED_EVENTS
    }

    fn on_event(&mut self, event: &Event) -> anyhow::Result<()> {
        match &event.payload {
            EventPayload::ToolDispatched(call) => {
                self.pending.push_back(call.clone());
            }
            EventPayload::ToolResult(outcome) | EventPayload::ToolError(outcome) => {
                if !self
                    .pending
                    .iter()
                    .any(|call| call.tool_call_id == outcome.tool_call_id)
                {
                    warn!(
                        "outcome for {} arrived without a matching dispatch",
                        outcome.tool_call_id
                    );
                }
                self.outcomes
                    .insert(outcome.tool_call_id.clone(), outcome.clone());
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::Provider;
    use serde_json::{json, Map};

    fn call(id: &str) -> ToolCall {
        let mut args = Map::new();
        args.insert("q".to_string(), json!("x"));
        ToolCall::new(id, "lookup", args)
    }

    fn dispatch(collector: &mut ToolResultCollector, call: &ToolCall) {
        collector
            .on_event(&Event::new(
                Provider::Openai,
                EventPayload::ToolDispatched(call.clone()),
            ))
            .unwrap();
    }

    fn settle(collector: &mut ToolResultCollector, outcome: ToolCallOutcome) {
        collector
            .on_event(&Event::new(
                Provider::Openai,
                EventPayload::ToolResult(outcome),
            ))
            .unwrap();
    }

    #[test]
    fn test_outcomes_drain_in_dispatch_order() {
        let mut collector = ToolResultCollector::new();
        let first = call("t1");
        let second = call("t2");
        dispatch(&mut collector, &first);
        dispatch(&mut collector, &second);

        // Outcomes arrive out of order
        settle(&mut collector, ToolCallOutcome::success(&second, json!("b")));
        settle(&mut collector, ToolCallOutcome::success(&first, json!("a")));

        assert!(collector.is_settled());
        let outcomes = collector.drain();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].tool_call_id, "t1");
        assert_eq!(outcomes[1].tool_call_id, "t2");
    }

    #[test]
    fn test_unsettled_calls_stay_pending() {
        let mut collector = ToolResultCollector::new();
        let first = call("t1");
        let second = call("t2");
        dispatch(&mut collector, &first);
        dispatch(&mut collector, &second);
        settle(&mut collector, ToolCallOutcome::success(&first, json!("a")));

        assert_eq!(collector.settled_count(), 1);
        assert_eq!(collector.drain().len(), 1);
        assert_eq!(collector.pending_count(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut collector = ToolResultCollector::new();
        let first = call("t1");
        dispatch(&mut collector, &first);
        settle(&mut collector, ToolCallOutcome::success(&first, json!("a")));

        collector.reset();
        assert_eq!(collector.pending_count(), 0);
        assert!(collector.drain().is_empty());
    }
}
