//! Event-driven message history
//!
//! Maintains a canonical (provider-agnostic) record of the conversation
//! and a provider-specific projection derived from it. The engine
//! subscribes to the event bus for streamed assistant content and tool
//! lifecycle events; user messages arrive through the direct API since
//! they have no streaming phase.
//!
//! The canonical log is the single source of truth. The projection is
//! always a pure function of (log, active provider) and is regenerated
//! in full on provider switches, truncation, and load.

use std::fs;
use std::mem;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::{ParleyError, Result};
use crate::llm::bus::EventSubscriber;
use crate::llm::chat::Message;
use crate::llm::event::{Event, EventKind, EventPayload};
use crate::llm::provider::Provider;
use crate::llm::tool_call::{ToolCall, ToolCallOutcome};

/// One canonical history record
///
/// Serialized adjacently tagged, `{"type": ..., "data": ...}`, which is
/// also the persisted file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum HistoryEntry {
    User(Message),
    Assistant(Message),
    ToolCall(ToolCall),
    ToolResult(ToolCallOutcome),
}

const SUBSCRIBED_EVENTS: [EventKind; 5] = [
    EventKind::Content,
    EventKind::Finish,
    EventKind::ToolDispatched,
    EventKind::ToolResult,
    EventKind::ToolError,
];

/// Event-driven conversation history engine
///
/// Exactly one instance per conversation. The engine exclusively owns the
/// canonical log, the projection, the content buffer, and the provider
/// cursor; external readers get references or copies.
#[derive(Clone)]
pub struct MessageHistory {
    /// Canonical history storing all turns in normalized form
    canonical: Vec<HistoryEntry>,
    /// Provider-specific projection, regenerated on demand
    projection: Vec<Value>,
    /// Provider the projection is currently shaped for
    provider: Option<Provider>,
    /// Accumulator for a streaming assistant turn
    buffer: String,
    /// Provider used when no event has set the cursor yet
    default_provider: Provider,
}

impl MessageHistory {
    /// Create an empty history
    ///
    /// `default_provider` comes from application configuration and shapes
    /// the projection until the first provider-tagged event arrives.
    pub fn new(default_provider: Provider) -> Self {
        Self {
            canonical: Vec::new(),
            projection: Vec::new(),
            provider: None,
            buffer: String::new(),
            default_provider,
        }
    }

    /// Number of canonical entries
    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    /// The canonical (provider-agnostic) history
    pub fn canonical_history(&self) -> &[HistoryEntry] {
        &self.canonical
    }

    /// The live projection for the active provider
    pub fn projection(&self) -> &[Value] {
        &self.projection
    }

    /// Provider-specific history, optionally for a different provider
    ///
    /// With no override (or the active provider), returns the live
    /// projection. With a different provider, computes a fresh projection
    /// for it without touching engine state, so callers can preview a
    /// switch before committing to it.
    pub fn provider_history(&self, provider: Option<Provider>) -> Result<Vec<Value>> {
        match provider {
            None => Ok(self.projection.clone()),
            Some(p) if Some(p) == self.provider => Ok(self.projection.clone()),
            Some(p) => {
                debug!("generating preview projection for {}", p);
                self.canonical
                    .iter()
                    .map(|entry| Self::project_entry(entry, p))
                    .collect()
            }
        }
    }

    /// Add a user message
    ///
    /// Direct API rather than an event: user input has no streaming phase.
    pub fn add_user_message(&mut self, content: impl Into<String>) {
        let message = Message::user(content);
        debug!("added user message: {} chars", message.content.len());
        if let Err(e) = self.append(HistoryEntry::User(message)) {
            error!("failed to append user message: {}", e);
        }
    }

    /// Delete the last `n` canonical entries
    ///
    /// A zero count is a no-op. Deleting more entries than exist clears
    /// the history.
    pub fn delete_last_n(&mut self, n: usize) {
        if n == 0 {
            warn!("attempted to delete 0 messages; the count must be positive");
            return;
        }

        if self.canonical.len() < n {
            warn!(
                "attempted to delete {} messages, but only {} exist; clearing history",
                n,
                self.canonical.len()
            );
            self.canonical.clear();
        } else {
            let keep = self.canonical.len() - n;
            self.canonical.truncate(keep);
        }

        self.regenerate_projection();
        info!(
            "deleted last {} messages, history length now {}",
            n,
            self.canonical.len()
        );
    }

    /// Delete the last canonical entry
    pub fn delete_last(&mut self) {
        self.delete_last_n(1);
    }

    /// Keep only the trailing `n` canonical entries
    ///
    /// Keeping zero entries clears the history, unlike `delete_last_n`
    /// where a zero count is a no-op.
    pub fn keep_last_n(&mut self, n: usize) {
        if n == 0 {
            warn!("keeping 0 messages clears the history");
            self.canonical.clear();
        } else if self.canonical.len() > n {
            let drop = self.canonical.len() - n;
            self.canonical.drain(..drop);
        }

        self.regenerate_projection();
        info!(
            "kept last {} messages, history length now {}",
            n,
            self.canonical.len()
        );
    }

    /// Clear the history, the buffer, and the provider cursor
    pub fn clear(&mut self) {
        self.canonical.clear();
        self.projection.clear();
        self.buffer.clear();
        self.provider = None;
        info!("history cleared");
    }

    /// Human-readable rendering of the canonical history
    ///
    /// With `last` set, renders only the trailing window.
    pub fn formatted(&self, last: Option<usize>) -> String {
        let window = match last {
            Some(n) if n > 0 => &self.canonical[self.canonical.len().saturating_sub(n)..],
            _ => &self.canonical[..],
        };

        if window.is_empty() {
            return "(history is empty)".to_string();
        }

        window
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let index = i + 1;
                match entry {
                    HistoryEntry::User(m) => format!("[{}] User: {}", index, m.content),
                    HistoryEntry::Assistant(m) => format!("[{}] Assistant: {}", index, m.content),
                    HistoryEntry::ToolCall(call) => format!(
                        "[{}] Tool Call: {}({})",
                        index,
                        call.function_name,
                        serde_json::to_string(&call.arguments).unwrap_or_default()
                    ),
                    HistoryEntry::ToolResult(outcome) => {
                        let rendered = match &outcome.result {
                            Some(value) => value.to_string(),
                            None => outcome.error.clone().unwrap_or_default(),
                        };
                        format!(
                            "[{}] Tool Result ({}): {}",
                            index, outcome.function_name, rendered
                        )
                    }
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Serialize the canonical history to an indented JSON document
    ///
    /// The projection is never persisted; it is always re-derivable.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.canonical)?)
    }

    /// Replace the history from a serialized document
    ///
    /// Entries of unknown kind are skipped with a warning. Any other
    /// parse failure aborts the load and leaves the current in-memory
    /// state untouched. On success the provider cursor resets to the
    /// configured default and the projection is regenerated.
    pub fn from_json(&mut self, source: &str) -> Result<()> {
        let records: Vec<Value> =
            serde_json::from_str(source).map_err(|e| ParleyError::HistoryCorrupted {
                reason: e.to_string(),
            })?;

        let mut canonical = Vec::with_capacity(records.len());
        for record in records {
            let kind = record
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            match kind.as_str() {
                "user" | "assistant" | "tool_call" | "tool_result" => {
                    let entry: HistoryEntry = serde_json::from_value(record).map_err(|e| {
                        ParleyError::HistoryCorrupted {
                            reason: e.to_string(),
                        }
                    })?;
                    canonical.push(entry);
                }
                other => {
                    warn!("skipping history entry of unknown kind '{}'", other);
                }
            }
        }

        self.canonical = canonical;
        self.provider = Some(self.default_provider);
        self.regenerate_projection();
        Ok(())
    }

    /// Save the canonical history to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| {
            error!("failed to save history to {}: {}", path.display(), e);
            ParleyError::HistoryWriteFailed {
                path: path.to_path_buf(),
            }
        })?;
        info!("history saved to {}", path.display());
        Ok(())
    }

    /// Load the canonical history from a file
    ///
    /// A missing or unreadable file is reported and leaves the current
    /// state untouched.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path).map_err(|e| {
            error!("failed to read history from {}: {}", path.display(), e);
            ParleyError::HistoryReadFailed {
                path: path.to_path_buf(),
            }
        })?;
        self.from_json(&content)?;
        info!("history loaded from {}", path.display());
        Ok(())
    }

    fn active_provider(&self) -> Provider {
        self.provider.unwrap_or(self.default_provider)
    }

    /// Project one canonical entry for a provider
    fn project_entry(entry: &HistoryEntry, provider: Provider) -> Result<Value> {
        match entry {
            HistoryEntry::User(message) | HistoryEntry::Assistant(message) => {
                Ok(serde_json::to_value(message)?)
            }
            HistoryEntry::ToolCall(call) => {
                let wire = provider.adapter().wire_tool_call(call)?;
                Ok(serde_json::json!({
                    "role": "assistant",
                    "tool_calls": [wire],
                }))
            }
            HistoryEntry::ToolResult(outcome) => {
                let wire = provider.adapter().wire_tool_result(outcome)?;
                let mut fields = Map::new();
                fields.insert("role".to_string(), Value::String("tool".to_string()));
                if let Value::Object(wire_fields) = wire {
                    fields.extend(wire_fields);
                }
                Ok(Value::Object(fields))
            }
        }
    }

    /// Append one entry, keeping canonical and projection in step
    ///
    /// The projection entry is computed before anything is pushed so a
    /// translation failure appends nothing.
    fn append(&mut self, entry: HistoryEntry) -> Result<()> {
        let value = Self::project_entry(&entry, self.active_provider())?;
        self.canonical.push(entry);
        self.projection.push(value);
        Ok(())
    }

    /// Flush the content buffer into one assistant entry
    ///
    /// A finish with an empty buffer appends nothing.
    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let message = Message::assistant(mem::take(&mut self.buffer));
        debug!("added assistant message: {} chars", message.content.len());
        self.append(HistoryEntry::Assistant(message))
    }

    /// Rebuild the projection from the canonical log
    ///
    /// Entries the active provider's adapter cannot translate are skipped
    /// with a warning rather than poisoning the whole projection.
    fn regenerate_projection(&mut self) {
        let provider = self.active_provider();
        self.projection.clear();
        for entry in &self.canonical {
            match Self::project_entry(entry, provider) {
                Ok(value) => self.projection.push(value),
                Err(e) => warn!("skipping entry in projection for {}: {}", provider, e),
            }
        }
        debug!("regenerated projection: {} entries", self.projection.len());
    }

    fn handle_event(&mut self, event: &Event) -> Result<()> {
        // Any change of the originating provider, including the first
        // tagged event, reshapes the whole projection before the event's
        // own effect is applied.
        if self.provider != Some(event.provider) {
            self.provider = Some(event.provider);
            self.regenerate_projection();
            debug!("provider changed to {}, regenerated projection", event.provider);
        }

        match &event.payload {
            EventPayload::Content { text } => {
                self.buffer.push_str(text);
                Ok(())
            }
            EventPayload::Finish => self.flush_buffer(),
            EventPayload::ToolDispatched(call) => {
                debug!("added tool call: {}", call.function_name);
                self.append(HistoryEntry::ToolCall(call.clone()))
            }
            EventPayload::ToolResult(outcome) | EventPayload::ToolError(outcome) => {
                debug!("added tool result for: {}", outcome.function_name);
                self.append(HistoryEntry::ToolResult(outcome.clone()))
            }
        }
    }
}

impl EventSubscriber for MessageHistory {
    fn subscribed_events(&self) -> &[EventKind] {
        &SUBSCRIBED_EVENTS
    }

    fn on_event(&mut self, event: &Event) -> anyhow::Result<()> {
        // Failures are contained here: entries appended before the
        // failure stay committed and the engine keeps consuming events.
        if let Err(e) = self.handle_event(event) {
            error!("error handling {:?} event: {}", event.kind(), e);
        }
        Ok(())
    }
}
