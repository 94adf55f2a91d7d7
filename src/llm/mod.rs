//! Conversation engine for LLM chat front-ends
//!
//! The event model, event bus, provider adapters, and the message history
//! engine live here. Backend drivers publish stream events onto the bus;
//! the history engine folds them into a canonical record and keeps a
//! provider-specific projection in sync.

pub mod bus;
pub mod chat;
pub mod event;
pub mod history;
pub mod provider;
pub mod tool_call;

pub use chat::{Message, MessageRole};
pub use event::{Event, EventKind, EventPayload};
pub use tool_call::{ToolCall, ToolCallOutcome};
