//! In-process event bus
//!
//! Synchronous publish/subscribe register for conversation events.
//! Delivery happens in publish order, one subscriber at a time; handler
//! failures are logged and never propagate to the publisher. Events
//! published from inside a handler are queued and delivered after the
//! current delivery cycle completes, so a cycle is never interrupted
//! mid-flight. There is no buffering across publishes: with no
//! subscribers registered, an event is dropped.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::llm::event::{Event, EventKind};

/// A consumer of conversation events
///
/// The interest set is fixed at construction; the bus only delivers
/// events whose kind is in the set.
pub trait EventSubscriber: Send {
    /// Event kinds this subscriber wants delivered
    fn subscribed_events(&self) -> &[EventKind];

    /// Handle one event
    ///
    /// Errors are reported by the bus and do not stop delivery to the
    /// remaining subscribers.
    fn on_event(&mut self, event: &Event) -> anyhow::Result<()>;
}

/// Shared subscriber handle registered with the bus
///
/// Subscribers stay shared with the host (the history engine is also
/// driven through its direct API), so the bus holds locked handles
/// rather than owning them.
pub type SharedSubscriber = Arc<Mutex<dyn EventSubscriber>>;

/// Wrap a subscriber into the shared handle the bus accepts
pub fn shared<S: EventSubscriber + 'static>(subscriber: S) -> Arc<Mutex<S>> {
    Arc::new(Mutex::new(subscriber))
}

struct BusInner {
    subscribers: Vec<SharedSubscriber>,
    queue: VecDeque<Event>,
    dispatching: bool,
}

/// Publish/subscribe register for conversation events
pub struct EventBus {
    inner: Mutex<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BusInner {
                subscribers: Vec::new(),
                queue: VecDeque::new(),
                dispatching: false,
            }),
        }
    }

    /// Register a subscriber
    ///
    /// Registering the same handle twice is a no-op.
    pub fn subscribe(&self, subscriber: SharedSubscriber) {
        let mut inner = self.inner.lock();
        if inner
            .subscribers
            .iter()
            .any(|existing| Arc::ptr_eq(existing, &subscriber))
        {
            return;
        }
        inner.subscribers.push(subscriber);
        debug!("subscriber added, {} registered", inner.subscribers.len());
    }

    /// Remove a subscriber by handle identity
    pub fn unsubscribe(&self, subscriber: &SharedSubscriber) {
        let mut inner = self.inner.lock();
        inner
            .subscribers
            .retain(|existing| !Arc::ptr_eq(existing, subscriber));
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Publish an event to all interested subscribers
    ///
    /// Delivery is synchronous and in publish order. A publish issued
    /// from inside a handler is queued behind the cycle in progress.
    pub fn publish(&self, event: Event) {
        let mut inner = self.inner.lock();
        inner.queue.push_back(event);
        if inner.dispatching {
            // The cycle in progress drains the queue; a new event is
            // delivered only after the current cycle completes.
            return;
        }
        inner.dispatching = true;
        while let Some(event) = inner.queue.pop_front() {
            let subscribers = inner.subscribers.clone();
            drop(inner);
            for subscriber in subscribers {
                let mut guard = subscriber.lock();
                if guard.subscribed_events().contains(&event.kind()) {
                    if let Err(e) = guard.on_event(&event) {
                        error!("subscriber failed on {:?} event: {e:#}", event.kind());
                    }
                }
            }
            inner = self.inner.lock();
        }
        inner.dispatching = false;
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscriber backed by a closure
///
/// Mostly useful for hosts wiring display callbacks and for tests.
pub struct FnSubscriber {
    interests: Vec<EventKind>,
    callback: Box<dyn FnMut(&Event) -> anyhow::Result<()> + Send>,
}

impl FnSubscriber {
    pub fn new(
        interests: Vec<EventKind>,
        callback: impl FnMut(&Event) -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        Self {
            interests,
            callback: Box::new(callback),
        }
    }
}

impl EventSubscriber for FnSubscriber {
    fn subscribed_events(&self) -> &[EventKind] {
        &self.interests
    }

    fn on_event(&mut self, event: &Event) -> anyhow::Result<()> {
        (self.callback)(event)
    }
}
