use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Something published on the bus. `event_type` is the routing key handlers
/// subscribe against; `payload` is whatever shape the publisher chose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub ts: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self { event_type: event_type.into(), payload, ts: Utc::now() }
    }
}

pub type SubscriptionId = u64;
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
}

#[derive(Default)]
struct Inner {
    by_type: HashMap<String, Vec<Subscription>>,
    global: Vec<Subscription>,
    queue: VecDeque<Event>,
    next_id: u64,
}

/// In-process publish/subscribe keyed by event type name.
///
/// `publish` invokes matching handlers inline, synchronously, after releasing
/// the subscriber-list lock — a handler that subscribes or unsubscribes
/// during dispatch never observes or affects the event it was called for.
/// `publish_async` only enqueues; `drain` performs the actual inline dispatch
/// for everything queued so far.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Inner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, event_type: impl Into<String>, handler: Handler) -> SubscriptionId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.by_type.entry(event_type.into()).or_default().push(Subscription { id, handler });
        id
    }

    pub fn subscribe_all(&self, handler: Handler) -> SubscriptionId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.global.push(Subscription { id, handler });
        id
    }

    /// Idempotent: unsubscribing an id that was already removed (or never
    /// existed) is a no-op, not an error.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock().unwrap();
        for subs in inner.by_type.values_mut() {
            subs.retain(|s| s.id != id);
        }
        inner.global.retain(|s| s.id != id);
    }

    /// Synchronous, inline delivery: type-specific handlers in subscription
    /// order, then global handlers in subscription order.
    pub fn publish(&self, event: Event) {
        let snapshot: Vec<Handler> = {
            let inner = self.inner.lock().unwrap();
            let typed = inner.by_type.get(&event.event_type).into_iter().flatten();
            typed.chain(inner.global.iter()).map(|s| s.handler.clone()).collect()
        };
        for handler in snapshot {
            handler(&event);
        }
    }

    pub fn publish_async(&self, event: Event) {
        self.inner.lock().unwrap().queue.push_back(event);
    }

    /// Drains everything enqueued by `publish_async` so far, dispatching each
    /// one through the same synchronous path as `publish`. Events enqueued by
    /// a handler while draining are not delivered by this call.
    pub fn drain(&self) {
        let pending: Vec<Event> = {
            let mut inner = self.inner.lock().unwrap();
            inner.queue.drain(..).collect()
        };
        for event in pending {
            self.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn delivers_in_subscription_order_then_global() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        bus.subscribe("device.state", Arc::new(move |_| o1.lock().unwrap().push("a")));
        let o2 = order.clone();
        bus.subscribe("device.state", Arc::new(move |_| o2.lock().unwrap().push("b")));
        let o3 = order.clone();
        bus.subscribe_all(Arc::new(move |_| o3.lock().unwrap().push("global")));

        bus.publish(Event::new("device.state", serde_json::json!(null)));

        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "global"]);
    }

    #[test]
    fn handlers_added_during_publish_are_not_invoked_for_that_event() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let bus2 = bus.clone();
        let calls2 = calls.clone();
        bus.subscribe(
            "x",
            Arc::new(move |_| {
                let c = calls2.clone();
                bus2.subscribe("x", Arc::new(move |_| { c.fetch_add(1, Ordering::SeqCst); }));
            }),
        );

        bus.publish(Event::new("x", serde_json::json!(null)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        bus.publish(Event::new("x", serde_json::json!(null)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let id = bus.subscribe("x", Arc::new(|_| {}));
        bus.unsubscribe(id);
        bus.unsubscribe(id); // no panic, no error
    }

    #[test]
    fn publish_async_is_deferred_until_drain() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        bus.subscribe("x", Arc::new(move |_| { c.fetch_add(1, Ordering::SeqCst); }));

        bus.publish_async(Event::new("x", serde_json::json!(null)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        bus.drain();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
