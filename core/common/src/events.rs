//! Typed event bus with synchronous dispatch.
//!
//! Replaces ad-hoc string-topic pub/sub: each domain defines its own event
//! enum and owns a bus instance, so there is no process-wide singleton and
//! tests get fresh buses. Dispatch is synchronous on the publishing thread
//! and at-most-once per subscriber per event, in subscription order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Opaque handle identifying a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Subscriber<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Event bus for a single event type.
pub struct EventBus<E> {
    subscribers: RwLock<Vec<(SubscriberId, Subscriber<E>)>>,
    next_id: AtomicU64,
}

impl<E> EventBus<E> {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a subscriber. Returns a handle usable with [`unsubscribe`].
    ///
    /// [`unsubscribe`]: EventBus::unsubscribe
    pub fn subscribe<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .expect("event bus lock poisoned")
            .push((id, Arc::new(f)));
        id
    }

    /// Remove a subscriber. Returns false if the handle is unknown.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subs = self.subscribers.write().expect("event bus lock poisoned");
        let before = subs.len();
        subs.retain(|(sub_id, _)| *sub_id != id);
        subs.len() != before
    }

    /// Deliver an event to every current subscriber, in subscription order.
    ///
    /// Each subscriber sees the event exactly once. Subscribers run on the
    /// publishing thread against a snapshot of the subscriber list taken
    /// when `publish` is called, so a subscriber may call `subscribe` or
    /// `unsubscribe` on the same bus from inside its callback. Changes made
    /// mid-dispatch take effect from the next `publish`.
    pub fn publish(&self, event: &E) {
        let snapshot: Vec<Subscriber<E>> = self
            .subscribers
            .read()
            .expect("event bus lock poisoned")
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in snapshot {
            subscriber(event);
        }
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .expect("event bus lock poisoned")
            .len()
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_publish_reaches_all_subscribers_once() {
        let bus: EventBus<u32> = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = count.clone();
            bus.subscribe(move |value: &u32| {
                assert_eq!(*value, 7);
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.publish(&7);
        assert_eq!(count.load(Ordering::SeqCst), 3);

        bus.publish(&7);
        assert_eq!(count.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_unsubscribe() {
        let bus: EventBus<&'static str> = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = count.clone();
        let id = bus.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&"first");
        assert!(bus.unsubscribe(id));
        bus.publish(&"second");

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn test_subscribe_from_inside_callback() {
        let bus: Arc<EventBus<u32>> = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));

        let inner_bus = bus.clone();
        let inner_count = count.clone();
        let outer = bus.subscribe(move |_| {
            let count = inner_count.clone();
            inner_bus.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        });

        // Must return rather than deadlock; the new subscriber only sees
        // events published after it was registered.
        bus.publish(&1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count(), 2);

        bus.unsubscribe(outer);
        bus.publish(&2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_from_inside_callback() {
        let bus: Arc<EventBus<()>> = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = count.clone();
        let id = bus.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let inner_bus = bus.clone();
        bus.subscribe(move |_| {
            inner_bus.unsubscribe(id);
        });

        // First publish dispatches against the pre-removal snapshot.
        bus.publish(&());
        bus.publish(&());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delivery_order_is_subscription_order() {
        let bus: EventBus<()> = EventBus::new();
        let order = Arc::new(RwLock::new(Vec::new()));

        for i in 0..4 {
            let order = order.clone();
            bus.subscribe(move |_| order.write().unwrap().push(i));
        }

        bus.publish(&());
        assert_eq!(*order.read().unwrap(), vec![0, 1, 2, 3]);
    }
}
