// Typed publish/subscribe dispatcher
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Synchronous dispatcher for one event type. Delivery order is
/// subscription order, duplicate callbacks are allowed (each subscription
/// has its own id), and a panicking subscriber never blocks delivery to
/// the rest.
pub struct EventBus<E> {
    inner: Mutex<BusInner<E>>,
}

struct BusInner<E> {
    next_id: u64,
    subscribers: Vec<(SubscriberId, Callback<E>)>,
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BusInner {
                next_id: 0,
                subscribers: Vec::new(),
            }),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        let id = SubscriberId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push((id, Arc::new(callback)));
        id
    }

    /// Remove one subscription. Unknown ids are a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        if let Some(index) = inner.subscribers.iter().position(|(sid, _)| *sid == id) {
            inner.subscribers.remove(index);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().expect("event bus lock poisoned").subscribers.len()
    }

    /// Deliver `event` to every current subscriber, in subscription order.
    /// A subscriber panic is caught and logged; remaining subscribers still
    /// receive the event. No subscribers is a silent no-op.
    pub fn emit(&self, event: &E) {
        // Snapshot outside the lock so subscribers may (un)subscribe
        // from inside their callback without deadlocking.
        let snapshot: Vec<Callback<E>> = {
            let inner = self.inner.lock().expect("event bus lock poisoned");
            inner.subscribers.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in snapshot {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::warn!("event subscriber panicked; continuing delivery");
            }
        }
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
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_delivery_in_subscription_order() {
        let bus = EventBus::<u32>::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = order.clone();
            bus.subscribe(move |_e: &u32| order.lock().unwrap().push(tag));
        }
        bus.emit(&7);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_duplicate_subscriptions_each_fire() {
        let bus = EventBus::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let make = |hits: Arc<AtomicUsize>| {
            move |_e: &()| {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        };
        let first = bus.subscribe(make(hits.clone()));
        bus.subscribe(make(hits.clone()));
        bus.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        // Unsubscribing one of the duplicates leaves the other active.
        bus.unsubscribe(first);
        bus.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let bus = EventBus::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe(|_e: &()| panic!("subscriber blew up"));
        {
            let hits = hits.clone();
            bus.subscribe(move |_e: &()| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        bus.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let bus = EventBus::<String>::new();
        bus.emit(&"nobody listening".to_string());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
