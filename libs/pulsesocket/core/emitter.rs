//! Typed observer list with explicit subscription handles

use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

/// Ids are unique across every emitter in the process, so one
/// `unsubscribe` call can be tried against several emitters safely.
static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Handle returned by [`EventEmitter::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Broadcasts values of `T` to its subscribers
///
/// `emit` works on a snapshot of the subscriber list, so a listener may
/// subscribe or unsubscribe (itself included) while being called. A panicking
/// listener is logged and skipped; the remaining listeners still run.
pub struct EventEmitter<T> {
    name: &'static str,
    listeners: RwLock<Vec<(SubscriptionId, Listener<T>)>>,
}

impl<T> EventEmitter<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` if `id` was not subscribed here
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Call every listener; returns how many completed without panicking
    pub fn emit(&self, value: &T) -> usize {
        let snapshot: Vec<Listener<T>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        let mut delivered = 0;
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(value))) {
                Ok(()) => delivered += 1,
                Err(_) => error!("{} listener panicked", self.name),
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let emitter = EventEmitter::<u32>::new("test");
        let total = Arc::new(AtomicUsize::new(0));

        let t = Arc::clone(&total);
        let id = emitter.subscribe(move |v| {
            t.fetch_add(*v as usize, Ordering::SeqCst);
        });

        assert_eq!(emitter.emit(&5), 1);
        assert!(emitter.unsubscribe(id));
        assert!(!emitter.unsubscribe(id));
        assert_eq!(emitter.emit(&5), 0);
        assert_eq!(total.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_others() {
        let emitter = EventEmitter::<()>::new("test");
        let calls = Arc::new(AtomicUsize::new(0));

        emitter.subscribe(|_| panic!("boom"));
        let c = Arc::clone(&calls);
        emitter.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(emitter.emit(&()), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ids_are_unique_across_emitters() {
        let a = EventEmitter::<()>::new("a");
        let b = EventEmitter::<()>::new("b");

        let id_a = a.subscribe(|_| {});
        let id_b = b.subscribe(|_| {});

        assert_ne!(id_a, id_b);
        assert!(!b.unsubscribe(id_a));
        assert!(a.unsubscribe(id_a));
    }
}
