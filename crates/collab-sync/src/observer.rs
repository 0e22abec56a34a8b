//! Synchronous observer plumbing.
//!
//! Listeners are invoked inline by the emitting call, within the same
//! scheduling tick, so consumers never observe a stale value after the
//! emit returns. Callbacks run outside the listener lock; subscribing
//! from inside a callback is allowed and takes effect on the next emit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
}

/// Emits values to a set of subscribed listeners.
pub struct Publisher<T> {
    registry: Arc<Registry<T>>,
    next_id: AtomicU64,
}

impl<T> Publisher<T> {
    /// Create a publisher with no listeners.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                listeners: Mutex::new(Vec::new()),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener. Dropping the returned [`Subscription`]
    /// unsubscribes it.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription
    where
        T: 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(listener)));

        let registry = Arc::downgrade(&self.registry);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry
                        .listeners
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// Deliver a value to every current listener, synchronously.
    pub fn emit(&self, value: &T) {
        let listeners: Vec<Listener<T>> = self
            .registry
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(value);
        }
    }

    /// Number of active listeners.
    pub fn listener_count(&self) -> usize {
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl<T> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to an active listener registration. Unsubscribes on drop.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_is_synchronous() {
        let publisher = Publisher::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let _sub = publisher.subscribe(move |v: &usize| {
            seen2.store(*v, Ordering::SeqCst);
        });

        publisher.emit(&42);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let publisher = Publisher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let sub = publisher.subscribe(move |_: &usize| {
            count2.fetch_add(1, Ordering::SeqCst);
        });

        publisher.emit(&1);
        drop(sub);
        publisher.emit(&2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.listener_count(), 0);
    }
}
