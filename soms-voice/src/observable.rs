//! Observable value binding
//!
//! A minimal subscribe/snapshot pair so a reactive UI layer can follow a value
//! without polling it. Listeners carry no payload: they are told "something
//! changed" and read the current value with [`Observable::get`].
//!
//! Delivery is at-least-once per change and listener order is unspecified.
//! Listeners must not call back into scheduler mutation methods
//! synchronously; doing so is unsupported.

use futures::stream::Stream;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::watch;

/// Change callback
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// A value that can be read synchronously and observed for changes
pub trait Observable<T>: Send + Sync {
    /// Register a change listener. Dropping or calling
    /// [`Subscription::unsubscribe`] on the handle removes it.
    fn subscribe(&self, listener: Listener) -> Subscription;

    /// Current value
    fn get(&self) -> T;
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

/// Id-keyed set of listeners
#[derive(Clone, Default)]
pub struct ListenerSet {
    registry: Arc<Mutex<Registry>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return its subscription handle
    pub fn add(&self, listener: Listener) -> Subscription {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(id, listener);

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
            active: AtomicBool::new(true),
        }
    }

    /// Invoke every registered listener.
    ///
    /// The registry lock is released before any listener runs, so a listener
    /// may subscribe or unsubscribe without deadlocking.
    pub fn notify(&self) {
        let snapshot: Vec<Listener> = {
            let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.listeners.values().cloned().collect()
        };

        for listener in snapshot {
            listener();
        }
    }

    /// Number of live subscriptions
    pub fn len(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by `subscribe`
///
/// Unsubscribing is idempotent. The listener is also removed when the handle
/// is dropped.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
    active: AtomicBool,
}

impl Subscription {
    /// Remove the listener. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners
                .remove(&self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Adapt an observable into a stream of snapshots.
///
/// Yields the current value immediately, then each distinct value seen after
/// a change notification. Consecutive duplicates are collapsed. The
/// subscription lives as long as the stream.
pub fn watch_stream<T, O>(observable: O) -> impl Stream<Item = T> + Send
where
    T: Clone + PartialEq + Send + Sync + 'static,
    O: Observable<T> + Clone + 'static,
{
    let (tx, mut rx) = watch::channel(observable.get());

    let source = observable.clone();
    let subscription = observable.subscribe(Arc::new(move || {
        let latest = source.get();
        tx.send_if_modified(|current| {
            if *current != latest {
                *current = latest.clone();
                true
            } else {
                false
            }
        });
    }));

    async_stream::stream! {
        let _subscription = subscription;
        let initial = rx.borrow_and_update().clone();
        yield initial;
        while rx.changed().await.is_ok() {
            let value = rx.borrow_and_update().clone();
            yield value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Default)]
    struct Flag {
        value: Arc<AtomicBool>,
        listeners: ListenerSet,
    }

    impl Flag {
        fn set(&self, value: bool) {
            self.value.store(value, Ordering::SeqCst);
            self.listeners.notify();
        }
    }

    impl Observable<bool> for Flag {
        fn subscribe(&self, listener: Listener) -> Subscription {
            self.listeners.add(listener)
        }

        fn get(&self) -> bool {
            self.value.load(Ordering::SeqCst)
        }
    }

    fn counting_listener(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = Arc::clone(counter);
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_every_subscriber_is_notified() {
        let flag = Flag::default();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let _a = flag.subscribe(counting_listener(&first));
        let _b = flag.subscribe(counting_listener(&second));

        flag.set(true);
        flag.set(false);

        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let flag = Flag::default();
        let counter = Arc::new(AtomicUsize::new(0));

        let subscription = flag.subscribe(counting_listener(&counter));
        assert_eq!(flag.listeners.len(), 1);

        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(!subscription.is_active());
        assert!(flag.listeners.is_empty());

        flag.set(true);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // Drop after explicit unsubscribe is a no-op
        drop(subscription);
        assert!(flag.listeners.is_empty());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let flag = Flag::default();
        let counter = Arc::new(AtomicUsize::new(0));

        {
            let _subscription = flag.subscribe(counting_listener(&counter));
            flag.set(true);
        }
        flag.set(false);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_unsubscribe_during_notify() {
        let listeners = ListenerSet::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot_in_listener = Arc::clone(&slot);
        let subscription = listeners.add(Arc::new(move || {
            if let Some(sub) = slot_in_listener.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        }));
        *slot.lock().unwrap() = Some(subscription);

        listeners.notify();
        assert!(listeners.is_empty());
    }

    #[tokio::test]
    async fn test_watch_stream_yields_distinct_snapshots() {
        let flag = Flag::default();
        let mut stream = Box::pin(watch_stream(flag.clone()));

        assert_eq!(stream.next().await, Some(false));

        flag.set(true);
        assert_eq!(stream.next().await, Some(true));

        // Duplicate notification collapses, next distinct value comes through
        flag.set(true);
        flag.set(false);
        assert_eq!(stream.next().await, Some(false));

        drop(stream);
        assert!(flag.listeners.is_empty());
    }
}
