//! Ordered listener registries with drop-to-unsubscribe handles.
//!
//! Registering a listener returns a [`Subscription`]. Dropping the handle (or
//! calling [`Subscription::unsubscribe`]) removes the listener, so a component
//! that goes away cannot leave a callback behind in a long-lived registry.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use tracing::error;

use crate::sync::lock;

/// A listener callback shared between the registry and in-flight deliveries.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entries<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// A list of listeners invoked in registration order.
pub(crate) struct ListenerRegistry<T> {
    entries: Arc<Mutex<Entries<T>>>,
}

impl<T: 'static> ListenerRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Append a listener and return the handle that removes it.
    pub(crate) fn subscribe(&self, listener: Listener<T>) -> Subscription {
        let id = {
            let mut entries = lock(&self.entries);
            let id = entries.next_id;
            entries.next_id += 1;
            entries.listeners.push((id, listener));
            id
        };

        let weak: Weak<Mutex<Entries<T>>> = Arc::downgrade(&self.entries);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(entries) = weak.upgrade() {
                    lock(&entries).listeners.retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    /// Invoke every listener with `value`.
    ///
    /// The listener list is snapshotted first, so listeners may subscribe or
    /// unsubscribe from inside the callback. A panicking listener is logged
    /// and skipped; the remaining listeners still receive the value.
    pub(crate) fn emit(&self, value: &T) {
        let snapshot: Vec<(u64, Listener<T>)> = lock(&self.entries).listeners.clone();
        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(value))).is_err() {
                error!(listener = id, "listener panicked; continuing delivery");
            }
        }
    }

    /// Remove every listener.
    pub(crate) fn clear(&self) {
        lock(&self.entries).listeners.clear();
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.entries).listeners.len()
    }
}

/// Handle returned by listener registration.
///
/// Dropping it removes the listener.
#[must_use = "dropping a Subscription immediately removes its listener"]
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }

    /// Keep the listener registered for as long as its registry lives.
    pub fn detach(mut self) {
        self.remove = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Listener<u32>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make_log = Arc::clone(&log);
        let make = move |tag: &str| -> Listener<u32> {
            let log = Arc::clone(&make_log);
            let tag = tag.to_string();
            Arc::new(move |value: &u32| log.lock().unwrap().push(format!("{tag}:{value}")))
        };
        (log, make)
    }

    #[test]
    fn delivers_in_registration_order() {
        let registry = ListenerRegistry::<u32>::new();
        let (log, make) = recorder();
        let _a = registry.subscribe(make("a"));
        let _b = registry.subscribe(make("b"));
        let _c = registry.subscribe(make("c"));

        registry.emit(&1);
        registry.emit(&2);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:1", "b:1", "c:1", "a:2", "b:2", "c:2"]
        );
    }

    #[test]
    fn dropping_subscription_removes_listener() {
        let registry = ListenerRegistry::<u32>::new();
        let (log, make) = recorder();
        let a = registry.subscribe(make("a"));
        let _b = registry.subscribe(make("b"));
        drop(a);

        registry.emit(&7);
        assert_eq!(*log.lock().unwrap(), vec!["b:7"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unsubscribe_and_detach() {
        let registry = ListenerRegistry::<u32>::new();
        let (log, make) = recorder();
        registry.subscribe(make("kept")).detach();
        registry.subscribe(make("gone")).unsubscribe();

        registry.emit(&3);
        assert_eq!(*log.lock().unwrap(), vec!["kept:3"]);
    }

    #[test]
    fn panicking_listener_does_not_stop_delivery() {
        let registry = ListenerRegistry::<u32>::new();
        let (log, make) = recorder();
        let _a = registry.subscribe(make("a"));
        let _boom = registry.subscribe(Arc::new(|_: &u32| panic!("listener failure")));
        let _c = registry.subscribe(make("c"));

        registry.emit(&5);
        assert_eq!(*log.lock().unwrap(), vec!["a:5", "c:5"]);
    }

    #[test]
    fn listener_may_subscribe_during_emit() {
        let registry = Arc::new(ListenerRegistry::<u32>::new());
        let held = Arc::new(Mutex::new(Vec::new()));
        let inner_registry = Arc::clone(&registry);
        let inner_held = Arc::clone(&held);
        let _outer = registry.subscribe(Arc::new(move |_: &u32| {
            let sub = inner_registry.subscribe(Arc::new(|_: &u32| {}));
            inner_held.lock().unwrap().push(sub);
        }));

        registry.emit(&1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn clear_then_drop_is_harmless() {
        let registry = ListenerRegistry::<u32>::new();
        let (_log, make) = recorder();
        let a = registry.subscribe(make("a"));
        registry.clear();
        assert_eq!(registry.len(), 0);
        drop(a);
        assert_eq!(registry.len(), 0);
    }
}
