//! Typed publish/subscribe channels.
//!
//! Every component that publishes events (document, selection, viewport) owns a
//! [`Subscribers`] list. Subscribing hands back a [`Subscription`] that removes
//! the listener when it is dropped or explicitly unsubscribed.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Listener<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Registry<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// A list of listeners for events of type `T`.
///
/// Single-threaded: listeners run synchronously on the emitting call stack.
pub struct Subscribers<T> {
    inner: Rc<RefCell<Registry<T>>>,
}

impl<T: 'static> Subscribers<T> {
    /// Create an empty listener list.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a listener. It stays registered until the returned handle is
    /// dropped or [`Subscription::unsubscribe`] is called.
    pub fn subscribe(&self, listener: impl FnMut(&T) + 'static) -> Subscription {
        let id = {
            let mut registry = self.inner.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            let listener: Listener<T> = Rc::new(RefCell::new(listener));
            registry.listeners.push((id, listener));
            id
        };

        let weak: Weak<RefCell<Registry<T>>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(registry) = weak.upgrade() {
                registry
                    .borrow_mut()
                    .listeners
                    .retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    /// Deliver an event to every registered listener.
    ///
    /// The registry borrow is released before listeners run, so listeners may
    /// subscribe or unsubscribe while handling an event.
    pub fn emit(&self, event: &T) {
        let listeners: Vec<Listener<T>> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in listeners {
            match listener.try_borrow_mut() {
                Ok(mut callback) => (&mut *callback)(event),
                Err(_) => log::warn!("Skipping listener re-entered during its own dispatch"),
            }
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Check if no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle that keeps a listener registered.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the listener now.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_emit_reaches_all_listeners() {
        let subscribers: Subscribers<u32> = Subscribers::new();
        let total = Rc::new(Cell::new(0));

        let t1 = total.clone();
        let _a = subscribers.subscribe(move |v| t1.set(t1.get() + *v));
        let t2 = total.clone();
        let _b = subscribers.subscribe(move |v| t2.set(t2.get() + *v * 10));

        subscribers.emit(&2);
        assert_eq!(total.get(), 22);
        assert_eq!(subscribers.len(), 2);
    }

    #[test]
    fn test_unsubscribe_removes_listener() {
        let subscribers: Subscribers<u32> = Subscribers::new();
        let count = Rc::new(Cell::new(0));

        let c = count.clone();
        let sub = subscribers.subscribe(move |_| c.set(c.get() + 1));
        subscribers.emit(&0);
        sub.unsubscribe();
        subscribers.emit(&0);

        assert_eq!(count.get(), 1);
        assert!(subscribers.is_empty());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let subscribers: Subscribers<u32> = Subscribers::new();
        {
            let _sub = subscribers.subscribe(|_| {});
            assert_eq!(subscribers.len(), 1);
        }
        assert!(subscribers.is_empty());
    }

    #[test]
    fn test_subscription_outlives_registry() {
        let sub = {
            let subscribers: Subscribers<u32> = Subscribers::new();
            subscribers.subscribe(|_| {})
        };
        // Registry is gone; unsubscribing must not panic.
        sub.unsubscribe();
    }
}
