//! One-to-many notification.
//!
//! [`Subscribable`] is the capability consumers depend on; [`Signal`] is the
//! broadcast list implementing it. Handlers may subscribe and unsubscribe
//! from inside a delivery:
//! - a handler removed during an emission is not called for the rest of it;
//! - a handler added during an emission is first called on the next one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifies one subscription to a [`Subscribable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription-{}", self.0)
    }
}

/// A subscribed callback.
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Something that can be subscribed to.
pub trait Subscribable<T> {
    /// Registers `handler` for every later emission.
    fn subscribe(&self, handler: Handler<T>) -> SubscriptionId;

    /// Removes a subscription. Returns false if it was not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// Broadcasts values to every current subscriber, in subscription order.
pub struct Signal<T> {
    handlers: Mutex<Vec<(SubscriptionId, Handler<T>)>>,
    next_id: AtomicU64,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn handlers(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Handler<T>)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribes a closure.
    pub fn connect<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(handler))
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.handlers().iter().any(|(handler_id, _)| *handler_id == id)
    }

    /// Number of current subscribers.
    pub fn len(&self) -> usize {
        self.handlers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers().is_empty()
    }

    /// Removes every subscriber.
    pub fn disconnect_all(&self) {
        self.handlers().clear();
    }

    /// Calls every current subscriber with `value`.
    ///
    /// No lock is held while a handler runs.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<(SubscriptionId, Handler<T>)> = self
            .handlers()
            .iter()
            .map(|(id, handler)| (*id, Arc::clone(handler)))
            .collect();

        for (id, handler) in snapshot {
            if self.is_subscribed(id) {
                handler(value);
            }
        }
    }
}

impl<T> Subscribable<T> for Signal<T> {
    fn subscribe(&self, handler: Handler<T>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers().push((id, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }
}
