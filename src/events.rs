//! Callback registry used by the session service and the notification store.
//!
//! Emitters release their state locks before invoking callbacks, so a
//! callback may read back from the component that is notifying it.
//!
//! Each emitter holds its [`Subscribers::delivery`] guard from the state
//! change through the matching `emit`. Deliveries therefore arrive in
//! commit order on any runtime flavor. A callback must not trigger another
//! emission from the same emitter while it runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered set of subscriber callbacks.
pub struct Subscribers<T: ?Sized> {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(u64, Callback<T>)>>,
    delivery: Mutex<()>,
}

impl<T: ?Sized + 'static> Subscribers<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            callbacks: Mutex::new(Vec::new()),
            delivery: Mutex::new(()),
        })
    }

    /// Serializes change-and-emit sequences for this registry.
    ///
    /// The guard protects no data, so a poisoned lock is simply taken over.
    pub fn delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a callback. It stays registered until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.callbacks.lock() {
            Ok(mut callbacks) => callbacks.push((id, Arc::new(callback))),
            Err(_) => tracing::error!("Subscriber registry lock poisoned, callback dropped"),
        }

        let registry: Weak<Self> = Arc::downgrade(self);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.remove(id);
                }
            })),
        }
    }

    /// Invoke every registered callback in registration order.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = match self.callbacks.lock() {
            Ok(callbacks) => callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            Err(_) => {
                tracing::error!("Subscriber registry lock poisoned, emit skipped");
                return;
            }
        };
        for callback in snapshot {
            (*callback)(value);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: u64) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.retain(|(existing, _)| *existing != id);
        }
    }
}

/// Handle to a registered callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the callback now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}
