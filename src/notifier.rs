//! Publish/subscribe fan-out of status snapshots.
//!
//! Subscribers run in registration order. A panicking subscriber is caught
//! and logged so the rest still see the publication. There is no replay:
//! a new subscriber only observes publications made after it subscribed.

use crate::git::types::StatusMap;
use log::error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

type Callback = Arc<dyn Fn(Option<&StatusMap>) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<(u64, Callback)>,
}

/// Cloneable handle; clones share one subscriber registry
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    registry: Arc<Mutex<Registry>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a callback. It stays registered until the returned
    /// subscription is unsubscribed or dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&StatusMap>) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.push((id, Arc::new(callback)));

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Subscribe through a channel of owned snapshots
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<Option<StatusMap>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |status| {
            // Receiver gone means nobody is listening; the subscription is dropped with it
            let _ = tx.send(status.cloned());
        });
        (subscription, rx)
    }

    /// Deliver `status` to every current subscriber
    pub fn publish(&self, status: Option<&StatusMap>) {
        // Snapshot so callbacks may subscribe or unsubscribe without deadlocking
        let subscribers: Vec<(u64, Callback)> = self.lock().subscribers.clone();

        for (id, callback) in subscribers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(status)));
            if result.is_err() {
                error!("Status subscriber {} panicked; continuing with the rest", id);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

/// Handle returned by [`ChangeNotifier::subscribe`]
#[must_use = "dropping a Subscription unsubscribes it"]
pub struct Subscription {
    id: u64,
    registry: std::sync::Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}
