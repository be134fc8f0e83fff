//! Minimal synchronous multi-listener dispatcher.
//!
//! The client publishes state changes and wrapped watch events through
//! [`EventBus`]. Dispatch is synchronous and in subscription order, on
//! the publishing task. Subscriptions are identified by tokens rather
//! than by callback identity, so unsubscription never depends on closure
//! equality.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::Error;
use crate::Result;

/// Token returned by [`EventBus::subscribe`], required to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct EventBus<T> {
    // The lock guards registration only; dispatch iterates a snapshot.
    listeners: Mutex<Vec<(SubscriptionId, Listener<T>)>>,
    next_id: AtomicU64,
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers a listener and returns its subscription token
    pub fn subscribe(
        &self,
        listener: impl Fn(&T) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Removes a previously registered listener
    ///
    /// # Errors
    /// - [`Error::ListenerNotFound`] if the token was never subscribed or
    ///   was already removed
    pub fn unsubscribe(
        &self,
        id: SubscriptionId,
    ) -> Result<()> {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        if listeners.len() == before {
            return Err(Error::ListenerNotFound(id));
        }
        Ok(())
    }

    /// Invokes all currently subscribed listeners synchronously, in
    /// subscription order, on the calling task.
    ///
    /// The subscriber list is snapshotted before iterating, so a listener
    /// that unsubscribes itself (or others) mid-dispatch neither corrupts
    /// iteration nor changes this round's delivery set.
    pub fn publish(
        &self,
        event: &T,
    ) {
        let snapshot: Vec<Listener<T>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(event);
        }
    }

    /// Number of currently subscribed listeners
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
