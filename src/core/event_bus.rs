//! Pub/Sub Event Bus for the viewer's app shell, input and renderer.
//!
//! Architecture:
//! - The app shell emits raw input (`InputEvent`) here; it is the "global
//!   listener" surface keyboard and swipe handlers attach to.
//! - The engine emits `PlaybackSnapshot` / `SessionClosedEvent` for renderers.
//! - `subscribe()` returns a `Subscription` guard. Dropping the guard detaches
//!   the callback, so a listener lives exactly as long as its owner.
//!
//! Callback order: FIFO (first-subscribed, first-called) within same event type.
//! Callbacks run on the emitting thread after the registry lock is released,
//! so a callback may subscribe or drop guards without deadlocking.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use log::trace;

/// Marker trait for events. Events must be Send + Sync + 'static.
pub trait Event: Any + Send + Sync + 'static {}

impl<T: Any + Send + Sync + 'static> Event for T {}

/// Type-erased callback
type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

struct Listener {
    id: u64,
    callback: Callback,
}

type Registry = RwLock<HashMap<TypeId, Vec<Listener>>>;

/// Cloneable bus handle; clones share one registry.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Registry>,
    next_id: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners: usize = self
            .registry
            .read()
            .map(|r| r.values().map(Vec::len).sum())
            .unwrap_or(0);
        f.debug_struct("EventBus").field("listeners", &listeners).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to events of type E.
    ///
    /// The callback stays attached until the returned guard is dropped.
    ///
    /// # Example
    /// ```ignore
    /// let _listener = bus.subscribe::<PlaybackSnapshot, _>(|snap| {
    ///     draw_progress(snap.progress_percent);
    /// });
    /// ```
    #[must_use = "dropping the Subscription detaches the listener immediately"]
    pub fn subscribe<E, F>(&self, callback: F) -> Subscription
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<E>();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let wrapped: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.registry
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(type_id)
            .or_default()
            .push(Listener { id, callback: wrapped });
        trace!("Listener {} attached for {}", id, std::any::type_name::<E>());

        Subscription {
            registry: Arc::downgrade(&self.registry),
            type_id,
            id,
        }
    }

    /// Invoke every listener of E with `event`, in subscription order.
    pub fn emit<E: Event>(&self, event: E) {
        let callbacks: Vec<Callback> = self
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
            .map(|listeners| listeners.iter().map(|l| Arc::clone(&l.callback)).collect())
            .unwrap_or_default();

        for cb in callbacks {
            cb(&event);
        }
    }

    /// Number of attached listeners for event type E
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn has_subscribers<E: Event>(&self) -> bool {
        self.subscriber_count::<E>() > 0
    }
}

/// Listener guard returned by [`EventBus::subscribe`].
///
/// Detaches on drop. Outliving the bus is fine: detaching then does nothing.
pub struct Subscription {
    registry: Weak<Registry>,
    type_id: TypeId,
    id: u64,
}

impl Subscription {
    /// Detach now (same as dropping)
    pub fn unsubscribe(self) {}
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = registry.write().unwrap_or_else(|e| e.into_inner());
        if let Some(listeners) = registry.get_mut(&self.type_id) {
            listeners.retain(|l| l.id != self.id);
            if listeners.is_empty() {
                registry.remove(&self.type_id);
            }
        }
        trace!("Listener {} detached", self.id);
    }
}
