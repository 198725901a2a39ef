//! Typed, synchronous pub/sub for mutation events.
//!
//! The bus keeps one handler list per [`EventName`]. `emit` calls every
//! handler registered on the event's channel, in registration order, on
//! the emitting task. There is no queue and no backpressure.
//!
//! Dispatch runs over a snapshot of the handler list taken before the
//! first call, so a handler may unsubscribe itself (or anything else)
//! mid-emission, and handlers added during an emission only see later
//! events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use sandfs_types::{Event, EventName};

/// A registered event handler.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Identifies one registration on one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    channels: HashMap<EventName, Vec<(SubscriptionId, Handler)>>,
}

type SharedRegistry = Arc<Mutex<Registry>>;

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // Handlers never run under the lock, so a poisoned registry is still
    // consistent.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Event bus owned by one facade. Cloning shares the handler table.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: SharedRegistry,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = lock(&self.registry);
        let counts: HashMap<_, _> = registry
            .channels
            .iter()
            .map(|(name, handlers)| (name.as_str(), handlers.len()))
            .collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` on one channel.
    pub fn on<F>(&self, name: EventName, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry
            .channels
            .entry(name)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription::single(Registration {
            bus: Arc::downgrade(&self.registry),
            name,
            id,
        })
    }

    /// Deliver `event` to every handler currently on its channel.
    pub fn emit(&self, event: &Event) {
        let handlers: Vec<Handler> = {
            let registry = lock(&self.registry);
            match registry.channels.get(&event.name()) {
                Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => return,
            }
        };

        tracing::trace!(event = %event.name(), handlers = handlers.len(), "emit");
        for handler in handlers {
            handler(event);
        }
    }

    /// Number of live handlers on a channel.
    pub fn handler_count(&self, name: EventName) -> usize {
        lock(&self.registry)
            .channels
            .get(&name)
            .map_or(0, Vec::len)
    }
}

struct Registration {
    bus: Weak<Mutex<Registry>>,
    name: EventName,
    id: SubscriptionId,
}

impl Registration {
    fn remove(&self) {
        // The bus may already be gone with its facade.
        let Some(registry) = self.bus.upgrade() else {
            return;
        };
        let mut registry = lock(&registry);
        if let Some(list) = registry.channels.get_mut(&self.name) {
            list.retain(|(id, _)| *id != self.id);
            if list.is_empty() {
                registry.channels.remove(&self.name);
            }
        }
    }
}

struct SubscriptionInner {
    registrations: Vec<Registration>,
    children: Vec<Subscription>,
    active: AtomicBool,
}

/// Handle for one or more bus registrations.
///
/// [`unsubscribe`](Self::unsubscribe) removes all of them exactly once;
/// later calls do nothing. Clones share the same state. Dropping a
/// subscription leaves the handlers registered.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("registrations", &self.inner.registrations.len())
            .field("children", &self.inner.children.len())
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    fn from_parts(registrations: Vec<Registration>, children: Vec<Subscription>) -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                registrations,
                children,
                active: AtomicBool::new(true),
            }),
        }
    }

    fn single(registration: Registration) -> Self {
        Self::from_parts(vec![registration], Vec::new())
    }

    /// A subscription that owns nothing.
    pub fn empty() -> Self {
        Self::from_parts(Vec::new(), Vec::new())
    }

    /// Bundle several subscriptions so one call removes them all.
    pub fn merge(parts: impl IntoIterator<Item = Subscription>) -> Self {
        Self::from_parts(Vec::new(), parts.into_iter().collect())
    }

    pub fn unsubscribe(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }
        for registration in &self.inner.registrations {
            registration.remove();
        }
        for child in &self.inner.children {
            child.unsubscribe();
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }
}
