//! Transition Listeners
//!
//! Push-style fan-out of transition events. Listeners run synchronously in
//! registration order. A listener that returns an error or panics is logged
//! and skipped; the others still run and the evaluation result is
//! unaffected.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::error::ListenerError;

use super::types::TransitionEvent;

/// Receiver of transition events
pub trait TransitionListener: Send + Sync {
    fn on_transition(&self, event: &TransitionEvent) -> Result<(), ListenerError>;
}

impl<F> TransitionListener for F
where
    F: Fn(&TransitionEvent) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_transition(&self, event: &TransitionEvent) -> Result<(), ListenerError> {
        self(event)
    }
}

/// Identifies one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(ListenerId, Arc<dyn TransitionListener>)>,
}

/// Ordered set of listeners, shareable between engines
#[derive(Clone, Default)]
pub(crate) struct ListenerRegistry {
    inner: Arc<RwLock<Registry>>,
}

// Nothing panics while a registry lock is held, so a poisoned lock still
// holds consistent data.
fn read(lock: &RwLock<Registry>) -> RwLockReadGuard<'_, Registry> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write(lock: &RwLock<Registry>) -> RwLockWriteGuard<'_, Registry> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        ListenerRegistry::default()
    }

    pub(crate) fn add(&self, listener: Arc<dyn TransitionListener>) -> Subscription {
        let mut registry = write(&self.inner);
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push((id, listener));
        log::debug!("Registered {}", id);

        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn len(&self) -> usize {
        read(&self.inner).listeners.len()
    }

    /// Deliver each event to every listener, in order.
    ///
    /// The listener list is copied before delivery so listeners may
    /// subscribe or unsubscribe from inside a callback.
    pub(crate) fn dispatch(&self, events: &[TransitionEvent]) {
        if events.is_empty() {
            return;
        }

        let listeners: Vec<(ListenerId, Arc<dyn TransitionListener>)> =
            read(&self.inner).listeners.clone();

        for event in events {
            for (id, listener) in &listeners {
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| listener.on_transition(event)));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        log::warn!(
                            "{} failed on {} {} for {}: {}",
                            id,
                            event.event_kind,
                            event.geofence_id,
                            event.subject_id,
                            e
                        );
                    }
                    Err(payload) => {
                        log::error!(
                            "{} panicked on {} {} for {}: {}",
                            id,
                            event.event_kind,
                            event.geofence_id,
                            event.subject_id,
                            panic_message(payload.as_ref())
                        );
                    }
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping the handle leaves the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: ListenerId,
    registry: Weak<RwLock<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove exactly this listener. Repeated calls, or calls after the
    /// engine is gone, do nothing.
    pub fn unsubscribe(&self) {
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        let mut registry = write(&inner);
        let before = registry.listeners.len();
        registry.listeners.retain(|(id, _)| *id != self.id);
        if registry.listeners.len() != before {
            log::debug!("Unregistered {}", self.id);
        }
    }
}
