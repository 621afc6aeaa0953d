//! Fan-out of transition events to WebSocket clients
//!
//! A single engine listener forwards every event into a tokio broadcast
//! channel. Each connected client holds its own receiver; a client that
//! falls behind by more than the channel capacity skips the oldest events.

use geofence_core::{SharedGeofenceEngine, Subscription, TransitionEvent};
use tokio::sync::broadcast;

#[derive(Clone, Debug)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<TransitionEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        EventBroadcaster { tx }
    }

    /// Start forwarding the engine's events into the channel
    pub fn attach(&self, engine: &SharedGeofenceEngine) -> Subscription {
        let tx = self.tx.clone();
        engine.subscribe(move |event| {
            // No connected clients is not a failure
            if tx.send(event.clone()).is_err() {
                log::trace!("No event stream clients for {}", event.geofence_id);
            }
            Ok(())
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
