use serde_json::Value;
use tokio::sync::broadcast;

/// A host event delivered to every subscriber (the web-view bridge, tests).
#[derive(Debug, Clone)]
pub struct HostEvent {
    pub event: String,
    pub params: Value,
}

/// Broadcasts host events to all subscribers.
///
/// One instance lives in the [`crate::AuthoringContext`] and is handed to
/// every component that emits — there is no module-level callback registry.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<HostEvent>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Emit an event to all subscribers.
    pub fn broadcast(&self, event: &str, params: Value) {
        // Ignore errors — no subscribers is fine
        let _ = self.tx.send(HostEvent {
            event: event.to_string(),
            params,
        });
    }

    /// Subscribe to all broadcast events.
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.tx.subscribe()
    }
}
