use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;
use uplink_core::UplinkError;

/// Payloads are wire-shaped JSON values, matching what arrives on the
/// signaling connection.
pub type EventPayload = Value;

type Listener = Arc<dyn Fn(&EventPayload) + Send + Sync>;

/// Token identifying one registered listener. Boxed closures have no usable
/// identity in Rust, so removal goes through the token handed out by `on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct DispatcherInner {
    next_id: u64,
    events: HashMap<String, Vec<(ListenerId, Listener)>>,
}

/// Minimal named-event fan-out. Every stateful component owns one and exposes
/// its own `on`/`off` instead of inheriting dispatch machinery.
///
/// `emit` is synchronous: listeners run in registration order on the calling
/// task, so a slow listener delays the ones after it and the emitter itself.
#[derive(Default)]
pub struct EventDispatcher {
    inner: Mutex<DispatcherInner>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        &self,
        event: &str,
        listener: impl Fn(&EventPayload) + Send + Sync + 'static,
    ) -> Result<ListenerId, UplinkError> {
        if event.is_empty() {
            warn!("listener registration rejected: empty event name");
            return Err(UplinkError::Validation {
                what: "event name",
                value: String::new(),
            });
        }

        let mut inner = self.inner.lock().expect("event dispatcher poisoned");
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner
            .events
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        Ok(id)
    }

    /// Removes a listener. Unknown event names or already-removed ids are
    /// reported and ignored, never an error.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut inner = self.inner.lock().expect("event dispatcher poisoned");
        let Some(listeners) = inner.events.get_mut(event) else {
            warn!(event, "off: event was never registered");
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        before != listeners.len()
    }

    pub fn emit(&self, event: &str, payload: &EventPayload) {
        // Snapshot outside the lock so a listener may register or remove
        // listeners on this same dispatcher without deadlocking.
        let listeners: Vec<Listener> = {
            let inner = self.inner.lock().expect("event dispatcher poisoned");
            match inner.events.get(event) {
                Some(list) => list.iter().map(|(_, l)| l.clone()).collect(),
                None => return,
            }
        };

        for listener in listeners {
            listener(payload);
        }
    }
}
