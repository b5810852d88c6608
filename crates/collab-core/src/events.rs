//! Event infrastructure for observing a sync session.
//!
//! Provides `SessionEvent` for UI/monitoring and `EventBus` for
//! subscriptions, so an embedding surface can react to status changes,
//! applied remote content, roster churn, and chat arrivals without
//! polling the engine.

use crate::sync::SyncStatus;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Events emitted while a document session is open.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// The client-visible sync status changed.
    StatusChanged {
        status: SyncStatus,
        /// When the transition happened, in ms since the Unix epoch.
        timestamp: f64,
    },
    /// Remote content replaced the local document.
    RemoteApplied {
        #[serde(rename = "documentId")]
        document_id: String,
        /// The store's timestamp for the applied write.
        #[serde(rename = "updatedAt")]
        updated_at: f64,
    },
    /// The collaborator roster was rebuilt from a snapshot.
    RosterChanged {
        /// Number of collaborators after the rebuild.
        count: usize,
        timestamp: f64,
    },
    /// A chat message arrived via the insert stream.
    MessageArrived {
        #[serde(rename = "messageId")]
        message_id: String,
        author: String,
        timestamp: f64,
    },
}

/// Handle tied to one registered callback. Events keep flowing while
/// the handle is alive; dropping it removes the callback.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

/// Fan-out point for `SessionEvent`s.
///
/// Shared across the session's tasks, so callbacks run on whichever
/// task emits. Lives in an `Arc`; subscriptions hold a weak backref.
pub struct EventBus {
    callbacks: RwLock<Vec<(usize, Arc<dyn Fn(SessionEvent) + Send + Sync>)>>,
    next_id: AtomicUsize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for every subsequent event. The returned
    /// handle unsubscribes on drop.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(SessionEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: usize) {
        // Removal must not block: a handle dropped from inside a
        // callback would deadlock against emit's read lock. Skipping
        // under contention leaves the entry until the next write.
        if let Ok(mut guard) = self.callbacks.try_write() {
            guard.retain(|(i, _)| *i != id);
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: SessionEvent) {
        // Snapshot the list before calling out; callbacks are free to
        // subscribe or drop handles while running.
        let callbacks: Vec<_> = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn roster_event(count: usize) -> SessionEvent {
        SessionEvent::RosterChanged {
            count,
            timestamp: 1000.0,
        }
    }

    #[test]
    fn test_subscribe_and_emit() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let _sub = bus.subscribe(move |_event| {
            count_clone.fetch_add(1, Ordering::Relaxed);
        });

        bus.emit(roster_event(2));
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_subscription_unsubscribes_on_drop() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        {
            let _sub = bus.subscribe(move |_event| {
                count_clone.fetch_add(1, Ordering::Relaxed);
            });
            bus.emit(roster_event(1));
            assert_eq!(count.load(Ordering::Relaxed), 1);
            // _sub dropped here
        }

        bus.emit(roster_event(1));
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_multiple_subscribers() {
        let bus = Arc::new(EventBus::new());
        let count1 = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::new(AtomicUsize::new(0));

        let count1_clone = Arc::clone(&count1);
        let count2_clone = Arc::clone(&count2);

        let _sub1 = bus.subscribe(move |_| {
            count1_clone.fetch_add(1, Ordering::Relaxed);
        });
        let _sub2 = bus.subscribe(move |_| {
            count2_clone.fetch_add(1, Ordering::Relaxed);
        });

        bus.emit(roster_event(3));
        assert_eq!(count1.load(Ordering::Relaxed), 1);
        assert_eq!(count2.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_session_event_serialization() {
        let event = SessionEvent::StatusChanged {
            status: crate::sync::SyncStatus::Saved,
            timestamp: 1234567890.0,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"statusChanged\""));
        assert!(json.contains("\"status\":\"saved\""));
        assert!(json.contains("\"timestamp\":"));
    }
}
