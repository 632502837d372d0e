//! In-process broadcast bus.
//!
//! Lets the independent tracking modules react to each other's
//! milestones without direct coupling. Publishing never fails: a bus
//! with no subscribers is a no-op, and subscriber registration is the
//! only fallible-looking operation (it isn't).

use std::sync::{Arc, Mutex};

type Subscriber = Arc<dyn Fn(&str, &serde_json::Value) + Send + Sync>;

/// Topic-agnostic publish/subscribe. Subscribers receive every topic and
/// filter for themselves, mirroring a DOM custom-event listener on a
/// shared target.
#[derive(Clone, Default)]
pub struct Bus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, f: impl Fn(&str, &serde_json::Value) + Send + Sync + 'static) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(f));
    }

    /// Broadcast to all subscribers. Subscribers registered during a
    /// publish see only subsequent publishes.
    pub fn publish(&self, topic: &str, detail: &serde_json::Value) {
        // Snapshot under the lock, call outside it, so a subscriber may
        // publish without deadlocking.
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for subscriber in subscribers {
            subscriber(topic, detail);
        }
    }
}
