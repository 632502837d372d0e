//! Visitor and session identity over expiring storage.
//!
//! The store is read fresh on every access so concurrent tabs converge
//! through the shared medium; there is no cross-tab locking, and racing
//! tabs may briefly disagree on session renewal. When storage fails the
//! manager falls back to an in-memory copy, keeping identity stable for
//! the rest of the page load.

use std::sync::Mutex;

use waymark_core::{SessionIdentity, VisitorIdentity};

use crate::ids::new_id;
use crate::store::ExpiringStore;

pub struct IdentityManager {
    visitor_key: String,
    session_key: String,
    visitor_ttl_ms: i64,
    session_window_ms: i64,
    cached_visitor: Mutex<Option<VisitorIdentity>>,
    cached_session: Mutex<Option<SessionIdentity>>,
}

impl IdentityManager {
    pub fn new(website_id: &str, visitor_ttl_ms: i64, session_window_ms: i64) -> Self {
        IdentityManager {
            visitor_key: format!("wm:{}:visitor", website_id),
            session_key: format!("wm:{}:session", website_id),
            visitor_ttl_ms,
            session_window_ms,
            cached_visitor: Mutex::new(None),
            cached_session: Mutex::new(None),
        }
    }

    /// Resolve the visitor identity, creating it lazily on first access
    /// and regenerating it when the stored record has expired.
    pub fn visitor(&self, store: &ExpiringStore, now_ms: i64) -> VisitorIdentity {
        let mut cached = self.cached_visitor.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(visitor) = store.get::<VisitorIdentity>(&self.visitor_key, now_ms) {
            *cached = Some(visitor.clone());
            return visitor;
        }

        // Store miss: either first visit, expiry, or failed storage.
        // Reuse the in-memory copy while it is still in its window so a
        // storage-less page load keeps one stable visitor id.
        if let Some(ref visitor) = *cached {
            if now_ms - visitor.created_at_ms < self.visitor_ttl_ms {
                let visitor = visitor.clone();
                store.set(&self.visitor_key, &visitor, Some(self.visitor_ttl_ms), now_ms);
                return visitor;
            }
        }

        let visitor = VisitorIdentity {
            visitor_id: new_id(),
            created_at_ms: now_ms,
        };
        store.set(&self.visitor_key, &visitor, Some(self.visitor_ttl_ms), now_ms);
        *cached = Some(visitor.clone());
        visitor
    }

    /// Read the current session without sliding its window.
    ///
    /// Used by flush paths that need a session id but are not user
    /// interactions: a tab left idle must still time out even while
    /// timers keep firing. Creates a fresh session when the stored one
    /// is absent or stale.
    pub fn current_session(&self, store: &ExpiringStore, now_ms: i64) -> SessionIdentity {
        let cached = self.cached_session.lock().unwrap_or_else(|e| e.into_inner());
        let live = store
            .get::<SessionIdentity>(&self.session_key, now_ms)
            .or_else(|| cached.clone())
            .filter(|s| now_ms - s.last_seen_ms < self.session_window_ms);
        drop(cached);

        match live {
            Some(session) => session,
            None => self.touch_session(store, now_ms),
        }
    }

    /// Resolve the session and slide its window forward.
    ///
    /// A session is reused only while `last_seen_ms` is inside the
    /// window; otherwise a new one is created. Every call rewrites the
    /// record with a refreshed `last_seen_ms`.
    pub fn touch_session(&self, store: &ExpiringStore, now_ms: i64) -> SessionIdentity {
        let mut cached = self.cached_session.lock().unwrap_or_else(|e| e.into_inner());

        let live = store
            .get::<SessionIdentity>(&self.session_key, now_ms)
            .or_else(|| cached.clone())
            .filter(|s| now_ms - s.last_seen_ms < self.session_window_ms);

        let session = match live {
            Some(session) => SessionIdentity {
                session_id: session.session_id,
                last_seen_ms: now_ms,
            },
            None => SessionIdentity {
                session_id: new_id(),
                last_seen_ms: now_ms,
            },
        };

        store.set(
            &self.session_key,
            &session,
            Some(self.session_window_ms),
            now_ms,
        );
        *cached = Some(session.clone());
        session
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
