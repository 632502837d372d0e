//! Persisted visitor and session identity records.

use serde::{Deserialize, Serialize};

/// Long-lived anonymous browser identity, persisted with a ~1 year
/// expiry. Never mutated after creation; regenerated when the stored
/// record is absent or expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorIdentity {
    pub visitor_id: String,
    pub created_at_ms: i64,
}

/// Sliding-window session identity. Every interaction refreshes
/// `last_seen_ms`; a record older than the session window is replaced by
/// a fresh session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub session_id: String,
    pub last_seen_ms: i64,
}
