//! Replay frames and sequenced chunks.

use serde::{Deserialize, Serialize};

/// One recorder-emitted frame: an opaque DOM-mutation or interaction
/// record. The runtime never inspects frame contents; it only preserves
/// their order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplayFrame(pub serde_json::Value);

impl ReplayFrame {
    pub fn new(value: serde_json::Value) -> Self {
        ReplayFrame(value)
    }
}

/// A sequenced bundle of frames sent as one request to the replay
/// endpoint.
///
/// `sequence` is strictly increasing per session. A failed send must not
/// consume a sequence number: the pipeline rolls the counter back and
/// redelivers the same number on retry, so the backend can detect gaps
/// and duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayChunk {
    pub website_id: String,
    pub session_id: String,
    pub events: Vec<ReplayFrame>,
    pub sequence: u64,
    pub page: String,
}
