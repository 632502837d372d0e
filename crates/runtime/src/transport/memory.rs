//! In-memory transports for tests and the offline harness.
//!
//! Failures are scripted: each `fail_next` call queues one error that the
//! next send consumes, so a test can express "the first two sends fail,
//! the third succeeds" without a fake HTTP server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use waymark_core::{FunnelEvent, ReplayChunk};

use super::{BeaconTransport, DefinitionSource, EventTransport, ReplayTransport, TransportError};

/// Scripted outcomes, consumed one per send in FIFO order. `None` is an
/// explicit success slot; an empty script means every send succeeds.
#[derive(Default)]
struct Script {
    outcomes: VecDeque<Option<TransportError>>,
}

impl Script {
    fn next_failure(&mut self) -> Option<TransportError> {
        self.outcomes.pop_front().flatten()
    }
}

/// Records delivered funnel events.
#[derive(Clone, Default)]
pub struct MemoryEventTransport {
    sent: Arc<Mutex<Vec<FunnelEvent>>>,
    script: Arc<Mutex<Script>>,
}

impl MemoryEventTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure for the next unscripted send attempt.
    pub fn fail_next(&self, error: TransportError) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .outcomes
            .push_back(Some(error));
    }

    /// Queue an explicit success slot, for scripting "succeed, then
    /// fail" sequences.
    pub fn pass_next(&self) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .outcomes
            .push_back(None);
    }

    pub fn sent(&self) -> Vec<FunnelEvent> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl EventTransport for MemoryEventTransport {
    async fn send_event(&self, event: &FunnelEvent) -> Result<(), TransportError> {
        if let Some(err) = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .next_failure()
        {
            return Err(err);
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}

/// Records delivered replay chunks.
#[derive(Clone, Default)]
pub struct MemoryReplayTransport {
    sent: Arc<Mutex<Vec<ReplayChunk>>>,
    script: Arc<Mutex<Script>>,
}

impl MemoryReplayTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, error: TransportError) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .outcomes
            .push_back(Some(error));
    }

    pub fn pass_next(&self) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .outcomes
            .push_back(None);
    }

    pub fn sent(&self) -> Vec<ReplayChunk> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Delivered sequence numbers, in delivery order.
    pub fn sequences(&self) -> Vec<u64> {
        self.sent()
            .iter()
            .map(|chunk| chunk.sequence)
            .collect()
    }
}

#[async_trait]
impl ReplayTransport for MemoryReplayTransport {
    async fn send_chunk(&self, chunk: &ReplayChunk) -> Result<(), TransportError> {
        if let Some(err) = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .next_failure()
        {
            return Err(err);
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(chunk.clone());
        Ok(())
    }
}

/// Records beaconed chunks; handoff always succeeds.
#[derive(Clone, Default)]
pub struct MemoryBeaconTransport {
    sent: Arc<Mutex<Vec<ReplayChunk>>>,
}

impl MemoryBeaconTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<ReplayChunk> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl BeaconTransport for MemoryBeaconTransport {
    fn send_beacon(&self, chunk: &ReplayChunk) -> bool {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(chunk.clone());
        true
    }
}

/// Serves a fixed definitions payload, or a scripted failure.
#[derive(Clone)]
pub struct StaticDefinitionSource {
    payload: serde_json::Value,
    fail: Arc<Mutex<Option<TransportError>>>,
}

impl StaticDefinitionSource {
    pub fn new(payload: serde_json::Value) -> Self {
        StaticDefinitionSource {
            payload,
            fail: Arc::new(Mutex::new(None)),
        }
    }

    /// An empty, always-successful source.
    pub fn empty() -> Self {
        Self::new(serde_json::json!([]))
    }

    pub fn fail_with(&self, error: TransportError) {
        *self.fail.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }
}

#[async_trait]
impl DefinitionSource for StaticDefinitionSource {
    async fn fetch_definitions(
        &self,
        _website_id: &str,
    ) -> Result<serde_json::Value, TransportError> {
        if let Some(err) = self
            .fail
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Err(err);
        }
        Ok(self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> FunnelEvent {
        FunnelEvent {
            website_id: "w".to_string(),
            visitor_id: "v".to_string(),
            session_id: "s".to_string(),
            funnel_id: "f".to_string(),
            step_index: 1,
            step_name: "Step".to_string(),
            event_type: waymark_core::EventType::Progress,
            current_step: 1,
            completed: vec![0],
            started_at_ms: Some(0),
            timestamp_ms: 0,
        }
    }

    #[tokio::test]
    async fn scripted_failure_consumes_once() {
        let transport = MemoryEventTransport::new();
        transport.fail_next(TransportError::transient("down"));

        assert!(transport.send_event(&event()).await.is_err());
        assert!(transport.send_event(&event()).await.is_ok());
        assert_eq!(transport.sent().len(), 1);
    }
}
