//! Session-replay capture pipeline.
//!
//! Wraps an external DOM recorder's emit callback: frames accumulate in
//! an in-memory buffer and leave as sequenced chunks. Everything about
//! delivery is best-effort under an unreliable network -- the invariants
//! that do hold are frame order (preserved on success and retry), strict
//! sequence monotonicity (a failed send never consumes a number), and a
//! hard buffer cap (sustained failure drops the oldest frames rather
//! than growing without bound).

use waymark_core::{ReplayChunk, ReplayFrame};

use crate::bus::Bus;
use crate::store::ExpiringStore;
use crate::transport::{BeaconTransport, ReplayTransport};

// ──────────────────────────────────────────────
// Tuning
// ──────────────────────────────────────────────

/// Flush heuristics. The gap/early thresholds are tuning values, not
/// correctness conditions; adjust freely.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReplayTuning {
    /// Probability that a page load records at all.
    pub sampling_rate: f64,
    /// Buffer size that forces a flush.
    pub chunk_size: usize,
    /// Periodic flush ceiling.
    pub flush_interval_ms: i64,
    /// Minimum age of the last flush before the periodic timer fires
    /// again; suppresses a periodic send right after a size-based one.
    pub min_flush_gap_ms: i64,
    /// The first chunk flushes after this many frames so recording
    /// liveness is confirmed early.
    pub early_flush_after: usize,
    /// Hard cap on buffered frames under sustained send failure.
    pub max_buffer: usize,
    /// Expiry on the persisted sequence counter; scoped to the session
    /// window so a later session restarts at zero.
    pub sequence_ttl_ms: i64,
}

impl Default for ReplayTuning {
    fn default() -> Self {
        ReplayTuning {
            sampling_rate: 0.10,
            chunk_size: 500,
            flush_interval_ms: 10_000,
            min_flush_gap_ms: 2_000,
            early_flush_after: 2,
            max_buffer: 2_000,
            sequence_ttl_ms: 30 * 60 * 1000,
        }
    }
}

// ──────────────────────────────────────────────
// Recorder configuration
// ──────────────────────────────────────────────

/// Options handed to the external recorder library.
///
/// Input masking is a fixed default, not a choice: there is no
/// constructor or setter that disables it, so captured frames can never
/// contain field values from password or email inputs.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    mask_all_inputs: bool,
    mask_input_selector: &'static str,
}

impl RecorderConfig {
    pub fn new() -> Self {
        RecorderConfig {
            mask_all_inputs: true,
            mask_input_selector: "input[type=password], input[type=email]",
        }
    }

    pub fn mask_all_inputs(&self) -> bool {
        self.mask_all_inputs
    }

    pub fn mask_input_selector(&self) -> &str {
        self.mask_input_selector
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────────────────────────────────
// Pipeline
// ──────────────────────────────────────────────

pub struct ReplayPipeline {
    website_id: String,
    page: String,
    sampled: bool,
    tuning: ReplayTuning,
    sequence_key: String,
    buffer: Vec<ReplayFrame>,
    sequence: u64,
    last_flush_ms: Option<i64>,
    periodic_deadline_ms: i64,
    delivered: u64,
    in_flight: bool,
}

impl ReplayPipeline {
    /// Create the pipeline for one page load. `sampled` is the one-shot
    /// participation draw; the sequence counter is restored from
    /// session-scoped storage so a reload mid-session continues rather
    /// than restarting at zero.
    pub fn new(
        website_id: &str,
        page: &str,
        sampled: bool,
        tuning: ReplayTuning,
        store: &ExpiringStore,
        now_ms: i64,
    ) -> Self {
        let sequence_key = format!("wm:{}:replay_seq", website_id);
        let sequence = store.get::<u64>(&sequence_key, now_ms).unwrap_or(0);
        let periodic_deadline_ms = now_ms + tuning.flush_interval_ms;

        ReplayPipeline {
            website_id: website_id.to_string(),
            page: page.to_string(),
            sampled,
            tuning,
            sequence_key,
            buffer: Vec::new(),
            sequence,
            last_flush_ms: None,
            periodic_deadline_ms,
            delivered: 0,
            in_flight: false,
        }
    }

    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn set_page(&mut self, page: &str) {
        self.page = page.to_string();
    }

    /// Accept one recorder frame. Unsampled page loads do no capture
    /// work at all.
    pub fn ingest(&mut self, frame: ReplayFrame) {
        if !self.sampled {
            return;
        }
        self.buffer.push(frame);
        self.enforce_cap();
    }

    /// Whether a flush is due right now, by any trigger.
    pub fn wants_flush(&self, now_ms: i64) -> bool {
        if !self.sampled || self.buffer.is_empty() {
            return false;
        }
        if self.buffer.len() >= self.tuning.chunk_size {
            return true;
        }
        if self.last_flush_ms.is_none() && self.buffer.len() >= self.tuning.early_flush_after {
            return true;
        }
        now_ms >= self.periodic_deadline_ms && self.flush_gap_ok(now_ms)
    }

    /// Drive the periodic trigger and any due size/early flush.
    ///
    /// The periodic deadline is a recurring tick, independent of flush
    /// activity: it is a ceiling, not a trigger of its own, and defers
    /// (skipping this tick entirely) when a size-based flush happened
    /// within `min_flush_gap_ms`.
    pub async fn poll(
        &mut self,
        transport: &dyn ReplayTransport,
        session_id: &str,
        store: &ExpiringStore,
        bus: &Bus,
        now_ms: i64,
    ) {
        let due = self.wants_flush(now_ms);
        if now_ms >= self.periodic_deadline_ms {
            self.periodic_deadline_ms = now_ms + self.tuning.flush_interval_ms;
        }
        if due {
            self.flush(transport, session_id, store, bus, now_ms).await;
        }
    }

    pub fn next_deadline(&self) -> Option<i64> {
        if self.sampled {
            Some(self.periodic_deadline_ms)
        } else {
            None
        }
    }

    /// Send the buffered frames as one chunk.
    ///
    /// On transient failure the frames are reinserted at the front of
    /// the buffer (order preserved, cap enforced) and the sequence
    /// number is not consumed. Permanent rejection drops the chunk.
    pub async fn flush(
        &mut self,
        transport: &dyn ReplayTransport,
        session_id: &str,
        store: &ExpiringStore,
        bus: &Bus,
        now_ms: i64,
    ) {
        if !self.sampled || self.in_flight || self.buffer.is_empty() {
            return;
        }
        self.in_flight = true;

        let chunk = ReplayChunk {
            website_id: self.website_id.clone(),
            session_id: session_id.to_string(),
            events: std::mem::take(&mut self.buffer),
            sequence: self.sequence,
            page: self.page.clone(),
        };

        match transport.send_chunk(&chunk).await {
            Ok(()) => {
                self.sequence += 1;
                self.persist_sequence(store, now_ms);
                self.last_flush_ms = Some(now_ms);
                self.delivered += 1;
                if self.delivered == 1 {
                    bus.publish(
                        "replay_started",
                        &serde_json::json!({ "session_id": session_id }),
                    );
                }
            }
            Err(err) if err.is_permanent() => {
                tracing::debug!(
                    sequence = chunk.sequence,
                    frames = chunk.events.len(),
                    error = %err,
                    "replay chunk rejected, dropping"
                );
            }
            Err(err) => {
                tracing::debug!(
                    sequence = chunk.sequence,
                    error = %err,
                    "replay chunk send failed, reinserting frames"
                );
                // Frames captured during the in-flight send sit in
                // self.buffer; the failed chunk's frames are older and
                // go back in front of them.
                let mut restored = chunk.events;
                restored.append(&mut self.buffer);
                self.buffer = restored;
                self.enforce_cap();
            }
        }

        self.in_flight = false;
    }

    /// Last-chance flush on page teardown, through the fire-and-forget
    /// beacon path. A queued handoff consumes the sequence number; there
    /// is nobody left to retry either way.
    pub fn flush_on_unload(
        &mut self,
        beacon: &dyn BeaconTransport,
        session_id: &str,
        store: &ExpiringStore,
        now_ms: i64,
    ) {
        if !self.sampled || self.buffer.is_empty() {
            return;
        }

        let chunk = ReplayChunk {
            website_id: self.website_id.clone(),
            session_id: session_id.to_string(),
            events: std::mem::take(&mut self.buffer),
            sequence: self.sequence,
            page: self.page.clone(),
        };

        if beacon.send_beacon(&chunk) {
            self.sequence += 1;
            self.persist_sequence(store, now_ms);
        }
    }

    fn flush_gap_ok(&self, now_ms: i64) -> bool {
        self.last_flush_ms
            .map_or(true, |last| now_ms - last >= self.tuning.min_flush_gap_ms)
    }

    fn enforce_cap(&mut self) {
        let len = self.buffer.len();
        if len > self.tuning.max_buffer {
            let dropped = len - self.tuning.max_buffer;
            self.buffer.drain(..dropped);
            tracing::debug!(dropped, "replay buffer over cap, dropping oldest frames");
        }
    }

    fn persist_sequence(&self, store: &ExpiringStore, now_ms: i64) {
        store.set(
            &self.sequence_key,
            &self.sequence,
            Some(self.tuning.sequence_ttl_ms),
            now_ms,
        );
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::transport::memory::{MemoryBeaconTransport, MemoryReplayTransport};
    use crate::transport::TransportError;
    use std::sync::Arc;

    fn frame(n: u64) -> ReplayFrame {
        ReplayFrame::new(serde_json::json!({ "n": n }))
    }

    fn tuning() -> ReplayTuning {
        ReplayTuning {
            chunk_size: 5,
            flush_interval_ms: 10_000,
            min_flush_gap_ms: 2_000,
            early_flush_after: 2,
            max_buffer: 10,
            ..ReplayTuning::default()
        }
    }

    fn pipeline(store: &ExpiringStore) -> ReplayPipeline {
        ReplayPipeline::new("site", "/", true, tuning(), store, 0)
    }

    fn store() -> ExpiringStore {
        ExpiringStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn unsampled_load_does_no_capture_work() {
        let store = store();
        let mut p = ReplayPipeline::new("site", "/", false, tuning(), &store, 0);
        p.ingest(frame(1));
        assert_eq!(p.buffered(), 0);
        assert!(!p.wants_flush(999_999));
        assert_eq!(p.next_deadline(), None);
    }

    #[tokio::test]
    async fn early_flush_confirms_recording() {
        let store = store();
        let transport = MemoryReplayTransport::new();
        let bus = Bus::new();
        let mut p = pipeline(&store);

        p.ingest(frame(1));
        assert!(!p.wants_flush(100));
        p.ingest(frame(2));
        assert!(p.wants_flush(100));

        p.poll(&transport, "sess", &store, &bus, 100).await;
        assert_eq!(transport.sequences(), vec![0]);
        assert_eq!(transport.sent()[0].events.len(), 2);
    }

    #[tokio::test]
    async fn sequences_are_gapless_across_flushes() {
        let store = store();
        let transport = MemoryReplayTransport::new();
        let bus = Bus::new();
        let mut p = pipeline(&store);
        let mut now = 0;

        for round in 0..4u64 {
            for i in 0..5 {
                p.ingest(frame(round * 5 + i));
            }
            now += 3_000;
            p.poll(&transport, "sess", &store, &bus, now).await;
        }
        assert_eq!(transport.sequences(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn failed_send_redelivers_same_sequence_and_frames() {
        let store = store();
        let transport = MemoryReplayTransport::new();
        let bus = Bus::new();
        let mut p = pipeline(&store);

        for i in 0..5 {
            p.ingest(frame(i));
        }
        transport.fail_next(TransportError::transient("offline"));
        p.flush(&transport, "sess", &store, &bus, 0).await;
        assert_eq!(transport.sent().len(), 0);
        assert_eq!(p.buffered(), 5);

        // More frames accumulate before the retry; the redelivered chunk
        // keeps sequence 0 and carries a superset in original order.
        p.ingest(frame(5));
        p.flush(&transport, "sess", &store, &bus, 3_000).await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].sequence, 0);
        let ns: Vec<u64> = sent[0]
            .events
            .iter()
            .map(|f| f.0["n"].as_u64().unwrap())
            .collect();
        assert_eq!(ns, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn buffer_never_exceeds_cap_under_sustained_failure() {
        let store = store();
        let transport = MemoryReplayTransport::new();
        let bus = Bus::new();
        let mut p = pipeline(&store);

        for i in 0..50u64 {
            transport.fail_next(TransportError::transient("down"));
            p.ingest(frame(i));
            p.flush(&transport, "sess", &store, &bus, i as i64 * 100).await;
            assert!(p.buffered() <= 10);
        }

        // The oldest frames were sacrificed; the newest survive.
        assert_eq!(p.buffered(), 10);
    }

    #[tokio::test]
    async fn permanent_rejection_drops_chunk_without_consuming_sequence() {
        let store = store();
        let transport = MemoryReplayTransport::new();
        let bus = Bus::new();
        let mut p = pipeline(&store);

        for i in 0..5 {
            p.ingest(frame(i));
        }
        transport.fail_next(TransportError::from_status(400));
        p.flush(&transport, "sess", &store, &bus, 0).await;
        assert_eq!(p.buffered(), 0);

        // Next chunk reuses the unconsumed sequence number.
        for i in 5..10 {
            p.ingest(frame(i));
        }
        p.flush(&transport, "sess", &store, &bus, 3_000).await;
        assert_eq!(transport.sequences(), vec![0]);
    }

    #[tokio::test]
    async fn periodic_flush_defers_while_recent() {
        let store = store();
        let transport = MemoryReplayTransport::new();
        let bus = Bus::new();
        let mut p = pipeline(&store);

        for i in 0..5 {
            p.ingest(frame(i));
        }
        // Size-based flush just before the periodic deadline.
        p.flush(&transport, "sess", &store, &bus, 9_500).await;
        assert_eq!(transport.sent().len(), 1);

        // The periodic tick at 10s finds the last flush only 500ms old:
        // it skips this tick and rearms.
        p.ingest(frame(99));
        p.poll(&transport, "sess", &store, &bus, 10_000).await;
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(p.buffered(), 1);

        // The next tick is past the freshness gap and flushes.
        p.poll(&transport, "sess", &store, &bus, 20_000).await;
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn sequence_resumes_across_reload() {
        let backend = Arc::new(MemoryStore::new());
        let store = ExpiringStore::new(backend.clone());
        let transport = MemoryReplayTransport::new();
        let bus = Bus::new();

        {
            let mut p = pipeline(&store);
            for i in 0..5 {
                p.ingest(frame(i));
            }
            p.flush(&transport, "sess", &store, &bus, 0).await;
        }

        // Reload within the session window: the counter continues.
        let mut p2 = ReplayPipeline::new("site", "/", true, tuning(), &store, 5_000);
        for i in 0..5 {
            p2.ingest(frame(i));
        }
        p2.flush(&transport, "sess", &store, &bus, 5_000).await;
        assert_eq!(transport.sequences(), vec![0, 1]);
    }

    #[test]
    fn unload_flush_goes_through_the_beacon() {
        let store = store();
        let beacon = MemoryBeaconTransport::new();
        let mut p = pipeline(&store);

        p.ingest(frame(1));
        p.flush_on_unload(&beacon, "sess", &store, 100);

        let sent = beacon.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].sequence, 0);
        assert_eq!(p.buffered(), 0);
    }

    #[test]
    fn recorder_config_always_masks() {
        let config = RecorderConfig::default();
        assert!(config.mask_all_inputs());
        assert!(config.mask_input_selector().contains("password"));
        assert!(config.mask_input_selector().contains("email"));
    }

    #[tokio::test]
    async fn replay_started_broadcast_on_first_delivery() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let store = store();
        let transport = MemoryReplayTransport::new();
        let bus = Bus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        bus.subscribe(move |topic, _| {
            if topic == "replay_started" {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let mut p = pipeline(&store);
        for round in 0..2 {
            for i in 0..5 {
                p.ingest(frame(round * 5 + i));
            }
            p.flush(&transport, "sess", &store, &bus, round as i64 * 3_000)
                .await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
