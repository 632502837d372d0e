//! Outbound event delivery queue.
//!
//! Accumulates funnel events, coalesces bursts behind a short debounce
//! deadline, and delivers them through the [`EventTransport`] port. On
//! transient failure the failed event and everything behind it go back
//! to the front of the queue in order -- no event is dropped, duplicate
//! delivery is the backend's problem. Permanently rejected events are
//! dropped so one poison payload cannot wedge the queue.

use waymark_core::FunnelEvent;

use crate::transport::EventTransport;

pub struct DeliveryQueue {
    flush_delay_ms: i64,
    pending: Vec<FunnelEvent>,
    deadline_ms: Option<i64>,
    in_flight: bool,
}

impl DeliveryQueue {
    pub fn new(flush_delay_ms: i64) -> Self {
        DeliveryQueue {
            flush_delay_ms,
            pending: Vec::new(),
            deadline_ms: None,
            in_flight: false,
        }
    }

    /// Add an event; the first event of a burst arms the flush deadline.
    pub fn enqueue(&mut self, event: FunnelEvent, now_ms: i64) {
        self.pending.push(event);
        if self.deadline_ms.is_none() {
            self.deadline_ms = Some(now_ms + self.flush_delay_ms);
        }
    }

    pub fn next_deadline(&self) -> Option<i64> {
        self.deadline_ms
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Flush when the debounce deadline has passed.
    pub async fn poll(&mut self, transport: &dyn EventTransport, now_ms: i64) {
        if matches!(self.deadline_ms, Some(deadline) if now_ms >= deadline) {
            self.flush(transport, now_ms).await;
        }
    }

    /// Send the whole batch now.
    ///
    /// At most one flush runs at a time; events enqueued while a send is
    /// in flight land in the fresh buffer and are picked up by the next
    /// deadline.
    pub async fn flush(&mut self, transport: &dyn EventTransport, now_ms: i64) {
        if self.in_flight || self.pending.is_empty() {
            return;
        }
        self.in_flight = true;
        self.deadline_ms = None;
        let batch = std::mem::take(&mut self.pending);

        let mut requeue = Vec::new();
        let mut batch_iter = batch.into_iter();
        while let Some(event) = batch_iter.next() {
            match transport.send_event(&event).await {
                Ok(()) => {}
                Err(err) if err.is_permanent() => {
                    tracing::debug!(
                        funnel_id = %event.funnel_id,
                        error = %err,
                        "event permanently rejected, dropping"
                    );
                }
                Err(err) => {
                    tracing::debug!(error = %err, "event delivery failed, requeueing batch");
                    requeue.push(event);
                    requeue.extend(batch_iter);
                    break;
                }
            }
        }

        if !requeue.is_empty() {
            // Preserve temporal order: the failed batch goes in front of
            // anything enqueued while the send was in flight.
            requeue.append(&mut self.pending);
            self.pending = requeue;
            self.deadline_ms = Some(now_ms + self.flush_delay_ms);
        }
        self.in_flight = false;
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
