//! Transport ports and their failure taxonomy.
//!
//! Three delivery capabilities with materially different guarantees:
//!
//! - [`EventTransport`] / [`ReplayTransport`] -- ordinary asynchronous
//!   POSTs whose results feed the requeue/retry machinery;
//! - [`BeaconTransport`] -- the durable best-effort send used on page
//!   unload: fire-and-forget, must not block, reports only "queued";
//! - [`DefinitionSource`] -- the read side (funnel definitions fetch).
//!
//! In-memory implementations live in [`memory`] and ship as library code
//! so hosts and the CLI harness can run the pipeline offline.

pub mod memory;

#[cfg(feature = "http")]
pub mod http;

use async_trait::async_trait;
use waymark_core::{FunnelEvent, ReplayChunk};

/// Delivery failure, classified for the retry policy.
///
/// Everything is transient except an HTTP 400, which marks the payload
/// itself as rejected: retrying it would loop forever on the same poison
/// chunk.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Network failure or retryable server response. The payload is
    /// requeued, bounded by the owning pipeline's buffer cap.
    #[error("transient transport failure: {message}")]
    Transient { message: String },

    /// The endpoint rejected the payload (HTTP 400). Dropped, never
    /// retried.
    #[error("payload rejected with status {status}: {message}")]
    Permanent { status: u16, message: String },
}

impl TransportError {
    pub fn transient(message: impl Into<String>) -> Self {
        TransportError::Transient {
            message: message.into(),
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, TransportError::Permanent { .. })
    }

    /// Classify an HTTP status: 2xx is success territory (not an error),
    /// 400 is permanent, everything else transient.
    pub fn from_status(status: u16) -> Self {
        if status == 400 {
            TransportError::Permanent {
                status,
                message: "request rejected".to_string(),
            }
        } else {
            TransportError::Transient {
                message: format!("http status {}", status),
            }
        }
    }
}

/// Delivers one funnel event to the ingestion endpoint.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn send_event(&self, event: &FunnelEvent) -> Result<(), TransportError>;
}

/// Delivers one sequenced replay chunk to the replay endpoint.
#[async_trait]
pub trait ReplayTransport: Send + Sync {
    async fn send_chunk(&self, chunk: &ReplayChunk) -> Result<(), TransportError>;
}

/// Durable best-effort send for page teardown. Dispatch must not block
/// or delay navigation; the return value only says whether the payload
/// was handed off, not whether it arrived.
pub trait BeaconTransport: Send + Sync {
    fn send_beacon(&self, chunk: &ReplayChunk) -> bool;
}

/// Fetches the active funnel definitions for a site.
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    async fn fetch_definitions(
        &self,
        website_id: &str,
    ) -> Result<serde_json::Value, TransportError>;
}

/// One-shot participation draw for replay sampling.
pub trait Sampler: Send + Sync {
    /// `rate` is a probability in `0.0..=1.0`.
    fn sample(&self, rate: f64) -> bool;
}

/// Real random draw.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSampler;

impl Sampler for RandomSampler {
    fn sample(&self, rate: f64) -> bool {
        use rand::Rng;
        rand::thread_rng().gen::<f64>() < rate
    }
}

/// Fixed draw for tests and the offline harness.
#[derive(Debug, Clone, Copy)]
pub struct FixedSampler(pub bool);

impl Sampler for FixedSampler {
    fn sample(&self, _rate: f64) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_400_is_permanent() {
        assert!(TransportError::from_status(400).is_permanent());
    }

    #[test]
    fn other_statuses_are_transient() {
        for status in [401, 403, 404, 429, 500, 502, 503] {
            assert!(!TransportError::from_status(status).is_permanent());
        }
    }
}
