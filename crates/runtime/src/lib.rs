//! Waymark tracking runtime.
//!
//! The runtime models the browser-embedded telemetry core of a
//! funnel/replay/heatmap product as a deterministic, port-driven state
//! machine. All time, randomness, storage, and network access flow
//! through injectable ports ([`Clock`], [`KeyValueStore`], the transport
//! traits, [`Sampler`]), so a test or an embedding host can drive the
//! entire pipeline with a manual clock and scripted transports.
//!
//! Scheduling is deadline-polled rather than callback-driven: components
//! expose `next_deadline()` and the host calls [`Tracker::tick`] when a
//! deadline is due (and after bursts of activity). This keeps the runtime
//! single-threaded, cooperative, and exactly reproducible under test.
//!
//! Failure policy: nothing in steady-state operation returns an error to
//! the host. Transient transport failures requeue data (bounded by buffer
//! caps), permanent rejections drop it, storage failures degrade to
//! memory-only operation, and definition fetch failures disable the
//! funnel engine for the page load. Failures surface only as
//! `tracing::debug!` events.

mod bus;
mod clock;
mod config;
mod context;
mod funnel;
mod identity;
mod ids;
mod idle;
mod queue;
mod replay;
mod store;
mod throttle;
pub mod transport;

pub use bus::Bus;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Feature, TrackerConfig};
pub use context::{IdentitySnapshot, Tracker, TrackerPorts};
pub use funnel::FunnelEngine;
pub use identity::IdentityManager;
pub use ids::new_id;
pub use idle::IdleQueue;
pub use queue::DeliveryQueue;
pub use replay::{RecorderConfig, ReplayPipeline, ReplayTuning};
pub use store::{ExpiringStore, KeyValueStore, MemoryStore, NullStore};
pub use throttle::Throttle;
pub use transport::{
    BeaconTransport, DefinitionSource, EventTransport, FixedSampler, RandomSampler, ReplayTransport,
    Sampler, TransportError,
};
