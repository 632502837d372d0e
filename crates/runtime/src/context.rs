//! The tracker runtime context.
//!
//! [`Tracker`] is the explicitly constructed object owning every
//! component: identity, funnel engine, delivery queue, replay pipeline,
//! bus, and idle queue. There is no module-level state; two trackers in
//! one process are fully independent, which is also what makes the
//! multi-page-load tests possible.
//!
//! The host drives the tracker with interaction callbacks
//! (`on_navigation`, `on_click`, `on_custom_event`, `on_frame`),
//! lifecycle callbacks (`on_visibility_hidden`, `on_unload`), and a
//! scheduling loop: arm one timer for [`Tracker::next_deadline`], call
//! [`Tracker::tick`] when it fires or after a burst of activity.

use std::sync::Arc;

use waymark_core::{ClickTarget, FunnelDefinition, FunnelState, ReplayFrame, Trigger};

use crate::bus::Bus;
use crate::clock::Clock;
use crate::config::{Feature, TrackerConfig};
use crate::funnel::FunnelEngine;
use crate::identity::IdentityManager;
use crate::idle::IdleQueue;
use crate::queue::DeliveryQueue;
use crate::replay::{RecorderConfig, ReplayPipeline};
use crate::store::{ExpiringStore, KeyValueStore};
use crate::transport::{
    BeaconTransport, DefinitionSource, EventTransport, ReplayTransport, Sampler,
};

/// Identity fields stamped onto every outbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySnapshot {
    pub website_id: String,
    pub visitor_id: String,
    pub session_id: String,
}

/// The injectable ports a tracker runs against.
pub struct TrackerPorts {
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn KeyValueStore>,
    pub events: Arc<dyn EventTransport>,
    pub replay: Arc<dyn ReplayTransport>,
    pub beacon: Arc<dyn BeaconTransport>,
    pub definitions: Arc<dyn DefinitionSource>,
    pub sampler: Arc<dyn Sampler>,
}

pub struct Tracker {
    config: TrackerConfig,
    ports: TrackerPorts,
    store: ExpiringStore,
    bus: Bus,
    identity: IdentityManager,
    queue: DeliveryQueue,
    funnels: Option<FunnelEngine>,
    replay: Option<ReplayPipeline>,
    recorder: Option<RecorderConfig>,
    idle: IdleQueue,
    current_page: String,
}

impl Tracker {
    pub fn new(config: TrackerConfig, ports: TrackerPorts) -> Self {
        let store = ExpiringStore::new(ports.store.clone());
        let identity = IdentityManager::new(
            &config.website_id,
            config.visitor_ttl_ms,
            config.session_window_ms,
        );
        let queue = DeliveryQueue::new(config.flush_delay_ms);
        let idle = IdleQueue::new(config.idle_timeout_ms);

        Tracker {
            config,
            ports,
            store,
            bus: Bus::new(),
            identity,
            queue,
            funnels: None,
            replay: None,
            recorder: None,
            idle,
            current_page: "/".to_string(),
        }
    }

    /// Initialize subsystems per the configured feature list: resolve
    /// identity, fetch funnel definitions, make the replay sampling
    /// draw. Infallible by policy -- a failed definitions fetch simply
    /// leaves the funnel engine off for this page load.
    pub async fn init(&mut self) {
        let now = self.ports.clock.now_ms();
        let visitor = self.identity.visitor(&self.store, now);
        let session = self.identity.touch_session(&self.store, now);

        if self.config.has_feature(Feature::Funnels) {
            match self
                .ports
                .definitions
                .fetch_definitions(&self.config.website_id)
                .await
            {
                Ok(payload) => match FunnelDefinition::list_from_json(&payload) {
                    Ok(definitions) => {
                        self.funnels = Some(FunnelEngine::load(
                            definitions,
                            &self.store,
                            &self.config.website_id,
                            self.config.persist_interval_ms,
                            now,
                        ));
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "funnel definitions unusable, funnels disabled");
                    }
                },
                Err(err) => {
                    tracing::debug!(error = %err, "funnel definitions fetch failed, funnels disabled");
                }
            }
        }

        if self.config.has_feature(Feature::Replay) {
            let sampled = self.ports.sampler.sample(self.config.replay.sampling_rate);
            self.replay = Some(ReplayPipeline::new(
                &self.config.website_id,
                &self.current_page,
                sampled,
                self.config.replay.clone(),
                &self.store,
                now,
            ));
            if sampled {
                self.recorder = Some(RecorderConfig::new());
            }
        }

        self.bus.publish(
            "ready",
            &serde_json::json!({
                "website_id": self.config.website_id,
                "visitor_id": visitor.visitor_id,
                "session_id": session.session_id,
                "replay_sampled": self.replay_sampled(),
            }),
        );
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Recorder options for the external capture library; present only
    /// on sampled page loads with the replay feature enabled.
    pub fn recorder_config(&self) -> Option<&RecorderConfig> {
        self.recorder.as_ref()
    }

    pub fn replay_sampled(&self) -> bool {
        self.replay.as_ref().is_some_and(|r| r.is_sampled())
    }

    pub fn funnel_state(&self, funnel_id: &str) -> Option<&FunnelState> {
        self.funnels.as_ref()?.state(funnel_id)
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    // ── Interaction callbacks ─────────────────────────────────────────

    /// Full navigation or single-page-app route change.
    pub fn on_navigation(&mut self, path: &str) {
        let now = self.ports.clock.now_ms();
        self.current_page = path.to_string();
        if let Some(replay) = &mut self.replay {
            replay.set_page(path);
        }
        self.dispatch(Trigger::page(path), now);
    }

    /// Delegated DOM click.
    pub fn on_click(&mut self, target: ClickTarget) {
        let now = self.ports.clock.now_ms();
        self.dispatch(Trigger::click(target), now);
    }

    /// Host-dispatched custom event.
    pub fn on_custom_event(&mut self, name: &str) {
        let now = self.ports.clock.now_ms();
        self.dispatch(Trigger::custom(name), now);
    }

    /// Recorder emit callback. Frames are not user interactions and do
    /// not slide the session window; the flush decision is made on the
    /// next tick.
    pub fn on_frame(&mut self, frame: ReplayFrame) {
        if let Some(replay) = &mut self.replay {
            replay.ingest(frame);
        }
    }

    fn dispatch(&mut self, trigger: Trigger, now_ms: i64) {
        let visitor = self.identity.visitor(&self.store, now_ms);
        let session = self.identity.touch_session(&self.store, now_ms);
        let snapshot = IdentitySnapshot {
            website_id: self.config.website_id.clone(),
            visitor_id: visitor.visitor_id,
            session_id: session.session_id,
        };
        if let Some(engine) = &mut self.funnels {
            engine.handle_trigger(
                &trigger,
                &snapshot,
                &mut self.queue,
                &self.bus,
                &self.store,
                now_ms,
            );
        }
    }

    // ── Scheduling ────────────────────────────────────────────────────

    /// Drive every due deadline: idle fallbacks, the throttled funnel
    /// persist, the delivery queue debounce, and the replay flush
    /// triggers.
    pub async fn tick(&mut self) {
        let now = self.ports.clock.now_ms();

        self.idle.poll(now);
        if let Some(engine) = &mut self.funnels {
            engine.poll(&self.store, now);
        }
        self.queue.poll(self.ports.events.as_ref(), now).await;

        if let Some(replay) = &mut self.replay {
            let session = self.identity.current_session(&self.store, now);
            replay
                .poll(
                    self.ports.replay.as_ref(),
                    &session.session_id,
                    &self.store,
                    &self.bus,
                    now,
                )
                .await;
        }
    }

    /// Earliest pending deadline across all components, for the host to
    /// arm one real timer against.
    pub fn next_deadline(&self) -> Option<i64> {
        [
            self.idle.next_deadline(),
            self.funnels.as_ref().and_then(|f| f.next_deadline()),
            self.queue.next_deadline(),
            self.replay.as_ref().and_then(|r| r.next_deadline()),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Schedule work for an idle moment, with the configured timeout
    /// fallback so it runs eventually even under continuous load.
    pub fn run_when_idle(&mut self, task: impl FnOnce() + Send + 'static) {
        let now = self.ports.clock.now_ms();
        self.idle.push(task, now);
    }

    /// The host reports the main thread idle.
    pub fn drain_idle(&mut self) {
        self.idle.drain_idle();
    }

    // ── Lifecycle ─────────────────────────────────────────────────────

    /// The page became hidden: the process may be suspended at any
    /// moment, so flush buffered replay frames immediately, regardless
    /// of timers.
    pub async fn on_visibility_hidden(&mut self) {
        let now = self.ports.clock.now_ms();
        if let Some(replay) = &mut self.replay {
            let session = self.identity.current_session(&self.store, now);
            replay
                .flush(
                    self.ports.replay.as_ref(),
                    &session.session_id,
                    &self.store,
                    &self.bus,
                    now,
                )
                .await;
        }
    }

    /// Page teardown: the synchronous last-chance path. Buffered frames
    /// go through the fire-and-forget beacon; pending funnel events and
    /// an un-elapsed persist throttle are accepted losses.
    pub fn on_unload(&mut self) {
        let now = self.ports.clock.now_ms();
        if let Some(replay) = &mut self.replay {
            let session = self.identity.current_session(&self.store, now);
            replay.flush_on_unload(
                self.ports.beacon.as_ref(),
                &session.session_id,
                &self.store,
                now,
            );
        }
    }
}
