//! Funnel progression engine.
//!
//! Holds one state machine per active funnel, evaluates every trigger
//! against every step, and applies the strict-sequential advancement
//! rule implemented by [`FunnelState::try_advance`]. Every advancement
//! enqueues one outbound event and republishes on the bus; the full
//! state map is persisted through a throttled writer so rapid triggers
//! cannot cause a write storm.

use std::collections::BTreeMap;

use waymark_core::{EventType, FunnelDefinition, FunnelEvent, FunnelState, Trigger};

use crate::bus::Bus;
use crate::context::IdentitySnapshot;
use crate::queue::DeliveryQueue;
use crate::store::ExpiringStore;
use crate::throttle::Throttle;

struct TrackedFunnel {
    definition: FunnelDefinition,
    state: FunnelState,
}

pub struct FunnelEngine {
    storage_key: String,
    funnels: Vec<TrackedFunnel>,
    persist: Throttle<()>,
}

impl FunnelEngine {
    /// Build the engine from freshly fetched definitions, merging each
    /// with any previously persisted state. Definitions arrive already
    /// filtered to active funnels with at least one step.
    pub fn load(
        definitions: Vec<FunnelDefinition>,
        store: &ExpiringStore,
        website_id: &str,
        persist_interval_ms: i64,
        now_ms: i64,
    ) -> Self {
        let storage_key = format!("wm:{}:funnels", website_id);
        let saved: BTreeMap<String, FunnelState> =
            store.get(&storage_key, now_ms).unwrap_or_default();

        let funnels = definitions
            .into_iter()
            .map(|definition| {
                let state = saved.get(&definition.id).cloned().unwrap_or_default();
                TrackedFunnel { definition, state }
            })
            .collect();

        FunnelEngine {
            storage_key,
            funnels,
            persist: Throttle::new(persist_interval_ms),
        }
    }

    pub fn len(&self) -> usize {
        self.funnels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funnels.is_empty()
    }

    pub fn state(&self, funnel_id: &str) -> Option<&FunnelState> {
        self.funnels
            .iter()
            .find(|f| f.definition.id == funnel_id)
            .map(|f| &f.state)
    }

    /// Evaluate one trigger against every funnel.
    ///
    /// Steps are checked in definition order, so a trigger satisfying
    /// consecutive steps walks the funnel through all of them in one
    /// call. Each advancement emits one event and one bus broadcast;
    /// conversion broadcasts `funnel_complete` exactly once per run.
    pub fn handle_trigger(
        &mut self,
        trigger: &Trigger,
        identity: &IdentitySnapshot,
        queue: &mut DeliveryQueue,
        bus: &Bus,
        store: &ExpiringStore,
        now_ms: i64,
    ) {
        let mut advanced = false;

        for funnel in &mut self.funnels {
            let total = funnel.definition.step_count();
            for (idx, step) in funnel.definition.steps.iter().enumerate() {
                if !step.condition.matches(trigger) {
                    continue;
                }
                let Some(event_type) = funnel.state.try_advance(idx + 1, total, now_ms) else {
                    continue;
                };
                advanced = true;

                let event = FunnelEvent {
                    website_id: identity.website_id.clone(),
                    visitor_id: identity.visitor_id.clone(),
                    session_id: identity.session_id.clone(),
                    funnel_id: funnel.definition.id.clone(),
                    step_index: idx + 1,
                    step_name: step.name.clone(),
                    event_type,
                    current_step: funnel.state.current_step,
                    completed: funnel.state.completed.clone(),
                    started_at_ms: funnel.state.started_at_ms,
                    timestamp_ms: now_ms,
                };
                queue.enqueue(event, now_ms);

                let detail = serde_json::json!({
                    "funnel_id": funnel.definition.id,
                    "step_index": idx + 1,
                    "step_name": step.name,
                    "converted": funnel.state.converted,
                });
                let topic = match event_type {
                    EventType::Conversion => "funnel_complete",
                    EventType::Progress => "funnel_progress",
                };
                bus.publish(topic, &detail);
            }
        }

        if advanced && self.persist.call((), now_ms).is_some() {
            self.write_state(store, now_ms);
        }
    }

    /// Deliver a due throttled persist.
    pub fn poll(&mut self, store: &ExpiringStore, now_ms: i64) {
        if self.persist.poll(now_ms).is_some() {
            self.write_state(store, now_ms);
        }
    }

    pub fn next_deadline(&self) -> Option<i64> {
        self.persist.next_deadline()
    }

    fn write_state(&self, store: &ExpiringStore, now_ms: i64) {
        let map: BTreeMap<&str, &FunnelState> = self
            .funnels
            .iter()
            .map(|f| (f.definition.id.as_str(), &f.state))
            .collect();
        if !store.set(&self.storage_key, &map, None, now_ms) {
            tracing::debug!("funnel state persist failed, continuing in memory");
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::sync::Arc;
    use waymark_core::ClickTarget;

    fn definitions() -> Vec<FunnelDefinition> {
        FunnelDefinition::list_from_json(&serde_json::json!([{
            "id": "checkout",
            "name": "Checkout",
            "is_active": true,
            "steps": [
                { "type": "page", "name": "Pricing", "condition": { "page": "/pricing" } },
                { "type": "event", "name": "Buy", "condition": { "event": "#buy" } },
                { "type": "custom", "name": "Purchase", "condition": { "custom": "purchase_complete" } }
            ]
        }]))
        .unwrap()
    }

    fn identity() -> IdentitySnapshot {
        IdentitySnapshot {
            website_id: "site".to_string(),
            visitor_id: "visitor".to_string(),
            session_id: "session".to_string(),
        }
    }

    fn store() -> ExpiringStore {
        ExpiringStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn out_of_order_trigger_is_ignored() {
        let store = store();
        let mut engine = FunnelEngine::load(definitions(), &store, "site", 500, 0);
        let mut queue = DeliveryQueue::new(250);
        let bus = Bus::new();

        // Step 3's condition before step 1: nothing may move.
        engine.handle_trigger(
            &Trigger::custom("purchase_complete"),
            &identity(),
            &mut queue,
            &bus,
            &store,
            0,
        );
        assert_eq!(engine.state("checkout").unwrap().current_step, 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn advancement_enqueues_one_event_per_step() {
        let store = store();
        let mut engine = FunnelEngine::load(definitions(), &store, "site", 500, 0);
        let mut queue = DeliveryQueue::new(250);
        let bus = Bus::new();

        engine.handle_trigger(
            &Trigger::page("/pricing"),
            &identity(),
            &mut queue,
            &bus,
            &store,
            10,
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(engine.state("checkout").unwrap().current_step, 1);

        engine.handle_trigger(
            &Trigger::click(ClickTarget::new("button").with_id("buy")),
            &identity(),
            &mut queue,
            &bus,
            &store,
            20,
        );
        assert_eq!(queue.len(), 2);
        assert_eq!(engine.state("checkout").unwrap().current_step, 2);
    }

    #[test]
    fn funnel_complete_broadcast_fires_exactly_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let store = store();
        let mut engine = FunnelEngine::load(definitions(), &store, "site", 500, 0);
        let mut queue = DeliveryQueue::new(250);
        let bus = Bus::new();

        let completions = Arc::new(AtomicUsize::new(0));
        let counter = completions.clone();
        bus.subscribe(move |topic, _| {
            if topic == "funnel_complete" {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        for (trigger, at) in [
            (Trigger::page("/pricing"), 0),
            (Trigger::click(ClickTarget::new("a").with_id("buy")), 10),
            (Trigger::custom("purchase_complete"), 20),
            // Post-conversion noise must not re-broadcast.
            (Trigger::custom("purchase_complete"), 30),
        ] {
            engine.handle_trigger(&trigger, &identity(), &mut queue, &bus, &store, at);
        }

        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert!(engine.state("checkout").unwrap().converted);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn persistence_is_throttled_with_trailing_write() {
        let backend = Arc::new(MemoryStore::new());
        let store = ExpiringStore::new(backend.clone());
        let mut engine = FunnelEngine::load(definitions(), &store, "site", 500, 0);
        let mut queue = DeliveryQueue::new(250);
        let bus = Bus::new();

        engine.handle_trigger(&Trigger::page("/pricing"), &identity(), &mut queue, &bus, &store, 0);
        // First advancement writes immediately (leading edge).
        let first_blob = backend.get("wm:site:funnels").unwrap();

        engine.handle_trigger(
            &Trigger::click(ClickTarget::new("a").with_id("buy")),
            &identity(),
            &mut queue,
            &bus,
            &store,
            100,
        );
        // Mid-interval: the write is held, storage still has step 1.
        assert_eq!(backend.get("wm:site:funnels").unwrap(), first_blob);

        engine.poll(&store, 500);
        assert_ne!(backend.get("wm:site:funnels").unwrap(), first_blob);
    }

    #[test]
    fn state_survives_a_reload() {
        let backend = Arc::new(MemoryStore::new());
        let store = ExpiringStore::new(backend.clone());

        {
            let mut engine = FunnelEngine::load(definitions(), &store, "site", 500, 0);
            let mut queue = DeliveryQueue::new(250);
            let bus = Bus::new();
            engine.handle_trigger(
                &Trigger::page("/pricing"),
                &identity(),
                &mut queue,
                &bus,
                &store,
                0,
            );
        }

        // New page load, same storage medium.
        let engine = FunnelEngine::load(definitions(), &store, "site", 500, 1_000);
        assert_eq!(engine.state("checkout").unwrap().current_step, 1);
    }
}
