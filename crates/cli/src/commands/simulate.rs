//! `waymark simulate` -- run a scripted scenario through a tracker with
//! in-memory transports and report what was delivered.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use waymark_core::{ClickTarget, FunnelDefinition, ReplayFrame};
use waymark_runtime::transport::memory::{
    MemoryBeaconTransport, MemoryEventTransport, MemoryReplayTransport, StaticDefinitionSource,
};
use waymark_runtime::{
    FixedSampler, ManualClock, MemoryStore, Tracker, TrackerConfig, TrackerPorts,
};

use crate::scenario::{Scenario, Step};
use crate::OutputFormat;

pub(crate) async fn run(path: &Path, output: OutputFormat) -> Result<(), Box<dyn Error>> {
    let scenario = Scenario::load(path)?;
    let definitions = scenario.definitions_payload()?;

    let clock = Arc::new(ManualClock::new(0));
    let events = MemoryEventTransport::new();
    let replay = MemoryReplayTransport::new();
    let beacon = MemoryBeaconTransport::new();

    let mut config = TrackerConfig::from_attributes(
        &scenario.config.website_id,
        &scenario.config.features.join(","),
    );
    if let Some(tuning) = scenario.config.replay.clone() {
        config.replay = tuning;
    }

    let ports = TrackerPorts {
        clock: clock.clone(),
        store: Arc::new(MemoryStore::new()),
        events: Arc::new(events.clone()),
        replay: Arc::new(replay.clone()),
        beacon: Arc::new(beacon.clone()),
        definitions: Arc::new(StaticDefinitionSource::new(definitions.clone())),
        sampler: Arc::new(FixedSampler(scenario.config.sampled)),
    };

    let mut tracker = Tracker::new(config, ports);
    tracker.init().await;

    let mut frame_counter = 0u64;
    for step in &scenario.steps {
        match step {
            Step::Navigate { path } => tracker.on_navigation(path),
            Step::Click { tag, id, classes } => {
                let mut target = ClickTarget::new(tag.clone()).with_id(id.clone());
                for class in classes {
                    target = target.with_class(class.clone());
                }
                tracker.on_click(target);
            }
            Step::Custom { name } => tracker.on_custom_event(name),
            Step::Frame { count } => {
                for _ in 0..*count {
                    frame_counter += 1;
                    tracker.on_frame(ReplayFrame::new(serde_json::json!({
                        "seq": frame_counter,
                        "kind": "mutation",
                    })));
                }
            }
            Step::Advance { ms } => clock.advance(*ms),
            Step::Tick => {}
            Step::Idle => tracker.drain_idle(),
            Step::Hidden => tracker.on_visibility_hidden().await,
            Step::Unload => tracker.on_unload(),
        }
        tracker.tick().await;
    }

    report(&tracker, &definitions, &events, &replay, &beacon, output)
}

fn report(
    tracker: &Tracker,
    definitions: &serde_json::Value,
    events: &MemoryEventTransport,
    replay: &MemoryReplayTransport,
    beacon: &MemoryBeaconTransport,
    output: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let funnels = FunnelDefinition::list_from_json(definitions).unwrap_or_default();
    let delivered = events.sent();
    let chunks = replay.sent();
    let beaconed = beacon.sent();

    match output {
        OutputFormat::Json => {
            let states: serde_json::Map<String, serde_json::Value> = funnels
                .iter()
                .filter_map(|f| {
                    tracker
                        .funnel_state(&f.id)
                        .map(|s| (f.id.clone(), serde_json::to_value(s).unwrap_or_default()))
                })
                .collect();
            let out = serde_json::json!({
                "replay_sampled": tracker.replay_sampled(),
                "delivered_events": delivered,
                "delivered_chunks": chunks,
                "beaconed_chunks": beaconed,
                "funnel_states": states,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("delivered events: {}", delivered.len());
            for event in &delivered {
                println!(
                    "  {:?} {} step {} ({})",
                    event.event_type, event.funnel_id, event.step_index, event.step_name
                );
            }
            println!(
                "delivered replay chunks: {} (sequences {:?})",
                chunks.len(),
                chunks.iter().map(|c| c.sequence).collect::<Vec<_>>()
            );
            println!("beaconed chunks: {}", beaconed.len());
            for funnel in &funnels {
                if let Some(state) = tracker.funnel_state(&funnel.id) {
                    println!(
                        "funnel '{}': step {}/{}{}",
                        funnel.id,
                        state.current_step,
                        funnel.step_count(),
                        if state.converted { ", converted" } else { "" }
                    );
                }
            }
        }
    }
    Ok(())
}
