//! Scenario files: a scripted sequence of triggers, frames, and clock
//! advances driven through a tracker by `waymark simulate`.
//!
//! ```toml
//! [config]
//! website_id = "site-1"
//! features = ["funnels", "replay"]
//! sampled = true
//!
//! [[config.funnels]]
//! id = "checkout"
//! name = "Checkout"
//! is_active = true
//! steps = [
//!     { type = "page", name = "Pricing", condition = { page = "/pricing" } },
//! ]
//!
//! [[step]]
//! action = "navigate"
//! path = "/pricing"
//!
//! [[step]]
//! action = "advance"
//! ms = 250
//! ```

use std::error::Error;
use std::path::Path;

use serde::Deserialize;
use waymark_runtime::ReplayTuning;

#[derive(Debug, Deserialize)]
pub(crate) struct Scenario {
    pub config: ScenarioConfig,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScenarioConfig {
    pub website_id: String,
    #[serde(default)]
    pub features: Vec<String>,
    /// Replaces the sampling draw so scenario runs are deterministic.
    #[serde(default)]
    pub sampled: bool,
    /// Funnel definitions in the backend's wire shape.
    #[serde(default)]
    pub funnels: Option<toml::Value>,
    #[serde(default)]
    pub replay: Option<ReplayTuning>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum Step {
    /// Page navigation (full load or SPA route change).
    Navigate { path: String },
    /// DOM click on an element snapshot.
    Click {
        #[serde(default)]
        tag: String,
        #[serde(default)]
        id: String,
        #[serde(default)]
        classes: Vec<String>,
    },
    /// Host-dispatched custom event.
    Custom { name: String },
    /// Recorder frames.
    Frame {
        #[serde(default = "default_frame_count")]
        count: u32,
    },
    /// Advance the manual clock and tick.
    Advance { ms: i64 },
    /// Tick without moving the clock.
    Tick,
    /// Report the main thread idle.
    Idle,
    /// The page becomes hidden.
    Hidden,
    /// Page teardown.
    Unload,
}

fn default_frame_count() -> u32 {
    1
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Scenario, Box<dyn Error>> {
        let raw = std::fs::read_to_string(path)?;
        let scenario: Scenario = toml::from_str(&raw)?;
        Ok(scenario)
    }

    /// Funnel definitions as the JSON payload the definitions endpoint
    /// would have served.
    pub fn definitions_payload(&self) -> Result<serde_json::Value, Box<dyn Error>> {
        match &self.config.funnels {
            Some(value) => Ok(serde_json::to_value(value)?),
            None => Ok(serde_json::json!([])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r##"
        [config]
        website_id = "site-1"
        features = ["funnels", "replay"]
        sampled = true

        [[config.funnels]]
        id = "checkout"
        name = "Checkout"
        is_active = true
        steps = [
            { type = "page", name = "Pricing", condition = { page = "/pricing" } },
            { type = "event", name = "Buy", condition = { event = "#buy" } },
        ]

        [[step]]
        action = "navigate"
        path = "/pricing"

        [[step]]
        action = "click"
        tag = "button"
        id = "buy"

        [[step]]
        action = "frame"
        count = 3

        [[step]]
        action = "advance"
        ms = 250
    "##;

    #[test]
    fn parses_a_full_scenario() {
        let scenario: Scenario = toml::from_str(SCENARIO).unwrap();
        assert_eq!(scenario.config.website_id, "site-1");
        assert!(scenario.config.sampled);
        assert_eq!(scenario.steps.len(), 4);
        assert!(matches!(scenario.steps[0], Step::Navigate { .. }));
        assert!(matches!(scenario.steps[2], Step::Frame { count: 3 }));
    }

    #[test]
    fn funnels_table_converts_to_wire_json() {
        let scenario: Scenario = toml::from_str(SCENARIO).unwrap();
        let payload = scenario.definitions_payload().unwrap();
        let funnels = waymark_core::FunnelDefinition::list_from_json(&payload).unwrap();
        assert_eq!(funnels.len(), 1);
        assert_eq!(funnels[0].id, "checkout");
        assert_eq!(funnels[0].step_count(), 2);
    }

    #[test]
    fn frame_count_defaults_to_one() {
        let scenario: Scenario = toml::from_str(
            r#"
            [config]
            website_id = "s"

            [[step]]
            action = "frame"
            "#,
        )
        .unwrap();
        assert!(matches!(scenario.steps[0], Step::Frame { count: 1 }));
    }
}
