//! Tracker configuration.
//!
//! The embedding script supplies a website identifier and an auto-load
//! feature list through its attributes; everything else has product
//! defaults. A subsystem whose feature name is absent from the list is
//! never activated.

use serde::{Deserialize, Serialize};

use crate::replay::ReplayTuning;

/// Subsystems the embed attribute list can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Funnels,
    Replay,
    Heatmaps,
}

impl Feature {
    /// Parse one feature name as it appears in the embed attribute.
    /// Unknown names are ignored by the caller, not errors: an old
    /// snippet must keep working when the feature list grows.
    pub fn parse(name: &str) -> Option<Feature> {
        match name.trim().to_ascii_lowercase().as_str() {
            "funnels" => Some(Feature::Funnels),
            "replay" => Some(Feature::Replay),
            "heatmaps" => Some(Feature::Heatmaps),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub website_id: String,
    pub features: Vec<Feature>,

    pub events_endpoint: String,
    pub replay_endpoint: String,
    pub funnels_endpoint: String,
    pub auth_token: Option<String>,

    /// Delivery queue debounce.
    pub flush_delay_ms: i64,
    /// Funnel state write throttle interval.
    pub persist_interval_ms: i64,
    /// Idle-task fallback deadline.
    pub idle_timeout_ms: i64,
    pub visitor_ttl_ms: i64,
    pub session_window_ms: i64,

    pub replay: ReplayTuning,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            website_id: String::new(),
            features: Vec::new(),
            events_endpoint: "/api/events".to_string(),
            replay_endpoint: "/api/replay".to_string(),
            funnels_endpoint: "/api/funnels".to_string(),
            auth_token: None,
            flush_delay_ms: 250,
            persist_interval_ms: 500,
            idle_timeout_ms: 2_000,
            visitor_ttl_ms: 365 * 24 * 60 * 60 * 1000,
            session_window_ms: 30 * 60 * 1000,
            replay: ReplayTuning::default(),
        }
    }
}

impl TrackerConfig {
    pub fn new(website_id: impl Into<String>) -> Self {
        TrackerConfig {
            website_id: website_id.into(),
            ..Default::default()
        }
    }

    /// Build from the embed script's attributes: a website id and a
    /// comma-separated feature list.
    pub fn from_attributes(website_id: &str, features: &str) -> Self {
        let mut config = Self::new(website_id);
        config.features = features.split(',').filter_map(Feature::parse).collect();
        config
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }
}
