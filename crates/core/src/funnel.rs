//! Funnel definitions, per-funnel progression state, and outbound events.
//!
//! Definitions arrive as backend JSON and are resolved into typed step
//! conditions exactly once, at load time. Progression is strictly
//! sequential: a step numbered `n` (1-based) advances a funnel only when
//! it starts a new run (`n == 1`) or continues the current one
//! (`n == current_step + 1`). Out-of-order matches never mutate state.

use serde::{Deserialize, Serialize};

use crate::error::DefinitionError;
use crate::pattern::PagePattern;
use crate::selector::Selector;
use crate::trigger::Trigger;

// ──────────────────────────────────────────────
// Definitions
// ──────────────────────────────────────────────

/// A step condition, resolved from the wire shape at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepCondition {
    /// Page view matching a path pattern.
    Page(PagePattern),
    /// Click on an element matching a selector.
    Click(Selector),
    /// Host-dispatched custom event, matched by name equality.
    Custom(String),
}

impl StepCondition {
    /// Test a trigger against this condition. Trigger kind and condition
    /// kind must correspond; a page condition never matches a click.
    pub fn matches(&self, trigger: &Trigger) -> bool {
        match (self, trigger) {
            (StepCondition::Page(pattern), Trigger::PageView { path }) => pattern.matches(path),
            (StepCondition::Click(selector), Trigger::Click { target }) => {
                selector.matches(target)
            }
            (StepCondition::Custom(name), Trigger::Custom { name: fired }) => name == fired,
            _ => false,
        }
    }
}

/// One step of a funnel definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelStep {
    pub name: String,
    pub condition: StepCondition,
}

/// An immutable funnel definition fetched from the backend.
///
/// Inactive funnels are filtered out by [`FunnelDefinition::list_from_json`];
/// the runtime never creates state for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelDefinition {
    pub id: String,
    pub name: String,
    pub steps: Vec<FunnelStep>,
}

impl FunnelDefinition {
    /// Parse the definitions endpoint payload.
    ///
    /// The backend returns either a bare list or `{"funnels": [...]}`;
    /// both shapes are accepted. Funnels with `is_active == false` and
    /// funnels with no steps are dropped, not errored: they are valid
    /// definitions the runtime simply has nothing to do with.
    pub fn list_from_json(payload: &serde_json::Value) -> Result<Vec<Self>, DefinitionError> {
        let list = payload
            .as_array()
            .or_else(|| payload.get("funnels").and_then(|f| f.as_array()))
            .ok_or(DefinitionError::NotAList)?;

        let mut out = Vec::new();
        for entry in list {
            let wire: WireFunnel = serde_json::from_value(entry.clone()).map_err(|e| {
                DefinitionError::BadCondition {
                    funnel_id: entry
                        .get("id")
                        .and_then(|v| v.as_str())
                        .unwrap_or("<unknown>")
                        .to_string(),
                    message: e.to_string(),
                }
            })?;

            if !wire.is_active {
                continue;
            }

            let mut steps = Vec::with_capacity(wire.steps.len());
            for step in &wire.steps {
                steps.push(resolve_step(&wire.id, step)?);
            }
            if steps.is_empty() {
                continue;
            }

            out.push(FunnelDefinition {
                id: wire.id,
                name: wire.name,
                steps,
            });
        }
        Ok(out)
    }

    /// Number of steps; reaching the last one is conversion.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

/// Wire shape of one funnel as served by the definitions endpoint.
#[derive(Debug, Deserialize)]
struct WireFunnel {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default, alias = "isActive")]
    is_active: bool,
    #[serde(default)]
    steps: Vec<WireStep>,
}

#[derive(Debug, Deserialize)]
struct WireStep {
    #[serde(rename = "type")]
    step_type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    condition: WireCondition,
}

#[derive(Debug, Default, Deserialize)]
struct WireCondition {
    page: Option<String>,
    event: Option<String>,
    custom: Option<String>,
}

fn resolve_step(funnel_id: &str, step: &WireStep) -> Result<FunnelStep, DefinitionError> {
    let condition = match step.step_type.as_str() {
        "page" => {
            let pattern = step.condition.page.as_deref().ok_or_else(|| {
                DefinitionError::BadCondition {
                    funnel_id: funnel_id.to_string(),
                    message: "page step without 'page' condition".to_string(),
                }
            })?;
            StepCondition::Page(PagePattern::new(pattern))
        }
        "event" => {
            let raw = step.condition.event.as_deref().ok_or_else(|| {
                DefinitionError::BadCondition {
                    funnel_id: funnel_id.to_string(),
                    message: "event step without 'event' condition".to_string(),
                }
            })?;
            let selector =
                Selector::parse(raw).ok_or_else(|| DefinitionError::BadSelector {
                    funnel_id: funnel_id.to_string(),
                    selector: raw.to_string(),
                })?;
            StepCondition::Click(selector)
        }
        "custom" => {
            let name = step.condition.custom.as_deref().ok_or_else(|| {
                DefinitionError::BadCondition {
                    funnel_id: funnel_id.to_string(),
                    message: "custom step without 'custom' condition".to_string(),
                }
            })?;
            StepCondition::Custom(name.to_string())
        }
        other => {
            return Err(DefinitionError::UnknownStepType {
                funnel_id: funnel_id.to_string(),
                step_type: other.to_string(),
            })
        }
    };

    Ok(FunnelStep {
        name: step.name.clone(),
        condition,
    })
}

// ──────────────────────────────────────────────
// State
// ──────────────────────────────────────────────

/// Kind of outbound event an advancement produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Progress,
    Conversion,
}

/// Persisted per-funnel progression state.
///
/// `current_step` is 1-based; 0 is idle. `completed` holds the 0-based
/// indices of completed steps in completion order. `converted` is sticky
/// for the duration of a run: only a fresh step-1 match resets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelState {
    #[serde(default)]
    pub current_step: usize,
    #[serde(default)]
    pub completed: Vec<usize>,
    #[serde(default)]
    pub started_at_ms: Option<i64>,
    #[serde(default)]
    pub converted: bool,
}

impl FunnelState {
    /// Attempt to advance to the 1-based step `n`.
    ///
    /// Returns the event type of the advancement, or `None` when the
    /// match must be ignored. The rule:
    ///
    /// - `n == 1` always starts a new run (resets `completed`,
    ///   `started_at_ms`, and `converted`);
    /// - otherwise `n` must equal `current_step + 1`, and the funnel must
    ///   not already be converted;
    /// - reaching `total_steps` marks the run converted.
    pub fn try_advance(&mut self, n: usize, total_steps: usize, now_ms: i64) -> Option<EventType> {
        if n == 1 {
            self.current_step = 1;
            self.completed = vec![0];
            self.started_at_ms = Some(now_ms);
            self.converted = total_steps == 1;
        } else if !self.converted && n == self.current_step + 1 {
            self.current_step = n;
            self.completed.push(n - 1);
            self.converted = n == total_steps;
        } else {
            return None;
        }

        Some(if self.converted {
            EventType::Conversion
        } else {
            EventType::Progress
        })
    }
}

// ──────────────────────────────────────────────
// Outbound events
// ──────────────────────────────────────────────

/// Snapshot of one funnel advancement, sent to the ingestion endpoint.
///
/// Ephemeral: built at advancement time, never persisted after
/// transmission. Duplicate delivery on retry is tolerated by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelEvent {
    pub website_id: String,
    pub visitor_id: String,
    pub session_id: String,
    pub funnel_id: String,
    /// 1-based index of the step that advanced.
    pub step_index: usize,
    pub step_name: String,
    pub event_type: EventType,
    pub current_step: usize,
    pub completed: Vec<usize>,
    pub started_at_ms: Option<i64>,
    pub timestamp_ms: i64,
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::ClickTarget;

    fn three_step_payload() -> serde_json::Value {
        serde_json::json!([{
            "id": "f1",
            "name": "Checkout",
            "is_active": true,
            "steps": [
                { "type": "page", "name": "Pricing", "condition": { "page": "/pricing" } },
                { "type": "event", "name": "Buy", "condition": { "event": "#buy" } },
                { "type": "custom", "name": "Purchase", "condition": { "custom": "purchase_complete" } }
            ]
        }])
    }

    #[test]
    fn parses_bare_list() {
        let funnels = FunnelDefinition::list_from_json(&three_step_payload()).unwrap();
        assert_eq!(funnels.len(), 1);
        assert_eq!(funnels[0].id, "f1");
        assert_eq!(funnels[0].step_count(), 3);
    }

    #[test]
    fn parses_wrapped_list() {
        let wrapped = serde_json::json!({ "funnels": three_step_payload() });
        let funnels = FunnelDefinition::list_from_json(&wrapped).unwrap();
        assert_eq!(funnels.len(), 1);
    }

    #[test]
    fn inactive_funnels_dropped() {
        let payload = serde_json::json!([{
            "id": "f2",
            "name": "Dormant",
            "is_active": false,
            "steps": [
                { "type": "page", "name": "Home", "condition": { "page": "/" } }
            ]
        }]);
        let funnels = FunnelDefinition::list_from_json(&payload).unwrap();
        assert!(funnels.is_empty());
    }

    #[test]
    fn camel_case_is_active_accepted() {
        let payload = serde_json::json!([{
            "id": "f3",
            "name": "Camel",
            "isActive": true,
            "steps": [
                { "type": "page", "name": "Home", "condition": { "page": "/" } }
            ]
        }]);
        let funnels = FunnelDefinition::list_from_json(&payload).unwrap();
        assert_eq!(funnels.len(), 1);
    }

    #[test]
    fn unknown_step_type_is_an_error() {
        let payload = serde_json::json!([{
            "id": "f4",
            "name": "Bad",
            "is_active": true,
            "steps": [ { "type": "scroll", "name": "S", "condition": {} } ]
        }]);
        let err = FunnelDefinition::list_from_json(&payload).unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownStepType { .. }));
    }

    #[test]
    fn conditions_match_only_their_trigger_kind() {
        let funnels = FunnelDefinition::list_from_json(&three_step_payload()).unwrap();
        let steps = &funnels[0].steps;

        assert!(steps[0].condition.matches(&Trigger::page("/pricing")));
        assert!(!steps[0].condition.matches(&Trigger::custom("/pricing")));

        let target = ClickTarget::new("button").with_id("buy");
        assert!(steps[1].condition.matches(&Trigger::click(target.clone())));
        assert!(!steps[1].condition.matches(&Trigger::page("#buy")));

        assert!(steps[2]
            .condition
            .matches(&Trigger::custom("purchase_complete")));
        assert!(!steps[2].condition.matches(&Trigger::click(target)));
    }

    #[test]
    fn sequential_advancement_only() {
        let mut state = FunnelState::default();

        // Step 3 before step 1 must be ignored.
        assert_eq!(state.try_advance(3, 3, 100), None);
        assert_eq!(state.current_step, 0);

        assert_eq!(state.try_advance(1, 3, 100), Some(EventType::Progress));
        assert_eq!(state.current_step, 1);
        assert_eq!(state.completed, vec![0]);
        assert_eq!(state.started_at_ms, Some(100));

        // Skipping step 2 is ignored.
        assert_eq!(state.try_advance(3, 3, 200), None);
        assert_eq!(state.current_step, 1);

        assert_eq!(state.try_advance(2, 3, 300), Some(EventType::Progress));
        assert_eq!(state.try_advance(3, 3, 400), Some(EventType::Conversion));
        assert_eq!(state.completed, vec![0, 1, 2]);
        assert!(state.converted);
    }

    #[test]
    fn conversion_is_sticky_until_new_run() {
        let mut state = FunnelState::default();
        state.try_advance(1, 2, 10);
        state.try_advance(2, 2, 20);
        assert!(state.converted);

        // Converted funnels ignore continuation triggers.
        assert_eq!(state.try_advance(2, 2, 30), None);
        assert!(state.converted);
        assert_eq!(state.completed, vec![0, 1]);

        // A fresh step-1 match starts a new run.
        assert_eq!(state.try_advance(1, 2, 40), Some(EventType::Progress));
        assert!(!state.converted);
        assert_eq!(state.current_step, 1);
        assert_eq!(state.completed, vec![0]);
        assert_eq!(state.started_at_ms, Some(40));
    }

    #[test]
    fn single_step_funnel_converts_immediately() {
        let mut state = FunnelState::default();
        assert_eq!(state.try_advance(1, 1, 5), Some(EventType::Conversion));
        assert!(state.converted);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = FunnelState::default();
        state.try_advance(1, 3, 100);
        state.try_advance(2, 3, 200);

        let blob = serde_json::to_string(&state).unwrap();
        let restored: FunnelState = serde_json::from_str(&blob).unwrap();
        assert_eq!(state, restored);
    }
}
