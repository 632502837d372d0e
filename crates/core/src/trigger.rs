//! Triggers observed by the runtime and evaluated against funnel steps.

use crate::selector::ClickTarget;

/// A single observed interaction.
///
/// Page views cover both full navigations and single-page-app route
/// changes -- the host reports both through the same path. Custom events
/// are dispatched by the host page by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    PageView { path: String },
    Click { target: ClickTarget },
    Custom { name: String },
}

impl Trigger {
    pub fn page(path: impl Into<String>) -> Self {
        Trigger::PageView { path: path.into() }
    }

    pub fn click(target: ClickTarget) -> Self {
        Trigger::Click { target }
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Trigger::Custom { name: name.into() }
    }
}
