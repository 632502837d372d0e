//! Waymark domain types -- funnel definitions and state, triggers,
//! replay chunks, heat points, visitor/session identity records.
//!
//! This crate is pure data: no clock, no randomness, no I/O. Everything
//! here is either deserialized from the backend's wire shapes or persisted
//! to the embedding host's key-value storage. The runtime crate owns all
//! side effects.

mod error;
mod funnel;
mod heat;
mod identity;
mod pattern;
mod replay;
mod selector;
mod trigger;

pub use error::DefinitionError;
pub use funnel::{
    EventType, FunnelDefinition, FunnelEvent, FunnelState, FunnelStep, StepCondition,
};
pub use heat::HeatPoint;
pub use identity::{SessionIdentity, VisitorIdentity};
pub use pattern::PagePattern;
pub use replay::{ReplayChunk, ReplayFrame};
pub use selector::{ClickTarget, Selector};
pub use trigger::Trigger;
