//! Waymark heatmap density renderer.
//!
//! A pure function from aggregated interaction samples to a colorized
//! RGBA raster: no network, no persistence, no randomness. Identical
//! inputs produce byte-identical output, which is what makes the
//! renderer testable at the pixel level.

mod heatmap;

pub use heatmap::{render, RenderError, RenderMode, RenderOptions};
