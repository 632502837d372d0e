//! Heat points: aggregated interaction samples consumed by the renderer.

use serde::{Deserialize, Serialize};

/// One normalized interaction sample.
///
/// Coordinates are normalized to the 0..=1000 logical range against the
/// full page dimensions at capture time; `intensity` is a non-negative
/// count or weight accumulated upstream. Render input is immutable: the
/// renderer never mutates points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatPoint {
    pub x: u32,
    pub y: u32,
    #[serde(default = "default_intensity")]
    pub intensity: u32,
}

fn default_intensity() -> u32 {
    1
}

impl HeatPoint {
    pub fn new(x: u32, y: u32, intensity: u32) -> Self {
        HeatPoint { x, y, intensity }
    }
}
