//! Point-density rasterization.
//!
//! Each heat point stamps a soft-edged circular falloff onto an f32
//! intensity buffer; the accumulated density is then mapped through a
//! fixed cool-to-warm color ramp. Input coordinates are normalized to
//! 0..=1000 against the full page and de-normalized here, offset by the
//! scroll position to land in the visible viewport.

use std::fmt;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use waymark_core::HeatPoint;

/// Logical coordinate range points are normalized to.
const NORMALIZED_RANGE: f32 = 1000.0;

/// Brush radius in pixels for discrete click events.
const CLICK_RADIUS: f32 = 25.0;

/// Brush radius in pixels for continuous movement trails.
const MOVE_RADIUS: f32 = 52.0;

/// Per-intensity-unit stamp weight.
const INTENSITY_WEIGHT: f32 = 0.15;

/// Ceiling on a single point's stamp weight, so one outlier cannot
/// saturate the whole map.
const MAX_POINT_WEIGHT: f32 = 0.8;

// ──────────────────────────────────────────────
// Options
// ──────────────────────────────────────────────

/// Brush selection: clicks are tight, movement trails broad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Click,
    Move,
}

impl RenderMode {
    fn radius(self) -> f32 {
        match self {
            RenderMode::Click => CLICK_RADIUS,
            RenderMode::Move => MOVE_RADIUS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Full page dimensions the normalized coordinates map onto.
    pub page_width: u32,
    pub page_height: u32,
    /// Current scroll offset of the viewport within the page.
    pub scroll_x: u32,
    pub scroll_y: u32,
    pub mode: RenderMode,
    /// Global opacity multiplier applied after colorization, `0.0..=1.0`.
    pub opacity: f32,
}

impl RenderOptions {
    pub fn new(viewport_width: u32, viewport_height: u32, mode: RenderMode) -> Self {
        RenderOptions {
            viewport_width,
            viewport_height,
            page_width: viewport_width,
            page_height: viewport_height,
            scroll_x: 0,
            scroll_y: 0,
            mode,
            opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Viewport or page has a zero dimension.
    EmptyDimensions { width: u32, height: u32 },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::EmptyDimensions { width, height } => {
                write!(f, "cannot render into {}x{} raster", width, height)
            }
        }
    }
}

impl std::error::Error for RenderError {}

// ──────────────────────────────────────────────
// Rendering
// ──────────────────────────────────────────────

/// Render heat points into a viewport-sized RGBA raster.
///
/// Points are immutable input; the result depends on nothing but the
/// arguments.
pub fn render(points: &[HeatPoint], opts: &RenderOptions) -> Result<RgbaImage, RenderError> {
    let width = opts.viewport_width;
    let height = opts.viewport_height;
    if width == 0 || height == 0 || opts.page_width == 0 || opts.page_height == 0 {
        return Err(RenderError::EmptyDimensions { width, height });
    }

    let radius = opts.mode.radius();
    let mut density = vec![0.0f32; (width * height) as usize];

    for point in points {
        // De-normalize to absolute page pixels, then into viewport space.
        let page_x = point.x as f32 / NORMALIZED_RANGE * opts.page_width as f32;
        let page_y = point.y as f32 / NORMALIZED_RANGE * opts.page_height as f32;
        let vx = page_x - opts.scroll_x as f32;
        let vy = page_y - opts.scroll_y as f32;

        // Entirely outside the viewport, brush included: skip.
        if vx < -radius
            || vy < -radius
            || vx > width as f32 + radius
            || vy > height as f32 + radius
        {
            continue;
        }

        let weight = (point.intensity as f32 * INTENSITY_WEIGHT).min(MAX_POINT_WEIGHT);
        stamp(&mut density, width, height, vx, vy, radius, weight);
    }

    let lut = color_ramp();
    let opacity = opts.opacity.clamp(0.0, 1.0);
    let mut image = RgbaImage::new(width, height);
    for (i, pixel) in image.pixels_mut().enumerate() {
        let d = density[i].min(1.0);
        if d <= 0.0 {
            continue;
        }
        let [r, g, b] = lut[(d * 255.0) as usize];
        let alpha = (d * opacity * 255.0) as u8;
        *pixel = Rgba([r, g, b, alpha]);
    }
    Ok(image)
}

/// Add one soft-edged circular stamp: full weight at the centre, linear
/// falloff to zero at the radius.
fn stamp(density: &mut [f32], width: u32, height: u32, cx: f32, cy: f32, radius: f32, weight: f32) {
    let min_x = ((cx - radius).floor().max(0.0)) as u32;
    let max_x = ((cx + radius).ceil().min(width as f32 - 1.0)) as u32;
    let min_y = ((cy - radius).floor().max(0.0)) as u32;
    let max_y = ((cy + radius).ceil().min(height as f32 - 1.0)) as u32;
    if min_x > max_x || min_y > max_y {
        return;
    }

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist < radius {
                let falloff = 1.0 - dist / radius;
                density[(y * width + x) as usize] += weight * falloff;
            }
        }
    }
}

/// Fixed 256-entry cool-to-warm ramp:
/// blue -> cyan -> lime -> yellow -> orange -> red.
fn color_ramp() -> Vec<[u8; 3]> {
    const STOPS: [(f32, [u8; 3]); 6] = [
        (0.00, [0, 0, 255]),
        (0.25, [0, 255, 255]),
        (0.50, [50, 205, 50]),
        (0.75, [255, 255, 0]),
        (0.90, [255, 165, 0]),
        (1.00, [255, 0, 0]),
    ];

    (0..256)
        .map(|i| {
            let t = i as f32 / 255.0;
            let mut segment = (STOPS[4], STOPS[5]);
            for window in STOPS.windows(2) {
                if t <= window[1].0 {
                    segment = (window[0], window[1]);
                    break;
                }
            }
            let ((t0, c0), (t1, c1)) = segment;
            let f = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
            [
                lerp(c0[0], c1[0], f),
                lerp(c0[1], c1[1], f),
                lerp(c0[2], c1[2], f),
            ]
        })
        .collect()
}

fn lerp(a: u8, b: u8, f: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * f).round() as u8
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
