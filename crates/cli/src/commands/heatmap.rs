//! `waymark heatmap` -- render a heat point file to a PNG.

use std::error::Error;
use std::path::PathBuf;

use waymark_core::HeatPoint;
use waymark_render::{render, RenderMode, RenderOptions};

use crate::{HeatmapMode, OutputFormat};

pub(crate) struct Args {
    pub points: PathBuf,
    pub out: PathBuf,
    pub mode: HeatmapMode,
    pub viewport: String,
    pub page: Option<String>,
    pub scroll_x: u32,
    pub scroll_y: u32,
    pub opacity: f32,
    pub output: OutputFormat,
}

pub(crate) fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let raw = std::fs::read_to_string(&args.points)?;
    let points: Vec<HeatPoint> = serde_json::from_str(&raw)?;

    let (viewport_width, viewport_height) = parse_dimensions(&args.viewport)?;
    let (page_width, page_height) = match &args.page {
        Some(spec) => parse_dimensions(spec)?,
        None => (viewport_width, viewport_height),
    };

    let opts = RenderOptions {
        viewport_width,
        viewport_height,
        page_width,
        page_height,
        scroll_x: args.scroll_x,
        scroll_y: args.scroll_y,
        mode: match args.mode {
            HeatmapMode::Click => RenderMode::Click,
            HeatmapMode::Move => RenderMode::Move,
        },
        opacity: args.opacity,
    };

    let image = render(&points, &opts)?;
    image.save(&args.out)?;

    match args.output {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "points": points.len(),
                    "out": args.out.display().to_string(),
                    "width": viewport_width,
                    "height": viewport_height,
                })
            );
        }
        OutputFormat::Text => {
            println!(
                "rendered {} points into {} ({}x{})",
                points.len(),
                args.out.display(),
                viewport_width,
                viewport_height
            );
        }
    }
    Ok(())
}

/// Parse a `WIDTHxHEIGHT` specification.
fn parse_dimensions(spec: &str) -> Result<(u32, u32), Box<dyn Error>> {
    let (w, h) = spec
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", spec))?;
    Ok((w.trim().parse()?, h.trim().parse()?))
}
