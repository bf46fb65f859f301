//! Diagnostic visualizer: renders one water snapshot over the terrain.
//!
//! Reads `metadata.bin` and `step_<n>.bin` from a run directory and writes a
//! PNG with greyscale elevation, nodata in dark red and water depth in blue.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use runoff_core::heightfield::is_nodata;
use runoff_core::output::{self, WaterSample};

const NODATA_RGB: [u8; 3] = [60, 0, 0];
const WATER_RGB: [u8; 3] = [20, 90, 230];

#[derive(Parser, Debug)]
#[command(name = "visualize", about = "Render a runoff snapshot to PNG")]
struct Args {
    /// Run directory containing metadata.bin and step files.
    #[arg(short, long, default_value = "output")]
    dir: PathBuf,

    /// Snapshot number to render.
    #[arg(short, long, default_value_t = 0)]
    step: u32,

    /// Depth (m) rendered at full water colour.
    #[arg(long, default_value_t = 0.05)]
    full_depth: f32,

    /// Output image; defaults to `<dir>/step_<n>.png`.
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ── Colour helpers ────────────────────────────────────────────────────────────

/// Elevation → grey, normalised over the valid range.
fn shade(z: f32, lo: f32, range: f32) -> [u8; 3] {
    let c = ((z - lo) / range * 200.0 + 40.0).clamp(0.0, 255.0) as u8;
    [c, c, c]
}

/// Blend `base` toward the water colour by depth.
fn tint(base: [u8; 3], depth: f32, full_depth: f32) -> [u8; 3] {
    let t = (depth / full_depth).sqrt().clamp(0.15, 1.0);
    let mix = |b: u8, w: u8| (b as f32 * (1.0 - t) + w as f32 * t) as u8;
    [mix(base[0], WATER_RGB[0]), mix(base[1], WATER_RGB[1]), mix(base[2], WATER_RGB[2])]
}

fn render(
    width: usize,
    height: usize,
    elevations: &[f32],
    samples: &[WaterSample],
    full_depth: f32,
) -> image::RgbImage {
    let (lo, hi) = elevations
        .iter()
        .filter(|z| !is_nodata(**z))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &z| (lo.min(z), hi.max(z)));
    let range = (hi - lo).max(1e-3);

    let mut pixels: Vec<[u8; 3]> = elevations
        .iter()
        .map(|&z| if is_nodata(z) { NODATA_RGB } else { shade(z, lo, range) })
        .collect();
    for s in samples {
        if let Some(px) = pixels.get_mut(s.index as usize) {
            *px = tint(*px, s.level, full_depth.max(f32::EPSILON));
        }
    }

    let mut img = image::RgbImage::new(width as u32, height as u32);
    for (i, rgb) in pixels.into_iter().enumerate() {
        img.put_pixel((i % width) as u32, (i / width) as u32, image::Rgb(rgb));
    }
    img
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();

    let (meta, elevations) = output::read_metadata(&args.dir.join(output::METADATA_FILE))
        .context("reading run metadata")?;
    let (header, samples) = output::read_step(&args.dir.join(output::step_file_name(args.step)))
        .with_context(|| format!("reading snapshot {}", args.step))?;

    let (width, height) = (meta.width as usize, meta.height as usize);
    println!(
        "{width}×{height}, dt = {} s, snapshot {} ({} wet cells)",
        meta.dt, header.step, header.count
    );

    let img = render(width, height, &elevations, &samples, args.full_depth);
    let path = args.out.unwrap_or_else(|| args.dir.join(format!("step_{}.png", args.step)));
    img.save(&path).with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
