//! Batch driver: loads terrain, rains on it and writes periodic water
//! snapshots to an output directory.

mod rain;
mod terrain;
mod timing;

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;

use runoff_core::output;
use runoff_core::{HeightField, OutputError, Simulation, SimulationSettings, WriteErrorPolicy};

use rain::RainPattern;
use terrain::TerrainParams;
use timing::Timed;

/// Noise-space shift of the rain window per snapshot, in cells.
const RAIN_DRIFT: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Size {
    width: usize,
    height: usize,
}

impl FromStr for Size {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s.split_once(['x', 'X']).ok_or_else(|| format!("expected WxH, got `{s}`"))?;
        let parse = |v: &str| v.trim().parse::<usize>().map_err(|e| format!("`{v}`: {e}"));
        Ok(Self { width: parse(w)?, height: parse(h)? })
    }
}

#[derive(Parser, Debug)]
#[command(name = "runoff-sim", about = "Tiled overland runoff simulation")]
struct Args {
    /// Serialised HeightField JSON to simulate on.
    #[arg(short, long, conflicts_with = "synthetic")]
    input: Option<PathBuf>,

    /// Generate a synthetic terrain of the given size instead, e.g. `512x512`.
    #[arg(long)]
    synthetic: Option<Size>,

    /// Settings JSON; missing fields use defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for metadata.bin, step_<n>.bin and summary.json.
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    #[arg(long)]
    steps: Option<usize>,

    #[arg(long)]
    threads: Option<usize>,

    /// Seed for the rain pattern and synthetic terrain.
    #[arg(long, default_value_t = rain::DEFAULT_RAIN_SEED)]
    seed: u32,

    /// Timestep in seconds.
    #[arg(long)]
    dt: Option<f32>,

    /// Steps between active-list sweeps; defaults to the output resolution.
    #[arg(long)]
    sweep_every: Option<usize>,

    /// Cells per rain noise period.
    #[arg(long, default_value_t = rain::DEFAULT_RAIN_SCALE)]
    rain_scale: f64,
}

#[derive(Debug, Serialize)]
struct Summary {
    steps: u64,
    snapshots: u32,
    skipped_snapshots: u32,
    threads: usize,
    final_total_water: f64,
    active_cells: usize,
    wet_cells: usize,
    elapsed_ms: u64,
}

fn load_settings(args: &Args) -> Result<SimulationSettings> {
    let mut settings = match &args.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading settings {}", path.display()))?;
            SimulationSettings::from_json(&json)
                .with_context(|| format!("parsing settings {}", path.display()))?
        }
        None => SimulationSettings::default(),
    };
    if let Some(steps) = args.steps {
        settings.steps = steps;
    }
    if let Some(threads) = args.threads {
        settings.threads = threads;
    }
    if let Some(dt) = args.dt {
        settings.dt = dt;
    }
    Ok(settings)
}

fn load_terrain(args: &Args, seed: u32) -> Result<HeightField> {
    if let Some(path) = &args.input {
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading heightfield {}", path.display()))?;
        return HeightField::from_json(&json)
            .with_context(|| format!("parsing heightfield {}", path.display()));
    }
    if let Some(size) = args.synthetic {
        let params = TerrainParams { seed, ..TerrainParams::default() };
        return Ok(terrain::generate(size.width, size.height, &params));
    }
    bail!("no terrain given; pass --input <heightfield.json> or --synthetic <W>x<H>")
}

/// Apply the configured policy to a failed output write.  Returns whether the
/// file was written.
fn check_write(result: Result<(), OutputError>, policy: WriteErrorPolicy) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if policy == WriteErrorPolicy::Skip => {
            log::warn!("skipping output: {e}");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn write_summary(dir: &Path, summary: &Summary) -> Result<()> {
    let path = dir.join("summary.json");
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut settings = load_settings(&args)?;
    let hf = load_terrain(&args, args.seed)?;
    settings.width = hf.width;
    settings.height = hf.height;
    log::info!(
        "terrain {}x{}, {} valid cells",
        hf.width,
        hf.height,
        hf.valid_count()
    );

    let mut sim = Simulation::new(settings.clone()).context("invalid settings")?;
    sim.load_heightfield(&hf)?;
    {
        let _t = Timed::info("flow graph");
        sim.build_flow_graph()?;
    }

    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating output directory {}", args.output.display()))?;
    let policy = settings.on_write_error;
    check_write(
        output::write_metadata(&args.output.join(output::METADATA_FILE), &sim.metadata(), &hf.data),
        policy,
    )?;

    let rain = RainPattern::new(args.seed).with_scale(args.rain_scale);
    sim.set_rain(&rain.schedule(&hf.data, hf.width, (0, 0)));

    let resolution = settings.output_resolution;
    let sweep_every = args.sweep_every.unwrap_or(resolution).max(1);
    let (mut snapshots, mut skipped) = (0u32, 0u32);

    let run = Timed::info("simulation");
    for i in 0..settings.steps {
        let step_timer = std::time::Instant::now();
        sim.step(settings.dt)?;
        log::trace!("step {i}: {:.1?}", step_timer.elapsed());

        let done = i + 1;
        if done % sweep_every == 0 {
            sim.sweep();
        }
        if done % resolution != 0 {
            continue;
        }

        let _t = Timed::debug("snapshot");
        let n = (i / resolution) as u32;
        let samples = sim.snapshot();
        log::info!(
            "snapshot {n} at step {done}: {} wet cells, total water {:.4}",
            samples.len(),
            sim.total_water()
        );
        let path = args.output.join(output::step_file_name(n));
        if check_write(output::write_step(&path, n, &samples), policy)? {
            snapshots += 1;
        } else {
            skipped += 1;
        }

        let shift = n as u64 * RAIN_DRIFT;
        sim.set_rain(&rain.schedule(&hf.data, hf.width, (shift, shift)));
    }
    let elapsed = run.elapsed();
    drop(run);

    let summary = Summary {
        steps: sim.steps_taken(),
        snapshots,
        skipped_snapshots: skipped,
        threads: sim.threads(),
        final_total_water: sim.total_water(),
        active_cells: sim.active_cells().count(),
        wet_cells: sim.wet_cells().count(),
        elapsed_ms: elapsed.as_millis() as u64,
    };
    write_summary(&args.output, &summary)?;
    println!(
        "{} steps in {} ms, {} snapshots written to {}",
        summary.steps,
        summary.elapsed_ms,
        summary.snapshots,
        args.output.display()
    );
    Ok(())
}
