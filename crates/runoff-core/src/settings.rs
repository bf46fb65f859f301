//! Run configuration.  Defaults reproduce the reference catchment run:
//! 250×250 tiles, dt = 0.1 s, output every 150 steps.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SimError};

// ── Defaults ──────────────────────────────────────────────────────────────────

pub const DEFAULT_TILE_SIZE: usize = 250;
/// Timestep in seconds.
pub const DEFAULT_DT: f32 = 0.1;
/// Steps between two output snapshots.
pub const DEFAULT_OUTPUT_RESOLUTION: usize = 150;
pub const DEFAULT_STEPS: usize = 1000;
/// Manning channel width W (m).
pub const DEFAULT_CHANNEL_WIDTH: f32 = 0.5;
/// Manning roughness coefficient r.
pub const DEFAULT_ROUGHNESS: f32 = 0.035;
/// Ground infiltration in m/s per m² (1 l/h/m²).
pub const DEFAULT_INFILTRATION: f32 = 2.777e-7;

/// What the driving loop does when an output file cannot be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteErrorPolicy {
    /// Stop the run and report the error.
    #[default]
    Abort,
    /// Log a warning, drop the snapshot and keep simulating.
    Skip,
}

/// Full settings of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Column offset of the simulated window inside the source raster.
    pub offset_x: i32,
    /// Row offset of the simulated window inside the source raster.
    pub offset_y: i32,
    /// Domain width in cells.
    pub width: usize,
    /// Domain height in cells.
    pub height: usize,
    pub tile_width: usize,
    pub tile_height: usize,
    /// Worker threads in the task pool.
    pub threads: usize,
    /// Timestep in seconds.
    pub dt: f32,
    /// Steps between two output snapshots.
    pub output_resolution: usize,
    /// Total number of steps run by the driving loop.
    pub steps: usize,
    pub channel_width: f32,
    pub roughness: f32,
    /// Water removed from every wet cell per second (m/s).
    pub infiltration_rate: f32,
    pub on_write_error: WriteErrorPolicy,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            offset_x: 0,
            offset_y: 0,
            width: 0,
            height: 0,
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            threads: default_threads(),
            dt: DEFAULT_DT,
            output_resolution: DEFAULT_OUTPUT_RESOLUTION,
            steps: DEFAULT_STEPS,
            channel_width: DEFAULT_CHANNEL_WIDTH,
            roughness: DEFAULT_ROUGHNESS,
            infiltration_rate: DEFAULT_INFILTRATION,
            on_write_error: WriteErrorPolicy::Abort,
        }
    }
}

impl SimulationSettings {
    /// Default settings for a `width × height` domain.
    pub fn with_size(width: usize, height: usize) -> Self {
        Self { width, height, ..Self::default() }
    }

    /// Parse settings from JSON; missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::ZeroDimension { width: self.width, height: self.height });
        }
        if (self.width as u64).saturating_mul(self.height as u64) > u32::MAX as u64 {
            return Err(ConfigError::DomainTooLarge { width: self.width, height: self.height });
        }
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(ConfigError::ZeroTileSize {
                width: self.tile_width,
                height: self.tile_height,
            });
        }
        if self.threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        validate_dt(self.dt)?;
        if self.output_resolution == 0 {
            return Err(ConfigError::ZeroOutputResolution);
        }
        // Roughness divides the flow rate, so it must also be non-zero.
        if !(self.roughness.is_finite() && self.roughness > 0.0) {
            return Err(ConfigError::InvalidParameter { name: "roughness", value: self.roughness });
        }
        for (name, value) in [
            ("channel_width", self.channel_width),
            ("infiltration_rate", self.infiltration_rate),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_dt(dt: f32) -> Result<(), ConfigError> {
    if dt.is_finite() && dt > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidTimestep(dt))
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
