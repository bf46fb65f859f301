//! Synthetic catchment terrain for runs without an input raster.
//!
//! fBm hills (gain = 2^(−H)) on top of a plane tilted toward the
//! south-east corner, so most water eventually drains in one direction.
use noise::{NoiseFn, Perlin};
use runoff_core::HeightField;

const BASE_ELEVATION: f64 = 200.0;
const RELIEF: f64 = 40.0;
/// Elevation drop per cell along each axis.
const TILT: f64 = 0.02;

pub struct TerrainParams {
    pub seed: u32,
    /// Hurst exponent of the fBm stack.
    pub hurst: f64,
    pub octaves: u32,
    /// Hills per domain side at the lowest octave.
    pub base_frequency: f64,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self { seed: 42, hurst: 0.8, octaves: 6, base_frequency: 4.0 }
    }
}

fn fbm(perlin: &Perlin, x: f64, y: f64, params: &TerrainParams) -> f64 {
    let gain = 2f64.powf(-params.hurst);
    let mut value = 0.0;
    let mut amp = 1.0;
    let mut norm = 0.0;
    let mut freq = 1.0;
    for _ in 0..params.octaves {
        value += amp * perlin.get([x * freq, y * freq]);
        norm += amp;
        amp *= gain;
        freq *= 2.0;
    }
    if norm > 0.0 {
        value / norm
    } else {
        0.0
    }
}

/// Generate a `width × height` heightfield.  Every sample is valid and
/// strictly positive.
pub fn generate(width: usize, height: usize, params: &TerrainParams) -> HeightField {
    let perlin = Perlin::new(params.seed);
    let freq = params.base_frequency / width.max(height).max(1) as f64;
    let mut hf = HeightField::new(width, height, 0.0);
    for r in 0..height {
        for c in 0..width {
            let hills = fbm(&perlin, c as f64 * freq, r as f64 * freq, params);
            let plane = BASE_ELEVATION - TILT * (r + c) as f64;
            hf.set(r, c, (plane + RELIEF * hills).max(1.0) as f32);
        }
    }
    hf
}
