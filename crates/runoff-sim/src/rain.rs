//! Procedural rain cells from a seeded Perlin field.
//!
//! Noise is sampled in `[0, 1]`; cells above the threshold receive rain
//! proportional to how far the noise exceeds it.  Moving the sample window
//! by an offset lets the storm drift between snapshots.
use noise::{NoiseFn, Perlin};
use runoff_core::heightfield::is_nodata;

pub const DEFAULT_RAIN_SEED: u32 = 123_456;
/// Cells per noise period.
pub const DEFAULT_RAIN_SCALE: f64 = 4000.0;
pub const DEFAULT_RAIN_THRESHOLD: f32 = 0.7;
/// Peak rainfall, 20 l/h/m² in m/s.
pub const DEFAULT_RAIN_INTENSITY: f32 = 20.0 * 2.777e-7;

pub struct RainPattern {
    perlin: Perlin,
    pub scale: f64,
    pub threshold: f32,
    /// Rate at noise = 1.
    pub intensity: f32,
}

impl RainPattern {
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            scale: DEFAULT_RAIN_SCALE,
            threshold: DEFAULT_RAIN_THRESHOLD,
            intensity: DEFAULT_RAIN_INTENSITY,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Noise remapped from `(−1, 1)` to `(0, 1)`.
    fn sample(&self, x: f64, y: f64) -> f32 {
        let v = self.perlin.get([x / self.scale, y / self.scale]) as f32;
        ((v + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Rain rate (m/s) at cell `(x, y)` with the window shifted by `offset`.
    pub fn rate_at(&self, x: usize, y: usize, offset: (u64, u64)) -> f32 {
        let n = self.sample((x as u64 + offset.0) as f64, (y as u64 + offset.1) as f64);
        if n <= self.threshold {
            return 0.0;
        }
        let span = (1.0 - self.threshold).max(f32::EPSILON);
        (n - self.threshold) / span * self.intensity
    }

    /// Sparse `(index, rate)` schedule for a row-major raster.  Nodata cells
    /// never receive rain.
    pub fn schedule(&self, elevations: &[f32], width: usize, offset: (u64, u64)) -> Vec<(usize, f32)> {
        elevations
            .iter()
            .enumerate()
            .filter(|&(_, &h)| !is_nodata(h))
            .filter_map(|(i, _)| {
                let rate = self.rate_at(i % width, i / width, offset);
                (rate > 0.0).then_some((i, rate))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runoff_core::NODATA;

    #[test]
    fn rates_are_bounded_by_intensity() {
        let rain = RainPattern::new(DEFAULT_RAIN_SEED).with_scale(16.0).with_threshold(0.5);
        let elev = vec![1.0f32; 64 * 64];
        let schedule = rain.schedule(&elev, 64, (0, 0));
        assert!(!schedule.is_empty());
        for &(_, rate) in &schedule {
            assert!(rate > 0.0 && rate <= DEFAULT_RAIN_INTENSITY * 1.0001);
        }
    }

    #[test]
    fn nodata_cells_stay_dry() {
        let rain = RainPattern::new(1).with_threshold(0.0);
        let mut elev = vec![5.0f32; 100];
        elev[17] = NODATA;
        elev[42] = NODATA;
        let schedule = rain.schedule(&elev, 10, (0, 0));
        assert_eq!(schedule.len(), 98);
        assert!(schedule.iter().all(|&(i, _)| i != 17 && i != 42));
    }

    #[test]
    fn same_seed_same_pattern() {
        let elev = vec![1.0f32; 40 * 30];
        let a = RainPattern::new(9).with_scale(8.0).schedule(&elev, 40, (250, 250));
        let b = RainPattern::new(9).with_scale(8.0).schedule(&elev, 40, (250, 250));
        assert_eq!(a, b);
    }

    #[test]
    fn offset_shifts_the_window() {
        let rain = RainPattern::new(3).with_scale(8.0).with_threshold(0.0);
        assert_eq!(rain.rate_at(5, 0, (0, 0)), rain.rate_at(0, 0, (5, 0)));
    }
}
