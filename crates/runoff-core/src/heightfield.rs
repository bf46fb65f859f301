use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Elevation sentinel for cells outside the valid dataset.  Any negative
/// sample is treated as nodata; this is the value written for padding.
pub const NODATA: f32 = -1.0;

#[inline]
pub fn is_nodata(elevation: f32) -> bool {
    elevation < 0.0 || elevation.is_nan()
}

/// A 2D elevation raster in metres, row-major, as handed over by ingestion.
/// Extra fields in the JSON form (e.g. geographic bounds) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightField {
    /// Row-major elevation values in metres; negative = nodata.
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

impl HeightField {
    /// Create a new HeightField filled with the given value.
    pub fn new(width: usize, height: usize, fill: f32) -> Self {
        Self { data: vec![fill; width * height], width, height }
    }

    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let hf: Self = serde_json::from_str(json)?;
        if hf.data.len() != hf.width * hf.height {
            return Err(SimError::ElevationLength {
                expected: hf.width * hf.height,
                actual: hf.data.len(),
            });
        }
        Ok(hf)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    /// Number of samples carrying real elevation data.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| !is_nodata(v)).count()
    }

    /// `(min, max)` over valid samples, `None` when everything is nodata.
    pub fn valid_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|&v| !is_nodata(v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}
