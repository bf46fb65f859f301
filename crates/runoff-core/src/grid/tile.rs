use super::bitmask::BitMask;
use super::cell::Cell;

/// Fixed-size block of cells; the unit of parallel work and dry-region
/// pruning.  Slots beyond the raster extent stay nodata forever.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Row-major position in the tile grid.
    pub id: usize,
    /// Global `(x, y)` of the top-left slot.
    pub origin: (usize, usize),
    pub width: usize,
    pub height: usize,
    pub cells: Vec<Cell>,
    /// Local cells that carry water, receive rain or hold deferred inflow.
    pub active: BitMask,
}

impl Tile {
    pub fn new(id: usize, origin: (usize, usize), width: usize, height: usize) -> Self {
        let len = width * height;
        Self {
            id,
            origin,
            width,
            height,
            cells: vec![Cell::default(); len],
            active: BitMask::new(len),
        }
    }

    /// Cheap whole-tile skip predicate.
    #[inline]
    pub fn has_active(&self) -> bool {
        self.active.any()
    }

    #[inline]
    pub fn local_xy(&self, local: usize) -> (usize, usize) {
        (local % self.width, local / self.width)
    }

    /// Local slot of a global `(x, y)` inside this tile.
    #[inline]
    pub fn local_of(&self, x: usize, y: usize) -> Option<usize> {
        let lx = x.checked_sub(self.origin.0).filter(|&lx| lx < self.width)?;
        let ly = y.checked_sub(self.origin.1).filter(|&ly| ly < self.height)?;
        Some(ly * self.width + lx)
    }

    /// Total water stored in the tile.
    pub fn water(&self) -> f64 {
        self.cells.iter().map(|c| c.water as f64).sum()
    }
}
