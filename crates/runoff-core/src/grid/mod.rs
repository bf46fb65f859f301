//! Tiled cell storage.
//!
//! The [`Domain`] owns every [`Tile`], tiles own their [`Cell`]s.  Cells are
//! addressed either by coordinate or by global linear index; both resolve to
//! a `(tile, local)` storage slot through [`GridGeometry`].
pub mod bitmask;
pub mod cell;
pub mod geometry;
pub mod tile;

pub use bitmask::BitMask;
pub use cell::{Cell, FlowLink, Phase};
pub use geometry::{GridGeometry, NEIGHBOUR_OFFSETS};
pub use tile::Tile;

use crate::error::SimError;
use crate::heightfield::is_nodata;

#[derive(Debug, Clone)]
pub struct Domain {
    geometry: GridGeometry,
    tiles: Vec<Tile>,
    /// Set when a parallel phase failed to hand back a tile.
    poisoned: bool,
}

impl Domain {
    /// Allocate the minimal tile grid covering the raster; every cell starts
    /// as dry nodata.
    pub fn new(geometry: GridGeometry) -> Self {
        let tiles = (0..geometry.tile_count())
            .map(|id| {
                Tile::new(id, geometry.tile_origin(id), geometry.tile_width, geometry.tile_height)
            })
            .collect();
        Self { geometry, tiles, poisoned: false }
    }

    #[inline]
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Tiles in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    pub fn tile(&self, id: usize) -> &Tile {
        &self.tiles[id]
    }

    pub fn tile_mut(&mut self, id: usize) -> &mut Tile {
        &mut self.tiles[id]
    }

    /// Cell at `(x, y)`.  Panics outside the raster.
    pub fn cell(&self, x: usize, y: usize) -> &Cell {
        let (tile, local) = self.geometry.locate(self.geometry.index(x, y));
        &self.tiles[tile].cells[local]
    }

    /// Cell at a global index.  Panics outside the raster.
    pub fn cell_at(&self, index: usize) -> &Cell {
        let (tile, local) = self.geometry.locate(index);
        &self.tiles[tile].cells[local]
    }

    pub fn cell_at_mut(&mut self, index: usize) -> &mut Cell {
        let (tile, local) = self.geometry.locate(index);
        &mut self.tiles[tile].cells[local]
    }

    /// Set or clear the tile-local active bit of a cell.
    pub fn set_active(&mut self, index: usize, active: bool) {
        let (tile, local) = self.geometry.locate(index);
        self.tiles[tile].active.set(local, active);
    }

    pub fn is_active(&self, index: usize) -> bool {
        let (tile, local) = self.geometry.locate(index);
        self.tiles[tile].active.get(local)
    }

    /// Copy a row-major elevation raster into the tiles.  Cells that become
    /// nodata lose their water, rain and deferred inflow and are deactivated.
    pub fn load_elevations(&mut self, elevations: &[f32]) -> Result<(), SimError> {
        let expected = self.geometry.cell_count();
        if elevations.len() != expected {
            return Err(SimError::ElevationLength { expected, actual: elevations.len() });
        }
        let width = self.geometry.width;
        for (y, row) in elevations.chunks_exact(width).enumerate() {
            for (x, &h) in row.iter().enumerate() {
                let (tile, local) = self.geometry.locate_xy(x, y);
                let tile = &mut self.tiles[tile];
                let cell = &mut tile.cells[local];
                if is_nodata(h) {
                    *cell = Cell { elevation: h, ..Cell::default() };
                    tile.active.set(local, false);
                } else {
                    cell.elevation = h;
                }
            }
        }
        Ok(())
    }

    /// Row-major elevation raster, the inverse of [`Self::load_elevations`].
    pub fn elevations(&self) -> Vec<f32> {
        (0..self.geometry.cell_count()).map(|i| self.cell_at(i).elevation).collect()
    }

    /// Total stored water (m³ per unit cell area), accumulated in f64.
    pub fn total_water(&self) -> f64 {
        self.tiles.iter().map(Tile::water).sum()
    }

    /// Number of tiles with at least one active cell.
    pub fn active_tile_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.has_active()).count()
    }

    /// Move the tiles out for a parallel phase.  [`Self::restore_tiles`] must
    /// be called before the domain is used again.
    pub(crate) fn take_tiles(&mut self) -> Vec<Tile> {
        std::mem::take(&mut self.tiles)
    }

    /// Put tiles back by id.  Missing tiles are replaced by empty ones so
    /// indexing stays valid, and the domain is marked poisoned.
    pub(crate) fn restore_tiles(&mut self, slots: Vec<Option<Tile>>) {
        let geometry = self.geometry;
        let mut lost = 0;
        self.tiles = slots
            .into_iter()
            .enumerate()
            .map(|(id, slot)| {
                slot.unwrap_or_else(|| {
                    lost += 1;
                    Tile::new(id, geometry.tile_origin(id), geometry.tile_width, geometry.tile_height)
                })
            })
            .collect();
        if lost > 0 {
            log::error!("{lost} tile(s) were lost during a parallel phase");
            self.poisoned = true;
        }
    }

    /// False after a phase lost tiles to a panicking task.
    pub fn is_intact(&self) -> bool {
        !self.poisoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(w: usize, h: usize, tw: usize, th: usize) -> Domain {
        Domain::new(GridGeometry::new(w, h, tw, th).unwrap())
    }

    #[test]
    fn elevations_round_trip_through_tiles() {
        let mut d = domain(5, 3, 2, 2);
        let elev: Vec<f32> = (0..15).map(|i| i as f32).collect();
        d.load_elevations(&elev).unwrap();
        assert_eq!(d.elevations(), elev);
        assert_eq!(d.cell(4, 2).elevation, 14.0);
        assert_eq!(d.cell_at(7).elevation, 7.0);
    }

    #[test]
    fn padding_slots_stay_nodata() {
        let mut d = domain(5, 3, 2, 2);
        d.load_elevations(&[1.0; 15]).unwrap();
        // Tile (2, 1) covers x = 4..6, y = 2..4; only (4, 2) is real.
        let t = d.tile(5);
        assert_eq!(t.origin, (4, 2));
        let real = t.cells.iter().filter(|c| !c.is_nodata()).count();
        assert_eq!(real, 1);
    }

    #[test]
    fn reloading_as_nodata_resets_the_cell() {
        let mut d = domain(2, 2, 2, 2);
        d.load_elevations(&[1.0; 4]).unwrap();
        {
            let c = d.cell_at_mut(1);
            c.water = 0.5;
            c.rain = 1e-3;
            c.listed = true;
            c.defer(Phase::Border, 0.25);
        }
        d.set_active(1, true);

        d.load_elevations(&[1.0, -1.0, 1.0, 1.0]).unwrap();
        let c = d.cell_at(1);
        assert!(c.is_nodata());
        assert_eq!((c.water, c.rain, c.listed), (0.0, 0.0, false));
        assert_eq!(c.inflow, [0.0; Phase::COUNT]);
        assert!(!d.is_active(1));
        assert_eq!(d.total_water(), 0.0);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let mut d = domain(4, 4, 2, 2);
        assert!(matches!(
            d.load_elevations(&[0.0; 3]),
            Err(SimError::ElevationLength { expected: 16, actual: 3 })
        ));
    }

    #[test]
    fn active_bits_map_to_owning_tile() {
        let mut d = domain(4, 4, 2, 2);
        d.set_active(15, true);
        assert!(d.is_active(15));
        assert!(d.tile(3).has_active());
        assert_eq!(d.active_tile_count(), 1);
        d.set_active(15, false);
        assert_eq!(d.active_tile_count(), 0);
    }
}
