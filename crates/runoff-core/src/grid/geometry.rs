//! Index arithmetic for the tiled raster.
//!
//! Two address spaces coexist:
//! * **global**: `y * width + x` over the raster extent, used by flow links,
//!   rain schedules and output;
//! * **tile-local**: `(tile, ly * tile_width + lx)`, used for storage.
//!
//! Edge tiles are always allocated at full size; their slots beyond the raster
//! have no global index.
use crate::error::ConfigError;

/// 8-neighbourhood offsets `(dx, dy)`, row-major over the 3×3 window minus the
/// centre.  This order is the tie-break order of the steepest-descent search.
pub const NEIGHBOUR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub width: usize,
    pub height: usize,
    pub tile_width: usize,
    pub tile_height: usize,
    /// Tiles per row.
    pub tiles_x: usize,
    /// Tile rows.
    pub tiles_y: usize,
}

impl GridGeometry {
    pub fn new(
        width: usize,
        height: usize,
        tile_width: usize,
        tile_height: usize,
    ) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::ZeroDimension { width, height });
        }
        if tile_width == 0 || tile_height == 0 {
            return Err(ConfigError::ZeroTileSize { width: tile_width, height: tile_height });
        }
        Ok(Self {
            width,
            height,
            tile_width,
            tile_height,
            tiles_x: width.div_ceil(tile_width),
            tiles_y: height.div_ceil(tile_height),
        })
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn tile_count(&self) -> usize {
        self.tiles_x * self.tiles_y
    }

    /// Storage slots per tile, including padding in edge tiles.
    #[inline]
    pub fn tile_len(&self) -> usize {
        self.tile_width * self.tile_height
    }

    #[inline]
    pub fn contains(&self, x: isize, y: isize) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Global index of `(x, y)`.  Panics outside the raster.
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        assert!(
            x < self.width && y < self.height,
            "cell ({x}, {y}) outside {}x{} domain",
            self.width,
            self.height
        );
        y * self.width + x
    }

    /// `(x, y)` of a global index.  Panics outside the raster.
    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize) {
        assert!(
            index < self.cell_count(),
            "cell index {index} outside domain of {} cells",
            self.cell_count()
        );
        (index % self.width, index / self.width)
    }

    /// Top-left cell of `tile`.
    #[inline]
    pub fn tile_origin(&self, tile: usize) -> (usize, usize) {
        ((tile % self.tiles_x) * self.tile_width, (tile / self.tiles_x) * self.tile_height)
    }

    /// `(tile, local)` storage address of a global index.
    #[inline]
    pub fn locate(&self, index: usize) -> (usize, usize) {
        let (x, y) = self.coords(index);
        self.locate_xy(x, y)
    }

    #[inline]
    pub fn locate_xy(&self, x: usize, y: usize) -> (usize, usize) {
        let (tx, lx) = (x / self.tile_width, x % self.tile_width);
        let (ty, ly) = (y / self.tile_height, y % self.tile_height);
        (ty * self.tiles_x + tx, ly * self.tile_width + lx)
    }

    /// Global index of a tile slot, `None` for padding beyond the raster.
    #[inline]
    pub fn global_index(&self, tile: usize, local: usize) -> Option<usize> {
        let (ox, oy) = self.tile_origin(tile);
        let x = ox + local % self.tile_width;
        let y = oy + local / self.tile_width;
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    /// True when `local` lies on the outer ring of its tile.
    #[inline]
    pub fn is_ring(&self, local: usize) -> bool {
        let lx = local % self.tile_width;
        let ly = local / self.tile_width;
        lx == 0 || ly == 0 || lx + 1 == self.tile_width || ly + 1 == self.tile_height
    }

    /// Local indices of a tile's ring: top row, bottom row, then the left and
    /// right columns without corners.  Every ring slot appears exactly once.
    pub fn ring(&self) -> impl Iterator<Item = usize> + '_ {
        let (w, h) = (self.tile_width, self.tile_height);
        let top = 0..w;
        let bottom = (h > 1).then(|| (h - 1) * w..h * w).into_iter().flatten();
        let rows = 1..h.saturating_sub(1);
        let left = rows.clone().map(move |ly| ly * w);
        let right = rows.filter(move |_| w > 1).map(move |ly| ly * w + w - 1);
        top.chain(bottom).chain(left).chain(right)
    }

    /// In-raster neighbours of `(x, y)` as `(global index, distance)`, in
    /// [`NEIGHBOUR_OFFSETS`] order.
    pub fn neighbours(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        NEIGHBOUR_OFFSETS.iter().filter_map(move |&(dx, dy)| {
            let nx = x as isize + dx;
            let ny = y as isize + dy;
            if !self.contains(nx, ny) {
                return None;
            }
            let dist = if dx != 0 && dy != 0 { std::f32::consts::SQRT_2 } else { 1.0 };
            Some((ny as usize * self.width + nx as usize, dist))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_grid_covers_domain() {
        let g = GridGeometry::new(10, 7, 4, 3).unwrap();
        assert_eq!((g.tiles_x, g.tiles_y), (3, 3));
        assert_eq!(g.tile_count(), 9);

        let g = GridGeometry::new(8, 6, 4, 3).unwrap();
        assert_eq!((g.tiles_x, g.tiles_y), (2, 2));
    }

    #[test]
    fn locate_and_global_index_agree() {
        let g = GridGeometry::new(10, 7, 4, 3).unwrap();
        for i in 0..g.cell_count() {
            let (tile, local) = g.locate(i);
            assert_eq!(g.global_index(tile, local), Some(i));
        }
        // Padding slot in the bottom-right edge tile.
        let last_tile = g.tile_count() - 1;
        assert_eq!(g.global_index(last_tile, g.tile_len() - 1), None);
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn out_of_range_coordinate_panics() {
        let g = GridGeometry::new(4, 4, 2, 2).unwrap();
        g.index(4, 0);
    }

    #[test]
    fn ring_visits_each_border_slot_once() {
        let g = GridGeometry::new(20, 20, 5, 4).unwrap();
        let mut ring: Vec<usize> = g.ring().collect();
        assert_eq!(ring.len(), 2 * 5 + 2 * (4 - 2));
        assert!(ring.iter().all(|&l| g.is_ring(l)));
        ring.sort_unstable();
        ring.dedup();
        assert_eq!(ring.len(), 14);

        let g = GridGeometry::new(3, 3, 3, 3).unwrap();
        assert_eq!(g.ring().collect::<Vec<_>>(), vec![0, 1, 2, 6, 7, 8, 3, 5]);

        let thin = GridGeometry::new(4, 4, 4, 1).unwrap();
        assert_eq!(thin.ring().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        let single = GridGeometry::new(4, 4, 1, 1).unwrap();
        assert_eq!(single.ring().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn neighbours_follow_window_order_and_clip() {
        let g = GridGeometry::new(3, 3, 3, 3).unwrap();
        let centre: Vec<usize> = g.neighbours(1, 1).map(|(i, _)| i).collect();
        assert_eq!(centre, vec![0, 1, 2, 3, 5, 6, 7, 8]);
        let corner: Vec<(usize, f32)> = g.neighbours(0, 0).collect();
        assert_eq!(corner.len(), 3);
        assert_eq!(corner[0], (1, 1.0));
        assert_eq!(corner[2].0, 4);
        assert!((corner[2].1 - std::f32::consts::SQRT_2).abs() < 1e-6);
    }
}
