//! Global list of active cells.
//!
//! Complements the per-tile bitmaps: the bitmaps are refreshed by every step
//! and drive phase skipping, while this list backs output enumeration.  Cells
//! are appended when they turn wet and are only removed by an explicit
//! [`ActiveCells::sweep`], which the driving loop runs every few hundred steps.
use crate::grid::Domain;

#[derive(Debug, Clone, Default)]
pub struct ActiveCells {
    indices: Vec<usize>,
}

impl ActiveCells {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Listed indices; call again to restart.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    /// Append cells whose `listed` flag the caller has already set.
    pub(crate) fn extend(&mut self, fresh: impl IntoIterator<Item = usize>) {
        self.indices.extend(fresh);
    }

    /// Keep only the entries for which `keep` holds.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(usize) -> bool) {
        self.indices.retain(|&i| keep(i));
    }

    /// Flag `index` in its tile bitmap and list it if it is wet and not yet
    /// listed.  Returns true when the cell was newly listed.
    pub fn activate(&mut self, domain: &mut Domain, index: usize) -> bool {
        let cell = domain.cell_at_mut(index);
        if !cell.is_wet() {
            return false;
        }
        let newly = !cell.listed;
        if newly {
            cell.listed = true;
            self.indices.push(index);
        }
        domain.set_active(index, true);
        newly
    }

    /// Drop entries that neither hold water nor receive rain, then compact
    /// the list into raster order.  Returns the number removed.
    pub fn sweep(&mut self, domain: &mut Domain) -> usize {
        let before = self.indices.len();
        self.indices.retain(|&i| {
            let cell = domain.cell_at_mut(i);
            if cell.is_wet() {
                true
            } else {
                cell.listed = false;
                false
            }
        });
        self.indices.sort_unstable();
        let removed = before - self.indices.len();
        log::debug!("sweep: removed {removed}, {} cells remain active", self.indices.len());
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridGeometry;

    fn domain() -> Domain {
        let mut d = Domain::new(GridGeometry::new(4, 4, 2, 2).unwrap());
        d.load_elevations(&[1.0; 16]).unwrap();
        d
    }

    #[test]
    fn activate_lists_wet_cells_once() {
        let mut d = domain();
        let mut active = ActiveCells::new();
        assert!(!active.activate(&mut d, 3), "dry cell is not listed");

        d.cell_at_mut(3).water = 0.2;
        assert!(active.activate(&mut d, 3));
        assert!(!active.activate(&mut d, 3));
        assert_eq!(active.iter().collect::<Vec<_>>(), vec![3]);
        assert!(d.is_active(3));
    }

    #[test]
    fn sweep_removes_dry_and_keeps_raining_cells() {
        let mut d = domain();
        let mut active = ActiveCells::new();
        for (i, water) in [(9, 0.5), (2, 0.1), (5, 0.3)] {
            d.cell_at_mut(i).water = water;
            active.activate(&mut d, i);
        }
        d.cell_at_mut(2).water = 0.0;
        d.cell_at_mut(5).water = 0.0;
        d.cell_at_mut(5).rain = 1e-6;

        assert_eq!(active.sweep(&mut d), 1);
        assert_eq!(active.iter().collect::<Vec<_>>(), vec![5, 9]);
        assert!(!d.cell_at(2).listed);

        // Dried cells can be listed again later.
        d.cell_at_mut(2).water = 1.0;
        assert!(active.activate(&mut d, 2));
    }

    #[test]
    fn sweep_is_idempotent() {
        let mut d = domain();
        let mut active = ActiveCells::new();
        for i in [7, 1, 12] {
            d.cell_at_mut(i).water = 1.0;
            active.activate(&mut d, i);
        }
        d.cell_at_mut(1).water = 0.0;
        active.sweep(&mut d);
        let first: Vec<usize> = active.iter().collect();
        assert_eq!(active.sweep(&mut d), 0);
        assert_eq!(active.iter().collect::<Vec<_>>(), first);
    }
}
