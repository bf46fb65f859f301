//! Public entry point tying the domain, flow graph, task pool and solver
//! together.
//!
//! Lifecycle: [`Simulation::new`] → [`Simulation::load_elevations`] →
//! [`Simulation::build_flow_graph`] → any number of rain updates and
//! [`Simulation::step`] calls.
use crate::active::ActiveCells;
use crate::error::SimError;
use crate::grid::{Domain, FlowLink, GridGeometry};
use crate::heightfield::HeightField;
use crate::hydraulic::{build_flow_graph, ManningParams, ManningSolver};
use crate::output::{MetadataHeader, WaterSample};
use crate::pool::TaskPool;
use crate::settings::SimulationSettings;

pub struct Simulation {
    settings: SimulationSettings,
    domain: Domain,
    pool: TaskPool,
    solver: ManningSolver,
    active: ActiveCells,
    /// Cells with a non-zero rain rate, each listed once.
    rain_cells: Vec<usize>,
    elevations_loaded: bool,
    flow_graph_built: bool,
    steps: u64,
}

impl Simulation {
    /// Validate `settings`, allocate the tiled domain and start the pool.
    pub fn new(settings: SimulationSettings) -> Result<Self, SimError> {
        settings.validate()?;
        let geometry = GridGeometry::new(
            settings.width,
            settings.height,
            settings.tile_width,
            settings.tile_height,
        )?;
        log::info!(
            "domain {}x{} cells in {}x{} tiles of {}x{}",
            geometry.width,
            geometry.height,
            geometry.tiles_x,
            geometry.tiles_y,
            geometry.tile_width,
            geometry.tile_height
        );
        let pool = TaskPool::new(settings.threads)?;
        let solver = ManningSolver::new(ManningParams::from_settings(&settings));
        Ok(Self {
            domain: Domain::new(geometry),
            pool,
            solver,
            active: ActiveCells::new(),
            rain_cells: Vec::new(),
            elevations_loaded: false,
            flow_graph_built: false,
            steps: 0,
            settings,
        })
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn geometry(&self) -> &GridGeometry {
        self.domain.geometry()
    }

    pub fn threads(&self) -> usize {
        self.pool.threads()
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps
    }

    /// Ingest a row-major elevation raster; negative samples are nodata.
    /// Terrain is fixed once the flow graph exists.
    pub fn load_elevations(&mut self, elevations: &[f32]) -> Result<(), SimError> {
        if self.flow_graph_built {
            return Err(SimError::FlowGraphAlreadyBuilt);
        }
        self.domain.load_elevations(elevations)?;
        let domain = &self.domain;
        self.rain_cells.retain(|&i| !domain.cell_at(i).is_nodata());
        self.active.retain(|i| !domain.cell_at(i).is_nodata());
        self.elevations_loaded = true;
        Ok(())
    }

    pub fn load_heightfield(&mut self, hf: &HeightField) -> Result<(), SimError> {
        let geometry = self.geometry();
        if (hf.width, hf.height) != (geometry.width, geometry.height) {
            return Err(SimError::DimensionMismatch {
                expected: (geometry.width, geometry.height),
                actual: (hf.width, hf.height),
            });
        }
        self.load_elevations(&hf.data)
    }

    /// Compute every cell's steepest-descent link.  Runs exactly once.
    pub fn build_flow_graph(&mut self) -> Result<usize, SimError> {
        if !self.elevations_loaded {
            return Err(SimError::ElevationsNotLoaded);
        }
        if self.flow_graph_built {
            return Err(SimError::FlowGraphAlreadyBuilt);
        }
        let linked = build_flow_graph(&mut self.domain);
        self.flow_graph_built = true;
        Ok(linked)
    }

    /// Set the rain rate (m/s) of one cell.  Rain on nodata cells and
    /// negative or non-finite rates are ignored.
    pub fn apply_rain(&mut self, index: usize, rate: f32) {
        let cell = self.domain.cell_at_mut(index);
        if cell.is_nodata() {
            log::trace!("ignoring rain on nodata cell {index}");
            return;
        }
        if !(rate.is_finite() && rate >= 0.0) {
            log::warn!("ignoring invalid rain rate {rate} for cell {index}");
            return;
        }
        let was_raining = cell.rain > 0.0;
        cell.rain = rate;
        match (was_raining, rate > 0.0) {
            (false, true) => self.rain_cells.push(index),
            (true, false) => self.rain_cells.retain(|&i| i != index),
            _ => {}
        }
        if rate > 0.0 {
            self.active.activate(&mut self.domain, index);
        }
    }

    /// Replace the whole rain schedule with a sparse `(index, rate)` list.
    pub fn set_rain(&mut self, cells: &[(usize, f32)]) {
        for &index in &self.rain_cells {
            self.domain.cell_at_mut(index).rain = 0.0;
        }
        self.rain_cells.clear();
        for &(index, rate) in cells {
            self.apply_rain(index, rate);
        }
        log::debug!("rain schedule: {} cells", self.rain_cells.len());
    }

    pub fn rain_rate(&self, index: usize) -> f32 {
        self.domain.cell_at(index).rain
    }

    /// Overwrite a cell's depth (clamped at zero).
    pub fn set_water_level(&mut self, index: usize, level: f32) {
        self.update_water(index, |_| level);
    }

    /// Add `delta` to a cell's depth (clamped at zero).
    pub fn modify_water_level(&mut self, index: usize, delta: f32) {
        self.update_water(index, |w| w + delta);
    }

    fn update_water(&mut self, index: usize, f: impl FnOnce(f32) -> f32) {
        let cell = self.domain.cell_at_mut(index);
        if cell.is_nodata() {
            log::warn!("ignoring water on nodata cell {index}");
            return;
        }
        cell.water = f(cell.water).max(0.0);
        if cell.water > 0.0 {
            self.active.activate(&mut self.domain, index);
        }
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f32) -> Result<(), SimError> {
        if !self.flow_graph_built {
            return Err(SimError::FlowGraphNotBuilt);
        }
        let fresh = self.solver.step(&mut self.domain, &self.pool, dt)?;
        self.active.extend(fresh);
        self.steps += 1;
        Ok(())
    }

    /// Remove cells that have dried out from the active list.
    pub fn sweep(&mut self) -> usize {
        self.active.sweep(&mut self.domain)
    }

    /// Active cell indices.  Lazy and restartable; may include cells that
    /// dried since the last [`Self::sweep`].
    pub fn active_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.active.iter()
    }

    /// `(index, depth)` of every active cell currently holding water.
    pub fn wet_cells(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.active.iter().filter_map(|i| {
            let level = self.domain.cell_at(i).water;
            (level > 0.0).then_some((i, level))
        })
    }

    pub fn water_level(&self, index: usize) -> f32 {
        self.domain.cell_at(index).water
    }

    pub fn flow_link(&self, index: usize) -> Option<FlowLink> {
        self.domain.cell_at(index).link
    }

    pub fn total_water(&self) -> f64 {
        self.domain.total_water()
    }

    pub fn metadata(&self) -> MetadataHeader {
        MetadataHeader::from_settings(&self.settings)
    }

    /// Output samples for the current state, in active-list order.
    pub fn snapshot(&self) -> Vec<WaterSample> {
        self.wet_cells()
            .map(|(index, level)| WaterSample { index: index as u32, level })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightfield::NODATA;

    fn sim(w: usize, h: usize) -> Simulation {
        let settings = SimulationSettings {
            tile_width: 2,
            tile_height: 2,
            threads: 2,
            ..SimulationSettings::with_size(w, h)
        };
        Simulation::new(settings).unwrap()
    }

    #[test]
    fn lifecycle_order_is_enforced() {
        let mut s = sim(3, 3);
        assert!(matches!(s.build_flow_graph(), Err(SimError::ElevationsNotLoaded)));
        assert!(matches!(s.step(0.1), Err(SimError::FlowGraphNotBuilt)));
        s.load_elevations(&[1.0; 9]).unwrap();
        s.build_flow_graph().unwrap();
        assert!(matches!(s.build_flow_graph(), Err(SimError::FlowGraphAlreadyBuilt)));
        assert!(matches!(s.load_elevations(&[1.0; 9]), Err(SimError::FlowGraphAlreadyBuilt)));
        s.step(0.1).unwrap();
        assert_eq!(s.steps_taken(), 1);
    }

    #[test]
    fn heightfield_dimensions_must_match() {
        let mut s = sim(4, 2);
        let hf = HeightField::new(2, 4, 0.0);
        assert!(matches!(
            s.load_heightfield(&hf),
            Err(SimError::DimensionMismatch { expected: (4, 2), actual: (2, 4) })
        ));
        s.load_heightfield(&HeightField::new(4, 2, 0.0)).unwrap();
    }

    #[test]
    fn rain_on_nodata_is_ignored() {
        let mut s = sim(2, 2);
        s.load_elevations(&[1.0, NODATA, 1.0, 1.0]).unwrap();
        s.apply_rain(1, 1e-3);
        s.set_water_level(1, 1.0);
        assert_eq!(s.rain_rate(1), 0.0);
        assert_eq!(s.water_level(1), 0.0);
        assert_eq!(s.active_cells().count(), 0);
    }

    #[test]
    fn set_rain_replaces_previous_schedule() {
        let mut s = sim(3, 3);
        s.load_elevations(&[1.0; 9]).unwrap();
        s.set_rain(&[(0, 1e-3), (4, 2e-3)]);
        s.set_rain(&[(8, 1e-3)]);
        assert_eq!(s.rain_rate(0), 0.0);
        assert_eq!(s.rain_rate(4), 0.0);
        assert_eq!(s.rain_rate(8), 1e-3);
        // Previously raining cells stay listed until a sweep.
        assert_eq!(s.active_cells().collect::<Vec<_>>(), vec![0, 4, 8]);
        assert_eq!(s.sweep(), 2);
        assert_eq!(s.active_cells().collect::<Vec<_>>(), vec![8]);
    }

    #[test]
    fn rain_cells_are_recorded_once() {
        let mut s = sim(3, 3);
        s.load_elevations(&[1.0; 9]).unwrap();
        for _ in 0..5 {
            s.apply_rain(3, 1e-3);
            s.apply_rain(3, 0.0);
        }
        assert!(s.rain_cells.is_empty());
        s.apply_rain(3, 1e-3);
        s.apply_rain(3, 2e-3);
        assert_eq!(s.rain_cells, vec![3]);
        s.set_rain(&[]);
        assert_eq!(s.rain_rate(3), 0.0);
        assert!(s.rain_cells.is_empty());
    }

    #[test]
    fn reloading_a_cell_as_nodata_drops_its_water() {
        let mut s = sim(2, 2);
        s.load_elevations(&[1.0; 4]).unwrap();
        s.set_water_level(1, 0.5);
        s.apply_rain(2, 1e-3);
        s.load_elevations(&[1.0, NODATA, NODATA, 1.0]).unwrap();
        s.build_flow_graph().unwrap();
        s.step(0.1).unwrap();

        assert_eq!(s.water_level(1), 0.0);
        assert_eq!(s.water_level(2), 0.0);
        assert_eq!(s.rain_rate(2), 0.0);
        assert!(s.rain_cells.is_empty());
        assert_eq!(s.active_cells().count(), 0);
        assert!(s.snapshot().is_empty());
        assert_eq!(s.total_water(), 0.0);
    }

    #[test]
    fn water_levels_clamp_at_zero() {
        let mut s = sim(2, 2);
        s.load_elevations(&[1.0; 4]).unwrap();
        s.set_water_level(3, -2.0);
        assert_eq!(s.water_level(3), 0.0);
        s.modify_water_level(3, 0.5);
        s.modify_water_level(3, -0.2);
        assert!((s.water_level(3) - 0.3).abs() < 1e-6);
        s.modify_water_level(3, -1.0);
        assert_eq!(s.water_level(3), 0.0);
        assert_eq!(s.active_cells().collect::<Vec<_>>(), vec![3]);
        assert_eq!(s.wet_cells().count(), 0);
    }

    #[test]
    fn active_cells_is_restartable() {
        let mut s = sim(3, 3);
        s.load_elevations(&[1.0; 9]).unwrap();
        s.set_water_level(5, 1.0);
        s.set_water_level(2, 1.0);
        let first: Vec<usize> = s.active_cells().collect();
        let second: Vec<usize> = s.active_cells().collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![5, 2]);
    }

    #[test]
    fn snapshot_reports_wet_cells() {
        let mut s = sim(3, 1);
        s.load_elevations(&[1.0; 3]).unwrap();
        s.set_water_level(2, 0.75);
        assert_eq!(s.snapshot(), vec![WaterSample { index: 2, level: 0.75 }]);
        let meta = s.metadata();
        assert_eq!((meta.width, meta.height), (3, 1));
    }
}
