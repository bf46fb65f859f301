use crate::heightfield::{is_nodata, NODATA};

/// Steepest-descent routing edge to the unique downhill neighbour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowLink {
    /// Global index of the receiving cell.
    pub target: usize,
    /// Centre-to-centre distance in cells (1 or √2).
    pub distance: f32,
    /// Slope magnitude |Δh| / distance.
    pub slope: f32,
}

/// Synchronization phase that wrote a deferred contribution.  Each phase owns
/// one accumulator slot so no two concurrently running writers share a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Flux from interior cells, written by per-tile workers.
    Interior = 0,
    /// Flux from tile ring cells, written by the single border pass.
    Border = 1,
}

impl Phase {
    pub const COUNT: usize = 2;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Terrain height in metres; negative marks nodata.
    pub elevation: f32,
    /// Water depth in metres, never negative after a step.
    pub water: f32,
    /// Deferred inflow per [`Phase`], merged and zeroed by the apply phase.
    pub inflow: [f32; Phase::COUNT],
    /// Rain rate in m/s.
    pub rain: f32,
    pub link: Option<FlowLink>,
    /// Member of the global active list.
    pub listed: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            elevation: NODATA,
            water: 0.0,
            inflow: [0.0; Phase::COUNT],
            rain: 0.0,
            link: None,
            listed: false,
        }
    }
}

impl Cell {
    #[inline]
    pub fn is_nodata(&self) -> bool {
        is_nodata(self.elevation)
    }

    #[inline]
    pub fn is_sink(&self) -> bool {
        self.link.is_none()
    }

    /// Carries water or receives rain.
    #[inline]
    pub fn is_wet(&self) -> bool {
        self.water > 0.0 || self.rain > 0.0
    }

    #[inline]
    pub fn defer(&mut self, phase: Phase, amount: f32) {
        self.inflow[phase as usize] += amount;
    }

    /// Sum and zero all deferred slots.
    #[inline]
    pub fn take_inflow(&mut self) -> f32 {
        let total = self.inflow.iter().sum();
        self.inflow = [0.0; Phase::COUNT];
        total
    }
}
