//! Three-phase explicit update.
//!
//! 1. **Interior flux**: one pool task per active tile.  Interior cells
//!    always route inside their own tile, so each task only touches the tile
//!    it owns.  Outflow leaves the source immediately and is parked in the
//!    target's [`Phase::Interior`] slot.
//! 2. **Border flux**: one sequential pass over the ring cells of every
//!    active tile, after phase 1 has joined.  Ring cells may route into a
//!    neighbouring tile, so this pass is the only writer of
//!    [`Phase::Border`] slots.
//! 3. **Apply**: one pool task per active tile merges the deferred slots,
//!    adds rain, removes infiltration, clamps at zero and refreshes the
//!    tile's active bits.
//!
//! Tiles are moved into pool tasks by value and sent back over a channel, so
//! exclusive access per phase is checked by the compiler rather than by
//! locks.  Every slot is filled by one sequential loop, so results do not
//! depend on thread count or scheduling.
use std::sync::{mpsc, Arc};

use super::manning::ManningParams;
use crate::error::SimError;
use crate::grid::{Domain, GridGeometry, Phase, Tile};
use crate::pool::TaskPool;
use crate::settings::validate_dt;

#[derive(Debug, Clone, Copy)]
pub struct ManningSolver {
    params: ManningParams,
}

impl ManningSolver {
    pub fn new(params: ManningParams) -> Self {
        Self { params }
    }

    /// Advance `domain` by `dt` seconds.  Returns the global indices of cells
    /// that became wet and were not yet listed, in tile order.
    pub fn step(&self, domain: &mut Domain, pool: &TaskPool, dt: f32) -> Result<Vec<usize>, SimError> {
        validate_dt(dt)?;
        if !domain.is_intact() {
            return Err(SimError::Poisoned);
        }
        let geometry = *domain.geometry();
        let params = self.params;
        log::trace!("step dt={dt}: {} active tiles", domain.active_tile_count());

        fan_out(domain, pool, move |tile| interior_flux(tile, &params, &geometry, dt))?;
        border_flux(domain, &params, dt);
        let fresh = fan_out(domain, pool, move |tile| apply_changes(tile, &params, &geometry, dt))?;

        Ok(fresh.into_iter().flatten().collect())
    }
}

/// Run `job` on every active tile in parallel and wait for all of them.
/// Results are indexed by tile id; skipped tiles yield `R::default()`.
fn fan_out<R, F>(domain: &mut Domain, pool: &TaskPool, job: F) -> Result<Vec<R>, SimError>
where
    R: Default + Send + 'static,
    F: Fn(&mut Tile) -> R + Send + Sync + 'static,
{
    let job = Arc::new(job);
    let tiles = domain.take_tiles();
    let count = tiles.len();
    let mut slots: Vec<Option<Tile>> = (0..count).map(|_| None).collect();
    let mut results: Vec<R> = (0..count).map(|_| R::default()).collect();

    let (tx, rx) = mpsc::channel();
    for mut tile in tiles {
        if !tile.has_active() {
            let id = tile.id;
            slots[id] = Some(tile);
            continue;
        }
        let job = Arc::clone(&job);
        let tx = tx.clone();
        pool.submit(move || {
            let result = job(&mut tile);
            // The receiver outlives the join barrier.
            let _ = tx.send((tile, result));
        });
    }
    drop(tx);

    let joined = pool.join();
    for (tile, result) in rx.try_iter() {
        let id = tile.id;
        results[id] = result;
        slots[id] = Some(tile);
    }
    domain.restore_tiles(slots);
    joined?;
    if !domain.is_intact() {
        return Err(SimError::Poisoned);
    }
    Ok(results)
}

/// Phase 1: flux out of the active non-ring cells of one tile.
fn interior_flux(tile: &mut Tile, params: &ManningParams, geometry: &GridGeometry, dt: f32) {
    for w in 0..tile.active.word_count() {
        let mut bits = tile.active.word(w);
        while bits != 0 {
            let local = w * 64 + bits.trailing_zeros() as usize;
            bits &= bits - 1;
            if geometry.is_ring(local) {
                continue;
            }

            let cell = &mut tile.cells[local];
            let Some(link) = cell.link else { continue };
            let q = params.outflow(cell.water, &link, dt);
            if q <= 0.0 {
                continue;
            }
            cell.water -= q;

            let (tx, ty) = geometry.coords(link.target);
            let Some(target) = tile.local_of(tx, ty) else {
                unreachable!("interior cell {local} of tile {} routes outside the tile", tile.id)
            };
            tile.cells[target].defer(Phase::Interior, q);
            tile.active.insert(target);
        }
    }
}

/// Phase 2: flux out of ring cells, which may cross into neighbouring tiles.
fn border_flux(domain: &mut Domain, params: &ManningParams, dt: f32) {
    let geometry = *domain.geometry();
    for id in 0..geometry.tile_count() {
        if !domain.tile(id).has_active() {
            continue;
        }
        for local in geometry.ring() {
            let (target, q) = {
                let cell = &mut domain.tile_mut(id).cells[local];
                let Some(link) = cell.link else { continue };
                let q = params.outflow(cell.water, &link, dt);
                if q <= 0.0 {
                    continue;
                }
                cell.water -= q;
                (link.target, q)
            };
            domain.cell_at_mut(target).defer(Phase::Border, q);
            domain.set_active(target, true);
        }
    }
}

/// Phase 3: commit deferred inflow, rain and infiltration for one tile.
/// Returns global indices of cells that were added to the active list.
fn apply_changes(tile: &mut Tile, params: &ManningParams, geometry: &GridGeometry, dt: f32) -> Vec<usize> {
    let drain = params.infiltration_rate * dt;
    let mut fresh = Vec::new();
    for w in 0..tile.active.word_count() {
        let mut bits = tile.active.word(w);
        while bits != 0 {
            let local = w * 64 + bits.trailing_zeros() as usize;
            bits &= bits - 1;

            let cell = &mut tile.cells[local];
            let inflow = cell.take_inflow();
            cell.water = (cell.water + inflow + cell.rain * dt - drain).max(0.0);
            let wet = cell.is_wet();
            tile.active.set(local, wet);
            if wet && !cell.listed {
                cell.listed = true;
                fresh.extend(geometry.global_index(tile.id, local));
            }
        }
    }
    fresh
}
