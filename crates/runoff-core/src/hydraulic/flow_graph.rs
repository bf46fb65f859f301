//! D8 steepest-descent flow graph.
//!
//! Each valid cell is linked to the neighbour with the most negative gradient
//! `(h_n − h) / d`, `d` = 1 for orthogonal and √2 for diagonal neighbours.
//! Ties keep the first neighbour in [`crate::grid::NEIGHBOUR_OFFSETS`] order.  Cells with
//! no strictly lower valid neighbour are sinks.  Nodata cells never get a link
//! and are never targeted.  Terrain is static, so the graph is built once.
use crate::grid::{Domain, FlowLink, GridGeometry};
use crate::heightfield::is_nodata;

/// Steepest downhill link of `index`, `None` for sinks and nodata cells.
pub fn steepest_descent(elevations: &[f32], geometry: &GridGeometry, index: usize) -> Option<FlowLink> {
    let h = elevations[index];
    if is_nodata(h) {
        return None;
    }
    let (x, y) = geometry.coords(index);
    let mut lowest = 0.0f32;
    let mut link = None;
    for (n, distance) in geometry.neighbours(x, y) {
        let hn = elevations[n];
        if is_nodata(hn) {
            continue;
        }
        let gradient = (hn - h) / distance;
        if gradient < lowest {
            lowest = gradient;
            link = Some(FlowLink { target: n, distance, slope: -gradient });
        }
    }
    link
}

/// Flow links for a whole row-major raster, indexed globally.
pub fn compute_flow_links(elevations: &[f32], geometry: &GridGeometry) -> Vec<Option<FlowLink>> {
    debug_assert_eq!(elevations.len(), geometry.cell_count());

    #[cfg(feature = "threading")]
    {
        use rayon::prelude::*;
        (0..geometry.cell_count())
            .into_par_iter()
            .map(|i| steepest_descent(elevations, geometry, i))
            .collect()
    }

    #[cfg(not(feature = "threading"))]
    {
        (0..geometry.cell_count())
            .map(|i| steepest_descent(elevations, geometry, i))
            .collect()
    }
}

/// Compute and store the flow graph of `domain`.  Returns the number of
/// linked (non-sink) cells.
pub fn build_flow_graph(domain: &mut Domain) -> usize {
    let geometry = *domain.geometry();
    let elevations = domain.elevations();
    let links = compute_flow_links(&elevations, &geometry);
    let mut linked = 0;
    for (i, link) in links.into_iter().enumerate() {
        linked += link.is_some() as usize;
        domain.cell_at_mut(i).link = link;
    }
    log::debug!(
        "flow graph: {linked} links, {} sinks/nodata over {} cells",
        geometry.cell_count() - linked,
        geometry.cell_count()
    );
    linked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::NEIGHBOUR_OFFSETS;
    use crate::heightfield::NODATA;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn geom(w: usize, h: usize) -> GridGeometry {
        GridGeometry::new(w, h, w, h).unwrap()
    }

    #[test]
    fn nodata_centre_is_never_targeted() {
        let g = geom(3, 3);
        let mut elev = vec![0.0f32; 9];
        elev[4] = NODATA;
        let links = compute_flow_links(&elev, &g);
        assert!(links.iter().flatten().all(|l| l.target != 4));
        assert!(links[4].is_none());

        // Even when the ring slopes toward the centre.
        let elev = vec![5.0, 5.0, 5.0, 5.0, NODATA, 5.0, 5.0, 5.0, 1.0];
        let links = compute_flow_links(&elev, &g);
        assert!(links.iter().flatten().all(|l| l.target != 4));
        assert_eq!(links[5].map(|l| l.target), Some(8));
        assert_eq!(links[0], None, "corner (0,0) only borders equal or nodata cells");
    }

    #[test]
    fn flat_terrain_is_all_sinks() {
        let g = geom(4, 4);
        let links = compute_flow_links(&[2.0; 16], &g);
        assert!(links.iter().all(Option::is_none));
    }

    #[test]
    fn diagonal_distance_scales_gradient() {
        // Centre 10; north neighbour 9 (gradient −1), NE neighbour 8
        // (gradient −2/√2 ≈ −1.414) → diagonal wins.
        let g = geom(3, 3);
        let elev = vec![10.0, 9.0, 8.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0];
        let link = steepest_descent(&elev, &g, 4).unwrap();
        assert_eq!(link.target, 2);
        assert!((link.distance - std::f32::consts::SQRT_2).abs() < 1e-6);
        assert!((link.slope - 2.0 / std::f32::consts::SQRT_2).abs() < 1e-5);
    }

    #[test]
    fn ties_resolve_to_first_in_window_order() {
        // North (index 1) and west (index 3) both drop by 1 → north comes first.
        let g = geom(3, 3);
        let elev = vec![5.0, 4.0, 5.0, 4.0, 5.0, 5.0, 5.0, 5.0, 5.0];
        assert_eq!(steepest_descent(&elev, &g, 4).unwrap().target, 1);
        // Only south and east lower → east (offset (1,0)) precedes south.
        let elev = vec![5.0, 5.0, 5.0, 5.0, 5.0, 4.0, 5.0, 4.0, 5.0];
        assert_eq!(steepest_descent(&elev, &g, 4).unwrap().target, 5);
        assert_eq!(NEIGHBOUR_OFFSETS[4], (1, 0));
    }

    #[test]
    fn targets_are_strictly_lower_on_random_terrain() {
        let mut rng = StdRng::seed_from_u64(7);
        let g = geom(40, 30);
        let elev: Vec<f32> = (0..g.cell_count())
            .map(|_| if rng.gen_bool(0.05) { NODATA } else { rng.gen_range(0.0..100.0) })
            .collect();
        let links = compute_flow_links(&elev, &g);
        for (i, link) in links.iter().enumerate() {
            if let Some(l) = link {
                assert!(!is_nodata(elev[l.target]));
                assert!(elev[l.target] < elev[i], "cell {i} routes uphill");
                assert!(l.slope > 0.0);
            } else if !is_nodata(elev[i]) {
                let (x, y) = g.coords(i);
                assert!(g
                    .neighbours(x, y)
                    .all(|(n, _)| is_nodata(elev[n]) || elev[n] >= elev[i]));
            }
        }
    }

    #[test]
    fn build_stores_links_in_tiles() {
        let g = GridGeometry::new(5, 1, 2, 1).unwrap();
        let mut d = Domain::new(g);
        d.load_elevations(&[4.0, 3.0, 2.0, 1.0, 0.0]).unwrap();
        assert_eq!(build_flow_graph(&mut d), 4);
        for i in 0..4 {
            assert_eq!(d.cell_at(i).link.map(|l| l.target), Some(i + 1));
        }
        assert!(d.cell_at(4).is_sink());
    }
}
