//! Manning open-channel flow over a single flow link.
//!
//! Each link is treated as a rectangular channel of width `W` and length `L`
//! carrying water of depth `h`.  Velocity follows Manning's formula
//! `v = (1/r) · R^(2/3) · √S` with hydraulic radius `R = W·h / (W + 2h)`;
//! the volume moved in `dt` is spread over the source cell area `L·W`:
//!
//! `q = (dt / (L·W)) · W·h · (1/r) · R^(2/3) · √S`, clamped to `q ≤ h`.
use crate::grid::FlowLink;
use crate::settings::SimulationSettings;

/// Links shorter than this carry no flow.
pub const MIN_LINK_DISTANCE: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManningParams {
    /// Channel width W (m).
    pub channel_width: f32,
    /// Roughness coefficient r.
    pub roughness: f32,
    /// Infiltration rate (m/s), applied to every active cell.
    pub infiltration_rate: f32,
}

impl ManningParams {
    pub fn from_settings(settings: &SimulationSettings) -> Self {
        Self {
            channel_width: settings.channel_width,
            roughness: settings.roughness,
            infiltration_rate: settings.infiltration_rate,
        }
    }

    /// Depth leaving a cell of depth `h` along `link` during `dt`.
    #[inline]
    pub fn outflow(&self, h: f32, link: &FlowLink, dt: f32) -> f32 {
        let w = self.channel_width;
        let l = link.distance;
        if h <= 0.0 || l < MIN_LINK_DISTANCE || w <= 0.0 {
            return 0.0;
        }
        let area = w * h;
        let radius = area / (w + 2.0 * h);
        let q = (dt / (l * w)) * area * (1.0 / self.roughness) * radius.powf(2.0 / 3.0)
            * link.slope.sqrt();
        q.clamp(0.0, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> ManningParams {
        ManningParams { channel_width: 0.5, roughness: 0.035, infiltration_rate: 0.0 }
    }

    fn link(distance: f32, slope: f32) -> FlowLink {
        FlowLink { target: 0, distance, slope }
    }

    #[test]
    fn matches_closed_form() {
        // h = 1, W = 0.5: A = 0.5, R = 0.2.
        let expected = (0.1 / 0.5) * 0.5 * (1.0 / 0.035) * 0.2f32.powf(2.0 / 3.0);
        let q = params().outflow(1.0, &link(1.0, 1.0), 0.1);
        assert_relative_eq!(q, expected, max_relative = 1e-6);
        assert!(q < 1.0);
    }

    #[test]
    fn clamps_to_available_depth() {
        let q = params().outflow(0.01, &link(1.0, 50.0), 10.0);
        assert_eq!(q, 0.01);
    }

    #[test]
    fn degenerate_inputs_give_zero() {
        let p = params();
        assert_eq!(p.outflow(0.0, &link(1.0, 1.0), 0.1), 0.0);
        assert_eq!(p.outflow(-1.0, &link(1.0, 1.0), 0.1), 0.0);
        assert_eq!(p.outflow(1.0, &link(0.0, 1.0), 0.1), 0.0);
        assert_eq!(p.outflow(1.0, &link(1.0, 0.0), 0.1), 0.0);
    }

    #[test]
    fn steeper_and_deeper_flow_faster() {
        let p = params();
        let shallow = p.outflow(0.01, &link(1.0, 0.1), 0.1);
        let deep = p.outflow(0.02, &link(1.0, 0.1), 0.1);
        let steep = p.outflow(0.01, &link(1.0, 0.4), 0.1);
        assert!(deep > shallow);
        assert_relative_eq!(steep, 2.0 * shallow, max_relative = 1e-5);
    }
}
