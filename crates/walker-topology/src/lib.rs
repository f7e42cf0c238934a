//! Walker Delta Topology
//!
//! Places a Walker Delta constellation into a [`constellation_net::Network`]
//! and keeps its connectivity honest:
//! - [`place_satellites`] creates one node per grid cell with a circular
//!   orbit derived from the layout
//! - [`build_isl_mesh`] wires the static 4-regular toroidal ISL mesh
//! - [`update_ground_links`] runs the periodic distance-based handover sweep
//!   for ground terminals
//!
//! The grid is planes x satellites-per-plane; both axes wrap, so every
//! satellite has exactly four inter-satellite neighbors for the whole run.

pub mod handover;
pub mod mesh;

pub use handover::{place_terminal, update_ground_links, SweepStats};
pub use mesh::{build_isl_mesh, place_satellites, IslDirection};

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Satellite interface carrying the ground link; eth0..eth3 are ISLs.
pub const GROUND_IFINDEX: u32 = 4;

/// Terminal interface carrying the uplink.
pub const TERMINAL_IFINDEX: u32 = 0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    #[error("degenerate walker grid: {0}")]
    LayoutDegenerate(String),

    #[error("phasing factor {factor} must be less than the plane count {planes}")]
    InvalidPhasing { factor: u32, planes: u32 },

    #[error("layout describes {expected} satellites but {actual} were supplied")]
    GridMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Orbit(#[from] orbit_mobility::OrbitError),

    #[error(transparent)]
    Net(#[from] constellation_net::NetError),
}

pub type Result<T> = std::result::Result<T, TopologyError>;

/// Walker Delta layout: `planes` orbital planes spread evenly over 360
/// degrees of right ascension, `sats_per_plane` satellites spread evenly
/// along each plane, and an inter-plane phasing of
/// `phasing_factor / planes` of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkerLayout {
    pub planes: u32,
    pub sats_per_plane: u32,
    pub phasing_factor: u32,
    pub inclination_deg: f64,
    pub altitude_km: f64,
    pub raan_offset_deg: f64,
    pub phase_offset_deg: f64,
    pub earth_rotation_rad_s: f64,
}

impl WalkerLayout {
    /// A grid needs at least two planes and two satellites per plane;
    /// anything smaller would fold ISL neighbors onto the satellite itself.
    pub fn validate(&self) -> Result<()> {
        if self.planes < 2 || self.sats_per_plane < 2 {
            return Err(TopologyError::LayoutDegenerate(format!(
                "{} planes x {} satellites",
                self.planes, self.sats_per_plane
            )));
        }
        if self.phasing_factor >= self.planes {
            return Err(TopologyError::InvalidPhasing {
                factor: self.phasing_factor,
                planes: self.planes,
            });
        }
        if !self.inclination_deg.is_finite()
            || !self.raan_offset_deg.is_finite()
            || !self.phase_offset_deg.is_finite()
            || !self.earth_rotation_rad_s.is_finite()
        {
            return Err(TopologyError::LayoutDegenerate(
                "non-finite layout angle".to_string(),
            ));
        }
        Ok(())
    }

    pub fn satellite_count(&self) -> usize {
        (self.planes * self.sats_per_plane) as usize
    }

    /// Offset of grid cell (plane, slot) in placement order. Both axes
    /// wrap, so any signed coordinate names a valid cell.
    pub fn grid_index(&self, plane: i64, slot: i64) -> usize {
        let planes = self.planes as i64;
        let per_plane = self.sats_per_plane as i64;
        let p = plane.rem_euclid(planes);
        let s = slot.rem_euclid(per_plane);
        (p * per_plane + s) as usize
    }

    /// Right ascension of the ascending node for a plane, radians.
    pub fn raan_rad(&self, plane: u32) -> f64 {
        TAU * plane as f64 / self.planes as f64 + self.raan_offset_deg.to_radians()
    }

    /// In-plane anomaly at epoch for grid cell (plane, slot), radians.
    /// The `phasing_factor / planes` term staggers consecutive planes.
    pub fn initial_phase_rad(&self, plane: u32, slot: u32) -> f64 {
        let per_plane = self.sats_per_plane as f64;
        let stagger = plane as f64 * self.phasing_factor as f64 / self.planes as f64;
        TAU / per_plane * (slot as f64 + stagger) + self.phase_offset_deg.to_radians()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_4x4() -> WalkerLayout {
        WalkerLayout {
            planes: 4,
            sats_per_plane: 4,
            phasing_factor: 1,
            inclination_deg: 53.0,
            altitude_km: 600.0,
            raan_offset_deg: 0.0,
            phase_offset_deg: 0.0,
            earth_rotation_rad_s: 0.0,
        }
    }

    #[test]
    fn degenerate_grids_are_rejected() {
        let mut layout = layout_4x4();
        layout.planes = 1;
        assert!(matches!(
            layout.validate(),
            Err(TopologyError::LayoutDegenerate(_))
        ));

        let mut layout = layout_4x4();
        layout.sats_per_plane = 1;
        assert!(layout.validate().is_err());
    }

    #[test]
    fn phasing_factor_must_stay_below_plane_count() {
        let mut layout = layout_4x4();
        layout.phasing_factor = 4;
        assert_eq!(
            layout.validate(),
            Err(TopologyError::InvalidPhasing {
                factor: 4,
                planes: 4
            })
        );
    }

    #[test]
    fn grid_index_wraps_both_axes() {
        let layout = layout_4x4();
        assert_eq!(layout.grid_index(0, 0), 0);
        assert_eq!(layout.grid_index(2, 3), 11);
        assert_eq!(layout.grid_index(-1, 0), 12);
        assert_eq!(layout.grid_index(0, -1), 3);
        assert_eq!(layout.grid_index(4, 4), 0);
    }

    #[test]
    fn phasing_staggers_consecutive_planes_fractionally() {
        // 4 planes, 4 per plane, F = 1: the second plane leads the first by
        // an eighth of a slot spacing, i.e. pi/8.
        let layout = layout_4x4();
        assert!((layout.initial_phase_rad(0, 0) - 0.0).abs() < 1e-12);
        assert!((layout.initial_phase_rad(1, 0) - std::f64::consts::PI / 8.0).abs() < 1e-12);
        assert!(
            (layout.initial_phase_rad(1, 1)
                - (TAU / 4.0 + std::f64::consts::PI / 8.0))
                .abs()
                < 1e-12
        );
    }

    #[test]
    fn planes_spread_evenly_in_right_ascension() {
        let layout = layout_4x4();
        assert!((layout.raan_rad(2) - std::f64::consts::PI).abs() < 1e-12);

        let mut shifted = layout;
        shifted.raan_offset_deg = 90.0;
        assert!((shifted.raan_rad(0) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
