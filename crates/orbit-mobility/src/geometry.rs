//! Spherical Earth geometry.
//!
//! Link delays are derived from straight-line distance between endpoints.
//! Positions are projected onto Earth-centred Cartesian axes assuming a
//! spherical Earth of radius [`EARTH_RADIUS_M`]; at LEO scale the oblateness
//! error is orders of magnitude below the delays being modelled.

use serde::{Deserialize, Serialize};

use crate::{GeodeticPosition, EARTH_RADIUS_M};

/// Earth-centred Cartesian coordinates, metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EcefPosition {
    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,
}

pub fn geodetic_to_ecef(pos: &GeodeticPosition) -> EcefPosition {
    let radius_m = EARTH_RADIUS_M + pos.altitude_km * 1000.0;
    let lat = pos.latitude_deg.to_radians();
    let lon = pos.longitude_deg.to_radians();
    EcefPosition {
        x_m: radius_m * lat.cos() * lon.cos(),
        y_m: radius_m * lat.cos() * lon.sin(),
        z_m: radius_m * lat.sin(),
    }
}

/// Straight-line (chord) distance between two positions, metres.
pub fn distance_m(a: &GeodeticPosition, b: &GeodeticPosition) -> f64 {
    let pa = geodetic_to_ecef(a);
    let pb = geodetic_to_ecef(b);
    let dx = pa.x_m - pb.x_m;
    let dy = pa.y_m - pb.y_m;
    let dz = pa.z_m - pb.z_m;
    (dx * dx + dy * dy + dz * dz).sqrt()
}
