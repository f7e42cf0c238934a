//! Circular-Orbit Mobility
//!
//! Analytic position propagation for satellites on circular orbits. Each
//! satellite carries a [`CircularOrbitModel`] that maps simulation time to a
//! geodetic position; there is no numerical integration and no TLE input,
//! so positions can be recomputed for any timestamp in O(1).

pub mod geometry;

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use sim_engine::{SimDuration, SimTime};
use thiserror::Error;
use tracing::trace;

/// Mean Earth radius, kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Mean Earth radius, metres. Used by the spherical distance model.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Geocentric gravitational constant, km^3/s^2.
pub const GM_KM3_S2: f64 = 3.986004418e5;

/// Earth rotation rate, rad/s (IERS nominal value).
pub const EARTH_ROTATION_RAD_S: f64 = 7.2921159e-5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrbitError {
    #[error("invalid orbital parameters: {0}")]
    InvalidParameters(String),
}

pub type Result<T> = std::result::Result<T, OrbitError>;

/// Orbital elements of one satellite on a circular orbit.
///
/// Angles are radians. `earth_rotation_rad_s` is usually
/// [`EARTH_ROTATION_RAD_S`] but can be zeroed for an Earth-fixed frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitalParameters {
    pub initial_phase_rad: f64,
    pub inclination_rad: f64,
    pub altitude_km: f64,
    pub raan_rad: f64,
    pub earth_rotation_rad_s: f64,
}

/// A position on (or above) the sphere, tagged with the simulation time it
/// was computed for. Longitude is in (-180, 180], latitude in [-90, 90].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticPosition {
    pub longitude_deg: f64,
    pub latitude_deg: f64,
    pub altitude_km: f64,
    pub timestamp: SimTime,
}

impl GeodeticPosition {
    /// A ground-fixed position, timestamped at the start of the run.
    pub fn fixed(longitude_deg: f64, latitude_deg: f64, altitude_km: f64) -> Self {
        GeodeticPosition {
            longitude_deg,
            latitude_deg,
            altitude_km,
            timestamp: SimTime::ZERO,
        }
    }
}

/// Closed-form propagator for one circular orbit.
#[derive(Debug, Clone)]
pub struct CircularOrbitModel {
    params: OrbitalParameters,
    angular_rate_rad_s: f64,
    current: GeodeticPosition,
}

impl CircularOrbitModel {
    /// Validates the elements and seeds the position for `t = 0`.
    pub fn new(params: OrbitalParameters) -> Result<Self> {
        if !params.altitude_km.is_finite() || params.altitude_km <= 0.0 {
            return Err(OrbitError::InvalidParameters(format!(
                "altitude must be positive, got {} km",
                params.altitude_km
            )));
        }
        for (name, value) in [
            ("initial phase", params.initial_phase_rad),
            ("inclination", params.inclination_rad),
            ("right ascension", params.raan_rad),
            ("earth rotation rate", params.earth_rotation_rad_s),
        ] {
            if !value.is_finite() {
                return Err(OrbitError::InvalidParameters(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }

        let period_s = orbital_period_secs(params.altitude_km);
        let mut model = CircularOrbitModel {
            params,
            angular_rate_rad_s: TAU / period_s,
            current: GeodeticPosition {
                longitude_deg: 0.0,
                latitude_deg: 0.0,
                altitude_km: params.altitude_km,
                timestamp: SimTime::ZERO,
            },
        };
        model.recompute(SimTime::ZERO);
        Ok(model)
    }

    /// Propagate to `t` and cache the result.
    ///
    /// The satellite sits at `phase = initial_phase + omega * t` along its
    /// orbital plane; longitude additionally drifts westward with Earth
    /// rotation. All angles are wrapped into [0, 2*pi) before conversion.
    pub fn recompute(&mut self, t: SimTime) -> GeodeticPosition {
        let elapsed_s = t.as_secs_f64();
        let phase = (self.params.initial_phase_rad + self.angular_rate_rad_s * elapsed_s)
            .rem_euclid(TAU);

        let lat_rad = (self.params.inclination_rad.sin() * phase.sin()).asin();
        let lon_rad = (self.params.raan_rad
            + (self.params.inclination_rad.cos() * phase.sin()).atan2(phase.cos())
            - self.params.earth_rotation_rad_s * elapsed_s)
            .rem_euclid(TAU);

        self.current = GeodeticPosition {
            longitude_deg: wrap_longitude_deg(lon_rad.to_degrees()),
            latitude_deg: lat_rad.to_degrees(),
            altitude_km: self.params.altitude_km,
            timestamp: t,
        };
        trace!(
            lon = self.current.longitude_deg,
            lat = self.current.latitude_deg,
            t = %t,
            "orbit propagated"
        );
        self.current
    }

    /// Most recently computed position, without propagating.
    pub fn current_position(&self) -> GeodeticPosition {
        self.current
    }

    pub fn orbital_period(&self) -> SimDuration {
        SimDuration::from_secs_f64(orbital_period_secs(self.params.altitude_km))
    }

    pub fn angular_rate_rad_s(&self) -> f64 {
        self.angular_rate_rad_s
    }

    pub fn params(&self) -> &OrbitalParameters {
        &self.params
    }
}

/// Kepler period for a circular orbit at the given altitude.
fn orbital_period_secs(altitude_km: f64) -> f64 {
    let semi_major_km = EARTH_RADIUS_KM + altitude_km;
    TAU * (semi_major_km.powi(3) / GM_KM3_S2).sqrt()
}

/// Map a longitude in [0, 360) down to (-180, 180].
fn wrap_longitude_deg(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn make_params(inclination_rad: f64, initial_phase_rad: f64) -> OrbitalParameters {
        OrbitalParameters {
            initial_phase_rad,
            inclination_rad,
            altitude_km: 600.0,
            raan_rad: 0.0,
            earth_rotation_rad_s: 0.0,
        }
    }

    #[test]
    fn rejects_non_positive_altitude() {
        let mut params = make_params(0.9, 0.0);
        params.altitude_km = -100.0;
        assert!(matches!(
            CircularOrbitModel::new(params),
            Err(OrbitError::InvalidParameters(_))
        ));
        params.altitude_km = 0.0;
        assert!(CircularOrbitModel::new(params).is_err());
    }

    #[test]
    fn rejects_non_finite_angles() {
        let mut params = make_params(f64::NAN, 0.0);
        assert!(CircularOrbitModel::new(params).is_err());
        params.inclination_rad = 0.9;
        params.raan_rad = f64::INFINITY;
        assert!(CircularOrbitModel::new(params).is_err());
    }

    #[test]
    fn period_at_600_km_is_about_96_minutes() {
        let model = CircularOrbitModel::new(make_params(0.9, 0.0)).unwrap();
        let period_s = model.orbital_period().as_secs_f64();
        assert!(
            (5700.0..5900.0).contains(&period_s),
            "unexpected period {period_s} s"
        );
    }

    #[test]
    fn equatorial_orbit_stays_on_equator() {
        let mut model = CircularOrbitModel::new(make_params(0.0, 0.0)).unwrap();
        for secs in [0u64, 500, 1000, 4000] {
            let pos = model.recompute(SimTime::from_secs(secs));
            assert!(pos.latitude_deg.abs() < 1e-9, "lat {} at {secs}s", pos.latitude_deg);
        }
    }

    #[test]
    fn latitude_never_exceeds_inclination() {
        let inclination = 53.0f64.to_radians();
        let mut model = CircularOrbitModel::new(make_params(inclination, 0.3)).unwrap();
        for secs in (0..6000).step_by(100) {
            let pos = model.recompute(SimTime::from_secs(secs));
            assert!(pos.latitude_deg.abs() <= 53.0 + 1e-9);
            assert!(pos.longitude_deg > -180.0 && pos.longitude_deg <= 180.0);
        }
    }

    proptest! {
        // One full period brings the satellite back to the same point in
        // the Earth-fixed frame (with Earth rotation off), for any elements.
        #[test]
        fn position_repeats_after_one_full_period(
            inclination_deg in 0.0f64..90.0,
            phase_deg in 0.0f64..360.0,
            altitude_km in 300.0f64..2000.0,
            start_secs in 0u64..10_000,
        ) {
            let mut model = CircularOrbitModel::new(OrbitalParameters {
                initial_phase_rad: phase_deg.to_radians(),
                inclination_rad: inclination_deg.to_radians(),
                altitude_km,
                raan_rad: 0.0,
                earth_rotation_rad_s: 0.0,
            })
            .unwrap();
            let period = model.orbital_period();

            let t = SimTime::from_secs(start_secs);
            let first = model.recompute(t);
            let second = model.recompute(t + period);
            let gap_m = geometry::distance_m(&first, &second);
            prop_assert!(gap_m < 1.0, "drifted {gap_m} m over one period");
        }
    }

    #[test]
    fn earth_rotation_drifts_longitude_westward() {
        let mut params = make_params(0.0, 0.0);
        params.earth_rotation_rad_s = EARTH_ROTATION_RAD_S;
        let mut rotating = CircularOrbitModel::new(params).unwrap();

        let mut inertial = CircularOrbitModel::new(make_params(0.0, 0.0)).unwrap();

        let t = SimTime::from_secs(600);
        let drifted = rotating.recompute(t).longitude_deg;
        let still = inertial.recompute(t).longitude_deg;
        let expected_shift = (EARTH_ROTATION_RAD_S * 600.0).to_degrees();
        assert!(((still - drifted) - expected_shift).abs() < 1e-6);
    }

    #[test]
    fn current_position_returns_last_recompute() {
        let mut model = CircularOrbitModel::new(make_params(0.9, 0.0)).unwrap();
        let t = SimTime::from_secs(42);
        let pos = model.recompute(t);
        assert_eq!(model.current_position(), pos);
        assert_eq!(model.current_position().timestamp, t);
    }
}
