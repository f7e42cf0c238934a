//! Scenario configuration.
//!
//! One JSON document describes a run: constellation geometry, link
//! characteristics, ground terminals, timer intervals, routing metric and
//! the simulation horizon. Every section has defaults, so a scenario file
//! only states what it changes and `Scenario::default()` is a runnable
//! 4x4 demo constellation. Validation happens before any node is created;
//! a bad scenario never builds half a world.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context, Result};
use constellation_net::{ChannelParams, SPEED_OF_LIGHT_M_S};
use delay_routing::RouteMetric;
use orbit_mobility::EARTH_ROTATION_RAD_S;
use serde::{Deserialize, Serialize};
use sim_engine::SimDuration;
use tracing::info;
use walker_topology::WalkerLayout;

fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && lat.is_finite()
}

fn is_valid_longitude(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon) && lon.is_finite()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub constellation: ConstellationConfig,
    pub link: LinkConfig,
    pub ground_terminals: Vec<TerminalConfig>,
    pub intervals: IntervalConfig,
    pub routing: RoutingConfig,
    /// Simulated time horizon in seconds.
    pub duration_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstellationConfig {
    pub num_satellites: u32,
    pub num_planes: u32,
    pub phasing_f: u32,
    pub altitude_km: f64,
    pub inclination_deg: f64,
    pub init_right_ascension_deg: f64,
    pub init_phase_deg: f64,
    pub earth_rotation_rate_rad_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub datarate_bps: f64,
    pub propagation_speed_m_s: f64,
    pub min_update_interval_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    pub name: String,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    #[serde(default)]
    pub altitude_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    /// Orbital position recompute period per satellite, seconds.
    pub position_update_s: f64,
    /// Ground-terminal handover sweep period, seconds.
    pub handover_update_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub metric: RouteMetric,
}

impl Default for ConstellationConfig {
    fn default() -> Self {
        ConstellationConfig {
            num_satellites: 16,
            num_planes: 4,
            phasing_f: 1,
            altitude_km: 600.0,
            inclination_deg: 53.0,
            init_right_ascension_deg: 0.0,
            init_phase_deg: 0.0,
            earth_rotation_rate_rad_s: EARTH_ROTATION_RAD_S,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            datarate_bps: 1.0e7,
            propagation_speed_m_s: SPEED_OF_LIGHT_M_S,
            min_update_interval_s: 0.1,
        }
    }
}

impl Default for IntervalConfig {
    fn default() -> Self {
        IntervalConfig {
            position_update_s: 1.0,
            handover_update_s: 10.0,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        RoutingConfig {
            metric: RouteMetric::default(),
        }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario {
            constellation: ConstellationConfig::default(),
            link: LinkConfig::default(),
            ground_terminals: vec![
                TerminalConfig {
                    name: "gt-nyc".to_string(),
                    latitude_deg: 40.7,
                    longitude_deg: -74.0,
                    altitude_km: 0.0,
                },
                TerminalConfig {
                    name: "gt-lon".to_string(),
                    latitude_deg: 51.5,
                    longitude_deg: -0.1,
                    altitude_km: 0.0,
                },
            ],
            intervals: IntervalConfig::default(),
            routing: RoutingConfig::default(),
            duration_s: 600.0,
        }
    }
}

impl Scenario {
    /// Load a scenario from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading scenario from {:?}", path);

        let file = File::open(path).with_context(|| format!("opening {path:?}"))?;
        let reader = BufReader::new(file);
        let scenario: Scenario =
            serde_json::from_reader(reader).with_context(|| format!("parsing {path:?}"))?;
        Ok(scenario)
    }

    /// Reject any scenario the world builder could not realize. An
    /// indivisible satellite count is the classic fatal case: the layout
    /// needs equal planes.
    pub fn validate(&self) -> Result<()> {
        let c = &self.constellation;
        if c.num_planes == 0 || c.num_satellites % c.num_planes != 0 {
            bail!(
                "{} satellites cannot split into {} equal planes",
                c.num_satellites,
                c.num_planes
            );
        }
        if c.num_planes < 2 || c.num_satellites / c.num_planes < 2 {
            bail!(
                "constellation {}x{} is degenerate; need at least 2 planes and 2 satellites per plane",
                c.num_planes,
                c.num_satellites / c.num_planes.max(1)
            );
        }
        if c.phasing_f >= c.num_planes {
            bail!(
                "phasing factor {} must be smaller than the plane count {}",
                c.phasing_f,
                c.num_planes
            );
        }
        if !(c.altitude_km > 0.0) {
            bail!("satellite altitude must be positive, got {}", c.altitude_km);
        }
        if !c.inclination_deg.is_finite()
            || !c.init_right_ascension_deg.is_finite()
            || !c.init_phase_deg.is_finite()
            || !c.earth_rotation_rate_rad_s.is_finite()
        {
            bail!("constellation angles must be finite");
        }

        if !(self.link.datarate_bps > 0.0) {
            bail!("link datarate must be positive, got {}", self.link.datarate_bps);
        }
        if !(self.link.propagation_speed_m_s > 0.0) {
            bail!(
                "propagation speed must be positive, got {}",
                self.link.propagation_speed_m_s
            );
        }
        if !(self.link.min_update_interval_s >= 0.0) || !self.link.min_update_interval_s.is_finite()
        {
            bail!(
                "minimum delay update interval must be non-negative, got {}",
                self.link.min_update_interval_s
            );
        }

        for t in &self.ground_terminals {
            if !is_valid_latitude(t.latitude_deg) {
                bail!("terminal {}: latitude {} out of range", t.name, t.latitude_deg);
            }
            if !is_valid_longitude(t.longitude_deg) {
                bail!("terminal {}: longitude {} out of range", t.name, t.longitude_deg);
            }
            if !(t.altitude_km >= 0.0) || !t.altitude_km.is_finite() {
                bail!("terminal {}: altitude {} out of range", t.name, t.altitude_km);
            }
        }

        if !(self.intervals.position_update_s > 0.0) || !(self.intervals.handover_update_s > 0.0) {
            bail!("timer intervals must be positive");
        }
        if !(self.duration_s > 0.0) || !self.duration_s.is_finite() {
            bail!("simulation duration must be positive, got {}", self.duration_s);
        }
        Ok(())
    }

    pub fn walker_layout(&self) -> WalkerLayout {
        let c = &self.constellation;
        WalkerLayout {
            planes: c.num_planes,
            sats_per_plane: c.num_satellites / c.num_planes,
            phasing_factor: c.phasing_f,
            inclination_deg: c.inclination_deg,
            altitude_km: c.altitude_km,
            raan_offset_deg: c.init_right_ascension_deg,
            phase_offset_deg: c.init_phase_deg,
            earth_rotation_rad_s: c.earth_rotation_rate_rad_s,
        }
    }

    pub fn channel_params(&self) -> ChannelParams {
        ChannelParams {
            datarate_bps: self.link.datarate_bps,
            propagation_speed_m_s: self.link.propagation_speed_m_s,
            min_update_interval: SimDuration::from_secs_f64(self.link.min_update_interval_s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_scenario_validates() {
        let scenario = Scenario::default();
        scenario.validate().unwrap();
        assert_eq!(scenario.walker_layout().sats_per_plane, 4);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let scenario: Scenario = serde_json::from_str(r#"{"duration_s": 60.0}"#).unwrap();
        assert_eq!(scenario.duration_s, 60.0);
        assert_eq!(scenario.constellation.num_satellites, 16);
        assert_eq!(scenario.link.datarate_bps, 1.0e7);
        assert_eq!(scenario.routing.metric, RouteMetric::Delay);
    }

    #[test]
    fn load_reads_a_scenario_file() {
        let json = r#"{
            "constellation": {"num_satellites": 8, "num_planes": 2, "phasing_f": 1},
            "ground_terminals": [
                {"name": "gt-0", "latitude_deg": 10.0, "longitude_deg": 20.0}
            ],
            "routing": {"metric": "hops"},
            "duration_s": 120.0
        }"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let scenario = Scenario::load(file.path()).unwrap();
        scenario.validate().unwrap();
        assert_eq!(scenario.constellation.num_satellites, 8);
        assert_eq!(scenario.walker_layout().sats_per_plane, 4);
        assert_eq!(scenario.ground_terminals.len(), 1);
        assert_eq!(scenario.ground_terminals[0].altitude_km, 0.0);
        assert_eq!(scenario.routing.metric, RouteMetric::Hops);
        assert_eq!(scenario.duration_s, 120.0);
    }

    #[test]
    fn indivisible_satellite_count_is_rejected() {
        let mut scenario = Scenario::default();
        scenario.constellation.num_satellites = 15;
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn degenerate_grids_are_rejected() {
        let mut scenario = Scenario::default();
        scenario.constellation.num_satellites = 4;
        scenario.constellation.num_planes = 4;
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn phasing_factor_must_stay_below_plane_count() {
        let mut scenario = Scenario::default();
        scenario.constellation.phasing_f = 4;
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn out_of_range_terminal_coordinates_are_rejected() {
        let mut scenario = Scenario::default();
        scenario.ground_terminals[0].latitude_deg = 91.0;
        assert!(scenario.validate().is_err());

        let mut scenario = Scenario::default();
        scenario.ground_terminals[1].longitude_deg = f64::NAN;
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn channel_params_carry_the_link_section() {
        let scenario = Scenario::default();
        let params = scenario.channel_params();
        assert_eq!(params.datarate_bps, 1.0e7);
        assert_eq!(params.propagation_speed_m_s, SPEED_OF_LIGHT_M_S);
        assert_eq!(params.min_update_interval, SimDuration::from_millis(100));
    }
}
