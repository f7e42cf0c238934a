//! Run reports.
//!
//! A run ends with one JSON document: the scenario as executed, the final
//! topology shape, the handover and routing counters, and the spread of
//! link delays at the end of the run.

use chrono::Utc;
use constellation_net::Network;
use serde::Serialize;

use crate::config::Scenario;
use crate::world::{RunStats, World};

/// Propagation delay spread over the live link set, milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DelayStats {
    pub links: usize,
    pub min_ms: f64,
    pub mean_ms: f64,
    pub max_ms: f64,
}

impl DelayStats {
    fn over(net: &Network) -> DelayStats {
        let mut stats = DelayStats::default();
        let mut total_ms = 0.0;
        for link in net.links().iter() {
            let ms = link.delay_secs() * 1e3;
            if stats.links == 0 {
                stats.min_ms = ms;
                stats.max_ms = ms;
            } else {
                stats.min_ms = stats.min_ms.min(ms);
                stats.max_ms = stats.max_ms.max(ms);
            }
            total_ms += ms;
            stats.links += 1;
        }
        if stats.links > 0 {
            stats.mean_ms = total_ms / stats.links as f64;
        }
        stats
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario: Scenario,
    pub simulated_s: f64,
    pub events_dispatched: usize,
    pub satellites: usize,
    pub terminals: usize,
    pub attached_terminals: usize,
    pub links: usize,
    pub stats: RunStats,
    pub link_delay: DelayStats,
    pub generated_at: String,
}

impl RunReport {
    pub fn collect(scenario: &Scenario, world: &World, events_dispatched: usize) -> RunReport {
        RunReport {
            scenario: scenario.clone(),
            simulated_s: world.now().as_secs_f64(),
            events_dispatched,
            satellites: world.satellites().len(),
            terminals: world.terminals().len(),
            attached_terminals: world.attached_terminals(),
            links: world.net.link_count(),
            stats: world.stats,
            link_delay: DelayStats::over(&world.net),
            generated_at: Utc::now().to_rfc3339(),
        }
    }
}
