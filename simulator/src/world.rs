//! World construction and the run loop.
//!
//! `World::build` realizes a validated scenario in deployment order:
//! satellites first, then the static ISL mesh, then terminals with their
//! initial attachment sweep. Everything after that happens through kernel
//! events: a position tick per satellite, the periodic handover sweep, and
//! one route-computation trigger per satellite at t=0. Route triggers are
//! one-shot, exactly like the startup timer they model; routes installed at
//! t=0 go stale across later handovers and the run report makes that
//! visible rather than papering over it.

use anyhow::{Context, Result};
use constellation_net::{ChannelParams, Endpoint, Network, NodeId};
use delay_routing::{compute_routes, RouteMetric};
use orbit_mobility::GeodeticPosition;
use serde::Serialize;
use sim_engine::{run_until, EventQueue, SimDuration, SimTime};
use tracing::{error, info, warn};
use walker_topology::{
    build_isl_mesh, place_satellites, place_terminal, update_ground_links, SweepStats,
    TERMINAL_IFINDEX,
};

use crate::config::Scenario;

/// Everything the kernel can wake the world up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// Propagate one satellite and publish the new position.
    PositionUpdate(NodeId),
    /// Re-evaluate every terminal's attachment.
    HandoverSweep,
    /// Compute and install routes on one node.
    ComputeRoutes(NodeId),
}

/// Counters accumulated over the whole run, initial sweep included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub sweeps: usize,
    pub attachments: usize,
    pub handovers: usize,
    pub deferred: usize,
    pub sweep_failures: usize,
    pub routes_installed: usize,
    pub route_failures: usize,
}

impl RunStats {
    fn absorb(&mut self, sweep: SweepStats) {
        self.sweeps += 1;
        self.attachments += sweep.attached;
        self.handovers += sweep.handovers;
        self.deferred += sweep.deferred;
        self.sweep_failures += sweep.failures;
    }
}

pub struct World {
    pub net: Network,
    pub stats: RunStats,
    queue: EventQueue<SimEvent>,
    satellites: Vec<NodeId>,
    terminals: Vec<NodeId>,
    channel: ChannelParams,
    position_interval: SimDuration,
    handover_interval: SimDuration,
    metric: RouteMetric,
}

impl World {
    /// Build the whole world at t=0 and queue the timers that keep it
    /// moving. The scenario must already be validated.
    pub fn build(scenario: &Scenario) -> Result<World> {
        let layout = scenario.walker_layout();
        let channel = scenario.channel_params();

        let mut net = Network::new();
        let satellites = place_satellites(&mut net, &layout).context("placing satellites")?;
        build_isl_mesh(&mut net, &layout, &satellites, channel, SimTime::ZERO)
            .context("wiring the ISL mesh")?;

        let mut terminals = Vec::with_capacity(scenario.ground_terminals.len());
        for t in &scenario.ground_terminals {
            let position =
                GeodeticPosition::fixed(t.longitude_deg, t.latitude_deg, t.altitude_km);
            let id = place_terminal(&mut net, &t.name, position)
                .with_context(|| format!("placing terminal {}", t.name))?;
            terminals.push(id);
        }

        // Initial attachment runs synchronously, before any event fires.
        let mut stats = RunStats::default();
        stats.absorb(update_ground_links(&mut net, channel, SimTime::ZERO));

        let position_interval = SimDuration::from_secs_f64(scenario.intervals.position_update_s);
        let handover_interval = SimDuration::from_secs_f64(scenario.intervals.handover_update_s);
        let mut queue = EventQueue::new();
        for &sat in &satellites {
            queue.schedule_after(position_interval, SimEvent::PositionUpdate(sat));
        }
        queue.schedule_after(handover_interval, SimEvent::HandoverSweep);
        for &sat in &satellites {
            queue
                .schedule_at(SimTime::ZERO, SimEvent::ComputeRoutes(sat))
                .context("scheduling the route trigger")?;
        }

        info!(
            satellites = satellites.len(),
            terminals = terminals.len(),
            links = net.link_count(),
            "world built"
        );
        Ok(World {
            net,
            stats,
            queue,
            satellites,
            terminals,
            channel,
            position_interval,
            handover_interval,
            metric: scenario.routing.metric,
        })
    }

    /// Drive the kernel to `horizon`. Periodic events reschedule themselves,
    /// so the queue is never empty afterwards and the world can be driven
    /// again from where it stopped. Returns the number of events dispatched.
    pub fn run(&mut self, horizon: SimTime) -> usize {
        let net = &mut self.net;
        let stats = &mut self.stats;
        let channel = self.channel;
        let metric = self.metric;
        let position_interval = self.position_interval;
        let handover_interval = self.handover_interval;

        run_until(&mut self.queue, horizon, |queue, now, event| match event {
            SimEvent::PositionUpdate(sat) => {
                if let Err(e) = net.recompute_position(sat, now) {
                    warn!(satellite = %sat, error = %e, "position tick for a missing node dropped");
                    return;
                }
                queue.schedule_after(position_interval, SimEvent::PositionUpdate(sat));
            }
            SimEvent::HandoverSweep => {
                stats.absorb(update_ground_links(net, channel, now));
                queue.schedule_after(handover_interval, SimEvent::HandoverSweep);
            }
            SimEvent::ComputeRoutes(node) => match compute_routes(net, node, metric) {
                Ok(installed) => stats.routes_installed += installed,
                Err(e) => {
                    error!(%node, error = %e, "route computation failed, node left without routes");
                    stats.route_failures += 1;
                }
            },
        })
    }

    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    pub fn satellites(&self) -> &[NodeId] {
        &self.satellites
    }

    pub fn terminals(&self) -> &[NodeId] {
        &self.terminals
    }

    /// Terminals with a live uplink right now.
    pub fn attached_terminals(&self) -> usize {
        self.terminals
            .iter()
            .filter(|&&t| self.net.link_from(Endpoint::new(t, TERMINAL_IFINDEX)).is_some())
            .count()
    }

    #[cfg(test)]
    fn events_pending(&self) -> usize {
        self.queue.len()
    }
}
