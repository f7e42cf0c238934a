//! Ground-terminal attachment and the periodic handover sweep.
//!
//! Every sweep re-evaluates each terminal against all satellites with a free
//! ground slot and keeps the closest one attached via a bidirectional link
//! pair. Only a strictly closer candidate displaces the incumbent, so an
//! equidistant challenger never causes churn and ties resolve to the lowest
//! satellite index in scan order.

use std::net::Ipv4Addr;

use constellation_net::{ChannelParams, Endpoint, Mobility, Network, NodeId, NodeKind};
use orbit_mobility::{geometry, GeodeticPosition};
use serde::{Deserialize, Serialize};
use sim_engine::SimTime;
use tracing::{debug, error, info, warn};

use crate::{Result, TopologyError, GROUND_IFINDEX, TERMINAL_IFINDEX};

/// Counters of one handover sweep, reported per cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    /// Terminals examined.
    pub terminals: usize,
    /// Fresh attachments (terminal was unattached).
    pub attached: usize,
    /// Attachments moved to a closer satellite.
    pub handovers: usize,
    /// Terminals already on their best satellite.
    pub kept: usize,
    /// Terminals left unattached because no ground slot was free.
    pub deferred: usize,
    /// Terminals skipped after a lookup or link-churn error.
    pub failures: usize,
}

impl SweepStats {
    /// Link pairs created or moved this sweep.
    pub fn churn(&self) -> usize {
        self.attached + self.handovers
    }
}

/// Create a ground terminal at a fixed geodetic position with a single
/// uplink interface `eth0` carrying its own /24.
pub fn place_terminal(
    net: &mut Network,
    name: &str,
    position: GeodeticPosition,
) -> Result<NodeId> {
    let ordinal = net
        .nodes()
        .filter(|n| n.kind == NodeKind::GroundTerminal)
        .count();
    if ordinal > u8::MAX as usize {
        return Err(TopologyError::LayoutDegenerate(format!(
            "terminal #{ordinal} exceeds the 192.168.0.0/16 addressing plan"
        )));
    }

    let id = net.add_node(name, NodeKind::GroundTerminal, Mobility::Fixed(position));
    net.add_interface(
        id,
        "eth0",
        Ipv4Addr::new(192, 168, ordinal as u8, 1),
        Ipv4Addr::new(255, 255, 255, 0),
    )?;
    debug!(terminal = %id, name, lon = position.longitude_deg, lat = position.latitude_deg, "terminal placed");
    Ok(id)
}

/// One distance-based handover sweep over every ground terminal.
///
/// Per terminal: seed the best candidate with the current attachment (if
/// any), linear-scan satellites whose ground slot is free, and let a
/// strictly smaller distance win. A changed winner tears down the old link
/// pair and wires the new one; no free candidate defers the terminal to the
/// next cycle. Failures are logged and isolated per terminal, never
/// escalated out of the sweep.
pub fn update_ground_links(net: &mut Network, channel: ChannelParams, now: SimTime) -> SweepStats {
    let terminals: Vec<NodeId> = ids_of_kind(net, NodeKind::GroundTerminal);
    let satellites: Vec<NodeId> = ids_of_kind(net, NodeKind::Satellite);

    let mut stats = SweepStats {
        terminals: terminals.len(),
        ..SweepStats::default()
    };
    info!(
        terminals = terminals.len(),
        satellites = satellites.len(),
        t = %now,
        "updating ground to satellite links"
    );

    for terminal in terminals {
        let uplink = Endpoint::new(terminal, TERMINAL_IFINDEX);
        let terminal_pos = match net.position_of(terminal) {
            Ok(pos) => pos,
            Err(e) => {
                warn!(%terminal, error = %e, "terminal not found, skipped this cycle");
                stats.failures += 1;
                continue;
            }
        };

        // Incumbent attachment, if the uplink is wired.
        let current = net
            .link_from(uplink)
            .and_then(|id| net.link(id).ok())
            .map(|link| link.dst().node);

        let mut best: Option<(NodeId, f64)> = None;
        if let Some(sat) = current {
            match net.position_of(sat) {
                Ok(pos) => best = Some((sat, geometry::distance_m(&terminal_pos, &pos))),
                Err(e) => {
                    warn!(%terminal, satellite = %sat, error = %e, "attached satellite not found, skipped this cycle");
                    stats.failures += 1;
                    continue;
                }
            }
        }

        // The incumbent's slot is occupied by this very terminal, so the
        // scan only sees true alternatives; strict < keeps ties on the
        // lowest index.
        for &sat in &satellites {
            if net.link_from(Endpoint::new(sat, GROUND_IFINDEX)).is_some() {
                continue;
            }
            let pos = match net.position_of(sat) {
                Ok(pos) => pos,
                Err(e) => {
                    warn!(satellite = %sat, error = %e, "satellite not found, skipped as candidate");
                    continue;
                }
            };
            let distance = geometry::distance_m(&terminal_pos, &pos);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((sat, distance));
            }
        }

        let Some((winner, distance_m)) = best else {
            debug!(%terminal, "no satellite with a free ground slot, attachment deferred");
            stats.deferred += 1;
            continue;
        };

        match current {
            Some(sat) if sat == winner => {
                debug!(%terminal, satellite = %sat, "already attached to the closest satellite");
                stats.kept += 1;
            }
            Some(old) => {
                info!(
                    %terminal,
                    from = %old,
                    to = %winner,
                    distance_km = distance_m / 1000.0,
                    "handover"
                );
                match reattach(net, terminal, Some(old), winner, channel, now) {
                    Ok(()) => stats.handovers += 1,
                    Err(e) => {
                        error!(%terminal, satellite = %winner, error = %e, "handover failed");
                        stats.failures += 1;
                    }
                }
            }
            None => {
                info!(
                    %terminal,
                    satellite = %winner,
                    distance_km = distance_m / 1000.0,
                    "attaching terminal"
                );
                match reattach(net, terminal, None, winner, channel, now) {
                    Ok(()) => stats.attached += 1,
                    Err(e) => {
                        error!(%terminal, satellite = %winner, error = %e, "attachment failed");
                        stats.failures += 1;
                    }
                }
            }
        }
    }

    info!(
        attached = stats.attached,
        handovers = stats.handovers,
        kept = stats.kept,
        deferred = stats.deferred,
        failures = stats.failures,
        "finished updating ground to satellite links"
    );
    stats
}

fn ids_of_kind(net: &Network, kind: NodeKind) -> Vec<NodeId> {
    net.nodes()
        .filter(|n| n.kind == kind)
        .map(|n| n.id)
        .collect()
}

/// Move the terminal's bidirectional link pair onto `to`. The old pair is
/// fully torn down before the new one is wired (unsubscribe happens inside
/// `disconnect`), and a half-wired pair is rolled back so an interface is
/// never left carrying one direction only.
fn reattach(
    net: &mut Network,
    terminal: NodeId,
    from: Option<NodeId>,
    to: NodeId,
    channel: ChannelParams,
    now: SimTime,
) -> constellation_net::Result<()> {
    let uplink = Endpoint::new(terminal, TERMINAL_IFINDEX);
    let downlink = Endpoint::new(to, GROUND_IFINDEX);

    if let Some(old) = from {
        net.disconnect(uplink)?;
        net.disconnect(Endpoint::new(old, GROUND_IFINDEX))?;
    }

    net.connect(uplink, downlink, channel, now)?;
    if let Err(e) = net.connect(downlink, uplink, channel, now) {
        let _ = net.disconnect(uplink);
        return Err(e);
    }
    Ok(())
}
