//! Route computation and installation.
//!
//! `compute_routes` is the single entry point, triggered once per node. It
//! roots a shortest-path tree at the host, walks the tree backward from
//! every reachable destination to find the first hop, and maps that first
//! hop to an egress interface through a neighbor table built by probing the
//! host's mesh-facing interfaces. Route installation replaces any entry
//! already covering the same destination network, so re-triggering after a
//! topology change converges instead of accumulating.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::net::Ipv4Addr;

use constellation_net::{Endpoint, Network, NodeId, NodeKind};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use tracing::{debug, info, warn};

use crate::graph::TopologyGraph;
use crate::{Result, RouteMetric, RoutingError};

/// Interface names probed when resolving a next hop to an egress
/// interface. Mesh wiring follows this naming; a ground terminal only ever
/// matches `eth0`, its uplink.
const EGRESS_CANDIDATES: [&str; 4] = ["eth0", "eth1", "eth2", "eth3"];

/// The interface whose address and mask a destination advertises to
/// remote routers: the ground-facing subnet for satellites, the uplink
/// for terminals.
fn advertised_ifname(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Satellite => "eth4",
        NodeKind::GroundTerminal => "eth0",
    }
}

/// Compute and install next-hop routes on `host` toward every reachable
/// peer of its own kind. Returns the number of routes installed.
///
/// A host missing from the arena or from the extracted topology installs
/// nothing and is not an error; the node simply stays routeless until a
/// later trigger finds it. A reachable destination without an advertised
/// address, or a computed next hop with no matching egress interface, is
/// an error: the topology said the route exists and it cannot be wired.
pub fn compute_routes(net: &mut Network, host: NodeId, metric: RouteMetric) -> Result<usize> {
    let kind = match net.node(host) {
        Ok(node) => node.kind,
        Err(_) => {
            warn!(%host, "route computation for an unknown node, nothing installed");
            return Ok(0);
        }
    };

    let topo = TopologyGraph::extract(net, kind, metric);
    let Some(&source) = topo.index.get(&host) else {
        warn!(%host, "host absent from the extracted topology, nothing installed");
        return Ok(0);
    };

    let pred = shortest_path_tree(&topo, source);
    let neighbors = neighbor_interfaces(net, host);

    let mut pending: Vec<(Ipv4Addr, Ipv4Addr, u32)> = Vec::new();
    for dest_idx in topo.graph.node_indices() {
        if dest_idx == source {
            continue;
        }
        let dest = topo.graph[dest_idx];
        let Some(hop_idx) = first_hop(&pred, source, dest_idx) else {
            debug!(%host, %dest, "destination unreachable, no route");
            continue;
        };
        let next_hop = topo.graph[hop_idx];

        let ifname = advertised_ifname(kind);
        let dest_iface = net
            .node(dest)?
            .interface_named(ifname)
            .ok_or(RoutingError::MissingEgress { node: dest, ifname })?;
        let egress = neighbors
            .get(&next_hop)
            .copied()
            .ok_or(RoutingError::NoEgressInterface { host, next_hop })?;

        debug!(%host, %dest, %next_hop, egress, "route computed");
        pending.push((dest_iface.addr, dest_iface.mask, egress));
    }

    let installed = pending.len();
    let routes = &mut net.node_mut(host)?.routes;
    for (addr, mask, ifindex) in pending {
        routes.insert(addr, mask, ifindex);
    }
    info!(%host, routes = installed, ?metric, "routes installed");
    Ok(installed)
}

/// Heap entry ordered by cost, node index breaking ties, so the settle
/// order is fully deterministic and equal-cost paths always resolve to the
/// lowest-index first hop.
#[derive(Debug, Clone, Copy, PartialEq)]
struct QueueEntry {
    cost: f64,
    node: NodeIndex,
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then_with(|| self.node.index().cmp(&other.node.index()))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dijkstra rooted at `source`, returning the predecessor of every node in
/// the shortest-path tree (`None` for the source and for unreachable
/// nodes). Relaxation is strict, so the predecessor set by the first
/// settled equal-cost path is never overwritten.
fn shortest_path_tree(topo: &TopologyGraph, source: NodeIndex) -> Vec<Option<NodeIndex>> {
    let n = topo.graph.node_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut pred: Vec<Option<NodeIndex>> = vec![None; n];
    let mut settled = vec![false; n];
    let mut heap = BinaryHeap::new();

    dist[source.index()] = 0.0;
    heap.push(Reverse(QueueEntry {
        cost: 0.0,
        node: source,
    }));

    while let Some(Reverse(QueueEntry { cost, node })) = heap.pop() {
        if settled[node.index()] {
            continue;
        }
        settled[node.index()] = true;
        for edge in topo.graph.edges(node) {
            let next = edge.target();
            let candidate = cost + *edge.weight();
            if candidate < dist[next.index()] {
                dist[next.index()] = candidate;
                pred[next.index()] = Some(node);
                heap.push(Reverse(QueueEntry {
                    cost: candidate,
                    node: next,
                }));
            }
        }
    }
    pred
}

/// Walk the predecessor chain from `dest` back to `source`; the node one
/// step out of the source is the first hop.
fn first_hop(
    pred: &[Option<NodeIndex>],
    source: NodeIndex,
    dest: NodeIndex,
) -> Option<NodeIndex> {
    let mut cur = dest;
    loop {
        let prev = pred[cur.index()]?;
        if prev == source {
            return Some(cur);
        }
        cur = prev;
    }
}

/// Map each directly connected peer to the interface reaching it, probing
/// the fixed mesh interface names and following the live link off each.
/// The first interface reaching a peer wins, so parallel connections
/// resolve to the lowest interface index.
fn neighbor_interfaces(net: &Network, host: NodeId) -> HashMap<NodeId, u32> {
    let mut map = HashMap::new();
    let Ok(node) = net.node(host) else {
        return map;
    };
    for name in EGRESS_CANDIDATES {
        let Some(iface) = node.interface_named(name) else {
            continue;
        };
        let Some(id) = net.link_from(Endpoint::new(host, iface.index)) else {
            continue;
        };
        if let Ok(link) = net.link(id) {
            map.entry(link.dst().node).or_insert(iface.index);
        }
    }
    map
}
