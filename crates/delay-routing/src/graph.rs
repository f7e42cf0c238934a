//! Topology snapshots.
//!
//! The router never walks the network structures directly; it works on a
//! graph rebuilt from scratch at every trigger, so a computation always
//! sees one consistent picture of the link set and nothing it installs can
//! be invalidated mid-run.

use std::collections::HashMap;

use constellation_net::{Network, NodeId, NodeKind};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::RouteMetric;

/// The live topology restricted to nodes of one kind.
///
/// Node indices follow arena order, so graph order is deterministic for a
/// given network. Edge weights are fixed at extraction time; a link whose
/// delay drifts afterwards does not move routes until the next snapshot.
pub struct TopologyGraph {
    pub(crate) graph: DiGraph<NodeId, f64>,
    pub(crate) index: HashMap<NodeId, NodeIndex>,
    kind: NodeKind,
}

impl TopologyGraph {
    /// Snapshot every node of `kind` and every live link with both
    /// endpoints of that kind, weighted per `metric`.
    pub fn extract(net: &Network, kind: NodeKind, metric: RouteMetric) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for node in net.nodes().filter(|n| n.kind == kind) {
            index.insert(node.id, graph.add_node(node.id));
        }
        for link in net.links().iter() {
            let (Some(&src), Some(&dst)) = (
                index.get(&link.src().node),
                index.get(&link.dst().node),
            ) else {
                continue;
            };
            let weight = match metric {
                RouteMetric::Delay => link.delay_secs(),
                RouteMetric::Hops => 1.0,
            };
            graph.add_edge(src, dst, weight);
        }
        TopologyGraph { graph, index, kind }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.index.contains_key(&node)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    use constellation_net::{ChannelParams, Endpoint, Mobility, SPEED_OF_LIGHT_M_S};
    use orbit_mobility::GeodeticPosition;
    use petgraph::visit::EdgeRef;
    use sim_engine::SimTime;

    fn mask24() -> Ipv4Addr {
        Ipv4Addr::new(255, 255, 255, 0)
    }

    fn sat(net: &mut Network, name: &str, lon: f64, octet: u8) -> NodeId {
        let id = net.add_node(
            name,
            NodeKind::Satellite,
            Mobility::Fixed(GeodeticPosition::fixed(lon, 0.0, 600.0)),
        );
        net.add_interface(id, "eth0", Ipv4Addr::new(172, 16, 0, octet), mask24())
            .unwrap();
        net.add_interface(id, "eth4", Ipv4Addr::new(10, 0, octet, 1), mask24())
            .unwrap();
        id
    }

    fn terminal(net: &mut Network, name: &str, lon: f64, octet: u8) -> NodeId {
        let id = net.add_node(
            name,
            NodeKind::GroundTerminal,
            Mobility::Fixed(GeodeticPosition::fixed(lon, 0.0, 0.0)),
        );
        net.add_interface(id, "eth0", Ipv4Addr::new(192, 168, octet, 1), mask24())
            .unwrap();
        id
    }

    fn wire(net: &mut Network, a: Endpoint, b: Endpoint) {
        net.connect(a, b, ChannelParams::default(), SimTime::ZERO)
            .unwrap();
        net.connect(b, a, ChannelParams::default(), SimTime::ZERO)
            .unwrap();
    }

    #[test]
    fn extraction_is_restricted_to_one_kind() {
        let mut net = Network::new();
        let a = sat(&mut net, "sat-a", 0.0, 0);
        let b = sat(&mut net, "sat-b", 40.0, 1);
        let gt = terminal(&mut net, "gt", 1.0, 0);

        wire(&mut net, Endpoint::new(a, 0), Endpoint::new(b, 0));
        // Ground attachment must not leak into the satellite graph.
        wire(&mut net, Endpoint::new(gt, 0), Endpoint::new(a, 1));

        let topo = TopologyGraph::extract(&net, NodeKind::Satellite, RouteMetric::Hops);
        assert_eq!(topo.node_count(), 2);
        assert_eq!(topo.edge_count(), 2);
        assert!(topo.contains(a) && topo.contains(b));
        assert!(!topo.contains(gt));

        // Terminals see each other but share no links at all.
        let topo = TopologyGraph::extract(&net, NodeKind::GroundTerminal, RouteMetric::Hops);
        assert_eq!(topo.node_count(), 1);
        assert_eq!(topo.edge_count(), 0);
    }

    #[test]
    fn weights_follow_the_chosen_metric() {
        let mut net = Network::new();
        let a = sat(&mut net, "sat-a", 0.0, 0);
        let b = sat(&mut net, "sat-b", 90.0, 1);
        wire(&mut net, Endpoint::new(a, 0), Endpoint::new(b, 0));

        let hops = TopologyGraph::extract(&net, NodeKind::Satellite, RouteMetric::Hops);
        assert!(hops.graph.edge_references().all(|e| *e.weight() == 1.0));

        let delay = TopologyGraph::extract(&net, NodeKind::Satellite, RouteMetric::Delay);
        let expected = net.links().iter().next().unwrap().distance_m() / SPEED_OF_LIGHT_M_S;
        for edge in delay.graph.edge_references() {
            assert!((*edge.weight() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn torn_down_links_leave_the_snapshot() {
        let mut net = Network::new();
        let a = sat(&mut net, "sat-a", 0.0, 0);
        let b = sat(&mut net, "sat-b", 40.0, 1);
        wire(&mut net, Endpoint::new(a, 0), Endpoint::new(b, 0));

        net.disconnect(Endpoint::new(a, 0)).unwrap();
        let topo = TopologyGraph::extract(&net, NodeKind::Satellite, RouteMetric::Hops);
        assert_eq!(topo.edge_count(), 1);
    }
}
