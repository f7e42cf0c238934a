//! Shortest-path routing over the live constellation graph.
//!
//! Every node computes its routes independently: snapshot the topology
//! restricted to peers of its own kind, run a single-source shortest-path
//! search rooted at the node, and install one next-hop route per reachable
//! destination. A computation is single-shot; the installed routes describe
//! the topology as it stood at extraction time and stay in place until the
//! next trigger, so a ground handover between triggers leaves them stale.

pub mod graph;
pub mod router;

pub use graph::TopologyGraph;
pub use router::compute_routes;

use constellation_net::{NetError, NodeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Edge weight fed to the shortest-path search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMetric {
    /// Propagation delay in seconds, as the links report it right now.
    #[default]
    Delay,
    /// Unit weight per link.
    Hops,
}

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("{node} has no {ifname} interface to advertise a destination address")]
    MissingEgress { node: NodeId, ifname: &'static str },

    #[error("{host} has no interface leading to next hop {next_hop}")]
    NoEgressInterface { host: NodeId, next_hop: NodeId },

    #[error(transparent)]
    Net(#[from] NetError),
}

pub type Result<T> = std::result::Result<T, RoutingError>;
