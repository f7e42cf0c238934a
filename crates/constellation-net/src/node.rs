//! Nodes and interfaces.

use std::fmt;
use std::net::Ipv4Addr;

use orbit_mobility::{CircularOrbitModel, GeodeticPosition};
use serde::{Deserialize, Serialize};

use crate::routing_table::RoutingTable;

/// Stable handle into the node arena. Ids are dense and never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(raw: u32) -> Self {
        NodeId(raw)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Satellite,
    GroundTerminal,
}

/// How a node's position evolves.
///
/// `Orbital` nodes move along a closed-form orbit and publish position
/// changes; `Fixed` nodes sit still forever, so nothing ever subscribes to
/// them and links touching them keep the position cached at connect time.
#[derive(Debug, Clone)]
pub enum Mobility {
    Orbital(CircularOrbitModel),
    Fixed(GeodeticPosition),
}

impl Mobility {
    pub fn current_position(&self) -> GeodeticPosition {
        match self {
            Mobility::Orbital(model) => model.current_position(),
            Mobility::Fixed(pos) => *pos,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Mobility::Fixed(_))
    }
}

/// A named, numbered attachment point with an IPv4 address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub index: u32,
    pub addr: Ipv4Addr,
    pub mask: Ipv4Addr,
}

#[derive(Debug)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub mobility: Mobility,
    interfaces: Vec<Interface>,
    pub routes: RoutingTable,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, kind: NodeKind, mobility: Mobility) -> Self {
        Node {
            id,
            name,
            kind,
            mobility,
            interfaces: Vec::new(),
            routes: RoutingTable::new(),
        }
    }

    pub(crate) fn push_interface(&mut self, name: String, addr: Ipv4Addr, mask: Ipv4Addr) -> u32 {
        let index = self.interfaces.len() as u32;
        self.interfaces.push(Interface {
            name,
            index,
            addr,
            mask,
        });
        index
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interface(&self, index: u32) -> Option<&Interface> {
        self.interfaces.get(index as usize)
    }

    pub fn interface_named(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|iface| iface.name == name)
    }

    /// True if any interface carries exactly this address.
    pub fn owns_addr(&self, addr: Ipv4Addr) -> bool {
        self.interfaces.iter().any(|iface| iface.addr == addr)
    }

    pub fn position(&self) -> GeodeticPosition {
        self.mobility.current_position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_node() -> Node {
        Node::new(
            NodeId::new(7),
            "sat7".to_string(),
            NodeKind::Satellite,
            Mobility::Fixed(GeodeticPosition::fixed(0.0, 0.0, 600.0)),
        )
    }

    #[test]
    fn interface_indices_follow_push_order() {
        let mut node = make_node();
        let a = node.push_interface("eth0".into(), "10.0.0.1".parse().unwrap(), "255.255.255.0".parse().unwrap());
        let b = node.push_interface("eth1".into(), "10.0.1.1".parse().unwrap(), "255.255.255.0".parse().unwrap());
        assert_eq!((a, b), (0, 1));
        assert_eq!(node.interface(1).unwrap().name, "eth1");
        assert_eq!(node.interface_named("eth0").unwrap().index, 0);
        assert!(node.interface(2).is_none());
    }

    #[test]
    fn owns_addr_matches_exact_interface_addresses() {
        let mut node = make_node();
        node.push_interface("eth0".into(), "10.0.0.1".parse().unwrap(), "255.255.255.0".parse().unwrap());
        assert!(node.owns_addr("10.0.0.1".parse().unwrap()));
        assert!(!node.owns_addr("10.0.0.2".parse().unwrap()));
    }
}
