//! The network world.
//!
//! Owns the node arena, the link table and the position bus, and keeps the
//! three consistent: connecting a link subscribes its moving endpoints,
//! disconnecting unsubscribes them before the link leaves the table, and
//! position recomputation publishes to exactly the affected links.

use std::net::Ipv4Addr;

use orbit_mobility::GeodeticPosition;
use sim_engine::SimTime;
use tracing::{debug, info, trace};

use crate::bus::PositionBus;
use crate::link::{ChannelParams, DistanceDelayLink, Endpoint, LinkId, LinkTable};
use crate::node::{Mobility, Node, NodeId, NodeKind};
use crate::{NetError, Result};

/// Forwarding gives up after this many hops; a routing loop in a
/// constellation mesh would otherwise bounce a message forever.
pub const MAX_HOPS: u32 = 64;

#[derive(Debug, Clone)]
pub struct Message {
    pub source: NodeId,
    pub dest_addr: Ipv4Addr,
    pub payload_bits: u64,
    pub hops: u32,
}

impl Message {
    pub fn new(source: NodeId, dest_addr: Ipv4Addr, payload_bits: u64) -> Self {
        Message {
            source,
            dest_addr,
            payload_bits,
            hops: 0,
        }
    }
}

/// Outcome of one forwarding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarding {
    /// The destination address belongs to this node.
    Delivered { node: NodeId },
    /// Sent out over a link; due at the far endpoint at `arrival`.
    Forwarded { next_hop: Endpoint, arrival: SimTime },
}

#[derive(Debug, Default)]
pub struct Network {
    nodes: Vec<Node>,
    links: LinkTable,
    bus: PositionBus,
}

impl Network {
    pub fn new() -> Self {
        Network::default()
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        kind: NodeKind,
        mobility: Mobility,
    ) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        let name = name.into();
        info!(%id, name, ?kind, "node added");
        self.nodes.push(Node::new(id, name, kind, mobility));
        id
    }

    pub fn add_interface(
        &mut self,
        node: NodeId,
        name: &str,
        addr: Ipv4Addr,
        mask: Ipv4Addr,
    ) -> Result<u32> {
        let node_ref = self.node_mut(node)?;
        if node_ref.interface_named(name).is_some() {
            return Err(NetError::DuplicateInterface {
                node,
                name: name.to_string(),
            });
        }
        Ok(node_ref.push_interface(name.to_string(), addr, mask))
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.index()).ok_or(NetError::NodeNotFound(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .ok_or(NetError::NodeNotFound(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // =========================================================================
    // Links
    // =========================================================================

    /// Connect a directed link. Moving endpoints are subscribed to the
    /// position bus; static ones keep the position captured here.
    pub fn connect(
        &mut self,
        src: Endpoint,
        dst: Endpoint,
        params: ChannelParams,
        now: SimTime,
    ) -> Result<LinkId> {
        let (src_pos, src_static) = self.endpoint_info(src)?;
        let (dst_pos, dst_static) = self.endpoint_info(dst)?;

        let id = self.links.insert(src, dst, params, src_pos, dst_pos, now)?;
        if !src_static {
            self.bus.subscribe(src.node, id);
        }
        if !dst_static {
            self.bus.subscribe(dst.node, id);
        }
        debug!(%id, %src, %dst, "link connected");
        Ok(id)
    }

    /// Tear down the link leaving `src`. Subscriptions are dropped before
    /// the link is removed, so no position update can reach a dead link.
    pub fn disconnect(&mut self, src: Endpoint) -> Result<()> {
        let id = self
            .links
            .from_endpoint(src)
            .ok_or(NetError::NotConnected { endpoint: src })?;
        let dst = self
            .links
            .get(id)
            .ok_or(NetError::LinkNotFound(id))?
            .dst();

        self.bus.unsubscribe(src.node, id);
        self.bus.unsubscribe(dst.node, id);
        self.links.remove(id);
        debug!(%id, %src, %dst, "link disconnected");
        Ok(())
    }

    pub fn links(&self) -> &LinkTable {
        &self.links
    }

    pub fn link(&self, id: LinkId) -> Result<&DistanceDelayLink> {
        self.links.get(id).ok_or(NetError::LinkNotFound(id))
    }

    pub fn link_from(&self, src: Endpoint) -> Option<LinkId> {
        self.links.from_endpoint(src)
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn bus(&self) -> &PositionBus {
        &self.bus
    }

    // =========================================================================
    // Mobility
    // =========================================================================

    /// Propagate `node` to `t` and publish the new position to subscribed
    /// links. Static nodes keep their position; publishing is a no-op for
    /// them since nothing subscribes to a static node.
    pub fn recompute_position(&mut self, node: NodeId, t: SimTime) -> Result<GeodeticPosition> {
        let pos = match &mut self.node_mut(node)?.mobility {
            Mobility::Orbital(model) => model.recompute(t),
            Mobility::Fixed(pos) => *pos,
        };
        self.publish_position(node, pos, t);
        Ok(pos)
    }

    pub fn position_of(&self, node: NodeId) -> Result<GeodeticPosition> {
        Ok(self.node(node)?.position())
    }

    fn publish_position(&mut self, node: NodeId, pos: GeodeticPosition, now: SimTime) {
        for &id in self.bus.subscribers(node) {
            if let Some(link) = self.links.get_mut(id) {
                link.position_changed(node, pos, now);
            }
        }
    }

    // =========================================================================
    // Forwarding
    // =========================================================================

    /// One forwarding step for `msg` sitting at `at`: deliver locally if an
    /// interface owns the destination address, otherwise look up the
    /// longest-prefix route and push the message onto the egress link.
    pub fn forward(&mut self, at: NodeId, msg: &mut Message, now: SimTime) -> Result<Forwarding> {
        let route = {
            let node = self.node(at)?;
            if node.owns_addr(msg.dest_addr) {
                trace!(node = %at, dest = %msg.dest_addr, hops = msg.hops, "message delivered");
                return Ok(Forwarding::Delivered { node: at });
            }
            node.routes.lookup(msg.dest_addr).copied()
        };

        if msg.hops >= MAX_HOPS {
            return Err(NetError::TtlExceeded {
                dest: msg.dest_addr,
                hops: msg.hops,
            });
        }
        let route = route.ok_or(NetError::NoRoute {
            node: at,
            dest: msg.dest_addr,
        })?;

        let egress = Endpoint::new(at, route.ifindex);
        let link = self
            .links
            .from_endpoint_mut(egress)
            .ok_or(NetError::NotConnected { endpoint: egress })?;

        let transit = link.transit_time(msg.payload_bits, now);
        let next_hop = link.dst();
        msg.hops += 1;
        trace!(from = %at, via = %egress, %next_hop, transit = %transit, "message forwarded");
        Ok(Forwarding::Forwarded {
            next_hop,
            arrival: now + transit,
        })
    }

    fn endpoint_info(&self, ep: Endpoint) -> Result<(GeodeticPosition, bool)> {
        let node = self.node(ep.node)?;
        node.interface(ep.ifindex)
            .ok_or(NetError::InterfaceNotFound {
                node: ep.node,
                ifindex: ep.ifindex,
            })?;
        Ok((node.position(), node.mobility.is_static()))
    }
}
