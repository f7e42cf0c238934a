//! Constellation Network World
//!
//! The mutable state shared by every subsystem of the simulator:
//! - Node arena with stable ids, interfaces and per-node routing tables
//! - Directed point-to-point links whose delay tracks endpoint geometry
//! - A position bus fanning movement out to the links that care
//! - Message forwarding along installed routes
//!
//! Topology construction and route computation live in separate crates;
//! this one only guarantees that whatever they build stays consistent
//! (no dangling subscriptions, at most one link per outgoing interface).

pub mod bus;
pub mod link;
pub mod network;
pub mod node;
pub mod routing_table;

pub use bus::PositionBus;
pub use link::{ChannelParams, DistanceDelayLink, Endpoint, LinkId, LinkTable, SPEED_OF_LIGHT_M_S};
pub use network::{Forwarding, Message, Network, MAX_HOPS};
pub use node::{Interface, Mobility, Node, NodeId, NodeKind};
pub use routing_table::{network_of, RouteEntry, RoutingTable};

use std::net::Ipv4Addr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    #[error("{0} does not exist")]
    NodeNotFound(NodeId),

    #[error("{node} has no interface with index {ifindex}")]
    InterfaceNotFound { node: NodeId, ifindex: u32 },

    #[error("{node} already has an interface named {name}")]
    DuplicateInterface { node: NodeId, name: String },

    #[error("{endpoint} already has an outgoing link")]
    SlotOccupied { endpoint: Endpoint },

    #[error("{endpoint} is not connected")]
    NotConnected { endpoint: Endpoint },

    #[error("{0} is not in the link table")]
    LinkNotFound(LinkId),

    #[error("{node} has no route to {dest}")]
    NoRoute { node: NodeId, dest: Ipv4Addr },

    #[error("hop budget exhausted after {hops} hops heading to {dest}")]
    TtlExceeded { dest: Ipv4Addr, hops: u32 },
}

pub type Result<T> = std::result::Result<T, NetError>;
