//! Distance-delay links.
//!
//! A link is a directed point-to-point edge whose propagation delay is
//! derived from the straight-line distance between its endpoints. Moving
//! endpoints push position updates at the orbit tick rate, which can be far
//! faster than delay changes worth modelling, so recomputation is
//! rate-limited: new positions are always cached, but distance and delay
//! are only refreshed once `min_update_interval` has passed since the last
//! refresh. Message transit forces a refresh through the same limiter.

use std::collections::HashMap;
use std::fmt;

use orbit_mobility::{geometry, GeodeticPosition};
use serde::{Deserialize, Serialize};
use sim_engine::{SimDuration, SimTime};
use tracing::{trace, warn};

use crate::node::NodeId;
use crate::{NetError, Result};

pub const SPEED_OF_LIGHT_M_S: f64 = 299_792_458.0;

/// Handle into the link table. Slots are reused after removal, so a stale
/// id may point at a different link; holders must not cache ids across
/// handover cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(u32);

impl LinkId {
    pub(crate) fn new(raw: u32) -> Self {
        LinkId(raw)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link{}", self.0)
    }
}

/// One side of a link: a node plus the interface the link hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: NodeId,
    pub ifindex: u32,
}

impl Endpoint {
    pub fn new(node: NodeId, ifindex: u32) -> Self {
        Endpoint { node, ifindex }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/eth{}", self.node, self.ifindex)
    }
}

/// Transmission characteristics shared by a class of links.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelParams {
    pub datarate_bps: f64,
    pub propagation_speed_m_s: f64,
    pub min_update_interval: SimDuration,
}

impl Default for ChannelParams {
    fn default() -> Self {
        ChannelParams {
            datarate_bps: 10_000_000.0,
            propagation_speed_m_s: SPEED_OF_LIGHT_M_S,
            min_update_interval: SimDuration::from_secs(1),
        }
    }
}

/// A directed edge with geometry-tracking delay.
#[derive(Debug, Clone)]
pub struct DistanceDelayLink {
    id: LinkId,
    src: Endpoint,
    dst: Endpoint,
    params: ChannelParams,
    src_pos: GeodeticPosition,
    dst_pos: GeodeticPosition,
    distance_m: f64,
    delay: SimDuration,
    last_update: Option<SimTime>,
}

impl DistanceDelayLink {
    fn new(
        id: LinkId,
        src: Endpoint,
        dst: Endpoint,
        params: ChannelParams,
        src_pos: GeodeticPosition,
        dst_pos: GeodeticPosition,
        now: SimTime,
    ) -> Self {
        let mut link = DistanceDelayLink {
            id,
            src,
            dst,
            params,
            src_pos,
            dst_pos,
            distance_m: 0.0,
            delay: SimDuration::ZERO,
            last_update: None,
        };
        link.refresh(now);
        link
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn src(&self) -> Endpoint {
        self.src
    }

    pub fn dst(&self) -> Endpoint {
        self.dst
    }

    pub fn params(&self) -> &ChannelParams {
        &self.params
    }

    pub fn delay(&self) -> SimDuration {
        self.delay
    }

    pub fn delay_secs(&self) -> f64 {
        self.delay.as_secs_f64()
    }

    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    pub fn last_update(&self) -> Option<SimTime> {
        self.last_update
    }

    /// Cache the new position of `node`, then refresh delay if the rate
    /// limiter allows. Updates from nodes not attached to this link are
    /// logged and dropped.
    pub fn position_changed(&mut self, node: NodeId, pos: GeodeticPosition, now: SimTime) {
        if node == self.src.node {
            self.src_pos = pos;
        } else if node == self.dst.node {
            self.dst_pos = pos;
        } else {
            warn!(%node, link = %self.id, "position update from a node this link is not attached to");
            return;
        }
        self.update_delay(now);
    }

    /// Recompute distance and delay from the cached endpoint positions,
    /// unless the previous refresh was less than `min_update_interval`
    /// ago. Returns whether a refresh actually happened.
    pub fn update_delay(&mut self, now: SimTime) -> bool {
        if let Some(last) = self.last_update {
            if now - last < self.params.min_update_interval {
                return false;
            }
        }
        self.refresh(now);
        true
    }

    fn refresh(&mut self, now: SimTime) {
        self.distance_m = geometry::distance_m(&self.src_pos, &self.dst_pos);
        self.delay = SimDuration::from_secs_f64(self.distance_m / self.params.propagation_speed_m_s);
        self.last_update = Some(now);
        trace!(
            link = %self.id,
            distance_m = self.distance_m,
            delay = %self.delay,
            "link delay refreshed"
        );
    }

    /// Time for `payload_bits` to fully cross the link starting at `now`:
    /// propagation delay plus serialization at the link datarate. Runs the
    /// rate-limited refresh first, so delays stay current on links whose
    /// endpoints stopped publishing.
    pub fn transit_time(&mut self, payload_bits: u64, now: SimTime) -> SimDuration {
        self.update_delay(now);
        self.delay + SimDuration::from_secs_f64(payload_bits as f64 / self.params.datarate_bps)
    }
}

/// Registry of live links, indexed by id and by source endpoint.
///
/// An interface carries at most one outgoing link; `insert` enforces that.
/// Removed slots are recycled for later inserts.
#[derive(Debug, Default)]
pub struct LinkTable {
    slots: Vec<Option<DistanceDelayLink>>,
    free: Vec<u32>,
    by_src: HashMap<Endpoint, LinkId>,
}

impl LinkTable {
    pub fn new() -> Self {
        LinkTable::default()
    }

    pub(crate) fn insert(
        &mut self,
        src: Endpoint,
        dst: Endpoint,
        params: ChannelParams,
        src_pos: GeodeticPosition,
        dst_pos: GeodeticPosition,
        now: SimTime,
    ) -> Result<LinkId> {
        if self.by_src.contains_key(&src) {
            return Err(NetError::SlotOccupied { endpoint: src });
        }
        let id = match self.free.pop() {
            Some(raw) => LinkId(raw),
            None => {
                self.slots.push(None);
                LinkId((self.slots.len() - 1) as u32)
            }
        };
        self.slots[id.index()] =
            Some(DistanceDelayLink::new(id, src, dst, params, src_pos, dst_pos, now));
        self.by_src.insert(src, id);
        Ok(id)
    }

    pub(crate) fn remove(&mut self, id: LinkId) -> Option<DistanceDelayLink> {
        let link = self.slots.get_mut(id.index())?.take()?;
        self.by_src.remove(&link.src);
        self.free.push(id.0);
        Some(link)
    }

    pub fn get(&self, id: LinkId) -> Option<&DistanceDelayLink> {
        self.slots.get(id.index())?.as_ref()
    }

    pub fn get_mut(&mut self, id: LinkId) -> Option<&mut DistanceDelayLink> {
        self.slots.get_mut(id.index())?.as_mut()
    }

    /// Id of the link leaving `src`, if that interface is connected.
    pub fn from_endpoint(&self, src: Endpoint) -> Option<LinkId> {
        self.by_src.get(&src).copied()
    }

    pub fn from_endpoint_mut(&mut self, src: Endpoint) -> Option<&mut DistanceDelayLink> {
        let id = self.from_endpoint(src)?;
        self.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.by_src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_src.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DistanceDelayLink> {
        self.slots.iter().flatten()
    }
}
