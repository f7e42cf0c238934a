//! Per-node IPv4 routing tables.
//!
//! Entries map a destination network to an egress interface index. Lookup
//! is longest-prefix match; insertion replaces any entry already covering
//! the same (network, mask), so periodic route recomputation leaves one
//! entry per destination instead of accumulating duplicates.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub network: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub ifindex: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    entries: Vec<RouteEntry>,
}

impl RoutingTable {
    pub fn new() -> Self {
        RoutingTable::default()
    }

    /// Install a route. `network` is masked down before storage, so passing
    /// a host address inside the destination network is fine. An existing
    /// entry for the same (network, mask) is overwritten in place.
    pub fn insert(&mut self, network: Ipv4Addr, mask: Ipv4Addr, ifindex: u32) {
        let network = network_of(network, mask);
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.network == network && e.mask == mask)
        {
            entry.ifindex = ifindex;
            return;
        }
        self.entries.push(RouteEntry {
            network,
            mask,
            ifindex,
        });
    }

    /// Longest-prefix match for `dest`.
    pub fn lookup(&self, dest: Ipv4Addr) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .filter(|e| network_of(dest, e.mask) == e.network)
            .max_by_key(|e| mask_bits(e.mask))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }
}

/// Network address of `addr` under `mask`.
pub fn network_of(addr: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(addr) & u32::from(mask))
}

fn mask_bits(mask: Ipv4Addr) -> u32 {
    u32::from(mask).count_ones()
}
