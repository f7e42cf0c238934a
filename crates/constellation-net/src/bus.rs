//! Position-change fanout.
//!
//! Links subscribe to the nodes whose movement affects their delay; when
//! the world recomputes a node's position it publishes to exactly that
//! node's subscribers. The world unsubscribes both endpoints before a link
//! leaves the table, so the bus never holds a dangling link id.

use std::collections::HashMap;

use crate::link::LinkId;
use crate::node::NodeId;

#[derive(Debug, Default)]
pub struct PositionBus {
    subs: HashMap<NodeId, Vec<LinkId>>,
}

impl PositionBus {
    pub fn new() -> Self {
        PositionBus::default()
    }

    /// Register `link` for updates from `source`. Idempotent.
    pub fn subscribe(&mut self, source: NodeId, link: LinkId) {
        let links = self.subs.entry(source).or_default();
        if !links.contains(&link) {
            links.push(link);
        }
    }

    /// Returns `false` if no such subscription existed.
    pub fn unsubscribe(&mut self, source: NodeId, link: LinkId) -> bool {
        let Some(links) = self.subs.get_mut(&source) else {
            return false;
        };
        let Some(at) = links.iter().position(|l| *l == link) else {
            return false;
        };
        links.remove(at);
        if links.is_empty() {
            self.subs.remove(&source);
        }
        true
    }

    pub fn subscribers(&self, source: NodeId) -> &[LinkId] {
        self.subs.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total live subscriptions across all sources.
    pub fn subscription_count(&self) -> usize {
        self.subs.values().map(Vec::len).sum()
    }
}
