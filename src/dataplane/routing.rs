//! Route table fed by routing-protocol notifications

use crate::{Error, Result};
use ipnet::Ipv4Net;
use std::cmp::Reverse;
use std::net::Ipv4Addr;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

/// Route entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Destination network, host bits cleared
    pub prefix: Ipv4Net,
    pub nexthop: Ipv4Addr,
    /// Insertion sequence, used to break ties between equal-length prefixes
    seq: u64,
}

/// Routing table using longest prefix match.
///
/// Entries are kept ordered by (prefix length desc, insertion desc) so the
/// first match is the answer; among equal-length matches the most recently
/// inserted entry wins.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<RouteEntry>,
    next_seq: u64,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `prefix`. Returns the previous
    /// nexthop, if any.
    pub fn add_route(&mut self, prefix: Ipv4Net, nexthop: Ipv4Addr) -> Option<Ipv4Addr> {
        let prefix = prefix.trunc();
        let previous = self.remove_route(prefix).map(|r| r.nexthop);

        self.next_seq += 1;
        self.routes.push(RouteEntry {
            prefix,
            nexthop,
            seq: self.next_seq,
        });
        self.routes
            .sort_by_key(|r| (Reverse(r.prefix.prefix_len()), Reverse(r.seq)));

        previous
    }

    /// Remove the entry for `prefix`; absent prefixes are a no-op.
    pub fn remove_route(&mut self, prefix: Ipv4Net) -> Option<RouteEntry> {
        let prefix = prefix.trunc();
        let index = self.routes.iter().position(|r| r.prefix == prefix)?;
        Some(self.routes.remove(index))
    }

    /// Longest prefix match.
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<&RouteEntry> {
        self.routes.iter().find(|r| r.prefix.contains(&addr))
    }

    pub fn get(&self, prefix: Ipv4Net) -> Option<&RouteEntry> {
        let prefix = prefix.trunc();
        self.routes.iter().find(|r| r.prefix == prefix)
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Shared route table ("hop database").
///
/// Each call holds the lock for exactly one add/remove/lookup, so lookups
/// from packet handlers interleave safely with notification handlers.
#[derive(Debug, Default)]
pub struct HopDb {
    table: RwLock<RouteTable>,
}

impl HopDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&self, prefix: Ipv4Net, nexthop: Ipv4Addr) {
        let previous = self
            .table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add_route(prefix, nexthop);
        match previous {
            Some(old) if old != nexthop => {
                info!("Route {} nexthop changed {} -> {}", prefix.trunc(), old, nexthop)
            }
            Some(_) => debug!("Route {} via {} refreshed", prefix.trunc(), nexthop),
            None => info!("Route {} via {} added", prefix.trunc(), nexthop),
        }
    }

    /// Returns whether an entry was removed.
    pub fn remove_route(&self, prefix: Ipv4Net) -> bool {
        let removed = self
            .table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove_route(prefix)
            .is_some();
        if removed {
            info!("Route {} withdrawn", prefix.trunc());
        } else {
            debug!("Withdraw for unknown route {}", prefix.trunc());
        }
        removed
    }

    /// Longest-prefix match returning `(prefix, nexthop)`.
    pub fn lookup(&self, addr: Ipv4Addr) -> Result<(Ipv4Net, Ipv4Addr)> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(addr)
            .map(|r| (r.prefix, r.nexthop))
            .ok_or(Error::RouteNotFound(addr))
    }

    /// Copy of all entries as `(prefix, nexthop)`, most specific first.
    pub fn routes(&self) -> Vec<(Ipv4Net, Ipv4Addr)> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .routes()
            .iter()
            .map(|r| (r.prefix, r.nexthop))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
