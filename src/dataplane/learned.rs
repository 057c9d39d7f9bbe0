//! Learned address table
//!
//! Bindings observed in ARP packet-ins: which MAC claimed which IPv4 address,
//! and where it was seen. Purely observational; forwarding and ARP answers
//! are driven by topology and policy.

use crate::protocol::MacAddr;
use crate::switch::{PortNo, SwitchId};
use crate::topology::Endpoint;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::trace;

/// Default age after which an unrefreshed binding is forgotten
pub const DEFAULT_MAX_AGE_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnedBinding {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub seen_at: Endpoint,
}

#[derive(Debug, Clone)]
struct Entry {
    binding: LearnedBinding,
    last_seen: Instant,
}

#[derive(Debug, Default)]
struct Tables {
    by_ip: HashMap<Ipv4Addr, Entry>,
    by_location: HashMap<(SwitchId, MacAddr), PortNo>,
}

/// Lock-guarded table of learned bindings, shared by reference between the
/// ARP path and whoever inspects it.
#[derive(Debug)]
pub struct LearnedAddresses {
    tables: RwLock<Tables>,
    max_age: Duration,
}

impl Default for LearnedAddresses {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_MAX_AGE_SECS))
    }
}

impl LearnedAddresses {
    pub fn new(max_age: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            max_age,
        }
    }

    /// Record that `mac` claimed `ip` on `switch`/`port`.
    pub fn learn(&self, switch: SwitchId, port: PortNo, mac: MacAddr, ip: Ipv4Addr) {
        // 0.0.0.0 is an ARP probe, it claims nothing
        if ip.is_unspecified() || mac.is_multicast() {
            return;
        }

        let binding = LearnedBinding {
            mac,
            ip,
            seen_at: Endpoint::new(switch, port),
        };
        trace!("Learned {} -> {} at {}/{}", ip, mac, switch, port);

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.by_location.insert((switch, mac), port);
        tables.by_ip.insert(
            ip,
            Entry {
                binding,
                last_seen: Instant::now(),
            },
        );
    }

    pub fn lookup_ip(&self, ip: Ipv4Addr) -> Option<LearnedBinding> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.by_ip.get(&ip).map(|e| e.binding)
    }

    /// Port `mac` was last seen on at `switch`.
    pub fn lookup_port(&self, switch: SwitchId, mac: MacAddr) -> Option<PortNo> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.by_location.get(&(switch, mac)).copied()
    }

    /// Drop everything learned on `switch`.
    pub fn forget_switch(&self, switch: SwitchId) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.by_ip.retain(|_, e| e.binding.seen_at.switch != switch);
        tables.by_location.retain(|(sw, _), _| *sw != switch);
    }

    /// Remove bindings not refreshed within the max age. Returns how many
    /// IP bindings were removed.
    pub fn expire(&self) -> usize {
        self.expire_at(Instant::now())
    }

    fn expire_at(&self, now: Instant) -> usize {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let max_age = self.max_age;
        let before = tables.by_ip.len();
        tables
            .by_ip
            .retain(|_, e| now.saturating_duration_since(e.last_seen) < max_age);

        let live: HashSet<(SwitchId, MacAddr)> = tables
            .by_ip
            .values()
            .map(|e| (e.binding.seen_at.switch, e.binding.mac))
            .collect();
        tables.by_location.retain(|key, _| live.contains(key));

        before - tables.by_ip.len()
    }

    pub fn bindings(&self) -> Vec<LearnedBinding> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut bindings: Vec<_> = tables.by_ip.values().map(|e| e.binding).collect();
        bindings.sort_by_key(|b| b.ip);
        bindings
    }

    pub fn len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_ip
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
