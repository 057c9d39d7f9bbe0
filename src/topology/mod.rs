//! Topology snapshot
//!
//! Discovery is an external collaborator; the core only reads point-in-time
//! snapshots through [`TopologySource`].

mod graph;

pub use graph::{EdgePorts, TopologyGraph};

use crate::protocol::MacAddr;
use crate::switch::{PortNo, SwitchId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// A port on a specific switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub switch: SwitchId,
    pub port: PortNo,
}

impl Endpoint {
    pub fn new(switch: SwitchId, port: PortNo) -> Self {
        Self { switch, port }
    }
}

/// A managed switch and its ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Switch {
    pub id: SwitchId,
    #[serde(default)]
    pub ports: Vec<PortNo>,
}

/// Directed inter-switch link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub src: Endpoint,
    pub dst: Endpoint,
}

/// Discovered end host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub mac: MacAddr,
    #[serde(default)]
    pub ipv4: Vec<Ipv4Addr>,
    pub attachment: Endpoint,
}

impl Host {
    pub fn owns(&self, ip: Ipv4Addr) -> bool {
        self.ipv4.contains(&ip)
    }
}

/// Read-only view of what topology discovery currently knows.
pub trait TopologySource: Send + Sync {
    fn all_switches(&self) -> Vec<Switch>;

    fn all_links(&self) -> Vec<Link>;

    fn all_hosts(&self) -> Vec<Host>;

    fn all_ports(&self, switch: SwitchId) -> Vec<PortNo> {
        self.all_switches()
            .into_iter()
            .find(|s| s.id == switch)
            .map(|s| s.ports)
            .unwrap_or_default()
    }

    /// First host owning `ip`, if any.
    fn host_by_ip(&self, ip: Ipv4Addr) -> Option<Host> {
        self.all_hosts().into_iter().find(|h| h.owns(ip))
    }
}

/// Ports that are not an endpoint of any inter-switch link, in switch/port
/// order.
pub fn edge_ports(source: &dyn TopologySource) -> Vec<Endpoint> {
    let link_points: HashSet<Endpoint> = source
        .all_links()
        .iter()
        .flat_map(|link| [link.src, link.dst])
        .collect();

    let mut switches = source.all_switches();
    switches.sort_by_key(|s| s.id);

    let mut ports = Vec::new();
    for switch in switches {
        for port in source.all_ports(switch.id) {
            let endpoint = Endpoint::new(switch.id, port);
            if link_points.contains(&endpoint) {
                continue;
            }
            ports.push(endpoint);
        }
    }
    ports
}

/// Point-in-time topology contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    #[serde(default)]
    pub switches: Vec<Switch>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub hosts: Vec<Host>,
}

/// Mutable in-process topology store.
///
/// Stands in for a discovery service: readers always get a copy, so a
/// decision never observes a half-applied change.
#[derive(Debug, Default)]
pub struct StaticTopology {
    snapshot: RwLock<TopologySnapshot>,
}

impl StaticTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: TopologySnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update<R>(&self, f: impl FnOnce(&mut TopologySnapshot) -> R) -> R {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Add a switch, replacing any previous record with the same id.
    pub fn add_switch(&self, id: SwitchId, ports: Vec<PortNo>) {
        debug!("Topology: switch {} with ports {:?}", id, ports);
        self.update(|s| {
            s.switches.retain(|sw| sw.id != id);
            s.switches.push(Switch { id, ports });
        });
    }

    /// Remove a switch along with its links and attached hosts.
    pub fn remove_switch(&self, id: SwitchId) {
        debug!("Topology: switch {} removed", id);
        self.update(|s| {
            s.switches.retain(|sw| sw.id != id);
            s.links
                .retain(|l| l.src.switch != id && l.dst.switch != id);
            s.hosts.retain(|h| h.attachment.switch != id);
        });
    }

    /// Add one direction of a link.
    pub fn add_link(&self, src: Endpoint, dst: Endpoint) {
        self.update(|s| {
            s.links.retain(|l| l.src != src);
            s.links.push(Link { src, dst });
        });
    }

    /// Add both directions of a link.
    pub fn add_bidirectional_link(&self, a: Endpoint, b: Endpoint) {
        self.add_link(a, b);
        self.add_link(b, a);
    }

    pub fn remove_link(&self, src: Endpoint, dst: Endpoint) {
        self.update(|s| s.links.retain(|l| !(l.src == src && l.dst == dst)));
    }

    /// Add or move a host (keyed by MAC).
    pub fn add_host(&self, host: Host) {
        debug!(
            "Topology: host {} {:?} at {}/{}",
            host.mac, host.ipv4, host.attachment.switch, host.attachment.port
        );
        self.update(|s| {
            s.hosts.retain(|h| h.mac != host.mac);
            s.hosts.push(host);
        });
    }

    pub fn remove_host(&self, mac: MacAddr) {
        self.update(|s| s.hosts.retain(|h| h.mac != mac));
    }
}

impl TopologySource for StaticTopology {
    fn all_switches(&self) -> Vec<Switch> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .switches
            .clone()
    }

    fn all_links(&self) -> Vec<Link> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .links
            .clone()
    }

    fn all_hosts(&self) -> Vec<Host> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .hosts
            .clone()
    }
}
