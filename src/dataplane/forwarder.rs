//! IPv4 forwarding decisions
//!
//! Resolves where a packet-in's destination lives, installs a path toward it
//! and re-sends the packet from the ingress switch. Any resolution failure
//! drops the packet: nothing is programmed and nothing is emitted.

use crate::dataplane::installer::{PathInstaller, PathIntent};
use crate::dataplane::path::shortest_path;
use crate::dataplane::{ForwardingPolicy, HopDb};
use crate::protocol::MacAddr;
use crate::switch::{FlowAction, FlowMatch, PacketIn, PacketOut, PortNo, SwitchId, SwitchRegistry};
use crate::topology::{Endpoint, TopologyGraph, TopologySource};
use crate::{Error, Result};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::debug;

/// Where a destination address lives relative to the managed network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Internal,
    External,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Internal => write!(f, "internal"),
            Destination::External => write!(f, "external"),
        }
    }
}

/// Resolved egress point for a destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub destination: Destination,
    pub endpoint: Endpoint,
    pub matcher: FlowMatch,
    /// Rewritten into eth_dst on every hop
    pub eth_dst: MacAddr,
}

/// Result of a successful forwarding decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forwarded {
    pub destination: Destination,
    pub path: Vec<SwitchId>,
    /// Port the packet was re-sent on at the ingress switch
    pub out_port: PortNo,
}

/// Drives route/host resolution, path computation and installation for IPv4
/// packet-ins.
pub struct ForwardingEngine {
    policy: Arc<ForwardingPolicy>,
    hop_db: Arc<HopDb>,
    topology: Arc<dyn TopologySource>,
    switches: Arc<SwitchRegistry>,
}

impl ForwardingEngine {
    pub fn new(
        policy: Arc<ForwardingPolicy>,
        hop_db: Arc<HopDb>,
        topology: Arc<dyn TopologySource>,
        switches: Arc<SwitchRegistry>,
    ) -> Self {
        Self {
            policy,
            hop_db,
            topology,
            switches,
        }
    }

    pub fn classify(&self, dst: Ipv4Addr) -> Destination {
        if self.policy.is_internal(dst) {
            Destination::Internal
        } else {
            Destination::External
        }
    }

    /// Find the egress endpoint and per-hop rewrite for `dst`.
    pub fn resolve(&self, dst: Ipv4Addr) -> Result<Target> {
        match self.classify(dst) {
            Destination::Internal => {
                let host = self
                    .topology
                    .host_by_ip(dst)
                    .ok_or(Error::HostNotFound(dst))?;
                Ok(Target {
                    destination: Destination::Internal,
                    endpoint: host.attachment,
                    matcher: FlowMatch::ipv4_host(dst),
                    eth_dst: host.mac,
                })
            }
            Destination::External => {
                let (prefix, nexthop) = self.hop_db.lookup(dst)?;
                let gateway = self
                    .policy
                    .gateway_for(nexthop)
                    .ok_or(Error::GatewayNotFound { prefix, nexthop })?;
                Ok(Target {
                    destination: Destination::External,
                    endpoint: gateway.endpoint(),
                    matcher: FlowMatch::ipv4_prefix(prefix),
                    eth_dst: gateway.peer_switch_mac,
                })
            }
        }
    }

    /// Forward `packet`, whose IPv4 destination is `dst`.
    pub fn forward(&self, packet: &PacketIn, dst: Ipv4Addr) -> Result<Forwarded> {
        let target = self.resolve(dst)?;
        debug!(
            "{} destination {} egresses at {}:{}",
            target.destination, dst, target.endpoint.switch, target.endpoint.port
        );

        let graph = TopologyGraph::build(self.topology.as_ref());
        let path = shortest_path(&graph, packet.switch, target.endpoint.switch)?;

        let intent = PathIntent {
            path,
            matcher: target.matcher,
            pre_actions: vec![FlowAction::SetEthDst(target.eth_dst)],
            final_port: target.endpoint.port,
        };
        let out_port = PathInstaller::new(&self.switches).install(&graph, &intent)?;

        self.switches.get(packet.switch)?.emit(&PacketOut {
            in_port: Some(packet.in_port),
            out_port,
            data: packet.replay(),
        })?;

        Ok(Forwarded {
            destination: target.destination,
            path: intent.path,
            out_port,
        })
    }
}
