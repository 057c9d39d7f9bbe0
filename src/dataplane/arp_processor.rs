//! ARP resolution gate
//!
//! Answers ARP for known hosts and for the controller's own address, floods
//! queries for unknown addresses inside the managed networks to edge ports,
//! and drops everything else.

use crate::dataplane::{ForwardingPolicy, LearnedAddresses};
use crate::protocol::arp::{ArpOp, ArpPacket};
use crate::protocol::MacAddr;
use crate::switch::{PacketData, PacketIn, PacketOut, PortNo, SwitchRegistry};
use crate::topology::{edge_ports, Endpoint, TopologySource};
use crate::Result;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// How a queried address resolves, in decision order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpResolution {
    /// A discovered host owns the address
    Host(MacAddr),
    /// The address is the controller's own
    Controller(MacAddr),
    /// Internal but not yet discovered
    Flood,
    Drop,
}

impl ArpResolution {
    pub fn mac(&self) -> Option<MacAddr> {
        match self {
            ArpResolution::Host(mac) | ArpResolution::Controller(mac) => Some(*mac),
            ArpResolution::Flood | ArpResolution::Drop => None,
        }
    }
}

/// What the gate did with an ARP packet-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArpAction {
    /// Reply sent back out the ingress port
    Replied { mac: MacAddr, out_port: PortNo },
    /// Original frame sent out these edge ports
    Flooded { ports: Vec<Endpoint> },
    /// Resolved, but the packet was not a request
    Ignored,
    Dropped,
}

pub struct ArpGate {
    policy: Arc<ForwardingPolicy>,
    topology: Arc<dyn TopologySource>,
    switches: Arc<SwitchRegistry>,
    learned: Arc<LearnedAddresses>,
}

impl ArpGate {
    pub fn new(
        policy: Arc<ForwardingPolicy>,
        topology: Arc<dyn TopologySource>,
        switches: Arc<SwitchRegistry>,
        learned: Arc<LearnedAddresses>,
    ) -> Self {
        Self {
            policy,
            topology,
            switches,
            learned,
        }
    }

    pub fn resolve(&self, target_ip: Ipv4Addr) -> ArpResolution {
        if let Some(host) = self.topology.host_by_ip(target_ip) {
            return ArpResolution::Host(host.mac);
        }
        if target_ip == self.policy.controller.ip {
            return ArpResolution::Controller(self.policy.controller.mac);
        }
        if self.policy.is_internal(target_ip) {
            return ArpResolution::Flood;
        }
        ArpResolution::Drop
    }

    /// Process one ARP packet-in.
    pub fn handle(&self, packet: &PacketIn, arp: &ArpPacket) -> Result<ArpAction> {
        self.learned
            .learn(packet.switch, packet.in_port, arp.sender_mac, arp.sender_ip);

        let resolution = self.resolve(arp.target_ip);
        trace!(
            "ARP {:?} {} -> {} on {}/{}: {:?}",
            arp.operation,
            arp.sender_ip,
            arp.target_ip,
            packet.switch,
            packet.in_port,
            resolution
        );

        let mac = match resolution {
            ArpResolution::Flood => {
                let ports = self.flood(packet);
                return Ok(ArpAction::Flooded { ports });
            }
            ArpResolution::Drop => {
                debug!("ARP for {} is outside managed networks, dropping", arp.target_ip);
                return Ok(ArpAction::Dropped);
            }
            ArpResolution::Host(mac) | ArpResolution::Controller(mac) => mac,
        };

        if arp.operation != ArpOp::Request {
            return Ok(ArpAction::Ignored);
        }

        let reply = arp.answer(mac);
        self.switches.get(packet.switch)?.emit(&PacketOut {
            in_port: None,
            out_port: packet.in_port,
            data: PacketData::Raw(reply.to_frame()),
        })?;
        debug!(
            "ARP reply {} is-at {} to {} via {}/{}",
            arp.target_ip, mac, arp.sender_ip, packet.switch, packet.in_port
        );

        Ok(ArpAction::Replied {
            mac,
            out_port: packet.in_port,
        })
    }

    /// Send the original frame out every edge port. A switch that cannot
    /// take the frame is skipped. Returns the ports it went out on.
    fn flood(&self, packet: &PacketIn) -> Vec<Endpoint> {
        let candidates = edge_ports(self.topology.as_ref());
        let total = candidates.len();
        let mut sent = Vec::with_capacity(total);
        for endpoint in candidates {
            let in_port = (endpoint.switch == packet.switch).then_some(packet.in_port);
            let result = self.switches.get(endpoint.switch).and_then(|conn| {
                conn.emit(&PacketOut {
                    in_port,
                    out_port: endpoint.port,
                    data: PacketData::Raw(packet.data.clone()),
                })
            });
            match result {
                Ok(()) => sent.push(endpoint),
                Err(e) => warn!(
                    "Skipping flood out {}/{}: {}",
                    endpoint.switch, endpoint.port, e
                ),
            }
        }
        debug!(
            "Flooded ARP from {}/{} to {}/{} edge ports",
            packet.switch,
            packet.in_port,
            sent.len(),
            total
        );
        sent
    }
}
