//! Static forwarding policy: internal networks, gateways and the controller's
//! own ARP identity

use crate::protocol::MacAddr;
use crate::switch::{PortNo, SwitchId};
use crate::topology::Endpoint;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Egress point toward a peer network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gateway {
    pub switch: SwitchId,
    pub port: PortNo,
    /// Address of the peer controller, matched against route nexthops
    pub peer_controller: Ipv4Addr,
    /// MAC of the neighboring switch, written as eth_dst on egress
    pub peer_switch_mac: MacAddr,
}

impl Gateway {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.switch, self.port)
    }
}

/// Address the controller answers ARP for directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerIdentity {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingPolicy {
    pub internal_networks: Vec<Ipv4Net>,
    pub gateways: Vec<Gateway>,
    pub controller: ControllerIdentity,
}

impl ForwardingPolicy {
    pub fn new(controller: ControllerIdentity) -> Self {
        Self {
            internal_networks: Vec::new(),
            gateways: Vec::new(),
            controller,
        }
    }

    pub fn with_internal_network(mut self, net: Ipv4Net) -> Self {
        self.internal_networks.push(net.trunc());
        self
    }

    pub fn with_gateway(mut self, gateway: Gateway) -> Self {
        self.gateways.push(gateway);
        self
    }

    pub fn is_internal(&self, ip: Ipv4Addr) -> bool {
        self.internal_networks.iter().any(|net| net.contains(&ip))
    }

    /// Gateway whose peer controller address equals `nexthop`.
    pub fn gateway_for(&self, nexthop: Ipv4Addr) -> Option<&Gateway> {
        self.gateways.iter().find(|g| g.peer_controller == nexthop)
    }
}
