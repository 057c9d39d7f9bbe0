//! Configuration types

use crate::dataplane::{ControllerIdentity, ForwardingPolicy, Gateway, HopDb};
use crate::protocol::MacAddr;
use crate::speaker::SpeakerAdapter;
use crate::telemetry::LogConfig;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Default capacity of the controller event queue
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Controller configuration (config.toml)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub controller: ControllerConfig,
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub gateways: Vec<Gateway>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<SpeakerConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Address the controller answers ARP for
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Networks whose hosts are reached inside the managed fabric
    #[serde(default)]
    pub internal: Vec<Ipv4Net>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerConfig {
    pub as_number: u32,
    pub router_id: Ipv4Addr,
    #[serde(default)]
    pub neighbors: Vec<NeighborConfig>,
    #[serde(default)]
    pub prefixes: Vec<PrefixConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborConfig {
    pub address: Ipv4Addr,
    pub remote_as: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixConfig {
    pub prefix: Ipv4Net,
    pub next_hop: Ipv4Addr,
}

impl Config {
    /// Forwarding policy for the core, built from `[controller]`,
    /// `[network]` and `[[gateways]]`.
    pub fn policy(&self) -> ForwardingPolicy {
        let identity = ControllerIdentity {
            ip: self.controller.ip,
            mac: self.controller.mac,
        };
        let policy = self
            .network
            .internal
            .iter()
            .fold(ForwardingPolicy::new(identity), |p, net| {
                p.with_internal_network(*net)
            });
        self.gateways
            .iter()
            .cloned()
            .fold(policy, |p, gw| p.with_gateway(gw))
    }
}

impl SpeakerConfig {
    /// Adapter with the configured neighbors registered and prefixes
    /// advertised.
    pub fn build(&self, hop_db: Arc<HopDb>) -> SpeakerAdapter {
        let adapter = SpeakerAdapter::new(self.as_number, self.router_id, hop_db);
        for neighbor in &self.neighbors {
            adapter.add_neighbor(neighbor.address, neighbor.remote_as);
        }
        for prefix in &self.prefixes {
            adapter.advertise_prefix(prefix.prefix, prefix.next_hop);
        }
        adapter
    }
}
