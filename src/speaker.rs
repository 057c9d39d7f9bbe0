//! Routing-protocol speaker adapter
//!
//! The peering engine itself lives outside this crate. It reports best-path
//! and peer changes through [`RouteListener`]; [`SpeakerAdapter`] turns them
//! into route table updates and keeps the neighbor registry.

use crate::dataplane::HopDb;
use crate::{Error, Result};
use ipnet::Ipv4Net;
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Best path for a prefix changed or was withdrawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestPathEvent {
    pub prefix: Ipv4Net,
    pub nexthop: Ipv4Addr,
    pub remote_as: u32,
    pub is_withdraw: bool,
}

/// Notifications a routing-protocol engine delivers to the controller
pub trait RouteListener: Send + Sync {
    fn on_best_path_change(&self, event: &BestPathEvent);

    fn on_peer_up(&self, address: Ipv4Addr, remote_as: u32);

    fn on_peer_down(&self, address: Ipv4Addr, remote_as: u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NeighborState {
    Up,
    #[default]
    Down,
}

impl fmt::Display for NeighborState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeighborState::Up => write!(f, "up"),
            NeighborState::Down => write!(f, "down"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub address: Ipv4Addr,
    pub remote_as: u32,
    pub state: NeighborState,
}

/// Prefix originated by this controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisedPrefix {
    pub prefix: Ipv4Net,
    pub next_hop: Ipv4Addr,
}

pub struct SpeakerAdapter {
    local_as: u32,
    router_id: Ipv4Addr,
    hop_db: Arc<HopDb>,
    neighbors: RwLock<BTreeMap<Ipv4Addr, Neighbor>>,
    advertised: RwLock<Vec<AdvertisedPrefix>>,
}

impl SpeakerAdapter {
    pub fn new(local_as: u32, router_id: Ipv4Addr, hop_db: Arc<HopDb>) -> Self {
        info!("Speaker AS{} router-id {}", local_as, router_id);
        Self {
            local_as,
            router_id,
            hop_db,
            neighbors: RwLock::new(BTreeMap::new()),
            advertised: RwLock::new(Vec::new()),
        }
    }

    pub fn local_as(&self) -> u32 {
        self.local_as
    }

    pub fn router_id(&self) -> Ipv4Addr {
        self.router_id
    }

    /// Register a neighbor. It starts down until the engine reports it up.
    /// Re-adding an address replaces its remote AS and resets its state.
    pub fn add_neighbor(&self, address: Ipv4Addr, remote_as: u32) -> Neighbor {
        let neighbor = Neighbor {
            address,
            remote_as,
            state: NeighborState::Down,
        };
        self.neighbors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address, neighbor);
        info!("Neighbor {} AS{} added", address, remote_as);
        neighbor
    }

    pub fn neighbor(&self, address: Ipv4Addr) -> Result<Neighbor> {
        self.neighbors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&address)
            .copied()
            .ok_or(Error::NeighborNotFound(address))
    }

    /// All neighbors ordered by address
    pub fn neighbors(&self) -> Vec<Neighbor> {
        self.neighbors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .copied()
            .collect()
    }

    pub fn advertise_prefix(&self, prefix: Ipv4Net, next_hop: Ipv4Addr) -> AdvertisedPrefix {
        let entry = AdvertisedPrefix {
            prefix: prefix.trunc(),
            next_hop,
        };
        let mut advertised = self.advertised.write().unwrap_or_else(PoisonError::into_inner);
        advertised.retain(|p| p.prefix != entry.prefix);
        advertised.push(entry);
        info!("Advertising {} via {}", entry.prefix, next_hop);
        entry
    }

    pub fn advertised(&self) -> Vec<AdvertisedPrefix> {
        self.advertised
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_state(&self, address: Ipv4Addr, remote_as: u32, state: NeighborState) {
        let mut neighbors = self.neighbors.write().unwrap_or_else(PoisonError::into_inner);
        match neighbors.get_mut(&address) {
            Some(neighbor) => {
                neighbor.state = state;
                info!("Peer {} AS{} is {}", address, remote_as, state);
            }
            None => debug!(
                "No such neighbor: remote_ip={}, remote_as={}",
                address, remote_as
            ),
        }
    }
}

impl RouteListener for SpeakerAdapter {
    fn on_best_path_change(&self, event: &BestPathEvent) {
        if event.is_withdraw {
            info!("Withdraw {} from AS{}", event.prefix, event.remote_as);
            self.hop_db.remove_route(event.prefix);
        } else {
            info!(
                "Best path {} via {} from AS{}",
                event.prefix, event.nexthop, event.remote_as
            );
            self.hop_db.add_route(event.prefix, event.nexthop);
        }
    }

    fn on_peer_up(&self, address: Ipv4Addr, remote_as: u32) {
        self.set_state(address, remote_as, NeighborState::Up);
    }

    fn on_peer_down(&self, address: Ipv4Addr, remote_as: u32) {
        self.set_state(address, remote_as, NeighborState::Down);
    }
}
