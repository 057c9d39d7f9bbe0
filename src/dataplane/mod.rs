//! Data plane components
//!
//! Forwarding decisions for packet-in events: ARP answering and flooding,
//! route lookup, path computation and flow installation across switches.

mod arp_processor;
mod forwarder;
mod installer;
mod learned;
mod path;
mod policy;
mod routing;

pub use arp_processor::{ArpAction, ArpGate, ArpResolution};
pub use forwarder::{Destination, Forwarded, ForwardingEngine, Target};
pub use installer::{PathInstaller, PathIntent, PATH_FLOW_PRIORITY};
pub use learned::{LearnedAddresses, LearnedBinding};
pub use path::shortest_path;
pub use policy::{ControllerIdentity, ForwardingPolicy, Gateway};
pub use routing::{HopDb, RouteEntry, RouteTable};
