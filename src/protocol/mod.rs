//! Packet codecs
//!
//! Just enough Ethernet, ARP and IPv4 to classify packet-in events and to
//! synthesize ARP replies. Payloads are never rewritten.

pub mod arp;
pub mod ethernet;
pub mod ipv4;
mod types;

pub use types::{EtherType, MacAddr, ParseMacAddrError};
