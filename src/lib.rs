//! sdnroute - SDN forwarding core
//!
//! Answers ARP, resolves destinations to internal hosts or external gateways
//! and installs loop-free multi-hop paths across the switches of a managed
//! network. Switch transport, topology discovery and the routing-protocol
//! engine plug in through traits.

pub mod config;
pub mod controller;
pub mod dataplane;
pub mod error;
pub mod protocol;
pub mod runtime;
pub mod scenario;
pub mod speaker;
pub mod switch;
pub mod telemetry;
pub mod topology;

pub use error::{Error, ErrorKind, Result};
