//! Flow rules

use crate::protocol::{EtherType, MacAddr};
use crate::switch::PortNo;
use ipnet::Ipv4Net;
use std::fmt;
use std::net::Ipv4Addr;

/// Priority of the catch-all rule that punts unmatched packets to the controller
pub const TABLE_MISS_PRIORITY: u16 = 0;

/// Match criteria; `None` fields are wildcards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlowMatch {
    pub in_port: Option<PortNo>,
    pub eth_type: Option<EtherType>,
    pub ipv4_dst: Option<Ipv4Net>,
}

impl FlowMatch {
    /// Wildcard match
    pub fn all() -> Self {
        Self::default()
    }

    /// Exact match on one IPv4 destination
    pub fn ipv4_host(addr: Ipv4Addr) -> Self {
        Self::ipv4_prefix(Ipv4Net::from(addr))
    }

    /// Masked match on an IPv4 destination network
    pub fn ipv4_prefix(net: Ipv4Net) -> Self {
        Self {
            in_port: None,
            eth_type: Some(EtherType::Ipv4),
            ipv4_dst: Some(net.trunc()),
        }
    }

    pub fn matches_ipv4(&self, dst: Ipv4Addr) -> bool {
        self.eth_type.map_or(true, |t| t == EtherType::Ipv4)
            && self.ipv4_dst.map_or(true, |net| net.contains(&dst))
    }
}

impl fmt::Display for FlowMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = Vec::new();
        if let Some(port) = self.in_port {
            fields.push(format!("in_port={port}"));
        }
        if let Some(eth_type) = self.eth_type {
            fields.push(format!("eth_type={:#06x}", eth_type as u16));
        }
        if let Some(net) = self.ipv4_dst {
            if net.prefix_len() == 32 {
                fields.push(format!("ipv4_dst={}", net.addr()));
            } else {
                fields.push(format!("ipv4_dst={net}"));
            }
        }
        if fields.is_empty() {
            write!(f, "*")
        } else {
            write!(f, "{}", fields.join(","))
        }
    }
}

/// Action applied to matching packets, in list order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowAction {
    SetEthDst(MacAddr),
    Output(PortNo),
    /// Punt to the controller without buffering
    Controller,
}

impl fmt::Display for FlowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowAction::SetEthDst(mac) => write!(f, "set_eth_dst:{mac}"),
            FlowAction::Output(port) => write!(f, "output:{port}"),
            FlowAction::Controller => write!(f, "output:controller"),
        }
    }
}

/// A `(priority, match, actions)` instruction for one switch.
///
/// Switches key their tables on `(priority, match)`, so re-issuing a rule
/// overwrites rather than duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRule {
    pub priority: u16,
    pub matcher: FlowMatch,
    pub actions: Vec<FlowAction>,
}

impl FlowRule {
    pub fn new(priority: u16, matcher: FlowMatch, actions: Vec<FlowAction>) -> Self {
        Self {
            priority,
            matcher,
            actions,
        }
    }

    pub fn table_miss() -> Self {
        Self::new(
            TABLE_MISS_PRIORITY,
            FlowMatch::all(),
            vec![FlowAction::Controller],
        )
    }

    pub fn key(&self) -> (u16, FlowMatch) {
        (self.priority, self.matcher)
    }

    /// Final output port, if the rule ends in a physical output.
    pub fn output_port(&self) -> Option<PortNo> {
        self.actions.iter().rev().find_map(|action| match action {
            FlowAction::Output(port) => Some(*port),
            _ => None,
        })
    }
}

impl fmt::Display for FlowRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions: Vec<String> = self.actions.iter().map(ToString::to_string).collect();
        write!(
            f,
            "priority={} match={} actions={}",
            self.priority,
            self.matcher,
            actions.join(",")
        )
    }
}
