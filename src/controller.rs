//! Packet-in dispatch
//!
//! [`Controller`] owns the shared tables and hands each packet-in to the ARP
//! gate or the forwarding engine. Decision failures never escape: they are
//! logged, counted by kind and reported as [`Outcome::Dropped`].

use crate::dataplane::{
    ArpAction, ArpGate, Forwarded, ForwardingEngine, ForwardingPolicy, HopDb, LearnedAddresses,
};
use crate::error::ErrorKind;
use crate::protocol::arp::ArpPacket;
use crate::protocol::ethernet::Frame;
use crate::protocol::ipv4::Ipv4Header;
use crate::protocol::EtherType;
use crate::switch::{PacketIn, SwitchConnection, SwitchId, SwitchRegistry};
use crate::telemetry::MetricsRegistry;
use crate::topology::TopologySource;
use crate::{Error, Result};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Protocol view of a packet-in
#[derive(Debug)]
pub enum Classified<'a> {
    Arp(ArpPacket),
    Ipv4(Ipv4Header<'a>),
    /// Any other ethertype
    Other(u16),
}

/// Decode the Ethernet frame and the ARP or IPv4 header behind it.
pub fn classify(data: &[u8]) -> Result<Classified<'_>> {
    let frame = Frame::parse(data)?;
    match EtherType::from_u16(frame.ethertype()) {
        Some(EtherType::Arp) => Ok(Classified::Arp(ArpPacket::parse(frame.payload())?)),
        Some(EtherType::Ipv4) => Ok(Classified::Ipv4(Ipv4Header::parse(frame.payload())?)),
        None => Ok(Classified::Other(frame.ethertype())),
    }
}

/// What happened to a packet-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Arp(ArpAction),
    Forwarded(Forwarded),
    /// Not ARP or IPv4
    Ignored,
    Dropped(ErrorKind),
}

pub struct Controller {
    hop_db: Arc<HopDb>,
    switches: Arc<SwitchRegistry>,
    learned: Arc<LearnedAddresses>,
    metrics: Arc<MetricsRegistry>,
    arp: ArpGate,
    engine: ForwardingEngine,
}

impl Controller {
    pub fn new(
        policy: ForwardingPolicy,
        topology: Arc<dyn TopologySource>,
        hop_db: Arc<HopDb>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let policy = Arc::new(policy);
        let switches = Arc::new(SwitchRegistry::new());
        let learned = Arc::new(LearnedAddresses::default());

        let arp = ArpGate::new(
            policy.clone(),
            topology.clone(),
            switches.clone(),
            learned.clone(),
        );
        let engine = ForwardingEngine::new(policy, hop_db.clone(), topology, switches.clone());

        Self {
            hop_db,
            switches,
            learned,
            metrics,
            arp,
            engine,
        }
    }

    pub fn hop_db(&self) -> &Arc<HopDb> {
        &self.hop_db
    }

    pub fn switches(&self) -> &Arc<SwitchRegistry> {
        &self.switches
    }

    pub fn learned(&self) -> &Arc<LearnedAddresses> {
        &self.learned
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Register a switch connection and program its table-miss flow.
    pub fn switch_connected(
        &self,
        switch: SwitchId,
        connection: Arc<dyn SwitchConnection>,
    ) -> Result<()> {
        let result = self.switches.connect(switch, connection);
        self.metrics.set_connected_switches(self.switches.len());
        result?;
        self.metrics.record_flows(switch, 1);
        Ok(())
    }

    pub fn switch_disconnected(&self, switch: SwitchId) {
        if self.switches.disconnect(switch) {
            self.learned.forget_switch(switch);
        }
        self.metrics.set_connected_switches(self.switches.len());
    }

    pub fn route_changed(&self, prefix: Ipv4Net, nexthop: Ipv4Addr) {
        self.hop_db.add_route(prefix, nexthop);
        self.metrics.set_route_count(self.hop_db.len());
    }

    pub fn route_withdrawn(&self, prefix: Ipv4Net) {
        self.hop_db.remove_route(prefix);
        self.metrics.set_route_count(self.hop_db.len());
    }

    /// Handle one packet-in to completion.
    pub fn handle_packet_in(&self, packet: &PacketIn) -> Outcome {
        self.metrics.record_packet_in(packet.switch);
        if packet.is_truncated() {
            self.metrics.packet_ins_truncated.inc();
            debug!(
                "Packet-in from {}/{} truncated: {} of {} bytes",
                packet.switch,
                packet.in_port,
                packet.data.len(),
                packet.total_len
            );
        }

        let classified = match classify(&packet.data) {
            Ok(c) => c,
            Err(e) => return self.dropped(packet, e),
        };

        let result = match classified {
            Classified::Arp(arp) => self.handle_arp(packet, &arp),
            Classified::Ipv4(ip) => self.handle_ipv4(packet, ip.dst_addr()),
            Classified::Other(ethertype) => {
                trace!("Ignoring ethertype 0x{:04x} from {}", ethertype, packet.switch);
                self.metrics.packets_ignored.inc();
                return Outcome::Ignored;
            }
        };

        result.unwrap_or_else(|e| self.dropped(packet, e))
    }

    fn handle_arp(&self, packet: &PacketIn, arp: &ArpPacket) -> Result<Outcome> {
        let action = self.arp.handle(packet, arp)?;
        match &action {
            ArpAction::Replied { .. } => {
                self.metrics.arp_replies_sent.inc();
                self.metrics.record_emit(packet.switch, 1);
            }
            ArpAction::Flooded { ports } => {
                self.metrics.arp_floods.inc();
                for endpoint in ports {
                    self.metrics.record_emit(endpoint.switch, 1);
                }
            }
            ArpAction::Ignored | ArpAction::Dropped => {}
        }
        Ok(Outcome::Arp(action))
    }

    fn handle_ipv4(&self, packet: &PacketIn, dst: Ipv4Addr) -> Result<Outcome> {
        let forwarded = self.engine.forward(packet, dst)?;
        for switch in &forwarded.path {
            self.metrics.record_flows(*switch, 1);
        }
        self.metrics.record_emit(packet.switch, 1);
        self.metrics.packets_forwarded.inc();
        debug!(
            "Forwarded {} from {}/{} along {:?}",
            dst, packet.switch, packet.in_port, forwarded.path
        );
        Ok(Outcome::Forwarded(forwarded))
    }

    fn dropped(&self, packet: &PacketIn, error: Error) -> Outcome {
        let kind = error.kind();
        self.metrics.record_drop(kind);
        match kind {
            ErrorKind::PartialInstall | ErrorKind::Internal => {
                warn!("Dropped packet-in from {}/{}: {}", packet.switch, packet.in_port, error)
            }
            _ => debug!(
                "Dropped packet-in from {}/{} ({}): {}",
                packet.switch, packet.in_port, kind, error
            ),
        }
        Outcome::Dropped(kind)
    }
}
