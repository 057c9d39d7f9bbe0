//! In-memory fabric for controller tests

use sdnroute::controller::{Controller, Outcome};
use sdnroute::dataplane::{ControllerIdentity, ForwardingPolicy, Gateway, HopDb};
use sdnroute::protocol::arp::ArpPacket;
use sdnroute::protocol::ethernet::FrameBuilder;
use sdnroute::protocol::ipv4::Ipv4Builder;
use sdnroute::protocol::{EtherType, MacAddr};
use sdnroute::switch::{CommandLog, PacketIn, PortNo, RecordingSwitch, SwitchId};
use sdnroute::telemetry::MetricsRegistry;
use sdnroute::topology::{Endpoint, Host, StaticTopology};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

pub const CONTROLLER_IP: Ipv4Addr = Ipv4Addr::new(172, 17, 1, 1);
pub const CONTROLLER_MAC: MacAddr = MacAddr([0x00, 0x0c, 0x29, 0x91, 0x79, 0x96]);
pub const CLIENT_MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
pub const CLIENT_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

pub fn mac(last: u8) -> MacAddr {
    MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, last])
}

pub fn sw(id: u64) -> SwitchId {
    SwitchId(id)
}

pub fn ep(switch: u64, port: PortNo) -> Endpoint {
    Endpoint::new(SwitchId(switch), port)
}

/// Builder for a [`Fabric`]
pub struct FabricBuilder {
    topology: StaticTopology,
    policy: ForwardingPolicy,
}

impl FabricBuilder {
    pub fn new() -> Self {
        let policy = ForwardingPolicy::new(ControllerIdentity {
            ip: CONTROLLER_IP,
            mac: CONTROLLER_MAC,
        })
        .with_internal_network("10.0.0.0/24".parse().unwrap())
        .with_internal_network("172.17.1.0/24".parse().unwrap());
        Self {
            topology: StaticTopology::new(),
            policy,
        }
    }

    pub fn switch(self, id: u64, ports: &[PortNo]) -> Self {
        self.topology.add_switch(SwitchId(id), ports.to_vec());
        self
    }

    /// Link discovered in both directions
    pub fn link(self, a: Endpoint, b: Endpoint) -> Self {
        self.topology.add_bidirectional_link(a, b);
        self
    }

    /// Link discovered in one direction only
    pub fn one_way_link(self, src: Endpoint, dst: Endpoint) -> Self {
        self.topology.add_link(src, dst);
        self
    }

    pub fn host(self, mac: MacAddr, ip: Ipv4Addr, at: Endpoint) -> Self {
        self.topology.add_host(Host {
            mac,
            ipv4: vec![ip],
            attachment: at,
        });
        self
    }

    pub fn gateway(mut self, at: Endpoint, peer: Ipv4Addr, peer_mac: MacAddr) -> Self {
        self.policy = self.policy.with_gateway(Gateway {
            switch: at.switch,
            port: at.port,
            peer_controller: peer,
            peer_switch_mac: peer_mac,
        });
        self
    }

    /// Build the controller and connect every switch of the topology.
    pub fn build(self) -> Fabric {
        let topology = Arc::new(self.topology);
        let controller = Controller::new(
            self.policy,
            topology.clone(),
            Arc::new(HopDb::new()),
            Arc::new(MetricsRegistry::new()),
        );

        let log = CommandLog::new();
        let mut connections = HashMap::new();
        for switch in topology.snapshot().switches {
            let conn = Arc::new(log.connection(switch.id));
            controller
                .switch_connected(switch.id, conn.clone())
                .expect("switch connects");
            connections.insert(switch.id, conn);
        }
        log.clear();

        Fabric {
            controller,
            topology,
            log,
            connections,
        }
    }
}

pub struct Fabric {
    pub controller: Controller,
    pub topology: Arc<StaticTopology>,
    pub log: CommandLog,
    connections: HashMap<SwitchId, Arc<RecordingSwitch>>,
}

impl Fabric {
    pub fn arp_request(&self, at: Endpoint, target: Ipv4Addr) -> Outcome {
        let arp = ArpPacket::request(CLIENT_MAC, CLIENT_IP, target);
        self.packet_in(at, arp.to_frame())
    }

    pub fn ipv4(&self, at: Endpoint, dst: Ipv4Addr) -> Outcome {
        let ip = Ipv4Builder::new(CLIENT_IP, dst).payload(b"ping").build();
        let frame = FrameBuilder::new(EtherType::Ipv4)
            .src_mac(CLIENT_MAC)
            .dst_mac(CONTROLLER_MAC)
            .payload(&ip)
            .build();
        self.packet_in(at, frame)
    }

    pub fn packet_in(&self, at: Endpoint, frame: Vec<u8>) -> Outcome {
        self.controller
            .handle_packet_in(&PacketIn::new(at.switch, at.port, frame))
    }

    pub fn set_offline(&self, switch: SwitchId, offline: bool) {
        self.connections[&switch].set_offline(offline);
    }
}
