//! Offline scenario replay
//!
//! A scenario file holds a topology snapshot and an ordered list of events.
//! Replaying it drives a full controller (runtime included) against
//! in-memory recording switches, so every decision can be inspected without
//! a live network.

use crate::config::Config;
use crate::controller::Controller;
use crate::dataplane::HopDb;
use crate::protocol::arp::ArpPacket;
use crate::protocol::ethernet::FrameBuilder;
use crate::protocol::ipv4::Ipv4Builder;
use crate::protocol::{EtherType, MacAddr};
use crate::runtime::{self, ControllerEvent};
use crate::speaker::{BestPathEvent, RouteListener};
use crate::switch::{CommandLog, PacketIn, PortNo, SwitchCommand, SwitchId};
use crate::telemetry::MetricsRegistry;
use crate::topology::{StaticTopology, TopologySnapshot};
use crate::{Error, Result};
use ipnet::Ipv4Net;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const DEFAULT_SRC_MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub topology: TopologySnapshot,
    #[serde(default)]
    pub events: Vec<ScenarioEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioEvent {
    Route {
        prefix: Ipv4Net,
        nexthop: Ipv4Addr,
        #[serde(default)]
        remote_as: u32,
    },
    Withdraw {
        prefix: Ipv4Net,
        #[serde(default)]
        nexthop: Option<Ipv4Addr>,
        #[serde(default)]
        remote_as: u32,
    },
    ArpRequest {
        switch: SwitchId,
        port: PortNo,
        #[serde(default = "default_src_mac")]
        src_mac: MacAddr,
        src_ip: Ipv4Addr,
        target_ip: Ipv4Addr,
    },
    Ipv4 {
        switch: SwitchId,
        port: PortNo,
        #[serde(default = "default_src_mac")]
        src_mac: MacAddr,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        #[serde(default)]
        buffer_id: Option<u32>,
    },
    PeerUp {
        address: Ipv4Addr,
        remote_as: u32,
    },
    PeerDown {
        address: Ipv4Addr,
        remote_as: u32,
    },
    /// Switch goes away: it leaves the registry and the topology, taking
    /// its links and hosts with it.
    Disconnect {
        switch: SwitchId,
    },
}

fn default_src_mac() -> MacAddr {
    DEFAULT_SRC_MAC
}

impl ScenarioEvent {
    /// The runtime event this scenario step stands for.
    pub fn to_event(&self) -> ControllerEvent {
        match self {
            ScenarioEvent::Route {
                prefix,
                nexthop,
                remote_as,
            } => ControllerEvent::BestPathChanged(BestPathEvent {
                prefix: *prefix,
                nexthop: *nexthop,
                remote_as: *remote_as,
                is_withdraw: false,
            }),
            ScenarioEvent::Withdraw {
                prefix,
                nexthop,
                remote_as,
            } => ControllerEvent::BestPathChanged(BestPathEvent {
                prefix: *prefix,
                nexthop: nexthop.unwrap_or(Ipv4Addr::UNSPECIFIED),
                remote_as: *remote_as,
                is_withdraw: true,
            }),
            ScenarioEvent::ArpRequest {
                switch,
                port,
                src_mac,
                src_ip,
                target_ip,
            } => {
                let frame = ArpPacket::request(*src_mac, *src_ip, *target_ip).to_frame();
                ControllerEvent::PacketIn(PacketIn::new(*switch, *port, frame))
            }
            ScenarioEvent::Ipv4 {
                switch,
                port,
                src_mac,
                src_ip,
                dst_ip,
                buffer_id,
            } => {
                let ip = Ipv4Builder::new(*src_ip, *dst_ip).build();
                let frame = FrameBuilder::new(EtherType::Ipv4)
                    .src_mac(*src_mac)
                    .payload(&ip)
                    .build();
                let packet = PacketIn::new(*switch, *port, frame);
                let packet = match buffer_id {
                    Some(id) => {
                        let total_len = packet.total_len;
                        packet.with_buffer(*id, total_len)
                    }
                    None => packet,
                };
                ControllerEvent::PacketIn(packet)
            }
            ScenarioEvent::PeerUp { address, remote_as } => ControllerEvent::PeerUp {
                address: *address,
                remote_as: *remote_as,
            },
            ScenarioEvent::PeerDown { address, remote_as } => ControllerEvent::PeerDown {
                address: *address,
                remote_as: *remote_as,
            },
            ScenarioEvent::Disconnect { switch } => ControllerEvent::SwitchDisconnected(*switch),
        }
    }
}

/// Everything a replay produced
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Commands in the order switches received them
    pub commands: Vec<SwitchCommand>,
    pub metrics: Vec<(String, u64)>,
    /// Route table after the last event, most specific first
    pub routes: Vec<(Ipv4Net, Ipv4Addr)>,
}

impl Scenario {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Parse(e.to_string()))
    }

    /// Replay against a controller built from `config`. Every switch in the
    /// topology connects before the first event.
    pub async fn run(&self, config: &Config) -> Result<SimulationReport> {
        let topology = Arc::new(StaticTopology::from_snapshot(self.topology.clone()));
        let hop_db = Arc::new(HopDb::new());
        let metrics = Arc::new(MetricsRegistry::new());
        let controller = Arc::new(Controller::new(
            config.policy(),
            topology.clone(),
            hop_db.clone(),
            metrics.clone(),
        ));
        let speaker = config
            .speaker
            .as_ref()
            .map(|s| Arc::new(s.build(hop_db.clone())) as Arc<dyn RouteListener>);

        let (handle, task) = runtime::spawn(controller, speaker, config.controller.queue_depth);
        let log = CommandLog::new();

        for switch in &self.topology.switches {
            handle
                .send(ControllerEvent::SwitchConnected {
                    switch: switch.id,
                    connection: Arc::new(log.connection(switch.id)),
                })
                .await?;
        }
        for (i, event) in self.events.iter().enumerate() {
            info!("Scenario event {}: {:?}", i, event);
            if let ScenarioEvent::Disconnect { switch } = event {
                // earlier events still see the switch
                handle.flush().await?;
                topology.remove_switch(*switch);
            }
            handle.send(event.to_event()).await?;
        }
        handle.flush().await?;

        drop(handle);
        task.await.map_err(|e| Error::Io(std::io::Error::other(e)))?;

        Ok(SimulationReport {
            commands: log.commands(),
            metrics: metrics.export(),
            routes: hop_db.routes(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ethernet::Frame;
    use crate::switch::PacketData;

    const SCENARIO: &str = r#"
[[topology.switches]]
id = 1
ports = [1, 2, 4]

[[topology.switches]]
id = 2
ports = [1, 2, 3]

[[topology.links]]
src = { switch = 1, port = 2 }
dst = { switch = 2, port = 2 }

[[topology.hosts]]
mac = "02:00:00:00:00:aa"
ipv4 = ["10.0.0.5"]
attachment = { switch = 2, port = 3 }

[[events]]
type = "arp_request"
switch = 1
port = 1
src_ip = "10.0.0.1"
target_ip = "10.0.0.5"

[[events]]
type = "route"
prefix = "172.18.0.0/16"
nexthop = "172.17.2.1"

[[events]]
type = "ipv4"
switch = 2
port = 3
src_ip = "10.0.0.5"
dst_ip = "172.18.9.9"
buffer_id = 7
"#;

    const CONFIG: &str = r#"
[controller]
ip = "10.0.0.254"
mac = "02:00:00:00:00:fe"

[network]
internal = ["10.0.0.0/24"]

[[gateways]]
switch = 1
port = 4
peer_controller = "172.17.2.1"
peer_switch_mac = "02:00:00:00:00:bb"
"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        assert_eq!(scenario.topology.switches.len(), 2);
        assert_eq!(scenario.events.len(), 3);
        assert!(matches!(
            scenario.events[0],
            ScenarioEvent::ArpRequest { src_mac, .. } if src_mac == DEFAULT_SRC_MAC
        ));
    }

    #[test]
    fn test_unknown_event_type() {
        let err = Scenario::parse("[[events]]\ntype = \"teleport\"").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_ipv4_event_builds_frame() {
        let event = ScenarioEvent::Ipv4 {
            switch: SwitchId(1),
            port: 2,
            src_mac: DEFAULT_SRC_MAC,
            src_ip: Ipv4Addr::new(10, 0, 0, 1),
            dst_ip: Ipv4Addr::new(10, 0, 0, 5),
            buffer_id: None,
        };
        let ControllerEvent::PacketIn(packet) = event.to_event() else {
            panic!("Expected packet-in");
        };
        let frame = Frame::parse(&packet.data).unwrap();
        assert_eq!(frame.ethertype(), EtherType::Ipv4 as u16);
        assert_eq!(frame.src_mac(), DEFAULT_SRC_MAC);
        assert_eq!(packet.in_port, 2);
    }

    #[tokio::test]
    async fn test_run_scenario() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        let config = crate::config::parse(CONFIG).unwrap();

        let report = scenario.run(&config).await.unwrap();

        // two table-miss flows, one ARP reply, two path flows, one packet-out
        assert_eq!(report.commands.len(), 6);
        assert_eq!(report.routes.len(), 1);

        let emitted: Vec<_> = report
            .commands
            .iter()
            .filter_map(|c| match c {
                SwitchCommand::Emit { switch, packet } => Some((*switch, packet.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].0, SwitchId(1));
        assert_eq!(emitted[0].1.out_port, 1);
        assert_eq!(emitted[1].0, SwitchId(2));
        assert_eq!(emitted[1].1.out_port, 2);
        assert_eq!(emitted[1].1.data, PacketData::Buffered(7));

        assert!(report.metrics.contains(&("arp_replies_sent".into(), 1)));
        assert!(report.metrics.contains(&("packets_forwarded".into(), 1)));
    }

    #[tokio::test]
    async fn test_disconnect_removes_switch_from_topology() {
        let mut scenario = Scenario::parse(SCENARIO).unwrap();
        scenario.events = vec![
            ScenarioEvent::Disconnect { switch: SwitchId(2) },
            ScenarioEvent::ArpRequest {
                switch: SwitchId(1),
                port: 1,
                src_mac: DEFAULT_SRC_MAC,
                src_ip: Ipv4Addr::new(10, 0, 0, 1),
                target_ip: Ipv4Addr::new(10, 0, 0, 5),
            },
        ];
        let config = crate::config::parse(CONFIG).unwrap();

        let report = scenario.run(&config).await.unwrap();

        // host 10.0.0.5 left with switch 2, so the query floods switch 1
        let mut flooded: Vec<_> = report
            .commands
            .iter()
            .filter_map(|c| match c {
                SwitchCommand::Emit { switch, packet } => Some((*switch, packet.out_port)),
                _ => None,
            })
            .collect();
        flooded.sort();
        assert_eq!(
            flooded,
            vec![(SwitchId(1), 1), (SwitchId(1), 2), (SwitchId(1), 4)]
        );
        assert!(report.metrics.contains(&("arp_floods".into(), 1)));
        assert!(report.metrics.contains(&("connected_switches".into(), 1)));
    }
}
