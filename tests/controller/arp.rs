//! ARP answering and flooding

use super::harness::*;
use sdnroute::controller::Outcome;
use sdnroute::dataplane::ArpAction;
use sdnroute::protocol::arp::{ArpOp, ArpPacket};
use sdnroute::protocol::ethernet::Frame;
use sdnroute::switch::PacketData;
use std::net::Ipv4Addr;

const HOST_MAC: sdnroute::protocol::MacAddr = sdnroute::protocol::MacAddr([0, 0, 0, 0, 0, 0xaa]);

fn parse_arp(data: &PacketData) -> (Frame<'_>, ArpPacket) {
    let PacketData::Raw(bytes) = data else {
        panic!("ARP replies carry the full frame");
    };
    let frame = Frame::parse(bytes).unwrap();
    let arp = ArpPacket::parse(frame.payload()).unwrap();
    (frame, arp)
}

/// Single switch S1, host 10.0.0.5 (MAC AA) on port 1, query from port 2
#[test]
fn test_reply_for_known_host_goes_out_ingress_port() {
    let fabric = FabricBuilder::new()
        .switch(1, &[1, 2])
        .host(HOST_MAC, Ipv4Addr::new(10, 0, 0, 5), ep(1, 1))
        .build();

    let outcome = fabric.arp_request(ep(1, 2), Ipv4Addr::new(10, 0, 0, 5));
    assert_eq!(
        outcome,
        Outcome::Arp(ArpAction::Replied {
            mac: HOST_MAC,
            out_port: 2
        })
    );

    let emitted = fabric.log.emitted();
    assert_eq!(emitted.len(), 1);
    let (switch, packet) = &emitted[0];
    assert_eq!(*switch, sw(1));
    assert_eq!(packet.out_port, 2);

    let (frame, reply) = parse_arp(&packet.data);
    assert_eq!(frame.src_mac(), HOST_MAC);
    assert_eq!(frame.dst_mac(), CLIENT_MAC);
    assert_eq!(reply.operation, ArpOp::Reply);
    assert_eq!(reply.sender_mac, HOST_MAC);
    assert_eq!(reply.sender_ip, Ipv4Addr::new(10, 0, 0, 5));
    assert_eq!(reply.target_mac, CLIENT_MAC);
    assert_eq!(reply.target_ip, CLIENT_IP);

    // no flows for ARP
    assert!(fabric.log.programmed(sw(1)).is_empty());
}

#[test]
fn test_controller_address_is_answered() {
    let fabric = FabricBuilder::new().switch(1, &[1, 2]).build();

    fabric.arp_request(ep(1, 1), CONTROLLER_IP);

    let emitted = fabric.log.emitted();
    assert_eq!(emitted.len(), 1);
    let (frame, reply) = parse_arp(&emitted[0].1.data);
    assert_eq!(frame.src_mac(), CONTROLLER_MAC);
    assert_eq!(reply.sender_ip, CONTROLLER_IP);
    assert_eq!(emitted[0].1.out_port, 1);
}

/// s1:3 <-> s2:1, s2:2 <-> s3:1; query for an unknown internal address
#[test]
fn test_unknown_internal_address_floods_edge_ports() {
    let fabric = FabricBuilder::new()
        .switch(1, &[1, 2, 3])
        .switch(2, &[1, 2, 3])
        .switch(3, &[1, 2])
        .link(ep(1, 3), ep(2, 1))
        .link(ep(2, 2), ep(3, 1))
        .build();

    let outcome = fabric.arp_request(ep(1, 1), Ipv4Addr::new(10, 0, 0, 77));

    let Outcome::Arp(ArpAction::Flooded { ports }) = outcome else {
        panic!("Expected flood, got {:?}", outcome);
    };
    assert_eq!(ports, vec![ep(1, 1), ep(1, 2), ep(2, 3), ep(3, 2)]);

    let emitted = fabric.log.emitted();
    assert_eq!(emitted.len(), 4);
    for (switch, packet) in &emitted {
        let (_, arp) = parse_arp(&packet.data);
        // original request, untouched
        assert_eq!(arp.operation, ArpOp::Request);
        assert_eq!(arp.target_ip, Ipv4Addr::new(10, 0, 0, 77));
        assert!(!(*switch == sw(1) && packet.out_port == 3));
    }
    assert_eq!(fabric.controller.metrics().arp_floods.get(), 1);
}

/// Same chain with s2 gone from the registry but still in the topology
#[test]
fn test_flood_skips_disconnected_switch() {
    let fabric = FabricBuilder::new()
        .switch(1, &[1, 2, 3])
        .switch(2, &[1, 2, 3])
        .switch(3, &[1, 2])
        .link(ep(1, 3), ep(2, 1))
        .link(ep(2, 2), ep(3, 1))
        .build();
    fabric.controller.switch_disconnected(sw(2));

    let outcome = fabric.arp_request(ep(1, 1), Ipv4Addr::new(10, 0, 0, 77));

    let Outcome::Arp(ArpAction::Flooded { ports }) = outcome else {
        panic!("Expected flood, got {:?}", outcome);
    };
    assert_eq!(ports, vec![ep(1, 1), ep(1, 2), ep(3, 2)]);

    let mut outputs: Vec<_> = fabric
        .log
        .emitted()
        .iter()
        .map(|(switch, packet)| (*switch, packet.out_port))
        .collect();
    outputs.sort();
    assert_eq!(outputs, vec![(sw(1), 1), (sw(1), 2), (sw(3), 2)]);
    assert_eq!(fabric.controller.metrics().arp_floods.get(), 1);
}

#[test]
fn test_external_address_is_dropped() {
    let fabric = FabricBuilder::new().switch(1, &[1, 2]).build();

    let outcome = fabric.arp_request(ep(1, 1), Ipv4Addr::new(8, 8, 8, 8));

    assert_eq!(outcome, Outcome::Arp(ArpAction::Dropped));
    assert!(fabric.log.commands().is_empty());
}

#[test]
fn test_host_discovered_after_flood_is_answered() {
    let fabric = FabricBuilder::new().switch(1, &[1, 2]).build();
    let target = Ipv4Addr::new(10, 0, 0, 9);

    assert!(matches!(
        fabric.arp_request(ep(1, 1), target),
        Outcome::Arp(ArpAction::Flooded { .. })
    ));

    fabric.topology.add_host(sdnroute::topology::Host {
        mac: mac(9),
        ipv4: vec![target],
        attachment: ep(1, 2),
    });
    fabric.log.clear();

    assert!(matches!(
        fabric.arp_request(ep(1, 1), target),
        Outcome::Arp(ArpAction::Replied { mac: m, .. }) if m == mac(9)
    ));
}

#[test]
fn test_requester_is_learned() {
    let fabric = FabricBuilder::new().switch(1, &[1, 2]).build();
    fabric.arp_request(ep(1, 2), Ipv4Addr::new(8, 8, 8, 8));

    let learned = fabric.controller.learned().lookup_ip(CLIENT_IP).unwrap();
    assert_eq!(learned.mac, CLIENT_MAC);
    assert_eq!(learned.seen_at, ep(1, 2));
}
