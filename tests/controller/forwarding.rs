//! IPv4 path installation

use super::harness::*;
use sdnroute::controller::Outcome;
use sdnroute::dataplane::PATH_FLOW_PRIORITY;
use sdnroute::switch::{FlowAction, FlowMatch, PacketData};
use sdnroute::ErrorKind;
use std::net::Ipv4Addr;

const HOST_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);

fn forwarded(outcome: Outcome) -> sdnroute::dataplane::Forwarded {
    match outcome {
        Outcome::Forwarded(f) => f,
        other => panic!("Expected forward, got {:?}", other),
    }
}

/// S1 port 2 <-> S2 port 2, host on S2 port 3, packet enters S1 port 1
#[test]
fn test_two_switch_path() {
    let fabric = FabricBuilder::new()
        .switch(1, &[1, 2])
        .switch(2, &[2, 3])
        .link(ep(1, 2), ep(2, 2))
        .host(mac(5), HOST_IP, ep(2, 3))
        .build();

    let result = forwarded(fabric.ipv4(ep(1, 1), HOST_IP));
    assert_eq!(result.path, vec![sw(1), sw(2)]);

    let s1 = fabric.log.programmed(sw(1));
    let s2 = fabric.log.programmed(sw(2));
    assert_eq!(s1.len(), 1);
    assert_eq!(s2.len(), 1);
    for rule in s1.iter().chain(&s2) {
        assert_eq!(rule.priority, PATH_FLOW_PRIORITY);
        assert_eq!(rule.matcher, FlowMatch::ipv4_host(HOST_IP));
        assert_eq!(rule.actions[0], FlowAction::SetEthDst(mac(5)));
    }
    assert_eq!(s1[0].output_port(), Some(2));
    assert_eq!(s2[0].output_port(), Some(3));

    let emitted = fabric.log.emitted();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].0, sw(1));
    assert_eq!(emitted[0].1.out_port, 2);
    assert!(matches!(emitted[0].1.data, PacketData::Raw(_)));
}

/// Three switches in a line, host on S3 port 9
#[test]
fn test_three_switch_path_programs_one_flow_per_switch() {
    let fabric = FabricBuilder::new()
        .switch(1, &[1, 2])
        .switch(2, &[1, 2])
        .switch(3, &[1, 9])
        .link(ep(1, 2), ep(2, 1))
        .link(ep(2, 2), ep(3, 1))
        .host(mac(5), HOST_IP, ep(3, 9))
        .build();

    forwarded(fabric.ipv4(ep(1, 1), HOST_IP));

    let programs: Vec<_> = fabric
        .log
        .commands()
        .into_iter()
        .filter(|c| matches!(c, sdnroute::switch::SwitchCommand::Program { .. }))
        .collect();
    assert_eq!(programs.len(), 3);
    assert_eq!(fabric.log.programmed(sw(1))[0].output_port(), Some(2));
    assert_eq!(fabric.log.programmed(sw(2))[0].output_port(), Some(2));
    assert_eq!(fabric.log.programmed(sw(3))[0].output_port(), Some(9));
}

#[test]
fn test_repeat_packet_reissues_same_flows() {
    let fabric = FabricBuilder::new()
        .switch(1, &[1, 2])
        .switch(2, &[2, 3])
        .link(ep(1, 2), ep(2, 2))
        .host(mac(5), HOST_IP, ep(2, 3))
        .build();

    forwarded(fabric.ipv4(ep(1, 1), HOST_IP));
    forwarded(fabric.ipv4(ep(1, 1), HOST_IP));

    assert_eq!(fabric.log.programmed(sw(1)).len(), 2);
    assert_eq!(fabric.log.flow_table(sw(1)).len(), 1);
    assert_eq!(fabric.log.flow_table(sw(2)).len(), 1);
}

/// Discovery reports only S1 -> S2; the reverse direction is still usable
#[test]
fn test_one_way_link_is_usable_in_reverse() {
    let fabric = FabricBuilder::new()
        .switch(1, &[1, 2])
        .switch(2, &[2, 3])
        .one_way_link(ep(1, 2), ep(2, 2))
        .host(mac(5), HOST_IP, ep(1, 1))
        .build();

    let result = forwarded(fabric.ipv4(ep(2, 3), HOST_IP));

    assert_eq!(result.path, vec![sw(2), sw(1)]);
    assert_eq!(result.out_port, 2);
    assert_eq!(fabric.log.programmed(sw(1))[0].output_port(), Some(1));
}

#[test]
fn test_external_destination_via_gateway() {
    let peer = Ipv4Addr::new(192, 168, 100, 1);
    let peer_mac = mac(0xbb);
    let fabric = FabricBuilder::new()
        .switch(1, &[1, 2])
        .switch(2, &[2, 7])
        .link(ep(1, 2), ep(2, 2))
        .gateway(ep(2, 7), peer, peer_mac)
        .build();
    fabric
        .controller
        .route_changed("203.0.113.0/24".parse().unwrap(), peer);
    fabric
        .controller
        .route_changed("203.0.0.0/16".parse().unwrap(), Ipv4Addr::new(192, 168, 200, 1));

    let result = forwarded(fabric.ipv4(ep(1, 1), Ipv4Addr::new(203, 0, 113, 10)));

    assert_eq!(result.path, vec![sw(1), sw(2)]);
    let rule = &fabric.log.programmed(sw(2))[0];
    assert_eq!(
        rule.matcher,
        FlowMatch::ipv4_prefix("203.0.113.0/24".parse().unwrap())
    );
    assert_eq!(
        rule.actions,
        vec![FlowAction::SetEthDst(peer_mac), FlowAction::Output(7)]
    );
}

#[test]
fn test_withdrawn_route_drops() {
    let peer = Ipv4Addr::new(192, 168, 100, 1);
    let fabric = FabricBuilder::new()
        .switch(1, &[1, 7])
        .gateway(ep(1, 7), peer, mac(0xbb))
        .build();
    let prefix = "203.0.113.0/24".parse().unwrap();
    fabric.controller.route_changed(prefix, peer);
    fabric.controller.route_withdrawn(prefix);

    let outcome = fabric.ipv4(ep(1, 1), Ipv4Addr::new(203, 0, 113, 10));

    assert_eq!(outcome, Outcome::Dropped(ErrorKind::Unresolvable));
    assert!(fabric.log.commands().is_empty());
}

#[test]
fn test_disconnected_components_drop() {
    let fabric = FabricBuilder::new()
        .switch(1, &[1])
        .switch(2, &[1])
        .host(mac(5), HOST_IP, ep(2, 1))
        .build();

    let outcome = fabric.ipv4(ep(1, 1), HOST_IP);

    assert_eq!(outcome, Outcome::Dropped(ErrorKind::Unreachable));
    assert!(fabric.log.commands().is_empty());
    assert_eq!(fabric.controller.metrics().drops.unreachable.get(), 1);
}

#[test]
fn test_partial_install_keeps_programmed_hops() {
    let fabric = FabricBuilder::new()
        .switch(1, &[1, 2])
        .switch(2, &[1, 2])
        .switch(3, &[1, 9])
        .link(ep(1, 2), ep(2, 1))
        .link(ep(2, 2), ep(3, 1))
        .host(mac(5), HOST_IP, ep(3, 9))
        .build();
    fabric.set_offline(sw(3), true);

    let outcome = fabric.ipv4(ep(1, 1), HOST_IP);

    assert_eq!(outcome, Outcome::Dropped(ErrorKind::PartialInstall));
    assert_eq!(fabric.log.programmed(sw(1)).len(), 1);
    assert_eq!(fabric.log.programmed(sw(2)).len(), 1);
    assert!(fabric.log.programmed(sw(3)).is_empty());
    assert!(fabric.log.emitted().is_empty());

    // the next packet reconverges the path
    fabric.set_offline(sw(3), false);
    forwarded(fabric.ipv4(ep(1, 1), HOST_IP));
    assert_eq!(fabric.log.flow_table(sw(1)).len(), 1);
    assert_eq!(fabric.log.flow_table(sw(3)).len(), 1);
}

#[test]
fn test_ingress_switch_failure_is_unreachable() {
    let fabric = FabricBuilder::new()
        .switch(1, &[1, 2])
        .switch(2, &[1, 9])
        .link(ep(1, 2), ep(2, 1))
        .host(mac(5), HOST_IP, ep(2, 9))
        .build();
    fabric.set_offline(sw(1), true);

    let outcome = fabric.ipv4(ep(1, 1), HOST_IP);

    assert_eq!(outcome, Outcome::Dropped(ErrorKind::Unreachable));
    assert!(fabric.log.commands().is_empty());
    assert_eq!(fabric.controller.metrics().drops.partial_install.get(), 0);
}
