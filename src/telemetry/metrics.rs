//! Controller metrics.
//!
//! Thread-safe counters for packet-in handling and switch programming, kept
//! globally and per switch.

use crate::error::ErrorKind;
use crate::switch::SwitchId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-switch statistics.
#[derive(Debug, Default)]
pub struct SwitchStats {
    /// Packet-in events received from the switch.
    pub packet_ins: Counter,
    /// Flow rules sent to the switch.
    pub flows_programmed: Counter,
    /// Packet-outs sent to the switch.
    pub packets_emitted: Counter,
}

impl SwitchStats {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Drops broken down by error kind.
#[derive(Debug, Default)]
pub struct DropCounters {
    pub unresolvable: Counter,
    pub unreachable: Counter,
    pub partial_install: Counter,
    pub malformed: Counter,
    pub internal: Counter,
}

impl DropCounters {
    pub fn get(&self, kind: ErrorKind) -> &Counter {
        match kind {
            ErrorKind::Unresolvable => &self.unresolvable,
            ErrorKind::Unreachable => &self.unreachable,
            ErrorKind::PartialInstall => &self.partial_install,
            ErrorKind::MalformedInput => &self.malformed,
            ErrorKind::Internal => &self.internal,
        }
    }

    pub fn total(&self) -> u64 {
        self.unresolvable.get()
            + self.unreachable.get()
            + self.partial_install.get()
            + self.malformed.get()
            + self.internal.get()
    }
}

/// Global metrics registry for the controller.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    switches: RwLock<HashMap<SwitchId, SwitchStats>>,

    /// Packet-in events received.
    pub packet_ins: Counter,
    /// Packet-ins captured shorter than their wire length.
    pub packet_ins_truncated: Counter,
    /// Packet-ins that are neither ARP nor IPv4.
    pub packets_ignored: Counter,

    // ARP
    pub arp_replies_sent: Counter,
    pub arp_floods: Counter,

    // Forwarding
    /// IPv4 packets for which a path was installed.
    pub packets_forwarded: Counter,
    pub flows_programmed: Counter,
    pub drops: DropCounters,

    // Gauges
    pub route_count: AtomicU64,
    pub connected_switches: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the stats for `switch`, creating them on first use.
    fn with_switch(&self, switch: SwitchId, f: impl FnOnce(&SwitchStats)) {
        if let Some(stats) = self
            .switches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&switch)
        {
            f(stats);
            return;
        }
        let mut switches = self.switches.write().unwrap_or_else(PoisonError::into_inner);
        f(switches.entry(switch).or_default());
    }

    pub fn record_packet_in(&self, switch: SwitchId) {
        self.packet_ins.inc();
        self.with_switch(switch, |s| s.packet_ins.inc());
    }

    pub fn record_flows(&self, switch: SwitchId, count: u64) {
        self.flows_programmed.add(count);
        self.with_switch(switch, |s| s.flows_programmed.add(count));
    }

    pub fn record_emit(&self, switch: SwitchId, count: u64) {
        self.with_switch(switch, |s| s.packets_emitted.add(count));
    }

    pub fn record_drop(&self, kind: ErrorKind) {
        self.drops.get(kind).inc();
    }

    pub fn set_route_count(&self, count: usize) {
        self.route_count.store(count as u64, Ordering::Relaxed);
    }

    pub fn set_connected_switches(&self, count: usize) {
        self.connected_switches.store(count as u64, Ordering::Relaxed);
    }

    /// Packet-ins recorded for one switch.
    pub fn switch_packet_ins(&self, switch: SwitchId) -> u64 {
        self.switches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&switch)
            .map(|s| s.packet_ins.get())
            .unwrap_or(0)
    }

    /// Exports all metrics as key-value pairs. Per-switch entries are
    /// prefixed with the switch id and come last, ordered by switch.
    pub fn export(&self) -> Vec<(String, u64)> {
        let mut result: Vec<(String, u64)> = vec![
            ("packet_ins".into(), self.packet_ins.get()),
            ("packet_ins_truncated".into(), self.packet_ins_truncated.get()),
            ("packets_ignored".into(), self.packets_ignored.get()),
            ("arp_replies_sent".into(), self.arp_replies_sent.get()),
            ("arp_floods".into(), self.arp_floods.get()),
            ("packets_forwarded".into(), self.packets_forwarded.get()),
            ("flows_programmed".into(), self.flows_programmed.get()),
            ("drops_unresolvable".into(), self.drops.unresolvable.get()),
            ("drops_unreachable".into(), self.drops.unreachable.get()),
            ("drops_partial_install".into(), self.drops.partial_install.get()),
            ("drops_malformed".into(), self.drops.malformed.get()),
            ("drops_internal".into(), self.drops.internal.get()),
            ("route_count".into(), self.route_count.load(Ordering::Relaxed)),
            (
                "connected_switches".into(),
                self.connected_switches.load(Ordering::Relaxed),
            ),
        ];

        let switches = self.switches.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<_> = switches.keys().copied().collect();
        ids.sort();
        for id in ids {
            if let Some(stats) = switches.get(&id) {
                result.extend([
                    (format!("{}_packet_ins", id), stats.packet_ins.get()),
                    (format!("{}_flows_programmed", id), stats.flows_programmed.get()),
                    (format!("{}_packets_emitted", id), stats.packets_emitted.get()),
                ]);
            }
        }

        result
    }
}
