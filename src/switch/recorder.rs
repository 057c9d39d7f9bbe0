//! In-memory switch connections
//!
//! Used by the simulator and the tests: every command is appended to a shared
//! log instead of going to a wire.

use super::{FlowRule, PacketOut, SwitchCommand, SwitchConnection, SwitchId};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Shared, ordered log of commands issued to recording switches
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    commands: Arc<Mutex<Vec<SwitchCommand>>>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connection for `switch` that records into this log.
    pub fn connection(&self, switch: SwitchId) -> RecordingSwitch {
        RecordingSwitch {
            switch,
            log: self.clone(),
            offline: AtomicBool::new(false),
        }
    }

    fn push(&self, command: SwitchCommand) {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }

    pub fn commands(&self) -> Vec<SwitchCommand> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every flow programmed on `switch`, in issue order, duplicates included.
    pub fn programmed(&self, switch: SwitchId) -> Vec<FlowRule> {
        self.commands()
            .into_iter()
            .filter_map(|cmd| match cmd {
                SwitchCommand::Program { switch: s, rule } if s == switch => Some(rule),
                _ => None,
            })
            .collect()
    }

    /// The flow table `switch` would hold: later rules with the same
    /// `(priority, match)` overwrite earlier ones.
    pub fn flow_table(&self, switch: SwitchId) -> Vec<FlowRule> {
        let mut table: Vec<FlowRule> = Vec::new();
        for rule in self.programmed(switch) {
            match table.iter_mut().find(|r| r.key() == rule.key()) {
                Some(existing) => *existing = rule,
                None => table.push(rule),
            }
        }
        table
    }

    /// Packet-outs in issue order.
    pub fn emitted(&self) -> Vec<(SwitchId, PacketOut)> {
        self.commands()
            .into_iter()
            .filter_map(|cmd| match cmd {
                SwitchCommand::Emit { switch, packet } => Some((switch, packet)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Switch connection backed by a [`CommandLog`]
#[derive(Debug)]
pub struct RecordingSwitch {
    switch: SwitchId,
    log: CommandLog,
    offline: AtomicBool,
}

impl RecordingSwitch {
    /// While offline every command fails with `SwitchUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::Relaxed) {
            Err(Error::SwitchUnavailable(self.switch))
        } else {
            Ok(())
        }
    }
}

impl SwitchConnection for RecordingSwitch {
    fn program(&self, rule: &FlowRule) -> Result<()> {
        self.check_online()?;
        self.log.push(SwitchCommand::Program {
            switch: self.switch,
            rule: rule.clone(),
        });
        Ok(())
    }

    fn emit(&self, packet: &PacketOut) -> Result<()> {
        self.check_online()?;
        self.log.push(SwitchCommand::Emit {
            switch: self.switch,
            packet: packet.clone(),
        });
        Ok(())
    }
}
