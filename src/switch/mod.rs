//! Southbound switch model
//!
//! Switch identities, flow rules and the fire-and-forget connection trait the
//! transport layer implements.

mod flow;
mod recorder;
mod registry;

pub use flow::{FlowAction, FlowMatch, FlowRule, TABLE_MISS_PRIORITY};
pub use recorder::{CommandLog, RecordingSwitch};
pub use registry::SwitchRegistry;

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port number, scoped to a switch
pub type PortNo = u32;

/// Datapath identifier of a managed switch
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwitchId(pub u64);

impl fmt::Debug for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Payload of a packet-out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketData {
    /// Packet held in the switch's buffer
    Buffered(u32),
    /// Full frame bytes
    Raw(Vec<u8>),
}

/// Packet-out request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    /// Port the packet originally arrived on, `None` when the controller
    /// originated it
    pub in_port: Option<PortNo>,
    pub out_port: PortNo,
    pub data: PacketData,
}

/// Packet delivered to the controller by a switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    pub switch: SwitchId,
    pub in_port: PortNo,
    /// Set when the switch kept the full packet in its buffer
    pub buffer_id: Option<u32>,
    /// Length of the packet on the wire; may exceed `data.len()`
    pub total_len: usize,
    pub data: Vec<u8>,
}

impl PacketIn {
    pub fn new(switch: SwitchId, in_port: PortNo, data: Vec<u8>) -> Self {
        Self {
            switch,
            in_port,
            buffer_id: None,
            total_len: data.len(),
            data,
        }
    }

    pub fn with_buffer(mut self, buffer_id: u32, total_len: usize) -> Self {
        self.buffer_id = Some(buffer_id);
        self.total_len = total_len;
        self
    }

    pub fn is_truncated(&self) -> bool {
        self.data.len() < self.total_len
    }

    /// Payload for re-sending this packet: the buffer reference when the
    /// switch buffered it, the captured bytes otherwise.
    pub fn replay(&self) -> PacketData {
        match self.buffer_id {
            Some(id) => PacketData::Buffered(id),
            None => PacketData::Raw(self.data.clone()),
        }
    }
}

/// Command issued to a switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchCommand {
    Program { switch: SwitchId, rule: FlowRule },
    Emit { switch: SwitchId, packet: PacketOut },
}

impl SwitchCommand {
    pub fn switch(&self) -> SwitchId {
        match self {
            SwitchCommand::Program { switch, .. } | SwitchCommand::Emit { switch, .. } => *switch,
        }
    }
}

impl fmt::Display for SwitchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchCommand::Program { switch, rule } => write!(f, "program {} {}", switch, rule),
            SwitchCommand::Emit { switch, packet } => {
                write!(f, "emit {} out_port={}", switch, packet.out_port)?;
                if let Some(in_port) = packet.in_port {
                    write!(f, " in_port={}", in_port)?;
                }
                match &packet.data {
                    PacketData::Buffered(id) => write!(f, " buffer={}", id),
                    PacketData::Raw(bytes) => write!(f, " raw={}B", bytes.len()),
                }
            }
        }
    }
}

/// Connection to one switch.
///
/// Both calls are fire-and-forget: `Ok` means the message was handed to the
/// transport, not that the switch acknowledged it.
pub trait SwitchConnection: Send + Sync {
    /// Add or overwrite the flow identified by `(priority, match)`.
    fn program(&self, rule: &FlowRule) -> Result<()>;

    fn emit(&self, packet: &PacketOut) -> Result<()>;
}
