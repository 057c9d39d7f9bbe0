//! Ethernet II framing

use super::{EtherType, MacAddr};
use crate::{Error, Result};

/// Ethernet header size (no 802.1Q tag)
pub const HEADER_SIZE: usize = 14;

/// Parsed Ethernet frame borrowing the packet-in buffer
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    dst_mac: MacAddr,
    src_mac: MacAddr,
    ethertype: u16,
    payload: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < HEADER_SIZE {
            return Err(Error::InvalidPacket(format!(
                "ethernet frame too short ({} bytes)",
                buffer.len()
            )));
        }

        let dst_mac = MacAddr::from_slice(&buffer[0..6])
            .ok_or_else(|| Error::InvalidPacket("missing destination MAC".into()))?;
        let src_mac = MacAddr::from_slice(&buffer[6..12])
            .ok_or_else(|| Error::InvalidPacket("missing source MAC".into()))?;

        Ok(Self {
            dst_mac,
            src_mac,
            ethertype: u16::from_be_bytes([buffer[12], buffer[13]]),
            payload: &buffer[HEADER_SIZE..],
        })
    }

    pub fn dst_mac(&self) -> MacAddr {
        self.dst_mac
    }

    pub fn src_mac(&self) -> MacAddr {
        self.src_mac
    }

    pub fn ethertype(&self) -> u16 {
        self.ethertype
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }
}

/// Builder for constructing Ethernet frames
pub struct FrameBuilder {
    dst_mac: MacAddr,
    src_mac: MacAddr,
    ethertype: u16,
    payload: Vec<u8>,
}

impl FrameBuilder {
    pub fn new(ethertype: EtherType) -> Self {
        Self {
            dst_mac: MacAddr::BROADCAST,
            src_mac: MacAddr::ZERO,
            ethertype: ethertype as u16,
            payload: Vec::new(),
        }
    }

    pub fn dst_mac(mut self, mac: MacAddr) -> Self {
        self.dst_mac = mac;
        self
    }

    pub fn src_mac(mut self, mac: MacAddr) -> Self {
        self.src_mac = mac;
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        frame.extend_from_slice(&self.dst_mac.0);
        frame.extend_from_slice(&self.src_mac.0);
        frame.extend_from_slice(&self.ethertype.to_be_bytes());
        frame.extend_from_slice(&self.payload);
        frame
    }
}
