//! ARP (Address Resolution Protocol) - RFC 826, Ethernet/IPv4 only

use super::ethernet::FrameBuilder;
use super::{EtherType, MacAddr};
use crate::{Error, Result};
use std::net::Ipv4Addr;

/// ARP packet size (for Ethernet/IPv4)
pub const ARP_PACKET_SIZE: usize = 28;

const HTYPE_ETHERNET: u16 = 1;

/// ARP operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ArpOp {
    Request = 1,
    Reply = 2,
}

impl ArpOp {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(ArpOp::Request),
            2 => Some(ArpOp::Reply),
            _ => None,
        }
    }
}

/// ARP packet (Ethernet/IPv4)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpPacket {
    pub operation: ArpOp,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < ARP_PACKET_SIZE {
            return Err(Error::InvalidPacket("ARP packet too short".into()));
        }

        let htype = u16::from_be_bytes([buffer[0], buffer[1]]);
        let ptype = u16::from_be_bytes([buffer[2], buffer[3]]);
        if htype != HTYPE_ETHERNET || ptype != EtherType::Ipv4 as u16 {
            return Err(Error::InvalidPacket(format!(
                "unsupported ARP htype/ptype {htype:#06x}/{ptype:#06x}"
            )));
        }
        if buffer[4] != 6 || buffer[5] != 4 {
            return Err(Error::InvalidPacket("invalid ARP address lengths".into()));
        }

        let operation = ArpOp::from_u16(u16::from_be_bytes([buffer[6], buffer[7]]))
            .ok_or_else(|| Error::InvalidPacket("invalid ARP operation".into()))?;
        let mac_at = |offset: usize| {
            MacAddr::from_slice(&buffer[offset..offset + 6])
                .ok_or_else(|| Error::InvalidPacket("truncated ARP hardware address".into()))
        };
        let ip_at = |offset: usize| {
            Ipv4Addr::new(
                buffer[offset],
                buffer[offset + 1],
                buffer[offset + 2],
                buffer[offset + 3],
            )
        };

        Ok(Self {
            operation,
            sender_mac: mac_at(8)?,
            sender_ip: ip_at(14),
            target_mac: mac_at(18)?,
            target_ip: ip_at(24),
        })
    }

    pub fn to_bytes(&self) -> [u8; ARP_PACKET_SIZE] {
        let mut buf = [0u8; ARP_PACKET_SIZE];
        buf[0..2].copy_from_slice(&HTYPE_ETHERNET.to_be_bytes());
        buf[2..4].copy_from_slice(&(EtherType::Ipv4 as u16).to_be_bytes());
        buf[4] = 6;
        buf[5] = 4;
        buf[6..8].copy_from_slice(&(self.operation as u16).to_be_bytes());
        buf[8..14].copy_from_slice(&self.sender_mac.0);
        buf[14..18].copy_from_slice(&self.sender_ip.octets());
        buf[18..24].copy_from_slice(&self.target_mac.0);
        buf[24..28].copy_from_slice(&self.target_ip.octets());
        buf
    }

    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            operation: ArpOp::Request,
            sender_mac,
            sender_ip,
            target_mac: MacAddr::ZERO,
            target_ip,
        }
    }

    /// Answer this request on behalf of `resolved`: the reply's sender is the
    /// queried address, its target is the original requester.
    pub fn answer(&self, resolved: MacAddr) -> Self {
        Self {
            operation: ArpOp::Reply,
            sender_mac: resolved,
            sender_ip: self.target_ip,
            target_mac: self.sender_mac,
            target_ip: self.sender_ip,
        }
    }

    /// Wrap the packet in an Ethernet frame. Requests are broadcast.
    pub fn to_frame(&self) -> Vec<u8> {
        let dst = if self.operation == ArpOp::Request {
            MacAddr::BROADCAST
        } else {
            self.target_mac
        };
        FrameBuilder::new(EtherType::Arp)
            .src_mac(self.sender_mac)
            .dst_mac(dst)
            .payload(&self.to_bytes())
            .build()
    }
}
