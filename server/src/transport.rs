//! Outbound side of the connection layer as seen by the dispatcher

use shared::Packet;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};

/// Where the dispatcher sends packets
///
/// Implementations must not block: the dispatcher calls these while holding
/// the lobby lock so that event order matches state order.
pub trait Transport: Send + Sync {
    fn write_to(&self, addr: SocketAddr, packet: Packet);
    fn write_to_all(&self, packet: Packet);
    fn write_to_all_except(&self, packet: Packet, addr: SocketAddr);
    fn close_connection(&self, addr: SocketAddr);
}

/// One outbound action
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<SocketAddr>,
    },
    Close {
        addr: SocketAddr,
    },
}

/// Transport that keeps every outbound action in memory, in order
#[derive(Debug, Default)]
pub struct RecordingTransport {
    messages: Mutex<Vec<OutboundMessage>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, message: OutboundMessage) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    /// Removes and returns everything recorded so far
    pub fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Packets `addr` would have received, in order
    pub fn packets_for(messages: &[OutboundMessage], addr: SocketAddr) -> Vec<Packet> {
        messages
            .iter()
            .filter_map(|message| match message {
                OutboundMessage::SendPacket { packet, addr: to } if *to == addr => {
                    Some(packet.clone())
                }
                OutboundMessage::BroadcastPacket { packet, exclude } if *exclude != Some(addr) => {
                    Some(packet.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn was_closed(messages: &[OutboundMessage], addr: SocketAddr) -> bool {
        messages
            .iter()
            .any(|message| *message == OutboundMessage::Close { addr })
    }
}

impl Transport for RecordingTransport {
    fn write_to(&self, addr: SocketAddr, packet: Packet) {
        self.push(OutboundMessage::SendPacket { packet, addr });
    }

    fn write_to_all(&self, packet: Packet) {
        self.push(OutboundMessage::BroadcastPacket {
            packet,
            exclude: None,
        });
    }

    fn write_to_all_except(&self, packet: Packet, addr: SocketAddr) {
        self.push(OutboundMessage::BroadcastPacket {
            packet,
            exclude: Some(addr),
        });
    }

    fn close_connection(&self, addr: SocketAddr) {
        self.push(OutboundMessage::Close { addr });
    }
}
