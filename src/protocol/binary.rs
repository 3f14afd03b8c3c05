use std::sync::atomic::{AtomicU32, Ordering};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::EncodingError;

pub const MESSAGE_TYPE_COMMAND: u8 = 0x01;
pub const TERMINATOR: u8 = 0xFF;

/// VISCA-over-IP header (8 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViscaHeader {
    pub message_type: u8,  // 0x01 for commands
    pub length: u8,        // payload + terminator
    pub sequence: u32,     // big-endian on the wire
}

impl ViscaHeader {
    pub const SIZE: usize = 8;

    pub fn command(length: u8, sequence: u32) -> Self {
        Self {
            message_type: MESSAGE_TYPE_COMMAND,
            length,
            sequence,
        }
    }

    /// Parse header from bytes
    pub fn from_bytes(data: &[u8]) -> Result<(Self, &[u8]), EncodingError> {
        if data.len() < Self::SIZE {
            return Err(EncodingError::Truncated(data.len()));
        }

        let mut buf = data;
        let message_type = buf.get_u8();
        buf.advance(2); // reserved
        let length = buf.get_u8();
        let sequence = buf.get_u32();

        Ok((
            Self {
                message_type,
                length,
                sequence,
            },
            buf,
        ))
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u8(self.message_type);
        buf.put_u8(0x00);
        buf.put_u8(0x00);
        buf.put_u8(self.length);
        buf.put_u32(self.sequence);
        buf.to_vec()
    }
}

/// Command sequence counter.
///
/// Starts at 0 so the first packet of a process carries 1. Wraps to 0
/// after `u32::MAX`.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    value: AtomicU32,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn starting_at(value: u32) -> Self {
        Self {
            value: AtomicU32::new(value),
        }
    }

    /// Fetch-and-increment; returns the incremented value
    pub fn next(&self) -> u32 {
        self.value.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    pub fn current(&self) -> u32 {
        self.value.load(Ordering::SeqCst)
    }
}

/// Strip whitespace and upper-case a hex payload string
pub fn normalize_payload(payload_hex: &str) -> String {
    payload_hex
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Build a VISCA command packet: header, payload, `0xFF` terminator.
///
/// Consumes one sequence value once the payload decodes, including when the
/// payload is then rejected as too long.
pub fn build_packet(payload_hex: &str, sequence: &SequenceCounter) -> Result<Vec<u8>, EncodingError> {
    let payload = hex::decode(normalize_payload(payload_hex))?;

    let seq = sequence.next();
    let length = payload.len() + 1;
    if length > u8::MAX as usize {
        return Err(EncodingError::PayloadTooLong(payload.len()));
    }

    let header = ViscaHeader::command(length as u8, seq);
    let mut packet = BytesMut::with_capacity(ViscaHeader::SIZE + length);
    packet.put_slice(&header.to_bytes());
    packet.put_slice(&payload);
    packet.put_u8(TERMINATOR);

    tracing::trace!("Built VISCA packet seq={} len={}", seq, length);
    Ok(packet.to_vec())
}
