//! VISCA-over-IP framing and command payloads

pub mod binary;
pub mod messages;

pub use binary::{build_packet, normalize_payload, SequenceCounter, ViscaHeader};
pub use messages::ViscaCommand;

/// Default VISCA-over-IP UDP port for this camera family
pub const DEFAULT_VISCA_PORT: u16 = 52381;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ZoomDirection;

    #[test]
    fn test_command_frames_into_packet() {
        let sequence = SequenceCounter::new();
        let command = ViscaCommand::zoom(ZoomDirection::Out, 7);

        let packet = build_packet(&command.payload_hex(), &sequence).unwrap();
        assert_eq!(
            packet,
            vec![0x01, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0x01, 0x81, 0x01, 0x04, 0x07, 0x37, 0xFF]
        );
    }
}
