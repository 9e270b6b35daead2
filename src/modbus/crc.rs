//! CRC-16/MODBUS checksum and the packet framing built on it.
//!
//! A *frame* is the RTU payload (slave, function, data). A *packet* is the
//! frame followed by its checksum, low byte first.

use thiserror::Error;

const POLY: u16 = 0xA001;
const INIT: u16 = 0xFFFF;

/// Number of trailing checksum bytes in a packet.
pub const CRC_LEN: usize = 2;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("packet of {len} bytes is too short to carry a checksum")]
    TooShort { len: usize },

    #[error("checksum mismatch: calculated 0x{expected:04x}, received 0x{received:04x}")]
    ChecksumMismatch { expected: u16, received: u16 },
}

/// Reflected CRC-16 with polynomial 0xA001 and initial value 0xFFFF.
///
/// An empty slice yields `0xFFFF`.
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc = INIT;

    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Checksum of `frame` in wire order: `[low, high]`.
pub fn crc_bytes(frame: &[u8]) -> [u8; 2] {
    crc16_modbus(frame).to_le_bytes()
}

/// Appends the checksum to a copy of `frame`.
pub fn build_packet(frame: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(frame.len() + CRC_LEN);
    packet.extend_from_slice(frame);
    packet.extend_from_slice(&crc_bytes(frame));
    packet
}

/// Validates the trailing checksum and returns the frame it covers.
pub fn check_packet(packet: &[u8]) -> Result<&[u8], FrameError> {
    if packet.len() < CRC_LEN {
        return Err(FrameError::TooShort { len: packet.len() });
    }

    let (body, trailer) = packet.split_at(packet.len() - CRC_LEN);
    let expected = crc16_modbus(body);
    let received = u16::from_le_bytes([trailer[0], trailer[1]]);

    if expected == received {
        Ok(body)
    } else {
        Err(FrameError::ChecksumMismatch { expected, received })
    }
}

/// `true` when `packet` ends in a correct checksum. Short input is simply invalid.
pub fn verify_packet(packet: &[u8]) -> bool {
    check_packet(packet).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const READ_CPU: [u8; 6] = [0x01, 0x03, 0x00, 0x04, 0x00, 0x01];

    #[test]
    fn test_crc16_modbus_known_vector() {
        assert_eq!(crc16_modbus(&READ_CPU), 0xCBC5);
        assert_eq!(crc16_modbus(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_crc16_modbus_empty() {
        assert_eq!(crc16_modbus(&[]), 0xFFFF);
    }

    #[test]
    fn test_build_packet_byte_order() {
        let packet = build_packet(&READ_CPU);
        assert_eq!(packet, vec![0x01, 0x03, 0x00, 0x04, 0x00, 0x01, 0xC5, 0xCB]);
        assert_eq!(crc_bytes(&READ_CPU), [0xC5, 0xCB]);
    }

    #[test]
    fn test_verify_packet_short_input() {
        assert!(!verify_packet(&[]));
        assert!(!verify_packet(&[0x01]));
        assert_eq!(check_packet(&[0x01]), Err(FrameError::TooShort { len: 1 }));
    }

    #[test]
    fn test_verify_packet_bare_checksum() {
        // Two bytes is an empty frame plus the checksum of nothing.
        assert!(verify_packet(&[0xFF, 0xFF]));
        assert!(!verify_packet(&[0xFF, 0xFE]));
    }

    #[test]
    fn test_check_packet_reports_mismatch() {
        let packet = [0x01, 0x03, 0x00, 0x04, 0x00, 0x01, 0xCB, 0xC5];
        assert_eq!(
            check_packet(&packet),
            Err(FrameError::ChecksumMismatch {
                expected: 0xCBC5,
                received: 0xC5CB,
            })
        );
    }

    #[test]
    fn test_check_packet_returns_body() {
        let packet = build_packet(&READ_CPU);
        assert_eq!(check_packet(&packet), Ok(&READ_CPU[..]));
    }

    proptest! {
        #[test]
        fn prop_round_trip(frame in proptest::collection::vec(any::<u8>(), 0..256)) {
            let packet = build_packet(&frame);
            prop_assert_eq!(packet.len(), frame.len() + 2);
            prop_assert!(verify_packet(&packet));
            prop_assert_eq!(crc16_modbus(&packet), 0);
        }

        #[test]
        fn prop_single_bit_flip_detected(
            frame in proptest::collection::vec(any::<u8>(), 0..64),
            pos in any::<proptest::sample::Index>(),
            bit in 0u8..8,
        ) {
            let mut packet = build_packet(&frame);
            let idx = pos.index(packet.len());
            packet[idx] ^= 1 << bit;
            prop_assert!(!verify_packet(&packet));
        }
    }
}
