//! Wire format of the remote controller link.
//!
//! Every message is exactly four bytes:
//!
//! ```text
//! [control_id: u8][value: i16, 2 bytes][terminator: 0xFF]
//! ```
//!
//! The value is big-endian unless the link is configured as little-endian.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

pub const TERMINATOR: u8 = 0xFF;
pub const PACKET_LEN: usize = 4;
pub const PAYLOAD_LEN: usize = 3;

// Control ids sent by the transmitter firmware
pub const CONTROL_BUTTON_B: u8 = 0;
pub const CONTROL_BUTTON_Y: u8 = 1;
pub const CONTROL_BUTTON_X: u8 = 2;
pub const CONTROL_BUTTON_A: u8 = 3;
pub const CONTROL_TRIGGER_R: u8 = 4;
pub const CONTROL_TRIGGER_L: u8 = 5;
pub const CONTROL_STICK_RIGHT_X: u8 = 6;
pub const CONTROL_STICK_RIGHT_Y: u8 = 7;
pub const CONTROL_STICK_LEFT_X: u8 = 8;
pub const CONTROL_STICK_LEFT_Y: u8 = 9;
pub const CONTROL_THUMB_R: u8 = 10;
pub const CONTROL_THUMB_L: u8 = 11;

/// Byte order of the 16-bit value field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

/// A validated packet, laid out exactly as it travels on the wire.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Packet {
    pub control_id: u8,
    pub value: [u8; 2],
    pub terminator: u8,
}

impl Packet {
    /// Reinterpret a 4-byte window as a packet.
    ///
    /// Returns `None` when the last byte is not the terminator.
    pub fn from_window(window: [u8; PACKET_LEN]) -> Option<Self> {
        let packet: Packet = bytemuck::cast(window);
        (packet.terminator == TERMINATOR).then_some(packet)
    }

    /// The three payload bytes, terminator stripped.
    pub fn payload(&self) -> [u8; PAYLOAD_LEN] {
        [self.control_id, self.value[0], self.value[1]]
    }

    pub fn decode(&self, endianness: Endianness) -> ControlEvent {
        decode(self.payload(), endianness)
    }
}

/// A decoded `(control id, value)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEvent {
    pub control_id: u8,
    pub value: i16,
}

/// Split a payload into control id and signed value.
///
/// Pure function: whether the control id is known is decided by the router.
pub fn decode(payload: [u8; PAYLOAD_LEN], endianness: Endianness) -> ControlEvent {
    let raw = [payload[1], payload[2]];
    let value = match endianness {
        Endianness::Big => i16::from_be_bytes(raw),
        Endianness::Little => i16::from_le_bytes(raw),
    };
    ControlEvent {
        control_id: payload[0],
        value,
    }
}

/// Encode an event the way the transmitter does. Used by tests and tooling.
pub fn encode(event: ControlEvent, endianness: Endianness) -> [u8; PACKET_LEN] {
    let value = match endianness {
        Endianness::Big => event.value.to_be_bytes(),
        Endianness::Little => event.value.to_le_bytes(),
    };
    [event.control_id, value[0], value[1], TERMINATOR]
}

/// Name of a control as printed on the transmitter.
pub fn control_name(id: u8) -> &'static str {
    match id {
        CONTROL_BUTTON_B => "B",
        CONTROL_BUTTON_Y => "Y",
        CONTROL_BUTTON_X => "X",
        CONTROL_BUTTON_A => "A",
        CONTROL_TRIGGER_R => "TR",
        CONTROL_TRIGGER_L => "TL",
        CONTROL_STICK_RIGHT_X => "CJX",
        CONTROL_STICK_RIGHT_Y => "CJY",
        CONTROL_STICK_LEFT_X => "MJX",
        CONTROL_STICK_LEFT_Y => "MJY",
        CONTROL_THUMB_R => "R3",
        CONTROL_THUMB_L => "L3",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_button_press() {
        let event = decode([0x01, 0x00, 0x01], Endianness::Big);
        assert_eq!(
            event,
            ControlEvent {
                control_id: 1,
                value: 1
            }
        );
    }

    #[test]
    fn test_decode_negative_big_endian() {
        let event = decode([0x06, 0xFE, 0x0C], Endianness::Big);
        assert_eq!(event.control_id, 6);
        assert_eq!(event.value, -500);
    }

    #[test]
    fn test_decode_little_endian() {
        let event = decode([0x06, 0x0C, 0xFE], Endianness::Little);
        assert_eq!(event.value, -500);
    }

    #[test]
    fn test_from_window_accepts_terminator() {
        let packet = Packet::from_window([0x01, 0x02, 0x03, 0xFF]).unwrap();
        assert_eq!(packet.payload(), [0x01, 0x02, 0x03]);
        assert_eq!(packet.terminator, TERMINATOR);
    }

    #[test]
    fn test_from_window_rejects_bad_terminator() {
        assert!(Packet::from_window([0x01, 0x02, 0x03, 0x04]).is_none());
    }

    #[test]
    fn test_encode_matches_firmware_layout() {
        // Firmware writes id, msb, lsb, then 0xFF
        let bytes = encode(
            ControlEvent {
                control_id: CONTROL_STICK_LEFT_X,
                value: -255,
            },
            Endianness::Big,
        );
        assert_eq!(bytes, [8, 0xFF, 0x01, 0xFF]);
    }

    #[test]
    fn test_control_names() {
        assert_eq!(control_name(CONTROL_BUTTON_A), "A");
        assert_eq!(control_name(CONTROL_STICK_RIGHT_X), "CJX");
        assert_eq!(control_name(99), "Unknown");
    }
}
