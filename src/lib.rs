//! Serial Gamepad Bridge
//!
//! Reads 4-byte control packets from a serial link (typically a Bluetooth
//! RFCOMM channel) and drives a virtual uinput gamepad.

pub mod actuator;
pub mod bridge;
pub mod config;
pub mod devices;
pub mod framing;
pub mod mapping;
pub mod protocol;
pub mod release;
pub mod router;
pub mod scaling;
pub mod serial;
