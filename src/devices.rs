pub mod gamepad;
pub mod layout;

pub use gamepad::VirtualGamepad;
