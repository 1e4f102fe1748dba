use crate::actuator::AxisId;
use evdev::{AbsoluteAxisType, Key};

/// Linux input codes of the virtual gamepad.
///
/// Button indices follow the transmitter's printed layout:
/// B, Y, X, A, TR, TL, R3, L3.
pub struct GamepadLayout;

impl GamepadLayout {
    pub const BUTTON_COUNT: usize = 8;

    pub const BUTTON_CODES: [u16; Self::BUTTON_COUNT] = [
        305, // BTN_EAST   (B)
        308, // BTN_WEST   (Y)
        307, // BTN_NORTH  (X)
        304, // BTN_SOUTH  (A)
        311, // BTN_TR
        310, // BTN_TL
        318, // BTN_THUMBR (R3)
        317, // BTN_THUMBL (L3)
    ];

    /// BTN_TRIGGER_HAPPY1; indices past the named buttons count up from here.
    pub const EXTRA_BUTTON_BASE: u16 = 0x2c0;
    pub const EXTRA_BUTTON_COUNT: u16 = 40;

    pub fn button_key(index: u8) -> Option<Key> {
        let code = match Self::BUTTON_CODES.get(usize::from(index)) {
            Some(&code) => code,
            None => {
                let extra = u16::from(index) - Self::BUTTON_COUNT as u16;
                if extra >= Self::EXTRA_BUTTON_COUNT {
                    return None;
                }
                Self::EXTRA_BUTTON_BASE + extra
            }
        };
        Some(Key::new(code))
    }

    pub fn axis_code(axis: AxisId) -> AbsoluteAxisType {
        match axis {
            AxisId::X => AbsoluteAxisType::ABS_X,
            AxisId::Y => AbsoluteAxisType::ABS_Y,
            AxisId::RX => AbsoluteAxisType::ABS_RX,
            AxisId::RY => AbsoluteAxisType::ABS_RY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_buttons() {
        assert_eq!(GamepadLayout::button_key(0), Some(Key::BTN_EAST));
        assert_eq!(GamepadLayout::button_key(3), Some(Key::BTN_SOUTH));
        assert_eq!(GamepadLayout::button_key(7), Some(Key::BTN_THUMBL));
    }

    #[test]
    fn test_extra_buttons() {
        assert_eq!(GamepadLayout::button_key(8), Some(Key::BTN_TRIGGER_HAPPY1));
        assert_eq!(GamepadLayout::button_key(47), Some(Key::new(0x2e7)));
        assert_eq!(GamepadLayout::button_key(48), None);
    }

    #[test]
    fn test_axis_codes() {
        assert_eq!(GamepadLayout::axis_code(AxisId::RY), AbsoluteAxisType::ABS_RY);
    }
}
